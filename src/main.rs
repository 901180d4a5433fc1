mod app;
mod config;
mod controller;
mod engine;
mod error;
mod library;
mod observer;
mod runtime;
mod ui;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    runtime::run()
}
