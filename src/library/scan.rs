use std::borrow::Cow;
use std::path::Path;
use std::time::Duration;

use lofty::file::{AudioFile, TaggedFileExt};
use lofty::tag::Accessor;
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::config::LibrarySettings;

use super::catalog::Catalog;
use super::display::DisplayParts;
use super::model::{Track, TrackId};

fn is_audio_file(path: &Path, settings: &LibrarySettings) -> bool {
    let Some(ext) = path.extension().and_then(|s| s.to_str()) else {
        return false;
    };
    let ext = ext.to_ascii_lowercase();
    settings
        .extensions
        .iter()
        .map(|e| e.trim().trim_start_matches('.').to_ascii_lowercase())
        .any(|e| !e.is_empty() && e == ext)
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|s| s.to_str())
        .map(|name| name.starts_with('.'))
        .unwrap_or(false)
}

fn keep(v: Option<Cow<'_, str>>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

struct Tags {
    title: Option<String>,
    artist: Option<String>,
    album: Option<String>,
    duration: Option<Duration>,
}

fn read_tags(path: &Path) -> Tags {
    let mut tags = Tags {
        title: None,
        artist: None,
        album: None,
        duration: None,
    };

    let tagged = match lofty::read_from_path(path) {
        Ok(t) => t,
        Err(e) => {
            debug!(path = %path.display(), "no readable tags: {e}");
            return tags;
        }
    };

    let duration = tagged.properties().duration();
    if !duration.is_zero() {
        tags.duration = Some(duration);
    }

    if let Some(tag) = tagged.primary_tag().or_else(|| tagged.first_tag()) {
        tags.title = keep(tag.title());
        tags.artist = keep(tag.artist());
        tags.album = keep(tag.album());
    }
    tags
}

/// Walk `dir` and build the catalog, sorted case-insensitively by display string.
pub fn scan(dir: &Path, settings: &LibrarySettings) -> Catalog {
    let mut tracks: Vec<Track> = Vec::new();

    let mut walker = WalkDir::new(dir).follow_links(settings.follow_links);

    // Non-recursive = only the root directory.
    let depth_cap = if settings.recursive {
        settings.max_depth
    } else {
        Some(1)
    };
    if let Some(d) = depth_cap {
        walker = walker.max_depth(d);
    }

    for entry in walker
        .into_iter()
        .filter_entry(|e| settings.include_hidden || e.depth() == 0 || !is_hidden(e.path()))
        .filter_map(Result::ok)
    {
        let path = entry.path();
        if !path.is_file() || !is_audio_file(path, settings) {
            continue;
        }

        let tags = read_tags(path);
        let title = tags.title.unwrap_or_else(|| {
            path.file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("UNKNOWN")
                .to_string()
        });

        let display = DisplayParts {
            path,
            title: &title,
            artist: tags.artist.as_deref(),
            album: tags.album.as_deref(),
        }
        .render(&settings.display_fields, &settings.display_separator);

        tracks.push(Track {
            id: TrackId::from_path(path),
            path: path.to_path_buf(),
            title,
            artist: tags.artist,
            album: tags.album,
            duration: tags.duration,
            display,
        });
    }

    tracks.sort_by_key(|t| t.display.to_lowercase());
    info!(dir = %dir.display(), count = tracks.len(), "library scanned");
    Catalog::new(tracks)
}
