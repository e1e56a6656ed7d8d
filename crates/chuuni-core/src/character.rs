//! Character audio lookup.
//!
//! A character is a directory of clips. For an event, files are searched in
//! three tiers and the first non-empty tier wins:
//!
//! 1. `日语_<char>_<event>.<ext>`
//! 2. `japanese_*<char>_<event>.<ext>`
//! 3. `<event>.<ext>` and `<event>_*.<ext>`
//!
//! `<char>` is the directory's own name. Within a tier, extensions are tried
//! in [`AUDIO_EXTENSIONS`] order and wildcard matches are sorted by name.

use std::path::{Path, PathBuf};

use rand::seq::SliceRandom;
use tracing::debug;

/// Recognised clip extensions, in preference order.
pub const AUDIO_EXTENSIONS: [&str; 5] = [".mp3", ".wav", ".ogg", ".aiff", ".flac"];

/// All clips in `dir` that match `event`, best tier only.
///
/// A missing or unreadable directory yields no candidates.
pub fn find_candidates(dir: &Path, event: &str) -> Vec<PathBuf> {
    let names = match list_file_names(dir) {
        Ok(names) => names,
        Err(e) => {
            debug!(dir = %dir.display(), error = %e, "character directory unreadable");
            return Vec::new();
        }
    };
    let character = dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    for tier in Tier::ALL {
        let found: Vec<PathBuf> = AUDIO_EXTENSIONS
            .iter()
            .flat_map(|ext| {
                let mut hits: Vec<&String> = names
                    .iter()
                    .filter(|name| tier.matches(name, &character, event, ext))
                    .collect();
                // Exact `<event>.<ext>` sorts ahead of `<event>_*.<ext>`.
                hits.sort_by_key(|name| (name.len() != event.len() + ext.len(), *name));
                hits
            })
            .map(|name| dir.join(name))
            .collect();
        if !found.is_empty() {
            debug!(dir = %dir.display(), event, ?tier, count = found.len(), "clips found");
            return found;
        }
    }
    Vec::new()
}

/// Pick one candidate uniformly at random.
pub fn choose(candidates: &[PathBuf]) -> Option<&PathBuf> {
    candidates.choose(&mut rand::thread_rng())
}

/// Resolve a single clip for `event` in `dir`.
pub fn resolve(dir: &Path, event: &str) -> Option<PathBuf> {
    choose(&find_candidates(dir, event)).cloned()
}

#[derive(Debug, Clone, Copy)]
enum Tier {
    Native,
    Japanese,
    Generic,
}

impl Tier {
    const ALL: [Tier; 3] = [Tier::Native, Tier::Japanese, Tier::Generic];

    fn matches(self, name: &str, character: &str, event: &str, ext: &str) -> bool {
        match self {
            Tier::Native => name == format!("日语_{character}_{event}{ext}"),
            Tier::Japanese => wildcard(name, "japanese_", &format!("{character}_{event}{ext}")),
            Tier::Generic => {
                name == format!("{event}{ext}") || wildcard(name, &format!("{event}_"), ext)
            }
        }
    }
}

/// `prefix*suffix` where the wildcard may be empty but not overlap.
fn wildcard(name: &str, prefix: &str, suffix: &str) -> bool {
    name.len() >= prefix.len() + suffix.len() && name.starts_with(prefix) && name.ends_with(suffix)
}

fn list_file_names(dir: &Path) -> std::io::Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            continue;
        }
        if let Ok(name) = entry.file_name().into_string() {
            names.push(name);
        }
    }
    names.sort();
    Ok(names)
}
