use std::path::Path;

use crate::types::{MediaItem, MediaKind};

/// Extension lookup table. Anything not listed is treated as a clip.
const EXTENSION_KINDS: &[(&str, MediaKind)] = &[
    ("png", MediaKind::Still),
    ("jpg", MediaKind::Still),
    ("jpeg", MediaKind::Still),
    ("webp", MediaKind::Still),
    ("jfif", MediaKind::Still),
    ("bmp", MediaKind::Still),
    ("tiff", MediaKind::Still),
    ("tif", MediaKind::Still),
    ("avif", MediaKind::Still),
    ("gif", MediaKind::Loop),
];

/// Classify a filename by its extension (case-insensitive).
pub fn classify(name: &str) -> MediaKind {
    let ext = Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    EXTENSION_KINDS
        .iter()
        .find(|(e, _)| *e == ext)
        .map(|(_, kind)| *kind)
        .unwrap_or(MediaKind::Clip)
}

/// Turn an ordered list of filenames into unprobed media items.
pub fn classify_all<S: AsRef<str>>(names: &[S]) -> Vec<MediaItem> {
    names
        .iter()
        .enumerate()
        .map(|(position, name)| {
            let name = name.as_ref();
            MediaItem::new(name, classify(name), position)
        })
        .collect()
}
