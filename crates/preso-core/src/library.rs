//! Slide library: media file naming and the slides directory listing.

use std::collections::HashSet;
use std::path::Path;
use walkdir::WalkDir;

/// Video container extensions recognised by the player.
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "webm", "mov"];

/// Still-image extensions recognised by the player.
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg"];

fn extension_of(name: &str) -> Option<&str> {
    // ignore query strings and fragments on media references
    let clean = name.split(['?', '#']).next().unwrap_or(name);
    let (_, ext) = clean.rsplit_once('.')?;
    Some(ext)
}

fn has_extension(name: &str, set: &[&str]) -> bool {
    extension_of(name).is_some_and(|ext| set.iter().any(|e| e.eq_ignore_ascii_case(ext)))
}

pub fn is_video_name(name: &str) -> bool {
    has_extension(name, VIDEO_EXTENSIONS)
}

pub fn is_image_name(name: &str) -> bool {
    has_extension(name, IMAGE_EXTENSIONS)
}

/// Replace runs of whitespace with `_`.
pub fn sanitize_media_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut in_space = false;
    for ch in name.chars() {
        if ch.is_whitespace() {
            if !in_space {
                out.push('_');
            }
            in_space = true;
        } else {
            out.push(ch);
            in_space = false;
        }
    }
    out
}

/// Sanitized name that does not collide with `existing`: `deck.png`,
/// `deck(1).png`, `deck(2).png`, ...
pub fn unique_media_name(existing: &HashSet<String>, name: &str) -> String {
    let name = sanitize_media_name(name);
    if !existing.contains(&name) {
        return name;
    }
    let (base, ext) = match name.rfind('.') {
        Some(i) => (&name[..i], &name[i..]),
        None => (name.as_str(), ""),
    };
    (1..)
        .map(|i| format!("{base}({i}){ext}"))
        .find(|candidate| !existing.contains(candidate))
        .unwrap_or(name.clone())
}

/// File names directly inside the slides directory, sorted. The directory is
/// created when missing.
pub fn list_media(dir: impl AsRef<Path>) -> std::io::Result<Vec<String>> {
    let dir = dir.as_ref();
    std::fs::create_dir_all(dir)?;
    let mut names = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry.map_err(std::io::Error::other)?;
        if entry.file_type().is_file() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    names.sort();
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_extensions_case_insensitively() {
        assert!(is_video_name("clip.MP4"));
        assert!(is_video_name("/slides/a.webm?v=123"));
        assert!(!is_video_name("a.png"));
        assert!(is_image_name("A.JPeG"));
        assert!(!is_image_name("slide3"));
    }

    #[test]
    fn unique_names_count_up() {
        let mut existing = HashSet::new();
        assert_eq!(unique_media_name(&existing, "my deck.png"), "my_deck.png");
        existing.insert("my_deck.png".to_string());
        existing.insert("my_deck(1).png".to_string());
        assert_eq!(unique_media_name(&existing, "my deck.png"), "my_deck(2).png");
        existing.insert("noext".to_string());
        assert_eq!(unique_media_name(&existing, "noext"), "noext(1)");
    }

    #[test]
    fn lists_files_and_creates_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("slides");
        assert!(list_media(&dir).unwrap().is_empty());
        std::fs::write(dir.join("02.png"), b"x").unwrap();
        std::fs::write(dir.join("01.png"), b"x").unwrap();
        std::fs::create_dir(dir.join("nested")).unwrap();
        assert_eq!(list_media(&dir).unwrap(), vec!["01.png", "02.png"]);
    }
}
