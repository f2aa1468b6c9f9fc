//! Directory enumeration over resolved real paths. Consumers hand this module
//! a path the resolver has already containment-proven; unreadable entries are
//! skipped so one bad file never sinks a whole listing.

use serde::Serialize;
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::Path;
use walkdir::WalkDir;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Entry {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq, Default)]
pub struct FolderContents {
    pub files: Vec<Entry>,
    pub directories: Vec<Entry>,
}

/// Lowercased extension of a file name, empty when it has none.
pub fn extension_of(name: &str) -> String {
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => ext.to_ascii_lowercase(),
        _ => String::new(),
    }
}

/// Single-level listing. Directories are always included; files only when
/// their extension is in `supported`. Entries that cannot be stat'ed are
/// skipped.
pub fn directory_contents(
    real_path: &Path,
    supported: &HashSet<String>,
    sort: bool,
) -> io::Result<FolderContents> {
    let mut contents = FolderContents::default();
    for entry in fs::read_dir(real_path)? {
        let Ok(entry) = entry else { continue };
        let Ok(file_type) = entry.file_type() else { continue };
        let name = entry.file_name().to_string_lossy().to_string();
        if file_type.is_dir() {
            contents.directories.push(Entry { name });
        } else if supported.contains(&extension_of(&name)) {
            contents.files.push(Entry { name });
        }
    }
    if sort {
        contents.files.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
        contents.directories.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
    }
    Ok(contents)
}

/// Depth-first scan reporting every supported file under `real_path` as a
/// forward-slash virtual path `vpath/relative/entry`, independent of the host
/// separator. Per-entry failures are skipped and the walk continues.
pub fn recursive_scan(
    real_path: &Path,
    supported: &HashSet<String>,
    vpath: &str,
    relative_path: &str,
) -> io::Result<Vec<String>> {
    if !fs::metadata(real_path)?.is_dir() {
        return Err(io::Error::new(io::ErrorKind::NotADirectory, "not a directory"));
    }
    let mut out = Vec::new();
    for entry in WalkDir::new(real_path).into_iter().filter_map(|e| e.ok()) {
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy();
        if !supported.contains(&extension_of(&name)) {
            continue;
        }
        let Ok(rel) = entry.path().strip_prefix(real_path) else { continue };
        out.push(virtual_file_path(vpath, relative_path, rel));
    }
    Ok(out)
}

fn virtual_file_path(vpath: &str, relative_path: &str, rel: &Path) -> String {
    let mut parts: Vec<String> = Vec::new();
    for seg in vpath.split('/').filter(|s| !s.is_empty()) {
        parts.push(seg.to_string());
    }
    for seg in relative_path.replace('\\', "/").split('/').filter(|s| !s.is_empty()) {
        parts.push(seg.to_string());
    }
    for comp in rel.components() {
        parts.push(comp.as_os_str().to_string_lossy().to_string());
    }
    parts.join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;

    fn supported() -> HashSet<String> {
        ["mp3", "flac"].iter().map(|s| s.to_string()).collect()
    }

    fn seed_library(root: &Path) {
        fs::create_dir_all(root.join("rock/live")).unwrap();
        fs::create_dir_all(root.join("jazz")).unwrap();
        File::create(root.join("intro.mp3")).unwrap();
        File::create(root.join("notes.txt")).unwrap();
        File::create(root.join("rock/anthem.flac")).unwrap();
        File::create(root.join("rock/cover.jpg")).unwrap();
        File::create(root.join("rock/live/encore.mp3")).unwrap();
    }

    #[test]
    fn listing_filters_extensions_and_keeps_directories() {
        let tmp = tempfile::tempdir().unwrap();
        seed_library(tmp.path());
        let contents = directory_contents(tmp.path(), &supported(), true).unwrap();
        let files: Vec<&str> = contents.files.iter().map(|e| e.name.as_str()).collect();
        let dirs: Vec<&str> = contents.directories.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(files, vec!["intro.mp3"]);
        assert_eq!(dirs, vec!["jazz", "rock"]);
    }

    #[test]
    fn listing_sorts_case_insensitively_when_asked() {
        let tmp = tempfile::tempdir().unwrap();
        File::create(tmp.path().join("b.mp3")).unwrap();
        File::create(tmp.path().join("A.mp3")).unwrap();
        File::create(tmp.path().join("c.mp3")).unwrap();
        let sorted = directory_contents(tmp.path(), &supported(), true).unwrap();
        let names: Vec<&str> = sorted.files.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["A.mp3", "b.mp3", "c.mp3"]);
    }

    #[test]
    fn listing_a_missing_directory_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(directory_contents(&tmp.path().join("nope"), &supported(), true).is_err());
    }

    #[test]
    fn scan_reports_virtual_paths_with_forward_slashes() {
        let tmp = tempfile::tempdir().unwrap();
        seed_library(tmp.path());
        let mut found = recursive_scan(tmp.path(), &supported(), "music", "").unwrap();
        found.sort();
        assert_eq!(
            found,
            vec![
                "music/intro.mp3".to_string(),
                "music/rock/anthem.flac".to_string(),
                "music/rock/live/encore.mp3".to_string(),
            ]
        );
    }

    #[test]
    fn scan_honors_the_relative_prefix() {
        let tmp = tempfile::tempdir().unwrap();
        seed_library(tmp.path());
        let found = recursive_scan(&tmp.path().join("rock/live"), &supported(), "music", "rock/live").unwrap();
        assert_eq!(found, vec!["music/rock/live/encore.mp3".to_string()]);
    }

    #[test]
    fn scan_of_a_missing_root_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(recursive_scan(&tmp.path().join("gone"), &supported(), "music", "").is_err());
    }

    #[test]
    fn extension_parsing() {
        assert_eq!(extension_of("song.MP3"), "mp3");
        assert_eq!(extension_of("archive.tar.gz"), "gz");
        assert_eq!(extension_of("noext"), "");
        assert_eq!(extension_of(".hidden"), "");
    }
}
