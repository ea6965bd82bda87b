use std::path::{Path, PathBuf};

use tracing::warn;
use walkdir::WalkDir;

/// Extensions a clip may have
pub const SUPPORTED_EXTENSIONS: &[&str] = &["mp3", "wav"];

pub fn is_supported(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .map_or(false, |ext| SUPPORTED_EXTENSIONS.contains(&ext.as_str()))
}

/// Expands dropped paths into the files to import
pub struct DirectoryScanner;

impl DirectoryScanner {
    /// Scan a directory recursively and return all supported audio files, sorted
    pub fn scan<P: AsRef<Path>>(directory: P) -> Vec<PathBuf> {
        let mut audio_files = Vec::new();

        for entry in WalkDir::new(directory).follow_links(false).into_iter() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(error = %e, "Skipping unreadable entry");
                    continue;
                }
            };
            let path = entry.path();

            if entry.file_type().is_file() && is_supported(path) {
                audio_files.push(path.to_path_buf());
            }
        }

        audio_files.sort();
        audio_files
    }

    /// Files are passed through untouched (validation reports on them later);
    /// directories are replaced by the supported files inside them.
    pub fn expand(paths: &[PathBuf]) -> Vec<PathBuf> {
        let mut out = Vec::with_capacity(paths.len());
        for path in paths {
            if path.is_dir() {
                out.extend(Self::scan(path));
            } else {
                out.push(path.clone());
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_scan_finds_supported_files_recursively() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("nested");
        fs::create_dir(&nested).unwrap();
        fs::write(dir.path().join("b.WAV"), b"x").unwrap();
        fs::write(dir.path().join("notes.txt"), b"x").unwrap();
        fs::write(nested.join("a.mp3"), b"x").unwrap();
        fs::write(nested.join("c.flac"), b"x").unwrap();

        let found = DirectoryScanner::scan(dir.path());
        assert_eq!(found, vec![dir.path().join("b.WAV"), nested.join("a.mp3")]);
    }

    #[test]
    fn test_expand_keeps_plain_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("x.wav"), b"x").unwrap();
        let loose = PathBuf::from("/elsewhere/loose.ogg");

        let expanded = DirectoryScanner::expand(&[loose.clone(), dir.path().to_path_buf()]);
        assert_eq!(expanded, vec![loose, dir.path().join("x.wav")]);
    }
}
