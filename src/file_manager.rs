//! # File Management Module
//!
//! Questo modulo gestisce la discovery dei file e le primitive sui timestamp.
//!
//! ## Responsabilità:
//! - Discovery ricorsiva dei file in una directory, in ordine deterministico
//! - Filtro per estensione (case-insensitive) e per nome esatto
//! - Lettura lazy della modification time
//! - Confronto "sorgente più recente della destinazione"
//!
//! ## Ordinamento:
//! Le entry di ogni directory sono ordinate per nome (`sort_by_file_name`),
//! quindi due scansioni dello stesso albero producono la stessa sequenza.
//!
//! ## Esempio:
//! ```rust,ignore
//! let files = FileManager::scan(&src, Some(&["flac".into()]), &["cover.jpg".into()])?;
//! for file in files {
//!     println!("{}", file.relative().display());
//! }
//! ```

use crate::error::MirrorError;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use walkdir::WalkDir;

/// A file found under a scanned root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    path: PathBuf,
    relative: PathBuf,
}

impl SourceFile {
    pub fn new(path: PathBuf, relative: PathBuf) -> Self {
        Self { path, relative }
    }

    /// Full path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path relative to the scanned root
    pub fn relative(&self) -> &Path {
        &self.relative
    }

    /// Last modification time, read from the filesystem on demand
    pub fn modified(&self) -> std::io::Result<SystemTime> {
        FileManager::modified(&self.path)
    }

    /// Case-insensitive extension check
    pub fn has_extension(&self, extension: &str) -> bool {
        FileManager::has_extension(&self.path, extension)
    }
}

/// Manages file discovery
pub struct FileManager;

impl FileManager {
    /// Find all files under `root` whose extension is in `extensions` or whose
    /// file name is in `allowed_names`. `extensions = None` accepts every file.
    pub fn scan(
        root: &Path,
        extensions: Option<&[String]>,
        allowed_names: &[String],
    ) -> Result<Vec<SourceFile>, MirrorError> {
        let mut files = Vec::new();

        for entry in WalkDir::new(root).sort_by_file_name() {
            let entry = entry.map_err(|e| MirrorError::Planning {
                root: root.to_path_buf(),
                reason: e.to_string(),
            })?;

            if entry.file_type().is_dir() {
                continue;
            }

            let path = entry.path();
            if !Self::matches(path, extensions, allowed_names) {
                continue;
            }

            let relative = path
                .strip_prefix(root)
                .map_err(|e| MirrorError::InvariantViolation(format!(
                    "{} is not under {}: {}",
                    path.display(),
                    root.display(),
                    e
                )))?
                .to_path_buf();

            files.push(SourceFile::new(path.to_path_buf(), relative));
        }

        Ok(files)
    }

    fn matches(path: &Path, extensions: Option<&[String]>, allowed_names: &[String]) -> bool {
        let Some(extensions) = extensions else {
            return true;
        };

        if extensions.iter().any(|ext| Self::has_extension(path, ext)) {
            return true;
        }

        path.file_name()
            .map(|name| allowed_names.iter().any(|allowed| name == allowed.as_str()))
            .unwrap_or(false)
    }

    /// Check if a file has the given extension (without the dot)
    pub fn has_extension(path: &Path, extension: &str) -> bool {
        path.extension()
            .map(|ext| ext.to_string_lossy().eq_ignore_ascii_case(extension))
            .unwrap_or(false)
    }

    /// Get the modification time of a file
    pub fn modified(path: &Path) -> std::io::Result<SystemTime> {
        std::fs::metadata(path)?.modified()
    }

    /// True when `source` was modified strictly after `destination`
    pub fn source_is_newer(source: &Path, destination: &Path) -> std::io::Result<bool> {
        Ok(Self::modified(source)? > Self::modified(destination)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::Duration;
    use tempfile::TempDir;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"x").unwrap();
    }

    #[test]
    fn test_scan_filters_and_sorts() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        touch(&root.join("b/02.flac"));
        touch(&root.join("b/01.FLAC"));
        touch(&root.join("a/track.flac"));
        touch(&root.join("a/cover.jpg"));
        touch(&root.join("a/notes.txt"));

        let extensions = vec!["flac".to_string()];
        let names = vec!["cover.jpg".to_string()];
        let files = FileManager::scan(root, Some(&extensions), &names).unwrap();
        let relative: Vec<_> = files.iter().map(|f| f.relative().to_path_buf()).collect();

        assert_eq!(
            relative,
            vec![
                PathBuf::from("a/cover.jpg"),
                PathBuf::from("a/track.flac"),
                PathBuf::from("b/01.FLAC"),
                PathBuf::from("b/02.flac"),
            ]
        );
    }

    #[test]
    fn test_scan_without_filter_returns_everything() {
        let temp_dir = TempDir::new().unwrap();
        touch(&temp_dir.path().join("x.ogg"));
        touch(&temp_dir.path().join("sub/y.txt"));

        let files = FileManager::scan(temp_dir.path(), None, &[]).unwrap();
        assert_eq!(files.len(), 2);
    }

    #[test]
    fn test_scan_missing_root_is_planning_error() {
        let temp_dir = TempDir::new().unwrap();
        let result = FileManager::scan(&temp_dir.path().join("missing"), None, &[]);
        assert!(matches!(result, Err(MirrorError::Planning { .. })));
    }

    #[test]
    fn test_source_is_newer_is_strict() {
        let temp_dir = TempDir::new().unwrap();
        let src = temp_dir.path().join("a.flac");
        let dst = temp_dir.path().join("a.ogg");
        touch(&src);
        touch(&dst);

        let now = SystemTime::now();
        fs::File::options().write(true).open(&src).unwrap().set_modified(now).unwrap();
        fs::File::options().write(true).open(&dst).unwrap().set_modified(now).unwrap();
        assert!(!FileManager::source_is_newer(&src, &dst).unwrap());

        fs::File::options()
            .write(true)
            .open(&src)
            .unwrap()
            .set_modified(now + Duration::from_secs(10))
            .unwrap();
        assert!(FileManager::source_is_newer(&src, &dst).unwrap());
    }
}
