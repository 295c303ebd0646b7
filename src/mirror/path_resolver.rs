//! # Path Resolution Module
//!
//! Centralizza il calcolo dei path di destinazione e il controllo che ogni
//! path su cui un job agisce resti dentro la root di destinazione.

use crate::error::MirrorError;
use crate::file_manager::FileManager;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

/// Utility per calcolare i path di output in modo centralizzato
pub struct PathResolver;

impl PathResolver {
    /// Map a source-relative path under `root`, swapping `input_extension`
    /// for `output_extension`. Other files keep their name.
    pub fn map_output_path(
        root: &Path,
        relative: &Path,
        input_extension: &str,
        output_extension: &str,
    ) -> PathBuf {
        let mapped = if FileManager::has_extension(relative, input_extension) {
            relative.with_extension(output_extension)
        } else {
            relative.to_path_buf()
        };

        let result = root.join(mapped);
        debug!("Resolved output path: {} -> {}", relative.display(), result.display());
        result
    }

    /// Fail unless `path` lies strictly below `root`
    pub fn ensure_within(root: &Path, path: &Path) -> Result<(), MirrorError> {
        let escapes = path
            .components()
            .any(|component| matches!(component, Component::ParentDir));

        if escapes || path == root || !path.starts_with(root) {
            return Err(MirrorError::InvariantViolation(format!(
                "{} is not inside the destination {}",
                path.display(),
                root.display()
            )));
        }
        Ok(())
    }

    /// Absolute form of a root directory, without requiring it to exist
    pub fn absolute_root(path: &Path) -> Result<PathBuf, MirrorError> {
        Ok(std::path::absolute(path)?)
    }
}
