//! # Planner Module
//!
//! Confronta l'albero sorgente con quello di destinazione e produce il `JobPlan`.
//!
//! ## Algoritmo:
//! 1. Scansiona i `.flac` e i file nella copy allow-list (nome esatto o estensione)
//! 2. Calcola il path di destinazione e lo aggiunge al set delle destinazioni valide,
//!    anche quando nessun job è necessario
//! 3. Decide se serve un job secondo la policy di overwrite
//! 4. Con `delete` attivo, ogni file in destinazione fuori dal set diventa un `Delete`
//!
//! Il planner non modifica mai il filesystem.

use crate::config::{Overwrite, RunOptions, TRACKED_EXTENSION};
use crate::error::MirrorError;
use crate::file_manager::{FileManager, SourceFile};
use crate::mirror::job::{Job, JobPlan};
use crate::mirror::path_resolver::PathResolver;
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info, warn};

/// Builds job plans from a source and destination tree
pub struct Planner<'a> {
    options: &'a RunOptions,
}

impl<'a> Planner<'a> {
    pub fn new(options: &'a RunOptions) -> Self {
        Self { options }
    }

    /// Diff `source_root` against `destination_root`
    pub fn plan(&self, source_root: &Path, destination_root: &Path) -> Result<JobPlan, MirrorError> {
        let source_root = PathResolver::absolute_root(source_root)?;
        let destination_root = PathResolver::absolute_root(destination_root)?;

        if !source_root.is_dir() {
            return Err(MirrorError::Planning {
                root: source_root,
                reason: "not a directory".to_string(),
            });
        }

        let mut extensions = vec![TRACKED_EXTENSION.to_string()];
        extensions.extend(self.options.copy_extensions.iter().cloned());
        let source_files =
            FileManager::scan(&source_root, Some(&extensions), &self.options.copy_files)?;
        debug!("Found {} source files in {}", source_files.len(), source_root.display());

        let output_extension = self.options.codec.output_extension();
        let mut valid_destinations = HashSet::with_capacity(source_files.len());
        let mut creations = Vec::new();

        for source in &source_files {
            let destination = PathResolver::map_output_path(
                &destination_root,
                source.relative(),
                TRACKED_EXTENSION,
                output_extension,
            );

            if !valid_destinations.insert(destination.clone()) {
                warn!(
                    "Skipping {}: another source file already maps to {}",
                    source.path().display(),
                    destination.display()
                );
                continue;
            }

            if !self.job_required(source, &destination)? {
                debug!("Up to date: {}", destination.display());
                continue;
            }

            let source_path = source.path().to_path_buf();
            if source.has_extension(TRACKED_EXTENSION) {
                creations.push(Job::Encode { source: source_path, destination });
            } else {
                creations.push(Job::Copy { source: source_path, destination });
            }
        }

        let deletions = if self.options.delete {
            self.orphans(&destination_root, &valid_destinations)?
        } else {
            Vec::new()
        };

        info!(
            "Planned {} creation jobs and {} deletions ({} source files)",
            creations.len(),
            deletions.len(),
            source_files.len()
        );

        Ok(JobPlan {
            destination_root,
            creations,
            deletions,
        })
    }

    /// Overwrite policy decision for one source file
    fn job_required(&self, source: &SourceFile, destination: &Path) -> Result<bool, MirrorError> {
        if !destination.exists() {
            return Ok(true);
        }

        match self.options.overwrite {
            Overwrite::All => Ok(true),
            Overwrite::None => Ok(false),
            Overwrite::Old => Ok(FileManager::source_is_newer(source.path(), destination)?),
        }
    }

    /// Destination files with no counterpart among the valid destinations
    fn orphans(
        &self,
        destination_root: &Path,
        valid_destinations: &HashSet<std::path::PathBuf>,
    ) -> Result<Vec<Job>, MirrorError> {
        if !destination_root.exists() {
            return Ok(Vec::new());
        }

        let found = FileManager::scan(destination_root, None, &[])?;
        Ok(found
            .into_iter()
            .filter(|file| !valid_destinations.contains(file.path()))
            .map(|file| Job::Delete { target: file.path().to_path_buf() })
            .collect())
    }
}

/// Convenience wrapper around [`Planner::plan`]
pub fn plan(
    source_root: &Path,
    destination_root: &Path,
    options: &RunOptions,
) -> Result<JobPlan, MirrorError> {
    Planner::new(options).plan(source_root, destination_root)
}
