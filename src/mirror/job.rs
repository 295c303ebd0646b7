//! # Job Model Module
//!
//! I job prodotti dal planner: encode, copy e delete.
//! Un unico `execute` per tutti i tipi; ogni variante porta solo i campi
//! che le servono.

use crate::config::RunOptions;
use crate::error::MirrorError;
use crate::mirror::backend::Backend;
use crate::mirror::path_resolver::PathResolver;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::info;

/// Kind of action a job performs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    Encode,
    Copy,
    Delete,
}

/// A single planned action
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Job {
    Encode { source: PathBuf, destination: PathBuf },
    Copy { source: PathBuf, destination: PathBuf },
    Delete { target: PathBuf },
}

impl Job {
    pub fn kind(&self) -> JobKind {
        match self {
            Job::Encode { .. } => JobKind::Encode,
            Job::Copy { .. } => JobKind::Copy,
            Job::Delete { .. } => JobKind::Delete,
        }
    }

    /// The path this job creates or removes
    pub fn destination(&self) -> &Path {
        match self {
            Job::Encode { destination, .. } | Job::Copy { destination, .. } => destination,
            Job::Delete { target } => target,
        }
    }

    pub fn source(&self) -> Option<&Path> {
        match self {
            Job::Encode { source, .. } | Job::Copy { source, .. } => Some(source),
            Job::Delete { .. } => None,
        }
    }

    /// Check that the job only writes below `root`
    pub fn check_within(&self, root: &Path) -> Result<(), MirrorError> {
        PathResolver::ensure_within(root, self.destination())
    }

    /// Log the action and perform it through `backend`
    pub async fn execute(
        &self,
        backend: &dyn Backend,
        options: &RunOptions,
    ) -> Result<JobKind, MirrorError> {
        let prefix = if options.dry_run { "[DRY RUN] " } else { "" };
        info!("{}{}", prefix, self);

        match self {
            Job::Encode { source, destination } => {
                backend.ensure_parent_dirs(destination).await?;
                backend.encode(source, destination, options).await?;
            }
            Job::Copy { source, destination } => {
                backend.ensure_parent_dirs(destination).await?;
                backend.copy_file(source, destination).await?;
            }
            Job::Delete { target } => {
                backend.delete_file(target).await?;
            }
        }

        Ok(self.kind())
    }
}

impl fmt::Display for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Job::Encode { source, destination } => write!(
                f,
                "Encoding: {}\n  Output: {}",
                source.display(),
                destination.display()
            ),
            Job::Copy { source, destination } => write!(
                f,
                "Copying: {}\n     to: {}",
                source.display(),
                destination.display()
            ),
            Job::Delete { target } => write!(f, "Deleting from destination: {}", target.display()),
        }
    }
}

/// Output of the planner
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobPlan {
    /// Absolute destination root every job must stay under
    pub destination_root: PathBuf,
    /// Encode and copy jobs in source scan order
    pub creations: Vec<Job>,
    pub deletions: Vec<Job>,
}

impl JobPlan {
    pub fn is_empty(&self) -> bool {
        self.creations.is_empty() && self.deletions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.creations.len() + self.deletions.len()
    }

    /// Check every job against the destination root
    pub fn validate(&self) -> Result<(), MirrorError> {
        for job in self.creations.iter().chain(&self.deletions) {
            job.check_within(&self.destination_root)?;
        }

        if let Some(job) = self.creations.iter().find(|job| job.kind() == JobKind::Delete) {
            return Err(MirrorError::InvariantViolation(format!(
                "delete job in the creation list: {}",
                job.destination().display()
            )));
        }
        if let Some(job) = self.deletions.iter().find(|job| job.kind() != JobKind::Delete) {
            return Err(MirrorError::InvariantViolation(format!(
                "creation job in the deletion list: {}",
                job.destination().display()
            )));
        }
        Ok(())
    }
}
