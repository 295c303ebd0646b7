//! # Progress Tracker Module
//!
//! Tracker thread-safe condiviso tra i task del pool: aggiorna la progress
//! bar e conta le azioni completate.

use crate::mirror::job::{Job, JobKind};
use crate::progress::{ProgressManager, RunStats};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Tracker condiviso tra i worker
#[derive(Clone)]
pub struct ProgressTracker {
    pub total_jobs: usize,
    stats: Arc<Mutex<RunStats>>,
    progress_manager: ProgressManager,
}

impl ProgressTracker {
    /// Crea un nuovo tracker
    pub fn new(total_jobs: usize, visible: bool) -> Self {
        Self {
            total_jobs,
            stats: Arc::new(Mutex::new(RunStats::new())),
            progress_manager: ProgressManager::new(total_jobs as u64, visible),
        }
    }

    /// Registra un job completato
    pub async fn record(&self, job: &Job, kind: JobKind) {
        {
            let mut stats = self.stats.lock().await;
            match kind {
                JobKind::Encode => stats.encoded += 1,
                JobKind::Copy => stats.copied += 1,
                JobKind::Delete => stats.deleted += 1,
            }
        }

        let name = job
            .source()
            .unwrap_or_else(|| job.destination())
            .file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .into_owned();
        self.progress_manager.update(&name);
    }

    /// Finalizza la progress bar
    pub fn finish(&self, summary: &str) {
        self.progress_manager.finish(summary);
    }

    /// Interrompe la progress bar
    pub fn abandon(&self, message: &str) {
        self.progress_manager.abandon(message);
    }

    /// Statistiche per il report finale
    pub async fn get_stats(&self) -> RunStats {
        self.stats.lock().await.clone()
    }
}
