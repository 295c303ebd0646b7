//! # Progress Tracking and Statistics Module
//!
//! Questo modulo gestisce la progress bar e le statistiche di un run.
//!
//! ## Componenti principali:
//! - `ProgressManager`: Progress bar `indicatif` (nascosta con `--no-progress`)
//! - `RunStats`: Conteggio delle azioni completate per tipo
//!
//! ## Visual feedback:
//! ```text
//! ⠋ [00:02:15] [========================================] 150/150 (100%) 01 Intro.flac
//! ```

use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Manages progress reporting for a mirror run
#[derive(Clone)]
pub struct ProgressManager {
    bar: ProgressBar,
}

impl ProgressManager {
    /// Create a new progress manager
    pub fn new(total_jobs: u64, visible: bool) -> Self {
        if !visible {
            return Self { bar: ProgressBar::hidden() };
        }

        let bar = ProgressBar::new(total_jobs);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}")
        {
            bar.set_style(style.progress_chars("=>-"));
        }
        bar.enable_steady_tick(Duration::from_millis(100));

        Self { bar }
    }

    /// Update progress with a message
    pub fn update(&self, message: &str) {
        self.bar.inc(1);
        self.bar.set_message(message.to_string());
    }

    /// Finish with a final message
    pub fn finish(&self, message: &str) {
        self.bar.finish_with_message(message.to_string());
    }

    /// Stop drawing without completing the bar
    pub fn abandon(&self, message: &str) {
        self.bar.abandon_with_message(message.to_string());
    }
}

/// Statistics for one run
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunStats {
    pub encoded: usize,
    pub copied: usize,
    pub deleted: usize,
}

impl RunStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of completed actions
    pub fn total(&self) -> usize {
        self.encoded + self.copied + self.deleted
    }

    pub fn format_summary(&self) -> String {
        format!(
            "Encoded: {} | Copied: {} | Deleted: {}",
            self.encoded, self.copied, self.deleted
        )
    }
}
