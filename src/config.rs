//! # Configuration Management Module
//!
//! Questo modulo gestisce la configurazione di una singola esecuzione del mirror.
//!
//! ## Responsabilità:
//! - Definisce `RunOptions`, snapshot immutabile condiviso da planner, job ed executor
//! - Definisce le policy (`Codec`, `AlbumArt`, `Overwrite`)
//! - Fornisce validazione dei parametri di input
//! - Supporta caricamento/salvataggio configurazione da/verso file JSON
//!
//! ## Parametri di configurazione:
//! - `codec`: Codec di output (opus o vorbis, default: opus)
//! - `albumart`: Trattamento della copertina (optimize/resize/keep/discard, default: optimize)
//! - `albumart_max_width`: Larghezza massima per `resize` (default: 750)
//! - `overwrite`: Policy per file di destinazione esistenti (all/none/old, default: old)
//! - `delete`: Elimina file orfani nella destinazione (default: false)
//! - `assume_yes`: Salta la conferma interattiva prima delle eliminazioni
//! - `copy_files` / `copy_extensions`: File da copiare senza ricodifica
//! - `workers`: Numero di job paralleli (default: None = parallelismo dell'host)
//! - `dry_run`: Simula senza modificare nulla
//!
//! ## Esempio:
//! ```rust,ignore
//! let options = RunOptions {
//!     overwrite: Overwrite::All,
//!     workers: Some(8),
//!     ..Default::default()
//! };
//! options.validate()?;
//! ```

use crate::error::MirrorError;
use anyhow::Result;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Extension of the files that get re-encoded
pub const TRACKED_EXTENSION: &str = "flac";

/// Output codec
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Codec {
    Opus,
    Vorbis,
}

impl Codec {
    /// Extension of the encoded files. Both codecs live in an Ogg container.
    pub fn output_extension(&self) -> &'static str {
        "ogg"
    }
}

/// What happens to the pictures embedded in the FLAC files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum AlbumArt {
    /// Re-encode the cover as a progressive JPEG
    Optimize,
    /// Like `Optimize`, also shrinking it to `albumart_max_width`
    Resize,
    Keep,
    Discard,
}

/// When an existing destination file gets regenerated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Overwrite {
    All,
    None,
    /// Only when the source is strictly newer than the destination
    Old,
}

/// Options for one mirror run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunOptions {
    pub codec: Codec,
    pub albumart: AlbumArt,
    /// Maximum cover width in pixels when `albumart` is `resize`
    pub albumart_max_width: u32,
    pub overwrite: Overwrite,
    /// Delete destination files that no source file accounts for
    pub delete: bool,
    /// Delete without asking
    pub assume_yes: bool,
    /// File names copied verbatim (e.g. `cover.jpg`)
    pub copy_files: Vec<String>,
    /// Extensions copied verbatim, without the dot
    pub copy_extensions: Vec<String>,
    /// Number of parallel jobs (None = host parallelism)
    pub workers: Option<usize>,
    /// Opus bitrate in kbit/s passed to opusenc
    pub opus_quality: Option<f32>,
    /// Vorbis quality level passed to oggenc
    pub vorbis_quality: Option<i32>,
    /// Dry run - log what would happen without touching the filesystem
    pub dry_run: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            codec: Codec::Opus,
            albumart: AlbumArt::Optimize,
            albumart_max_width: 750,
            overwrite: Overwrite::Old,
            delete: false,
            assume_yes: false,
            copy_files: Vec::new(),
            copy_extensions: Vec::new(),
            workers: None,
            opus_quality: None,
            vorbis_quality: None,
            dry_run: false,
        }
    }
}

impl RunOptions {
    /// Validate configuration parameters
    pub fn validate(&self) -> Result<(), MirrorError> {
        if self.workers == Some(0) {
            return Err(MirrorError::Validation("Number of workers must be greater than 0".into()));
        }

        if self.albumart_max_width == 0 {
            return Err(MirrorError::Validation("Album art max width must be greater than 0".into()));
        }

        if let Some(bitrate) = self.opus_quality {
            if !(6.0..=256.0).contains(&bitrate) {
                return Err(MirrorError::Validation(
                    "Opus bitrate must be between 6 and 256 kbit/s".into(),
                ));
            }
        }

        if let Some(quality) = self.vorbis_quality {
            if !(-1..=10).contains(&quality) {
                return Err(MirrorError::Validation("Vorbis quality must be between -1 and 10".into()));
            }
        }

        if self.copy_extensions.iter().any(|ext| ext.eq_ignore_ascii_case(TRACKED_EXTENSION)) {
            return Err(MirrorError::Validation(format!(
                "{} files are always encoded and cannot be listed as copy extensions",
                TRACKED_EXTENSION
            )));
        }

        Ok(())
    }

    /// Number of concurrent jobs, falling back to the available parallelism
    pub fn effective_workers(&self) -> usize {
        self.workers.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        })
    }

    /// Load configuration from file, defaults when the file does not exist
    pub async fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(path).await?;
        let options: RunOptions = serde_json::from_str(&content).map_err(MirrorError::from)?;
        options.validate()?;
        Ok(options)
    }

    /// Save configuration to file
    pub async fn save_to_file(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, content).await?;
        Ok(())
    }

    /// Default location of the config file
    pub fn default_path() -> Option<std::path::PathBuf> {
        dirs::config_dir().map(|dir| dir.join("flac-mirror").join("config.json"))
    }
}
