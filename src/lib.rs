//! # FLAC Mirror Library
//!
//! Questo è il modulo principale della libreria che espone tutte le API pubbliche.
//!
//! ## Responsabilità:
//! - Definisce la struttura modulare dell'applicazione
//! - Espone i tipi e le funzioni principali tramite re-exports
//! - Fornisce un'interfaccia pulita per il main.rs e per i test di integrazione
//!
//! ## Architettura dei moduli:
//! - `config`: Opzioni di esecuzione, policy e validazione
//! - `error`: Tipi di errore custom
//! - `file_manager`: Scansione dell'albero sorgente e confronto timestamp
//! - `tools`: Programmi esterni e verifica dei requisiti
//! - `encoder`: Encoding Opus/Vorbis e gestione copertine
//! - `mirror`: Planner, job ed executor
//! - `progress`: Progress bar e statistiche
//!
//! ## Utilizzo:
//! ```rust,ignore
//! use flac_mirror::{plan, Executor, RunOptions};
//!
//! let options = RunOptions::default();
//! let job_plan = plan(&source, &destination, &options)?;
//! let report = Executor::for_options(options).execute(job_plan).await?;
//! ```

pub mod config;
pub mod encoder;
pub mod error;
pub mod file_manager;
pub mod mirror;
pub mod progress;
pub mod tools;

pub use config::{AlbumArt, Codec, Overwrite, RunOptions};
pub use encoder::{Encoder, ExternalEncoder};
pub use error::MirrorError;
pub use mirror::{plan, Executor, Job, JobPlan, RunReport, RunStatus};
pub use progress::RunStats;
