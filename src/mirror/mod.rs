//! # Mirror Module
//!
//! Modulo che separa le responsabilità del mirror in sottomoduli:
//! - `planner`: Confronto sorgente/destinazione e costruzione del piano
//! - `job`: Modello dei job (encode, copy, delete) e del piano
//! - `executor`: Esecuzione concorrente con fail-fast e cancellazione
//! - `backend`: Effetti sul filesystem (reale o dry run)
//! - `confirm`: Conferma interattiva prima delle eliminazioni
//! - `progress_tracker`: Gestione progress condivisa tra i worker
//! - `path_resolver`: Logica di calcolo path centralizzata

pub mod backend;
pub mod confirm;
pub mod executor;
pub mod job;
pub mod path_resolver;
pub mod planner;
pub mod progress_tracker;

pub use backend::{Backend, DryRunBackend, LocalBackend};
pub use confirm::{Prompt, ScriptedPrompt, StdinPrompt};
pub use executor::{Executor, JobFailure, RunReport, RunStatus};
pub use job::{Job, JobKind, JobPlan};
pub use path_resolver::PathResolver;
pub use planner::{plan, Planner};
pub use progress_tracker::ProgressTracker;
