//! # Error Types Module
//!
//! Questo modulo definisce tutti i tipi di errore custom della libreria.
//!
//! ## Responsabilità:
//! - Definisce `MirrorError` per categorizzare gli errori di planning ed esecuzione
//! - Conserva il contesto completo dei tool esterni falliti (comando, exit code, stderr)
//! - Distingue i fallimenti dei tool dalle violazioni di invarianti interne
//!
//! ## Categorie di errori:
//! - `Io`: Errori di I/O (file non trovati, permessi, etc.)
//! - `ToolFailed`: Tool esterno terminato con exit code non zero
//! - `MissingDependency`: Tool esterno mancante (opusenc, metaflac, ...)
//! - `InvariantViolation`: Bug interno, ad esempio un path fuori dalla destinazione
//! - `Planning`: Enumerazione dell'albero sorgente/destinazione fallita
//! - `Validation`: Parametri di configurazione non validi
//! - `Config`: File di configurazione illeggibile
//!
//! ## Esempio:
//! ```rust,ignore
//! if !target.starts_with(root) {
//!     return Err(MirrorError::InvariantViolation(format!("{} escapes {}", target.display(), root.display())));
//! }
//! ```

use std::path::PathBuf;

/// Custom error types for mirroring
#[derive(thiserror::Error, Debug)]
pub enum MirrorError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Error when calling: {command}\nProcess returned code: {}\nstderr:\n{stderr}", display_code(.code))]
    ToolFailed {
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("Dependency missing: {0}")]
    MissingDependency(String),

    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    #[error("Failed to scan {}: {reason}", .root.display())]
    Planning { root: PathBuf, reason: String },

    #[error("Invalid configuration: {0}")]
    Validation(String),

    #[error("Config file error: {0}")]
    Config(#[from] serde_json::Error),
}

impl MirrorError {
    /// True for errors that indicate a bug rather than a failing tool or filesystem
    pub fn is_invariant_violation(&self) -> bool {
        matches!(self, MirrorError::InvariantViolation(_))
    }
}

fn display_code(code: &Option<i32>) -> String {
    match code {
        Some(code) => code.to_string(),
        None => "terminated by signal".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_failure_message_contains_diagnostics() {
        let err = MirrorError::ToolFailed {
            command: "opusenc in.flac out.ogg".to_string(),
            code: Some(1),
            stderr: "Error parsing input file".to_string(),
        };
        let message = err.to_string();
        assert!(message.contains("opusenc in.flac out.ogg"));
        assert!(message.contains("Process returned code: 1"));
        assert!(message.contains("Error parsing input file"));
        assert!(!err.is_invariant_violation());
    }

    #[test]
    fn test_signal_termination() {
        let err = MirrorError::ToolFailed {
            command: "oggenc".to_string(),
            code: None,
            stderr: String::new(),
        };
        assert!(err.to_string().contains("terminated by signal"));
    }
}
