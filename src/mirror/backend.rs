//! # Backend Module
//!
//! Il confine dove i job toccano davvero il filesystem.
//!
//! ## Implementazioni:
//! - `LocalBackend`: crea directory, copia, elimina e delega l'encoding a un `Encoder`
//! - `DryRunBackend`: non fa nulla; il dry run è deciso solo qui
//!
//! I job loggano sempre l'azione prevista e poi chiamano il backend, quindi
//! un dry run percorre esattamente lo stesso codice di un run reale.

use crate::config::RunOptions;
use crate::encoder::Encoder;
use crate::error::MirrorError;
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;

/// Side effects a job can perform
#[async_trait]
pub trait Backend: Send + Sync {
    async fn ensure_parent_dirs(&self, path: &Path) -> Result<(), MirrorError>;

    async fn encode(
        &self,
        source: &Path,
        destination: &Path,
        options: &RunOptions,
    ) -> Result<(), MirrorError>;

    async fn copy_file(&self, source: &Path, destination: &Path) -> Result<(), MirrorError>;

    async fn delete_file(&self, path: &Path) -> Result<(), MirrorError>;
}

/// Backend operating on the local filesystem
pub struct LocalBackend {
    encoder: Arc<dyn Encoder>,
}

impl LocalBackend {
    pub fn new(encoder: Arc<dyn Encoder>) -> Self {
        Self { encoder }
    }
}

#[async_trait]
impl Backend for LocalBackend {
    async fn ensure_parent_dirs(&self, path: &Path) -> Result<(), MirrorError> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    async fn encode(
        &self,
        source: &Path,
        destination: &Path,
        options: &RunOptions,
    ) -> Result<(), MirrorError> {
        self.encoder.encode(source, destination, options).await
    }

    async fn copy_file(&self, source: &Path, destination: &Path) -> Result<(), MirrorError> {
        tokio::fs::copy(source, destination).await?;
        Ok(())
    }

    async fn delete_file(&self, path: &Path) -> Result<(), MirrorError> {
        tokio::fs::remove_file(path).await?;
        Ok(())
    }
}

/// Backend that performs nothing
#[derive(Debug, Default, Clone, Copy)]
pub struct DryRunBackend;

#[async_trait]
impl Backend for DryRunBackend {
    async fn ensure_parent_dirs(&self, _path: &Path) -> Result<(), MirrorError> {
        Ok(())
    }

    async fn encode(
        &self,
        _source: &Path,
        _destination: &Path,
        _options: &RunOptions,
    ) -> Result<(), MirrorError> {
        Ok(())
    }

    async fn copy_file(&self, _source: &Path, _destination: &Path) -> Result<(), MirrorError> {
        Ok(())
    }

    async fn delete_file(&self, _path: &Path) -> Result<(), MirrorError> {
        Ok(())
    }
}
