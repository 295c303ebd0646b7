//! # Encoder Module
//!
//! Questo modulo trasforma un singolo file FLAC nel file Ogg di destinazione.
//!
//! ## Responsabilità:
//! - Encoding Opus con `opusenc` o Vorbis con `oggenc`
//! - Estrazione della copertina con `metaflac`
//! - Ottimizzazione/resize della copertina con ImageMagick
//! - Riattacco della copertina (`--picture` per Opus, `METADATA_BLOCK_PICTURE` per Vorbis)
//!
//! ## Policy copertina:
//! - `discard`: nessuna immagine nel file di output
//! - `keep`: immagine originale (Opus la conserva da solo, per Vorbis viene estratta e riattaccata)
//! - `optimize`: JPEG progressivo qualità 85%
//! - `resize`: come `optimize`, limitata a `albumart_max_width`
//!
//! Un FLAC senza blocco PICTURE non è un errore: l'output resta senza copertina.

use crate::config::{AlbumArt, Codec, RunOptions};
use crate::error::MirrorError;
use crate::tools::Tool;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::ffi::OsString;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::debug;

/// Transforms one source file into one destination file
#[async_trait]
pub trait Encoder: Send + Sync {
    async fn encode(
        &self,
        source: &Path,
        destination: &Path,
        options: &RunOptions,
    ) -> Result<(), MirrorError>;
}

/// Encoder shelling out to opus-tools / vorbis-tools / flac / imagemagick
#[derive(Debug, Default, Clone, Copy)]
pub struct ExternalEncoder;

const NO_PICTURE_MARKER: &str = "FLAC file has no PICTURE block";

impl ExternalEncoder {
    pub fn new() -> Self {
        Self
    }

    /// Export the first embedded picture, `None` when there is none
    async fn extract_picture(&self, source: &Path) -> Result<Option<Vec<u8>>, MirrorError> {
        let args = [source.as_os_str(), "--export-picture-to".as_ref(), "-".as_ref()];
        match Tool::Metaflac.run(args, None).await {
            Ok(picture) => Ok(Some(picture)),
            Err(MirrorError::ToolFailed { ref stderr, .. }) if stderr.contains(NO_PICTURE_MARKER) => {
                debug!("No picture in {}", source.display());
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Re-encode a picture as a stripped, progressive JPEG
    async fn process_picture(&self, picture: &[u8], max_width: Option<u32>) -> Result<Vec<u8>, MirrorError> {
        let mut args: Vec<String> = ["-", "-strip", "-interlace", "Plane", "-sampling-factor", "4:2:0", "-colorspace", "sRGB"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        if let Some(width) = max_width {
            args.push("-resize".to_string());
            args.push(format!("{}>", width));
        }
        args.extend(["-quality".to_string(), "85%".to_string(), "jpeg:-".to_string()]);

        Tool::ImageMagick.run(&args, Some(picture)).await
    }

    /// Picture to attach to the output according to the album art policy
    async fn output_picture(&self, source: &Path, options: &RunOptions) -> Result<Option<Vec<u8>>, MirrorError> {
        let max_width = match options.albumart {
            AlbumArt::Discard => return Ok(None),
            AlbumArt::Keep => return self.extract_picture(source).await,
            AlbumArt::Optimize => None,
            AlbumArt::Resize => Some(options.albumart_max_width),
        };

        match self.extract_picture(source).await? {
            Some(picture) => Ok(Some(self.process_picture(&picture, max_width).await?)),
            None => Ok(None),
        }
    }

    async fn encode_opus(&self, source: &Path, destination: &Path, options: &RunOptions) -> Result<(), MirrorError> {
        // opusenc carries the FLAC pictures over by itself unless told otherwise
        let picture = match options.albumart {
            AlbumArt::Keep => None,
            _ => self.output_picture(source, options).await?,
        };

        // Held until opusenc has read it
        let picture_file = match picture {
            Some(bytes) => {
                let mut file = NamedTempFile::with_suffix(".jpg")?;
                file.write_all(&bytes)?;
                file.flush()?;
                Some(file)
            }
            None => None,
        };

        let mut args: Vec<OsString> = Vec::new();
        if let Some(bitrate) = options.opus_quality {
            args.push("--bitrate".into());
            args.push(bitrate.to_string().into());
        }
        args.push(source.into());
        args.push(destination.into());
        if options.albumart != AlbumArt::Keep {
            args.push("--discard-pictures".into());
        }
        if let Some(ref file) = picture_file {
            let mut picture_arg = OsString::from("||||");
            picture_arg.push(file.path());
            args.push("--picture".into());
            args.push(picture_arg);
        }

        Tool::Opusenc.run(&args, None).await?;
        Ok(())
    }

    async fn encode_vorbis(&self, source: &Path, destination: &Path, options: &RunOptions) -> Result<(), MirrorError> {
        let mut args: Vec<OsString> = Vec::new();
        if let Some(quality) = options.vorbis_quality {
            args.push("--quality".into());
            args.push(quality.to_string().into());
        }
        args.push(source.into());
        args.push("-o".into());
        args.push(destination.into());
        Tool::Oggenc.run(&args, None).await?;

        if let Some(picture) = self.output_picture(source, options).await? {
            let comment = format!("METADATA_BLOCK_PICTURE={}", metadata_block_picture_base64(&picture));
            let args = [destination.as_os_str(), "-R".as_ref(), "-a".as_ref()];
            Tool::VorbisComment.run(args, Some(comment.as_bytes())).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl Encoder for ExternalEncoder {
    async fn encode(
        &self,
        source: &Path,
        destination: &Path,
        options: &RunOptions,
    ) -> Result<(), MirrorError> {
        match options.codec {
            Codec::Opus => self.encode_opus(source, destination, options).await,
            Codec::Vorbis => self.encode_vorbis(source, destination, options).await,
        }
    }
}

/// FLAC METADATA_BLOCK_PICTURE for a front cover JPEG with unknown dimensions
pub fn metadata_block_picture(data: &[u8]) -> Vec<u8> {
    const FRONT_COVER: u32 = 3;
    const MIME: &[u8] = b"image/jpeg";

    let mut block = Vec::with_capacity(32 + MIME.len() + data.len());
    block.extend_from_slice(&FRONT_COVER.to_be_bytes());
    block.extend_from_slice(&(MIME.len() as u32).to_be_bytes());
    block.extend_from_slice(MIME);
    // empty description
    block.extend_from_slice(&0u32.to_be_bytes());
    // width, height, depth, palette size
    for _ in 0..4 {
        block.extend_from_slice(&0u32.to_be_bytes());
    }
    block.extend_from_slice(&(data.len() as u32).to_be_bytes());
    block.extend_from_slice(data);
    block
}

/// Base64 form used in Vorbis comments
pub fn metadata_block_picture_base64(data: &[u8]) -> String {
    STANDARD.encode(metadata_block_picture(data))
}
