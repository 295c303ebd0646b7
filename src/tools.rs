//! # External Tools Module
//!
//! Questo modulo centralizza la gestione dei programmi esterni usati per l'encoding.
//!
//! ## Responsabilità:
//! - Elenca i tool supportati con il pacchetto che li fornisce
//! - Risolve i tool nel `PATH` di sistema
//! - Calcola quali tool servono per una data configurazione
//! - Esegue un tool catturando stdout/stderr e trasformando gli exit code
//!   non zero in `MirrorError::ToolFailed`
//!
//! ## Process group:
//! Su Unix ogni tool parte nel proprio process group, così un Ctrl-C
//! interrompe solo il mirror e gli encoder in corso finiscono il loro lavoro.
//!
//! ## Esempio:
//! ```rust,ignore
//! let stdout = Tool::Metaflac.run(&["--export-tags-to", "-", "a.flac"], None).await?;
//! ```

use crate::config::{AlbumArt, Codec, RunOptions};
use crate::error::MirrorError;
use std::ffi::{OsStr, OsString};
use std::io::ErrorKind;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// External programs the encoder relies on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tool {
    Opusenc,
    Oggenc,
    Metaflac,
    VorbisComment,
    ImageMagick,
}

impl Tool {
    /// Executable name
    pub fn executable(&self) -> &'static str {
        match self {
            Tool::Opusenc => "opusenc",
            Tool::Oggenc => "oggenc",
            Tool::Metaflac => "metaflac",
            Tool::VorbisComment => "vorbiscomment",
            Tool::ImageMagick => "convert",
        }
    }

    /// Where to get the tool from
    pub fn package_hint(&self) -> &'static str {
        match self {
            Tool::Opusenc => "Part of the package \"opus-tools\" on most distros",
            Tool::Oggenc | Tool::VorbisComment => "Part of the package \"vorbis-tools\" on most distros",
            Tool::Metaflac => "Part of the package \"flac\" on most distros",
            Tool::ImageMagick => "Part of the package \"imagemagick\" on most distros",
        }
    }

    /// Find the executable in the system PATH
    pub fn resolve(&self) -> Option<PathBuf> {
        let executable = if cfg!(windows) {
            format!("{}.exe", self.executable())
        } else {
            self.executable().to_string()
        };

        std::env::split_paths(&std::env::var_os("PATH")?)
            .map(|dir| dir.join(&executable))
            .find(|path| path.is_file())
    }

    pub fn is_available(&self) -> bool {
        self.resolve().is_some()
    }

    /// Run the tool to completion, returning its stdout
    pub async fn run<I, S>(&self, args: I, stdin: Option<&[u8]>) -> Result<Vec<u8>, MirrorError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let args: Vec<OsString> = args.into_iter().map(|a| a.as_ref().to_os_string()).collect();
        run_command(self.executable(), &args, stdin).await.map_err(|e| match e {
            MirrorError::Io(ref io) if io.kind() == ErrorKind::NotFound => {
                MirrorError::MissingDependency(format!("{} ({})", self.executable(), self.package_hint()))
            }
            e => e,
        })
    }
}

/// Spawn `program` in its own process group, feed `stdin` and collect stdout
async fn run_command(program: &str, args: &[OsString], stdin: Option<&[u8]>) -> Result<Vec<u8>, MirrorError> {
    let command_line = std::iter::once(program.to_string())
        .chain(args.iter().map(|a| a.to_string_lossy().into_owned()))
        .collect::<Vec<_>>()
        .join(" ");
    debug!("Calling process: {}", command_line);

    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(if stdin.is_some() { Stdio::piped() } else { Stdio::null() })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    #[cfg(unix)]
    cmd.process_group(0);

    let mut child = cmd.spawn()?;

    // Feed stdin while stdout is drained, the pipe closes when the writer ends
    let writer = match (stdin, child.stdin.take()) {
        (Some(input), Some(mut pipe)) => {
            let input = input.to_vec();
            Some(tokio::spawn(async move { pipe.write_all(&input).await }))
        }
        _ => None,
    };

    let output = child.wait_with_output().await?;
    if !output.status.success() {
        return Err(MirrorError::ToolFailed {
            command: command_line,
            code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        });
    }

    if let Some(writer) = writer {
        match writer.await.map_err(std::io::Error::other)? {
            // The tool succeeded without reading all of its input
            Err(e) if e.kind() == ErrorKind::BrokenPipe => {
                debug!("{} did not read all of its input", program);
            }
            result => result?,
        }
    }

    Ok(output.stdout)
}

/// Tools a run with these options will invoke
pub fn required_tools(options: &RunOptions) -> Vec<Tool> {
    let mut tools = Vec::new();
    let processes_art = matches!(options.albumart, AlbumArt::Optimize | AlbumArt::Resize);

    match options.codec {
        Codec::Opus => tools.push(Tool::Opusenc),
        Codec::Vorbis => {
            tools.push(Tool::Oggenc);
            if options.albumart != AlbumArt::Discard {
                tools.push(Tool::VorbisComment);
            }
        }
    }

    if processes_art || (options.codec == Codec::Vorbis && options.albumart == AlbumArt::Keep) {
        tools.push(Tool::Metaflac);
    }
    if processes_art {
        tools.push(Tool::ImageMagick);
    }

    tools
}

/// Check that every required tool is on the PATH, logging one line per tool
pub fn check_requirements(options: &RunOptions) -> Result<(), MirrorError> {
    info!("Checking program requirements:");
    let mut missing = Vec::new();

    for tool in required_tools(options) {
        match tool.resolve() {
            Some(path) => info!("    {} ({}) [available]", tool.executable(), path.display()),
            None => {
                warn!("    {} [unavailable]", tool.executable());
                warn!("        {}", tool.package_hint());
                missing.push(tool.executable());
            }
        }
    }

    if missing.is_empty() {
        Ok(())
    } else {
        Err(MirrorError::MissingDependency(missing.join(", ")))
    }
}
