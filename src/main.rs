//! # FLAC Mirror - Main Entry Point
//!
//! Questo è il punto di ingresso principale dell'applicazione.
//!
//! ## Responsabilità:
//! - Parsing degli argomenti della command line con `clap`
//! - Inizializzazione del sistema di logging con `tracing`
//! - Caricamento della configurazione e override con i flag CLI
//! - Verifica dei programmi esterni richiesti
//! - Pianificazione ed esecuzione del mirror, Ctrl-C per cancellare
//!
//! ## Flusso di esecuzione:
//! 1. Parsa gli argomenti CLI
//! 2. Configura il logging (`RUST_LOG`, altrimenti INFO o DEBUG con `--verbose`)
//! 3. Carica `RunOptions` dal file di configurazione e applica i flag
//! 4. Verifica i tool esterni (saltato in dry run)
//! 5. Costruisce il piano ed esegue l'executor
//! 6. Esce con il codice dello stato finale
//!
//! ## Esempio di utilizzo:
//! ```bash
//! flac-mirror ~/Music/flac ~/Music/ogg --codec vorbis --delete --num-threads 8
//! ```

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use flac_mirror::tools::check_requirements;
use flac_mirror::{plan, AlbumArt, Codec, Executor, Overwrite, RunOptions, RunStatus};

#[derive(Parser)]
#[command(name = "flac-mirror")]
#[command(about = "Mirror a FLAC library into a compressed Ogg library")]
struct Args {
    /// Source directory with the FLAC library
    source: PathBuf,

    /// Destination directory for the mirrored library
    destination: PathBuf,

    /// Output codec
    #[arg(long, value_enum)]
    codec: Option<Codec>,

    /// Album art handling
    #[arg(long, value_enum)]
    albumart: Option<AlbumArt>,

    /// Maximum album art width when resizing
    #[arg(long)]
    albumart_max_width: Option<u32>,

    /// Which existing destination files get rewritten
    #[arg(long, value_enum)]
    overwrite: Option<Overwrite>,

    /// Delete destination files with no counterpart in the source
    #[arg(long)]
    delete: bool,

    /// Do not ask before deleting
    #[arg(short, long)]
    yes: bool,

    /// File names copied unchanged (comma separated)
    #[arg(long, value_delimiter = ',')]
    copy_files: Option<Vec<String>>,

    /// Extensions copied unchanged (comma separated)
    #[arg(long, value_delimiter = ',')]
    copy_extensions: Option<Vec<String>>,

    /// Number of parallel jobs (default: available parallelism)
    #[arg(short = 'j', long)]
    num_threads: Option<usize>,

    /// Opus bitrate in kbit/s
    #[arg(long)]
    opus_quality: Option<f32>,

    /// Vorbis quality (-1 to 10)
    #[arg(long, allow_hyphen_values = true)]
    vorbis_quality: Option<i32>,

    /// Dry run - log the planned actions without touching the destination
    #[arg(long)]
    dry_run: bool,

    /// Configuration file (default: <config dir>/flac-mirror/config.json)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Hide the progress bar
    #[arg(long)]
    no_progress: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    /// Apply the flags given on the command line on top of `options`
    fn apply(&self, options: &mut RunOptions) {
        if let Some(codec) = self.codec {
            options.codec = codec;
        }
        if let Some(albumart) = self.albumart {
            options.albumart = albumart;
        }
        if let Some(width) = self.albumart_max_width {
            options.albumart_max_width = width;
        }
        if let Some(overwrite) = self.overwrite {
            options.overwrite = overwrite;
        }
        if let Some(ref names) = self.copy_files {
            options.copy_files = names.clone();
        }
        if let Some(ref extensions) = self.copy_extensions {
            options.copy_extensions = extensions.clone();
        }
        if self.num_threads.is_some() {
            options.workers = self.num_threads;
        }
        if self.opus_quality.is_some() {
            options.opus_quality = self.opus_quality;
        }
        if self.vorbis_quality.is_some() {
            options.vorbis_quality = self.vorbis_quality;
        }
        options.delete |= self.delete;
        options.assume_yes |= self.yes;
        options.dry_run |= self.dry_run;
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let default_level = if args.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let mut options = match args.config.clone().or_else(RunOptions::default_path) {
        Some(path) => {
            debug!("Loading configuration from {}", path.display());
            RunOptions::from_file(&path).await?
        }
        None => RunOptions::default(),
    };
    args.apply(&mut options);
    options.validate()?;

    if !options.dry_run {
        check_requirements(&options)?;
    }

    let job_plan = plan(&args.source, &args.destination, &options)?;

    let executor = Executor::for_options(options).with_progress(!args.no_progress);
    let cancel = executor.cancel_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, stopping pending jobs and finishing running jobs...");
            cancel.cancel();
        }
    });

    let report = executor.execute(job_plan).await?;
    match report.status {
        RunStatus::Completed => info!("Mirror completed"),
        RunStatus::Cancelled => warn!("Mirror cancelled"),
        RunStatus::AbortedByUser => info!("Mirror aborted, no files were changed"),
        RunStatus::Failed(ref failure) => warn!("Mirror stopped after a failure in: {}", failure.job),
    }

    std::process::exit(report.status.exit_code());
}
