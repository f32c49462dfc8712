//
// cli.rs
// Image-Tools-rs
//
// Defines the CLI surface with Clap, validates inputs before any file is touched, and drives a batch run.
//

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context};
use clap::{ArgAction, Args, Parser, Subcommand};
use tracing::warn;

use crate::batch::BatchDispatcher;
use crate::cancel::{self, CancellationToken};
use crate::config::BatchConfig;
use crate::models::BatchReport;
use crate::negate::PARALLEL_THRESHOLD;
use crate::operation::{parse_scale_factor, OperationRequest};

/// Command-line interface glue code: defines the available verbs and dispatches to the batch engine.
#[derive(Parser)]
#[command(name = "image-tools")]
#[command(
    about = "Batch image tools: scale, negate, remove or copy every image in a directory",
    long_about = "Batch image tools: scale, negate, remove or copy every image in a directory.\n\
                  Supported extensions: .jpg .jpeg .png .bmp. Press Esc (then Enter on a \
                  line-buffered terminal) or Ctrl-C to stop starting new files."
)]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,
    /// Disable logging
    #[arg(short, long, global = true)]
    pub quiet: bool,
    /// Print the run report as JSON
    #[arg(long, global = true)]
    pub json: bool,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Stretch every image by FACTOR (bilinear) and overwrite it
    Scale {
        #[command(flatten)]
        batch: BatchArgs,
        /// Positive stretch factor, e.g. 2.0 or 0.5
        #[arg(value_parser = parse_scale_factor)]
        factor: f64,
    },
    /// Replace every image with its negative
    Negate {
        #[command(flatten)]
        batch: BatchArgs,
    },
    /// Delete every image
    Remove {
        #[command(flatten)]
        batch: BatchArgs,
    },
    /// Copy every image into TARGET (created if missing)
    Copy {
        #[command(flatten)]
        batch: BatchArgs,
        target: PathBuf,
    },
}

#[derive(Args, Debug, Clone)]
pub struct BatchArgs {
    /// Directory holding the images
    pub source: PathBuf,
    /// Descend into subdirectories
    #[arg(short = 'r', long = "sub")]
    pub recursive: bool,
    /// Batch worker count (0 = number of CPUs)
    #[arg(long, env = "IMAGE_TOOLS_WORKERS", default_value_t = 0)]
    pub workers: usize,
    /// Workers per large image when negating (0 = number of CPUs)
    #[arg(long, env = "IMAGE_TOOLS_IMAGE_WORKERS", default_value_t = 0)]
    pub image_workers: usize,
    /// Pixel count from which negation is split across workers
    #[arg(long, env = "IMAGE_TOOLS_PARALLEL_THRESHOLD", default_value_t = PARALLEL_THRESHOLD)]
    pub parallel_threshold: u64,
    /// Seconds to wait for submitted files before giving up on them
    #[arg(long, env = "IMAGE_TOOLS_TIMEOUT_SECS", default_value_t = 3600)]
    pub timeout_secs: u64,
}

impl BatchArgs {
    pub fn config(&self) -> BatchConfig {
        BatchConfig {
            workers: self.workers,
            image_workers: self.image_workers,
            parallel_threshold: self.parallel_threshold,
            completion_timeout: Duration::from_secs(self.timeout_secs),
            ..BatchConfig::default()
        }
    }
}

impl Commands {
    fn batch(&self) -> &BatchArgs {
        match self {
            Commands::Scale { batch, .. }
            | Commands::Negate { batch }
            | Commands::Remove { batch }
            | Commands::Copy { batch, .. } => batch,
        }
    }

    /// Split into the shared batch arguments and a validated operation.
    ///
    /// The source is checked first; the copy target is only created once it passes.
    pub fn into_request(self) -> anyhow::Result<(BatchArgs, OperationRequest)> {
        validate_source_directory(&self.batch().source)?;
        Ok(match self {
            Commands::Scale { batch, factor } => (batch, OperationRequest::scale(factor)?),
            Commands::Negate { batch } => (batch, OperationRequest::Negate),
            Commands::Remove { batch } => (batch, OperationRequest::Delete),
            Commands::Copy { batch, target } => {
                let target_dir = prepare_target_directory(&target)?;
                (batch, OperationRequest::Copy { target_dir })
            }
        })
    }
}

pub async fn run() -> anyhow::Result<()> {
    // Parse the raw CLI arguments once, validate everything, then hand off to the dispatcher.
    let cli = Cli::parse();
    setup_logging(cli.verbose, cli.quiet);

    let (batch, operation) = cli.command.into_request()?;
    let source = batch.source.clone();
    let config = batch.config();

    let token = CancellationToken::new();
    cancel::spawn_key_listener(std::io::stdin(), token.clone(), config.cancel_key)
        .context("Failed to start the cancel key listener")?;
    spawn_interrupt_handler(token.clone());

    let dispatcher = BatchDispatcher::new(operation, &config, token)?;
    let recursive = batch.recursive;
    let report = tokio::task::spawn_blocking(move || dispatcher.run(&source, recursive))
        .await
        .context("Batch task did not complete")?;

    print_report(&report, cli.json)
}

pub fn validate_source_directory(path: &Path) -> anyhow::Result<PathBuf> {
    if !path.is_dir() {
        bail!("Source {:?} does not exist or is not a directory", path);
    }
    Ok(path.to_path_buf())
}

/// Make sure the copy target exists as a directory, creating it if needed.
pub fn prepare_target_directory(path: &Path) -> anyhow::Result<PathBuf> {
    if !path.exists() {
        fs::create_dir_all(path)
            .with_context(|| format!("Failed to create target directory {:?}", path))?;
    }
    if !path.is_dir() {
        bail!("Target {:?} is not a directory", path);
    }
    Ok(path.to_path_buf())
}

/// First Ctrl-C cancels cooperatively; a second one exits at once.
fn spawn_interrupt_handler(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        if token.cancel() {
            warn!("interrupt received, finishing files already started (Ctrl-C again to exit)");
        }
        if tokio::signal::ctrl_c().await.is_ok() {
            std::process::exit(130);
        }
    });
}

fn print_report(report: &BatchReport, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    println!(
        "{} on {:?} | workers: {}",
        report.operation, report.source, report.workers
    );
    println!("  Submitted: {}", report.submitted);
    println!("  Processed: {}", report.processed);
    println!("  Skipped:   {}", report.skipped);
    println!("  Failed:    {}", report.failed);
    if report.timed_out {
        println!("  Abandoned: {} (completion wait expired)", report.abandoned);
    }
    if report.cancelled {
        println!("  Cancelled by user.");
    }
    for failure in &report.failures {
        println!("  Error in {:?}: {}", failure.path, failure.message);
    }
    Ok(())
}

fn setup_logging(verbose: u8, quiet: bool) {
    if quiet {
        return;
    }

    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        match verbose {
            0 => tracing_subscriber::EnvFilter::new("warn"),
            1 => tracing_subscriber::EnvFilter::new("info"),
            2 => tracing_subscriber::EnvFilter::new("debug"),
            _ => tracing_subscriber::EnvFilter::new("trace"),
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use std::ffi::OsString;
    use tempfile::tempdir;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn scale_parses_factor_and_flags() {
        let dir = tempdir().expect("tmpdir");
        let args: Vec<OsString> = vec![
            "image-tools".into(),
            "scale".into(),
            dir.path().into(),
            "2.5".into(),
            "--sub".into(),
            "--workers".into(),
            "3".into(),
        ];
        let cli = Cli::try_parse_from(args).expect("parse");
        let (batch, operation) = cli.command.into_request().expect("request");
        assert!(batch.recursive);
        assert_eq!(batch.config().workers, 3);
        assert_eq!(operation, OperationRequest::Scale { factor: 2.5 });
    }

    #[test]
    fn non_positive_factor_is_rejected_by_the_parser() {
        assert!(Cli::try_parse_from(["image-tools", "scale", "photos", "0"]).is_err());
        assert!(Cli::try_parse_from(["image-tools", "scale", "photos", "abc"]).is_err());
    }

    #[test]
    fn copy_creates_missing_target() {
        let dir = tempdir().expect("tmpdir");
        let target = dir.path().join("a").join("b");
        let args: Vec<OsString> = vec![
            "image-tools".into(),
            "copy".into(),
            dir.path().into(),
            target.clone().into(),
        ];
        let cli = Cli::try_parse_from(args).expect("parse");
        let (_, operation) = cli.command.into_request().expect("request");
        assert!(target.is_dir());
        assert_eq!(operation, OperationRequest::Copy { target_dir: target });
    }

    #[test]
    fn missing_source_fails_before_target_is_created() {
        let dir = tempdir().expect("tmpdir");
        let target = dir.path().join("out").join("new");
        let args: Vec<OsString> = vec![
            "image-tools".into(),
            "copy".into(),
            dir.path().join("missing").into(),
            target.clone().into(),
        ];
        let cli = Cli::try_parse_from(args).expect("parse");
        assert!(cli.command.into_request().is_err());
        assert!(!dir.path().join("out").exists());
    }

    #[test]
    fn target_that_is_a_file_is_fatal() {
        let dir = tempdir().expect("tmpdir");
        let file = dir.path().join("taken");
        fs::write(&file, b"x").unwrap();
        assert!(prepare_target_directory(&file).is_err());
    }

    #[test]
    fn source_must_be_a_directory() {
        let dir = tempdir().expect("tmpdir");
        assert!(validate_source_directory(dir.path()).is_ok());
        assert!(validate_source_directory(&dir.path().join("missing")).is_err());
    }
}
