//! # cadence
//!
//! Genre classifier binary: `serve` runs the HTTP service, `crawl`, `clean`
//! and `trim` curate a training set.

#![deny(unsafe_code)]

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use cadence_dataset::{
    CONFIRM_PROMPT, CrawlOptions, TrimOptions, confirm, crawl, execute_clean, plan_clean,
    read_manifest, trim_directory, write_manifest,
};
use cadence_inference::ModelRegistry;
use cadence_server::{CadenceServer, shutdown_signal};
use cadence_settings::{CadenceSettings, load_settings_from_path, settings_path, validate};
use clap::{Parser, Subcommand};
use tracing::info;

/// Music genre classification service and dataset tools.
#[derive(Parser, Debug)]
#[command(name = "cadence", version, about)]
struct Cli {
    /// Settings file. Defaults to `$CADENCE_CONFIG`, then `cadence.json`.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve `POST /predict` over HTTP.
    Serve {
        /// Bind address (overrides settings).
        #[arg(long)]
        host: Option<String>,
        /// Listen port (overrides settings).
        #[arg(long)]
        port: Option<u16>,
    },

    /// Sample audio files per genre directory into a CSV manifest.
    Crawl {
        /// Directory whose subdirectories are genres.
        root: PathBuf,
        /// Manifest to write.
        #[arg(long, short, default_value = "dataset.csv")]
        output: PathBuf,
        /// Files kept per genre.
        #[arg(long, default_value_t = cadence_dataset::crawl::DEFAULT_PER_GENRE)]
        per_genre: usize,
        /// RNG seed for a reproducible sample.
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Delete audio files under a directory that the manifest does not list.
    Clean {
        /// Directory to clean.
        dir: PathBuf,
        /// Manifest written by `crawl`.
        #[arg(long, short, default_value = "dataset.csv")]
        manifest: PathBuf,
        /// Skip the confirmation prompt.
        #[arg(long)]
        force: bool,
    },

    /// Cut every clip to a centred window and write WAV copies.
    Trim {
        /// Directory of clips.
        input: PathBuf,
        /// Output directory. Defaults to `<input>-trimmed`.
        #[arg(long, short)]
        output: Option<PathBuf>,
        /// Window length in seconds.
        #[arg(long, default_value_t = cadence_dataset::trim::DEFAULT_TRIM_SECONDS)]
        seconds: f64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let path = cli.config.clone().unwrap_or_else(settings_path);
    let mut settings = load_settings_from_path(&path)
        .with_context(|| format!("failed to load settings from {}", path.display()))?;
    cadence_core::logging::init_subscriber(&settings.logging.level);

    match cli.command {
        Command::Serve { host, port } => {
            if let Some(host) = host {
                settings.server.host = host;
            }
            if let Some(port) = port {
                settings.server.port = port;
            }
            validate(&settings).context("invalid settings")?;
            serve(settings).await
        }
        Command::Crawl {
            root,
            output,
            per_genre,
            seed,
        } => run_crawl(&root, &output, CrawlOptions { per_genre, seed }),
        Command::Clean {
            dir,
            manifest,
            force,
        } => run_clean(&dir, &manifest, force),
        Command::Trim {
            input,
            output,
            seconds,
        } => run_trim(&input, output, seconds),
    }
}

/// Listen first, then load models in the background until a signal arrives.
async fn serve(settings: CadenceSettings) -> Result<()> {
    let registry = Arc::new(ModelRegistry::new());
    let server = CadenceServer::new(settings, registry);
    let (addr, handle) = server.listen().await.context("failed to bind server")?;
    info!("cadence listening on http://{addr}");

    let _loader = server.load_models_in_background();

    shutdown_signal().await;
    info!("shutting down");
    server.shutdown().drain(vec![handle], None).await;
    info!("shutdown complete");
    Ok(())
}

fn run_crawl(root: &Path, output: &Path, options: CrawlOptions) -> Result<()> {
    if options.per_genre == 0 {
        bail!("--per-genre must be at least 1");
    }
    let manifest = crawl(root, &options)?;
    write_manifest(output, &manifest)?;

    let mut stdout = io::stdout().lock();
    for (genre, count) in manifest.summary() {
        writeln!(stdout, "{genre}: {count}")?;
    }
    writeln!(stdout, "{} files written to {}", manifest.len(), output.display())?;
    Ok(())
}

fn run_clean(dir: &Path, manifest: &Path, force: bool) -> Result<()> {
    let keep = read_manifest(manifest)?;
    let plan = plan_clean(dir, &keep)?;

    let mut stdout = io::stdout().lock();
    if plan.to_delete.is_empty() {
        writeln!(stdout, "nothing to delete in {}", dir.display())?;
        return Ok(());
    }
    writeln!(
        stdout,
        "{} of {} audio files in {} are not in {} and will be deleted.",
        plan.to_delete.len(),
        plan.to_delete.len() + plan.kept,
        dir.display(),
        manifest.display()
    )?;

    if !force && !confirm(&mut io::stdin().lock(), &mut stdout, CONFIRM_PROMPT)? {
        writeln!(stdout, "cancelled")?;
        return Ok(());
    }

    let removed = execute_clean(&plan);
    writeln!(stdout, "deleted {removed} files")?;
    Ok(())
}

fn run_trim(input: &Path, output: Option<PathBuf>, seconds: f64) -> Result<()> {
    if !(seconds.is_finite() && seconds > 0.0) {
        bail!("--seconds must be positive");
    }
    let summary = trim_directory(
        input,
        &TrimOptions {
            seconds,
            output_dir: output,
        },
    )?;
    writeln!(
        io::stdout().lock(),
        "trimmed {} files into {} ({} failed)",
        summary.trimmed,
        summary.output_dir.display(),
        summary.failed
    )?;
    Ok(())
}
