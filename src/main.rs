//! flashcard-ocr - extract text from photographed or scanned study pages
//!
//! Runs one batch over the given image files and prints the text of each
//! image in reading order.

use std::collections::HashSet;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use flashcard_ocr::config::{self, AppConfig, EngineBackend};
use flashcard_ocr::create_engine;
use flashcard_ocr::vision::{
    BatchOutcome, BatchRecognizer, ImageTask, RecognitionLevel, RecognitionResult, TaskId,
};

/// flashcard-ocr - batch text extraction for study material
#[derive(Parser, Debug)]
#[command(name = "flashcard-ocr")]
#[command(about = "Extract reading-order text from photographed or scanned pages")]
struct Args {
    /// Image files to recognize
    #[arg(required_unless_present = "write_default_config")]
    images: Vec<PathBuf>,

    /// Config file (defaults to the per-user config file when present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Comma-separated language tags in priority order, e.g. en-US,de-DE
    #[arg(short, long, value_delimiter = ',')]
    languages: Option<Vec<String>>,

    /// Use the fast recognition tier
    #[arg(long)]
    fast: bool,

    /// Disable language-model correction
    #[arg(long)]
    no_correction: bool,

    /// Maximum number of images recognized at once
    #[arg(short = 'j', long)]
    concurrency: Option<usize>,

    /// Longest image edge in pixels handed to the engine
    #[arg(long)]
    max_dimension: Option<u32>,

    /// Recognition backend
    #[arg(long, value_enum)]
    backend: Option<BackendArg>,

    /// Print results as JSON
    #[arg(long)]
    json: bool,

    /// Write the effective configuration to the config file and exit
    #[arg(long)]
    write_default_config: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum BackendArg {
    Auto,
    Windows,
    Noop,
}

impl From<BackendArg> for EngineBackend {
    fn from(value: BackendArg) -> Self {
        match value {
            BackendArg::Auto => EngineBackend::Auto,
            BackendArg::Windows => EngineBackend::Windows,
            BackendArg::Noop => EngineBackend::Noop,
        }
    }
}

/// One entry of `--json` output
#[derive(Serialize)]
struct ImageReport<'a> {
    path: String,
    status: &'static str,
    #[serde(flatten)]
    result: Option<&'a RecognitionResult>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so stdout carries only results
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();

    let (mut app_config, loaded_from) = config::load_or_default(args.config.as_deref())?;
    match &loaded_from {
        Some(path) => info!("Loaded configuration from {:?}", path),
        None => info!("Using default configuration"),
    }
    apply_overrides(&mut app_config, &args);

    if args.write_default_config {
        let path = match args.config.clone() {
            Some(path) => path,
            None => config::default_config_path()?,
        };
        config::save_config(&app_config, &path)?;
        println!("{}", path.display());
        return Ok(());
    }

    let engine = create_engine(app_config.engine.backend)
        .context("Failed to initialize recognition engine")?;

    let (tasks, entries) = load_tasks(&args.images).await;
    if tasks.is_empty() {
        bail!("None of the given images could be read");
    }

    let cancel = CancellationToken::new();
    let ctrl_c_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, finishing images in progress");
            ctrl_c_token.cancel();
        }
    });

    let batch = BatchRecognizer::new(engine);
    let outcome = batch
        .recognize_batch_with_cancel(
            tasks,
            &app_config.recognition,
            |event| {
                info!(
                    "[{}/{} {:.0}%] {} {}",
                    event.completed,
                    event.total,
                    event.fraction() * 100.0,
                    event.id,
                    if event.succeeded { "done" } else { "failed" }
                );
            },
            cancel,
        )
        .await;

    if args.json {
        print_json(&entries, &outcome)?;
    } else {
        print_text(&entries, &outcome);
    }

    if outcome.cancelled() {
        warn!(
            "Batch cancelled; {} images were not processed",
            outcome.not_dispatched().len()
        );
    }

    Ok(())
}

/// Command-line flags take precedence over the config file
fn apply_overrides(app_config: &mut AppConfig, args: &Args) {
    let mut recognition = app_config.recognition.clone();
    if let Some(languages) = &args.languages {
        recognition = recognition.with_languages(languages.iter().cloned());
    }
    if args.fast {
        recognition = recognition.with_recognition_level(RecognitionLevel::Fast);
    }
    if args.no_correction {
        recognition = recognition.with_language_correction(false);
    }
    if let Some(concurrency) = args.concurrency {
        recognition = recognition.with_concurrent_tasks(concurrency);
    }
    if let Some(max_dimension) = args.max_dimension {
        recognition = recognition.with_max_dimension(max_dimension);
    }
    app_config.recognition = recognition;

    if let Some(backend) = args.backend {
        app_config.engine.backend = backend.into();
    }
}

/// Where each input path ended up
struct Entry {
    path: PathBuf,
    /// `None` when the file could not be read
    id: Option<TaskId>,
}

/// Read every file into a task. Unreadable files and repeated paths are
/// reported and skipped.
async fn load_tasks(paths: &[PathBuf]) -> (Vec<ImageTask>, Vec<Entry>) {
    let mut tasks = Vec::with_capacity(paths.len());
    let mut entries = Vec::with_capacity(paths.len());
    let mut seen = HashSet::new();

    for path in paths {
        if !seen.insert(path.clone()) {
            warn!("Skipping repeated path {:?}", path);
            continue;
        }
        match tokio::fs::read(path).await {
            Ok(bytes) => {
                let id = TaskId::new(path.display().to_string());
                tasks.push(ImageTask::from_encoded(id.clone(), bytes));
                entries.push(Entry {
                    path: path.clone(),
                    id: Some(id),
                });
            }
            Err(err) => {
                warn!("Could not read {:?}: {}", path, err);
                entries.push(Entry {
                    path: path.clone(),
                    id: None,
                });
            }
        }
    }

    (tasks, entries)
}

fn status(entry: &Entry, outcome: &BatchOutcome) -> &'static str {
    match &entry.id {
        None => "unreadable",
        Some(id) if outcome.get(id).is_some() => "ok",
        Some(id) if outcome.not_dispatched().contains(id) => "cancelled",
        Some(_) => "failed",
    }
}

fn print_text(entries: &[Entry], outcome: &BatchOutcome) {
    for entry in entries {
        println!("==> {} <==", entry.path.display());
        match entry.id.as_ref().and_then(|id| outcome.get(id)) {
            Some(result) if !result.is_blank() => println!("{}", result.text),
            Some(_) => println!("(no text found)"),
            None => println!("(no text extracted: {})", status(entry, outcome)),
        }
        println!();
    }
}

fn print_json(entries: &[Entry], outcome: &BatchOutcome) -> Result<()> {
    let reports: Vec<ImageReport<'_>> = entries
        .iter()
        .map(|entry| {
            ImageReport {
                path: entry.path.display().to_string(),
                status: status(entry, outcome),
                result: entry.id.as_ref().and_then(|id| outcome.get(id)),
            }
        })
        .collect();

    let json = serde_json::to_string_pretty(&reports).context("Failed to serialize results")?;
    println!("{}", json);
    Ok(())
}
