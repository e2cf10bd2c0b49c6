//! Glucorisk command-line entry point.
//!
//! # Usage
//!
//! ```bash
//! glucorisk analyze [--input <history.json>] [--model <identity>] [--db <path>] [--config <config.json>]
//! glucorisk train   [--input <history.json>] [--model <identity>] [--db <path>] [--config <config.json>]
//! ```
//!
//! The history is a JSON array of `{"value": <mg/dL>, "timestamp": "<ISO-8601>"}`
//! read from `--input` or stdin. `analyze` prints the risk report as JSON on
//! stdout. Without `--db`, model identities are file paths; with `--db`, they
//! are keys in that SQLite database.

use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use glucorisk::adapters::{FileModelStore, SqliteModelStore, StorageError};
use glucorisk::ports::ModelStore;
use glucorisk::{AnalysisConfig, AnalysisService, RawReading};

const USAGE: &str = "Usage: glucorisk <analyze|train> [--input <path>] [--model <identity>] [--db <path>] [--config <path>]";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Analyze,
    Train,
}

#[derive(Debug)]
struct Args {
    command: Command,
    input: Option<PathBuf>,
    model: Option<String>,
    db: Option<PathBuf>,
    config: Option<PathBuf>,
}

fn parse_args() -> Result<Args> {
    let mut args = std::env::args().skip(1);

    let command = match args.next().as_deref() {
        Some("analyze") => Command::Analyze,
        Some("train") => Command::Train,
        _ => bail!(USAGE),
    };

    let mut parsed = Args {
        command,
        input: None,
        model: None,
        db: None,
        config: None,
    };

    while let Some(arg) = args.next() {
        let Some(value) = args.next().filter(|v| !v.is_empty()) else {
            bail!("missing value for {arg}\n{USAGE}");
        };
        match arg.as_str() {
            "--input" => parsed.input = Some(PathBuf::from(value)),
            "--model" => parsed.model = Some(value),
            "--db" => parsed.db = Some(PathBuf::from(value)),
            "--config" => parsed.config = Some(PathBuf::from(value)),
            other => bail!("unknown argument {other}\n{USAGE}"),
        }
    }

    Ok(parsed)
}

fn read_history(input: Option<&PathBuf>) -> Result<Vec<RawReading>> {
    let content = match input {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("reading history from {}", path.display()))?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("reading history from stdin")?;
            buf
        }
    };

    serde_json::from_str(&content).context("history must be a JSON array of readings")
}

fn run<S>(store: Arc<S>, config: AnalysisConfig, args: &Args) -> Result<()>
where
    S: ModelStore,
    S::Error: Into<StorageError>,
{
    let identity = args
        .model
        .clone()
        .unwrap_or_else(|| config.default_model_identity.clone());
    let service = AnalysisService::new(store, config)?;
    let history = read_history(args.input.as_ref())?;

    match args.command {
        Command::Analyze => {
            let report = service.analyze(&history, &identity);
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Train => {
            let model = service
                .try_train(&history, &identity)
                .with_context(|| format!("training model {identity:?}"))?;
            tracing::info!(
                "Model {:?} trained on {} samples: coefficients={:?}, intercept={:.4}",
                identity,
                model.samples(),
                model.coefficients(),
                model.intercept()
            );
        }
    }

    Ok(())
}

fn main() -> Result<()> {
    // stdout carries the JSON report, so logs go to stderr or a file.
    let log_mode = std::env::var("GLUCORISK_LOG_MODE").unwrap_or_else(|_| "stderr".to_string());

    let (writer, _guard) = if log_mode == "file" {
        let log_file = std::env::var("GLUCORISK_LOG_FILE")
            .unwrap_or_else(|_| "glucorisk.log".to_string());

        if let Some(parent) = std::path::Path::new(&log_file).parent() {
            // Best-effort: a missing directory surfaces as an open error below.
            let _ = std::fs::create_dir_all(parent);
        }

        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)?;
        tracing_appender::non_blocking(file)
    } else {
        tracing_appender::non_blocking(std::io::stderr())
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(writer))
        .init();

    let args = parse_args()?;

    let config = match &args.config {
        Some(path) => AnalysisConfig::from_json_file(path)?.with_env_overrides(),
        None => AnalysisConfig::from_env(),
    };

    match &args.db {
        Some(db) => {
            let store = SqliteModelStore::new(db)
                .with_context(|| format!("opening model database {}", db.display()))?;
            run(Arc::new(store), config, &args)
        }
        None => run(Arc::new(FileModelStore::new()), config, &args),
    }
}
