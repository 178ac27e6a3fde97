mod classifier;
mod cli;
mod config;
mod error;
mod media;
mod progress;
mod report;
mod scoring;
mod types;
mod workflow;

use crate::classifier::{Classifier, HttpClassifier};
use crate::error::MatchError;
use crate::types::config::{validate_endpoint, MatchConfig};
use crate::types::photo::SlotId;
use crate::types::report::MatchReport;
use crate::workflow::{WorkflowHandle, WorkflowSnapshot, WorkflowStage};
use clap::Parser;
use std::path::Path;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

pub mod exit_code {
    pub const SUCCESS: i32 = 0;
    pub const INPUT_REJECTED: i32 = 2;
    pub const RUNTIME_FAILURE: i32 = 3;
}

fn init_logging(verbose: u8, quiet: bool) {
    let level = if quiet {
        "error"
    } else {
        match verbose {
            0 => "warn",
            1 => "info",
            _ => "debug",
        }
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run() -> Result<i32, MatchError> {
    let cli = cli::Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(async move {
        match cli.command {
            cli::Commands::Score(cmd) => score(cmd, cli.quiet).await,
            cli::Commands::Classify(cmd) => classify(cmd).await,
        }
    })
}

fn load_settings(service: &cli::ServiceArgs) -> Result<(MatchConfig, String), MatchError> {
    let root = match &service.config_dir {
        Some(dir) => dir.clone(),
        None => std::env::current_dir()?,
    };
    let loaded = config::load_config(&root)?;
    if loaded.is_none() {
        tracing::info!(
            "no {} found in {}, using defaults",
            config::DEFAULT_CONFIG_FILE,
            root.display()
        );
    }
    let cfg = loaded.unwrap_or_default();
    cfg.validate()?;

    let endpoint = service
        .endpoint
        .clone()
        .or_else(|| cfg.classifier_settings().endpoint)
        .ok_or_else(|| {
            MatchError::ConfigParse(
                "no classifier endpoint: pass --endpoint or set classifier.endpoint".to_string(),
            )
        })?;
    validate_endpoint(&endpoint)?;
    Ok((cfg, endpoint))
}

fn read_photo(path: &Path) -> Result<(Vec<u8>, Option<String>), MatchError> {
    if !path.exists() {
        return Err(MatchError::PathNotFound(path.display().to_string()));
    }
    let bytes = std::fs::read(path)?;
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned());
    Ok((bytes, name))
}

async fn submit(handle: &WorkflowHandle, slot: SlotId, path: &Path) -> Result<(), MatchError> {
    let (bytes, name) = read_photo(path)?;
    handle.submit(slot, bytes, name).await
}

async fn score(cmd: cli::ScoreCommand, quiet: bool) -> Result<i32, MatchError> {
    let (cfg, endpoint) = load_settings(&cmd.service)?;
    let mut settings = cfg.workflow_settings();
    if cmd.no_pause {
        settings = settings.without_pauses();
    }

    let classifier = HttpClassifier::new(endpoint, &cfg.classifier_settings());
    tracing::info!(endpoint = classifier.endpoint(), "using classifier");
    let handle = workflow::spawn(classifier, settings, cfg.scoring_policy(), cmd.seed);

    if let Some(path) = &cmd.reference {
        submit(&handle, SlotId::Reference, path).await?;
    }
    for (index, path) in cmd.candidates.iter().enumerate() {
        submit(&handle, SlotId::Candidate(index), path).await?;
    }

    handle.request_run().await?;
    let watcher = (!quiet).then(|| {
        tokio::spawn(show_progress(
            handle.subscribe(),
            handle.subscribe_progress(),
        ))
    });
    let snapshot = handle.wait_until_finished().await?;
    if let Some(watcher) = watcher {
        watcher.abort();
    }

    if snapshot.stage == WorkflowStage::Failed {
        eprintln!(
            "error: {}",
            snapshot.message.as_deref().unwrap_or("analysis failed")
        );
        return Ok(exit_code::RUNTIME_FAILURE);
    }

    let labels = cmd
        .candidates
        .iter()
        .map(|path| path.display().to_string())
        .collect::<Vec<_>>();
    let reference = cmd.reference.as_ref().map(|path| path.display().to_string());
    let report = MatchReport::new(
        reference,
        &labels,
        &snapshot.classifications,
        &snapshot.ranking,
    );
    let format = match cmd.format {
        cli::ReportFormat::Json => report::OutputFormat::Json,
        cli::ReportFormat::Md => report::OutputFormat::Md,
    };
    println!("{}", report::render(&report, format)?);
    Ok(exit_code::SUCCESS)
}

async fn show_progress(
    mut snapshots: watch::Receiver<WorkflowSnapshot>,
    mut progress: watch::Receiver<f64>,
) {
    let mut stage = snapshots.borrow_and_update().stage;
    eprintln!("{stage}...");
    loop {
        tokio::select! {
            changed = progress.changed() => {
                if changed.is_err() {
                    break;
                }
                let value = *progress.borrow_and_update();
                if value > 0.0 {
                    eprintln!("progress: {value:>3.0}%");
                }
            }
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = snapshots.borrow_and_update().clone();
                if snapshot.stage != stage {
                    stage = snapshot.stage;
                    eprintln!("{stage}...");
                }
                if snapshot.celebrating {
                    eprintln!("match found!");
                }
            }
        }
    }
}

async fn classify(cmd: cli::ClassifyCommand) -> Result<i32, MatchError> {
    let (cfg, endpoint) = load_settings(&cmd.service)?;
    let (bytes, name) = read_photo(&cmd.path)?;
    let slot = media::image_slot(bytes, name.as_deref())?;

    let classifier = HttpClassifier::new(endpoint, &cfg.classifier_settings());
    let classification = classifier.classify(&slot).await;
    println!("{}", serde_json::to_string_pretty(&classification)?);
    Ok(exit_code::SUCCESS)
}

fn main() {
    match run() {
        Ok(code) => {
            if code != 0 {
                std::process::exit(code);
            }
        }
        Err(e) => {
            eprintln!("error: {}", e);
            let code = if e.is_input_rejection() {
                exit_code::INPUT_REJECTED
            } else {
                exit_code::RUNTIME_FAILURE
            };
            std::process::exit(code);
        }
    }
}
