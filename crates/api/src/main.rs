//! Air Quality & Health Pipeline - Main Entry Point

use anyhow::Context;
use api::{init_logging, run_server, Settings};
use clap::{Parser, Subcommand, ValueEnum};
use dataset::{AirQualityRecord, HealthRecord};
use inference_engine::{persist_activity, persist_air_quality};
use std::path::PathBuf;
use storage::ArtifactStore;
use tracing::info;
use training::{train_activity, train_air_quality};

#[derive(Debug, Parser)]
#[command(name = "aqh", version, about = "Air quality and wearable health pipeline")]
struct Cli {
    /// TOML settings file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log one JSON object per event
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Train, evaluate and persist model bundles
    Train {
        #[arg(value_enum, default_value_t = Target::All)]
        target: Target,
    },
    /// Serve predictions and dashboards over HTTP
    Serve {
        #[arg(long)]
        port: Option<u16>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Target {
    Air,
    Health,
    All,
}

fn train(settings: &Settings, target: Target) -> anyhow::Result<()> {
    let store = ArtifactStore::new(&settings.server.artifact_dir);
    let data = &settings.data;

    if matches!(target, Target::Air | Target::All) {
        let records: Vec<AirQualityRecord> =
            dataset::load(&data.air_path, data.air_sample_size, data.seed)
                .context("loading the air quality table")?;
        let run = train_air_quality(&records, &settings.training)
            .context("training the AQI regressor")?;
        let manifest = persist_air_quality(&store, &run)?;
        println!("{}", run.report);
        info!("Saved air quality run {}", manifest.run_id);
    }

    if matches!(target, Target::Health | Target::All) {
        let records: Vec<HealthRecord> =
            dataset::load(&data.health_path, data.health_sample_size, data.seed)
                .context("loading the wearable health table")?;
        let run = train_activity(&records, &settings.training)
            .context("training the activity classifier")?;
        let manifest = persist_activity(&store, &run)?;
        println!("{}", run.report);
        info!("Saved activity run {}", manifest.run_id);
    }

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut settings = Settings::load(cli.config.as_deref()).context("loading settings")?;
    if cli.json_logs {
        settings.logging.json = true;
    }
    init_logging(&settings.logging)?;

    info!("=== Air Quality & Health Pipeline v{} ===", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Command::Train { target } => {
            tokio::task::spawn_blocking(move || train(&settings, target)).await??
        }
        Command::Serve { port } => {
            if let Some(port) = port {
                settings.server.port = port;
            }
            run_server(&settings).await?
        }
    }

    Ok(())
}
