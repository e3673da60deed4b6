//! Command-line entry points: one-off runs, the daily schedule and artifact inspection.

use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};

use crate::batch::BatchJob;
use crate::config::CollectorConfig;
use crate::logging::TracingLog;
use crate::storage::{ArtifactStore, LocalFileStore, PROCESSED_ARTIFACT, RAW_ARTIFACT};

mod schedule;

#[derive(Parser, Debug)]
#[command(
    name = "fda-collector",
    version,
    about = "Collects openFDA adverse-event reports, filters them and publishes the result"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run one batch now and exit
    Run {
        /// Use demonstration endpoints and allow the placeholder token
        #[arg(long)]
        demo: bool,
    },
    /// Run the batch once a day at a fixed UTC hour
    Schedule {
        /// Use demonstration endpoints and allow the placeholder token
        #[arg(long)]
        demo: bool,
        /// UTC hour (0-23); defaults to FDA_COLLECTOR_SCHEDULE_HOUR or 1
        #[arg(long)]
        hour: Option<u8>,
        /// Trigger one run immediately before waiting for the schedule
        #[arg(long)]
        run_now: bool,
    },
    /// Print a persisted snapshot
    Show {
        #[arg(value_enum)]
        artifact: Artifact,
        /// Business date of the snapshot (YYYY-MM-DD)
        #[arg(long)]
        date: String,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum Artifact {
    Raw,
    Processed,
}

impl Artifact {
    fn prefix(self) -> &'static str {
        match self {
            Self::Raw => RAW_ARTIFACT,
            Self::Processed => PROCESSED_ARTIFACT,
        }
    }
}

pub async fn run(cli: Cli) -> anyhow::Result<String> {
    match cli.command {
        Commands::Run { demo } => {
            let config = CollectorConfig::from_env(demo)?;
            let job = BatchJob::from_config(&config, Arc::new(TracingLog))?;
            let summary = job.run().await?;
            Ok(crate::render::json::to_pretty(&summary)?)
        }
        Commands::Schedule {
            demo,
            hour,
            run_now,
        } => {
            let config = CollectorConfig::from_env(demo)?;
            let hour = match hour {
                Some(h) => crate::config::check_hour(h)?,
                None => config.schedule_hour,
            };
            let job = BatchJob::from_config(&config, Arc::new(TracingLog))?;
            Ok(schedule::run_daily(&job, hour, run_now).await?)
        }
        Commands::Show { artifact, date } => {
            let at = crate::utils::date::parse_cli_date(&date)?;
            let store = LocalFileStore::new(CollectorConfig::data_dir_from_env());
            Ok(store.load(artifact.prefix(), at.date()).await?)
        }
    }
}
