// src/main.rs
//! Job board tracker — binary entrypoint.

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use jobwatch::config::AppConfig;
use jobwatch::fetch::FetchClient;
use jobwatch::pipeline::{Pipeline, RunSummary};
use jobwatch::registry::Registry;
use jobwatch::relevance::RelevanceEngine;
use jobwatch::report;
use jobwatch::scheduler::{run_scheduler, SchedulerCfg};
use jobwatch::storage::postgres::PostgresStorage;
use jobwatch::storage::Storage;

#[derive(Parser)]
#[command(
    name = "jobwatch",
    version,
    about = "Track employer job boards and surface relevant postings"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a single scrape cycle immediately
    Run,
    /// Start the interval scheduler
    Start,
    /// Render a Markdown report from existing data
    Report,
    /// Add a source to the registry
    Add {
        slug: String,
        /// Display name for the source
        #[arg(short, long)]
        name: Option<String>,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    init_tracing();

    let cli = Cli::parse();
    match cli.command {
        Command::Add { slug, name } => add_source(&slug, name.as_deref()),
        Command::Run => {
            let ctx = RunContext::from_env().await?;
            let summary = ctx.run_once().await?;
            ctx.report(&summary)?;
            Ok(())
        }
        Command::Start => {
            let ctx = RunContext::from_env().await?;
            let cfg = SchedulerCfg {
                interval: std::time::Duration::from_secs(
                    ctx.config.schedule.interval_hours * 3600,
                ),
                jitter_max: std::time::Duration::from_secs(
                    ctx.config.schedule.jitter_max_minutes * 60,
                ),
            };
            let ctx_ref = &ctx;
            run_scheduler(cfg, move || async move {
                let summary = ctx_ref.run_once().await?;
                ctx_ref.report(&summary)?;
                Ok(())
            })
            .await
        }
        Command::Report => {
            let ctx = RunContext::from_env().await?;
            let active = ctx.storage.all_active_jobs().await?;
            let ranked = ctx.relevance.filter_and_rank(active, chrono::Utc::now());
            let summary = RunSummary {
                ranked,
                ..Default::default()
            };
            let path = report::write_markdown_report(&ctx.config.reports_dir, &summary)?;
            println!("Report generated: {}", path.display());
            Ok(())
        }
    }
}

fn add_source(slug: &str, name: Option<&str>) -> anyhow::Result<()> {
    let path = std::env::var("REGISTRY_PATH")
        .unwrap_or_else(|_| jobwatch::config::DEFAULT_REGISTRY_PATH.to_string());
    let path = std::path::Path::new(&path);
    let mut registry = Registry::load(path)?;
    if registry.add(slug, name) {
        registry.save(path)?;
        println!("Added \"{}\" ({slug}) to registry.", name.unwrap_or(slug));
    } else {
        println!("Source with slug \"{slug}\" already exists.");
    }
    Ok(())
}

/// Everything a pipeline run needs, built once per process.
struct RunContext {
    config: AppConfig,
    storage: PostgresStorage,
    board: FetchClient,
    relevance: RelevanceEngine,
    registry: Registry,
}

impl RunContext {
    async fn from_env() -> anyhow::Result<Self> {
        let config = AppConfig::from_env()?;

        let storage = PostgresStorage::connect(&config.database_url)
            .await
            .context("connecting to storage")?;
        storage.init().await.context("initializing storage schema")?;

        let mut relevance =
            RelevanceEngine::from_path(&config.rules_path).context("loading scoring rules")?;
        if let Some(min) = config.min_score {
            relevance.set_min_score(min);
        }

        let registry = Registry::load(&config.registry_path)?;
        let board = FetchClient::new(config.fetch.clone())?;

        Ok(Self {
            config,
            storage,
            board,
            relevance,
            registry,
        })
    }

    async fn run_once(&self) -> anyhow::Result<RunSummary> {
        let pipeline = Pipeline::new(
            &self.board,
            &self.storage,
            &self.relevance,
            &self.registry,
            self.config.fetch.pace_min_ms,
            self.config.fetch.pace_max_ms,
        );
        Ok(pipeline.run_once().await?)
    }

    fn report(&self, summary: &RunSummary) -> anyhow::Result<()> {
        if self.config.cli_output {
            report::print_run_summary(summary);
        }
        if self.config.markdown_report && !summary.changes.is_empty() {
            let path = report::write_markdown_report(&self.config.reports_dir, summary)?;
            tracing::info!(path = %path.display(), "markdown report written");
        }
        Ok(())
    }
}
