//! BMS Bot
//!
//! Telegram bot serving battery pack telemetry.

use anyhow::Context;
use bms_bot::bot::{format, standard_commands, BotRunner};
use bms_bot::clock::{Clock, SystemClock};
use bms_bot::config::{generate_default_config, Config, SourceKind};
use bms_bot::integrations::{CsvSource, ReadingSource, SheetsSource};
use bms_bot::interactions::InteractionLog;
use bms_bot::pack::Pack;
use bms_bot::query::QueryService;
use bms_bot::telegram::TelegramClient;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "bms-bot")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Telegram bot for battery pack telemetry")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Config file (default: search the usual locations)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the bot (default)
    Run,

    /// Fetch readings once and print the pack
    Check,

    /// Print a default config file
    Config {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Some(Commands::Config { output }) = &cli.command {
        return write_default_config(output.as_deref());
    }

    let config = match &cli.config {
        Some(path) => Config::load_with_env(path)
            .with_context(|| format!("loading config from {:?}", path))?,
        None => Config::load_default(),
    };

    bms_bot::logging::init_tracing(&config.logging).context("initializing logging")?;
    tracing::info!("BMS Bot v{}", env!("CARGO_PKG_VERSION"));

    config.validate()?;

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let service = Arc::new(build_query_service(&config, Arc::clone(&clock))?);

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Check => check(&service).await,
        _ => run(&config, service, clock).await,
    }
}

fn write_default_config(output: Option<&Path>) -> anyhow::Result<()> {
    let content = generate_default_config();
    match output {
        Some(path) => {
            std::fs::write(path, content).with_context(|| format!("writing {:?}", path))?;
            println!("Wrote default config to {}", path.display());
        }
        None => print!("{}", content),
    }
    Ok(())
}

fn build_query_service(config: &Config, clock: Arc<dyn Clock>) -> anyhow::Result<QueryService> {
    let pack = Pack::with_limits(&config.pack.cells_per_segment, config.limits)?;
    tracing::info!(
        segments = pack.segment_count(),
        cells = pack.cell_count(),
        "Pack topology {:?}",
        pack.topology()
    );

    let source: Arc<dyn ReadingSource> = match config.source.kind {
        SourceKind::Sheets => Arc::new(SheetsSource::new((&config.source.sheets).into())?),
        SourceKind::Csv => Arc::new(CsvSource::new(
            config.source.csv.source_config(pack.segment_count()),
        )),
    };
    tracing::info!(
        source = source.name(),
        interval_minutes = config.refresh.interval_minutes,
        "Reading source ready"
    );

    Ok(QueryService::new(
        pack,
        config.refresh.policy()?,
        source,
        clock,
    ))
}

async fn check(service: &QueryService) -> anyhow::Result<()> {
    let matrix = service.voltage_matrix().await;

    if let Some(outcome) = service.last_outcome().await {
        for failure in &outcome.failures {
            println!(
                "Segment {} not refreshed: {}",
                failure.segment_index + 1,
                failure.reason
            );
        }
    }

    for (index, row) in matrix.value.iter().enumerate() {
        let cells: Vec<String> = row
            .iter()
            .map(|v| {
                if v.is_finite() {
                    format!("{:.0}", v)
                } else {
                    "-".to_string()
                }
            })
            .collect();
        println!("Segment {:>2}: {}", index + 1, cells.join(" "));
    }

    println!("{}", format::pack_summary_message(&service.pack_summary().await));
    for text in format::abnormal_cells_messages(&service.abnormal_cells().await) {
        println!("{}", text);
    }

    Ok(())
}

async fn run(
    config: &Config,
    service: Arc<QueryService>,
    clock: Arc<dyn Clock>,
) -> anyhow::Result<()> {
    let client = TelegramClient::new(config.telegram.client_config()?)?;
    let commands = standard_commands(Arc::clone(&service), config.pack.cells_per_segment.len());

    let interactions = if config.interactions.enabled {
        let log = InteractionLog::open(Path::new(&config.interactions.log_dir), clock.now())
            .context("opening interaction log")?;
        Some(log)
    } else {
        None
    };

    let runner = BotRunner::new(client, commands, interactions, clock);

    runner
        .run(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for ctrl-c: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await?;

    tracing::info!("BMS Bot shutdown complete");
    Ok(())
}
