use std::sync::Arc;

use clap::Parser;
use redis_monitoring::{
    FleetOrchestrator, config::read_config_file, mail::SmtpMailer, storage::MemoryBackend,
    util::get_config_path,
};
use tracing::{info, level_filters::LevelFilter, trace};
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Parser)]
#[command(about = "Ping every Redis server once and mail an alert for the down ones")]
struct Args {
    /// Config file (defaults to $REDIS_MONITOR_CONFIG, then ./redis-monitor.json)
    #[arg(short, long)]
    file: Option<String>,

    /// Do not print the failed servers
    #[arg(long)]
    quiet: bool,
}

fn init() {
    let filter = filter::Targets::new().with_targets(vec![
        ("redis_monitoring", LevelFilter::INFO),
        ("redis_ping", LevelFilter::TRACE),
    ]);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .compact()
                .with_ansi(false),
        )
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    init();

    let args = Args::parse();
    trace!("started with args: {args:?}");

    let config = read_config_file(&get_config_path(args.file.clone()))?;

    // no collectors run, nothing is stored
    let orchestrator = FleetOrchestrator::new(
        config,
        Arc::new(MemoryBackend::new()),
        Arc::new(SmtpMailer::new()),
    );

    let failed = orchestrator.check_fleet().await?;
    info!("{} server(s) down", failed.len());

    if !args.quiet {
        println!("failed servers: {failed:?}");
    }

    Ok(())
}
