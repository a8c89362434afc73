use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use redis_monitoring::{
    FleetOrchestrator, RunReport,
    config::read_config_file,
    mail::SmtpMailer,
    storage::open_backend,
    util::get_config_path,
};
use tracing::{error, info, level_filters::LevelFilter, trace};
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Parser)]
#[command(about = "Collect commands and statistics from a fleet of Redis servers")]
struct Args {
    /// Config file (defaults to $REDIS_MONITOR_CONFIG, then ./redis-monitor.json)
    #[arg(short, long)]
    file: Option<String>,

    /// Seconds to monitor before shutting down
    #[arg(long, default_value_t = 60)]
    duration: u64,

    /// Do not print the final status
    #[arg(long)]
    quiet: bool,

    /// Trace every processed line
    #[arg(short, long)]
    verbose: bool,
}

fn init(verbose: bool) {
    let level = if verbose {
        LevelFilter::TRACE
    } else {
        LevelFilter::INFO
    };
    let filter = filter::Targets::new().with_targets(vec![
        ("redis_monitoring", level),
        ("redis_monitor", level),
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

    let args = Args::parse();
    init(args.verbose);
    trace!("started with args: {args:?}");

    let config = read_config_file(&get_config_path(args.file.clone()))?;

    let backend = open_backend(&config.storage.clone().unwrap_or_default()).await?;

    let mut orchestrator =
        FleetOrchestrator::new(config, backend.clone(), Arc::new(SmtpMailer::new()));

    let interrupt = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to listen for ctrl-c: {e}");
            std::future::pending::<()>().await;
        }
    };

    let result = orchestrator
        .run(Duration::from_secs(args.duration), interrupt)
        .await;

    if let Err(e) = backend.close().await {
        error!("failed to close storage: {e}");
    }

    let report = result?;
    info!("run finished: {}", report.reason);

    if !args.quiet {
        print_report(&report);
    }

    Ok(())
}

fn print_report(report: &RunReport) {
    println!("failed servers: {:?}", report.failed);
    for summary in &report.collectors {
        println!("{summary}");
    }
    if let Some(storage) = &report.storage {
        println!("{storage}");
    }
    println!("shutting down...");
}
