use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use futures::future::join_all;
use phaseloop_scheduler::{DemoProducer, Scheduler, SchedulerConfig};
use std::time::Duration;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "phaseloop")]
#[command(about = "Phased task scheduler demo", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a random workload and drain it
    Run(RunArgs),
    /// Print the effective scheduler configuration
    Config,
}

#[derive(Args)]
struct RunArgs {
    /// Number of tasks to generate
    #[arg(long, default_value_t = 20)]
    count: usize,
    /// Smallest enqueue delay in milliseconds
    #[arg(long, default_value_t = 100)]
    min_delay: u64,
    /// Largest enqueue delay in milliseconds
    #[arg(long, default_value_t = 800)]
    max_delay: u64,
    /// How long each task works, in milliseconds
    #[arg(long, default_value_t = 5)]
    work_ms: u64,
    /// Seed for a reproducible workload
    #[arg(long)]
    seed: Option<u64>,
    /// Capacity of every queue (overrides PHASELOOP_*_CAPACITY)
    #[arg(long)]
    capacity: Option<usize>,
    /// Exit as soon as the visible queues are empty
    #[arg(long)]
    no_wait: bool,
    /// Print run statistics as JSON
    #[arg(long)]
    json: bool,
}

async fn run(args: RunArgs, mut config: SchedulerConfig) -> Result<()> {
    if let Some(capacity) = args.capacity {
        config = config.with_capacity(capacity);
    }
    if args.no_wait {
        config.await_in_flight = false;
    }

    let producer = DemoProducer::new(args.count, args.min_delay, args.max_delay)?
        .with_work(Duration::from_millis(args.work_ms));
    let plan = match args.seed {
        Some(seed) => producer.plan_seeded(seed),
        None => producer.plan(&mut rand::thread_rng()),
    };

    let scheduler = Scheduler::new(config).context("invalid scheduler configuration")?;
    let handles = producer.spawn_into(&scheduler, &plan)?;
    info!(tasks = handles.len(), "Workload enqueued");

    // Delayed landings report capacity failures through their handles.
    let (stats, landings) = tokio::join!(scheduler.run(), join_all(handles));
    let stats = stats?;
    let mut dropped = 0;
    for err in landings.into_iter().filter_map(Result::err) {
        warn!(error = %err, "Task never reached its queue");
        dropped += 1;
    }

    if args.json {
        let report = serde_json::json!({ "stats": stats, "dropped": dropped });
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!(
            "Executed {} tasks ({} immediate, {} background, {} frame), {} repaints, {} dropped",
            stats.executed(),
            stats.immediate,
            stats.background,
            stats.frame,
            stats.repaints,
            dropped
        );
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = SchedulerConfig::from_env();

    match cli.command {
        Commands::Run(args) => run(args, config).await?,
        Commands::Config => {
            config.validate()?;
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
    }

    Ok(())
}
