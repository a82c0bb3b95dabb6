//! Walk-through of the scheduler: two entries submitted out of order, two
//! advances, counts printed along the way.
#![forbid(unsafe_code)]

use anyhow::{Context, Result};
use clap::Parser;
use jobqueue::{Scheduler, SchedulerConfig};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "jobqueue_demo")]
#[command(about = "Submit two delayed jobs, advance the clock, watch them fire")]
struct Args {
    /// Scheduler capacity (defaults to JOBQUEUE_CAPACITY, then 32).
    #[arg(long)]
    capacity: Option<usize>,

    /// Print the final telemetry snapshot as JSON.
    #[arg(long, default_value_t = false)]
    json: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = match args.capacity {
        Some(capacity) => SchedulerConfig::with_capacity(capacity),
        None => SchedulerConfig::try_from_env().context("reading scheduler config")?,
    };
    let mut sched = Scheduler::from_config(&config)
        .with_context(|| format!("creating scheduler with capacity {}", config.capacity))?;

    let added = sched.submit(10.0, || println!("added first, runs second"));
    println!("job added: {added}");
    let added = sched.submit(5.0, || println!("added second, runs first"));
    println!("job added: {added}");

    println!("job count: {}", sched.pending_count());
    println!("adding 5.0 to time");
    sched.try_advance(5.0)?;
    println!("adding 6.0 to time");
    sched.try_advance(6.0)?;
    println!("job count: {}", sched.pending_count());

    if args.json {
        let snapshot = sched.snapshot().to_json().context("serializing telemetry")?;
        println!("{snapshot}");
    }

    Ok(())
}
