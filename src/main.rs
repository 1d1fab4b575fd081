use anyhow::Context;
use bank_sim::output::{write_reports, RunReport};
use bank_sim::{LockSelection, Simulation, SimulationConfig};
use clap::Parser;
use std::io::stdout;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "bank-sim")]
#[command(about = "Concurrent account transfers under coarse and fine mutex/rwlock strategies", long_about = None)]
struct Cli {
    /// Number of accounts
    accounts: usize,

    /// Transactions each worker completes
    transactions_per_thread: u64,

    /// Probability, in percent, of preferring a balance query
    percentage: u8,

    /// coarse_mutex, fine_mutex, coarse_rwlock, fine_rwlock, mutex, rwlock or all
    lock: LockSelection,

    /// Number of worker threads
    threads: usize,

    /// Seed for balances and worker draws
    #[arg(long)]
    seed: Option<u64>,

    /// Pin each worker to a core
    #[arg(long)]
    pin_threads: bool,

    /// Write the timing table as CSV to stdout instead of the summary
    #[arg(long)]
    csv: bool,

    #[arg(short, long, default_value = "info")]
    log_level: String,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let mut config = SimulationConfig::new(
        cli.accounts,
        cli.transactions_per_thread,
        cli.percentage,
        cli.lock,
        cli.threads,
    );
    config.seed = cli.seed;
    config.pin_threads = cli.pin_threads;

    let simulation = Simulation::new(config).context("invalid simulation parameters")?;
    let config = simulation.config();
    let budget = config.budget()?;

    if !cli.csv {
        println!("Total size: {}", config.account_count);
        println!("Transactions per thread: {}", config.transactions_per_thread);
        println!("Total transactions: {}", budget.total());
        println!("Total balance transactions: {}", budget.queries());
        println!("Total money transfer transactions: {}", budget.transfers());
    }

    let outcomes = simulation.run()?;

    if cli.csv {
        let reports: Vec<RunReport> = outcomes
            .iter()
            .map(|outcome| RunReport::new(config, outcome))
            .collect();
        write_reports(&reports, stdout())?;
        return Ok(());
    }

    for outcome in &outcomes {
        println!("\n=== Running {} ===", outcome.strategy.title());
        for worker in &outcome.workers {
            println!(
                "Thread {}: money = {}, balance = {}, refused = {}",
                worker.thread, worker.transfers, worker.queries, worker.failed_transfers
            );
        }
        println!("Time taken: {:.6} seconds", outcome.elapsed.as_secs_f64());
    }
    Ok(())
}
