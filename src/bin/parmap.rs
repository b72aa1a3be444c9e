//! parmap CLI
//!
//! Runs every block-parallel operation over `1..=N` and prints the
//! results, either on fresh threads per call or on one shared pool.

use std::path::PathBuf;
use std::process;
use std::time::Instant;

use clap::Parser;
use colored::Colorize;
use tracing::info;

use parmap::{Error, Executor, IterativeParallelism, ParallelMapper, PoolConfig};

#[derive(Parser)]
#[command(name = "parmap")]
#[command(about = "Run parallel list operations over 1..=N", long_about = None)]
struct Args {
    /// TOML pool config (threads, queue_capacity, thread_name)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Thread count; overrides the config file
    #[arg(long)]
    threads: Option<usize>,

    /// Only every step-th element takes part
    #[arg(long, default_value = "1")]
    step: usize,

    /// Largest value of the input list
    #[arg(long, default_value = "1000")]
    count: u64,

    /// Run on a shared worker pool instead of threads per call
    #[arg(long)]
    pooled: bool,
}

fn main() {
    let args = Args::parse();

    if let Err(e) = parmap::logging::init("info") {
        eprintln!("Error installing logger: {}", e);
        process::exit(1);
    }

    let mut config = match &args.config {
        Some(path) => match PoolConfig::load(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Error loading {}: {}", path.display(), e);
                process::exit(1);
            }
        },
        None => PoolConfig::default(),
    };
    if let Some(threads) = args.threads {
        config = config.with_threads(threads);
    }

    let values: Vec<u64> = (1..=args.count).collect();
    let started = Instant::now();

    let outcome = if args.pooled {
        run_pooled(&config, values, args.step)
    } else {
        run_all(&IterativeParallelism::new(), config.threads, values, args.step)
    };

    match outcome {
        Ok(()) => {
            println!();
            println!("{} in {:?}", "Done".green().bold(), started.elapsed());
        }
        Err(e) => {
            eprintln!("{} {}", "Error:".red().bold(), e);
            process::exit(1);
        }
    }
}

fn run_pooled(config: &PoolConfig, values: Vec<u64>, step: usize) -> Result<(), Error> {
    let mapper = ParallelMapper::with_config(config)?;
    info!(threads = mapper.threads(), "Started pool");
    let outcome = run_all(
        &IterativeParallelism::with_executor(&mapper),
        config.threads,
        values,
        step,
    );
    mapper.close()?;
    outcome
}

fn run_all<X: Executor>(
    ip: &IterativeParallelism<X>,
    threads: usize,
    values: Vec<u64>,
    step: usize,
) -> Result<(), Error> {
    println!(
        "{} {} values, {} threads, step {}",
        "Input:".cyan().bold(),
        values.len(),
        threads,
        step
    );
    println!();

    let max = ip.maximum(threads, values.clone(), u64::cmp, step)?;
    let min = ip.minimum(threads, values.clone(), u64::cmp, step)?;
    let evens = ip.count(threads, values.clone(), |v: &u64| v % 2 == 0, step)?;
    let all_positive = ip.all(threads, values.clone(), |v: &u64| *v > 0, step)?;
    let any_square = ip.any(threads, values.clone(), |v: &u64| is_square(*v) && *v > 1, step)?;
    let sum = ip.reduce(threads, values.clone(), 0, |a, b| a + b, step)?;
    let digits = ip.map_reduce(
        threads,
        values.clone(),
        |v: &u64| v.to_string().len(),
        0,
        |a, b| a + b,
        step,
    )?;
    let squares = ip.filter(threads, values.clone(), |v: &u64| is_square(*v), step)?;
    let doubled = ip.map(threads, values.clone(), |v: &u64| v * 2, step)?;
    let joined = ip.join(threads, values, step)?;

    print_row("maximum", format!("{:?}", max));
    print_row("minimum", format!("{:?}", min));
    print_row("count(even)", evens.to_string());
    print_row("all(> 0)", all_positive.to_string());
    print_row("any(square > 1)", any_square.to_string());
    print_row("reduce(+)", sum.to_string());
    print_row("map_reduce(digits)", digits.to_string());
    print_row("filter(square)", preview(&squares));
    print_row("map(* 2)", preview(&doubled));
    print_row("join", format!("{} chars", joined.len()));
    Ok(())
}

fn print_row(label: &str, value: String) {
    println!("  {:<20} {}", label.yellow(), value);
}

fn preview(values: &[u64]) -> String {
    const SHOWN: usize = 8;
    if values.len() <= SHOWN {
        format!("{:?}", values)
    } else {
        format!("{:?} ... ({} total)", &values[..SHOWN], values.len())
    }
}

fn is_square(v: u64) -> bool {
    let root = (v as f64).sqrt() as u64;
    (root.saturating_sub(1)..=root + 1).any(|r| r * r == v)
}
