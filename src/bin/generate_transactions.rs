//! Write a synthetic transaction stream as JSON.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Parser;
use std::path::PathBuf;
use topoguard::synthetic::{GeneratorConfig, Pattern, TransactionGenerator};
use topoguard::Transaction;

#[derive(Parser, Debug)]
#[command(name = "generate_transactions", about = "Generate sample transaction data")]
struct Args {
    /// Number of transactions
    #[arg(long, default_value_t = 10_000)]
    transactions: usize,

    /// Number of accounts
    #[arg(long, default_value_t = 50)]
    accounts: usize,

    /// Probability of starting a fraud burst (0-1)
    #[arg(long, default_value_t = 0.05)]
    fraud_rate: f64,

    #[arg(long, default_value_t = 5)]
    ring_size: usize,

    #[arg(long)]
    seed: Option<u64>,

    /// First timestamp (RFC 3339); defaults to 24h before now
    #[arg(long)]
    start: Option<DateTime<Utc>>,

    #[arg(long, default_value = "data/sample_transactions.json")]
    output: PathBuf,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let config = GeneratorConfig {
        transactions: args.transactions,
        accounts: args.accounts,
        fraud_rate: args.fraud_rate,
        ring_size: args.ring_size,
        start: args.start.unwrap_or_else(|| Utc::now() - chrono::TimeDelta::hours(24)),
        seed: args.seed,
        ..GeneratorConfig::default()
    };

    let stream = TransactionGenerator::new(config)?.generate();
    let count = |p: Pattern| stream.iter().filter(|(_, q)| *q == p).count();
    let (normal, hub, ring) = (count(Pattern::Normal), count(Pattern::Hub), count(Pattern::Ring));
    let transactions: Vec<Transaction> = stream.into_iter().map(|(tx, _)| tx).collect();

    if let Some(dir) = args.output.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    }
    let json = serde_json::to_string_pretty(&transactions)?;
    std::fs::write(&args.output, json).with_context(|| format!("writing {}", args.output.display()))?;

    println!("Generated {} transactions to {}", transactions.len(), args.output.display());
    println!("  normal: {normal}  hub: {hub}  ring: {ring}");
    Ok(())
}
