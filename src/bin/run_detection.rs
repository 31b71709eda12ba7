//! Score a JSON transaction file with the topological engine.
//!
//! Two modes:
//! - `transaction`: insert and score each transaction against the window
//!   as of that insert (baseline read-only)
//! - `window`: replay the stream and evaluate one window per `--step`
//!   seconds, folding accepted windows into the baseline
//!
//! Input is a JSON array of transaction records with RFC 3339 timestamps.

use anyhow::{Context, Result};
use chrono::TimeDelta;
use clap::{Parser, ValueEnum};
use serde::Serialize;
use std::path::PathBuf;
use topoguard::{AnomalyScore, EngineConfig, TopologyEngine, Transaction, WindowReport};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Mode {
    Transaction,
    Window,
}

#[derive(Parser, Debug)]
#[command(name = "run_detection", about = "Run topological fraud detection on a transaction file")]
struct Args {
    /// Input JSON file
    #[arg(long)]
    input: PathBuf,

    /// Output JSON file
    #[arg(long)]
    output: Option<PathBuf>,

    /// Engine configuration (JSON)
    #[arg(long, env = "TOPOGUARD_CONFIG")]
    config: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = Mode::Window)]
    mode: Mode,

    /// Window evaluation interval in seconds (window mode)
    #[arg(long, default_value_t = 3600)]
    step: i64,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Output {
    Transactions(Vec<AnomalyScore>),
    Windows(Vec<WindowReport>),
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => EngineConfig::from_json_file(path)?,
        None => EngineConfig::default(),
    };
    let raw = std::fs::read_to_string(&args.input)
        .with_context(|| format!("reading {}", args.input.display()))?;
    let mut transactions: Vec<Transaction> =
        serde_json::from_str(&raw).with_context(|| format!("parsing {}", args.input.display()))?;
    transactions.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.transaction_id.cmp(&b.transaction_id)));

    let engine = TopologyEngine::new(config)?;

    println!("═══════════════════════════════════════════════════════════════");
    println!("  TopoGuard: Topological Fraud Detection");
    println!("═══════════════════════════════════════════════════════════════\n");
    println!("  Input: {} ({} transactions)", args.input.display(), transactions.len());
    println!("  Mode:  {:?}\n", args.mode);

    let output = match args.mode {
        Mode::Transaction => Output::Transactions(score_transactions(&engine, &transactions)),
        Mode::Window => {
            anyhow::ensure!(args.step > 0, "--step must be positive");
            Output::Windows(replay_windows(&engine, &transactions, TimeDelta::seconds(args.step))?)
        }
    };

    let stats = engine.stats();
    println!("\n📊 Summary:");
    println!("   Accepted transactions: {}", stats.accepted_transactions);
    println!("   Rejected transactions: {}", stats.rejected_transactions);
    println!("   Evaluations:           {} ({} failed)", stats.evaluations, stats.failed_evaluations);
    println!("   Flagged windows:       {}", stats.flagged_windows);
    println!("   Flagged transactions:  {}", stats.flagged_transactions);
    println!("   Drift events:          {}", stats.drift_events);
    println!("   Baseline windows:      {}", stats.baseline_windows);

    if let Some(path) = &args.output {
        let json = serde_json::to_string_pretty(&output)?;
        std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
        println!("\n✅ Results saved to {}", path.display());
    }

    Ok(())
}

fn score_transactions(engine: &TopologyEngine, transactions: &[Transaction]) -> Vec<AnomalyScore> {
    let mut scores = Vec::with_capacity(transactions.len());
    for (tx, result) in transactions.iter().zip(engine.score_batch(transactions)) {
        match result {
            Ok(score) => {
                if score.is_fraudulent {
                    println!("🚨 FRAUD DETECTED: {} (score: {:.3})", tx.transaction_id, score.combined_score);
                    println!("   Reason: {}", score.reason);
                }
                scores.push(score);
            }
            Err(e) => println!("   skipped {}: {e}", tx.transaction_id),
        }
    }
    scores
}

fn replay_windows(
    engine: &TopologyEngine,
    transactions: &[Transaction],
    step: TimeDelta,
) -> Result<Vec<WindowReport>> {
    let Some(first) = transactions.first() else {
        return Ok(Vec::new());
    };
    let mut next_tick = first.timestamp + step;
    let mut reports = Vec::new();

    for tx in transactions {
        while tx.timestamp >= next_tick {
            reports.push(evaluate(engine, next_tick)?);
            next_tick += step;
        }
        if let Err(e) = engine.insert(tx) {
            println!("   skipped {}: {e}", tx.transaction_id);
        }
    }
    reports.push(evaluate(engine, next_tick)?);
    Ok(reports)
}

fn evaluate(engine: &TopologyEngine, tick: chrono::DateTime<chrono::Utc>) -> Result<WindowReport> {
    let report = engine.evaluate_window(tick)?;
    let marker = if report.score.is_fraudulent { "🚨" } else { "  " };
    println!(
        "{marker} {} [{}] combined={:.3} topo={:.3} struct={:.3}  {}",
        report.window_id,
        report.window_end.format("%Y-%m-%d %H:%M"),
        report.score.combined_score,
        report.score.topology_score,
        report.score.structure_score,
        report.score.reason
    );
    if let Some(drift) = &report.drift {
        println!("   ⚠ drift: CUSUM {:.2}, change point ≈ window {}", drift.cusum_value, drift.estimated_change_point);
    }
    Ok(report)
}
