//! Ring Injection Demo: baseline traffic, then laundering rings
//!
//! Replays six hours of ordinary transfers to warm the baseline, then a
//! two-hour phase where a share of the traffic runs around closed rings
//! of accounts. Windows are one hour wide and evaluated every 15 minutes.

use anyhow::Result;
use chrono::{DateTime, TimeDelta, Utc};
use topoguard::synthetic::{GeneratorConfig, TransactionGenerator};
use topoguard::{EngineConfig, TopologyEngine, Transaction};

fn phase(start: DateTime<Utc>, transactions: usize, fraud_rate: f64, seed: u64, prefix: &str) -> Result<Vec<Transaction>> {
    let config = GeneratorConfig {
        transactions,
        accounts: 40,
        fraud_rate,
        ring_size: 6,
        mean_interarrival_seconds: 20.0,
        start,
        seed: Some(seed),
        ..GeneratorConfig::default()
    };
    Ok(TransactionGenerator::new(config)?
        .generate()
        .into_iter()
        .map(|(mut tx, _)| {
            tx.transaction_id = format!("{prefix}_{}", tx.transaction_id);
            tx
        })
        .collect())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    println!("═══════════════════════════════════════════════════════════════");
    println!("  TopoGuard: Ring Injection Demo");
    println!("═══════════════════════════════════════════════════════════════\n");

    let start = DateTime::<Utc>::UNIX_EPOCH + TimeDelta::days(19_000);
    let normal = phase(start, 1_080, 0.0, 42, "base")?;
    let attack_start = normal.last().map_or(start, |tx| tx.timestamp);
    let attack = phase(attack_start, 360, 0.25, 43, "attack")?;
    println!("  Baseline phase: {} transactions", normal.len());
    println!("  Attack phase:   {} transactions\n", attack.len());

    let mut config = EngineConfig::default();
    config.graph.window_seconds = 3600;
    let engine = TopologyEngine::new(config)?;

    let step = TimeDelta::minutes(15);
    let mut next_tick = start + step;

    println!("  {:<10} {:>8} {:>8} {:>8}  reason", "window", "topo", "struct", "comb");
    println!("  ─────────────────────────────────────────────────────────────");
    for tx in normal.iter().chain(attack.iter()) {
        while tx.timestamp >= next_tick {
            let report = engine.evaluate_window(next_tick)?;
            let marker = if report.score.is_fraudulent { "🚨" } else { "  " };
            println!(
                "{marker}{:<10} {:>8.3} {:>8.3} {:>8.3}  {}",
                report.window_id,
                report.score.topology_score,
                report.score.structure_score,
                report.score.combined_score,
                report.score.reason
            );
            if let Some(drift) = report.drift {
                println!("    ⚠ CUSUM drift {:.2} (change point ≈ window {})", drift.cusum_value, drift.estimated_change_point);
            }
            next_tick += step;
        }
        engine.insert(tx)?;
    }

    let stats = engine.stats();
    println!("\n═══════════════════════════════════════════════════════════════");
    println!("  Evaluations: {}   Flagged: {}   Drift events: {}", stats.evaluations, stats.flagged_windows, stats.drift_events);
    println!("═══════════════════════════════════════════════════════════════");
    Ok(())
}
