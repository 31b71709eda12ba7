//! Synthetic Transaction Streams
//!
//! Seeded generator for demos and tests. Normal traffic is uniform
//! transfers between random account pairs; injected fraud comes in two
//! shapes:
//!
//! - **Hub**: one account sending to or receiving from many others with
//!   large amounts (a fan-out/fan-in burst)
//! - **Ring**: money passed around a closed cycle of accounts with
//!   near-identical amounts, the pattern that shows up as H1 persistence
//!
//! Inter-arrival times are exponential, so timestamps are strictly
//! ordered and the stream is accepted by the graph store as-is.

use crate::error::{EngineError, Result};
use crate::graph::Transaction;
use chrono::{DateTime, TimeDelta, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Exp, Normal, Uniform};
use serde_json::json;

/// Shape of a generated transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pattern {
    Normal,
    Hub,
    Ring,
}

impl Pattern {
    pub fn as_str(self) -> &'static str {
        match self {
            Pattern::Normal => "normal",
            Pattern::Hub => "hub",
            Pattern::Ring => "ring",
        }
    }
}

/// Generator parameters
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    pub transactions: usize,
    pub accounts: usize,
    /// Probability that a step starts a fraud burst instead of a normal transfer
    pub fraud_rate: f64,
    /// Accounts per laundering ring
    pub ring_size: usize,
    /// Transfers per hub burst
    pub hub_fanout: usize,
    pub mean_interarrival_seconds: f64,
    pub start: DateTime<Utc>,
    /// `None` draws from the thread RNG
    pub seed: Option<u64>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            transactions: 10_000,
            accounts: 50,
            fraud_rate: 0.05,
            ring_size: 5,
            hub_fanout: 8,
            // 10k transfers spread over roughly one day
            mean_interarrival_seconds: 8.64,
            start: DateTime::<Utc>::UNIX_EPOCH,
            seed: None,
        }
    }
}

/// Seeded transaction stream generator
#[derive(Debug)]
pub struct TransactionGenerator {
    config: GeneratorConfig,
    rng: StdRng,
    normal_amount: Uniform<f64>,
    fraud_amount: Uniform<f64>,
    interarrival: Exp<f64>,
    clock: DateTime<Utc>,
    next_id: usize,
}

impl TransactionGenerator {
    pub fn new(config: GeneratorConfig) -> Result<Self> {
        if config.accounts < 2 {
            return Err(EngineError::Config("generator needs at least 2 accounts".into()));
        }
        if !(0.0..=1.0).contains(&config.fraud_rate) {
            return Err(EngineError::Config("fraud_rate must lie in [0, 1]".into()));
        }
        if config.ring_size < 3 || config.ring_size > config.accounts {
            return Err(EngineError::Config(format!(
                "ring_size must lie in [3, {}]",
                config.accounts
            )));
        }
        if config.hub_fanout == 0 {
            return Err(EngineError::Config("hub_fanout must be positive".into()));
        }
        if !config.mean_interarrival_seconds.is_finite() || config.mean_interarrival_seconds <= 0.0 {
            return Err(EngineError::Config("mean_interarrival_seconds must be positive".into()));
        }

        let invalid = |what: &str, e: &dyn std::fmt::Display| EngineError::Config(format!("{what}: {e}"));
        let normal_amount = Uniform::new(10.0, 1000.0).map_err(|e| invalid("normal amount", &e))?;
        let fraud_amount = Uniform::new(5000.0, 50_000.0).map_err(|e| invalid("fraud amount", &e))?;
        let interarrival =
            Exp::new(1.0 / config.mean_interarrival_seconds).map_err(|e| invalid("mean_interarrival_seconds", &e))?;

        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_rng(&mut rand::rng()),
        };

        Ok(Self {
            clock: config.start,
            config,
            rng,
            normal_amount,
            fraud_amount,
            interarrival,
            next_id: 0,
        })
    }

    /// Generate `config.transactions` records in timestamp order.
    pub fn generate(&mut self) -> Vec<(Transaction, Pattern)> {
        let total = self.config.transactions;
        let mut out = Vec::with_capacity(total);

        while out.len() < total {
            if self.rng.random_bool(self.config.fraud_rate) {
                if self.rng.random_bool(0.5) {
                    self.hub_burst(&mut out);
                } else {
                    self.ring_burst(&mut out);
                }
            } else {
                let (from, to) = self.distinct_pair();
                let amount = self.normal_amount.sample(&mut self.rng);
                self.emit(&mut out, from, to, amount, Pattern::Normal);
            }
        }

        out.truncate(total);
        out
    }

    /// Fan-out or fan-in around one account.
    fn hub_burst(&mut self, out: &mut Vec<(Transaction, Pattern)>) {
        let hub = self.rng.random_range(0..self.config.accounts);
        let outgoing = self.rng.random_bool(0.5);

        for _ in 0..self.config.hub_fanout {
            let other = self.other_than(hub);
            let amount = self.fraud_amount.sample(&mut self.rng);
            let (from, to) = if outgoing { (hub, other) } else { (other, hub) };
            self.emit(out, from, to, amount, Pattern::Hub);
        }
    }

    /// One lap around a cycle of distinct accounts, skimming ~1% per hop.
    fn ring_burst(&mut self, out: &mut Vec<(Transaction, Pattern)>) {
        let members = rand::seq::index::sample(&mut self.rng, self.config.accounts, self.config.ring_size).into_vec();
        let mut amount = self.fraud_amount.sample(&mut self.rng);
        let skim = Normal::<f64>::new(0.99, 0.005).ok();

        for i in 0..members.len() {
            let from = members[i];
            let to = members[(i + 1) % members.len()];
            self.emit(out, from, to, amount, Pattern::Ring);
            let factor = skim.map_or(0.99, |d| d.sample(&mut self.rng));
            amount *= factor.clamp(0.9, 1.0);
        }
    }

    fn emit(&mut self, out: &mut Vec<(Transaction, Pattern)>, from: usize, to: usize, amount: f64, pattern: Pattern) {
        let gap = self.interarrival.sample(&mut self.rng);
        self.clock += TimeDelta::milliseconds((gap * 1000.0).round() as i64 + 1);

        let mut tx = Transaction::new(
            format!("tx_{:06}", self.next_id),
            account_name(from),
            account_name(to),
            (amount * 100.0).round() / 100.0,
            self.clock,
        );
        tx.metadata = Some(json!({
            "type": "transfer",
            "currency": "USD",
            "pattern": pattern.as_str(),
        }));
        self.next_id += 1;
        out.push((tx, pattern));
    }

    fn distinct_pair(&mut self) -> (usize, usize) {
        let from = self.rng.random_range(0..self.config.accounts);
        (from, self.other_than(from))
    }

    fn other_than(&mut self, account: usize) -> usize {
        let offset = self.rng.random_range(1..self.config.accounts);
        (account + offset) % self.config.accounts
    }
}

pub fn account_name(index: usize) -> String {
    format!("acc_{index:03}")
}
