//! Sliding-window transaction graph.
//!
//! Accounts live in an arena addressed by [`AccountHandle`]; edges are a
//! flat list in arrival order. Expiry is a `retain` over that list, and
//! accounts are never removed from the arena, only hidden from snapshots
//! while they have no in-window edges.
//!
//! Once a window has been set by [`GraphStore::advance`], inserts dated
//! before its start are rejected, so every retained edge lies inside the
//! window. Transaction ids are remembered until their timestamp leaves
//! the window; a replay of an expired record is then rejected as outside
//! the window rather than as a duplicate.

use super::types::{AccountView, EdgeView, Transaction, WindowedGraph};
use crate::config::GraphConfig;
use crate::error::ValidationError;
use chrono::{DateTime, TimeDelta, Utc};
use std::collections::HashMap;

/// Stable index of an account in the store's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AccountHandle(u32);

impl AccountHandle {
    fn index(self) -> usize {
        self.0 as usize
    }

    /// Handle for the arena slot at `len`, if it fits in a `u32`.
    fn for_slot(len: usize) -> Option<Self> {
        u32::try_from(len).ok().map(Self)
    }
}

/// `t - delta`, clamped at the earliest representable instant.
fn saturating_before(t: DateTime<Utc>, delta: TimeDelta) -> DateTime<Utc> {
    t.checked_sub_signed(delta).unwrap_or(DateTime::<Utc>::MIN_UTC)
}

#[derive(Debug, Clone)]
struct Account {
    id: String,
    total_volume: f64,
    first_seen: DateTime<Utc>,
    last_seen: DateTime<Utc>,
    degree: usize,
}

#[derive(Debug, Clone)]
struct TransactionEdge {
    transaction_id: String,
    from: AccountHandle,
    to: AccountHandle,
    amount: f64,
    timestamp: DateTime<Utc>,
}

/// Outcome of an accepted insert.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InsertOutcome {
    /// Accounts created by this insert (0, 1 or 2).
    pub new_accounts: usize,
    /// Oldest edges evicted to stay within `max_edges`.
    pub evicted_edges: usize,
}

/// Outcome of a window advance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdvanceReport {
    pub expired_edges: usize,
    /// Accounts whose last in-window edge expired.
    pub dropped_accounts: usize,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
}

/// Owner of the mutable windowed graph state.
///
/// Memory is bounded by `max_edges` for edges and by the ids whose
/// timestamp is still inside the window. The account arena grows with
/// the number of distinct accounts ever seen.
#[derive(Debug, Clone)]
pub struct GraphStore {
    config: GraphConfig,
    accounts: Vec<Account>,
    handles: HashMap<String, AccountHandle>,
    edges: Vec<TransactionEdge>,
    /// Id → timestamp of every transaction not yet past the window start.
    seen_ids: HashMap<String, DateTime<Utc>>,
    latest_timestamp: Option<DateTime<Utc>>,
    window_end: Option<DateTime<Utc>>,
    version: u64,
}

impl GraphStore {
    pub fn new(config: GraphConfig) -> Self {
        Self {
            config,
            accounts: Vec::new(),
            handles: HashMap::new(),
            edges: Vec::new(),
            seen_ids: HashMap::new(),
            latest_timestamp: None,
            window_end: None,
            version: 0,
        }
    }

    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    /// Validate and add a transaction. On error nothing is modified.
    pub fn insert(&mut self, tx: &Transaction) -> Result<InsertOutcome, ValidationError> {
        self.validate(tx)?;

        let accounts_before = self.accounts.len();
        let from = self.handle_for(&tx.from_account, tx.timestamp)?;
        let to = self.handle_for(&tx.to_account, tx.timestamp)?;

        for handle in [from, to] {
            let account = &mut self.accounts[handle.index()];
            account.total_volume += tx.amount;
            account.degree += 1;
            if tx.timestamp < account.first_seen {
                account.first_seen = tx.timestamp;
            }
            if tx.timestamp > account.last_seen {
                account.last_seen = tx.timestamp;
            }
        }

        self.edges.push(TransactionEdge {
            transaction_id: tx.transaction_id.clone(),
            from,
            to,
            amount: tx.amount,
            timestamp: tx.timestamp,
        });
        self.seen_ids.insert(tx.transaction_id.clone(), tx.timestamp);
        self.latest_timestamp = Some(match self.latest_timestamp {
            Some(latest) => latest.max(tx.timestamp),
            None => tx.timestamp,
        });
        self.version += 1;

        let evicted_edges = self.enforce_capacity();

        Ok(InsertOutcome {
            new_accounts: self.accounts.len() - accounts_before,
            evicted_edges,
        })
    }

    fn validate(&self, tx: &Transaction) -> Result<(), ValidationError> {
        if tx.transaction_id.is_empty() {
            return Err(ValidationError::EmptyIdentifier { field: "transaction_id" });
        }
        if tx.from_account.is_empty() {
            return Err(ValidationError::EmptyIdentifier { field: "from_account" });
        }
        if tx.to_account.is_empty() {
            return Err(ValidationError::EmptyIdentifier { field: "to_account" });
        }
        if !tx.amount.is_finite() {
            return Err(ValidationError::NonFiniteAmount {
                id: tx.transaction_id.clone(),
            });
        }
        if tx.amount < 0.0 {
            return Err(ValidationError::NegativeAmount {
                id: tx.transaction_id.clone(),
                amount: tx.amount,
            });
        }
        if tx.from_account == tx.to_account {
            return Err(ValidationError::SelfTransfer {
                id: tx.transaction_id.clone(),
                account: tx.from_account.clone(),
            });
        }
        if self.seen_ids.contains_key(&tx.transaction_id) {
            return Err(ValidationError::DuplicateTransaction(tx.transaction_id.clone()));
        }
        if let Some(window_start) = self.window_start() {
            if tx.timestamp < window_start {
                return Err(ValidationError::OutsideWindow {
                    id: tx.transaction_id.clone(),
                    timestamp: tx.timestamp,
                    window_start,
                });
            }
        }
        if let Some(latest) = self.latest_timestamp {
            if tx.timestamp < saturating_before(latest, self.config.clock_skew()) {
                return Err(ValidationError::OutOfOrder {
                    id: tx.transaction_id.clone(),
                    timestamp: tx.timestamp,
                    latest,
                });
            }
        }

        // Both endpoints must get a handle, or neither is created.
        let new_accounts = [&tx.from_account, &tx.to_account]
            .into_iter()
            .filter(|id| !self.handles.contains_key(id.as_str()))
            .count();
        if new_accounts > 0 && AccountHandle::for_slot(self.accounts.len() + new_accounts - 1).is_none() {
            let account = if self.handles.contains_key(&tx.from_account) {
                &tx.to_account
            } else {
                &tx.from_account
            };
            return Err(ValidationError::AccountLimit {
                account: account.clone(),
            });
        }
        Ok(())
    }

    fn handle_for(&mut self, id: &str, seen_at: DateTime<Utc>) -> Result<AccountHandle, ValidationError> {
        if let Some(&handle) = self.handles.get(id) {
            return Ok(handle);
        }
        let handle = AccountHandle::for_slot(self.accounts.len()).ok_or_else(|| ValidationError::AccountLimit {
            account: id.to_string(),
        })?;
        self.accounts.push(Account {
            id: id.to_string(),
            total_volume: 0.0,
            first_seen: seen_at,
            last_seen: seen_at,
            degree: 0,
        });
        self.handles.insert(id.to_string(), handle);
        Ok(handle)
    }

    /// Drop the earliest-arrived edges beyond `max_edges`.
    fn enforce_capacity(&mut self) -> usize {
        let excess = self.edges.len().saturating_sub(self.config.max_edges);
        if excess == 0 {
            return 0;
        }
        for edge in self.edges.drain(..excess) {
            self.accounts[edge.from.index()].degree -= 1;
            self.accounts[edge.to.index()].degree -= 1;
        }
        excess
    }

    /// Slide the window to end at `now`, expiring edges older than
    /// `now - window` and hiding accounts left without edges.
    pub fn advance(&mut self, now: DateTime<Utc>) -> Result<AdvanceReport, ValidationError> {
        let window_end = match self.window_end {
            Some(current) if now < saturating_before(current, self.config.clock_skew()) => {
                return Err(ValidationError::ClockRegression {
                    requested: now,
                    current,
                });
            }
            Some(current) => current.max(now),
            None => now,
        };
        let window_start = saturating_before(window_end, self.config.window());

        let active_before = self.active_account_count();
        let edges_before = self.edges.len();

        let accounts = &mut self.accounts;
        self.edges.retain(|edge| {
            if edge.timestamp >= window_start {
                return true;
            }
            accounts[edge.from.index()].degree -= 1;
            accounts[edge.to.index()].degree -= 1;
            false
        });

        let expired_edges = edges_before - self.edges.len();
        self.seen_ids.retain(|_, ts| *ts >= window_start);
        self.window_end = Some(window_end);
        if expired_edges > 0 {
            self.version += 1;
        }

        Ok(AdvanceReport {
            expired_edges,
            dropped_accounts: active_before - self.active_account_count(),
            window_start,
            window_end,
        })
    }

    /// Copy the current window into an immutable graph.
    pub fn snapshot(&self) -> WindowedGraph {
        let mut active: Vec<&Account> = self.accounts.iter().filter(|a| a.degree > 0).collect();
        active.sort_by(|a, b| a.id.cmp(&b.id));

        let mut position: HashMap<&str, usize> = HashMap::with_capacity(active.len());
        for (idx, account) in active.iter().enumerate() {
            position.insert(account.id.as_str(), idx);
        }

        let accounts: Vec<AccountView> = active
            .iter()
            .map(|a| AccountView {
                id: a.id.clone(),
                total_volume: a.total_volume,
                first_seen: a.first_seen,
                last_seen: a.last_seen,
                degree: a.degree,
            })
            .collect();

        let mut edges: Vec<EdgeView> = self
            .edges
            .iter()
            .map(|e| EdgeView {
                transaction_id: e.transaction_id.clone(),
                from: position[self.accounts[e.from.index()].id.as_str()],
                to: position[self.accounts[e.to.index()].id.as_str()],
                amount: e.amount,
                timestamp: e.timestamp,
            })
            .collect();
        edges.sort_by(|a, b| {
            a.timestamp
                .cmp(&b.timestamp)
                .then_with(|| a.transaction_id.cmp(&b.transaction_id))
        });

        // Inserts may run ahead of the last advance.
        let window_end = self.window_end.max(self.latest_timestamp);
        let window_start = self
            .window_start()
            .or_else(|| window_end.map(|end| saturating_before(end, self.config.window())));

        WindowedGraph::from_parts(accounts, edges, window_start, window_end, self.version)
    }

    /// Accounts with at least one in-window edge.
    pub fn active_account_count(&self) -> usize {
        self.accounts.iter().filter(|a| a.degree > 0).count()
    }

    /// Accounts ever seen, including isolated ones.
    pub fn known_account_count(&self) -> usize {
        self.accounts.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn latest_timestamp(&self) -> Option<DateTime<Utc>> {
        self.latest_timestamp
    }

    /// End of the window as of the last `advance`.
    pub fn window_end(&self) -> Option<DateTime<Utc>> {
        self.window_end
    }

    /// Start of the window as of the last `advance`; earlier inserts are rejected.
    pub fn window_start(&self) -> Option<DateTime<Utc>> {
        self.window_end
            .map(|end| saturating_before(end, self.config.window()))
    }

    /// Transaction ids currently remembered for duplicate detection.
    pub fn remembered_ids(&self) -> usize {
        self.seen_ids.len()
    }

    /// Incremented on every mutation that changes the window content.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Handle of a known account.
    pub fn handle(&self, id: &str) -> Option<AccountHandle> {
        self.handles.get(id).copied()
    }

    /// In-window degree of a known account.
    pub fn degree(&self, id: &str) -> Option<usize> {
        self.handle(id).map(|h| self.accounts[h.index()].degree)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn store(window_seconds: i64) -> GraphStore {
        GraphStore::new(GraphConfig {
            window_seconds,
            clock_skew_seconds: 10,
            max_edges: 100,
        })
    }

    #[test]
    fn test_insert_creates_accounts_and_edge() {
        let mut s = store(3600);
        let outcome = s.insert(&Transaction::new("t1", "A", "B", 50.0, t(0))).unwrap();
        assert_eq!(outcome.new_accounts, 2);
        assert_eq!(s.edge_count(), 1);
        assert_eq!(s.degree("A"), Some(1));

        let outcome = s.insert(&Transaction::new("t2", "A", "B", 25.0, t(1))).unwrap();
        assert_eq!(outcome.new_accounts, 0);
        assert_eq!(s.edge_count(), 2, "parallel edges are kept distinct");

        let g = s.snapshot();
        assert_eq!(g.node_count(), 2);
        assert_eq!(g.edge_count(), 2);
        assert!((g.pair_weights()[&(0, 1)] - 75.0).abs() < 1e-12);
    }

    #[test]
    fn test_rejections_leave_state_unchanged() {
        let mut s = store(3600);
        s.insert(&Transaction::new("t1", "A", "B", 10.0, t(100))).unwrap();
        let before = s.snapshot();

        assert!(matches!(
            s.insert(&Transaction::new("t1", "C", "D", 10.0, t(101))),
            Err(ValidationError::DuplicateTransaction(_))
        ));
        assert!(matches!(
            s.insert(&Transaction::new("t2", "A", "B", -1.0, t(101))),
            Err(ValidationError::NegativeAmount { .. })
        ));
        assert!(matches!(
            s.insert(&Transaction::new("t3", "A", "A", 1.0, t(101))),
            Err(ValidationError::SelfTransfer { .. })
        ));
        assert!(matches!(
            s.insert(&Transaction::new("t4", "A", "B", f64::NAN, t(101))),
            Err(ValidationError::NonFiniteAmount { .. })
        ));
        assert!(matches!(
            s.insert(&Transaction::new("", "A", "B", 1.0, t(101))),
            Err(ValidationError::EmptyIdentifier { field: "transaction_id" })
        ));
        assert!(matches!(
            s.insert(&Transaction::new("t5", "A", "B", 1.0, t(50))),
            Err(ValidationError::OutOfOrder { .. })
        ));

        assert_eq!(s.snapshot(), before);
        assert_eq!(s.known_account_count(), 2);
    }

    #[test]
    fn test_skew_tolerance_accepts_small_reordering() {
        let mut s = store(3600);
        s.insert(&Transaction::new("t1", "A", "B", 1.0, t(100))).unwrap();
        assert!(s.insert(&Transaction::new("t2", "B", "C", 1.0, t(95))).is_ok());
    }

    #[test]
    fn test_advance_expires_edges_and_drops_isolated_accounts() {
        let mut s = store(100);
        s.insert(&Transaction::new("old", "A", "B", 10.0, t(0))).unwrap();
        s.insert(&Transaction::new("new", "B", "C", 10.0, t(150))).unwrap();

        assert!(s.snapshot().contains_transaction("old"));

        let report = s.advance(t(200)).unwrap();
        assert_eq!(report.expired_edges, 1);
        assert_eq!(report.dropped_accounts, 1);

        let g = s.snapshot();
        assert!(!g.contains_transaction("old"));
        assert!(g.contains_transaction("new"));
        assert_eq!(g.account_index("A"), None);
        assert_eq!(s.known_account_count(), 3, "arena keeps isolated accounts");
        assert_eq!(s.degree("A"), Some(0));
    }

    #[test]
    fn test_advance_rejects_clock_regression() {
        let mut s = store(100);
        s.advance(t(500)).unwrap();
        assert!(matches!(
            s.advance(t(100)),
            Err(ValidationError::ClockRegression { .. })
        ));
        assert!(s.advance(t(495)).is_ok());
        assert_eq!(s.window_end(), Some(t(500)));
    }

    #[test]
    fn test_insert_before_window_start_rejected() {
        let mut s = store(100);
        s.insert(&Transaction::new("a", "A", "B", 1.0, t(0))).unwrap();
        s.advance(t(1_000)).unwrap();
        let before = s.snapshot();

        let err = s.insert(&Transaction::new("b", "C", "D", 1.0, t(5))).unwrap_err();
        assert_eq!(
            err,
            ValidationError::OutsideWindow {
                id: "b".into(),
                timestamp: t(5),
                window_start: t(900),
            }
        );
        assert_eq!(s.snapshot(), before);
        assert_eq!(s.known_account_count(), 2);

        s.insert(&Transaction::new("c", "C", "D", 1.0, t(900))).unwrap();
        let g = s.snapshot();
        let start = g.window_start().unwrap();
        assert!(g.edges().iter().all(|e| e.timestamp >= start));
    }

    #[test]
    fn test_rejected_advance_leaves_state_unchanged() {
        let mut s = store(100);
        s.insert(&Transaction::new("t1", "A", "B", 1.0, t(450))).unwrap();
        s.advance(t(500)).unwrap();
        let before = s.snapshot();
        let version = s.version();

        assert!(s.advance(t(100)).is_err());
        assert_eq!(s.window_end(), Some(t(500)));
        assert_eq!(s.window_start(), Some(t(400)));
        assert_eq!(s.version(), version);
        assert_eq!(s.snapshot(), before);
    }

    #[test]
    fn test_ids_forgotten_once_outside_window() {
        let mut s = store(100);
        s.insert(&Transaction::new("t1", "A", "B", 1.0, t(0))).unwrap();
        s.insert(&Transaction::new("t2", "B", "C", 1.0, t(150))).unwrap();
        assert_eq!(s.remembered_ids(), 2);

        s.advance(t(200)).unwrap();
        assert_eq!(s.remembered_ids(), 1);
        // a replay of the expired record now falls outside the window
        assert!(matches!(
            s.insert(&Transaction::new("t1", "A", "B", 1.0, t(0))),
            Err(ValidationError::OutsideWindow { .. })
        ));
        assert!(matches!(
            s.insert(&Transaction::new("t2", "A", "B", 1.0, t(160))),
            Err(ValidationError::DuplicateTransaction(_))
        ));
    }

    #[test]
    fn test_snapshot_window_end_tracks_inserts_after_advance() {
        let mut s = store(100);
        s.advance(t(100)).unwrap();
        s.insert(&Transaction::new("t1", "A", "B", 1.0, t(250))).unwrap();

        let g = s.snapshot();
        assert_eq!(g.window_end(), Some(t(250)));
        assert_eq!(s.window_end(), Some(t(100)));
    }

    #[test]
    fn test_far_past_window_does_not_overflow() {
        let mut s = GraphStore::new(GraphConfig {
            window_seconds: i64::MAX,
            clock_skew_seconds: i64::MAX,
            max_edges: 10,
        });
        s.insert(&Transaction::new("t1", "A", "B", 1.0, t(0))).unwrap();
        let report = s.advance(t(10)).unwrap();
        assert_eq!(report.expired_edges, 0);
        assert_eq!(report.window_start, DateTime::<Utc>::MIN_UTC);
        assert!(s.advance(t(-10)).is_ok());
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn test_handle_slots_bounded_by_u32() {
        assert_eq!(AccountHandle::for_slot(7), Some(AccountHandle(7)));
        assert!(AccountHandle::for_slot(u32::MAX as usize).is_some());
        assert!(AccountHandle::for_slot(u32::MAX as usize + 1).is_none());
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let mut s = GraphStore::new(GraphConfig {
            window_seconds: 3600,
            clock_skew_seconds: 0,
            max_edges: 2,
        });
        s.insert(&Transaction::new("t1", "A", "B", 1.0, t(0))).unwrap();
        s.insert(&Transaction::new("t2", "C", "D", 1.0, t(1))).unwrap();
        let outcome = s.insert(&Transaction::new("t3", "E", "F", 1.0, t(2))).unwrap();
        assert_eq!(outcome.evicted_edges, 1);

        let g = s.snapshot();
        assert!(!g.contains_transaction("t1"));
        assert_eq!(g.node_count(), 4);
    }

    #[test]
    fn test_snapshot_is_sorted_and_detached() {
        let mut s = store(3600);
        s.insert(&Transaction::new("t1", "zed", "amy", 1.0, t(0))).unwrap();
        let snap = s.snapshot();
        s.insert(&Transaction::new("t2", "amy", "bob", 1.0, t(1))).unwrap();

        assert_eq!(snap.node_count(), 2);
        assert_eq!(snap.account_id(0), Some("amy"));
        assert_eq!(snap.account_id(1), Some("zed"));
        assert_eq!(s.snapshot().node_count(), 3);
    }
}
