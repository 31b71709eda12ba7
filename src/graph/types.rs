//! Transaction records and the immutable windowed-graph view.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// A transfer between two accounts, as delivered by the ingestion layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub transaction_id: String,
    pub from_account: String,
    pub to_account: String,
    pub amount: f64,
    /// RFC 3339 on the wire.
    pub timestamp: DateTime<Utc>,
    /// Opaque caller data, carried but never interpreted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl Transaction {
    pub fn new(
        transaction_id: impl Into<String>,
        from_account: impl Into<String>,
        to_account: impl Into<String>,
        amount: f64,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            transaction_id: transaction_id.into(),
            from_account: from_account.into(),
            to_account: to_account.into(),
            amount,
            timestamp,
            metadata: None,
        }
    }
}

/// Account as seen in a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountView {
    pub id: String,
    /// Cumulative sent + received volume over the whole stream.
    pub total_volume: f64,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    /// In-window incident edges (in + out, parallel edges counted).
    pub degree: usize,
}

/// Directed edge in a snapshot; endpoints index into the snapshot's accounts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeView {
    pub transaction_id: String,
    pub from: usize,
    pub to: usize,
    pub amount: f64,
    pub timestamp: DateTime<Utc>,
}

/// Immutable copy of the windowed transaction graph.
///
/// Accounts are sorted by identifier and edges by (timestamp, transaction
/// id), so the same window content always yields the same indices.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WindowedGraph {
    accounts: Vec<AccountView>,
    edges: Vec<EdgeView>,
    window_start: Option<DateTime<Utc>>,
    window_end: Option<DateTime<Utc>>,
    version: u64,
}

impl WindowedGraph {
    /// Create an empty graph.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    pub(crate) fn from_parts(
        accounts: Vec<AccountView>,
        edges: Vec<EdgeView>,
        window_start: Option<DateTime<Utc>>,
        window_end: Option<DateTime<Utc>>,
        version: u64,
    ) -> Self {
        Self {
            accounts,
            edges,
            window_start,
            window_end,
            version,
        }
    }

    pub fn accounts(&self) -> &[AccountView] {
        &self.accounts
    }

    pub fn edges(&self) -> &[EdgeView] {
        &self.edges
    }

    pub fn node_count(&self) -> usize {
        self.accounts.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    pub fn window_start(&self) -> Option<DateTime<Utc>> {
        self.window_start
    }

    pub fn window_end(&self) -> Option<DateTime<Utc>> {
        self.window_end
    }

    /// Store version the snapshot was taken at.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Account identifier for a snapshot index.
    pub fn account_id(&self, index: usize) -> Option<&str> {
        self.accounts.get(index).map(|a| a.id.as_str())
    }

    /// Snapshot index of an account identifier.
    pub fn account_index(&self, id: &str) -> Option<usize> {
        self.accounts
            .binary_search_by(|a| a.id.as_str().cmp(id))
            .ok()
    }

    pub fn contains_transaction(&self, transaction_id: &str) -> bool {
        self.edges.iter().any(|e| e.transaction_id == transaction_id)
    }

    /// Total amount exchanged per unordered pair `(i, j)` with `i < j`.
    pub fn pair_weights(&self) -> BTreeMap<(usize, usize), f64> {
        let mut weights = BTreeMap::new();
        for e in &self.edges {
            let key = (e.from.min(e.to), e.from.max(e.to));
            *weights.entry(key).or_insert(0.0) += e.amount;
        }
        weights
    }

    /// Undirected simple adjacency (parallel edges and direction collapsed).
    pub fn undirected_neighbors(&self) -> Vec<BTreeSet<usize>> {
        let mut adj = vec![BTreeSet::new(); self.accounts.len()];
        for e in &self.edges {
            adj[e.from].insert(e.to);
            adj[e.to].insert(e.from);
        }
        adj
    }

    /// Directed simple adjacency: successors of each node.
    pub fn successors(&self) -> Vec<BTreeSet<usize>> {
        let mut adj = vec![BTreeSet::new(); self.accounts.len()];
        for e in &self.edges {
            adj[e.from].insert(e.to);
        }
        adj
    }

    /// Directed simple adjacency: predecessors of each node.
    pub fn predecessors(&self) -> Vec<BTreeSet<usize>> {
        let mut adj = vec![BTreeSet::new(); self.accounts.len()];
        for e in &self.edges {
            adj[e.to].insert(e.from);
        }
        adj
    }
}
