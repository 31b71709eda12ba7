//! Graph Module: Windowed Transaction Graph
//!
//! Accounts are nodes, transactions are directed, weighted, timestamped
//! edges. The [`GraphStore`] owns the mutable window; downstream stages
//! only ever see an immutable [`WindowedGraph`] copied out of it.
//!
//! ## Window semantics
//!
//! An edge belongs to the window `[now - window, now]` where `now` is the
//! most recent advance. Accounts without in-window edges are hidden from
//! snapshots but keep their cumulative history in the store.

mod metrics;
mod store;
mod types;

pub use metrics::{CentralitySummary, StructuralMetrics};
pub use store::{AccountHandle, AdvanceReport, GraphStore, InsertOutcome};
pub use types::{AccountView, EdgeView, Transaction, WindowedGraph};
