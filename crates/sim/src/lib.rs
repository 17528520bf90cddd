//! LedgerSoak Simulated Cluster
//!
//! In-memory replicated ledger used for development and tests. Every node
//! keeps its own copy of both chains; issued transactions are validated
//! against a canonical ledger and then replicated to each node, subject to
//! per-node faults.
//!
//! ## Faults
//!
//! - `unreachable`: every call fails with a network error
//! - `unhealthy_polls`: the first N health checks report unhealthy
//! - `pending_polls`: the first N status polls per transaction report `Processing`
//! - `reject_txs`: the node decides every transaction as rejected
//! - `skip_spends`: the node applies outputs but keeps consumed inputs

mod cluster;
mod config;
mod ledger;
mod wallet;

pub use cluster::{SimCluster, SimNodeClient};
pub use config::{NodeFaults, SimConfig};
pub use wallet::SimWallet;
