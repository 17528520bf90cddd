//! LedgerSoak Harness
//!
//! Long-running soak tester for a multi-chain ledger cluster. Independent
//! actors issue randomized transaction flows, wait until every node has
//! decided each transaction, then check that every node dropped the outputs
//! the transaction consumed.
//!
//! ## Components
//!
//! - [`await_healthy`]: startup readiness gate
//! - [`bootstrap`]: key generation, funding and wallet setup per actor
//! - [`run_actor`]: per-actor flow scheduler
//! - [`Flow`]: the five transaction patterns
//! - [`confirm`]: cross-node confirmation
//! - [`verify_consumed`]: cross-node consistency check
//! - [`Harness`]: ties them together and produces a [`SoakReport`]

mod actor;
mod config;
mod confirm;
mod entropy;
mod error;
mod flow;
mod readiness;
mod report;
mod runner;
mod scheduler;
mod verify;

pub use actor::{bootstrap, os_keys, Actor, KeySource};
pub use config::HarnessConfig;
pub use confirm::{confirm, Confirmation};
pub use entropy::{os_entropy, Entropy, EntropySource};
pub use error::{BootstrapError, HarnessError, ReadinessError, Result, SchedulerError};
pub use flow::{Flow, FlowContext, FlowOutcome, TxOutcome};
pub use readiness::await_healthy;
pub use report::{SoakReport, SoakStats};
pub use runner::Harness;
pub use scheduler::run_actor;
pub use verify::{verify_consumed, Verification};

/// Log target for consistency violations (bugs in the system under test).
pub const CONSISTENCY_TARGET: &str = "ledgersoak::consistency";

/// Log target for node and network failures.
pub const NETWORK_TARGET: &str = "ledgersoak::network";
