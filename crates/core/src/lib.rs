//! LedgerSoak Core Types
//!
//! This crate defines the data model shared by the soak harness, the node
//! clients and the simulated cluster: chains, identifiers, unspent outputs,
//! transaction records and fee schedules.

mod error;
mod types;
pub mod units;

pub use error::*;
pub use types::*;
