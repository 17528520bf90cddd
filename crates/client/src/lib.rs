//! LedgerSoak Client
//!
//! Seams between the soak harness and the cluster under test.
//!
//! ## Traits
//!
//! - **NodeClient**: health check, transaction status and UTXO pages of one node
//! - **Wallet**: balances, fees and transaction issuance for one identity
//! - **Connector**: opens node clients and wallets for an endpoint
//!
//! ## Implementations
//!
//! - **RpcConnector**: JSON-RPC 2.0 over HTTP against live nodes
//! - `ledgersoak-sim` provides an in-memory cluster behind the same traits

mod protocol;
mod rpc;
mod traits;
mod utxos;

pub use protocol::*;
pub use rpc::{RpcConnector, RpcNodeClient, RpcWallet};
pub use traits::{Connector, NodeClient, Wallet};
pub use utxos::{fetch_all_utxos, LookupError, UtxoPage, UtxoQuery, UtxoSet, MAX_PAGE_SIZE};

use ledgersoak_core::Chain;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Node unreachable at {endpoint}: {reason}")]
    Unreachable { endpoint: String, reason: String },

    #[error("Node error {code}: {message}")]
    Rpc { code: i32, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Transaction rejected: {0}")]
    Rejected(String),

    #[error("Insufficient funds: need {needed}, have {available}")]
    InsufficientFunds { needed: u64, available: u64 },

    #[error("{operation} is not supported on the {chain} chain")]
    Unsupported {
        chain: Chain,
        operation: &'static str,
    },

    #[error("Wallet initialization failed: {0}")]
    WalletInit(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ClientError {
    /// Whether the error came from the transport rather than the ledger.
    pub fn is_network(&self) -> bool {
        matches!(
            self,
            ClientError::Unreachable { .. } | ClientError::InvalidResponse(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_unreachable() {
        let err = ClientError::Unreachable {
            endpoint: "http://127.0.0.1:9650".to_string(),
            reason: "connection refused".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Node unreachable at http://127.0.0.1:9650: connection refused"
        );
    }

    #[test]
    fn test_error_display_insufficient_funds() {
        let err = ClientError::InsufficientFunds {
            needed: 10,
            available: 3,
        };
        assert_eq!(err.to_string(), "Insufficient funds: need 10, have 3");
    }

    #[test]
    fn test_error_display_unsupported() {
        let err = ClientError::Unsupported {
            chain: Chain::Platform,
            operation: "create asset",
        };
        assert_eq!(
            err.to_string(),
            "create asset is not supported on the platform chain"
        );
    }

    #[test]
    fn test_network_classification() {
        let unreachable = ClientError::Unreachable {
            endpoint: "n".to_string(),
            reason: "r".to_string(),
        };
        assert!(unreachable.is_network());
        assert!(!ClientError::Rejected("double spend".to_string()).is_network());
    }
}
