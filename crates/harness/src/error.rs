//! Harness error types
//!
//! Everything here is fatal for the run. Per-flow failures are outcomes,
//! not errors; see [`crate::FlowOutcome`].

use ledgersoak_client::ClientError;
use ledgersoak_core::TxId;
use ledgersoak_crypto::KeyError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReadinessError {
    #[error("no node endpoints configured")]
    NoEndpoints,

    #[error("cancelled while waiting for {endpoint} to become healthy")]
    Cancelled { endpoint: String },
}

#[derive(Error, Debug)]
pub enum BootstrapError {
    #[error("no node endpoints configured")]
    NoEndpoints,

    #[error("key generation failed: {0}")]
    KeyGeneration(#[from] KeyError),

    #[error("wallet initialisation failed for actor {actor}: {source}")]
    WalletInit {
        actor: usize,
        #[source]
        source: ClientError,
    },

    #[error("funding transfer for actor {actor} failed: {source}")]
    FundingIssue {
        actor: usize,
        #[source]
        source: ClientError,
    },

    #[error("funding transfer {tx} for actor {actor} was not confirmed on every node")]
    FundingNotConfirmed { actor: usize, tx: TxId },
}

#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error("randomness source failed for actor {actor}: {source}")]
    Entropy {
        actor: usize,
        #[source]
        source: rand::Error,
    },
}

#[derive(Error, Debug)]
pub enum HarnessError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("readiness gate: {0}")]
    Readiness(#[from] ReadinessError),

    #[error("bootstrap: {0}")]
    Bootstrap(#[from] BootstrapError),

    #[error("scheduler: {0}")]
    Scheduler(#[from] SchedulerError),
}

pub type Result<T> = std::result::Result<T, HarnessError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = HarnessError::Config("actors must be at least 1".into());
        assert_eq!(
            err.to_string(),
            "invalid configuration: actors must be at least 1"
        );

        let err = HarnessError::from(BootstrapError::FundingNotConfirmed {
            actor: 3,
            tx: TxId([0u8; 32]),
        });
        assert!(err.to_string().starts_with("bootstrap: funding transfer"));

        let err = SchedulerError::Entropy {
            actor: 2,
            source: rand::Error::new("exhausted"),
        };
        assert!(err.to_string().contains("actor 2"));
    }
}
