//! Runtime knobs for a soak run

use std::time::Duration;

use ledgersoak_core::{units, NodeEndpoint};

use crate::{HarnessError, Result};

#[derive(Debug, Clone)]
pub struct HarnessConfig {
    pub endpoints: Vec<NodeEndpoint>,
    /// Total actors, genesis included
    pub actors: usize,

    /// Interval between transaction status polls
    pub poll_interval: Duration,
    /// Interval between health checks at startup
    pub health_interval: Duration,
    /// Upper bound (exclusive) of the random pause between flows
    pub max_pause: Duration,
    /// Per-node bound on confirmation polling; `None` polls until decided.
    pub confirm_deadline: Option<Duration>,

    /// Native amount sent from genesis to every other actor
    pub funding_amount: u64,
    /// Amount sent by the simple transfer flow
    pub transfer_amount: u64,
    /// Amount moved by the forward cross-chain flow
    pub export_amount: u64,
    /// Amount moved by the reverse cross-chain flow
    pub reverse_export_amount: u64,
    /// Initial supply of assets created by the asset creation flow
    pub asset_quantity: u64,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            endpoints: Vec::new(),
            actors: 5,
            poll_interval: Duration::from_millis(100),
            health_interval: Duration::from_millis(100),
            max_pause: Duration::from_secs(1),
            confirm_deadline: None,
            funding_amount: 100 * units::KILO_COIN,
            transfer_amount: units::DUST,
            export_amount: units::COIN,
            reverse_export_amount: units::DUST,
            asset_quantity: units::DUST,
        }
    }
}

impl HarnessConfig {
    pub fn new(endpoints: Vec<NodeEndpoint>) -> Self {
        Self {
            endpoints,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.endpoints.is_empty() {
            return Err(HarnessError::Config("at least one endpoint is required".into()));
        }
        if self.actors == 0 {
            return Err(HarnessError::Config("actors must be at least 1".into()));
        }
        if self.poll_interval.is_zero() {
            return Err(HarnessError::Config("poll interval must be non-zero".into()));
        }
        if self.health_interval.is_zero() {
            return Err(HarnessError::Config("health interval must be non-zero".into()));
        }
        if self.actors > 1 && self.funding_amount == 0 {
            return Err(HarnessError::Config("funding amount must be non-zero".into()));
        }
        Ok(())
    }

    /// Endpoint backing the wallet of actor `id`; `None` without endpoints.
    pub fn wallet_endpoint(&self, id: usize) -> Option<&NodeEndpoint> {
        self.endpoints.get(id.checked_rem(self.endpoints.len())?)
    }
}
