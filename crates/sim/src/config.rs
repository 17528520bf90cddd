//! Simulated cluster configuration

use ledgersoak_core::{units, Address, FeeSchedule};
use ledgersoak_crypto::SigningKeypair;
use serde::{Deserialize, Serialize};

/// Faults injected into one simulated node
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeFaults {
    #[serde(default)]
    pub unreachable: bool,

    /// Number of health checks answered with `healthy: false`
    #[serde(default)]
    pub unhealthy_polls: u32,

    /// Number of status polls per transaction answered with `Processing`
    #[serde(default)]
    pub pending_polls: u32,

    #[serde(default)]
    pub reject_txs: bool,

    /// Keep consumed inputs in the UTXO set (replication bug)
    #[serde(default)]
    pub skip_spends: bool,
}

#[derive(Debug, Clone)]
pub struct SimConfig {
    pub nodes: usize,
    pub asset_fees: FeeSchedule,
    pub platform_fees: FeeSchedule,
    /// Pre-funded address on both chains
    pub genesis_address: Address,
    pub genesis_asset_balance: u64,
    pub genesis_platform_balance: u64,
    /// Faults by node index; missing entries mean a healthy node.
    pub faults: Vec<NodeFaults>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            nodes: 5,
            asset_fees: FeeSchedule {
                base_tx_fee: units::MILLI,
                create_asset_tx_fee: 10 * units::MILLI,
            },
            platform_fees: FeeSchedule {
                base_tx_fee: units::MILLI,
                create_asset_tx_fee: units::MILLI,
            },
            genesis_address: SigningKeypair::genesis().address(),
            genesis_asset_balance: 300 * units::MEGA_COIN,
            genesis_platform_balance: 100 * units::MEGA_COIN,
            faults: Vec::new(),
        }
    }
}

impl SimConfig {
    pub fn with_nodes(mut self, nodes: usize) -> Self {
        self.nodes = nodes.max(1);
        self
    }

    pub fn with_faults(mut self, node: usize, faults: NodeFaults) -> Self {
        if self.faults.len() <= node {
            self.faults.resize(node + 1, NodeFaults::default());
        }
        self.faults[node] = faults;
        self
    }

    pub fn with_genesis_balances(mut self, asset: u64, platform: u64) -> Self {
        self.genesis_asset_balance = asset;
        self.genesis_platform_balance = platform;
        self
    }

    pub(crate) fn faults_for(&self, node: usize) -> NodeFaults {
        self.faults.get(node).cloned().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SimConfig::default();
        assert_eq!(config.nodes, 5);
        assert!(config.faults.is_empty());
        assert_eq!(config.genesis_address, SigningKeypair::genesis().address());
    }

    #[test]
    fn test_with_faults_pads_healthy_nodes() {
        let faults = NodeFaults {
            skip_spends: true,
            ..Default::default()
        };
        let config = SimConfig::default().with_faults(2, faults.clone());
        assert_eq!(config.faults.len(), 3);
        assert_eq!(config.faults_for(0), NodeFaults::default());
        assert_eq!(config.faults_for(2), faults);
        assert_eq!(config.faults_for(4), NodeFaults::default());
    }

    #[test]
    fn test_with_nodes_floor() {
        assert_eq!(SimConfig::default().with_nodes(0).nodes, 1);
    }

    #[test]
    fn test_node_faults_parse_partial() {
        let faults: NodeFaults = serde_json::from_str(r#"{"pending_polls": 3}"#).unwrap();
        assert_eq!(faults.pending_polls, 3);
        assert!(!faults.unreachable);
    }
}
