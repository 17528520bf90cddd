//! Configuration types

use std::path::PathBuf;
use std::time::Duration;

use ledgersoak_core::{units, NodeEndpoint};
use ledgersoak_harness::HarnessConfig;
use ledgersoak_sim::{NodeFaults, SimConfig};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{default_settings_path, Result, SettingsError};

/// Main settings structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub network: NetworkSettings,

    #[serde(default)]
    pub workload: WorkloadSettings,

    #[serde(default)]
    pub timing: TimingSettings,

    /// Simulated cluster, used when no live endpoints are given
    #[serde(default)]
    pub simulation: SimulationSettings,

    /// Path this file was loaded from (not serialized)
    #[serde(skip)]
    config_path: Option<PathBuf>,
}

impl Settings {
    /// Load settings from a specific path, or create defaults
    pub fn load_from(path: &PathBuf) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path).map_err(SettingsError::ReadError)?;
            let mut settings: Settings =
                serde_json::from_str(&content).map_err(SettingsError::ParseError)?;
            settings.config_path = Some(path.clone());
            info!("Loaded settings from {:?}", path);
            Ok(settings)
        } else {
            let mut settings = Self::default();
            settings.config_path = Some(path.clone());
            Ok(settings)
        }
    }

    /// Save settings to the path they were loaded from
    pub fn save(&self) -> Result<()> {
        let path = self.config_path.clone().unwrap_or_else(default_settings_path);
        self.save_to(&path)
    }

    /// Save settings to a specific path
    pub fn save_to(&self, path: &PathBuf) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(SettingsError::CreateDirError)?;
            }
        }

        let content = serde_json::to_string_pretty(self).map_err(SettingsError::ParseError)?;
        std::fs::write(path, content).map_err(SettingsError::WriteError)?;
        info!("Saved settings to {:?}", path);
        Ok(())
    }

    /// Harness knobs for a run against `endpoints`.
    pub fn harness_config(&self, endpoints: Vec<NodeEndpoint>) -> HarnessConfig {
        HarnessConfig {
            endpoints,
            actors: self.workload.actors,
            poll_interval: Duration::from_millis(self.timing.poll_interval_ms),
            health_interval: Duration::from_millis(self.timing.health_interval_ms),
            max_pause: Duration::from_millis(self.timing.max_pause_ms),
            confirm_deadline: self.timing.confirm_deadline_ms.map(Duration::from_millis),
            funding_amount: self.workload.funding_amount,
            transfer_amount: self.workload.transfer_amount,
            export_amount: self.workload.export_amount,
            reverse_export_amount: self.workload.reverse_export_amount,
            asset_quantity: self.workload.asset_quantity,
        }
    }

    /// Simulated cluster described by the `simulation` section.
    pub fn sim_config(&self) -> SimConfig {
        let mut config = SimConfig::default().with_nodes(self.simulation.nodes);
        for (node, faults) in self.simulation.faults.iter().enumerate() {
            config = config.with_faults(node, faults.clone());
        }
        config
    }
}

/// Network settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NetworkSettings {
    /// Node URIs, e.g. `http://127.0.0.1:9650`
    #[serde(default)]
    pub endpoints: Vec<NodeEndpoint>,
}

/// Workload settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkloadSettings {
    /// Actors including genesis
    #[serde(default = "default_actors")]
    pub actors: usize,

    #[serde(default = "default_funding_amount")]
    pub funding_amount: u64,

    #[serde(default = "default_dust")]
    pub transfer_amount: u64,

    #[serde(default = "default_export_amount")]
    pub export_amount: u64,

    #[serde(default = "default_dust")]
    pub reverse_export_amount: u64,

    #[serde(default = "default_dust")]
    pub asset_quantity: u64,
}

fn default_actors() -> usize {
    5
}

fn default_funding_amount() -> u64 {
    100 * units::KILO_COIN
}

fn default_export_amount() -> u64 {
    units::COIN
}

fn default_dust() -> u64 {
    units::DUST
}

impl Default for WorkloadSettings {
    fn default() -> Self {
        Self {
            actors: default_actors(),
            funding_amount: default_funding_amount(),
            transfer_amount: default_dust(),
            export_amount: default_export_amount(),
            reverse_export_amount: default_dust(),
            asset_quantity: default_dust(),
        }
    }
}

/// Timing settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingSettings {
    #[serde(default = "default_interval_ms")]
    pub poll_interval_ms: u64,

    #[serde(default = "default_interval_ms")]
    pub health_interval_ms: u64,

    /// Exclusive upper bound of the pause between flows
    #[serde(default = "default_max_pause_ms")]
    pub max_pause_ms: u64,

    /// Per-node confirmation bound; absent means poll until decided
    #[serde(default)]
    pub confirm_deadline_ms: Option<u64>,
}

fn default_interval_ms() -> u64 {
    100
}

fn default_max_pause_ms() -> u64 {
    1_000
}

impl Default for TimingSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_interval_ms(),
            health_interval_ms: default_interval_ms(),
            max_pause_ms: default_max_pause_ms(),
            confirm_deadline_ms: None,
        }
    }
}

/// Simulated cluster settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationSettings {
    #[serde(default = "default_nodes")]
    pub nodes: usize,

    /// Faults by node index
    #[serde(default)]
    pub faults: Vec<NodeFaults>,
}

fn default_nodes() -> usize {
    5
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            nodes: default_nodes(),
            faults: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert!(settings.network.endpoints.is_empty());
        assert_eq!(settings.workload.actors, 5);
        assert_eq!(settings.timing.poll_interval_ms, 100);
        assert_eq!(settings.simulation.nodes, 5);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let json = r#"{"workload": {"actors": 2}, "timing": {"confirm_deadline_ms": 5000}}"#;
        let settings: Settings = serde_json::from_str(json).unwrap();
        assert_eq!(settings.workload.actors, 2);
        assert_eq!(settings.workload.export_amount, units::COIN);
        assert_eq!(settings.timing.max_pause_ms, 1_000);
        assert_eq!(settings.timing.confirm_deadline_ms, Some(5_000));
    }

    #[test]
    fn test_harness_config_mapping() {
        let mut settings = Settings::default();
        settings.timing.confirm_deadline_ms = Some(250);
        let config = settings.harness_config(vec![NodeEndpoint::new("http://127.0.0.1:9650")]);
        assert_eq!(config.actors, 5);
        assert_eq!(config.poll_interval, Duration::from_millis(100));
        assert_eq!(config.confirm_deadline, Some(Duration::from_millis(250)));
        assert_eq!(config.funding_amount, 100 * units::KILO_COIN);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_sim_config_faults() {
        let mut settings = Settings::default();
        settings.simulation.nodes = 3;
        settings.simulation.faults = vec![
            NodeFaults::default(),
            NodeFaults {
                skip_spends: true,
                ..Default::default()
            },
        ];
        let config = settings.sim_config();
        assert_eq!(config.nodes, 3);
        assert!(config.faults[1].skip_spends);
    }

    #[test]
    fn test_save_and_reload() {
        let path = std::env::temp_dir().join(format!("ledgersoak-settings-{}.json", std::process::id()));
        let mut settings = Settings::default();
        settings.network.endpoints = vec![NodeEndpoint::new("http://10.0.0.1:9650")];
        settings.workload.actors = 3;
        settings.save_to(&path).unwrap();

        let loaded = Settings::load_from(&path).unwrap();
        assert_eq!(loaded.network.endpoints, settings.network.endpoints);
        assert_eq!(loaded.workload.actors, 3);

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let path = std::env::temp_dir().join("ledgersoak-settings-does-not-exist.json");
        let settings = Settings::load_from(&path).unwrap();
        assert_eq!(settings.workload.actors, 5);
    }
}
