//! Harness entry point: gate, bootstrap, then run every actor

use std::sync::Arc;

use ledgersoak_client::Connector;
use ledgersoak_crypto::SigningKeypair;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{error, info};

use crate::actor::os_keys;
use crate::entropy::os_entropy;
use crate::{
    await_healthy, bootstrap, run_actor, Actor, EntropySource, HarnessConfig, KeySource, Result,
    SchedulerError, SoakReport, SoakStats,
};

/// A configured soak run
pub struct Harness {
    config: Arc<HarnessConfig>,
    connector: Arc<dyn Connector>,
    genesis: SigningKeypair,
    keys: KeySource,
    entropy: EntropySource,
    stats: Arc<SoakStats>,
}

impl Harness {
    pub fn new(config: HarnessConfig, connector: Arc<dyn Connector>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config: Arc::new(config),
            connector,
            genesis: SigningKeypair::genesis(),
            keys: os_keys(),
            entropy: os_entropy(),
            stats: Arc::new(SoakStats::new()),
        })
    }

    pub fn with_genesis(mut self, genesis: SigningKeypair) -> Self {
        self.genesis = genesis;
        self
    }

    pub fn with_keys(mut self, keys: KeySource) -> Self {
        self.keys = keys;
        self
    }

    pub fn with_entropy(mut self, entropy: EntropySource) -> Self {
        self.entropy = entropy;
        self
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Live counters, readable while the run is in progress.
    pub fn stats(&self) -> Arc<SoakStats> {
        self.stats.clone()
    }

    /// Run until `cancel` fires.
    ///
    /// Non-genesis actors run as tracked tasks; the genesis actor runs on the
    /// calling task. All of them are awaited before returning. A randomness
    /// failure in any actor cancels the run and is returned as its error.
    pub async fn run(&self, cancel: CancellationToken) -> Result<SoakReport> {
        await_healthy(
            self.connector.as_ref(),
            &self.config.endpoints,
            self.config.health_interval,
            &cancel,
        )
        .await?;

        let mut actors = bootstrap(
            self.connector.as_ref(),
            &self.config,
            &self.genesis,
            &self.keys,
        )
        .await?;
        let genesis = actors.remove(0);

        let fatal: Arc<Mutex<Option<SchedulerError>>> = Arc::new(Mutex::new(None));
        let tracker = TaskTracker::new();

        for actor in actors {
            let connector = self.connector.clone();
            let config = self.config.clone();
            let stats = self.stats.clone();
            let mut entropy = (self.entropy)(actor.id);
            let cancel = cancel.clone();
            let fatal = fatal.clone();

            tracker.spawn(async move {
                let result = run_actor(
                    &actor,
                    connector.as_ref(),
                    &config,
                    &stats,
                    entropy.as_mut(),
                    &cancel,
                )
                .await;
                if let Err(e) = result {
                    fail(&fatal, &cancel, e);
                }
            });
        }
        tracker.close();

        info!(actors = self.config.actors, "All actors started");
        self.run_genesis(&genesis, &fatal, &cancel).await;

        tracker.wait().await;
        info!("All actors stopped");

        if let Some(e) = fatal.lock().take() {
            return Err(e.into());
        }
        Ok(self.stats.report())
    }

    async fn run_genesis(
        &self,
        genesis: &Actor,
        fatal: &Mutex<Option<SchedulerError>>,
        cancel: &CancellationToken,
    ) {
        let mut entropy = (self.entropy)(genesis.id);
        let result = run_actor(
            genesis,
            self.connector.as_ref(),
            &self.config,
            &self.stats,
            entropy.as_mut(),
            cancel,
        )
        .await;
        if let Err(e) = result {
            fail(fatal, cancel, e);
        }
    }
}

/// Keep the first fatal error and stop every actor.
fn fail(slot: &Mutex<Option<SchedulerError>>, cancel: &CancellationToken, e: SchedulerError) {
    error!(error = %e, "Fatal actor failure, stopping run");
    slot.lock().get_or_insert(e);
    cancel.cancel();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use ledgersoak_sim::{SimCluster, SimConfig};

    use crate::{Entropy, HarnessError};

    #[test]
    fn test_new_validates_config() {
        let cluster = SimCluster::new(SimConfig::default().with_nodes(1));
        let result = Harness::new(HarnessConfig::default(), Arc::new(cluster));
        assert!(matches!(result, Err(HarnessError::Config(_))));
    }

    #[tokio::test]
    async fn test_entropy_failure_stops_every_actor() {
        struct Exhausted;

        impl Entropy for Exhausted {
            fn fill(&mut self, _dest: &mut [u8]) -> std::result::Result<(), rand::Error> {
                Err(rand::Error::new("entropy exhausted"))
            }
        }

        let cluster = SimCluster::new(SimConfig::default().with_nodes(2));
        let config = HarnessConfig {
            actors: 3,
            poll_interval: Duration::from_millis(2),
            health_interval: Duration::from_millis(2),
            ..HarnessConfig::new(cluster.endpoints())
        };
        let harness = Harness::new(config, Arc::new(cluster))
            .unwrap()
            .with_entropy(Arc::new(|_: usize| -> Box<dyn Entropy> { Box::new(Exhausted) }));

        let err = tokio::time::timeout(Duration::from_secs(10), harness.run(CancellationToken::new()))
            .await
            .unwrap()
            .unwrap_err();
        assert!(matches!(err, HarnessError::Scheduler(_)));
    }
}
