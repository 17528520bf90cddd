//! Per-actor flow scheduler

use ledgersoak_client::Connector;
use ledgersoak_core::Chain;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::{Actor, Entropy, Flow, FlowContext, HarnessConfig, SchedulerError, SoakStats};
use crate::NETWORK_TARGET;

/// Run flows for `actor` until `cancel` fires.
///
/// Cancellation is observed before each flow and during the pause after it;
/// a flow in progress always runs to its end. Only a randomness failure ends
/// the loop with an error.
pub async fn run_actor(
    actor: &Actor,
    connector: &dyn Connector,
    config: &HarnessConfig,
    stats: &SoakStats,
    entropy: &mut dyn Entropy,
    cancel: &CancellationToken,
) -> Result<(), SchedulerError> {
    log_starting_balances(actor).await;

    let ctx = FlowContext {
        actor,
        connector,
        config,
    };
    let entropy_failed = |source| SchedulerError::Entropy {
        actor: actor.id,
        source,
    };

    while !cancel.is_cancelled() {
        let flow = Flow::draw(entropy).map_err(entropy_failed)?;
        info!(actor = actor.id, %flow, "Executing flow");

        let outcome = flow.execute(&ctx).await;
        stats.record(flow, &outcome);

        let pause = entropy.pause(config.max_pause).map_err(entropy_failed)?;
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(pause) => {}
        }
    }

    info!(actor = actor.id, "Actor stopped");
    Ok(())
}

async fn log_starting_balances(actor: &Actor) {
    let native = actor.wallet.native_asset();
    for chain in Chain::ALL {
        match actor.wallet.balances(chain).await {
            Ok(balances) => info!(
                actor = actor.id,
                %chain,
                balance = balances.get(&native).copied().unwrap_or(0),
                "Wallet starting balance"
            ),
            Err(e) => warn!(
                target: NETWORK_TARGET,
                actor = actor.id,
                %chain,
                error = %e,
                "Failed to fetch starting balance"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use ledgersoak_crypto::SigningKeypair;
    use ledgersoak_sim::{SimCluster, SimConfig};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use crate::{bootstrap, os_keys};

    struct Exhausted;

    impl Entropy for Exhausted {
        fn fill(&mut self, _dest: &mut [u8]) -> Result<(), rand::Error> {
            Err(rand::Error::new("entropy exhausted"))
        }
    }

    async fn setup(max_pause: Duration) -> (SimCluster, HarnessConfig, Actor) {
        let cluster = SimCluster::new(SimConfig::default().with_nodes(2));
        let config = HarnessConfig {
            actors: 1,
            poll_interval: Duration::from_millis(2),
            max_pause,
            ..HarnessConfig::new(cluster.endpoints())
        };
        let actor = bootstrap(&cluster, &config, &SigningKeypair::genesis(), &os_keys())
            .await
            .unwrap()
            .remove(0);
        (cluster, config, actor)
    }

    #[tokio::test]
    async fn test_cancelled_before_start_runs_nothing() {
        let (cluster, config, actor) = setup(Duration::from_millis(5)).await;
        let stats = SoakStats::new();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let mut rng = ChaCha8Rng::seed_from_u64(1);
        run_actor(&actor, &cluster, &config, &stats, &mut rng, &cancel)
            .await
            .unwrap();
        assert_eq!(stats.flows_total(), 0);
    }

    #[tokio::test]
    async fn test_runs_flows_until_cancelled() {
        let (cluster, config, actor) = setup(Duration::from_millis(5)).await;
        let stats = SoakStats::new();
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(300)).await;
            trigger.cancel();
        });

        let mut rng = ChaCha8Rng::seed_from_u64(2);
        run_actor(&actor, &cluster, &config, &stats, &mut rng, &cancel)
            .await
            .unwrap();

        let report = stats.report();
        assert!(stats.flows_total() > 1);
        assert_eq!(report.violations, 0);
        assert_eq!(report.issued, report.confirmed);
    }

    #[tokio::test]
    async fn test_entropy_failure_is_fatal() {
        let (cluster, config, actor) = setup(Duration::from_millis(5)).await;
        let stats = SoakStats::new();
        let cancel = CancellationToken::new();

        let err = run_actor(&actor, &cluster, &config, &stats, &mut Exhausted, &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, SchedulerError::Entropy { actor: 0, .. }));
        assert_eq!(stats.flows_total(), 0);
    }
}
