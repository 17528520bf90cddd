//! Startup gate: wait until every node reports healthy

use std::time::Duration;

use ledgersoak_client::Connector;
use ledgersoak_core::NodeEndpoint;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{ReadinessError, NETWORK_TARGET};

/// Poll each endpoint in turn until it reports healthy.
///
/// Unreachable and unhealthy nodes are retried forever at `interval`. Returns
/// `ReadinessError::Cancelled` if `cancel` fires first.
pub async fn await_healthy(
    connector: &dyn Connector,
    endpoints: &[NodeEndpoint],
    interval: Duration,
    cancel: &CancellationToken,
) -> Result<(), ReadinessError> {
    if endpoints.is_empty() {
        return Err(ReadinessError::NoEndpoints);
    }

    for endpoint in endpoints {
        await_healthy_node(connector, endpoint, interval, cancel).await?;
    }

    info!(nodes = endpoints.len(), "All nodes reported healthy");
    Ok(())
}

async fn await_healthy_node(
    connector: &dyn Connector,
    endpoint: &NodeEndpoint,
    interval: Duration,
    cancel: &CancellationToken,
) -> Result<(), ReadinessError> {
    let node = connector.node(endpoint);
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!(%endpoint, "Awaiting node health");
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!(%endpoint, "Node health check cancelled");
                return Err(ReadinessError::Cancelled {
                    endpoint: endpoint.to_string(),
                });
            }
            _ = ticker.tick() => {}
        }

        match node.health().await {
            Ok(report) if report.healthy => {
                info!(%endpoint, "Node reported healthy");
                return Ok(());
            }
            Ok(_) => debug!(%endpoint, "Node reported unhealthy"),
            Err(e) => warn!(target: NETWORK_TARGET, %endpoint, error = %e, "Node unreachable"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledgersoak_sim::{NodeFaults, SimCluster, SimConfig};

    const INTERVAL: Duration = Duration::from_millis(5);

    #[tokio::test]
    async fn test_healthy_cluster_passes() {
        let cluster = SimCluster::new(SimConfig::default().with_nodes(3));
        let cancel = CancellationToken::new();
        await_healthy(&cluster, &cluster.endpoints(), INTERVAL, &cancel)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_waits_out_unhealthy_node() {
        let faults = NodeFaults {
            unhealthy_polls: 3,
            ..Default::default()
        };
        let cluster = SimCluster::new(SimConfig::default().with_nodes(2).with_faults(1, faults));
        let cancel = CancellationToken::new();
        await_healthy(&cluster, &cluster.endpoints(), INTERVAL, &cancel)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_unreachable_node_blocks_until_cancelled() {
        let faults = NodeFaults {
            unreachable: true,
            ..Default::default()
        };
        let cluster = SimCluster::new(SimConfig::default().with_nodes(2).with_faults(1, faults));
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let err = await_healthy(&cluster, &cluster.endpoints(), INTERVAL, &cancel)
            .await
            .unwrap_err();
        match err {
            ReadinessError::Cancelled { endpoint } => {
                assert_eq!(endpoint, cluster.endpoints()[1].to_string());
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_no_endpoints() {
        let cluster = SimCluster::new(SimConfig::default().with_nodes(1));
        let cancel = CancellationToken::new();
        let err = await_healthy(&cluster, &[], INTERVAL, &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, ReadinessError::NoEndpoints));
    }
}
