//! Cross-node confirmation
//!
//! A transaction is confirmed network-wide only when every endpoint, polled
//! in order, reports the chain's success status. The first endpoint that
//! fails ends confirmation.

use std::time::{Duration, Instant};

use ledgersoak_client::{ClientError, Connector, NodeClient};
use ledgersoak_core::{Chain, NodeEndpoint, TxId, TxRecord, TxStatus};
use tracing::{debug, info, warn};

use crate::NETWORK_TARGET;

/// Aggregate outcome of [`confirm`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Confirmation {
    /// Every endpoint reported the success status.
    Confirmed,
    /// An endpoint decided the transaction with another status.
    NotAccepted {
        endpoint: NodeEndpoint,
        status: TxStatus,
    },
    /// Status polling failed on an endpoint.
    Unreachable {
        endpoint: NodeEndpoint,
        error: String,
    },
    /// An endpoint did not decide within the configured deadline.
    DeadlineExceeded { endpoint: NodeEndpoint },
}

impl Confirmation {
    pub fn is_confirmed(&self) -> bool {
        matches!(self, Confirmation::Confirmed)
    }
}

/// Poll `tx` on every endpoint until each one decides it.
///
/// Returns at the first endpoint that errors, misses `deadline` or decides
/// anything other than the success status of `tx.chain`. Remaining endpoints
/// are not polled.
pub async fn confirm(
    connector: &dyn Connector,
    endpoints: &[NodeEndpoint],
    tx: &TxRecord,
    poll_interval: Duration,
    deadline: Option<Duration>,
) -> Confirmation {
    let expected = tx.chain.success_status();

    for endpoint in endpoints {
        let node = connector.node(endpoint);
        let started = Instant::now();
        let polled = await_decided(node.as_ref(), tx.chain, &tx.id, poll_interval);

        let result = match deadline {
            Some(limit) => match tokio::time::timeout(limit, polled).await {
                Ok(result) => result,
                Err(_) => {
                    warn!(
                        target: NETWORK_TARGET,
                        tx = %tx.id,
                        %endpoint,
                        deadline_ms = limit.as_millis() as u64,
                        "Transaction not decided before deadline"
                    );
                    return Confirmation::DeadlineExceeded {
                        endpoint: endpoint.clone(),
                    };
                }
            },
            None => polled.await,
        };

        match result {
            Ok(status) if status == expected => {
                debug!(
                    tx = %tx.id,
                    chain = %tx.chain,
                    %endpoint,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Confirmed transaction"
                );
            }
            Ok(status) => {
                warn!(tx = %tx.id, chain = %tx.chain, %endpoint, %status, "Transaction not accepted");
                return Confirmation::NotAccepted {
                    endpoint: endpoint.clone(),
                    status,
                };
            }
            Err(e) => {
                warn!(
                    target: NETWORK_TARGET,
                    tx = %tx.id,
                    %endpoint,
                    error = %e,
                    "Failed to poll transaction status"
                );
                return Confirmation::Unreachable {
                    endpoint: endpoint.clone(),
                    error: e.to_string(),
                };
            }
        }
    }

    info!(tx = %tx.id, chain = %tx.chain, kind = %tx.kind, "Confirmed transaction on all nodes");
    Confirmation::Confirmed
}

/// Poll until the status is decided under the rules of `chain`.
async fn await_decided(
    node: &dyn NodeClient,
    chain: Chain,
    tx: &TxId,
    interval: Duration,
) -> Result<TxStatus, ClientError> {
    loop {
        let status = node.tx_status(chain, tx).await?;
        if chain.is_decided(status) {
            return Ok(status);
        }
        tokio::time::sleep(interval).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    use ledgersoak_core::{units, Address, Output, Owners, TxKind};
    use ledgersoak_crypto::SigningKeypair;
    use ledgersoak_sim::{NodeFaults, SimCluster, SimConfig};

    const POLL: Duration = Duration::from_millis(2);

    async fn issue_transfer(cluster: &SimCluster) -> TxRecord {
        let wallet = cluster
            .wallet(&cluster.endpoints()[0], &SigningKeypair::genesis())
            .await
            .unwrap();
        wallet
            .issue_base_tx(vec![Output::transfer(
                cluster.native_asset(),
                units::COIN,
                Owners::single(Address([5u8; 20])),
            )])
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_confirmed_on_all_nodes() {
        let cluster = SimCluster::new(SimConfig::default().with_nodes(4));
        let tx = issue_transfer(&cluster).await;
        let outcome = confirm(&cluster, &cluster.endpoints(), &tx, POLL, None).await;
        assert_eq!(outcome, Confirmation::Confirmed);
    }

    #[tokio::test]
    async fn test_waits_through_processing() {
        let faults = NodeFaults {
            pending_polls: 5,
            ..Default::default()
        };
        let cluster = SimCluster::new(SimConfig::default().with_nodes(2).with_faults(1, faults));
        let tx = issue_transfer(&cluster).await;
        let outcome = confirm(&cluster, &cluster.endpoints(), &tx, POLL, None).await;
        assert!(outcome.is_confirmed());
    }

    #[tokio::test]
    async fn test_single_rejecting_node_fails_confirmation() {
        // Whichever position the faulty node holds, the result is the same.
        for faulty in 0..3 {
            let faults = NodeFaults {
                reject_txs: true,
                ..Default::default()
            };
            let cluster = SimCluster::new(
                SimConfig::default().with_nodes(3).with_faults(faulty, faults),
            );
            let wallet_node = (faulty + 1) % 3;
            let wallet = cluster
                .wallet(&cluster.endpoints()[wallet_node], &SigningKeypair::genesis())
                .await
                .unwrap();
            let tx = wallet
                .issue_base_tx(vec![Output::transfer(
                    cluster.native_asset(),
                    units::COIN,
                    Owners::single(Address([5u8; 20])),
                )])
                .await
                .unwrap();

            let outcome = confirm(&cluster, &cluster.endpoints(), &tx, POLL, None).await;
            assert_eq!(
                outcome,
                Confirmation::NotAccepted {
                    endpoint: cluster.endpoints()[faulty].clone(),
                    status: TxStatus::Rejected,
                }
            );
        }
    }

    #[tokio::test]
    async fn test_unreachable_node_stops_confirmation() {
        let faults = NodeFaults {
            unreachable: true,
            ..Default::default()
        };
        let cluster = SimCluster::new(SimConfig::default().with_nodes(3).with_faults(1, faults));
        let tx = issue_transfer(&cluster).await;
        let outcome = confirm(&cluster, &cluster.endpoints(), &tx, POLL, None).await;
        assert!(matches!(
            outcome,
            Confirmation::Unreachable { endpoint, .. } if endpoint == cluster.endpoints()[1]
        ));
    }

    #[tokio::test]
    async fn test_deadline_bounds_hung_node() {
        let faults = NodeFaults {
            pending_polls: u32::MAX,
            ..Default::default()
        };
        let cluster = SimCluster::new(SimConfig::default().with_nodes(2).with_faults(0, faults));
        let wallet = cluster
            .wallet(&cluster.endpoints()[1], &SigningKeypair::genesis())
            .await
            .unwrap();
        let tx = wallet
            .issue_base_tx(vec![Output::transfer(
                cluster.native_asset(),
                units::COIN,
                Owners::single(Address([5u8; 20])),
            )])
            .await
            .unwrap();

        let outcome = confirm(
            &cluster,
            &cluster.endpoints(),
            &tx,
            POLL,
            Some(Duration::from_millis(30)),
        )
        .await;
        assert_eq!(
            outcome,
            Confirmation::DeadlineExceeded {
                endpoint: cluster.endpoints()[0].clone()
            }
        );
    }

    #[tokio::test]
    async fn test_platform_unknown_is_decided_failure() {
        let cluster = SimCluster::new(SimConfig::default().with_nodes(1));
        let tx = TxRecord {
            id: TxId([8u8; 32]),
            chain: Chain::Platform,
            kind: TxKind::Import,
            consumed: BTreeSet::new(),
        };
        let outcome = confirm(&cluster, &cluster.endpoints(), &tx, POLL, None).await;
        assert!(matches!(
            outcome,
            Confirmation::NotAccepted {
                status: TxStatus::Unknown,
                ..
            }
        ));
    }
}
