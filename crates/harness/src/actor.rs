//! Actors and their bootstrap
//!
//! The genesis actor owns the pre-funded key. Every other actor gets a fresh
//! key, a funding transfer from genesis that must be confirmed on every node,
//! and a wallet bound to endpoint `id % endpoints.len()`.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;

use ledgersoak_client::{Connector, Wallet};
use ledgersoak_core::{Address, NodeEndpoint, Output, Owners};
use ledgersoak_crypto::{KeyError, SigningKeypair};
use tracing::info;

use crate::{confirm, BootstrapError, HarnessConfig};

/// Produces the key of each non-genesis actor.
pub type KeySource = Arc<dyn Fn() -> Result<SigningKeypair, KeyError> + Send + Sync>;

/// One independent workload driver
#[derive(Clone)]
pub struct Actor {
    pub id: usize,
    pub wallet: Arc<dyn Wallet>,
    pub addresses: BTreeSet<Address>,
    pub endpoints: Arc<[NodeEndpoint]>,
}

impl Actor {
    /// Owner set spending to this actor's first address.
    pub fn owner(&self) -> Owners {
        let address = self.addresses.iter().next().copied().unwrap_or_default();
        Owners::single(address)
    }

    pub fn address_list(&self) -> Vec<Address> {
        self.addresses.iter().copied().collect()
    }
}

impl std::fmt::Debug for Actor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Actor")
            .field("id", &self.id)
            .field("addresses", &self.addresses)
            .finish()
    }
}

async fn open_wallet(
    connector: &dyn Connector,
    endpoint: &NodeEndpoint,
    keypair: &SigningKeypair,
    actor: usize,
) -> Result<Arc<dyn Wallet>, BootstrapError> {
    let started = Instant::now();
    let wallet = connector
        .wallet(endpoint, keypair)
        .await
        .map_err(|source| BootstrapError::WalletInit { actor, source })?;
    info!(
        actor,
        %endpoint,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Synced wallet"
    );
    Ok(wallet)
}

/// Build `config.actors` actors, funding each non-genesis one from genesis.
///
/// Any failure is fatal: no partial actor set is returned.
pub async fn bootstrap(
    connector: &dyn Connector,
    config: &HarnessConfig,
    genesis: &SigningKeypair,
    keys: &KeySource,
) -> Result<Vec<Actor>, BootstrapError> {
    let endpoints: Arc<[NodeEndpoint]> = config.endpoints.iter().cloned().collect();

    let wallet_endpoint = |id| config.wallet_endpoint(id).ok_or(BootstrapError::NoEndpoints);

    let genesis_wallet = open_wallet(connector, wallet_endpoint(0)?, genesis, 0).await?;
    let native = genesis_wallet.native_asset();

    let mut actors = Vec::with_capacity(config.actors);
    actors.push(Actor {
        id: 0,
        wallet: genesis_wallet.clone(),
        addresses: BTreeSet::from([genesis.address()]),
        endpoints: endpoints.clone(),
    });

    for id in 1..config.actors {
        let keypair = keys()?;
        let address = keypair.address();

        let started = Instant::now();
        let funding = genesis_wallet
            .issue_base_tx(vec![Output::transfer(
                native,
                config.funding_amount,
                Owners::single(address),
            )])
            .await
            .map_err(|source| BootstrapError::FundingIssue { actor: id, source })?;
        info!(
            actor = id,
            tx = %funding.id,
            %address,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Issued funding transfer"
        );

        let confirmation = confirm(
            connector,
            &endpoints,
            &funding,
            config.poll_interval,
            config.confirm_deadline,
        )
        .await;
        if !confirmation.is_confirmed() {
            return Err(BootstrapError::FundingNotConfirmed {
                actor: id,
                tx: funding.id,
            });
        }

        let wallet = open_wallet(connector, wallet_endpoint(id)?, &keypair, id).await?;
        actors.push(Actor {
            id,
            wallet,
            addresses: BTreeSet::from([address]),
            endpoints: endpoints.clone(),
        });
    }

    info!(actors = actors.len(), "Bootstrap complete");
    Ok(actors)
}

/// Fresh keys from the operating system randomness source.
pub fn os_keys() -> KeySource {
    Arc::new(SigningKeypair::generate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use ledgersoak_core::Chain;
    use ledgersoak_sim::{NodeFaults, SimCluster, SimConfig};

    fn config(cluster: &SimCluster, actors: usize) -> HarnessConfig {
        HarnessConfig {
            actors,
            poll_interval: Duration::from_millis(2),
            ..HarnessConfig::new(cluster.endpoints())
        }
    }

    #[tokio::test]
    async fn test_bootstrap_funds_every_actor() {
        let cluster = SimCluster::new(SimConfig::default().with_nodes(3));
        let config = config(&cluster, 5);

        let actors = bootstrap(&cluster, &config, &SigningKeypair::genesis(), &os_keys())
            .await
            .unwrap();

        assert_eq!(actors.len(), 5);
        assert_eq!(cluster.accepted_count(), 4);
        for actor in &actors[1..] {
            let balances = actor.wallet.balances(Chain::Asset).await.unwrap();
            assert_eq!(balances[&cluster.native_asset()], config.funding_amount);
            assert_eq!(actor.endpoints.len(), 3);
        }
    }

    #[tokio::test]
    async fn test_key_generation_failure_is_fatal() {
        let cluster = SimCluster::new(SimConfig::default().with_nodes(1));
        let keys: KeySource = Arc::new(|| -> Result<SigningKeypair, KeyError> {
            Err(KeyError::Entropy(rand::Error::new("entropy exhausted")))
        });

        let err = bootstrap(&cluster, &config(&cluster, 3), &SigningKeypair::genesis(), &keys)
            .await
            .unwrap_err();
        assert!(matches!(err, BootstrapError::KeyGeneration(_)));
        assert_eq!(cluster.accepted_count(), 0);
    }

    #[tokio::test]
    async fn test_wallet_init_failure_is_fatal() {
        let faults = NodeFaults {
            unreachable: true,
            ..Default::default()
        };
        let cluster = SimCluster::new(SimConfig::default().with_nodes(2).with_faults(1, faults));
        let mut config = config(&cluster, 2);
        // Genesis wallet lands on the unreachable node.
        config.endpoints.reverse();

        let err = bootstrap(&cluster, &config, &SigningKeypair::genesis(), &os_keys())
            .await
            .unwrap_err();
        assert!(matches!(err, BootstrapError::WalletInit { actor: 0, .. }));
    }

    #[tokio::test]
    async fn test_unconfirmed_funding_is_fatal() {
        let faults = NodeFaults {
            reject_txs: true,
            ..Default::default()
        };
        let cluster = SimCluster::new(SimConfig::default().with_nodes(2).with_faults(1, faults));

        let err = bootstrap(&cluster, &config(&cluster, 2), &SigningKeypair::genesis(), &os_keys())
            .await
            .unwrap_err();
        assert!(matches!(err, BootstrapError::FundingNotConfirmed { actor: 1, .. }));
    }

    #[tokio::test]
    async fn test_no_endpoints_is_an_error() {
        let cluster = SimCluster::new(SimConfig::default().with_nodes(1));
        let err = bootstrap(&cluster, &HarnessConfig::default(), &SigningKeypair::genesis(), &os_keys())
            .await
            .unwrap_err();
        assert!(matches!(err, BootstrapError::NoEndpoints));
        assert_eq!(cluster.accepted_count(), 0);
    }

    #[tokio::test]
    async fn test_single_actor_needs_no_funding() {
        let cluster = SimCluster::new(SimConfig::default().with_nodes(1));
        let actors = bootstrap(&cluster, &config(&cluster, 1), &SigningKeypair::genesis(), &os_keys())
            .await
            .unwrap();
        assert_eq!(actors.len(), 1);
        assert_eq!(actors[0].owner(), Owners::single(SigningKeypair::genesis().address()));
        assert_eq!(cluster.accepted_count(), 0);
    }
}
