//! Simulated cluster and its node clients

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use ledgersoak_client::{ClientError, Connector, NodeClient, Result, UtxoPage, UtxoQuery, Wallet};
use ledgersoak_core::{
    Address, AssetId, Chain, FeeSchedule, HealthReport, NodeEndpoint, Output, Owners, TxId,
    TxKind, TxRecord, TxStatus, Utxo, UtxoId, UtxoRef,
};
use ledgersoak_crypto::{address_of, hash, verify_signature, SigningKeypair};
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::ledger::{Ledger, SimTx};
use crate::wallet::SimWallet;
use crate::{NodeFaults, SimConfig};

struct SimNode {
    ledger: Ledger,
    faults: NodeFaults,
    health_polls: u32,
    status_polls: HashMap<TxId, u32>,
}

struct ClusterState {
    /// Consensus view; never subject to faults.
    canonical: Ledger,
    nodes: Vec<SimNode>,
    nonce: u64,
    accepted: u64,
    injected: HashMap<TxKind, u32>,
}

/// In-memory replicated cluster.
///
/// Cloning is cheap; every clone shares the same state.
#[derive(Clone)]
pub struct SimCluster {
    state: Arc<Mutex<ClusterState>>,
    config: Arc<SimConfig>,
    endpoints: Arc<[NodeEndpoint]>,
    native_asset: AssetId,
}

impl SimCluster {
    pub fn new(config: SimConfig) -> Self {
        let native_asset = AssetId(hash(b"ledgersoak native asset"));
        let genesis_tx = TxId([0u8; 32]);

        let mut genesis = Ledger::new();
        for (index, (chain, amount)) in [
            (Chain::Asset, config.genesis_asset_balance),
            (Chain::Platform, config.genesis_platform_balance),
        ]
        .into_iter()
        .enumerate()
        {
            genesis.credit(Utxo {
                key: UtxoRef::new(chain, UtxoId::derive(&genesis_tx, index as u32)),
                output: Output::transfer(native_asset, amount, Owners::single(config.genesis_address)),
            });
        }

        let nodes = (0..config.nodes)
            .map(|i| SimNode {
                ledger: genesis.clone(),
                faults: config.faults_for(i),
                health_polls: 0,
                status_polls: HashMap::new(),
            })
            .collect();

        let endpoints: Arc<[NodeEndpoint]> = (0..config.nodes)
            .map(|i| NodeEndpoint::new(format!("sim://node-{}", i)))
            .collect();

        info!(nodes = config.nodes, "Simulated cluster created");

        Self {
            state: Arc::new(Mutex::new(ClusterState {
                canonical: genesis,
                nodes,
                nonce: 0,
                accepted: 0,
                injected: HashMap::new(),
            })),
            config: Arc::new(config),
            endpoints,
            native_asset,
        }
    }

    pub fn endpoints(&self) -> Vec<NodeEndpoint> {
        self.endpoints.to_vec()
    }

    pub fn native_asset(&self) -> AssetId {
        self.native_asset
    }

    pub fn fees(&self, chain: Chain) -> FeeSchedule {
        match chain {
            Chain::Asset => self.config.asset_fees,
            Chain::Platform => self.config.platform_fees,
        }
    }

    pub fn node_index(&self, endpoint: &NodeEndpoint) -> Option<usize> {
        self.endpoints.iter().position(|e| e == endpoint)
    }

    /// Replace the faults of node `index`. Poll counters restart.
    pub fn set_faults(&self, index: usize, faults: NodeFaults) {
        let mut state = self.state.lock();
        if let Some(node) = state.nodes.get_mut(index) {
            node.faults = faults;
            node.health_polls = 0;
            node.status_polls.clear();
        }
    }

    /// Refuse the next `count` issuances of `kind` before they reach any node.
    pub fn reject_next(&self, kind: TxKind, count: u32) {
        *self.state.lock().injected.entry(kind).or_default() += count;
    }

    /// Number of transactions accepted by consensus so far.
    pub fn accepted_count(&self) -> u64 {
        self.state.lock().accepted
    }

    /// Status of `tx` on node `index`, bypassing faults.
    pub fn status_on(&self, index: usize, chain: Chain, tx: &TxId) -> TxStatus {
        self.state
            .lock()
            .nodes
            .get(index)
            .map(|n| n.ledger.status(chain, tx))
            .unwrap_or(TxStatus::Unknown)
    }

    /// Whether node `index` still stores `key` as unspent.
    pub fn holds_utxo(&self, index: usize, key: &UtxoRef) -> bool {
        self.state
            .lock()
            .nodes
            .get(index)
            .map(|n| n.ledger.contains(key))
            .unwrap_or(false)
    }

    pub(crate) fn next_nonce(&self) -> u64 {
        let mut state = self.state.lock();
        state.nonce += 1;
        state.nonce
    }

    fn unreachable(&self, index: usize) -> ClientError {
        ClientError::Unreachable {
            endpoint: self.endpoints[index].to_string(),
            reason: "connection refused".to_string(),
        }
    }

    /// Outputs spendable by `addresses`, as seen by node `index`.
    pub(crate) fn owned_utxos(
        &self,
        index: usize,
        chain: Chain,
        source: Chain,
        addresses: &BTreeSet<Address>,
    ) -> Result<Vec<Utxo>> {
        let state = self.state.lock();
        let node = &state.nodes[index];
        if node.faults.unreachable {
            return Err(self.unreachable(index));
        }
        Ok(node.ledger.owned(chain, source, addresses))
    }

    /// Validate a signed transaction against consensus and replicate it.
    pub(crate) fn submit(&self, tx: SimTx, signature: &[u8; 64]) -> Result<TxRecord> {
        let mut state = self.state.lock();

        if let Some(pending) = state.injected.get_mut(&tx.kind) {
            if *pending > 0 {
                *pending -= 1;
                return Err(ClientError::Rejected(format!("{} refused by injected fault", tx.kind)));
            }
        }

        let bytes = tx.signing_bytes().map_err(ClientError::Rejected)?;
        if !verify_signature(&tx.signer, &bytes, signature) {
            return Err(ClientError::Rejected("invalid signature".into()));
        }
        let id = TxId(hash(&bytes));
        let signer = address_of(&tx.signer);

        state
            .canonical
            .validate(&tx, signer, &self.fees(tx.chain), self.native_asset)
            .map_err(ClientError::Rejected)?;
        state.canonical.apply(id, &tx, true);
        state.accepted += 1;

        let rejected = match tx.chain {
            Chain::Asset => TxStatus::Rejected,
            Chain::Platform => TxStatus::Aborted,
        };
        for node in state.nodes.iter_mut() {
            if node.faults.reject_txs {
                node.ledger.record_status(tx.chain, id, rejected);
            } else {
                node.ledger.apply(id, &tx, !node.faults.skip_spends);
            }
        }

        debug!(tx = %id, chain = %tx.chain, kind = %tx.kind, "Transaction replicated");

        Ok(TxRecord {
            id,
            chain: tx.chain,
            kind: tx.kind,
            consumed: tx.inputs.iter().copied().collect(),
        })
    }
}

#[async_trait]
impl Connector for SimCluster {
    fn node(&self, endpoint: &NodeEndpoint) -> Arc<dyn NodeClient> {
        Arc::new(SimNodeClient {
            cluster: self.clone(),
            index: self.node_index(endpoint),
            endpoint: endpoint.clone(),
        })
    }

    async fn wallet(
        &self,
        endpoint: &NodeEndpoint,
        keypair: &SigningKeypair,
    ) -> Result<Arc<dyn Wallet>> {
        let index = self
            .node_index(endpoint)
            .ok_or_else(|| ClientError::WalletInit(format!("unknown endpoint {}", endpoint)))?;
        if self.state.lock().nodes[index].faults.unreachable {
            return Err(ClientError::WalletInit(self.unreachable(index).to_string()));
        }
        Ok(Arc::new(SimWallet::new(self.clone(), index, keypair.clone())))
    }
}

/// Read-side client for one simulated node
pub struct SimNodeClient {
    cluster: SimCluster,
    /// `None` when the endpoint is not part of the cluster.
    index: Option<usize>,
    endpoint: NodeEndpoint,
}

impl SimNodeClient {
    fn with_node<T>(&self, f: impl FnOnce(&mut SimNode) -> T) -> Result<T> {
        let unreachable = || ClientError::Unreachable {
            endpoint: self.endpoint.to_string(),
            reason: "connection refused".to_string(),
        };
        let index = self.index.ok_or_else(unreachable)?;
        let mut state = self.cluster.state.lock();
        let node = &mut state.nodes[index];
        if node.faults.unreachable {
            return Err(unreachable());
        }
        Ok(f(node))
    }
}

#[async_trait]
impl NodeClient for SimNodeClient {
    fn endpoint(&self) -> &NodeEndpoint {
        &self.endpoint
    }

    async fn health(&self) -> Result<HealthReport> {
        self.with_node(|node| {
            let healthy = node.health_polls >= node.faults.unhealthy_polls;
            if !healthy {
                node.health_polls += 1;
            }
            HealthReport { healthy }
        })
    }

    async fn tx_status(&self, chain: Chain, tx: &TxId) -> Result<TxStatus> {
        self.with_node(|node| {
            let polls = node.status_polls.entry(*tx).or_default();
            if *polls < node.faults.pending_polls {
                *polls += 1;
                return TxStatus::Processing;
            }
            node.ledger.status(chain, tx)
        })
    }

    async fn utxos(&self, query: &UtxoQuery) -> Result<UtxoPage> {
        let addresses: BTreeSet<Address> = query.addresses.iter().copied().collect();
        self.with_node(|node| {
            let utxos: Vec<Utxo> = node
                .ledger
                .owned(query.chain, query.source_chain, &addresses)
                .into_iter()
                .filter(|u| query.start_after.map_or(true, |after| u.key.id > after))
                .take(query.limit as usize)
                .collect();
            let end = utxos.last().map(|u| u.key.id);
            UtxoPage { utxos, end }
        })
    }
}
