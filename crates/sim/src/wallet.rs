//! Wallet building and signing transactions against one simulated node

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use ledgersoak_client::{ClientError, Result, Wallet};
use ledgersoak_core::{
    Address, AssetDefinition, AssetId, Balances, Chain, FeeSchedule, Output, OutputKind, Owners,
    TxKind, TxRecord, UtxoRef,
};
use ledgersoak_crypto::{sign_data, SigningKeypair};

use crate::ledger::SimTx;
use crate::SimCluster;

/// Wallet bound to the node it syncs UTXOs from
pub struct SimWallet {
    cluster: SimCluster,
    node: usize,
    keypair: SigningKeypair,
    addresses: BTreeSet<Address>,
}

/// Inputs chosen for a spend plus the change returned to the wallet
struct Selection {
    inputs: Vec<UtxoRef>,
    change: Vec<Output>,
}

impl SimWallet {
    pub(crate) fn new(cluster: SimCluster, node: usize, keypair: SigningKeypair) -> Self {
        let addresses = BTreeSet::from([keypair.address()]);
        Self {
            cluster,
            node,
            keypair,
            addresses,
        }
    }

    fn owner(&self) -> Owners {
        Owners::single(self.keypair.address())
    }

    /// Pick transfer outputs on `chain` covering `needs`, largest first.
    fn select(&self, chain: Chain, needs: &BTreeMap<AssetId, u64>) -> Result<Selection> {
        let owned = self
            .cluster
            .owned_utxos(self.node, chain, chain, &self.addresses)?;

        let mut selection = Selection {
            inputs: Vec::new(),
            change: Vec::new(),
        };
        for (asset, needed) in needs {
            if *needed == 0 {
                continue;
            }
            let mut candidates: Vec<_> = owned
                .iter()
                .filter(|u| u.output.asset == *asset)
                .filter(|u| matches!(u.output.kind, OutputKind::Transfer { .. }))
                .collect();
            candidates.sort_by(|a, b| b.output.amount().cmp(&a.output.amount()));

            let mut gathered = 0u64;
            for utxo in candidates {
                if gathered >= *needed {
                    break;
                }
                gathered = gathered.saturating_add(utxo.output.amount());
                selection.inputs.push(utxo.key);
            }
            if gathered < *needed {
                return Err(ClientError::InsufficientFunds {
                    needed: *needed,
                    available: gathered,
                });
            }
            if gathered > *needed {
                selection
                    .change
                    .push(Output::transfer(*asset, gathered - needed, self.owner()));
            }
        }
        Ok(selection)
    }

    /// Sum of fungible amounts in `outputs`, plus `fee` in the native asset.
    fn needs(&self, outputs: &[Output], fee: u64) -> BTreeMap<AssetId, u64> {
        let mut needs = BTreeMap::new();
        for output in outputs {
            *needs.entry(output.asset).or_insert(0u64) += output.amount();
        }
        *needs.entry(self.cluster.native_asset()).or_insert(0) += fee;
        needs
    }

    fn submit(&self, mut tx: SimTx) -> Result<TxRecord> {
        tx.signer = self.keypair.public_key_bytes();
        tx.nonce = self.cluster.next_nonce();
        let bytes = tx.signing_bytes().map_err(ClientError::Rejected)?;
        let signature = sign_data(&self.keypair, &bytes);
        self.cluster.submit(tx, &signature)
    }

    fn body(chain: Chain, kind: TxKind, inputs: Vec<UtxoRef>, outputs: Vec<Output>) -> SimTx {
        SimTx {
            chain,
            kind,
            signer: [0u8; 32],
            inputs,
            outputs,
            exports: Vec::new(),
            destination: None,
            created: None,
            nonce: 0,
        }
    }
}

#[async_trait]
impl Wallet for SimWallet {
    fn addresses(&self) -> &BTreeSet<Address> {
        &self.addresses
    }

    fn native_asset(&self) -> AssetId {
        self.cluster.native_asset()
    }

    fn fees(&self, chain: Chain) -> FeeSchedule {
        self.cluster.fees(chain)
    }

    async fn balances(&self, chain: Chain) -> Result<Balances> {
        let owned = self
            .cluster
            .owned_utxos(self.node, chain, chain, &self.addresses)?;
        let mut balances = Balances::new();
        for utxo in owned {
            if let OutputKind::Transfer { amount } = utxo.output.kind {
                let entry = balances.entry(utxo.output.asset).or_insert(0);
                *entry = entry.saturating_add(amount);
            }
        }
        Ok(balances)
    }

    async fn issue_base_tx(&self, outputs: Vec<Output>) -> Result<TxRecord> {
        let fee = self.fees(Chain::Asset).base_tx_fee;
        let selection = self.select(Chain::Asset, &self.needs(&outputs, fee))?;
        let mut all = outputs;
        all.extend(selection.change);
        self.submit(Self::body(Chain::Asset, TxKind::Base, selection.inputs, all))
    }

    async fn issue_create_asset_tx(&self, definition: AssetDefinition) -> Result<TxRecord> {
        let fee = self.fees(Chain::Asset).create_asset_tx_fee;
        let selection = self.select(Chain::Asset, &self.needs(&[], fee))?;
        let mut tx = Self::body(
            Chain::Asset,
            TxKind::CreateAsset,
            selection.inputs,
            selection.change,
        );
        tx.created = Some(definition);
        self.submit(tx)
    }

    async fn issue_mint_property_tx(&self, asset: AssetId, owners: Owners) -> Result<TxRecord> {
        let owned = self
            .cluster
            .owned_utxos(self.node, Chain::Asset, Chain::Asset, &self.addresses)?;
        let mint = owned
            .into_iter()
            .find(|u| u.output.asset == asset && u.output.kind == OutputKind::Mint)
            .ok_or_else(|| ClientError::Rejected(format!("no mint output for {}", asset)))?;

        let fee = self.fees(Chain::Asset).base_tx_fee;
        let selection = self.select(Chain::Asset, &self.needs(&[], fee))?;

        let mut inputs = vec![mint.key];
        inputs.extend(selection.inputs);
        let mut outputs = vec![
            Output {
                asset,
                kind: OutputKind::Mint,
                owners: mint.output.owners,
            },
            Output {
                asset,
                kind: OutputKind::Property,
                owners,
            },
        ];
        outputs.extend(selection.change);
        self.submit(Self::body(Chain::Asset, TxKind::MintProperty, inputs, outputs))
    }

    async fn issue_export_tx(
        &self,
        source: Chain,
        destination: Chain,
        outputs: Vec<Output>,
    ) -> Result<TxRecord> {
        let fee = self.fees(source).base_tx_fee;
        let selection = self.select(source, &self.needs(&outputs, fee))?;
        let mut tx = Self::body(source, TxKind::Export, selection.inputs, selection.change);
        tx.exports = outputs;
        tx.destination = Some(destination);
        self.submit(tx)
    }

    async fn issue_import_tx(
        &self,
        destination: Chain,
        source: Chain,
        owners: Owners,
    ) -> Result<TxRecord> {
        let shared = self
            .cluster
            .owned_utxos(self.node, destination, source, &self.addresses)?;

        let mut inputs = Vec::new();
        let mut totals: BTreeMap<AssetId, u64> = BTreeMap::new();
        for utxo in shared {
            if let OutputKind::Transfer { amount } = utxo.output.kind {
                let entry = totals.entry(utxo.output.asset).or_insert(0);
                *entry = entry.saturating_add(amount);
                inputs.push(utxo.key);
            }
        }
        if inputs.is_empty() {
            return Err(ClientError::Rejected(format!(
                "nothing exported from {} to import on {}",
                source, destination
            )));
        }

        // The fee comes out of the imported funds, topped up locally if short.
        let native = self.native_asset();
        let fee = self.fees(destination).base_tx_fee;
        let imported = totals.get(&native).copied().unwrap_or(0);
        let mut outputs = Vec::new();
        if imported >= fee {
            totals.insert(native, imported - fee);
        } else {
            let shortfall = BTreeMap::from([(native, fee - imported)]);
            let selection = self.select(destination, &shortfall)?;
            inputs.extend(selection.inputs);
            outputs.extend(selection.change);
            totals.insert(native, 0);
        }
        outputs.extend(
            totals
                .into_iter()
                .filter(|(_, amount)| *amount > 0)
                .map(|(asset, amount)| Output::transfer(asset, amount, owners.clone())),
        );

        self.submit(Self::body(destination, TxKind::Import, inputs, outputs))
    }
}
