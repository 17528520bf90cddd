//! Per-node ledger state and transaction application

use std::collections::{BTreeMap, BTreeSet, HashMap};

use ledgersoak_core::{
    Address, AssetDefinition, AssetId, Chain, FeeSchedule, Output, OutputKind, TxId, TxKind,
    TxStatus, Utxo, UtxoId, UtxoRef,
};
use ledgersoak_crypto::hash;
use serde::Serialize;

/// Unsigned transaction body as built by a simulated wallet
#[derive(Debug, Clone, Serialize)]
pub(crate) struct SimTx {
    pub chain: Chain,
    pub kind: TxKind,
    pub signer: [u8; 32],
    pub inputs: Vec<UtxoRef>,
    pub outputs: Vec<Output>,
    /// Outputs placed in the shared memory of `destination`
    pub exports: Vec<Output>,
    pub destination: Option<Chain>,
    /// New asset; its initial states become outputs owned by the asset id
    pub created: Option<AssetDefinition>,
    pub nonce: u64,
}

impl SimTx {
    pub fn signing_bytes(&self) -> Result<Vec<u8>, String> {
        bincode::serialize(self).map_err(|e| format!("encode: {}", e))
    }

    pub fn id(&self) -> Result<TxId, String> {
        Ok(TxId(hash(&self.signing_bytes()?)))
    }

    /// Outputs the transaction creates locally, with their final asset ids.
    fn local_outputs(&self, id: &TxId) -> Vec<Output> {
        let mut outputs = self.outputs.clone();
        if let Some(definition) = &self.created {
            let asset = AssetId(id.0);
            outputs.extend(definition.initial_states.iter().map(|state| Output {
                asset,
                kind: state.kind.clone(),
                owners: state.owners.clone(),
            }));
        }
        outputs
    }
}

/// One chain as stored by one node
#[derive(Debug, Clone, Default)]
pub(crate) struct ChainLedger {
    pub utxos: BTreeMap<UtxoId, Utxo>,
    /// Exported outputs waiting for import, keyed by source chain
    pub shared: BTreeMap<Chain, BTreeMap<UtxoId, Utxo>>,
    pub statuses: HashMap<TxId, TxStatus>,
}

#[derive(Debug, Clone)]
pub(crate) struct Ledger {
    chains: BTreeMap<Chain, ChainLedger>,
}

impl Ledger {
    pub fn new() -> Self {
        Self {
            chains: Chain::ALL
                .iter()
                .map(|chain| (*chain, ChainLedger::default()))
                .collect(),
        }
    }

    pub fn chain(&self, chain: Chain) -> Option<&ChainLedger> {
        self.chains.get(&chain)
    }

    fn chain_mut(&mut self, chain: Chain) -> &mut ChainLedger {
        self.chains.entry(chain).or_default()
    }

    /// Seed an output outside of any transaction.
    pub fn credit(&mut self, utxo: Utxo) {
        self.chain_mut(utxo.key.chain)
            .utxos
            .insert(utxo.key.id, utxo);
    }

    pub fn status(&self, chain: Chain, tx: &TxId) -> TxStatus {
        self.chain(chain)
            .and_then(|c| c.statuses.get(tx).copied())
            .unwrap_or(TxStatus::Unknown)
    }

    pub fn record_status(&mut self, chain: Chain, tx: TxId, status: TxStatus) {
        self.chain_mut(chain).statuses.insert(tx, status);
    }

    pub fn contains(&self, key: &UtxoRef) -> bool {
        self.chain(key.chain)
            .map(|c| c.utxos.contains_key(&key.id))
            .unwrap_or(false)
    }

    /// Outputs on `chain` (or in its shared memory from `source`) spendable by `addresses`.
    pub fn owned(&self, chain: Chain, source: Chain, addresses: &BTreeSet<Address>) -> Vec<Utxo> {
        let Some(ledger) = self.chain(chain) else {
            return Vec::new();
        };
        let pool = if source == chain {
            Some(&ledger.utxos)
        } else {
            ledger.shared.get(&source)
        };
        pool.map(|utxos| {
            utxos
                .values()
                .filter(|u| u.output.owners.is_spendable_by(addresses))
                .cloned()
                .collect()
        })
        .unwrap_or_default()
    }

    /// Resolve an input of a transaction issued on `chain`.
    fn lookup_input(&self, chain: Chain, input: &UtxoRef) -> Option<&Utxo> {
        let ledger = self.chain(chain)?;
        if input.chain == chain {
            ledger.utxos.get(&input.id)
        } else {
            ledger.shared.get(&input.chain)?.get(&input.id)
        }
    }

    /// Check `tx` against this ledger. Returns the rejection reason on failure.
    pub fn validate(
        &self,
        tx: &SimTx,
        signer: Address,
        fees: &FeeSchedule,
        native: AssetId,
    ) -> Result<(), String> {
        match tx.kind {
            TxKind::Base | TxKind::CreateAsset | TxKind::MintProperty if tx.chain != Chain::Asset => {
                return Err(format!("{} not supported on {}", tx.kind, tx.chain));
            }
            TxKind::Export => match tx.destination {
                Some(destination) if destination != tx.chain => {}
                _ => return Err("export needs a distinct destination chain".into()),
            },
            _ => {}
        }
        if tx.kind != TxKind::Export && !tx.exports.is_empty() {
            return Err(format!("{} cannot export outputs", tx.kind));
        }
        if (tx.kind == TxKind::CreateAsset) != tx.created.is_some() {
            return Err("asset definition only allowed on create-asset".into());
        }
        if tx.inputs.is_empty() {
            return Err("no inputs".into());
        }

        let unique: BTreeSet<&UtxoRef> = tx.inputs.iter().collect();
        if unique.len() != tx.inputs.len() {
            return Err("duplicate input".into());
        }

        let signers = BTreeSet::from([signer]);
        let mut spent: BTreeMap<AssetId, u128> = BTreeMap::new();
        let mut mint_inputs: BTreeSet<AssetId> = BTreeSet::new();
        for input in &tx.inputs {
            if input.chain != tx.chain && tx.kind != TxKind::Import {
                return Err(format!("cross-chain input {} outside import", input));
            }
            let utxo = self
                .lookup_input(tx.chain, input)
                .ok_or_else(|| format!("missing input {}", input))?;
            if !utxo.output.owners.is_spendable_by(&signers) {
                return Err(format!("input {} not owned by signer", input));
            }
            match utxo.output.kind {
                OutputKind::Transfer { amount } => {
                    *spent.entry(utxo.output.asset).or_default() += u128::from(amount);
                }
                OutputKind::Mint => {
                    mint_inputs.insert(utxo.output.asset);
                }
                OutputKind::Property => {}
            }
        }

        let mut produced: BTreeMap<AssetId, u128> = BTreeMap::new();
        for output in tx.outputs.iter().chain(tx.exports.iter()) {
            match output.kind {
                OutputKind::Transfer { amount } => {
                    *produced.entry(output.asset).or_default() += u128::from(amount);
                }
                OutputKind::Mint | OutputKind::Property => {
                    if !mint_inputs.contains(&output.asset) {
                        return Err(format!("mint of {} without its mint output", output.asset));
                    }
                }
            }
        }

        let fee = match tx.kind {
            TxKind::CreateAsset => fees.create_asset_tx_fee,
            _ => fees.base_tx_fee,
        };
        *produced.entry(native).or_default() += u128::from(fee);

        let assets: BTreeSet<&AssetId> = spent.keys().chain(produced.keys()).collect();
        for asset in assets {
            let consumed = spent.get(asset).copied().unwrap_or(0);
            let created = produced.get(asset).copied().unwrap_or(0);
            if consumed != created {
                return Err(format!(
                    "asset {} unbalanced: {} in, {} out",
                    asset, consumed, created
                ));
            }
        }

        Ok(())
    }

    /// Apply a validated transaction. With `spend_inputs` false the consumed
    /// outputs are left in place.
    pub fn apply(&mut self, id: TxId, tx: &SimTx, spend_inputs: bool) {
        if spend_inputs {
            let chain = self.chain_mut(tx.chain);
            for input in &tx.inputs {
                if input.chain == tx.chain {
                    chain.utxos.remove(&input.id);
                } else if let Some(pool) = chain.shared.get_mut(&input.chain) {
                    pool.remove(&input.id);
                }
            }
        }

        let mut index = 0u32;
        for output in tx.local_outputs(&id) {
            let key = UtxoRef::new(tx.chain, UtxoId::derive(&id, index));
            self.chain_mut(tx.chain).utxos.insert(key.id, Utxo { key, output });
            index += 1;
        }

        if let Some(destination) = tx.destination {
            let pool = self
                .chain_mut(destination)
                .shared
                .entry(tx.chain)
                .or_default();
            for output in &tx.exports {
                let key = UtxoRef::new(tx.chain, UtxoId::derive(&id, index));
                pool.insert(key.id, Utxo {
                    key,
                    output: output.clone(),
                });
                index += 1;
            }
        }

        self.record_status(tx.chain, id, tx.chain.success_status());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledgersoak_core::Owners;

    const NATIVE: AssetId = AssetId([9u8; 32]);

    fn fees() -> FeeSchedule {
        FeeSchedule {
            base_tx_fee: 10,
            create_asset_tx_fee: 100,
        }
    }

    fn seeded(owner: Address, amount: u64) -> (Ledger, UtxoRef) {
        let mut ledger = Ledger::new();
        let key = UtxoRef::new(Chain::Asset, UtxoId([1u8; 32]));
        ledger.credit(Utxo {
            key,
            output: Output::transfer(NATIVE, amount, Owners::single(owner)),
        });
        (ledger, key)
    }

    fn transfer(input: UtxoRef, owner: Address, amounts: &[u64]) -> SimTx {
        SimTx {
            chain: Chain::Asset,
            kind: TxKind::Base,
            signer: [0u8; 32],
            inputs: vec![input],
            outputs: amounts
                .iter()
                .map(|a| Output::transfer(NATIVE, *a, Owners::single(owner)))
                .collect(),
            exports: vec![],
            destination: None,
            created: None,
            nonce: 0,
        }
    }

    #[test]
    fn test_balanced_transfer_is_valid() {
        let owner = Address([1u8; 20]);
        let (ledger, input) = seeded(owner, 1_000);
        let tx = transfer(input, owner, &[400, 590]);
        assert!(ledger.validate(&tx, owner, &fees(), NATIVE).is_ok());
    }

    #[test]
    fn test_fee_must_be_paid() {
        let owner = Address([1u8; 20]);
        let (ledger, input) = seeded(owner, 1_000);
        let tx = transfer(input, owner, &[1_000]);
        let err = ledger.validate(&tx, owner, &fees(), NATIVE).unwrap_err();
        assert!(err.contains("unbalanced"));
    }

    #[test]
    fn test_foreign_input_rejected() {
        let owner = Address([1u8; 20]);
        let thief = Address([2u8; 20]);
        let (ledger, input) = seeded(owner, 1_000);
        let tx = transfer(input, thief, &[990]);
        let err = ledger.validate(&tx, thief, &fees(), NATIVE).unwrap_err();
        assert!(err.contains("not owned"));
    }

    #[test]
    fn test_apply_spends_and_creates() {
        let owner = Address([1u8; 20]);
        let (mut ledger, input) = seeded(owner, 1_000);
        let tx = transfer(input, owner, &[990]);
        let id = tx.id().unwrap();

        ledger.apply(id, &tx, true);

        assert!(!ledger.contains(&input));
        assert!(ledger.contains(&UtxoRef::new(Chain::Asset, UtxoId::derive(&id, 0))));
        assert_eq!(ledger.status(Chain::Asset, &id), TxStatus::Accepted);

        // The spent input cannot be spent twice.
        let again = transfer(input, owner, &[990]);
        assert!(ledger.validate(&again, owner, &fees(), NATIVE).is_err());
    }

    #[test]
    fn test_apply_without_spending_keeps_inputs() {
        let owner = Address([1u8; 20]);
        let (mut ledger, input) = seeded(owner, 1_000);
        let tx = transfer(input, owner, &[990]);
        let id = tx.id().unwrap();

        ledger.apply(id, &tx, false);

        assert!(ledger.contains(&input));
    }

    #[test]
    fn test_export_lands_in_destination_shared_memory() {
        let owner = Address([1u8; 20]);
        let (mut ledger, input) = seeded(owner, 1_000);
        let mut tx = transfer(input, owner, &[490]);
        tx.kind = TxKind::Export;
        tx.destination = Some(Chain::Platform);
        tx.exports = vec![Output::transfer(NATIVE, 500, Owners::single(owner))];
        assert!(ledger.validate(&tx, owner, &fees(), NATIVE).is_ok());

        let id = tx.id().unwrap();
        ledger.apply(id, &tx, true);

        let owners = BTreeSet::from([owner]);
        let shared = ledger.owned(Chain::Platform, Chain::Asset, &owners);
        assert_eq!(shared.len(), 1);
        assert_eq!(shared[0].key.chain, Chain::Asset);
        assert_eq!(shared[0].output.amount(), 500);
        assert!(ledger.owned(Chain::Platform, Chain::Platform, &owners).is_empty());
    }

    #[test]
    fn test_unknown_status_default() {
        let ledger = Ledger::new();
        assert_eq!(ledger.status(Chain::Platform, &TxId([4u8; 32])), TxStatus::Unknown);
    }
}
