//! Collaborator traits the harness drives.

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use ledgersoak_core::{
    Address, AssetDefinition, AssetId, Balances, Chain, FeeSchedule, HealthReport, NodeEndpoint,
    Output, Owners, TxId, TxRecord, TxStatus,
};
use ledgersoak_crypto::SigningKeypair;

use crate::{Result, UtxoPage, UtxoQuery};

/// Read-side API of one ledger node.
#[async_trait]
pub trait NodeClient: Send + Sync {
    /// Endpoint this client talks to.
    fn endpoint(&self) -> &NodeEndpoint;

    /// Check node health.
    async fn health(&self) -> Result<HealthReport>;

    /// Current status of `tx` on `chain` as seen by this node.
    async fn tx_status(&self, chain: Chain, tx: &TxId) -> Result<TxStatus>;

    /// One page of the UTXOs owned by `query.addresses`.
    async fn utxos(&self, query: &UtxoQuery) -> Result<UtxoPage>;
}

/// Transaction builder and signer for one identity.
///
/// Implementations own UTXO selection, fee accounting and signing. Every
/// issuance returns the record of the submitted transaction, including the
/// full set of outputs it consumed.
#[async_trait]
pub trait Wallet: Send + Sync {
    /// Addresses whose outputs this wallet can spend.
    fn addresses(&self) -> &BTreeSet<Address>;

    /// Asset fees are paid in.
    fn native_asset(&self) -> AssetId;

    fn fees(&self, chain: Chain) -> FeeSchedule;

    /// Fresh fungible balances on `chain`.
    async fn balances(&self, chain: Chain) -> Result<Balances>;

    /// Same-chain transfer on the asset chain.
    async fn issue_base_tx(&self, outputs: Vec<Output>) -> Result<TxRecord>;

    async fn issue_create_asset_tx(&self, definition: AssetDefinition) -> Result<TxRecord>;

    /// Spend the mint output of `asset`, producing a property unit for `owners`.
    async fn issue_mint_property_tx(&self, asset: AssetId, owners: Owners) -> Result<TxRecord>;

    /// Move `outputs` from `source` into the shared memory of `destination`.
    async fn issue_export_tx(
        &self,
        source: Chain,
        destination: Chain,
        outputs: Vec<Output>,
    ) -> Result<TxRecord>;

    /// Claim everything exported from `source` to `destination` for this wallet.
    async fn issue_import_tx(
        &self,
        destination: Chain,
        source: Chain,
        owners: Owners,
    ) -> Result<TxRecord>;
}

/// Opens clients and wallets for node endpoints.
#[async_trait]
pub trait Connector: Send + Sync {
    fn node(&self, endpoint: &NodeEndpoint) -> Arc<dyn NodeClient>;

    /// Initialise a wallet for `keypair` backed by `endpoint`.
    async fn wallet(
        &self,
        endpoint: &NodeEndpoint,
        keypair: &SigningKeypair,
    ) -> Result<Arc<dyn Wallet>>;
}
