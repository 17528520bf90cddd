//! Live node clients speaking JSON-RPC 2.0 over HTTP.
//!
//! Each node exposes its APIs under `/ext/<route>`: `health`, `bc/asset`,
//! `bc/platform`, `keystore` and `wallet`. Transaction construction and
//! signing happen in the node-hosted wallet service after the actor's key
//! has been imported into the node keystore.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use ledgersoak_core::{
    Address, AssetDefinition, AssetId, Balances, Chain, FeeSchedule, HealthReport, NodeEndpoint,
    Output, Owners, TxId, TxRecord, TxStatus,
};
use ledgersoak_crypto::SigningKeypair;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::protocol::{
    GetBalancesParams, GetBalancesResult, GetUtxosParams, GetUtxosResult, HealthResult,
    ImportKeyParams, ImportKeyResult, IssueBaseTxParams, IssueCreateAssetTxParams,
    IssueExportTxParams, IssueImportTxParams, IssueMintPropertyTxParams, IssueResult, RpcRequest,
    RpcResponse, TxStatusParams, TxStatusResult, WalletInfoResult,
};
use crate::{ClientError, Connector, NodeClient, Result, UtxoPage, UtxoQuery, Wallet};

/// Default per-request HTTP timeout
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Shared HTTP transport for one endpoint
struct RpcTransport {
    endpoint: NodeEndpoint,
    http: reqwest::Client,
    request_id: AtomicU64,
}

impl RpcTransport {
    fn new(endpoint: NodeEndpoint, http: reqwest::Client) -> Self {
        Self {
            endpoint,
            http,
            request_id: AtomicU64::new(1),
        }
    }

    /// Get the next request ID
    fn next_id(&self) -> u64 {
        self.request_id.fetch_add(1, Ordering::Relaxed)
    }

    /// URL serving `method`, chosen by its namespace.
    fn url_for(&self, method: &str) -> String {
        let namespace = method.split('.').next().unwrap_or(method);
        let route = match namespace {
            "asset" | "platform" => format!("bc/{}", namespace),
            other => other.to_string(),
        };
        format!("{}/ext/{}", self.endpoint, route)
    }

    fn unreachable(&self, reason: impl ToString) -> ClientError {
        ClientError::Unreachable {
            endpoint: self.endpoint.to_string(),
            reason: reason.to_string(),
        }
    }

    async fn call<P, R>(&self, method: &str, params: Option<P>) -> Result<R>
    where
        P: Serialize,
        R: DeserializeOwned,
    {
        let params = params.map(serde_json::to_value).transpose()?;
        let request = RpcRequest::new(method, params, self.next_id());
        debug!(endpoint = %self.endpoint, method, id = request.id, "Sending request");

        let reply = self
            .http
            .post(self.url_for(method))
            .json(&request)
            .send()
            .await
            .map_err(|e| self.unreachable(e))?;

        let status = reply.status();
        if !status.is_success() {
            return Err(ClientError::Rpc {
                code: i32::from(status.as_u16()),
                message: status.to_string(),
            });
        }

        let response: RpcResponse = reply
            .json()
            .await
            .map_err(|e| ClientError::InvalidResponse(e.to_string()))?;

        if let Some(error) = response.error {
            return Err(ClientError::Rpc {
                code: error.code,
                message: error.message,
            });
        }

        let result = response.result.unwrap_or(serde_json::Value::Null);
        serde_json::from_value(result).map_err(|e| ClientError::InvalidResponse(e.to_string()))
    }
}

/// JSON-RPC client for one node
pub struct RpcNodeClient {
    transport: Arc<RpcTransport>,
}

impl RpcNodeClient {
    pub fn new(endpoint: NodeEndpoint, http: reqwest::Client) -> Self {
        Self {
            transport: Arc::new(RpcTransport::new(endpoint, http)),
        }
    }
}

#[async_trait]
impl NodeClient for RpcNodeClient {
    fn endpoint(&self) -> &NodeEndpoint {
        &self.transport.endpoint
    }

    async fn health(&self) -> Result<HealthReport> {
        let result: HealthResult = self.transport.call("health.health", None::<()>).await?;
        Ok(HealthReport {
            healthy: result.healthy,
        })
    }

    async fn tx_status(&self, chain: Chain, tx: &TxId) -> Result<TxStatus> {
        let params = TxStatusParams { tx_id: *tx };
        let method = format!("{}.getTxStatus", chain.name());
        let result: TxStatusResult = self.transport.call(&method, Some(params)).await?;
        Ok(result.status)
    }

    async fn utxos(&self, query: &UtxoQuery) -> Result<UtxoPage> {
        let params = GetUtxosParams {
            addresses: query.addresses.clone(),
            source_chain: query.source_chain,
            start_after: query.start_after,
            limit: query.limit,
        };
        let method = format!("{}.getUTXOs", query.chain.name());
        let result: GetUtxosResult = self.transport.call(&method, Some(params)).await?;
        Ok(UtxoPage {
            utxos: result.utxos,
            end: result.end_index,
        })
    }
}

/// Wallet backed by the node-hosted wallet service
pub struct RpcWallet {
    transport: Arc<RpcTransport>,
    addresses: BTreeSet<Address>,
    info: WalletInfoResult,
}

impl RpcWallet {
    /// Import `keypair` into the node keystore and fetch wallet parameters.
    pub async fn connect(
        endpoint: NodeEndpoint,
        http: reqwest::Client,
        keypair: &SigningKeypair,
    ) -> Result<Self> {
        let transport = Arc::new(RpcTransport::new(endpoint, http));

        let imported: ImportKeyResult = transport
            .call(
                "keystore.importKey",
                Some(ImportKeyParams {
                    private_key: keypair.secret_key_hex(),
                }),
            )
            .await
            .map_err(|e| ClientError::WalletInit(e.to_string()))?;
        if imported.address != keypair.address() {
            return Err(ClientError::WalletInit(format!(
                "keystore derived {} but key controls {}",
                imported.address,
                keypair.address()
            )));
        }

        let info: WalletInfoResult = transport
            .call("wallet.info", None::<()>)
            .await
            .map_err(|e| ClientError::WalletInit(e.to_string()))?;

        Ok(Self {
            transport,
            addresses: BTreeSet::from([imported.address]),
            info,
        })
    }

    async fn issue<P: Serialize>(&self, method: &str, params: P) -> Result<TxRecord> {
        let result: IssueResult = self
            .transport
            .call(method, Some(params))
            .await
            .map_err(|e| match e {
                ClientError::Rpc { message, .. } => ClientError::Rejected(message),
                other => other,
            })?;
        Ok(result.tx)
    }
}

#[async_trait]
impl Wallet for RpcWallet {
    fn addresses(&self) -> &BTreeSet<Address> {
        &self.addresses
    }

    fn native_asset(&self) -> AssetId {
        self.info.native_asset
    }

    fn fees(&self, chain: Chain) -> FeeSchedule {
        match chain {
            Chain::Asset => self.info.asset_fees,
            Chain::Platform => self.info.platform_fees,
        }
    }

    async fn balances(&self, chain: Chain) -> Result<Balances> {
        let params = GetBalancesParams {
            addresses: self.addresses.clone(),
        };
        let method = format!("{}.getBalances", chain.name());
        let result: GetBalancesResult = self.transport.call(&method, Some(params)).await?;
        Ok(result.balances)
    }

    async fn issue_base_tx(&self, outputs: Vec<Output>) -> Result<TxRecord> {
        let params = IssueBaseTxParams {
            from: self.addresses.clone(),
            outputs,
        };
        self.issue("wallet.issueBaseTx", params).await
    }

    async fn issue_create_asset_tx(&self, definition: AssetDefinition) -> Result<TxRecord> {
        let params = IssueCreateAssetTxParams {
            from: self.addresses.clone(),
            definition,
        };
        self.issue("wallet.issueCreateAssetTx", params).await
    }

    async fn issue_mint_property_tx(&self, asset: AssetId, owners: Owners) -> Result<TxRecord> {
        let params = IssueMintPropertyTxParams {
            from: self.addresses.clone(),
            asset,
            owners,
        };
        self.issue("wallet.issueMintPropertyTx", params).await
    }

    async fn issue_export_tx(
        &self,
        source: Chain,
        destination: Chain,
        outputs: Vec<Output>,
    ) -> Result<TxRecord> {
        let params = IssueExportTxParams {
            from: self.addresses.clone(),
            source_chain: source,
            destination_chain: destination,
            outputs,
        };
        self.issue("wallet.issueExportTx", params).await
    }

    async fn issue_import_tx(
        &self,
        destination: Chain,
        source: Chain,
        owners: Owners,
    ) -> Result<TxRecord> {
        let params = IssueImportTxParams {
            from: self.addresses.clone(),
            destination_chain: destination,
            source_chain: source,
            owners,
        };
        self.issue("wallet.issueImportTx", params).await
    }
}

/// Connector for live clusters
#[derive(Clone)]
pub struct RpcConnector {
    http: reqwest::Client,
}

impl RpcConnector {
    pub fn new() -> Self {
        Self::with_timeout(DEFAULT_REQUEST_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { http }
    }
}

impl Default for RpcConnector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Connector for RpcConnector {
    fn node(&self, endpoint: &NodeEndpoint) -> Arc<dyn NodeClient> {
        Arc::new(RpcNodeClient::new(endpoint.clone(), self.http.clone()))
    }

    async fn wallet(
        &self,
        endpoint: &NodeEndpoint,
        keypair: &SigningKeypair,
    ) -> Result<Arc<dyn Wallet>> {
        let wallet = RpcWallet::connect(endpoint.clone(), self.http.clone(), keypair).await?;
        Ok(Arc::new(wallet))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transport() -> RpcTransport {
        RpcTransport::new(
            NodeEndpoint::new("http://127.0.0.1:9650/"),
            reqwest::Client::new(),
        )
    }

    #[test]
    fn test_request_id_increments() {
        let transport = transport();
        assert_eq!(transport.next_id(), 1);
        assert_eq!(transport.next_id(), 2);
        assert_eq!(transport.next_id(), 3);
    }

    #[test]
    fn test_url_routing() {
        let transport = transport();
        assert_eq!(
            transport.url_for("health.health"),
            "http://127.0.0.1:9650/ext/health"
        );
        assert_eq!(
            transport.url_for("asset.getTxStatus"),
            "http://127.0.0.1:9650/ext/bc/asset"
        );
        assert_eq!(
            transport.url_for("platform.getUTXOs"),
            "http://127.0.0.1:9650/ext/bc/platform"
        );
        assert_eq!(
            transport.url_for("wallet.issueBaseTx"),
            "http://127.0.0.1:9650/ext/wallet"
        );
    }

    #[tokio::test]
    async fn test_unreachable_node_maps_to_network_error() {
        let client = RpcNodeClient::new(
            NodeEndpoint::new("http://127.0.0.1:1"),
            reqwest::Client::new(),
        );
        let err = client.health().await.unwrap_err();
        assert!(err.is_network(), "unexpected error: {err}");
    }
}
