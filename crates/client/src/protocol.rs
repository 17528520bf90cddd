//! JSON-RPC 2.0 protocol types

use std::collections::BTreeSet;

use ledgersoak_core::{
    Address, AssetDefinition, AssetId, Balances, Chain, FeeSchedule, Output, Owners, TxId,
    TxRecord, TxStatus, Utxo, UtxoId,
};
use serde::{Deserialize, Serialize};

/// JSON-RPC 2.0 request
#[derive(Debug, Clone, Serialize)]
pub struct RpcRequest {
    pub jsonrpc: &'static str,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
    pub id: u64,
}

impl RpcRequest {
    pub fn new(method: impl Into<String>, params: Option<serde_json::Value>, id: u64) -> Self {
        Self {
            jsonrpc: "2.0",
            method: method.into(),
            params,
            id,
        }
    }
}

/// JSON-RPC 2.0 response
#[derive(Debug, Clone, Deserialize)]
pub struct RpcResponse {
    pub jsonrpc: String,
    pub result: Option<serde_json::Value>,
    pub error: Option<RpcError>,
    pub id: serde_json::Value,
}

/// JSON-RPC 2.0 error
#[derive(Debug, Clone, Deserialize)]
pub struct RpcError {
    pub code: i32,
    pub message: String,
    pub data: Option<serde_json::Value>,
}

/// Result of the `health.health` method
#[derive(Debug, Clone, Deserialize)]
pub struct HealthResult {
    pub healthy: bool,
}

/// Parameters for the `<chain>.getTxStatus` method
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TxStatusParams {
    #[serde(rename = "txID")]
    pub tx_id: TxId,
}

/// Result of the `<chain>.getTxStatus` method
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TxStatusResult {
    pub status: TxStatus,
}

/// Parameters for the `<chain>.getUTXOs` method
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetUtxosParams {
    pub addresses: Vec<Address>,
    pub source_chain: Chain,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_after: Option<UtxoId>,
    pub limit: u32,
}

/// Result of the `<chain>.getUTXOs` method
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetUtxosResult {
    #[serde(default)]
    pub utxos: Vec<Utxo>,
    #[serde(default)]
    pub end_index: Option<UtxoId>,
}

/// Parameters for the `<chain>.getBalances` method
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetBalancesParams {
    pub addresses: BTreeSet<Address>,
}

/// Result of the `<chain>.getBalances` method
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetBalancesResult {
    #[serde(default)]
    pub balances: Balances,
}

/// Parameters for the `keystore.importKey` method
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportKeyParams {
    pub private_key: String,
}

/// Result of the `keystore.importKey` method
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportKeyResult {
    pub address: Address,
}

/// Result of the `wallet.info` method
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletInfoResult {
    pub native_asset: AssetId,
    pub asset_fees: FeeSchedule,
    pub platform_fees: FeeSchedule,
}

/// Parameters for the `wallet.issueBaseTx` method
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueBaseTxParams {
    pub from: BTreeSet<Address>,
    pub outputs: Vec<Output>,
}

/// Parameters for the `wallet.issueCreateAssetTx` method
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueCreateAssetTxParams {
    pub from: BTreeSet<Address>,
    pub definition: AssetDefinition,
}

/// Parameters for the `wallet.issueMintPropertyTx` method
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueMintPropertyTxParams {
    pub from: BTreeSet<Address>,
    pub asset: AssetId,
    pub owners: Owners,
}

/// Parameters for the `wallet.issueExportTx` method
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueExportTxParams {
    pub from: BTreeSet<Address>,
    pub source_chain: Chain,
    pub destination_chain: Chain,
    pub outputs: Vec<Output>,
}

/// Parameters for the `wallet.issueImportTx` method
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueImportTxParams {
    pub from: BTreeSet<Address>,
    pub destination_chain: Chain,
    pub source_chain: Chain,
    pub owners: Owners,
}

/// Result of every `wallet.issue*` method
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueResult {
    pub tx: TxRecord,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_serialization_omits_empty_params() {
        let request = RpcRequest::new("health.health", None, 1);
        let json = serde_json::to_string(&request).unwrap();
        assert_eq!(json, r#"{"jsonrpc":"2.0","method":"health.health","id":1}"#);
    }

    #[test]
    fn test_response_with_error() {
        let raw = r#"{"jsonrpc":"2.0","error":{"code":-32000,"message":"tx not found"},"id":3}"#;
        let response: RpcResponse = serde_json::from_str(raw).unwrap();
        assert!(response.result.is_none());
        let error = response.error.unwrap();
        assert_eq!(error.code, -32000);
        assert_eq!(error.message, "tx not found");
    }

    #[test]
    fn test_tx_status_result_parse() {
        let raw = r#"{"status":"Committed"}"#;
        let result: TxStatusResult = serde_json::from_str(raw).unwrap();
        assert_eq!(result.status, TxStatus::Committed);
    }

    #[test]
    fn test_get_utxos_params_field_names() {
        let params = GetUtxosParams {
            addresses: vec![],
            source_chain: Chain::Platform,
            start_after: None,
            limit: 1024,
        };
        let value = serde_json::to_value(&params).unwrap();
        assert_eq!(value["sourceChain"], "platform");
        assert_eq!(value["limit"], 1024);
        assert!(value.get("startAfter").is_none());
    }

    #[test]
    fn test_get_utxos_result_defaults() {
        let result: GetUtxosResult = serde_json::from_str("{}").unwrap();
        assert!(result.utxos.is_empty());
        assert!(result.end_index.is_none());
    }

    #[test]
    fn test_balances_keyed_by_asset_string() {
        let asset = AssetId([5u8; 32]);
        let mut balances = Balances::new();
        balances.insert(asset, 77);
        let json = serde_json::to_string(&GetBalancesResult { balances }).unwrap();
        let parsed: GetBalancesResult = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.balances.get(&asset), Some(&77));
    }
}
