use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

use crate::{CoreError, Result};

/// 32-byte identifiers, rendered as base58 on the wire and in logs.
macro_rules! id32 {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
        pub struct $name(pub [u8; 32]);

        impl $name {
            pub const fn from_bytes(bytes: [u8; 32]) -> Self {
                Self(bytes)
            }

            pub fn as_bytes(&self) -> &[u8; 32] {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&bs58::encode(self.0).into_string())
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({})"), self)
            }
        }

        impl FromStr for $name {
            type Err = CoreError;

            fn from_str(s: &str) -> Result<Self> {
                let bytes = bs58::decode(s)
                    .into_vec()
                    .map_err(|_| CoreError::InvalidId(s.to_string()))?;
                let bytes: [u8; 32] = bytes
                    .try_into()
                    .map_err(|_| CoreError::InvalidId(s.to_string()))?;
                Ok(Self(bytes))
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
                serializer.collect_str(self)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                s.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

id32!(
    /// Transaction identifier
    TxId
);

id32!(
    /// Unspent output identifier, unique within a chain
    UtxoId
);

id32!(
    /// Asset identifier (the id of the transaction that created the asset)
    AssetId
);

impl UtxoId {
    /// Derive the id of output `index` produced by transaction `tx`.
    pub fn derive(tx: &TxId, index: u32) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(tx.0);
        hasher.update(index.to_le_bytes());
        Self(hasher.finalize().into())
    }
}

/// 20-byte account address
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Address(pub [u8; 20]);

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self)
    }
}

impl FromStr for Address {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        let raw = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(raw).map_err(|_| CoreError::InvalidAddress(s.to_string()))?;
        let bytes: [u8; 20] = bytes
            .try_into()
            .map_err(|_| CoreError::InvalidAddress(s.to_string()))?;
        Ok(Self(bytes))
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Chains hosted by every node of the cluster.
///
/// The asset chain carries transfers, asset creation and mint operations.
/// The platform chain only exchanges value with the asset chain through
/// export/import pairs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Chain {
    Asset,
    Platform,
}

impl Chain {
    pub const ALL: [Chain; 2] = [Chain::Asset, Chain::Platform];

    pub fn name(&self) -> &'static str {
        match self {
            Chain::Asset => "asset",
            Chain::Platform => "platform",
        }
    }

    /// The chain on the other side of a cross-chain transfer.
    pub fn counterpart(&self) -> Chain {
        match self {
            Chain::Asset => Chain::Platform,
            Chain::Platform => Chain::Asset,
        }
    }

    /// Terminal status a node reports once it has applied a transaction.
    pub fn success_status(&self) -> TxStatus {
        match self {
            Chain::Asset => TxStatus::Accepted,
            Chain::Platform => TxStatus::Committed,
        }
    }

    /// Whether polling for `status` on this chain can stop.
    ///
    /// The asset chain keeps `Unknown` transactions pending (they may not
    /// have been gossiped yet); the platform chain treats anything other
    /// than `Processing` as decided.
    pub fn is_decided(&self, status: TxStatus) -> bool {
        match self {
            Chain::Asset => matches!(status, TxStatus::Accepted | TxStatus::Rejected),
            Chain::Platform => status != TxStatus::Processing,
        }
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Chain {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "asset" | "x" => Ok(Chain::Asset),
            "platform" | "p" => Ok(Chain::Platform),
            _ => Err(CoreError::UnknownChain(s.to_string())),
        }
    }
}

/// Transaction status as reported by a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TxStatus {
    Unknown,
    Processing,
    Accepted,
    Rejected,
    Committed,
    Aborted,
    Dropped,
}

impl fmt::Display for TxStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TxStatus::Unknown => "Unknown",
            TxStatus::Processing => "Processing",
            TxStatus::Accepted => "Accepted",
            TxStatus::Rejected => "Rejected",
            TxStatus::Committed => "Committed",
            TxStatus::Aborted => "Aborted",
            TxStatus::Dropped => "Dropped",
        };
        f.write_str(s)
    }
}

impl FromStr for TxStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Unknown" => Ok(TxStatus::Unknown),
            "Processing" => Ok(TxStatus::Processing),
            "Accepted" => Ok(TxStatus::Accepted),
            "Rejected" => Ok(TxStatus::Rejected),
            "Committed" => Ok(TxStatus::Committed),
            "Aborted" => Ok(TxStatus::Aborted),
            "Dropped" => Ok(TxStatus::Dropped),
            _ => Err(CoreError::UnknownStatus(s.to_string())),
        }
    }
}

/// Compound key of one unspent output: the chain it lives on and its id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UtxoRef {
    pub chain: Chain,
    pub id: UtxoId,
}

impl UtxoRef {
    pub fn new(chain: Chain, id: UtxoId) -> Self {
        Self { chain, id }
    }
}

impl fmt::Display for UtxoRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.chain, self.id)
    }
}

/// Spending condition of an output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Owners {
    pub threshold: u32,
    pub addresses: Vec<Address>,
}

impl Owners {
    /// A 1-of-1 owner set.
    pub fn single(address: Address) -> Self {
        Self {
            threshold: 1,
            addresses: vec![address],
        }
    }

    /// Whether any of `addresses` can spend under this owner set.
    pub fn is_spendable_by(&self, addresses: &BTreeSet<Address>) -> bool {
        let signers = self
            .addresses
            .iter()
            .filter(|a| addresses.contains(a))
            .count();
        self.threshold > 0 && signers >= self.threshold as usize
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutputKind {
    /// Fungible amount of an asset
    Transfer { amount: u64 },
    /// Right to mint property units of an asset
    Mint,
    /// One minted property unit
    Property,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Output {
    pub asset: AssetId,
    pub kind: OutputKind,
    pub owners: Owners,
}

impl Output {
    pub fn transfer(asset: AssetId, amount: u64, owners: Owners) -> Self {
        Self {
            asset,
            kind: OutputKind::Transfer { amount },
            owners,
        }
    }

    /// Fungible amount carried by this output, zero for non-fungible kinds.
    pub fn amount(&self) -> u64 {
        match self.kind {
            OutputKind::Transfer { amount } => amount,
            OutputKind::Mint | OutputKind::Property => 0,
        }
    }
}

/// An unspent output as stored by a node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Utxo {
    pub key: UtxoRef,
    pub output: Output,
}

/// Initial state of a newly created asset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitialState {
    pub kind: OutputKind,
    pub owners: Owners,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetDefinition {
    pub name: String,
    pub symbol: String,
    pub denomination: u8,
    pub initial_states: Vec<InitialState>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxKind {
    Base,
    CreateAsset,
    MintProperty,
    Export,
    Import,
}

impl fmt::Display for TxKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TxKind::Base => "base",
            TxKind::CreateAsset => "create-asset",
            TxKind::MintProperty => "mint-property",
            TxKind::Export => "export",
            TxKind::Import => "import",
        };
        f.write_str(s)
    }
}

/// What the harness keeps about an issued transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxRecord {
    pub id: TxId,
    pub chain: Chain,
    pub kind: TxKind,
    /// Every output the transaction spent, including imported ones.
    pub consumed: BTreeSet<UtxoRef>,
}

/// Fungible balances by asset
pub type Balances = BTreeMap<AssetId, u64>;

/// Fees charged by one chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeSchedule {
    pub base_tx_fee: u64,
    pub create_asset_tx_fee: u64,
}

/// Network address of one ledger node, shared read-only by every actor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeEndpoint(String);

impl NodeEndpoint {
    pub fn new(uri: impl Into<String>) -> Self {
        Self(uri.into().trim_end_matches('/').to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeEndpoint {
    fn from(uri: &str) -> Self {
        Self::new(uri)
    }
}

/// Reply of a node health check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthReport {
    pub healthy: bool,
}
