//! Full UTXO scans across paginated node replies.

use std::collections::BTreeMap;

use ledgersoak_core::{Address, Chain, Utxo, UtxoId, UtxoRef};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{NodeClient, Result};

/// Largest page a node returns for one UTXO query.
pub const MAX_PAGE_SIZE: u32 = 1024;

/// Query for the UTXOs of `addresses` stored on `chain`.
///
/// When `source_chain` differs from `chain` the query targets the shared
/// memory of `chain`: outputs exported from `source_chain` and not yet
/// imported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UtxoQuery {
    pub chain: Chain,
    pub source_chain: Chain,
    pub addresses: Vec<Address>,
    /// Resume after this UTXO (exclusive), `None` for the first page.
    pub start_after: Option<UtxoId>,
    pub limit: u32,
}

impl UtxoQuery {
    pub fn new(chain: Chain, source_chain: Chain, addresses: Vec<Address>) -> Self {
        Self {
            chain,
            source_chain,
            addresses,
            start_after: None,
            limit: MAX_PAGE_SIZE,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UtxoPage {
    pub utxos: Vec<Utxo>,
    /// Id of the last UTXO in this page, used as the next cursor.
    pub end: Option<UtxoId>,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LookupError {
    #[error("UTXO not found: {0}")]
    NotFound(UtxoRef),
}

/// Snapshot of unspent outputs keyed by `(chain, id)`.
#[derive(Debug, Clone, Default)]
pub struct UtxoSet {
    utxos: BTreeMap<UtxoRef, Utxo>,
}

impl UtxoSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, utxo: Utxo) {
        self.utxos.insert(utxo.key, utxo);
    }

    /// Look up one output. Absence is reported as `LookupError::NotFound`.
    pub fn get(&self, key: &UtxoRef) -> std::result::Result<&Utxo, LookupError> {
        self.utxos.get(key).ok_or(LookupError::NotFound(*key))
    }

    pub fn contains(&self, key: &UtxoRef) -> bool {
        self.utxos.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.utxos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.utxos.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Utxo> {
        self.utxos.values()
    }
}

impl FromIterator<Utxo> for UtxoSet {
    fn from_iter<I: IntoIterator<Item = Utxo>>(iter: I) -> Self {
        let mut set = UtxoSet::new();
        for utxo in iter {
            set.insert(utxo);
        }
        set
    }
}

/// Fetch every UTXO of `addresses` on `chain` (from `source_chain`), page by page.
///
/// Stops at the first page shorter than the page limit.
pub async fn fetch_all_utxos(
    client: &dyn NodeClient,
    chain: Chain,
    source_chain: Chain,
    addresses: &[Address],
) -> Result<UtxoSet> {
    fetch_paged(client, UtxoQuery::new(chain, source_chain, addresses.to_vec())).await
}

async fn fetch_paged(client: &dyn NodeClient, mut query: UtxoQuery) -> Result<UtxoSet> {
    let mut set = UtxoSet::new();

    loop {
        let page = client.utxos(&query).await?;
        let fetched = page.utxos.len();
        for utxo in page.utxos {
            set.insert(utxo);
        }

        match page.end {
            Some(end) if fetched as u32 >= query.limit => query.start_after = Some(end),
            _ => break,
        }
    }

    Ok(set)
}
