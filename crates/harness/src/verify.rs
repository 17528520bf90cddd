//! Cross-node consistency check
//!
//! After a transaction is confirmed, every node must have dropped every
//! output it consumed. Each node's UTXO set for the actor's addresses is
//! re-fetched in full and every consumed reference must be absent.

use std::collections::BTreeMap;

use ledgersoak_client::{fetch_all_utxos, Connector, LookupError, UtxoSet};
use ledgersoak_core::{Address, Chain, NodeEndpoint, TxRecord, UtxoRef};
use tracing::{debug, error, info, warn};

use crate::{CONSISTENCY_TARGET, NETWORK_TARGET};

/// Aggregate outcome of [`verify_consumed`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verification {
    /// No endpoint holds any consumed output.
    Consistent,
    /// An endpoint still lists a consumed output as unspent.
    Violation {
        endpoint: NodeEndpoint,
        utxo: UtxoRef,
    },
    /// The UTXO set could not be fetched from an endpoint.
    FetchFailed {
        endpoint: NodeEndpoint,
        error: String,
    },
}

impl Verification {
    pub fn is_consistent(&self) -> bool {
        matches!(self, Verification::Consistent)
    }
}

/// Check that no endpoint still holds an output consumed by `tx`.
///
/// Outputs consumed on the transaction's own chain are looked up in that
/// chain's UTXO set; imported outputs in the shared memory they were
/// imported from. Stops at the first endpoint that fails either way.
pub async fn verify_consumed(
    connector: &dyn Connector,
    endpoints: &[NodeEndpoint],
    tx: &TxRecord,
    addresses: &[Address],
) -> Verification {
    // Consumed outputs grouped by the chain they were created on. The
    // transaction's own chain is always fetched so every node is queried.
    let mut by_source: BTreeMap<Chain, Vec<UtxoRef>> = BTreeMap::new();
    by_source.entry(tx.chain).or_default();
    for key in &tx.consumed {
        by_source.entry(key.chain).or_default().push(*key);
    }

    for endpoint in endpoints {
        let node = connector.node(endpoint);

        for (source, consumed) in &by_source {
            let utxos: UtxoSet =
                match fetch_all_utxos(node.as_ref(), tx.chain, *source, addresses).await {
                    Ok(set) => set,
                    Err(e) => {
                        warn!(
                            target: NETWORK_TARGET,
                            tx = %tx.id,
                            chain = %tx.chain,
                            %endpoint,
                            error = %e,
                            "Failed to fetch UTXOs"
                        );
                        return Verification::FetchFailed {
                            endpoint: endpoint.clone(),
                            error: e.to_string(),
                        };
                    }
                };

            for key in consumed {
                match utxos.get(key) {
                    Err(LookupError::NotFound(_)) => {}
                    Ok(_) => {
                        error!(
                            target: CONSISTENCY_TARGET,
                            tx = %tx.id,
                            utxo = %key,
                            %endpoint,
                            "Consumed UTXO still present after confirmation"
                        );
                        return Verification::Violation {
                            endpoint: endpoint.clone(),
                            utxo: *key,
                        };
                    }
                }
            }
        }

        debug!(tx = %tx.id, %endpoint, "Consumed UTXOs absent");
    }

    info!(
        tx = %tx.id,
        chain = %tx.chain,
        consumed = tx.consumed.len(),
        "Consumed UTXOs absent on all nodes"
    );
    Verification::Consistent
}
