//! The five transaction flows
//!
//! Every flow checks the actor's native balance first and skips when it is
//! short. Each issued transaction is then confirmed on every node and, once
//! confirmed, checked for consumed outputs on every node before the next
//! transaction of the flow is issued.

use std::fmt;
use std::future::Future;
use std::time::Instant;

use ledgersoak_client::{ClientError, Connector};
use ledgersoak_core::{
    AssetDefinition, AssetId, Chain, InitialState, Output, OutputKind, TxKind, TxRecord,
};
use tracing::{info, warn};

use crate::{confirm, verify_consumed, Actor, Confirmation, Entropy, HarnessConfig, Verification};
use crate::NETWORK_TARGET;

const ASSET_NAME: &str = "HI";
const ASSET_SYMBOL: &str = "HI";
const ASSET_DENOMINATION: u8 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Flow {
    /// Same-chain transfer to the actor itself
    Transfer,
    /// Create a fungible asset held by the actor
    CreateAsset,
    /// Create an asset with a mint output, then mint a property unit
    CreateAndMint,
    /// Export from the asset chain, import on the platform chain
    ForwardCrossChain,
    /// Export from the platform chain, import on the asset chain
    ReverseCrossChain,
}

impl Flow {
    pub const ALL: [Flow; 5] = [
        Flow::Transfer,
        Flow::CreateAsset,
        Flow::CreateAndMint,
        Flow::ForwardCrossChain,
        Flow::ReverseCrossChain,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Flow::Transfer => "transfer",
            Flow::CreateAsset => "create-asset",
            Flow::CreateAndMint => "create-and-mint",
            Flow::ForwardCrossChain => "forward-cross-chain",
            Flow::ReverseCrossChain => "reverse-cross-chain",
        }
    }

    /// Position in [`Flow::ALL`]
    pub fn index(&self) -> usize {
        match self {
            Flow::Transfer => 0,
            Flow::CreateAsset => 1,
            Flow::CreateAndMint => 2,
            Flow::ForwardCrossChain => 3,
            Flow::ReverseCrossChain => 4,
        }
    }

    /// Uniform draw over every flow.
    pub fn draw(entropy: &mut dyn Entropy) -> Result<Flow, rand::Error> {
        let index = entropy.below(Self::ALL.len() as u64)?;
        Ok(Self::ALL[index as usize])
    }

    pub async fn execute(self, ctx: &FlowContext<'_>) -> FlowOutcome {
        let mut run = Run {
            ctx,
            flow: self,
            txs: Vec::new(),
        };

        let result = match self {
            Flow::Transfer => transfer(&mut run).await,
            Flow::CreateAsset => create_asset(&mut run).await,
            Flow::CreateAndMint => create_and_mint(&mut run).await,
            Flow::ForwardCrossChain => {
                cross_chain(&mut run, Chain::Asset, ctx.config.export_amount).await
            }
            Flow::ReverseCrossChain => {
                cross_chain(&mut run, Chain::Platform, ctx.config.reverse_export_amount).await
            }
        };

        let txs = run.txs;
        match result {
            Ok(()) => FlowOutcome::Completed { txs },
            Err(Stop::Unconfirmed) => FlowOutcome::Unconfirmed { txs },
            Err(Stop::Skipped {
                chain,
                needed,
                available,
            }) => FlowOutcome::Skipped {
                chain,
                needed,
                available,
            },
            Err(Stop::BalanceUnavailable { chain, error }) => {
                FlowOutcome::BalanceUnavailable { chain, error }
            }
            Err(Stop::IssueFailed {
                kind,
                error,
                network,
            }) => FlowOutcome::IssueFailed {
                kind,
                error,
                network,
                txs,
            },
        }
    }
}

impl fmt::Display for Flow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What a flow needs from its surroundings
pub struct FlowContext<'a> {
    pub actor: &'a Actor,
    pub connector: &'a dyn Connector,
    pub config: &'a HarnessConfig,
}

/// Result of confirming and verifying one issued transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxOutcome {
    pub tx: TxRecord,
    pub confirmation: Confirmation,
    /// `None` when the transaction was not confirmed.
    pub verification: Option<Verification>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowOutcome {
    /// Balance below what the flow needs; nothing issued.
    Skipped {
        chain: Chain,
        needed: u64,
        available: u64,
    },
    /// The precondition balance could not be fetched; nothing issued.
    BalanceUnavailable { chain: Chain, error: String },
    /// Every transaction of the flow was issued and confirmed.
    Completed { txs: Vec<TxOutcome> },
    /// The last entry of `txs` was not confirmed on every node, which ended the flow.
    Unconfirmed { txs: Vec<TxOutcome> },
    /// Issuing `kind` failed; `txs` holds what was issued before it.
    IssueFailed {
        kind: TxKind,
        error: String,
        /// The wallet or node could not be reached, as opposed to a ledger rejection.
        network: bool,
        txs: Vec<TxOutcome>,
    },
}

impl FlowOutcome {
    pub fn txs(&self) -> &[TxOutcome] {
        match self {
            FlowOutcome::Completed { txs }
            | FlowOutcome::Unconfirmed { txs }
            | FlowOutcome::IssueFailed { txs, .. } => txs,
            FlowOutcome::Skipped { .. } | FlowOutcome::BalanceUnavailable { .. } => &[],
        }
    }
}

/// Why a flow stopped early
enum Stop {
    Skipped {
        chain: Chain,
        needed: u64,
        available: u64,
    },
    BalanceUnavailable {
        chain: Chain,
        error: String,
    },
    IssueFailed {
        kind: TxKind,
        error: String,
        network: bool,
    },
    Unconfirmed,
}

/// State of one flow execution
struct Run<'c, 'a> {
    ctx: &'c FlowContext<'a>,
    flow: Flow,
    txs: Vec<TxOutcome>,
}

impl Run<'_, '_> {
    fn actor(&self) -> &Actor {
        self.ctx.actor
    }

    fn native(&self) -> AssetId {
        self.actor().wallet.native_asset()
    }

    /// Fail with `Stop::Skipped` unless the native balance on `chain` covers `needed`.
    async fn require(&self, chain: Chain, needed: u64) -> Result<(), Stop> {
        let actor = self.actor();
        let balances = actor.wallet.balances(chain).await.map_err(|e| {
            warn!(
                target: NETWORK_TARGET,
                actor = actor.id,
                flow = %self.flow,
                %chain,
                error = %e,
                "Failed to fetch balances"
            );
            Stop::BalanceUnavailable {
                chain,
                error: e.to_string(),
            }
        })?;

        let available = balances.get(&self.native()).copied().unwrap_or(0);
        if available < needed {
            info!(
                actor = actor.id,
                flow = %self.flow,
                %chain,
                needed,
                available,
                "Skipping flow due to insufficient balance"
            );
            return Err(Stop::Skipped {
                chain,
                needed,
                available,
            });
        }
        Ok(())
    }

    /// Issue one transaction, then confirm and verify it on every node.
    ///
    /// Returns the record once confirmed, whether or not verification passed.
    async fn submit<F>(&mut self, kind: TxKind, issue: F) -> Result<TxRecord, Stop>
    where
        F: Future<Output = Result<TxRecord, ClientError>>,
    {
        let ctx = self.ctx;
        let actor = ctx.actor;

        let started = Instant::now();
        let tx = issue.await.map_err(|e| {
            let network = e.is_network();
            if network {
                warn!(
                    target: NETWORK_TARGET,
                    actor = actor.id,
                    flow = %self.flow,
                    %kind,
                    error = %e,
                    "Failed to reach node while issuing transaction"
                );
            } else {
                warn!(actor = actor.id, flow = %self.flow, %kind, error = %e, "Failed to issue transaction");
            }
            Stop::IssueFailed {
                kind,
                error: e.to_string(),
                network,
            }
        })?;
        info!(
            actor = actor.id,
            flow = %self.flow,
            %kind,
            tx = %tx.id,
            chain = %tx.chain,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Issued transaction"
        );

        let confirmation = confirm(
            ctx.connector,
            &actor.endpoints,
            &tx,
            ctx.config.poll_interval,
            ctx.config.confirm_deadline,
        )
        .await;

        if !confirmation.is_confirmed() {
            self.txs.push(TxOutcome {
                tx,
                confirmation,
                verification: None,
            });
            return Err(Stop::Unconfirmed);
        }

        let verification =
            verify_consumed(ctx.connector, &actor.endpoints, &tx, &actor.address_list()).await;
        self.txs.push(TxOutcome {
            tx: tx.clone(),
            confirmation,
            verification: Some(verification),
        });
        Ok(tx)
    }
}

async fn transfer(run: &mut Run<'_, '_>) -> Result<(), Stop> {
    let wallet = run.actor().wallet.clone();
    let amount = run.ctx.config.transfer_amount;
    let needed = wallet.fees(Chain::Asset).base_tx_fee.saturating_add(amount);
    run.require(Chain::Asset, needed).await?;

    let output = Output::transfer(run.native(), amount, run.actor().owner());
    run.submit(TxKind::Base, wallet.issue_base_tx(vec![output]))
        .await?;
    Ok(())
}

async fn create_asset(run: &mut Run<'_, '_>) -> Result<(), Stop> {
    let wallet = run.actor().wallet.clone();
    let needed = wallet.fees(Chain::Asset).create_asset_tx_fee;
    run.require(Chain::Asset, needed).await?;

    let definition = asset_definition(InitialState {
        kind: OutputKind::Transfer {
            amount: run.ctx.config.asset_quantity,
        },
        owners: run.actor().owner(),
    });
    run.submit(TxKind::CreateAsset, wallet.issue_create_asset_tx(definition))
        .await?;
    Ok(())
}

async fn create_and_mint(run: &mut Run<'_, '_>) -> Result<(), Stop> {
    let wallet = run.actor().wallet.clone();
    let fees = wallet.fees(Chain::Asset);
    let needed = fees.create_asset_tx_fee.saturating_add(fees.base_tx_fee);
    run.require(Chain::Asset, needed).await?;

    let owner = run.actor().owner();
    let definition = asset_definition(InitialState {
        kind: OutputKind::Mint,
        owners: owner.clone(),
    });
    let created = run
        .submit(TxKind::CreateAsset, wallet.issue_create_asset_tx(definition))
        .await?;

    // An asset is named by the transaction that created it.
    let asset = AssetId(created.id.0);
    run.submit(TxKind::MintProperty, wallet.issue_mint_property_tx(asset, owner))
        .await?;
    Ok(())
}

async fn cross_chain(run: &mut Run<'_, '_>, source: Chain, amount: u64) -> Result<(), Stop> {
    let destination = source.counterpart();
    let wallet = run.actor().wallet.clone();
    let needed = wallet
        .fees(source)
        .base_tx_fee
        .saturating_add(wallet.fees(destination).base_tx_fee)
        .saturating_add(amount);
    run.require(source, needed).await?;

    let owner = run.actor().owner();
    let output = Output::transfer(run.native(), amount, owner.clone());
    run.submit(
        TxKind::Export,
        wallet.issue_export_tx(source, destination, vec![output]),
    )
    .await?;
    run.submit(
        TxKind::Import,
        wallet.issue_import_tx(destination, source, owner),
    )
    .await?;
    Ok(())
}

fn asset_definition(state: InitialState) -> AssetDefinition {
    AssetDefinition {
        name: ASSET_NAME.to_string(),
        symbol: ASSET_SYMBOL.to_string(),
        denomination: ASSET_DENOMINATION,
        initial_states: vec![state],
    }
}
