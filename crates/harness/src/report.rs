//! Run statistics and the final report

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crate::{Confirmation, Flow, FlowOutcome, Verification};

/// Counters shared by every actor of a run.
pub struct SoakStats {
    /// Flows executed, indexed by [`Flow::index`].
    pub flows: [AtomicU64; 5],
    /// Flows skipped for insufficient balance.
    pub skipped: AtomicU64,
    /// Flows abandoned because balances could not be fetched.
    pub balance_failures: AtomicU64,
    /// Transactions accepted for issuance by a wallet.
    pub issued: AtomicU64,
    /// Issuance attempts refused by the ledger.
    pub issue_failures: AtomicU64,
    /// Issuance attempts that could not reach a node.
    pub issue_network_failures: AtomicU64,
    /// Flows cut short by a transaction that was not confirmed everywhere.
    pub unconfirmed_flows: AtomicU64,
    /// Transactions confirmed on every node.
    pub confirmed: AtomicU64,
    /// Transactions decided with a non-success status on some node.
    pub not_accepted: AtomicU64,
    /// Confirmation polls that failed to reach a node.
    pub unreachable: AtomicU64,
    /// Confirmation polls that hit the deadline.
    pub deadline_exceeded: AtomicU64,
    /// Confirmed transactions whose consumed outputs were absent everywhere.
    pub consistent: AtomicU64,
    /// Confirmed transactions with a consumed output still present somewhere.
    pub violations: AtomicU64,
    /// Consistency checks that could not fetch a UTXO set.
    pub fetch_failures: AtomicU64,
    started: Instant,
}

impl Default for SoakStats {
    fn default() -> Self {
        Self {
            flows: Default::default(),
            skipped: AtomicU64::new(0),
            balance_failures: AtomicU64::new(0),
            issued: AtomicU64::new(0),
            issue_failures: AtomicU64::new(0),
            issue_network_failures: AtomicU64::new(0),
            unconfirmed_flows: AtomicU64::new(0),
            confirmed: AtomicU64::new(0),
            not_accepted: AtomicU64::new(0),
            unreachable: AtomicU64::new(0),
            deadline_exceeded: AtomicU64::new(0),
            consistent: AtomicU64::new(0),
            violations: AtomicU64::new(0),
            fetch_failures: AtomicU64::new(0),
            started: Instant::now(),
        }
    }
}

fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::SeqCst);
}

impl SoakStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one flow outcome into the counters.
    pub fn record(&self, flow: Flow, outcome: &FlowOutcome) {
        bump(&self.flows[flow.index()]);

        match outcome {
            FlowOutcome::Skipped { .. } => bump(&self.skipped),
            FlowOutcome::BalanceUnavailable { .. } => bump(&self.balance_failures),
            FlowOutcome::IssueFailed { network: true, .. } => bump(&self.issue_network_failures),
            FlowOutcome::IssueFailed { network: false, .. } => bump(&self.issue_failures),
            FlowOutcome::Unconfirmed { .. } => bump(&self.unconfirmed_flows),
            FlowOutcome::Completed { .. } => {}
        }

        for tx in outcome.txs() {
            bump(&self.issued);
            match &tx.confirmation {
                Confirmation::Confirmed => bump(&self.confirmed),
                Confirmation::NotAccepted { .. } => bump(&self.not_accepted),
                Confirmation::Unreachable { .. } => bump(&self.unreachable),
                Confirmation::DeadlineExceeded { .. } => bump(&self.deadline_exceeded),
            }
            match &tx.verification {
                Some(Verification::Consistent) => bump(&self.consistent),
                Some(Verification::Violation { .. }) => bump(&self.violations),
                Some(Verification::FetchFailed { .. }) => bump(&self.fetch_failures),
                None => {}
            }
        }
    }

    pub fn flows_total(&self) -> u64 {
        self.flows.iter().map(|c| c.load(Ordering::SeqCst)).sum()
    }

    pub fn report(&self) -> SoakReport {
        let load = |c: &AtomicU64| c.load(Ordering::SeqCst);
        SoakReport {
            duration: self.started.elapsed(),
            flows: Flow::ALL.map(|flow| (flow, load(&self.flows[flow.index()]))),
            skipped: load(&self.skipped),
            balance_failures: load(&self.balance_failures),
            issued: load(&self.issued),
            issue_failures: load(&self.issue_failures),
            issue_network_failures: load(&self.issue_network_failures),
            unconfirmed_flows: load(&self.unconfirmed_flows),
            confirmed: load(&self.confirmed),
            not_accepted: load(&self.not_accepted),
            unreachable: load(&self.unreachable),
            deadline_exceeded: load(&self.deadline_exceeded),
            consistent: load(&self.consistent),
            violations: load(&self.violations),
            fetch_failures: load(&self.fetch_failures),
        }
    }
}

/// Snapshot of [`SoakStats`] at the end of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoakReport {
    pub duration: Duration,
    pub flows: [(Flow, u64); 5],
    pub skipped: u64,
    pub balance_failures: u64,
    pub issued: u64,
    pub issue_failures: u64,
    pub issue_network_failures: u64,
    pub unconfirmed_flows: u64,
    pub confirmed: u64,
    pub not_accepted: u64,
    pub unreachable: u64,
    pub deadline_exceeded: u64,
    pub consistent: u64,
    pub violations: u64,
    pub fetch_failures: u64,
}

impl SoakReport {
    /// Whether any node kept an output after confirming the transaction that spent it.
    pub fn has_violations(&self) -> bool {
        self.violations > 0
    }

    /// Print the report to stdout.
    pub fn print(&self) {
        println!("\n=== Soak Report ===");
        println!("Duration: {:?}", self.duration);
        for (flow, count) in &self.flows {
            println!("Flow {:<20} {}", flow.name(), count);
        }
        println!("Skipped: {}", self.skipped);
        println!("Balance failures: {}", self.balance_failures);
        println!("Issued: {}", self.issued);
        println!("Issue failures: {}", self.issue_failures);
        println!("Issue network failures: {}", self.issue_network_failures);
        println!("Unconfirmed flows: {}", self.unconfirmed_flows);
        println!("Confirmed: {}", self.confirmed);
        println!("Not accepted: {}", self.not_accepted);
        println!("Unreachable: {}", self.unreachable);
        println!("Deadline exceeded: {}", self.deadline_exceeded);
        println!("Consistent: {}", self.consistent);
        println!("Consistency violations: {}", self.violations);
        println!("UTXO fetch failures: {}", self.fetch_failures);
    }
}
