//! Reconcile loop - drives node reconciliation on a timer
//!
//! Nodes are reconciled one after the other on a blocking thread. A node that
//! fails is reported and picked up again on the next tick; there is no other
//! retry policy.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info};

use crate::node::NodeList;

/// Default interval between two reconciliation passes
pub const DEFAULT_RECONCILE_INTERVAL_SECS: u64 = 30;

/// Outcome of one reconciliation pass
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcileReport {
    #[serde(rename = "startedAt")]
    pub started_at: DateTime<Utc>,

    /// Nodes whose components are all reconciled
    pub succeeded: Vec<String>,

    /// Nodes that failed, with the error message
    pub failed: Vec<NodeFailure>,
}

/// A node that failed to reconcile
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeFailure {
    pub node: String,
    pub error: String,
}

impl ReconcileReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Reconcile every node once, serially, in list order
pub fn reconcile_all(nodes: &NodeList) -> ReconcileReport {
    let mut report = ReconcileReport {
        started_at: Utc::now(),
        succeeded: vec![],
        failed: vec![],
    };

    for node in nodes {
        match node.reconcile() {
            Ok(()) => report.succeeded.push(node.name().to_string()),
            Err(e) => {
                error!("Failed to reconcile node {}: {}", node.name(), e);
                report.failed.push(NodeFailure {
                    node: node.name().to_string(),
                    error: e.to_string(),
                });
            }
        }
    }

    report
}

/// Timer-driven reconciliation of a fixed set of nodes
pub struct ReconcileLoop {
    nodes: Arc<NodeList>,
    interval: Duration,
}

impl ReconcileLoop {
    pub fn new(nodes: NodeList) -> Self {
        Self {
            nodes: Arc::new(nodes),
            interval: Duration::from_secs(DEFAULT_RECONCILE_INTERVAL_SECS),
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Run passes until `shutdown` resolves. The first pass starts
    /// immediately; a pass in progress always completes.
    ///
    /// Returns the number of completed passes.
    pub async fn run<F>(self, shutdown: F) -> anyhow::Result<usize>
    where
        F: Future<Output = ()>,
    {
        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        let mut passes = 0;
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Reconcile loop stopping after {} passes", passes);
                    return Ok(passes);
                }
                _ = ticker.tick() => {
                    let nodes = self.nodes.clone();
                    let report = tokio::task::spawn_blocking(move || reconcile_all(&nodes)).await?;
                    passes += 1;
                    info!(
                        "Reconcile pass {}: {} succeeded, {} failed",
                        passes,
                        report.succeeded.len(),
                        report.failed.len()
                    );
                }
            }
        }
    }
}
