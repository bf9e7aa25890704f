//! Sync orchestrator
//!
//! The SyncEngine is responsible for:
//! - Opening a session on each configured target
//! - Reconciling host records, then CNAME records
//! - Recording a per-target outcome without letting one failure stop the run
//! - Reporting progress on an injected event channel
//!
//! ## Architecture
//!
//! ```text
//!  SyncConfig.targets ──► SyncEngine ──► TargetConnector::connect()
//!                              │                    │
//!                              │                    ▼
//!                              │            TargetSession
//!                              │                    │
//!                              ▼                    ▼
//!                         SyncEvent ◄──── Reconciler (hosts, cnames)
//!                              │
//!                              ▼
//!                         SyncReport
//! ```
//!
//! ## Failure isolation
//!
//! Targets run one at a time, in configuration order. Any error in a target
//! pass is caught at the target boundary, attributed to a stage and stored in
//! the report. The desired state is shared read-only by every pass.

use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::config::{SyncConfig, SyncStrategy, SyncTarget};
use crate::error::{Error, SyncStage};
use crate::reconciler::Reconciler;
use crate::record::DesiredState;
use crate::traits::{TargetConnector, TargetSession};

/// Default capacity of the event channel
pub const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 256;

/// Events emitted by the SyncEngine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// A run started
    RunStarted {
        targets_count: usize,
        desired_records: usize,
    },

    /// A target pass started
    TargetStarted { target: String },

    /// A target pass converged
    TargetSucceeded { target: String, changes: usize },

    /// A target pass failed
    TargetFailed {
        target: String,
        stage: SyncStage,
        error: String,
    },

    /// A run finished
    RunFinished {
        total_changes: usize,
        failures: usize,
    },
}

/// A failed target pass
#[derive(Debug)]
pub struct TargetFailure {
    /// Where in the pass the failure happened
    pub stage: SyncStage,
    /// The underlying error
    pub error: Error,
}

impl fmt::Display for TargetFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.stage, self.error)
    }
}

/// Outcome of one target pass
#[derive(Debug)]
pub struct TargetOutcome {
    /// Target address
    pub target: String,
    /// Change count, or the failure that ended the pass
    pub result: std::result::Result<usize, TargetFailure>,
}

impl TargetOutcome {
    /// Whether the pass converged
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Aggregate result of a run
#[derive(Debug)]
pub struct SyncReport {
    /// Outcomes in configuration order
    pub outcomes: Vec<TargetOutcome>,
    /// When the run started
    pub started_at: DateTime<Utc>,
    /// When the run finished
    pub finished_at: DateTime<Utc>,
}

impl SyncReport {
    /// Sum of changes across targets that succeeded
    pub fn total_changes(&self) -> usize {
        self.outcomes
            .iter()
            .filter_map(|outcome| outcome.result.as_ref().ok())
            .sum()
    }

    /// Failed targets with their failures, in configuration order
    pub fn failures(&self) -> Vec<(&str, &TargetFailure)> {
        self.outcomes
            .iter()
            .filter_map(|outcome| match &outcome.result {
                Ok(_) => None,
                Err(failure) => Some((outcome.target.as_str(), failure)),
            })
            .collect()
    }

    /// True when every target converged (vacuously true for no targets)
    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(TargetOutcome::is_success)
    }

    /// One-line summary for the final log line
    pub fn summary(&self) -> String {
        let failures = self.failures();
        let mut line = format!(
            "Total changes across all targets: {} ({} target(s), {} failed, {} ms)",
            self.total_changes(),
            self.outcomes.len(),
            failures.len(),
            (self.finished_at - self.started_at).num_milliseconds()
        );
        for (target, failure) in failures {
            line.push_str(&format!("; {}: {}", target, failure));
        }
        line
    }
}

/// Core sync engine
///
/// ## Lifecycle
///
/// 1. Create with [`SyncEngine::new()`]
/// 2. Call [`SyncEngine::run()`] once per desired state
/// 3. Inspect the returned [`SyncReport`]
pub struct SyncEngine {
    /// Opens sessions on targets
    connector: Arc<dyn TargetConnector>,

    /// Strategy and dry-run policy
    reconciler: Reconciler,

    /// Event sender for external monitoring
    event_tx: Option<mpsc::Sender<SyncEvent>>,
}

impl SyncEngine {
    /// Create a new engine
    pub fn new(connector: Arc<dyn TargetConnector>, strategy: SyncStrategy) -> Self {
        Self {
            connector,
            reconciler: Reconciler::new(strategy),
            event_tx: None,
        }
    }

    /// Create an engine from configuration
    pub fn from_config(connector: Arc<dyn TargetConnector>, config: &SyncConfig) -> Self {
        Self::new(connector, config.strategy).with_dry_run(config.dry_run)
    }

    /// Plan and log only; never mutate
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.reconciler = self.reconciler.with_dry_run(dry_run);
        self
    }

    /// Attach an event channel
    ///
    /// # Returns
    ///
    /// The engine and the receiving end of a bounded channel. When the
    /// channel is full, events are dropped with a warning.
    pub fn with_events(mut self, capacity: usize) -> (Self, mpsc::Receiver<SyncEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        self.event_tx = Some(tx);
        (self, rx)
    }

    /// Reconcile every target against the desired state
    ///
    /// Never fails as a whole: per-target failures are recorded in the report.
    pub async fn run(&self, targets: &[SyncTarget], desired: &DesiredState) -> SyncReport {
        let started_at = Utc::now();
        info!(
            "Starting sync of {} target(s) with {} strategy",
            targets.len(),
            self.reconciler.strategy()
        );
        self.emit_event(SyncEvent::RunStarted {
            targets_count: targets.len(),
            desired_records: desired.len(),
        });

        let mut outcomes = Vec::with_capacity(targets.len());
        for target in targets {
            outcomes.push(self.sync_target(target, desired).await);
        }

        let report = SyncReport {
            outcomes,
            started_at,
            finished_at: Utc::now(),
        };

        self.emit_event(SyncEvent::RunFinished {
            total_changes: report.total_changes(),
            failures: report.failures().len(),
        });
        report
    }

    /// Run one target pass and convert any error into an outcome
    async fn sync_target(&self, target: &SyncTarget, desired: &DesiredState) -> TargetOutcome {
        info!("Syncing target at {}", target.address);
        self.emit_event(SyncEvent::TargetStarted {
            target: target.address.clone(),
        });

        let result = match self.connector.connect(target).await {
            Ok(session) => {
                let result = self.reconcile_session(session.as_ref(), desired).await;
                if let Err(e) = session.close().await {
                    warn!("Failed to close session on {}: {}", target.address, e);
                }
                result
            }
            Err(e) => Err(TargetFailure {
                stage: SyncStage::Authenticate,
                error: e,
            }),
        };

        match &result {
            Ok(changes) => {
                if *changes > 0 {
                    info!("Synced {} changes to {}", changes, target.address);
                } else {
                    info!("No changes for {}", target.address);
                }
                self.emit_event(SyncEvent::TargetSucceeded {
                    target: target.address.clone(),
                    changes: *changes,
                });
            }
            Err(failure) => {
                error!("Failed to sync {}: {}", target.address, failure);
                self.emit_event(SyncEvent::TargetFailed {
                    target: target.address.clone(),
                    stage: failure.stage,
                    error: failure.error.to_string(),
                });
            }
        }

        TargetOutcome {
            target: target.address.clone(),
            result,
        }
    }

    async fn reconcile_session(
        &self,
        session: &dyn TargetSession,
        desired: &DesiredState,
    ) -> std::result::Result<usize, TargetFailure> {
        debug!("Reconciling via {} session", session.target_type());
        let to_failure = |e: Error| TargetFailure {
            stage: e.stage().unwrap_or(SyncStage::Mutate),
            error: e,
        };

        let host_changes = self
            .reconciler
            .reconcile(session, &desired.hosts)
            .await
            .map_err(to_failure)?;
        let cname_changes = self
            .reconciler
            .reconcile(session, &desired.cnames)
            .await
            .map_err(to_failure)?;

        Ok(host_changes + cname_changes)
    }

    /// Emit an engine event
    fn emit_event(&self, event: SyncEvent) {
        let Some(tx) = &self.event_tx else {
            return;
        };
        if tx.try_send(event).is_err() {
            warn!("Event channel full or closed, dropping event");
        }
    }
}
