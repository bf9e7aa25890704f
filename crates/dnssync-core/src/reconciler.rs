//! Reconciler
//!
//! Converges one record type on one target towards the desired state.
//!
//! ## Strategies
//!
//! - **Granular** (production default): `to_delete = current − desired`,
//!   `to_add = desired − current`, compared on wire form. Deletions are
//!   applied before additions, one call per record. Reported changes are
//!   `|to_delete| + |to_add|`.
//! - **Bulk**: if the current and desired wire sets differ at all, one
//!   `replace_*` call carries the full desired list. Reported changes are the
//!   absolute difference of the two list lengths. That count is coarse on
//!   purpose and only feeds logging.
//!
//! Both treat set-equality as a no-op. The first failing call aborts the
//! pass; mutations already applied are not rolled back.

use std::collections::HashSet;
use tracing::{debug, info};

use crate::config::SyncStrategy;
use crate::error::{Error, Result};
use crate::record::{ManagedRecord, RecordKind, RecordSet};
use crate::traits::TargetSession;

/// What a reconciliation pass will do to one record list
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncPlan {
    /// Current and desired are set-equal
    Unchanged,

    /// Individual deletions followed by individual additions
    Granular {
        /// Wire forms to remove, in the order the target reported them
        to_delete: Vec<String>,
        /// Wire forms to add, in document order
        to_add: Vec<String>,
    },

    /// Replace the list wholesale
    Replace {
        /// The full desired list, in document order
        entries: Vec<String>,
        /// `|desired length − current length|`
        reported: usize,
    },
}

impl SyncPlan {
    /// Compute a plan from the target's current wire strings
    pub fn compute<R: ManagedRecord>(
        strategy: SyncStrategy,
        current: &[String],
        desired: &RecordSet<R>,
    ) -> Self {
        let desired_wire = desired.to_wire();
        let current_set: HashSet<&str> = current.iter().map(String::as_str).collect();
        let desired_set: HashSet<&str> = desired_wire.iter().map(String::as_str).collect();

        if current_set == desired_set {
            return SyncPlan::Unchanged;
        }

        match strategy {
            SyncStrategy::Granular => {
                let mut seen = HashSet::new();
                let to_delete = current
                    .iter()
                    .map(String::as_str)
                    .filter(|entry| !desired_set.contains(entry))
                    .filter(|entry| seen.insert(*entry))
                    .map(str::to_string)
                    .collect();
                let mut added = HashSet::new();
                let to_add = desired_wire
                    .iter()
                    .map(String::as_str)
                    .filter(|entry| !current_set.contains(entry))
                    .filter(|entry| added.insert(*entry))
                    .map(str::to_string)
                    .collect();
                SyncPlan::Granular { to_delete, to_add }
            }
            SyncStrategy::Bulk => SyncPlan::Replace {
                reported: desired_wire.len().abs_diff(current.len()),
                entries: desired_wire,
            },
        }
    }

    /// The change count this plan reports
    pub fn changes(&self) -> usize {
        match self {
            SyncPlan::Unchanged => 0,
            SyncPlan::Granular { to_delete, to_add } => to_delete.len() + to_add.len(),
            SyncPlan::Replace { reported, .. } => *reported,
        }
    }

    /// Whether applying this plan issues any mutation
    pub fn is_noop(&self) -> bool {
        match self {
            SyncPlan::Unchanged => true,
            SyncPlan::Granular { to_delete, to_add } => to_delete.is_empty() && to_add.is_empty(),
            SyncPlan::Replace { .. } => false,
        }
    }
}

/// Drives one record type on one session to the desired state
#[derive(Debug, Clone, Copy)]
pub struct Reconciler {
    strategy: SyncStrategy,
    dry_run: bool,
}

impl Reconciler {
    /// Create a reconciler for the given strategy
    pub fn new(strategy: SyncStrategy) -> Self {
        Self {
            strategy,
            dry_run: false,
        }
    }

    /// Plan and log only; never mutate
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// The configured strategy
    pub fn strategy(&self) -> SyncStrategy {
        self.strategy
    }

    /// Fetch, plan and apply for one record type
    ///
    /// # Returns
    ///
    /// The reported change count.
    ///
    /// # Errors
    ///
    /// A fetch error or the first mutation error, untouched.
    pub async fn reconcile<R: ManagedRecord>(
        &self,
        session: &dyn TargetSession,
        desired: &RecordSet<R>,
    ) -> Result<usize> {
        let current = fetch::<R>(session).await?;
        debug!(
            "{}: {} current, {} desired",
            R::KIND,
            current.len(),
            desired.len()
        );

        let plan = SyncPlan::compute(self.strategy, &current, desired);
        if plan.is_noop() {
            debug!("{}: no changes", R::KIND);
            return Ok(0);
        }

        if self.dry_run {
            log_dry_run::<R>(&plan);
            return Ok(plan.changes());
        }

        self.apply(session, &plan, desired).await?;
        Ok(plan.changes())
    }

    async fn apply<R: ManagedRecord>(
        &self,
        session: &dyn TargetSession,
        plan: &SyncPlan,
        desired: &RecordSet<R>,
    ) -> Result<()> {
        match plan {
            SyncPlan::Unchanged => Ok(()),
            SyncPlan::Granular { to_delete, to_add } => {
                for entry in to_delete {
                    info!("Deleting {} entry: {}", R::KIND, entry);
                    delete::<R>(session, entry).await?;
                }

                // Distinct records can share a wire form; add each wire form once
                let mut pending: HashSet<&str> = to_add.iter().map(String::as_str).collect();
                for record in desired.iter() {
                    let wire = record.wire();
                    if !pending.remove(wire.as_str()) {
                        continue;
                    }
                    info!("Adding {} entry: {}", R::KIND, wire);
                    add(session, record).await?;
                }
                Ok(())
            }
            SyncPlan::Replace { entries, .. } => {
                info!("Replacing {} list with {} entries", R::KIND, entries.len());
                replace::<R>(session, entries).await
            }
        }
    }
}

fn log_dry_run<R: ManagedRecord>(plan: &SyncPlan) {
    match plan {
        SyncPlan::Unchanged => {}
        SyncPlan::Granular { to_delete, to_add } => {
            for entry in to_delete {
                info!("[DRY-RUN] Would delete {} entry: {}", R::KIND, entry);
            }
            for entry in to_add {
                info!("[DRY-RUN] Would add {} entry: {}", R::KIND, entry);
            }
        }
        SyncPlan::Replace { entries, .. } => {
            info!(
                "[DRY-RUN] Would replace {} list with: {:?}",
                R::KIND,
                entries
            );
        }
    }
}

async fn fetch<R: ManagedRecord>(session: &dyn TargetSession) -> Result<Vec<String>> {
    let result = match R::KIND {
        RecordKind::Host => session.fetch_hosts().await,
        RecordKind::Cname => session.fetch_cnames().await,
    };
    result.map_err(|e| match e {
        Error::Fetch(_) | Error::Authentication(_) => e,
        other => Error::fetch(format!("{}: {}", R::KIND, other)),
    })
}

async fn delete<R: ManagedRecord>(session: &dyn TargetSession, entry: &str) -> Result<()> {
    let result = match R::KIND {
        RecordKind::Host => session.delete_host(entry).await,
        RecordKind::Cname => session.delete_cname(entry).await,
    };
    result.map_err(|e| as_mutation(e, entry))
}

async fn add<R: ManagedRecord>(session: &dyn TargetSession, record: &R) -> Result<()> {
    let (first, second) = record.fields();
    let result = match R::KIND {
        RecordKind::Host => session.add_host(first, second).await,
        RecordKind::Cname => session.add_cname(first, second).await,
    };
    result.map_err(|e| as_mutation(e, &record.wire()))
}

async fn replace<R: ManagedRecord>(session: &dyn TargetSession, entries: &[String]) -> Result<()> {
    let result = match R::KIND {
        RecordKind::Host => session.replace_hosts(entries).await,
        RecordKind::Cname => session.replace_cnames(entries).await,
    };
    result.map_err(|e| as_mutation(e, &R::KIND.to_string()))
}

fn as_mutation(error: Error, key: &str) -> Error {
    match error {
        Error::Mutation { .. } | Error::Authentication(_) => error,
        other => Error::mutation(key, None, other.to_string()),
    }
}
