// # dnssync-core
//
// Core library for keeping DNS-filtering appliances in sync with a
// declarative record set.
//
// ## Architecture Overview
//
// - **Record Model**: host and CNAME entries, identity keys, wire form
// - **TargetSession / TargetConnector**: traits for reading and writing a
//   target's records, and for authenticating against it
// - **Reconciler**: computes and applies the changes for one record type
// - **SyncEngine**: reconciles every configured target, isolating failures
// - **TargetRegistry**: scheme-based dispatch to connector implementations
//
// ## Design Principles
//
// 1. **Separation of Concerns**: reconciliation logic never speaks HTTP
// 2. **Document is authoritative**: targets converge to the desired state
// 3. **Isolated failures**: one target's failure never affects another
// 4. **Library-First**: the daemon is a thin wrapper over this crate

pub mod config;
pub mod document;
pub mod engine;
pub mod error;
pub mod reconciler;
pub mod record;
pub mod registry;
pub mod traits;

// Re-export core types for convenience
pub use config::{RawConfig, SyncConfig, SyncStrategy, SyncTarget};
pub use document::load_desired_state;
pub use engine::{SyncEngine, SyncEvent, SyncReport, TargetFailure, TargetOutcome};
pub use error::{Error, Result, SyncStage};
pub use reconciler::{Reconciler, SyncPlan};
pub use record::{CnameRecord, DesiredState, HostRecord, ManagedRecord, RecordKind, RecordSet};
pub use registry::TargetRegistry;
pub use traits::{TargetConnector, TargetSession};
