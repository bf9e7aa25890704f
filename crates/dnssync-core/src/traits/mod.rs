//! Core traits for the DNS sync system
//!
//! - [`TargetSession`]: read and write one target's records
//! - [`TargetConnector`]: authenticate against a target and open a session

pub mod target;

pub use target::{TargetConnector, TargetSession};
