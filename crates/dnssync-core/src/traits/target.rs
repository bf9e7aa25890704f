// # Target Capability
//
// Defines the interface the reconciler uses to read and write a target's
// records.
//
// ## Implementations
//
// - Pi-hole v6 REST API: `dnssync-pihole` crate (`PiholeConnector`)
// - Pi-hole `pihole.toml` on local disk: `dnssync-pihole` crate (`TomlFileConnector`)
//
// ## Usage
//
// ```rust,ignore
// use dnssync_core::{TargetConnector, SyncTarget};
//
// #[tokio::main]
// async fn main() -> dnssync_core::Result<()> {
//     let connector = /* TargetConnector implementation */;
//     let target = SyncTarget::new("http://pihole.lan", "secret");
//
//     let session = connector.connect(&target).await?;
//     for entry in session.fetch_hosts().await? {
//         println!("{}", entry);
//     }
//     session.close().await?;
//
//     Ok(())
// }
// ```

use async_trait::async_trait;

use crate::config::SyncTarget;
use crate::error::Result;

/// An authenticated session against one target
///
/// Record arguments and results are wire-form strings
/// (see [`crate::record`]).
///
/// # Responsibilities
///
/// Sessions perform single-shot calls only. They never retry, never decide
/// whether a change is needed, and never touch other targets. Each call is
/// bounded by the timeout the session was created with.
///
/// # Errors
///
/// - `fetch_*` fail with [`Error::Fetch`](crate::Error::Fetch)
/// - mutations fail with [`Error::Mutation`](crate::Error::Mutation) carrying
///   the offending key and, for HTTP targets, the status code
#[async_trait]
pub trait TargetSession: Send + Sync {
    /// Current host entries, in the order the target reports them
    async fn fetch_hosts(&self) -> Result<Vec<String>>;

    /// Current CNAME entries, in the order the target reports them
    async fn fetch_cnames(&self) -> Result<Vec<String>>;

    /// Remove one host entry by wire form
    async fn delete_host(&self, key: &str) -> Result<()>;

    /// Add one host entry
    async fn add_host(&self, ip: &str, domain: &str) -> Result<()>;

    /// Remove one CNAME entry by wire form
    async fn delete_cname(&self, key: &str) -> Result<()>;

    /// Add one CNAME entry
    async fn add_cname(&self, domain: &str, target: &str) -> Result<()>;

    /// Replace the entire host list
    async fn replace_hosts(&self, entries: &[String]) -> Result<()>;

    /// Replace the entire CNAME list
    async fn replace_cnames(&self, entries: &[String]) -> Result<()>;

    /// Release the session
    ///
    /// Called once after reconciliation. The default does nothing.
    async fn close(&self) -> Result<()> {
        Ok(())
    }

    /// Short name of the implementation (for logging)
    fn target_type(&self) -> &'static str;
}

/// Establishes sessions against targets
///
/// This is the authentication step: a connector turns a configured
/// [`SyncTarget`] into a live [`TargetSession`].
#[async_trait]
pub trait TargetConnector: Send + Sync {
    /// Authenticate against the target
    ///
    /// # Errors
    ///
    /// [`Error::Authentication`](crate::Error::Authentication) on bad
    /// credentials or transport failure.
    async fn connect(&self, target: &SyncTarget) -> Result<Box<dyn TargetSession>>;

    /// Whether this connector can handle the target's address
    fn supports(&self, target: &SyncTarget) -> bool;
}
