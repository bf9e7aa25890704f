//! Scheme-based target registry
//!
//! The registry maps address schemes (`http`, `https`, `file`, ...) to
//! [`TargetConnector`]s so the engine never hard-codes which client talks to
//! which target.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use dnssync_core::TargetRegistry;
//!
//! let registry = TargetRegistry::new();
//! dnssync_pihole::register(&registry, std::time::Duration::from_secs(30))?;
//!
//! // The registry is itself a connector
//! let session = registry.connect(&target).await?;
//! ```
//!
//! ## Registration
//!
//! Implementation crates register themselves during initialization:
//!
//! ```rust,ignore
//! pub fn register(registry: &TargetRegistry, timeout: Duration) -> Result<()> {
//!     let connector = Arc::new(PiholeConnector::new(timeout)?);
//!     registry.register("http", connector.clone());
//!     registry.register("https", connector);
//!     Ok(())
//! }
//! ```

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use crate::config::SyncTarget;
use crate::error::{Error, Result};
use crate::traits::{TargetConnector, TargetSession};

/// Registry of target connectors keyed by address scheme
///
/// ## Thread Safety
///
/// The registry uses interior mutability with RwLock, allowing concurrent
/// reads and exclusive writes.
#[derive(Default)]
pub struct TargetRegistry {
    connectors: RwLock<HashMap<String, Arc<dyn TargetConnector>>>,
}

impl TargetRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connector for an address scheme
    ///
    /// Registering the same scheme twice replaces the earlier connector.
    pub fn register(&self, scheme: impl Into<String>, connector: Arc<dyn TargetConnector>) {
        let scheme = scheme.into().to_lowercase();
        let mut connectors = self
            .connectors
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        connectors.insert(scheme, connector);
    }

    /// Find the connector for a target's scheme
    pub fn connector_for(&self, target: &SyncTarget) -> Option<Arc<dyn TargetConnector>> {
        let scheme = target.scheme()?;
        let connectors = self
            .connectors
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        connectors.get(&scheme).cloned()
    }

    /// List all registered schemes
    pub fn list_schemes(&self) -> Vec<String> {
        let connectors = self
            .connectors
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        let mut schemes: Vec<String> = connectors.keys().cloned().collect();
        schemes.sort();
        schemes
    }

    /// Check if a scheme is registered
    pub fn has_scheme(&self, scheme: &str) -> bool {
        let connectors = self
            .connectors
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        connectors.contains_key(&scheme.to_lowercase())
    }
}

#[async_trait]
impl TargetConnector for TargetRegistry {
    async fn connect(&self, target: &SyncTarget) -> Result<Box<dyn TargetSession>> {
        let connector = self.connector_for(target).ok_or_else(|| {
            Error::auth(format!(
                "No connector registered for target address '{}'",
                target.address
            ))
        })?;
        connector.connect(target).await
    }

    fn supports(&self, target: &SyncTarget) -> bool {
        self.connector_for(target)
            .is_some_and(|connector| connector.supports(target))
    }
}
