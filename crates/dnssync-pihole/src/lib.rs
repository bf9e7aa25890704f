// # Pi-hole Targets
//
// This crate provides the Pi-hole target implementations for the DNS sync
// system:
//
// - [`PiholeConnector`]: the Pi-hole v6 REST API (`http://`, `https://`)
// - [`TomlFileConnector`]: a local `pihole.toml` file (`file://`)
//
// ## Architectural Constraints
//
// Targets are **untrusted** components with strict limitations:
//
// **Allowed Capabilities**:
// - ✅ Perform HTTP/HTTPS API calls to the configured appliance only
// - ✅ Read and write the configured `pihole.toml` only
// - ✅ Return errors to the engine
//
// **Forbidden Capabilities**:
// - ❌ NO retry logic (failures are recorded per target by the engine)
// - ❌ NO decisions about what to change (owned by the reconciler)
// - ❌ NO background tasks
// - ❌ NO logging of passwords or session identifiers
//
// ## Registration
//
// ```rust,ignore
// let registry = TargetRegistry::new();
// dnssync_pihole::register(&registry, Duration::from_secs(30))?;
// ```

pub mod api;
pub mod toml_file;

pub use api::{DEFAULT_HTTP_TIMEOUT, PiholeConnector, PiholeSession};
pub use toml_file::{TomlFileConnector, TomlFileSession};

use dnssync_core::{Result, TargetRegistry};
use std::sync::Arc;
use std::time::Duration;

/// Register the Pi-hole connectors under `http`, `https` and `file`
pub fn register(registry: &TargetRegistry, timeout: Duration) -> Result<()> {
    let api = Arc::new(PiholeConnector::new(timeout)?);
    registry.register("http", api.clone());
    registry.register("https", api);
    registry.register("file", Arc::new(TomlFileConnector::new()));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_all_schemes() {
        let registry = TargetRegistry::new();
        register(&registry, DEFAULT_HTTP_TIMEOUT).unwrap();

        assert_eq!(registry.list_schemes(), vec!["file", "http", "https"]);
    }
}
