//! Minimal embedding example for dnssync-core
//!
//! This example demonstrates using dnssync-core as a library with a custom
//! target implementation. The application owns the engine and consumes its
//! event channel.

use async_trait::async_trait;
use dnssync_core::engine::DEFAULT_EVENT_CHANNEL_CAPACITY;
use dnssync_core::traits::{TargetConnector, TargetSession};
use dnssync_core::{DesiredState, Error, Result, SyncEngine, SyncEvent, SyncStrategy, SyncTarget};
use std::sync::{Arc, Mutex};
use tracing::info;

/// Custom target that keeps its record lists in memory
///
/// Clones share the same lists, so every session sees the same state.
#[derive(Clone, Default)]
struct EmbeddedTarget {
    hosts: Arc<Mutex<Vec<String>>>,
    cnames: Arc<Mutex<Vec<String>>>,
}

fn lock(list: &Mutex<Vec<String>>) -> std::sync::MutexGuard<'_, Vec<String>> {
    list.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

fn remove(list: &Mutex<Vec<String>>, key: &str) -> Result<()> {
    let mut list = lock(list);
    let before = list.len();
    list.retain(|entry| entry != key);
    if list.len() == before {
        return Err(Error::mutation(key, Some(404), "not found"));
    }
    Ok(())
}

#[async_trait]
impl TargetSession for EmbeddedTarget {
    async fn fetch_hosts(&self) -> Result<Vec<String>> {
        Ok(lock(&self.hosts).clone())
    }

    async fn fetch_cnames(&self) -> Result<Vec<String>> {
        Ok(lock(&self.cnames).clone())
    }

    async fn delete_host(&self, key: &str) -> Result<()> {
        info!("delete host {}", key);
        remove(&self.hosts, key)
    }

    async fn add_host(&self, ip: &str, domain: &str) -> Result<()> {
        info!("add host {} {}", ip, domain);
        lock(&self.hosts).push(format!("{} {}", ip, domain));
        Ok(())
    }

    async fn delete_cname(&self, key: &str) -> Result<()> {
        info!("delete cname {}", key);
        remove(&self.cnames, key)
    }

    async fn add_cname(&self, domain: &str, target: &str) -> Result<()> {
        info!("add cname {},{}", domain, target);
        lock(&self.cnames).push(format!("{},{}", domain, target));
        Ok(())
    }

    async fn replace_hosts(&self, entries: &[String]) -> Result<()> {
        *lock(&self.hosts) = entries.to_vec();
        Ok(())
    }

    async fn replace_cnames(&self, entries: &[String]) -> Result<()> {
        *lock(&self.cnames) = entries.to_vec();
        Ok(())
    }

    fn target_type(&self) -> &'static str {
        "embedded"
    }
}

/// Connector handing out sessions on one shared in-memory target
struct EmbeddedConnector {
    target: EmbeddedTarget,
}

#[async_trait]
impl TargetConnector for EmbeddedConnector {
    async fn connect(&self, _target: &SyncTarget) -> Result<Box<dyn TargetSession>> {
        Ok(Box::new(self.target.clone()))
    }

    fn supports(&self, target: &SyncTarget) -> bool {
        target.scheme().as_deref() == Some("mem")
    }
}

const DESIRED: &str = r#"
[dns]
hosts = [
  { ip = "10.0.0.1", domain = "router.lan" },
  "10.0.0.2 nas.lan",
]
cnameRecords = [
  { domain = "files.lan", target = "nas.lan" },
]
"#;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let target = EmbeddedTarget::default();
    lock(&target.hosts).push("10.0.0.9 stale.lan".to_string());

    let connector = Arc::new(EmbeddedConnector {
        target: target.clone(),
    });
    let (engine, mut events) =
        SyncEngine::new(connector, SyncStrategy::Granular).with_events(DEFAULT_EVENT_CHANNEL_CAPACITY);

    let desired = DesiredState::from_toml_str(DESIRED)?;
    let targets = [SyncTarget::new("mem://embedded", "")];

    let report = engine.run(&targets, &desired).await;
    println!("{}", report.summary());

    while let Ok(event) = events.try_recv() {
        if let SyncEvent::TargetSucceeded { target, changes } = event {
            info!("{} converged with {} change(s)", target, changes);
        }
    }

    println!("[Embedded] hosts:  {:?}", lock(&target.hosts));
    println!("[Embedded] cnames: {:?}", lock(&target.cnames));

    // A second pass finds nothing to do
    let again = engine.run(&targets, &desired).await;
    println!("{}", again.summary());

    Ok(())
}
