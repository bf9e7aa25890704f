//! Bulk sync into a local `pihole.toml`
//!
//! Writes a sample Pi-hole config to a temporary directory, registers the
//! Pi-hole connectors and runs one bulk pass with a dry run first.

use dnssync_core::{DesiredState, Result, SyncEngine, SyncStrategy, SyncTarget, TargetRegistry};
use std::sync::Arc;
use tracing::info;

const PIHOLE_TOML: &str = r#"# Pi-hole configuration file
[dns]
  upstreams = ["1.1.1.1", "9.9.9.9"]
  hosts = ["10.0.0.1 router.lan", "10.0.0.9 stale.lan"]
  cnameRecords = []
"#;

const DESIRED: &str = r#"
[dns]
hosts = ["10.0.0.1 router.lan", "10.0.0.2 nas.lan", "10.0.0.3 printer.lan"]
cnameRecords = ["files.lan,nas.lan"]
"#;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let dir = tempfile::tempdir()?;
    let path = dir.path().join("pihole.toml");
    std::fs::write(&path, PIHOLE_TOML)?;

    let registry = TargetRegistry::new();
    dnssync_pihole::register(&registry, dnssync_pihole::DEFAULT_HTTP_TIMEOUT)?;
    let registry = Arc::new(registry);

    let desired = DesiredState::from_toml_str(DESIRED)?;
    let targets = [SyncTarget::new(format!("file://{}", path.display()), "")];

    let dry_run = SyncEngine::new(registry.clone(), SyncStrategy::Bulk).with_dry_run(true);
    info!("dry run: {}", dry_run.run(&targets, &desired).await.summary());

    let engine = SyncEngine::new(registry, SyncStrategy::Bulk);
    info!("{}", engine.run(&targets, &desired).await.summary());

    println!("{}", std::fs::read_to_string(&path)?);
    Ok(())
}
