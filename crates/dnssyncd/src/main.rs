// # dnssyncd - DNS Sync Runner
//
// One-shot process that makes every configured Pi-hole serve exactly the
// local DNS records declared in a git repository:
//
// 1. Load configuration (TOML file, then environment, then defaults)
// 2. Clone the repository into a temporary directory
// 3. Parse the desired-state document
// 4. Reconcile every target and log a summary
//
// All reconciliation logic lives in dnssync-core. This binary only wires
// components together and maps the outcome to an exit code.
//
// ## Configuration
//
// - `CONFIG`: Path to the TOML config file (default `/config/config.toml`).
//   A missing explicit path, or a leftover `config.yml`, is logged as a warning
// - `REPO_URL`: Repository holding the desired state
// - `SSH_KEY`: Deploy key used for the clone
// - `DNS_CONFIG_PATH`: Document path inside the repository
// - `PIHOLE_URLS` / `PIHOLE_PASSWORDS`: Comma-separated, zipped pairwise
// - `DNS_SYNC_STRATEGY`: `granular` or `bulk`
// - `DNS_SYNC_DRY_RUN`: Plan and log only
// - `DNS_SYNC_TIMEOUT_SECS`: Per-request timeout
// - `DNS_SYNC_LOG_LEVEL`: trace, debug, info, warn, error
//
// Values in the config file win over the environment.
//
// ## Example
//
// ```bash
// export REPO_URL=git@github.com:example/homelab.git
// export PIHOLE_URLS=http://pihole-1.lan,http://pihole-2.lan
// export PIHOLE_PASSWORDS=secret1,secret2
//
// dnssyncd
// ```

use anyhow::{Context, Result};
use dnssync_core::{Error, RawConfig, SyncConfig, SyncEngine, SyncReport, TargetRegistry};
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{Level, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Config file location override
const CONFIG_ENV: &str = "CONFIG";

/// Config file read when `CONFIG` is unset
const DEFAULT_CONFIG_PATH: &str = "/config/config.toml";

/// Log level variable
const LOG_LEVEL_ENV: &str = "DNS_SYNC_LOG_LEVEL";

/// Exit codes for the possible run outcomes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DnsSyncExitCode {
    /// Every target converged
    Success = 0,
    /// Configuration missing or invalid
    ConfigError = 1,
    /// Clone, parse or runtime failure before any target was touched
    RunError = 2,
    /// At least one target failed
    TargetFailures = 3,
}

impl From<DnsSyncExitCode> for ExitCode {
    fn from(code: DnsSyncExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

fn parse_log_level(value: &str) -> Option<Level> {
    match value.trim().to_lowercase().as_str() {
        "trace" => Some(Level::TRACE),
        "debug" => Some(Level::DEBUG),
        "info" => Some(Level::INFO),
        "warn" => Some(Level::WARN),
        "error" => Some(Level::ERROR),
        _ => None,
    }
}

/// Legacy config file names that are no longer read
const LEGACY_CONFIG_NAMES: [&str; 2] = ["config.yml", "config.yaml"];

/// Warning for a config file that will not be read
///
/// Returns `None` when the file exists, or when it is the unset default and
/// no legacy YAML file sits next to it.
fn missing_config_notice(config_path: &Path, explicitly_set: bool) -> Option<String> {
    if config_path.exists() {
        return None;
    }

    let legacy = config_path.parent().and_then(|dir| {
        LEGACY_CONFIG_NAMES
            .iter()
            .map(|name| dir.join(name))
            .find(|candidate| candidate.exists())
    });

    match legacy {
        Some(yaml) => Some(format!(
            "{} not found but {} exists; YAML config is not read, convert it to TOML",
            config_path.display(),
            yaml.display()
        )),
        None if explicitly_set => Some(format!(
            "{} is set to {} which does not exist; using environment only",
            CONFIG_ENV,
            config_path.display()
        )),
        None => None,
    }
}

/// Read the config file (if present) and overlay the environment
fn load_config<F>(config_path: &Path, lookup: F) -> Result<SyncConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let raw = if config_path.exists() {
        let body = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read {}", config_path.display()))?;
        RawConfig::from_toml_str(&body)?
    } else {
        RawConfig::default()
    };

    let config = raw.resolve(lookup)?;
    config.validate()?;
    Ok(config)
}

fn main() -> ExitCode {
    let log_level = match std::env::var(LOG_LEVEL_ENV) {
        Ok(value) => match parse_log_level(&value) {
            Some(level) => level,
            None => {
                eprintln!(
                    "{} '{}' is not valid. Valid levels: trace, debug, info, warn, error",
                    LOG_LEVEL_ENV, value
                );
                return DnsSyncExitCode::ConfigError.into();
            }
        },
        Err(_) => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return DnsSyncExitCode::ConfigError.into();
    }

    let explicit_path = std::env::var(CONFIG_ENV).ok();
    let config_path = explicit_path
        .clone()
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    if let Some(notice) = missing_config_notice(Path::new(&config_path), explicit_path.is_some()) {
        warn!("{}", notice);
    }
    let config = match load_config(Path::new(&config_path), |key| std::env::var(key).ok()) {
        Ok(config) => config,
        Err(e) => {
            error!("Configuration error: {:#}", e);
            return DnsSyncExitCode::ConfigError.into();
        }
    };

    info!("Starting dnssyncd");
    info!(
        "Configuration loaded: {} target(s), {} strategy{}",
        config.targets.len(),
        config.strategy,
        if config.dry_run { ", dry run" } else { "" }
    );

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return DnsSyncExitCode::RunError.into();
        }
    };

    rt.block_on(async {
        tokio::select! {
            code = run(config) => code,
            received = wait_for_shutdown() => {
                warn!("Received {} before the sync finished; aborting", received);
                DnsSyncExitCode::RunError
            }
        }
    })
    .into()
}

/// Run one sync pass and map the outcome to an exit code
async fn run(config: SyncConfig) -> DnsSyncExitCode {
    match sync(&config).await {
        Ok(report) => {
            for (target, failure) in report.failures() {
                error!("Target {} failed: {}", target, failure);
            }
            info!("{}", report.summary());
            exit_code_for(&report)
        }
        Err(e) => {
            error!("Sync aborted: {}", e);
            if matches!(e, Error::Config(_)) {
                DnsSyncExitCode::ConfigError
            } else {
                DnsSyncExitCode::RunError
            }
        }
    }
}

fn exit_code_for(report: &SyncReport) -> DnsSyncExitCode {
    if report.is_success() {
        DnsSyncExitCode::Success
    } else {
        DnsSyncExitCode::TargetFailures
    }
}

/// Clone, parse and reconcile
async fn sync(config: &SyncConfig) -> dnssync_core::Result<SyncReport> {
    let registry = TargetRegistry::new();
    dnssync_pihole::register(&registry, Duration::from_secs(config.timeout_secs))?;

    let repository =
        dnssync_git::clone_repository(&config.repo_url, Path::new(&config.ssh_key)).await?;
    let desired =
        dnssync_core::load_desired_state(repository.join(&config.dns_config_path)).await?;

    let engine = SyncEngine::from_config(Arc::new(registry), config);
    Ok(engine.run(&config.targets, &desired).await)
}

/// Wait for SIGTERM or SIGINT
///
/// If the handlers cannot be installed this never resolves, so the sync
/// runs to completion.
#[cfg(unix)]
async fn wait_for_shutdown() -> &'static str {
    let handlers = signal(SignalKind::terminate())
        .and_then(|sigterm| Ok((sigterm, signal(SignalKind::interrupt())?)));
    let (mut sigterm, mut sigint) = match handlers {
        Ok(handlers) => handlers,
        Err(e) => {
            warn!("Failed to setup signal handlers: {}", e);
            return std::future::pending().await;
        }
    };

    tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    }
}

/// Wait for CTRL-C
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn wait_for_shutdown() -> &'static str {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to wait for CTRL-C: {}", e);
        return std::future::pending().await;
    }
    "SIGINT"
}
