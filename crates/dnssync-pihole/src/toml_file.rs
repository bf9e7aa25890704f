//! `pihole.toml` file target
//!
//! Edits `[dns] hosts` and `[dns] cnameRecords` in a Pi-hole configuration
//! file directly, for hosts where the sync runs next to the appliance.
//! Every other key, comment and formatting choice in the file is preserved.
//!
//! Target addresses look like `file:///etc/pihole/pihole.toml`. The password
//! is ignored.
//!
//! Each mutation is persisted immediately with a write-then-rename so a
//! crash never leaves a truncated file behind.

use async_trait::async_trait;
use dnssync_core::record::RecordKind;
use dnssync_core::traits::{TargetConnector, TargetSession};
use dnssync_core::{Error, Result, SyncTarget};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use toml_edit::{Array, DocumentMut, Table};
use tracing::{debug, info};

/// Opens sessions on local `pihole.toml` files
#[derive(Debug, Clone, Default)]
pub struct TomlFileConnector;

impl TomlFileConnector {
    pub fn new() -> Self {
        Self
    }
}

/// Path part of a `file://` address
pub(crate) fn file_path(address: &str) -> Option<PathBuf> {
    let (scheme, path) = address.split_once("://")?;
    if !scheme.eq_ignore_ascii_case("file") || path.is_empty() {
        return None;
    }
    Some(PathBuf::from(path))
}

#[async_trait]
impl TargetConnector for TomlFileConnector {
    async fn connect(&self, target: &SyncTarget) -> Result<Box<dyn TargetSession>> {
        let path = file_path(&target.address).ok_or_else(|| {
            Error::auth(format!("Not a file address: '{}'", target.address))
        })?;

        info!("Opening Pi-hole config file {}", path.display());
        let body = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| Error::auth(format!("Cannot read {}: {}", path.display(), e)))?;
        let document = body
            .parse::<DocumentMut>()
            .map_err(|e| Error::auth(format!("Cannot parse {}: {}", path.display(), e)))?;

        Ok(Box::new(TomlFileSession {
            path,
            document: Mutex::new(document),
        }))
    }

    fn supports(&self, target: &SyncTarget) -> bool {
        file_path(&target.address).is_some()
    }
}

/// An open `pihole.toml` document
#[derive(Debug)]
pub struct TomlFileSession {
    path: PathBuf,
    document: Mutex<DocumentMut>,
}

/// Read `dns.<field>` as a list of wire strings; missing means empty
pub(crate) fn read_entries(document: &DocumentMut, field: &str) -> Result<Vec<String>> {
    let Some(item) = document.get("dns").and_then(|dns| dns.get(field)) else {
        return Ok(Vec::new());
    };

    let array = item
        .as_array()
        .ok_or_else(|| Error::fetch(format!("dns.{} is not an array", field)))?;

    array
        .iter()
        .map(|value| {
            value
                .as_str()
                .map(str::to_string)
                .ok_or_else(|| Error::fetch(format!("dns.{} entry is not a string", field)))
        })
        .collect()
}

/// The `dns.<field>` array, created if missing
fn entries_mut<'a>(document: &'a mut DocumentMut, field: &str) -> Result<&'a mut Array> {
    let dns: &mut Table = document
        .entry("dns")
        .or_insert(toml_edit::table())
        .as_table_mut()
        .ok_or_else(|| Error::mutation(field, None, "dns is not a table"))?;

    dns.entry(field)
        .or_insert(toml_edit::value(Array::new()))
        .as_array_mut()
        .ok_or_else(|| Error::mutation(field, None, format!("dns.{} is not an array", field)))
}

async fn persist(path: &Path, document: &DocumentMut, key: &str) -> Result<()> {
    let mut staging = path.as_os_str().to_owned();
    staging.push(".tmp");
    let staging = PathBuf::from(staging);

    let write = async {
        tokio::fs::write(&staging, document.to_string()).await?;
        tokio::fs::rename(&staging, path).await
    };
    write.await.map_err(|e| {
        Error::mutation(key, None, format!("Failed to write {}: {}", path.display(), e))
    })?;

    debug!("Wrote {}", path.display());
    Ok(())
}

impl TomlFileSession {
    async fn fetch(&self, kind: RecordKind) -> Result<Vec<String>> {
        let document = self.document.lock().await;
        read_entries(&document, &kind.to_string())
    }

    async fn delete(&self, kind: RecordKind, entry: &str) -> Result<()> {
        let mut document = self.document.lock().await;
        let entries = entries_mut(&mut document, &kind.to_string())?;

        let before = entries.len();
        entries.retain(|value| value.as_str() != Some(entry));
        if entries.len() == before {
            return Err(Error::mutation(entry, None, "entry not present"));
        }

        info!("Deleted {} entry: {}", kind, entry);
        persist(&self.path, &document, entry).await
    }

    async fn add(&self, kind: RecordKind, entry: String) -> Result<()> {
        let mut document = self.document.lock().await;
        let entries = entries_mut(&mut document, &kind.to_string())?;

        if entries.iter().any(|value| value.as_str() == Some(entry.as_str())) {
            return Err(Error::mutation(entry, None, "entry already present"));
        }
        entries.push(entry.as_str());

        info!("Added {} entry: {}", kind, entry);
        persist(&self.path, &document, &entry).await
    }

    async fn replace(&self, kind: RecordKind, replacement: &[String]) -> Result<()> {
        let field = kind.to_string();
        let mut document = self.document.lock().await;
        let entries = entries_mut(&mut document, &field)?;

        entries.clear();
        for entry in replacement {
            entries.push(entry.as_str());
        }

        info!("Replaced {} list ({} entries)", kind, replacement.len());
        persist(&self.path, &document, &field).await
    }
}

#[async_trait]
impl TargetSession for TomlFileSession {
    async fn fetch_hosts(&self) -> Result<Vec<String>> {
        self.fetch(RecordKind::Host).await
    }

    async fn fetch_cnames(&self) -> Result<Vec<String>> {
        self.fetch(RecordKind::Cname).await
    }

    async fn delete_host(&self, key: &str) -> Result<()> {
        self.delete(RecordKind::Host, key).await
    }

    async fn add_host(&self, ip: &str, domain: &str) -> Result<()> {
        self.add(RecordKind::Host, format!("{} {}", ip, domain)).await
    }

    async fn delete_cname(&self, key: &str) -> Result<()> {
        self.delete(RecordKind::Cname, key).await
    }

    async fn add_cname(&self, domain: &str, target: &str) -> Result<()> {
        self.add(RecordKind::Cname, format!("{},{}", domain, target))
            .await
    }

    async fn replace_hosts(&self, entries: &[String]) -> Result<()> {
        self.replace(RecordKind::Host, entries).await
    }

    async fn replace_cnames(&self, entries: &[String]) -> Result<()> {
        self.replace(RecordKind::Cname, entries).await
    }

    fn target_type(&self) -> &'static str {
        "pihole-toml"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const PIHOLE_TOML: &str = r#"# Pi-hole configuration file
[dns]
  # Upstream servers
  upstreams = ["1.1.1.1"]

  hosts = [
    "10.0.0.1 router.lan", # gateway
    "10.0.0.9 stale.lan"
  ]

[webserver]
  port = "80"
"#;

    async fn open(dir: &TempDir, body: &str) -> (PathBuf, Box<dyn TargetSession>) {
        let path = dir.path().join("pihole.toml");
        std::fs::write(&path, body).unwrap();
        let target = SyncTarget::new(format!("file://{}", path.display()), "");
        let session = TomlFileConnector::new().connect(&target).await.unwrap();
        (path, session)
    }

    #[test]
    fn test_file_path() {
        assert_eq!(
            file_path("file:///etc/pihole/pihole.toml"),
            Some(PathBuf::from("/etc/pihole/pihole.toml"))
        );
        assert_eq!(file_path("http://pihole.local"), None);
        assert_eq!(file_path("file://"), None);
    }

    #[tokio::test]
    async fn test_fetch_reads_dns_lists() {
        let dir = TempDir::new().unwrap();
        let (_, session) = open(&dir, PIHOLE_TOML).await;

        assert_eq!(
            session.fetch_hosts().await.unwrap(),
            vec!["10.0.0.1 router.lan", "10.0.0.9 stale.lan"]
        );
        assert!(session.fetch_cnames().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_mutations_preserve_unrelated_content() {
        let dir = TempDir::new().unwrap();
        let (path, session) = open(&dir, PIHOLE_TOML).await;

        session.delete_host("10.0.0.9 stale.lan").await.unwrap();
        session.add_host("10.0.0.2", "nas.lan").await.unwrap();
        session.add_cname("files.lan", "nas.lan").await.unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("# Pi-hole configuration file"));
        assert!(written.contains("# Upstream servers"));
        assert!(written.contains("port = \"80\""));
        assert!(!written.contains("stale.lan"));

        let reparsed = written.parse::<DocumentMut>().unwrap();
        assert_eq!(
            read_entries(&reparsed, "hosts").unwrap(),
            vec!["10.0.0.1 router.lan", "10.0.0.2 nas.lan"]
        );
        assert_eq!(
            read_entries(&reparsed, "cnameRecords").unwrap(),
            vec!["files.lan,nas.lan"]
        );
    }

    #[tokio::test]
    async fn test_replace_overwrites_list() {
        let dir = TempDir::new().unwrap();
        let (path, session) = open(&dir, PIHOLE_TOML).await;

        session
            .replace_hosts(&["10.0.0.5 new.lan".to_string()])
            .await
            .unwrap();

        let reparsed = std::fs::read_to_string(&path)
            .unwrap()
            .parse::<DocumentMut>()
            .unwrap();
        assert_eq!(read_entries(&reparsed, "hosts").unwrap(), vec!["10.0.0.5 new.lan"]);
        assert!(!dir.path().join("pihole.toml.tmp").exists());
    }

    #[tokio::test]
    async fn test_missing_dns_table_is_created() {
        let dir = TempDir::new().unwrap();
        let (path, session) = open(&dir, "[webserver]\nport = \"80\"\n").await;

        assert!(session.fetch_hosts().await.unwrap().is_empty());
        session.add_host("10.0.0.1", "a.lan").await.unwrap();

        let reparsed = std::fs::read_to_string(&path)
            .unwrap()
            .parse::<DocumentMut>()
            .unwrap();
        assert_eq!(read_entries(&reparsed, "hosts").unwrap(), vec!["10.0.0.1 a.lan"]);
    }

    #[tokio::test]
    async fn test_delete_missing_entry_is_mutation_error() {
        let dir = TempDir::new().unwrap();
        let (_, session) = open(&dir, PIHOLE_TOML).await;

        let result = session.delete_host("10.0.0.7 ghost.lan").await;
        assert!(matches!(result, Err(Error::Mutation { ref key, .. }) if key == "10.0.0.7 ghost.lan"));
    }

    #[tokio::test]
    async fn test_malformed_list_is_fetch_error() {
        let dir = TempDir::new().unwrap();
        let (_, session) = open(&dir, "[dns]\nhosts = \"10.0.0.1 a.lan\"\n").await;

        assert!(matches!(session.fetch_hosts().await, Err(Error::Fetch(_))));
    }

    #[tokio::test]
    async fn test_unreadable_file_is_auth_error() {
        let dir = TempDir::new().unwrap();
        let target = SyncTarget::new(
            format!("file://{}", dir.path().join("missing.toml").display()),
            "",
        );
        let result = TomlFileConnector::new().connect(&target).await;
        assert!(matches!(result, Err(Error::Authentication(_))));
    }
}
