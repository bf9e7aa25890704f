//! Desired-state document parser
//!
//! Reads the TOML document kept in the record repository:
//!
//! ```toml
//! [dns]
//! hosts = [
//!   { ip = "10.0.0.1", domain = "a.local" },
//!   "10.0.0.2 b.local",
//! ]
//! cnameRecords = [
//!   { domain = "alias.local", target = "a.local" },
//!   "other.local,a.local",
//! ]
//! ```
//!
//! Entries may be tables or wire-form strings, which is the shape Pi-hole's
//! own `pihole.toml` uses. Missing sections mean "no records of that type".

use serde::Deserialize;
use std::path::Path;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::record::{CnameRecord, DesiredState, HostRecord, ManagedRecord, RecordSet};

#[derive(Debug, Default, Deserialize)]
struct Document {
    #[serde(default)]
    dns: DnsSection,
}

#[derive(Debug, Default, Deserialize)]
struct DnsSection {
    #[serde(default)]
    hosts: Vec<HostEntry>,
    #[serde(default, rename = "cnameRecords", alias = "cnames")]
    cname_records: Vec<CnameEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum HostEntry {
    Table { ip: String, domain: String },
    Wire(String),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CnameEntry {
    Table { domain: String, target: String },
    Wire(String),
}

impl HostEntry {
    fn into_record(self) -> Result<HostRecord> {
        match self {
            HostEntry::Table { ip, domain } => HostRecord::new(ip, domain),
            HostEntry::Wire(wire) => HostRecord::from_wire(&wire),
        }
    }
}

impl CnameEntry {
    fn into_record(self) -> Result<CnameRecord> {
        match self {
            CnameEntry::Table { domain, target } => CnameRecord::new(domain, target),
            CnameEntry::Wire(wire) => CnameRecord::from_wire(&wire),
        }
    }
}

fn collect<R, E>(entries: Vec<E>, convert: impl Fn(E) -> Result<R>) -> Result<RecordSet<R>>
where
    R: ManagedRecord,
{
    let mut set = RecordSet::new();
    for (position, entry) in entries.into_iter().enumerate() {
        let record = convert(entry).map_err(|e| {
            Error::parse(format!("{} entry #{}: {}", R::KIND, position + 1, e))
        })?;
        if set.insert(record) {
            debug!("Duplicate {} entry #{} collapsed", R::KIND, position + 1);
        }
    }
    Ok(set)
}

impl DesiredState {
    /// Parse a desired-state document body
    ///
    /// An empty body yields an empty state.
    pub fn from_toml_str(body: &str) -> Result<Self> {
        let document: Document = toml::from_str(body)
            .map_err(|e| Error::parse(format!("Invalid desired-state document: {}", e)))?;

        Ok(Self {
            hosts: collect(document.dns.hosts, HostEntry::into_record)?,
            cnames: collect(document.dns.cname_records, CnameEntry::into_record)?,
        })
    }
}

/// Load the desired state from a document on disk
///
/// # Errors
///
/// [`Error::Parse`] when the file is missing, unreadable or malformed.
pub async fn load_desired_state(path: impl AsRef<Path>) -> Result<DesiredState> {
    let path = path.as_ref();
    info!("Loading DNS config from {}", path.display());

    let body = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| Error::parse(format!("Failed to read {}: {}", path.display(), e)))?;

    let state = DesiredState::from_toml_str(&body)?;
    info!(
        "Loaded {} host(s) and {} CNAME(s)",
        state.hosts.len(),
        state.cnames.len()
    );
    Ok(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_tables_and_wire_strings() {
        let state = DesiredState::from_toml_str(
            r#"
            [dns]
            hosts = [
                { ip = "10.0.0.1", domain = "test1.local" },
                "10.0.0.2 test2.local",
            ]
            cnameRecords = [{ domain = "alias.local", target = "test1.local" }]
            "#,
        )
        .unwrap();

        assert_eq!(state.hosts.to_wire(), vec!["10.0.0.1 test1.local", "10.0.0.2 test2.local"]);
        assert_eq!(state.cnames.to_wire(), vec!["alias.local,test1.local"]);
    }

    #[test]
    fn test_empty_document() {
        let state = DesiredState::from_toml_str("").unwrap();
        assert!(state.is_empty());
    }

    #[test]
    fn test_missing_sections() {
        let state = DesiredState::from_toml_str(
            r#"
            [dns]
            cnameRecords = ["alias.local,test1.local"]
            "#,
        )
        .unwrap();
        assert!(state.hosts.is_empty());
        assert_eq!(state.cnames.len(), 1);

        let state = DesiredState::from_toml_str("[other]\nkey = 1").unwrap();
        assert!(state.is_empty());
    }

    #[test]
    fn test_duplicate_hosts_collapse() {
        let state = DesiredState::from_toml_str(
            r#"
            [dns]
            hosts = [
                { ip = "10.0.0.1", domain = "test.local" },
                { ip = "10.0.0.1", domain = "test.local" },
            ]
            "#,
        )
        .unwrap();
        assert_eq!(state.hosts.len(), 1);
    }

    #[test]
    fn test_malformed_entries() {
        let missing_field = r#"
            [dns]
            hosts = [{ ip = "10.0.0.1" }]
        "#;
        assert!(matches!(
            DesiredState::from_toml_str(missing_field),
            Err(Error::Parse(_))
        ));

        let empty_field = r#"
            [dns]
            cnameRecords = [{ domain = "alias.local", target = "" }]
        "#;
        assert!(matches!(
            DesiredState::from_toml_str(empty_field),
            Err(Error::Parse(_))
        ));

        let bad_wire = r#"
            [dns]
            hosts = ["10.0.0.1"]
        "#;
        assert!(matches!(
            DesiredState::from_toml_str(bad_wire),
            Err(Error::Parse(_))
        ));
    }

    #[test]
    fn test_invalid_toml() {
        let result = DesiredState::from_toml_str("[dns]\nhosts = [unclosed");
        assert!(matches!(result, Err(Error::Parse(_))));
    }

    #[tokio::test]
    async fn test_load_from_disk() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("dns-config.toml");
        tokio::fs::write(&path, "[dns]\nhosts = [\"10.0.0.1 a.local\"]\n")
            .await
            .unwrap();

        let state = load_desired_state(&path).await.unwrap();
        assert_eq!(state.hosts.len(), 1);
    }

    #[tokio::test]
    async fn test_missing_file_is_parse_error() {
        let dir = tempdir().unwrap();
        let result = load_desired_state(dir.path().join("dns-config.toml")).await;
        assert!(matches!(result, Err(Error::Parse(_))));
    }
}
