//! Record model
//!
//! Canonical host and CNAME entries, their identity keys and the fixed wire
//! form exchanged with targets:
//!
//! - host: `"<ip> <domain>"`
//! - CNAME: `"<domain>,<target>"`
//!
//! Values are passed through verbatim. The only check is that no field is
//! empty; address and name syntax belongs to whoever produced the record.

use crate::error::{Error, Result};
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;

/// Separator between ip and domain in a host's wire form
pub const HOST_SEPARATOR: char = ' ';

/// Separator between alias and target in a CNAME's wire form
pub const CNAME_SEPARATOR: char = ',';

/// The two record types a target manages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    /// Host entry (A/AAAA-style)
    Host,
    /// CNAME entry
    Cname,
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordKind::Host => write!(f, "hosts"),
            RecordKind::Cname => write!(f, "cnameRecords"),
        }
    }
}

/// Behaviour shared by every record the reconciler manages
pub trait ManagedRecord: Clone + fmt::Debug + Send + Sync + 'static {
    /// Which record type this is
    const KIND: RecordKind;

    /// Identity key used for set comparison and duplicate collapse
    type Key: Clone + Eq + Hash + fmt::Debug + Send + Sync;

    /// Parse a record from its wire form
    fn from_wire(wire: &str) -> Result<Self>;

    /// The record's identity key
    fn key(&self) -> Self::Key;

    /// The two raw fields, in wire order
    fn fields(&self) -> (&str, &str);

    /// The record's wire form
    fn wire(&self) -> String;
}

fn require_non_empty(kind: RecordKind, field: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(Error::invalid_record(format!(
            "{} entry has an empty '{}'",
            kind, field
        )));
    }
    Ok(())
}

/// A host entry mapping an IP literal to a domain
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HostRecord {
    ip: String,
    domain: String,
}

impl HostRecord {
    /// Create a host record; both fields must be non-empty
    pub fn new(ip: impl Into<String>, domain: impl Into<String>) -> Result<Self> {
        let ip = ip.into();
        let domain = domain.into();
        require_non_empty(RecordKind::Host, "ip", &ip)?;
        require_non_empty(RecordKind::Host, "domain", &domain)?;
        Ok(Self { ip, domain })
    }

    /// The IP literal, unvalidated
    pub fn ip(&self) -> &str {
        &self.ip
    }

    /// The domain name
    pub fn domain(&self) -> &str {
        &self.domain
    }
}

impl ManagedRecord for HostRecord {
    const KIND: RecordKind = RecordKind::Host;
    type Key = (String, String);

    fn from_wire(wire: &str) -> Result<Self> {
        let (ip, domain) = wire
            .trim()
            .split_once(char::is_whitespace)
            .ok_or_else(|| Error::invalid_record(format!("host entry '{}' has no domain", wire)))?;
        Self::new(ip, domain.trim())
    }

    fn key(&self) -> Self::Key {
        (self.ip.clone(), self.domain.clone())
    }

    fn fields(&self) -> (&str, &str) {
        (&self.ip, &self.domain)
    }

    fn wire(&self) -> String {
        format!("{}{}{}", self.ip, HOST_SEPARATOR, self.domain)
    }
}

impl fmt::Display for HostRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.wire())
    }
}

/// A CNAME entry aliasing one domain to a canonical target
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CnameRecord {
    domain: String,
    target: String,
}

impl CnameRecord {
    /// Create a CNAME record; both fields must be non-empty
    pub fn new(domain: impl Into<String>, target: impl Into<String>) -> Result<Self> {
        let domain = domain.into();
        let target = target.into();
        require_non_empty(RecordKind::Cname, "domain", &domain)?;
        require_non_empty(RecordKind::Cname, "target", &target)?;
        Ok(Self { domain, target })
    }

    /// The alias
    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// The canonical domain
    pub fn target(&self) -> &str {
        &self.target
    }
}

impl ManagedRecord for CnameRecord {
    const KIND: RecordKind = RecordKind::Cname;
    type Key = (String, String);

    fn from_wire(wire: &str) -> Result<Self> {
        let (domain, target) = wire
            .trim()
            .split_once(CNAME_SEPARATOR)
            .ok_or_else(|| Error::invalid_record(format!("CNAME entry '{}' has no target", wire)))?;
        Self::new(domain, target)
    }

    fn key(&self) -> Self::Key {
        (self.domain.clone(), self.target.clone())
    }

    fn fields(&self) -> (&str, &str) {
        (&self.domain, &self.target)
    }

    fn wire(&self) -> String {
        format!("{}{}{}", self.domain, CNAME_SEPARATOR, self.target)
    }
}

impl fmt::Display for CnameRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.wire())
    }
}

/// An ordered set of records keyed by identity
///
/// Inserting a record whose key is already present replaces the stored
/// record in place: the later declaration wins and the first position is kept.
#[derive(Debug, Clone)]
pub struct RecordSet<R: ManagedRecord> {
    records: Vec<R>,
    index: HashMap<R::Key, usize>,
}

impl<R: ManagedRecord> RecordSet<R> {
    /// Create an empty set
    pub fn new() -> Self {
        Self {
            records: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Insert a record, returning `true` if it replaced an existing key
    pub fn insert(&mut self, record: R) -> bool {
        let key = record.key();
        match self.index.get(&key) {
            Some(&position) => {
                self.records[position] = record;
                true
            }
            None => {
                self.index.insert(key, self.records.len());
                self.records.push(record);
                false
            }
        }
    }

    /// Look up a record by identity key
    pub fn get(&self, key: &R::Key) -> Option<&R> {
        self.index.get(key).map(|&position| &self.records[position])
    }

    /// Whether a key is present
    pub fn contains_key(&self, key: &R::Key) -> bool {
        self.index.contains_key(key)
    }

    /// Number of distinct records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the set is empty
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records in declaration order
    pub fn iter(&self) -> std::slice::Iter<'_, R> {
        self.records.iter()
    }

    /// Wire forms in declaration order
    pub fn to_wire(&self) -> Vec<String> {
        self.records.iter().map(ManagedRecord::wire).collect()
    }
}

impl<R: ManagedRecord> Default for RecordSet<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: ManagedRecord> FromIterator<R> for RecordSet<R> {
    fn from_iter<I: IntoIterator<Item = R>>(iter: I) -> Self {
        let mut set = Self::new();
        for record in iter {
            set.insert(record);
        }
        set
    }
}

impl<'a, R: ManagedRecord> IntoIterator for &'a RecordSet<R> {
    type Item = &'a R;
    type IntoIter = std::slice::Iter<'a, R>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

/// The record set a run converges every target towards
///
/// Built once per run and shared read-only across targets.
#[derive(Debug, Clone, Default)]
pub struct DesiredState {
    /// Host entries
    pub hosts: RecordSet<HostRecord>,
    /// CNAME entries
    pub cnames: RecordSet<CnameRecord>,
}

impl DesiredState {
    /// Create an empty desired state
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of records across both types
    pub fn len(&self) -> usize {
        self.hosts.len() + self.cnames.len()
    }

    /// Whether no records are desired
    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty() && self.cnames.is_empty()
    }
}
