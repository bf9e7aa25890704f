//! Test doubles and common utilities for reconciliation contract tests
//!
//! [`MemoryTarget`] is an in-memory target that records every call and can
//! be told to fail at a given stage. [`MemoryConnector`] hands out sessions on
//! a fixed set of memory targets keyed by address.

#![allow(dead_code)]

use async_trait::async_trait;
use dnssync_core::error::{Error, Result};
use dnssync_core::record::{CnameRecord, DesiredState, HostRecord};
use dnssync_core::traits::{TargetConnector, TargetSession};
use dnssync_core::SyncTarget;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// A call observed by a memory target
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    FetchHosts,
    FetchCnames,
    DeleteHost(String),
    AddHost(String),
    DeleteCname(String),
    AddCname(String),
    ReplaceHosts(Vec<String>),
    ReplaceCnames(Vec<String>),
    Close,
}

impl Call {
    /// Whether this call changes the target
    pub fn is_mutation(&self) -> bool {
        !matches!(self, Call::FetchHosts | Call::FetchCnames | Call::Close)
    }
}

#[derive(Debug, Default)]
struct TargetState {
    hosts: Vec<String>,
    cnames: Vec<String>,
    calls: Vec<Call>,
    fail_auth: bool,
    fail_fetch: bool,
    fail_mutation_on: Option<String>,
}

/// An in-memory target with call recording and failure injection
#[derive(Debug, Clone, Default)]
pub struct MemoryTarget {
    state: Arc<Mutex<TargetState>>,
    connect_count: Arc<AtomicUsize>,
}

impl MemoryTarget {
    pub fn new(hosts: &[&str], cnames: &[&str]) -> Self {
        let target = Self::default();
        {
            let mut state = target.state.lock().unwrap();
            state.hosts = hosts.iter().map(|s| s.to_string()).collect();
            state.cnames = cnames.iter().map(|s| s.to_string()).collect();
        }
        target
    }

    pub fn failing_auth(self) -> Self {
        self.state.lock().unwrap().fail_auth = true;
        self
    }

    pub fn failing_fetch(self) -> Self {
        self.state.lock().unwrap().fail_fetch = true;
        self
    }

    /// Fail any mutation whose key equals `key`
    pub fn failing_mutation_on(self, key: &str) -> Self {
        self.state.lock().unwrap().fail_mutation_on = Some(key.to_string());
        self
    }

    pub fn hosts(&self) -> Vec<String> {
        self.state.lock().unwrap().hosts.clone()
    }

    pub fn cnames(&self) -> Vec<String> {
        self.state.lock().unwrap().cnames.clone()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn mutation_calls(&self) -> Vec<Call> {
        self.calls().into_iter().filter(Call::is_mutation).collect()
    }

    pub fn connect_count(&self) -> usize {
        self.connect_count.load(Ordering::SeqCst)
    }

    fn record(&self, call: Call) {
        self.state.lock().unwrap().calls.push(call);
    }

    fn check_fetch(&self) -> Result<()> {
        if self.state.lock().unwrap().fail_fetch {
            return Err(Error::fetch("injected fetch failure"));
        }
        Ok(())
    }

    fn check_mutation(&self, key: &str) -> Result<()> {
        if self.state.lock().unwrap().fail_mutation_on.as_deref() == Some(key) {
            return Err(Error::mutation(key, Some(500), "injected mutation failure"));
        }
        Ok(())
    }
}

#[async_trait]
impl TargetSession for MemoryTarget {
    async fn fetch_hosts(&self) -> Result<Vec<String>> {
        self.record(Call::FetchHosts);
        self.check_fetch()?;
        Ok(self.hosts())
    }

    async fn fetch_cnames(&self) -> Result<Vec<String>> {
        self.record(Call::FetchCnames);
        self.check_fetch()?;
        Ok(self.cnames())
    }

    async fn delete_host(&self, key: &str) -> Result<()> {
        self.record(Call::DeleteHost(key.to_string()));
        self.check_mutation(key)?;
        self.state.lock().unwrap().hosts.retain(|entry| entry != key);
        Ok(())
    }

    async fn add_host(&self, ip: &str, domain: &str) -> Result<()> {
        let entry = format!("{} {}", ip, domain);
        self.record(Call::AddHost(entry.clone()));
        self.check_mutation(&entry)?;
        self.state.lock().unwrap().hosts.push(entry);
        Ok(())
    }

    async fn delete_cname(&self, key: &str) -> Result<()> {
        self.record(Call::DeleteCname(key.to_string()));
        self.check_mutation(key)?;
        self.state.lock().unwrap().cnames.retain(|entry| entry != key);
        Ok(())
    }

    async fn add_cname(&self, domain: &str, target: &str) -> Result<()> {
        let entry = format!("{},{}", domain, target);
        self.record(Call::AddCname(entry.clone()));
        self.check_mutation(&entry)?;
        self.state.lock().unwrap().cnames.push(entry);
        Ok(())
    }

    async fn replace_hosts(&self, entries: &[String]) -> Result<()> {
        self.record(Call::ReplaceHosts(entries.to_vec()));
        self.check_mutation("hosts")?;
        self.state.lock().unwrap().hosts = entries.to_vec();
        Ok(())
    }

    async fn replace_cnames(&self, entries: &[String]) -> Result<()> {
        self.record(Call::ReplaceCnames(entries.to_vec()));
        self.check_mutation("cnameRecords")?;
        self.state.lock().unwrap().cnames = entries.to_vec();
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.record(Call::Close);
        Ok(())
    }

    fn target_type(&self) -> &'static str {
        "memory"
    }
}

/// Connector over a fixed set of memory targets
#[derive(Default)]
pub struct MemoryConnector {
    targets: HashMap<String, MemoryTarget>,
}

impl MemoryConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_target(mut self, address: &str, target: MemoryTarget) -> Self {
        self.targets.insert(address.to_string(), target);
        self
    }
}

#[async_trait]
impl TargetConnector for MemoryConnector {
    async fn connect(&self, target: &SyncTarget) -> Result<Box<dyn TargetSession>> {
        let memory = self
            .targets
            .get(&target.address)
            .ok_or_else(|| Error::auth(format!("unknown target {}", target.address)))?;
        memory.connect_count.fetch_add(1, Ordering::SeqCst);

        if memory.state.lock().unwrap().fail_auth {
            return Err(Error::auth("injected authentication failure"));
        }
        Ok(Box::new(memory.clone()))
    }

    fn supports(&self, target: &SyncTarget) -> bool {
        self.targets.contains_key(&target.address)
    }
}

/// Build a desired state from host and CNAME pairs
pub fn desired(hosts: &[(&str, &str)], cnames: &[(&str, &str)]) -> DesiredState {
    let mut state = DesiredState::new();
    for (ip, domain) in hosts {
        state.hosts.insert(HostRecord::new(*ip, *domain).unwrap());
    }
    for (domain, target) in cnames {
        state.cnames.insert(CnameRecord::new(*domain, *target).unwrap());
    }
    state
}

/// Wire strings as owned values
pub fn wire(entries: &[&str]) -> Vec<String> {
    entries.iter().map(|e| e.to_string()).collect()
}
