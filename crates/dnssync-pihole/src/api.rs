// # Pi-hole v6 API target
//
// ## API Reference
//
// - Login: POST `/api/auth` `{"password": ...}` → `session.sid`, `session.csrf`
// - Logout: DELETE `/api/auth`
// - List: GET `/api/config/dns/hosts`, GET `/api/config/dns/cnameRecords`
// - Add: POST `/api/config/dns/{hosts|cnameRecords}` `{"value": "<wire>"}`
// - Delete: DELETE `/api/config/dns/{hosts|cnameRecords}/<urlencoded wire>`
// - Bulk: PATCH `/api/config` `{"config": {"dns": {"hosts": [...]}}}`
//
// Authenticated requests carry `X-FTL-SID` and `X-FTL-CSRF`.
//
// ## Constraints
//
// - One HTTP request per session call, bounded by the client timeout
// - No retries; failures go back to the engine, which records them
// - The password, sid and csrf token NEVER appear in logs

use async_trait::async_trait;
use dnssync_core::record::RecordKind;
use dnssync_core::traits::{TargetConnector, TargetSession};
use dnssync_core::{Error, Result, SyncTarget};
use reqwest::{Method, RequestBuilder, StatusCode};
use serde_json::{Value, json};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default HTTP timeout for API requests (30 seconds)
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Session header carrying the sid
const SID_HEADER: &str = "X-FTL-SID";

/// Session header carrying the CSRF token
const CSRF_HEADER: &str = "X-FTL-CSRF";

/// Opens authenticated sessions on Pi-hole v6 instances
#[derive(Debug, Clone)]
pub struct PiholeConnector {
    client: reqwest::Client,
}

impl PiholeConnector {
    /// Create a connector whose requests time out after `timeout`
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl TargetConnector for PiholeConnector {
    async fn connect(&self, target: &SyncTarget) -> Result<Box<dyn TargetSession>> {
        let base_url = target.address.trim_end_matches('/').to_string();
        info!("Authenticating with Pi-hole API at {}", base_url);

        let response = self
            .client
            .post(format!("{}/api/auth", base_url))
            .json(&json!({ "password": target.password }))
            .send()
            .await
            .map_err(|e| Error::auth(format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = read_error_text(response).await;
            return Err(Error::auth(describe_status(status, &error_text)));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| Error::auth(format!("Failed to parse response: {}", e)))?;
        let credentials = parse_session(&body)?;

        debug!("Authenticated with {}", base_url);
        Ok(Box::new(PiholeSession {
            client: self.client.clone(),
            base_url,
            credentials,
        }))
    }

    fn supports(&self, target: &SyncTarget) -> bool {
        matches!(target.scheme().as_deref(), Some("http") | Some("https"))
    }
}

/// Session identifiers returned by a successful login
#[derive(Clone, PartialEq, Eq)]
pub(crate) struct SessionCredentials {
    sid: Option<String>,
    csrf: Option<String>,
}

/// Extract the session from a login response body
///
/// A Pi-hole without a password answers `valid: true` with no sid; requests
/// then go out without session headers.
pub(crate) fn parse_session(body: &Value) -> Result<SessionCredentials> {
    let session = body
        .get("session")
        .ok_or_else(|| Error::auth("Invalid response format: missing session"))?;

    if !session["valid"].as_bool().unwrap_or(false) {
        let message = session["message"].as_str().unwrap_or("session not valid");
        return Err(Error::auth(format!("Login rejected: {}", message)));
    }

    Ok(SessionCredentials {
        sid: session["sid"].as_str().map(str::to_string),
        csrf: session["csrf"].as_str().map(str::to_string),
    })
}

/// Extract `config.dns.<field>` from a config response body
pub(crate) fn extract_entries(body: &Value, field: &str) -> Result<Vec<String>> {
    let Some(entries) = body.get("config").and_then(|c| c.get("dns")).and_then(|d| d.get(field))
    else {
        return Ok(Vec::new());
    };

    let entries = entries.as_array().ok_or_else(|| {
        Error::fetch(format!("Invalid response format: {} is not an array", field))
    })?;

    entries
        .iter()
        .map(|entry| {
            entry.as_str().map(str::to_string).ok_or_else(|| {
                Error::fetch(format!("Invalid response format: {} entry is not a string", field))
            })
        })
        .collect()
}

/// Path of a single entry under a record list
pub(crate) fn entry_path(kind: RecordKind, entry: &str) -> String {
    format!("/api/config/dns/{}/{}", kind, urlencoding::encode(entry))
}

fn describe_status(status: StatusCode, error_text: &str) -> String {
    match status.as_u16() {
        401 | 403 => format!(
            "Authentication failed: invalid password or expired session. Status: {}",
            status
        ),
        404 => format!("Not found. Status: {}", status),
        409 => format!("Conflict: entry already exists. Status: {}", status),
        429 => format!("Rate limit exceeded. Please retry later. Status: {}", status),
        500..=599 => format!("Pi-hole server error (transient): {} - {}", status, error_text),
        _ => format!("Request failed: {} - {}", status, error_text),
    }
}

async fn read_error_text(response: reqwest::Response) -> String {
    response
        .text()
        .await
        .unwrap_or_else(|_| "Unable to read error response".to_string())
}

/// An authenticated Pi-hole API session
///
/// The Debug implementation does not expose the session identifiers.
pub struct PiholeSession {
    client: reqwest::Client,
    base_url: String,
    credentials: SessionCredentials,
}

impl std::fmt::Debug for PiholeSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PiholeSession")
            .field("base_url", &self.base_url)
            .field("sid", &"<REDACTED>")
            .field("csrf", &"<REDACTED>")
            .finish()
    }
}

impl PiholeSession {
    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let mut builder = self
            .client
            .request(method, format!("{}{}", self.base_url, path));
        if let Some(sid) = &self.credentials.sid {
            builder = builder.header(SID_HEADER, sid);
        }
        if let Some(csrf) = &self.credentials.csrf {
            builder = builder.header(CSRF_HEADER, csrf);
        }
        builder
    }

    async fn fetch(&self, kind: RecordKind) -> Result<Vec<String>> {
        info!("Fetching current DNS {}", kind);
        let field = kind.to_string();

        let response = self
            .request(Method::GET, &format!("/api/config/dns/{}", field))
            .send()
            .await
            .map_err(|e| Error::fetch(format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = read_error_text(response).await;
            return Err(Error::fetch(describe_status(status, &error_text)));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| Error::fetch(format!("Failed to parse response: {}", e)))?;
        extract_entries(&body, &field)
    }

    /// Send a mutation and map any failure onto `key`
    async fn mutate(&self, builder: RequestBuilder, key: &str) -> Result<()> {
        let response = builder
            .send()
            .await
            .map_err(|e| Error::mutation(key, None, format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = read_error_text(response).await;
            return Err(Error::mutation(
                key,
                Some(status.as_u16()),
                describe_status(status, &error_text),
            ));
        }
        Ok(())
    }

    async fn delete(&self, kind: RecordKind, entry: &str) -> Result<()> {
        info!("Deleting {} entry: {}", kind, entry);
        self.mutate(self.request(Method::DELETE, &entry_path(kind, entry)), entry)
            .await
    }

    async fn add(&self, kind: RecordKind, entry: String) -> Result<()> {
        info!("Adding {} entry: {}", kind, entry);
        let builder = self
            .request(Method::POST, &format!("/api/config/dns/{}", kind))
            .json(&json!({ "value": entry }));
        self.mutate(builder, &entry).await
    }

    async fn replace(&self, kind: RecordKind, entries: &[String]) -> Result<()> {
        info!("Replacing {} list ({} entries)", kind, entries.len());
        let field = kind.to_string();
        let builder = self
            .request(Method::PATCH, "/api/config")
            .json(&json!({ "config": { "dns": { field.as_str(): entries } } }));
        self.mutate(builder, &field).await
    }
}

#[async_trait]
impl TargetSession for PiholeSession {
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

    async fn close(&self) -> Result<()> {
        if self.credentials.sid.is_none() {
            return Ok(());
        }

        let response = self
            .request(Method::DELETE, "/api/auth")
            .send()
            .await
            .map_err(|e| Error::auth(format!("Logout request failed: {}", e)))?;

        if !response.status().is_success() {
            warn!("Logout from {} returned {}", self.base_url, response.status());
        }
        Ok(())
    }

    fn target_type(&self) -> &'static str {
        "pihole-api"
    }
}
