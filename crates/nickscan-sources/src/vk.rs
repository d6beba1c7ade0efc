//! VK source via the `users.get` API method.
//!
//! One request resolves many screen names at once, so the adapter declares
//! bulk capability. Single lookups go through the same request with one name.

use async_trait::async_trait;
use nickscan_core::SourceName;
use nickscan_scanner::{
    AdapterDescriptor, BulkResults, Capability, Payload, Result, ScanError, ScanOutcome,
    SourceAdapter,
};
use reqwest::Client;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;

/// Source name used in configuration and envelopes.
pub const NAME: &str = "vk";

const DEFAULT_BASE_URL: &str = "https://api.vk.com";
const API_VERSION: &str = "5.199";
const FIELDS: &str = "photo_max,city,domain,sex,bdate,status,contacts";

/// "Too many requests per second"
const ERROR_TOO_MANY_REQUESTS: i64 = 6;
/// "Invalid user id": none of the requested names exist
const ERROR_INVALID_USER_ID: i64 = 113;

/// Resolves screen names through `users.get`. Requires an access token.
pub struct VkSource {
    name: SourceName,
    http: Client,
    token: Option<String>,
    base_url: String,
}

impl VkSource {
    /// Create the adapter around a shared HTTP client.
    pub fn new(http: Client, token: Option<String>) -> Result<Self> {
        Ok(Self {
            name: SourceName::new(NAME)?,
            http,
            token: token.filter(|t| !t.trim().is_empty()),
            base_url: DEFAULT_BASE_URL.to_string(),
        })
    }

    /// Point the adapter at another API root.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn token(&self) -> Result<&str> {
        self.token.as_deref().ok_or_else(|| ScanError::Init {
            source_name: self.name.clone(),
            reason: "access token is not configured".to_string(),
        })
    }
}

#[async_trait]
impl SourceAdapter for VkSource {
    fn descriptor(&self) -> AdapterDescriptor {
        AdapterDescriptor::new(self.name.clone())
            .with_capability(Capability::SingleScan)
            .with_capability(Capability::BulkScan)
    }

    async fn initialize(&self) -> Result<()> {
        self.token().map(|_| ())
    }

    async fn scan(&self, identifier: &str) -> Result<ScanOutcome> {
        let mut results = self.scan_bulk(&[identifier.to_string()]).await?;
        results
            .remove(identifier)
            .unwrap_or(Ok(ScanOutcome::Absent))
    }

    async fn scan_bulk(&self, identifiers: &[String]) -> Result<BulkResults> {
        let token = self.token()?;
        let url = format!("{}/method/users.get", self.base_url.trim_end_matches('/'));

        tracing::debug!(source = NAME, count = identifiers.len(), "users.get");
        let response = self
            .http
            .get(url)
            .query(&[
                ("user_ids", identifiers.join(",").as_str()),
                ("fields", FIELDS),
                ("access_token", token),
                ("v", API_VERSION),
            ])
            .send()
            .await
            .map_err(|e| ScanError::transport(&self.name, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ScanError::transport(&self.name, format!("VK HTTP {status}")));
        }

        // VK does not always label its JSON responses
        let text = response
            .text()
            .await
            .map_err(|e| ScanError::transport(&self.name, e))?;
        let body: Value = serde_json::from_str(&text)
            .map_err(|e| ScanError::invalid_response(&self.name, e))?;

        parse_users_response(&self.name, &body, identifiers)
    }
}

/// Match a `users.get` response back to the requested names.
///
/// Users are matched by `domain` (case-insensitive), by numeric id or by the
/// `id<N>` form. Requested names without a matching user are absent. Every
/// found payload gains a `link` to the profile.
pub fn parse_users_response(
    source_name: &SourceName,
    body: &Value,
    requested: &[String],
) -> Result<BulkResults> {
    if let Some(error) = body.get("error") {
        let code = error.get("error_code").and_then(Value::as_i64).unwrap_or(0);
        let message = error
            .get("error_msg")
            .and_then(Value::as_str)
            .unwrap_or("unknown error");

        return match code {
            ERROR_TOO_MANY_REQUESTS => Err(ScanError::RateLimited {
                source_name: source_name.clone(),
                retry_after: Duration::from_secs(1),
            }),
            ERROR_INVALID_USER_ID => Ok(requested
                .iter()
                .map(|id| (id.clone(), Ok(ScanOutcome::Absent)))
                .collect()),
            _ => Err(ScanError::transport(
                source_name,
                format!("VK error {code}: {message}"),
            )),
        };
    }

    let users = body
        .get("response")
        .and_then(Value::as_array)
        .ok_or_else(|| ScanError::invalid_response(source_name, "missing `response` array"))?;

    // several requested spellings may share one lowercased key
    let mut lookup: HashMap<String, Vec<&String>> = HashMap::new();
    for id in requested {
        lookup.entry(id.to_lowercase()).or_default().push(id);
    }

    let mut results: BulkResults = requested
        .iter()
        .map(|id| (id.clone(), Ok(ScanOutcome::Absent)))
        .collect();

    for user in users {
        let Some(object) = user.as_object() else {
            continue;
        };
        let domain = object.get("domain").and_then(Value::as_str);
        let id = object.get("id").and_then(Value::as_i64);

        let mut keys = Vec::new();
        if let Some(domain) = domain {
            keys.push(domain.to_lowercase());
        }
        if let Some(id) = id {
            keys.push(id.to_string());
            keys.push(format!("id{id}"));
        }

        let link = match (domain, id) {
            (Some(domain), _) => format!("https://vk.com/{domain}"),
            (None, Some(id)) => format!("https://vk.com/id{id}"),
            (None, None) => continue,
        };

        let mut payload: Payload = object.clone();
        payload.insert("link".into(), Value::String(link));

        for key in keys {
            for requested_id in lookup.get(&key).into_iter().flatten() {
                results.insert(
                    (*requested_id).clone(),
                    Ok(ScanOutcome::Found(payload.clone())),
                );
            }
        }
    }

    Ok(results)
}
