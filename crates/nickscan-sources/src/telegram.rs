//! Telegram source via the public `t.me` preview page.
//!
//! The preview page is rate limited aggressively, so the adapter asks for
//! strict pacing and is scanned by the sequential worker.

use crate::common::{join_segments, retry_after};
use async_trait::async_trait;
use nickscan_core::SourceName;
use nickscan_scanner::{
    AdapterDescriptor, Capability, Payload, Result, ScanError, ScanOutcome, SourceAdapter,
};
use reqwest::{Client, StatusCode};
use scraper::{Html, Selector};
use serde_json::Value;
use std::time::Duration;

/// Source name used in configuration and envelopes.
pub const NAME: &str = "telegram";

const DEFAULT_BASE_URL: &str = "https://t.me";

/// Wait used when a 429 carries no `Retry-After`.
const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(30);

/// Placeholder image served for pages without an avatar.
const PLACEHOLDER_IMAGE: &str = "telegram.org/img/t_logo";

/// Scrapes `https://t.me/{name}`.
pub struct TelegramSource {
    name: SourceName,
    http: Client,
    base_url: String,
}

impl TelegramSource {
    /// Create the adapter around a shared HTTP client.
    pub fn new(http: Client) -> Result<Self> {
        Ok(Self {
            name: SourceName::new(NAME)?,
            http,
            base_url: DEFAULT_BASE_URL.to_string(),
        })
    }

    /// Point the adapter at another host.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl SourceAdapter for TelegramSource {
    fn descriptor(&self) -> AdapterDescriptor {
        AdapterDescriptor::new(self.name.clone())
            .with_capability(Capability::SingleScan)
            .with_capability(Capability::StrictPacing)
    }

    async fn scan(&self, identifier: &str) -> Result<ScanOutcome> {
        let url = join_segments(&self.name, &self.base_url, &[identifier])?;

        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| ScanError::transport(&self.name, e))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(ScanError::RateLimited {
                source_name: self.name.clone(),
                retry_after: retry_after(response.headers()).unwrap_or(DEFAULT_RETRY_AFTER),
            });
        }
        if status == StatusCode::NOT_FOUND {
            return Ok(ScanOutcome::Absent);
        }
        if !status.is_success() {
            return Err(ScanError::transport(&self.name, format!("Telegram HTTP {status}")));
        }

        let html = response
            .text()
            .await
            .map_err(|e| ScanError::transport(&self.name, e))?;

        match parse_profile_page(&self.name, &html, identifier)? {
            Some(payload) => Ok(ScanOutcome::Found(payload)),
            None => Ok(ScanOutcome::Absent),
        }
    }
}

fn selector(source_name: &SourceName, css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| {
        ScanError::invalid_response(source_name, format!("invalid selector `{css}`: {e}"))
    })
}

/// Extract the profile preview from a `t.me` page.
///
/// Returns `None` when the page has no `tgme_page_title` element, which is
/// how Telegram renders unknown names.
pub fn parse_profile_page(
    source_name: &SourceName,
    html: &str,
    identifier: &str,
) -> Result<Option<Payload>> {
    let document = Html::parse_document(html);

    let title_selector = selector(source_name, ".tgme_page_title")?;
    let Some(title_element) = document.select(&title_selector).next() else {
        return Ok(None);
    };
    let page_title = collapse_whitespace(&title_element.text().collect::<String>());

    let meta = |property: &str| -> Result<Option<String>> {
        let css = format!(r#"meta[property="{property}"]"#);
        let found = document
            .select(&selector(source_name, &css)?)
            .next()
            .and_then(|element| element.value().attr("content"))
            .map(str::trim)
            .filter(|content| !content.is_empty())
            .map(ToString::to_string);
        Ok(found)
    };

    let mut payload = Payload::new();
    payload.insert("username".into(), Value::String(identifier.to_string()));
    payload.insert(
        "link".into(),
        Value::String(format!("https://t.me/{identifier}")),
    );

    let title = meta("og:title")?.unwrap_or(page_title);
    payload.insert("title".into(), Value::String(title));

    if let Some(description) = meta("og:description")? {
        payload.insert("description".into(), Value::String(description));
    }
    if let Some(image) = meta("og:image")?.filter(|url| !url.contains(PLACEHOLDER_IMAGE)) {
        payload.insert("image".into(), Value::String(image));
    }

    let extra_selector = selector(source_name, ".tgme_page_extra")?;
    if let Some(extra) = document.select(&extra_selector).next() {
        let extra = collapse_whitespace(&extra.text().collect::<String>());
        if !extra.is_empty() {
            payload.insert("extra".into(), Value::String(extra));
        }
    }

    Ok(Some(payload))
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
