use std::time::Duration;

use anyhow::{Context, Result};
use log::{debug, info, warn};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::FetcherConfig;

/// Fixed call-level timeout for every fetcher request.
const REQUEST_TIMEOUT_SECS: u64 = 30;

const STATUS_ENDPOINT: &str = "/api/status";
const PROVIDERS_ENDPOINT: &str = "/api/providers";
const SYNC_ENDPOINT: &str = "/api/sync/email";

/// One email record as returned by the fetcher service.
///
/// Text fields default to empty strings so a sparse payload still
/// deserializes; `attachments` may be absent even when `has_attachments` is
/// set (older backend versions only sent the flag).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EmailMessage {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub sender: String,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub attachments: Option<Vec<EmailAttachment>>,
    #[serde(default)]
    pub has_attachments: Option<bool>,
}

/// One attachment reference carried by an email record. `content` is the
/// base64-encoded payload and is only present when the backend inlined it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EmailAttachment {
    #[serde(default)]
    pub filename: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub content_type: String,
    #[serde(default)]
    pub content: Option<String>,
}

/// Response envelope shared by all fetcher endpoints.
#[derive(Debug, Deserialize)]
struct ApiEnvelope {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Serialize)]
struct SyncRequest<'a> {
    email_username: &'a str,
    email_password: &'a str,
    email_provider: &'a str,
    email_count: usize,
}

/// HTTP client for the source-record fetcher service.
pub struct FetchClient {
    client: Client,
    base_url: String,
}

impl FetchClient {
    pub fn new(config: &FetcherConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .context("Unable to build the HTTP client for the fetcher service")?;

        Ok(FetchClient {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Check fetcher availability. Transport errors count as "down" rather
    /// than bubbling up, the caller only needs a yes/no.
    pub async fn check_status(&self) -> bool {
        let url = format!("{}{}", self.base_url, STATUS_ENDPOINT);

        match self.client.get(&url).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                warn!("Fetcher service unreachable: {}", e);
                false
            }
        }
    }

    /// List the email providers the fetcher supports.
    pub async fn providers(&self) -> Result<Vec<String>> {
        let url = format!("{}{}", self.base_url, PROVIDERS_ENDPOINT);

        let body: Value = self
            .client
            .get(&url)
            .send()
            .await
            .context("Error requesting the provider list")?
            .error_for_status()
            .context("Provider list request rejected")?
            .json()
            .await
            .context("Provider list is not valid JSON")?;

        // The endpoint historically returned either a bare array or the
        // standard envelope with the array under `data`.
        let list = if body.is_array() {
            body
        } else {
            body.get("data").cloned().unwrap_or(Value::Null)
        };

        let providers: Vec<String> =
            serde_json::from_value(list).context("Unexpected provider list format")?;

        debug!("Fetcher supports {} provider(s)", providers.len());
        Ok(providers)
    }

    /// Fetch up to `count` email records for the given mailbox credentials.
    pub async fn fetch_emails(
        &self,
        username: &str,
        password: &str,
        provider: &str,
        count: usize,
    ) -> Result<Vec<EmailMessage>> {
        let url = format!("{}{}", self.base_url, SYNC_ENDPOINT);
        let request = SyncRequest {
            email_username: username,
            email_password: password,
            email_provider: provider,
            email_count: count,
        };

        info!("Requesting {} email(s) from provider '{}'", count, provider);

        let envelope: ApiEnvelope = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .context("Error calling the email sync endpoint")?
            .error_for_status()
            .context("Email sync request rejected")?
            .json()
            .await
            .context("Email sync response is not valid JSON")?;

        if !envelope.success {
            let reason = envelope
                .error
                .or(envelope.message)
                .unwrap_or_else(|| "email sync failed".to_string());
            anyhow::bail!(reason);
        }

        let data = envelope.data.unwrap_or(Value::Null);

        // The backend returns either {emails: [...]} or the array directly.
        let emails_value = if let Some(emails) = data.get("emails") {
            emails.clone()
        } else if data.is_array() {
            data
        } else {
            anyhow::bail!("Unexpected email payload format from the fetcher");
        };

        let emails: Vec<EmailMessage> =
            serde_json::from_value(emails_value).context("Unable to decode the email records")?;

        info!("Fetched {} email(s)", emails.len());
        Ok(emails)
    }
}
