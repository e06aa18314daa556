// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! HTTP client for the Dynatrace REST API.
//!
//! Builds the header set every request carries (`Authorization: Api-Token ...`, the client
//! `version` and a user agent), applies the TLS verification mode and timeouts, and maps
//! responses to [`FetchError`]s.

use std::time::Duration;

use dynatrace_tls::{create_reqwest_client_builder, TlsVerification};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, USER_AGENT};
use reqwest::{Client, StatusCode};

use crate::error::{FetchError, SessionError};
use crate::Params;

/// Client identifier sent in the `version` and `User-Agent` headers.
pub const DEFAULT_CLIENT_VERSION: &str = concat!("dynatrace-collector/", env!("CARGO_PKG_VERSION"));

/// Options governing how the HTTP client is constructed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpClientOptions {
    /// Whether plaintext (HTTP) tenant urls are allowed.
    pub allow_plaintext: bool,
    pub tls: TlsVerification,
    /// Total time allowed for one request, response body included.
    pub timeout: Duration,
    pub connect_timeout: Duration,
    pub client_version: String,
}

impl Default for HttpClientOptions {
    fn default() -> Self {
        Self {
            allow_plaintext: false,
            tls: TlsVerification::SystemRoots,
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            client_version: DEFAULT_CLIENT_VERSION.to_string(),
        }
    }
}

/// Reusable `reqwest::Client` bound to one tenant and one API token.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    base_url: String,
    headers: HeaderMap,
}

impl HttpClient {
    pub fn new(
        base_url: impl Into<String>,
        api_token: &str,
        options: &HttpClientOptions,
    ) -> Result<Self, SessionError> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        if !options.allow_plaintext && base_url.starts_with("http://") {
            return Err(SessionError::InsecureUrl(base_url));
        }

        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Api-Token {api_token}"))
                .map_err(|_| SessionError::InvalidHeader("authorization"))?,
        );
        let version = HeaderValue::from_str(&options.client_version)
            .map_err(|_| SessionError::InvalidHeader("version"))?;
        headers.insert("version", version.clone());
        headers.insert(USER_AGENT, version);

        let client = create_reqwest_client_builder(&options.tls)
            .map_err(|e| SessionError::TlsConfig(e.to_string()))?
            .timeout(options.timeout)
            .connect_timeout(options.connect_timeout)
            .build()?;

        Ok(Self {
            client,
            base_url,
            headers,
        })
    }

    /// Tenant base url, without trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Issues one GET and decodes the JSON body.
    pub async fn get_json(&self, url: &str, params: &Params) -> Result<serde_json::Value, FetchError> {
        tracing::debug!(
            method = "GET",
            url = %url,
            params = ?params,
            headers = ?redact_headers(&self.headers),
            "Dynatrace HTTP request"
        );

        let response = self
            .client
            .get(url)
            .headers(self.headers.clone())
            .query(params)
            .send()
            .await
            .map_err(|source| FetchError::Transport {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|source| FetchError::Transport {
            url: url.to_string(),
            source,
        })?;
        tracing::debug!(
            url = %url,
            status = status.as_u16(),
            body_len = body.len(),
            "Dynatrace HTTP response"
        );

        classify_status(url, status, &body)?;
        serde_json::from_str(&body).map_err(|e| FetchError::Decode {
            url: url.to_string(),
            reason: e.to_string(),
        })
    }
}

/// Maps non-success statuses to [`FetchError::RemoteApi`]. Redirects are not followed
/// transparently by the API, so they count as failures too.
fn classify_status(url: &str, status: StatusCode, body: &str) -> Result<(), FetchError> {
    if status.is_success() {
        return Ok(());
    }
    Err(FetchError::RemoteApi {
        url: url.to_string(),
        status: status.as_u16(),
        body: truncate_body(body),
    })
}

fn truncate_body(body: &str) -> String {
    const MAX_BODY_CHARS: usize = 1024;
    match body.char_indices().nth(MAX_BODY_CHARS) {
        Some((index, _)) => format!("{}...", &body[..index]),
        None => body.to_string(),
    }
}

/// Returns a redacted view of request headers suitable for debug logging.
fn redact_headers(headers: &HeaderMap) -> Vec<(String, String)> {
    const SENSITIVE_HEADERS: [&str; 1] = ["authorization"];

    headers
        .iter()
        .map(|(name, value)| {
            let lower = name.as_str().to_ascii_lowercase();
            let display = if SENSITIVE_HEADERS.contains(&lower.as_str()) {
                "<redacted>".to_string()
            } else {
                value
                    .to_str()
                    .map(|s| s.to_string())
                    .unwrap_or_else(|_| "<non-utf8>".to_string())
            };
            (lower, display)
        })
        .collect()
}
