// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::sync::atomic::{AtomicU64, Ordering};
use tokio_util::sync::CancellationToken;

use crate::api_token::ApiToken;
use crate::error::{FetchError, SessionError};
use crate::http::{HttpClient, HttpClientOptions};
use crate::Params;

/// Everything needed to open a session against one tenant.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Tenant base url, e.g. `https://abc12345.live.dynatrace.com`.
    pub tenant: String,
    pub api_token: ApiToken,
    pub client: HttpClientOptions,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SessionStats {
    pub requests: u64,
    pub pages: u64,
    pub records: u64,
    pub failures: u64,
}

#[derive(Debug, Default)]
struct Counters {
    requests: AtomicU64,
    pages: AtomicU64,
    records: AtomicU64,
    failures: AtomicU64,
}

/// Per-run context: one HTTP client, the run's cancellation token and its counters.
///
/// The client is released when the session is dropped, which also logs the counters.
#[derive(Debug)]
pub struct Session {
    client: HttpClient,
    cancel: CancellationToken,
    counters: Counters,
}

impl Session {
    /// Builds the HTTP client for the tenant.
    pub async fn open(
        options: &SessionOptions,
        cancel: CancellationToken,
    ) -> Result<Self, SessionError> {
        let client = HttpClient::new(
            options.tenant.as_str(),
            options.api_token.as_str(),
            &options.client,
        )?;
        tracing::debug!(tenant = %client.base_url(), "Dynatrace session opened");
        Ok(Self {
            client,
            cancel,
            counters: Counters::default(),
        })
    }

    pub fn base_url(&self) -> &str {
        self.client.base_url()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Issues one GET, giving up as soon as the run is cancelled.
    pub async fn get_json(
        &self,
        url: &str,
        params: &Params,
    ) -> Result<serde_json::Value, FetchError> {
        if self.cancel.is_cancelled() {
            return Err(FetchError::Cancelled {
                url: url.to_string(),
            });
        }
        self.counters.requests.fetch_add(1, Ordering::Relaxed);
        let result = tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(FetchError::Cancelled { url: url.to_string() }),
            result = self.client.get_json(url, params) => result,
        };
        if result.is_err() {
            self.counters.failures.fetch_add(1, Ordering::Relaxed);
        }
        result
    }

    pub(crate) fn record_page(&self) {
        self.counters.pages.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_records(&self, count: usize) {
        self.counters
            .records
            .fetch_add(count as u64, Ordering::Relaxed);
    }

    /// Counts a failure that happened outside an HTTP exchange (e.g. a missing detail id).
    pub(crate) fn record_failure(&self) {
        self.counters.failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn stats(&self) -> SessionStats {
        SessionStats {
            requests: self.counters.requests.load(Ordering::Relaxed),
            pages: self.counters.pages.load(Ordering::Relaxed),
            records: self.counters.records.load(Ordering::Relaxed),
            failures: self.counters.failures.load(Ordering::Relaxed),
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        let stats = self.stats();
        tracing::debug!(
            tenant = %self.client.base_url(),
            requests = stats.requests,
            pages = stats.pages,
            records = stats.records,
            failures = stats.failures,
            "Dynatrace session closed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    fn options(tenant: String) -> SessionOptions {
        SessionOptions {
            tenant,
            api_token: ApiToken::from("dt0c01.mock"),
            client: HttpClientOptions {
                allow_plaintext: true,
                ..HttpClientOptions::default()
            },
        }
    }

    #[tokio::test]
    async fn open_rejects_plaintext_without_opt_in() {
        let mut options = options("http://localhost:1".to_string());
        options.client.allow_plaintext = false;
        let result = Session::open(&options, CancellationToken::new()).await;
        assert!(matches!(result, Err(SessionError::InsecureUrl(_))));
    }

    #[tokio::test]
    async fn cancelled_session_does_not_send() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/v2/problems")
            .expect(0)
            .create_async()
            .await;

        let cancel = CancellationToken::new();
        let session = Session::open(&options(server.url()), cancel.clone())
            .await
            .expect("session");
        cancel.cancel();
        let url = format!("{}/api/v2/problems", session.base_url());
        let result = session.get_json(&url, &Params::new()).await;

        assert!(matches!(result, Err(FetchError::Cancelled { .. })));
        assert_eq!(session.stats().requests, 0);
        mock.assert_async().await;
    }

    #[tokio::test]
    #[traced_test]
    async fn drop_logs_counters() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/api/v2/problems")
            .with_status(500)
            .with_body("boom")
            .create_async()
            .await;

        let session = Session::open(&options(server.url()), CancellationToken::new())
            .await
            .expect("session");
        let url = format!("{}/api/v2/problems", session.base_url());
        assert!(session.get_json(&url, &Params::new()).await.is_err());
        assert_eq!(
            session.stats(),
            SessionStats {
                requests: 1,
                pages: 0,
                records: 0,
                failures: 1,
            }
        );
        drop(session);
        assert!(logs_contain("Dynatrace session closed"));
        assert!(logs_contain("failures=1"));
    }
}
