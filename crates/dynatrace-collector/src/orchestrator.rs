// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Drives one main endpoint and, optionally, per-record detail lookups.
//!
//! A run opens its own [`Session`], builds the main endpoint's requests, follows their pages and
//! yields normalized records. When detail endpoints are configured, every main record is turned
//! into one lookup per detail endpoint (in declaration order) and only the detail records are
//! yielded. Lookups are interleaved with the main stream: nothing is fetched ahead of the
//! consumer.
//!
//! Failures never end a run early. A failed request, a record without an identifier or a
//! template error is logged and the run moves on to the next unit of work.

use std::pin::pin;
use std::sync::Arc;

use async_stream::stream;
use futures::{Stream, StreamExt};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::catalog::EndpointDescriptor;
use crate::error::FetchError;
use crate::normalizer::normalize;
use crate::pager::fetch;
use crate::request::{build, RequestDescriptor};
use crate::session::{Session, SessionOptions};
use crate::time_window::TimeWindow;
use crate::{Params, Record};

/// Name of the window parameter handed to endpoints whose templates read it.
pub const TIME_PARAM: &str = "time";

/// What a run should fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunPlan {
    pub main: EndpointDescriptor,
    pub details: Vec<EndpointDescriptor>,
    pub params: Params,
    /// Fan-out axis for the main endpoint. `None` uses the endpoint's default axis.
    pub extra_params: Option<Vec<String>>,
}

impl RunPlan {
    pub fn new(main: impl Into<EndpointDescriptor>) -> Self {
        Self {
            main: main.into(),
            details: Vec::new(),
            params: Params::new(),
            extra_params: None,
        }
    }

    #[must_use]
    pub fn with_detail(mut self, detail: impl Into<EndpointDescriptor>) -> Self {
        self.details.push(detail.into());
        self
    }

    #[must_use]
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_extra_params(mut self, extra_params: Vec<String>) -> Self {
        self.extra_params = Some(extra_params);
        self
    }
}

#[derive(Debug, Clone)]
pub struct Orchestrator {
    options: SessionOptions,
    window: Arc<dyn TimeWindow>,
    cancel: CancellationToken,
}

impl Orchestrator {
    pub fn new(options: SessionOptions, window: Arc<dyn TimeWindow>) -> Self {
        Self {
            options,
            window,
            cancel: CancellationToken::new(),
        }
    }

    /// Shares `cancel` with every run started from this orchestrator.
    #[must_use]
    pub fn with_cancellation_token(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn tenant(&self) -> &str {
        &self.options.tenant
    }

    /// Current value of the window parameter.
    pub fn time_param(&self) -> String {
        self.window.time_param()
    }

    /// Lazily executes `plan`. The session is opened on first poll and closed when the stream
    /// ends or is dropped.
    pub fn run(&self, plan: RunPlan) -> impl Stream<Item = Record> + Send + 'static {
        let options = self.options.clone();
        let window = self.window.clone();
        let cancel = self.cancel.clone();

        stream! {
            let session = match Session::open(&options, cancel).await {
                Ok(session) => session,
                Err(e) => {
                    tracing::error!(endpoint = plan.main.id, error = %e, "Failed to open Dynatrace session");
                    return;
                }
            };

            let requests = match build(
                session.base_url(),
                &plan.main,
                plan.params.clone(),
                plan.extra_params.as_deref(),
            ) {
                Ok(requests) => requests,
                Err(e) => {
                    tracing::error!(endpoint = plan.main.id, error = %e, "Failed to build Dynatrace request");
                    return;
                }
            };

            let mut main_records = pin!(records(&session, plan.main, requests));
            while let Some(record) = main_records.next().await {
                if plan.details.is_empty() {
                    yield record;
                    continue;
                }
                for detail in &plan.details {
                    let Some(requests) = detail_requests(&session, detail, &record, window.as_ref()) else {
                        session.record_failure();
                        continue;
                    };
                    let mut detail_records = pin!(records(&session, *detail, requests));
                    while let Some(detail_record) = detail_records.next().await {
                        yield detail_record;
                    }
                }
            }

            let stats = session.stats();
            tracing::info!(
                endpoint = plan.main.id,
                requests = stats.requests,
                records = stats.records,
                failures = stats.failures,
                "Dynatrace run finished"
            );
        }
    }
}

/// Fetches and normalizes `requests` one after the other. A failed request is logged and its
/// siblings still run.
fn records<'a>(
    session: &'a Session,
    descriptor: EndpointDescriptor,
    requests: Vec<RequestDescriptor>,
) -> impl Stream<Item = Record> + Send + 'a {
    stream! {
        for request in requests {
            if session.is_cancelled() {
                break;
            }
            let mut pages = pin!(fetch(session, request));
            while let Some(page) = pages.next().await {
                let page = match page {
                    Ok(page) => page,
                    Err(FetchError::Cancelled { url }) => {
                        tracing::debug!(endpoint = descriptor.id, url = %url, "Dynatrace request cancelled");
                        continue;
                    }
                    Err(e) => {
                        tracing::error!(endpoint = descriptor.id, error = %e, "Dynatrace request failed");
                        continue;
                    }
                };
                let normalized = normalize(page.body, &descriptor);
                session.record_records(normalized.len());
                for record in normalized {
                    yield record;
                }
            }
        }
    }
}

/// Builds the lookup of `detail` for one main record, or logs why it cannot be made.
fn detail_requests(
    session: &Session,
    detail: &EndpointDescriptor,
    record: &Record,
    window: &dyn TimeWindow,
) -> Option<Vec<RequestDescriptor>> {
    let (Some(path_param), Some(id_field)) = (detail.path_param, detail.response_selector())
    else {
        tracing::error!(endpoint = detail.id, "Detail endpoint has no path parameter");
        return None;
    };
    let Some(id) = record_id(record, id_field) else {
        tracing::error!(
            endpoint = detail.id,
            field = id_field,
            "Record has no usable identifier, skipping detail lookup"
        );
        return None;
    };

    let params = Params::from([
        (TIME_PARAM.to_string(), window.time_param()),
        (path_param.to_string(), id),
    ]);
    match build(session.base_url(), detail, params, None) {
        Ok(requests) => Some(requests),
        Err(e) => {
            tracing::error!(endpoint = detail.id, error = %e, "Failed to build Dynatrace detail request");
            None
        }
    }
}

fn record_id(record: &Record, field: &str) -> Option<String> {
    match record.get(field)? {
        Value::String(id) if !id.is_empty() => Some(id.clone()),
        Value::Number(id) => Some(id.to_string()),
        _ => None,
    }
}
