// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Metadata-driven collection engine for the Dynatrace REST API.
//!
//! Requests are described by the static [`catalog`]; the [`formatter`] and the [`request`]
//! builder turn a descriptor and caller parameters into concrete requests, the [`pager`] follows
//! `nextPageKey` cursors, the [`normalizer`] strips response envelopes and the
//! [`orchestrator`] chains all of it, including per-record detail lookups, into one lazy stream
//! of records.

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

pub mod api_token;
pub mod catalog;
pub mod config;
pub mod error;
pub mod event;
pub mod formatter;
pub mod http;
pub mod metrics;
pub mod normalizer;
pub mod operation;
pub mod orchestrator;
pub mod pager;
pub mod request;
pub mod session;
pub mod template;
pub mod time_window;
pub mod util;

/// Query parameters, ordered so query strings are deterministic.
pub type Params = std::collections::BTreeMap<String, String>;

/// One normalized record.
pub type Record = serde_json::Value;

pub use api_token::ApiToken;
pub use catalog::{validate_catalog, Endpoint, EndpointDescriptor, FanOut, ResponseShape};
pub use config::CollectorConfig;
pub use error::{
    CatalogError, ConfigError, FetchError, NormalizationError, SessionError,
    TemplateResolutionError,
};
pub use event::Event;
pub use http::{HttpClientOptions, DEFAULT_CLIENT_VERSION};
pub use metrics::{metric_data_points, DataPoint, MetricDescriptorIndex};
pub use operation::{Operation, OperationInputs};
pub use orchestrator::{Orchestrator, RunPlan};
pub use pager::Page;
pub use request::RequestDescriptor;
pub use session::{Session, SessionOptions, SessionStats};
pub use template::ParamTemplate;
pub use time_window::{CollectionWindow, FixedWindow, TimeWindow};

pub use dynatrace_tls::TlsVerification;
