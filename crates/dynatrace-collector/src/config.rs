// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::env;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use dynatrace_tls::TlsVerification;

use crate::api_token::ApiToken;
use crate::error::ConfigError;
use crate::http::{HttpClientOptions, DEFAULT_CLIENT_VERSION};
use crate::metrics::parse_metric_selectors;
use crate::operation::{Operation, OperationInputs};
use crate::session::SessionOptions;
use crate::time_window::CollectionWindow;
use crate::util::normalize_tenant_url;

const VALID_LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Collector configuration, read from `DT_*` environment variables.
#[derive(Clone, PartialEq, Eq)]
pub struct CollectorConfig {
    /// Tenant base url (e.g., https://abc12345.live.dynatrace.com)
    pub tenant: String,
    pub api_token: String,
    /// Size of the collection window, in minutes before now
    pub collection_interval_minutes: u64,
    pub operations: Vec<Operation>,
    /// Entity types queried by the entity operations, instead of the built-in list
    pub entity_types: Option<Vec<String>>,
    pub metric_selectors: Vec<String>,
    pub verify_ssl: bool,
    /// PEM bundle with additional root certificates
    pub ca_cert_path: Option<PathBuf>,
    pub timeout: Duration,
    pub connect_timeout: Duration,
    /// Record keys removed before records reach the sink
    pub redact_keys: Vec<String>,
    /// Log level (e.g., trace, debug, info, warn, error)
    pub log_level: String,
    /// Keep `http://` tenant urls instead of upgrading them
    pub allow_plaintext: bool,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            tenant: String::new(),
            api_token: String::new(),
            collection_interval_minutes: 60,
            operations: vec![Operation::Problems],
            entity_types: None,
            metric_selectors: Vec::new(),
            verify_ssl: true,
            ca_cert_path: None,
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            redact_keys: Vec::new(),
            log_level: "info".to_string(),
            allow_plaintext: false,
        }
    }
}

impl fmt::Debug for CollectorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollectorConfig")
            .field("tenant", &self.tenant)
            .field("api_token", &"<redacted>")
            .field(
                "collection_interval_minutes",
                &self.collection_interval_minutes,
            )
            .field("operations", &self.operations)
            .field("entity_types", &self.entity_types)
            .field("metric_selectors", &self.metric_selectors)
            .field("verify_ssl", &self.verify_ssl)
            .field("ca_cert_path", &self.ca_cert_path)
            .field("timeout", &self.timeout)
            .field("connect_timeout", &self.connect_timeout)
            .field("redact_keys", &self.redact_keys)
            .field("log_level", &self.log_level)
            .field("allow_plaintext", &self.allow_plaintext)
            .finish()
    }
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_number(name: &str, value: &str) -> Result<u64, ConfigError> {
    value
        .trim()
        .parse::<u64>()
        .map_err(|_| ConfigError::Invalid(format!("{name} must be a number, got '{value}'")))
}

fn parse_bool(value: &str) -> bool {
    !matches!(
        value.trim().to_lowercase().as_str(),
        "false" | "0" | "no" | "off"
    )
}

impl CollectorConfig {
    /// Create configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let allow_plaintext = env::var("DT_ALLOW_PLAINTEXT")
            .map(|val| val.to_lowercase() == "true")
            .unwrap_or(false);
        let tenant = env::var("DT_TENANT")
            .ok()
            .and_then(|val| normalize_tenant_url(&val, allow_plaintext))
            .ok_or(ConfigError::Missing("DT_TENANT"))?;
        let api_token = env::var("DT_API_TOKEN")
            .map(|val| val.trim().to_string())
            .map_err(|_| ConfigError::Missing("DT_API_TOKEN"))?;

        let collection_interval_minutes = match env::var("DT_COLLECTION_INTERVAL_MINUTES") {
            Ok(val) => parse_number("DT_COLLECTION_INTERVAL_MINUTES", &val)?,
            Err(_) => defaults.collection_interval_minutes,
        };
        let operations = match env::var("DT_OPERATIONS") {
            Ok(val) => parse_list(&val)
                .iter()
                .map(|name| name.parse::<Operation>().map_err(ConfigError::Invalid))
                .collect::<Result<Vec<_>, _>>()?,
            Err(_) => defaults.operations,
        };
        let entity_types = env::var("DT_ENTITY_TYPES")
            .ok()
            .map(|val| parse_list(&val))
            .filter(|types| !types.is_empty());
        let metric_selectors = env::var("DT_METRIC_SELECTORS")
            .map(|val| parse_metric_selectors(&val))
            .unwrap_or_default();
        let verify_ssl = env::var("DT_VERIFY_SSL")
            .map(|val| parse_bool(&val))
            .unwrap_or(true);
        let ca_cert_path = env::var("DT_CA_CERT_PATH")
            .ok()
            .filter(|val| !val.trim().is_empty())
            .map(PathBuf::from);
        let timeout = match env::var("DT_TIMEOUT_SECS") {
            Ok(val) => Duration::from_secs(parse_number("DT_TIMEOUT_SECS", &val)?),
            Err(_) => defaults.timeout,
        };
        let connect_timeout = match env::var("DT_CONNECT_TIMEOUT_SECS") {
            Ok(val) => Duration::from_secs(parse_number("DT_CONNECT_TIMEOUT_SECS", &val)?),
            Err(_) => defaults.connect_timeout,
        };
        let redact_keys = env::var("DT_REDACT_KEYS")
            .map(|val| parse_list(&val))
            .unwrap_or_default();
        let log_level = env::var("DT_LOG_LEVEL")
            .map(|val| val.to_lowercase())
            .unwrap_or(defaults.log_level);

        let config = Self {
            tenant,
            api_token,
            collection_interval_minutes,
            operations,
            entity_types,
            metric_selectors,
            verify_ssl,
            ca_cert_path,
            timeout,
            connect_timeout,
            redact_keys,
            log_level,
            allow_plaintext,
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tenant.trim().is_empty() {
            return Err(ConfigError::Missing("DT_TENANT"));
        }
        if self.api_token.is_empty() {
            return Err(ConfigError::Missing("DT_API_TOKEN"));
        }
        if self.collection_interval_minutes == 0 {
            return Err(ConfigError::Invalid(
                "DT_COLLECTION_INTERVAL_MINUTES must be greater than 0".to_string(),
            ));
        }
        if self.operations.is_empty() {
            return Err(ConfigError::Invalid(
                "DT_OPERATIONS must name at least one operation".to_string(),
            ));
        }
        if self.operations.contains(&Operation::Metrics) && self.metric_selectors.is_empty() {
            return Err(ConfigError::Invalid(
                "The metrics operation needs DT_METRIC_SELECTORS".to_string(),
            ));
        }
        if self.timeout.is_zero() || self.connect_timeout.is_zero() {
            return Err(ConfigError::Invalid(
                "Timeouts must be greater than 0".to_string(),
            ));
        }
        if !VALID_LOG_LEVELS.contains(&self.log_level.as_str()) {
            return Err(ConfigError::Invalid(format!(
                "Invalid log level '{}'. Must be one of: trace, debug, info, warn, error",
                self.log_level
            )));
        }
        Ok(())
    }

    pub fn tls_verification(&self) -> TlsVerification {
        TlsVerification::from_settings(self.verify_ssl, self.ca_cert_path.clone())
    }

    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            tenant: self.tenant.clone(),
            api_token: ApiToken::new(self.api_token.as_str()),
            client: HttpClientOptions {
                allow_plaintext: self.allow_plaintext,
                tls: self.tls_verification(),
                timeout: self.timeout,
                connect_timeout: self.connect_timeout,
                client_version: DEFAULT_CLIENT_VERSION.to_string(),
            },
        }
    }

    pub fn window(&self) -> CollectionWindow {
        CollectionWindow::new(self.collection_interval_minutes)
    }

    pub fn operation_inputs(&self, time: String) -> OperationInputs {
        OperationInputs {
            time,
            entity_types: self.entity_types.clone(),
            metric_selectors: self.metric_selectors.clone(),
        }
    }
}
