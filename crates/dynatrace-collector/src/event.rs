// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use serde::Serialize;
use serde_json::Value;

use crate::metrics::DataPoint;
use crate::util::remove_keys_recursive;
use crate::Record;

/// Record field holding the last time an entity was seen, in epoch milliseconds.
const LAST_SEEN_FIELD: &str = "lastSeenTimestamp";

/// Envelope handed to the sink for every collected record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Event {
    /// Event time in epoch milliseconds, when the record carries one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<i64>,
    /// Operation that produced the record.
    pub source: String,
    pub tenant: String,
    pub data: Value,
}

impl Event {
    /// Wraps an API record. Entities are timestamped with their `lastSeenTimestamp`.
    pub fn from_record(source: &str, tenant: &str, record: Record) -> Self {
        Self {
            time: record.get(LAST_SEEN_FIELD).and_then(Value::as_i64),
            source: source.to_string(),
            tenant: tenant.to_string(),
            data: record,
        }
    }

    pub fn from_data_point(source: &str, point: &DataPoint) -> Result<Self, serde_json::Error> {
        Ok(Self {
            time: Some(point.timestamp),
            source: source.to_string(),
            tenant: point.dynatrace_tenant.clone(),
            data: serde_json::to_value(point)?,
        })
    }

    /// Drops `keys` from the payload at any depth.
    #[must_use]
    pub fn redacted(mut self, keys: &[String]) -> Self {
        remove_keys_recursive(&mut self.data, keys);
        self
    }
}
