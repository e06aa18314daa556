// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Metric time series collection on top of the metrics endpoints.
//!
//! Collection is two runs: the metrics listing (descriptors for the selectors) builds a
//! [`MetricDescriptorIndex`], then one metrics query per selector returns series that are
//! flattened into one [`DataPoint`] per `(timestamp, value)` pair.

use std::collections::HashMap;
use std::pin::pin;

use async_stream::stream;
use futures::{Stream, StreamExt};
use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;

use crate::catalog::Endpoint;
use crate::operation::{Operation, OperationInputs};
use crate::orchestrator::{Orchestrator, RunPlan};
use crate::Record;

lazy_static! {
    /// A newline followed by indentation and `:` continues the previous selector.
    static ref SELECTOR_CONTINUATION: Regex =
        Regex::new(r"\n\s+:").expect("failed creating regex");
}

/// Splits multi-line selector text into one metric selector per logical line.
///
/// ```text
/// builtin:host.cpu.usage
/// builtin:service.response.time
///     :splitBy("dt.entity.service")
/// ```
///
/// yields `builtin:host.cpu.usage` and
/// `builtin:service.response.time:splitBy("dt.entity.service")`. Blank lines are dropped.
pub fn parse_metric_selectors(text: &str) -> Vec<String> {
    let normalized = text.replace("\r\n", "\n");
    SELECTOR_CONTINUATION
        .replace_all(&normalized, ":")
        .lines()
        .map(str::trim_end)
        .filter(|line| !line.trim().is_empty())
        .map(str::to_string)
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricInfo {
    pub unit: Option<String>,
    pub aggregation_types: Option<Vec<String>>,
}

/// `metricId -> (unit, aggregationTypes)` built from metric descriptor records.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricDescriptorIndex {
    metrics: HashMap<String, MetricInfo>,
}

impl MetricDescriptorIndex {
    /// Adds one descriptor record. Records without a `metricId` are ignored.
    pub fn insert_record(&mut self, record: &Record) {
        let Some(metric_id) = record.get("metricId").and_then(Value::as_str) else {
            tracing::debug!("Ignoring metric descriptor without metricId");
            return;
        };
        let unit = record
            .get("unit")
            .and_then(Value::as_str)
            .map(str::to_string);
        let aggregation_types = record
            .get("aggregationTypes")
            .and_then(Value::as_array)
            .map(|types| {
                types
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            });
        self.metrics.insert(
            metric_id.to_string(),
            MetricInfo {
                unit,
                aggregation_types,
            },
        );
    }

    pub fn get(&self, metric_id: &str) -> Option<&MetricInfo> {
        self.metrics.get(metric_id)
    }

    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }
}

impl<'a> FromIterator<&'a Record> for MetricDescriptorIndex {
    fn from_iter<T: IntoIterator<Item = &'a Record>>(iter: T) -> Self {
        let mut index = MetricDescriptorIndex::default();
        for record in iter {
            index.insert_record(record);
        }
        index
    }
}

/// One sample of one metric series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataPoint {
    /// Epoch milliseconds.
    pub timestamp: i64,
    pub value: Option<f64>,
    pub metric_id: Option<String>,
    pub unit: Option<String>,
    pub aggregation_types: Option<Vec<String>>,
    #[serde(rename = "dynatraceTenant")]
    pub dynatrace_tenant: String,
    pub resolution: Option<String>,
    pub dimensions: Value,
    pub dimension_map: Value,
}

/// Flattens one metrics query record (`{metricId, resolution, data: [series...]}`).
///
/// Timestamps and values are zipped; the shorter list wins. Samples with a non-integer
/// timestamp are skipped.
pub fn flatten_series(record: &Record, index: &MetricDescriptorIndex, tenant: &str) -> Vec<DataPoint> {
    let metric_id = record
        .get("metricId")
        .and_then(Value::as_str)
        .map(str::to_string);
    let info = metric_id
        .as_deref()
        .and_then(|id| index.get(id))
        .cloned()
        .unwrap_or_default();
    let resolution = record
        .get("resolution")
        .and_then(Value::as_str)
        .map(str::to_string);
    let Some(series) = record.get("data").and_then(Value::as_array) else {
        return Vec::new();
    };

    let mut points = Vec::new();
    for entry in series {
        let timestamps = entry.get("timestamps").and_then(Value::as_array);
        let values = entry.get("values").and_then(Value::as_array);
        let (Some(timestamps), Some(values)) = (timestamps, values) else {
            continue;
        };
        let dimensions = entry.get("dimensions").cloned().unwrap_or(Value::Null);
        let dimension_map = entry.get("dimensionMap").cloned().unwrap_or(Value::Null);
        for (timestamp, value) in timestamps.iter().zip(values) {
            let Some(timestamp) = timestamp.as_i64() else {
                continue;
            };
            points.push(DataPoint {
                timestamp,
                value: value.as_f64(),
                metric_id: metric_id.clone(),
                unit: info.unit.clone(),
                aggregation_types: info.aggregation_types.clone(),
                dynatrace_tenant: tenant.to_string(),
                resolution: resolution.clone(),
                dimensions: dimensions.clone(),
                dimension_map: dimension_map.clone(),
            });
        }
    }
    points
}

/// Collects the data points of the selectors in `inputs`, starting at `inputs.time`.
///
/// The descriptor listing is fully read before the first query is sent. An empty selector list
/// issues no request.
pub fn metric_data_points(
    orchestrator: &Orchestrator,
    inputs: &OperationInputs,
) -> impl Stream<Item = DataPoint> + Send + 'static {
    let orchestrator = orchestrator.clone();
    let selectors = inputs.metric_selectors.clone();
    let plan = Operation::Metrics.plan(inputs);
    stream! {
        if selectors.is_empty() {
            tracing::warn!("No metric selectors configured, skipping metrics collection");
            return;
        }

        let descriptors: Vec<Record> = orchestrator
            .run(RunPlan::new(Endpoint::Metrics).with_extra_params(selectors))
            .collect()
            .await;
        let index: MetricDescriptorIndex = descriptors.iter().collect();
        tracing::debug!(metrics = index.len(), "Indexed metric descriptors");

        let tenant = orchestrator.tenant().to_string();
        let mut records = pin!(orchestrator.run(plan));
        while let Some(record) = records.next().await {
            for point in flatten_series(&record, &index, &tenant) {
                yield point;
            }
        }
    }
}
