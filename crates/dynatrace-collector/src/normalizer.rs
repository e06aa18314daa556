// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use serde_json::Value;

use crate::catalog::{EndpointDescriptor, ResponseShape};
use crate::error::{json_kind, NormalizationError};
use crate::Record;

/// Unwraps one decoded page into records according to the descriptor's response shape.
///
/// A `null` page or a `null` envelope yields no record. Page fields declared by the envelope
/// (e.g. the `resolution` of a metrics query) are copied onto every object record, without
/// overwriting a value the record already carries. A list-shaped raw page yields one record per
/// element.
pub fn try_normalize(
    page: &Value,
    descriptor: &EndpointDescriptor,
) -> Result<Vec<Record>, NormalizationError> {
    if page.is_null() {
        return Ok(Vec::new());
    }
    match descriptor.shape {
        ResponseShape::Raw => Ok(flatten(page.clone())),
        ResponseShape::Single { .. } => match page {
            Value::Object(_) => Ok(vec![page.clone()]),
            other => Err(NormalizationError::NotAnObject {
                endpoint: descriptor.id,
                found: json_kind(other),
            }),
        },
        ResponseShape::Envelope {
            selector,
            page_fields,
        } => {
            let Value::Object(object) = page else {
                return Err(NormalizationError::NotAnObject {
                    endpoint: descriptor.id,
                    found: json_kind(page),
                });
            };
            let inner = object
                .get(selector)
                .ok_or(NormalizationError::MissingSelector {
                    endpoint: descriptor.id,
                    selector,
                })?;
            let mut records = match inner {
                Value::Null => Vec::new(),
                Value::Array(items) => items.clone(),
                Value::Object(_) => vec![inner.clone()],
                other => {
                    return Err(NormalizationError::UnexpectedSelectorValue {
                        endpoint: descriptor.id,
                        selector,
                        found: json_kind(other),
                    })
                }
            };
            for field in page_fields {
                let Some(value) = object.get(*field) else {
                    continue;
                };
                for record in records.iter_mut() {
                    if let Value::Object(record) = record {
                        record
                            .entry((*field).to_string())
                            .or_insert_with(|| value.clone());
                    }
                }
            }
            Ok(records)
        }
    }
}

/// Same as [`try_normalize`], but a page that does not have the expected shape is returned raw
/// and a warning is logged. A raw list is still split into one record per element.
pub fn normalize(page: Value, descriptor: &EndpointDescriptor) -> Vec<Record> {
    match try_normalize(&page, descriptor) {
        Ok(records) => records,
        Err(error) => {
            tracing::warn!(endpoint = descriptor.id, "Returning raw page: {}", error);
            flatten(page)
        }
    }
}

fn flatten(page: Value) -> Vec<Record> {
    match page {
        Value::Array(items) => items,
        other => vec![other],
    }
}
