// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Static catalog of the Dynatrace API operations the collector can drive.
//!
//! Every operation is one [`Endpoint`] variant. Its behaviour (url shape, default query
//! parameters, fan-out rule and response shape) lives in the [`EndpointDescriptor`] returned by
//! [`Endpoint::descriptor`]; the formatter, the request builder and the normalizer only ever
//! consume descriptors, so adding an operation is one new variant plus one match arm.

use std::fmt;
use std::str::FromStr;

use crate::error::CatalogError;
use crate::template::ParamTemplate;

/// Entity types queried when the entities operation is run without an explicit axis.
pub const DEFAULT_ENTITY_TYPES: &[&str] = &[
    "HOST",
    "SERVICE",
    "APPLICATION",
    "PROCESS_GROUP",
    "PROCESS_GROUP_INSTANCE",
    "SYNTHETIC_TEST",
    "SYNTHETIC_TEST_STEP",
];

/// Result-status variants of synthetic monitor executions.
pub const EXECUTION_RESULT_STATUSES: &[&str] = &["SUCCESS", "FAILED"];

/// How one logical request is split into concrete HTTP requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FanOut {
    None,
    /// One request per axis value, written into `key`.
    PerElement {
        key: &'static str,
        default_axis: &'static [&'static str],
    },
    /// One request, axis values joined with `,` into `key`.
    CommaJoin {
        key: &'static str,
        default_axis: &'static [&'static str],
    },
    /// One request per axis value, appended to the url as a path segment.
    UrlSuffix {
        default_axis: &'static [&'static str],
    },
}

impl FanOut {
    pub fn default_axis(&self) -> &'static [&'static str] {
        match self {
            FanOut::None => &[],
            FanOut::PerElement { default_axis, .. }
            | FanOut::CommaJoin { default_axis, .. }
            | FanOut::UrlSuffix { default_axis } => default_axis,
        }
    }
}

/// Where the records live in a decoded page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseShape {
    /// The page is one object (one entity, monitor, execution...). `id_field` names the
    /// identifier such objects carry, and is what detail chaining reads from main records.
    Single { id_field: &'static str },
    /// The records are under `selector`; `page_fields` are copied from the page onto each record.
    Envelope {
        selector: &'static str,
        page_fields: &'static [&'static str],
    },
    /// The page is returned as is.
    Raw,
}

/// Immutable metadata of one remote operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndpointDescriptor {
    pub id: &'static str,
    pub url_template: &'static str,
    pub shape: ResponseShape,
    pub default_params: &'static [(&'static str, ParamTemplate)],
    pub path_param: Option<&'static str>,
    pub fan_out: FanOut,
}

impl EndpointDescriptor {
    /// Key extracted from a page (envelopes) or identifying a single object.
    pub fn response_selector(&self) -> Option<&'static str> {
        match self.shape {
            ResponseShape::Single { id_field } => Some(id_field),
            ResponseShape::Envelope { selector, .. } => Some(selector),
            ResponseShape::Raw => None,
        }
    }

    /// Whether one of the default parameter templates reads the caller parameter `key`.
    pub fn consumes(&self, key: &str) -> bool {
        self.default_params
            .iter()
            .any(|(_, template)| template.source_key() == Some(key))
    }

    /// Checks that the metadata is self-consistent.
    pub fn validate(&self) -> Result<(), CatalogError> {
        let endpoint = self.id;
        let placeholders = url_placeholders(self.url_template)
            .ok_or(CatalogError::MalformedUrlTemplate { endpoint })?;
        for placeholder in &placeholders {
            if Some(*placeholder) != self.path_param {
                return Err(CatalogError::UndeclaredUrlPlaceholder {
                    endpoint,
                    placeholder: (*placeholder).to_string(),
                });
            }
        }
        if let Some(param) = self.path_param {
            if !placeholders.contains(&param) {
                return Err(CatalogError::UnusedPathParam { endpoint, param });
            }
        }

        match self.fan_out {
            FanOut::PerElement { key, .. } | FanOut::CommaJoin { key, .. } if key.is_empty() => {
                return Err(CatalogError::MissingFanOutKey { endpoint });
            }
            FanOut::UrlSuffix { default_axis } if default_axis.is_empty() => {
                return Err(CatalogError::MissingSuffixAxis { endpoint });
            }
            _ => {}
        }

        match self.shape {
            ResponseShape::Single { id_field } if id_field.is_empty() => {
                Err(CatalogError::MissingIdField { endpoint })
            }
            ResponseShape::Envelope { selector, .. } if selector.is_empty() => {
                Err(CatalogError::MissingSelector { endpoint })
            }
            _ => Ok(()),
        }
    }
}

/// Names of the `{name}` placeholders in a url template, or `None` when a brace is unbalanced.
pub fn url_placeholders(template: &str) -> Option<Vec<&str>> {
    let mut placeholders = Vec::new();
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        let after = &rest[start + 1..];
        let end = after.find('}')?;
        let name = &after[..end];
        if name.is_empty() || name.contains('{') {
            return None;
        }
        placeholders.push(name);
        rest = &after[end + 1..];
    }
    if rest.contains('}') {
        return None;
    }
    Some(placeholders)
}

const NO_PARAMS: &[(&str, ParamTemplate)] = &[];
const FROM_TIME: &[(&str, ParamTemplate)] = &[("from", ParamTemplate::placeholder("time"))];
const METRICS_PARAMS: &[(&str, ParamTemplate)] = &[
    ("fields", ParamTemplate::literal("unit,aggregationTypes")),
    ("writtenSince", ParamTemplate::placeholder("time")),
];
const ENTITIES_PARAMS: &[(&str, ParamTemplate)] = &[
    ("from", ParamTemplate::placeholder("time")),
    (
        "entitySelector",
        ParamTemplate::wrapped("type(\"", "entitySelector", "\")"),
    ),
];
const SCHEDULING_FROM_TIME: &[(&str, ParamTemplate)] =
    &[("schedulingFrom", ParamTemplate::placeholder("time"))];

/// Remote operations known to the collector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Metrics,
    MetricsQuery,
    MetricDescriptor,
    EntityTypes,
    Entities,
    Entity,
    Problems,
    Problem,
    Events,
    SyntheticLocations,
    SyntheticMonitors,
    SyntheticMonitor,
    SyntheticExecutions,
    SyntheticExecutionReport,
    SyntheticMonitorResult,
    SyntheticMonitorEntityResult,
    SyntheticTestResults,
}

impl Endpoint {
    pub const ALL: [Endpoint; 17] = [
        Endpoint::Metrics,
        Endpoint::MetricsQuery,
        Endpoint::MetricDescriptor,
        Endpoint::EntityTypes,
        Endpoint::Entities,
        Endpoint::Entity,
        Endpoint::Problems,
        Endpoint::Problem,
        Endpoint::Events,
        Endpoint::SyntheticLocations,
        Endpoint::SyntheticMonitors,
        Endpoint::SyntheticMonitor,
        Endpoint::SyntheticExecutions,
        Endpoint::SyntheticExecutionReport,
        Endpoint::SyntheticMonitorResult,
        Endpoint::SyntheticMonitorEntityResult,
        Endpoint::SyntheticTestResults,
    ];

    pub fn descriptor(self) -> EndpointDescriptor {
        match self {
            Endpoint::Metrics => EndpointDescriptor {
                id: "metrics",
                url_template: "/api/v2/metrics",
                shape: ResponseShape::Envelope {
                    selector: "metrics",
                    page_fields: &[],
                },
                default_params: METRICS_PARAMS,
                path_param: None,
                fan_out: FanOut::CommaJoin {
                    key: "metricSelector",
                    default_axis: &[],
                },
            },
            Endpoint::MetricsQuery => EndpointDescriptor {
                id: "metrics_query",
                url_template: "/api/v2/metrics/query",
                shape: ResponseShape::Envelope {
                    selector: "result",
                    page_fields: &["resolution"],
                },
                default_params: FROM_TIME,
                path_param: None,
                fan_out: FanOut::PerElement {
                    key: "metricSelector",
                    default_axis: &[],
                },
            },
            Endpoint::MetricDescriptor => EndpointDescriptor {
                id: "metric_descriptor",
                url_template: "/api/v2/metrics/{metricKey}",
                shape: ResponseShape::Single {
                    id_field: "metricId",
                },
                default_params: NO_PARAMS,
                path_param: Some("metricKey"),
                fan_out: FanOut::None,
            },
            Endpoint::EntityTypes => EndpointDescriptor {
                id: "entity_types",
                url_template: "/api/v2/entityTypes",
                shape: ResponseShape::Envelope {
                    selector: "types",
                    page_fields: &[],
                },
                default_params: NO_PARAMS,
                path_param: None,
                fan_out: FanOut::None,
            },
            Endpoint::Entities => EndpointDescriptor {
                id: "entities",
                url_template: "/api/v2/entities",
                shape: ResponseShape::Envelope {
                    selector: "entities",
                    page_fields: &[],
                },
                default_params: ENTITIES_PARAMS,
                path_param: None,
                fan_out: FanOut::PerElement {
                    key: "entitySelector",
                    default_axis: DEFAULT_ENTITY_TYPES,
                },
            },
            Endpoint::Entity => EndpointDescriptor {
                id: "entity",
                url_template: "/api/v2/entities/{entityId}",
                shape: ResponseShape::Single {
                    id_field: "entityId",
                },
                default_params: FROM_TIME,
                path_param: Some("entityId"),
                fan_out: FanOut::None,
            },
            Endpoint::Problems => EndpointDescriptor {
                id: "problems",
                url_template: "/api/v2/problems",
                shape: ResponseShape::Envelope {
                    selector: "problems",
                    page_fields: &[],
                },
                default_params: FROM_TIME,
                path_param: None,
                fan_out: FanOut::None,
            },
            Endpoint::Problem => EndpointDescriptor {
                id: "problem",
                url_template: "/api/v2/problems/{problemId}",
                shape: ResponseShape::Single {
                    id_field: "problemId",
                },
                default_params: NO_PARAMS,
                path_param: Some("problemId"),
                fan_out: FanOut::None,
            },
            Endpoint::Events => EndpointDescriptor {
                id: "events",
                url_template: "/api/v2/events",
                shape: ResponseShape::Envelope {
                    selector: "events",
                    page_fields: &[],
                },
                default_params: FROM_TIME,
                path_param: None,
                fan_out: FanOut::None,
            },
            Endpoint::SyntheticLocations => EndpointDescriptor {
                id: "synthetic_locations",
                url_template: "/api/v2/synthetic/locations",
                shape: ResponseShape::Envelope {
                    selector: "locations",
                    page_fields: &[],
                },
                default_params: NO_PARAMS,
                path_param: None,
                fan_out: FanOut::None,
            },
            Endpoint::SyntheticMonitors => EndpointDescriptor {
                id: "synthetic_monitors",
                url_template: "/api/v1/synthetic/monitors",
                shape: ResponseShape::Envelope {
                    selector: "monitors",
                    page_fields: &[],
                },
                default_params: NO_PARAMS,
                path_param: None,
                fan_out: FanOut::None,
            },
            Endpoint::SyntheticMonitor => EndpointDescriptor {
                id: "synthetic_monitor",
                url_template: "/api/v1/synthetic/monitors/{monitorId}",
                shape: ResponseShape::Single {
                    id_field: "entityId",
                },
                default_params: NO_PARAMS,
                path_param: Some("monitorId"),
                fan_out: FanOut::None,
            },
            Endpoint::SyntheticExecutions => EndpointDescriptor {
                id: "synthetic_executions",
                url_template: "/api/v2/synthetic/executions",
                shape: ResponseShape::Envelope {
                    selector: "executions",
                    page_fields: &[],
                },
                default_params: SCHEDULING_FROM_TIME,
                path_param: None,
                fan_out: FanOut::None,
            },
            Endpoint::SyntheticExecutionReport => EndpointDescriptor {
                id: "synthetic_execution_report",
                url_template: "/api/v2/synthetic/executions/{executionId}/fullReport",
                shape: ResponseShape::Single {
                    id_field: "executionId",
                },
                default_params: NO_PARAMS,
                path_param: Some("executionId"),
                fan_out: FanOut::None,
            },
            Endpoint::SyntheticMonitorResult => EndpointDescriptor {
                id: "synthetic_monitor_result",
                url_template: "/api/v2/synthetic/execution/{monitorId}",
                shape: ResponseShape::Single {
                    id_field: "monitorId",
                },
                default_params: NO_PARAMS,
                path_param: Some("monitorId"),
                fan_out: FanOut::UrlSuffix {
                    default_axis: EXECUTION_RESULT_STATUSES,
                },
            },
            // Same remote operation keyed by the entity id of v1 monitor listings.
            Endpoint::SyntheticMonitorEntityResult => EndpointDescriptor {
                id: "synthetic_monitor_entity_result",
                url_template: "/api/v2/synthetic/execution/{monitorId}",
                shape: ResponseShape::Single {
                    id_field: "entityId",
                },
                default_params: NO_PARAMS,
                path_param: Some("monitorId"),
                fan_out: FanOut::UrlSuffix {
                    default_axis: EXECUTION_RESULT_STATUSES,
                },
            },
            Endpoint::SyntheticTestResults => EndpointDescriptor {
                id: "synthetic_test_results",
                url_template: "/api/v2/synthetic/tests/results",
                shape: ResponseShape::Envelope {
                    selector: "results",
                    page_fields: &[],
                },
                default_params: NO_PARAMS,
                path_param: None,
                fan_out: FanOut::None,
            },
        }
    }

    pub fn id(self) -> &'static str {
        self.descriptor().id
    }
}

impl From<Endpoint> for EndpointDescriptor {
    fn from(endpoint: Endpoint) -> Self {
        endpoint.descriptor()
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for Endpoint {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Endpoint::ALL
            .into_iter()
            .find(|endpoint| endpoint.id() == wanted)
            .ok_or_else(|| format!("Unknown endpoint '{s}'"))
    }
}

/// Validates every catalog entry. Meant to run once at startup.
pub fn validate_catalog() -> Result<(), CatalogError> {
    Endpoint::ALL
        .iter()
        .try_for_each(|endpoint| endpoint.descriptor().validate())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_is_valid() {
        assert_eq!(validate_catalog(), Ok(()));
    }

    #[test]
    fn test_endpoint_ids_are_unique_and_parse_back() {
        for endpoint in Endpoint::ALL {
            assert_eq!(endpoint.id().parse::<Endpoint>(), Ok(endpoint));
        }
        let mut ids: Vec<_> = Endpoint::ALL.iter().map(|e| e.id()).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), Endpoint::ALL.len());
        assert!("not_an_endpoint".parse::<Endpoint>().is_err());
    }

    #[test]
    fn test_url_placeholders() {
        assert_eq!(url_placeholders("/api/v2/problems"), Some(vec![]));
        assert_eq!(
            url_placeholders("/api/v2/synthetic/executions/{executionId}/fullReport"),
            Some(vec!["executionId"])
        );
        assert_eq!(url_placeholders("/api/v2/entities/{entityId"), None);
        assert_eq!(url_placeholders("/api/v2/entities/entityId}"), None);
        assert_eq!(url_placeholders("/api/v2/entities/{}"), None);
    }

    #[test]
    fn test_validate_rejects_undeclared_placeholder() {
        let descriptor = EndpointDescriptor {
            path_param: None,
            ..Endpoint::Entity.descriptor()
        };
        assert_eq!(
            descriptor.validate(),
            Err(CatalogError::UndeclaredUrlPlaceholder {
                endpoint: "entity",
                placeholder: "entityId".to_string(),
            })
        );
    }

    #[test]
    fn test_validate_rejects_unused_path_param() {
        let descriptor = EndpointDescriptor {
            path_param: Some("problemId"),
            ..Endpoint::Problems.descriptor()
        };
        assert_eq!(
            descriptor.validate(),
            Err(CatalogError::UnusedPathParam {
                endpoint: "problems",
                param: "problemId",
            })
        );
    }

    #[test]
    fn test_validate_rejects_suffix_fan_out_without_axis() {
        let descriptor = EndpointDescriptor {
            fan_out: FanOut::UrlSuffix { default_axis: &[] },
            ..Endpoint::SyntheticMonitorResult.descriptor()
        };
        assert_eq!(
            descriptor.validate(),
            Err(CatalogError::MissingSuffixAxis {
                endpoint: "synthetic_monitor_result"
            })
        );
    }

    #[test]
    fn test_validate_rejects_empty_fan_out_key() {
        let descriptor = EndpointDescriptor {
            fan_out: FanOut::PerElement {
                key: "",
                default_axis: &[],
            },
            ..Endpoint::Problems.descriptor()
        };
        assert_eq!(
            descriptor.validate(),
            Err(CatalogError::MissingFanOutKey {
                endpoint: "problems"
            })
        );
    }

    #[test]
    fn test_detail_endpoints_declare_path_params() {
        for endpoint in [
            Endpoint::MetricDescriptor,
            Endpoint::Entity,
            Endpoint::Problem,
            Endpoint::SyntheticMonitor,
            Endpoint::SyntheticExecutionReport,
            Endpoint::SyntheticMonitorResult,
            Endpoint::SyntheticMonitorEntityResult,
        ] {
            let descriptor = endpoint.descriptor();
            assert!(descriptor.path_param.is_some(), "{endpoint} has no path param");
            assert!(matches!(descriptor.shape, ResponseShape::Single { .. }));
        }
    }

    #[test]
    fn test_consumes() {
        assert!(Endpoint::Problems.descriptor().consumes("time"));
        assert!(Endpoint::Entities.descriptor().consumes("entitySelector"));
        assert!(!Endpoint::SyntheticLocations.descriptor().consumes("time"));
        assert!(!Endpoint::Problem.descriptor().consumes("time"));
    }

    #[test]
    fn test_default_axes() {
        assert_eq!(
            Endpoint::Entities.descriptor().fan_out.default_axis(),
            DEFAULT_ENTITY_TYPES
        );
        assert_eq!(
            Endpoint::SyntheticMonitorResult
                .descriptor()
                .fan_out
                .default_axis(),
            &["SUCCESS", "FAILED"]
        );
        assert!(Endpoint::Problems.descriptor().fan_out.default_axis().is_empty());
    }
}
