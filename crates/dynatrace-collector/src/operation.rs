// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::fmt;
use std::str::FromStr;

use crate::catalog::Endpoint;
use crate::orchestrator::{RunPlan, TIME_PARAM};

/// Named collection preset: a main endpoint, its detail endpoints and the inputs it takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Problems,
    ProblemDetails,
    Events,
    EntityTypes,
    Entities,
    EntityDetails,
    SyntheticLocations,
    SyntheticMonitors,
    SyntheticMonitorDetails,
    SyntheticMonitorResults,
    SyntheticExecutions,
    SyntheticExecutionReports,
    SyntheticTestResults,
    MetricDescriptors,
    /// Metric time series. Collected through [`crate::metrics::metric_data_points`] rather than
    /// a single plan.
    Metrics,
}

/// Inputs an operation may need besides the tenant.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OperationInputs {
    /// Value of the `time` parameter.
    pub time: String,
    /// Overrides the entity-type axis of the entity operations.
    pub entity_types: Option<Vec<String>>,
    pub metric_selectors: Vec<String>,
}

impl Operation {
    pub const ALL: [Operation; 15] = [
        Operation::Problems,
        Operation::ProblemDetails,
        Operation::Events,
        Operation::EntityTypes,
        Operation::Entities,
        Operation::EntityDetails,
        Operation::SyntheticLocations,
        Operation::SyntheticMonitors,
        Operation::SyntheticMonitorDetails,
        Operation::SyntheticMonitorResults,
        Operation::SyntheticExecutions,
        Operation::SyntheticExecutionReports,
        Operation::SyntheticTestResults,
        Operation::MetricDescriptors,
        Operation::Metrics,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Operation::Problems => "problems",
            Operation::ProblemDetails => "problem_details",
            Operation::Events => "events",
            Operation::EntityTypes => "entity_types",
            Operation::Entities => "entities",
            Operation::EntityDetails => "entity_details",
            Operation::SyntheticLocations => "synthetic_locations",
            Operation::SyntheticMonitors => "synthetic_monitors",
            Operation::SyntheticMonitorDetails => "synthetic_monitor_details",
            Operation::SyntheticMonitorResults => "synthetic_monitor_results",
            Operation::SyntheticExecutions => "synthetic_executions",
            Operation::SyntheticExecutionReports => "synthetic_execution_reports",
            Operation::SyntheticTestResults => "synthetic_test_results",
            Operation::MetricDescriptors => "metric_descriptors",
            Operation::Metrics => "metrics",
        }
    }

    pub fn main_endpoint(self) -> Endpoint {
        match self {
            Operation::Problems | Operation::ProblemDetails => Endpoint::Problems,
            Operation::Events => Endpoint::Events,
            Operation::EntityTypes => Endpoint::EntityTypes,
            Operation::Entities | Operation::EntityDetails => Endpoint::Entities,
            Operation::SyntheticLocations => Endpoint::SyntheticLocations,
            Operation::SyntheticMonitors
            | Operation::SyntheticMonitorDetails
            | Operation::SyntheticMonitorResults => Endpoint::SyntheticMonitors,
            Operation::SyntheticExecutions | Operation::SyntheticExecutionReports => {
                Endpoint::SyntheticExecutions
            }
            Operation::SyntheticTestResults => Endpoint::SyntheticTestResults,
            Operation::MetricDescriptors => Endpoint::Metrics,
            Operation::Metrics => Endpoint::MetricsQuery,
        }
    }

    pub fn detail_endpoints(self) -> &'static [Endpoint] {
        match self {
            Operation::ProblemDetails => &[Endpoint::Problem],
            Operation::EntityDetails => &[Endpoint::Entity],
            Operation::SyntheticMonitorDetails => &[Endpoint::SyntheticMonitor],
            Operation::SyntheticMonitorResults => &[Endpoint::SyntheticMonitorEntityResult],
            Operation::SyntheticExecutionReports => &[Endpoint::SyntheticExecutionReport],
            _ => &[],
        }
    }

    /// Builds the run plan of this operation. `time` is only passed to main endpoints whose
    /// templates read it.
    pub fn plan(self, inputs: &OperationInputs) -> RunPlan {
        let main = self.main_endpoint();
        let mut plan = self
            .detail_endpoints()
            .iter()
            .fold(RunPlan::new(main), |plan, detail| plan.with_detail(*detail));

        if main.descriptor().consumes(TIME_PARAM) {
            plan = plan.with_param(TIME_PARAM, inputs.time.clone());
        }

        match self {
            Operation::Entities | Operation::EntityDetails => {
                if let Some(types) = &inputs.entity_types {
                    plan = plan.with_extra_params(types.clone());
                }
            }
            Operation::MetricDescriptors => {
                if !inputs.metric_selectors.is_empty() {
                    plan = plan.with_extra_params(inputs.metric_selectors.clone());
                }
            }
            Operation::Metrics => {
                plan = plan.with_extra_params(inputs.metric_selectors.clone());
            }
            _ => {}
        }
        plan
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Operation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase().replace('-', "_");
        Operation::ALL
            .into_iter()
            .find(|operation| operation.name() == wanted)
            .ok_or_else(|| format!("Unknown operation '{s}'"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Params;

    fn inputs() -> OperationInputs {
        OperationInputs {
            time: "555".to_string(),
            entity_types: None,
            metric_selectors: Vec::new(),
        }
    }

    #[test]
    fn test_parse_operations() {
        for operation in Operation::ALL {
            assert_eq!(operation.name().parse::<Operation>(), Ok(operation));
        }
        assert_eq!(
            " Problem-Details ".parse::<Operation>(),
            Ok(Operation::ProblemDetails)
        );
        assert!("nope".parse::<Operation>().is_err());
    }

    #[test]
    fn test_time_only_for_consuming_endpoints() {
        let plan = Operation::Problems.plan(&inputs());
        assert_eq!(plan.params, Params::from([("time".to_string(), "555".to_string())]));

        let plan = Operation::SyntheticLocations.plan(&inputs());
        assert!(plan.params.is_empty());

        let plan = Operation::SyntheticTestResults.plan(&inputs());
        assert!(plan.params.is_empty());
        assert_eq!(plan.main, Endpoint::SyntheticTestResults.descriptor());

        let plan = Operation::SyntheticExecutionReports.plan(&inputs());
        assert_eq!(plan.params.get("time").map(String::as_str), Some("555"));
        assert_eq!(
            plan.details,
            vec![Endpoint::SyntheticExecutionReport.descriptor()]
        );
    }

    #[test]
    fn test_entity_axis_override() {
        let plan = Operation::EntityDetails.plan(&OperationInputs {
            entity_types: Some(vec!["HOST".to_string()]),
            ..inputs()
        });
        assert_eq!(plan.main, Endpoint::Entities.descriptor());
        assert_eq!(plan.extra_params, Some(vec!["HOST".to_string()]));
        assert_eq!(plan.details, vec![Endpoint::Entity.descriptor()]);

        assert_eq!(Operation::Entities.plan(&inputs()).extra_params, None);
    }

    #[test]
    fn test_metric_operations() {
        let selectors = vec!["builtin:host.cpu.usage".to_string()];
        let with_selectors = OperationInputs {
            metric_selectors: selectors.clone(),
            ..inputs()
        };

        let plan = Operation::MetricDescriptors.plan(&with_selectors);
        assert_eq!(plan.extra_params, Some(selectors.clone()));
        assert_eq!(plan.params.get("time").map(String::as_str), Some("555"));
        assert_eq!(Operation::MetricDescriptors.plan(&inputs()).extra_params, None);

        let plan = Operation::Metrics.plan(&with_selectors);
        assert_eq!(plan.main, Endpoint::MetricsQuery.descriptor());
        assert_eq!(plan.extra_params, Some(selectors));
        assert_eq!(Operation::Metrics.plan(&inputs()).extra_params, Some(Vec::new()));
    }

    #[test]
    fn test_synthetic_monitor_results_use_entity_ids() {
        let plan = Operation::SyntheticMonitorResults.plan(&inputs());
        assert_eq!(plan.main, Endpoint::SyntheticMonitors.descriptor());
        assert_eq!(
            plan.details,
            vec![Endpoint::SyntheticMonitorEntityResult.descriptor()]
        );
    }
}
