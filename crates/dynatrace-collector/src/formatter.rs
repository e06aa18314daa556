// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::catalog::EndpointDescriptor;
use crate::template::ParamTemplate;
use crate::Params;

/// Applies the default parameters of `descriptor` to the caller's parameters.
///
/// For each `(output_key, template)` pair, in declaration order:
///
/// * a literal is always written to `output_key`;
/// * a placeholder whose source key was supplied by the caller is interpolated into
///   `output_key`, and the source key is dropped when it differs from `output_key`;
/// * a placeholder whose source key was not supplied injects nothing.
///
/// Interpolation always reads the caller's untouched value, so several templates may consume the
/// same source key. Caller keys the descriptor does not mention pass through unchanged.
/// The input is never modified.
pub fn resolve(descriptor: &EndpointDescriptor, params: &Params) -> Params {
    let mut resolved = params.clone();
    for (output_key, template) in descriptor.default_params {
        match template {
            ParamTemplate::Literal(value) => {
                resolved.insert((*output_key).to_string(), (*value).to_string());
            }
            ParamTemplate::Placeholder { key, .. } => {
                let Some(value) = params.get(*key) else {
                    continue;
                };
                if output_key != key {
                    resolved.remove(*key);
                }
                resolved.insert((*output_key).to_string(), template.render(value));
            }
        }
    }
    resolved
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Endpoint, FanOut, ResponseShape};
    use proptest::prelude::*;

    fn params(pairs: &[(&str, &str)]) -> Params {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_metrics_rename_and_literal() {
        let resolved = resolve(
            &Endpoint::Metrics.descriptor(),
            &params(&[("time", "555"), ("x", "1")]),
        );
        assert_eq!(
            resolved,
            params(&[
                ("fields", "unit,aggregationTypes"),
                ("writtenSince", "555"),
                ("x", "1"),
            ])
        );
    }

    #[test]
    fn test_entities_wraps_selector_in_place() {
        let resolved = resolve(
            &Endpoint::Entities.descriptor(),
            &params(&[("time", "5"), ("entitySelector", "HOST")]),
        );
        assert_eq!(
            resolved,
            params(&[("from", "5"), ("entitySelector", "type(\"HOST\")")])
        );
    }

    #[test]
    fn test_missing_source_key_injects_nothing() {
        let resolved = resolve(&Endpoint::Problems.descriptor(), &Params::new());
        assert!(resolved.is_empty());

        let resolved = resolve(&Endpoint::Metrics.descriptor(), &Params::new());
        assert_eq!(resolved, params(&[("fields", "unit,aggregationTypes")]));
    }

    #[test]
    fn test_caller_value_under_output_key_is_kept_when_source_missing() {
        let resolved = resolve(
            &Endpoint::Problems.descriptor(),
            &params(&[("from", "now-2h")]),
        );
        assert_eq!(resolved, params(&[("from", "now-2h")]));
    }

    #[test]
    fn test_descriptor_without_defaults_is_identity() {
        let input = params(&[("time", "1"), ("pageSize", "50")]);
        assert_eq!(resolve(&Endpoint::EntityTypes.descriptor(), &input), input);
    }

    const SHARED_SOURCE: &[(&str, ParamTemplate)] = &[
        ("from", ParamTemplate::placeholder("time")),
        ("to", ParamTemplate::wrapped("", "time", "+1h")),
    ];

    #[test]
    fn test_several_templates_read_the_same_source() {
        let descriptor = EndpointDescriptor {
            id: "shared",
            url_template: "/shared",
            shape: ResponseShape::Raw,
            default_params: SHARED_SOURCE,
            path_param: None,
            fan_out: FanOut::None,
        };
        let resolved = resolve(&descriptor, &params(&[("time", "7")]));
        assert_eq!(resolved, params(&[("from", "7"), ("to", "7+1h")]));
    }

    fn arb_params() -> impl Strategy<Value = Params> {
        prop::collection::btree_map(
            prop_oneof![
                Just("time".to_string()),
                Just("entitySelector".to_string()),
                Just("from".to_string()),
                "[a-z]{1,8}",
            ],
            "[ -~]{0,12}",
            0..6,
        )
    }

    proptest! {
        #[test]
        fn prop_resolve_is_pure(input in arb_params(), index in 0usize..Endpoint::ALL.len()) {
            let descriptor = Endpoint::ALL[index].descriptor();
            let snapshot = input.clone();
            let first = resolve(&descriptor, &input);
            let second = resolve(&descriptor, &input);
            prop_assert_eq!(&input, &snapshot);
            prop_assert_eq!(first, second);
        }

        #[test]
        fn prop_unmentioned_keys_pass_through(input in arb_params(), index in 0usize..Endpoint::ALL.len()) {
            let descriptor = Endpoint::ALL[index].descriptor();
            let resolved = resolve(&descriptor, &input);
            for (key, value) in &input {
                let mentioned = descriptor.default_params.iter().any(|(output, template)| {
                    *output == key.as_str() || template.source_key() == Some(key.as_str())
                });
                if !mentioned {
                    prop_assert_eq!(resolved.get(key), Some(value));
                }
            }
        }
    }
}
