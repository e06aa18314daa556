// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::catalog::{EndpointDescriptor, FanOut};
use crate::error::TemplateResolutionError;
use crate::formatter::resolve;
use crate::Params;

/// One concrete HTTP request: a resolved url, its query parameters and the descriptor whose
/// normalization rules apply to the response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestDescriptor {
    pub url: String,
    pub params: Params,
    pub endpoint: EndpointDescriptor,
}

/// Expands one logical call into concrete requests.
///
/// The path parameter is taken out of `params`, percent-encoded and substituted into the url
/// first. The fan-out axis is `extra_params` when given, otherwise the descriptor's default
/// axis. An explicitly empty axis yields no request; a fan-out descriptor without any axis
/// yields a single request from the formatted params.
pub fn build(
    base_url: &str,
    descriptor: &EndpointDescriptor,
    mut params: Params,
    extra_params: Option<&[String]>,
) -> Result<Vec<RequestDescriptor>, TemplateResolutionError> {
    let mut path = descriptor.url_template.to_string();
    if let Some(param) = descriptor.path_param {
        let value = params.remove(param).ok_or(TemplateResolutionError {
            endpoint: descriptor.id,
            param,
        })?;
        path = path.replace(&format!("{{{param}}}"), &urlencoding::encode(&value));
    }
    let url = format!("{}{}", base_url.trim_end_matches('/'), path);

    let axis: Option<Vec<String>> = match extra_params {
        Some(values) => Some(values.to_vec()),
        None => {
            let defaults = descriptor.fan_out.default_axis();
            (!defaults.is_empty()).then(|| defaults.iter().map(|v| (*v).to_string()).collect())
        }
    };

    let request = |url: String, params: &Params| RequestDescriptor {
        url,
        params: resolve(descriptor, params),
        endpoint: *descriptor,
    };

    let requests = match (descriptor.fan_out, axis) {
        (FanOut::None, _) | (_, None) => vec![request(url, &params)],
        (FanOut::PerElement { key, .. }, Some(values)) => values
            .into_iter()
            .map(|value| {
                let mut element_params = params.clone();
                element_params.insert(key.to_string(), value);
                request(url.clone(), &element_params)
            })
            .collect(),
        (FanOut::CommaJoin { .. }, Some(values)) if values.is_empty() => Vec::new(),
        (FanOut::CommaJoin { key, .. }, Some(values)) => {
            params.insert(key.to_string(), values.join(","));
            vec![request(url, &params)]
        }
        (FanOut::UrlSuffix { .. }, Some(values)) => values
            .into_iter()
            .map(|value| request(format!("{url}/{value}"), &params))
            .collect(),
    };
    Ok(requests)
}
