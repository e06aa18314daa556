// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Utility functions for tenant urls and record clean-up.

use serde_json::Value;

/// Normalizes a user-supplied tenant into a base url.
///
/// - A bare host gets the `https://` scheme
/// - An `http://` url is upgraded to `https://` unless `allow_plaintext` is set
/// - Surrounding whitespace and trailing slashes are removed
///
/// # Returns
///
/// * `Some(String)` - The normalized base url
/// * `None` - If the tenant is empty
///
/// # Examples
///
/// ```
/// use dynatrace_collector::util::normalize_tenant_url;
///
/// assert_eq!(
///     normalize_tenant_url("abc12345.live.dynatrace.com/", false),
///     Some("https://abc12345.live.dynatrace.com".to_string())
/// );
/// assert_eq!(
///     normalize_tenant_url("http://dt.example.com/e/env1", false),
///     Some("https://dt.example.com/e/env1".to_string())
/// );
/// assert_eq!(normalize_tenant_url("  ", false), None);
/// ```
pub fn normalize_tenant_url(tenant: &str, allow_plaintext: bool) -> Option<String> {
    let trimmed = tenant.trim();
    let (scheme, host) = if let Some(host) = trimmed.strip_prefix("https://") {
        ("https://", host)
    } else if let Some(host) = trimmed.strip_prefix("http://") {
        if allow_plaintext {
            ("http://", host)
        } else {
            tracing::warn!("Upgrading tenant url {} to https", trimmed);
            ("https://", host)
        }
    } else {
        ("https://", trimmed)
    };

    let host = host.trim_end_matches('/');
    if host.is_empty() {
        return None;
    }
    Some(format!("{scheme}{host}"))
}

/// Base url of a SaaS environment.
pub fn saas_tenant_url(environment_id: &str) -> String {
    format!("https://{environment_id}.live.dynatrace.com")
}

/// Base url of a Managed environment, or of an environment reached through an ActiveGate.
pub fn managed_tenant_url(domain: &str, environment_id: &str) -> String {
    format!(
        "https://{}/e/{environment_id}",
        domain.trim_end_matches('/')
    )
}

/// Removes every object key listed in `keys`, at any depth.
pub fn remove_keys_recursive(value: &mut Value, keys: &[String]) {
    if keys.is_empty() {
        return;
    }
    match value {
        Value::Object(map) => {
            map.retain(|key, _| !keys.iter().any(|k| k == key));
            for nested in map.values_mut() {
                remove_keys_recursive(nested, keys);
            }
        }
        Value::Array(items) => {
            for item in items {
                remove_keys_recursive(item, keys);
            }
        }
        _ => {}
    }
}
