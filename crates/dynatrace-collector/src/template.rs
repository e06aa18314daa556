// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::fmt;

/// Value template of one default query parameter.
///
/// A template is either a literal, or exactly one named placeholder with optional literal text
/// around it (`type("{entitySelector}")`). Templates with several placeholders are not
/// representable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamTemplate {
    Literal(&'static str),
    Placeholder {
        prefix: &'static str,
        key: &'static str,
        suffix: &'static str,
    },
}

impl ParamTemplate {
    pub const fn literal(value: &'static str) -> Self {
        ParamTemplate::Literal(value)
    }

    /// `{key}`
    pub const fn placeholder(key: &'static str) -> Self {
        ParamTemplate::Placeholder {
            prefix: "",
            key,
            suffix: "",
        }
    }

    /// `prefix{key}suffix`
    pub const fn wrapped(prefix: &'static str, key: &'static str, suffix: &'static str) -> Self {
        ParamTemplate::Placeholder {
            prefix,
            key,
            suffix,
        }
    }

    /// Name of the caller parameter this template reads, if any.
    pub fn source_key(&self) -> Option<&'static str> {
        match self {
            ParamTemplate::Literal(_) => None,
            ParamTemplate::Placeholder { key, .. } => Some(key),
        }
    }

    /// Interpolates `value` into the placeholder. Literals ignore `value`.
    pub fn render(&self, value: &str) -> String {
        match self {
            ParamTemplate::Literal(literal) => (*literal).to_string(),
            ParamTemplate::Placeholder { prefix, suffix, .. } => {
                let mut rendered = String::with_capacity(prefix.len() + value.len() + suffix.len());
                rendered.push_str(prefix);
                rendered.push_str(value);
                rendered.push_str(suffix);
                rendered
            }
        }
    }
}

impl fmt::Display for ParamTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamTemplate::Literal(literal) => f.write_str(literal),
            ParamTemplate::Placeholder {
                prefix,
                key,
                suffix,
            } => write!(f, "{prefix}{{{key}}}{suffix}"),
        }
    }
}
