// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::fmt;

/// Dynatrace API token, sent as `Authorization: Api-Token <token>`.
///
/// Surrounding whitespace is dropped. The value never shows up in `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiToken(String);

impl ApiToken {
    pub fn new(token: impl Into<String>) -> Self {
        let token = token.into();
        Self(token.trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for ApiToken {
    fn from(token: &str) -> Self {
        Self::new(token)
    }
}

impl fmt::Debug for ApiToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiToken(<redacted>)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_is_trimmed() {
        let token = ApiToken::new(" dt0c01.mock\n");
        assert_eq!(token.as_str(), "dt0c01.mock");
        assert!(!token.is_empty());
        assert!(ApiToken::from("  ").is_empty());
    }

    #[test]
    fn debug_does_not_leak_token() {
        let token = ApiToken::from("dt0c01.secret");
        assert_eq!(format!("{token:?}"), "ApiToken(<redacted>)");
    }
}
