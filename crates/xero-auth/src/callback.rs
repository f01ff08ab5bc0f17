//! Authorization callback parsing
//!
//! Xero redirects back to the configured redirect URI with either
//! `code` + `state` or `error` (+ `error_description`) in the query string.

use url::form_urlencoded;

use crate::error::{Error, Result};

/// Query parameters received on the OAuth redirect.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub scope: Option<String>,
    pub session_state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

impl CallbackParams {
    /// Parse from a raw query string or a full callback URL / path.
    ///
    /// Anything up to and including the first `?` is ignored, so
    /// `/xero/callback?code=..` and `code=..` parse the same way.
    pub fn parse(callback: &str) -> Self {
        let query = match callback.split_once('?') {
            Some((_, query)) => query,
            None => callback,
        };
        // A fragment never reaches the server, but strip it if a caller pasted one
        let query = query.split('#').next().unwrap_or_default();

        let mut params = Self::default();
        for (key, value) in form_urlencoded::parse(query.as_bytes()) {
            let value = Some(value.into_owned());
            match key.as_ref() {
                "code" => params.code = value,
                "state" => params.state = value,
                "scope" => params.scope = value,
                "session_state" => params.session_state = value,
                "error" => params.error = value,
                "error_description" => params.error_description = value,
                _ => {}
            }
        }
        params
    }

    /// Validate the callback against the state sent in the consent URL and
    /// return the authorization code.
    pub fn authorization_code(&self, expected_state: &str) -> Result<&str> {
        if let Some(error) = &self.error {
            let description = self.error_description.as_deref().unwrap_or("no description");
            return Err(Error::Callback(format!("{error}: {description}")));
        }

        if self.state.as_deref() != Some(expected_state) {
            return Err(Error::StateMismatch);
        }

        self.code
            .as_deref()
            .filter(|code| !code.is_empty())
            .ok_or_else(|| Error::Callback("missing authorization code".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_callback_path() {
        let params = CallbackParams::parse(
            "/xero/callback?code=abc123&scope=openid%20email&state=st-1&session_state=xyz",
        );
        assert_eq!(params.code.as_deref(), Some("abc123"));
        assert_eq!(params.state.as_deref(), Some("st-1"));
        assert_eq!(params.scope.as_deref(), Some("openid email"));
        assert_eq!(params.session_state.as_deref(), Some("xyz"));
    }

    #[test]
    fn parses_bare_query() {
        let params = CallbackParams::parse("code=c&state=s");
        assert_eq!(params.authorization_code("s").unwrap(), "c");
    }

    #[test]
    fn state_mismatch_is_rejected() {
        let params = CallbackParams::parse("code=c&state=other");
        assert!(matches!(
            params.authorization_code("expected"),
            Err(Error::StateMismatch)
        ));
    }

    #[test]
    fn missing_state_is_rejected() {
        let params = CallbackParams::parse("code=c");
        assert!(matches!(
            params.authorization_code("expected"),
            Err(Error::StateMismatch)
        ));
    }

    #[test]
    fn error_parameter_wins_over_code() {
        let params = CallbackParams::parse(
            "error=access_denied&error_description=user+cancelled&state=s&code=c",
        );
        let err = params.authorization_code("s").unwrap_err();
        assert!(matches!(err, Error::Callback(_)));
        assert!(err.to_string().contains("access_denied: user cancelled"));
    }

    #[test]
    fn empty_code_is_rejected() {
        let params = CallbackParams::parse("code=&state=s");
        assert!(matches!(
            params.authorization_code("s"),
            Err(Error::Callback(_))
        ));
    }
}
