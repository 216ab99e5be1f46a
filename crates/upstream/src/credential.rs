use secrecy::{ExposeSecret, SecretString};

const BEARER_SCHEME: &str = "Bearer";

/// Caller token forwarded to upstream services. `Debug` never prints the token.
#[derive(Clone)]
pub struct BearerCredential {
    token: SecretString,
}

impl BearerCredential {
    /// Accepts a raw token. Returns `None` for an empty value.
    pub fn new(token: impl Into<String>) -> Option<Self> {
        let token = token.into();
        let trimmed = token.trim();
        if trimmed.is_empty() {
            return None;
        }
        Some(Self { token: SecretString::from(trimmed.to_string()) })
    }

    /// Accepts an `Authorization` header value, with or without the `Bearer` scheme. A bare
    /// scheme with no token is treated as absent.
    pub fn from_header_value(value: &str) -> Option<Self> {
        let value = value.trim();
        if value.eq_ignore_ascii_case(BEARER_SCHEME) {
            return None;
        }
        let token = match value.split_once(char::is_whitespace) {
            Some((scheme, rest)) if scheme.eq_ignore_ascii_case(BEARER_SCHEME) => rest,
            _ => value,
        };
        Self::new(token)
    }

    pub fn authorization_value(&self) -> String {
        format!("{BEARER_SCHEME} {}", self.token.expose_secret())
    }
}

impl std::fmt::Debug for BearerCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BearerCredential").field("token", &"[REDACTED]").finish()
    }
}
