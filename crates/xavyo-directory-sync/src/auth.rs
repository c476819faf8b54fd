//! Bearer token authentication shared by both remote surfaces.

use reqwest::RequestBuilder;
use std::sync::Arc;

/// Authenticated session handle.
///
/// Obtaining the token is the caller's business; this type only attaches
/// it. The [`Debug`] impl redacts the token so it never reaches log output.
#[derive(Clone)]
pub struct DirectoryAuth {
    token: Arc<str>,
}

impl std::fmt::Debug for DirectoryAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectoryAuth")
            .field("token", &"[REDACTED]")
            .finish()
    }
}

impl DirectoryAuth {
    /// Create an auth handle from a bearer token.
    #[must_use]
    pub fn bearer(token: impl AsRef<str>) -> Self {
        Self {
            token: Arc::from(token.as_ref()),
        }
    }

    /// Apply authentication to a request builder.
    #[must_use]
    pub fn apply(&self, builder: RequestBuilder) -> RequestBuilder {
        builder.bearer_auth(&*self.token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_redacts_token() {
        let auth = DirectoryAuth::bearer("xoxp-secret");
        let rendered = format!("{auth:?}");
        assert!(!rendered.contains("xoxp-secret"));
        assert!(rendered.contains("[REDACTED]"));
    }
}
