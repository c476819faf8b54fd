//! Companion web API client.
//!
//! Methods are invoked as `POST {base}/{method}` with form-encoded
//! arguments. Every response is an envelope with an `ok` flag; a missing
//! flag is a protocol error, never an empty success.

use crate::auth::DirectoryAuth;
use crate::client::parse_retry_after;
use crate::error::{DirectoryError, DirectoryResult};
use crate::models::{AccessLogEntry, Channel, CustomFieldValue, FieldDescriptor};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, warn};

/// Error code the web API uses for rate limiting inside an `ok: false` body.
const RATE_LIMITED_ERROR: &str = "ratelimited";

/// One page of a cursor-paginated listing.
#[derive(Debug, Clone, PartialEq)]
pub struct CursorPage<T> {
    pub items: Vec<T>,
    pub next_cursor: Option<String>,
}

/// Companion web API client.
#[derive(Debug, Clone)]
pub struct WebApiClient {
    /// Base URL (e.g., "<https://slack.com/api>").
    base_url: String,
    auth: DirectoryAuth,
    http_client: Client,
}

impl WebApiClient {
    /// Create a new web API client.
    ///
    /// # Errors
    ///
    /// Returns [`DirectoryError::InvalidConfig`] if the HTTP client cannot be built.
    pub fn new(base_url: &str, auth: DirectoryAuth, timeout: Duration) -> DirectoryResult<Self> {
        let http_client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("xavyo-directory-sync/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| {
                DirectoryError::InvalidConfig(format!("Failed to build HTTP client: {e}"))
            })?;

        Ok(Self::with_http_client(base_url, auth, http_client))
    }

    /// Create a client with a pre-built `reqwest::Client` (for testing).
    #[must_use]
    pub fn with_http_client(base_url: &str, auth: DirectoryAuth, http_client: Client) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            auth,
            http_client,
        }
    }

    // ── Methods ───────────────────────────────────────────────────────

    /// `team.profile.get`: custom profile field definitions.
    pub async fn team_profile_get(&self) -> DirectoryResult<Vec<FieldDescriptor>> {
        let body = self.call("team.profile.get", &[]).await?;
        let fields = body
            .get("profile")
            .and_then(|p| p.get("fields"))
            .cloned()
            .ok_or_else(|| {
                DirectoryError::Protocol(
                    "cannot find expected fields in response (`$.profile.fields`)".to_string(),
                )
            })?;
        decode(fields)
    }

    /// `users.profile.set`: write custom field values (keyed by field id).
    pub async fn users_profile_set(
        &self,
        user_id: &str,
        fields: &BTreeMap<String, CustomFieldValue>,
    ) -> DirectoryResult<Value> {
        let profile = serde_json::json!({ "fields": fields });
        let body = self
            .call(
                "users.profile.set",
                &[("user", user_id.to_string()), ("profile", profile.to_string())],
            )
            .await?;
        Ok(body.get("profile").cloned().unwrap_or(Value::Null))
    }

    /// `conversations.list` for one page.
    pub async fn conversations_list(
        &self,
        types: &str,
        cursor: Option<&str>,
    ) -> DirectoryResult<CursorPage<Channel>> {
        let mut args = vec![("types", types.to_string())];
        if let Some(cursor) = cursor {
            args.push(("cursor", cursor.to_string()));
        }
        let body = self.call("conversations.list", &args).await?;
        cursor_page(&body, "channels")
    }

    /// `conversations.create`.
    pub async fn conversations_create(
        &self,
        name: &str,
        is_private: bool,
    ) -> DirectoryResult<Channel> {
        let body = self
            .call(
                "conversations.create",
                &[("name", name.to_string()), ("is_private", is_private.to_string())],
            )
            .await?;
        let channel = body.get("channel").cloned().ok_or_else(|| {
            DirectoryError::Protocol("conversations.create response has no `channel`".to_string())
        })?;
        decode(channel)
    }

    /// `conversations.members` for one page.
    pub async fn conversations_members(
        &self,
        channel: &str,
        cursor: Option<&str>,
    ) -> DirectoryResult<CursorPage<String>> {
        let mut args = vec![("channel", channel.to_string())];
        if let Some(cursor) = cursor {
            args.push(("cursor", cursor.to_string()));
        }
        let body = self.call("conversations.members", &args).await?;
        cursor_page(&body, "members")
    }

    /// `team.accessLogs` for one 1-indexed page. A missing `logins` key
    /// reads as an empty page.
    pub async fn team_access_logs(
        &self,
        before: Option<i64>,
        count: usize,
        page: u32,
    ) -> DirectoryResult<Vec<AccessLogEntry>> {
        let mut args = vec![("count", count.to_string()), ("page", page.to_string())];
        if let Some(before) = before {
            args.push(("before", before.to_string()));
        }
        let body = self.call("team.accessLogs", &args).await?;
        match body.get("logins") {
            Some(Value::Null) | None => Ok(Vec::new()),
            Some(logins) => decode(logins.clone()),
        }
    }

    // ── Envelope Handling ─────────────────────────────────────────────

    async fn call(&self, method: &str, args: &[(&str, String)]) -> DirectoryResult<Value> {
        let url = format!("{}/{}", self.base_url, method);
        debug!(method, "Web API call");
        let response = self
            .auth
            .apply(self.http_client.post(&url))
            .form(args)
            .send()
            .await?;

        let status = response.status();
        let retry_after = parse_retry_after(response.headers());

        if status == StatusCode::TOO_MANY_REQUESTS {
            warn!(method, "Web API rate limited, retry after {:?}s", retry_after);
            return Err(DirectoryError::RateLimited {
                retry_after_secs: retry_after,
            });
        }
        if !status.is_success() {
            let detail = response
                .text()
                .await
                .unwrap_or_else(|_| "<no body>".to_string());
            return Err(DirectoryError::RemoteStatus {
                status: status.as_u16(),
                detail,
            });
        }

        let body: Value = serde_json::from_str(&response.text().await?)?;
        check_envelope(method, body, retry_after)
    }
}

/// Validate the `ok` flag of a web API response body.
fn check_envelope(method: &str, body: Value, retry_after: Option<u64>) -> DirectoryResult<Value> {
    match body.get("ok").and_then(Value::as_bool) {
        Some(true) => Ok(body),
        Some(false) => {
            let error = body
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("unknown_error")
                .to_string();
            if error == RATE_LIMITED_ERROR {
                warn!(method, "Web API reported ratelimited");
                Err(DirectoryError::RateLimited {
                    retry_after_secs: retry_after,
                })
            } else {
                Err(DirectoryError::Api {
                    method: method.to_string(),
                    error,
                })
            }
        }
        None => Err(DirectoryError::Protocol(format!(
            "{method} response has no `ok` flag"
        ))),
    }
}

fn cursor_page<T: DeserializeOwned>(body: &Value, key: &str) -> DirectoryResult<CursorPage<T>> {
    let items = body
        .get(key)
        .cloned()
        .ok_or_else(|| DirectoryError::Protocol(format!("response has no `{key}`")))?;
    let next_cursor = body
        .get("response_metadata")
        .and_then(|m| m.get("next_cursor"))
        .and_then(Value::as_str)
        .filter(|c| !c.is_empty())
        .map(str::to_string);
    Ok(CursorPage {
        items: decode(items)?,
        next_cursor,
    })
}

fn decode<T: DeserializeOwned>(value: Value) -> DirectoryResult<T> {
    serde_json::from_value(value).map_err(DirectoryError::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_envelope_ok() {
        let body = check_envelope("m", json!({ "ok": true, "x": 1 }), None).unwrap();
        assert_eq!(body["x"], 1);
    }

    #[test]
    fn test_envelope_missing_ok_is_protocol_error() {
        let result = check_envelope("m", json!({ "channels": [] }), None);
        assert!(matches!(result, Err(DirectoryError::Protocol(_))));
    }

    #[test]
    fn test_envelope_ratelimited_is_retryable() {
        let result = check_envelope("m", json!({ "ok": false, "error": "ratelimited" }), Some(3));
        match result {
            Err(e @ DirectoryError::RateLimited { .. }) => {
                assert!(e.is_retryable());
                assert!(matches!(
                    e,
                    DirectoryError::RateLimited {
                        retry_after_secs: Some(3)
                    }
                ));
            }
            other => panic!("expected RateLimited, got {other:?}"),
        }
    }

    #[test]
    fn test_envelope_api_error_is_terminal() {
        let body = json!({ "ok": false, "error": "name_taken" });
        let result = check_envelope("conversations.create", body, None);
        match result {
            Err(DirectoryError::Api { method, error }) => {
                assert_eq!(method, "conversations.create");
                assert_eq!(error, "name_taken");
            }
            other => panic!("expected Api error, got {other:?}"),
        }
    }

    #[test]
    fn test_cursor_page_empty_cursor_is_last_page() {
        let page: CursorPage<String> = cursor_page(
            &json!({ "ok": true, "members": ["U1"], "response_metadata": { "next_cursor": "" } }),
            "members",
        )
        .unwrap();
        assert_eq!(page.items, vec!["U1".to_string()]);
        assert!(page.next_cursor.is_none());
    }
}
