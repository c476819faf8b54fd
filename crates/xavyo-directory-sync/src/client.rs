//! Provisioning API HTTP client (reqwest-based).
//!
//! Raw single-shot calls against `/Users` and `/Groups`. Retrying is the
//! caller's job (see [`RetryPolicy`](crate::retry::RetryPolicy)).

use crate::auth::DirectoryAuth;
use crate::error::{DirectoryError, DirectoryResult};
use crate::models::{Group, GroupPatch, ListResponse, NewGroup, NewUser, User};
use reqwest::{Client, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

const SCIM_CONTENT_TYPE: &str = "application/scim+json";

/// Provisioning API client.
#[derive(Debug, Clone)]
pub struct ScimClient {
    /// Base URL (e.g., "<https://api.slack.com/scim/v1>").
    base_url: String,
    auth: DirectoryAuth,
    http_client: Client,
}

impl ScimClient {
    /// Create a new provisioning API client.
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

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    // ── User Operations ───────────────────────────────────────────────

    /// Create a user (POST /Users).
    pub async fn create_user(&self, user: &NewUser) -> DirectoryResult<User> {
        let url = format!("{}/Users", self.base_url);
        self.send_json(self.http_client.post(&url), user).await
    }

    /// Get a user by id (GET /Users/:id).
    pub async fn get_user(&self, id: &str) -> DirectoryResult<User> {
        let url = format!("{}/Users/{}", self.base_url, id);
        self.get(&url, &[]).await
    }

    /// Partially update a user (PATCH /Users/:id). Only supplied keys change.
    pub async fn patch_user(
        &self,
        id: &str,
        changes: &serde_json::Map<String, serde_json::Value>,
    ) -> DirectoryResult<User> {
        let url = format!("{}/Users/{}", self.base_url, id);
        self.send_json(self.http_client.patch(&url), changes).await
    }

    /// Search users with a filter expression (GET /Users?filter=...).
    pub async fn search_users(
        &self,
        filter: &str,
        count: u32,
    ) -> DirectoryResult<ListResponse<User>> {
        let url = format!("{}/Users", self.base_url);
        self.get(&url, &[("filter", filter.to_string()), ("count", count.to_string())])
            .await
    }

    /// Find a single user by `userName`.
    pub async fn find_user_by_user_name(&self, user_name: &str) -> DirectoryResult<Option<User>> {
        let filter = format!("userName eq \"{}\"", escape_filter_value(user_name));
        Self::first_match(self.search_users(&filter, 1).await)
    }

    /// Find a single user by email address.
    pub async fn find_user_by_email(&self, email: &str) -> DirectoryResult<Option<User>> {
        let filter = format!("email eq \"{}\"", escape_filter_value(email));
        Self::first_match(self.search_users(&filter, 1).await)
    }

    // ── Group Operations ──────────────────────────────────────────────

    /// Create a group (POST /Groups).
    pub async fn create_group(&self, group: &NewGroup) -> DirectoryResult<Group> {
        let url = format!("{}/Groups", self.base_url);
        self.send_json(self.http_client.post(&url), group).await
    }

    /// Get a group by id (GET /Groups/:id).
    pub async fn get_group(&self, id: &str) -> DirectoryResult<Group> {
        let url = format!("{}/Groups/{}", self.base_url, id);
        self.get(&url, &[]).await
    }

    /// Partially update a group (PATCH /Groups/:id).
    ///
    /// The response body is not relied upon; callers re-fetch the group to
    /// observe the post-patch state.
    pub async fn patch_group(&self, id: &str, patch: &GroupPatch) -> DirectoryResult<()> {
        let url = format!("{}/Groups/{}", self.base_url, id);
        debug!("SCIM PATCH {}", url);
        let builder = self.auth.apply(self.http_client.patch(&url));
        let response = builder
            .header("Content-Type", SCIM_CONTENT_TYPE)
            .json(patch)
            .send()
            .await?;

        if response.status().is_success() {
            Ok(())
        } else {
            Self::handle_error_response(response).await
        }
    }

    /// Search groups with a filter expression (GET /Groups?filter=...).
    pub async fn search_groups(
        &self,
        filter: &str,
        count: u32,
    ) -> DirectoryResult<ListResponse<Group>> {
        let url = format!("{}/Groups", self.base_url);
        self.get(&url, &[("filter", filter.to_string()), ("count", count.to_string())])
            .await
    }

    /// Find the group with the given display name. At most one match is
    /// returned, so two groups sharing a name are never conflated.
    pub async fn find_group_by_display_name(
        &self,
        display_name: &str,
    ) -> DirectoryResult<Option<Group>> {
        let filter = format!("displayName eq \"{}\"", escape_filter_value(display_name));
        Self::first_match(self.search_groups(&filter, 1).await)
    }

    // ── Internal HTTP Methods ─────────────────────────────────────────

    fn first_match<T>(result: DirectoryResult<ListResponse<T>>) -> DirectoryResult<Option<T>> {
        match result {
            Ok(list) => Ok(list.resources.into_iter().next()),
            // Some providers answer an empty search with 404.
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn get<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> DirectoryResult<T> {
        debug!(url, ?query, "SCIM GET");
        let mut builder = self.http_client.get(url);
        if !query.is_empty() {
            builder = builder.query(query);
        }
        let response = self.auth.apply(builder).send().await?;
        Self::handle_response(response).await
    }

    async fn send_json<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        builder: reqwest::RequestBuilder,
        body: &B,
    ) -> DirectoryResult<T> {
        let response = self
            .auth
            .apply(builder)
            .header("Content-Type", SCIM_CONTENT_TYPE)
            .json(body)
            .send()
            .await?;
        debug!(url = %response.url(), status = %response.status(), "SCIM write");
        Self::handle_response(response).await
    }

    // ── Response Handling ─────────────────────────────────────────────

    async fn handle_response<T: DeserializeOwned>(
        response: reqwest::Response,
    ) -> DirectoryResult<T> {
        if response.status().is_success() {
            let body = response.text().await?;
            serde_json::from_str(&body).map_err(|e| {
                DirectoryError::Protocol(format!("Failed to parse SCIM response: {e}"))
            })
        } else {
            Self::handle_error_response(response).await
        }
    }

    async fn handle_error_response<T>(response: reqwest::Response) -> DirectoryResult<T> {
        let status = response.status();
        let retry_after = parse_retry_after(response.headers());

        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<no body>".to_string());

        match status {
            StatusCode::NOT_FOUND => Err(DirectoryError::NotFound(body)),
            StatusCode::TOO_MANY_REQUESTS => {
                warn!("SCIM target rate limited, retry after {:?}s", retry_after);
                Err(DirectoryError::RateLimited {
                    retry_after_secs: retry_after,
                })
            }
            _ => {
                let detail = if body.is_empty() {
                    format!("HTTP {status}")
                } else {
                    body
                };
                Err(DirectoryError::RemoteStatus {
                    status: status.as_u16(),
                    detail,
                })
            }
        }
    }
}

/// Read a numeric `Retry-After` header.
pub(crate) fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<u64> {
    headers
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
}

/// Escape a value for use inside a double-quoted filter literal.
fn escape_filter_value(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_filter_value() {
        assert_eq!(escape_filter_value("plain"), "plain");
        assert_eq!(escape_filter_value("a\"b"), "a\\\"b");
        assert_eq!(escape_filter_value("a\\b"), "a\\\\b");
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let client = ScimClient::with_http_client(
            "https://api.example.com/scim/v1/",
            DirectoryAuth::bearer("t"),
            Client::new(),
        );
        assert_eq!(client.base_url(), "https://api.example.com/scim/v1");
    }

    #[test]
    fn test_parse_retry_after() {
        let mut headers = reqwest::header::HeaderMap::new();
        assert_eq!(parse_retry_after(&headers), None);
        headers.insert(reqwest::header::RETRY_AFTER, "12".parse().unwrap());
        assert_eq!(parse_retry_after(&headers), Some(12));
        headers.insert(
            reqwest::header::RETRY_AFTER,
            "Wed, 21 Oct 2015 07:28:00 GMT".parse().unwrap(),
        );
        assert_eq!(parse_retry_after(&headers), None);
    }
}
