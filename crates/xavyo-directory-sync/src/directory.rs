//! Entry point owning the clients, retry policy and field cache.

use crate::access_logs::AccessLogAggregator;
use crate::auth::DirectoryAuth;
use crate::channels::ChannelOperations;
use crate::client::ScimClient;
use crate::config::DirectoryConfig;
use crate::error::DirectoryResult;
use crate::fields::{FieldCache, FieldFetchMode};
use crate::groups::GroupOperations;
use crate::retry::RetryPolicy;
use crate::users::UserOperations;
use crate::web::WebApiClient;
use tracing::info;

/// A remote directory: provisioning API plus companion web API.
///
/// Each instance owns its own [`FieldCache`], so separate instances (and
/// tests) never share schema state.
#[derive(Debug, Clone)]
pub struct Directory {
    scim: ScimClient,
    web: WebApiClient,
    retry_policy: RetryPolicy,
    fields: FieldCache,
}

impl Directory {
    #[must_use]
    pub fn new(
        scim: ScimClient,
        web: WebApiClient,
        retry_policy: RetryPolicy,
        field_fetch_mode: FieldFetchMode,
    ) -> Self {
        let fields = FieldCache::new(web.clone(), retry_policy.clone(), field_fetch_mode);
        Self {
            scim,
            web,
            retry_policy,
            fields,
        }
    }

    /// Build both clients from configuration.
    ///
    /// # Errors
    ///
    /// [`DirectoryError::InvalidConfig`](crate::DirectoryError::InvalidConfig)
    /// if an HTTP client cannot be built.
    pub fn from_config(config: &DirectoryConfig) -> DirectoryResult<Self> {
        let auth = DirectoryAuth::bearer(&config.token);
        let scim = ScimClient::new(&config.scim_url, auth.clone(), config.request_timeout())?;
        let web = WebApiClient::new(&config.web_api_url, auth, config.request_timeout())?;
        info!(
            scim_url = %config.scim_url,
            web_api_url = %config.web_api_url,
            "Directory clients ready"
        );
        Ok(Self::new(
            scim,
            web,
            config.retry_policy(),
            config.field_fetch_mode,
        ))
    }

    #[must_use]
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry_policy
    }

    #[must_use]
    pub fn fields(&self) -> &FieldCache {
        &self.fields
    }

    #[must_use]
    pub fn users(&self) -> UserOperations<'_> {
        UserOperations::new(&self.scim, &self.web, &self.retry_policy, &self.fields)
    }

    #[must_use]
    pub fn groups(&self) -> GroupOperations<'_> {
        GroupOperations::new(&self.scim, &self.retry_policy, self.users())
    }

    #[must_use]
    pub fn channels(&self) -> ChannelOperations<'_> {
        ChannelOperations::new(&self.web, &self.retry_policy)
    }

    #[must_use]
    pub fn access_logs(&self) -> AccessLogAggregator<'_> {
        AccessLogAggregator::new(&self.web, &self.retry_policy, self.users())
    }
}
