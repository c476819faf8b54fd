//! Directory reconciliation against a SCIM-style provisioning API and its
//! companion web API.
//!
//! [`Directory`] owns the HTTP clients, the [`RetryPolicy`] and the custom
//! [`FieldCache`]; operation groups borrow from it:
//!
//! - [`Directory::users`]: create, patch, activate, profile fields, image
//! - [`Directory::groups`]: lookup, create and membership reconciliation
//! - [`Directory::channels`]: channel listing, creation and members
//! - [`Directory::access_logs`]: paginated login log aggregation

pub mod access_logs;
pub mod auth;
pub mod channels;
pub mod client;
pub mod config;
pub mod directory;
pub mod error;
pub mod fields;
pub mod groups;
pub mod logging;
pub mod membership;
pub mod models;
pub mod retry;
pub mod users;
pub mod web;

pub use access_logs::{AccessLogAggregator, AccessLogQuery, AccessStats, MAX_PAGE_SIZE};
pub use auth::DirectoryAuth;
pub use channels::{ChannelEntry, ChannelKey, ChannelOperations};
pub use client::ScimClient;
pub use config::{ConfigError, DirectoryConfig};
pub use directory::Directory;
pub use error::{DirectoryError, DirectoryResult};
pub use fields::{FieldCache, FieldFetchMode};
pub use groups::GroupOperations;
pub use membership::MembershipDiff;
pub use retry::RetryPolicy;
pub use users::{PayloadSections, UserAttributes, UserOperations, UserRef};
pub use web::WebApiClient;
