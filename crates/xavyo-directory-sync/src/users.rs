//! User provisioning operations.
//!
//! Identity attributes go through the provisioning API; extended profile
//! fields go through the companion web API. Every remote call is wrapped by
//! the [`RetryPolicy`] at the call site.

use crate::client::ScimClient;
use crate::error::{absent_on_not_found, DirectoryError, DirectoryResult};
use crate::fields::FieldCache;
use crate::models::{NewUser, User, UserEmail, UserName, UserPhoto, USER_SCHEMA};
use crate::retry::RetryPolicy;
use crate::web::WebApiClient;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, info};

/// Web API error code for an id that names no user.
const USER_NOT_FOUND_ERROR: &str = "user_not_found";

/// How a caller addresses a user.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum UserRef {
    Id(String),
    UserName(String),
    Email(String),
}

impl UserRef {
    /// Guess the kind of reference from its shape.
    ///
    /// Alphanumeric strings starting with `U` or `W` are ids, strings with
    /// an `@` and no whitespace are emails, anything else is a user name.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        let s = s.trim();
        let looks_like_id = s.starts_with(['U', 'W'])
            && s.chars().all(|c| c.is_ascii_alphanumeric());
        if looks_like_id {
            Self::Id(s.to_string())
        } else if s.contains('@') && !s.contains(char::is_whitespace) {
            Self::Email(s.to_string())
        } else {
            Self::UserName(s.to_string())
        }
    }
}

impl fmt::Display for UserRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "id:{id}"),
            Self::UserName(name) => write!(f, "user_name:{name}"),
            Self::Email(email) => write!(f, "email:{email}"),
        }
    }
}

impl From<&User> for UserRef {
    fn from(user: &User) -> Self {
        Self::Id(user.id.clone())
    }
}

/// Flat attribute dictionary for user creation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserAttributes {
    pub email: Option<String>,
    /// Derived from the email's local part when absent.
    pub user_name: Option<String>,
    pub given_name: Option<String>,
    pub family_name: Option<String>,
    /// Profile photo URL.
    pub image: Option<String>,
    /// Custom field values keyed by human-readable label.
    pub custom: BTreeMap<String, String>,
}

/// Which optional blocks go into a creation payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayloadSections {
    pub naming: bool,
    pub photo: bool,
    pub custom_fields: bool,
}

impl Default for PayloadSections {
    fn default() -> Self {
        Self {
            naming: true,
            photo: true,
            custom_fields: true,
        }
    }
}

/// Local part of an email address.
#[must_use]
pub fn derive_user_name(email: &str) -> &str {
    email.split_once('@').map_or(email, |(local, _)| local)
}

/// User operations over a borrowed [`Directory`](crate::Directory).
#[derive(Debug, Clone, Copy)]
pub struct UserOperations<'a> {
    scim: &'a ScimClient,
    web: &'a WebApiClient,
    retry_policy: &'a RetryPolicy,
    fields: &'a FieldCache,
}

impl<'a> UserOperations<'a> {
    #[must_use]
    pub fn new(
        scim: &'a ScimClient,
        web: &'a WebApiClient,
        retry_policy: &'a RetryPolicy,
        fields: &'a FieldCache,
    ) -> Self {
        Self {
            scim,
            web,
            retry_policy,
            fields,
        }
    }

    /// Resolve a reference to the current remote representation.
    pub async fn lookup(&self, user: &UserRef) -> DirectoryResult<Option<User>> {
        match user {
            UserRef::Id(id) => absent_on_not_found(
                self.retry_policy
                    .execute("get_user", || self.scim.get_user(id))
                    .await,
            ),
            UserRef::UserName(user_name) => {
                self.retry_policy
                    .execute("find_user_by_user_name", || {
                        self.scim.find_user_by_user_name(user_name)
                    })
                    .await
            }
            UserRef::Email(email) => {
                self.retry_policy
                    .execute("find_user_by_email", || self.scim.find_user_by_email(email))
                    .await
            }
        }
    }

    /// Build a creation payload.
    ///
    /// # Errors
    ///
    /// [`DirectoryError::Validation`] when `email` is missing; the field
    /// cache error in strict mode when custom fields are requested.
    pub async fn build_new_user(
        &self,
        attrs: &UserAttributes,
        sections: PayloadSections,
    ) -> DirectoryResult<NewUser> {
        let email = attrs
            .email
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .ok_or_else(|| DirectoryError::Validation("email is required".to_string()))?;

        let user_name = attrs
            .user_name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| derive_user_name(email))
            .to_string();

        let mut payload = NewUser {
            schemas: vec![USER_SCHEMA.to_string()],
            user_name: user_name.clone(),
            emails: vec![UserEmail {
                value: email.to_string(),
                primary: true,
                email_type: None,
            }],
            active: true,
            name: None,
            display_name: None,
            nick_name: None,
            photos: None,
            fields: None,
        };

        if sections.naming {
            payload.name = Some(UserName {
                given_name: attrs.given_name.clone(),
                family_name: attrs.family_name.clone(),
            });
            payload.display_name = Some(user_name.clone());
            payload.nick_name = Some(user_name);
        }

        if sections.photo {
            if let Some(image) = &attrs.image {
                payload.photos = Some(vec![UserPhoto {
                    value: image.clone(),
                    primary: true,
                }]);
            }
        }

        if sections.custom_fields && !attrs.custom.is_empty() {
            let fields = self.fields.translate(&attrs.custom).await?;
            if !fields.is_empty() {
                payload.fields = Some(fields);
            }
        }

        Ok(payload)
    }

    /// Create a user from flat attributes.
    ///
    /// Not deduplicated: a retried create may land twice remotely.
    pub async fn create(&self, attrs: &UserAttributes) -> DirectoryResult<User> {
        let payload = self.build_new_user(attrs, PayloadSections::default()).await?;
        let user = self
            .retry_policy
            .execute("create_user", || self.scim.create_user(&payload))
            .await?;
        info!(user_id = %user.id, user_name = %user.user_name, "User created");
        Ok(user)
    }

    /// Partially update a user. Absent if the user does not resolve.
    pub async fn patch(
        &self,
        user: &UserRef,
        changes: &Map<String, Value>,
    ) -> DirectoryResult<Option<User>> {
        let Some(id) = self.resolve_id(user).await? else {
            debug!(user = %user, "Patch target not found");
            return Ok(None);
        };
        absent_on_not_found(
            self.retry_policy
                .execute("patch_user", || self.scim.patch_user(&id, changes))
                .await,
        )
    }

    /// Set the active flag. True only when the returned state matches.
    pub async fn set_active(&self, user: &UserRef, active: bool) -> DirectoryResult<bool> {
        let mut changes = Map::new();
        changes.insert("active".to_string(), Value::Bool(active));
        let updated = self.patch(user, &changes).await?;
        let applied = updated.is_some_and(|u| u.active == active);
        if applied {
            info!(user = %user, active, "User active flag updated");
        }
        Ok(applied)
    }

    pub async fn activate(&self, user: &UserRef) -> DirectoryResult<bool> {
        self.set_active(user, true).await
    }

    pub async fn deactivate(&self, user: &UserRef) -> DirectoryResult<bool> {
        self.set_active(user, false).await
    }

    /// Write label-keyed custom profile fields through the web API.
    ///
    /// Returns the updated profile, or absent if the user does not resolve.
    /// When no label maps to a known field nothing is written and the
    /// returned profile is empty.
    pub async fn set_profile_fields(
        &self,
        user: &UserRef,
        values: &BTreeMap<String, String>,
    ) -> DirectoryResult<Option<Value>> {
        let Some(id) = self.resolve_id(user).await? else {
            return Ok(None);
        };
        let fields = self.fields.translate(values).await?;
        if fields.is_empty() {
            debug!(user = %user, "No known custom fields to write, skipping");
            return Ok(Some(Value::Object(Map::new())));
        }

        let result = self
            .retry_policy
            .execute("users_profile_set", || {
                self.web.users_profile_set(&id, &fields)
            })
            .await;
        match result {
            Ok(profile) => Ok(Some(profile)),
            Err(DirectoryError::Api { error, .. }) if error == USER_NOT_FOUND_ERROR => {
                debug!(user = %user, "Profile target not found");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Replace the profile photo.
    pub async fn set_image(&self, user: &UserRef, url: &str) -> DirectoryResult<Option<User>> {
        let mut changes = Map::new();
        changes.insert(
            "photos".to_string(),
            json!([{ "value": url, "primary": true }]),
        );
        self.patch(user, &changes).await
    }

    async fn resolve_id(&self, user: &UserRef) -> DirectoryResult<Option<String>> {
        match user {
            // Ids are used as-is; a 404 on the follow-up call reads as absent.
            UserRef::Id(id) => Ok(Some(id.clone())),
            other => Ok(self.lookup(other).await?.map(|u| u.id)),
        }
    }
}
