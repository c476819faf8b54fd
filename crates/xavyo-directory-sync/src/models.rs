//! Wire representations for the provisioning and web APIs.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Core user schema URI sent with creation payloads.
pub const USER_SCHEMA: &str = "urn:scim:schemas:core:1.0";

/// Name component of a user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserName {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub given_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family_name: Option<String>,
}

/// Email entry. Creation payloads carry exactly one, marked primary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserEmail {
    pub value: String,
    #[serde(default)]
    pub primary: bool,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub email_type: Option<String>,
}

/// Profile photo entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPhoto {
    pub value: String,
    #[serde(default)]
    pub primary: bool,
}

/// Value written to a custom profile field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomFieldValue {
    pub value: Option<String>,
    #[serde(default)]
    pub alt: String,
}

impl CustomFieldValue {
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: Some(value.into()),
            alt: String::new(),
        }
    }
}

/// A user as returned by the provisioning API.
///
/// Never cached: every operation returns the representation fresh from the
/// remote call that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub user_name: String,
    #[serde(default)]
    pub name: Option<UserName>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub nick_name: Option<String>,
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub emails: Vec<UserEmail>,
    #[serde(default)]
    pub photos: Vec<UserPhoto>,
    /// Custom-field values keyed by provider field id.
    #[serde(default)]
    pub fields: BTreeMap<String, CustomFieldValue>,
}

impl User {
    /// Primary email, falling back to the first listed.
    #[must_use]
    pub fn email(&self) -> Option<&str> {
        self.emails
            .iter()
            .find(|e| e.primary)
            .or_else(|| self.emails.first())
            .map(|e| e.value.as_str())
    }

    /// Primary photo URL, falling back to the first listed.
    #[must_use]
    pub fn image_url(&self) -> Option<&str> {
        self.photos
            .iter()
            .find(|p| p.primary)
            .or_else(|| self.photos.first())
            .map(|p| p.value.as_str())
    }
}

/// Creation payload for `POST /Users`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    pub schemas: Vec<String>,
    pub user_name: String,
    pub emails: Vec<UserEmail>,
    pub active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<UserName>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nick_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub photos: Option<Vec<UserPhoto>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<BTreeMap<String, CustomFieldValue>>,
}

/// Group member reference.
///
/// On patch, `operation: "delete"` is the only way to remove a member;
/// omitting a member from the list leaves it in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupMember {
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation: Option<String>,
}

impl GroupMember {
    /// Entry that adds (or keeps) a member.
    #[must_use]
    pub fn add(user_id: impl Into<String>) -> Self {
        Self {
            value: user_id.into(),
            display: None,
            operation: None,
        }
    }

    /// Entry that removes a member.
    #[must_use]
    pub fn delete(user_id: impl Into<String>) -> Self {
        Self {
            value: user_id.into(),
            display: None,
            operation: Some("delete".to_string()),
        }
    }

    #[must_use]
    pub fn is_delete(&self) -> bool {
        self.operation.as_deref() == Some("delete")
    }
}

/// A group as returned by the provisioning API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    pub id: String,
    pub display_name: String,
    #[serde(default)]
    pub members: Vec<GroupMember>,
}

impl Group {
    /// Ids of current members.
    #[must_use]
    pub fn member_ids(&self) -> BTreeSet<String> {
        self.members.iter().map(|m| m.value.clone()).collect()
    }
}

/// Creation payload for `POST /Groups`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewGroup {
    pub display_name: String,
}

/// Partial update body for `PATCH /Groups/{id}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub members: Vec<GroupMember>,
}

/// Paged search response from the provisioning API.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListResponse<T> {
    #[serde(default)]
    pub total_results: u64,
    #[serde(rename = "Resources", default = "Vec::new")]
    pub resources: Vec<T>,
}

/// Custom profile field definition from the workspace schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub id: String,
    pub label: String,
    #[serde(rename = "type", default)]
    pub field_type: Option<String>,
    #[serde(default)]
    pub hint: Option<String>,
    #[serde(default)]
    pub ordering: Option<i64>,
    #[serde(default)]
    pub possible_values: Option<Vec<String>>,
    #[serde(default)]
    pub is_hidden: Option<bool>,
}

/// A conversation (channel) record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Channel {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub is_private: bool,
    #[serde(default)]
    pub is_archived: bool,
    #[serde(default)]
    pub num_members: Option<u64>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// One login record from the team access log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessLogEntry {
    pub user_id: String,
    #[serde(default)]
    pub username: Option<String>,
    /// Unix timestamp of the first login in this record.
    #[serde(default)]
    pub date_first: Option<i64>,
    /// Unix timestamp of the last login in this record.
    #[serde(default)]
    pub date_last: Option<i64>,
    #[serde(default)]
    pub count: u64,
    #[serde(default)]
    pub ip: Option<String>,
    #[serde(default)]
    pub user_agent: Option<String>,
    #[serde(default)]
    pub isp: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
}

impl AccessLogEntry {
    /// First login as a UTC timestamp.
    #[must_use]
    pub fn first_seen(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        self.date_first
            .and_then(|ts| chrono::DateTime::from_timestamp(ts, 0))
    }

    /// Last login as a UTC timestamp.
    #[must_use]
    pub fn last_seen(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        self.date_last
            .and_then(|ts| chrono::DateTime::from_timestamp(ts, 0))
    }
}
