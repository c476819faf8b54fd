//! Group provisioning and membership reconciliation.

use crate::client::ScimClient;
use crate::error::{absent_on_not_found, DirectoryResult};
use crate::membership::MembershipDiff;
use crate::models::{Group, GroupPatch, NewGroup};
use crate::retry::RetryPolicy;
use crate::users::{UserOperations, UserRef};
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

/// Group operations over a borrowed [`Directory`](crate::Directory).
#[derive(Debug, Clone, Copy)]
pub struct GroupOperations<'a> {
    scim: &'a ScimClient,
    retry_policy: &'a RetryPolicy,
    users: UserOperations<'a>,
}

impl<'a> GroupOperations<'a> {
    #[must_use]
    pub fn new(
        scim: &'a ScimClient,
        retry_policy: &'a RetryPolicy,
        users: UserOperations<'a>,
    ) -> Self {
        Self {
            scim,
            retry_policy,
            users,
        }
    }

    /// The single authoritative group with this display name, if any.
    pub async fn find_by_display_name(&self, display_name: &str) -> DirectoryResult<Option<Group>> {
        self.retry_policy
            .execute("find_group_by_display_name", || {
                self.scim.find_group_by_display_name(display_name)
            })
            .await
    }

    pub async fn get(&self, id: &str) -> DirectoryResult<Option<Group>> {
        absent_on_not_found(
            self.retry_policy
                .execute("get_group", || self.scim.get_group(id))
                .await,
        )
    }

    /// Create a group, or return the existing one with this display name.
    pub async fn create(&self, display_name: &str) -> DirectoryResult<Group> {
        if let Some(existing) = self.find_by_display_name(display_name).await? {
            debug!(group_id = %existing.id, display_name, "Group already exists");
            return Ok(existing);
        }

        self.insert(display_name).await
    }

    /// Apply a patch and return the re-fetched group.
    ///
    /// Absent when the group id does not resolve.
    pub async fn patch(&self, id: &str, patch: &GroupPatch) -> DirectoryResult<Option<Group>> {
        let patched = absent_on_not_found(
            self.retry_policy
                .execute("patch_group", || self.scim.patch_group(id, patch))
                .await,
        )?;
        if patched.is_none() {
            debug!(group_id = id, "Patch target not found");
            return Ok(None);
        }
        self.get(id).await
    }

    /// Make the group named `display_name` exist with the desired members.
    ///
    /// Resolve, create if absent, diff, patch once, then re-fetch. A failed
    /// create returns the error without touching membership. Concurrent
    /// calls for the same group are not serialized.
    pub async fn ensure(
        &self,
        display_name: &str,
        desired: &BTreeSet<String>,
        remove_unspecified: bool,
    ) -> DirectoryResult<Option<Group>> {
        let group = match self.find_by_display_name(display_name).await? {
            Some(group) => group,
            None => self.insert(display_name).await?,
        };

        let diff = MembershipDiff::compute(&group.member_ids(), desired, remove_unspecified);
        info!(
            group_id = %group.id,
            display_name,
            to_add = diff.to_add.len(),
            to_remove = diff.to_remove.len(),
            "Reconciling group membership"
        );

        self.patch(&group.id, &diff.to_patch()).await
    }

    /// [`ensure`](Self::ensure) with members given as user references.
    /// References that do not resolve are skipped.
    pub async fn ensure_users(
        &self,
        display_name: &str,
        members: &[UserRef],
        remove_unspecified: bool,
    ) -> DirectoryResult<Option<Group>> {
        let mut desired = BTreeSet::new();
        for member in members {
            match member {
                UserRef::Id(id) => {
                    desired.insert(id.clone());
                }
                other => match self.users.lookup(other).await? {
                    Some(user) => {
                        desired.insert(user.id);
                    }
                    None => warn!(user = %other, display_name, "Skipping unknown group member"),
                },
            }
        }
        self.ensure(display_name, &desired, remove_unspecified).await
    }

    async fn insert(&self, display_name: &str) -> DirectoryResult<Group> {
        let payload = NewGroup {
            display_name: display_name.to_string(),
        };
        let group = self
            .retry_policy
            .execute("create_group", || self.scim.create_group(&payload))
            .await?;
        info!(group_id = %group.id, display_name, "Group created");
        Ok(group)
    }
}
