//! Conversation (channel) queries over the web API.

use crate::error::{DirectoryError, DirectoryResult};
use crate::models::Channel;
use crate::retry::RetryPolicy;
use crate::web::WebApiClient;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Conversation types included in listings.
const LISTED_TYPES: &str = "public_channel,private_channel";

/// Which attribute keys a channel listing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ChannelKey {
    #[default]
    Name,
    Id,
}

/// Value side of a channel listing.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEntry {
    /// The full channel record.
    Record(Channel),
    /// Only the other key (the id when keyed by name, and vice versa).
    Key(String),
}

impl ChannelEntry {
    #[must_use]
    pub fn as_record(&self) -> Option<&Channel> {
        match self {
            Self::Record(channel) => Some(channel),
            Self::Key(_) => None,
        }
    }

    #[must_use]
    pub fn as_key(&self) -> Option<&str> {
        match self {
            Self::Key(key) => Some(key),
            Self::Record(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ChannelOperations<'a> {
    web: &'a WebApiClient,
    retry_policy: &'a RetryPolicy,
}

impl<'a> ChannelOperations<'a> {
    #[must_use]
    pub fn new(web: &'a WebApiClient, retry_policy: &'a RetryPolicy) -> Self {
        Self { web, retry_policy }
    }

    /// All public and private channels, keyed by name or id.
    ///
    /// With `only_counterpart`, values are the other key instead of the
    /// full record. Later duplicates of a key replace earlier ones.
    pub async fn list(
        &self,
        key: ChannelKey,
        only_counterpart: bool,
    ) -> DirectoryResult<BTreeMap<String, ChannelEntry>> {
        let mut listing = BTreeMap::new();
        let mut cursor: Option<String> = None;

        loop {
            let page = self
                .retry_policy
                .execute("conversations_list", || {
                    self.web.conversations_list(LISTED_TYPES, cursor.as_deref())
                })
                .await?;

            for channel in page.items {
                let (k, other) = match key {
                    ChannelKey::Name => (channel.name.clone(), channel.id.clone()),
                    ChannelKey::Id => (channel.id.clone(), channel.name.clone()),
                };
                let entry = if only_counterpart {
                    ChannelEntry::Key(other)
                } else {
                    ChannelEntry::Record(channel)
                };
                listing.insert(k, entry);
            }

            if !advance_cursor(&mut cursor, page.next_cursor) {
                break;
            }
        }

        debug!(count = listing.len(), "Listed channels");
        Ok(listing)
    }

    /// Create a channel. Absent when the remote refuses (e.g. the name is
    /// taken); only transport-level failures are errors.
    pub async fn create(&self, name: &str, is_private: bool) -> DirectoryResult<Option<Channel>> {
        let result = self
            .retry_policy
            .execute("conversations_create", || {
                self.web.conversations_create(name, is_private)
            })
            .await;

        match result {
            Ok(channel) => {
                info!(channel_id = %channel.id, name, is_private, "Channel created");
                Ok(Some(channel))
            }
            Err(DirectoryError::Api { error, .. }) => {
                info!(name, error = %error, "Channel not created");
                Ok(None)
            }
            Err(DirectoryError::RemoteStatus { status, .. }) if status < 500 => {
                info!(name, status, "Channel not created");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Like [`create`](Self::create) but only the new channel's id.
    pub async fn create_id(&self, name: &str, is_private: bool) -> DirectoryResult<Option<String>> {
        Ok(self.create(name, is_private).await?.map(|c| c.id))
    }

    /// Every member id of a conversation, across all pages.
    pub async fn members(&self, channel_id: &str) -> DirectoryResult<Vec<String>> {
        let mut members = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let page = self
                .retry_policy
                .execute("conversations_members", || {
                    self.web.conversations_members(channel_id, cursor.as_deref())
                })
                .await?;
            members.extend(page.items);

            if !advance_cursor(&mut cursor, page.next_cursor) {
                break;
            }
        }

        Ok(members)
    }
}

/// Move `cursor` to `next`. False when paging is over, either because
/// there is no next cursor or because the remote handed back the one just used.
fn advance_cursor(cursor: &mut Option<String>, next: Option<String>) -> bool {
    match next {
        Some(next) if cursor.as_deref() == Some(next.as_str()) => {
            warn!(cursor = %next, "Cursor repeated, stopping pagination");
            false
        }
        Some(next) => {
            *cursor = Some(next);
            true
        }
        None => false,
    }
}
