//! Team access log aggregation.
//!
//! Walks the 1-indexed pages of `team.accessLogs`, optionally keeps only
//! entries of selected users, and stops once enough entries are gathered
//! or the log is exhausted. Each page fetch is retried independently.

use crate::error::DirectoryResult;
use crate::models::AccessLogEntry;
use crate::retry::RetryPolicy;
use crate::users::{UserOperations, UserRef};
use crate::web::WebApiClient;
use std::collections::BTreeSet;
use tracing::{debug, warn};

/// Largest page the remote serves.
pub const MAX_PAGE_SIZE: usize = 1000;

/// Parameters of one aggregation run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccessLogQuery {
    /// Only entries before this Unix timestamp.
    pub before: Option<i64>,
    /// Maximum entries to return; all when absent.
    pub count: Option<usize>,
    /// Keep only entries of these user ids.
    pub user_ids: Option<BTreeSet<String>>,
}

impl AccessLogQuery {
    /// Page size requested from the remote.
    #[must_use]
    pub fn page_size(&self) -> usize {
        self.count.map_or(MAX_PAGE_SIZE, |c| c.min(MAX_PAGE_SIZE))
    }
}

/// Login summary for one user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessStats {
    pub user_id: String,
    /// Total logins across entries.
    pub count: u64,
    pub date_first: Option<i64>,
    pub date_last: Option<i64>,
}

impl AccessStats {
    /// Summarise the entries belonging to `user_id`. Absent when there are none.
    #[must_use]
    pub fn for_user(entries: &[AccessLogEntry], user_id: &str) -> Option<Self> {
        let mut stats: Option<Self> = None;
        for entry in entries.iter().filter(|e| e.user_id == user_id) {
            let s = stats.get_or_insert_with(|| Self {
                user_id: user_id.to_string(),
                count: 0,
                date_first: None,
                date_last: None,
            });
            s.count += entry.count;
            s.date_first = min_opt(s.date_first, entry.date_first);
            s.date_last = max_opt(s.date_last, entry.date_last);
        }
        stats
    }

    #[must_use]
    pub fn first_seen(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        self.date_first
            .and_then(|ts| chrono::DateTime::from_timestamp(ts, 0))
    }

    #[must_use]
    pub fn last_seen(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        self.date_last
            .and_then(|ts| chrono::DateTime::from_timestamp(ts, 0))
    }
}

fn min_opt(a: Option<i64>, b: Option<i64>) -> Option<i64> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

fn max_opt(a: Option<i64>, b: Option<i64>) -> Option<i64> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (a, b) => a.or(b),
    }
}

#[derive(Debug, Clone, Copy)]
pub struct AccessLogAggregator<'a> {
    web: &'a WebApiClient,
    retry_policy: &'a RetryPolicy,
    users: UserOperations<'a>,
}

impl<'a> AccessLogAggregator<'a> {
    #[must_use]
    pub fn new(
        web: &'a WebApiClient,
        retry_policy: &'a RetryPolicy,
        users: UserOperations<'a>,
    ) -> Self {
        Self {
            web,
            retry_policy,
            users,
        }
    }

    /// Gather entries page by page.
    ///
    /// Stops on the first empty page, or as soon as the running total
    /// exceeds `count`; the result is then cut down to `count`.
    pub async fn collect(&self, query: &AccessLogQuery) -> DirectoryResult<Vec<AccessLogEntry>> {
        let page_size = query.page_size();
        let mut gathered: Vec<AccessLogEntry> = Vec::new();
        let mut page: u32 = 1;

        loop {
            let entries = self
                .retry_policy
                .execute("team_access_logs", || {
                    self.web.team_access_logs(query.before, page_size, page)
                })
                .await?;

            if entries.is_empty() {
                debug!(page, "Access log exhausted");
                break;
            }

            match &query.user_ids {
                Some(user_ids) => gathered.extend(
                    entries
                        .into_iter()
                        .filter(|e| user_ids.contains(&e.user_id)),
                ),
                None => gathered.extend(entries),
            }

            if query.count.is_some_and(|count| gathered.len() > count) {
                break;
            }
            page += 1;
        }

        if let Some(count) = query.count {
            gathered.truncate(count);
        }
        debug!(pages = page, entries = gathered.len(), "Access logs collected");
        Ok(gathered)
    }

    /// Turn user references into an id filter. Unknown users are dropped.
    pub async fn resolve_user_filter(
        &self,
        users: &[UserRef],
    ) -> DirectoryResult<BTreeSet<String>> {
        let mut ids = BTreeSet::new();
        for user in users {
            match user {
                UserRef::Id(id) => {
                    ids.insert(id.clone());
                }
                other => match self.users.lookup(other).await? {
                    Some(found) => {
                        ids.insert(found.id);
                    }
                    None => warn!(user = %other, "Unknown user dropped from access log filter"),
                },
            }
        }
        Ok(ids)
    }

    /// Login summary of one user over the whole log.
    pub async fn user_stats(&self, user_id: &str) -> DirectoryResult<Option<AccessStats>> {
        let query = AccessLogQuery {
            user_ids: Some(BTreeSet::from([user_id.to_string()])),
            ..Default::default()
        };
        let entries = self.collect(&query).await?;
        Ok(AccessStats::for_user(&entries, user_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(user_id: &str, first: i64, last: i64, count: u64) -> AccessLogEntry {
        AccessLogEntry {
            user_id: user_id.to_string(),
            username: None,
            date_first: Some(first),
            date_last: Some(last),
            count,
            ip: None,
            user_agent: None,
            isp: None,
            country: None,
            region: None,
        }
    }

    #[test]
    fn test_page_size() {
        assert_eq!(AccessLogQuery::default().page_size(), MAX_PAGE_SIZE);
        let small = AccessLogQuery {
            count: Some(20),
            ..Default::default()
        };
        assert_eq!(small.page_size(), 20);
        let large = AccessLogQuery {
            count: Some(1500),
            ..Default::default()
        };
        assert_eq!(large.page_size(), MAX_PAGE_SIZE);
    }

    #[test]
    fn test_stats_for_user() {
        let entries = vec![
            entry("U1", 200, 300, 2),
            entry("U2", 100, 900, 7),
            entry("U1", 150, 250, 3),
        ];
        let stats = AccessStats::for_user(&entries, "U1").unwrap();
        assert_eq!(stats.count, 5);
        assert_eq!(stats.date_first, Some(150));
        assert_eq!(stats.date_last, Some(300));

        assert!(AccessStats::for_user(&entries, "U3").is_none());
    }

    #[test]
    fn test_min_max_opt() {
        assert_eq!(min_opt(None, Some(3)), Some(3));
        assert_eq!(min_opt(Some(1), Some(3)), Some(1));
        assert_eq!(max_opt(Some(1), None), Some(1));
        assert_eq!(max_opt(None, None), None);
    }
}
