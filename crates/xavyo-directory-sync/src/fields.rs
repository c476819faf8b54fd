//! Custom profile field cache.
//!
//! Maps human-readable field labels to provider field descriptors. The
//! schema is fetched lazily on first use and then held until [`FieldCache::refresh`]
//! or [`FieldCache::invalidate`] is called; there is no automatic expiry.
//!
//! Readers always see a complete snapshot: a refresh builds the new map
//! off to the side and swaps the `Arc` in one write.

use crate::error::DirectoryResult;
use crate::models::{CustomFieldValue, FieldDescriptor};
use crate::retry::RetryPolicy;
use crate::web::WebApiClient;
use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

/// Label-indexed field descriptors.
pub type FieldMap = HashMap<String, FieldDescriptor>;

/// What to do when the schema fetch fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FieldFetchMode {
    /// Degrade to an empty mapping; fields are simply absent downstream.
    #[default]
    Silent,
    /// Propagate the failure to the caller.
    Strict,
}

impl FromStr for FieldFetchMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "silent" => Ok(Self::Silent),
            "strict" => Ok(Self::Strict),
            other => Err(format!("unknown field fetch mode '{other}'")),
        }
    }
}

/// Explicitly owned cache of the workspace's custom profile fields.
///
/// Clones share the same snapshot.
#[derive(Debug, Clone)]
pub struct FieldCache {
    web: WebApiClient,
    retry_policy: RetryPolicy,
    mode: FieldFetchMode,
    snapshot: Arc<RwLock<Option<Arc<FieldMap>>>>,
    /// Serializes fetches so concurrent first uses trigger one request.
    refresh_lock: Arc<Mutex<()>>,
}

impl FieldCache {
    #[must_use]
    pub fn new(web: WebApiClient, retry_policy: RetryPolicy, mode: FieldFetchMode) -> Self {
        Self {
            web,
            retry_policy,
            mode,
            snapshot: Arc::new(RwLock::new(None)),
            refresh_lock: Arc::new(Mutex::new(())),
        }
    }

    #[must_use]
    pub fn mode(&self) -> FieldFetchMode {
        self.mode
    }

    /// Whether a snapshot (possibly empty) is loaded.
    pub async fn is_initialized(&self) -> bool {
        self.snapshot.read().await.is_some()
    }

    /// Look up a field by label, fetching the schema first if needed.
    ///
    /// # Errors
    ///
    /// Only in [`FieldFetchMode::Strict`], when the schema fetch fails.
    pub async fn resolve(&self, label: &str) -> DirectoryResult<Option<FieldDescriptor>> {
        Ok(self.fields().await?.get(label).cloned())
    }

    /// Current snapshot, fetching it once if the cache is uninitialized.
    ///
    /// # Errors
    ///
    /// Only in [`FieldFetchMode::Strict`], when the schema fetch fails.
    pub async fn fields(&self) -> DirectoryResult<Arc<FieldMap>> {
        if let Some(fields) = self.snapshot.read().await.as_ref() {
            return Ok(Arc::clone(fields));
        }

        let _guard = self.refresh_lock.lock().await;
        // Another task may have loaded it while we waited.
        if let Some(fields) = self.snapshot.read().await.as_ref() {
            return Ok(Arc::clone(fields));
        }
        self.load().await
    }

    /// Unconditionally re-fetch the schema and replace the snapshot.
    ///
    /// # Errors
    ///
    /// Only in [`FieldFetchMode::Strict`], when the schema fetch fails; the
    /// previous snapshot is kept in that case.
    pub async fn refresh(&self) -> DirectoryResult<Arc<FieldMap>> {
        let _guard = self.refresh_lock.lock().await;
        self.load().await
    }

    /// Drop the snapshot so the next use fetches again.
    pub async fn invalidate(&self) {
        let _guard = self.refresh_lock.lock().await;
        *self.snapshot.write().await = None;
    }

    /// Translate label-keyed values into the id-keyed form the remote
    /// expects. Labels with no matching field are skipped.
    ///
    /// # Errors
    ///
    /// Only in [`FieldFetchMode::Strict`], when the schema fetch fails.
    pub async fn translate(
        &self,
        values: &BTreeMap<String, String>,
    ) -> DirectoryResult<BTreeMap<String, CustomFieldValue>> {
        if values.is_empty() {
            return Ok(BTreeMap::new());
        }
        let fields = self.fields().await?;
        let mut translated = BTreeMap::new();
        for (label, value) in values {
            match fields.get(label) {
                Some(descriptor) => {
                    translated.insert(descriptor.id.clone(), CustomFieldValue::new(value.clone()));
                }
                None => debug!(label = %label, "No custom field with this label, skipping"),
            }
        }
        Ok(translated)
    }

    /// Fetch and store. Caller holds `refresh_lock`.
    async fn load(&self) -> DirectoryResult<Arc<FieldMap>> {
        let fetched = self
            .retry_policy
            .execute("team_profile_get", || self.web.team_profile_get())
            .await;

        let fields = match fetched {
            Ok(descriptors) => index_by_label(descriptors),
            Err(e) if self.mode == FieldFetchMode::Silent => {
                warn!(error = %e, "Custom field fetch failed, continuing without custom fields");
                FieldMap::new()
            }
            Err(e) => return Err(e),
        };

        info!(count = fields.len(), "Custom field cache loaded");
        let fields = Arc::new(fields);
        *self.snapshot.write().await = Some(Arc::clone(&fields));
        Ok(fields)
    }
}

/// Index descriptors by label. On duplicate labels the later one wins.
fn index_by_label(descriptors: Vec<FieldDescriptor>) -> FieldMap {
    descriptors
        .into_iter()
        .map(|d| (d.label.clone(), d))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(id: &str, label: &str) -> FieldDescriptor {
        FieldDescriptor {
            id: id.to_string(),
            label: label.to_string(),
            field_type: Some("text".to_string()),
            hint: None,
            ordering: None,
            possible_values: None,
            is_hidden: None,
        }
    }

    #[test]
    fn test_index_by_label_last_wins() {
        let map = index_by_label(vec![
            descriptor("Xf1", "Department"),
            descriptor("Xf2", "Title"),
            descriptor("Xf3", "Department"),
        ]);
        assert_eq!(map.len(), 2);
        assert_eq!(map["Department"].id, "Xf3");
        assert_eq!(map["Title"].id, "Xf2");
    }

    #[test]
    fn test_fetch_mode_from_str() {
        assert_eq!("silent".parse::<FieldFetchMode>(), Ok(FieldFetchMode::Silent));
        assert_eq!(" STRICT ".parse::<FieldFetchMode>(), Ok(FieldFetchMode::Strict));
        assert!("loud".parse::<FieldFetchMode>().is_err());
        assert_eq!(FieldFetchMode::default(), FieldFetchMode::Silent);
    }
}
