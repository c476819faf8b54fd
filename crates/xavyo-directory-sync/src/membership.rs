//! Group membership diffing.
//!
//! Pure computation: given current and desired member ids, produce the
//! single patch that turns one into the other.

use crate::models::{GroupMember, GroupPatch};
use std::collections::BTreeSet;

/// Ids to add and ids to remove. Never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MembershipDiff {
    pub to_add: BTreeSet<String>,
    pub to_remove: BTreeSet<String>,
}

impl MembershipDiff {
    /// Compute the diff.
    ///
    /// With `remove_unspecified`, every desired id is listed for adding and
    /// every current id outside `desired` is removed. Without it, the union
    /// of both sets is listed and nothing is removed.
    #[must_use]
    pub fn compute(
        current: &BTreeSet<String>,
        desired: &BTreeSet<String>,
        remove_unspecified: bool,
    ) -> Self {
        if remove_unspecified {
            Self {
                to_add: desired.clone(),
                to_remove: current.difference(desired).cloned().collect(),
            }
        } else {
            Self {
                to_add: desired.union(current).cloned().collect(),
                to_remove: BTreeSet::new(),
            }
        }
    }

    /// Membership after the diff is applied, assuming the remote treats
    /// re-adds and deletes of absent members as no-ops.
    #[must_use]
    pub fn apply_to(&self, current: &BTreeSet<String>) -> BTreeSet<String> {
        current
            .union(&self.to_add)
            .filter(|id| !self.to_remove.contains(*id))
            .cloned()
            .collect()
    }

    /// Patch body: plain entries for additions, delete-tagged entries for
    /// removals.
    #[must_use]
    pub fn to_patch(&self) -> GroupPatch {
        let members = self
            .to_add
            .iter()
            .map(GroupMember::add)
            .chain(self.to_remove.iter().map(GroupMember::delete))
            .collect();
        GroupPatch {
            display_name: None,
            members,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(list: &[&str]) -> BTreeSet<String> {
        list.iter().map(|s| (*s).to_string()).collect()
    }

    fn cases() -> Vec<(BTreeSet<String>, BTreeSet<String>)> {
        vec![
            (ids(&[]), ids(&[])),
            (ids(&[]), ids(&["U1", "U2"])),
            (ids(&["U1", "U2"]), ids(&[])),
            (ids(&["U1", "U2"]), ids(&["U2", "U3"])),
            (ids(&["U1", "U2", "U3"]), ids(&["U1", "U2", "U3"])),
            (ids(&["U4"]), ids(&["U1", "U2", "U3"])),
        ]
    }

    #[test]
    fn test_remove_unspecified_yields_exactly_desired() {
        for (current, desired) in cases() {
            let diff = MembershipDiff::compute(&current, &desired, true);
            assert_eq!(diff.apply_to(&current), desired, "current={current:?}");
        }
    }

    #[test]
    fn test_additive_yields_union_and_never_removes() {
        for (current, desired) in cases() {
            let diff = MembershipDiff::compute(&current, &desired, false);
            assert!(diff.to_remove.is_empty());
            let union: BTreeSet<String> = current.union(&desired).cloned().collect();
            assert_eq!(diff.apply_to(&current), union);
        }
    }

    #[test]
    fn test_same_sets_is_noop() {
        let members = ids(&["U1", "U2"]);
        let diff = MembershipDiff::compute(&members, &members, true);
        assert_eq!(diff.to_add, members);
        assert!(diff.to_remove.is_empty());
    }

    #[test]
    fn test_patch_tags_removals() {
        let diff = MembershipDiff::compute(&ids(&["U1", "U2"]), &ids(&["U2", "U3"]), true);
        let patch = diff.to_patch();

        let added: Vec<_> = patch
            .members
            .iter()
            .filter(|m| !m.is_delete())
            .map(|m| m.value.as_str())
            .collect();
        let deleted: Vec<_> = patch
            .members
            .iter()
            .filter(|m| m.is_delete())
            .map(|m| m.value.as_str())
            .collect();
        assert_eq!(added, vec!["U2", "U3"]);
        assert_eq!(deleted, vec!["U1"]);
        assert!(patch.display_name.is_none());
    }
}
