//! # Membership Sets
//!
//! Hand-maintained secondary index: every sighting id sits in the global set,
//! plus one set per categorical value it currently carries (state, class).
//!
//! ## Protocol
//!
//! 1. Read the document's current tags (none if it does not exist yet)
//! 2. Write the document
//! 3. Add the id to the global set
//! 4. For each tag whose old value differs from the new one, leave the old set
//! 5. For each tag with a new value, join its set
//!
//! Deleting runs step 1, leaves the global set and every old set.
//!
//! ## Failures
//!
//! Set updates are best effort. The document write is never undone because a
//! set update failed; the caller gets [`IndexStatus::Stale`] instead.
//!
//! ## Known race
//!
//! Two writers changing the same sighting's tags at the same time can
//! interleave steps 1 to 5 and leave a stale membership behind. Only the patch
//! path reads the old tags under a watch.
use tracing::warn;

use crate::{
    keys::IndexSet,
    store::{SightingStore, Tags},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexStatus {
    Current,
    /// Document saved, `failures` set updates did not land.
    Stale { failures: usize },
}

impl IndexStatus {
    fn from_failures(failures: usize) -> Self {
        match failures {
            0 => IndexStatus::Current,
            failures => IndexStatus::Stale { failures },
        }
    }
}

/// Steps 3 to 5, for a document that moved from `prior` to `next`.
pub async fn reconcile<S: SightingStore>(
    store: &S,
    id: &str,
    prior: &Tags,
    next: &Tags,
) -> IndexStatus {
    let mut failures = 0;

    if !join(store, &IndexSet::All, id).await {
        failures += 1;
    }

    for (before, after) in prior.sets().into_iter().zip(next.sets()) {
        if let Some(before) = &before {
            if after.as_ref() != Some(before) && !leave(store, before, id).await {
                failures += 1;
            }
        }

        if let Some(after) = &after {
            if !join(store, after, id).await {
                failures += 1;
            }
        }
    }

    IndexStatus::from_failures(failures)
}

/// Removes `id` from the global set and from every set `prior` placed it in.
pub async fn retract<S: SightingStore>(store: &S, id: &str, prior: &Tags) -> IndexStatus {
    let mut failures = 0;

    if !leave(store, &IndexSet::All, id).await {
        failures += 1;
    }

    for set in prior.sets().into_iter().flatten() {
        if !leave(store, &set, id).await {
            failures += 1;
        }
    }

    IndexStatus::from_failures(failures)
}

async fn join<S: SightingStore>(store: &S, set: &IndexSet, id: &str) -> bool {
    match store.add_member(set, id).await {
        Ok(()) => true,
        Err(e) => {
            warn!(id, set = %set.key(), error = %e, "Failed to add sighting to set");
            false
        }
    }
}

async fn leave<S: SightingStore>(store: &S, set: &IndexSet, id: &str) -> bool {
    match store.remove_member(set, id).await {
        Ok(()) => true,
        Err(e) => {
            warn!(id, set = %set.key(), error = %e, "Failed to remove sighting from set");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;

    fn tags(state: Option<&str>, classification: Option<&str>) -> Tags {
        Tags {
            state: state.map(str::to_string),
            classification: classification.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn test_unset_before_and_after() {
        let store = MemoryStore::default();

        let status = reconcile(&store, "1", &Tags::default(), &Tags::default()).await;

        assert_eq!(status, IndexStatus::Current);
        assert_eq!(store.sets_containing("1"), vec!["bigfoot:sightings"]);
    }

    #[tokio::test]
    async fn test_set_after_only_adds() {
        let store = MemoryStore::default();

        reconcile(&store, "1", &Tags::default(), &tags(Some("Ohio"), None)).await;

        assert_eq!(
            store.sets_containing("1"),
            vec!["bigfoot:sightings", "bigfoot:sightings:byState:Ohio"]
        );
    }

    #[tokio::test]
    async fn test_changed_value_moves_membership() {
        let store = MemoryStore::default();
        let before = tags(Some("Ohio"), Some("Class A"));
        let after = tags(Some("Iowa"), Some("Class A"));

        reconcile(&store, "1", &Tags::default(), &before).await;
        reconcile(&store, "1", &before, &after).await;

        assert_eq!(
            store.sets_containing("1"),
            vec![
                "bigfoot:sightings",
                "bigfoot:sightings:byClass:Class A",
                "bigfoot:sightings:byState:Iowa",
            ]
        );
    }

    #[tokio::test]
    async fn test_cleared_value_only_removes() {
        let store = MemoryStore::default();
        let before = tags(Some("Ohio"), None);

        reconcile(&store, "1", &Tags::default(), &before).await;
        reconcile(&store, "1", &before, &Tags::default()).await;

        assert_eq!(store.sets_containing("1"), vec!["bigfoot:sightings"]);
    }

    #[tokio::test]
    async fn test_retract_leaves_everything() {
        let store = MemoryStore::default();
        let current = tags(Some("Ohio"), Some("Class B"));

        reconcile(&store, "1", &Tags::default(), &current).await;
        reconcile(&store, "2", &Tags::default(), &current).await;
        let status = retract(&store, "1", &current).await;

        assert_eq!(status, IndexStatus::Current);
        assert!(store.sets_containing("1").is_empty());
        assert_eq!(store.sets_containing("2").len(), 3);
    }

    #[tokio::test]
    async fn test_failures_are_reported_not_raised() {
        let store = MemoryStore::default();
        store.fail_sets(true);

        let status = reconcile(&store, "1", &Tags::default(), &tags(Some("Ohio"), None)).await;

        assert_eq!(status, IndexStatus::Stale { failures: 2 });
    }
}
