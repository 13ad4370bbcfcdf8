//! # Optimistic Patches
//!
//! Partial updates are read-modify-write, so two writers can race. The
//! document key is watched first, every changed field is staged as its own
//! path write, then the whole batch commits or nothing does. A commit that
//! loses the race reports [`PatchOutcome::Conflict`] and is not retried here,
//! the caller decides.
//!
//! A patch touching `longitude` or `latitude` also rewrites `location` from
//! the merged coordinates, inside the same commit. If either coordinate ends
//! up missing, `location` is removed.
use serde_json::{Map, Value};
use tracing::info;

use crate::{
    index::{self, IndexStatus},
    store::{
        FieldWrite, LATITUDE_FIELD, LONGITUDE_FIELD, SightingStore, Snapshot, StoreResult,
        WatchedDocument,
    },
    utils::{LOCATION_FIELD, composite_location, is_empty_value},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchOutcome {
    Applied(IndexStatus),
    Conflict,
    NotFound,
}

/// One write per field. Empty values become removals.
pub fn field_writes(changes: &Map<String, Value>) -> Vec<FieldWrite> {
    changes
        .iter()
        .map(|(field, value)| {
            if is_empty_value(value) {
                FieldWrite::Remove {
                    field: field.clone(),
                }
            } else {
                FieldWrite::Set {
                    field: field.clone(),
                    value: value.clone(),
                }
            }
        })
        .collect()
}

/// `None` unless the patch moves a coordinate without naming `location` itself.
pub fn location_write(prior: &Snapshot, changes: &Map<String, Value>) -> Option<FieldWrite> {
    if changes.contains_key(LOCATION_FIELD)
        || !(changes.contains_key(LONGITUDE_FIELD) || changes.contains_key(LATITUDE_FIELD))
    {
        return None;
    }

    let merged = |field: &str, current: Option<f64>| match changes.get(field) {
        Some(value) => value.as_f64(),
        None => current,
    };

    let field = LOCATION_FIELD.to_string();

    match (
        merged(LONGITUDE_FIELD, prior.longitude),
        merged(LATITUDE_FIELD, prior.latitude),
    ) {
        (Some(longitude), Some(latitude)) => Some(FieldWrite::Set {
            field,
            value: composite_location(longitude, latitude),
        }),
        _ => Some(FieldWrite::Remove { field }),
    }
}

pub async fn apply_patch<S: SightingStore>(
    store: &S,
    id: &str,
    changes: &Map<String, Value>,
) -> StoreResult<PatchOutcome> {
    let watch = store.watch(id).await?;
    let Some(prior) = watch.prior().cloned() else {
        return Ok(PatchOutcome::NotFound);
    };

    let mut writes = field_writes(changes);
    writes.extend(location_write(&prior, changes));

    if !watch.commit(&writes).await? {
        info!(id, "Patch not applied, sighting changed concurrently");
        return Ok(PatchOutcome::Conflict);
    }

    let next = prior.tags.overlay(changes);
    let status = index::reconcile(store, id, &prior.tags, &next).await;

    Ok(PatchOutcome::Applied(status))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{memory::MemoryStore, store::Tags};

    fn object(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    async fn seeded() -> MemoryStore {
        let store = MemoryStore::default();
        let document = object(json!({ "id": "1", "title": "Tracks", "state": "Ohio", "summary": "Clear" }));

        store.write_document("1", &document).await.unwrap();
        index::reconcile(&store, "1", &Tags::default(), &Tags::from_document(&document)).await;

        store
    }

    #[test]
    fn test_field_writes() {
        let writes = field_writes(&object(json!({ "title": "Howl", "summary": null, "county": "" })));

        assert!(writes.contains(&FieldWrite::Set {
            field: "title".to_string(),
            value: json!("Howl")
        }));
        assert!(writes.contains(&FieldWrite::Remove {
            field: "summary".to_string()
        }));
        assert!(writes.contains(&FieldWrite::Remove {
            field: "county".to_string()
        }));
    }

    #[tokio::test]
    async fn test_applied_patch_touches_only_named_fields() {
        let store = seeded().await;

        let outcome = apply_patch(&store, "1", &object(json!({ "title": "Howl", "summary": null })))
            .await
            .unwrap();

        assert_eq!(outcome, PatchOutcome::Applied(IndexStatus::Current));
        assert_eq!(
            Value::Object(store.document("1").unwrap()),
            json!({ "id": "1", "title": "Howl", "state": "Ohio" })
        );
    }

    #[tokio::test]
    async fn test_patch_moves_state_membership() {
        let store = seeded().await;

        apply_patch(&store, "1", &object(json!({ "state": "Iowa" })))
            .await
            .unwrap();

        assert_eq!(
            store.sets_containing("1"),
            vec!["bigfoot:sightings", "bigfoot:sightings:byState:Iowa"]
        );
    }

    async fn placed() -> MemoryStore {
        let store = MemoryStore::default();
        crate::sightings::replace(
            &store,
            "1",
            json!({ "longitude": -122.4194, "latitude": 37.7749 }),
        )
        .await
        .unwrap();

        store
    }

    #[test]
    fn test_location_write() {
        let prior = Snapshot {
            longitude: Some(-122.4194),
            latitude: Some(37.7749),
            ..Default::default()
        };

        assert_eq!(location_write(&prior, &object(json!({ "title": "Howl" }))), None);
        assert_eq!(
            location_write(&prior, &object(json!({ "longitude": -100.0, "location": "1,2" }))),
            None
        );
        assert_eq!(
            location_write(&prior, &object(json!({ "latitude": 40.5 }))),
            Some(FieldWrite::Set {
                field: "location".to_string(),
                value: json!("-122.4194,40.5")
            })
        );
        assert_eq!(
            location_write(&prior, &object(json!({ "longitude": "" }))),
            Some(FieldWrite::Remove {
                field: "location".to_string()
            })
        );
        assert_eq!(
            location_write(
                &Snapshot::default(),
                &object(json!({ "longitude": 1.5, "latitude": 2.5 }))
            ),
            Some(FieldWrite::Set {
                field: "location".to_string(),
                value: json!("1.5,2.5")
            })
        );
    }

    #[tokio::test]
    async fn test_coordinate_patch_follows_location() {
        let store = placed().await;
        assert_eq!(store.document("1").unwrap()["location"], json!("-122.4194,37.7749"));

        apply_patch(&store, "1", &object(json!({ "longitude": -100.0 })))
            .await
            .unwrap();
        assert_eq!(store.document("1").unwrap()["location"], json!("-100,37.7749"));

        apply_patch(&store, "1", &object(json!({ "latitude": null })))
            .await
            .unwrap();
        assert_eq!(
            Value::Object(store.document("1").unwrap()),
            json!({ "id": "1", "longitude": -100.0 })
        );
    }

    #[tokio::test]
    async fn test_coordinate_patch_conflict_leaves_location() {
        let store = placed().await;
        store.before_commit(|documents| {
            documents.put(
                "1",
                object(json!({ "id": "1", "longitude": 5.0, "latitude": 6.0, "location": "5,6" })),
            );
        });

        let outcome = apply_patch(&store, "1", &object(json!({ "longitude": -100.0 })))
            .await
            .unwrap();

        assert_eq!(outcome, PatchOutcome::Conflict);
        assert_eq!(store.document("1").unwrap()["location"], json!("5,6"));
    }

    #[tokio::test]
    async fn test_missing_document() {
        let store = MemoryStore::default();

        let outcome = apply_patch(&store, "nope", &object(json!({ "title": "Howl" })))
            .await
            .unwrap();

        assert_eq!(outcome, PatchOutcome::NotFound);
        assert!(store.document("nope").is_none());
        assert!(store.sets_containing("nope").is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_write_aborts_whole_patch() {
        let store = seeded().await;
        store.before_commit(|documents| {
            documents.put("1", object(json!({ "id": "1", "title": "Other writer" })));
        });

        let outcome = apply_patch(
            &store,
            "1",
            &object(json!({ "title": "Howl", "county": "Summit", "state": "Iowa" })),
        )
        .await
        .unwrap();

        assert_eq!(outcome, PatchOutcome::Conflict);
        assert_eq!(
            Value::Object(store.document("1").unwrap()),
            json!({ "id": "1", "title": "Other writer" })
        );
        assert_eq!(
            store.sets_containing("1"),
            vec!["bigfoot:sightings", "bigfoot:sightings:byState:Ohio"]
        );
    }

    #[tokio::test]
    async fn test_racing_patches_one_wins() {
        let store = seeded().await;

        let first = store.watch("1").await.unwrap();
        let second = store.watch("1").await.unwrap();

        let first_writes = field_writes(&object(json!({ "title": "First", "county": "Summit" })));
        let second_writes = field_writes(&object(json!({ "title": "Second", "summary": null })));

        assert!(first.commit(&first_writes).await.unwrap());
        assert!(!second.commit(&second_writes).await.unwrap());

        assert_eq!(
            Value::Object(store.document("1").unwrap()),
            json!({ "id": "1", "title": "First", "county": "Summit", "state": "Ohio", "summary": "Clear" })
        );
    }

    #[tokio::test]
    async fn test_degraded_when_sets_fail() {
        let store = seeded().await;
        store.fail_sets(true);

        let outcome = apply_patch(&store, "1", &object(json!({ "state": "Iowa" })))
            .await
            .unwrap();

        assert!(matches!(
            outcome,
            PatchOutcome::Applied(IndexStatus::Stale { .. })
        ));
        assert_eq!(store.document("1").unwrap()["state"], json!("Iowa"));
    }
}
