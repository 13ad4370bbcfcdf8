//! Whole-record lifecycle. Each mutation writes the document first, then
//! brings the membership sets in line with what was stored.
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::{
    error::AppError,
    index::{self, IndexStatus},
    keys::IndexSet,
    store::{SightingStore, StoreResult, Tags},
    utils::document_from_body,
};

/// Time-ordered, so ids sort by creation.
pub fn new_id() -> String {
    Uuid::now_v7().to_string()
}

pub async fn create<S: SightingStore>(store: &S, body: Value) -> Result<(String, IndexStatus), AppError> {
    let id = new_id();
    let document = document_from_body(body, &id)?;

    let status = save(store, &id, &Tags::default(), &document).await?;

    Ok((id, status))
}

/// Create or replace. Concurrent replaces of the same id race, last one wins.
pub async fn replace<S: SightingStore>(store: &S, id: &str, body: Value) -> Result<IndexStatus, AppError> {
    let document = document_from_body(body, id)?;
    let prior = store.read_tags(id).await?.unwrap_or_default();

    Ok(save(store, id, &prior, &document).await?)
}

pub async fn remove<S: SightingStore>(store: &S, id: &str) -> StoreResult<IndexStatus> {
    let prior = store.read_tags(id).await?.unwrap_or_default();
    store.delete_document(id).await?;

    Ok(index::retract(store, id, &prior).await)
}

/// Documents whose ids sit in every one of `sets`.
pub async fn lookup<S: SightingStore>(store: &S, sets: &[IndexSet]) -> StoreResult<Vec<Value>> {
    let ids = store.members(sets).await?;

    store.read_documents(&ids).await
}

async fn save<S: SightingStore>(
    store: &S,
    id: &str,
    prior: &Tags,
    document: &Map<String, Value>,
) -> StoreResult<IndexStatus> {
    store.write_document(id, document).await?;

    Ok(index::reconcile(store, id, prior, &Tags::from_document(document)).await)
}
