//! # Store
//!
//! The seam between sighting bookkeeping and the backing database.
//!
//! Documents are JSON objects addressed by sighting id. Membership sets are
//! addressed by [`IndexSet`]. Partial updates go through [`SightingStore::watch`],
//! which hands back a version-checked handle: stage field writes, then commit.
//! A commit either applies every write or none of them.
use std::future::Future;

use serde_json::{Map, Value};
use thiserror::Error;

use crate::keys::IndexSet;

pub const STATE_FIELD: &str = "state";
pub const CLASS_FIELD: &str = "classification";
pub const LONGITUDE_FIELD: &str = "longitude";
pub const LATITUDE_FIELD: &str = "latitude";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Malformed document: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unexpected reply: {0}")]
    Reply(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Categorical fields that own a membership set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tags {
    pub state: Option<String>,
    pub classification: Option<String>,
}

impl Tags {
    pub fn from_document(document: &Map<String, Value>) -> Self {
        Self {
            state: document.get(STATE_FIELD).and_then(tag_value),
            classification: document.get(CLASS_FIELD).and_then(tag_value),
        }
    }

    /// Tags after `changes` land on a document currently tagged `self`.
    /// A key present with a non-string or empty value clears the tag.
    pub fn overlay(&self, changes: &Map<String, Value>) -> Self {
        let pick = |field: &str, current: &Option<String>| match changes.get(field) {
            Some(value) => tag_value(value),
            None => current.clone(),
        };

        Self {
            state: pick(STATE_FIELD, &self.state),
            classification: pick(CLASS_FIELD, &self.classification),
        }
    }

    /// Per-field sets, paired positionally so two `Tags` can be compared.
    pub fn sets(&self) -> [Option<IndexSet>; 2] {
        [
            self.state.clone().map(IndexSet::ByState),
            self.classification.clone().map(IndexSet::ByClass),
        ]
    }
}

/// What a patch needs from the stored document before it commits.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    pub tags: Tags,
    pub longitude: Option<f64>,
    pub latitude: Option<f64>,
}

impl Snapshot {
    pub fn from_document(document: &Map<String, Value>) -> Self {
        Self {
            tags: Tags::from_document(document),
            longitude: document.get(LONGITUDE_FIELD).and_then(Value::as_f64),
            latitude: document.get(LATITUDE_FIELD).and_then(Value::as_f64),
        }
    }
}

fn tag_value(value: &Value) -> Option<String> {
    value
        .as_str()
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// One staged change to a single top-level field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldWrite {
    Set { field: String, value: Value },
    Remove { field: String },
}

impl FieldWrite {
    pub fn field(&self) -> &str {
        match self {
            FieldWrite::Set { field, .. } | FieldWrite::Remove { field } => field,
        }
    }

    pub fn path(&self) -> String {
        format!("$.{}", self.field())
    }
}

pub trait SightingStore: Send + Sync {
    type Watch: WatchedDocument;

    fn read_document(&self, id: &str) -> impl Future<Output = StoreResult<Option<Value>>> + Send;

    /// Missing ids are skipped.
    fn read_documents(&self, ids: &[String]) -> impl Future<Output = StoreResult<Vec<Value>>> + Send;

    /// `None` when the document does not exist.
    fn read_tags(&self, id: &str) -> impl Future<Output = StoreResult<Option<Tags>>> + Send;

    /// Whole-document overwrite, last writer wins.
    fn write_document(
        &self,
        id: &str,
        document: &Map<String, Value>,
    ) -> impl Future<Output = StoreResult<()>> + Send;

    fn delete_document(&self, id: &str) -> impl Future<Output = StoreResult<bool>> + Send;

    fn add_member(&self, set: &IndexSet, id: &str) -> impl Future<Output = StoreResult<()>> + Send;

    fn remove_member(&self, set: &IndexSet, id: &str) -> impl Future<Output = StoreResult<()>> + Send;

    /// Ids present in every one of `sets`.
    fn members(&self, sets: &[IndexSet]) -> impl Future<Output = StoreResult<Vec<String>>> + Send;

    /// Starts change detection on the document and reads its tags under it.
    fn watch(&self, id: &str) -> impl Future<Output = StoreResult<Self::Watch>> + Send;
}

pub trait WatchedDocument: Send {
    /// Document state when the watch began, `None` when it did not exist.
    fn prior(&self) -> Option<&Snapshot>;

    /// `Ok(false)` when the document changed since the watch began. Nothing
    /// was applied in that case.
    fn commit(self, writes: &[FieldWrite]) -> impl Future<Output = StoreResult<bool>> + Send;
}
