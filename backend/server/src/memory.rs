use std::{
    collections::{BTreeSet, HashMap},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use parking_lot::Mutex;
use serde_json::{Map, Value};

use crate::{
    keys::IndexSet,
    store::{FieldWrite, SightingStore, Snapshot, StoreError, StoreResult, Tags, WatchedDocument},
};

type Hook = Box<dyn FnOnce(&mut Documents) + Send>;

/// Every write bumps the document's version. A watch remembers the version
/// it saw and a commit only goes through if it is still current.
#[derive(Default)]
pub struct Documents {
    documents: HashMap<String, Map<String, Value>>,
    versions: HashMap<String, u64>,
    sets: HashMap<String, BTreeSet<String>>,
}

impl Documents {
    fn version(&self, id: &str) -> u64 {
        self.versions.get(id).copied().unwrap_or(0)
    }

    fn bump(&mut self, id: &str) {
        *self.versions.entry(id.to_string()).or_insert(0) += 1;
    }

    pub fn put(&mut self, id: &str, document: Map<String, Value>) {
        self.documents.insert(id.to_string(), document);
        self.bump(id);
    }
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Documents>>,
    fail_sets: Arc<AtomicBool>,
    before_commit: Arc<Mutex<Option<Hook>>>,
}

impl MemoryStore {
    pub fn fail_sets(&self, fail: bool) {
        self.fail_sets.store(fail, Ordering::SeqCst);
    }

    /// Runs once, inside the next commit, before the version check.
    pub fn before_commit(&self, hook: impl FnOnce(&mut Documents) + Send + 'static) {
        *self.before_commit.lock() = Some(Box::new(hook));
    }

    pub fn document(&self, id: &str) -> Option<Map<String, Value>> {
        self.inner.lock().documents.get(id).cloned()
    }

    /// Sorted keys of every set holding `id`.
    pub fn sets_containing(&self, id: &str) -> Vec<String> {
        let inner = self.inner.lock();
        let mut keys: Vec<String> = inner
            .sets
            .iter()
            .filter(|(_, members)| members.contains(id))
            .map(|(key, _)| key.clone())
            .collect();
        keys.sort();

        keys
    }

    fn check_sets(&self) -> StoreResult<()> {
        if self.fail_sets.load(Ordering::SeqCst) {
            return Err(StoreError::Reply("set update refused".to_string()));
        }

        Ok(())
    }
}

impl SightingStore for MemoryStore {
    type Watch = MemoryWatch;

    async fn read_document(&self, id: &str) -> StoreResult<Option<Value>> {
        Ok(self.document(id).map(Value::Object))
    }

    async fn read_documents(&self, ids: &[String]) -> StoreResult<Vec<Value>> {
        let inner = self.inner.lock();

        Ok(ids
            .iter()
            .filter_map(|id| inner.documents.get(id).cloned().map(Value::Object))
            .collect())
    }

    async fn read_tags(&self, id: &str) -> StoreResult<Option<Tags>> {
        Ok(self.document(id).as_ref().map(Tags::from_document))
    }

    async fn write_document(&self, id: &str, document: &Map<String, Value>) -> StoreResult<()> {
        self.inner.lock().put(id, document.clone());

        Ok(())
    }

    async fn delete_document(&self, id: &str) -> StoreResult<bool> {
        let mut inner = self.inner.lock();
        let removed = inner.documents.remove(id).is_some();
        inner.bump(id);

        Ok(removed)
    }

    async fn add_member(&self, set: &IndexSet, id: &str) -> StoreResult<()> {
        self.check_sets()?;
        self.inner
            .lock()
            .sets
            .entry(set.key())
            .or_default()
            .insert(id.to_string());

        Ok(())
    }

    async fn remove_member(&self, set: &IndexSet, id: &str) -> StoreResult<()> {
        self.check_sets()?;
        if let Some(members) = self.inner.lock().sets.get_mut(&set.key()) {
            members.remove(id);
        }

        Ok(())
    }

    async fn members(&self, sets: &[IndexSet]) -> StoreResult<Vec<String>> {
        let inner = self.inner.lock();
        let Some((first, rest)) = sets.split_first() else {
            return Ok(Vec::new());
        };

        let empty = BTreeSet::new();
        let lookup = |set: &IndexSet| inner.sets.get(&set.key()).unwrap_or(&empty);

        Ok(lookup(first)
            .iter()
            .filter(|id| rest.iter().all(|set| lookup(set).contains(*id)))
            .cloned()
            .collect())
    }

    async fn watch(&self, id: &str) -> StoreResult<MemoryWatch> {
        let inner = self.inner.lock();

        Ok(MemoryWatch {
            store: self.clone(),
            id: id.to_string(),
            version: inner.version(id),
            prior: inner.documents.get(id).map(Snapshot::from_document),
        })
    }
}

pub struct MemoryWatch {
    store: MemoryStore,
    id: String,
    version: u64,
    prior: Option<Snapshot>,
}

impl WatchedDocument for MemoryWatch {
    fn prior(&self) -> Option<&Snapshot> {
        self.prior.as_ref()
    }

    async fn commit(self, writes: &[FieldWrite]) -> StoreResult<bool> {
        let hook = self.store.before_commit.lock().take();
        let mut inner = self.store.inner.lock();

        if let Some(hook) = hook {
            hook(&mut *inner);
        }

        if inner.version(&self.id) != self.version {
            return Ok(false);
        }

        let Some(document) = inner.documents.get_mut(&self.id) else {
            return Err(StoreError::Reply(format!("no document {}", self.id)));
        };

        for write in writes {
            match write {
                FieldWrite::Set { field, value } => {
                    document.insert(field.clone(), value.clone());
                }
                FieldWrite::Remove { field } => {
                    document.remove(field);
                }
            }
        }
        inner.bump(&self.id);

        Ok(true)
    }
}
