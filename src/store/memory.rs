//! In-memory object store
//!
//! Keeps every object in a map behind an async mutex. Individual operations
//! can be switched into a failing state to simulate an unreachable backend.

use std::collections::{BTreeMap, HashSet};

use anyhow::{bail, Result};
use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{
    MetadataUpdate, ObjectDocument, ObjectFilter, ObjectSelector, ObjectStore, StorageKey,
    StoredObject,
};

/// Backend operations that can be made to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOperation {
    Query,
    Put,
    Get,
    Update,
    Delete,
}

#[derive(Default)]
struct State {
    objects: BTreeMap<StorageKey, (Vec<u8>, ObjectDocument)>,
    failing: HashSet<StoreOperation>,
}

impl State {
    fn check(&self, operation: StoreOperation) -> Result<()> {
        if self.failing.contains(&operation) {
            bail!("object store unreachable during {:?}", operation);
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryObjectStore {
    state: Mutex<State>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every later call of `operation` fail until [`Self::recover`].
    pub async fn fail_on(&self, operation: StoreOperation) {
        self.state.lock().await.failing.insert(operation);
    }

    pub async fn recover(&self, operation: StoreOperation) {
        self.state.lock().await.failing.remove(&operation);
    }

    /// Number of stored objects, markers included
    pub async fn len(&self) -> usize {
        self.state.lock().await.objects.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn query(&self, filter: &ObjectFilter) -> Result<Vec<StoredObject>> {
        let state = self.state.lock().await;
        state.check(StoreOperation::Query)?;

        Ok(state
            .objects
            .iter()
            .filter(|(_, (_, document))| filter.matches(document))
            .map(|(key, (_, document))| StoredObject {
                key: *key,
                document: document.clone(),
            })
            .collect())
    }

    async fn put_object(&self, payload: &[u8], document: ObjectDocument) -> Result<StorageKey> {
        let mut state = self.state.lock().await;
        state.check(StoreOperation::Put)?;

        let key = StorageKey::generate();
        state.objects.insert(key, (payload.to_vec(), document));
        Ok(key)
    }

    async fn get_object(
        &self,
        selector: &ObjectSelector,
    ) -> Result<Option<(Vec<u8>, StoredObject)>> {
        let state = self.state.lock().await;
        state.check(StoreOperation::Get)?;

        let found = match selector {
            ObjectSelector::Key(key) => state.objects.get_key_value(key),
            ObjectSelector::Latest(filter) => state
                .objects
                .iter()
                .filter(|(_, (_, document))| filter.matches(document))
                .max_by_key(|(_, (_, document))| document.modified_at),
        };

        Ok(found.map(|(key, (payload, document))| {
            (
                payload.clone(),
                StoredObject {
                    key: *key,
                    document: document.clone(),
                },
            )
        }))
    }

    async fn update_metadata(&self, key: &StorageKey, update: MetadataUpdate) -> Result<()> {
        let mut state = self.state.lock().await;
        state.check(StoreOperation::Update)?;

        match state.objects.get_mut(key) {
            Some((_, document)) => {
                update.apply(document);
                Ok(())
            }
            None => bail!("object {} does not exist", key),
        }
    }

    async fn delete_object(&self, key: &StorageKey) -> Result<()> {
        let mut state = self.state.lock().await;
        state.check(StoreOperation::Delete)?;

        state.objects.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::folder::Uid;
    use crate::mail::{ContentDigest, FlagSet, MailHeaders};
    use crate::store::{Namespace, ObjectKind};
    use chrono::{Duration, Utc};

    fn message(namespace: &Namespace, folder: &str, uid: i64, payload: &[u8]) -> ObjectDocument {
        ObjectDocument::message(
            namespace,
            folder,
            Uid::from(uid),
            FlagSet::new(),
            ContentDigest::compute(payload),
            MailHeaders::default(),
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn test_query_never_crosses_accounts() {
        let store = MemoryObjectStore::new();
        let alice = Namespace::new("alice", None).unwrap();
        let bob = Namespace::new("bob", None).unwrap();

        store
            .put_object(b"a", message(&alice, "INBOX", 1, b"a"))
            .await
            .unwrap();
        store
            .put_object(b"b", message(&bob, "INBOX", 1, b"b"))
            .await
            .unwrap();

        let found = store
            .query(&ObjectFilter::new(&alice, ObjectKind::Message).in_folder("INBOX"))
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].document.account, "alice");
    }

    #[tokio::test]
    async fn test_get_latest_by_filter() {
        let store = MemoryObjectStore::new();
        let ns = Namespace::new("alice", None).unwrap();

        let mut older = message(&ns, "INBOX", 3, b"old");
        older.modified_at = Utc::now() - Duration::hours(1);
        store.put_object(b"old", older).await.unwrap();
        store
            .put_object(b"new", message(&ns, "INBOX", 3, b"new"))
            .await
            .unwrap();

        let filter = ObjectFilter::new(&ns, ObjectKind::Message).with_uid(Uid::from(3));
        let (payload, _) = store
            .get_object(&ObjectSelector::Latest(filter))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(payload, b"new");
    }

    #[tokio::test]
    async fn test_update_missing_object_fails() {
        let store = MemoryObjectStore::new();
        let update = MetadataUpdate::flags(FlagSet::new(), Utc::now());
        assert!(store
            .update_metadata(&StorageKey::generate(), update)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_failure_injection_and_recovery() {
        let store = MemoryObjectStore::new();
        let ns = Namespace::new("alice", None).unwrap();

        store.fail_on(StoreOperation::Put).await;
        assert!(store
            .put_object(b"x", message(&ns, "INBOX", 1, b"x"))
            .await
            .is_err());
        assert!(store.is_empty().await);

        store.recover(StoreOperation::Put).await;
        let key = store
            .put_object(b"x", message(&ns, "INBOX", 1, b"x"))
            .await
            .unwrap();
        assert_eq!(store.len().await, 1);

        store.delete_object(&key).await.unwrap();
        assert!(store.is_empty().await);
    }
}
