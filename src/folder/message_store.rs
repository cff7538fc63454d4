use std::sync::Arc;

use anyhow::anyhow;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use super::{IndexError, ListingFilter, MailFolder, MessageEntry, Uid, UidIndex};
use crate::error::{Error, Result};
use crate::mail::{ContentDigest, FlagSet, MailHeaders};
use crate::store::{
    message_filename, MetadataUpdate, Namespace, ObjectDocument, ObjectFilter, ObjectKind,
    ObjectSelector, ObjectStore,
};

/// Payload of a stored message together with its last modification time
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedMessage {
    pub content: Vec<u8>,
    pub modified_at: DateTime<Utc>,
}

/// UID-indexed view of one folder in the object store.
///
/// The index is built once by [`MessageStore::load`] and then kept in step
/// with every successful write. A failed backend call never changes it.
/// It holds every message of the folder; the listing filter only decides
/// which UIDs [`MessageStore::list_uids`] reports. Operations hold the index
/// lock for their whole duration, backend call included, so they are
/// serialized per folder.
pub struct MessageStore {
    namespace: Namespace,
    name: String,
    store: Arc<dyn ObjectStore>,
    listing: ListingFilter,
    index: Mutex<Option<UidIndex>>,
}

impl MessageStore {
    pub fn new(
        namespace: Namespace,
        name: impl Into<String>,
        store: Arc<dyn ObjectStore>,
        listing: ListingFilter,
    ) -> Self {
        Self {
            namespace,
            name: name.into(),
            store,
            listing,
            index: Mutex::new(None),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    pub async fn is_loaded(&self) -> bool {
        self.index.lock().await.is_some()
    }

    /// Build the UID index from the store. Does nothing if already loaded.
    #[tracing::instrument(skip(self), fields(account = %self.namespace.account(), folder = %self.name))]
    pub async fn load(&self) -> Result<()> {
        let mut guard = self.index.lock().await;
        if guard.is_some() {
            return Ok(());
        }

        let filter = ObjectFilter::new(&self.namespace, ObjectKind::Message).in_folder(&self.name);
        let objects = self
            .store
            .query(&filter)
            .await
            .map_err(|e| self.unavailable(e))?;

        let now = Utc::now();
        let mut index = UidIndex::new();
        for object in objects {
            let Some(uid) = object.document.uid else {
                tracing::warn!("Skipping message object {} without a UID", object.key);
                continue;
            };
            let listed = self
                .listing
                .admits(object.document.size, object.document.created_at, now);
            let entry = MessageEntry {
                flags: object.document.flags,
                key: object.key,
                listed,
            };
            if let Err(err) = index.insert(uid, entry) {
                tracing::warn!("Skipping message object {}: {}", object.key, err);
            }
        }

        tracing::info!(
            "Loaded {} messages, {} within listing limits",
            index.len(),
            index.listed_uids().len()
        );
        *guard = Some(index);
        Ok(())
    }

    /// Drop the index so the next [`MessageStore::load`] reads the store again.
    pub async fn discard(&self) {
        *self.index.lock().await = None;
    }

    /// UIDs within the listing limits, in ascending order
    pub async fn list_uids(&self) -> Result<Vec<Uid>> {
        let guard = self.index.lock().await;
        let index = guard.as_ref().ok_or_else(|| self.not_loaded())?;
        Ok(index.listed_uids())
    }

    #[tracing::instrument(skip(self), fields(account = %self.namespace.account(), folder = %self.name))]
    pub async fn fetch(&self, uid: Uid) -> Result<FetchedMessage> {
        let guard = self.index.lock().await;
        let index = guard.as_ref().ok_or_else(|| self.not_loaded())?;
        let key = index
            .get(uid)
            .map(|entry| entry.key)
            .ok_or_else(|| self.not_found(uid))?;

        let (content, object) = self
            .store
            .get_object(&ObjectSelector::Key(key))
            .await
            .map_err(|e| self.unavailable(e))?
            .ok_or_else(|| {
                self.unavailable(anyhow!("object {} of UID {} is missing from the store", key, uid))
            })?;

        Ok(FetchedMessage {
            content,
            modified_at: object.document.modified_at,
        })
    }

    /// Store a new message, or update the flags of a known one.
    ///
    /// Content of a known UID is never rewritten. Negative UIDs cannot be
    /// minted by this backend and are handed back untouched.
    #[tracing::instrument(skip(self, content), fields(account = %self.namespace.account(), folder = %self.name))]
    pub async fn store(&self, uid: Uid, content: &[u8], flags: FlagSet) -> Result<Uid> {
        if !uid.is_assigned() {
            tracing::warn!("Cannot assign UIDs, leaving message {} unsaved", uid);
            return Ok(uid);
        }

        let mut guard = self.index.lock().await;
        let index = guard.as_mut().ok_or_else(|| self.not_loaded())?;

        if index.contains(uid) {
            self.write_flags(index, uid, flags).await?;
            return Ok(uid);
        }

        let parsed = MailHeaders::parse(content);
        if parsed.malformed {
            tracing::warn!("Message {} has an unreadable header block", uid);
        }
        if let Some(ref raw) = parsed.rejected_date {
            tracing::warn!("Message {}: date not valid, value: {}", uid, raw);
        }

        let now = Utc::now();
        let digest = ContentDigest::compute(content);
        let listed = self.listing.admits(digest.size, now, now);
        let document = ObjectDocument::message(
            &self.namespace,
            &self.name,
            uid,
            flags.clone(),
            digest,
            parsed.headers,
            now,
        );
        let key = self
            .store
            .put_object(content, document)
            .await
            .map_err(|e| self.unavailable(e))?;

        index
            .insert(uid, MessageEntry { flags, key, listed })
            .map_err(|err| self.index_error(err))?;

        tracing::debug!("Stored message {} as object {}", uid, key);
        Ok(uid)
    }

    pub async fn flags(&self, uid: Uid) -> Result<FlagSet> {
        let guard = self.index.lock().await;
        let index = guard.as_ref().ok_or_else(|| self.not_loaded())?;
        index
            .get(uid)
            .map(|entry| entry.flags.clone())
            .ok_or_else(|| self.not_found(uid))
    }

    #[tracing::instrument(skip(self), fields(account = %self.namespace.account(), folder = %self.name))]
    pub async fn set_flags(&self, uid: Uid, flags: FlagSet) -> Result<()> {
        let mut guard = self.index.lock().await;
        let index = guard.as_mut().ok_or_else(|| self.not_loaded())?;
        self.write_flags(index, uid, flags).await
    }

    /// Renumber a message. The target UID must be free.
    #[tracing::instrument(skip(self), fields(account = %self.namespace.account(), folder = %self.name))]
    pub async fn rename_uid(&self, uid: Uid, new_uid: Uid) -> Result<()> {
        if !new_uid.is_assigned() {
            return Err(Error::InvalidUid {
                account: self.namespace.account().to_string(),
                folder: self.name.clone(),
                uid: new_uid,
            });
        }

        let mut guard = self.index.lock().await;
        let index = guard.as_mut().ok_or_else(|| self.not_loaded())?;

        let key = index
            .get(uid)
            .map(|entry| entry.key)
            .ok_or_else(|| self.not_found(uid))?;
        if uid == new_uid {
            return Ok(());
        }
        if index.contains(new_uid) {
            return Err(self.conflict(new_uid));
        }

        let update = MetadataUpdate::renumber(
            new_uid,
            message_filename(&self.namespace, &self.name, new_uid),
            Utc::now(),
        );
        self.store
            .update_metadata(&key, update)
            .await
            .map_err(|e| self.unavailable(e))?;

        index
            .rename(uid, new_uid)
            .map_err(|err| self.index_error(err))?;

        tracing::debug!("Renumbered message {} to {}", uid, new_uid);
        Ok(())
    }

    /// Delete a message. Unknown UIDs are ignored.
    #[tracing::instrument(skip(self), fields(account = %self.namespace.account(), folder = %self.name))]
    pub async fn delete(&self, uid: Uid) -> Result<()> {
        let mut guard = self.index.lock().await;
        let index = guard.as_mut().ok_or_else(|| self.not_loaded())?;

        let Some(key) = index.get(uid).map(|entry| entry.key) else {
            tracing::debug!("Message {} already absent", uid);
            return Ok(());
        };

        // The entry stays until the store confirms, otherwise the object
        // could be left behind with nothing pointing at it.
        self.store
            .delete_object(&key)
            .await
            .map_err(|e| self.unavailable(e))?;
        index.remove(uid);

        tracing::debug!("Deleted message {}", uid);
        Ok(())
    }

    async fn write_flags(&self, index: &mut UidIndex, uid: Uid, flags: FlagSet) -> Result<()> {
        let key = index
            .get(uid)
            .map(|entry| entry.key)
            .ok_or_else(|| self.not_found(uid))?;

        self.store
            .update_metadata(&key, MetadataUpdate::flags(flags.clone(), Utc::now()))
            .await
            .map_err(|e| self.unavailable(e))?;

        index
            .set_flags(uid, flags)
            .map_err(|err| self.index_error(err))
    }

    fn unavailable(&self, source: anyhow::Error) -> Error {
        Error::StoreUnavailable {
            account: self.namespace.account().to_string(),
            folder: self.name.clone(),
            source,
        }
    }

    fn not_found(&self, uid: Uid) -> Error {
        Error::NotFound {
            account: self.namespace.account().to_string(),
            folder: self.name.clone(),
            uid,
        }
    }

    fn not_loaded(&self) -> Error {
        Error::NotLoaded {
            account: self.namespace.account().to_string(),
            folder: self.name.clone(),
        }
    }

    fn conflict(&self, uid: Uid) -> Error {
        Error::Conflict {
            account: self.namespace.account().to_string(),
            folder: self.name.clone(),
            uid,
        }
    }

    fn index_error(&self, err: IndexError) -> Error {
        match err {
            IndexError::UidTaken(uid) => self.conflict(uid),
            IndexError::KeyTaken { key, owner } => Error::DuplicateStorageKey {
                account: self.namespace.account().to_string(),
                folder: self.name.clone(),
                key,
                owner,
            },
            IndexError::Missing(uid) => self.not_found(uid),
        }
    }
}

#[async_trait]
impl MailFolder for MessageStore {
    fn name(&self) -> &str {
        &self.name
    }

    async fn cache_message_list(&self) -> Result<()> {
        self.load().await
    }

    async fn message_list(&self) -> Result<Vec<Uid>> {
        self.list_uids().await
    }

    async fn message(&self, uid: Uid) -> Result<Vec<u8>> {
        Ok(self.fetch(uid).await?.content)
    }

    async fn message_time(&self, uid: Uid) -> Result<DateTime<Utc>> {
        Ok(self.fetch(uid).await?.modified_at)
    }

    async fn save_message(
        &self,
        uid: Uid,
        content: &[u8],
        flags: &FlagSet,
        received: Option<DateTime<Utc>>,
    ) -> Result<Uid> {
        if let Some(received) = received {
            tracing::trace!("Ignoring received time {} for message {}", received, uid);
        }
        self.store(uid, content, flags.clone()).await
    }

    async fn message_flags(&self, uid: Uid) -> Result<FlagSet> {
        self.flags(uid).await
    }

    async fn save_message_flags(&self, uid: Uid, flags: &FlagSet) -> Result<()> {
        self.set_flags(uid, flags.clone()).await
    }

    async fn change_message_uid(&self, uid: Uid, new_uid: Uid) -> Result<()> {
        self.rename_uid(uid, new_uid).await
    }

    async fn delete_message(&self, uid: Uid) -> Result<()> {
        self.delete(uid).await
    }
}
