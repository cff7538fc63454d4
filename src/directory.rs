//! Folder directory of one account, kept as marker objects in the store.

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use crate::config::AppConfig;
use crate::error::{Error, Result};
use crate::folder::{ListingFilter, MailFolder, MessageStore};
use crate::store::{Namespace, ObjectDocument, ObjectFilter, ObjectKind, ObjectStore};

/// Repository operations the synchronization engine needs.
#[async_trait]
pub trait MailRepository: Send + Sync {
    type Folder: MailFolder;

    /// Hierarchy separator used in folder names
    fn separator(&self) -> char;

    async fn folders(&self) -> Result<Vec<Arc<Self::Folder>>>;

    async fn folder(&self, name: &str) -> Result<Arc<Self::Folder>>;

    async fn make_folder(&self, name: &str) -> Result<()>;

    /// Forget the cached folder list
    async fn forget_folders(&self);

    async fn delete_folder(&self, name: &str) -> Result<()>;
}

/// Folders of one account.
///
/// The folder list is scanned once and cached; creating a folder does not
/// update the cache, call [`FolderDirectory::invalidate`] to see it.
pub struct FolderDirectory {
    namespace: Namespace,
    separator: char,
    store: Arc<dyn ObjectStore>,
    listing: ListingFilter,
    folders: Mutex<Option<Vec<Arc<MessageStore>>>>,
}

impl FolderDirectory {
    pub fn new(
        namespace: Namespace,
        separator: char,
        store: Arc<dyn ObjectStore>,
        listing: ListingFilter,
    ) -> Self {
        tracing::debug!(
            "Folder directory for {} initialized, separator is {:?}",
            namespace.key(),
            separator
        );
        Self {
            namespace,
            separator,
            store,
            listing,
            folders: Mutex::new(None),
        }
    }

    pub fn from_config(config: &AppConfig, store: Arc<dyn ObjectStore>) -> Result<Self> {
        Ok(Self::new(
            config.namespace()?,
            config.repository.separator,
            store,
            config.account.listing_filter(),
        ))
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    /// All folders of the account, scanning the store on first use.
    pub async fn list_folders(&self) -> Result<Vec<Arc<MessageStore>>> {
        let mut guard = self.folders.lock().await;
        if let Some(ref folders) = *guard {
            return Ok(folders.clone());
        }

        let folders = self.scan().await?;
        *guard = Some(folders.clone());
        Ok(folders)
    }

    pub async fn get_folder(&self, name: &str) -> Result<Arc<MessageStore>> {
        self.list_folders()
            .await?
            .into_iter()
            .find(|folder| folder.name() == name)
            .ok_or_else(|| Error::FolderNotFound {
                account: self.namespace.account().to_string(),
                folder: name.to_string(),
            })
    }

    /// Write a folder marker. The cached folder list is left as is.
    pub async fn create_folder(&self, name: &str) -> Result<()> {
        if name.trim().is_empty() {
            return Err(Error::InvalidFolderName {
                account: self.namespace.account().to_string(),
                folder: name.to_string(),
            });
        }

        let marker = ObjectDocument::directory(&self.namespace, name, Utc::now());
        let key = self
            .store
            .put_object(&[], marker)
            .await
            .map_err(|source| Error::StoreUnavailable {
                account: self.namespace.account().to_string(),
                folder: name.to_string(),
                source,
            })?;

        tracing::info!(
            "Created folder '{}' for {} (marker {})",
            name,
            self.namespace.account(),
            key
        );
        Ok(())
    }

    pub async fn invalidate(&self) {
        *self.folders.lock().await = None;
    }

    /// Folder deletion is not supported by this backend.
    pub async fn delete_folder(&self, name: &str) -> Result<()> {
        tracing::warn!("Not yet implemented: delete folder {}", name);
        Err(Error::NotImplemented {
            operation: "delete folder",
            account: self.namespace.account().to_string(),
            target: name.to_string(),
        })
    }

    async fn scan(&self) -> Result<Vec<Arc<MessageStore>>> {
        let filter = ObjectFilter::new(&self.namespace, ObjectKind::Directory);
        let markers = self
            .store
            .query(&filter)
            .await
            .map_err(|source| Error::StoreUnavailable {
                account: self.namespace.account().to_string(),
                folder: String::from("*"),
                source,
            })?;

        // A folder created twice leaves two markers behind
        let paths: BTreeSet<String> = markers
            .into_iter()
            .map(|marker| marker.document.path)
            .collect();

        tracing::debug!(
            "Found {} folders for {}",
            paths.len(),
            self.namespace.account()
        );

        Ok(paths
            .into_iter()
            .map(|path| {
                Arc::new(MessageStore::new(
                    self.namespace.clone(),
                    path,
                    self.store.clone(),
                    self.listing,
                ))
            })
            .collect())
    }
}

#[async_trait]
impl MailRepository for FolderDirectory {
    type Folder = MessageStore;

    fn separator(&self) -> char {
        self.separator
    }

    async fn folders(&self) -> Result<Vec<Arc<MessageStore>>> {
        self.list_folders().await
    }

    async fn folder(&self, name: &str) -> Result<Arc<MessageStore>> {
        self.get_folder(name).await
    }

    async fn make_folder(&self, name: &str) -> Result<()> {
        self.create_folder(name).await
    }

    async fn forget_folders(&self) {
        self.invalidate().await
    }

    async fn delete_folder(&self, name: &str) -> Result<()> {
        FolderDirectory::delete_folder(self, name).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryObjectStore, StoreOperation};

    fn directory(backend: Arc<MemoryObjectStore>, account: &str) -> FolderDirectory {
        FolderDirectory::new(
            Namespace::new(account, None).unwrap(),
            '.',
            backend,
            ListingFilter::default(),
        )
    }

    fn names(folders: &[Arc<MessageStore>]) -> Vec<&str> {
        folders.iter().map(|folder| folder.name()).collect()
    }

    #[tokio::test]
    async fn test_created_folder_visible_after_invalidate() {
        let backend = Arc::new(MemoryObjectStore::new());
        let dir = directory(backend, "alice");

        assert!(dir.list_folders().await.unwrap().is_empty());

        dir.create_folder("Work").await.unwrap();
        // Still the cached listing
        assert!(dir.list_folders().await.unwrap().is_empty());

        dir.invalidate().await;
        let folders = dir.list_folders().await.unwrap();
        assert_eq!(names(&folders), vec!["Work"]);
    }

    #[tokio::test]
    async fn test_duplicate_markers_listed_once() {
        let backend = Arc::new(MemoryObjectStore::new());
        let dir = directory(backend, "alice");

        dir.create_folder("INBOX").await.unwrap();
        dir.create_folder("INBOX").await.unwrap();
        dir.create_folder("Archive.2024").await.unwrap();

        let folders = dir.list_folders().await.unwrap();
        assert_eq!(names(&folders), vec!["Archive.2024", "INBOX"]);
    }

    #[tokio::test]
    async fn test_get_folder() {
        let backend = Arc::new(MemoryObjectStore::new());
        let dir = directory(backend, "alice");
        dir.create_folder("INBOX").await.unwrap();

        let inbox = dir.get_folder("INBOX").await.unwrap();
        assert_eq!(inbox.name(), "INBOX");
        assert!(!inbox.is_loaded().await);

        // The same instance is handed out until the cache is dropped
        let again = dir.get_folder("INBOX").await.unwrap();
        assert!(Arc::ptr_eq(&inbox, &again));

        assert!(matches!(
            dir.get_folder("inbox").await,
            Err(Error::FolderNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_folders_are_per_account() {
        let backend = Arc::new(MemoryObjectStore::new());
        let alice = directory(backend.clone(), "alice");
        let bob = directory(backend, "bob");

        alice.create_folder("Secret").await.unwrap();
        assert!(bob.list_folders().await.unwrap().is_empty());
        assert!(matches!(
            bob.get_folder("Secret").await,
            Err(Error::FolderNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_markers_are_not_messages() {
        let backend = Arc::new(MemoryObjectStore::new());
        let dir = directory(backend, "alice");
        dir.create_folder("INBOX").await.unwrap();

        let inbox = dir.get_folder("INBOX").await.unwrap();
        inbox.load().await.unwrap();
        assert!(inbox.list_uids().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_scan_failure_is_not_cached() {
        let backend = Arc::new(MemoryObjectStore::new());
        let dir = directory(backend.clone(), "alice");
        dir.create_folder("INBOX").await.unwrap();

        backend.fail_on(StoreOperation::Query).await;
        assert!(matches!(
            dir.list_folders().await,
            Err(Error::StoreUnavailable { .. })
        ));

        backend.recover(StoreOperation::Query).await;
        assert_eq!(dir.list_folders().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_create_folder_errors() {
        let backend = Arc::new(MemoryObjectStore::new());
        let dir = directory(backend.clone(), "alice");

        assert!(matches!(
            dir.create_folder("  ").await,
            Err(Error::InvalidFolderName { .. })
        ));

        backend.fail_on(StoreOperation::Put).await;
        assert!(matches!(
            dir.create_folder("INBOX").await,
            Err(Error::StoreUnavailable { .. })
        ));
        assert!(backend.is_empty().await);
    }

    #[tokio::test]
    async fn test_delete_folder_is_not_implemented() {
        let backend = Arc::new(MemoryObjectStore::new());
        let dir = directory(backend, "alice");
        dir.create_folder("INBOX").await.unwrap();

        let repo: &dyn MailRepository<Folder = MessageStore> = &dir;
        assert_eq!(repo.separator(), '.');
        assert!(matches!(
            repo.delete_folder("INBOX").await,
            Err(Error::NotImplemented { .. })
        ));

        // The folder survives
        repo.forget_folders().await;
        assert_eq!(repo.folders().await.unwrap().len(), 1);
    }
}
