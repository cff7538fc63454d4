//! Capability interface to the document/blob store backing the mail folders.

pub mod memory;
pub mod postgres;

use std::fmt;

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::folder::Uid;
use crate::mail::{ContentDigest, FlagSet, MailHeaders};

pub use memory::{MemoryObjectStore, StoreOperation};
pub use postgres::SeaOrmObjectStore;

/// Identifier assigned by the store on first write.
///
/// The only handle that can address an object for update or delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StorageKey(Uuid);

impl StorageKey {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl From<Uuid> for StorageKey {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

const NAMESPACE_SEPARATOR: char = ':';

/// Scope shared by every document of one account.
///
/// Filters and documents can only be built from a `Namespace`, so every
/// read and write carries the scope key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Namespace {
    account: String,
    key: String,
}

impl Namespace {
    /// Neither part may contain `:`, which separates them in the key.
    pub fn new(account: impl Into<String>, prefix: Option<&str>) -> crate::error::Result<Self> {
        let account = account.into();
        let prefix = prefix.filter(|prefix| !prefix.is_empty());
        if account.contains(NAMESPACE_SEPARATOR)
            || prefix.map_or(false, |prefix| prefix.contains(NAMESPACE_SEPARATOR))
        {
            return Err(crate::error::Error::InvalidNamespace {
                account,
                prefix: prefix.map(str::to_string),
            });
        }

        let key = match prefix {
            Some(prefix) => format!("{}{}{}", prefix, NAMESPACE_SEPARATOR, account),
            None => account.clone(),
        };
        Ok(Self { account, key })
    }

    pub fn account(&self) -> &str {
        &self.account
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    Message,
    Directory,
}

impl ObjectKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectKind::Message => "M",
            ObjectKind::Directory => "D",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "M" => Ok(ObjectKind::Message),
            "D" => Ok(ObjectKind::Directory),
            other => bail!("unknown object kind '{}'", other),
        }
    }
}

/// Metadata document stored alongside every payload
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectDocument {
    pub namespace: String,
    pub account: String,
    /// Folder path this object belongs to (or describes, for markers)
    pub path: String,
    pub kind: ObjectKind,
    pub uid: Option<Uid>,
    /// Maildir-style label `<account>/<folder>/<uid>`
    pub filename: String,
    pub flags: FlagSet,
    pub size: u64,
    pub md5: String,
    pub sha256: String,
    pub headers: Option<MailHeaders>,
    /// Time of the first write; metadata updates never move it
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

impl ObjectDocument {
    pub fn message(
        namespace: &Namespace,
        folder: &str,
        uid: Uid,
        flags: FlagSet,
        digest: ContentDigest,
        headers: MailHeaders,
        modified_at: DateTime<Utc>,
    ) -> Self {
        Self {
            namespace: namespace.key().to_string(),
            account: namespace.account().to_string(),
            path: folder.to_string(),
            kind: ObjectKind::Message,
            uid: Some(uid),
            filename: message_filename(namespace, folder, uid),
            flags,
            size: digest.size,
            md5: digest.md5,
            sha256: digest.sha256,
            headers: Some(headers),
            created_at: modified_at,
            modified_at,
        }
    }

    /// Zero-length folder marker
    pub fn directory(namespace: &Namespace, path: &str, modified_at: DateTime<Utc>) -> Self {
        let digest = ContentDigest::compute(&[]);
        Self {
            namespace: namespace.key().to_string(),
            account: namespace.account().to_string(),
            path: path.to_string(),
            kind: ObjectKind::Directory,
            uid: None,
            filename: path.to_string(),
            flags: FlagSet::new(),
            size: 0,
            md5: digest.md5,
            sha256: digest.sha256,
            headers: None,
            created_at: modified_at,
            modified_at,
        }
    }
}

pub fn message_filename(namespace: &Namespace, folder: &str, uid: Uid) -> String {
    format!("{}/{}/{}", namespace.account(), folder, uid)
}

/// Metadata query, always scoped to one namespace and one object kind.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectFilter {
    namespace: String,
    kind: ObjectKind,
    path: Option<String>,
    uid: Option<Uid>,
}

impl ObjectFilter {
    pub fn new(namespace: &Namespace, kind: ObjectKind) -> Self {
        Self {
            namespace: namespace.key().to_string(),
            kind,
            path: None,
            uid: None,
        }
    }

    pub fn in_folder(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_uid(mut self, uid: Uid) -> Self {
        self.uid = Some(uid);
        self
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn kind(&self) -> ObjectKind {
        self.kind
    }

    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    pub fn uid(&self) -> Option<Uid> {
        self.uid
    }

    pub fn matches(&self, document: &ObjectDocument) -> bool {
        document.namespace == self.namespace
            && document.kind == self.kind
            && self.path.as_ref().map_or(true, |p| &document.path == p)
            && self.uid.map_or(true, |uid| document.uid == Some(uid))
    }
}

/// How to pick a single object for retrieval
#[derive(Debug, Clone, PartialEq)]
pub enum ObjectSelector {
    Key(StorageKey),
    /// Most recently modified object matching the filter
    Latest(ObjectFilter),
}

/// Partial metadata update. Fields left as `None` are not touched.
#[derive(Debug, Clone, PartialEq)]
pub struct MetadataUpdate {
    pub flags: Option<FlagSet>,
    pub uid: Option<Uid>,
    pub filename: Option<String>,
    pub modified_at: DateTime<Utc>,
}

impl MetadataUpdate {
    pub fn flags(flags: FlagSet, modified_at: DateTime<Utc>) -> Self {
        Self {
            flags: Some(flags),
            uid: None,
            filename: None,
            modified_at,
        }
    }

    pub fn renumber(uid: Uid, filename: String, modified_at: DateTime<Utc>) -> Self {
        Self {
            flags: None,
            uid: Some(uid),
            filename: Some(filename),
            modified_at,
        }
    }

    pub fn apply(&self, document: &mut ObjectDocument) {
        if let Some(ref flags) = self.flags {
            document.flags = flags.clone();
        }
        if let Some(uid) = self.uid {
            document.uid = Some(uid);
        }
        if let Some(ref filename) = self.filename {
            document.filename = filename.clone();
        }
        document.modified_at = self.modified_at;
    }
}

/// A metadata document together with the key it is stored under
#[derive(Debug, Clone, PartialEq)]
pub struct StoredObject {
    pub key: StorageKey,
    pub document: ObjectDocument,
}

/// Operations the mail layer needs from a document store with attached
/// payloads.
///
/// Implementations must be safe to share between every folder of a
/// repository. Any failure is reported as an error and never retried here.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Metadata-only search.
    async fn query(&self, filter: &ObjectFilter) -> Result<Vec<StoredObject>>;

    /// Write payload and document as one object, returning its new key.
    async fn put_object(&self, payload: &[u8], document: ObjectDocument) -> Result<StorageKey>;

    /// Fetch payload and metadata of a single object.
    async fn get_object(&self, selector: &ObjectSelector)
        -> Result<Option<(Vec<u8>, StoredObject)>>;

    /// Apply a partial metadata update, leaving the payload untouched.
    /// Fails if no object has this key.
    async fn update_metadata(&self, key: &StorageKey, update: MetadataUpdate) -> Result<()>;

    /// Remove an object and its payload.
    async fn delete_object(&self, key: &StorageKey) -> Result<()>;
}
