//! Error types for the mail storage backend

use thiserror::Error;

use crate::folder::Uid;
use crate::store::StorageKey;

pub type Result<T> = std::result::Result<T, Error>;

/// Failures surfaced to the synchronization engine.
///
/// Every variant names the account and folder it happened in so the caller
/// can report it without extra context.
#[derive(Error, Debug)]
pub enum Error {
    #[error("object store unavailable ({account}/{folder}): {source}")]
    StoreUnavailable {
        account: String,
        folder: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("message UID {uid} not found in {account}/{folder}")]
    NotFound {
        account: String,
        folder: String,
        uid: Uid,
    },

    #[error("message list of {account}/{folder} has not been loaded")]
    NotLoaded { account: String, folder: String },

    #[error("message UID {uid} already exists in {account}/{folder}")]
    Conflict {
        account: String,
        folder: String,
        uid: Uid,
    },

    #[error("UID {uid} is not assigned and cannot be used in {account}/{folder}")]
    InvalidUid {
        account: String,
        folder: String,
        uid: Uid,
    },

    #[error("storage key {key} is already mapped to UID {owner} in {account}/{folder}")]
    DuplicateStorageKey {
        account: String,
        folder: String,
        key: StorageKey,
        owner: Uid,
    },

    #[error("folder '{folder}' does not exist for account {account}")]
    FolderNotFound { account: String, folder: String },

    #[error("invalid folder name '{folder}' for account {account}")]
    InvalidFolderName { account: String, folder: String },

    #[error("account {account:?} with prefix {prefix:?} cannot form a namespace: ':' is reserved")]
    InvalidNamespace {
        account: String,
        prefix: Option<String>,
    },

    #[error("not implemented: {operation} ({account}/{target})")]
    NotImplemented {
        operation: &'static str,
        account: String,
        target: String,
    },
}

impl Error {
    /// Whether retrying the same call later may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::StoreUnavailable { .. })
    }
}
