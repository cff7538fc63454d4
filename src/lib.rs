//! Mail folder backend over a document database with attached payloads.
//!
//! A [`FolderDirectory`] lists the folders of one account from marker
//! objects, and hands out one [`MessageStore`] per folder. Each message
//! store caches the folder's UID to storage key mapping and keeps it in
//! step with the backing [`ObjectStore`].

pub mod config;
pub mod db;
pub mod directory;
pub mod error;
pub mod folder;
pub mod mail;
pub mod migration;
pub mod store;

pub use config::AppConfig;
pub use directory::{FolderDirectory, MailRepository};
pub use error::{Error, Result};
pub use folder::{ListingFilter, MailFolder, MessageStore, Uid, UID_VALIDITY};
pub use mail::{Flag, FlagSet};
pub use store::{MemoryObjectStore, Namespace, ObjectStore, SeaOrmObjectStore};
