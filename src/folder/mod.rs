//! Mail folders as seen by the synchronization engine.

mod index;
pub mod message_store;

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::mail::FlagSet;

pub use index::{IndexError, MessageEntry, UidIndex};
pub use message_store::{FetchedMessage, MessageStore};

/// UID validity reported for every folder.
///
/// The backing store has no generation counter, so the value never changes
/// for the lifetime of a repository configuration.
pub const UID_VALIDITY: u32 = 27;

/// Message identifier assigned by the synchronization engine.
///
/// Negative values are provisional and are never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Uid(i64);

impl Uid {
    pub fn value(self) -> i64 {
        self.0
    }

    pub fn is_assigned(self) -> bool {
        self.0 >= 0
    }
}

impl From<i64> for Uid {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl fmt::Display for Uid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Per-account limits on which messages a folder lists.
///
/// Messages outside the limits stay in the folder's index, so they still
/// count as present for writes, but are left out of the message list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListingFilter {
    /// Hide messages first stored longer ago than this
    pub max_age: Option<Duration>,
    /// Hide messages with a larger payload, in bytes
    pub max_size: Option<u64>,
}

impl ListingFilter {
    pub fn cutoff(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.max_age.map(|age| now - age)
    }

    pub fn admits(&self, size: u64, created_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        self.max_size.map_or(true, |max| size <= max)
            && self.cutoff(now).map_or(true, |cutoff| created_at >= cutoff)
    }
}

/// Folder operations driven by the synchronization engine, one message at
/// a time.
#[async_trait]
pub trait MailFolder: Send + Sync {
    fn name(&self) -> &str;

    fn uid_validity(&self) -> u32 {
        UID_VALIDITY
    }

    /// Build the UID index. Later calls are no-ops.
    async fn cache_message_list(&self) -> Result<()>;

    async fn message_list(&self) -> Result<Vec<Uid>>;

    async fn message(&self, uid: Uid) -> Result<Vec<u8>>;

    async fn message_time(&self, uid: Uid) -> Result<DateTime<Utc>>;

    /// Store a message, returning the UID it was stored under. A negative
    /// UID comes back unchanged with nothing written.
    async fn save_message(
        &self,
        uid: Uid,
        content: &[u8],
        flags: &FlagSet,
        received: Option<DateTime<Utc>>,
    ) -> Result<Uid>;

    async fn message_flags(&self, uid: Uid) -> Result<FlagSet>;

    async fn save_message_flags(&self, uid: Uid, flags: &FlagSet) -> Result<()>;

    async fn change_message_uid(&self, uid: Uid, new_uid: Uid) -> Result<()>;

    async fn delete_message(&self, uid: Uid) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uid_assignment() {
        assert!(Uid::from(0).is_assigned());
        assert!(Uid::from(42).is_assigned());
        assert!(!Uid::from(-1).is_assigned());
        assert_eq!(Uid::from(-7).to_string(), "-7");
    }

    #[test]
    fn test_listing_cutoff() {
        let now = Utc::now();
        assert_eq!(ListingFilter::default().cutoff(now), None);

        let filter = ListingFilter {
            max_age: Some(Duration::days(30)),
            max_size: None,
        };
        assert_eq!(filter.cutoff(now), Some(now - Duration::days(30)));
    }

    #[test]
    fn test_listing_admits() {
        let now = Utc::now();
        assert!(ListingFilter::default().admits(u64::MAX, now - Duration::days(9000), now));

        let filter = ListingFilter {
            max_age: Some(Duration::days(30)),
            max_size: Some(1024),
        };
        assert!(filter.admits(1024, now - Duration::days(30), now));
        assert!(!filter.admits(1025, now, now));
        assert!(!filter.admits(10, now - Duration::days(31), now));
    }
}
