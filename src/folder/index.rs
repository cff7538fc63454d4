use std::collections::{BTreeMap, HashMap};

use thiserror::Error;

use super::Uid;
use crate::mail::FlagSet;
use crate::store::StorageKey;

/// Cached state of one message
#[derive(Debug, Clone, PartialEq)]
pub struct MessageEntry {
    pub flags: FlagSet,
    pub key: StorageKey,
    /// Within the account's listing limits
    pub listed: bool,
}

#[derive(Debug, Error, PartialEq)]
pub enum IndexError {
    #[error("UID {0} is already indexed")]
    UidTaken(Uid),

    #[error("storage key {key} already belongs to UID {owner}")]
    KeyTaken { key: StorageKey, owner: Uid },

    #[error("UID {0} is not indexed")]
    Missing(Uid),
}

/// UID to storage key mapping of one folder.
///
/// Keeps a reverse map so that no storage key can ever be reachable from two
/// UIDs.
#[derive(Debug, Default)]
pub struct UidIndex {
    entries: BTreeMap<Uid, MessageEntry>,
    owners: HashMap<StorageKey, Uid>,
}

impl UidIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, uid: Uid, entry: MessageEntry) -> Result<(), IndexError> {
        if self.entries.contains_key(&uid) {
            return Err(IndexError::UidTaken(uid));
        }
        if let Some(&owner) = self.owners.get(&entry.key) {
            return Err(IndexError::KeyTaken {
                key: entry.key,
                owner,
            });
        }

        self.owners.insert(entry.key, uid);
        self.entries.insert(uid, entry);
        Ok(())
    }

    pub fn get(&self, uid: Uid) -> Option<&MessageEntry> {
        self.entries.get(&uid)
    }

    pub fn contains(&self, uid: Uid) -> bool {
        self.entries.contains_key(&uid)
    }

    /// UIDs in ascending order
    pub fn uids(&self) -> Vec<Uid> {
        self.entries.keys().copied().collect()
    }

    /// UIDs of listed entries in ascending order
    pub fn listed_uids(&self) -> Vec<Uid> {
        self.entries
            .iter()
            .filter(|(_, entry)| entry.listed)
            .map(|(uid, _)| *uid)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn set_flags(&mut self, uid: Uid, flags: FlagSet) -> Result<(), IndexError> {
        let entry = self.entries.get_mut(&uid).ok_or(IndexError::Missing(uid))?;
        entry.flags = flags;
        Ok(())
    }

    /// Move an entry to a new UID. Either both maps change or neither does.
    pub fn rename(&mut self, uid: Uid, new_uid: Uid) -> Result<(), IndexError> {
        if self.entries.contains_key(&new_uid) {
            return Err(IndexError::UidTaken(new_uid));
        }
        let entry = self.entries.remove(&uid).ok_or(IndexError::Missing(uid))?;

        self.owners.insert(entry.key, new_uid);
        self.entries.insert(new_uid, entry);
        Ok(())
    }

    pub fn remove(&mut self, uid: Uid) -> Option<MessageEntry> {
        let entry = self.entries.remove(&uid)?;
        self.owners.remove(&entry.key);
        Some(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mail::Flag;

    fn entry() -> MessageEntry {
        MessageEntry {
            flags: FlagSet::from([Flag::SEEN]),
            key: StorageKey::generate(),
            listed: true,
        }
    }

    #[test]
    fn test_rejects_shared_storage_key() {
        let mut index = UidIndex::new();
        let first = entry();
        index.insert(Uid::from(1), first.clone()).unwrap();

        let err = index.insert(Uid::from(2), first.clone()).unwrap_err();
        assert_eq!(
            err,
            IndexError::KeyTaken {
                key: first.key,
                owner: Uid::from(1)
            }
        );
        assert_eq!(index.uids(), vec![Uid::from(1)]);
    }

    #[test]
    fn test_rejects_duplicate_uid() {
        let mut index = UidIndex::new();
        index.insert(Uid::from(1), entry()).unwrap();
        assert_eq!(
            index.insert(Uid::from(1), entry()).unwrap_err(),
            IndexError::UidTaken(Uid::from(1))
        );
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_rename_moves_key_ownership() {
        let mut index = UidIndex::new();
        let moved = entry();
        index.insert(Uid::from(1), moved.clone()).unwrap();
        index.rename(Uid::from(1), Uid::from(5)).unwrap();

        assert!(!index.contains(Uid::from(1)));
        assert_eq!(index.get(Uid::from(5)), Some(&moved));

        // The key now belongs to UID 5
        assert_eq!(
            index.insert(Uid::from(9), moved.clone()).unwrap_err(),
            IndexError::KeyTaken {
                key: moved.key,
                owner: Uid::from(5)
            }
        );
    }

    #[test]
    fn test_rename_onto_existing_uid_changes_nothing() {
        let mut index = UidIndex::new();
        let a = entry();
        let b = entry();
        index.insert(Uid::from(1), a.clone()).unwrap();
        index.insert(Uid::from(2), b.clone()).unwrap();

        assert_eq!(
            index.rename(Uid::from(1), Uid::from(2)).unwrap_err(),
            IndexError::UidTaken(Uid::from(2))
        );
        assert_eq!(index.get(Uid::from(1)), Some(&a));
        assert_eq!(index.get(Uid::from(2)), Some(&b));
    }

    #[test]
    fn test_remove_releases_key() {
        let mut index = UidIndex::new();
        let e = entry();
        index.insert(Uid::from(3), e.clone()).unwrap();
        assert_eq!(index.remove(Uid::from(3)), Some(e.clone()));
        assert_eq!(index.remove(Uid::from(3)), None);

        index.insert(Uid::from(4), e).unwrap();
        assert_eq!(index.uids(), vec![Uid::from(4)]);
    }

    #[test]
    fn test_unlisted_entries_keep_their_uid() {
        let mut index = UidIndex::new();
        index.insert(Uid::from(1), entry()).unwrap();
        let hidden = MessageEntry {
            listed: false,
            ..entry()
        };
        index.insert(Uid::from(2), hidden.clone()).unwrap();

        assert_eq!(index.listed_uids(), vec![Uid::from(1)]);
        assert_eq!(index.uids(), vec![Uid::from(1), Uid::from(2)]);
        assert_eq!(
            index.insert(Uid::from(2), entry()).unwrap_err(),
            IndexError::UidTaken(Uid::from(2))
        );

        index.rename(Uid::from(2), Uid::from(7)).unwrap();
        assert_eq!(index.get(Uid::from(7)), Some(&hidden));
        assert_eq!(index.listed_uids(), vec![Uid::from(1)]);
    }

    #[test]
    fn test_set_flags_on_missing_uid() {
        let mut index = UidIndex::new();
        assert_eq!(
            index.set_flags(Uid::from(1), FlagSet::new()).unwrap_err(),
            IndexError::Missing(Uid::from(1))
        );
    }
}
