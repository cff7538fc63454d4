use std::collections::BTreeSet;
use std::fmt;
use std::ops::Deref;
use std::str::FromStr;

use anyhow::bail;

/// A single-character message state marker (maildir style).
///
/// Uppercase letters are system flags, lowercase letters are user keywords.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Flag(char);

impl Flag {
    pub const DRAFT: Flag = Flag('D');
    pub const FLAGGED: Flag = Flag('F');
    pub const PASSED: Flag = Flag('P');
    pub const REPLIED: Flag = Flag('R');
    pub const SEEN: Flag = Flag('S');
    pub const TRASHED: Flag = Flag('T');

    pub fn as_char(self) -> char {
        self.0
    }
}

impl TryFrom<char> for Flag {
    type Error = anyhow::Error;

    fn try_from(c: char) -> anyhow::Result<Self> {
        if !c.is_ascii_alphabetic() {
            bail!("invalid flag character {:?}", c);
        }
        Ok(Flag(c))
    }
}

impl fmt::Display for Flag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unordered set of flags, rendered in a stable sorted order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlagSet(BTreeSet<Flag>);

impl FlagSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, flag: Flag) -> bool {
        self.0.insert(flag)
    }

    pub fn remove(&mut self, flag: Flag) -> bool {
        self.0.remove(&flag)
    }
}

impl Deref for FlagSet {
    type Target = BTreeSet<Flag>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl FromIterator<Flag> for FlagSet {
    fn from_iter<I: IntoIterator<Item = Flag>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<const N: usize> From<[Flag; N]> for FlagSet {
    fn from(flags: [Flag; N]) -> Self {
        flags.into_iter().collect()
    }
}

impl FromStr for FlagSet {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        s.chars().map(Flag::try_from).collect()
    }
}

impl fmt::Display for FlagSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for flag in &self.0 {
            write!(f, "{}", flag)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_render_sorted() {
        let flags: FlagSet = "TSa".parse().unwrap();
        assert_eq!(flags.len(), 3);
        assert!(flags.contains(&Flag::SEEN));
        assert!(flags.contains(&Flag::TRASHED));
        assert_eq!(flags.to_string(), "STa");
    }

    #[test]
    fn test_duplicates_collapse() {
        let flags: FlagSet = "SSS".parse().unwrap();
        assert_eq!(flags, FlagSet::from([Flag::SEEN]));
    }

    #[test]
    fn test_rejects_non_letters() {
        assert!("S1".parse::<FlagSet>().is_err());
        assert!(" ".parse::<FlagSet>().is_err());
    }

    #[test]
    fn test_empty() {
        let flags: FlagSet = "".parse().unwrap();
        assert!(flags.is_empty());
        assert_eq!(flags.to_string(), "");
    }
}
