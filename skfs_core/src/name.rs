// Copyright 2026 the Skfs Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Directory keys and directory names.

use alloc::boxed::Box;
use alloc::string::String;
use core::cmp::Ordering;
use core::fmt;

/// A directory key.
///
/// `BaseName` is the key space for both eager and lazy directory entries. It is a tagged
/// two-variant union rather than an open string type so that directories keyed by small integers
/// (the common case for reducer outputs and synthetic indices) never pay for string allocation or
/// comparison.
///
/// Ordering is total: all `IID` values sort before all `SID` values, and each variant sorts by its
/// payload. This total order is what makes dirty-reader draining deterministic.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub enum BaseName {
    /// An integer key, typically used for synthetic or reducer-owned entries.
    IID(i64),
    /// A string key, typically used for user-supplied input names.
    SID(Box<str>),
}

impl BaseName {
    /// Constructs an integer key.
    #[must_use]
    #[inline]
    pub const fn iid(v: i64) -> Self {
        Self::IID(v)
    }

    /// Constructs a string key.
    #[must_use]
    #[inline]
    pub fn sid(s: impl Into<Box<str>>) -> Self {
        Self::SID(s.into())
    }

    /// Returns the string payload, if this is a `SID`.
    #[must_use]
    #[inline]
    pub fn as_sid(&self) -> Option<&str> {
        match self {
            Self::SID(s) => Some(s),
            Self::IID(_) => None,
        }
    }

    /// Returns the integer payload, if this is an `IID`.
    #[must_use]
    #[inline]
    pub const fn as_iid(&self) -> Option<i64> {
        match self {
            Self::IID(v) => Some(*v),
            Self::SID(_) => None,
        }
    }
}

impl Ord for BaseName {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::IID(a), Self::IID(b)) => a.cmp(b),
            (Self::SID(a), Self::SID(b)) => a.cmp(b),
            (Self::IID(_), Self::SID(_)) => Ordering::Less,
            (Self::SID(_), Self::IID(_)) => Ordering::Greater,
        }
    }
}

impl PartialOrd for BaseName {
    #[inline]
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for BaseName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IID(v) => write!(f, "{v}"),
            Self::SID(s) => write!(f, "{s}"),
        }
    }
}

impl From<i64> for BaseName {
    #[inline]
    fn from(v: i64) -> Self {
        Self::IID(v)
    }
}

impl From<&str> for BaseName {
    #[inline]
    fn from(s: &str) -> Self {
        Self::SID(s.into())
    }
}

impl From<String> for BaseName {
    #[inline]
    fn from(s: String) -> Self {
        Self::SID(s.into_boxed_str())
    }
}

/// An absolute, never-renamed directory path.
///
/// `DirName` is unique within a `Context`: two directories with the same name cannot coexist
/// (`mkdir` fails with `DuplicateDir` if the name is already used by a live directory).
#[derive(Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct DirName(Box<str>);

impl DirName {
    /// Constructs a directory name.
    #[must_use]
    #[inline]
    pub fn new(name: impl Into<Box<str>>) -> Self {
        Self(name.into())
    }

    /// Returns the path-like string backing this name.
    #[must_use]
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DirName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for DirName {
    #[inline]
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for DirName {
    #[inline]
    fn from(s: String) -> Self {
        Self::new(s.into_boxed_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    #[test]
    fn base_name_total_order_puts_iid_before_sid() {
        let mut names = vec![
            BaseName::sid("b"),
            BaseName::iid(2),
            BaseName::sid("a"),
            BaseName::iid(1),
        ];
        names.sort();
        assert_eq!(
            names,
            vec![
                BaseName::iid(1),
                BaseName::iid(2),
                BaseName::sid("a"),
                BaseName::sid("b"),
            ]
        );
    }

    #[test]
    fn dir_name_equality_is_structural() {
        assert_eq!(DirName::new("/in/"), DirName::new("/in/"));
        assert_ne!(DirName::new("/in/"), DirName::new("/out/"));
    }
}
