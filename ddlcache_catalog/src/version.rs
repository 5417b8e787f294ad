use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// A generation of the catalog. Every successful DDL job produces exactly one new version.
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct SchemaVersion(u64);

impl SchemaVersion {
    pub const fn new(version: u64) -> Self {
        Self(version)
    }

    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }

    pub const fn get(&self) -> u64 {
        self.0
    }
}

impl From<u64> for SchemaVersion {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl std::fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Process-wide schema version counter.
///
/// Readers go through [`current`][SchemaVersionManager::current], which is a single atomic
/// load. Only the catalog commit path moves the counter, and only while holding the catalog
/// write permit.
#[derive(Debug, Default)]
pub struct SchemaVersionManager {
    current: AtomicU64,
}

impl SchemaVersionManager {
    pub fn new(start: SchemaVersion) -> Self {
        Self {
            current: AtomicU64::new(start.get()),
        }
    }

    pub fn current(&self) -> SchemaVersion {
        SchemaVersion(self.current.load(Ordering::Acquire))
    }

    /// The version the next bump will publish
    pub(crate) fn upcoming(&self) -> SchemaVersion {
        self.current().next()
    }

    /// Publish `next`, which must directly follow the current version.
    pub(crate) fn bump(&self, next: SchemaVersion) -> SchemaVersion {
        let previous = self.current.swap(next.get(), Ordering::AcqRel);
        assert_eq!(
            previous + 1,
            next.get(),
            "schema version bumped out of order"
        );
        next
    }
}
