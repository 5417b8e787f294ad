//! Identifier types shared by the catalog, the DDL job executor, and transactions.

use serde::Deserialize;
use serde::Serialize;
use std::fmt::Display;
use std::sync::atomic::AtomicU32;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

macro_rules! catalog_identifier_type {
    ($name:ident, $inner:ty) => {
        #[derive(
            Debug, Copy, Clone, Eq, PartialOrd, Ord, PartialEq, Serialize, Deserialize, Hash, Default,
        )]
        pub struct $name($inner);

        impl $name {
            pub const fn new(inner: $inner) -> Self {
                Self(inner)
            }

            pub fn next(&self) -> Self {
                Self(
                    self.0
                        .checked_add(1)
                        .expect(concat!("overflowed with ", stringify!($name))),
                )
            }

            pub const fn get(&self) -> $inner {
                self.0
            }
        }

        impl From<$inner> for $name {
            fn from(value: $inner) -> Self {
                Self(value)
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

catalog_identifier_type!(DbId, u32);
catalog_identifier_type!(TableId, u32);
catalog_identifier_type!(IndexId, u32);
catalog_identifier_type!(JobId, u64);
catalog_identifier_type!(TxnId, u64);

/// Hands out [`TableId`]s.
///
/// Table ids are allocated outside of the versioned catalog state so that session-private
/// tables, which never enter the catalog, still get ids that cannot collide with published
/// tables.
#[derive(Debug, Default)]
pub struct TableIdAllocator {
    next: AtomicU32,
}

impl TableIdAllocator {
    pub fn new(next: TableId) -> Self {
        Self {
            next: AtomicU32::new(next.get()),
        }
    }

    pub fn allocate(&self) -> TableId {
        TableId(
            self.next
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_add(1))
                .expect("Overflowed with Table IDs"),
        )
    }

    /// Ensure that ids handed out from here on are strictly greater than `seen`
    pub fn observe(&self, seen: TableId) {
        self.next.fetch_max(seen.get().saturating_add(1), Ordering::SeqCst);
    }

    pub fn peek(&self) -> TableId {
        TableId(self.next.load(Ordering::SeqCst))
    }
}

/// Hands out [`TxnId`]s for optimistic transactions.
#[derive(Debug, Default)]
pub struct TxnIdAllocator {
    next: AtomicU64,
}

impl TxnIdAllocator {
    pub fn allocate(&self) -> TxnId {
        TxnId(
            self.next
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_add(1))
                .expect("Overflowed with Transaction IDs"),
        )
    }
}
