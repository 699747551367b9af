//! Per-record reader/writer locks.
//!
//! Cooking a record reads its segment files for as long as the encoder runs;
//! deleting it must not happen in the meantime. Every record id gets its own
//! [`RwLock`], created on first use and dropped from the registry as soon as
//! nobody holds or waits for it.
//!
//! Shared holders may still need to agree among themselves, for example when
//! the first of them fills in files the others will read; each record also
//! carries a fetch mutex for that (see [`SharedLease::lock_fetch`]).

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{MutexGuard, OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock};

type Registry = Mutex<HashMap<u64, Arc<Entry>>>;

#[derive(Debug, Default)]
struct Entry {
    access: Arc<RwLock<()>>,
    fetch: tokio::sync::Mutex<()>,
}

/// Keyed lock registry. Cheap to clone; clones share the registry.
///
/// # Examples
///
/// ```
/// use pantry_records::AccessGuard;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let guard = AccessGuard::default();
/// let reading = guard.acquire_shared(7).await;
/// assert!(guard.try_acquire_exclusive(7).is_none());
/// drop(reading);
/// assert!(guard.try_acquire_exclusive(7).is_some());
/// # }
/// ```
#[derive(Clone, Debug, Default)]
pub struct AccessGuard {
    locks: Arc<Registry>,
}

impl AccessGuard {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, id: u64) -> Slot {
        let entry = self.locks.lock().entry(id).or_default().clone();
        Slot {
            id,
            entry,
            registry: self.locks.clone(),
        }
    }

    /// Wait until no exclusive holder remains, then hold the record shared.
    pub async fn acquire_shared(&self, id: u64) -> SharedLease {
        let slot = self.slot(id);
        let guard = slot.access().read_owned().await;
        SharedLease { _guard: guard, slot }
    }

    /// Hold the record shared, unless it is held exclusively right now.
    pub fn try_acquire_shared(&self, id: u64) -> Option<SharedLease> {
        let slot = self.slot(id);
        let guard = slot.access().try_read_owned().ok()?;
        Some(SharedLease { _guard: guard, slot })
    }

    /// Hold the record exclusively, only if nobody else holds it at all.
    /// Never waits.
    pub fn try_acquire_exclusive(&self, id: u64) -> Option<ExclusiveLease> {
        let slot = self.slot(id);
        let guard = slot.access().try_write_owned().ok()?;
        Some(ExclusiveLease { _guard: guard, slot })
    }

    /// Number of record ids currently held or waited for.
    pub fn active(&self) -> usize {
        self.locks.lock().len()
    }
}

/// One registry reference to a record lock. Removes the registry entry when
/// it is the last one.
#[derive(Debug)]
struct Slot {
    id: u64,
    entry: Arc<Entry>,
    registry: Arc<Registry>,
}

impl Slot {
    fn access(&self) -> Arc<RwLock<()>> {
        self.entry.access.clone()
    }
}

impl Drop for Slot {
    fn drop(&mut self) {
        let mut locks = self.registry.lock();
        // Ours and the registry's. New slots are only handed out under the
        // registry mutex, so the count can't grow behind our back.
        if Arc::strong_count(&self.entry) == 2 {
            locks.remove(&self.id);
        }
    }
}

/// Shared hold on a record, released on drop.
#[derive(Debug)]
#[must_use = "the record is released as soon as the lease is dropped"]
pub struct SharedLease {
    _guard: OwnedRwLockReadGuard<()>,
    slot: Slot,
}

impl SharedLease {
    pub fn id(&self) -> u64 {
        self.slot.id
    }

    /// Wait for the record's fetch mutex. Only one shared holder at a time
    /// gets it; exclusive holders never need it.
    pub async fn lock_fetch(&self) -> MutexGuard<'_, ()> {
        self.slot.entry.fetch.lock().await
    }

    pub fn release(self) {}
}

/// Exclusive hold on a record, released on drop.
#[derive(Debug)]
#[must_use = "the record is released as soon as the lease is dropped"]
pub struct ExclusiveLease {
    _guard: OwnedRwLockWriteGuard<()>,
    slot: Slot,
}

impl ExclusiveLease {
    pub fn id(&self) -> u64 {
        self.slot.id
    }

    pub fn release(self) {}
}
