//! Per-session registry of imported buffers

use crate::buffer::BufferId;
use crate::handles::LocalHandle;
use crate::{Error, Result};
use parking_lot::Mutex;
use tracing::trace;

struct RegistryEntry {
    buffer: BufferId,
    handle: LocalHandle,
}

/// Maps shared-buffer identities to the local handle representing each one
///
/// Scoped to one session. At most one entry exists per distinct buffer
/// identity; that uniqueness is upheld by import's call ordering, not
/// checked on insert. All operations take the registry's own lock, which is
/// never held across driver callbacks.
pub struct ImportRegistry {
    entries: Mutex<Vec<RegistryEntry>>,
    capacity: Option<usize>,
}

impl ImportRegistry {
    /// Create an unbounded registry
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            capacity: None,
        }
    }

    /// Create a registry refusing inserts past `capacity` entries
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            capacity: Some(capacity),
        }
    }

    /// Record that `buffer` is represented by `handle` in this session
    ///
    /// Does not check for a pre-existing entry; the caller has already done
    /// the authoritative lookup.
    pub fn insert(&self, buffer: BufferId, handle: LocalHandle) -> Result<()> {
        let mut entries = self.entries.lock();
        Self::push(&mut entries, self.capacity, buffer, handle)
    }

    /// Find the local handle representing `buffer`, if any
    pub fn lookup(&self, buffer: BufferId) -> Option<LocalHandle> {
        let entries = self.entries.lock();
        entries.iter().find(|e| e.buffer == buffer).map(|e| e.handle)
    }

    /// Atomically re-check for `buffer` and insert on miss
    ///
    /// Import's commit step: returns `Ok(None)` when the entry was inserted,
    /// or `Ok(Some(existing))` when another thread imported the same buffer
    /// between the caller's first lookup and now. The caller must then roll
    /// back its own object and hand out the existing handle.
    pub fn commit(&self, buffer: BufferId, handle: LocalHandle) -> Result<Option<LocalHandle>> {
        let mut entries = self.entries.lock();
        if let Some(existing) = entries.iter().find(|e| e.buffer == buffer) {
            return Ok(Some(existing.handle));
        }
        Self::push(&mut entries, self.capacity, buffer, handle)?;
        Ok(None)
    }

    /// Drop every entry for `buffer`
    ///
    /// Normally removes at most one entry; removing all matches keeps a
    /// duplicated entry from outliving its handle.
    pub fn remove(&self, buffer: BufferId) {
        let mut entries = self.entries.lock();
        entries.retain(|e| e.buffer != buffer);
    }

    /// Drop every entry unconditionally
    ///
    /// Called once, when the owning session closes.
    pub fn teardown(&self) {
        let mut entries = self.entries.lock();
        trace!(entries = entries.len(), "import registry teardown");
        entries.clear();
    }

    /// Number of live entries
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether the registry has no entries
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    fn push(
        entries: &mut Vec<RegistryEntry>,
        capacity: Option<usize>,
        buffer: BufferId,
        handle: LocalHandle,
    ) -> Result<()> {
        if let Some(cap) = capacity {
            if entries.len() >= cap {
                return Err(Error::AllocationFailure("import registry full".to_string()));
            }
        }
        entries
            .try_reserve(1)
            .map_err(|e| Error::AllocationFailure(format!("registry entry: {}", e)))?;
        entries.push(RegistryEntry { buffer, handle });
        Ok(())
    }
}

impl Default for ImportRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::{BufferBacking, SharedBuffer};

    fn ids(n: usize) -> Vec<(crate::buffer::SharedBufferHandle, BufferId)> {
        (0..n)
            .map(|_| {
                let buf = SharedBuffer::new(16, BufferBacking::Pages(vec![]));
                let id = buf.id();
                (buf, id)
            })
            .collect()
    }

    #[test]
    fn test_insert_then_lookup() {
        let reg = ImportRegistry::new();
        let bufs = ids(2);

        reg.insert(bufs[0].1, 7).unwrap();
        assert_eq!(reg.lookup(bufs[0].1), Some(7));
        assert_eq!(reg.lookup(bufs[1].1), None);
    }

    #[test]
    fn test_commit_returns_existing_on_race() {
        let reg = ImportRegistry::new();
        let bufs = ids(1);

        assert_eq!(reg.commit(bufs[0].1, 3).unwrap(), None);
        assert_eq!(reg.commit(bufs[0].1, 9).unwrap(), Some(3));
        assert_eq!(reg.len(), 1);
        assert_eq!(reg.lookup(bufs[0].1), Some(3));
    }

    #[test]
    fn test_remove_clears_all_matches() {
        let reg = ImportRegistry::new();
        let bufs = ids(2);

        reg.insert(bufs[0].1, 1).unwrap();
        reg.insert(bufs[1].1, 2).unwrap();
        reg.remove(bufs[0].1);

        assert_eq!(reg.lookup(bufs[0].1), None);
        assert_eq!(reg.lookup(bufs[1].1), Some(2));
    }

    #[test]
    fn test_capacity_bound() {
        let reg = ImportRegistry::with_capacity(1);
        let bufs = ids(2);

        reg.insert(bufs[0].1, 1).unwrap();
        assert!(matches!(
            reg.insert(bufs[1].1, 2),
            Err(Error::AllocationFailure(_))
        ));
    }

    #[test]
    fn test_teardown_drops_everything() {
        let reg = ImportRegistry::new();
        let bufs = ids(3);

        for (i, (_, id)) in bufs.iter().enumerate() {
            reg.insert(*id, i as LocalHandle).unwrap();
        }
        reg.teardown();

        assert!(reg.is_empty());
        for (_, id) in &bufs {
            assert_eq!(reg.lookup(*id), None);
        }
    }
}
