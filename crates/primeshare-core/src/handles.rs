//! Process-local handle table for buffer objects

use crate::object::ObjectRef;
use crate::{Error, Result};
use parking_lot::Mutex;
use std::collections::HashMap;

/// Integer handle naming a buffer object within one session
pub type LocalHandle = u32;

/// Maps local handles to the objects they name
///
/// Handles are assigned monotonically and never reused within a session.
/// The table holds one strong reference per entry; removing the last
/// reference runs the object's attachment teardown.
pub struct HandleTable {
    entries: Mutex<HashMap<LocalHandle, ObjectRef>>,
    next: Mutex<LocalHandle>,
    capacity: Option<usize>,
}

impl HandleTable {
    /// Create an unbounded handle table
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            next: Mutex::new(1),
            capacity: None,
        }
    }

    /// Create a table refusing handles past `capacity` live entries
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            next: Mutex::new(1),
            capacity: Some(capacity),
        }
    }

    /// Allocate a handle for `object`, taking one reference
    pub fn create(&self, object: ObjectRef) -> Result<LocalHandle> {
        let mut entries = self.entries.lock();
        if let Some(cap) = self.capacity {
            if entries.len() >= cap {
                return Err(Error::AllocationFailure("handle table full".to_string()));
            }
        }

        let mut next = self.next.lock();
        let handle = *next;
        *next += 1;
        drop(next);

        entries.insert(handle, object);
        Ok(handle)
    }

    /// Resolve `handle`, acquiring a reference to its object
    pub fn lookup(&self, handle: LocalHandle) -> Option<ObjectRef> {
        self.entries.lock().get(&handle).cloned()
    }

    /// Remove `handle`, returning the table's reference to its object
    pub fn remove(&self, handle: LocalHandle) -> Option<ObjectRef> {
        self.entries.lock().remove(&handle)
    }

    /// Number of live handles
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether the table has no live handles
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl Default for HandleTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::BufferObject;
    use std::sync::Arc;

    #[test]
    fn test_handles_not_reused() {
        let table = HandleTable::new();
        let a = table.create(Arc::new(BufferObject::new(16))).unwrap();
        table.remove(a).unwrap();
        let b = table.create(Arc::new(BufferObject::new(16))).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_capacity_bound() {
        let table = HandleTable::with_capacity(1);
        table.create(Arc::new(BufferObject::new(16))).unwrap();
        assert!(matches!(
            table.create(Arc::new(BufferObject::new(16))),
            Err(Error::AllocationFailure(_))
        ));
    }

    #[test]
    fn test_remove_drops_table_reference() {
        let table = HandleTable::new();
        let obj = Arc::new(BufferObject::new(16));
        let handle = table.create(obj.clone()).unwrap();

        assert_eq!(Arc::strong_count(&obj), 2);
        table.remove(handle).unwrap();
        assert_eq!(Arc::strong_count(&obj), 1);
        assert!(table.lookup(handle).is_none());
    }
}
