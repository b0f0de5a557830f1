//! Descriptor table binding shared buffers to file-descriptor-like tokens

use crate::buffer::SharedBufferHandle;
use crate::{Error, Result};
use parking_lot::Mutex;
use std::collections::HashMap;

/// Opaque descriptor naming a shared buffer within one process
pub type RawDescriptor = i32;

/// Process-wide table of live descriptors
///
/// Models the process file table: each installed descriptor holds its own
/// reference on the shared buffer, resolving acquires another, and closing
/// releases the table's. Shared between sessions of the same process via
/// `Arc`.
pub struct DescriptorTable {
    entries: Mutex<HashMap<RawDescriptor, SharedBufferHandle>>,
    next: Mutex<RawDescriptor>,
}

impl DescriptorTable {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            // 0..2 are taken by convention
            next: Mutex::new(3),
        }
    }

    /// Bind `buffer` to a fresh descriptor, transferring one reference in
    ///
    /// Every call hands out a new descriptor; several descriptors may name
    /// the same buffer.
    pub fn install(&self, buffer: SharedBufferHandle) -> RawDescriptor {
        let mut next = self.next.lock();
        let descriptor = *next;
        *next += 1;
        drop(next);

        self.entries.lock().insert(descriptor, buffer);
        descriptor
    }

    /// Resolve a descriptor, acquiring a reference on its buffer
    pub fn resolve(&self, descriptor: RawDescriptor) -> Result<SharedBufferHandle> {
        self.entries
            .lock()
            .get(&descriptor)
            .cloned()
            .ok_or(Error::InvalidDescriptor(descriptor))
    }

    /// Close a descriptor, releasing the table's reference
    pub fn close(&self, descriptor: RawDescriptor) -> Result<()> {
        self.entries
            .lock()
            .remove(&descriptor)
            .map(drop)
            .ok_or(Error::InvalidDescriptor(descriptor))
    }

    /// Number of live descriptors
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }
}

impl Default for DescriptorTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::{BufferBacking, SharedBuffer};
    use std::sync::Arc;

    #[test]
    fn test_install_resolve_close() {
        let table = DescriptorTable::new();
        let buf = SharedBuffer::new(32, BufferBacking::Pages(vec![]));

        let fd = table.install(buf.clone());
        assert_eq!(Arc::strong_count(&buf), 2);

        let resolved = table.resolve(fd).unwrap();
        assert_eq!(Arc::strong_count(&buf), 3);
        assert_eq!(resolved.id(), buf.id());
        drop(resolved);

        table.close(fd).unwrap();
        assert_eq!(Arc::strong_count(&buf), 1);
        assert!(matches!(
            table.resolve(fd),
            Err(Error::InvalidDescriptor(_))
        ));
    }

    #[test]
    fn test_two_descriptors_one_buffer() {
        let table = DescriptorTable::new();
        let buf = SharedBuffer::new(32, BufferBacking::Pages(vec![]));

        let a = table.install(buf.clone());
        let b = table.install(buf.clone());
        assert_ne!(a, b);
        assert_eq!(table.resolve(a).unwrap().id(), table.resolve(b).unwrap().id());
    }
}
