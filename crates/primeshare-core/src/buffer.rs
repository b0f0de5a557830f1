//! Shareable buffer and its backing storage

use crate::shm::SharedMemory;
use crate::sg::PhysPage;
use std::sync::Arc;

/// Reference-counted handle to a shareable buffer
///
/// Cloning acquires a reference; dropping releases it. The buffer itself is
/// freed when the last handle anywhere in the process goes away.
pub type SharedBufferHandle = Arc<SharedBuffer>;

/// Stable identity of a shared buffer, independent of descriptor values
///
/// Two descriptors naming the same underlying buffer compare equal here even
/// though the descriptor numbers differ.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferId(usize);

/// Backing storage published by a driver's export callback
pub enum BufferBacking {
    /// Run of pages owned by the exporting object
    Pages(Vec<PhysPage>),
    /// Named POSIX shared memory region
    Shm(SharedMemory),
    /// CUDA IPC memory handle plus owning device
    #[cfg(feature = "cuda")]
    CudaIpc {
        handle: crate::cuda::CudaIpcHandle,
        device_id: i32,
    },
}

/// A buffer made shareable across processes
///
/// Produced once per local object by the driver export callback and reused
/// for every later descriptor handed out for that object.
pub struct SharedBuffer {
    size: usize,
    backing: BufferBacking,
}

impl SharedBuffer {
    /// Wrap backing storage as a shareable buffer
    pub fn new(size: usize, backing: BufferBacking) -> SharedBufferHandle {
        Arc::new(Self { size, backing })
    }

    /// Size in bytes
    pub fn size(&self) -> usize {
        self.size
    }

    /// Backing storage
    pub fn backing(&self) -> &BufferBacking {
        &self.backing
    }

    /// Stable identity of the underlying allocation
    ///
    /// Shared buffers only exist behind `Arc`, so the address of `self` is
    /// the allocation address, shared by every clone of the handle.
    pub fn id(&self) -> BufferId {
        BufferId(self as *const SharedBuffer as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_stable_across_clones() {
        let buf = SharedBuffer::new(64, BufferBacking::Pages(vec![PhysPage(0x1000)]));
        let alias = buf.clone();
        assert_eq!(buf.id(), alias.id());
    }

    #[test]
    fn test_distinct_buffers_distinct_identity() {
        let a = SharedBuffer::new(64, BufferBacking::Pages(vec![]));
        let b = SharedBuffer::new(64, BufferBacking::Pages(vec![]));
        assert_ne!(a.id(), b.id());
    }
}
