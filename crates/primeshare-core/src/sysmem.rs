//! Reference driver backed by POSIX shared memory
//!
//! Stands in for a device driver: objects live in named shared-memory
//! regions, export publishes the region, import maps it and describes the
//! mapping with a scatter list. Useful on its own for CPU-visible sharing
//! and as the model for real device drivers.

use crate::buffer::{BufferBacking, SharedBuffer, SharedBufferHandle};
use crate::driver::BufferDriver;
use crate::object::{BufferObject, ExportFlags, ImportAttachment, ObjectRef};
use crate::sg::ScatterDescriptor;
use crate::shm::SharedMemory;
use crate::{Error, Result};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Driver-private state of a sysmem object: its own mapping of the region
pub struct SysmemObject {
    shm: SharedMemory,
}

impl SysmemObject {
    /// Region name, usable by other processes
    pub fn region_name(&self) -> &str {
        self.shm.name()
    }

    /// Read the object's memory
    pub fn as_slice(&self) -> &[u8] {
        self.shm.as_slice()
    }

    /// Copy `data` into the object at `offset`
    ///
    /// Takes `&self`: the region is a shared mapping, concurrently writable
    /// from other processes by design.
    pub fn write(&self, offset: usize, data: &[u8]) -> Result<()> {
        if offset + data.len() > self.shm.size() {
            return Err(Error::SharedMemory(format!(
                "write of {} bytes at {} exceeds region size {}",
                data.len(),
                offset,
                self.shm.size()
            )));
        }
        unsafe {
            let dst = (self.shm.as_ptr() as *mut u8).add(offset);
            std::ptr::copy_nonoverlapping(data.as_ptr(), dst, data.len());
        }
        Ok(())
    }
}

/// Buffer driver over named POSIX shared memory
pub struct SysmemDriver {
    counter: AtomicU64,
}

impl SysmemDriver {
    pub fn new() -> Self {
        Self {
            counter: AtomicU64::new(0),
        }
    }

    fn unique_name(&self) -> String {
        use std::time::{SystemTime, UNIX_EPOCH};
        let ts = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        format!("/ps_{}_{}_{}", std::process::id(), n, ts)
    }

    /// Allocate a locally-owned object of `size` bytes
    pub fn create_object(&self, size: usize) -> Result<ObjectRef> {
        let shm = SharedMemory::create(&self.unique_name(), size)?;
        Ok(Arc::new(BufferObject::with_private(
            size,
            SysmemObject { shm },
        )))
    }
}

impl Default for SysmemDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl BufferDriver for SysmemDriver {
    fn export(&self, object: &BufferObject, _flags: ExportFlags) -> Result<SharedBufferHandle> {
        let private: &SysmemObject = object
            .driver_private()
            .ok_or_else(|| Error::Driver("object has no sysmem backing".to_string()))?;

        // The shared buffer carries its own mapping of the object's region,
        // so it stays valid however long descriptors outlive the object.
        let region = SharedMemory::open(private.shm.name())?;
        Ok(SharedBuffer::new(
            object.size(),
            BufferBacking::Shm(region),
        ))
    }

    fn import(&self, buffer: &SharedBufferHandle) -> Result<ObjectRef> {
        let region = match buffer.backing() {
            BufferBacking::Shm(r) => SharedMemory::open(r.name())?,
            _ => {
                return Err(Error::Driver(
                    "sysmem cannot import non-shm backing".to_string(),
                ))
            }
        };

        let mapping = ScatterDescriptor::from_pages(&region.pages())?;
        let attach = ImportAttachment::with_mapping(buffer.clone(), mapping);

        Ok(Arc::new(BufferObject::imported(
            buffer.size(),
            attach,
            SysmemObject { shm: region },
        )))
    }
}
