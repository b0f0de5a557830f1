//! Local buffer objects and import attachments

use crate::buffer::SharedBufferHandle;
use crate::driver::BufferDriver;
use crate::sg::ScatterDescriptor;
use crate::Result;
use parking_lot::Mutex;
use std::any::Any;
use std::sync::Arc;
use tracing::trace;

/// Flags controlling how an object is exported
///
/// Fixed at the first export of an object; flags passed to later exports of
/// the same object are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExportFlags(pub u32);

impl ExportFlags {
    /// Close the descriptor on exec in the receiving process
    pub const CLOEXEC: ExportFlags = ExportFlags(1);

    /// Whether all bits of `other` are set
    pub fn contains(&self, other: ExportFlags) -> bool {
        self.0 & other.0 == other.0
    }
}

/// Connection from an imported object to the shared buffer backing it
///
/// Holds one reference on the shared buffer for the attachment's lifetime,
/// plus the scatter mapping the driver built when it imported.
pub struct ImportAttachment {
    buffer: SharedBufferHandle,
    mapping: Option<ScatterDescriptor>,
}

impl ImportAttachment {
    /// Attach to a shared buffer, taking ownership of one reference
    pub fn new(buffer: SharedBufferHandle) -> Self {
        Self {
            buffer,
            mapping: None,
        }
    }

    /// Attach with an already-built scatter mapping
    pub fn with_mapping(buffer: SharedBufferHandle, mapping: ScatterDescriptor) -> Self {
        Self {
            buffer,
            mapping: Some(mapping),
        }
    }

    /// The attached shared buffer
    pub fn buffer(&self) -> &SharedBufferHandle {
        &self.buffer
    }

    /// The scatter mapping built at import time, if any
    pub fn mapping(&self) -> Option<&ScatterDescriptor> {
        self.mapping.as_ref()
    }

    /// Unmap the scatter mapping, if any, then drop the buffer reference
    fn detach(mut self) {
        if let Some(sg) = self.mapping.take() {
            trace!(segments = sg.len(), "unmapping import attachment");
            drop(sg);
        }
        // attachment's buffer reference released here
    }
}

/// A driver-managed memory object local to one process
///
/// Referenced from the session handle table by integer handle. Objects
/// created by import carry an attachment to the shared buffer they came
/// from; objects that have been exported cache their shareable wrapper.
pub struct BufferObject {
    size: usize,
    export_handle: Mutex<Option<SharedBufferHandle>>,
    import_attach: Option<ImportAttachment>,
    driver_private: Option<Box<dyn Any + Send + Sync>>,
}

impl BufferObject {
    /// Create a locally-owned object of `size` bytes
    pub fn new(size: usize) -> Self {
        Self {
            size,
            export_handle: Mutex::new(None),
            import_attach: None,
            driver_private: None,
        }
    }

    /// Create a locally-owned object carrying driver-private state
    pub fn with_private<P: Any + Send + Sync>(size: usize, private: P) -> Self {
        Self {
            size,
            export_handle: Mutex::new(None),
            import_attach: None,
            driver_private: Some(Box::new(private)),
        }
    }

    /// Create an object backed by an imported shared buffer
    pub fn imported<P: Any + Send + Sync>(
        size: usize,
        attach: ImportAttachment,
        private: P,
    ) -> Self {
        Self {
            size,
            export_handle: Mutex::new(None),
            import_attach: Some(attach),
            driver_private: Some(Box::new(private)),
        }
    }

    /// Size in bytes
    pub fn size(&self) -> usize {
        self.size
    }

    /// Whether this object was created by import
    pub fn is_imported(&self) -> bool {
        self.import_attach.is_some()
    }

    /// The import attachment, if this object was created by import
    pub fn import_attachment(&self) -> Option<&ImportAttachment> {
        self.import_attach.as_ref()
    }

    /// Downcast the driver-private state
    pub fn driver_private<P: Any>(&self) -> Option<&P> {
        self.driver_private.as_deref().and_then(|p| p.downcast_ref())
    }

    /// Get or create the shareable wrapper for this object
    ///
    /// The wrapper is created by the driver export callback at most once;
    /// every later call returns the cached handle and ignores `flags`. A
    /// driver failure propagates unchanged and caches nothing.
    pub fn ensure_exported(
        &self,
        driver: &dyn BufferDriver,
        flags: ExportFlags,
    ) -> Result<SharedBufferHandle> {
        let mut cached = self.export_handle.lock();
        if let Some(buf) = cached.as_ref() {
            return Ok(buf.clone());
        }

        let buf = driver.export(self, flags)?;
        *cached = Some(buf.clone());
        Ok(buf)
    }

    /// The cached export wrapper, if this object has been exported
    pub fn exported_buffer(&self) -> Option<SharedBufferHandle> {
        self.export_handle.lock().clone()
    }
}

impl Drop for BufferObject {
    fn drop(&mut self) {
        // Last step of imported-object teardown: unmap, then detach from
        // the shared buffer. Runs once, never for locally-owned objects.
        if let Some(attach) = self.import_attach.take() {
            attach.detach();
        }
    }
}

/// Shared ownership of a buffer object, as stored in the handle table
pub type ObjectRef = Arc<BufferObject>;
