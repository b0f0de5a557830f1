//! Per-process session: export, import, and handle lifecycle

use crate::driver::BufferDriver;
use crate::handles::{HandleTable, LocalHandle};
use crate::object::{ExportFlags, ObjectRef};
use crate::registry::ImportRegistry;
use crate::transport::{DescriptorTable, RawDescriptor};
use crate::{Error, Result};
use std::sync::Arc;
use tracing::debug;

/// One process's open session against a sharing-capable driver
///
/// Owns the handle table and the import registry; the descriptor table is
/// shared with any other session of the same process. Dropping the session
/// tears the registry down and releases every live handle.
pub struct Session {
    driver: Arc<dyn BufferDriver>,
    descriptors: Arc<DescriptorTable>,
    handles: HandleTable,
    registry: ImportRegistry,
}

impl Session {
    /// Open a session
    pub fn new(driver: Arc<dyn BufferDriver>, descriptors: Arc<DescriptorTable>) -> Self {
        Self {
            driver,
            descriptors,
            handles: HandleTable::new(),
            registry: ImportRegistry::new(),
        }
    }

    /// Open a session with bounded handle and registry capacity
    pub fn with_capacity(
        driver: Arc<dyn BufferDriver>,
        descriptors: Arc<DescriptorTable>,
        handle_capacity: usize,
        registry_capacity: usize,
    ) -> Self {
        Self {
            driver,
            descriptors,
            handles: HandleTable::with_capacity(handle_capacity),
            registry: ImportRegistry::with_capacity(registry_capacity),
        }
    }

    /// Register a driver-created object, returning its local handle
    pub fn create_object(&self, object: ObjectRef) -> Result<LocalHandle> {
        self.handles.create(object)
    }

    /// Resolve a local handle to its object
    pub fn lookup_object(&self, handle: LocalHandle) -> Option<ObjectRef> {
        self.handles.lookup(handle)
    }

    /// Export a local object as a descriptor another process can import
    ///
    /// The object's shareable wrapper is created by the driver at most once;
    /// every call installs a fresh descriptor for it. Export never touches
    /// the import registry: handing out descriptors cannot create duplicate
    /// local objects.
    pub fn export(&self, handle: LocalHandle, flags: ExportFlags) -> Result<RawDescriptor> {
        if !self.driver.supports_sharing() {
            return Err(Error::Unsupported);
        }

        let object = self
            .handles
            .lookup(handle)
            .ok_or(Error::HandleNotFound(handle))?;

        let buffer = object.ensure_exported(self.driver.as_ref(), flags)?;
        let descriptor = self.descriptors.install(buffer);

        debug!(handle, descriptor, "exported buffer object");
        Ok(descriptor)
    }

    /// Import a descriptor, returning the local handle representing it
    ///
    /// A buffer already imported into this session resolves to its existing
    /// handle without another driver callback; a first-seen buffer is mapped
    /// by the driver and recorded in the registry. On any failure every
    /// acquired resource is released in reverse order before the error
    /// returns.
    pub fn import(&self, descriptor: RawDescriptor) -> Result<LocalHandle> {
        if !self.driver.supports_sharing() {
            return Err(Error::Unsupported);
        }

        // Acquires the reference dropped on every early return below.
        let buffer = self.descriptors.resolve(descriptor)?;
        let id = buffer.id();

        if let Some(handle) = self.registry.lookup(id) {
            debug!(descriptor, handle, "import resolved from registry");
            return Ok(handle);
        }

        // First sight. The registry lock is not held here: driver import may
        // block on device-memory mapping, and two racing threads may both
        // reach it for the same buffer. commit() settles that race below.
        let object = self.driver.import(&buffer)?;

        let handle = self.handles.create(object)?;

        match self.registry.commit(id, handle) {
            Ok(None) => {
                debug!(descriptor, handle, "imported new buffer object");
                Ok(handle)
            }
            Ok(Some(existing)) => {
                // Lost the race: another thread committed first. Our object
                // is released through the table so attachment teardown runs.
                self.handles.remove(handle);
                debug!(descriptor, handle = existing, "import lost race, reusing entry");
                Ok(existing)
            }
            Err(e) => {
                self.handles.remove(handle);
                Err(e)
            }
        }
    }

    /// Release a local handle
    ///
    /// For imported objects the registry entry for the backing buffer is
    /// removed first, so a later import of the same buffer maps it afresh.
    /// The object itself is freed when its last reference drops, running
    /// attachment teardown.
    pub fn release_handle(&self, handle: LocalHandle) -> Result<()> {
        let object = self
            .handles
            .remove(handle)
            .ok_or(Error::HandleNotFound(handle))?;

        if let Some(attach) = object.import_attachment() {
            self.registry.remove(attach.buffer().id());
        }
        Ok(())
    }

    /// The session's import registry
    pub fn registry(&self) -> &ImportRegistry {
        &self.registry
    }

    /// The session's handle table
    pub fn handles(&self) -> &HandleTable {
        &self.handles
    }

    /// The process descriptor table this session installs descriptors into
    pub fn descriptors(&self) -> &Arc<DescriptorTable> {
        &self.descriptors
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        // &mut self: no import can be in flight once teardown starts.
        self.registry.teardown();
    }
}
