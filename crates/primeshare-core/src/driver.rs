//! Driver callback interface for buffer export and import

use crate::buffer::SharedBufferHandle;
use crate::object::{BufferObject, ExportFlags, ObjectRef};
use crate::Result;

/// Per-device callbacks that actually map memory for sharing
///
/// The session core owns descriptor plumbing and import deduplication; what
/// it cannot do is touch device memory. Drivers supply that part: `export`
/// publishes an object's backing as a shared buffer, `import` maps a shared
/// buffer into a fresh local object.
pub trait BufferDriver: Send + Sync {
    /// Whether this driver participates in buffer sharing at all
    ///
    /// Sessions refuse export and import with `Error::Unsupported` when this
    /// returns false.
    fn supports_sharing(&self) -> bool {
        true
    }

    /// Wrap `object`'s backing memory as a shareable buffer
    ///
    /// Called at most once per object; the session caches the result on the
    /// object and reuses it for every later export.
    fn export(&self, object: &BufferObject, flags: ExportFlags) -> Result<SharedBufferHandle>;

    /// Map `buffer` into a new local object
    ///
    /// Called only when the session has never seen `buffer` before. The
    /// returned object must carry an `ImportAttachment` for `buffer` so that
    /// teardown detaches it.
    fn import(&self, buffer: &SharedBufferHandle) -> Result<ObjectRef>;
}
