//! primeshare - Cross-process GPU buffer sharing
//!
//! One process exports a locally-owned buffer object as an opaque
//! descriptor; another imports it as a local object of its own. Repeated
//! imports of the same underlying buffer within one session resolve to a
//! single local object through a per-session registry, and repeated exports
//! of one object reuse its shareable wrapper.

pub mod buffer;
pub mod driver;
pub mod error;
pub mod handles;
pub mod object;
pub mod registry;
pub mod session;
pub mod sg;
pub mod shm;
pub mod sysmem;
pub mod transport;

#[cfg(feature = "cuda")]
pub mod cuda;

pub use buffer::{BufferBacking, BufferId, SharedBuffer, SharedBufferHandle};
pub use driver::BufferDriver;
pub use error::{Error, Result};
pub use handles::{HandleTable, LocalHandle};
pub use object::{BufferObject, ExportFlags, ImportAttachment, ObjectRef};
pub use registry::ImportRegistry;
pub use session::Session;
pub use sg::{PhysPage, ScatterDescriptor, ScatterSegment, PAGE_SIZE};
pub use shm::SharedMemory;
pub use sysmem::{SysmemDriver, SysmemObject};
pub use transport::{DescriptorTable, RawDescriptor};
