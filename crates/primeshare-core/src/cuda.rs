//! CUDA driver: buffer sharing over CUDA IPC memory handles

use crate::buffer::{BufferBacking, SharedBuffer, SharedBufferHandle};
use crate::driver::BufferDriver;
use crate::object::{BufferObject, ExportFlags, ImportAttachment, ObjectRef};
use crate::{Error, Result};
use cudarc::driver::{CudaDevice, CudaSlice, DevicePtr};
use std::sync::Arc;

/// CUDA IPC memory handle (64 bytes)
#[derive(Clone, Copy)]
#[repr(C)]
pub struct CudaIpcHandle {
    pub reserved: [u8; 64],
}

impl Default for CudaIpcHandle {
    fn default() -> Self {
        Self { reserved: [0u8; 64] }
    }
}

/// Device allocation behind a CUDA buffer object
pub struct CudaBuffer {
    device: Arc<CudaDevice>,
    device_id: i32,
    ptr: u64,
    size: usize,
    ipc_handle: CudaIpcHandle,
    is_ipc_imported: bool,
}

impl CudaBuffer {
    /// Allocate device memory and publish its IPC handle
    pub fn alloc(device_id: i32, size: usize) -> Result<Self> {
        let device = CudaDevice::new(device_id as usize)
            .map_err(|e| Error::Cuda(e.to_string()))?;
        let device = Arc::new(device);

        let slice: CudaSlice<u8> = device
            .alloc_zeros(size)
            .map_err(|e| Error::Cuda(e.to_string()))?;

        let ptr = *slice.device_ptr() as u64;
        let ipc_handle = Self::get_ipc_handle(ptr)?;

        // Ownership of the allocation moves to this struct; freed in Drop.
        std::mem::forget(slice);

        Ok(Self {
            device,
            device_id,
            ptr,
            size,
            ipc_handle,
            is_ipc_imported: false,
        })
    }

    /// Map another process's allocation from its IPC handle
    pub fn from_ipc_handle(device_id: i32, handle: &CudaIpcHandle, size: usize) -> Result<Self> {
        let device = CudaDevice::new(device_id as usize)
            .map_err(|e| Error::Cuda(e.to_string()))?;
        let device = Arc::new(device);

        let ptr = Self::open_ipc_handle(handle)?;

        Ok(Self {
            device,
            device_id,
            ptr,
            size,
            ipc_handle: *handle,
            is_ipc_imported: true,
        })
    }

    /// Get device ID
    pub fn device_id(&self) -> i32 {
        self.device_id
    }

    /// Get device pointer
    pub fn device_ptr(&self) -> u64 {
        self.ptr
    }

    /// Get size
    pub fn size(&self) -> usize {
        self.size
    }

    /// Get IPC handle
    pub fn ipc_handle(&self) -> &CudaIpcHandle {
        &self.ipc_handle
    }

    fn get_ipc_handle(ptr: u64) -> Result<CudaIpcHandle> {
        let mut handle = CudaIpcHandle::default();

        unsafe {
            let result = cudarc::driver::sys::cuIpcGetMemHandle(
                handle.reserved.as_mut_ptr() as *mut _,
                ptr,
            );
            if result != cudarc::driver::sys::CUresult::CUDA_SUCCESS {
                return Err(Error::Cuda(format!("cuIpcGetMemHandle failed: {:?}", result)));
            }
        }

        Ok(handle)
    }

    fn open_ipc_handle(handle: &CudaIpcHandle) -> Result<u64> {
        let mut ptr: u64 = 0;

        unsafe {
            let result = cudarc::driver::sys::cuIpcOpenMemHandle(
                &mut ptr as *mut u64 as *mut _,
                *(handle.reserved.as_ptr() as *const _),
                cudarc::driver::sys::CUipcMem_flags::CU_IPC_MEM_LAZY_ENABLE_PEER_ACCESS,
            );
            if result != cudarc::driver::sys::CUresult::CUDA_SUCCESS {
                return Err(Error::Cuda(format!("cuIpcOpenMemHandle failed: {:?}", result)));
            }
        }

        Ok(ptr)
    }

    fn close_ipc_handle(ptr: u64) -> Result<()> {
        unsafe {
            let result = cudarc::driver::sys::cuIpcCloseMemHandle(ptr);
            if result != cudarc::driver::sys::CUresult::CUDA_SUCCESS {
                return Err(Error::Cuda(format!("cuIpcCloseMemHandle failed: {:?}", result)));
            }
        }
        Ok(())
    }

    fn free(ptr: u64) -> Result<()> {
        unsafe {
            let result = cudarc::driver::sys::cuMemFree_v2(ptr);
            if result != cudarc::driver::sys::CUresult::CUDA_SUCCESS {
                return Err(Error::Cuda(format!("cuMemFree failed: {:?}", result)));
            }
        }
        Ok(())
    }
}

impl Drop for CudaBuffer {
    fn drop(&mut self) {
        if self.is_ipc_imported {
            let _ = Self::close_ipc_handle(self.ptr);
        } else {
            let _ = Self::free(self.ptr);
        }
    }
}

// Safety: CUDA driver API calls are thread-safe; the raw device pointer is
// process-wide.
unsafe impl Send for CudaBuffer {}
unsafe impl Sync for CudaBuffer {}

/// Buffer driver sharing device memory through CUDA IPC
pub struct CudaPrimeDriver {
    device_id: i32,
}

impl CudaPrimeDriver {
    pub fn new(device_id: i32) -> Self {
        Self { device_id }
    }

    /// Allocate a locally-owned device object of `size` bytes
    pub fn create_object(&self, size: usize) -> Result<ObjectRef> {
        let buf = CudaBuffer::alloc(self.device_id, size)?;
        Ok(Arc::new(BufferObject::with_private(size, buf)))
    }
}

impl BufferDriver for CudaPrimeDriver {
    fn export(&self, object: &BufferObject, _flags: ExportFlags) -> Result<SharedBufferHandle> {
        let buf: &CudaBuffer = object
            .driver_private()
            .ok_or_else(|| Error::Driver("object has no CUDA backing".to_string()))?;

        Ok(SharedBuffer::new(
            object.size(),
            BufferBacking::CudaIpc {
                handle: *buf.ipc_handle(),
                device_id: buf.device_id(),
            },
        ))
    }

    fn import(&self, buffer: &SharedBufferHandle) -> Result<ObjectRef> {
        let (handle, device_id) = match buffer.backing() {
            BufferBacking::CudaIpc { handle, device_id } => (handle, *device_id),
            _ => {
                return Err(Error::Driver(
                    "CUDA cannot import non-IPC backing".to_string(),
                ))
            }
        };

        let mapped = CudaBuffer::from_ipc_handle(device_id, handle, buffer.size())?;

        // Device memory has no page-backed scatter mapping; the attachment
        // only tracks the shared-buffer reference.
        let attach = ImportAttachment::new(buffer.clone());
        Ok(Arc::new(BufferObject::imported(
            buffer.size(),
            attach,
            mapped,
        )))
    }
}
