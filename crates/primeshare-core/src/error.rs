//! Error types for primeshare

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("local handle not found: {0}")]
    HandleNotFound(u32),

    #[error("invalid buffer descriptor: {0}")]
    InvalidDescriptor(i32),

    #[error("buffer sharing not supported by driver")]
    Unsupported,

    #[error("allocation failed: {0}")]
    AllocationFailure(String),

    #[error("driver error: {0}")]
    Driver(String),

    #[error("shared memory error: {0}")]
    SharedMemory(String),

    #[cfg(feature = "cuda")]
    #[error("CUDA error: {0}")]
    Cuda(String),
}

pub type Result<T> = std::result::Result<T, Error>;
