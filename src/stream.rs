use crate::bindings;
use crate::error::log_error;
use crate::{HipError, Result};
use std::ptr;

/// RAII handle to a HIP stream. Commands submitted to a stream execute in
/// order; the stream is destroyed on drop.
#[derive(Debug)]
pub struct Stream {
    handle: bindings::hipStream_t,
}

impl Stream {
    pub fn create() -> Result<Self> {
        let mut handle: bindings::hipStream_t = ptr::null_mut();
        unsafe {
            let status = bindings::hipStreamCreate(&mut handle);
            if status != bindings::hipError_t_hipSuccess {
                return Err(HipError::from_status_with_context(
                    status,
                    "Failed to create stream",
                ));
            }
        }
        Ok(Stream { handle })
    }

    pub fn handle(&self) -> bindings::hipStream_t {
        self.handle
    }

    /// Blocks until all commands in the stream have completed.
    pub fn synchronize(&self) -> Result<()> {
        unsafe {
            let status = bindings::hipStreamSynchronize(self.handle);
            if status != bindings::hipError_t_hipSuccess {
                return Err(HipError::from_status_with_context(
                    status,
                    "Failed to synchronize stream",
                ));
            }
        }
        Ok(())
    }
}

impl Drop for Stream {
    fn drop(&mut self) {
        if !self.handle.is_null() {
            unsafe {
                let status = bindings::hipStreamDestroy(self.handle);
                if status != bindings::hipError_t_hipSuccess {
                    log_error(&format!(
                        "Failed to destroy stream: {}",
                        HipError::from_status(status)
                    ));
                }
            }
        }
    }
}

unsafe impl Send for Stream {}
unsafe impl Sync for Stream {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_create() {
        let stream = Stream::create().unwrap();
        assert!(!stream.handle().is_null());
    }

    #[test]
    fn test_stream_synchronize() {
        let stream = Stream::create().unwrap();
        assert!(stream.synchronize().is_ok());
    }

    #[test]
    fn test_stream_drop() {
        let stream = Stream::create().unwrap();
        drop(stream);
    }
}
