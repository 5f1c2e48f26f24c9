use crate::bindings;
use crate::error::{log_debug, log_error};
use crate::{HipError, Result};
use bitflags::bitflags;
use std::marker::PhantomData;
use std::os::raw::c_void;
use std::ptr;

bitflags! {
    /// Flags accepted by the extended device allocator.
    ///
    /// Values mirror the runtime's `hipDeviceMalloc*` constants; UNCACHED is
    /// not a bit combination of the lower flags, the runtime defines it as 0x3.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct DeviceMallocFlag: u32 {
        const DEFAULT = 0x0;
        const FINEGRAINED = 0x1;
        const SIGNAL_MEMORY = 0x2;
        const UNCACHED = 0x3;
        const CONTIGUOUS = 0x4;
    }
}

/// Direction of a `hipMemcpy` transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemcpyKind {
    HostToHost,
    HostToDevice,
    DeviceToHost,
    DeviceToDevice,
    Default,
}

impl From<MemcpyKind> for bindings::hipMemcpyKind {
    fn from(kind: MemcpyKind) -> Self {
        match kind {
            MemcpyKind::HostToHost => bindings::hipMemcpyKind_hipMemcpyHostToHost,
            MemcpyKind::HostToDevice => bindings::hipMemcpyKind_hipMemcpyHostToDevice,
            MemcpyKind::DeviceToHost => bindings::hipMemcpyKind_hipMemcpyDeviceToHost,
            MemcpyKind::DeviceToDevice => bindings::hipMemcpyKind_hipMemcpyDeviceToDevice,
            MemcpyKind::Default => bindings::hipMemcpyKind_hipMemcpyDefault,
        }
    }
}

/// Owned device allocation holding `len` elements of `T`.
///
/// The memory is freed when the buffer is dropped. A zero-length buffer holds
/// a null pointer and never touches the runtime.
#[derive(Debug)]
pub struct DeviceBuffer<T> {
    ptr: *mut T,
    len: usize,
    _marker: PhantomData<T>,
}

impl<T> DeviceBuffer<T> {
    /// Allocates room for `len` elements on the current device.
    pub fn alloc(len: usize) -> Result<Self> {
        if len == 0 {
            return Ok(Self {
                ptr: ptr::null_mut(),
                len: 0,
                _marker: PhantomData,
            });
        }

        let bytes = len * std::mem::size_of::<T>();
        log_debug(&format!("Allocating {} bytes of device memory", bytes));

        let mut raw: *mut c_void = ptr::null_mut();
        unsafe {
            let status = bindings::hipMalloc(&mut raw, bytes);
            if status != bindings::hipError_t_hipSuccess {
                let error = HipError::from_status_with_context(
                    status,
                    &format!("Failed to allocate {} bytes on device", bytes),
                );
                log_error(&format!("Device allocation failed: {}", error));
                return Err(error);
            }
        }

        Ok(Self {
            ptr: raw as *mut T,
            len,
            _marker: PhantomData,
        })
    }

    /// Allocates with the extended allocator, e.g. for fine-grained memory.
    pub fn alloc_with_flags(len: usize, flags: DeviceMallocFlag) -> Result<Self> {
        if len == 0 {
            return Ok(Self {
                ptr: ptr::null_mut(),
                len: 0,
                _marker: PhantomData,
            });
        }

        let bytes = len * std::mem::size_of::<T>();
        let mut raw: *mut c_void = ptr::null_mut();
        unsafe {
            let status = bindings::hipExtMallocWithFlags(&mut raw, bytes, flags.bits());
            if status != bindings::hipError_t_hipSuccess {
                return Err(HipError::from_status_with_context(
                    status,
                    &format!("Failed to allocate {} bytes on device (flags {:?})", bytes, flags),
                ));
            }
        }

        Ok(Self {
            ptr: raw as *mut T,
            len,
            _marker: PhantomData,
        })
    }

    pub fn as_ptr(&self) -> *const T {
        self.ptr
    }

    pub fn as_mut_ptr(&mut self) -> *mut T {
        self.ptr
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn byte_size(&self) -> usize {
        self.len * std::mem::size_of::<T>()
    }

    /// Copies `src` into the buffer. `src` must have exactly `len` elements.
    pub fn copy_from_host(&mut self, src: &[T]) -> Result<()>
    where
        T: Copy,
    {
        if src.len() != self.len {
            return Err(HipError::InvalidValue(format!(
                "Host slice has {} elements, buffer holds {}",
                src.len(),
                self.len
            )));
        }
        if self.len == 0 {
            return Ok(());
        }

        unsafe {
            let status = bindings::hipMemcpy(
                self.ptr as *mut c_void,
                src.as_ptr() as *const c_void,
                self.byte_size(),
                MemcpyKind::HostToDevice.into(),
            );
            if status != bindings::hipError_t_hipSuccess {
                return Err(HipError::from_status_with_context(
                    status,
                    "Failed to copy host memory to device",
                ));
            }
        }
        Ok(())
    }

    /// Copies the buffer into `dst`. `dst` must have exactly `len` elements.
    pub fn copy_to_host(&self, dst: &mut [T]) -> Result<()>
    where
        T: Copy,
    {
        if dst.len() != self.len {
            return Err(HipError::InvalidValue(format!(
                "Host slice has {} elements, buffer holds {}",
                dst.len(),
                self.len
            )));
        }
        if self.len == 0 {
            return Ok(());
        }

        unsafe {
            let status = bindings::hipMemcpy(
                dst.as_mut_ptr() as *mut c_void,
                self.ptr as *const c_void,
                self.byte_size(),
                MemcpyKind::DeviceToHost.into(),
            );
            if status != bindings::hipError_t_hipSuccess {
                return Err(HipError::from_status_with_context(
                    status,
                    "Failed to copy device memory to host",
                ));
            }
        }
        Ok(())
    }

    /// Device-to-device copy into `dst`.
    pub fn copy_to_device(&self, dst: &mut DeviceBuffer<T>) -> Result<()> {
        if dst.len != self.len {
            return Err(HipError::InvalidValue(format!(
                "Destination holds {} elements, source holds {}",
                dst.len, self.len
            )));
        }
        if self.len == 0 {
            return Ok(());
        }

        unsafe {
            let status = bindings::hipMemcpy(
                dst.ptr as *mut c_void,
                self.ptr as *const c_void,
                self.byte_size(),
                MemcpyKind::DeviceToDevice.into(),
            );
            if status != bindings::hipError_t_hipSuccess {
                return Err(HipError::from_status_with_context(
                    status,
                    "Failed to copy device memory to device",
                ));
            }
        }
        Ok(())
    }

    /// Fills every byte of the allocation with `value`.
    pub fn memset(&mut self, value: u8) -> Result<()> {
        if self.len == 0 {
            return Ok(());
        }
        unsafe {
            let status =
                bindings::hipMemset(self.ptr as *mut c_void, value as i32, self.byte_size());
            if status != bindings::hipError_t_hipSuccess {
                return Err(HipError::from_status_with_context(
                    status,
                    "Failed to memset device memory",
                ));
            }
        }
        Ok(())
    }
}

impl<T> Drop for DeviceBuffer<T> {
    fn drop(&mut self) {
        if !self.ptr.is_null() {
            log_debug(&format!(
                "Freeing device memory at {:p} ({} bytes)",
                self.ptr,
                self.byte_size()
            ));
            unsafe {
                let status = bindings::hipFree(self.ptr as *mut c_void);
                if status != bindings::hipError_t_hipSuccess {
                    log_error(&format!(
                        "Failed to free device memory: {}",
                        HipError::from_status(status)
                    ));
                }
            }
        }
    }
}

unsafe impl<T: Send> Send for DeviceBuffer<T> {}
unsafe impl<T: Sync> Sync for DeviceBuffer<T> {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alloc_and_roundtrip() {
        let host: Vec<f32> = (0..128).map(|v| v as f32).collect();
        let mut buffer = DeviceBuffer::<f32>::alloc(host.len()).unwrap();
        buffer.copy_from_host(&host).unwrap();

        let mut back = vec![0.0f32; host.len()];
        buffer.copy_to_host(&mut back).unwrap();
        assert_eq!(host, back);
    }

    #[test]
    fn test_zero_length_alloc() {
        let buffer = DeviceBuffer::<u64>::alloc(0).unwrap();
        assert!(buffer.is_empty());
        assert!(buffer.as_ptr().is_null());
    }

    #[test]
    fn test_alloc_with_flags() {
        let buffer =
            DeviceBuffer::<u8>::alloc_with_flags(256, DeviceMallocFlag::FINEGRAINED).unwrap();
        assert_eq!(buffer.len(), 256);
    }

    #[test]
    fn test_length_mismatch_is_rejected() {
        let mut buffer = DeviceBuffer::<u32>::alloc(8).unwrap();
        let host = vec![0u32; 4];
        let result = buffer.copy_from_host(&host);
        assert!(matches!(result, Err(HipError::InvalidValue(_))));
    }

    #[test]
    fn test_memset() {
        let mut buffer = DeviceBuffer::<u8>::alloc(32).unwrap();
        buffer.memset(0xab).unwrap();

        let mut back = vec![0u8; 32];
        buffer.copy_to_host(&mut back).unwrap();
        assert!(back.iter().all(|&b| b == 0xab));
    }

    #[test]
    fn test_device_to_device_copy() {
        let host: Vec<i32> = (0..16).collect();
        let mut src = DeviceBuffer::<i32>::alloc(16).unwrap();
        src.copy_from_host(&host).unwrap();

        let mut dst = DeviceBuffer::<i32>::alloc(16).unwrap();
        src.copy_to_device(&mut dst).unwrap();

        let mut back = vec![0i32; 16];
        dst.copy_to_host(&mut back).unwrap();
        assert_eq!(host, back);
    }

    #[cfg(not(feature = "rocm"))]
    #[test]
    fn test_drop_releases_allocation() {
        crate::bindings::mock::reset();
        let buffer = DeviceBuffer::<u8>::alloc(64).unwrap();
        assert_eq!(crate::bindings::mock::live_allocations(), 1);
        drop(buffer);
        assert_eq!(crate::bindings::mock::live_allocations(), 0);
    }

    #[cfg(not(feature = "rocm"))]
    #[test]
    fn test_failed_alloc_surfaces_out_of_memory() {
        crate::bindings::mock::reset();
        crate::bindings::mock::fail_next_alloc(crate::bindings::hipError_t_hipErrorOutOfMemory);
        let result = DeviceBuffer::<u8>::alloc(64);
        assert!(matches!(result, Err(HipError::OutOfMemory(_))));
    }
}
