use crate::bindings;
use crate::{HipError, Result};
use std::ffi::CStr;
use std::fmt;
use std::os::raw::{c_char, c_int};

/// Handle to a HIP device, identified by its runtime ordinal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Device {
    pub(crate) id: i32,
}

/// Compute capability of a device, as reported by the runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComputeCapability {
    pub major: i32,
    pub minor: i32,
}

impl fmt::Display for ComputeCapability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

impl Device {
    /// Wraps a device ordinal. The ordinal matches the index used when
    /// enumerating devices; no validation happens until the handle is used.
    pub fn new(id: i32) -> Self {
        Device { id }
    }

    pub fn id(&self) -> i32 {
        self.id
    }

    /// Device name reported by the runtime.
    pub fn name(&self) -> Result<String> {
        let mut buffer = [0 as c_char; 64];

        unsafe {
            let status =
                bindings::hipDeviceGetName(buffer.as_mut_ptr(), buffer.len() as c_int, self.id);
            if status != bindings::hipError_t_hipSuccess {
                return Err(HipError::from_status_with_context(
                    status,
                    "Failed to get device name",
                ));
            }

            let c_str = CStr::from_ptr(buffer.as_ptr());
            match c_str.to_str() {
                Ok(s) => Ok(s.to_string()),
                Err(_) => Err(HipError::StringConversionError),
            }
        }
    }

    /// Total memory on the device, in bytes.
    pub fn total_mem(&self) -> Result<usize> {
        let mut size = 0usize;
        unsafe {
            let status = bindings::hipDeviceTotalMem(&mut size, self.id);
            if status != bindings::hipError_t_hipSuccess {
                return Err(HipError::from_status_with_context(
                    status,
                    "Failed to get device total memory",
                ));
            }
        }
        Ok(size)
    }

    pub fn compute_capability(&self) -> Result<ComputeCapability> {
        let mut major: c_int = -1;
        let mut minor: c_int = -1;
        unsafe {
            let status = bindings::hipDeviceComputeCapability(&mut major, &mut minor, self.id);
            if status != bindings::hipError_t_hipSuccess {
                return Err(HipError::from_status_with_context(
                    status,
                    "Failed to get device compute capability",
                ));
            }
        }
        Ok(ComputeCapability { major, minor })
    }
}

/// Number of devices visible to the runtime.
pub fn device_count() -> Result<i32> {
    let mut count: c_int = 0;
    unsafe {
        let status = bindings::hipGetDeviceCount(&mut count);
        if status != bindings::hipError_t_hipSuccess {
            return Err(HipError::from_status(status));
        }
    }
    Ok(count)
}

/// The device currently active on the calling thread.
pub fn get_device() -> Result<Device> {
    let mut id: c_int = -1;
    unsafe {
        let status = bindings::hipGetDevice(&mut id);
        if status != bindings::hipError_t_hipSuccess {
            return Err(HipError::from_status(status));
        }
    }
    Ok(Device::new(id))
}

/// Makes `device` active for subsequent HIP calls on the calling thread.
/// Other host threads are not affected.
pub fn set_device(device: Device) -> Result<Device> {
    unsafe {
        let status = bindings::hipSetDevice(device.id);
        if status != bindings::hipError_t_hipSuccess {
            return Err(HipError::from_status_with_context(
                status,
                "Failed to set active device",
            ));
        }
    }
    Ok(device)
}

/// Blocks until all work submitted to the current device has completed.
pub fn synchronize() -> Result<()> {
    unsafe {
        let status = bindings::hipDeviceSynchronize();
        if status != bindings::hipError_t_hipSuccess {
            return Err(HipError::from_status(status));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_count() {
        let count = device_count().unwrap();
        assert!(count > 0);
    }

    #[test]
    fn test_get_device() {
        let device = get_device().unwrap();
        assert_eq!(device.id(), 0);
    }

    #[test]
    fn test_set_device() {
        let device = set_device(Device::new(0)).unwrap();
        assert_eq!(device.id(), 0);
    }

    #[test]
    fn test_set_invalid_device() {
        let result = set_device(Device::new(99));
        assert!(matches!(result, Err(HipError::InvalidDevice(_))));
    }

    #[test]
    fn test_device_name() {
        let name = Device::new(0).name().unwrap();
        assert!(!name.is_empty());
    }

    #[test]
    fn test_device_name_invalid_device() {
        let result = Device::new(99).name();
        assert!(matches!(result, Err(HipError::InvalidDevice(_))));
    }

    #[test]
    fn test_total_mem() {
        let size = Device::new(0).total_mem().unwrap();
        assert!(size > 0);
    }

    #[test]
    fn test_compute_capability() {
        let cc = Device::new(0).compute_capability().unwrap();
        assert!(cc.major > 0);
        assert!(!cc.to_string().is_empty());
    }

    #[test]
    fn test_synchronize() {
        assert!(synchronize().is_ok());
    }

    #[cfg(not(feature = "rocm"))]
    #[test]
    fn test_device_count_reflects_mock() {
        crate::bindings::mock::reset();
        crate::bindings::mock::set_device_count(4);
        assert_eq!(device_count().unwrap(), 4);
    }
}
