//! HIP Runtime bindings for Rust
//!
//! This library provides safe Rust bindings for AMD's HIP runtime, plus a
//! C-linkage shim surface (`hip_initialize`, `hip_get_device_count`) for
//! callers that link the library through the C ABI.
//!
//! By default the crate is backed by an in-process mock of the runtime so it
//! builds and tests on machines without a GPU; enable the `rocm` feature to
//! link the real runtime from a ROCm install.

mod bindings;
pub mod blas;
mod device;
pub mod error;
mod export;
mod memory;
mod stream;

pub use blas::{BlasError, BlasHandle, BlasResult, Operation, gemm};
pub use device::{
    ComputeCapability, Device, device_count, get_device, set_device, synchronize,
};
pub use error::{HipError, Result};
pub use memory::{DeviceBuffer, DeviceMallocFlag, MemcpyKind};
pub use stream::Stream;

use std::fmt;
use std::os::raw::c_int;

/// Initialize the HIP runtime.
///
/// Most HIP calls initialize the runtime implicitly; this gives control over
/// when that happens.
pub fn init() -> Result<()> {
    unsafe {
        let status = bindings::hipInit(0);
        if status != bindings::hipError_t_hipSuccess {
            return Err(HipError::from_status(status));
        }
    }
    Ok(())
}

/// Version of the HIP runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeVersion {
    pub major: i32,
    pub minor: i32,
    pub patch: i32,
}

impl fmt::Display for RuntimeVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

// The runtime encodes its version as major * 1_000_000 + minor * 1_000 +
// patch, with -1 meaning unknown.
fn decode_runtime_version(version: c_int) -> RuntimeVersion {
    if version == -1 {
        return RuntimeVersion {
            major: 0,
            minor: 0,
            patch: 0,
        };
    }
    RuntimeVersion {
        major: version / 1_000_000,
        minor: (version / 1_000) % 1_000,
        patch: version % 1_000,
    }
}

/// Version of the loaded HIP runtime.
pub fn runtime_version() -> Result<RuntimeVersion> {
    let mut version: c_int = -1;
    unsafe {
        let status = bindings::hipRuntimeGetVersion(&mut version);
        if status != bindings::hipError_t_hipSuccess {
            return Err(HipError::from_status(status));
        }
    }
    Ok(decode_runtime_version(version))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init() {
        assert!(init().is_ok());
    }

    #[test]
    fn test_runtime_version() {
        let version = runtime_version().unwrap();
        assert!(version.major > 0);
    }

    #[test]
    fn test_decode_runtime_version() {
        let version = decode_runtime_version(6_002_041);
        assert_eq!(version.major, 6);
        assert_eq!(version.minor, 2);
        assert_eq!(version.patch, 41);
        assert_eq!(version.to_string(), "6.2.41");
    }

    #[test]
    fn test_decode_unknown_version() {
        let version = decode_runtime_version(-1);
        assert_eq!(version, RuntimeVersion { major: 0, minor: 0, patch: 0 });
    }

    #[cfg(not(feature = "rocm"))]
    #[test]
    fn test_init_surfaces_runtime_failure() {
        crate::bindings::mock::reset();
        crate::bindings::mock::set_init_status(crate::bindings::hipError_t_hipErrorNotSupported);
        let result = init();
        assert!(matches!(result, Err(HipError::NotSupported(_))));
    }
}
