use crate::bindings;
use std::ffi::CStr;
use std::os::raw::c_char;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, HipError>;

#[derive(Debug, Error)]
pub enum HipError {
    #[error("Invalid argument: {0}")]
    InvalidValue(String),

    #[error("Out of memory: {0}")]
    OutOfMemory(String),

    #[error("Runtime not initialized: {0}")]
    NotInitialized(String),

    #[error("Runtime deinitialized: {0}")]
    Deinitialized(String),

    #[error("Invalid device: {0}")]
    InvalidDevice(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Operation not ready: {0}")]
    NotReady(String),

    #[error("Operation not supported: {0}")]
    NotSupported(String),

    #[error("HIP error {status}: {description}")]
    HipStatus { status: u32, description: String },

    #[error("String conversion error")]
    StringConversionError,
}

impl HipError {
    pub fn from_status(status: bindings::hipError_t) -> Self {
        let description = get_status_string(status);

        match status {
            bindings::hipError_t_hipErrorInvalidValue => Self::InvalidValue(description),
            bindings::hipError_t_hipErrorOutOfMemory => Self::OutOfMemory(description),
            bindings::hipError_t_hipErrorNotInitialized => Self::NotInitialized(description),
            bindings::hipError_t_hipErrorDeinitialized => Self::Deinitialized(description),
            bindings::hipError_t_hipErrorInvalidDevice => Self::InvalidDevice(description),
            bindings::hipError_t_hipErrorFileNotFound => Self::FileNotFound(description),
            bindings::hipError_t_hipErrorNotReady => Self::NotReady(description),
            bindings::hipError_t_hipErrorNotSupported => Self::NotSupported(description),
            _ => Self::HipStatus {
                status,
                description,
            },
        }
    }

    pub fn from_status_with_context(status: bindings::hipError_t, context: &str) -> Self {
        let mut error = Self::from_status(status);

        match &mut error {
            Self::InvalidValue(msg)
            | Self::OutOfMemory(msg)
            | Self::NotInitialized(msg)
            | Self::Deinitialized(msg)
            | Self::InvalidDevice(msg)
            | Self::FileNotFound(msg)
            | Self::NotReady(msg)
            | Self::NotSupported(msg) => {
                *msg = format!("{}: {}", context, msg);
            }
            Self::HipStatus { description, .. } => {
                *description = format!("{}: {}", context, description);
            }
            _ => {}
        }

        error
    }

    /// The raw status code from the runtime's code table.
    pub fn status_code(&self) -> u32 {
        match self {
            Self::InvalidValue(_) => bindings::hipError_t_hipErrorInvalidValue,
            Self::OutOfMemory(_) => bindings::hipError_t_hipErrorOutOfMemory,
            Self::NotInitialized(_) => bindings::hipError_t_hipErrorNotInitialized,
            Self::Deinitialized(_) => bindings::hipError_t_hipErrorDeinitialized,
            Self::InvalidDevice(_) => bindings::hipError_t_hipErrorInvalidDevice,
            Self::FileNotFound(_) => bindings::hipError_t_hipErrorFileNotFound,
            Self::NotReady(_) => bindings::hipError_t_hipErrorNotReady,
            Self::NotSupported(_) => bindings::hipError_t_hipErrorNotSupported,
            Self::HipStatus { status, .. } => *status,
            Self::StringConversionError => bindings::hipError_t_hipErrorUnknown,
        }
    }
}

fn get_status_string(status: bindings::hipError_t) -> String {
    unsafe {
        let ptr: *const c_char = bindings::hipGetErrorString(status);
        if ptr.is_null() {
            return format!("HIP status code: {}", status);
        }
        match CStr::from_ptr(ptr).to_str() {
            Ok(s) => s.to_string(),
            Err(_) => format!("HIP status code: {}", status),
        }
    }
}

// Logging utilities
pub fn log_info(message: &str) {
    eprintln!("[HIP INFO] {}", message);
}

pub fn log_warning(message: &str) {
    eprintln!("[HIP WARN] {}", message);
}

pub fn log_error(message: &str) {
    eprintln!("[HIP ERROR] {}", message);
}

pub fn log_debug(message: &str) {
    if std::env::var("HIP_DEBUG").is_ok() {
        eprintln!("[HIP DEBUG] {}", message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_status_maps_known_codes() {
        assert!(matches!(
            HipError::from_status(bindings::hipError_t_hipErrorInvalidValue),
            HipError::InvalidValue(_)
        ));
        assert!(matches!(
            HipError::from_status(bindings::hipError_t_hipErrorNotInitialized),
            HipError::NotInitialized(_)
        ));
        assert!(matches!(
            HipError::from_status(bindings::hipError_t_hipErrorInvalidDevice),
            HipError::InvalidDevice(_)
        ));
    }

    #[test]
    fn test_from_status_unknown_code_keeps_raw_value() {
        let error = HipError::from_status(77);
        match error {
            HipError::HipStatus { status, .. } => assert_eq!(status, 77),
            other => panic!("unexpected variant: {:?}", other),
        }
    }

    #[test]
    fn test_status_code_roundtrip() {
        for code in [1u32, 2, 3, 4, 101, 301, 600, 801, 77] {
            assert_eq!(HipError::from_status(code).status_code(), code);
        }
    }

    #[test]
    fn test_context_is_prepended() {
        let error = HipError::from_status_with_context(
            bindings::hipError_t_hipErrorInvalidDevice,
            "Failed to query device 3",
        );
        assert!(error.to_string().contains("Failed to query device 3"));
    }
}
