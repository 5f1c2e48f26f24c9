//! hipBLAS context and matrix-matrix multiplication.
//!
//! hipBLAS owns its own status-code table, separate from the runtime's, so it
//! gets its own error type.

use crate::Stream;
use crate::bindings;
use crate::error::log_error;
use crate::memory::DeviceBuffer;
use std::fmt;
use thiserror::Error;

pub type BlasResult<T> = std::result::Result<T, BlasError>;

#[derive(Debug, Error)]
pub enum BlasError {
    #[error("hipBLAS not initialized")]
    NotInitialized,

    #[error("hipBLAS allocation failed")]
    AllocationFailed,

    #[error("Invalid value passed to hipBLAS")]
    InvalidValue,

    #[error("hipBLAS mapping error")]
    MappingError,

    #[error("hipBLAS execution failed")]
    ExecutionFailed,

    #[error("hipBLAS internal error")]
    InternalError,

    #[error("Operation not supported by hipBLAS")]
    NotSupported,

    #[error("Device architecture mismatch")]
    ArchMismatch,

    #[error("hipBLAS handle is null")]
    HandleIsNullPointer,

    #[error("Invalid enum value passed to hipBLAS")]
    InvalidEnum,

    #[error("hipBLAS error (status {0})")]
    Status(u32),
}

impl BlasError {
    pub fn from_status(status: bindings::hipblasStatus_t) -> Self {
        match status {
            bindings::hipblasStatus_t_HIPBLAS_STATUS_NOT_INITIALIZED => Self::NotInitialized,
            bindings::hipblasStatus_t_HIPBLAS_STATUS_ALLOC_FAILED => Self::AllocationFailed,
            bindings::hipblasStatus_t_HIPBLAS_STATUS_INVALID_VALUE => Self::InvalidValue,
            bindings::hipblasStatus_t_HIPBLAS_STATUS_MAPPING_ERROR => Self::MappingError,
            bindings::hipblasStatus_t_HIPBLAS_STATUS_EXECUTION_FAILED => Self::ExecutionFailed,
            bindings::hipblasStatus_t_HIPBLAS_STATUS_INTERNAL_ERROR => Self::InternalError,
            bindings::hipblasStatus_t_HIPBLAS_STATUS_NOT_SUPPORTED => Self::NotSupported,
            bindings::hipblasStatus_t_HIPBLAS_STATUS_ARCH_MISMATCH => Self::ArchMismatch,
            bindings::hipblasStatus_t_HIPBLAS_STATUS_HANDLE_IS_NULLPTR => Self::HandleIsNullPointer,
            bindings::hipblasStatus_t_HIPBLAS_STATUS_INVALID_ENUM => Self::InvalidEnum,
            _ => Self::Status(status),
        }
    }
}

/// How a matrix operand is transformed before the multiply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    None,
    Transpose,
    ConjugateTranspose,
}

impl From<Operation> for bindings::hipblasOperation_t {
    fn from(op: Operation) -> Self {
        match op {
            Operation::None => bindings::hipblasOperation_t_HIPBLAS_OP_N,
            Operation::Transpose => bindings::hipblasOperation_t_HIPBLAS_OP_T,
            Operation::ConjugateTranspose => bindings::hipblasOperation_t_HIPBLAS_OP_C,
        }
    }
}

/// A hipBLAS library context.
///
/// Required for all hipBLAS calls; carries the device and stream the library
/// operates on. The handle is thread-safe and destroyed on drop.
#[derive(Debug)]
pub struct BlasHandle {
    handle: bindings::hipblasHandle_t,
}

impl BlasHandle {
    pub fn new() -> BlasResult<Self> {
        let mut handle = std::ptr::null_mut();
        unsafe {
            let status = bindings::hipblasCreate(&mut handle);
            if status != bindings::hipblasStatus_t_HIPBLAS_STATUS_SUCCESS {
                return Err(BlasError::from_status(status));
            }
        }
        Ok(Self { handle })
    }

    pub fn handle(&self) -> bindings::hipblasHandle_t {
        self.handle
    }

    /// Routes subsequent hipBLAS work through `stream`.
    pub fn set_stream(&self, stream: &Stream) -> BlasResult<()> {
        unsafe {
            let status = bindings::hipblasSetStream(self.handle, stream.handle());
            if status != bindings::hipblasStatus_t_HIPBLAS_STATUS_SUCCESS {
                return Err(BlasError::from_status(status));
            }
        }
        Ok(())
    }
}

impl Drop for BlasHandle {
    fn drop(&mut self) {
        if !self.handle.is_null() {
            unsafe {
                let status = bindings::hipblasDestroy(self.handle);
                if status != bindings::hipblasStatus_t_HIPBLAS_STATUS_SUCCESS {
                    log_error(&format!(
                        "Failed to destroy hipBLAS handle: {}",
                        BlasError::from_status(status)
                    ));
                }
            }
        }
    }
}

impl fmt::Display for BlasHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlasHandle({:p})", self.handle)
    }
}

unsafe impl Send for BlasHandle {}
unsafe impl Sync for BlasHandle {}

/// Element types hipBLAS can run GEMM on.
pub trait GemmDatatype {
    #[allow(clippy::too_many_arguments)]
    unsafe fn gemm_raw(
        handle: bindings::hipblasHandle_t,
        trans_a: bindings::hipblasOperation_t,
        trans_b: bindings::hipblasOperation_t,
        m: i32,
        n: i32,
        k: i32,
        alpha: *const Self,
        a: *const Self,
        lda: i32,
        b: *const Self,
        ldb: i32,
        beta: *const Self,
        c: *mut Self,
        ldc: i32,
    ) -> bindings::hipblasStatus_t;
}

impl GemmDatatype for f32 {
    unsafe fn gemm_raw(
        handle: bindings::hipblasHandle_t,
        trans_a: bindings::hipblasOperation_t,
        trans_b: bindings::hipblasOperation_t,
        m: i32,
        n: i32,
        k: i32,
        alpha: *const Self,
        a: *const Self,
        lda: i32,
        b: *const Self,
        ldb: i32,
        beta: *const Self,
        c: *mut Self,
        ldc: i32,
    ) -> bindings::hipblasStatus_t {
        unsafe {
            bindings::hipblasSgemm(
                handle, trans_a, trans_b, m, n, k, alpha, a, lda, b, ldb, beta, c, ldc,
            )
        }
    }
}

impl GemmDatatype for f64 {
    unsafe fn gemm_raw(
        handle: bindings::hipblasHandle_t,
        trans_a: bindings::hipblasOperation_t,
        trans_b: bindings::hipblasOperation_t,
        m: i32,
        n: i32,
        k: i32,
        alpha: *const Self,
        a: *const Self,
        lda: i32,
        b: *const Self,
        ldb: i32,
        beta: *const Self,
        c: *mut Self,
        ldc: i32,
    ) -> bindings::hipblasStatus_t {
        unsafe {
            bindings::hipblasDgemm(
                handle, trans_a, trans_b, m, n, k, alpha, a, lda, b, ldb, beta, c, ldc,
            )
        }
    }
}

/// Matrix-matrix multiply: `C = alpha * op(A) * op(B) + beta * C`.
///
/// Matrices are column-major; `m`, `n`, `k` are the dimensions of `op(A)`
/// (m×k), `op(B)` (k×n) and `C` (m×n), with `lda`/`ldb`/`ldc` the leading
/// dimensions of the stored operands.
#[allow(clippy::too_many_arguments)]
pub fn gemm<T: GemmDatatype>(
    handle: &BlasHandle,
    trans_a: Operation,
    trans_b: Operation,
    m: i32,
    n: i32,
    k: i32,
    alpha: &T,
    a: &DeviceBuffer<T>,
    lda: i32,
    b: &DeviceBuffer<T>,
    ldb: i32,
    beta: &T,
    c: &mut DeviceBuffer<T>,
    ldc: i32,
) -> BlasResult<()> {
    unsafe {
        let status = T::gemm_raw(
            handle.handle(),
            trans_a.into(),
            trans_b.into(),
            m,
            n,
            k,
            alpha,
            a.as_ptr(),
            lda,
            b.as_ptr(),
            ldb,
            beta,
            c.as_mut_ptr(),
            ldc,
        );
        if status != bindings::hipblasStatus_t_HIPBLAS_STATUS_SUCCESS {
            return Err(BlasError::from_status(status));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upload<T: Copy + GemmDatatype>(data: &[T]) -> DeviceBuffer<T> {
        let mut buffer = DeviceBuffer::alloc(data.len()).unwrap();
        buffer.copy_from_host(data).unwrap();
        buffer
    }

    #[test]
    fn test_handle_create_and_drop() {
        let handle = BlasHandle::new().unwrap();
        assert!(!handle.handle().is_null());
        drop(handle);
    }

    #[test]
    fn test_handle_set_stream() {
        let handle = BlasHandle::new().unwrap();
        let stream = Stream::create().unwrap();
        assert!(handle.set_stream(&stream).is_ok());
    }

    #[test]
    fn test_sgemm() {
        let handle = BlasHandle::new().unwrap();

        // Column-major 2x2: A = [[1, 3], [2, 4]], B = [[5, 7], [6, 8]].
        let a = upload(&[1.0f32, 2.0, 3.0, 4.0]);
        let b = upload(&[5.0f32, 6.0, 7.0, 8.0]);
        let mut c = upload(&[0.0f32; 4]);

        gemm(
            &handle,
            Operation::None,
            Operation::None,
            2,
            2,
            2,
            &1.0,
            &a,
            2,
            &b,
            2,
            &0.0,
            &mut c,
            2,
        )
        .unwrap();

        let mut result = [0.0f32; 4];
        c.copy_to_host(&mut result).unwrap();
        assert_eq!(result, [23.0, 34.0, 31.0, 46.0]);
    }

    #[test]
    fn test_dgemm_transposed() {
        let handle = BlasHandle::new().unwrap();

        // op(A) = A^T where A is stored 2x2 column-major.
        let a = upload(&[1.0f64, 2.0, 3.0, 4.0]);
        let b = upload(&[1.0f64, 0.0, 0.0, 1.0]);
        let mut c = upload(&[0.0f64; 4]);

        gemm(
            &handle,
            Operation::Transpose,
            Operation::None,
            2,
            2,
            2,
            &1.0,
            &a,
            2,
            &b,
            2,
            &0.0,
            &mut c,
            2,
        )
        .unwrap();

        let mut result = [0.0f64; 4];
        c.copy_to_host(&mut result).unwrap();
        assert_eq!(result, [1.0, 3.0, 2.0, 4.0]);
    }

    #[test]
    fn test_gemm_beta_accumulates() {
        let handle = BlasHandle::new().unwrap();

        let a = upload(&[1.0f32, 0.0, 0.0, 1.0]);
        let b = upload(&[1.0f32, 1.0, 1.0, 1.0]);
        let mut c = upload(&[10.0f32; 4]);

        gemm(
            &handle,
            Operation::None,
            Operation::None,
            2,
            2,
            2,
            &2.0,
            &a,
            2,
            &b,
            2,
            &1.0,
            &mut c,
            2,
        )
        .unwrap();

        let mut result = [0.0f32; 4];
        c.copy_to_host(&mut result).unwrap();
        assert_eq!(result, [12.0, 12.0, 12.0, 12.0]);
    }

    #[test]
    fn test_gemm_rejects_negative_dimensions() {
        let handle = BlasHandle::new().unwrap();
        let a = upload(&[1.0f32; 4]);
        let b = upload(&[1.0f32; 4]);
        let mut c = upload(&[0.0f32; 4]);

        let result = gemm(
            &handle,
            Operation::None,
            Operation::None,
            -2,
            2,
            2,
            &1.0,
            &a,
            2,
            &b,
            2,
            &0.0,
            &mut c,
            2,
        );
        assert!(matches!(result, Err(BlasError::InvalidValue)));
    }
}
