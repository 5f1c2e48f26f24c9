//! Raw HIP runtime and hipBLAS entry points.
//!
//! With the `rocm` feature the declarations are generated by bindgen from the
//! ROCm headers and resolved against `libamdhip64` / `libhipblas`. Without it
//! the same surface is provided by a scriptable in-process mock, so the crate
//! and its tests work on machines with no GPU.
#![allow(non_upper_case_globals)]
#![allow(non_camel_case_types)]
#![allow(non_snake_case)]
#![allow(dead_code)]

#[cfg(feature = "rocm")]
include!(concat!(env!("OUT_DIR"), "/bindings.rs"));

#[cfg(not(feature = "rocm"))]
pub mod mock;
#[cfg(not(feature = "rocm"))]
pub use mock::*;
