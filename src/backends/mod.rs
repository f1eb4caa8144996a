//! Segmentation backend implementations
//!
//! - Tract backend (pure Rust, default)
//! - ONNX Runtime backend (native, optional CUDA)
//! - Mock backend (no model, synthetic mask)

pub mod mock;

#[cfg(feature = "onnx")]
pub mod onnx;

#[cfg(feature = "tract")]
pub mod tract;

pub use self::mock::MockBackend;

#[cfg(feature = "onnx")]
pub use self::onnx::OnnxBackend;

#[cfg(feature = "tract")]
pub use self::tract::TractBackend;
