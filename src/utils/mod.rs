//! Utility modules for common operations

pub mod compose;
pub mod preprocessing;
pub mod providers;

pub use compose::flatten_alpha;
pub use preprocessing::{ImagePreprocessor, Letterbox, PreprocessingOptions};
pub use providers::{ExecutionProviderManager, ProviderInfo};
