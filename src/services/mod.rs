//! Service layer
//!
//! Codec and filesystem concerns, separated from the editing logic.

pub mod format;
pub mod io;

pub use format::{OutputFormatHandler, BACKGROUND_REMOVED_FILE_NAME, ERASED_FILE_NAME};
pub use io::ImageIOService;
