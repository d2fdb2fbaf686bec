pub mod clipboard;
pub mod controller;
pub mod reply;

use std::path::PathBuf;

use thiserror::Error;

pub use clipboard::{ClipboardSink, SystemClipboard};
pub use controller::{Composer, ComposerSettings, ImageUpload};

#[derive(Debug, Error)]
pub enum ComposerError {
    #[error("Please select an image file (got {mime_type})")]
    NotAnImage { mime_type: String },
    #[error("Failed to read image {}: {source}", path.display())]
    ImageRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
