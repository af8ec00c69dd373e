//! Fatal, I/O-boundary errors.
//!
//! Alignment failures inside the core are value-typed — aligners return
//! `Transform::Drop`, the matcher sets `Star::index = -1` — rather than
//! using this type. `SpicaError` exists only for failures a caller can't
//! route around: an unreadable file, or a pass that can't produce any
//! output at all.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SpicaError {
    #[error("failed to allocate image buffer")]
    AllocationFailure,

    #[error("invalid image: {0}")]
    InvalidImage(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("PNG error: {0}")]
    Png(#[from] image::ImageError),
}
