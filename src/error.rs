use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ViewerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The bytes are not a readable GIF container (bad header, truncated stream).
    #[error("GIF decoder error: {0}")]
    Decode(#[from] ::gif::DecodingError),

    #[error("PNG encoder error: {0}")]
    Encode(#[from] png::EncodingError),

    /// The container parsed fine but holds no frames.
    #[error("File contains no frames")]
    EmptySequence,

    #[error("Not a supported file: {}", .0.display())]
    UnsupportedFile(PathBuf),

    #[error("Terminal error: {0}")]
    Terminal(String),

    #[error("Frame {index} out of range (have {len})")]
    FrameOutOfRange { index: usize, len: usize },
}

pub type Result<T> = std::result::Result<T, ViewerError>;
