//! Decode an animated GIF into fully composited frames, then step through,
//! play and export them in a terminal.

pub mod ansi;
pub mod bitmap;
pub mod common;
pub mod compositor;
pub mod config;
pub mod controller;
pub mod error;
pub mod export;
pub mod gif;
pub mod handler;
pub mod raster;
pub mod render;
pub mod window;

pub use crate::bitmap::Bitmap;
pub use crate::compositor::{composite_all, composite_all_with, CompositeOptions, CompositedFrame, RestorePrevious};
pub use crate::controller::{Controller, PlayState, ViewerState};
pub use crate::error::{Result, ViewerError};
pub use crate::gif::{DisposalCode, RawFrame};
pub use crate::raster::rasterize;
