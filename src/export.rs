use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use png::{BitDepth, ColorType, Compression};
use tracing::info;

use crate::bitmap::Bitmap;
use crate::compositor::CompositedFrame;
use crate::error::{Result, ViewerError};

/// File name for the frame at zero-based `index`: numbering starts at 1.
pub fn frame_file_name(index: usize) -> String {
    format!("frame_{}.png", index + 1)
}

/// Writes `bitmap` as an 8-bit RGBA PNG named after `index` inside `dir`.
pub fn export_as_image(bitmap: &Bitmap, dir: &Path, index: usize) -> Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let path = dir.join(frame_file_name(index));

    let file = File::create(&path)?;
    let w = &mut BufWriter::new(file);

    let mut encoder = png::Encoder::new(w, bitmap.width(), bitmap.height());
    encoder.set_color(ColorType::Rgba);
    encoder.set_depth(BitDepth::Eight);
    encoder.set_compression(Compression::Default);

    let mut writer = encoder.write_header()?;
    writer.write_image_data(bitmap.as_bytes())?;
    writer.finish()?;

    info!(path = %path.display(), "exported frame");
    Ok(path)
}

/// Exports one frame of the sequence.
pub fn export_frame(frames: &[CompositedFrame], index: usize, dir: &Path) -> Result<PathBuf> {
    let frame = frames.get(index).ok_or(ViewerError::FrameOutOfRange {
        index,
        len: frames.len(),
    })?;
    export_as_image(&frame.bitmap, dir, index)
}

/// Exports every frame, in order.
pub fn export_all(frames: &[CompositedFrame], dir: &Path) -> Result<Vec<PathBuf>> {
    frames
        .iter()
        .enumerate()
        .map(|(index, frame)| export_as_image(&frame.bitmap, dir, index))
        .collect()
}
