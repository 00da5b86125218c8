//! Adapter over the `gif` crate: raw bytes in, palette-indexed frame records out.

use std::io::Cursor;

use gif::{ColorOutput, DecodeOptions, Decoder, DisposalMethod, Repeat};
use tracing::{debug, info};

use crate::error::Result;

/// How the area of a frame is treated before the next frame is drawn.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum DisposalCode {
    #[default]
    None = 0,
    DoNotDispose = 1,
    RestoreBackground = 2,
    RestorePrevious = 3,
}

impl DisposalCode {
    /// Unknown codes (4-7 are reserved by the format) fall back to `None`.
    pub fn from_code(code: u8) -> Self {
        match code {
            1 => DisposalCode::DoNotDispose,
            2 => DisposalCode::RestoreBackground,
            3 => DisposalCode::RestorePrevious,
            _ => DisposalCode::None,
        }
    }

    pub fn code(self) -> u8 {
        self as u8
    }
}

impl From<DisposalMethod> for DisposalCode {
    fn from(method: DisposalMethod) -> Self {
        match method {
            DisposalMethod::Any => DisposalCode::None,
            DisposalMethod::Keep => DisposalCode::DoNotDispose,
            DisposalMethod::Background => DisposalCode::RestoreBackground,
            DisposalMethod::Previous => DisposalCode::RestorePrevious,
        }
    }
}

/// One frame exactly as stored in the file: a palette-indexed sub-rectangle.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct RawFrame {
    pub width: u32,
    pub height: u32,
    pub left: u32,
    pub top: u32,
    pub delay_ms: u32,
    pub disposal: DisposalCode,
    /// Row-major palette indices, `width * height` of them.
    pub pixel_indices: Vec<u8>,
    pub color_table: Vec<[u8; 3]>,
    pub transparent_index: Option<u8>,
    /// RGBA rendering of the sub-rectangle, present when patches were requested.
    pub patch: Option<Vec<u8>>,
}

impl RawFrame {
    /// RGBA of palette entry `index`, alpha 0 for the transparent index.
    /// `None` when the index is past the end of the colour table.
    pub fn color_at(&self, index: u8) -> Option<[u8; 4]> {
        let [r, g, b] = *self.color_table.get(index as usize)?;
        let alpha = if self.transparent_index == Some(index) { 0 } else { 255 };
        Some([r, g, b, alpha])
    }

    fn build_patch(&self) -> Vec<u8> {
        let mut patch = vec![0; self.pixel_indices.len() * 4];
        for (dst, &index) in patch.chunks_exact_mut(4).zip(self.pixel_indices.iter()) {
            if let Some(rgba) = self.color_at(index) {
                dst.copy_from_slice(&rgba);
            }
        }
        patch
    }
}

/// A parsed GIF whose frames have not been decompressed yet.
pub struct GifContainer {
    decoder: Decoder<Cursor<Vec<u8>>>,
}

impl GifContainer {
    pub fn screen_width(&self) -> u32 {
        self.decoder.width() as u32
    }

    pub fn screen_height(&self) -> u32 {
        self.decoder.height() as u32
    }

    pub fn background_index(&self) -> Option<usize> {
        self.decoder.bg_color()
    }

    /// `None` means loop forever.
    pub fn loop_count(&self) -> Option<u16> {
        match self.decoder.repeat() {
            Repeat::Infinite => None,
            Repeat::Finite(n) => Some(n),
        }
    }

    fn global_palette(&self) -> Vec<[u8; 3]> {
        self.decoder.global_palette().map(palette_triples).unwrap_or_default()
    }
}

/// Reads the header and logical screen descriptor.
pub fn parse(bytes: Vec<u8>) -> Result<GifContainer> {
    let mut options = DecodeOptions::new();
    options.set_color_output(ColorOutput::Indexed);

    let decoder = options.read_info(Cursor::new(bytes))?;
    debug!(width = decoder.width(), height = decoder.height(), "parsed GIF header");
    Ok(GifContainer { decoder })
}

/// Drains every frame of `container` in file order.
pub fn decompress_frames(mut container: GifContainer, build_patches: bool) -> Result<Vec<RawFrame>> {
    let global_palette = container.global_palette();
    let mut frames = Vec::new();

    while let Some(frame) = container.decoder.read_next_frame()? {
        let color_table = match &frame.palette {
            Some(local) => palette_triples(local),
            None => global_palette.clone(),
        };

        let mut raw = RawFrame {
            width: frame.width as u32,
            height: frame.height as u32,
            left: frame.left as u32,
            top: frame.top as u32,
            delay_ms: frame.delay as u32 * 10,
            disposal: frame.dispose.into(),
            pixel_indices: frame.buffer.to_vec(),
            color_table,
            transparent_index: frame.transparent,
            patch: None,
        };
        if build_patches {
            raw.patch = Some(raw.build_patch());
        }
        frames.push(raw);
    }

    info!(frames = frames.len(), "decompressed GIF frames");
    Ok(frames)
}

/// `parse` followed by `decompress_frames`.
pub fn decode(bytes: Vec<u8>, build_patches: bool) -> Result<Vec<RawFrame>> {
    decompress_frames(parse(bytes)?, build_patches)
}

fn palette_triples(palette: &[u8]) -> Vec<[u8; 3]> {
    palette.chunks_exact(3).map(|c| [c[0], c[1], c[2]]).collect()
}
