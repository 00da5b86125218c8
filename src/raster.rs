use rgb::RGBA8;
use tracing::trace;

use crate::bitmap::Bitmap;
use crate::gif::RawFrame;

/// Renders one raw frame onto an otherwise transparent canvas.
///
/// Each palette index is looked up in the frame's colour table and written at
/// `(left + x, top + y)`. The transparent index gets alpha 0, everything else
/// alpha 255. Indices past the end of the colour table and pixels that land
/// off the canvas are skipped, so a malformed frame still yields its valid part.
pub fn rasterize(frame: &RawFrame, canvas_width: u32, canvas_height: u32) -> Bitmap {
    let mut bitmap = Bitmap::transparent(canvas_width, canvas_height);
    let width = frame.width as usize;
    if width == 0 {
        return bitmap;
    }

    let mut skipped = 0usize;
    for (i, &index) in frame.pixel_indices.iter().enumerate().take(width * frame.height as usize) {
        let Some([r, g, b, a]) = frame.color_at(index) else {
            skipped += 1;
            continue;
        };

        let x = frame.left.saturating_add((i % width) as u32);
        let y = frame.top.saturating_add((i / width) as u32);
        if !bitmap.set(x, y, RGBA8::new(r, g, b, a)) {
            skipped += 1;
        }
    }

    if skipped > 0 {
        trace!(skipped, left = frame.left, top = frame.top, "skipped pixels outside palette or canvas");
    }
    bitmap
}
