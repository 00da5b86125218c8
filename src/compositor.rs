//! Cumulative compositing of raw frames into ready-to-display canvases.
//!
//! GIF frames are deltas: each one paints a sub-rectangle and carries a
//! disposal code saying what happens to that rectangle before the next frame
//! is drawn. [`composite_all`] replays the whole sequence once, left to right,
//! and yields the full canvas that must be on screen for every frame.

use rgb::RGBA8;
use tracing::debug;

use crate::bitmap::{Bitmap, TRANSPARENT};
use crate::gif::{DisposalCode, RawFrame};
use crate::raster::rasterize;

/// What `RestorePrevious` (code 3) puts back in the disposed rectangle.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum RestorePrevious {
    /// Fill with the colour of the first frame's top-left pixel, fully opaque.
    #[default]
    FirstPixel,
    /// Put back the canvas as it was before the disposed frame was drawn.
    Snapshot,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub struct CompositeOptions {
    pub restore_previous: RestorePrevious,
}

/// A frame ready for display: the full canvas plus the timing carried over
/// from its raw frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompositedFrame {
    pub bitmap: Bitmap,
    pub delay_ms: u32,
    /// This frame's own disposal, applied when the next frame is composited.
    pub disposal: DisposalCode,
}

/// Canvas size of a sequence: the dimensions of its first frame.
pub fn canvas_size(frames: &[RawFrame]) -> Option<(u32, u32)> {
    frames.first().map(|f| (f.width, f.height))
}

/// Composites every frame with the default options.
pub fn composite_all(frames: &[RawFrame]) -> Vec<CompositedFrame> {
    composite_all_with(frames, CompositeOptions::default())
}

pub fn composite_all_with(frames: &[RawFrame], options: CompositeOptions) -> Vec<CompositedFrame> {
    let Some((width, height)) = canvas_size(frames) else {
        return Vec::new();
    };

    let mut compositor = Compositor::new(width, height, options);
    let composited: Vec<_> = frames.iter().map(|frame| compositor.push(frame)).collect();
    debug!(frames = composited.len(), width, height, "compositing finished");
    composited
}

/// The disposal still owed by the last frame pushed.
struct Pending {
    disposal: DisposalCode,
    left: u32,
    top: u32,
    width: u32,
    height: u32,
    /// Canvas before the frame was drawn, kept only for `Snapshot` restores.
    before: Option<Bitmap>,
}

/// Single-pass compositing state. Frames must be pushed in file order.
pub struct Compositor {
    width: u32,
    height: u32,
    options: CompositeOptions,
    canvas: Option<Bitmap>,
    background: RGBA8,
    pending: Option<Pending>,
}

impl Compositor {
    pub fn new(width: u32, height: u32, options: CompositeOptions) -> Self {
        Compositor {
            width,
            height,
            options,
            canvas: None,
            background: TRANSPARENT,
            pending: None,
        }
    }

    /// Disposes the previous frame, draws `frame` over what is left and
    /// returns the resulting canvas.
    pub fn push(&mut self, frame: &RawFrame) -> CompositedFrame {
        let current = rasterize(frame, self.width, self.height);
        let keep_before = frame.disposal == DisposalCode::RestorePrevious
            && self.options.restore_previous == RestorePrevious::Snapshot;

        let (canvas, before) = match self.canvas.take() {
            None => {
                let first = current.get(0, 0).unwrap_or(TRANSPARENT);
                self.background = RGBA8::new(first.r, first.g, first.b, 255);
                let before = keep_before.then(|| Bitmap::transparent(self.width, self.height));
                (current, before)
            }
            Some(mut canvas) => {
                if let Some(pending) = self.pending.take() {
                    self.dispose(&mut canvas, pending);
                }
                let before = keep_before.then(|| canvas.clone());
                let (opaque, transparent) = draw_over(&mut canvas, &current);
                debug!(
                    left = frame.left,
                    top = frame.top,
                    width = frame.width,
                    height = frame.height,
                    opaque,
                    transparent,
                    disposal = frame.disposal.code(),
                    "composited frame"
                );
                (canvas, before)
            }
        };

        self.pending = Some(Pending {
            disposal: frame.disposal,
            left: frame.left,
            top: frame.top,
            width: frame.width,
            height: frame.height,
            before,
        });

        let composited = CompositedFrame {
            bitmap: canvas.clone(),
            delay_ms: frame.delay_ms,
            disposal: frame.disposal,
        };
        self.canvas = Some(canvas);
        composited
    }

    fn dispose(&self, canvas: &mut Bitmap, pending: Pending) {
        match pending.disposal {
            DisposalCode::None | DisposalCode::DoNotDispose => {}
            DisposalCode::RestoreBackground => {
                for_each_in_rect(canvas, &pending, |canvas, i| canvas.pixels_mut()[i].a = 0);
            }
            DisposalCode::RestorePrevious => match (&self.options.restore_previous, &pending.before) {
                (RestorePrevious::Snapshot, Some(before)) => {
                    for_each_in_rect(canvas, &pending, |canvas, i| canvas.pixels_mut()[i] = before.pixels()[i]);
                }
                _ => {
                    let background = self.background;
                    for_each_in_rect(canvas, &pending, |canvas, i| canvas.pixels_mut()[i] = background);
                }
            },
        }
        debug!(
            disposal = pending.disposal.code(),
            left = pending.left,
            top = pending.top,
            width = pending.width,
            height = pending.height,
            "disposed previous frame"
        );
    }
}

/// Visits the canvas offsets covered by `rect`, skipping whatever falls off the canvas.
fn for_each_in_rect(canvas: &mut Bitmap, rect: &Pending, mut f: impl FnMut(&mut Bitmap, usize)) {
    for y in 0..rect.height {
        for x in 0..rect.width {
            let (cx, cy) = (rect.left.saturating_add(x), rect.top.saturating_add(y));
            if let Some(i) = canvas.index_of(cx, cy) {
                f(canvas, i);
            }
        }
    }
}

/// Copies every non-transparent pixel of `layer` onto `canvas`.
/// Returns `(opaque, transparent)` pixel counts of the layer.
fn draw_over(canvas: &mut Bitmap, layer: &Bitmap) -> (usize, usize) {
    let mut opaque = 0;
    for (dst, src) in canvas.pixels_mut().iter_mut().zip(layer.pixels()) {
        if src.a > 0 {
            *dst = *src;
            opaque += 1;
        }
    }
    (opaque, layer.pixels().len() - opaque)
}

#[cfg(test)]
mod tests {
    use super::*;

    const RED: RGBA8 = RGBA8 { r: 255, g: 0, b: 0, a: 255 };
    const GREEN: RGBA8 = RGBA8 { r: 0, g: 255, b: 0, a: 255 };
    const BLUE: RGBA8 = RGBA8 { r: 0, g: 0, b: 255, a: 255 };

    /// Palette: 0 red, 1 blue, 2 green, 3 transparent.
    fn frame(rect: (u32, u32, u32, u32), indices: Vec<u8>, disposal: DisposalCode) -> RawFrame {
        let (left, top, width, height) = rect;
        RawFrame {
            width,
            height,
            left,
            top,
            delay_ms: 40,
            disposal,
            pixel_indices: indices,
            color_table: vec![[255, 0, 0], [0, 0, 255], [0, 255, 0], [7, 7, 7]],
            transparent_index: Some(3),
            patch: None,
        }
    }

    #[test]
    fn empty_sequence_composites_to_nothing() {
        assert!(composite_all(&[]).is_empty());
        assert_eq!(canvas_size(&[]), None);
    }

    #[test]
    fn first_frame_is_its_own_raster() {
        let raw = frame((0, 0, 2, 2), vec![0, 1, 3, 2], DisposalCode::None);
        let out = composite_all(std::slice::from_ref(&raw));
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].bitmap, rasterize(&raw, 2, 2));
        assert_eq!(out[0].delay_ms, 40);
    }

    #[test]
    fn every_frame_has_canvas_dimensions() {
        let frames = vec![
            frame((0, 0, 3, 2), vec![0; 6], DisposalCode::None),
            frame((2, 1, 1, 1), vec![1], DisposalCode::None),
            frame((1, 0, 5, 5), vec![2; 25], DisposalCode::None),
        ];
        let out = composite_all(&frames);
        assert_eq!(out.len(), 3);
        for composited in &out {
            assert_eq!((composited.bitmap.width(), composited.bitmap.height()), (3, 2));
        }
    }

    #[test]
    fn recompositing_is_bitwise_identical() {
        let frames = vec![
            frame((0, 0, 2, 2), vec![0, 1, 2, 3], DisposalCode::RestorePrevious),
            frame((1, 0, 1, 2), vec![1, 3], DisposalCode::RestoreBackground),
            frame((0, 1, 2, 1), vec![3, 2], DisposalCode::DoNotDispose),
        ];
        assert_eq!(composite_all(&frames), composite_all(&frames));
    }

    #[test]
    fn restore_background_clears_previous_rect() {
        let frames = vec![
            frame((0, 0, 2, 2), vec![0; 4], DisposalCode::RestoreBackground),
            frame((0, 0, 2, 2), vec![3, 1, 3, 3], DisposalCode::None),
        ];
        let out = composite_all(&frames);
        let second = &out[1].bitmap;
        assert_eq!(second.get(0, 0).map(|p| p.a), Some(0));
        assert_eq!(second.get(1, 0), Some(BLUE));
        assert_eq!(second.get(0, 1).map(|p| p.a), Some(0));
        assert_eq!(second.get(1, 1).map(|p| p.a), Some(0));
    }

    #[test]
    fn restore_background_only_touches_previous_rect() {
        let frames = vec![
            frame((0, 0, 2, 1), vec![0, 0], DisposalCode::DoNotDispose),
            frame((1, 0, 1, 1), vec![1], DisposalCode::RestoreBackground),
            frame((0, 0, 1, 1), vec![3], DisposalCode::None),
        ];
        let out = composite_all(&frames);
        assert_eq!(out[2].bitmap.get(0, 0), Some(RED));
        assert_eq!(out[2].bitmap.get(1, 0).map(|p| p.a), Some(0));
    }

    #[test]
    fn leave_in_place_keeps_pixels_under_transparency() {
        for disposal in [DisposalCode::None, DisposalCode::DoNotDispose] {
            let frames = vec![
                frame((0, 0, 2, 1), vec![0, 2], disposal),
                frame((0, 0, 2, 1), vec![3, 1], DisposalCode::None),
            ];
            let out = composite_all(&frames);
            assert_eq!(out[1].bitmap.get(0, 0), Some(RED));
            assert_eq!(out[1].bitmap.get(1, 0), Some(BLUE));
        }
    }

    #[test]
    fn restore_previous_fills_with_first_pixel_by_default() {
        let frames = vec![
            frame((0, 0, 2, 2), vec![2, 0, 0, 0], DisposalCode::DoNotDispose),
            frame((1, 1, 1, 1), vec![1], DisposalCode::RestorePrevious),
            frame((0, 0, 1, 1), vec![3], DisposalCode::None),
        ];
        let out = composite_all(&frames);
        assert_eq!(out[1].bitmap.get(1, 1), Some(BLUE));
        assert_eq!(out[2].bitmap.get(1, 1), Some(GREEN));
        assert_eq!(out[2].bitmap.get(1, 0), Some(RED));
    }

    #[test]
    fn restore_previous_snapshot_restores_prior_canvas() {
        let frames = vec![
            frame((0, 0, 2, 2), vec![2, 0, 0, 0], DisposalCode::DoNotDispose),
            frame((1, 1, 1, 1), vec![1], DisposalCode::RestorePrevious),
            frame((0, 0, 1, 1), vec![3], DisposalCode::None),
        ];
        let options = CompositeOptions { restore_previous: RestorePrevious::Snapshot };
        let out = composite_all_with(&frames, options);
        assert_eq!(out[2].bitmap.get(1, 1), Some(RED));
        assert_eq!(out[2].bitmap.get(0, 0), Some(GREEN));
    }

    #[test]
    fn restore_previous_snapshot_of_first_frame_is_transparent() {
        let frames = vec![
            frame((0, 0, 2, 1), vec![0, 1], DisposalCode::RestorePrevious),
            frame((0, 0, 1, 1), vec![2], DisposalCode::None),
        ];
        let options = CompositeOptions { restore_previous: RestorePrevious::Snapshot };
        let out = composite_all_with(&frames, options);
        assert_eq!(out[1].bitmap.get(0, 0), Some(GREEN));
        assert_eq!(out[1].bitmap.get(1, 0).map(|p| p.a), Some(0));
    }

    #[test]
    fn disposal_rect_off_canvas_is_clamped() {
        let frames = vec![
            frame((0, 0, 2, 2), vec![0; 4], DisposalCode::None),
            frame((1, 1, 4, 4), vec![1; 16], DisposalCode::RestoreBackground),
            frame((0, 0, 1, 1), vec![3], DisposalCode::None),
        ];
        let out = composite_all(&frames);
        assert_eq!(out[1].bitmap.get(1, 1), Some(BLUE));
        assert_eq!(out[2].bitmap.get(1, 1).map(|p| p.a), Some(0));
        assert_eq!(out[2].bitmap.get(0, 0), Some(RED));
    }

    #[test]
    fn carries_delay_and_own_disposal() {
        let mut second = frame((0, 0, 1, 1), vec![1], DisposalCode::RestorePrevious);
        second.delay_ms = 0;
        let frames = vec![frame((0, 0, 1, 1), vec![0], DisposalCode::RestoreBackground), second];
        let out = composite_all(&frames);
        assert_eq!(out[0].disposal, DisposalCode::RestoreBackground);
        assert_eq!(out[1].disposal, DisposalCode::RestorePrevious);
        assert_eq!(out[1].delay_ms, 0);
    }
}
