//! Drawing composited frames onto a truecolor terminal.

use std::io::Write;
use std::ops::Range;

use rgb::RGBA8;

use crate::ansi::ansi::{self, Color, CursorPos};
use crate::bitmap::Bitmap;
use crate::compositor::CompositedFrame;
use crate::error::Result;

const CHECKER_LIGHT: Color = Color { red: 0x66, green: 0x66, blue: 0x66 };
const CHECKER_DARK: Color = Color { red: 0x44, green: 0x44, blue: 0x44 };
const CHECKER_SIZE: u32 = 4;

/// Anything that can show a full-canvas bitmap.
pub trait Renderer {
    fn display(&mut self, bitmap: &Bitmap) -> Result<()>;
}

/// A rectangle of terminal cells, 1-based like the cursor.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Area {
    pub col: usize,
    pub row: usize,
    pub cols: usize,
    pub rows: usize,
}

/// Draws bitmaps with upper half blocks: every cell holds two pixel rows.
pub struct TerminalRenderer<W: Write> {
    writer: W,
    area: Area,
}

impl<W: Write> TerminalRenderer<W> {
    pub fn new(writer: W, area: Area) -> Self {
        TerminalRenderer { writer, area }
    }

    pub fn set_area(&mut self, area: Area) {
        self.area = area;
    }

    pub fn writer(&mut self) -> &mut W {
        &mut self.writer
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> Renderer for TerminalRenderer<W> {
    fn display(&mut self, bitmap: &Bitmap) -> Result<()> {
        let (width, height) = bitmap.fit_within(self.area.cols as u32, self.area.rows as u32 * 2);
        let scaled = bitmap.scaled(width, height);
        draw_bitmap(&mut self.writer, &scaled, self.area.col, self.area.row)?;
        self.writer.flush()?;
        Ok(())
    }
}

/// Writes `bitmap` at its own size with its top-left cell at `(col, row)`.
pub fn draw_bitmap<W: Write>(writer: &mut W, bitmap: &Bitmap, col: usize, row: usize) -> std::io::Result<()> {
    for y in (0..bitmap.height()).step_by(2) {
        ansi::set_cursor(&CursorPos { x: col, y: row + y as usize / 2 }, writer)?;
        for x in 0..bitmap.width() {
            let top = cell_color(bitmap.get(x, y), x, y);
            let bottom = cell_color(bitmap.get(x, y + 1), x, y + 1);
            ansi::half_block(writer, &top, &bottom)?;
        }
        ansi::reset_sgr(writer)?;
    }
    Ok(())
}

fn cell_color(pixel: Option<RGBA8>, x: u32, y: u32) -> Color {
    match pixel {
        Some(p) if p.a > 0 => Color::from(p),
        _ if (x / CHECKER_SIZE + y / CHECKER_SIZE) % 2 == 0 => CHECKER_LIGHT,
        _ => CHECKER_DARK,
    }
}

/// Row of thumbnails under the main view.
pub struct FilmStrip {
    pub thumb_cols: usize,
    pub thumb_rows: usize,
}

impl FilmStrip {
    /// Rows the strip occupies: thumbnails plus one label line.
    pub fn height(&self) -> usize {
        self.thumb_rows + 1
    }

    fn slot_cols(&self) -> usize {
        self.thumb_cols + 1
    }

    /// Frames that fit in `cols` columns, centred on `scroll` where possible.
    pub fn visible_range(&self, scroll: usize, len: usize, cols: usize) -> Range<usize> {
        let slots = (cols / self.slot_cols()).max(1).min(len);
        let start = scroll.saturating_sub(slots / 2).min(len - slots);
        start..start + slots
    }

    pub fn render<W: Write>(
        &self,
        writer: &mut W,
        frames: &[CompositedFrame],
        current: usize,
        scroll: usize,
        area: Area,
    ) -> std::io::Result<()> {
        if frames.is_empty() {
            return Ok(());
        }

        for (slot, index) in self.visible_range(scroll, frames.len(), area.cols).enumerate() {
            let col = area.col + slot * self.slot_cols();
            let bitmap = &frames[index].bitmap;
            let (width, height) = bitmap.fit_within(self.thumb_cols as u32, self.thumb_rows as u32 * 2);
            draw_bitmap(writer, &bitmap.scaled(width, height), col, area.row)?;

            ansi::set_cursor(&CursorPos { x: col, y: area.row + self.thumb_rows }, writer)?;
            if index == current {
                ansi::make_reverse(writer)?;
            }
            write!(writer, "{:^width$}", index + 1, width = self.thumb_cols)?;
            ansi::reset_sgr(writer)?;
        }
        Ok(())
    }
}
