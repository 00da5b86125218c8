use std::fmt;

use rgb::{ComponentBytes, RGBA8};

pub const TRANSPARENT: RGBA8 = RGBA8 { r: 0, g: 0, b: 0, a: 0 };

/// Full-canvas RGBA pixel buffer, row-major.
#[derive(Clone, PartialEq, Eq)]
pub struct Bitmap {
    width: u32,
    height: u32,
    pixels: Vec<RGBA8>,
}

impl Bitmap {
    /// A `width`x`height` bitmap with every pixel fully transparent.
    pub fn transparent(width: u32, height: u32) -> Self {
        let len = width as usize * height as usize;
        Bitmap { width, height, pixels: vec![TRANSPARENT; len] }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[RGBA8] {
        &self.pixels
    }

    pub fn pixels_mut(&mut self) -> &mut [RGBA8] {
        &mut self.pixels
    }

    /// Buffer offset of `(x, y)`, or `None` when the coordinate is off the canvas.
    pub fn index_of(&self, x: u32, y: u32) -> Option<usize> {
        if x >= self.width || y >= self.height {
            return None;
        }
        Some(y as usize * self.width as usize + x as usize)
    }

    pub fn get(&self, x: u32, y: u32) -> Option<RGBA8> {
        self.index_of(x, y).map(|i| self.pixels[i])
    }

    /// Writes one pixel. Off-canvas writes are dropped and reported as `false`.
    pub fn set(&mut self, x: u32, y: u32, pixel: RGBA8) -> bool {
        match self.index_of(x, y) {
            Some(i) => {
                self.pixels[i] = pixel;
                true
            }
            None => false,
        }
    }

    /// Raw RGBA bytes, 4 per pixel.
    pub fn as_bytes(&self) -> &[u8] {
        self.pixels.as_bytes()
    }

    /// Nearest-neighbour resample to `width`x`height`.
    pub fn scaled(&self, width: u32, height: u32) -> Bitmap {
        let mut out = Bitmap::transparent(width, height);
        if self.width == 0 || self.height == 0 {
            return out;
        }

        let x_step = self.width as f64 / width.max(1) as f64;
        let y_step = self.height as f64 / height.max(1) as f64;
        for y in 0..height {
            let sy = ((y as f64 * y_step).floor() as u32).min(self.height - 1);
            for x in 0..width {
                let sx = ((x as f64 * x_step).floor() as u32).min(self.width - 1);
                let i = sy as usize * self.width as usize + sx as usize;
                out.pixels[y as usize * width as usize + x as usize] = self.pixels[i];
            }
        }

        out
    }

    /// Largest size with the same aspect ratio that fits in `max_width`x`max_height`.
    pub fn fit_within(&self, max_width: u32, max_height: u32) -> (u32, u32) {
        if self.width == 0 || self.height == 0 {
            return (0, 0);
        }
        if self.width <= max_width && self.height <= max_height {
            return (self.width, self.height);
        }

        let scale = f64::min(
            max_width as f64 / self.width as f64,
            max_height as f64 / self.height as f64,
        );
        let width = ((self.width as f64 * scale).floor() as u32).max(1);
        let height = ((self.height as f64 * scale).floor() as u32).max(1);
        (width, height)
    }
}

impl fmt::Debug for Bitmap {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let opaque = self.pixels.iter().filter(|p| p.a > 0).count();
        write!(f, "Bitmap {}x{} ({} opaque)", self.width, self.height, opaque)
    }
}
