//! Floating-point pixel image with an integer origin.
//!
//! Pixels are stored row-major. The origin `(x0, y0)` is the parent
//! coordinate of array element `(0, 0)`, so a kernel image centred on the
//! origin has negative `x0`/`y0` and a display image placed at a field
//! position has `x0`/`y0` near that position.

use crate::error::{PsfError, Result};
use crate::geom::Box2I;

/// Largest pixel count an image may have before allocation is refused.
pub const MAX_IMAGE_PIXELS: usize = 1 << 26;

#[derive(Debug, Clone, PartialEq)]
pub struct Image {
    width: usize,
    height: usize,
    x0: i32,
    y0: i32,
    data: Vec<f64>,
}

impl Image {
    /// Zero-filled image covering `bbox`.
    pub fn new(bbox: Box2I) -> Result<Self> {
        let (width, height) = (bbox.width(), bbox.height());
        if width == 0 || height == 0 {
            return Err(PsfError::unsupported_size(
                width,
                height,
                "image dimensions must be positive",
            ));
        }
        match width.checked_mul(height) {
            Some(n) if n <= MAX_IMAGE_PIXELS => Ok(Self {
                width,
                height,
                x0: bbox.min_x,
                y0: bbox.min_y,
                data: vec![0.0; n],
            }),
            _ => Err(PsfError::Allocation { width, height }),
        }
    }

    /// Image wrapping existing row-major pixel data.
    pub fn from_vec(bbox: Box2I, data: Vec<f64>) -> Result<Self> {
        let mut image = Self::new(bbox)?;
        if data.len() != image.data.len() {
            return Err(PsfError::unsupported_size(
                bbox.width(),
                bbox.height(),
                format!("pixel buffer has {} values", data.len()),
            ));
        }
        image.data = data;
        Ok(image)
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn x0(&self) -> i32 {
        self.x0
    }

    pub fn y0(&self) -> i32 {
        self.y0
    }

    pub fn bbox(&self) -> Box2I {
        Box2I::new(self.x0, self.y0, self.width, self.height)
    }

    pub fn set_origin(&mut self, x0: i32, y0: i32) {
        self.x0 = x0;
        self.y0 = y0;
    }

    pub fn data(&self) -> &[f64] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [f64] {
        &mut self.data
    }

    /// Pixel at array indices (column, row).
    pub fn at(&self, col: usize, row: usize) -> f64 {
        self.data[row * self.width + col]
    }

    pub fn at_mut(&mut self, col: usize, row: usize) -> &mut f64 {
        &mut self.data[row * self.width + col]
    }

    /// Pixel at parent coordinates, or `None` outside the image.
    pub fn get(&self, x: i32, y: i32) -> Option<f64> {
        if !self.bbox().contains(x, y) {
            return None;
        }
        Some(self.at((x - self.x0) as usize, (y - self.y0) as usize))
    }

    pub fn row(&self, row: usize) -> &[f64] {
        &self.data[row * self.width..(row + 1) * self.width]
    }

    pub fn column(&self, col: usize) -> impl Iterator<Item = f64> + '_ {
        (0..self.height).map(move |row| self.at(col, row))
    }

    pub fn sum(&self) -> f64 {
        self.data.iter().sum()
    }

    /// Largest pixel value and its parent coordinates.
    pub fn max_pixel(&self) -> (f64, i32, i32) {
        let mut best = (f64::NEG_INFINITY, self.x0, self.y0);
        for (i, &v) in self.data.iter().enumerate() {
            if v > best.0 {
                let col = (i % self.width) as i32;
                let row = (i / self.width) as i32;
                best = (v, self.x0 + col, self.y0 + row);
            }
        }
        best
    }

    /// Divide every pixel by the image sum, returning the sum.
    pub fn normalize(&mut self) -> Result<f64> {
        let total = normalize_weights(&mut self.data)?;
        Ok(total)
    }

    /// Copy of the image with `pad` zero pixels added on every side.
    pub fn zero_padded(&self, pad: usize) -> Result<Self> {
        let mut out = Self::new(self.bbox().grown(pad))?;
        for row in 0..self.height {
            let start = (row + pad) * out.width + pad;
            out.data[start..start + self.width].copy_from_slice(self.row(row));
        }
        Ok(out)
    }
}

/// Divide a weight buffer by its sum in place, returning the sum.
///
/// Fails with [`PsfError::DegenerateKernel`] when the sum is zero or not finite.
pub fn normalize_weights(weights: &mut [f64]) -> Result<f64> {
    let total: f64 = weights.iter().sum();
    if total == 0.0 || !total.is_finite() {
        return Err(PsfError::DegenerateKernel);
    }
    weights.iter_mut().for_each(|w| *w /= total);
    Ok(total)
}
