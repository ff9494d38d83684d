//! Sub-pixel resampling of PSF images.
//!
//! Two operations are provided:
//!
//! - [`warp_linear`]: fill a destination box by mapping each destination
//!   pixel through a linear map into the source image and interpolating there.
//! - [`offset_image`]: shift an image by a sub-pixel amount, keeping its size.
//!
//! Source pixels outside the image read as zero, so a preimage that falls
//! farther than the interpolation radius from the source support yields zero.

use std::f64::consts::PI;

use crate::error::Result;
use crate::geom::Box2I;
use crate::image::Image;
use crate::Matrix2;

/// Interpolation kernel used for resampling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interpolation {
    /// Linear interpolation in both axes (2×2 taps).
    Bilinear,
    /// Lanczos kernel of the given order (2n×2n taps).
    Lanczos(usize),
}

impl Default for Interpolation {
    fn default() -> Self {
        Interpolation::Lanczos(5)
    }
}

impl Interpolation {
    /// Half-width of the kernel support in pixels.
    pub fn radius(&self) -> usize {
        match self {
            Interpolation::Bilinear => 1,
            Interpolation::Lanczos(order) => (*order).max(1),
        }
    }

    /// Kernel weight at distance `d` (pixels) from the sample point.
    pub fn weight(&self, d: f64) -> f64 {
        match self {
            Interpolation::Bilinear => (1.0 - d.abs()).max(0.0),
            Interpolation::Lanczos(_) => lanczos(d, self.radius() as f64),
        }
    }

    /// Fill `weights` with the taps for sampling at `pos`, returning the
    /// index of the first tap. Taps sum to 1 so flat regions stay flat.
    fn taps(&self, pos: f64, weights: &mut [f64]) -> i64 {
        let r = self.radius() as i64;
        let base = pos.floor() as i64;
        let first = base - r + 1;
        for (i, w) in weights.iter_mut().enumerate() {
            *w = self.weight(pos - (first + i as i64) as f64);
        }
        let total: f64 = weights.iter().sum();
        if total != 0.0 {
            weights.iter_mut().for_each(|w| *w /= total);
        }
        first
    }
}

/// Windowed sinc: `sinc(x) * sinc(x / a)` for `|x| < a`, zero beyond.
fn lanczos(x: f64, a: f64) -> f64 {
    if x.abs() < 1e-12 {
        return 1.0;
    }
    if x.abs() >= a {
        return 0.0;
    }
    let pi_x = PI * x;
    let pi_x_a = pi_x / a;
    (pi_x.sin() / pi_x) * (pi_x_a.sin() / pi_x_a)
}

/// Reusable tap buffers for point sampling.
struct Sampler {
    interpolation: Interpolation,
    wx: Vec<f64>,
    wy: Vec<f64>,
}

impl Sampler {
    fn new(interpolation: Interpolation) -> Self {
        let n = 2 * interpolation.radius();
        Self {
            interpolation,
            wx: vec![0.0; n],
            wy: vec![0.0; n],
        }
    }

    /// Interpolate `src` at array coordinates `(sx, sy)`.
    fn sample(&mut self, src: &Image, sx: f64, sy: f64) -> f64 {
        let (w, h) = (src.width() as i64, src.height() as i64);
        let r = self.interpolation.radius() as f64;
        if sx <= -r || sy <= -r || sx >= (w - 1) as f64 + r || sy >= (h - 1) as f64 + r {
            return 0.0;
        }
        let first_x = self.interpolation.taps(sx, &mut self.wx);
        let first_y = self.interpolation.taps(sy, &mut self.wy);

        let mut sum = 0.0;
        for (j, &wy) in self.wy.iter().enumerate() {
            let py = first_y + j as i64;
            if wy == 0.0 || py < 0 || py >= h {
                continue;
            }
            let row = src.row(py as usize);
            for (i, &wx) in self.wx.iter().enumerate() {
                let px = first_x + i as i64;
                if px < 0 || px >= w {
                    continue;
                }
                sum += row[px as usize] * wx * wy;
            }
        }
        sum
    }
}

/// Resample `src` onto `dest_bbox`.
///
/// `dest_to_src` maps destination parent coordinates to source parent
/// coordinates; both frames share the origin (the PSF centre).
pub fn warp_linear(
    src: &Image,
    dest_to_src: &Matrix2,
    dest_bbox: Box2I,
    interpolation: Interpolation,
) -> Result<Image> {
    let mut out = Image::new(dest_bbox)?;
    let mut sampler = Sampler::new(interpolation);
    let (sx0, sy0) = (src.x0() as f64, src.y0() as f64);

    for row in 0..dest_bbox.height() {
        let y = (dest_bbox.min_y + row as i32) as f64;
        for col in 0..dest_bbox.width() {
            let x = (dest_bbox.min_x + col as i32) as f64;
            let sx = dest_to_src[(0, 0)] * x + dest_to_src[(0, 1)] * y - sx0;
            let sy = dest_to_src[(1, 0)] * x + dest_to_src[(1, 1)] * y - sy0;
            *out.at_mut(col, row) = sampler.sample(src, sx, sy);
        }
    }
    Ok(out)
}

/// Shift `src` by `(dx, dy)` pixels: output pixel `i` takes the value the
/// source has at `i - d`. Size and origin are unchanged.
pub fn offset_image(src: &Image, dx: f64, dy: f64, interpolation: Interpolation) -> Result<Image> {
    let n = 2 * interpolation.radius();
    let mut wx = vec![0.0; n];
    let mut wy = vec![0.0; n];
    // The fractional part of (i - d) is the same for every pixel, so the taps
    // are computed once relative to pixel 0.
    let first_x = interpolation.taps(-dx, &mut wx);
    let first_y = interpolation.taps(-dy, &mut wy);

    let (w, h) = (src.width(), src.height());
    let mut tmp = Image::new(src.bbox())?;
    for row in 0..h {
        let line = src.row(row);
        for col in 0..w {
            let mut v = 0.0;
            for (k, &wk) in wx.iter().enumerate() {
                let px = col as i64 + first_x + k as i64;
                if px >= 0 && (px as usize) < w {
                    v += wk * line[px as usize];
                }
            }
            *tmp.at_mut(col, row) = v;
        }
    }

    let mut out = Image::new(src.bbox())?;
    for row in 0..h {
        for col in 0..w {
            let mut v = 0.0;
            for (k, &wk) in wy.iter().enumerate() {
                let py = row as i64 + first_y + k as i64;
                if py >= 0 && (py as usize) < h {
                    v += wk * tmp.at(col, py as usize);
                }
            }
            *out.at_mut(col, row) = v;
        }
    }
    Ok(out)
}
