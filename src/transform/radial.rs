//! Radial distortion model: r_distorted = r × (1 + k1·r² + k2·r⁴ + k3·r⁶).
//!
//! Classic Brown-Conrady radial distortion with up to 3 coefficients,
//! measured in pixels from a distortion centre.

use crate::error::{PsfError, Result};
use crate::geom::AffineTransform;
use crate::{Matrix2, Point2};

use super::CoordinateTransform;

/// Radial distortion with up to 3 coefficients.
///
/// The forward model maps ideal radius `r` to distorted radius:
///
/// ```text
/// r_d = r × (1 + k1·r² + k2·r⁴ + k3·r⁶)
/// ```
///
/// The inverse is computed via Newton-Raphson iteration and fails where the
/// radial profile stops being monotonic.
#[derive(Debug, Clone)]
pub struct RadialDistortion {
    /// First radial coefficient (barrel < 0, pincushion > 0).
    pub k1: f64,
    /// Second radial coefficient.
    pub k2: f64,
    /// Third radial coefficient.
    pub k3: f64,
    /// Distortion centre in pixels.
    pub center: Point2,
}

impl RadialDistortion {
    /// Create a radial distortion about the origin.
    ///
    /// Set unused coefficients to 0.0. For example, `RadialDistortion::new(-1e-8, 0.0, 0.0)`
    /// for a simple barrel distortion.
    pub fn new(k1: f64, k2: f64, k3: f64) -> Self {
        Self {
            k1,
            k2,
            k3,
            center: Point2::origin(),
        }
    }

    pub fn with_center(mut self, center: Point2) -> Self {
        self.center = center;
        self
    }

    /// Returns `true` if all coefficients are zero (no distortion).
    pub fn is_zero(&self) -> bool {
        self.k1 == 0.0 && self.k2 == 0.0 && self.k3 == 0.0
    }

    fn scale(&self, r2: f64) -> f64 {
        1.0 + self.k1 * r2 + self.k2 * r2 * r2 + self.k3 * r2 * r2 * r2
    }

    /// d(scale)/d(r²)
    fn scale_slope(&self, r2: f64) -> f64 {
        self.k1 + 2.0 * self.k2 * r2 + 3.0 * self.k3 * r2 * r2
    }

    /// Forward Jacobian at an undistorted point.
    pub fn jacobian(&self, p: Point2) -> Matrix2 {
        let d = p - self.center;
        let r2 = d.norm_squared();
        let s = self.scale(r2);
        let ds = self.scale_slope(r2);
        Matrix2::identity() * s + (d * d.transpose()) * (2.0 * ds)
    }
}

impl CoordinateTransform for RadialDistortion {
    fn apply_forward(&self, p: Point2) -> Point2 {
        let d = p - self.center;
        self.center + d * self.scale(d.norm_squared())
    }

    fn apply_inverse(&self, p: Point2) -> Result<Point2> {
        let d = p - self.center;
        let r_d = d.norm();
        if r_d < 1e-12 {
            return Ok(p);
        }

        // Newton-Raphson to find r such that r × (1 + k1·r² + k2·r⁴ + k3·r⁶) = r_d
        let mut r = r_d;
        for _ in 0..50 {
            let r2 = r * r;
            let f = r * self.scale(r2) - r_d;
            // f'(r) = 1 + 3·k1·r² + 5·k2·r⁴ + 7·k3·r⁶
            let df = 1.0 + 3.0 * self.k1 * r2 + 5.0 * self.k2 * r2 * r2 + 7.0 * self.k3 * r2 * r2 * r2;
            if df <= 0.0 {
                return Err(PsfError::geometry(p, "radial distortion is not monotonic here"));
            }
            let delta = f / df;
            r -= delta;
            if delta.abs() < 1e-12 * r_d.max(1.0) {
                return Ok(self.center + d * (r / r_d));
            }
        }
        Err(PsfError::geometry(p, "radial inverse did not converge"))
    }

    fn linearize_at(&self, p: Point2) -> AffineTransform {
        AffineTransform::tangent(p, self.apply_forward(p), self.jacobian(p))
    }
}
