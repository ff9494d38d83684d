//! Coordinate transforms between the frame a PSF is defined in and a
//! distorted frame it should be expressed in.
//!
//! A [`CoordinateTransform`] is a bidirectional map with a local
//! linearization. By convention `apply_forward` maps the **undistorted**
//! (underlying PSF) frame to the **distorted** (warped) frame and
//! `apply_inverse` goes the other way.
//!
//! # Supported models
//!
//! - [`AffineTransform`](crate::geom::AffineTransform): exact, constant Jacobian
//! - [`PolynomialTransform`]: polynomial forward map with a Newton-iterated inverse
//! - [`RadialDistortion`]: classic radial lens distortion about a centre
//! - [`Distortion`]: enum over the lens models above, plus the identity

pub mod polynomial;
pub mod radial;

pub use polynomial::PolynomialTransform;
pub use radial::RadialDistortion;

use std::fmt;

use crate::error::{PsfError, Result};
use crate::geom::AffineTransform;
use crate::{Matrix2, Point2};

/// Step in pixels for the finite-difference Jacobian.
const DERIVATIVE_STEP: f64 = 1e-3;

/// Bidirectional 2-D coordinate mapping with a derivative operator.
///
/// Implementations are read-only and may be shared between many warped
/// PSFs evaluating on different threads.
pub trait CoordinateTransform: Send + Sync + fmt::Debug {
    /// Undistorted → distorted.
    fn apply_forward(&self, p: Point2) -> Point2;

    /// Distorted → undistorted. Fails with [`PsfError::Geometry`] where the
    /// forward map cannot be inverted.
    fn apply_inverse(&self, p: Point2) -> Result<Point2>;

    /// Local affine approximation of the forward map at `p`.
    ///
    /// The default uses central differences; implementations with a closed
    /// form Jacobian should override it.
    fn linearize_at(&self, p: Point2) -> AffineTransform {
        let h = DERIVATIVE_STEP;
        let dx = (self.apply_forward(Point2::new(p.x + h, p.y))
            - self.apply_forward(Point2::new(p.x - h, p.y)))
            / (2.0 * h);
        let dy = (self.apply_forward(Point2::new(p.x, p.y + h))
            - self.apply_forward(Point2::new(p.x, p.y - h)))
            / (2.0 * h);
        let jacobian = Matrix2::new(dx.x, dy.x, dx.y, dy.y);
        AffineTransform::tangent(p, self.apply_forward(p), jacobian)
    }

    /// Local affine approximation of the inverse map at the distorted point `p`.
    fn linearize_inverse_at(&self, p: Point2) -> Result<AffineTransform> {
        let q = self.apply_inverse(p)?;
        self.linearize_at(q)
            .inverted()
            .ok_or_else(|| PsfError::geometry(p, "transform is singular here"))
    }
}

impl CoordinateTransform for AffineTransform {
    fn apply_forward(&self, p: Point2) -> Point2 {
        self.apply(p)
    }

    fn apply_inverse(&self, p: Point2) -> Result<Point2> {
        self.inverted()
            .map(|inv| inv.apply(p))
            .ok_or_else(|| PsfError::geometry(p, "affine transform is singular"))
    }

    fn linearize_at(&self, _p: Point2) -> AffineTransform {
        *self
    }
}

/// Lens distortion model.
///
/// All coordinates are in pixels. `Distortion::None` is the identity.
#[derive(Debug, Clone, Default)]
pub enum Distortion {
    /// No distortion.
    #[default]
    None,
    /// Radial distortion: r_distorted = r × (1 + k1·r² + k2·r⁴ + k3·r⁶).
    Radial(RadialDistortion),
    /// Polynomial distortion with independent x,y terms.
    Polynomial(PolynomialTransform),
}

impl Distortion {
    /// Returns `true` if this is `Distortion::None`.
    pub fn is_none(&self) -> bool {
        matches!(self, Distortion::None)
    }
}

impl CoordinateTransform for Distortion {
    fn apply_forward(&self, p: Point2) -> Point2 {
        match self {
            Distortion::None => p,
            Distortion::Radial(r) => r.apply_forward(p),
            Distortion::Polynomial(poly) => poly.apply_forward(p),
        }
    }

    fn apply_inverse(&self, p: Point2) -> Result<Point2> {
        match self {
            Distortion::None => Ok(p),
            Distortion::Radial(r) => r.apply_inverse(p),
            Distortion::Polynomial(poly) => poly.apply_inverse(p),
        }
    }

    fn linearize_at(&self, p: Point2) -> AffineTransform {
        match self {
            Distortion::None => AffineTransform::identity(),
            Distortion::Radial(r) => r.linearize_at(p),
            Distortion::Polynomial(poly) => poly.linearize_at(p),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Vector2;

    /// Forward map with no closed-form Jacobian, to exercise the default.
    #[derive(Debug)]
    struct Swirl;

    impl CoordinateTransform for Swirl {
        fn apply_forward(&self, p: Point2) -> Point2 {
            Point2::new(p.x + 1e-3 * p.y * p.y, p.y + 2e-3 * p.x * p.y)
        }

        fn apply_inverse(&self, _p: Point2) -> Result<Point2> {
            unimplemented!()
        }
    }

    #[test]
    fn test_finite_difference_jacobian() {
        let p = Point2::new(10.0, -20.0);
        let lin = Swirl.linearize_at(p);
        let expected = Matrix2::new(1.0, 2e-3 * p.y, 2e-3 * p.y, 1.0 + 2e-3 * p.x);
        assert!((lin.linear - expected).norm() < 1e-8);
        assert!((lin.apply(p) - Swirl.apply_forward(p)).norm() < 1e-10);
    }

    #[test]
    fn test_affine_as_transform() {
        let t = AffineTransform::new(Matrix2::new(0.9, 0.1, -0.05, 1.05), Vector2::new(2.0, 1.0));
        let p = Point2::new(30.0, -4.0);
        let q = t.apply_inverse(p).unwrap();
        assert!((t.apply_forward(q) - p).norm() < 1e-12);
        let inv = t.linearize_inverse_at(p).unwrap();
        assert!((inv.apply(p) - q).norm() < 1e-12);
    }

    #[test]
    fn test_singular_affine_is_geometry_error() {
        let t = AffineTransform::linear(Matrix2::zeros());
        let err = t.apply_inverse(Point2::new(1.0, 1.0)).unwrap_err();
        assert!(matches!(err, PsfError::Geometry { .. }));
    }

    #[test]
    fn test_distortion_none_is_identity() {
        let d = Distortion::default();
        assert!(d.is_none());
        let p = Point2::new(3.0, 4.0);
        assert_eq!(d.apply_forward(p), p);
        assert_eq!(d.apply_inverse(p).unwrap(), p);
        assert_eq!(d.linearize_at(p).linear, Matrix2::identity());
    }
}
