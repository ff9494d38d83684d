//! Integer and floating boxes, affine maps, and the bounding-box helpers used
//! when a PSF footprint is pushed through a local linear map.
//!
//! # Conventions
//!
//! - Pixel `(x, y)` has its centre at integer coordinates; `x` runs along
//!   columns, `y` along rows.
//! - A kernel image is centred on the origin: its box spans negative and
//!   positive coordinates and pixel `(0, 0)` is the kernel centre.

use crate::{Matrix2, Point2, Vector2};

/// Tolerance applied before rounding transformed extents outward, so that an
/// identity map does not grow a box by a pixel through round-off.
const EXTENT_EPSILON: f64 = 1e-9;

/// Integer pixel rectangle: minimum corner plus extent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Box2I {
    pub min_x: i32,
    pub min_y: i32,
    width: usize,
    height: usize,
}

impl Box2I {
    pub fn new(min_x: i32, min_y: i32, width: usize, height: usize) -> Self {
        Self {
            min_x,
            min_y,
            width,
            height,
        }
    }

    /// Box of the given size centred on the origin.
    ///
    /// Odd sizes are symmetric; even sizes put the extra pixel on the negative side.
    pub fn centered(width: usize, height: usize) -> Self {
        Self::new(-(width as i32 / 2), -(height as i32 / 2), width, height)
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn max_x(&self) -> i32 {
        self.min_x + self.width as i32 - 1
    }

    pub fn max_y(&self) -> i32 {
        self.min_y + self.height as i32 - 1
    }

    pub fn area(&self) -> usize {
        self.width * self.height
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.min_x && x <= self.max_x() && y >= self.min_y && y <= self.max_y()
    }

    /// Shift the box by an integer offset.
    pub fn shifted(&self, dx: i32, dy: i32) -> Self {
        Self::new(self.min_x + dx, self.min_y + dy, self.width, self.height)
    }

    /// Grow the box by `pad` pixels on every side.
    pub fn grown(&self, pad: usize) -> Self {
        Self::new(
            self.min_x - pad as i32,
            self.min_y - pad as i32,
            self.width + 2 * pad,
            self.height + 2 * pad,
        )
    }

    /// Pixel-centre corners, in counter-clockwise order from the minimum corner.
    pub fn corners(&self) -> [Point2; 4] {
        let (x0, y0) = (self.min_x as f64, self.min_y as f64);
        let (x1, y1) = (self.max_x() as f64, self.max_y() as f64);
        [
            Point2::new(x0, y0),
            Point2::new(x1, y0),
            Point2::new(x1, y1),
            Point2::new(x0, y1),
        ]
    }
}

/// Floating-point rectangle, used for kernel validity domains.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Box2D {
    pub min: Point2,
    pub max: Point2,
}

impl Box2D {
    pub fn new(min: Point2, max: Point2) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, p: Point2) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.y >= self.min.y && p.y <= self.max.y
    }
}

/// Affine map `p -> linear * p + translation`.
///
/// This is the local linearization of a coordinate transform at a point;
/// it is recomputed for every evaluation and never cached across positions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AffineTransform {
    pub linear: Matrix2,
    pub translation: Vector2,
}

impl AffineTransform {
    pub fn new(linear: Matrix2, translation: Vector2) -> Self {
        Self {
            linear,
            translation,
        }
    }

    pub fn identity() -> Self {
        Self::new(Matrix2::identity(), Vector2::zeros())
    }

    /// Pure linear map with no translation.
    pub fn linear(linear: Matrix2) -> Self {
        Self::new(linear, Vector2::zeros())
    }

    /// The affine map that agrees with a transform whose derivative at `point`
    /// is `jacobian` and which sends `point` to `image`.
    pub fn tangent(point: Point2, image: Point2, jacobian: Matrix2) -> Self {
        Self::new(jacobian, image.coords - jacobian * point.coords)
    }

    pub fn apply(&self, p: Point2) -> Point2 {
        Point2::from(self.linear * p.coords + self.translation)
    }

    /// Inverse map, or `None` if the linear part is singular.
    pub fn inverted(&self) -> Option<Self> {
        let inv = self.linear.try_inverse()?;
        Some(Self::new(inv, -(inv * self.translation)))
    }

    /// Composition applying `self` first, then `next`.
    pub fn then(&self, next: &AffineTransform) -> Self {
        Self::new(
            next.linear * self.linear,
            next.linear * self.translation + next.translation,
        )
    }

    pub fn determinant(&self) -> f64 {
        self.linear.determinant()
    }
}

/// Largest singular value of a 2×2 matrix.
pub fn operator_norm(m: &Matrix2) -> f64 {
    // Closed form for 2x2: sqrt of the largest eigenvalue of M^T M.
    let mtm = m.transpose() * m;
    let tr = mtm.trace();
    let det = mtm.determinant();
    let disc = (0.25 * tr * tr - det).max(0.0).sqrt();
    (0.5 * tr + disc).sqrt()
}

/// Smallest origin-symmetric integer box that encloses the pixel-centre
/// corners of `src` after mapping them through `forward`.
///
/// The warped kernel image and `compute_bbox` both size themselves with this
/// function, which is what keeps their dimensions identical.
pub fn transformed_bbox(src: &Box2I, forward: &Matrix2) -> Box2I {
    let (mut x_rad, mut y_rad) = (0.0f64, 0.0f64);
    for c in src.corners() {
        let v = forward * c.coords;
        x_rad = x_rad.max(v.x.abs());
        y_rad = y_rad.max(v.y.abs());
    }
    let x_rad = (x_rad - EXTENT_EPSILON).ceil().max(0.0) as usize;
    let y_rad = (y_rad - EXTENT_EPSILON).ceil().max(0.0) as usize;
    Box2I::new(
        -(x_rad as i32),
        -(y_rad as i32),
        2 * x_rad + 1,
        2 * y_rad + 1,
    )
}

/// Split a floating position into its nearest integer pixel and the residual
/// in `[-0.5, 0.5)`.
pub fn position_to_index(v: f64) -> (i32, f64) {
    let index = (v + 0.5).floor();
    (index as i32, v - index)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_centered_box() {
        let b = Box2I::centered(15, 15);
        assert_eq!((b.min_x, b.max_x()), (-7, 7));
        let b = Box2I::centered(16, 9);
        assert_eq!((b.min_x, b.max_x()), (-8, 7));
        assert_eq!((b.min_y, b.max_y()), (-4, 4));
    }

    #[test]
    fn test_identity_bbox_unchanged() {
        let src = Box2I::centered(21, 11);
        let dst = transformed_bbox(&src, &Matrix2::identity());
        assert_eq!(dst, src);
    }

    #[test]
    fn test_rotated_bbox_grows() {
        let src = Box2I::centered(11, 11);
        let theta = std::f64::consts::FRAC_PI_4;
        let (s, c) = theta.sin_cos();
        let rot = Matrix2::new(c, -s, s, c);
        let dst = transformed_bbox(&src, &rot);
        // Corner (5,5) rotates to (0, 7.07), so the radius becomes 8.
        assert_eq!(dst.width(), 17);
        assert_eq!(dst.height(), 17);
    }

    #[test]
    fn test_affine_inverse_roundtrip() {
        let t = AffineTransform::new(Matrix2::new(1.1, 0.2, -0.1, 0.9), Vector2::new(3.0, -4.0));
        let inv = t.inverted().unwrap();
        let p = Point2::new(12.5, -7.25);
        let back = inv.apply(t.apply(p));
        assert!((back - p).norm() < 1e-12);
        let composed = t.then(&inv);
        assert!((composed.apply(p) - p).norm() < 1e-12);
    }

    #[test]
    fn test_singular_affine() {
        let t = AffineTransform::linear(Matrix2::new(1.0, 2.0, 2.0, 4.0));
        assert!(t.inverted().is_none());
    }

    #[test]
    fn test_operator_norm() {
        let m = Matrix2::new(3.0, 0.0, 0.0, -2.0);
        assert!((operator_norm(&m) - 3.0).abs() < 1e-12);
        assert!((operator_norm(&Matrix2::identity()) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_position_to_index() {
        assert_eq!(position_to_index(0.0), (0, 0.0));
        let (i, r) = position_to_index(5.7);
        assert_eq!(i, 6);
        assert!((r + 0.3).abs() < 1e-12);
        let (i, r) = position_to_index(-2.5);
        assert_eq!(i, -2);
        assert!((r + 0.5).abs() < 1e-12);
    }
}
