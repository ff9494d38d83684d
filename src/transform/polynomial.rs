//! Polynomial distortion transform.
//!
//! Models a smooth 2D distortion with polynomial correction terms:
//!
//! ```text
//! x_distorted = x + s · Σ A_pq · u^p · v^q     (1 ≤ p+q ≤ order)
//! y_distorted = y + s · Σ B_pq · u^p · v^q
//! ```
//!
//! where `u = x / s`, `v = y / s` and `s` is a normalization scale that keeps
//! the coefficients well conditioned. Linear terms are included, so the model
//! covers small rotations, shears and scale changes as well as curvature.
//!
//! The inverse has no closed form and is found by Newton iteration using the
//! analytic Jacobian.

use crate::error::{PsfError, Result};
use crate::geom::AffineTransform;
use crate::{Matrix2, Point2};

use super::CoordinateTransform;

/// Maximum Newton iterations for the inverse.
const MAX_INVERSE_ITERATIONS: usize = 50;
/// Convergence tolerance for the inverse, in pixels.
const INVERSE_TOLERANCE: f64 = 1e-10;

/// Polynomial distortion, undistorted → distorted.
#[derive(Debug, Clone)]
pub struct PolynomialTransform {
    /// Polynomial order (1..=6 typically).
    pub order: u32,
    /// Normalization scale: coordinates are divided by this before evaluation.
    pub scale: f64,
    /// x correction coefficients, indexed by [`coeff_index`].
    pub a_coeffs: Vec<f64>,
    /// y correction coefficients, indexed by [`coeff_index`].
    pub b_coeffs: Vec<f64>,
}

impl PolynomialTransform {
    /// Create a polynomial transform.
    ///
    /// Both coefficient vectors must have exactly `num_coeffs(order)` elements.
    pub fn new(order: u32, scale: f64, a_coeffs: Vec<f64>, b_coeffs: Vec<f64>) -> Self {
        let n = num_coeffs(order);
        assert_eq!(a_coeffs.len(), n, "a_coeffs length mismatch");
        assert_eq!(b_coeffs.len(), n, "b_coeffs length mismatch");
        Self {
            order,
            scale,
            a_coeffs,
            b_coeffs,
        }
    }

    /// Identity transform of the given order.
    pub fn zero(order: u32, scale: f64) -> Self {
        let n = num_coeffs(order);
        Self::new(order, scale, vec![0.0; n], vec![0.0; n])
    }

    /// Set the (p, q) coefficients of both axes.
    pub fn with_term(mut self, p: u32, q: u32, a: f64, b: f64) -> Self {
        let i = coeff_index(p, q);
        self.a_coeffs[i] = a;
        self.b_coeffs[i] = b;
        self
    }

    /// Returns `true` if all coefficients are zero.
    pub fn is_zero(&self) -> bool {
        self.a_coeffs.iter().all(|&c| c == 0.0) && self.b_coeffs.iter().all(|&c| c == 0.0)
    }

    /// Forward Jacobian at an undistorted point.
    pub fn jacobian(&self, p: Point2) -> Matrix2 {
        let u = p.x / self.scale;
        let v = p.y / self.scale;
        let (ax, ay) = eval_poly_gradient(&self.a_coeffs, self.order, u, v);
        let (bx, by) = eval_poly_gradient(&self.b_coeffs, self.order, u, v);
        Matrix2::new(1.0 + ax, ay, bx, 1.0 + by)
    }
}

impl CoordinateTransform for PolynomialTransform {
    fn apply_forward(&self, p: Point2) -> Point2 {
        let u = p.x / self.scale;
        let v = p.y / self.scale;
        let dx = eval_poly(&self.a_coeffs, self.order, u, v);
        let dy = eval_poly(&self.b_coeffs, self.order, u, v);
        Point2::new(p.x + dx * self.scale, p.y + dy * self.scale)
    }

    fn apply_inverse(&self, target: Point2) -> Result<Point2> {
        let tol = INVERSE_TOLERANCE * target.coords.norm().max(1.0);
        let mut x = target;
        for _ in 0..MAX_INVERSE_ITERATIONS {
            let residual = self.apply_forward(x) - target;
            let jinv = self
                .jacobian(x)
                .try_inverse()
                .ok_or_else(|| PsfError::geometry(target, "polynomial Jacobian is singular"))?;
            let step = jinv * residual;
            x -= step;
            if !x.x.is_finite() || !x.y.is_finite() {
                break;
            }
            if step.norm() < tol {
                return Ok(x);
            }
        }
        Err(PsfError::geometry(
            target,
            "polynomial inverse did not converge",
        ))
    }

    fn linearize_at(&self, p: Point2) -> AffineTransform {
        AffineTransform::tangent(p, self.apply_forward(p), self.jacobian(p))
    }
}

// ── Polynomial term helpers ─────────────────────────────────────────────────

/// Number of polynomial coefficients for the given order.
///
/// Terms are (p, q) with 1 ≤ p+q ≤ order:
///   order 1: 2 terms  (1,0),(0,1)
///   order 2: 5 terms  + (2,0),(1,1),(0,2)
///   order 3: 9 terms  + (3,0),(2,1),(1,2),(0,3)
pub fn num_coeffs(order: u32) -> usize {
    (1..=order).map(|s| (s + 1) as usize).sum()
}

/// Map (p, q) with 1 ≤ p+q ≤ order to a flat index.
///
/// Terms are enumerated in order of increasing sum, then decreasing p:
///   sum=1: (1,0)=0, (0,1)=1
///   sum=2: (2,0)=2, (1,1)=3, (0,2)=4
///   sum=3: (3,0)=5, (2,1)=6, (1,2)=7, (0,3)=8
pub fn coeff_index(p: u32, q: u32) -> usize {
    let s = p + q;
    assert!(s >= 1, "p+q must be >= 1");
    num_coeffs(s - 1) + (s - p) as usize
}

/// Enumerate all (p, q) pairs for the given order.
pub fn term_pairs(order: u32) -> Vec<(u32, u32)> {
    let mut pairs = Vec::with_capacity(num_coeffs(order));
    for s in 1..=order {
        for p in (0..=s).rev() {
            pairs.push((p, s - p));
        }
    }
    pairs
}

/// Evaluate Σ c_i · x^p_i · y^q_i.
fn eval_poly(coeffs: &[f64], order: u32, x: f64, y: f64) -> f64 {
    term_pairs(order)
        .into_iter()
        .zip(coeffs)
        .map(|((p, q), c)| c * x.powi(p as i32) * y.powi(q as i32))
        .sum()
}

/// Partial derivatives (∂/∂x, ∂/∂y) of Σ c_i · x^p_i · y^q_i.
fn eval_poly_gradient(coeffs: &[f64], order: u32, x: f64, y: f64) -> (f64, f64) {
    let mut gx = 0.0;
    let mut gy = 0.0;
    for ((p, q), c) in term_pairs(order).into_iter().zip(coeffs) {
        if p > 0 {
            gx += c * p as f64 * x.powi(p as i32 - 1) * y.powi(q as i32);
        }
        if q > 0 {
            gy += c * q as f64 * x.powi(p as i32) * y.powi(q as i32 - 1);
        }
    }
    (gx, gy)
}
