//! Spatial functions: polynomials in field position that drive kernel
//! parameters and basis coefficients.

use rkyv::{Archive, Deserialize, Serialize};

use crate::Point2;

/// 2-D polynomial Σ c · x^p · y^q with p+q ≤ order.
///
/// Parameters are ordered by increasing total degree, then decreasing power
/// of x: `1, x, y, x², xy, y², x³, x²y, xy², y³, ...`
#[derive(Debug, Clone, PartialEq)]
pub struct PolynomialFunction2 {
    order: u32,
    params: Vec<f64>,
}

impl PolynomialFunction2 {
    /// Create a polynomial of the given order.
    ///
    /// `params` must have exactly `num_params(order)` elements.
    pub fn new(order: u32, params: Vec<f64>) -> Self {
        assert_eq!(
            params.len(),
            Self::num_params(order),
            "polynomial parameter count mismatch"
        );
        Self { order, params }
    }

    /// Order-zero polynomial with the given value.
    pub fn constant(value: f64) -> Self {
        Self::new(0, vec![value])
    }

    pub fn num_params(order: u32) -> usize {
        ((order + 1) * (order + 2) / 2) as usize
    }

    pub fn order(&self) -> u32 {
        self.order
    }

    pub fn params(&self) -> &[f64] {
        &self.params
    }

    /// True if only the constant term can be non-zero.
    pub fn is_constant(&self) -> bool {
        self.params[1..].iter().all(|&c| c == 0.0)
    }

    pub fn eval(&self, p: Point2) -> f64 {
        let mut result = 0.0;
        let mut idx = 0;
        for s in 0..=self.order {
            for px in (0..=s).rev() {
                let qy = s - px;
                result += self.params[idx] * p.x.powi(px as i32) * p.y.powi(qy as i32);
                idx += 1;
            }
        }
        result
    }

    pub(crate) fn to_record(&self) -> PolynomialRecord {
        PolynomialRecord {
            order: self.order,
            params: self.params.clone(),
        }
    }

    pub(crate) fn from_record(record: &PolynomialRecord) -> Option<Self> {
        (record.params.len() == Self::num_params(record.order)).then(|| Self {
            order: record.order,
            params: record.params.clone(),
        })
    }
}

/// Serialized form of a [`PolynomialFunction2`].
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
pub struct PolynomialRecord {
    pub order: u32,
    pub params: Vec<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_num_params() {
        assert_eq!(PolynomialFunction2::num_params(0), 1);
        assert_eq!(PolynomialFunction2::num_params(1), 3);
        assert_eq!(PolynomialFunction2::num_params(2), 6);
    }

    #[test]
    fn test_eval_order_one() {
        let f = PolynomialFunction2::new(1, vec![1.0, 0.5, 0.25]);
        assert_eq!(f.eval(Point2::new(2.0, 4.0)), 1.0 + 1.0 + 1.0);
        assert!(!f.is_constant());
    }

    #[test]
    fn test_eval_order_two() {
        // 1, x, y, x², xy, y²
        let f = PolynomialFunction2::new(2, vec![0.0, 0.0, 0.0, 1.0, 2.0, 3.0]);
        let p = Point2::new(2.0, -1.0);
        assert_eq!(f.eval(p), 4.0 - 4.0 + 3.0);
    }

    #[test]
    fn test_constant() {
        let f = PolynomialFunction2::constant(2.5);
        assert!(f.is_constant());
        assert_eq!(f.eval(Point2::new(100.0, -3.0)), 2.5);
    }
}
