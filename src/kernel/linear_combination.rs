//! Kernels expressed as a linear combination of fixed basis images.
//!
//! This is the representation produced by a principal-component PSF fit:
//! the basis images are the components, and each carries a polynomial
//! coefficient of field position.
//!
//! ```text
//! K(x, y; position) ∝ Σ_i c_i(position) · B_i(x, y)
//! ```

use rkyv::{Archive, Deserialize, Serialize};

use crate::error::{PsfError, Result};
use crate::geom::Box2D;
use crate::image::normalize_weights;
use crate::persistence;
use crate::Point2;

use super::fixed::{FixedKernel, FixedKernelRecord};
use super::spatial::{PolynomialFunction2, PolynomialRecord};
use super::{check_domain, Kernel};

#[derive(Debug, Clone)]
pub struct LinearCombinationKernel {
    basis: Vec<FixedKernel>,
    spatial: Vec<PolynomialFunction2>,
    domain: Option<Box2D>,
}

impl LinearCombinationKernel {
    /// Combine `basis` images with one coefficient function each.
    ///
    /// All basis images must share the same dimensions.
    pub fn new(basis: Vec<FixedKernel>, spatial: Vec<PolynomialFunction2>) -> Result<Self> {
        let Some(first) = basis.first() else {
            return Err(PsfError::unsupported_size(0, 0, "empty basis"));
        };
        let dims = first.dimensions();
        if basis.len() != spatial.len() {
            return Err(PsfError::unsupported_size(
                dims.0,
                dims.1,
                format!(
                    "{} basis kernels but {} spatial functions",
                    basis.len(),
                    spatial.len()
                ),
            ));
        }
        if let Some(bad) = basis.iter().find(|b| b.dimensions() != dims) {
            let (w, h) = bad.dimensions();
            return Err(PsfError::unsupported_size(
                w,
                h,
                format!("basis kernel differs from {}x{}", dims.0, dims.1),
            ));
        }
        Ok(Self {
            basis,
            spatial,
            domain: None,
        })
    }

    /// Restrict evaluation to the domain the basis was fit over.
    pub fn with_domain(mut self, domain: Box2D) -> Self {
        self.domain = Some(domain);
        self
    }

    pub fn basis_kernels(&self) -> &[FixedKernel] {
        &self.basis
    }

    pub fn spatial_functions(&self) -> &[PolynomialFunction2] {
        &self.spatial
    }

    pub fn domain(&self) -> Option<&Box2D> {
        self.domain.as_ref()
    }

    /// Per-basis coefficients at a field position.
    pub fn coefficients_at(&self, position: Point2) -> Vec<f64> {
        self.spatial.iter().map(|f| f.eval(position)).collect()
    }

    /// Resize every basis image about its centre.
    pub fn resized_combination(&self, width: usize, height: usize) -> Result<Self> {
        let basis = self
            .basis
            .iter()
            .map(|b| b.resized_fixed(width, height))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            basis,
            spatial: self.spatial.clone(),
            domain: self.domain,
        })
    }

    pub(crate) fn to_record(&self) -> LinearCombinationRecord {
        LinearCombinationRecord {
            basis: self.basis.iter().map(FixedKernel::to_record).collect(),
            spatial: self.spatial.iter().map(PolynomialFunction2::to_record).collect(),
            domain: self
                .domain
                .map(|d| [d.min.x, d.min.y, d.max.x, d.max.y]),
        }
    }

    /// Read a kernel back from [`Kernel::to_bytes`] output.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let record = persistence::decode_linear_combination(bytes)?;
        let basis = record
            .basis
            .iter()
            .map(FixedKernel::from_record)
            .collect::<Result<Vec<_>>>()?;
        let spatial = record
            .spatial
            .iter()
            .map(|r| {
                PolynomialFunction2::from_record(r).ok_or_else(|| {
                    PsfError::Persistence("spatial function has the wrong parameter count".into())
                })
            })
            .collect::<Result<Vec<_>>>()?;
        if basis.len() != spatial.len() {
            return Err(PsfError::Persistence(
                "basis and spatial function counts differ".into(),
            ));
        }
        let mut kernel = Self::new(basis, spatial)?;
        kernel.domain = record
            .domain
            .map(|[x0, y0, x1, y1]| Box2D::new(Point2::new(x0, y0), Point2::new(x1, y1)));
        Ok(kernel)
    }
}

impl Kernel for LinearCombinationKernel {
    fn dimensions(&self) -> (usize, usize) {
        self.basis[0].dimensions()
    }

    fn is_spatially_varying(&self) -> bool {
        self.spatial.iter().any(|f| !f.is_constant())
    }

    fn check_position(&self, position: Point2) -> Result<()> {
        check_domain(self.domain.as_ref(), position)
    }

    fn fill_weights(&self, out: &mut [f64], position: Point2) -> Result<()> {
        self.check_position(position)?;
        out.iter_mut().for_each(|w| *w = 0.0);
        for (basis, coeff) in self.basis.iter().zip(self.coefficients_at(position)) {
            for (w, &b) in out.iter_mut().zip(basis.pixels()) {
                *w += coeff * b;
            }
        }
        normalize_weights(out)?;
        Ok(())
    }

    fn resized(&self, width: usize, height: usize) -> Result<Box<dyn Kernel>> {
        Ok(Box::new(self.resized_combination(width, height)?))
    }

    fn clone_kernel(&self) -> Box<dyn Kernel> {
        Box::new(self.clone())
    }

    fn persistence_name(&self) -> &'static str {
        "LinearCombinationKernel"
    }

    fn to_bytes(&self) -> Option<Vec<u8>> {
        persistence::encode_linear_combination(&self.to_record()).ok()
    }
}

/// Serialized form of a [`LinearCombinationKernel`].
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
pub struct LinearCombinationRecord {
    pub basis: Vec<FixedKernelRecord>,
    pub spatial: Vec<PolynomialRecord>,
    pub domain: Option<[f64; 4]>,
}
