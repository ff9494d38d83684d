//! PSF whose kernel is a linear combination of principal components.
//!
//! Evaluation, caching and bounding boxes are exactly those of
//! [`KernelPsf`]; this type only adds a typed view of the basis.

use crate::error::{PsfError, Result};
use crate::geom::Box2I;
use crate::image::Image;
use crate::kernel::{FixedKernel, LinearCombinationKernel, PolynomialFunction2};
use crate::persistence::PsfRecord;
use crate::Point2;

use super::{Color, KernelPsf, PsfImageCache, PsfModel};

#[derive(Debug, Clone)]
pub struct PcaPsf {
    inner: KernelPsf<LinearCombinationKernel>,
}

impl PcaPsf {
    pub fn new(kernel: LinearCombinationKernel, average_position: Point2) -> Self {
        Self {
            inner: KernelPsf::new(kernel, average_position),
        }
    }

    pub fn kernel(&self) -> &LinearCombinationKernel {
        self.inner.kernel()
    }

    /// The principal-component images.
    pub fn basis_kernels(&self) -> &[FixedKernel] {
        self.kernel().basis_kernels()
    }

    /// Coefficient functions, one per basis image.
    pub fn spatial_functions(&self) -> &[PolynomialFunction2] {
        self.kernel().spatial_functions()
    }

    /// Weight of each basis image at a field position.
    pub fn coefficients_at(&self, position: Point2) -> Vec<f64> {
        self.kernel().coefficients_at(position)
    }

    pub fn persistence_name(&self) -> &'static str {
        "PcaPsf"
    }

    pub fn to_record(&self) -> Result<PsfRecord> {
        self.inner.record_as(self.persistence_name())
    }

    pub fn from_record(record: &PsfRecord) -> Result<Self> {
        if record.name != "PcaPsf" || record.kernel_name != "LinearCombinationKernel" {
            return Err(PsfError::Persistence(format!(
                "expected a PcaPsf record over a LinearCombinationKernel, found {:?} over {:?}",
                record.name, record.kernel_name
            )));
        }
        let kernel = LinearCombinationKernel::from_bytes(&record.kernel)?;
        Ok(Self::new(kernel, record.average_position()))
    }
}

impl PsfModel for PcaPsf {
    fn do_compute_kernel_image(&self, position: Point2, color: Color) -> Result<Image> {
        self.inner.do_compute_kernel_image(position, color)
    }

    fn do_compute_bbox(&self, position: Point2, color: Color) -> Result<Box2I> {
        self.inner.do_compute_bbox(position, color)
    }

    fn cache(&self) -> &PsfImageCache {
        self.inner.cache()
    }

    fn average_position(&self) -> Point2 {
        self.inner.average_position()
    }

    fn is_spatially_invariant(&self) -> bool {
        self.inner.is_spatially_invariant()
    }

    fn check_position(&self, position: Point2) -> Result<()> {
        self.inner.check_position(position)
    }

    fn clone_psf(&self) -> Box<dyn PsfModel> {
        Box::new(self.clone())
    }

    /// Resizing keeps the combination structure, so the result is still a `PcaPsf`.
    fn resized(&self, width: usize, height: usize) -> Result<Box<dyn PsfModel>> {
        let kernel = self.kernel().resized_combination(width, height)?;
        Ok(Box::new(PcaPsf::new(kernel, self.average_position())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn pca() -> PcaPsf {
        let mut core = vec![0.0; 9];
        core[4] = 1.0;
        let flat = vec![1.0; 9];
        let kernel = LinearCombinationKernel::new(
            vec![
                FixedKernel::new(3, 3, core).unwrap(),
                FixedKernel::new(3, 3, flat).unwrap(),
            ],
            vec![
                PolynomialFunction2::constant(1.0),
                PolynomialFunction2::new(1, vec![0.0, 0.0, 0.1]),
            ],
        )
        .unwrap();
        PcaPsf::new(kernel, Point2::new(10.0, 10.0))
    }

    #[test]
    fn test_basis_view() {
        let psf = pca();
        assert_eq!(psf.basis_kernels().len(), 2);
        assert_eq!(psf.coefficients_at(Point2::new(0.0, 20.0)), vec![1.0, 2.0]);
        assert!(!psf.is_spatially_invariant());
    }

    #[test]
    fn test_spatially_varying_cache_keys_on_position() {
        let psf = pca();
        let a = psf.compute_kernel_image(Point2::new(0.0, 0.0), Color::default()).unwrap();
        let b = psf.compute_kernel_image(Point2::new(0.0, 10.0), Color::default()).unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
        assert!((a.get(0, 0).unwrap() - 1.0).abs() < 1e-15);
        assert!((b.get(0, 0).unwrap() - 2.0 / 10.0).abs() < 1e-15);
        let c = psf.compute_kernel_image(Point2::new(0.0, 10.0), Color::default()).unwrap();
        assert!(Arc::ptr_eq(&b, &c));
    }

    #[test]
    fn test_record_roundtrip() {
        let psf = pca();
        let record = psf.to_record().unwrap();
        assert_eq!(record.name, "PcaPsf");
        let back = PcaPsf::from_record(&record).unwrap();
        assert_eq!(back.basis_kernels(), psf.basis_kernels());
        assert_eq!(back.average_position(), psf.average_position());
        assert!(KernelPsf::from_record(&record).is_err());
    }

    #[test]
    fn test_resized() {
        let psf = pca();
        let r = psf.resized(7, 5).unwrap();
        let bbox = r.compute_bbox(Point2::origin(), Color::default()).unwrap();
        assert_eq!((bbox.width(), bbox.height()), (7, 5));
        assert!(psf.resized(0, 5).is_err());
    }
}
