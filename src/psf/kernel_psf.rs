//! PSF backed directly by a [`Kernel`].

use tracing::debug;

use crate::error::{PsfError, Result};
use crate::geom::Box2I;
use crate::image::Image;
use crate::kernel::{compute_kernel_image, AnalyticKernel, Kernel, KernelFunction};
use crate::persistence::{self, PsfRecord};
use crate::Point2;

use super::{Color, PsfImageCache, PsfModel};

/// A PSF whose kernel image is whatever its kernel produces at a position.
///
/// The kernel type defaults to a boxed trait object; wrapping a concrete
/// kernel type keeps typed access to it (see [`PcaPsf`](super::PcaPsf)).
#[derive(Debug, Clone)]
pub struct KernelPsf<K: Kernel + Clone = Box<dyn Kernel>> {
    kernel: K,
    average_position: Point2,
    cache: PsfImageCache,
}

impl<K: Kernel + Clone> KernelPsf<K> {
    pub fn new(kernel: K, average_position: Point2) -> Self {
        Self {
            kernel,
            average_position,
            cache: PsfImageCache::new(),
        }
    }

    pub fn kernel(&self) -> &K {
        &self.kernel
    }

    /// Name under which this model type is persisted.
    pub fn persistence_name(&self) -> &'static str {
        "KernelPsf"
    }

    /// The two persisted fields: the kernel's serialized form and the
    /// average position.
    pub fn to_record(&self) -> Result<PsfRecord> {
        self.record_as(self.persistence_name())
    }

    pub(crate) fn record_as(&self, name: &str) -> Result<PsfRecord> {
        let kernel = self
            .kernel
            .to_bytes()
            .ok_or_else(|| PsfError::NotPersistable(self.kernel.persistence_name().to_string()))?;
        Ok(PsfRecord {
            name: name.to_string(),
            kernel_name: self.kernel.persistence_name().to_string(),
            kernel,
            average_position: [self.average_position.x, self.average_position.y],
        })
    }
}

impl KernelPsf {
    /// Rebuild a model from [`KernelPsf::to_record`] output.
    pub fn from_record(record: &PsfRecord) -> Result<Self> {
        if record.name != "KernelPsf" {
            return Err(PsfError::Persistence(format!(
                "expected a KernelPsf record, found {:?}",
                record.name
            )));
        }
        let kernel = persistence::decode_kernel(&record.kernel_name, &record.kernel)?;
        Ok(Self::new(kernel, record.average_position()))
    }
}

impl KernelPsf<AnalyticKernel> {
    /// Spatially invariant sum of two concentric circular Gaussians.
    ///
    /// `b` is the amplitude of the second Gaussian relative to the first.
    pub fn double_gaussian(
        width: usize,
        height: usize,
        sigma1: f64,
        sigma2: f64,
        b: f64,
    ) -> Result<Self> {
        if sigma1 <= 0.0 || (b != 0.0 && sigma2 <= 0.0) {
            return Err(PsfError::DegenerateKernel);
        }
        let kernel = AnalyticKernel::new(
            width,
            height,
            KernelFunction::DoubleGaussian { sigma1, sigma2, b },
        )?;
        Ok(Self::new(kernel, Point2::origin()))
    }
}

impl<K: Kernel + Clone + 'static> PsfModel for KernelPsf<K> {
    fn do_compute_kernel_image(&self, position: Point2, _color: Color) -> Result<Image> {
        compute_kernel_image(&self.kernel, position)
    }

    fn do_compute_bbox(&self, _position: Point2, _color: Color) -> Result<Box2I> {
        Ok(self.kernel.bbox())
    }

    fn cache(&self) -> &PsfImageCache {
        &self.cache
    }

    fn average_position(&self) -> Point2 {
        self.average_position
    }

    fn is_spatially_invariant(&self) -> bool {
        !self.kernel.is_spatially_varying()
    }

    fn check_position(&self, position: Point2) -> Result<()> {
        self.kernel.check_position(position)
    }

    fn clone_psf(&self) -> Box<dyn PsfModel> {
        Box::new(self.clone())
    }

    fn resized(&self, width: usize, height: usize) -> Result<Box<dyn PsfModel>> {
        debug!(width, height, kernel = self.kernel.persistence_name(), "resizing kernel psf");
        let kernel = self.kernel.resized(width, height)?;
        Ok(Box::new(KernelPsf::new(kernel, self.average_position)))
    }
}
