//! Basis-function kernels that synthesize PSF weight maps.
//!
//! A [`Kernel`] has fixed pixel dimensions and fills a weight buffer for a
//! field position. Spatially invariant kernels ignore the position;
//! spatially varying kernels evaluate their coefficients there. Resizing
//! always produces a new kernel.
//!
//! # Implementations
//!
//! - [`FixedKernel`]: a stored image, spatially invariant
//! - [`AnalyticKernel`]: an analytic profile whose parameters may vary with position
//! - [`LinearCombinationKernel`]: a weighted sum of basis images (PCA kernels)

pub mod analytic;
pub mod fixed;
pub mod linear_combination;
pub mod spatial;

pub use analytic::{AnalyticKernel, KernelFunction};
pub use fixed::FixedKernel;
pub use linear_combination::LinearCombinationKernel;
pub use spatial::PolynomialFunction2;

use std::fmt;

use crate::error::{PsfError, Result};
use crate::geom::{Box2D, Box2I};
use crate::image::{Image, MAX_IMAGE_PIXELS};
use crate::Point2;

/// Opaque 2-D basis-function evaluator with a fixed footprint.
pub trait Kernel: Send + Sync + fmt::Debug {
    /// Pixel dimensions `(width, height)`.
    fn dimensions(&self) -> (usize, usize);

    /// True if the weights depend on the field position.
    fn is_spatially_varying(&self) -> bool;

    /// Write normalized weights for `position` into `out` (row-major,
    /// `width * height` values).
    fn fill_weights(&self, out: &mut [f64], position: Point2) -> Result<()>;

    /// Fail with [`PsfError::Geometry`] if `position` lies outside the domain
    /// the kernel is valid over. Kernels without a domain accept everything.
    fn check_position(&self, _position: Point2) -> Result<()> {
        Ok(())
    }

    /// A new kernel with the given footprint.
    fn resized(&self, width: usize, height: usize) -> Result<Box<dyn Kernel>>;

    fn clone_kernel(&self) -> Box<dyn Kernel>;

    /// Name recorded alongside the serialized form.
    fn persistence_name(&self) -> &'static str;

    /// Serialized form, or `None` if the kernel cannot be persisted.
    fn to_bytes(&self) -> Option<Vec<u8>> {
        None
    }

    /// Array index of the kernel centre.
    fn center(&self) -> (usize, usize) {
        let (w, h) = self.dimensions();
        (w / 2, h / 2)
    }

    /// Footprint in kernel coordinates, with the centre at the origin.
    fn bbox(&self) -> Box2I {
        let (w, h) = self.dimensions();
        let (cx, cy) = self.center();
        Box2I::new(-(cx as i32), -(cy as i32), w, h)
    }
}

impl Clone for Box<dyn Kernel> {
    fn clone(&self) -> Self {
        self.clone_kernel()
    }
}

impl Kernel for Box<dyn Kernel> {
    fn dimensions(&self) -> (usize, usize) {
        (**self).dimensions()
    }

    fn is_spatially_varying(&self) -> bool {
        (**self).is_spatially_varying()
    }

    fn fill_weights(&self, out: &mut [f64], position: Point2) -> Result<()> {
        (**self).fill_weights(out, position)
    }

    fn check_position(&self, position: Point2) -> Result<()> {
        (**self).check_position(position)
    }

    fn resized(&self, width: usize, height: usize) -> Result<Box<dyn Kernel>> {
        (**self).resized(width, height)
    }

    fn clone_kernel(&self) -> Box<dyn Kernel> {
        (**self).clone_kernel()
    }

    fn persistence_name(&self) -> &'static str {
        (**self).persistence_name()
    }

    fn to_bytes(&self) -> Option<Vec<u8>> {
        (**self).to_bytes()
    }

    fn center(&self) -> (usize, usize) {
        (**self).center()
    }

    fn bbox(&self) -> Box2I {
        (**self).bbox()
    }
}

/// Evaluate a kernel into a new image centred on the origin.
pub fn compute_kernel_image<K: Kernel + ?Sized>(kernel: &K, position: Point2) -> Result<Image> {
    let mut image = Image::new(kernel.bbox())?;
    kernel.fill_weights(image.data_mut(), position)?;
    Ok(image)
}

/// Reject positions outside a kernel's fitted domain.
pub(crate) fn check_domain(domain: Option<&Box2D>, position: Point2) -> Result<()> {
    match domain {
        Some(d) if !d.contains(position) => Err(PsfError::geometry(
            position,
            "position is outside the domain the kernel was fit over",
        )),
        _ => Ok(()),
    }
}

/// Reject empty footprints, and footprints too large to allocate, before any
/// pixel buffer is sized from them.
pub(crate) fn check_size(width: usize, height: usize) -> Result<()> {
    if width == 0 || height == 0 {
        return Err(PsfError::unsupported_size(
            width,
            height,
            "kernel dimensions must be positive",
        ));
    }
    match width.checked_mul(height) {
        Some(n) if n <= MAX_IMAGE_PIXELS => Ok(()),
        _ => Err(PsfError::Allocation { width, height }),
    }
}
