//! The PSF model contract and its implementations.
//!
//! [`PsfModel`] is the interface measurement code consumes. Implementations
//! supply the uncached `do_compute_*` hooks; the provided `compute_*` methods
//! add colour resolution and single-slot caching on top.
//!
//! # Images
//!
//! - **Kernel image**: the PSF in its own pixel grid, centred on the origin
//!   and normalized to sum to 1.
//! - **Display image**: the kernel image shifted so that its centre lands on
//!   the requested field position, with an integer origin in field
//!   coordinates. Resampling means it need not sum to exactly 1.

pub mod cache;
pub mod kernel_psf;
pub mod pca_psf;
pub mod warped_psf;

pub use cache::{ImageSlot, PsfImageCache};
pub use kernel_psf::KernelPsf;
pub use pca_psf::PcaPsf;
pub use warped_psf::{WarpedPsf, WarpingConfig};

use std::fmt;
use std::sync::Arc;

use crate::error::{PsfError, Result};
use crate::geom::{position_to_index, Box2I};
use crate::image::Image;
use crate::interpolation::{offset_image, Interpolation};
use crate::Point2;

/// Colour (or wavelength) parameter of a PSF evaluation.
///
/// An indeterminate colour resolves to the model's average colour.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Color {
    value: Option<f64>,
}

impl Color {
    pub fn new(value: f64) -> Self {
        Self { value: Some(value) }
    }

    pub fn indeterminate() -> Self {
        Self { value: None }
    }

    pub fn is_indeterminate(&self) -> bool {
        self.value.is_none()
    }

    pub fn value(&self) -> Option<f64> {
        self.value
    }
}

/// A point-spread function that can be evaluated anywhere in its frame.
///
/// Models are immutable after construction apart from their image cache, and
/// may be evaluated concurrently from many threads.
pub trait PsfModel: Send + Sync + fmt::Debug {
    /// Uncached kernel image at `position`, centred on the origin and
    /// normalized to sum to 1.
    fn do_compute_kernel_image(&self, position: Point2, color: Color) -> Result<Image>;

    /// Footprint the kernel image at `position` will have.
    fn do_compute_bbox(&self, position: Point2, color: Color) -> Result<Box2I>;

    /// The model's per-instance cache.
    fn cache(&self) -> &PsfImageCache;

    /// Representative position, fixed at construction.
    fn average_position(&self) -> Point2;

    /// Deep, independent copy with an empty cache.
    fn clone_psf(&self) -> Box<dyn PsfModel>;

    /// A new model with a `width` × `height` footprint.
    fn resized(&self, width: usize, height: usize) -> Result<Box<dyn PsfModel>>;

    /// True if the kernel image is the same at every position.
    fn is_spatially_invariant(&self) -> bool {
        false
    }

    fn average_color(&self) -> Color {
        Color::default()
    }

    /// Fail with [`PsfError::Geometry`] if the model cannot be evaluated at
    /// `position`. Checked against the requested position even when the
    /// cache key is the average position.
    fn check_position(&self, _position: Point2) -> Result<()> {
        Ok(())
    }

    /// Interpolation used to shift kernel images onto the display grid.
    fn recenter_interpolation(&self) -> Interpolation {
        Interpolation::default()
    }

    /// Uncached display image: the cached kernel image recentred on `position`.
    fn do_compute_image(&self, position: Point2, color: Color) -> Result<Image> {
        let kernel = self.compute_kernel_image(position, color)?;
        recenter_kernel_image(&kernel, position, self.recenter_interpolation())
    }

    /// Kernel image at `position`, served from the cache when the effective
    /// key matches the last request. Spatially invariant models share one
    /// entry for every position.
    fn compute_kernel_image(&self, position: Point2, color: Color) -> Result<Arc<Image>> {
        self.check_position(position)?;
        let color = resolve_color(self, color);
        let position = if self.is_spatially_invariant() {
            self.average_position()
        } else {
            position
        };
        self.cache().kernel.get_or_compute(position, color, || {
            self.do_compute_kernel_image(position, color)
        })
    }

    /// Display image at `position`, cached per position.
    fn compute_image(&self, position: Point2, color: Color) -> Result<Arc<Image>> {
        let color = resolve_color(self, color);
        self.cache()
            .image
            .get_or_compute(position, color, || self.do_compute_image(position, color))
    }

    /// Footprint of the kernel image at `position`, without computing pixels.
    fn compute_bbox(&self, position: Point2, color: Color) -> Result<Box2I> {
        self.check_position(position)?;
        let color = resolve_color(self, color);
        let position = if self.is_spatially_invariant() {
            self.average_position()
        } else {
            position
        };
        self.do_compute_bbox(position, color)
    }

    /// Display-image value at the pixel nearest `position`.
    fn compute_peak(&self, position: Point2, color: Color) -> Result<f64> {
        let image = self.compute_image(position, color)?;
        let (ix, _) = position_to_index(position.x);
        let (iy, _) = position_to_index(position.y);
        image
            .get(ix, iy)
            .ok_or_else(|| PsfError::geometry(position, "display image does not cover its centre"))
    }
}

impl Clone for Box<dyn PsfModel> {
    fn clone(&self) -> Self {
        self.clone_psf()
    }
}

fn resolve_color<P: PsfModel + ?Sized>(psf: &P, color: Color) -> Color {
    if color.is_indeterminate() {
        psf.average_color()
    } else {
        color
    }
}

/// Shift a kernel image so its centre lands on `position`.
///
/// The sub-pixel residual is applied by resampling; the integer part moves
/// the image origin. Dimensions are unchanged.
pub fn recenter_kernel_image(
    kernel: &Image,
    position: Point2,
    interpolation: Interpolation,
) -> Result<Image> {
    let (ix, rx) = position_to_index(position.x);
    let (iy, ry) = position_to_index(position.y);
    let mut image = if rx != 0.0 || ry != 0.0 {
        offset_image(kernel, rx, ry, interpolation)?
    } else {
        kernel.clone()
    };
    image.set_origin(kernel.x0() + ix, kernel.y0() + iy);
    Ok(image)
}
