//! A PSF expressed in a distorted frame.
//!
//! [`WarpedPsf`] wraps an underlying model defined in the undistorted frame
//! and a [`CoordinateTransform`] whose forward direction maps undistorted to
//! distorted coordinates. At a distorted position `p` it:
//!
//! 1. maps `p` back to the underlying frame, `q = T⁻¹(p)`;
//! 2. linearizes `T` at `q`, giving the 2×2 map `M` from underlying kernel
//!    pixels to warped kernel pixels;
//! 3. zero-pads the underlying kernel image at `q` and resamples it onto the
//!    smallest symmetric box enclosing the mapped kernel corners;
//! 4. renormalizes the result to unit sum.
//!
//! `compute_bbox` derives its box from the same `M` and the same helper, so
//! it always matches the kernel image dimensions.

use std::sync::Arc;

use tracing::debug;

use crate::error::{PsfError, Result};
use crate::geom::{operator_norm, transformed_bbox, Box2I};
use crate::image::Image;
use crate::interpolation::{warp_linear, Interpolation};
use crate::transform::CoordinateTransform;
use crate::{Matrix2, Point2};

use super::{Color, PsfImageCache, PsfModel};

/// Resampling settings for [`WarpedPsf`].
///
/// The warped footprint is the box enclosing the mapped corners of the
/// underlying footprint. Where the local map shrinks the kernel, the mapped
/// profile falls off well inside that box, and its outermost rows and columns
/// hold only the interpolation kernel's ringing: values a small fraction of the
/// peak, of either sign. Images are renormalized after warping, so this
/// ringing is part of the unit sum.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WarpingConfig {
    /// Kernel used both for warping and for recentring display images.
    pub interpolation: Interpolation,
    /// Zero pixels added around the underlying kernel image before warping.
    pub padding: usize,
}

impl Default for WarpingConfig {
    fn default() -> Self {
        let interpolation = Interpolation::default();
        Self {
            interpolation,
            padding: interpolation.radius(),
        }
    }
}

#[derive(Debug)]
pub struct WarpedPsf {
    underlying: Box<dyn PsfModel>,
    transform: Arc<dyn CoordinateTransform>,
    config: WarpingConfig,
    /// Fixed destination footprint set by `resized`.
    footprint: Option<(usize, usize)>,
    cache: PsfImageCache,
}

impl WarpedPsf {
    pub fn new(underlying: Box<dyn PsfModel>, transform: Arc<dyn CoordinateTransform>) -> Self {
        Self::with_config(underlying, transform, WarpingConfig::default())
    }

    pub fn with_config(
        underlying: Box<dyn PsfModel>,
        transform: Arc<dyn CoordinateTransform>,
        config: WarpingConfig,
    ) -> Self {
        Self {
            underlying,
            transform,
            config,
            footprint: None,
            cache: PsfImageCache::new(),
        }
    }

    pub fn underlying(&self) -> &dyn PsfModel {
        self.underlying.as_ref()
    }

    pub fn transform(&self) -> &Arc<dyn CoordinateTransform> {
        &self.transform
    }

    pub fn config(&self) -> &WarpingConfig {
        &self.config
    }

    /// Underlying-frame position for `position`, and the local linear map
    /// from underlying kernel pixels to warped kernel pixels there.
    fn local_map(&self, position: Point2) -> Result<(Point2, Matrix2)> {
        let q = self.transform.apply_inverse(position)?;
        let forward = self.transform.linearize_at(q).linear;
        check_linearization(position, &forward)?;
        Ok((q, forward))
    }

    fn destination_bbox(&self, src: &Box2I, forward: &Matrix2) -> Box2I {
        match self.footprint {
            Some((width, height)) => Box2I::centered(width, height),
            None => transformed_bbox(src, forward),
        }
    }
}

fn check_linearization(position: Point2, forward: &Matrix2) -> Result<()> {
    if !forward.iter().all(|v| v.is_finite()) || forward.determinant() == 0.0 {
        return Err(PsfError::geometry(
            position,
            "local linearization of the transform is singular",
        ));
    }
    Ok(())
}

impl Clone for WarpedPsf {
    fn clone(&self) -> Self {
        Self {
            underlying: self.underlying.clone_psf(),
            transform: Arc::clone(&self.transform),
            config: self.config,
            footprint: self.footprint,
            cache: PsfImageCache::new(),
        }
    }
}

impl PsfModel for WarpedPsf {
    fn do_compute_kernel_image(&self, position: Point2, color: Color) -> Result<Image> {
        let (q, forward) = self.local_map(position)?;
        let dest_to_src = forward
            .try_inverse()
            .ok_or_else(|| PsfError::geometry(position, "local linearization is not invertible"))?;

        let src = self.underlying.compute_kernel_image(q, color)?;
        let padded = src.zero_padded(self.config.padding)?;
        let dest_bbox = self.destination_bbox(&src.bbox(), &forward);
        debug!(
            x = position.x,
            y = position.y,
            ux = q.x,
            uy = q.y,
            width = dest_bbox.width(),
            height = dest_bbox.height(),
            "warping psf kernel image"
        );

        let mut image = warp_linear(&padded, &dest_to_src, dest_bbox, self.config.interpolation)?;
        let total = image.normalize()?;
        debug!(total, "normalized warped kernel image");
        Ok(image)
    }

    fn do_compute_bbox(&self, position: Point2, color: Color) -> Result<Box2I> {
        let (q, forward) = self.local_map(position)?;
        let src = self.underlying.compute_bbox(q, color)?;
        Ok(self.destination_bbox(&src, &forward))
    }

    fn cache(&self) -> &PsfImageCache {
        &self.cache
    }

    /// The underlying average position carried into the warped frame.
    fn average_position(&self) -> Point2 {
        self.transform
            .apply_forward(self.underlying.average_position())
    }

    fn average_color(&self) -> Color {
        self.underlying.average_color()
    }

    fn recenter_interpolation(&self) -> Interpolation {
        self.config.interpolation
    }

    fn clone_psf(&self) -> Box<dyn PsfModel> {
        Box::new(self.clone())
    }

    fn resized(&self, width: usize, height: usize) -> Result<Box<dyn PsfModel>> {
        let q = self.underlying.average_position();
        let forward = self.transform.linearize_at(q).linear;
        check_linearization(q, &forward)?;
        // Kept in floating point: a huge scale must not wrap the pixel count.
        let margin = (self.config.padding as f64 * operator_norm(&forward)).ceil();
        let minimum = 2.0 * margin + 1.0;
        if (width as f64) < minimum || (height as f64) < minimum {
            return Err(PsfError::unsupported_size(
                width,
                height,
                format!("warped footprint needs at least {minimum}x{minimum} pixels"),
            ));
        }
        debug!(width, height, minimum, "resizing warped psf");
        let mut resized = self.clone();
        resized.footprint = Some((width, height));
        Ok(Box::new(resized))
    }
}
