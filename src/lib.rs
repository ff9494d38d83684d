//! # psfwarp
//!
//! Point-spread function models with per-instance evaluation caching and
//! coordinate warping.
//!
//! A PSF model evaluates the blur kernel of an imaging system as a discrete,
//! normalized image at any field position. Models cache their most recent
//! evaluation, and a [`WarpedPsf`] re-expresses any model in a distorted
//! frame by locally linearizing a [`CoordinateTransform`] and resampling,
//! rather than by resampling a single fixed image.
//!
//! ## Features
//!
//! - **Kernel-backed PSFs**: [`KernelPsf`] over any [`Kernel`], including
//!   fixed images, analytic Gaussian profiles and spatially varying
//!   principal-component combinations ([`PcaPsf`])
//! - **Single-slot caching**: repeated requests at the same position return
//!   the same `Arc<Image>`; spatially invariant models share one entry
//!   across all positions
//! - **Warping**: sub-pixel Lanczos resampling with zero padding, so warped
//!   kernel images have no unfilled edges
//! - **Thread-safe**: models are `Send + Sync`; cache updates are a single
//!   atomic swap
//! - **Persistence records**: kernel-backed models round-trip through a small
//!   [rkyv](https://docs.rs/rkyv) record
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use psfwarp::{Color, KernelPsf, PolynomialTransform, PsfModel, Point2, WarpedPsf};
//!
//! // A 21x21 double-Gaussian PSF defined in undistorted pixel coordinates
//! let psf = KernelPsf::double_gaussian(21, 21, 2.0, 5.0, 0.1).unwrap();
//!
//! // Mild quadratic distortion, undistorted -> distorted
//! let distortion = PolynomialTransform::zero(2, 1000.0).with_term(2, 0, 0.01, 0.0);
//! let warped = WarpedPsf::new(Box::new(psf), Arc::new(distortion));
//!
//! let p = Point2::new(812.3, -440.7);
//! let kernel = warped.compute_kernel_image(p, Color::default()).unwrap();
//! let image = warped.compute_image(p, Color::default()).unwrap();
//! println!("kernel {}x{}, display origin ({}, {})",
//!     kernel.width(), kernel.height(), image.x0(), image.y0());
//! ```
//!
//! ## Conventions
//!
//! - Kernel images are centred on the origin; display images are placed so
//!   that their centre lands on the requested position.
//! - Transforms map the undistorted (underlying PSF) frame forward into the
//!   distorted (warped) frame.
//! - All errors are [`PsfError`]; nothing is retried internally.

pub mod error;
pub mod geom;
pub mod image;
pub mod interpolation;
pub mod kernel;
pub mod persistence;
pub mod psf;
pub mod transform;

pub use error::{PsfError, Result};
pub use geom::{AffineTransform, Box2D, Box2I};
pub use image::Image;
pub use interpolation::Interpolation;
pub use kernel::{
    AnalyticKernel, FixedKernel, Kernel, KernelFunction, LinearCombinationKernel,
    PolynomialFunction2,
};
pub use persistence::PsfRecord;
pub use psf::{Color, KernelPsf, PcaPsf, PsfImageCache, PsfModel, WarpedPsf, WarpingConfig};
pub use transform::{CoordinateTransform, Distortion, PolynomialTransform, RadialDistortion};

// Commonly used types
// PSF geometry is done in 64-bit; kernel weights are normalized to 1e-12
// and the warp round-trip tolerances need the headroom.
pub type Point2 = nalgebra::Point2<f64>;
pub type Vector2 = nalgebra::Vector2<f64>;
pub type Matrix2 = nalgebra::Matrix2<f64>;
