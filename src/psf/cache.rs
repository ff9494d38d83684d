//! Single-slot memoization of PSF images.
//!
//! Every model owns one slot for kernel images and one for display images.
//! A request at the cached `(position, color)` returns the cached
//! `Arc<Image>` itself; any other request recomputes and replaces the entry.
//! Replacement is a single atomic store, so concurrent readers see either the
//! old entry or the complete new one.

use std::sync::Arc;

use arc_swap::ArcSwapOption;
use tracing::trace;

use crate::error::Result;
use crate::image::Image;
use crate::Point2;

use super::Color;

#[derive(Debug)]
struct CacheEntry {
    position: Point2,
    color: Color,
    image: Arc<Image>,
}

/// One cached image and the key it was computed for.
#[derive(Debug, Default)]
pub struct ImageSlot {
    entry: ArcSwapOption<CacheEntry>,
}

impl ImageSlot {
    pub fn new() -> Self {
        Self {
            entry: ArcSwapOption::empty(),
        }
    }

    /// Return the cached image for this key, or compute, store and return a new one.
    pub fn get_or_compute<F>(&self, position: Point2, color: Color, compute: F) -> Result<Arc<Image>>
    where
        F: FnOnce() -> Result<Image>,
    {
        if let Some(entry) = self.entry.load_full() {
            if entry.position == position && entry.color == color {
                return Ok(entry.image.clone());
            }
        }
        trace!(x = position.x, y = position.y, "psf image cache miss");
        let image = Arc::new(compute()?);
        self.entry.store(Some(Arc::new(CacheEntry {
            position,
            color,
            image: image.clone(),
        })));
        Ok(image)
    }

    pub fn is_empty(&self) -> bool {
        self.entry.load().is_none()
    }

    pub fn clear(&self) {
        self.entry.store(None);
    }
}

/// The two slots every PSF model carries.
///
/// Cloning yields an empty cache, so a cloned model never shares cached
/// images with its source.
#[derive(Debug, Default)]
pub struct PsfImageCache {
    pub(crate) kernel: ImageSlot,
    pub(crate) image: ImageSlot,
}

impl PsfImageCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&self) {
        self.kernel.clear();
        self.image.clear();
    }
}

impl Clone for PsfImageCache {
    fn clone(&self) -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::Box2I;

    fn constant_image(v: f64) -> Result<Image> {
        Image::from_vec(Box2I::centered(1, 1), vec![v])
    }

    #[test]
    fn test_hit_returns_same_instance() {
        let slot = ImageSlot::new();
        assert!(slot.is_empty());
        let p = Point2::new(1.0, 2.0);
        let a = slot.get_or_compute(p, Color::default(), || constant_image(1.0)).unwrap();
        let b = slot
            .get_or_compute(p, Color::default(), || panic!("should not recompute"))
            .unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_miss_replaces_entry() {
        let slot = ImageSlot::new();
        let a = slot
            .get_or_compute(Point2::new(0.0, 0.0), Color::default(), || constant_image(1.0))
            .unwrap();
        let b = slot
            .get_or_compute(Point2::new(1.0, 0.0), Color::default(), || constant_image(2.0))
            .unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
        // The first key was evicted.
        let c = slot
            .get_or_compute(Point2::new(0.0, 0.0), Color::default(), || constant_image(3.0))
            .unwrap();
        assert_eq!(c.data(), &[3.0]);
    }

    #[test]
    fn test_color_is_part_of_key() {
        let slot = ImageSlot::new();
        let p = Point2::origin();
        let a = slot.get_or_compute(p, Color::new(0.5), || constant_image(1.0)).unwrap();
        let b = slot.get_or_compute(p, Color::new(0.7), || constant_image(1.0)).unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_failed_compute_keeps_previous_entry() {
        let slot = ImageSlot::new();
        let p = Point2::origin();
        let a = slot.get_or_compute(p, Color::default(), || constant_image(1.0)).unwrap();
        let err = slot.get_or_compute(Point2::new(9.0, 9.0), Color::default(), || {
            Err(crate::PsfError::DegenerateKernel)
        });
        assert!(err.is_err());
        let b = slot.get_or_compute(p, Color::default(), || constant_image(2.0)).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_clone_is_empty() {
        let cache = PsfImageCache::new();
        cache
            .kernel
            .get_or_compute(Point2::origin(), Color::default(), || constant_image(1.0))
            .unwrap();
        let copy = cache.clone();
        assert!(!cache.kernel.is_empty());
        assert!(copy.kernel.is_empty());
    }
}
