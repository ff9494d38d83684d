//! Spatially invariant kernel backed by a stored image.

use rkyv::{Archive, Deserialize, Serialize};

use crate::error::{PsfError, Result};
use crate::image::{normalize_weights, Image};
use crate::persistence;
use crate::Point2;

use super::{check_size, Kernel};

/// Kernel whose weights are a fixed image.
///
/// The stored pixels need not be normalized; `fill_weights` normalizes a copy.
#[derive(Debug, Clone, PartialEq)]
pub struct FixedKernel {
    width: usize,
    height: usize,
    pixels: Vec<f64>,
}

impl FixedKernel {
    /// Kernel from row-major pixels.
    pub fn new(width: usize, height: usize, pixels: Vec<f64>) -> Result<Self> {
        check_size(width, height)?;
        if pixels.len() != width * height {
            return Err(PsfError::unsupported_size(
                width,
                height,
                format!("pixel buffer has {} values", pixels.len()),
            ));
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    /// Kernel from an image; the image origin is ignored and the kernel
    /// centre is the middle pixel.
    pub fn from_image(image: &Image) -> Result<Self> {
        Self::new(image.width(), image.height(), image.data().to_vec())
    }

    pub fn pixels(&self) -> &[f64] {
        &self.pixels
    }

    /// Resized copy: cropped or zero-padded about the kernel centre.
    pub fn resized_fixed(&self, width: usize, height: usize) -> Result<Self> {
        check_size(width, height)?;
        let (ocx, ocy) = (self.width as i64 / 2, self.height as i64 / 2);
        let (ncx, ncy) = (width as i64 / 2, height as i64 / 2);
        let mut pixels = vec![0.0; width * height];
        for row in 0..height {
            let src_row = row as i64 - ncy + ocy;
            if src_row < 0 || src_row >= self.height as i64 {
                continue;
            }
            for col in 0..width {
                let src_col = col as i64 - ncx + ocx;
                if src_col < 0 || src_col >= self.width as i64 {
                    continue;
                }
                pixels[row * width + col] =
                    self.pixels[src_row as usize * self.width + src_col as usize];
            }
        }
        if pixels.iter().all(|&p| p == 0.0) {
            return Err(PsfError::unsupported_size(
                width,
                height,
                "resized kernel keeps no non-zero weight",
            ));
        }
        Self::new(width, height, pixels)
    }

    pub(crate) fn to_record(&self) -> FixedKernelRecord {
        FixedKernelRecord {
            width: self.width as u32,
            height: self.height as u32,
            pixels: self.pixels.clone(),
        }
    }

    pub(crate) fn from_record(record: &FixedKernelRecord) -> Result<Self> {
        Self::new(
            record.width as usize,
            record.height as usize,
            record.pixels.clone(),
        )
    }

    /// Read a kernel back from [`Kernel::to_bytes`] output.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let record: FixedKernelRecord = persistence::decode_fixed_kernel(bytes)?;
        Self::from_record(&record)
    }
}

impl Kernel for FixedKernel {
    fn dimensions(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    fn is_spatially_varying(&self) -> bool {
        false
    }

    fn fill_weights(&self, out: &mut [f64], _position: Point2) -> Result<()> {
        out.copy_from_slice(&self.pixels);
        normalize_weights(out)?;
        Ok(())
    }

    fn resized(&self, width: usize, height: usize) -> Result<Box<dyn Kernel>> {
        Ok(Box::new(self.resized_fixed(width, height)?))
    }

    fn clone_kernel(&self) -> Box<dyn Kernel> {
        Box::new(self.clone())
    }

    fn persistence_name(&self) -> &'static str {
        "FixedKernel"
    }

    fn to_bytes(&self) -> Option<Vec<u8>> {
        persistence::encode_fixed_kernel(&self.to_record()).ok()
    }
}

/// Serialized form of a [`FixedKernel`].
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
pub struct FixedKernelRecord {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::compute_kernel_image;

    fn box_kernel() -> FixedKernel {
        // 3x3 with a bright centre
        FixedKernel::new(3, 3, vec![1.0, 1.0, 1.0, 1.0, 4.0, 1.0, 1.0, 1.0, 1.0]).unwrap()
    }

    #[test]
    fn test_fill_normalizes() {
        let k = box_kernel();
        let im = compute_kernel_image(&k, Point2::new(10.0, 10.0)).unwrap();
        assert!((im.sum() - 1.0).abs() < 1e-15);
        assert_eq!(im.get(0, 0), Some(4.0 / 12.0));
        assert_eq!(im.x0(), -1);
    }

    #[test]
    fn test_resize_pads_about_center() {
        let k = box_kernel().resized_fixed(5, 5).unwrap();
        assert_eq!(k.dimensions(), (5, 5));
        assert_eq!(k.pixels()[12], 4.0);
        assert_eq!(k.pixels()[0], 0.0);
        assert_eq!(k.pixels().iter().sum::<f64>(), 12.0);
    }

    #[test]
    fn test_resize_crops_about_center() {
        let k = box_kernel().resized_fixed(1, 1).unwrap();
        assert_eq!(k.pixels(), &[4.0]);
    }

    #[test]
    fn test_resize_zero_is_unsupported() {
        let err = box_kernel().resized_fixed(0, 3).unwrap_err();
        assert!(matches!(err, PsfError::UnsupportedSize { .. }));
    }

    #[test]
    fn test_huge_size_is_allocation_error() {
        let k = box_kernel();
        // Overflows usize, then merely too many pixels.
        for (w, h) in [(1 << 33, 1 << 33), (usize::MAX, 2), (1 << 20, 1 << 20)] {
            let err = k.resized_fixed(w, h).unwrap_err();
            assert_eq!(err, PsfError::Allocation { width: w, height: h });
        }
        let err = FixedKernel::new(1 << 33, 1 << 33, vec![1.0; 9]).unwrap_err();
        assert!(matches!(err, PsfError::Allocation { .. }));
    }

    #[test]
    fn test_bytes_roundtrip() {
        let k = box_kernel();
        let bytes = k.to_bytes().unwrap();
        assert_eq!(FixedKernel::from_bytes(&bytes).unwrap(), k);
    }
}
