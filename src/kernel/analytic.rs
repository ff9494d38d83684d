//! Kernels computed from an analytic profile.
//!
//! Each profile has three parameters. They are either fixed, or each driven
//! by a [`PolynomialFunction2`] of field position, which makes the kernel
//! spatially varying.

use crate::error::{PsfError, Result};
use crate::geom::Box2D;
use crate::image::normalize_weights;
use crate::Point2;

use super::spatial::PolynomialFunction2;
use super::{check_domain, check_size, Kernel};

/// Analytic PSF profile. Values are unnormalized; the kernel normalizes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum KernelFunction {
    /// Elliptical Gaussian with widths along axes rotated by `angle` radians.
    Gaussian { sigma1: f64, sigma2: f64, angle: f64 },
    /// Sum of two concentric circular Gaussians, the second scaled by `b`.
    DoubleGaussian { sigma1: f64, sigma2: f64, b: f64 },
}

impl KernelFunction {
    pub const NUM_PARAMS: usize = 3;

    pub fn params(&self) -> [f64; 3] {
        match *self {
            KernelFunction::Gaussian {
                sigma1,
                sigma2,
                angle,
            } => [sigma1, sigma2, angle],
            KernelFunction::DoubleGaussian { sigma1, sigma2, b } => [sigma1, sigma2, b],
        }
    }

    /// Same profile family with new parameter values.
    pub fn with_params(&self, params: [f64; 3]) -> Self {
        match self {
            KernelFunction::Gaussian { .. } => KernelFunction::Gaussian {
                sigma1: params[0],
                sigma2: params[1],
                angle: params[2],
            },
            KernelFunction::DoubleGaussian { .. } => KernelFunction::DoubleGaussian {
                sigma1: params[0],
                sigma2: params[1],
                b: params[2],
            },
        }
    }

    fn is_valid(&self) -> bool {
        match *self {
            KernelFunction::Gaussian { sigma1, sigma2, .. } => sigma1 > 0.0 && sigma2 > 0.0,
            KernelFunction::DoubleGaussian { sigma1, sigma2, b } => {
                sigma1 > 0.0 && (b == 0.0 || sigma2 > 0.0)
            }
        }
    }

    /// Profile value at offset `(x, y)` from the kernel centre.
    pub fn eval(&self, x: f64, y: f64) -> f64 {
        match *self {
            KernelFunction::Gaussian {
                sigma1,
                sigma2,
                angle,
            } => {
                let (s, c) = angle.sin_cos();
                let u = c * x + s * y;
                let v = -s * x + c * y;
                (-0.5 * (u * u / (sigma1 * sigma1) + v * v / (sigma2 * sigma2))).exp()
            }
            KernelFunction::DoubleGaussian { sigma1, sigma2, b } => {
                let r2 = x * x + y * y;
                let inner = (-0.5 * r2 / (sigma1 * sigma1)).exp();
                if b == 0.0 {
                    inner
                } else {
                    inner + b * (-0.5 * r2 / (sigma2 * sigma2)).exp()
                }
            }
        }
    }
}

/// Kernel evaluating a [`KernelFunction`] on a fixed grid.
#[derive(Debug, Clone)]
pub struct AnalyticKernel {
    width: usize,
    height: usize,
    function: KernelFunction,
    spatial: Option<Vec<PolynomialFunction2>>,
    domain: Option<Box2D>,
}

impl AnalyticKernel {
    /// Spatially invariant kernel.
    pub fn new(width: usize, height: usize, function: KernelFunction) -> Result<Self> {
        check_size(width, height)?;
        Ok(Self {
            width,
            height,
            function,
            spatial: None,
            domain: None,
        })
    }

    /// Kernel whose three profile parameters are polynomials of position.
    pub fn spatially_varying(
        width: usize,
        height: usize,
        function: KernelFunction,
        spatial: Vec<PolynomialFunction2>,
    ) -> Result<Self> {
        if spatial.len() != KernelFunction::NUM_PARAMS {
            return Err(PsfError::unsupported_size(
                width,
                height,
                format!(
                    "expected {} spatial functions, one per profile parameter, got {}",
                    KernelFunction::NUM_PARAMS,
                    spatial.len()
                ),
            ));
        }
        let mut kernel = Self::new(width, height, function)?;
        kernel.spatial = Some(spatial);
        Ok(kernel)
    }

    /// Restrict evaluation to the domain the kernel was fit over.
    pub fn with_domain(mut self, domain: Box2D) -> Self {
        self.domain = Some(domain);
        self
    }

    pub fn function(&self) -> KernelFunction {
        self.function
    }

    /// Profile at a field position.
    pub fn function_at(&self, position: Point2) -> KernelFunction {
        match &self.spatial {
            Some(spatial) => {
                let mut params = [0.0; 3];
                for (p, f) in params.iter_mut().zip(spatial) {
                    *p = f.eval(position);
                }
                self.function.with_params(params)
            }
            None => self.function,
        }
    }
}

impl Kernel for AnalyticKernel {
    fn dimensions(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    fn is_spatially_varying(&self) -> bool {
        self.spatial
            .as_ref()
            .is_some_and(|s| s.iter().any(|f| !f.is_constant()))
    }

    fn check_position(&self, position: Point2) -> Result<()> {
        check_domain(self.domain.as_ref(), position)
    }

    fn fill_weights(&self, out: &mut [f64], position: Point2) -> Result<()> {
        self.check_position(position)?;
        let function = self.function_at(position);
        if !function.is_valid() {
            return Err(PsfError::geometry(
                position,
                format!("kernel parameters are not physical here: {function:?}"),
            ));
        }
        let (cx, cy) = self.center();
        for row in 0..self.height {
            let y = row as f64 - cy as f64;
            for col in 0..self.width {
                let x = col as f64 - cx as f64;
                out[row * self.width + col] = function.eval(x, y);
            }
        }
        normalize_weights(out)?;
        Ok(())
    }

    fn resized(&self, width: usize, height: usize) -> Result<Box<dyn Kernel>> {
        check_size(width, height)?;
        Ok(Box::new(Self {
            width,
            height,
            ..self.clone()
        }))
    }

    fn clone_kernel(&self) -> Box<dyn Kernel> {
        Box::new(self.clone())
    }

    fn persistence_name(&self) -> &'static str {
        "AnalyticKernel"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::compute_kernel_image;

    #[test]
    fn test_gaussian_is_symmetric_and_normalized() {
        let k = AnalyticKernel::new(
            9,
            9,
            KernelFunction::Gaussian {
                sigma1: 1.5,
                sigma2: 1.5,
                angle: 0.0,
            },
        )
        .unwrap();
        assert!(!k.is_spatially_varying());
        let im = compute_kernel_image(&k, Point2::origin()).unwrap();
        assert!((im.sum() - 1.0).abs() < 1e-12);
        assert_eq!(im.max_pixel().1, 0);
        assert!((im.get(3, 0).unwrap() - im.get(-3, 0).unwrap()).abs() < 1e-15);
        assert!((im.get(0, 2).unwrap() - im.get(2, 0).unwrap()).abs() < 1e-15);
    }

    #[test]
    fn test_double_gaussian_wings() {
        let narrow = KernelFunction::DoubleGaussian {
            sigma1: 1.0,
            sigma2: 3.0,
            b: 0.0,
        };
        let winged = KernelFunction::DoubleGaussian {
            sigma1: 1.0,
            sigma2: 3.0,
            b: 0.2,
        };
        assert!(winged.eval(4.0, 0.0) > 10.0 * narrow.eval(4.0, 0.0));
    }

    #[test]
    fn test_spatial_variation() {
        let spatial = vec![
            PolynomialFunction2::new(1, vec![1.0, 0.1, 0.0]),
            PolynomialFunction2::new(1, vec![1.0, 0.1, 0.0]),
            PolynomialFunction2::constant(0.0),
        ];
        let k = AnalyticKernel::spatially_varying(
            7,
            7,
            KernelFunction::Gaussian {
                sigma1: 1.0,
                sigma2: 1.0,
                angle: 0.0,
            },
            spatial,
        )
        .unwrap();
        assert!(k.is_spatially_varying());
        let a = compute_kernel_image(&k, Point2::new(0.0, 0.0)).unwrap();
        let b = compute_kernel_image(&k, Point2::new(10.0, 0.0)).unwrap();
        // Wider profile at x = 10 puts less weight in the centre.
        assert!(b.get(0, 0).unwrap() < a.get(0, 0).unwrap());
    }

    #[test]
    fn test_negative_width_is_geometry_error() {
        let spatial = vec![
            PolynomialFunction2::new(1, vec![1.0, -0.1, 0.0]),
            PolynomialFunction2::constant(1.0),
            PolynomialFunction2::constant(0.0),
        ];
        let k = AnalyticKernel::spatially_varying(
            5,
            5,
            KernelFunction::Gaussian {
                sigma1: 1.0,
                sigma2: 1.0,
                angle: 0.0,
            },
            spatial,
        )
        .unwrap();
        let err = compute_kernel_image(&k, Point2::new(20.0, 0.0)).unwrap_err();
        assert!(matches!(err, PsfError::Geometry { .. }));
    }

    #[test]
    fn test_domain_check() {
        let k = AnalyticKernel::new(
            5,
            5,
            KernelFunction::DoubleGaussian {
                sigma1: 1.0,
                sigma2: 2.0,
                b: 0.1,
            },
        )
        .unwrap()
        .with_domain(Box2D::new(Point2::new(0.0, 0.0), Point2::new(100.0, 100.0)));
        assert!(compute_kernel_image(&k, Point2::new(50.0, 50.0)).is_ok());
        let err = compute_kernel_image(&k, Point2::new(-5.0, 50.0)).unwrap_err();
        assert!(matches!(err, PsfError::Geometry { .. }));
    }

    #[test]
    fn test_resized() {
        let k = AnalyticKernel::new(
            5,
            5,
            KernelFunction::Gaussian {
                sigma1: 1.0,
                sigma2: 2.0,
                angle: 0.3,
            },
        )
        .unwrap();
        let r = k.resized(11, 9).unwrap();
        assert_eq!(r.dimensions(), (11, 9));
        assert!(k.resized(0, 9).is_err());
        let err = k.resized(1 << 33, 1 << 33).unwrap_err();
        assert!(matches!(err, PsfError::Allocation { .. }));
    }

    #[test]
    fn test_wrong_spatial_count_is_unsupported() {
        let function = KernelFunction::Gaussian {
            sigma1: 1.0,
            sigma2: 1.0,
            angle: 0.0,
        };
        for n in [0, 2, 4] {
            let spatial = vec![PolynomialFunction2::constant(1.0); n];
            let err = AnalyticKernel::spatially_varying(5, 5, function, spatial).unwrap_err();
            assert!(matches!(err, PsfError::UnsupportedSize { width: 5, height: 5, .. }));
        }
    }
}
