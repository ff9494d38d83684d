//! Kernel-backed PSFs through the public API: evaluation, resizing,
//! persistence records and domain errors.

use psfwarp::{
    AnalyticKernel, Box2D, Color, FixedKernel, Kernel, KernelFunction, KernelPsf,
    LinearCombinationKernel, PcaPsf, PolynomialFunction2, PsfError, PsfModel, PsfRecord, Point2,
};

/// Three Gaussian-ish components on a 11x11 grid, fit over [0, 200]².
fn pca_kernel() -> LinearCombinationKernel {
    let component = |sigma: f64, dx: f64| {
        let pixels = (0..121)
            .map(|i| {
                let x = (i % 11) as f64 - 5.0 - dx;
                let y = (i / 11) as f64 - 5.0;
                (-(x * x + y * y) / (2.0 * sigma * sigma)).exp()
            })
            .collect();
        FixedKernel::new(11, 11, pixels).unwrap()
    };
    LinearCombinationKernel::new(
        vec![component(1.5, 0.0), component(2.5, 0.0), component(1.5, 0.5)],
        vec![
            PolynomialFunction2::constant(1.0),
            PolynomialFunction2::new(1, vec![0.2, 0.001, 0.0]),
            PolynomialFunction2::new(2, vec![0.0, 0.0, 0.0, 0.0, 0.0, 1e-5]),
        ],
    )
    .unwrap()
    .with_domain(Box2D::new(Point2::new(0.0, 0.0), Point2::new(200.0, 200.0)))
}

#[test]
fn test_pca_psf_evaluation() {
    let psf = PcaPsf::new(pca_kernel(), Point2::new(100.0, 100.0));
    assert_eq!(psf.basis_kernels().len(), 3);
    for p in [
        Point2::new(0.0, 0.0),
        Point2::new(150.5, 20.25),
        Point2::new(199.0, 199.0),
    ] {
        let im = psf.compute_kernel_image(p, Color::default()).unwrap();
        assert!((im.sum() - 1.0).abs() < 1e-8);
        let bbox = psf.compute_bbox(p, Color::default()).unwrap();
        assert_eq!(bbox, im.bbox());
        assert_eq!((bbox.width(), bbox.height()), psf.kernel().dimensions());
    }
}

#[test]
fn test_outside_fit_domain_is_geometry_error() {
    let psf = PcaPsf::new(pca_kernel(), Point2::new(100.0, 100.0));
    let err = psf
        .compute_kernel_image(Point2::new(-50.0, 10.0), Color::default())
        .unwrap_err();
    assert!(matches!(err, PsfError::Geometry { .. }));
    assert!(psf.compute_image(Point2::new(10.0, 250.0), Color::default()).is_err());
}

#[test]
fn test_resized_models() {
    let pca = PcaPsf::new(pca_kernel(), Point2::new(100.0, 100.0));
    let resized = pca.resized(15, 13).unwrap();
    assert_eq!(resized.average_position(), pca.average_position());
    let im = resized
        .compute_kernel_image(Point2::new(50.0, 50.0), Color::default())
        .unwrap();
    assert_eq!((im.width(), im.height()), (15, 13));
    assert!((im.sum() - 1.0).abs() < 1e-8);

    let dg = KernelPsf::double_gaussian(9, 9, 1.0, 3.0, 0.1).unwrap();
    let im = dg
        .resized(21, 5)
        .unwrap()
        .compute_kernel_image(Point2::origin(), Color::default())
        .unwrap();
    assert_eq!((im.width(), im.height()), (21, 5));

    let err = dg.resized(0, 5).unwrap_err();
    assert!(matches!(err, PsfError::UnsupportedSize { .. }));
}

#[test]
fn test_persistence_roundtrip() {
    let pca = PcaPsf::new(pca_kernel(), Point2::new(97.5, 101.25));
    let bytes = pca.to_record().unwrap().to_bytes().unwrap();
    let record = PsfRecord::from_bytes(&bytes).unwrap();
    assert_eq!(record.name, "PcaPsf");
    assert_eq!(record.average_position(), Point2::new(97.5, 101.25));

    let back = PcaPsf::from_record(&record).unwrap();
    let p = Point2::new(33.0, 180.0);
    let a = pca.compute_kernel_image(p, Color::default()).unwrap();
    let b = back.compute_kernel_image(p, Color::default()).unwrap();
    assert_eq!(a.data(), b.data());
    // The domain survives the round trip.
    assert!(back.compute_kernel_image(Point2::new(-1.0, 0.0), Color::default()).is_err());

    let fixed = KernelPsf::new(
        Box::new(pca.basis_kernels()[1].clone()) as Box<dyn Kernel>,
        Point2::new(1.0, 2.0),
    );
    let record = PsfRecord::from_bytes(&fixed.to_record().unwrap().to_bytes().unwrap()).unwrap();
    assert_eq!(record.kernel_name, "FixedKernel");
    let back = KernelPsf::from_record(&record).unwrap();
    assert_eq!(back.average_position(), Point2::new(1.0, 2.0));
    assert!(!back.kernel().is_spatially_varying());
    assert!(back.is_spatially_invariant());
}

#[test]
fn test_huge_resize_is_allocation_error() {
    let fixed = KernelPsf::new(
        Box::new(FixedKernel::new(3, 3, vec![1.0; 9]).unwrap()) as Box<dyn Kernel>,
        Point2::origin(),
    );
    let err = fixed.resized(1 << 33, 1 << 33).unwrap_err();
    assert!(matches!(err, PsfError::Allocation { .. }));

    let pca = PcaPsf::new(pca_kernel(), Point2::new(100.0, 100.0));
    let err = pca.resized(1 << 33, 1 << 33).unwrap_err();
    assert!(matches!(err, PsfError::Allocation { .. }));

    let dg = KernelPsf::double_gaussian(5, 5, 1.0, 2.0, 0.0).unwrap();
    let err = dg.resized(usize::MAX, 3).unwrap_err();
    assert!(matches!(err, PsfError::Allocation { .. }));
}

#[test]
fn test_invariant_model_checks_requested_position() {
    let kernel = AnalyticKernel::new(
        7,
        7,
        KernelFunction::DoubleGaussian {
            sigma1: 1.0,
            sigma2: 2.0,
            b: 0.1,
        },
    )
    .unwrap()
    .with_domain(Box2D::new(Point2::new(0.0, 0.0), Point2::new(100.0, 100.0)));
    let psf = KernelPsf::new(kernel, Point2::new(50.0, 50.0));
    assert!(psf.is_spatially_invariant());

    let inside = Point2::new(20.0, 80.0);
    assert!(psf.compute_kernel_image(inside, Color::default()).is_ok());
    assert!(psf.compute_bbox(inside, Color::default()).is_ok());

    // The cache now holds the shared kernel image; an outside request must
    // still fail rather than be served from it.
    let outside = Point2::new(-500.0, 50.0);
    let err = psf.compute_kernel_image(outside, Color::default()).unwrap_err();
    assert!(matches!(err, PsfError::Geometry { .. }));
    let err = psf.compute_bbox(outside, Color::default()).unwrap_err();
    assert!(matches!(err, PsfError::Geometry { .. }));
    assert!(psf.compute_image(outside, Color::default()).is_err());
    assert!(psf.compute_peak(outside, Color::default()).is_err());
}
