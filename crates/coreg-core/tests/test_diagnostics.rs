mod common;

use coreg_core::pipeline::config::CoregConfig;
use coreg_core::quality::ssim;
use coreg_core::Coreg;

use common::{reference, shifted_target, Scene};

#[test]
fn test_match_diagnostics_written_as_png() {
    let scene = Scene::new(31, 160.0);
    let mut config = CoregConfig::default();
    config.window.size = Some((96, 96));
    let mut cr = Coreg::new(
        reference(&scene, 160),
        shifted_target(&scene, 160, (0.7, 0.2)),
        config,
    )
    .unwrap();
    assert!(cr.diagnostics().is_none());
    cr.calculate_spatial_shifts().unwrap();

    let diag = cr.diagnostics().unwrap();
    assert_eq!(diag.correlation.dim(), (96, 96));

    let dir = tempfile::tempdir().unwrap();
    let paths = diag.save_pngs(dir.path(), "pair").unwrap();
    assert_eq!(paths.len(), 2);
    for path in &paths {
        assert!(path.is_file(), "{} missing", path.display());
    }

    let strip = image::open(&paths[1]).unwrap();
    assert_eq!(strip.width(), 3 * 96);
    assert_eq!(strip.height(), 96);
}

#[test]
fn test_ssim_improves_after_correction() {
    let scene = Scene::new(32, 160.0);
    let mut config = CoregConfig::default();
    config.window.size = Some((128, 128));
    let mut cr = Coreg::new(
        reference(&scene, 160),
        shifted_target(&scene, 160, (2.0, -1.0)),
        config,
    )
    .unwrap();
    let shift = cr.calculate_spatial_shifts().unwrap().clone();
    assert!(shift.ssim_after.unwrap() > shift.ssim_before.unwrap());

    let diag = cr.diagnostics().unwrap();
    let self_score = ssim(diag.reference.view(), diag.reference.view());
    assert!((self_score - 1.0).abs() < 1e-9);
}
