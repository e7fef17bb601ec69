mod common;

use approx::assert_abs_diff_eq;

use coreg_core::io::{read_raster, write_raster, CreationOptions, OutputFormat};
use coreg_core::pipeline::config::{CoregConfig, OutputConfig};
use coreg_core::resample::ResamplingMethod;
use coreg_core::{Coreg, CoregError};

use common::{reference, shifted_target, Scene, RES};

const SIZE: usize = 192;

fn config(align_grids: bool) -> CoregConfig {
    let mut config = CoregConfig::default();
    config.window.size = Some((128, 128));
    config.correction.align_grids = align_grids;
    config
}

#[test]
fn test_correct_without_resampling_keeps_pixels() {
    let scene = Scene::new(21, SIZE as f64);
    let tgt = shifted_target(&scene, SIZE, (1.4, 0.6));
    let original = tgt.clone();
    let mut cr = Coreg::new(reference(&scene, SIZE), tgt, config(false)).unwrap();
    let result = cr.correct_shifts().unwrap();

    assert!(result.is_shifted);
    assert!(!result.is_resampled);
    assert_eq!(result.raster.data, original.data);

    let gt = result.updated_geotransform();
    assert_ne!(gt, original.geotransform);
    assert_abs_diff_eq!(
        gt.top_left_x - original.geotransform.top_left_x,
        result.shift.dx_map,
        epsilon = 1e-9
    );
    assert_abs_diff_eq!(
        gt.top_left_y - original.geotransform.top_left_y,
        result.shift.dy_map,
        epsilon = 1e-9
    );
    assert_abs_diff_eq!(result.shift.dx_map, -14.0, epsilon = 1.0);
    assert_abs_diff_eq!(result.shift.dy_map, 6.0, epsilon = 1.0);
    assert!(!result.grid_matches_reference);
}

#[test]
fn test_correct_with_resampling_lands_on_reference_grid() {
    let scene = Scene::new(22, SIZE as f64);
    let tgt = shifted_target(&scene, SIZE, (1.4, 0.6));
    let original = tgt.clone();
    let reference = reference(&scene, SIZE);
    let ref_gt = reference.geotransform;
    let mut cr = Coreg::new(reference, tgt, config(true)).unwrap();
    let result = cr.correct_shifts().unwrap();

    assert!(result.is_shifted);
    assert!(result.is_resampled);
    assert_ne!(result.raster.data, original.data);
    assert_eq!(result.updated_geotransform(), original.geotransform);
    assert_eq!(result.updated_geotransform(), ref_gt);
    assert!(result.grid_matches_reference);
    assert_eq!(result.raster.data.dim(), original.data.dim());
}

#[test]
fn test_resampled_output_matches_reference_content() {
    let scene = Scene::new(23, SIZE as f64);
    let reference = reference(&scene, SIZE);
    let tgt = shifted_target(&scene, SIZE, (2.3, -1.2));
    let mut cfg = config(true);
    cfg.correction.resamp_alg_deshift = ResamplingMethod::Cubic;
    let mut cr = Coreg::new(reference.clone(), tgt, cfg).unwrap();
    let result = cr.correct_shifts().unwrap();

    // Interior pixels of the corrected target should reproduce the reference.
    let mut max_err = 0.0f32;
    for r in 20..SIZE - 20 {
        for c in 20..SIZE - 20 {
            let diff = (result.raster.data[[0, r, c]] - reference.data[[0, r, c]]).abs();
            max_err = max_err.max(diff);
        }
    }
    let spread = reference
        .data
        .iter()
        .fold(0.0f32, |m, v| m.max((v - 100.0).abs()));
    assert!(max_err < 0.25 * spread, "max_err={} spread={}", max_err, spread);
}

#[test]
fn test_resampled_edges_are_nodata() {
    let scene = Scene::new(24, SIZE as f64);
    let tgt = shifted_target(&scene, SIZE, (3.0, 0.0)).with_nodata(None);
    let mut cr = Coreg::new(reference(&scene, SIZE), tgt, config(true)).unwrap();
    let result = cr.correct_shifts().unwrap();
    let nodata = result.raster.nodata.unwrap();
    assert_eq!(nodata, -9999.0);
    // Content moved back by three pixels leaves the last columns empty.
    assert_eq!(result.raster.data[[0, 50, SIZE - 1]], nodata as f32);
    assert_ne!(result.raster.data[[0, 50, 0]], nodata as f32);
}

#[test]
fn test_out_gsd_changes_output_resolution() {
    let scene = Scene::new(25, SIZE as f64);
    let tgt = shifted_target(&scene, SIZE, (0.5, 0.5));
    let mut cfg = config(true);
    cfg.correction.out_gsd = Some((2.0 * RES, 2.0 * RES));
    let mut cr = Coreg::new(reference(&scene, SIZE), tgt, cfg).unwrap();
    let result = cr.correct_shifts().unwrap();
    assert_eq!(result.raster.geotransform.resolution(), (2.0 * RES, 2.0 * RES));
    assert_eq!(result.raster.rows(), SIZE / 2);
    assert!(!result.grid_matches_reference);
}

#[test]
fn test_auto_output_for_in_memory_target_rejected() {
    let scene = Scene::new(26, SIZE as f64);
    let mut cfg = config(false);
    cfg.output.path_out = Some("auto".into());
    let err = Coreg::new(reference(&scene, SIZE), reference(&scene, SIZE), cfg)
        .err()
        .unwrap();
    assert!(matches!(err, CoregError::InvalidConfig(_)));
}

#[test]
fn test_file_workflow_with_auto_output_and_creation_options() {
    let dir = tempfile::tempdir().unwrap();
    let scene = Scene::new(27, SIZE as f64);
    let ref_path = dir.path().join("ref.bsq");
    let tgt_path = dir.path().join("tgt.bsq");
    let none = CreationOptions::default();
    write_raster(&reference(&scene, SIZE), &ref_path, OutputFormat::Envi, &none).unwrap();
    write_raster(
        &shifted_target(&scene, SIZE, (1.0, -0.5)),
        &tgt_path,
        OutputFormat::Envi,
        &none,
    )
    .unwrap();

    let mut cfg = config(false);
    cfg.output = OutputConfig {
        path_out: Some("auto".into()),
        fmt_out: OutputFormat::GTiff,
        creation_options: vec!["COMPRESS=DEFLATE".into(), "ZLEVEL=9".into(), "BLOCKXSIZE=512".into()],
    };
    let mut cr = Coreg::new(ref_path.as_path(), tgt_path.as_path(), cfg).unwrap();
    let expected = dir.path().join("tgt__shifted_to__ref.tif");
    assert_eq!(cr.path_out(), Some(expected.as_path()));

    let corrected_gt = cr.correct_shifts().unwrap().updated_geotransform();
    assert!(expected.is_file());

    let written = read_raster(&expected).unwrap();
    assert_abs_diff_eq!(written.geotransform.top_left_x, corrected_gt.top_left_x, epsilon = 1e-6);
    assert_abs_diff_eq!(written.geotransform.top_left_y, corrected_gt.top_left_y, epsilon = 1e-6);
    assert_eq!(written.projection.epsg(), Some(32633));
    assert_eq!(written.nodata, Some(-9999.0));
}

#[test]
fn test_failed_run_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out.bsq");
    let scene = Scene::new(28, SIZE as f64);
    let mut cfg = config(false);
    cfg.max_shift = Some(5.0);
    cfg.output.path_out = Some(out.clone());
    let tgt = shifted_target(&scene, SIZE, (2.0, 0.0));
    let mut cr = Coreg::new(reference(&scene, SIZE), tgt, cfg).unwrap();
    assert!(cr.correct_shifts().is_err());
    assert!(!cr.success());
    assert!(!out.exists());
    assert!(!out.with_extension("hdr").exists());
}

#[test]
fn test_invalid_creation_option_values_rejected_before_matching() {
    let dir = tempfile::tempdir().unwrap();
    let scene = Scene::new(29, SIZE as f64);
    for bad in ["COMPRESS=JPEG", "ZLEVEL=0"] {
        let out = dir.path().join("out.tif");
        let mut cfg = config(false);
        cfg.output = OutputConfig {
            path_out: Some(out.clone()),
            fmt_out: OutputFormat::GTiff,
            creation_options: vec![bad.into()],
        };
        let err = Coreg::new(reference(&scene, SIZE), reference(&scene, SIZE), cfg)
            .err()
            .unwrap();
        assert!(matches!(err, CoregError::InvalidConfig(_)), "{} accepted", bad);
        assert!(!out.exists());
    }
}
