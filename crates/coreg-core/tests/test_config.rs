use coreg_core::pipeline::config::{
    CoregConfig, SubpixelMethod, TaperWindow, WindowConfig, WindowPosition,
};
use coreg_core::pipeline::{Advisory, AdvisoryKind, CoregStage, ShiftResult};
use coreg_core::resample::ResamplingMethod;
use coreg_core::CoregError;

// ---------------------------------------------------------------------------
// Display
// ---------------------------------------------------------------------------

#[test]
fn test_stage_display() {
    assert_eq!(CoregStage::Estimating.to_string(), "Estimating shift");
    assert_eq!(CoregStage::Writing.to_string(), "Writing output");
}

#[test]
fn test_subpixel_display() {
    assert_eq!(SubpixelMethod::Paraboloid.to_string(), "Paraboloid");
    assert_eq!(
        SubpixelMethod::Upsampled { factor: 20 }.to_string(),
        "Upsampled DFT (x20)"
    );
}

#[test]
fn test_resampling_display_and_parse() {
    assert_eq!(ResamplingMethod::default(), ResamplingMethod::Cubic);
    for method in [
        ResamplingMethod::Nearest,
        ResamplingMethod::Bilinear,
        ResamplingMethod::Cubic,
    ] {
        assert_eq!(method.to_string().parse::<ResamplingMethod>().unwrap(), method);
    }
    assert!("lanczos".parse::<ResamplingMethod>().is_err());
}

#[test]
fn test_advisory_display() {
    let adv = Advisory::new(AdvisoryKind::SmallWindow, "too small");
    assert_eq!(adv.to_string(), "Small window: too small");
}

#[test]
fn test_window_position_display() {
    let p = WindowPosition::Pixel { col: 10.0, row: 20.5 };
    assert_eq!(p.to_string(), "pixel (col 10.0, row 20.5)");
}

// ---------------------------------------------------------------------------
// Defaults and validation
// ---------------------------------------------------------------------------

#[test]
fn test_defaults() {
    let config = CoregConfig::default();
    assert_eq!(config.ref_band, 1);
    assert_eq!(config.tgt_band, 1);
    assert!(config.max_shift.is_none());
    assert!(!config.correction.align_grids);
    assert_eq!(config.estimator.taper, TaperWindow::Hann);
    assert_eq!(config.estimator.max_iter, 5);
    assert_eq!(config.window.max_nodata_fraction, 1.0);
    assert_eq!(config.window.max_obscured_fraction, 0.25);
    assert!(config.validate().is_ok());
}

#[test]
fn test_validate_rejects_bad_values() {
    let mut config = CoregConfig::default();
    config.ref_band = 0;
    assert!(matches!(config.validate(), Err(CoregError::InvalidConfig(_))));

    let mut config = CoregConfig::default();
    config.max_shift = Some(-1.0);
    assert!(config.validate().is_err());

    let mut config = CoregConfig::default();
    config.window = WindowConfig {
        max_obscured_fraction: 1.5,
        ..WindowConfig::default()
    };
    assert!(config.validate().is_err());

    let mut config = CoregConfig::default();
    config.output.creation_options = vec!["COMPRESS".into()];
    assert!(config.validate().is_err());

    let mut config = CoregConfig::default();
    config.estimator.max_iter = 0;
    assert!(config.validate().is_err());
}

// ---------------------------------------------------------------------------
// Serialization
// ---------------------------------------------------------------------------

#[test]
fn test_config_json_round_trip() {
    let mut config = CoregConfig::default();
    config.window.position = Some(WindowPosition::Map { x: 1.5, y: -2.0 });
    config.window.size = Some((256, 128));
    config.estimator.subpixel = SubpixelMethod::Paraboloid;
    config.correction.out_gsd = Some((20.0, 20.0));

    let json = serde_json::to_string(&config).unwrap();
    let back: CoregConfig = serde_json::from_str(&json).unwrap();
    assert_eq!(back.window.position, config.window.position);
    assert_eq!(back.window.size, Some((256, 128)));
    assert_eq!(back.estimator.subpixel, SubpixelMethod::Paraboloid);
    assert_eq!(back.correction.out_gsd, Some((20.0, 20.0)));
}

#[test]
fn test_partial_config_uses_defaults() {
    let back: CoregConfig = serde_json::from_str(r#"{"tgt_band": 2}"#).unwrap();
    assert_eq!(back.tgt_band, 2);
    assert_eq!(back.ref_band, 1);
    assert_eq!(back.estimator.max_iter, 5);
}

#[test]
fn test_shift_result_serializes() {
    let result = ShiftResult {
        dx_px: -1.25,
        dy_px: 0.5,
        dx_map: -12.5,
        dy_map: -5.0,
        reliability: 87.0,
        peak_ratio: 0.12,
        is_reliable: true,
        iterations: 2,
        window_center: (100.0, 200.0),
        window_size: (128, 128),
        resolution: (10.0, 10.0),
        ssim_before: Some(0.4),
        ssim_after: None,
    };
    let value = serde_json::to_value(&result).unwrap();
    assert_eq!(value["dx_map"], -12.5);
    assert_eq!(value["iterations"], 2);
    assert!(value.get("ssim_after").is_none());
    assert!((result.vector_length_map() - 12.5f64.hypot(5.0)).abs() < 1e-12);
    // West and south: between 180 and 270 degrees.
    let angle = result.vector_angle_deg();
    assert!(angle > 180.0 && angle < 270.0, "angle={}", angle);
}
