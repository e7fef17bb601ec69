use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, ValueEnum};
use coreg_core::pipeline::config::{SubpixelMethod, TaperWindow, WindowPosition};
use coreg_core::resample::ResamplingMethod;
use coreg_core::CoregConfig;
use serde::Serialize;

#[derive(Clone, Copy, ValueEnum)]
pub enum SubpixelArg {
    Paraboloid,
    Upsampled,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum TaperArg {
    Hann,
    None,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum ResamplingArg {
    Nearest,
    Bilinear,
    Cubic,
}

impl From<ResamplingArg> for ResamplingMethod {
    fn from(arg: ResamplingArg) -> Self {
        match arg {
            ResamplingArg::Nearest => ResamplingMethod::Nearest,
            ResamplingArg::Bilinear => ResamplingMethod::Bilinear,
            ResamplingArg::Cubic => ResamplingMethod::Cubic,
        }
    }
}

/// Options shared by every command that matches an image pair.
///
/// Values given on the command line override the config file.
#[derive(Args)]
pub struct MatchArgs {
    /// Config file (TOML)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Reference band used for matching (1-based)
    #[arg(long)]
    pub ref_band: Option<usize>,

    /// Target band used for matching (1-based)
    #[arg(long)]
    pub tgt_band: Option<usize>,

    /// Largest plausible shift in map units
    #[arg(long)]
    pub max_shift: Option<f64>,

    /// Window centre in map coordinates: X,Y
    #[arg(long, value_delimiter = ',', allow_negative_numbers = true, conflicts_with = "window_pixel")]
    pub window_map: Option<Vec<f64>>,

    /// Window centre in reference pixels: COL,ROW
    #[arg(long, value_delimiter = ',')]
    pub window_pixel: Option<Vec<f64>>,

    /// Window size in pixels: SIZE or WIDTH,HEIGHT
    #[arg(long, value_delimiter = ',')]
    pub window_size: Option<Vec<usize>>,

    /// Largest accepted cloud-masked fraction of the window (0-1)
    #[arg(long)]
    pub max_obscured: Option<f64>,

    /// Taper applied before the FFT
    #[arg(long, value_enum)]
    pub taper: Option<TaperArg>,

    /// Sub-pixel peak refinement
    #[arg(long, value_enum)]
    pub subpixel: Option<SubpixelArg>,

    /// Upsampling factor for --subpixel upsampled
    #[arg(long)]
    pub upsample_factor: Option<usize>,

    /// Integer re-matching passes
    #[arg(long)]
    pub max_iter: Option<usize>,

    /// Resampling used to bring the target onto the analysis grid
    #[arg(long, value_enum)]
    pub resamp_calc: Option<ResamplingArg>,
}

impl MatchArgs {
    /// Load the config file (or defaults) and apply command-line overrides.
    pub fn build_config(&self) -> Result<CoregConfig> {
        let mut config = match self.config {
            Some(ref path) => load_config(path)?,
            None => CoregConfig::default(),
        };

        if let Some(band) = self.ref_band {
            config.ref_band = band;
        }
        if let Some(band) = self.tgt_band {
            config.tgt_band = band;
        }
        if let Some(max_shift) = self.max_shift {
            config.max_shift = Some(max_shift);
        }
        if let Some(ref xy) = self.window_map {
            let [x, y] = coordinate_pair(xy, "--window-map")?;
            config.window.position = Some(WindowPosition::Map { x, y });
        }
        if let Some(ref cr) = self.window_pixel {
            let [col, row] = coordinate_pair(cr, "--window-pixel")?;
            config.window.position = Some(WindowPosition::Pixel { col, row });
        }
        if let Some(ref size) = self.window_size {
            config.window.size = Some(match size.as_slice() {
                [s] => (*s, *s),
                [w, h] => (*w, *h),
                _ => bail!("--window-size takes one or two values"),
            });
        }
        if let Some(fraction) = self.max_obscured {
            config.window.max_obscured_fraction = fraction;
        }
        if let Some(taper) = self.taper {
            config.estimator.taper = match taper {
                TaperArg::Hann => TaperWindow::Hann,
                TaperArg::None => TaperWindow::None,
            };
        }
        match (self.subpixel, self.upsample_factor) {
            (Some(SubpixelArg::Paraboloid), Some(_)) => {
                bail!("--upsample-factor only applies to --subpixel upsampled")
            }
            (Some(SubpixelArg::Paraboloid), None) => {
                config.estimator.subpixel = SubpixelMethod::Paraboloid;
            }
            (Some(SubpixelArg::Upsampled), factor) => {
                config.estimator.subpixel = SubpixelMethod::Upsampled {
                    factor: factor.unwrap_or(coreg_core::consts::DEFAULT_UPSAMPLE_FACTOR),
                };
            }
            (None, Some(factor)) => {
                config.estimator.subpixel = SubpixelMethod::Upsampled { factor };
            }
            (None, None) => {}
        }
        if let Some(max_iter) = self.max_iter {
            config.estimator.max_iter = max_iter;
        }
        if let Some(method) = self.resamp_calc {
            config.estimator.resamp_alg_calc = method.into();
        }

        config.validate()?;
        Ok(config)
    }
}

fn coordinate_pair(values: &[f64], flag: &str) -> Result<[f64; 2]> {
    match values {
        [a, b] => Ok([*a, *b]),
        _ => bail!("{} takes exactly two comma-separated values", flag),
    }
}

pub fn load_config(path: &Path) -> Result<CoregConfig> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    parse_config(&contents).with_context(|| format!("Invalid config {}", path.display()))
}

/// Serialise `value` as TOML into `path`.
pub fn write_toml<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let toml_str = toml::to_string_pretty(value)?;
    std::fs::write(path, toml_str)
        .with_context(|| format!("Failed to write {}", path.display()))
}

fn parse_config(contents: &str) -> Result<CoregConfig> {
    let config: CoregConfig = toml::from_str(contents)?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use coreg_core::io::OutputFormat;

    #[test]
    fn test_default_config_roundtrip() {
        let toml_str = toml::to_string_pretty(&CoregConfig::default()).unwrap();
        let parsed = parse_config(&toml_str).unwrap();
        assert_eq!(parsed.ref_band, 1);
        assert_eq!(parsed.estimator.subpixel, SubpixelMethod::default());
        assert_eq!(parsed.estimator.taper, TaperWindow::Hann);
        assert!(parsed.window.position.is_none());
    }

    #[test]
    fn test_partial_config() {
        let parsed = parse_config(
            r#"
            tgt_band = 2
            max_shift = 25.0

            [window]
            size = [96, 64]

            [window.position]
            kind = "Map"
            x = 400640.0
            y = 5799360.0

            [estimator.subpixel]
            method = "Paraboloid"

            [output]
            path_out = "auto"
            fmt_out = "GTiff"
            creation_options = ["COMPRESS=LZW"]
            "#,
        )
        .unwrap();
        assert_eq!(parsed.tgt_band, 2);
        assert_eq!(parsed.max_shift, Some(25.0));
        assert_eq!(parsed.window.size, Some((96, 64)));
        assert_eq!(
            parsed.window.position,
            Some(WindowPosition::Map {
                x: 400640.0,
                y: 5799360.0
            })
        );
        assert_eq!(parsed.estimator.subpixel, SubpixelMethod::Paraboloid);
        assert_eq!(parsed.estimator.max_iter, coreg_core::consts::DEFAULT_MAX_ITER);
        assert!(parsed.output.is_auto());
        assert_eq!(parsed.output.fmt_out, OutputFormat::GTiff);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(parse_config("ref_band = 0").is_err());
        assert!(parse_config("[estimator]\nmax_iter = 0").is_err());
        assert!(parse_config("[output]\ncreation_options = [\"NOVALUE\"]").is_err());
        assert!(parse_config(
            "[output]\nfmt_out = \"GTiff\"\ncreation_options = [\"COMPRESS=JPEG\"]"
        )
        .is_err());
    }

    #[test]
    fn test_cli_overrides() {
        let args = MatchArgs {
            config: None,
            ref_band: Some(3),
            tgt_band: None,
            max_shift: None,
            window_map: None,
            window_pixel: Some(vec![100.0, 50.0]),
            window_size: Some(vec![128]),
            max_obscured: None,
            taper: Some(TaperArg::None),
            subpixel: None,
            upsample_factor: Some(50),
            max_iter: None,
            resamp_calc: Some(ResamplingArg::Bilinear),
        };
        let config = args.build_config().unwrap();
        assert_eq!(config.ref_band, 3);
        assert_eq!(
            config.window.position,
            Some(WindowPosition::Pixel {
                col: 100.0,
                row: 50.0
            })
        );
        assert_eq!(config.window.size, Some((128, 128)));
        assert_eq!(config.estimator.taper, TaperWindow::None);
        assert_eq!(
            config.estimator.subpixel,
            SubpixelMethod::Upsampled { factor: 50 }
        );
        assert_eq!(config.estimator.resamp_alg_calc, ResamplingMethod::Bilinear);
    }
}
