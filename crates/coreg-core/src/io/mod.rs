pub mod dataset;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{CoregError, Result};
use crate::raster::Raster;

/// Output raster formats.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputFormat {
    #[default]
    #[serde(rename = "ENVI")]
    Envi,
    #[serde(rename = "GTiff")]
    GTiff,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Envi => "bsq",
            Self::GTiff => "tif",
        }
    }

    /// GDAL driver short name.
    pub fn driver_name(&self) -> &'static str {
        match self {
            Self::Envi => "ENVI",
            Self::GTiff => "GTiff",
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Envi => write!(f, "ENVI"),
            Self::GTiff => write!(f, "GTiff"),
        }
    }
}

impl std::str::FromStr for OutputFormat {
    type Err = CoregError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "ENVI" => Ok(Self::Envi),
            "GTIFF" | "GEOTIFF" | "TIFF" => Ok(Self::GTiff),
            other => Err(CoregError::Format(format!("unknown output format '{}'", other))),
        }
    }
}

/// Format-specific `KEY=VALUE` creation options, handed to the GDAL driver as given.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CreationOptions {
    entries: Vec<(String, String)>,
}

const GTIFF_COMPRESSION: &[&str] = &[
    "NONE", "LZW", "DEFLATE", "PACKBITS", "LZMA", "ZSTD", "LERC", "LERC_DEFLATE", "LERC_ZSTD",
];
const BOOLEAN: &[&str] = &["YES", "NO", "TRUE", "FALSE", "ON", "OFF"];

impl CreationOptions {
    pub fn parse(options: &[String]) -> Result<Self> {
        let entries = options
            .iter()
            .map(|opt| {
                opt.split_once('=')
                    .map(|(k, v)| (k.trim().to_ascii_uppercase(), v.trim().to_string()))
                    .ok_or_else(|| {
                        CoregError::InvalidConfig(format!(
                            "creation option '{}' is not of the form KEY=VALUE",
                            opt
                        ))
                    })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { entries })
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .rev()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    pub fn entries(&self) -> &[(String, String)] {
        &self.entries
    }

    /// Check the values of the options the float32 writer of `format` knows.
    /// Other keys go to the driver unchecked.
    pub fn validate(&self, format: OutputFormat) -> Result<()> {
        for (key, value) in &self.entries {
            let upper = value.to_ascii_uppercase();
            let ok = match (format, key.as_str()) {
                (OutputFormat::GTiff, "COMPRESS") => GTIFF_COMPRESSION.contains(&upper.as_str()),
                (OutputFormat::GTiff, "ZLEVEL") => in_range(value, 1, 12),
                (OutputFormat::GTiff, "ZSTD_LEVEL") => in_range(value, 1, 22),
                (OutputFormat::GTiff, "PREDICTOR") => in_range(value, 1, 3),
                (OutputFormat::GTiff, "TILED") => BOOLEAN.contains(&upper.as_str()),
                (OutputFormat::GTiff, "BLOCKXSIZE" | "BLOCKYSIZE") => value
                    .parse::<usize>()
                    .is_ok_and(|size| size > 0 && size % 16 == 0),
                (OutputFormat::GTiff, "BIGTIFF") => {
                    ["YES", "NO", "IF_NEEDED", "IF_SAFER"].contains(&upper.as_str())
                }
                (OutputFormat::GTiff, "INTERLEAVE") => ["BAND", "PIXEL"].contains(&upper.as_str()),
                (OutputFormat::Envi, "INTERLEAVE") => {
                    ["BSQ", "BIL", "BIP"].contains(&upper.as_str())
                }
                (OutputFormat::Envi, "SUFFIX") => ["REPLACE", "ADD"].contains(&upper.as_str()),
                _ => {
                    debug!(%format, key = %key, value = %value, "Passing unchecked creation option");
                    true
                }
            };
            if !ok {
                return Err(CoregError::InvalidConfig(format!(
                    "creation option {}={} is not valid for float32 {} output",
                    key, value, format
                )));
            }
        }
        Ok(())
    }
}

fn in_range(value: &str, min: i64, max: i64) -> bool {
    value.parse::<i64>().is_ok_and(|v| (min..=max).contains(&v))
}

/// Read a raster with whichever GDAL driver recognises it.
pub fn read_raster(path: &Path) -> Result<Raster> {
    let raster = dataset::read_dataset(path)?;
    info!(
        path = %path.display(),
        rows = raster.rows(),
        cols = raster.cols(),
        bands = raster.bands(),
        "Read raster"
    );
    Ok(raster)
}

/// Write a raster in the given format.
pub fn write_raster(
    raster: &Raster,
    path: &Path,
    format: OutputFormat,
    options: &CreationOptions,
) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)?;
    }
    dataset::write_dataset(raster, path, format, options)?;
    info!(path = %path.display(), %format, "Wrote raster");
    Ok(())
}

/// Output path for `path_out = "auto"`: `<tgt>__shifted_to__<ref>.<ext>` next to the target.
pub fn auto_output_path(
    reference: Option<&Path>,
    target: Option<&Path>,
    format: OutputFormat,
) -> Result<PathBuf> {
    let target = target.ok_or_else(|| {
        CoregError::InvalidConfig(
            "path_out = \"auto\" needs a file-backed target image to derive the output name".into(),
        )
    })?;
    let tgt_stem = target
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "target".to_string());
    let ref_stem = reference
        .and_then(Path::file_stem)
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "reference".to_string());
    let name = format!("{}__shifted_to__{}.{}", tgt_stem, ref_stem, format.extension());
    Ok(target.with_file_name(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_creation_options_case_insensitive() {
        let opts = CreationOptions::parse(&["compress=DEFLATE".into(), "ZLEVEL=9".into()]).unwrap();
        assert_eq!(opts.get("COMPRESS"), Some("DEFLATE"));
        assert_eq!(opts.get("zlevel"), Some("9"));
        assert_eq!(opts.get("TILED"), None);
    }

    #[test]
    fn test_creation_option_without_equals_rejected() {
        assert!(CreationOptions::parse(&["COMPRESS".into()]).is_err());
    }

    #[test]
    fn test_gtiff_option_values_checked() {
        let good = CreationOptions::parse(&[
            "COMPRESS=deflate".into(),
            "ZLEVEL=9".into(),
            "TILED=YES".into(),
            "BLOCKXSIZE=256".into(),
            "BIGTIFF=IF_SAFER".into(),
            "NUM_THREADS=ALL_CPUS".into(),
        ])
        .unwrap();
        assert!(good.validate(OutputFormat::GTiff).is_ok());

        for bad in ["COMPRESS=JPEG", "ZLEVEL=0", "ZLEVEL=fast", "BLOCKXSIZE=100", "BIGTIFF=MAYBE"] {
            let opts = CreationOptions::parse(&[bad.into()]).unwrap();
            assert!(opts.validate(OutputFormat::GTiff).is_err(), "{} accepted", bad);
        }
    }

    #[test]
    fn test_envi_option_values_checked() {
        let bil = CreationOptions::parse(&["INTERLEAVE=bil".into()]).unwrap();
        assert!(bil.validate(OutputFormat::Envi).is_ok());
        // BIL is an ENVI layout, not a GeoTIFF one.
        assert!(bil.validate(OutputFormat::GTiff).is_err());
        let bad = CreationOptions::parse(&["INTERLEAVE=ROWS".into()]).unwrap();
        assert!(bad.validate(OutputFormat::Envi).is_err());
    }

    #[test]
    fn test_auto_output_path() {
        let p = auto_output_path(
            Some(Path::new("/data/ref.bsq")),
            Some(Path::new("/data/tgt.bsq")),
            OutputFormat::GTiff,
        )
        .unwrap();
        assert_eq!(p, PathBuf::from("/data/tgt__shifted_to__ref.tif"));
        assert!(auto_output_path(None, None, OutputFormat::Envi).is_err());
    }
}
