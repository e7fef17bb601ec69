//! Projection descriptors backed by GDAL/OSR spatial references.

use gdal::spatial_ref::SpatialRef;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A coordinate reference system given as WKT. An empty string means the
/// raster has no projection and lives in plain pixel coordinates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Projection {
    wkt: String,
}

impl Projection {
    pub fn from_wkt(wkt: impl Into<String>) -> Self {
        Self { wkt: wkt.into() }
    }

    pub fn from_epsg(code: u32) -> Result<Self> {
        let srs = SpatialRef::from_epsg(code)?;
        Ok(Self::from_wkt(srs.to_wkt()?))
    }

    /// No projection defined (local pixel-coordinate mode).
    pub fn is_empty(&self) -> bool {
        self.wkt.trim().is_empty()
    }

    pub fn wkt(&self) -> &str {
        &self.wkt
    }

    /// OSR view of the WKT; `None` when empty or unparseable.
    pub fn spatial_ref(&self) -> Option<SpatialRef> {
        if self.is_empty() {
            return None;
        }
        SpatialRef::from_wkt(&self.wkt).ok()
    }

    /// Name of the root CRS node, e.g. `WGS 84 / UTM zone 33N`.
    pub fn name(&self) -> Option<String> {
        let srs = self.spatial_ref()?;
        ["PROJCS", "GEOGCS"]
            .iter()
            .find_map(|node| srs.get_attr_value(node, 0).ok().flatten())
    }

    /// Normalised geodetic datum name, e.g. `WGS84` or `ETRS89`.
    pub fn datum(&self) -> Option<String> {
        let srs = self.spatial_ref()?;
        let name = srs.get_attr_value("DATUM", 0).ok().flatten()?;
        Some(normalize_datum(&name))
    }

    /// EPSG code of the CRS itself, identified by OSR when the WKT carries none.
    pub fn epsg(&self) -> Option<u32> {
        let mut srs = self.spatial_ref()?;
        let code = match srs.auth_code() {
            Ok(code) => code,
            Err(_) => {
                srs.auto_identify_epsg().ok()?;
                srs.auth_code().ok()?
            }
        };
        u32::try_from(code).ok()
    }

    /// Two projections describe the same CRS.
    pub fn is_equivalent(&self, other: &Projection) -> bool {
        if self.is_empty() || other.is_empty() {
            return self.is_empty() && other.is_empty();
        }
        match (self.spatial_ref(), other.spatial_ref()) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }
}

impl std::fmt::Display for Projection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_empty() {
            return write!(f, "<none>");
        }
        match (self.name(), self.epsg()) {
            (Some(name), Some(code)) => write!(f, "{} (EPSG:{})", name, code),
            (Some(name), None) => write!(f, "{}", name),
            _ => write!(f, "<unparsed WKT>"),
        }
    }
}

/// Map the many spellings of a datum onto one canonical token.
pub fn normalize_datum(name: &str) -> String {
    let trimmed = name.strip_prefix("D_").unwrap_or(name);
    let key: String = trimmed
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_uppercase())
        .collect();
    match key.as_str() {
        "WGS84" | "WGS1984" | "WORLDGEODETICSYSTEM1984" => "WGS84".to_string(),
        "ETRS89" | "ETRS1989" | "EUROPEANTERRESTRIALREFERENCESYSTEM1989"
        | "EUROPEANTERRESTRIALREFERENCESYSTEM1989ENSEMBLE" => "ETRS89".to_string(),
        "NAD83" | "NORTHAMERICANDATUM1983" => "NAD83".to_string(),
        _ => key,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_utm_datum_and_epsg() {
        let prj = Projection::from_epsg(32633).unwrap();
        assert_eq!(prj.datum().as_deref(), Some("WGS84"));
        assert_eq!(prj.epsg(), Some(32633));
        assert_eq!(prj.name().as_deref(), Some("WGS 84 / UTM zone 33N"));
    }

    #[test]
    fn test_laea_europe_is_etrs89() {
        let prj = Projection::from_epsg(3035).unwrap();
        assert_eq!(prj.datum().as_deref(), Some("ETRS89"));
        assert_eq!(prj.epsg(), Some(3035));
    }

    #[test]
    fn test_codes_outside_utm_resolve() {
        // Lambert-93, a national grid on the RGF93 datum.
        let prj = Projection::from_epsg(2154).unwrap();
        assert_eq!(prj.epsg(), Some(2154));
        assert!(prj.datum().is_some());
        assert_ne!(prj.datum().as_deref(), Some("WGS84"));
    }

    #[test]
    fn test_datum_spellings_normalise() {
        assert_eq!(normalize_datum("WGS_1984"), "WGS84");
        assert_eq!(normalize_datum("World Geodetic System 1984"), "WGS84");
        assert_eq!(normalize_datum("D_WGS_1984"), "WGS84");
        assert_eq!(
            normalize_datum("European_Terrestrial_Reference_System_1989_ensemble"),
            "ETRS89"
        );
    }

    #[test]
    fn test_equivalence_ignores_formatting() {
        let compact = Projection::from_epsg(32633).unwrap();
        let pretty = Projection::from_wkt(compact.spatial_ref().unwrap().to_pretty_wkt().unwrap());
        assert!(compact.is_equivalent(&pretty));
        assert!(!compact.is_equivalent(&Projection::from_epsg(32632).unwrap()));
        assert!(!compact.is_equivalent(&Projection::default()));
        assert!(Projection::default().is_equivalent(&Projection::default()));
    }

    #[test]
    fn test_malformed_wkt() {
        let prj = Projection::from_wkt("garbage");
        assert!(prj.datum().is_none());
        assert!(prj.epsg().is_none());
        assert_eq!(prj.to_string(), "<unparsed WKT>");
    }

    #[test]
    fn test_unknown_epsg() {
        assert!(Projection::from_epsg(999_999).is_err());
    }
}
