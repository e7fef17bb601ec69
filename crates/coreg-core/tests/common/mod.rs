#![allow(dead_code)]

use ndarray::{Array2, Array3};

use coreg_core::geo::{GeoTransform, Projection};
use coreg_core::raster::Raster;

/// Pixel size of the synthetic scenes, in metres.
pub const RES: f64 = 10.0;
pub const ORIGIN_X: f64 = 400_000.0;
pub const ORIGIN_Y: f64 = 5_800_000.0;

/// Deterministic xorshift generator so scenes are reproducible.
pub struct XorShift(u64);

impl XorShift {
    pub fn new(seed: u64) -> Self {
        Self(seed.max(1))
    }

    pub fn next_f64(&mut self) -> f64 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        (x >> 11) as f64 / (1u64 << 53) as f64
    }

    pub fn range(&mut self, lo: f64, hi: f64) -> f64 {
        lo + (hi - lo) * self.next_f64()
    }
}

/// Continuous textured landscape defined in map coordinates.
pub struct Scene {
    waves: Vec<(f64, f64, f64, f64)>,
    blobs: Vec<(f64, f64, f64, f64)>,
}

impl Scene {
    pub fn new(seed: u64, extent_px: f64) -> Self {
        let mut rng = XorShift::new(seed);
        let waves = (0..24)
            .map(|_| {
                let wavelength = rng.range(6.0, 40.0) * RES;
                let angle = rng.range(0.0, std::f64::consts::TAU);
                let k = std::f64::consts::TAU / wavelength;
                (k * angle.cos(), k * angle.sin(), rng.range(0.0, 6.3), rng.range(0.2, 1.0))
            })
            .collect();
        let blobs = (0..80)
            .map(|_| {
                (
                    ORIGIN_X + rng.range(-0.2, 1.2) * extent_px * RES,
                    ORIGIN_Y - rng.range(-0.2, 1.2) * extent_px * RES,
                    rng.range(1.5, 6.0) * RES,
                    rng.range(-3.0, 3.0),
                )
            })
            .collect();
        Self { waves, blobs }
    }

    pub fn value(&self, x: f64, y: f64) -> f64 {
        let waves: f64 = self
            .waves
            .iter()
            .map(|&(kx, ky, phase, amp)| amp * (kx * x + ky * y + phase).sin())
            .sum();
        let blobs: f64 = self
            .blobs
            .iter()
            .map(|&(bx, by, sigma, amp)| {
                let d2 = (x - bx).powi(2) + (y - by).powi(2);
                amp * (-d2 / (2.0 * sigma * sigma)).exp()
            })
            .sum();
        100.0 + 10.0 * (waves + blobs)
    }

    /// Sample the scene at pixel centres of `gt`, with the content moved by
    /// `(dx_px, dy_px)` pixels (x to the right, y downward).
    pub fn render(&self, gt: &GeoTransform, rows: usize, cols: usize, shift_px: (f64, f64)) -> Array2<f32> {
        let (ox, oy) = (shift_px.0 * RES, -shift_px.1 * RES);
        Array2::from_shape_fn((rows, cols), |(r, c)| {
            let (x, y) = gt.pixel_to_map(c as f64 + 0.5, r as f64 + 0.5);
            self.value(x - ox, y - oy) as f32
        })
    }
}

pub fn grid() -> GeoTransform {
    GeoTransform::new(ORIGIN_X, RES, ORIGIN_Y, -RES)
}

pub fn utm33() -> Projection {
    Projection::from_epsg(32633).unwrap()
}

/// Reference scene on the base grid.
pub fn reference(scene: &Scene, size: usize) -> Raster {
    Raster::from_band(scene.render(&grid(), size, size, (0.0, 0.0)), grid(), utm33())
        .unwrap()
        .with_nodata(Some(-9999.0))
}

/// Target on the base grid whose content is displaced by `shift_px`.
pub fn shifted_target(scene: &Scene, size: usize, shift_px: (f64, f64)) -> Raster {
    Raster::from_band(scene.render(&grid(), size, size, shift_px), grid(), utm33())
        .unwrap()
        .with_nodata(Some(-9999.0))
}

/// Target on an arbitrary geotransform.
pub fn target_on(scene: &Scene, gt: GeoTransform, size: usize, shift_px: (f64, f64)) -> Raster {
    Raster::from_band(scene.render(&gt, size, size, shift_px), gt, utm33())
        .unwrap()
        .with_nodata(Some(-9999.0))
}

/// Stack several renderings into one multi-band raster.
pub fn multiband(bands: &[Array2<f32>], gt: GeoTransform, projection: Projection) -> Raster {
    let (rows, cols) = bands[0].dim();
    let mut data = Array3::<f32>::zeros((bands.len(), rows, cols));
    for (i, band) in bands.iter().enumerate() {
        data.index_axis_mut(ndarray::Axis(0), i).assign(band);
    }
    Raster::new(data, gt, projection).unwrap()
}
