//! Synthetic terrain and an oscillating temperature field that drive the habitat mask.

use rand::Rng;
use rand_chacha::ChaCha8Rng;
use zonal_core::ClimateConfig;
use zonal_world::{FieldStore, RasterGrid};

pub const ELEVATION_FIELD: &str = "topographic__elevation";
pub const TEMPERATURE_FIELD: &str = "land_surface__temperature";

const HILLS: usize = 12;

/// Fill the elevation field with smooth random hills scaled to `relief`
pub fn generate_terrain(grid: &mut RasterGrid, relief: f64, rng: &mut ChaCha8Rng) {
    let (rows, cols) = (grid.rows as f64, grid.cols as f64);
    let hills: Vec<(f64, f64, f64, f64)> = (0..HILLS)
        .map(|_| {
            let row = rng.gen_range(0.0..rows);
            let col = rng.gen_range(0.0..cols);
            let radius = rng.gen_range(0.05..0.25) * rows.max(cols);
            let height = rng.gen_range(0.3..1.0);
            (row, col, radius, height)
        })
        .collect();

    let raw: Vec<f64> = (0..grid.rows * grid.cols)
        .map(|node| {
            let (row, col) = grid.index_to_cell(node);
            hills
                .iter()
                .map(|&(r, c, radius, height)| {
                    let dr = row as f64 - r;
                    let dc = col as f64 - c;
                    height * (-(dr * dr + dc * dc) / (2.0 * radius * radius)).exp()
                })
                .sum()
        })
        .collect();

    let peak = raw.iter().cloned().fold(0.0, f64::max);
    let scale = if peak > 0.0 { relief / peak } else { 0.0 };
    grid.set_field(ELEVATION_FIELD, raw.into_iter().map(|h| h * scale).collect());
}

/// Sea-level temperature at `time`
pub fn base_temperature(climate: &ClimateConfig, time: f64) -> f64 {
    let phase = if climate.period > 0.0 {
        std::f64::consts::TAU * time / climate.period
    } else {
        0.0
    };
    climate.base_temperature + climate.amplitude * phase.sin()
}

/// Recompute the temperature field for `time` from the elevation field
pub fn update_temperature(grid: &mut RasterGrid, climate: &ClimateConfig, time: f64) {
    let base = base_temperature(climate, time);
    let temperature = match grid.field(ELEVATION_FIELD) {
        Some(elevation) => elevation
            .iter()
            .map(|z| base - climate.lapse_rate * z)
            .collect(),
        None => vec![base; grid.rows * grid.cols],
    };
    grid.set_field(TEMPERATURE_FIELD, temperature);
}

/// Nodes whose temperature lies inside the habitable band.
///
/// Returns an empty mask when the temperature field is missing, which the
/// controller rejects as a size mismatch.
pub fn habitable_mask(grid: &RasterGrid, climate: &ClimateConfig) -> Vec<bool> {
    grid.field(TEMPERATURE_FIELD)
        .map(|temperature| {
            temperature
                .iter()
                .map(|&t| t >= climate.min_temperature && t <= climate.max_temperature)
                .collect()
        })
        .unwrap_or_default()
}
