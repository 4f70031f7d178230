//! Configuration types for the zone engine and the runner.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Zone controller configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Zones with a smaller area than this are dropped (area units of the grid)
    pub minimum_area: f64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self { minimum_area: 0.0 }
    }
}

impl ControllerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.minimum_area.is_nan() || self.minimum_area < 0.0 {
            return Err(Error::Configuration(format!(
                "minimum_area must be a non-negative number, got {}",
                self.minimum_area
            )));
        }
        Ok(())
    }
}

/// Which raster cells count as adjacent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Neighborhood {
    /// Edge-sharing cells only
    Four,
    /// Edge- and corner-sharing cells
    Eight,
}

/// Raster grid configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    pub rows: usize,
    pub cols: usize,
    pub neighborhood: Neighborhood,
    /// Area of a single cell
    pub cell_area: f64,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            rows: 64,
            cols: 64,
            neighborhood: Neighborhood::Four,
            cell_area: 1.0,
        }
    }
}

impl GridConfig {
    pub fn validate(&self) -> Result<()> {
        if self.rows == 0 || self.cols == 0 {
            return Err(Error::Configuration(format!(
                "grid must have at least one row and column, got {}x{}",
                self.rows, self.cols
            )));
        }
        if !(self.cell_area > 0.0) || !self.cell_area.is_finite() {
            return Err(Error::Configuration(format!(
                "cell_area must be positive, got {}",
                self.cell_area
            )));
        }
        Ok(())
    }
}

/// Parameters of the runner's temperature-band habitat.
///
/// Temperature falls with elevation by `lapse_rate` and the whole profile
/// oscillates around `base_temperature` with the given amplitude and period.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClimateConfig {
    pub base_temperature: f64,
    pub lapse_rate: f64,
    pub amplitude: f64,
    pub period: f64,
    /// Lowest habitable temperature
    pub min_temperature: f64,
    /// Highest habitable temperature
    pub max_temperature: f64,
    /// Maximum terrain elevation
    pub relief: f64,
}

impl Default for ClimateConfig {
    fn default() -> Self {
        Self {
            base_temperature: 26.0,
            lapse_rate: 0.005,
            amplitude: 4.0,
            period: 100_000.0,
            min_temperature: 10.0,
            max_temperature: 18.0,
            relief: 3000.0,
        }
    }
}

/// Configuration of a complete run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub grid: GridConfig,
    pub controller: ControllerConfig,
    pub climate: ClimateConfig,
    /// Number of steps to run
    pub num_steps: u64,
    /// Duration of a step
    pub dt: f64,
    /// Random seed for terrain generation
    pub seed: u64,
    /// Founder taxa introduced in every initial zone
    pub founders_per_zone: usize,
    /// Steps between population snapshots in the log
    pub log_interval: u64,
    pub json_logs: bool,
    /// Where to write the record snapshot, if anywhere
    pub output_path: Option<String>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            grid: GridConfig::default(),
            controller: ControllerConfig::default(),
            climate: ClimateConfig::default(),
            num_steps: 100,
            dt: 1000.0,
            seed: 0,
            founders_per_zone: 1,
            log_interval: 10,
            json_logs: false,
            output_path: None,
        }
    }
}

impl RunConfig {
    pub fn validate(&self) -> Result<()> {
        self.grid.validate()?;
        self.controller.validate()?;
        if !(self.dt >= 0.0) {
            return Err(Error::Configuration(format!("dt must be non-negative, got {}", self.dt)));
        }
        Ok(())
    }
}
