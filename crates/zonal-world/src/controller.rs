//! Zone controller: per-step zone creation and connectivity tracking.

use crate::connectivity::{classify_zones, ConnectivityGroup};
use crate::grid::{GridAdjacency, GridGeometry};
use crate::zone::{label_zones, Zone};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use tracing::{debug, warn};
use zonal_core::{ControllerConfig, Error, Record, Result, ZoneRow};

/// Supplies the zone-membership mask of the current step.
///
/// The mask must depend only on the grid's fields as the caller left them
/// before the step. Providers must not keep per-call state: a step that fails
/// after the provider ran is discarded, and the provider is asked again on the
/// retried step.
pub trait MaskProvider<G: ?Sized> {
    fn zone_mask(&mut self, grid: &G) -> Vec<bool>;
}

impl<G: ?Sized, F> MaskProvider<G> for F
where
    F: FnMut(&G) -> Vec<bool>,
{
    fn zone_mask(&mut self, grid: &G) -> Vec<bool> {
        self(grid)
    }
}

/// Zone-level statistics of one step
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneStats {
    pub zones: usize,
    pub fragmentations: usize,
    pub captures: usize,
}

impl ZoneStats {
    pub fn from_groups(zones: usize, groups: &[ConnectivityGroup]) -> Self {
        Self {
            zones,
            fragmentations: groups.iter().map(ConnectivityGroup::fragmentations).sum(),
            captures: groups.iter().map(ConnectivityGroup::captures).sum(),
        }
    }
}

/// A computed but not yet applied controller step
#[derive(Debug, Clone)]
pub struct PendingStep {
    pub zones: Vec<Zone>,
    pub groups: Vec<ConnectivityGroup>,
    pub stats: ZoneStats,
    /// Group index of every prior zone
    prior_group: Vec<usize>,
}

impl PendingStep {
    /// Groups containing any of the given prior zones, in group order
    pub fn groups_for<'a>(&'a self, prior_range: &BTreeSet<usize>) -> Vec<&'a ConnectivityGroup> {
        let indices: BTreeSet<usize> = prior_range
            .iter()
            .filter_map(|&zone| self.prior_group.get(zone).copied())
            .collect();
        indices.into_iter().map(|index| &self.groups[index]).collect()
    }
}

/// Tracks the zones of one habitat across time steps.
///
/// Zones are relabeled from the mask provider every step and related to the
/// previous step's zones only through connectivity groups.
pub struct ZoneController<G: ?Sized> {
    provider: Box<dyn MaskProvider<G>>,
    config: ControllerConfig,
    geometry: GridGeometry,
    zones: Vec<Zone>,
    record: Record<ZoneRow>,
}

impl<G: GridAdjacency + ?Sized> ZoneController<G> {
    /// Create a controller and label its initial zones from the provider
    pub fn new(
        grid: &G,
        mut provider: impl MaskProvider<G> + 'static,
        config: ControllerConfig,
    ) -> Result<Self> {
        config.validate()?;
        let mask = provider.zone_mask(grid);
        let zones = label_zones(&mask, grid, config.minimum_area)?;
        debug!(zones = zones.len(), "Labeled initial zones");

        Ok(Self {
            provider: Box::new(provider),
            config,
            geometry: grid.geometry(),
            zones,
            record: Record::new(),
        })
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// Zones of the most recently completed step
    pub fn zones(&self) -> &[Zone] {
        &self.zones
    }

    pub fn record(&self) -> &Record<ZoneRow> {
        &self.record
    }

    pub fn geometry(&self) -> GridGeometry {
        self.geometry
    }

    /// Label and classify the next step's zones without changing the controller
    pub fn prepare_step(&mut self, grid: &G) -> Result<PendingStep> {
        if grid.geometry() != self.geometry {
            return Err(Error::GeometryChanged);
        }

        let mask = self.provider.zone_mask(grid);
        let zones = label_zones(&mask, grid, self.config.minimum_area)?;
        let groups = classify_zones(&self.zones, &zones);

        let mut prior_group = vec![0; self.zones.len()];
        for (index, group) in groups.iter().enumerate() {
            for &p in &group.prior {
                prior_group[p] = index;
            }
            debug!(
                group = index,
                connectivity = %group.connectivity,
                prior = group.prior.len(),
                current = group.current.len(),
                "Classified zone group"
            );
        }

        let stats = ZoneStats::from_groups(zones.len(), &groups);
        if stats.zones == 0 && !self.zones.is_empty() {
            warn!(prior_zones = self.zones.len(), "All zones vanished");
        }

        Ok(PendingStep {
            zones,
            groups,
            stats,
            prior_group,
        })
    }

    /// Make a prepared step current and record its statistics
    pub fn commit_step(&mut self, pending: PendingStep, step: u64, time: f64) -> Result<ZoneStats> {
        self.record.push(ZoneRow {
            step,
            time,
            zones: pending.stats.zones,
            fragmentations: pending.stats.fragmentations,
            captures: pending.stats.captures,
        })?;
        self.zones = pending.zones;
        Ok(pending.stats)
    }

    /// Prepare and commit a step in one go, for controllers used without an evolver
    pub fn run_one_step(&mut self, grid: &G, step: u64, time: f64) -> Result<ZoneStats> {
        if let Some(expected) = self.record.next_step() {
            if step != expected {
                return Err(Error::RecordOrder { expected, actual: step });
            }
        }
        let pending = self.prepare_step(grid)?;
        self.commit_step(pending, step, time)
    }
}

impl<G: ?Sized> fmt::Debug for ZoneController<G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ZoneController")
            .field("config", &self.config)
            .field("geometry", &self.geometry)
            .field("zones", &self.zones.len())
            .field("steps", &self.record.len())
            .finish()
    }
}
