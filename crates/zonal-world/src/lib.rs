//! Zone tracking and lineage evolution engine.
//!
//! Zones are derived every step from a per-node mask, related to the previous
//! step's zones by spatial overlap, and the resulting connectivity drives
//! dispersal, speciation and extinction of the taxa living in them.

pub mod grid;
pub mod zone;
pub mod connectivity;
pub mod controller;
pub mod taxon;
pub mod evolver;

pub use grid::{FieldStore, GridAdjacency, GridGeometry, RasterGrid, RICHNESS_FIELD};
pub use zone::{label_zones, Zone};
pub use connectivity::{classify_zones, ConnectivityGroup, ZoneOverlap};
pub use controller::{MaskProvider, PendingStep, ZoneController, ZoneStats};
pub use taxon::{ConnectivityEvent, LineageResponse, Taxon, TaxonKind, TaxonStrategy, ZoneDispersal};
pub use evolver::{Evolver, TaxonQuery};
