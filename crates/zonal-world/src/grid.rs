//! Grid collaborators: node adjacency, field storage and the raster grid.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use zonal_core::{GridConfig, Neighborhood, Result};

/// Field name under which per-node taxon richness is published
pub const RICHNESS_FIELD: &str = "taxa__richness";

/// Comparable description of a grid's node layout.
///
/// Two grids with equal geometry index their nodes identically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridGeometry {
    pub node_count: usize,
    pub rows: usize,
    pub cols: usize,
}

/// Node adjacency of a grid that zones are labeled on
pub trait GridAdjacency {
    fn node_count(&self) -> usize;

    /// Indices of the nodes adjacent to `node`
    fn neighbors(&self, node: usize) -> Vec<usize>;

    fn cell_area(&self, _node: usize) -> f64 {
        1.0
    }

    fn geometry(&self) -> GridGeometry {
        GridGeometry {
            node_count: self.node_count(),
            rows: 1,
            cols: self.node_count(),
        }
    }
}

/// Named per-node value arrays attached to a grid
pub trait FieldStore {
    fn field(&self, name: &str) -> Option<&[f64]>;
    fn set_field(&mut self, name: &str, values: Vec<f64>);
}

/// A rectangular raster with row-major node ordering
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RasterGrid {
    pub rows: usize,
    pub cols: usize,
    pub neighborhood: Neighborhood,
    cell_area: f64,
    fields: BTreeMap<String, Vec<f64>>,
}

impl RasterGrid {
    pub fn new(rows: usize, cols: usize, neighborhood: Neighborhood) -> Self {
        Self {
            rows,
            cols,
            neighborhood,
            cell_area: 1.0,
            fields: BTreeMap::new(),
        }
    }

    /// Create a grid from configuration
    pub fn from_config(config: &GridConfig) -> Result<Self> {
        config.validate()?;
        let mut grid = Self::new(config.rows, config.cols, config.neighborhood);
        grid.cell_area = config.cell_area;
        Ok(grid)
    }

    pub fn node_at(&self, row: usize, col: usize) -> usize {
        row * self.cols + col
    }

    /// Get (row, col) from index
    pub fn index_to_cell(&self, node: usize) -> (usize, usize) {
        (node / self.cols, node % self.cols)
    }

    /// Build a node mask from a predicate over (row, col)
    pub fn mask_from(&self, predicate: impl Fn(usize, usize) -> bool) -> Vec<bool> {
        (0..self.node_count())
            .map(|node| {
                let (row, col) = self.index_to_cell(node);
                predicate(row, col)
            })
            .collect()
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.fields.keys().map(String::as_str)
    }
}

impl GridAdjacency for RasterGrid {
    fn node_count(&self) -> usize {
        self.rows * self.cols
    }

    fn neighbors(&self, node: usize) -> Vec<usize> {
        let (row, col) = self.index_to_cell(node);
        let (row, col) = (row as isize, col as isize);
        let offsets: &[(isize, isize)] = match self.neighborhood {
            Neighborhood::Four => &[(-1, 0), (0, -1), (0, 1), (1, 0)],
            Neighborhood::Eight => &[
                (-1, -1),
                (-1, 0),
                (-1, 1),
                (0, -1),
                (0, 1),
                (1, -1),
                (1, 0),
                (1, 1),
            ],
        };

        offsets
            .iter()
            .map(|(dr, dc)| (row + dr, col + dc))
            .filter(|&(r, c)| r >= 0 && c >= 0 && (r as usize) < self.rows && (c as usize) < self.cols)
            .map(|(r, c)| self.node_at(r as usize, c as usize))
            .collect()
    }

    fn cell_area(&self, _node: usize) -> f64 {
        self.cell_area
    }

    fn geometry(&self) -> GridGeometry {
        GridGeometry {
            node_count: self.node_count(),
            rows: self.rows,
            cols: self.cols,
        }
    }
}

impl FieldStore for RasterGrid {
    fn field(&self, name: &str) -> Option<&[f64]> {
        self.fields.get(name).map(Vec::as_slice)
    }

    fn set_field(&mut self, name: &str, values: Vec<f64>) {
        self.fields.insert(name.to_string(), values);
    }
}
