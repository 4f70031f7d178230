//! Zones and connected-component labeling of node masks.

use crate::grid::GridAdjacency;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use zonal_core::{Error, Result};

/// A spatially contiguous set of grid nodes at one time step.
///
/// Zones are values: each step creates new ones, and zones of different steps
/// are related only through spatial overlap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Zone {
    /// Member nodes in ascending order
    nodes: Vec<usize>,
    area: f64,
}

impl Zone {
    pub fn new(mut nodes: Vec<usize>, area: f64) -> Self {
        nodes.sort_unstable();
        nodes.dedup();
        Self { nodes, area }
    }

    pub fn nodes(&self) -> &[usize] {
        &self.nodes
    }

    pub fn area(&self) -> f64 {
        self.area
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, node: usize) -> bool {
        self.nodes.binary_search(&node).is_ok()
    }

    /// Lowest member node, which orders zones within a step
    pub fn first_node(&self) -> Option<usize> {
        self.nodes.first().copied()
    }

    /// Boolean membership over all `node_count` nodes.
    ///
    /// Fails if the zone holds a node outside that range.
    pub fn mask(&self, node_count: usize) -> Result<Vec<bool>> {
        if let Some(&last) = self.nodes.last() {
            if last >= node_count {
                return Err(Error::MaskSize {
                    expected: node_count,
                    actual: last + 1,
                });
            }
        }
        let mut mask = vec![false; node_count];
        for &node in &self.nodes {
            mask[node] = true;
        }
        Ok(mask)
    }
}

/// Partition a mask into connected zones.
///
/// Components with an area below `minimum_area` are dropped entirely. Zones are
/// ordered by their lowest node index. An all-false mask yields no zones.
pub fn label_zones<G: GridAdjacency + ?Sized>(
    mask: &[bool],
    grid: &G,
    minimum_area: f64,
) -> Result<Vec<Zone>> {
    let node_count = grid.node_count();
    if mask.len() != node_count {
        return Err(Error::MaskSize {
            expected: node_count,
            actual: mask.len(),
        });
    }

    let mut visited = vec![false; node_count];
    let mut queue = VecDeque::new();
    let mut zones = Vec::new();

    for start in 0..node_count {
        if !mask[start] || visited[start] {
            continue;
        }

        visited[start] = true;
        queue.push_back(start);
        let mut nodes = Vec::new();
        let mut area = 0.0;

        while let Some(node) = queue.pop_front() {
            nodes.push(node);
            area += grid.cell_area(node);
            for neighbor in grid.neighbors(node) {
                if neighbor < node_count && mask[neighbor] && !visited[neighbor] {
                    visited[neighbor] = true;
                    queue.push_back(neighbor);
                }
            }
        }

        if area >= minimum_area {
            zones.push(Zone::new(nodes, area));
        }
    }

    Ok(zones)
}
