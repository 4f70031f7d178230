//! Connectivity classification of zones across consecutive time steps.
//!
//! Prior and current zones form a bipartite graph in which an edge joins two
//! zones that share at least one node. Each connected component of that graph
//! is one [`ConnectivityGroup`], tagged by how many prior and current zones it
//! holds. Classification looks only at node membership, never at taxa.

use crate::zone::Zone;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use zonal_core::ConnectivityType;

/// Number of nodes a prior zone shares with a current zone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneOverlap {
    pub prior: usize,
    pub current: usize,
    pub nodes: usize,
}

/// Prior and current zones that are mutually connected by overlap
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectivityGroup {
    pub connectivity: ConnectivityType,
    /// Indices into the prior zones, ascending
    pub prior: Vec<usize>,
    /// Indices into the current zones, ascending
    pub current: Vec<usize>,
    /// Every overlapping pair within the group, ordered by (prior, current)
    pub overlaps: Vec<ZoneOverlap>,
}

impl ConnectivityGroup {
    /// `C - 1` for a one-to-many group, otherwise zero
    pub fn fragmentations(&self) -> usize {
        match self.connectivity {
            ConnectivityType::OneToMany => self.current.len() - 1,
            _ => 0,
        }
    }

    /// `P - 1` for a many-to-one group, otherwise zero
    pub fn captures(&self) -> usize {
        match self.connectivity {
            ConnectivityType::ManyToOne => self.prior.len() - 1,
            _ => 0,
        }
    }

    pub fn contains_prior(&self, zone: usize) -> bool {
        self.prior.binary_search(&zone).is_ok()
    }

    pub fn contains_current(&self, zone: usize) -> bool {
        self.current.binary_search(&zone).is_ok()
    }
}

/// Group and tag prior zones against current zones.
///
/// Both zone sets must index the same node space. Groups containing prior
/// zones come first, ordered by their lowest prior zone; groups of newly
/// appeared current zones follow in current-zone order.
pub fn classify_zones(prior: &[Zone], current: &[Zone]) -> Vec<ConnectivityGroup> {
    let node_space = prior
        .iter()
        .chain(current.iter())
        .filter_map(|zone| zone.nodes().last())
        .max()
        .map_or(0, |&node| node + 1);

    let mut current_owner: Vec<Option<usize>> = vec![None; node_space];
    for (index, zone) in current.iter().enumerate() {
        for &node in zone.nodes() {
            current_owner[node] = Some(index);
        }
    }

    // Overlap counts keyed by (prior, current)
    let mut overlap_counts: BTreeMap<(usize, usize), usize> = BTreeMap::new();
    for (p, zone) in prior.iter().enumerate() {
        for &node in zone.nodes() {
            if let Some(c) = current_owner[node] {
                *overlap_counts.entry((p, c)).or_insert(0) += 1;
            }
        }
    }

    let mut prior_edges: Vec<Vec<usize>> = vec![Vec::new(); prior.len()];
    let mut current_edges: Vec<Vec<usize>> = vec![Vec::new(); current.len()];
    for &(p, c) in overlap_counts.keys() {
        prior_edges[p].push(c);
        current_edges[c].push(p);
    }

    let mut prior_seen = vec![false; prior.len()];
    let mut current_seen = vec![false; current.len()];
    let mut groups = Vec::new();

    for start in 0..prior.len() {
        if prior_seen[start] {
            continue;
        }

        let mut group_prior = Vec::new();
        let mut group_current = Vec::new();
        let mut queue = VecDeque::new();
        prior_seen[start] = true;
        queue.push_back(Side::Prior(start));

        while let Some(side) = queue.pop_front() {
            match side {
                Side::Prior(p) => {
                    group_prior.push(p);
                    for &c in &prior_edges[p] {
                        if !current_seen[c] {
                            current_seen[c] = true;
                            queue.push_back(Side::Current(c));
                        }
                    }
                }
                Side::Current(c) => {
                    group_current.push(c);
                    for &p in &current_edges[c] {
                        if !prior_seen[p] {
                            prior_seen[p] = true;
                            queue.push_back(Side::Prior(p));
                        }
                    }
                }
            }
        }

        groups.push(build_group(group_prior, group_current, &overlap_counts));
    }

    for c in 0..current.len() {
        if !current_seen[c] {
            groups.push(build_group(Vec::new(), vec![c], &overlap_counts));
        }
    }

    groups
}

enum Side {
    Prior(usize),
    Current(usize),
}

fn build_group(
    mut prior: Vec<usize>,
    mut current: Vec<usize>,
    overlap_counts: &BTreeMap<(usize, usize), usize>,
) -> ConnectivityGroup {
    prior.sort_unstable();
    current.sort_unstable();

    let overlaps = prior
        .iter()
        .flat_map(|&p| {
            overlap_counts
                .range((p, 0)..=(p, usize::MAX))
                .map(|(&(prior, current), &nodes)| ZoneOverlap { prior, current, nodes })
        })
        .collect();

    // A group always holds at least one zone
    let connectivity = ConnectivityType::from_counts(prior.len(), current.len())
        .unwrap_or(ConnectivityType::NoneToOne);

    ConnectivityGroup {
        connectivity,
        prior,
        current,
        overlaps,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::RasterGrid;
    use crate::zone::label_zones;
    use proptest::prelude::*;
    use zonal_core::Neighborhood;

    fn zone(nodes: &[usize]) -> Zone {
        Zone::new(nodes.to_vec(), nodes.len() as f64)
    }

    #[test]
    fn test_one_to_one() {
        let groups = classify_zones(&[zone(&[0, 1, 2])], &[zone(&[1, 2, 3])]);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].connectivity, ConnectivityType::OneToOne);
        assert_eq!(groups[0].overlaps, vec![ZoneOverlap { prior: 0, current: 0, nodes: 2 }]);
    }

    #[test]
    fn test_one_to_none_and_appearance() {
        let groups = classify_zones(&[zone(&[0, 1])], &[zone(&[5, 6])]);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].connectivity, ConnectivityType::OneToNone);
        assert_eq!(groups[0].prior, vec![0]);
        assert!(groups[0].current.is_empty());
        assert_eq!(groups[1].connectivity, ConnectivityType::NoneToOne);
        assert_eq!(groups[1].current, vec![0]);
    }

    #[test]
    fn test_one_to_many() {
        let prior = [zone(&[0, 1, 2, 3, 4, 5])];
        let current = [zone(&[0]), zone(&[2, 3]), zone(&[5])];
        let groups = classify_zones(&prior, &current);

        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].connectivity, ConnectivityType::OneToMany);
        assert_eq!(groups[0].current, vec![0, 1, 2]);
        assert_eq!(groups[0].fragmentations(), 2);
        assert_eq!(groups[0].captures(), 0);
    }

    #[test]
    fn test_many_to_one() {
        let prior = [zone(&[0, 1]), zone(&[4, 5]), zone(&[8])];
        let current = [zone(&[0, 1, 2, 3, 4, 5, 6, 7, 8])];
        let groups = classify_zones(&prior, &current);

        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].connectivity, ConnectivityType::ManyToOne);
        assert_eq!(groups[0].prior, vec![0, 1, 2]);
        assert_eq!(groups[0].captures(), 2);
    }

    #[test]
    fn test_many_to_many() {
        // Two prior zones bridged by the middle current zone
        let prior = [zone(&[0, 1, 2]), zone(&[4, 5, 6])];
        let current = [zone(&[0]), zone(&[2, 3, 4]), zone(&[6])];
        let groups = classify_zones(&prior, &current);

        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].connectivity, ConnectivityType::ManyToMany);
        assert_eq!(groups[0].prior, vec![0, 1]);
        assert_eq!(groups[0].current, vec![0, 1, 2]);
        assert_eq!(groups[0].overlaps.len(), 4);
        assert_eq!(groups[0].fragmentations(), 0);
    }

    #[test]
    fn test_independent_groups_ordered_by_prior() {
        let prior = [zone(&[0]), zone(&[10])];
        let current = [zone(&[10, 11]), zone(&[0, 1])];
        let groups = classify_zones(&prior, &current);

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].prior, vec![0]);
        assert_eq!(groups[0].current, vec![1]);
        assert_eq!(groups[1].prior, vec![1]);
        assert_eq!(groups[1].current, vec![0]);
    }

    #[test]
    fn test_group_serialization() {
        let groups = classify_zones(&[zone(&[0]), zone(&[2])], &[zone(&[0, 1, 2])]);
        let json = serde_json::to_string(&groups[0]).unwrap();
        assert!(json.contains("\"connectivity\":\"many-to-one\""));

        let back: ConnectivityGroup = serde_json::from_str(&json).unwrap();
        assert_eq!(back, groups[0]);
    }

    #[test]
    fn test_no_zones() {
        assert!(classify_zones(&[], &[]).is_empty());
    }

    proptest! {
        #[test]
        fn prop_groups_partition_zones(
            before in proptest::collection::vec(any::<bool>(), 36),
            after in proptest::collection::vec(any::<bool>(), 36),
        ) {
            let grid = RasterGrid::new(6, 6, Neighborhood::Four);
            let prior = label_zones(&before, &grid, 0.0).unwrap();
            let current = label_zones(&after, &grid, 0.0).unwrap();
            let groups = classify_zones(&prior, &current);

            let mut prior_hits = vec![0; prior.len()];
            let mut current_hits = vec![0; current.len()];
            for group in &groups {
                for &p in &group.prior {
                    prior_hits[p] += 1;
                }
                for &c in &group.current {
                    current_hits[c] += 1;
                }

                let (p, c) = (group.prior.len(), group.current.len());
                let expected = match group.connectivity {
                    ConnectivityType::OneToNone => c == 0,
                    ConnectivityType::OneToOne => p == 1 && c == 1,
                    ConnectivityType::OneToMany => p == 1 && c > 1,
                    ConnectivityType::ManyToOne => p > 1 && c == 1,
                    ConnectivityType::ManyToMany => p > 1 && c > 1,
                    ConnectivityType::NoneToOne => p == 0 && c == 1,
                };
                prop_assert!(expected);

                for overlap in &group.overlaps {
                    prop_assert!(group.contains_prior(overlap.prior));
                    prop_assert!(group.contains_current(overlap.current));
                }
            }

            prop_assert!(prior_hits.iter().all(|&n| n == 1));
            prop_assert!(current_hits.iter().all(|&n| n == 1));
        }
    }
}
