//! Zone-based taxa and their response to zone connectivity.

use crate::connectivity::{ConnectivityGroup, ZoneOverlap};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;
use zonal_core::{ConnectivityType, ControllerId, TaxonId, TaxonRow};

/// Current zones reached from one prior zone of a taxon
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoneDispersal {
    pub prior: usize,
    /// Tag of the group holding the prior zone
    pub connectivity: ConnectivityType,
    /// Current zones overlapping the prior zone, ascending, with shared node counts
    pub reachable: Vec<(usize, usize)>,
}

impl ZoneDispersal {
    /// Reachable zone sharing the most nodes; ties go to the lowest index
    pub fn best_reachable(&self) -> Option<usize> {
        self.reachable
            .iter()
            .fold(None, |best: Option<(usize, usize)>, &(zone, nodes)| match best {
                Some((_, best_nodes)) if best_nodes >= nodes => best,
                _ => Some((zone, nodes)),
            })
            .map(|(zone, _)| zone)
    }

    /// Whether this prior zone is split across several current zones
    pub fn is_split(&self) -> bool {
        self.connectivity.is_fragmenting() && self.reachable.len() > 1
    }
}

/// What a taxon sees when the zones it inhabited are reclassified.
///
/// Each prior zone keeps the tag of its own group, so a range spread over
/// several groups is resolved group by group.
#[derive(Debug)]
pub struct ConnectivityEvent<'a> {
    /// Model time at the end of the step
    pub time: f64,
    /// Prior zones the taxon was resident in
    pub prior_range: &'a BTreeSet<usize>,
    /// Groups holding at least one of the taxon's prior zones
    pub groups: Vec<&'a ConnectivityGroup>,
    /// One entry per prior zone of the range, ascending
    pub dispersals: Vec<ZoneDispersal>,
    /// Current zones overlapping the prior range, ascending by zone index,
    /// with the number of prior-range nodes each one shares
    pub reachable: Vec<(usize, usize)>,
}

impl<'a> ConnectivityEvent<'a> {
    pub fn new(time: f64, prior_range: &'a BTreeSet<usize>, groups: Vec<&'a ConnectivityGroup>) -> Self {
        let mut per_prior: BTreeMap<usize, ZoneDispersal> = BTreeMap::new();
        let mut shared: BTreeMap<usize, usize> = BTreeMap::new();

        for group in &groups {
            for &prior in group.prior.iter().filter(|p| prior_range.contains(p)) {
                per_prior.insert(
                    prior,
                    ZoneDispersal {
                        prior,
                        connectivity: group.connectivity,
                        reachable: Vec::new(),
                    },
                );
            }
            for ZoneOverlap { prior, current, nodes } in group.overlaps.iter().copied() {
                if let Some(dispersal) = per_prior.get_mut(&prior) {
                    dispersal.reachable.push((current, nodes));
                    *shared.entry(current).or_insert(0) += nodes;
                }
            }
        }

        Self {
            time,
            prior_range,
            groups,
            dispersals: per_prior.into_values().collect(),
            reachable: shared.into_iter().collect(),
        }
    }

    /// Whether a current zone belongs to one of the event's groups
    pub fn allows(&self, zone: usize) -> bool {
        self.groups.iter().any(|g| g.contains_current(zone))
    }

    /// Whether any prior zone of the range is split across current zones
    pub fn is_split(&self) -> bool {
        self.dispersals.iter().any(ZoneDispersal::is_split)
    }
}

/// New ranges of a taxon after a connectivity event.
///
/// An empty `range` means the taxon goes extinct. Each entry of `offspring`
/// becomes a child taxon with that range.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineageResponse {
    pub range: BTreeSet<usize>,
    pub offspring: Vec<BTreeSet<usize>>,
}

impl LineageResponse {
    pub fn extinction() -> Self {
        Self::default()
    }

    pub fn relocate(range: BTreeSet<usize>) -> Self {
        Self {
            range,
            offspring: Vec::new(),
        }
    }

    pub fn is_extinction(&self) -> bool {
        self.range.is_empty()
    }
}

/// Custom response logic for a taxon kind
pub trait TaxonStrategy: Send + Sync {
    /// Type tag written to the taxon table
    fn name(&self) -> &str;

    fn respond(&self, event: &ConnectivityEvent<'_>) -> LineageResponse;
}

/// The closed set of taxon behaviours, plus a hook for custom ones
#[derive(Clone)]
pub enum TaxonKind {
    /// Speciates whenever one of its zones splits into disjoint zones
    Allopatric,
    /// Never speciates; spreads over every zone its range reaches
    Cohesive,
    Custom(Arc<dyn TaxonStrategy>),
}

impl TaxonKind {
    pub fn tag(&self) -> &str {
        match self {
            TaxonKind::Allopatric => "allopatric",
            TaxonKind::Cohesive => "cohesive",
            TaxonKind::Custom(strategy) => strategy.name(),
        }
    }

    pub fn respond(&self, event: &ConnectivityEvent<'_>) -> LineageResponse {
        match self {
            TaxonKind::Allopatric => allopatric_response(event),
            TaxonKind::Cohesive => cohesive_response(event),
            TaxonKind::Custom(strategy) => strategy.respond(event),
        }
    }
}

impl Default for TaxonKind {
    fn default() -> Self {
        TaxonKind::Allopatric
    }
}

impl fmt::Debug for TaxonKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaxonKind::Custom(strategy) => write!(f, "Custom({})", strategy.name()),
            other => f.write_str(other.tag()),
        }
    }
}

/// Every prior zone relocates into the zones it reaches. A split prior zone
/// keeps its largest-overlap zone and founds one child per other zone it reaches.
fn allopatric_response(event: &ConnectivityEvent<'_>) -> LineageResponse {
    let mut kept = BTreeSet::new();
    let mut split = BTreeSet::new();
    for dispersal in &event.dispersals {
        if dispersal.is_split() {
            kept.extend(dispersal.best_reachable());
            split.extend(dispersal.reachable.iter().map(|&(zone, _)| zone));
        } else {
            kept.extend(dispersal.reachable.iter().map(|&(zone, _)| zone));
        }
    }

    if kept.is_empty() {
        return LineageResponse::extinction();
    }
    let offspring = split
        .difference(&kept)
        .map(|&zone| BTreeSet::from([zone]))
        .collect();
    LineageResponse {
        range: kept,
        offspring,
    }
}

fn cohesive_response(event: &ConnectivityEvent<'_>) -> LineageResponse {
    LineageResponse::relocate(event.reachable.iter().map(|&(zone, _)| zone).collect())
}

/// A lineage inhabiting zones of one controller
#[derive(Debug, Clone)]
pub struct Taxon {
    pub(crate) id: Option<TaxonId>,
    pub(crate) parent: Option<TaxonId>,
    pub(crate) kind: TaxonKind,
    pub(crate) controller: ControllerId,
    pub(crate) range: BTreeSet<usize>,
    pub(crate) t_first: f64,
    pub(crate) t_final: Option<f64>,
}

impl Taxon {
    /// A taxon resident in the given current zones of a controller, not yet tracked
    pub fn new(kind: TaxonKind, controller: ControllerId, range: impl IntoIterator<Item = usize>) -> Self {
        Self {
            id: None,
            parent: None,
            kind,
            controller,
            range: range.into_iter().collect(),
            t_first: 0.0,
            t_final: None,
        }
    }

    pub fn with_parent(mut self, parent: TaxonId) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Identifier, once the taxon has been introduced
    pub fn id(&self) -> Option<TaxonId> {
        self.id
    }

    pub fn parent(&self) -> Option<TaxonId> {
        self.parent
    }

    pub fn kind(&self) -> &TaxonKind {
        &self.kind
    }

    pub fn controller(&self) -> ControllerId {
        self.controller
    }

    /// Zones of the controller's current step the taxon is resident in
    pub fn range(&self) -> &BTreeSet<usize> {
        &self.range
    }

    pub fn t_first(&self) -> f64 {
        self.t_first
    }

    pub fn t_final(&self) -> Option<f64> {
        self.t_final
    }

    pub fn is_extant(&self) -> bool {
        self.t_final.is_none()
    }

    /// Whether the taxon existed at `time`, counting its extinction time as extant
    pub fn exists_at(&self, time: f64) -> bool {
        self.t_first <= time && self.t_final.map_or(true, |t_final| time <= t_final)
    }

    pub(crate) fn to_row(&self, id: TaxonId) -> TaxonRow {
        TaxonRow {
            id,
            parent: self.parent,
            kind: self.kind.tag().to_string(),
            t_first: self.t_first,
            t_final: self.t_final,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::zone::Zone;
    use crate::connectivity::classify_zones;

    fn zone(nodes: &[usize]) -> Zone {
        Zone::new(nodes.to_vec(), nodes.len() as f64)
    }

    fn respond(kind: &TaxonKind, prior: &[Zone], current: &[Zone], range: &[usize]) -> LineageResponse {
        let groups = classify_zones(prior, current);
        let range: BTreeSet<usize> = range.iter().copied().collect();
        let touched = groups
            .iter()
            .filter(|g| g.prior.iter().any(|p| range.contains(p)))
            .collect();
        let event = ConnectivityEvent::new(1.0, &range, touched);
        kind.respond(&event)
    }

    #[test]
    fn test_one_to_none_is_extinction() {
        let response = respond(&TaxonKind::Allopatric, &[zone(&[0, 1])], &[], &[0]);
        assert!(response.is_extinction());
        assert!(response.offspring.is_empty());

        let response = respond(&TaxonKind::Cohesive, &[zone(&[0, 1])], &[], &[0]);
        assert!(response.is_extinction());
    }

    #[test]
    fn test_one_to_one_relocates() {
        let response = respond(&TaxonKind::Allopatric, &[zone(&[0, 1])], &[zone(&[1, 2])], &[0]);
        assert_eq!(response, LineageResponse::relocate(BTreeSet::from([0])));
    }

    #[test]
    fn test_one_to_many_keeps_largest_overlap() {
        let prior = [zone(&[0, 1, 2, 3, 4, 5])];
        let current = [zone(&[0]), zone(&[2, 3]), zone(&[5])];

        let response = respond(&TaxonKind::Allopatric, &prior, &current, &[0]);
        assert_eq!(response.range, BTreeSet::from([1]));
        assert_eq!(
            response.offspring,
            vec![BTreeSet::from([0]), BTreeSet::from([2])]
        );
    }

    #[test]
    fn test_one_to_many_tie_goes_to_lowest_zone() {
        let prior = [zone(&[0, 1, 2])];
        let current = [zone(&[0]), zone(&[2])];

        let response = respond(&TaxonKind::Allopatric, &prior, &current, &[0]);
        assert_eq!(response.range, BTreeSet::from([0]));
        assert_eq!(response.offspring, vec![BTreeSet::from([1])]);
    }

    #[test]
    fn test_cohesive_spreads_without_speciation() {
        let prior = [zone(&[0, 1, 2])];
        let current = [zone(&[0]), zone(&[2])];

        let response = respond(&TaxonKind::Cohesive, &prior, &current, &[0]);
        assert_eq!(response.range, BTreeSet::from([0, 1]));
        assert!(response.offspring.is_empty());
    }

    #[test]
    fn test_many_to_many_limited_to_reachable_zones() {
        let prior = [zone(&[0, 1, 2]), zone(&[4, 5, 6])];
        let current = [zone(&[0]), zone(&[2, 3, 4]), zone(&[6])];

        // Resident only in the first prior zone: current zone 2 is out of reach
        let response = respond(&TaxonKind::Allopatric, &prior, &current, &[0]);
        assert_eq!(response.range, BTreeSet::from([0]));
        assert_eq!(response.offspring, vec![BTreeSet::from([1])]);
    }

    #[test]
    fn test_event_dispersal_and_reach() {
        let prior = [zone(&[0, 1]), zone(&[3, 4])];
        let current = [zone(&[0, 1, 2, 3, 4])];
        let groups = classify_zones(&prior, &current);
        let range = BTreeSet::from([1]);
        let event = ConnectivityEvent::new(5.0, &range, groups.iter().collect());

        assert_eq!(
            event.dispersals,
            vec![ZoneDispersal {
                prior: 1,
                connectivity: ConnectivityType::ManyToOne,
                reachable: vec![(0, 2)],
            }]
        );
        assert_eq!(event.reachable, vec![(0, 2)]);
        assert!(!event.is_split());
        assert!(event.allows(0));
        assert!(!event.allows(1));
    }

    #[test]
    fn test_range_over_separate_groups_relocates_zone_by_zone() {
        // Two one-to-one groups must not read as many-to-many
        let prior = [zone(&[0]), zone(&[4])];
        let current = [zone(&[0]), zone(&[4])];

        let response = respond(&TaxonKind::Allopatric, &prior, &current, &[0, 1]);
        assert_eq!(response, LineageResponse::relocate(BTreeSet::from([0, 1])));

        let groups = classify_zones(&prior, &current);
        let range = BTreeSet::from([0, 1]);
        let event = ConnectivityEvent::new(1.0, &range, groups.iter().collect());
        assert_eq!(event.dispersals.len(), 2);
        assert!(event
            .dispersals
            .iter()
            .all(|d| d.connectivity == ConnectivityType::OneToOne));
    }

    #[test]
    fn test_range_keeps_zones_when_one_of_them_splits() {
        let prior = [zone(&[0, 1, 2]), zone(&[6, 7])];
        let current = [zone(&[0]), zone(&[2]), zone(&[6, 7])];

        let response = respond(&TaxonKind::Allopatric, &prior, &current, &[0, 1]);
        assert_eq!(response.range, BTreeSet::from([0, 2]));
        assert_eq!(response.offspring, vec![BTreeSet::from([1])]);
    }

    #[test]
    fn test_range_loses_vanished_zone_without_extinction() {
        let prior = [zone(&[0]), zone(&[4])];
        let current = [zone(&[4])];

        let response = respond(&TaxonKind::Allopatric, &prior, &current, &[0, 1]);
        assert_eq!(response, LineageResponse::relocate(BTreeSet::from([0])));
    }

    #[test]
    fn test_merged_range_is_not_a_split() {
        // Both prior zones of the range flow into one current zone
        let prior = [zone(&[0, 1]), zone(&[3, 4])];
        let current = [zone(&[0, 1, 2, 3, 4])];

        let response = respond(&TaxonKind::Allopatric, &prior, &current, &[0, 1]);
        assert_eq!(response, LineageResponse::relocate(BTreeSet::from([0])));
    }

    struct Vanish;

    impl TaxonStrategy for Vanish {
        fn name(&self) -> &str {
            "vanish"
        }

        fn respond(&self, _event: &ConnectivityEvent<'_>) -> LineageResponse {
            LineageResponse::extinction()
        }
    }

    #[test]
    fn test_custom_strategy() {
        let kind = TaxonKind::Custom(Arc::new(Vanish));
        assert_eq!(kind.tag(), "vanish");
        assert_eq!(format!("{:?}", kind), "Custom(vanish)");

        let response = respond(&kind, &[zone(&[0])], &[zone(&[0])], &[0]);
        assert!(response.is_extinction());
    }

    #[test]
    fn test_taxon_lifespan() {
        let mut taxon = Taxon::new(TaxonKind::Allopatric, ControllerId(0), [2, 0]);
        assert_eq!(taxon.range(), &BTreeSet::from([0, 2]));
        assert!(taxon.id().is_none());

        taxon.t_first = 1.0;
        taxon.t_final = Some(3.0);
        assert!(!taxon.is_extant());
        assert!(!taxon.exists_at(0.5));
        assert!(taxon.exists_at(1.0));
        assert!(taxon.exists_at(3.0));
        assert!(!taxon.exists_at(3.5));
    }
}
