//! Evolver: the taxa registry that advances lineages with their zones.

use crate::controller::{PendingStep, ZoneController};
use crate::grid::{FieldStore, GridAdjacency, RICHNESS_FIELD};
use crate::taxon::{ConnectivityEvent, LineageResponse, Taxon, TaxonKind};
use crate::zone::Zone;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use tracing::{debug, info, instrument, warn};
use zonal_core::{
    ControllerId, Error, EvolutionRow, Record, RecordSnapshot, Result, TaxonId, TaxonRow, ZoneRow,
};

/// Filters for [`Evolver::get_extant`]; every supplied filter must match.
#[derive(Debug, Clone, Default)]
pub struct TaxonQuery {
    /// Taxa that existed at this time, extinction time included.
    /// When absent only currently extant taxa match.
    pub time: Option<f64>,
    pub ids: Option<BTreeSet<TaxonId>>,
    /// Taxa descended from this one, through any number of generations
    pub ancestor: Option<TaxonId>,
}

impl TaxonQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn at_time(mut self, time: f64) -> Self {
        self.time = Some(time);
        self
    }

    pub fn with_ids(mut self, ids: impl IntoIterator<Item = TaxonId>) -> Self {
        self.ids = Some(ids.into_iter().collect());
        self
    }

    pub fn descended_from(mut self, ancestor: TaxonId) -> Self {
        self.ancestor = Some(ancestor);
        self
    }
}

/// Tracks taxa across the zone controllers registered with it.
///
/// Each step is applied all-or-nothing: if any controller or taxon fails,
/// registry, controllers and records stay as of the last completed step.
pub struct Evolver<G: ?Sized> {
    controllers: Vec<ZoneController<G>>,
    /// Every taxon ever tracked, extinct ones included
    taxa: BTreeMap<TaxonId, Taxon>,
    next_id: TaxonId,
    record: Record<EvolutionRow>,
    step: u64,
    time: f64,
}

impl<G: GridAdjacency + ?Sized> Default for Evolver<G> {
    fn default() -> Self {
        Self::new()
    }
}

impl<G: GridAdjacency + ?Sized> Evolver<G> {
    pub fn new() -> Self {
        Self::with_initial_time(0.0)
    }

    pub fn with_initial_time(time: f64) -> Self {
        Self {
            controllers: Vec::new(),
            taxa: BTreeMap::new(),
            next_id: TaxonId(0),
            record: Record::new(),
            step: 0,
            time,
        }
    }

    /// Register a controller; its taxa are advanced on every step from now on
    pub fn add_controller(&mut self, controller: ZoneController<G>) -> ControllerId {
        self.controllers.push(controller);
        let id = ControllerId(self.controllers.len() - 1);
        debug!(controller = %id, zones = self.controllers[id.0].zones().len(), "Registered zone controller");
        id
    }

    pub fn controller(&self, id: ControllerId) -> Result<&ZoneController<G>> {
        self.controllers.get(id.0).ok_or(Error::UnknownController(id))
    }

    pub fn controllers(&self) -> &[ZoneController<G>] {
        &self.controllers
    }

    /// Current zones of a controller
    pub fn zones(&self, id: ControllerId) -> Result<&[Zone]> {
        Ok(self.controller(id)?.zones())
    }

    pub fn zone_record(&self, id: ControllerId) -> Result<&Record<ZoneRow>> {
        Ok(self.controller(id)?.record())
    }

    pub fn record(&self) -> &Record<EvolutionRow> {
        &self.record
    }

    /// Number of completed steps
    pub fn step(&self) -> u64 {
        self.step
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    /// Admit taxa into tracking and assign their identifiers in order.
    ///
    /// The batch is rejected as a whole if any taxon is already tracked, names
    /// an unknown parent, or is not resident in existing zones of a registered controller.
    pub fn introduce(&mut self, taxa: Vec<Taxon>) -> Result<Vec<TaxonId>> {
        for taxon in &taxa {
            if let Some(id) = taxon.id {
                return Err(Error::AlreadyTracked(id));
            }
            if let Some(parent) = taxon.parent {
                if !self.taxa.contains_key(&parent) {
                    return Err(Error::UnknownParent(parent));
                }
            }
            let zones = self.zones(taxon.controller)?;
            if taxon.range.is_empty() {
                return Err(Error::Configuration(
                    "an introduced taxon must inhabit at least one zone".to_string(),
                ));
            }
            if let Some(&zone) = taxon.range.iter().find(|&&zone| zone >= zones.len()) {
                return Err(Error::UnknownZone {
                    controller: taxon.controller,
                    zone,
                });
            }
        }

        let mut ids = Vec::with_capacity(taxa.len());
        for mut taxon in taxa {
            let id = self.allocate_id();
            taxon.id = Some(id);
            taxon.t_first = self.time;
            taxon.t_final = None;
            debug!(
                taxon = %id,
                parent = ?taxon.parent,
                kind = taxon.kind.tag(),
                controller = %taxon.controller,
                "Introduced taxon"
            );
            self.taxa.insert(id, taxon);
            ids.push(id);
        }

        Ok(ids)
    }

    /// Introduce `count` founder taxa of `kind` into every current zone of a controller
    pub fn populate_zones_uniformly(
        &mut self,
        controller: ControllerId,
        count: usize,
        kind: TaxonKind,
    ) -> Result<Vec<TaxonId>> {
        let zone_count = self.zones(controller)?.len();
        let founders = (0..zone_count)
            .flat_map(|zone| (0..count).map(move |_| zone))
            .map(|zone| Taxon::new(kind.clone(), controller, [zone]))
            .collect();
        self.introduce(founders)
    }

    /// Advance every controller and every extant taxon by one step
    #[instrument(skip(self, grid), fields(step = self.step + 1))]
    pub fn run_one_step(&mut self, grid: &G, dt: f64) -> Result<EvolutionRow> {
        if !(dt >= 0.0) {
            return Err(Error::Configuration(format!("dt must be non-negative, got {}", dt)));
        }
        let step = self.step + 1;
        let time = self.time + dt;

        for controller in &self.controllers {
            if let Some(expected) = controller.record().next_step() {
                if expected != step {
                    return Err(Error::RecordOrder { expected, actual: step });
                }
            }
        }

        // Phase 1: new zones and their connectivity, nothing applied yet
        let mut pending = Vec::with_capacity(self.controllers.len());
        for controller in &mut self.controllers {
            pending.push(controller.prepare_step(grid)?);
        }

        // Phase 2: every extant taxon's response, validated
        let responses = self.resolve_responses(&pending, time)?;

        let extant_before = self.extant_count();
        let extinctions = responses.iter().filter(|(_, r)| r.is_extinction()).count();
        let speciations = responses.iter().map(|(_, r)| r.offspring.len()).sum::<usize>();
        let row = EvolutionRow {
            step,
            time,
            taxa: extant_before - extinctions + speciations,
            speciations,
            extinctions,
        };

        // Phase 3: commit
        self.record.push(row.clone())?;
        let mut zone_counts = Vec::with_capacity(pending.len());
        for (controller, pending) in self.controllers.iter_mut().zip(pending) {
            zone_counts.push(controller.commit_step(pending, step, time)?);
        }
        for (id, response) in responses {
            self.apply_response(id, response, time);
        }
        self.step = step;
        self.time = time;

        let zones: usize = zone_counts.iter().map(|s| s.zones).sum();
        let fragmentations: usize = zone_counts.iter().map(|s| s.fragmentations).sum();
        let captures: usize = zone_counts.iter().map(|s| s.captures).sum();
        info!(
            event = "step_complete",
            step,
            time,
            extant_taxa = row.taxa,
            speciations,
            extinctions,
            zones,
            fragmentations,
            captures,
            "Step complete"
        );
        if row.taxa == 0 && extant_before > 0 {
            warn!(step, time, "All taxa are extinct");
        }

        Ok(row)
    }

    fn resolve_responses(
        &self,
        pending: &[PendingStep],
        time: f64,
    ) -> Result<Vec<(TaxonId, LineageResponse)>> {
        let mut responses = Vec::new();

        for (&id, taxon) in self.taxa.iter().filter(|(_, t)| t.is_extant()) {
            let Some(step) = pending.get(taxon.controller.0) else {
                return Err(Error::UnknownController(taxon.controller));
            };
            let event = ConnectivityEvent::new(time, &taxon.range, step.groups_for(&taxon.range));
            let mut response = taxon.kind.respond(&event);
            response.offspring.retain(|range| !range.is_empty());

            let proposed = response.range.iter().chain(response.offspring.iter().flatten());
            for &zone in proposed {
                if !event.allows(zone) {
                    return Err(Error::InvalidResponse { taxon: id, zone });
                }
            }

            responses.push((id, response));
        }

        Ok(responses)
    }

    fn apply_response(&mut self, id: TaxonId, response: LineageResponse, time: f64) {
        let Some(taxon) = self.taxa.get_mut(&id) else {
            return;
        };

        if response.is_extinction() {
            taxon.range.clear();
            taxon.t_final = Some(time);
            debug!(event = "extinction", taxon = %id, time, "Taxon went extinct");
        } else {
            taxon.range = response.range;
        }

        let kind = taxon.kind.clone();
        let controller = taxon.controller;
        for range in response.offspring {
            let child_id = self.allocate_id();
            let mut child = Taxon::new(kind.clone(), controller, range).with_parent(id);
            child.id = Some(child_id);
            child.t_first = time;
            debug!(
                event = "speciation",
                parent = %id,
                child = %child_id,
                zones = ?child.range,
                time,
                "Taxon speciated"
            );
            self.taxa.insert(child_id, child);
        }
    }

    fn allocate_id(&mut self) -> TaxonId {
        let id = self.next_id;
        self.next_id = id.next();
        id
    }

    pub fn taxon(&self, id: TaxonId) -> Option<&Taxon> {
        self.taxa.get(&id)
    }

    pub fn extant_count(&self) -> usize {
        self.taxa.values().filter(|t| t.is_extant()).count()
    }

    /// Taxa matching every filter of the query, by ascending identifier.
    ///
    /// Unknown identifiers or ancestors simply match nothing.
    pub fn get_extant(&self, query: &TaxonQuery) -> Vec<&Taxon> {
        self.taxa
            .iter()
            .filter(|(_, taxon)| match query.time {
                Some(time) => taxon.exists_at(time),
                None => taxon.is_extant(),
            })
            .filter(|(id, _)| query.ids.as_ref().map_or(true, |ids| ids.contains(*id)))
            .filter(|(_, taxon)| {
                query
                    .ancestor
                    .map_or(true, |ancestor| self.descends_from(taxon, ancestor))
            })
            .map(|(_, taxon)| taxon)
            .collect()
    }

    fn descends_from(&self, taxon: &Taxon, ancestor: TaxonId) -> bool {
        let mut parent = taxon.parent;
        while let Some(id) = parent {
            if id == ancestor {
                return true;
            }
            parent = self.taxa.get(&id).and_then(|t| t.parent);
        }
        false
    }

    /// The taxon metadata table, by ascending identifier
    pub fn taxa_table(&self) -> Vec<TaxonRow> {
        self.taxa.iter().map(|(&id, taxon)| taxon.to_row(id)).collect()
    }

    pub fn snapshot(&self) -> RecordSnapshot {
        RecordSnapshot {
            evolution: self.record.clone(),
            zones: self.controllers.iter().map(|c| c.record().clone()).collect(),
            taxa: self.taxa_table(),
        }
    }

    /// Number of distinct extant taxa whose range covers each node
    pub fn richness(&self, grid: &G) -> Result<Vec<u32>> {
        let geometry = grid.geometry();
        if self.controllers.iter().any(|c| c.geometry() != geometry) {
            return Err(Error::GeometryChanged);
        }

        let mut richness = vec![0u32; grid.node_count()];
        for taxon in self.taxa.values().filter(|t| t.is_extant()) {
            let zones = self.controllers[taxon.controller.0].zones();
            for zone in taxon.range.iter().filter_map(|&z| zones.get(z)) {
                for &node in zone.nodes() {
                    richness[node] += 1;
                }
            }
        }
        Ok(richness)
    }

    /// Write the richness array into the grid's `taxa__richness` field
    pub fn publish_richness(&self, grid: &mut G) -> Result<()>
    where
        G: FieldStore,
    {
        let richness = self.richness(grid)?;
        grid.set_field(RICHNESS_FIELD, richness.into_iter().map(f64::from).collect());
        Ok(())
    }
}

impl<G: ?Sized> fmt::Debug for Evolver<G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Evolver")
            .field("controllers", &self.controllers.len())
            .field("taxa", &self.taxa.len())
            .field("step", &self.step)
            .field("time", &self.time)
            .finish()
    }
}
