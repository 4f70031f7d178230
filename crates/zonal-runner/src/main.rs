//! Command-line driver: evolves taxa in a climate band over synthetic terrain.
//!
//! Usage: `zonal-runner [config.json]`. Without a path the default run
//! configuration is used.

mod climate;
mod telemetry;

use anyhow::{Context, Result};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::fs;
use tracing::{info, warn};
use zonal_core::{RecordSummary, RunConfig};
use zonal_world::{Evolver, RasterGrid, TaxonKind, TaxonQuery, ZoneController};

fn load_config(path: Option<&str>) -> Result<RunConfig> {
    let config = match path {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("reading run config {path}"))?;
            serde_json::from_str(&text).with_context(|| format!("parsing run config {path}"))?
        }
        None => RunConfig::default(),
    };
    config.validate()?;
    Ok(config)
}

fn main() -> Result<()> {
    let path = std::env::args().nth(1);
    let config = load_config(path.as_deref())?;

    telemetry::init_telemetry(config.json_logs)?;

    info!(
        rows = config.grid.rows,
        cols = config.grid.cols,
        steps = config.num_steps,
        dt = config.dt,
        seed = config.seed,
        "Starting zonal run"
    );

    let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
    let mut grid = RasterGrid::from_config(&config.grid)?;
    climate::generate_terrain(&mut grid, config.climate.relief, &mut rng);
    climate::update_temperature(&mut grid, &config.climate, 0.0);

    let band = config.climate.clone();
    let provider = move |grid: &RasterGrid| climate::habitable_mask(grid, &band);
    let controller = ZoneController::new(&grid, provider, config.controller.clone())?;

    let mut evolver = Evolver::new();
    let habitat = evolver.add_controller(controller);
    let founders =
        evolver.populate_zones_uniformly(habitat, config.founders_per_zone, TaxonKind::Allopatric)?;
    info!(
        zones = evolver.zones(habitat)?.len(),
        founders = founders.len(),
        "Introduced founder taxa"
    );
    if founders.is_empty() {
        warn!("No habitable zones at start, nothing will evolve");
    }

    let mut summary = RecordSummary::new();
    for _ in 0..config.num_steps {
        let time = evolver.time() + config.dt;
        climate::update_temperature(&mut grid, &config.climate, time);

        let row = evolver.run_one_step(&grid, config.dt)?;
        summary.update(&row);

        if config.log_interval > 0 && row.step % config.log_interval == 0 {
            let zones = evolver.zone_record(habitat)?.last().cloned();
            crate::record_gauge!("taxa_extant", row.taxa, step = row.step, time = row.time);
            crate::record_gauge!(
                "zones",
                zones.as_ref().map_or(0, |z| z.zones),
                step = row.step,
                fragmentations = zones.as_ref().map_or(0, |z| z.fragmentations),
                captures = zones.as_ref().map_or(0, |z| z.captures)
            );
            info!(
                step = row.step,
                time = row.time,
                taxa = row.taxa,
                speciations = summary.total_speciations,
                extinctions = summary.total_extinctions,
                "Population snapshot"
            );
        }
    }

    evolver.publish_richness(&mut grid)?;

    let surviving_founders = founders
        .iter()
        .filter(|&&id| {
            !evolver
                .get_extant(&TaxonQuery::new().descended_from(id))
                .is_empty()
                || evolver.taxon(id).is_some_and(|taxon| taxon.is_extant())
        })
        .count();

    info!(
        steps = summary.steps,
        final_time = summary.final_time,
        final_taxa = summary.final_taxa,
        peak_taxa = summary.peak_taxa,
        peak_step = summary.peak_step,
        speciations = summary.total_speciations,
        extinctions = summary.total_extinctions,
        turnover = summary.turnover_ratio().unwrap_or(0.0),
        surviving_founders,
        "Episode summary"
    );

    if let Some(output) = &config.output_path {
        let json = evolver.snapshot().to_json()?;
        fs::write(output, json).with_context(|| format!("writing snapshot {output}"))?;
        info!(path = %output, "Wrote record snapshot");
    }

    Ok(())
}
