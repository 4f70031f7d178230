//! Run-level statistics aggregated from the evolution record.

use crate::record::EvolutionRow;
use serde::{Deserialize, Serialize};

/// Totals and extremes over a sequence of evolution rows
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordSummary {
    pub steps: u64,
    pub total_speciations: usize,
    pub total_extinctions: usize,
    pub peak_taxa: usize,
    /// Step at which `peak_taxa` was first reached
    pub peak_step: u64,
    pub final_taxa: usize,
    pub final_time: f64,
}

impl RecordSummary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_rows<'a>(rows: impl IntoIterator<Item = &'a EvolutionRow>) -> Self {
        let mut summary = Self::new();
        for row in rows {
            summary.update(row);
        }
        summary
    }

    /// Fold one more row into the summary
    pub fn update(&mut self, row: &EvolutionRow) {
        self.steps += 1;
        self.total_speciations += row.speciations;
        self.total_extinctions += row.extinctions;
        if row.taxa > self.peak_taxa {
            self.peak_taxa = row.taxa;
            self.peak_step = row.step;
        }
        self.final_taxa = row.taxa;
        self.final_time = row.time;
    }

    /// Speciations per extinction over the run; `None` when nothing went extinct
    pub fn turnover_ratio(&self) -> Option<f64> {
        if self.total_extinctions == 0 {
            None
        } else {
            Some(self.total_speciations as f64 / self.total_extinctions as f64)
        }
    }
}
