//! Append-only, step-indexed record tables.

use crate::error::{Error, Result};
use crate::types::TaxonId;
use serde::{Deserialize, Serialize};

/// A row that belongs to a step of the simulation
pub trait StepRow {
    fn step(&self) -> u64;
}

/// Aggregate lineage state at the end of a step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvolutionRow {
    pub step: u64,
    pub time: f64,
    /// Extant taxa after the step
    pub taxa: usize,
    /// Child taxa created during the step
    pub speciations: usize,
    /// Taxa that went extinct during the step
    pub extinctions: usize,
}

impl StepRow for EvolutionRow {
    fn step(&self) -> u64 {
        self.step
    }
}

/// Zone statistics of one controller for a step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneRow {
    pub step: u64,
    pub time: f64,
    pub zones: usize,
    /// Sum of `C - 1` over one-to-many groups
    pub fragmentations: usize,
    /// Sum of `P - 1` over many-to-one groups
    pub captures: usize,
}

impl StepRow for ZoneRow {
    fn step(&self) -> u64 {
        self.step
    }
}

/// One line of the taxon metadata table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxonRow {
    pub id: TaxonId,
    pub parent: Option<TaxonId>,
    /// Type tag of the taxon kind
    pub kind: String,
    pub t_first: f64,
    pub t_final: Option<f64>,
}

/// An ordered table that only grows.
///
/// Rows must arrive with consecutive step indices; the first row may start at any step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Record<R> {
    rows: Vec<R>,
}

impl<R> Default for Record<R> {
    fn default() -> Self {
        Self { rows: Vec::new() }
    }
}

impl<R: StepRow> Record<R> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Step index the next row must carry, if any row exists yet
    pub fn next_step(&self) -> Option<u64> {
        self.rows.last().map(|row| row.step() + 1)
    }

    pub fn push(&mut self, row: R) -> Result<()> {
        if let Some(expected) = self.next_step() {
            if row.step() != expected {
                return Err(Error::RecordOrder {
                    expected,
                    actual: row.step(),
                });
            }
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn rows(&self) -> &[R] {
        &self.rows
    }

    pub fn iter(&self) -> impl Iterator<Item = &R> + '_ {
        self.rows.iter()
    }

    pub fn last(&self) -> Option<&R> {
        self.rows.last()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Everything an evolver has recorded, in exportable form
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordSnapshot {
    pub evolution: Record<EvolutionRow>,
    /// Zone record of each controller, indexed by controller id
    pub zones: Vec<Record<ZoneRow>>,
    pub taxa: Vec<TaxonRow>,
}

impl RecordSnapshot {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Serialize the snapshot to bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    /// Deserialize a snapshot from bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(step: u64) -> EvolutionRow {
        EvolutionRow {
            step,
            time: step as f64 * 10.0,
            taxa: 2,
            speciations: 0,
            extinctions: 0,
        }
    }

    #[test]
    fn test_record_accepts_consecutive_steps() {
        let mut record = Record::new();
        assert!(record.is_empty());
        assert_eq!(record.next_step(), None);

        record.push(row(1)).unwrap();
        record.push(row(2)).unwrap();
        assert_eq!(record.len(), 2);
        assert_eq!(record.next_step(), Some(3));
        assert_eq!(record.last().map(|r| r.step), Some(2));
    }

    #[test]
    fn test_record_rejects_gaps_and_repeats() {
        let mut record = Record::new();
        record.push(row(1)).unwrap();

        let err = record.push(row(3)).unwrap_err();
        assert!(matches!(err, Error::RecordOrder { expected: 2, actual: 3 }));
        assert!(record.push(row(1)).is_err());
        assert_eq!(record.len(), 1);
    }

    #[test]
    fn test_snapshot_export() {
        let mut evolution = Record::new();
        evolution.push(row(1)).unwrap();
        let mut zones = Record::new();
        zones
            .push(ZoneRow {
                step: 1,
                time: 10.0,
                zones: 1,
                fragmentations: 0,
                captures: 1,
            })
            .unwrap();
        let snapshot = RecordSnapshot {
            evolution,
            zones: vec![zones],
            taxa: vec![TaxonRow {
                id: TaxonId(0),
                parent: None,
                kind: "allopatric".to_string(),
                t_first: 0.0,
                t_final: None,
            }],
        };

        let bytes = snapshot.to_bytes().unwrap();
        let restored = RecordSnapshot::from_bytes(&bytes).unwrap();
        assert_eq!(restored.evolution.rows(), snapshot.evolution.rows());
        assert_eq!(restored.zones[0].rows()[0].captures, 1);

        let json = snapshot.to_json().unwrap();
        assert!(json.contains("\"captures\": 1"));
        let restored = RecordSnapshot::from_json(&json).unwrap();
        assert_eq!(restored.taxa, snapshot.taxa);
    }
}
