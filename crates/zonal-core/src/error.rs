//! Error types for the zone engine.

use crate::types::{ControllerId, TaxonId};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("Taxon is already tracked as {0}")]
    AlreadyTracked(TaxonId),

    #[error("Unknown parent taxon: {0}")]
    UnknownParent(TaxonId),

    #[error("Unknown zone controller: {0}")]
    UnknownController(ControllerId),

    #[error("Zone {zone} does not exist in controller {controller}")]
    UnknownZone { controller: ControllerId, zone: usize },

    #[error("Mask has {actual} values but the grid has {expected} nodes")]
    MaskSize { expected: usize, actual: usize },

    #[error("Grid geometry changed since the last step")]
    GeometryChanged,

    #[error("Taxon {taxon} responded with zone {zone}, outside its connectivity groups")]
    InvalidResponse { taxon: TaxonId, zone: usize },

    #[error("Record row out of order: expected step {expected}, got {actual}")]
    RecordOrder { expected: u64, actual: u64 },

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// The broad class an [`Error`] falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Rejected input; nothing was mutated.
    Configuration,
    /// The step could not be applied; state is as of the last completed step.
    Consistency,
    Serialization,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Configuration(_)
            | Error::AlreadyTracked(_)
            | Error::UnknownParent(_)
            | Error::UnknownController(_)
            | Error::UnknownZone { .. } => ErrorKind::Configuration,
            Error::MaskSize { .. }
            | Error::GeometryChanged
            | Error::InvalidResponse { .. }
            | Error::RecordOrder { .. } => ErrorKind::Consistency,
            Error::Serialization(_) => ErrorKind::Serialization,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<bincode::Error> for Error {
    fn from(err: bincode::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}
