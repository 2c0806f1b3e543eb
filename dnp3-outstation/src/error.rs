//! Outstation error types

use dnp3_application::Variation;
use dnp3_core::PointType;
use thiserror::Error;

/// Errors of the point database
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseError {
    #[error("{point_type} {index} already exists")]
    DuplicatePoint { point_type: PointType, index: u16 },

    #[error("{point_type} {index} does not exist")]
    UnknownPoint { point_type: PointType, index: u16 },

    #[error("{variation} cannot report {point_type} points")]
    InvalidVariation {
        point_type: PointType,
        variation: Variation,
    },
}

/// Errors of the event buffer
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventError {
    #[error("Event buffer has no capacity for {0} events")]
    NoCapacity(PointType),
}

/// Errors returned by an outstation handle
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutstationError {
    #[error("Outstation has been shut down")]
    Shutdown,

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}
