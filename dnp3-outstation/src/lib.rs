//! Outstation module for the DNP3 protocol
//!
//! An outstation keeps a point database, turns qualifying changes into buffered events
//! and answers a master's requests: static and event reads, select-before-operate and
//! direct controls, time synchronization, restarts and unsolicited reporting.

pub mod application;
pub mod config;
pub mod control;
pub mod database;
pub mod error;
pub mod outstation;
mod session;

pub use application::{
    ApplicationIin, NullApplication, OutstationApplication, OutstationInformation, RestartDelay,
};
pub use config::{EventBufferConfig, EventRemoval, Features, OutstationConfig, PointConfig};
pub use control::{AcceptAllControls, ControlHandler, OperateType};
pub use database::{Database, DatabaseHandle, Event, EventBuffer, Point, UpdateMode};
pub use error::{DatabaseError, EventError, OutstationError};
pub use outstation::Outstation;
