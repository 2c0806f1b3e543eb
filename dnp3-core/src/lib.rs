//! Core types and utilities for the DNP3 protocol
//!
//! This crate provides fundamental types, error handling, and utilities
//! shared by the application layer, master and outstation crates:
//! measurements and their quality flags, timestamps, internal indications,
//! event classes and control enumerations.

pub mod address;
pub mod class;
pub mod control;
pub mod error;
pub mod flags;
pub mod iin;
pub mod measurement;
pub mod time;

pub use address::EndpointAddress;
pub use class::{Classes, EventClass, EventClasses};
pub use control::{
    AnalogOutput, CommandStatus, Control, ControlCode, Crob, OpType, TripCloseCode,
};
pub use error::{Dnp3Error, Dnp3Result};
pub use flags::Flags;
pub use iin::{Iin, Iin1, Iin2};
pub use measurement::{
    AnalogInput, AnalogOutputStatus, BinaryInput, BinaryOutputStatus, Counter, DoubleBit,
    DoubleBitBinaryInput, FrozenCounter, Measurement, PointType,
};
pub use time::{Time, Timestamp};
