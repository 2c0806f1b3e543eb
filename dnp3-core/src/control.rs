//! Control objects and command status codes
//!
//! Binary commands (CROB, group 12) and analog output commands (group 41) as seen by
//! both the master issuing them and the outstation arbitrating them.

use crate::measurement::PointType;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Status code returned by the outstation for each control object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CommandStatus {
    /// Command accepted, initiated, or queued
    Success,
    /// Select expired before the operate arrived
    Timeout,
    /// No matching select preceded the operate
    NoSelect,
    /// Error in the request format (bad control code, for example)
    FormatError,
    /// Operation not supported for this point
    NotSupported,
    /// Operation already in progress
    AlreadyActive,
    HardwareError,
    /// Outstation is in local control mode
    Local,
    /// Too many objects in the request
    TooManyOps,
    NotAuthorized,
    AutomationInhibit,
    ProcessingLimited,
    OutOfRange,
    DownstreamLocal,
    AlreadyComplete,
    Blocked,
    Canceled,
    BlockedOtherMaster,
    DownstreamFail,
    NonParticipating,
    /// Any value not defined above
    Unknown(u8),
}

impl CommandStatus {
    #[must_use]
    pub const fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Success,
            1 => Self::Timeout,
            2 => Self::NoSelect,
            3 => Self::FormatError,
            4 => Self::NotSupported,
            5 => Self::AlreadyActive,
            6 => Self::HardwareError,
            7 => Self::Local,
            8 => Self::TooManyOps,
            9 => Self::NotAuthorized,
            10 => Self::AutomationInhibit,
            11 => Self::ProcessingLimited,
            12 => Self::OutOfRange,
            13 => Self::DownstreamLocal,
            14 => Self::AlreadyComplete,
            15 => Self::Blocked,
            16 => Self::Canceled,
            17 => Self::BlockedOtherMaster,
            18 => Self::DownstreamFail,
            126 => Self::NonParticipating,
            x => Self::Unknown(x),
        }
    }

    #[must_use]
    pub const fn as_u8(&self) -> u8 {
        match self {
            Self::Success => 0,
            Self::Timeout => 1,
            Self::NoSelect => 2,
            Self::FormatError => 3,
            Self::NotSupported => 4,
            Self::AlreadyActive => 5,
            Self::HardwareError => 6,
            Self::Local => 7,
            Self::TooManyOps => 8,
            Self::NotAuthorized => 9,
            Self::AutomationInhibit => 10,
            Self::ProcessingLimited => 11,
            Self::OutOfRange => 12,
            Self::DownstreamLocal => 13,
            Self::AlreadyComplete => 14,
            Self::Blocked => 15,
            Self::Canceled => 16,
            Self::BlockedOtherMaster => 17,
            Self::DownstreamFail => 18,
            Self::NonParticipating => 126,
            Self::Unknown(x) => *x,
        }
    }

    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

impl fmt::Display for CommandStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown(x) => write!(f, "Unknown({})", x),
            other => write!(f, "{:?}", other),
        }
    }
}

/// Trip/close pairing in the top two bits of a control code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TripCloseCode {
    Nul,
    Close,
    Trip,
    Reserved,
}

impl TripCloseCode {
    #[must_use]
    pub const fn from_u8(value: u8) -> Self {
        match value & 0x03 {
            0 => Self::Nul,
            1 => Self::Close,
            2 => Self::Trip,
            _ => Self::Reserved,
        }
    }

    #[must_use]
    pub const fn as_u8(&self) -> u8 {
        match self {
            Self::Nul => 0,
            Self::Close => 1,
            Self::Trip => 2,
            Self::Reserved => 3,
        }
    }
}

/// Operation type in the low four bits of a control code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OpType {
    Nul,
    PulseOn,
    PulseOff,
    LatchOn,
    LatchOff,
    Unknown(u8),
}

impl OpType {
    #[must_use]
    pub const fn from_u8(value: u8) -> Self {
        match value & 0x0F {
            0 => Self::Nul,
            1 => Self::PulseOn,
            2 => Self::PulseOff,
            3 => Self::LatchOn,
            4 => Self::LatchOff,
            x => Self::Unknown(x),
        }
    }

    #[must_use]
    pub const fn as_u8(&self) -> u8 {
        match self {
            Self::Nul => 0,
            Self::PulseOn => 1,
            Self::PulseOff => 2,
            Self::LatchOn => 3,
            Self::LatchOff => 4,
            Self::Unknown(x) => *x & 0x0F,
        }
    }
}

/// Control code byte of a CROB
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ControlCode {
    pub tcc: TripCloseCode,
    pub clear: bool,
    pub queue: bool,
    pub op_type: OpType,
}

impl ControlCode {
    #[must_use]
    pub const fn from_op_type(op_type: OpType) -> Self {
        Self {
            tcc: TripCloseCode::Nul,
            clear: false,
            queue: false,
            op_type,
        }
    }

    #[must_use]
    pub const fn from_u8(value: u8) -> Self {
        Self {
            tcc: TripCloseCode::from_u8(value >> 6),
            clear: value & 0x20 != 0,
            queue: value & 0x10 != 0,
            op_type: OpType::from_u8(value),
        }
    }

    #[must_use]
    pub const fn as_u8(&self) -> u8 {
        let mut value = self.tcc.as_u8() << 6;
        if self.clear {
            value |= 0x20;
        }
        if self.queue {
            value |= 0x10;
        }
        value | self.op_type.as_u8()
    }
}

/// Control relay output block (group 12 variation 1) without its status byte
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Crob {
    pub code: ControlCode,
    pub count: u8,
    pub on_time: u32,
    pub off_time: u32,
}

impl Crob {
    #[must_use]
    pub const fn new(code: ControlCode, count: u8, on_time: u32, off_time: u32) -> Self {
        Self {
            code,
            count,
            on_time,
            off_time,
        }
    }

    /// Single latch/pulse with no timing, the common case
    #[must_use]
    pub const fn from_op_type(op_type: OpType) -> Self {
        Self::new(ControlCode::from_op_type(op_type), 1, 0, 0)
    }

    /// Persistent output state this command leaves behind, if any
    ///
    /// Trip/close pairs and latches map to a state. Plain pulses return to their
    /// previous state and yield `None`.
    #[must_use]
    pub const fn commanded_state(&self) -> Option<bool> {
        match self.code.tcc {
            TripCloseCode::Close => return Some(true),
            TripCloseCode::Trip => return Some(false),
            TripCloseCode::Nul | TripCloseCode::Reserved => {}
        }
        match self.code.op_type {
            OpType::LatchOn => Some(true),
            OpType::LatchOff => Some(false),
            _ => None,
        }
    }

    /// Structurally valid: known op type and no reserved trip/close code
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        !matches!(self.code.op_type, OpType::Unknown(_))
            && !matches!(self.code.tcc, TripCloseCode::Reserved)
    }
}

/// Analog output command value (group 41), tagged by wire representation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum AnalogOutput {
    I32(i32),
    I16(i16),
    F32(f32),
    F64(f64),
}

impl AnalogOutput {
    #[must_use]
    pub fn value(&self) -> f64 {
        match self {
            Self::I32(x) => f64::from(*x),
            Self::I16(x) => f64::from(*x),
            Self::F32(x) => f64::from(*x),
            Self::F64(x) => *x,
        }
    }

    /// Bitwise equality, so NaN compares equal to an identical NaN
    #[must_use]
    pub fn same_as(&self, other: &AnalogOutput) -> bool {
        match (self, other) {
            (Self::I32(a), Self::I32(b)) => a == b,
            (Self::I16(a), Self::I16(b)) => a == b,
            (Self::F32(a), Self::F32(b)) => a.to_bits() == b.to_bits(),
            (Self::F64(a), Self::F64(b)) => a.to_bits() == b.to_bits(),
            _ => false,
        }
    }
}

/// A single control object, binary or analog
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Control {
    Crob(Crob),
    AnalogOutput(AnalogOutput),
}

impl Control {
    /// Point type whose status reflects the result of this control
    #[must_use]
    pub const fn feedback_type(&self) -> PointType {
        match self {
            Self::Crob(_) => PointType::BinaryOutputStatus,
            Self::AnalogOutput(_) => PointType::AnalogOutputStatus,
        }
    }

    /// True if both controls carry the same parameters
    #[must_use]
    pub fn same_parameters(&self, other: &Control) -> bool {
        match (self, other) {
            (Self::Crob(a), Self::Crob(b)) => a == b,
            (Self::AnalogOutput(a), Self::AnalogOutput(b)) => a.same_as(b),
            _ => false,
        }
    }

    #[must_use]
    pub const fn is_valid(&self) -> bool {
        match self {
            Self::Crob(x) => x.is_valid(),
            Self::AnalogOutput(_) => true,
        }
    }
}

impl From<Crob> for Control {
    fn from(value: Crob) -> Self {
        Self::Crob(value)
    }
}

impl From<AnalogOutput> for Control {
    fn from(value: AnalogOutput) -> Self {
        Self::AnalogOutput(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_status_values() {
        for value in 0..=255u8 {
            assert_eq!(CommandStatus::from_u8(value).as_u8(), value);
        }
        assert_eq!(CommandStatus::from_u8(2), CommandStatus::NoSelect);
        assert_eq!(CommandStatus::from_u8(126), CommandStatus::NonParticipating);
        assert_eq!(CommandStatus::from_u8(99), CommandStatus::Unknown(99));
    }

    #[test]
    fn test_control_code_byte() {
        let code = ControlCode {
            tcc: TripCloseCode::Trip,
            clear: true,
            queue: false,
            op_type: OpType::PulseOn,
        };
        assert_eq!(code.as_u8(), 0xA1);
        assert_eq!(ControlCode::from_u8(0xA1), code);
        assert_eq!(ControlCode::from_u8(0x03).op_type, OpType::LatchOn);
        assert_eq!(ControlCode::from_u8(0x07).op_type, OpType::Unknown(7));
    }

    #[test]
    fn test_commanded_state() {
        assert_eq!(Crob::from_op_type(OpType::LatchOn).commanded_state(), Some(true));
        assert_eq!(Crob::from_op_type(OpType::LatchOff).commanded_state(), Some(false));
        assert_eq!(Crob::from_op_type(OpType::PulseOn).commanded_state(), None);
        let trip = Crob::new(ControlCode::from_u8(0x81), 1, 100, 100);
        assert_eq!(trip.commanded_state(), Some(false));
    }

    #[test]
    fn test_control_validity() {
        assert!(Control::from(Crob::from_op_type(OpType::LatchOn)).is_valid());
        assert!(!Control::from(Crob::new(ControlCode::from_u8(0x09), 1, 0, 0)).is_valid());
        assert!(!Control::from(Crob::new(ControlCode::from_u8(0xC3), 1, 0, 0)).is_valid());
    }

    #[test]
    fn test_same_parameters() {
        let a = Control::from(AnalogOutput::F32(1.5));
        assert!(a.same_parameters(&Control::from(AnalogOutput::F32(1.5))));
        assert!(!a.same_parameters(&Control::from(AnalogOutput::F64(1.5))));
        let latch = Control::from(Crob::from_op_type(OpType::LatchOn));
        assert!(!latch.same_parameters(&Control::from(Crob::from_op_type(OpType::LatchOff))));
    }
}
