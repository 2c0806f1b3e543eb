//! Measurement types
//!
//! Each point type carries a value, quality flags and an optional timestamp. The
//! [`Measurement`] enum is the closed set of all of them and is what the database,
//! the codec and the read handlers pass around.

use crate::flags::Flags;
use crate::time::Time;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of measurement point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PointType {
    BinaryInput,
    DoubleBitBinaryInput,
    BinaryOutputStatus,
    Counter,
    FrozenCounter,
    AnalogInput,
    AnalogOutputStatus,
}

impl PointType {
    /// Every point type, in class 0 reporting order
    pub const ALL: [PointType; 7] = [
        PointType::BinaryInput,
        PointType::DoubleBitBinaryInput,
        PointType::BinaryOutputStatus,
        PointType::Counter,
        PointType::FrozenCounter,
        PointType::AnalogInput,
        PointType::AnalogOutputStatus,
    ];

    /// Counters and analogs support deadbands
    #[must_use]
    pub const fn is_numeric(&self) -> bool {
        matches!(
            self,
            Self::Counter | Self::FrozenCounter | Self::AnalogInput | Self::AnalogOutputStatus
        )
    }
}

impl fmt::Display for PointType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::BinaryInput => "binary input",
            Self::DoubleBitBinaryInput => "double-bit binary input",
            Self::BinaryOutputStatus => "binary output status",
            Self::Counter => "counter",
            Self::FrozenCounter => "frozen counter",
            Self::AnalogInput => "analog input",
            Self::AnalogOutputStatus => "analog output status",
        };
        f.write_str(name)
    }
}

/// Two-bit state of a double-bit binary input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DoubleBit {
    Intermediate,
    DeterminedOff,
    DeterminedOn,
    Indeterminate,
}

impl DoubleBit {
    /// Decode from the two low bits of `value`
    #[must_use]
    pub const fn from_bits(value: u8) -> Self {
        match value & 0x03 {
            0 => Self::Intermediate,
            1 => Self::DeterminedOff,
            2 => Self::DeterminedOn,
            _ => Self::Indeterminate,
        }
    }

    #[must_use]
    pub const fn to_bits(&self) -> u8 {
        match self {
            Self::Intermediate => 0,
            Self::DeterminedOff => 1,
            Self::DeterminedOn => 2,
            Self::Indeterminate => 3,
        }
    }
}

/// Strip the state bit(s) a binary type keeps in the top of the flags byte
const fn quality_bits(flags: u8, state_mask: u8) -> Flags {
    Flags::new(flags & !state_mask)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BinaryInput {
    pub value: bool,
    pub flags: Flags,
    pub time: Option<Time>,
}

impl BinaryInput {
    #[must_use]
    pub const fn new(value: bool, flags: Flags, time: Option<Time>) -> Self {
        Self { value, flags, time }
    }

    /// Decode from a wire flags byte where bit 7 holds the state
    #[must_use]
    pub const fn from_wire(flags: u8, time: Option<Time>) -> Self {
        Self::new(flags & 0x80 != 0, quality_bits(flags, 0x80), time)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DoubleBitBinaryInput {
    pub value: DoubleBit,
    pub flags: Flags,
    pub time: Option<Time>,
}

impl DoubleBitBinaryInput {
    #[must_use]
    pub const fn new(value: DoubleBit, flags: Flags, time: Option<Time>) -> Self {
        Self { value, flags, time }
    }

    /// Decode from a wire flags byte where bits 6 and 7 hold the state
    #[must_use]
    pub const fn from_wire(flags: u8, time: Option<Time>) -> Self {
        Self::new(DoubleBit::from_bits(flags >> 6), quality_bits(flags, 0xC0), time)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BinaryOutputStatus {
    pub value: bool,
    pub flags: Flags,
    pub time: Option<Time>,
}

impl BinaryOutputStatus {
    #[must_use]
    pub const fn new(value: bool, flags: Flags, time: Option<Time>) -> Self {
        Self { value, flags, time }
    }

    #[must_use]
    pub const fn from_wire(flags: u8, time: Option<Time>) -> Self {
        Self::new(flags & 0x80 != 0, quality_bits(flags, 0x80), time)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counter {
    pub value: u32,
    pub flags: Flags,
    pub time: Option<Time>,
}

impl Counter {
    #[must_use]
    pub const fn new(value: u32, flags: Flags, time: Option<Time>) -> Self {
        Self { value, flags, time }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrozenCounter {
    pub value: u32,
    pub flags: Flags,
    pub time: Option<Time>,
}

impl FrozenCounter {
    #[must_use]
    pub const fn new(value: u32, flags: Flags, time: Option<Time>) -> Self {
        Self { value, flags, time }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnalogInput {
    pub value: f64,
    pub flags: Flags,
    pub time: Option<Time>,
}

impl AnalogInput {
    #[must_use]
    pub const fn new(value: f64, flags: Flags, time: Option<Time>) -> Self {
        Self { value, flags, time }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnalogOutputStatus {
    pub value: f64,
    pub flags: Flags,
    pub time: Option<Time>,
}

impl AnalogOutputStatus {
    #[must_use]
    pub const fn new(value: f64, flags: Flags, time: Option<Time>) -> Self {
        Self { value, flags, time }
    }
}

/// Any measurement value
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Measurement {
    BinaryInput(BinaryInput),
    DoubleBitBinaryInput(DoubleBitBinaryInput),
    BinaryOutputStatus(BinaryOutputStatus),
    Counter(Counter),
    FrozenCounter(FrozenCounter),
    AnalogInput(AnalogInput),
    AnalogOutputStatus(AnalogOutputStatus),
}

impl Measurement {
    #[must_use]
    pub const fn point_type(&self) -> PointType {
        match self {
            Self::BinaryInput(_) => PointType::BinaryInput,
            Self::DoubleBitBinaryInput(_) => PointType::DoubleBitBinaryInput,
            Self::BinaryOutputStatus(_) => PointType::BinaryOutputStatus,
            Self::Counter(_) => PointType::Counter,
            Self::FrozenCounter(_) => PointType::FrozenCounter,
            Self::AnalogInput(_) => PointType::AnalogInput,
            Self::AnalogOutputStatus(_) => PointType::AnalogOutputStatus,
        }
    }

    /// Quality flags without any state bits
    #[must_use]
    pub const fn flags(&self) -> Flags {
        match self {
            Self::BinaryInput(x) => x.flags,
            Self::DoubleBitBinaryInput(x) => x.flags,
            Self::BinaryOutputStatus(x) => x.flags,
            Self::Counter(x) => x.flags,
            Self::FrozenCounter(x) => x.flags,
            Self::AnalogInput(x) => x.flags,
            Self::AnalogOutputStatus(x) => x.flags,
        }
    }

    #[must_use]
    pub const fn time(&self) -> Option<Time> {
        match self {
            Self::BinaryInput(x) => x.time,
            Self::DoubleBitBinaryInput(x) => x.time,
            Self::BinaryOutputStatus(x) => x.time,
            Self::Counter(x) => x.time,
            Self::FrozenCounter(x) => x.time,
            Self::AnalogInput(x) => x.time,
            Self::AnalogOutputStatus(x) => x.time,
        }
    }

    /// Replace the timestamp
    #[must_use]
    pub fn with_time(mut self, time: Option<Time>) -> Self {
        match &mut self {
            Self::BinaryInput(x) => x.time = time,
            Self::DoubleBitBinaryInput(x) => x.time = time,
            Self::BinaryOutputStatus(x) => x.time = time,
            Self::Counter(x) => x.time = time,
            Self::FrozenCounter(x) => x.time = time,
            Self::AnalogInput(x) => x.time = time,
            Self::AnalogOutputStatus(x) => x.time = time,
        }
        self
    }

    /// Flags byte as transmitted, with binary state folded into the top bits
    #[must_use]
    pub const fn wire_flags(&self) -> u8 {
        match self {
            Self::BinaryInput(x) => (x.flags.value & 0x7F) | ((x.value as u8) << 7),
            Self::BinaryOutputStatus(x) => (x.flags.value & 0x7F) | ((x.value as u8) << 7),
            Self::DoubleBitBinaryInput(x) => (x.flags.value & 0x3F) | (x.value.to_bits() << 6),
            Self::Counter(x) => x.flags.value,
            Self::FrozenCounter(x) => x.flags.value,
            Self::AnalogInput(x) => x.flags.value,
            Self::AnalogOutputStatus(x) => x.flags.value,
        }
    }

    /// Value of a counter or analog as `f64`, `None` for binary types
    #[must_use]
    pub fn numeric_value(&self) -> Option<f64> {
        match self {
            Self::Counter(x) => Some(f64::from(x.value)),
            Self::FrozenCounter(x) => Some(f64::from(x.value)),
            Self::AnalogInput(x) => Some(x.value),
            Self::AnalogOutputStatus(x) => Some(x.value),
            Self::BinaryInput(_) | Self::DoubleBitBinaryInput(_) | Self::BinaryOutputStatus(_) => {
                None
            }
        }
    }
}

impl From<BinaryInput> for Measurement {
    fn from(value: BinaryInput) -> Self {
        Self::BinaryInput(value)
    }
}

impl From<DoubleBitBinaryInput> for Measurement {
    fn from(value: DoubleBitBinaryInput) -> Self {
        Self::DoubleBitBinaryInput(value)
    }
}

impl From<BinaryOutputStatus> for Measurement {
    fn from(value: BinaryOutputStatus) -> Self {
        Self::BinaryOutputStatus(value)
    }
}

impl From<Counter> for Measurement {
    fn from(value: Counter) -> Self {
        Self::Counter(value)
    }
}

impl From<FrozenCounter> for Measurement {
    fn from(value: FrozenCounter) -> Self {
        Self::FrozenCounter(value)
    }
}

impl From<AnalogInput> for Measurement {
    fn from(value: AnalogInput) -> Self {
        Self::AnalogInput(value)
    }
}

impl From<AnalogOutputStatus> for Measurement {
    fn from(value: AnalogOutputStatus) -> Self {
        Self::AnalogOutputStatus(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binary_wire_flags() {
        let m = Measurement::from(BinaryInput::new(true, Flags::ONLINE, None));
        assert_eq!(m.wire_flags(), 0x81);
        assert_eq!(BinaryInput::from_wire(0x81, None), BinaryInput::new(true, Flags::ONLINE, None));
    }

    #[test]
    fn test_double_bit_wire_flags() {
        let m = Measurement::from(DoubleBitBinaryInput::new(
            DoubleBit::DeterminedOn,
            Flags::ONLINE,
            None,
        ));
        assert_eq!(m.wire_flags(), 0x81);
        let decoded = DoubleBitBinaryInput::from_wire(0x41, None);
        assert_eq!(decoded.value, DoubleBit::DeterminedOff);
        assert_eq!(decoded.flags, Flags::ONLINE);
    }

    #[test]
    fn test_numeric_value() {
        let counter = Measurement::from(Counter::new(42, Flags::ONLINE, None));
        assert_eq!(counter.numeric_value(), Some(42.0));
        let binary = Measurement::from(BinaryOutputStatus::new(false, Flags::ONLINE, None));
        assert_eq!(binary.numeric_value(), None);
    }

    #[test]
    fn test_with_time() {
        let m = Measurement::from(AnalogInput::new(1.5, Flags::ONLINE, None))
            .with_time(Some(Time::synchronized(7)));
        assert_eq!(m.time(), Some(Time::synchronized(7)));
        assert_eq!(m.point_type(), PointType::AnalogInput);
    }
}
