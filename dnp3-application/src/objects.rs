//! Parsed object headers

use crate::file::{FileCommand, FileCommandStatus, FileTransport};
use crate::variation::Variation;
use dnp3_core::{AnalogOutput, CommandStatus, Control, Measurement, Timestamp};
use std::time::Duration;

/// Object header qualifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QualifierCode {
    /// 8-bit start and stop indices
    Range8,
    /// 16-bit start and stop indices
    Range16,
    /// No range field
    AllObjects,
    /// 8-bit object count
    Count8,
    /// 16-bit object count
    Count16,
    /// 8-bit count, each object prefixed with an 8-bit index
    CountAndPrefix8,
    /// 16-bit count, each object prefixed with a 16-bit index
    CountAndPrefix16,
    /// 8-bit count, each object prefixed with a 16-bit size
    FreeFormat16,
}

impl QualifierCode {
    #[must_use]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x00 => Some(Self::Range8),
            0x01 => Some(Self::Range16),
            0x06 => Some(Self::AllObjects),
            0x07 => Some(Self::Count8),
            0x08 => Some(Self::Count16),
            0x17 => Some(Self::CountAndPrefix8),
            0x28 => Some(Self::CountAndPrefix16),
            0x5B => Some(Self::FreeFormat16),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_u8(&self) -> u8 {
        match self {
            Self::Range8 => 0x00,
            Self::Range16 => 0x01,
            Self::AllObjects => 0x06,
            Self::Count8 => 0x07,
            Self::Count16 => 0x08,
            Self::CountAndPrefix8 => 0x17,
            Self::CountAndPrefix16 => 0x28,
            Self::FreeFormat16 => 0x5B,
        }
    }

    /// Objects under this qualifier carry their own index
    #[must_use]
    pub const fn is_prefixed(&self) -> bool {
        matches!(self, Self::CountAndPrefix8 | Self::CountAndPrefix16)
    }
}

/// Range field of an object header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderRange {
    All,
    Range { start: u16, stop: u16 },
    Count(u16),
}

impl HeaderRange {
    /// True if `index` is selected by this range
    ///
    /// A count qualifier does not name indices, so it matches nothing.
    #[must_use]
    pub const fn contains(&self, index: u16) -> bool {
        match self {
            Self::All => true,
            Self::Range { start, stop } => index >= *start && index <= *stop,
            Self::Count(_) => false,
        }
    }
}

/// Control object with its index and status
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CommandObject {
    pub index: u16,
    pub control: Control,
    pub status: CommandStatus,
}

impl CommandObject {
    /// A control to send, with status `Success`
    #[must_use]
    pub fn new(index: u16, control: impl Into<Control>) -> Self {
        Self {
            index,
            control: control.into(),
            status: CommandStatus::Success,
        }
    }

    #[must_use]
    pub const fn with_status(self, status: CommandStatus) -> Self {
        Self {
            index: self.index,
            control: self.control,
            status,
        }
    }

    /// Variation used to encode this control
    #[must_use]
    pub const fn variation(&self) -> Variation {
        match self.control {
            Control::Crob(_) => Variation::Group12Var1,
            Control::AnalogOutput(AnalogOutput::I32(_)) => Variation::Group41Var1,
            Control::AnalogOutput(AnalogOutput::I16(_)) => Variation::Group41Var2,
            Control::AnalogOutput(AnalogOutput::F32(_)) => Variation::Group41Var3,
            Control::AnalogOutput(AnalogOutput::F64(_)) => Variation::Group41Var4,
        }
    }
}

/// Object data following a header
#[derive(Debug, Clone, PartialEq)]
pub enum ObjectData {
    /// No data: all-objects headers and every header of a READ request
    None,
    Measurements(Vec<(u16, Measurement)>),
    Commands(Vec<CommandObject>),
    /// Absolute time (g50v1) or last recorded time (g50v3)
    Time(Timestamp),
    /// Time delay (g52v1 coarse or g52v2 fine)
    Delay(Duration),
    /// Internal indication bits written by the master (g80v1)
    IinBits(Vec<(u16, bool)>),
    FileCommand(FileCommand),
    FileStatus(FileCommandStatus),
    FileTransport(FileTransport),
}

/// One object header and its data
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectHeader {
    pub variation: Variation,
    pub qualifier: QualifierCode,
    pub range: HeaderRange,
    pub data: ObjectData,
}

impl ObjectHeader {
    #[must_use]
    pub const fn new(
        variation: Variation,
        qualifier: QualifierCode,
        range: HeaderRange,
        data: ObjectData,
    ) -> Self {
        Self {
            variation,
            qualifier,
            range,
            data,
        }
    }
}
