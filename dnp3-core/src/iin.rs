//! Internal indications (IIN)
//!
//! Two bytes appended to every outstation response that report device state
//! (restart, pending events, time sync needed) and request errors.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{BitOr, BitOrAssign};

/// First IIN byte
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Iin1 {
    pub value: u8,
}

impl Iin1 {
    pub const BROADCAST: Iin1 = Iin1::new(0x01);
    pub const CLASS_1_EVENTS: Iin1 = Iin1::new(0x02);
    pub const CLASS_2_EVENTS: Iin1 = Iin1::new(0x04);
    pub const CLASS_3_EVENTS: Iin1 = Iin1::new(0x08);
    pub const NEED_TIME: Iin1 = Iin1::new(0x10);
    pub const LOCAL_CONTROL: Iin1 = Iin1::new(0x20);
    pub const DEVICE_TROUBLE: Iin1 = Iin1::new(0x40);
    pub const DEVICE_RESTART: Iin1 = Iin1::new(0x80);

    #[must_use]
    pub const fn new(value: u8) -> Self {
        Self { value }
    }

    #[must_use]
    pub const fn contains(&self, bit: Iin1) -> bool {
        self.value & bit.value == bit.value
    }

    pub fn set(&mut self, bit: Iin1, value: bool) {
        if value {
            self.value |= bit.value;
        } else {
            self.value &= !bit.value;
        }
    }

    #[must_use]
    pub const fn get_broadcast(&self) -> bool {
        self.contains(Self::BROADCAST)
    }

    #[must_use]
    pub const fn get_class_1_events(&self) -> bool {
        self.contains(Self::CLASS_1_EVENTS)
    }

    #[must_use]
    pub const fn get_class_2_events(&self) -> bool {
        self.contains(Self::CLASS_2_EVENTS)
    }

    #[must_use]
    pub const fn get_class_3_events(&self) -> bool {
        self.contains(Self::CLASS_3_EVENTS)
    }

    #[must_use]
    pub const fn get_need_time(&self) -> bool {
        self.contains(Self::NEED_TIME)
    }

    #[must_use]
    pub const fn get_local_control(&self) -> bool {
        self.contains(Self::LOCAL_CONTROL)
    }

    #[must_use]
    pub const fn get_device_trouble(&self) -> bool {
        self.contains(Self::DEVICE_TROUBLE)
    }

    #[must_use]
    pub const fn get_device_restart(&self) -> bool {
        self.contains(Self::DEVICE_RESTART)
    }
}

impl BitOr for Iin1 {
    type Output = Iin1;

    fn bitor(self, rhs: Self) -> Self::Output {
        Iin1::new(self.value | rhs.value)
    }
}

impl BitOrAssign for Iin1 {
    fn bitor_assign(&mut self, rhs: Self) {
        self.value |= rhs.value;
    }
}

/// Second IIN byte
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Iin2 {
    pub value: u8,
}

impl Iin2 {
    pub const NO_FUNC_CODE_SUPPORT: Iin2 = Iin2::new(0x01);
    pub const OBJECT_UNKNOWN: Iin2 = Iin2::new(0x02);
    pub const PARAMETER_ERROR: Iin2 = Iin2::new(0x04);
    pub const EVENT_BUFFER_OVERFLOW: Iin2 = Iin2::new(0x08);
    pub const ALREADY_EXECUTING: Iin2 = Iin2::new(0x10);
    pub const CONFIG_CORRUPT: Iin2 = Iin2::new(0x20);

    #[must_use]
    pub const fn new(value: u8) -> Self {
        Self { value }
    }

    #[must_use]
    pub const fn contains(&self, bit: Iin2) -> bool {
        self.value & bit.value == bit.value
    }

    pub fn set(&mut self, bit: Iin2, value: bool) {
        if value {
            self.value |= bit.value;
        } else {
            self.value &= !bit.value;
        }
    }

    #[must_use]
    pub const fn get_no_func_code_support(&self) -> bool {
        self.contains(Self::NO_FUNC_CODE_SUPPORT)
    }

    #[must_use]
    pub const fn get_object_unknown(&self) -> bool {
        self.contains(Self::OBJECT_UNKNOWN)
    }

    #[must_use]
    pub const fn get_parameter_error(&self) -> bool {
        self.contains(Self::PARAMETER_ERROR)
    }

    #[must_use]
    pub const fn get_event_buffer_overflow(&self) -> bool {
        self.contains(Self::EVENT_BUFFER_OVERFLOW)
    }

    #[must_use]
    pub const fn get_already_executing(&self) -> bool {
        self.contains(Self::ALREADY_EXECUTING)
    }

    #[must_use]
    pub const fn get_config_corrupt(&self) -> bool {
        self.contains(Self::CONFIG_CORRUPT)
    }
}

impl BitOr for Iin2 {
    type Output = Iin2;

    fn bitor(self, rhs: Self) -> Self::Output {
        Iin2::new(self.value | rhs.value)
    }
}

impl BitOrAssign for Iin2 {
    fn bitor_assign(&mut self, rhs: Self) {
        self.value |= rhs.value;
    }
}

/// Both IIN bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Iin {
    pub iin1: Iin1,
    pub iin2: Iin2,
}

impl Iin {
    pub const LENGTH: usize = 2;

    #[must_use]
    pub const fn new(iin1: Iin1, iin2: Iin2) -> Self {
        Self { iin1, iin2 }
    }

    #[must_use]
    pub const fn to_bytes(&self) -> [u8; 2] {
        [self.iin1.value, self.iin2.value]
    }

    #[must_use]
    pub const fn from_bytes(bytes: [u8; 2]) -> Self {
        Self::new(Iin1::new(bytes[0]), Iin2::new(bytes[1]))
    }

    /// The outstation rejected the request (function code, object or parameter)
    #[must_use]
    pub const fn has_request_error(&self) -> bool {
        self.iin2.get_no_func_code_support()
            || self.iin2.get_object_unknown()
            || self.iin2.get_parameter_error()
    }
}

impl BitOr for Iin {
    type Output = Iin;

    fn bitor(self, rhs: Self) -> Self::Output {
        Iin::new(self.iin1 | rhs.iin1, self.iin2 | rhs.iin2)
    }
}

impl fmt::Display for Iin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[iin1: 0x{:02X}, iin2: 0x{:02X}]", self.iin1.value, self.iin2.value)
    }
}
