use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{BitOr, BitOrAssign};

/// Quality flags attached to every measurement
///
/// The low bits are shared by all point types. Bits 6 and 7 carry type-specific
/// meaning (chatter filter, rollover, over-range, discontinuity, reference error)
/// and for binary types the value itself travels in the top bits on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Flags {
    pub value: u8,
}

impl Flags {
    pub const ONLINE: Flags = Flags::new(0x01);
    pub const RESTART: Flags = Flags::new(0x02);
    pub const COMM_LOST: Flags = Flags::new(0x04);
    pub const REMOTE_FORCED: Flags = Flags::new(0x08);
    pub const LOCAL_FORCED: Flags = Flags::new(0x10);
    /// Binary inputs only
    pub const CHATTER_FILTER: Flags = Flags::new(0x20);
    /// Counters only
    pub const ROLLOVER: Flags = Flags::new(0x20);
    /// Analogs only
    pub const OVER_RANGE: Flags = Flags::new(0x20);
    /// Counters only
    pub const DISCONTINUITY: Flags = Flags::new(0x40);
    /// Analogs only
    pub const REFERENCE_ERR: Flags = Flags::new(0x40);

    #[must_use]
    pub const fn new(value: u8) -> Self {
        Self { value }
    }

    /// True if every bit set in `other` is also set in `self`
    #[must_use]
    pub const fn contains(&self, other: Flags) -> bool {
        self.value & other.value == other.value
    }

    #[must_use]
    pub const fn with(self, other: Flags) -> Self {
        Self::new(self.value | other.value)
    }

    #[must_use]
    pub const fn without(self, other: Flags) -> Self {
        Self::new(self.value & !other.value)
    }

    #[must_use]
    pub const fn is_online(&self) -> bool {
        self.contains(Self::ONLINE)
    }
}

impl BitOr for Flags {
    type Output = Flags;

    fn bitor(self, rhs: Self) -> Self::Output {
        self.with(rhs)
    }
}

impl BitOrAssign for Flags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.value |= rhs.value;
    }
}

impl fmt::Display for Flags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:02X}", self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_composition() {
        let flags = Flags::ONLINE | Flags::LOCAL_FORCED;
        assert!(flags.is_online());
        assert!(flags.contains(Flags::LOCAL_FORCED));
        assert!(!flags.contains(Flags::COMM_LOST));
        assert_eq!(flags.without(Flags::ONLINE), Flags::LOCAL_FORCED);
    }
}
