use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// DNP3 timestamp: milliseconds since the Unix epoch, 48 bits wide
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Timestamp {
    value: u64,
}

impl Timestamp {
    /// Largest representable value (2^48 - 1 milliseconds)
    pub const MAX_VALUE: u64 = 0x0000_FFFF_FFFF_FFFF;

    /// Size of a timestamp on the wire
    pub const LENGTH: usize = 6;

    /// Create a timestamp, discarding any bits above bit 47
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self {
            value: value & Self::MAX_VALUE,
        }
    }

    /// Raw millisecond count
    #[must_use]
    pub const fn raw_value(&self) -> u64 {
        self.value
    }

    /// Convert a system time, returning `None` for times before the epoch or past 2^48 ms
    #[must_use]
    pub fn try_from_system_time(time: SystemTime) -> Option<Self> {
        let millis = time.duration_since(UNIX_EPOCH).ok()?.as_millis();
        let millis = u64::try_from(millis).ok()?;
        if millis > Self::MAX_VALUE {
            return None;
        }
        Some(Self::new(millis))
    }

    /// Add a duration, returning `None` on 48-bit overflow
    #[must_use]
    pub fn checked_add(&self, duration: Duration) -> Option<Self> {
        let millis = u64::try_from(duration.as_millis()).ok()?;
        let sum = self.value.checked_add(millis)?;
        if sum > Self::MAX_VALUE {
            return None;
        }
        Some(Self::new(sum))
    }

    /// Little-endian wire encoding
    #[must_use]
    pub fn to_le_bytes(&self) -> [u8; 6] {
        let bytes = self.value.to_le_bytes();
        [bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5]]
    }

    #[must_use]
    pub fn from_le_bytes(bytes: [u8; 6]) -> Self {
        let mut full = [0u8; 8];
        full[..6].copy_from_slice(&bytes);
        Self::new(u64::from_le_bytes(full))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ms", self.value)
    }
}

/// Timestamp together with its synchronization quality
///
/// A measurement without a valid time carries `Option::<Time>::None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Time {
    /// Taken while the outstation clock was synchronized
    Synchronized(Timestamp),
    /// Taken while the outstation clock was not synchronized
    Unsynchronized(Timestamp),
}

impl Time {
    #[must_use]
    pub const fn synchronized(millis: u64) -> Self {
        Self::Synchronized(Timestamp::new(millis))
    }

    #[must_use]
    pub const fn unsynchronized(millis: u64) -> Self {
        Self::Unsynchronized(Timestamp::new(millis))
    }

    #[must_use]
    pub const fn timestamp(&self) -> Timestamp {
        match self {
            Self::Synchronized(x) | Self::Unsynchronized(x) => *x,
        }
    }

    #[must_use]
    pub const fn is_synchronized(&self) -> bool {
        matches!(self, Self::Synchronized(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_truncates_to_48_bits() {
        let ts = Timestamp::new(0xFFFF_0000_0000_0001);
        assert_eq!(ts.raw_value(), 1);
    }

    #[test]
    fn test_timestamp_wire_bytes() {
        let ts = Timestamp::new(0x0605_0403_0201);
        assert_eq!(ts.to_le_bytes(), [0x01, 0x02, 0x03, 0x04, 0x05, 0x06]);
        assert_eq!(Timestamp::from_le_bytes(ts.to_le_bytes()), ts);
    }

    #[test]
    fn test_checked_add_overflow() {
        let ts = Timestamp::new(Timestamp::MAX_VALUE);
        assert!(ts.checked_add(Duration::from_millis(1)).is_none());
        assert_eq!(
            Timestamp::new(10).checked_add(Duration::from_millis(5)),
            Some(Timestamp::new(15))
        );
    }

    #[test]
    fn test_from_system_time() {
        let time = UNIX_EPOCH + Duration::from_millis(1_000);
        assert_eq!(Timestamp::try_from_system_time(time), Some(Timestamp::new(1_000)));
    }
}
