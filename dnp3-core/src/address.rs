use crate::error::{Dnp3Error, Dnp3Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// DNP3 link address of a master or outstation
///
/// Addresses 0xFFF0..=0xFFFF are reserved. Of those, 0xFFFD, 0xFFFE and 0xFFFF are
/// broadcast destinations and may only appear as the destination of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EndpointAddress(u16);

impl EndpointAddress {
    /// First address of the reserved range
    pub const RESERVED_START: u16 = 0xFFF0;
    /// Broadcast, confirmation optional
    pub const BROADCAST_CONFIRM_OPTIONAL: u16 = 0xFFFD;
    /// Broadcast, no confirmation
    pub const BROADCAST_DONT_CONFIRM: u16 = 0xFFFE;
    /// Broadcast, confirmation mandatory
    pub const BROADCAST_SHALL_CONFIRM: u16 = 0xFFFF;

    /// Create an address without validation
    ///
    /// Use this for addresses taken off the wire, which may legitimately be broadcast.
    #[must_use]
    pub const fn raw(address: u16) -> Self {
        Self(address)
    }

    /// Create a unicast address for a master or outstation
    ///
    /// # Errors
    ///
    /// Returns `Dnp3Error::Config` if the address lies in the reserved range.
    pub fn try_new(address: u16) -> Dnp3Result<Self> {
        if address >= Self::RESERVED_START {
            return Err(Dnp3Error::Config(format!(
                "address {} is in the reserved range",
                address
            )));
        }
        Ok(Self(address))
    }

    /// The raw 16-bit value
    #[must_use]
    pub const fn raw_value(&self) -> u16 {
        self.0
    }

    /// True for one of the three broadcast destinations
    #[must_use]
    pub const fn is_broadcast(&self) -> bool {
        self.0 >= Self::BROADCAST_CONFIRM_OPTIONAL
    }
}

impl fmt::Display for EndpointAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
