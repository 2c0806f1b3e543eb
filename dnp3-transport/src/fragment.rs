//! Fragment and link state types

use bytes::Bytes;
use dnp3_core::EndpointAddress;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A reassembled application-layer fragment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    /// Link address of the sender
    pub source: EndpointAddress,
    /// Link address of the receiver, possibly a broadcast address
    pub destination: EndpointAddress,
    /// Application header and object headers
    pub data: Bytes,
}

impl Fragment {
    #[must_use]
    pub fn new(
        source: EndpointAddress,
        destination: EndpointAddress,
        data: impl Into<Bytes>,
    ) -> Self {
        Self {
            source,
            destination,
            data: data.into(),
        }
    }
}

/// State of the link below the application layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LinkState {
    Up,
    Down,
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkState::Up => write!(f, "up"),
            LinkState::Down => write!(f, "down"),
        }
    }
}

/// Event delivered from the transport to a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    Fragment(Fragment),
    Link(LinkState),
}
