//! Transport boundary module for the DNP3 protocol
//!
//! The session engine does not frame or segment bytes itself. It consumes reassembled
//! application fragments tagged with link addresses and hands outgoing fragments to a
//! [`FragmentSink`]. An in-memory sink is provided for tests and for wiring a master and
//! an outstation together inside one process.

pub mod error;
pub mod fragment;
pub mod memory;
pub mod sink;

pub use error::TransportError;
pub use fragment::{ChannelEvent, Fragment, LinkState};
pub use memory::MemorySink;
pub use sink::FragmentSink;
