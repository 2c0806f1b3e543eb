//! DNP3 application-layer session engine
//!
//! Master and outstation halves of the DNP3 application layer, independent of the
//! physical transport and the link layer beneath it.
//!
//! # Architecture
//!
//! This library is organized as a workspace with multiple crates:
//!
//! - `dnp3-core`: Core types, error handling, measurements, IIN and classes
//! - `dnp3-application`: Fragment codec (function codes, headers, object variations)
//! - `dnp3-transport`: Boundary to the link layer (fragments, link state, sinks)
//! - `dnp3-master`: Associations, task scheduling, automatic tasks and polls
//! - `dnp3-outstation`: Point database, event buffer, command arbiter and responder
//!
//! Whatever owns the link delivers reassembled fragments to
//! [`master::MasterChannel::on_fragment_received`] or
//! [`outstation::Outstation::on_fragment_received`], and both sides send through a
//! [`transport::FragmentSink`].
//!
//! # Usage
//!
//! ```no_run
//! use dnp3::master::{AssociationConfig, MasterChannel, MasterConfig, NullHandler};
//! use dnp3::transport::MemorySink;
//! use dnp3::EndpointAddress;
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let (sink, _sent) = MemorySink::new();
//! let channel = MasterChannel::new(MasterConfig::new(EndpointAddress::raw(1)), Arc::new(sink));
//! let association = channel
//!     .add_association(
//!         EndpointAddress::raw(1024),
//!         AssociationConfig::default(),
//!         Box::new(NullHandler),
//!         Box::new(NullHandler),
//!         Box::new(NullHandler),
//!     )
//!     .await?;
//! association.enable()?;
//! # Ok(())
//! # }
//! ```

// Re-export core types
pub use dnp3_core::{
    Classes, Dnp3Error, Dnp3Result, EndpointAddress, EventClass, EventClasses, Flags, Iin,
    Measurement, PointType, Time, Timestamp,
};
pub use dnp3_core::{
    AnalogInput, AnalogOutput, AnalogOutputStatus, BinaryInput, BinaryOutputStatus,
    CommandStatus, Counter, Crob, DoubleBit, DoubleBitBinaryInput, FrozenCounter, OpType,
};

// Re-export the application layer codec
pub mod app {
    pub use dnp3_application::*;
}

// Re-export the transport boundary
pub mod transport {
    pub use dnp3_transport::*;
}

// Re-export master API
pub mod master {
    pub use dnp3_master::*;
}

// Re-export outstation API
pub mod outstation {
    pub use dnp3_outstation::*;
}
