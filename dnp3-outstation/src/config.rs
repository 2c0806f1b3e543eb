//! Outstation, event buffer and point configuration

use dnp3_application::Variation;
use dnp3_core::{EndpointAddress, EventClass, PointType};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Maximum number of buffered events per point type
///
/// A capacity of zero disables events for that type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventBufferConfig {
    pub max_binary: usize,
    pub max_double_bit_binary: usize,
    pub max_binary_output_status: usize,
    pub max_counter: usize,
    pub max_frozen_counter: usize,
    pub max_analog: usize,
    pub max_analog_output_status: usize,
}

impl EventBufferConfig {
    /// Same capacity for every type
    #[must_use]
    pub const fn all_types(capacity: usize) -> Self {
        Self {
            max_binary: capacity,
            max_double_bit_binary: capacity,
            max_binary_output_status: capacity,
            max_counter: capacity,
            max_frozen_counter: capacity,
            max_analog: capacity,
            max_analog_output_status: capacity,
        }
    }

    /// No events of any type
    #[must_use]
    pub const fn no_events() -> Self {
        Self::all_types(0)
    }

    #[must_use]
    pub const fn capacity(&self, point_type: PointType) -> usize {
        match point_type {
            PointType::BinaryInput => self.max_binary,
            PointType::DoubleBitBinaryInput => self.max_double_bit_binary,
            PointType::BinaryOutputStatus => self.max_binary_output_status,
            PointType::Counter => self.max_counter,
            PointType::FrozenCounter => self.max_frozen_counter,
            PointType::AnalogInput => self.max_analog,
            PointType::AnalogOutputStatus => self.max_analog_output_status,
        }
    }
}

impl Default for EventBufferConfig {
    fn default() -> Self {
        Self::all_types(100)
    }
}

/// When events reported in a solicited response leave the buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum EventRemoval {
    /// As soon as they are written into a response
    #[default]
    Eager,
    /// When the master confirms the response; the response requests confirmation
    OnConfirm,
}

/// Optional outstation behaviors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Features {
    /// Process broadcast requests
    pub broadcast: bool,
    /// Report events in unsolicited responses once the master enables them
    pub unsolicited: bool,
}

impl Default for Features {
    fn default() -> Self {
        Self {
            broadcast: true,
            unsolicited: true,
        }
    }
}

/// Outstation configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutstationConfig {
    /// Link address of this outstation
    pub address: EndpointAddress,
    /// Link address of the master allowed to talk to it
    pub master_address: EndpointAddress,
    /// Largest response fragment the outstation will build
    pub tx_buffer_size: usize,
    /// Time to wait for the confirm of a solicited or unsolicited response
    pub confirm_timeout: Duration,
    /// Time within which an OPERATE must follow its SELECT
    pub select_timeout: Duration,
    /// Control objects accepted per request, zero for no limit
    pub max_controls_per_request: usize,
    /// Delay before an unconfirmed unsolicited response is retried
    pub unsolicited_retry_delay: Duration,
    /// Retries of an unsolicited response, `None` for no limit
    pub max_unsolicited_retries: Option<usize>,
    pub event_removal: EventRemoval,
    pub features: Features,
    pub event_buffer: EventBufferConfig,
}

impl OutstationConfig {
    /// Smallest fragment every DNP3 device must accept
    pub const MIN_FRAGMENT_SIZE: usize = 249;

    #[must_use]
    pub fn new(address: EndpointAddress, master_address: EndpointAddress) -> Self {
        Self {
            address,
            master_address,
            ..Self::default()
        }
    }

    /// Fragment size actually used, never below the protocol minimum
    #[must_use]
    pub fn fragment_size(&self) -> usize {
        self.tx_buffer_size.max(Self::MIN_FRAGMENT_SIZE)
    }
}

impl Default for OutstationConfig {
    fn default() -> Self {
        Self {
            address: EndpointAddress::raw(1024),
            master_address: EndpointAddress::raw(1),
            tx_buffer_size: 2048,
            confirm_timeout: Duration::from_secs(5),
            select_timeout: Duration::from_secs(5),
            max_controls_per_request: 16,
            unsolicited_retry_delay: Duration::from_secs(5),
            max_unsolicited_retries: None,
            event_removal: EventRemoval::default(),
            features: Features::default(),
            event_buffer: EventBufferConfig::default(),
        }
    }
}

/// Configuration of one point
///
/// Variations left as `None` use the default static and event variations of the point
/// type.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PointConfig {
    /// Event class, `None` for a point that never produces events
    pub class: Option<EventClass>,
    pub static_variation: Option<Variation>,
    pub event_variation: Option<Variation>,
    /// Minimum change of a counter or analog value that produces an event
    pub deadband: f64,
}

impl PointConfig {
    #[must_use]
    pub const fn with_class(mut self, class: Option<EventClass>) -> Self {
        self.class = class;
        self
    }

    #[must_use]
    pub const fn with_deadband(mut self, deadband: f64) -> Self {
        self.deadband = deadband;
        self
    }

    #[must_use]
    pub const fn with_variations(
        mut self,
        static_variation: Variation,
        event_variation: Variation,
    ) -> Self {
        self.static_variation = Some(static_variation);
        self.event_variation = Some(event_variation);
        self
    }

    /// Static variation used for a point of `point_type`
    #[must_use]
    pub const fn static_variation_for(&self, point_type: PointType) -> Variation {
        match self.static_variation {
            Some(variation) => variation,
            None => Variation::default_static(point_type),
        }
    }

    /// Event variation used for a point of `point_type`
    #[must_use]
    pub const fn event_variation_for(&self, point_type: PointType) -> Variation {
        match self.event_variation {
            Some(variation) => variation,
            None => Variation::default_event(point_type),
        }
    }
}

impl Default for PointConfig {
    fn default() -> Self {
        Self {
            class: Some(EventClass::Class1),
            static_variation: None,
            event_variation: None,
            deadband: 0.0,
        }
    }
}
