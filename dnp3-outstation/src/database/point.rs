//! A single database point and its change detection

use crate::config::PointConfig;
use dnp3_core::{
    AnalogInput, AnalogOutputStatus, BinaryInput, BinaryOutputStatus, Counter, DoubleBit,
    DoubleBitBinaryInput, Flags, FrozenCounter, Measurement, PointType,
};

/// How an update is checked for an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum UpdateMode {
    /// Produce an event if the value or flags changed enough
    #[default]
    Detect,
    /// Always produce an event
    AlwaysEvent,
    /// Update the static value only
    NoEvent,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Point {
    pub config: PointConfig,
    /// Current static value
    pub value: Measurement,
    /// Value carried by the last event, reference for deadband checks
    last_event: Measurement,
}

impl Point {
    pub(crate) fn new(point_type: PointType, config: PointConfig) -> Self {
        let value = initial_value(point_type);
        Self {
            config,
            value,
            last_event: value,
        }
    }

    /// Store `value` and report whether it produces an event
    pub(crate) fn update(&mut self, value: Measurement, mode: UpdateMode) -> bool {
        let event = match mode {
            UpdateMode::AlwaysEvent => true,
            UpdateMode::NoEvent => false,
            UpdateMode::Detect => self.is_event(&value),
        };
        self.value = value;
        if event {
            self.last_event = value;
        }
        event
    }

    fn is_event(&self, value: &Measurement) -> bool {
        if value.flags() != self.value.flags() {
            return true;
        }
        match (value.numeric_value(), self.last_event.numeric_value()) {
            (Some(new), Some(last)) => (new - last).abs() > self.config.deadband,
            // binary types: compare state only, timestamps never matter
            _ => value.with_time(None) != self.value.with_time(None),
        }
    }
}

/// Value of a point that has never been updated: offline and restarting
fn initial_value(point_type: PointType) -> Measurement {
    let flags = Flags::RESTART;
    match point_type {
        PointType::BinaryInput => BinaryInput::new(false, flags, None).into(),
        PointType::DoubleBitBinaryInput => {
            DoubleBitBinaryInput::new(DoubleBit::Indeterminate, flags, None).into()
        }
        PointType::BinaryOutputStatus => BinaryOutputStatus::new(false, flags, None).into(),
        PointType::Counter => Counter::new(0, flags, None).into(),
        PointType::FrozenCounter => FrozenCounter::new(0, flags, None).into(),
        PointType::AnalogInput => AnalogInput::new(0.0, flags, None).into(),
        PointType::AnalogOutputStatus => AnalogOutputStatus::new(0.0, flags, None).into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dnp3_core::Time;

    fn analog(value: f64, time: u64) -> Measurement {
        AnalogInput::new(value, Flags::ONLINE, Some(Time::synchronized(time))).into()
    }

    #[test]
    fn test_initial_value_is_restarting() {
        for point_type in PointType::ALL {
            let point = Point::new(point_type, PointConfig::default());
            assert_eq!(point.value.point_type(), point_type);
            assert_eq!(point.value.flags(), Flags::RESTART);
            assert_eq!(point.value.time(), None);
        }
    }

    #[test]
    fn test_identical_update_ignores_time() {
        let mut point = Point::new(PointType::AnalogInput, PointConfig::default());
        assert!(point.update(analog(10.0, 1), UpdateMode::Detect));
        assert!(!point.update(analog(10.0, 2), UpdateMode::Detect));
        assert!(point.update(analog(11.0, 3), UpdateMode::Detect));
    }

    #[test]
    fn test_deadband_measured_from_last_event() {
        let config = PointConfig::default().with_deadband(1.0);
        let mut point = Point::new(PointType::AnalogInput, config);
        assert!(point.update(analog(10.0, 0), UpdateMode::Detect));
        assert!(!point.update(analog(10.6, 0), UpdateMode::Detect));
        assert!(!point.update(analog(11.0, 0), UpdateMode::Detect));
        assert!(point.update(analog(11.2, 0), UpdateMode::Detect));
        assert_eq!(point.value.numeric_value(), Some(11.2));
    }

    #[test]
    fn test_flag_change_is_event_within_deadband() {
        let config = PointConfig::default().with_deadband(5.0);
        let mut point = Point::new(PointType::Counter, config);
        point.update(Counter::new(1, Flags::ONLINE, None).into(), UpdateMode::Detect);
        let changed = point.update(
            Counter::new(1, Flags::ONLINE | Flags::COMM_LOST, None).into(),
            UpdateMode::Detect,
        );
        assert!(changed);
    }

    #[test]
    fn test_binary_state_change() {
        let mut point = Point::new(PointType::BinaryInput, PointConfig::default());
        let on: Measurement = BinaryInput::new(true, Flags::ONLINE, None).into();
        assert!(point.update(on, UpdateMode::Detect));
        assert!(!point.update(on, UpdateMode::Detect));
        assert!(point.update(on, UpdateMode::AlwaysEvent));
        let off: Measurement = BinaryInput::new(false, Flags::ONLINE, None).into();
        assert!(!point.update(off, UpdateMode::NoEvent));
        assert_eq!(point.value, off);
    }
}
