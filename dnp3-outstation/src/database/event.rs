//! Bounded event buffer
//!
//! Events are kept in insertion order across all types. Each point type has its own
//! capacity; inserting into a full type discards the oldest event of that type and
//! raises the overflow indication until space is freed by a confirmed read.

use crate::config::EventBufferConfig;
use crate::error::EventError;
use dnp3_application::{FragmentWriter, Variation};
use dnp3_core::{EventClass, EventClasses, Measurement, PointType};
use std::collections::{BTreeMap, VecDeque};

/// Reporting state of a buffered event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EventState {
    Unselected,
    /// Chosen for the response being built
    Selected,
    /// Written into a response that has not been confirmed yet
    Written,
}

/// A buffered point change
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub index: u16,
    pub class: EventClass,
    pub variation: Variation,
    pub value: Measurement,
    state: EventState,
}

impl Event {
    #[must_use]
    pub const fn point_type(&self) -> PointType {
        self.value.point_type()
    }
}

#[derive(Debug, Clone)]
pub struct EventBuffer {
    config: EventBufferConfig,
    events: VecDeque<Event>,
    /// Buffered events per type, kept in step with `events`
    counts: BTreeMap<PointType, usize>,
    overflow: bool,
}

impl EventBuffer {
    #[must_use]
    pub fn new(config: EventBufferConfig) -> Self {
        Self {
            config,
            events: VecDeque::new(),
            counts: BTreeMap::new(),
            overflow: false,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Number of buffered events of one type
    #[must_use]
    pub fn len_of(&self, point_type: PointType) -> usize {
        self.counts.get(&point_type).copied().unwrap_or(0)
    }

    /// False if events of the type are never buffered
    #[must_use]
    pub const fn accepts(&self, point_type: PointType) -> bool {
        self.config.capacity(point_type) > 0
    }

    /// True once an event was discarded, until a confirmed read frees space
    #[must_use]
    pub fn is_overflown(&self) -> bool {
        self.overflow
    }

    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        self.events.iter()
    }

    /// Buffer an event
    ///
    /// # Errors
    ///
    /// Returns `EventError::NoCapacity` if the type has a capacity of zero.
    pub fn insert(
        &mut self,
        index: u16,
        class: EventClass,
        variation: Variation,
        value: Measurement,
    ) -> Result<(), EventError> {
        let point_type = value.point_type();
        let capacity = self.config.capacity(point_type);
        if capacity == 0 {
            return Err(EventError::NoCapacity(point_type));
        }

        let count = self.counts.entry(point_type).or_insert(0);
        if *count >= capacity {
            // the oldest event of the type is found from the front
            if let Some(oldest) = self
                .events
                .iter()
                .position(|event| event.point_type() == point_type)
            {
                self.events.remove(oldest);
                *count -= 1;
            }
            if !self.overflow {
                log::warn!("{} event buffer overflow", point_type);
            }
            self.overflow = true;
        }
        *count += 1;

        self.events.push_back(Event {
            index,
            class,
            variation,
            value,
            state: EventState::Unselected,
        });
        Ok(())
    }

    /// Classes that have events not yet written into a response
    #[must_use]
    pub fn unwritten_classes(&self) -> EventClasses {
        let mut classes = EventClasses::none();
        for event in self.events.iter().filter(|e| e.state != EventState::Written) {
            classes.set(event.class, true);
        }
        classes
    }

    /// Select unselected events of the given classes, returning how many were selected
    pub fn select_classes(&mut self, classes: EventClasses) -> usize {
        self.select_where(usize::MAX, |event| classes.contains(event.class))
    }

    /// Select up to `limit` unselected events of one type
    pub fn select_type(&mut self, point_type: PointType, limit: usize) -> usize {
        self.select_where(limit, |event| event.point_type() == point_type)
    }

    fn select_where(&mut self, limit: usize, predicate: impl Fn(&Event) -> bool) -> usize {
        let mut count = 0;
        for event in self.events.iter_mut() {
            if count == limit {
                break;
            }
            if event.state == EventState::Unselected && predicate(event) {
                event.state = EventState::Selected;
                count += 1;
            }
        }
        count
    }

    #[must_use]
    pub fn has_selected(&self) -> bool {
        self.events.iter().any(|e| e.state == EventState::Selected)
    }

    /// Write selected events into `writer` in insertion order
    ///
    /// Consecutive events with the same variation share one header. Events that do not
    /// fit remain selected for the next fragment.
    ///
    /// # Returns
    ///
    /// The number of events written.
    pub fn write_selected(&mut self, writer: &mut FragmentWriter) -> usize {
        let selected: Vec<usize> = self
            .events
            .iter()
            .enumerate()
            .filter(|(_, e)| e.state == EventState::Selected)
            .map(|(i, _)| i)
            .collect();

        let mut written = 0;
        let mut start = 0;
        while start < selected.len() {
            let variation = self.events[selected[start]].variation;
            let mut end = start + 1;
            while end < selected.len() && self.events[selected[end]].variation == variation {
                end += 1;
            }

            let capacity = writer.measurement_capacity(variation, true);
            let count = capacity.min(end - start);
            if count == 0 {
                break;
            }

            let run = &selected[start..start + count];
            let values: Vec<(u16, Measurement)> = run
                .iter()
                .map(|&i| (self.events[i].index, self.events[i].value))
                .collect();
            if let Err(err) = writer.write_measurements_prefixed(variation, &values) {
                log::debug!("event header did not fit: {}", err);
                break;
            }
            for &i in run {
                self.events[i].state = EventState::Written;
            }
            written += count;
            if count < end - start {
                break;
            }
            start = end;
        }
        written
    }

    /// Remove events written into a confirmed response
    pub fn clear_written(&mut self) -> usize {
        let before = self.events.len();
        let counts = &mut self.counts;
        self.events.retain(|event| {
            if event.state != EventState::Written {
                return true;
            }
            if let Some(count) = counts.get_mut(&event.point_type()) {
                *count -= 1;
            }
            false
        });
        let removed = before - self.events.len();
        if removed > 0 && self.overflow {
            log::info!("event buffer overflow cleared");
            self.overflow = false;
        }
        removed
    }

    /// Return selected events that were not written to the unselected state
    pub fn release_selected(&mut self) {
        for event in self.events.iter_mut() {
            if event.state == EventState::Selected {
                event.state = EventState::Unselected;
            }
        }
    }

    /// Return selected and written events to the unselected state
    pub fn unselect(&mut self) {
        for event in self.events.iter_mut() {
            event.state = EventState::Unselected;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dnp3_application::{Control, FunctionCode, Response, ResponseHeader, Sequence};
    use dnp3_core::{AnalogInput, BinaryInput, Flags, Iin};

    fn analog(value: f64) -> Measurement {
        AnalogInput::new(value, Flags::ONLINE, None).into()
    }

    fn binary(value: bool) -> Measurement {
        BinaryInput::new(value, Flags::ONLINE, None).into()
    }

    fn writer(size: usize) -> FragmentWriter {
        FragmentWriter::response(
            ResponseHeader::new(
                Control::response(Sequence::default(), true, true, false),
                FunctionCode::Response,
                Iin::default(),
            ),
            size,
        )
    }

    #[test]
    fn test_overflow_keeps_most_recent() {
        let mut buffer = EventBuffer::new(EventBufferConfig::all_types(3));
        for i in 0..5u16 {
            buffer
                .insert(i, EventClass::Class1, Variation::Group32Var1, analog(f64::from(i)))
                .unwrap();
        }
        assert_eq!(buffer.len_of(PointType::AnalogInput), 3);
        assert!(buffer.is_overflown());
        let indices: Vec<u16> = buffer.iter().map(|e| e.index).collect();
        assert_eq!(indices, vec![2, 3, 4]);
    }

    #[test]
    fn test_capacity_is_per_type() {
        let config = EventBufferConfig {
            max_binary: 1,
            ..EventBufferConfig::all_types(10)
        };
        let mut buffer = EventBuffer::new(config);
        buffer.insert(0, EventClass::Class1, Variation::Group32Var1, analog(1.0)).unwrap();
        buffer.insert(0, EventClass::Class1, Variation::Group2Var1, binary(true)).unwrap();
        buffer.insert(0, EventClass::Class1, Variation::Group2Var1, binary(false)).unwrap();
        assert_eq!(buffer.len(), 2);
        assert_eq!(buffer.len_of(PointType::AnalogInput), 1);
        assert!(buffer.is_overflown());
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let mut buffer = EventBuffer::new(EventBufferConfig::no_events());
        assert_eq!(
            buffer.insert(0, EventClass::Class2, Variation::Group2Var1, binary(true)),
            Err(EventError::NoCapacity(PointType::BinaryInput))
        );
        assert!(buffer.is_empty());
        assert!(!buffer.is_overflown());
    }

    #[test]
    fn test_select_write_confirm() {
        let mut buffer = EventBuffer::new(EventBufferConfig::default());
        buffer.insert(1, EventClass::Class1, Variation::Group32Var1, analog(1.0)).unwrap();
        buffer.insert(2, EventClass::Class2, Variation::Group32Var1, analog(2.0)).unwrap();
        buffer.insert(3, EventClass::Class1, Variation::Group2Var1, binary(true)).unwrap();

        assert_eq!(buffer.select_classes(EventClasses::new(true, false, false)), 2);
        let mut fragment = writer(2048);
        assert_eq!(buffer.write_selected(&mut fragment), 2);
        assert_eq!(buffer.unwritten_classes(), EventClasses::new(false, true, false));

        let bytes = fragment.finish();
        let headers = Response::parse(&bytes).unwrap().object_headers().unwrap();
        assert_eq!(headers.len(), 2);
        assert_eq!(headers[0].variation, Variation::Group32Var1);
        assert_eq!(headers[1].variation, Variation::Group2Var1);

        assert_eq!(buffer.clear_written(), 2);
        assert_eq!(buffer.len(), 1);
    }

    #[test]
    fn test_unselect_restores_events() {
        let mut buffer = EventBuffer::new(EventBufferConfig::default());
        buffer.insert(1, EventClass::Class3, Variation::Group2Var1, binary(true)).unwrap();
        buffer.select_classes(EventClasses::all());
        buffer.write_selected(&mut writer(2048));
        assert_eq!(buffer.unwritten_classes(), EventClasses::none());
        buffer.unselect();
        assert_eq!(buffer.unwritten_classes(), EventClasses::new(false, false, true));
        assert_eq!(buffer.clear_written(), 0);
    }

    #[test]
    fn test_partial_write_leaves_selection() {
        let mut buffer = EventBuffer::new(EventBufferConfig::default());
        for i in 0..100u16 {
            buffer
                .insert(i, EventClass::Class1, Variation::Group32Var1, analog(f64::from(i)))
                .unwrap();
        }
        buffer.select_classes(EventClasses::all());
        let mut fragment = writer(249);
        let written = buffer.write_selected(&mut fragment);
        assert!(written > 0 && written < 100);
        assert!(buffer.has_selected());
        buffer.release_selected();
        assert!(!buffer.has_selected());
        buffer.clear_written();
        assert_eq!(buffer.len(), 100 - written);
    }

    #[test]
    fn test_type_counts_follow_confirm() {
        let mut buffer = EventBuffer::new(EventBufferConfig::all_types(2));
        buffer.insert(0, EventClass::Class1, Variation::Group2Var1, binary(true)).unwrap();
        buffer.insert(0, EventClass::Class2, Variation::Group32Var1, analog(1.0)).unwrap();
        buffer.insert(1, EventClass::Class1, Variation::Group2Var1, binary(false)).unwrap();

        buffer.select_classes(EventClasses::new(true, false, false));
        buffer.write_selected(&mut writer(2048));
        assert_eq!(buffer.clear_written(), 2);
        assert_eq!(buffer.len_of(PointType::BinaryInput), 0);
        assert_eq!(buffer.len_of(PointType::AnalogInput), 1);

        // freed capacity is usable again without overflow
        buffer.insert(2, EventClass::Class1, Variation::Group2Var1, binary(true)).unwrap();
        buffer.insert(3, EventClass::Class1, Variation::Group2Var1, binary(true)).unwrap();
        assert_eq!(buffer.len_of(PointType::BinaryInput), 2);
        assert!(!buffer.is_overflown());
    }

    #[test]
    fn test_overflow_cleared_after_confirm() {
        let mut buffer = EventBuffer::new(EventBufferConfig::all_types(1));
        buffer.insert(1, EventClass::Class1, Variation::Group2Var1, binary(true)).unwrap();
        buffer.insert(1, EventClass::Class1, Variation::Group2Var1, binary(false)).unwrap();
        assert!(buffer.is_overflown());
        buffer.select_type(PointType::BinaryInput, 1);
        buffer.write_selected(&mut writer(2048));
        buffer.clear_written();
        assert!(!buffer.is_overflown());
    }
}
