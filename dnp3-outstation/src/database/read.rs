//! Building READ responses from the database
//!
//! A READ request is turned into a plan when it arrives: events are selected in the
//! buffer and static values are copied, so every fragment of a multi-fragment response
//! reports the database as it was when the request was received.

use super::Database;
use dnp3_application::{FragmentWriter, HeaderRange, ObjectHeader, Variation};
use dnp3_core::{EventClasses, Iin2, Measurement, PointType};
use std::collections::VecDeque;

#[derive(Debug, Clone, Copy, PartialEq)]
struct StaticValue {
    index: u16,
    variation: Variation,
    value: Measurement,
}

/// Outcome of writing one response fragment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Progress {
    /// Nothing is left for another fragment
    pub(crate) complete: bool,
    /// Events written into this fragment
    pub(crate) events: usize,
}

/// Remaining work of one READ response
#[derive(Debug, Default)]
pub(crate) struct ReadPlan {
    statics: VecDeque<StaticValue>,
    /// Request errors to report in the response
    pub(crate) iin2: Iin2,
}

impl ReadPlan {
    /// Select events and copy static values named by the READ headers
    pub(crate) fn new(headers: &[ObjectHeader], db: &mut Database) -> Self {
        let mut plan = Self::default();
        for header in headers {
            plan.add_header(header, db);
        }
        plan
    }

    fn add_header(&mut self, header: &ObjectHeader, db: &mut Database) {
        match header.variation {
            Variation::Group60Var1 => {
                for (&(point_type, index), point) in db.points() {
                    self.statics.push_back(StaticValue {
                        index,
                        variation: point.config.static_variation_for(point_type),
                        value: point.value,
                    });
                }
            }
            Variation::Group60Var2 => {
                db.events_mut().select_classes(EventClasses::new(true, false, false));
            }
            Variation::Group60Var3 => {
                db.events_mut().select_classes(EventClasses::new(false, true, false));
            }
            Variation::Group60Var4 => {
                db.events_mut().select_classes(EventClasses::new(false, false, true));
            }
            variation => match variation.measurement_target() {
                Some((point_type, true)) => {
                    let limit = match header.range {
                        HeaderRange::Count(count) => usize::from(count),
                        _ => usize::MAX,
                    };
                    db.events_mut().select_type(point_type, limit);
                }
                Some((point_type, false)) => {
                    let requested = variation.layout().map(|_| variation);
                    self.add_static_type(point_type, requested, header.range, db);
                }
                None => {
                    log::warn!("cannot read {}", variation);
                    self.iin2 |= Iin2::OBJECT_UNKNOWN;
                }
            },
        }
    }

    fn add_static_type(
        &mut self,
        point_type: PointType,
        requested: Option<Variation>,
        range: HeaderRange,
        db: &Database,
    ) {
        if let HeaderRange::Count(_) = range {
            self.iin2 |= Iin2::PARAMETER_ERROR;
            return;
        }
        for (index, point) in db.points_of(point_type) {
            if range.contains(index) {
                self.statics.push_back(StaticValue {
                    index,
                    variation: requested
                        .unwrap_or_else(|| point.config.static_variation_for(point_type)),
                    value: point.value,
                });
            }
        }
    }

    /// True if the plan produced nothing at all to report
    pub(crate) fn is_empty(&self, db: &Database) -> bool {
        self.statics.is_empty() && !db.events().has_selected()
    }

    /// Fill `writer` with the next part of the response
    ///
    /// Selected events are written first, then static values.
    pub(crate) fn write(&mut self, db: &mut Database, writer: &mut FragmentWriter) -> Progress {
        let events = db.events_mut().write_selected(writer);
        let complete = !db.events().has_selected() && self.write_statics(writer);
        Progress { complete, events }
    }

    /// Returns `true` once every static value was written
    fn write_statics(&mut self, writer: &mut FragmentWriter) -> bool {
        while let Some(first) = self.statics.front().copied() {
            let run = self
                .statics
                .iter()
                .enumerate()
                .take_while(|(offset, item)| {
                    item.variation == first.variation
                        && u16::try_from(*offset)
                            .ok()
                            .and_then(|o| first.index.checked_add(o))
                            == Some(item.index)
                })
                .count();

            let count = run.min(writer.measurement_capacity(first.variation, false));
            if count == 0 {
                return false;
            }
            let values: Vec<Measurement> =
                self.statics.iter().take(count).map(|item| item.value).collect();
            if let Err(err) = writer.write_measurement_range(first.variation, first.index, &values)
            {
                log::warn!("static {} not written: {}", first.variation, err);
                self.statics.pop_front();
                continue;
            }
            self.statics.drain(..count);
        }
        true
    }
}
