//! Point database
//!
//! Points are registered per type and index, updated by the application and read by
//! the outstation session. Updates that pass change detection are copied into the
//! event buffer. All access goes through a [`DatabaseHandle`], whose transactions are
//! applied atomically with respect to the session.

mod event;
mod point;
pub(crate) mod read;

pub use event::{Event, EventBuffer};
pub use point::{Point, UpdateMode};

use crate::config::{EventBufferConfig, PointConfig};
use crate::error::DatabaseError;
use dnp3_application::Variation;
use dnp3_core::{EventClass, EventClasses, Measurement, PointType};
use parking_lot::{Mutex, MutexGuard};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Notify;

type PointKey = (PointType, u16);

/// A change staged for the event buffer until its transaction commits
#[derive(Debug, Clone, Copy)]
struct PendingEvent {
    index: u16,
    class: EventClass,
    variation: Variation,
    value: Measurement,
}

/// Undo log of the running transaction
#[derive(Debug, Default)]
struct Journal {
    /// Previous state of each touched point, `None` if it did not exist
    undo: Vec<(PointKey, Option<Point>)>,
    events: Vec<PendingEvent>,
}

/// Points and buffered events of one outstation
#[derive(Debug)]
pub struct Database {
    points: BTreeMap<PointKey, Point>,
    events: EventBuffer,
    journal: Option<Journal>,
}

impl Database {
    #[must_use]
    pub fn new(config: EventBufferConfig) -> Self {
        Self {
            points: BTreeMap::new(),
            events: EventBuffer::new(config),
            journal: None,
        }
    }

    fn record(&mut self, key: PointKey, previous: Option<Point>) {
        if let Some(journal) = self.journal.as_mut() {
            journal.undo.push((key, previous));
        }
    }

    fn begin(&mut self) {
        self.journal = Some(Journal::default());
    }

    fn commit(&mut self) {
        let Some(journal) = self.journal.take() else {
            return;
        };
        for event in journal.events {
            self.buffer_event(event);
        }
    }

    fn rollback(&mut self) {
        let Some(journal) = self.journal.take() else {
            return;
        };
        for (key, previous) in journal.undo.into_iter().rev() {
            match previous {
                Some(point) => {
                    self.points.insert(key, point);
                }
                None => {
                    self.points.remove(&key);
                }
            }
        }
        if !journal.events.is_empty() {
            log::debug!("{} staged events discarded", journal.events.len());
        }
    }

    fn buffer_event(&mut self, event: PendingEvent) -> bool {
        let point_type = event.value.point_type();
        match self
            .events
            .insert(event.index, event.class, event.variation, event.value)
        {
            Ok(()) => {
                log::trace!("{} {} event in {:?}", point_type, event.index, event.class);
                true
            }
            Err(err) => {
                log::debug!("{} {} event dropped: {}", point_type, event.index, err);
                false
            }
        }
    }

    /// Register a point
    ///
    /// # Errors
    ///
    /// * `DatabaseError::DuplicatePoint` if the index is already registered for the type
    /// * `DatabaseError::InvalidVariation` if a configured variation does not report
    ///   this point type
    pub fn add(
        &mut self,
        point_type: PointType,
        index: u16,
        config: PointConfig,
    ) -> Result<(), DatabaseError> {
        if let Some(variation) = config.static_variation
            && !variation.is_static_for(point_type)
        {
            return Err(DatabaseError::InvalidVariation {
                point_type,
                variation,
            });
        }
        if let Some(variation) = config.event_variation
            && !variation.is_event_for(point_type)
        {
            return Err(DatabaseError::InvalidVariation {
                point_type,
                variation,
            });
        }
        let key = (point_type, index);
        if self.points.contains_key(&key) {
            return Err(DatabaseError::DuplicatePoint { point_type, index });
        }
        self.record(key, None);
        self.points.insert(key, Point::new(point_type, config));
        Ok(())
    }

    /// Unregister a point; buffered events of the point are kept
    pub fn remove(&mut self, point_type: PointType, index: u16) -> Option<Point> {
        let key = (point_type, index);
        let point = self.points.remove(&key)?;
        self.record(key, Some(point.clone()));
        Some(point)
    }

    #[must_use]
    pub fn get(&self, point_type: PointType, index: u16) -> Option<&Point> {
        self.points.get(&(point_type, index))
    }

    /// Points of one type in index order
    pub fn points_of(&self, point_type: PointType) -> impl Iterator<Item = (u16, &Point)> {
        self.points
            .range((point_type, 0)..=(point_type, u16::MAX))
            .map(|((_, index), point)| (*index, point))
    }

    pub(crate) fn points(&self) -> impl Iterator<Item = (&(PointType, u16), &Point)> {
        self.points.iter()
    }

    /// Update the value of a registered point
    ///
    /// The point type is taken from the measurement.
    ///
    /// # Returns
    ///
    /// `true` if an event was produced. Inside a transaction the event is staged and
    /// buffered when the transaction commits.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::UnknownPoint` if the point was never added.
    pub fn update(
        &mut self,
        index: u16,
        value: impl Into<Measurement>,
        mode: UpdateMode,
    ) -> Result<bool, DatabaseError> {
        let value = value.into();
        let point_type = value.point_type();
        let key = (point_type, index);
        let point = self
            .points
            .get_mut(&key)
            .ok_or(DatabaseError::UnknownPoint { point_type, index })?;

        let previous = self.journal.is_some().then(|| point.clone());
        let event = point.update(value, mode);
        let class = point.config.class;
        let variation = point.config.event_variation_for(point_type);
        if let Some(previous) = previous {
            self.record(key, Some(previous));
        }

        let (true, Some(class)) = (event, class) else {
            return Ok(false);
        };
        let event = PendingEvent {
            index,
            class,
            variation,
            value,
        };
        match self.journal.as_mut() {
            Some(journal) if self.events.accepts(point_type) => {
                journal.events.push(event);
                Ok(true)
            }
            Some(_) => {
                log::debug!("{} {} event dropped: no capacity", point_type, index);
                Ok(false)
            }
            None => Ok(self.buffer_event(event)),
        }
    }

    pub fn events(&self) -> &EventBuffer {
        &self.events
    }

    pub(crate) fn events_mut(&mut self) -> &mut EventBuffer {
        &mut self.events
    }

    /// Classes with events still waiting to be reported
    #[must_use]
    pub fn pending_classes(&self) -> EventClasses {
        self.events.unwritten_classes()
    }
}

/// Shared handle to an outstation database
///
/// Cloning the handle shares the same database.
#[derive(Debug, Clone)]
pub struct DatabaseHandle {
    inner: Arc<Mutex<Database>>,
    changed: Arc<Notify>,
}

impl DatabaseHandle {
    #[must_use]
    pub fn new(database: Database) -> Self {
        Self {
            inner: Arc::new(Mutex::new(database)),
            changed: Arc::new(Notify::new()),
        }
    }

    /// Run `f` with exclusive access to the database
    ///
    /// If `f` returns an error every change it made is rolled back. Events produced by
    /// `f` are staged and only enter the event buffer when it succeeds, at which point
    /// the outstation is woken once to report them.
    ///
    /// # Example
    ///
    /// ```
    /// use dnp3_core::{AnalogInput, Flags, PointType};
    /// use dnp3_outstation::{Database, DatabaseHandle, EventBufferConfig, PointConfig, UpdateMode};
    ///
    /// let handle = DatabaseHandle::new(Database::new(EventBufferConfig::default()));
    /// let result = handle.transaction(|db| {
    ///     db.add(PointType::AnalogInput, 0, PointConfig::default())?;
    ///     db.update(0, AnalogInput::new(1.0, Flags::ONLINE, None), UpdateMode::Detect)
    /// });
    /// assert_eq!(result, Ok(true));
    /// ```
    pub fn transaction<T, E>(
        &self,
        f: impl FnOnce(&mut Database) -> Result<T, E>,
    ) -> Result<T, E> {
        let mut db = self.inner.lock();
        db.begin();
        match f(&mut db) {
            Ok(value) => {
                db.commit();
                drop(db);
                self.changed.notify_one();
                Ok(value)
            }
            Err(err) => {
                db.rollback();
                Err(err)
            }
        }
    }

    /// Update one point in its own transaction
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::UnknownPoint` if the point was never added.
    pub fn update(
        &self,
        index: u16,
        value: impl Into<Measurement>,
        mode: UpdateMode,
    ) -> Result<bool, DatabaseError> {
        let value = value.into();
        self.transaction(|db| db.update(index, value, mode))
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, Database> {
        let mut db = self.inner.lock();
        // left open only if a transaction closure panicked
        db.commit();
        db
    }

    /// Completes after the next successful transaction
    pub(crate) async fn changed(&self) {
        self.changed.notified().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dnp3_application::Variation;
    use dnp3_core::{AnalogInput, BinaryInput, EventClass, Flags};
    use tokio_test::{assert_err, assert_ok};

    fn database() -> Database {
        Database::new(EventBufferConfig::default())
    }

    #[test]
    fn test_add_rejects_duplicate() {
        let mut db = database();
        assert_ok!(db.add(PointType::AnalogInput, 7, PointConfig::default()));
        assert_eq!(
            db.add(PointType::AnalogInput, 7, PointConfig::default()),
            Err(DatabaseError::DuplicatePoint {
                point_type: PointType::AnalogInput,
                index: 7
            })
        );
        assert_ok!(db.add(PointType::Counter, 7, PointConfig::default()));
    }

    #[test]
    fn test_add_rejects_wrong_variation() {
        let mut db = database();
        let config = PointConfig::default()
            .with_variations(Variation::Group1Var2, Variation::Group2Var1);
        assert_eq!(
            db.add(PointType::AnalogInput, 0, config),
            Err(DatabaseError::InvalidVariation {
                point_type: PointType::AnalogInput,
                variation: Variation::Group1Var2
            })
        );
    }

    #[test]
    fn test_update_unknown_point() {
        let mut db = database();
        assert_err!(db.update(3, BinaryInput::new(true, Flags::ONLINE, None), UpdateMode::Detect));
    }

    #[test]
    fn test_repeated_update_one_event() {
        let mut db = database();
        db.add(PointType::AnalogInput, 7, PointConfig::default()).unwrap();
        let value = AnalogInput::new(10.0, Flags::ONLINE, None);
        assert_eq!(db.update(7, value, UpdateMode::Detect), Ok(true));
        for _ in 0..3 {
            assert_eq!(db.update(7, value, UpdateMode::Detect), Ok(false));
        }
        assert_eq!(db.events().len(), 1);
        assert_eq!(db.pending_classes(), EventClasses::new(true, false, false));
    }

    #[test]
    fn test_point_without_class_has_no_events() {
        let mut db = database();
        db.add(PointType::BinaryInput, 0, PointConfig::default().with_class(None))
            .unwrap();
        let changed = db
            .update(0, BinaryInput::new(true, Flags::ONLINE, None), UpdateMode::Detect)
            .unwrap();
        assert!(!changed);
        assert!(db.events().is_empty());
        assert_eq!(
            db.get(PointType::BinaryInput, 0).map(|p| p.value),
            Some(BinaryInput::new(true, Flags::ONLINE, None).into())
        );
    }

    #[test]
    fn test_event_uses_point_class_and_variation() {
        let mut db = database();
        let config = PointConfig::default()
            .with_class(Some(EventClass::Class3))
            .with_variations(Variation::Group30Var5, Variation::Group32Var7);
        db.add(PointType::AnalogInput, 2, config).unwrap();
        db.update(2, AnalogInput::new(4.5, Flags::ONLINE, None), UpdateMode::Detect)
            .unwrap();
        let event = db.events().iter().next().cloned().unwrap();
        assert_eq!(event.class, EventClass::Class3);
        assert_eq!(event.variation, Variation::Group32Var7);
        assert_eq!(event.index, 2);
    }

    #[test]
    fn test_points_of_type_in_order() {
        let mut db = database();
        for index in [5, 1, 3] {
            db.add(PointType::Counter, index, PointConfig::default()).unwrap();
        }
        db.add(PointType::AnalogInput, 0, PointConfig::default()).unwrap();
        let indices: Vec<u16> = db.points_of(PointType::Counter).map(|(i, _)| i).collect();
        assert_eq!(indices, vec![1, 3, 5]);
    }

    #[test]
    fn test_transaction_rolls_back_on_error() {
        let handle = DatabaseHandle::new(database());
        handle
            .transaction(|db| db.add(PointType::AnalogInput, 0, PointConfig::default()))
            .unwrap();

        let result = handle.transaction(|db| {
            db.update(0, AnalogInput::new(1.0, Flags::ONLINE, None), UpdateMode::Detect)?;
            db.update(1, AnalogInput::new(2.0, Flags::ONLINE, None), UpdateMode::Detect)
        });
        assert_eq!(
            result,
            Err(DatabaseError::UnknownPoint {
                point_type: PointType::AnalogInput,
                index: 1
            })
        );

        let db = handle.lock();
        assert!(db.events().is_empty());
        assert_eq!(
            db.get(PointType::AnalogInput, 0).map(|p| p.value.flags()),
            Some(Flags::RESTART)
        );
    }

    #[test]
    fn test_rollback_restores_added_removed_and_updated_points() {
        let handle = DatabaseHandle::new(Database::new(EventBufferConfig::all_types(1)));
        handle
            .transaction(|db| {
                db.add(PointType::AnalogInput, 0, PointConfig::default())?;
                db.add(PointType::BinaryInput, 0, PointConfig::default())?;
                db.update(0, AnalogInput::new(1.0, Flags::ONLINE, None), UpdateMode::Detect)
            })
            .unwrap();

        let result: Result<(), DatabaseError> = handle.transaction(|db| {
            db.update(0, AnalogInput::new(2.0, Flags::ONLINE, None), UpdateMode::Detect)?;
            db.update(0, AnalogInput::new(3.0, Flags::ONLINE, None), UpdateMode::Detect)?;
            db.remove(PointType::BinaryInput, 0);
            db.add(PointType::Counter, 4, PointConfig::default())?;
            db.add(PointType::AnalogInput, 0, PointConfig::default())
        });
        assert_err!(result);

        let db = handle.lock();
        assert_eq!(
            db.get(PointType::AnalogInput, 0).map(|p| p.value),
            Some(AnalogInput::new(1.0, Flags::ONLINE, None).into())
        );
        assert!(db.get(PointType::BinaryInput, 0).is_some());
        assert!(db.get(PointType::Counter, 4).is_none());
        // the discarded events never reached the full buffer
        assert_eq!(db.events().len(), 1);
        assert!(!db.events().is_overflown());
    }

    #[test]
    fn test_events_buffered_on_commit() {
        let handle = DatabaseHandle::new(Database::new(EventBufferConfig::all_types(2)));
        let buffered = handle
            .transaction(|db| {
                db.add(PointType::AnalogInput, 0, PointConfig::default())?;
                let mut buffered = 0;
                for value in [1.0, 2.0, 3.0] {
                    let analog = AnalogInput::new(value, Flags::ONLINE, None);
                    if db.update(0, analog, UpdateMode::Detect)? {
                        buffered += 1;
                    }
                }
                assert!(db.events().is_empty());
                Ok::<_, DatabaseError>(buffered)
            })
            .unwrap();
        assert_eq!(buffered, 3);

        let db = handle.lock();
        assert_eq!(db.events().len_of(PointType::AnalogInput), 2);
        assert!(db.events().is_overflown());
        let values: Vec<Option<f64>> =
            db.events().iter().map(|e| e.value.numeric_value()).collect();
        assert_eq!(values, vec![Some(2.0), Some(3.0)]);
    }

    #[test]
    fn test_update_without_capacity_reports_no_event() {
        let handle = DatabaseHandle::new(Database::new(EventBufferConfig::no_events()));
        let result = handle.transaction(|db| {
            db.add(PointType::BinaryInput, 0, PointConfig::default())?;
            db.update(0, BinaryInput::new(true, Flags::ONLINE, None), UpdateMode::Detect)
        });
        assert_eq!(result, Ok(false));
        assert!(handle.lock().events().is_empty());
    }

    #[tokio::test]
    async fn test_transaction_wakes_listener() {
        let handle = DatabaseHandle::new(database());
        handle
            .transaction(|db| db.add(PointType::BinaryInput, 0, PointConfig::default()))
            .unwrap();
        // a stored permit completes the wait immediately
        tokio::time::timeout(std::time::Duration::from_secs(1), handle.changed())
            .await
            .unwrap();
    }
}
