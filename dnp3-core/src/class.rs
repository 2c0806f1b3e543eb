use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::BitOr;

/// Event class assigned to a point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventClass {
    Class1,
    Class2,
    Class3,
}

impl fmt::Display for EventClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Class1 => f.write_str("class 1"),
            Self::Class2 => f.write_str("class 2"),
            Self::Class3 => f.write_str("class 3"),
        }
    }
}

/// Set of event classes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct EventClasses {
    pub class1: bool,
    pub class2: bool,
    pub class3: bool,
}

impl EventClasses {
    #[must_use]
    pub const fn new(class1: bool, class2: bool, class3: bool) -> Self {
        Self {
            class1,
            class2,
            class3,
        }
    }

    #[must_use]
    pub const fn all() -> Self {
        Self::new(true, true, true)
    }

    #[must_use]
    pub const fn none() -> Self {
        Self::new(false, false, false)
    }

    #[must_use]
    pub const fn any(&self) -> bool {
        self.class1 || self.class2 || self.class3
    }

    #[must_use]
    pub const fn contains(&self, class: EventClass) -> bool {
        match class {
            EventClass::Class1 => self.class1,
            EventClass::Class2 => self.class2,
            EventClass::Class3 => self.class3,
        }
    }

    pub fn set(&mut self, class: EventClass, value: bool) {
        match class {
            EventClass::Class1 => self.class1 = value,
            EventClass::Class2 => self.class2 = value,
            EventClass::Class3 => self.class3 = value,
        }
    }

    /// Classes present in both sets
    #[must_use]
    pub const fn intersect(&self, other: EventClasses) -> Self {
        Self::new(
            self.class1 && other.class1,
            self.class2 && other.class2,
            self.class3 && other.class3,
        )
    }
}

impl From<EventClass> for EventClasses {
    fn from(class: EventClass) -> Self {
        let mut classes = Self::none();
        classes.set(class, true);
        classes
    }
}

impl BitOr for EventClasses {
    type Output = EventClasses;

    fn bitor(self, rhs: Self) -> Self::Output {
        Self::new(
            self.class1 || rhs.class1,
            self.class2 || rhs.class2,
            self.class3 || rhs.class3,
        )
    }
}

/// Static data (class 0) plus a set of event classes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Classes {
    pub class0: bool,
    pub events: EventClasses,
}

impl Classes {
    #[must_use]
    pub const fn new(class0: bool, events: EventClasses) -> Self {
        Self { class0, events }
    }

    /// Classes 0, 1, 2 and 3: an integrity poll
    #[must_use]
    pub const fn all() -> Self {
        Self::new(true, EventClasses::all())
    }

    /// Classes 1, 2 and 3: an event poll
    #[must_use]
    pub const fn class123() -> Self {
        Self::new(false, EventClasses::all())
    }

    #[must_use]
    pub const fn class0() -> Self {
        Self::new(true, EventClasses::none())
    }

    #[must_use]
    pub const fn none() -> Self {
        Self::new(false, EventClasses::none())
    }

    #[must_use]
    pub const fn any(&self) -> bool {
        self.class0 || self.events.any()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_classes() {
        let classes =
            EventClasses::from(EventClass::Class2) | EventClasses::from(EventClass::Class3);
        assert!(!classes.contains(EventClass::Class1));
        assert!(classes.contains(EventClass::Class2));
        assert!(classes.contains(EventClass::Class3));
        assert_eq!(
            classes.intersect(EventClasses::new(true, true, false)),
            EventClasses::new(false, true, false)
        );
        assert!(!EventClasses::none().any());
    }

    #[test]
    fn test_classes() {
        assert!(Classes::all().class0);
        assert!(!Classes::class123().class0);
        assert!(Classes::class0().any());
        assert!(!Classes::none().any());
    }
}
