//! Supported object group/variation pairs and their fixed layouts

use dnp3_core::PointType;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Object group and variation
///
/// `GroupXVar0` means "any variation" and only appears in READ requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Variation {
    Group1Var0,
    Group1Var2,
    Group2Var0,
    Group2Var1,
    Group2Var2,
    Group3Var0,
    Group3Var2,
    Group4Var0,
    Group4Var1,
    Group4Var2,
    Group10Var0,
    Group10Var2,
    Group11Var0,
    Group11Var1,
    Group11Var2,
    Group12Var1,
    Group20Var0,
    Group20Var1,
    Group20Var5,
    Group21Var0,
    Group21Var1,
    Group21Var9,
    Group22Var0,
    Group22Var1,
    Group22Var5,
    Group23Var0,
    Group23Var1,
    Group23Var5,
    Group30Var0,
    Group30Var1,
    Group30Var5,
    Group30Var6,
    Group32Var0,
    Group32Var1,
    Group32Var3,
    Group32Var5,
    Group32Var7,
    Group32Var8,
    Group40Var0,
    Group40Var1,
    Group40Var3,
    Group40Var4,
    Group41Var1,
    Group41Var2,
    Group41Var3,
    Group41Var4,
    Group42Var0,
    Group42Var1,
    Group42Var3,
    Group42Var5,
    Group42Var7,
    Group42Var8,
    Group50Var1,
    Group50Var3,
    Group52Var1,
    Group52Var2,
    Group60Var1,
    Group60Var2,
    Group60Var3,
    Group60Var4,
    Group70Var3,
    Group70Var4,
    Group70Var5,
    Group80Var1,
}

/// How the value of a measurement is encoded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    /// Binary state carried in the flags byte
    State,
    U32,
    I32,
    F32,
    F64,
}

impl ValueKind {
    #[must_use]
    pub const fn size(&self) -> usize {
        match self {
            Self::State => 0,
            Self::U32 | Self::I32 | Self::F32 => 4,
            Self::F64 => 8,
        }
    }
}

/// Fixed layout of a measurement variation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    pub point_type: PointType,
    pub event: bool,
    pub flags: bool,
    pub value: ValueKind,
    pub time: bool,
}

impl Layout {
    const fn new(
        point_type: PointType,
        event: bool,
        flags: bool,
        value: ValueKind,
        time: bool,
    ) -> Self {
        Self {
            point_type,
            event,
            flags,
            value,
            time,
        }
    }

    /// Encoded size of one object in bytes
    #[must_use]
    pub const fn size(&self) -> usize {
        let mut size = self.value.size();
        if self.flags {
            size += 1;
        }
        if self.time {
            size += 6;
        }
        size
    }
}

impl Variation {
    /// Look up a group/variation pair
    #[must_use]
    pub const fn from_group_var(group: u8, var: u8) -> Option<Self> {
        let variation = match (group, var) {
            (1, 0) => Self::Group1Var0,
            (1, 2) => Self::Group1Var2,
            (2, 0) => Self::Group2Var0,
            (2, 1) => Self::Group2Var1,
            (2, 2) => Self::Group2Var2,
            (3, 0) => Self::Group3Var0,
            (3, 2) => Self::Group3Var2,
            (4, 0) => Self::Group4Var0,
            (4, 1) => Self::Group4Var1,
            (4, 2) => Self::Group4Var2,
            (10, 0) => Self::Group10Var0,
            (10, 2) => Self::Group10Var2,
            (11, 0) => Self::Group11Var0,
            (11, 1) => Self::Group11Var1,
            (11, 2) => Self::Group11Var2,
            (12, 1) => Self::Group12Var1,
            (20, 0) => Self::Group20Var0,
            (20, 1) => Self::Group20Var1,
            (20, 5) => Self::Group20Var5,
            (21, 0) => Self::Group21Var0,
            (21, 1) => Self::Group21Var1,
            (21, 9) => Self::Group21Var9,
            (22, 0) => Self::Group22Var0,
            (22, 1) => Self::Group22Var1,
            (22, 5) => Self::Group22Var5,
            (23, 0) => Self::Group23Var0,
            (23, 1) => Self::Group23Var1,
            (23, 5) => Self::Group23Var5,
            (30, 0) => Self::Group30Var0,
            (30, 1) => Self::Group30Var1,
            (30, 5) => Self::Group30Var5,
            (30, 6) => Self::Group30Var6,
            (32, 0) => Self::Group32Var0,
            (32, 1) => Self::Group32Var1,
            (32, 3) => Self::Group32Var3,
            (32, 5) => Self::Group32Var5,
            (32, 7) => Self::Group32Var7,
            (32, 8) => Self::Group32Var8,
            (40, 0) => Self::Group40Var0,
            (40, 1) => Self::Group40Var1,
            (40, 3) => Self::Group40Var3,
            (40, 4) => Self::Group40Var4,
            (41, 1) => Self::Group41Var1,
            (41, 2) => Self::Group41Var2,
            (41, 3) => Self::Group41Var3,
            (41, 4) => Self::Group41Var4,
            (42, 0) => Self::Group42Var0,
            (42, 1) => Self::Group42Var1,
            (42, 3) => Self::Group42Var3,
            (42, 5) => Self::Group42Var5,
            (42, 7) => Self::Group42Var7,
            (42, 8) => Self::Group42Var8,
            (50, 1) => Self::Group50Var1,
            (50, 3) => Self::Group50Var3,
            (52, 1) => Self::Group52Var1,
            (52, 2) => Self::Group52Var2,
            (60, 1) => Self::Group60Var1,
            (60, 2) => Self::Group60Var2,
            (60, 3) => Self::Group60Var3,
            (60, 4) => Self::Group60Var4,
            (70, 3) => Self::Group70Var3,
            (70, 4) => Self::Group70Var4,
            (70, 5) => Self::Group70Var5,
            (80, 1) => Self::Group80Var1,
            _ => return None,
        };
        Some(variation)
    }

    /// Group and variation numbers
    #[must_use]
    pub const fn group_var(&self) -> (u8, u8) {
        match self {
            Self::Group1Var0 => (1, 0),
            Self::Group1Var2 => (1, 2),
            Self::Group2Var0 => (2, 0),
            Self::Group2Var1 => (2, 1),
            Self::Group2Var2 => (2, 2),
            Self::Group3Var0 => (3, 0),
            Self::Group3Var2 => (3, 2),
            Self::Group4Var0 => (4, 0),
            Self::Group4Var1 => (4, 1),
            Self::Group4Var2 => (4, 2),
            Self::Group10Var0 => (10, 0),
            Self::Group10Var2 => (10, 2),
            Self::Group11Var0 => (11, 0),
            Self::Group11Var1 => (11, 1),
            Self::Group11Var2 => (11, 2),
            Self::Group12Var1 => (12, 1),
            Self::Group20Var0 => (20, 0),
            Self::Group20Var1 => (20, 1),
            Self::Group20Var5 => (20, 5),
            Self::Group21Var0 => (21, 0),
            Self::Group21Var1 => (21, 1),
            Self::Group21Var9 => (21, 9),
            Self::Group22Var0 => (22, 0),
            Self::Group22Var1 => (22, 1),
            Self::Group22Var5 => (22, 5),
            Self::Group23Var0 => (23, 0),
            Self::Group23Var1 => (23, 1),
            Self::Group23Var5 => (23, 5),
            Self::Group30Var0 => (30, 0),
            Self::Group30Var1 => (30, 1),
            Self::Group30Var5 => (30, 5),
            Self::Group30Var6 => (30, 6),
            Self::Group32Var0 => (32, 0),
            Self::Group32Var1 => (32, 1),
            Self::Group32Var3 => (32, 3),
            Self::Group32Var5 => (32, 5),
            Self::Group32Var7 => (32, 7),
            Self::Group32Var8 => (32, 8),
            Self::Group40Var0 => (40, 0),
            Self::Group40Var1 => (40, 1),
            Self::Group40Var3 => (40, 3),
            Self::Group40Var4 => (40, 4),
            Self::Group41Var1 => (41, 1),
            Self::Group41Var2 => (41, 2),
            Self::Group41Var3 => (41, 3),
            Self::Group41Var4 => (41, 4),
            Self::Group42Var0 => (42, 0),
            Self::Group42Var1 => (42, 1),
            Self::Group42Var3 => (42, 3),
            Self::Group42Var5 => (42, 5),
            Self::Group42Var7 => (42, 7),
            Self::Group42Var8 => (42, 8),
            Self::Group50Var1 => (50, 1),
            Self::Group50Var3 => (50, 3),
            Self::Group52Var1 => (52, 1),
            Self::Group52Var2 => (52, 2),
            Self::Group60Var1 => (60, 1),
            Self::Group60Var2 => (60, 2),
            Self::Group60Var3 => (60, 3),
            Self::Group60Var4 => (60, 4),
            Self::Group70Var3 => (70, 3),
            Self::Group70Var4 => (70, 4),
            Self::Group70Var5 => (70, 5),
            Self::Group80Var1 => (80, 1),
        }
    }

    #[must_use]
    pub const fn group(&self) -> u8 {
        self.group_var().0
    }

    /// Layout of a measurement variation, `None` for every other object
    #[must_use]
    pub const fn layout(&self) -> Option<Layout> {
        use PointType::*;
        use ValueKind::*;
        let layout = match self {
            Self::Group1Var2 => Layout::new(BinaryInput, false, true, State, false),
            Self::Group2Var1 => Layout::new(BinaryInput, true, true, State, false),
            Self::Group2Var2 => Layout::new(BinaryInput, true, true, State, true),
            Self::Group3Var2 => Layout::new(DoubleBitBinaryInput, false, true, State, false),
            Self::Group4Var1 => Layout::new(DoubleBitBinaryInput, true, true, State, false),
            Self::Group4Var2 => Layout::new(DoubleBitBinaryInput, true, true, State, true),
            Self::Group10Var2 => Layout::new(BinaryOutputStatus, false, true, State, false),
            Self::Group11Var1 => Layout::new(BinaryOutputStatus, true, true, State, false),
            Self::Group11Var2 => Layout::new(BinaryOutputStatus, true, true, State, true),
            Self::Group20Var1 => Layout::new(Counter, false, true, U32, false),
            Self::Group20Var5 => Layout::new(Counter, false, false, U32, false),
            Self::Group21Var1 => Layout::new(FrozenCounter, false, true, U32, false),
            Self::Group21Var9 => Layout::new(FrozenCounter, false, false, U32, false),
            Self::Group22Var1 => Layout::new(Counter, true, true, U32, false),
            Self::Group22Var5 => Layout::new(Counter, true, true, U32, true),
            Self::Group23Var1 => Layout::new(FrozenCounter, true, true, U32, false),
            Self::Group23Var5 => Layout::new(FrozenCounter, true, true, U32, true),
            Self::Group30Var1 => Layout::new(AnalogInput, false, true, I32, false),
            Self::Group30Var5 => Layout::new(AnalogInput, false, true, F32, false),
            Self::Group30Var6 => Layout::new(AnalogInput, false, true, F64, false),
            Self::Group32Var1 => Layout::new(AnalogInput, true, true, I32, false),
            Self::Group32Var3 => Layout::new(AnalogInput, true, true, I32, true),
            Self::Group32Var5 => Layout::new(AnalogInput, true, true, F32, false),
            Self::Group32Var7 => Layout::new(AnalogInput, true, true, F32, true),
            Self::Group32Var8 => Layout::new(AnalogInput, true, true, F64, true),
            Self::Group40Var1 => Layout::new(AnalogOutputStatus, false, true, I32, false),
            Self::Group40Var3 => Layout::new(AnalogOutputStatus, false, true, F32, false),
            Self::Group40Var4 => Layout::new(AnalogOutputStatus, false, true, F64, false),
            Self::Group42Var1 => Layout::new(AnalogOutputStatus, true, true, I32, false),
            Self::Group42Var3 => Layout::new(AnalogOutputStatus, true, true, I32, true),
            Self::Group42Var5 => Layout::new(AnalogOutputStatus, true, true, F32, false),
            Self::Group42Var7 => Layout::new(AnalogOutputStatus, true, true, F32, true),
            Self::Group42Var8 => Layout::new(AnalogOutputStatus, true, true, F64, true),
            _ => return None,
        };
        Some(layout)
    }

    /// Point type and static/event kind of a "variation 0" header
    #[must_use]
    pub const fn any_variation_of(&self) -> Option<(PointType, bool)> {
        let result = match self {
            Self::Group1Var0 => (PointType::BinaryInput, false),
            Self::Group2Var0 => (PointType::BinaryInput, true),
            Self::Group3Var0 => (PointType::DoubleBitBinaryInput, false),
            Self::Group4Var0 => (PointType::DoubleBitBinaryInput, true),
            Self::Group10Var0 => (PointType::BinaryOutputStatus, false),
            Self::Group11Var0 => (PointType::BinaryOutputStatus, true),
            Self::Group20Var0 => (PointType::Counter, false),
            Self::Group22Var0 => (PointType::Counter, true),
            Self::Group21Var0 => (PointType::FrozenCounter, false),
            Self::Group23Var0 => (PointType::FrozenCounter, true),
            Self::Group30Var0 => (PointType::AnalogInput, false),
            Self::Group32Var0 => (PointType::AnalogInput, true),
            Self::Group40Var0 => (PointType::AnalogOutputStatus, false),
            Self::Group42Var0 => (PointType::AnalogOutputStatus, true),
            _ => return None,
        };
        Some(result)
    }

    /// Point type and static/event kind of any measurement header, specific or not
    #[must_use]
    pub const fn measurement_target(&self) -> Option<(PointType, bool)> {
        match self.layout() {
            Some(layout) => Some((layout.point_type, layout.event)),
            None => self.any_variation_of(),
        }
    }

    /// True for a specific static variation of `point_type`
    #[must_use]
    pub const fn is_static_for(&self, point_type: PointType) -> bool {
        match self.layout() {
            Some(layout) => !layout.event && layout.point_type as u8 == point_type as u8,
            None => false,
        }
    }

    /// True for a specific event variation of `point_type`
    #[must_use]
    pub const fn is_event_for(&self, point_type: PointType) -> bool {
        match self.layout() {
            Some(layout) => layout.event && layout.point_type as u8 == point_type as u8,
            None => false,
        }
    }

    /// Default static reporting variation for a point type
    #[must_use]
    pub const fn default_static(point_type: PointType) -> Self {
        match point_type {
            PointType::BinaryInput => Self::Group1Var2,
            PointType::DoubleBitBinaryInput => Self::Group3Var2,
            PointType::BinaryOutputStatus => Self::Group10Var2,
            PointType::Counter => Self::Group20Var1,
            PointType::FrozenCounter => Self::Group21Var1,
            PointType::AnalogInput => Self::Group30Var1,
            PointType::AnalogOutputStatus => Self::Group40Var1,
        }
    }

    /// Default event reporting variation for a point type
    #[must_use]
    pub const fn default_event(point_type: PointType) -> Self {
        match point_type {
            PointType::BinaryInput => Self::Group2Var1,
            PointType::DoubleBitBinaryInput => Self::Group4Var1,
            PointType::BinaryOutputStatus => Self::Group11Var1,
            PointType::Counter => Self::Group22Var1,
            PointType::FrozenCounter => Self::Group23Var1,
            PointType::AnalogInput => Self::Group32Var1,
            PointType::AnalogOutputStatus => Self::Group42Var1,
        }
    }

    /// "Any variation" header for reading a point type
    #[must_use]
    pub const fn any_for(point_type: PointType, event: bool) -> Self {
        match (point_type, event) {
            (PointType::BinaryInput, false) => Self::Group1Var0,
            (PointType::BinaryInput, true) => Self::Group2Var0,
            (PointType::DoubleBitBinaryInput, false) => Self::Group3Var0,
            (PointType::DoubleBitBinaryInput, true) => Self::Group4Var0,
            (PointType::BinaryOutputStatus, false) => Self::Group10Var0,
            (PointType::BinaryOutputStatus, true) => Self::Group11Var0,
            (PointType::Counter, false) => Self::Group20Var0,
            (PointType::Counter, true) => Self::Group22Var0,
            (PointType::FrozenCounter, false) => Self::Group21Var0,
            (PointType::FrozenCounter, true) => Self::Group23Var0,
            (PointType::AnalogInput, false) => Self::Group30Var0,
            (PointType::AnalogInput, true) => Self::Group32Var0,
            (PointType::AnalogOutputStatus, false) => Self::Group40Var0,
            (PointType::AnalogOutputStatus, true) => Self::Group42Var0,
        }
    }
}

impl fmt::Display for Variation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (group, var) = self.group_var();
        write!(f, "g{}v{}", group, var)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_var_lookup_is_consistent() {
        for group in 0..=255u8 {
            for var in 0..=15u8 {
                if let Some(variation) = Variation::from_group_var(group, var) {
                    assert_eq!(variation.group_var(), (group, var));
                }
            }
        }
        assert_eq!(Variation::from_group_var(30, 2), None);
    }

    #[test]
    fn test_layout_sizes() {
        assert_eq!(Variation::Group1Var2.layout().map(|x| x.size()), Some(1));
        assert_eq!(Variation::Group2Var2.layout().map(|x| x.size()), Some(7));
        assert_eq!(Variation::Group20Var5.layout().map(|x| x.size()), Some(4));
        assert_eq!(Variation::Group30Var1.layout().map(|x| x.size()), Some(5));
        assert_eq!(Variation::Group32Var8.layout().map(|x| x.size()), Some(15));
        assert_eq!(Variation::Group12Var1.layout(), None);
    }

    #[test]
    fn test_defaults_match_point_type() {
        for point_type in PointType::ALL {
            assert!(Variation::default_static(point_type).is_static_for(point_type));
            assert!(Variation::default_event(point_type).is_event_for(point_type));
            assert_eq!(
                Variation::any_for(point_type, true).any_variation_of(),
                Some((point_type, true))
            );
        }
        assert!(!Variation::Group32Var1.is_static_for(PointType::AnalogInput));
    }
}
