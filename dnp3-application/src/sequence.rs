use std::fmt;

/// 4-bit application sequence number
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Sequence {
    value: u8,
}

impl Sequence {
    const MASK: u8 = 0x0F;

    #[must_use]
    pub const fn new(value: u8) -> Self {
        Self {
            value: value & Self::MASK,
        }
    }

    #[must_use]
    pub const fn value(&self) -> u8 {
        self.value
    }

    /// The sequence number that follows this one
    #[must_use]
    pub const fn next(&self) -> Self {
        Self::new(self.value.wrapping_add(1))
    }

    /// Return the current value and advance to the next
    pub fn increment(&mut self) -> Self {
        let current = *self;
        *self = self.next();
        current
    }
}

impl fmt::Display for Sequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequence_wraps() {
        let mut seq = Sequence::new(15);
        assert_eq!(seq.increment().value(), 15);
        assert_eq!(seq.value(), 0);
        assert_eq!(Sequence::new(0x1F).value(), 0x0F);
        assert_eq!(Sequence::new(3).next(), Sequence::new(4));
    }
}
