//! Bounds-checked little-endian reader over a fragment

use dnp3_core::{Dnp3Error, Dnp3Result, Timestamp};

/// Cursor over received bytes
///
/// Every read checks the remaining length and fails with
/// `Dnp3Error::FragmentInvalid` instead of panicking.
pub struct ReadCursor<'a> {
    buffer: &'a [u8],
    position: usize,
}

impl<'a> ReadCursor<'a> {
    /// Create a new cursor
    pub fn new(buffer: &'a [u8]) -> Self {
        Self {
            buffer,
            position: 0,
        }
    }

    /// Bytes not yet consumed
    pub fn remaining(&self) -> usize {
        self.buffer.len() - self.position
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    pub fn position(&self) -> usize {
        self.position
    }

    /// Read `len` bytes as a slice of the underlying buffer
    pub fn read_bytes(&mut self, len: usize) -> Dnp3Result<&'a [u8]> {
        if len > self.remaining() {
            return Err(Dnp3Error::FragmentInvalid(format!(
                "Not enough bytes: need {}, have {}",
                len,
                self.remaining()
            )));
        }
        let start = self.position;
        self.position += len;
        Ok(&self.buffer[start..self.position])
    }

    fn read_array<const N: usize>(&mut self) -> Dnp3Result<[u8; N]> {
        let bytes = self.read_bytes(N)?;
        let mut array = [0u8; N];
        array.copy_from_slice(bytes);
        Ok(array)
    }

    pub fn read_u8(&mut self) -> Dnp3Result<u8> {
        Ok(self.read_array::<1>()?[0])
    }

    pub fn read_u16(&mut self) -> Dnp3Result<u16> {
        Ok(u16::from_le_bytes(self.read_array()?))
    }

    pub fn read_i16(&mut self) -> Dnp3Result<i16> {
        Ok(i16::from_le_bytes(self.read_array()?))
    }

    pub fn read_u32(&mut self) -> Dnp3Result<u32> {
        Ok(u32::from_le_bytes(self.read_array()?))
    }

    pub fn read_i32(&mut self) -> Dnp3Result<i32> {
        Ok(i32::from_le_bytes(self.read_array()?))
    }

    pub fn read_f32(&mut self) -> Dnp3Result<f32> {
        Ok(f32::from_le_bytes(self.read_array()?))
    }

    pub fn read_f64(&mut self) -> Dnp3Result<f64> {
        Ok(f64::from_le_bytes(self.read_array()?))
    }

    pub fn read_timestamp(&mut self) -> Dnp3Result<Timestamp> {
        Ok(Timestamp::from_le_bytes(self.read_array()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_little_endian_reads() {
        let data = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07];
        let mut cursor = ReadCursor::new(&data);
        assert_eq!(cursor.read_u8().unwrap(), 0x01);
        assert_eq!(cursor.read_u16().unwrap(), 0x0302);
        assert_eq!(cursor.read_u32().unwrap(), 0x0706_0504);
        assert!(cursor.is_empty());
    }

    #[test]
    fn test_insufficient_bytes() {
        let data = [0x01, 0x02];
        let mut cursor = ReadCursor::new(&data);
        assert!(matches!(cursor.read_u32(), Err(Dnp3Error::FragmentInvalid(_))));
        // a failed read consumes nothing
        assert_eq!(cursor.remaining(), 2);
    }
}
