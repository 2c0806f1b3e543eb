//! File transfer objects (group 70)
//!
//! These travel with the free-format qualifier: a one-byte object count followed by a
//! two-byte object size and the object itself.

use crate::cursor::ReadCursor;
use bytes::{BufMut, BytesMut};
use dnp3_core::{Dnp3Error, Dnp3Result, Timestamp};
use std::fmt;

/// Operational mode of a file command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileMode {
    Null,
    Read,
    Write,
    Append,
    Unknown(u16),
}

impl FileMode {
    #[must_use]
    pub const fn from_u16(value: u16) -> Self {
        match value {
            0 => Self::Null,
            1 => Self::Read,
            2 => Self::Write,
            3 => Self::Append,
            x => Self::Unknown(x),
        }
    }

    #[must_use]
    pub const fn as_u16(&self) -> u16 {
        match self {
            Self::Null => 0,
            Self::Read => 1,
            Self::Write => 2,
            Self::Append => 3,
            Self::Unknown(x) => *x,
        }
    }
}

/// Status code of a file command status object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileStatus {
    Success,
    PermissionDenied,
    InvalidMode,
    FileNotFound,
    FileLocked,
    TooManyOpen,
    InvalidHandle,
    WriteBlockSize,
    CommLost,
    CannotAbort,
    NotOpened,
    HandleExpired,
    BufferOverrun,
    Fatal,
    BlockSeq,
    Undefined,
    Unknown(u8),
}

impl FileStatus {
    #[must_use]
    pub const fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Success,
            1 => Self::PermissionDenied,
            2 => Self::InvalidMode,
            3 => Self::FileNotFound,
            4 => Self::FileLocked,
            5 => Self::TooManyOpen,
            6 => Self::InvalidHandle,
            7 => Self::WriteBlockSize,
            8 => Self::CommLost,
            9 => Self::CannotAbort,
            16 => Self::NotOpened,
            17 => Self::HandleExpired,
            18 => Self::BufferOverrun,
            19 => Self::Fatal,
            20 => Self::BlockSeq,
            255 => Self::Undefined,
            x => Self::Unknown(x),
        }
    }

    #[must_use]
    pub const fn as_u8(&self) -> u8 {
        match self {
            Self::Success => 0,
            Self::PermissionDenied => 1,
            Self::InvalidMode => 2,
            Self::FileNotFound => 3,
            Self::FileLocked => 4,
            Self::TooManyOpen => 5,
            Self::InvalidHandle => 6,
            Self::WriteBlockSize => 7,
            Self::CommLost => 8,
            Self::CannotAbort => 9,
            Self::NotOpened => 16,
            Self::HandleExpired => 17,
            Self::BufferOverrun => 18,
            Self::Fatal => 19,
            Self::BlockSeq => 20,
            Self::Undefined => 255,
            Self::Unknown(x) => *x,
        }
    }
}

impl fmt::Display for FileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

fn read_string(cursor: &mut ReadCursor<'_>, len: usize) -> Dnp3Result<String> {
    let bytes = cursor.read_bytes(len)?;
    String::from_utf8(bytes.to_vec())
        .map_err(|_| Dnp3Error::FragmentInvalid("file name is not valid UTF-8".to_string()))
}

/// File command (group 70 variation 3): open or delete a file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileCommand {
    pub created: Timestamp,
    pub permissions: u16,
    pub auth_key: u32,
    pub file_size: u32,
    pub mode: FileMode,
    pub max_block_size: u16,
    pub request_id: u16,
    pub file_name: String,
}

impl FileCommand {
    /// Size of the fixed part, which is also the offset of the file name
    const FIXED_LENGTH: u16 = 26;

    /// Command that opens `file_name` for reading
    #[must_use]
    pub fn open_for_read(
        file_name: impl Into<String>,
        max_block_size: u16,
        request_id: u16,
    ) -> Self {
        Self {
            created: Timestamp::default(),
            permissions: 0,
            auth_key: 0,
            file_size: 0,
            mode: FileMode::Read,
            max_block_size,
            request_id,
            file_name: file_name.into(),
        }
    }

    pub fn encode(&self, buffer: &mut BytesMut) -> Dnp3Result<()> {
        let name_len = u16::try_from(self.file_name.len())
            .map_err(|_| Dnp3Error::InvalidData("file name too long".to_string()))?;
        buffer.put_u16_le(Self::FIXED_LENGTH);
        buffer.put_u16_le(name_len);
        buffer.put_slice(&self.created.to_le_bytes());
        buffer.put_u16_le(self.permissions);
        buffer.put_u32_le(self.auth_key);
        buffer.put_u32_le(self.file_size);
        buffer.put_u16_le(self.mode.as_u16());
        buffer.put_u16_le(self.max_block_size);
        buffer.put_u16_le(self.request_id);
        buffer.put_slice(self.file_name.as_bytes());
        Ok(())
    }

    pub fn decode(cursor: &mut ReadCursor<'_>) -> Dnp3Result<Self> {
        let name_offset = cursor.read_u16()?;
        let name_len = cursor.read_u16()?;
        if name_offset != Self::FIXED_LENGTH {
            return Err(Dnp3Error::FragmentInvalid(format!(
                "unexpected file name offset {}",
                name_offset
            )));
        }
        Ok(Self {
            created: cursor.read_timestamp()?,
            permissions: cursor.read_u16()?,
            auth_key: cursor.read_u32()?,
            file_size: cursor.read_u32()?,
            mode: FileMode::from_u16(cursor.read_u16()?),
            max_block_size: cursor.read_u16()?,
            request_id: cursor.read_u16()?,
            file_name: read_string(cursor, usize::from(name_len))?,
        })
    }
}

/// File command status (group 70 variation 4): answer to open/close, or a close request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileCommandStatus {
    pub handle: u32,
    pub file_size: u32,
    pub max_block_size: u16,
    pub request_id: u16,
    pub status: FileStatus,
    pub text: String,
}

impl FileCommandStatus {
    /// Request to close an open handle
    #[must_use]
    pub fn close(handle: u32, request_id: u16) -> Self {
        Self {
            handle,
            file_size: 0,
            max_block_size: 0,
            request_id,
            status: FileStatus::Success,
            text: String::new(),
        }
    }

    pub fn encode(&self, buffer: &mut BytesMut) -> Dnp3Result<()> {
        buffer.put_u32_le(self.handle);
        buffer.put_u32_le(self.file_size);
        buffer.put_u16_le(self.max_block_size);
        buffer.put_u16_le(self.request_id);
        buffer.put_u8(self.status.as_u8());
        buffer.put_slice(self.text.as_bytes());
        Ok(())
    }

    /// Decode an object occupying exactly `size` bytes
    pub fn decode(cursor: &mut ReadCursor<'_>, size: usize) -> Dnp3Result<Self> {
        const FIXED: usize = 13;
        if size < FIXED {
            return Err(Dnp3Error::FragmentInvalid(format!(
                "file status object of {} bytes",
                size
            )));
        }
        Ok(Self {
            handle: cursor.read_u32()?,
            file_size: cursor.read_u32()?,
            max_block_size: cursor.read_u16()?,
            request_id: cursor.read_u16()?,
            status: FileStatus::from_u8(cursor.read_u8()?),
            text: read_string(cursor, size - FIXED)?,
        })
    }
}

/// File transport (group 70 variation 5): one block of file data
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileTransport {
    pub handle: u32,
    pub block_number: u32,
    pub last: bool,
    pub data: Vec<u8>,
}

impl FileTransport {
    const LAST_BLOCK: u32 = 0x8000_0000;

    /// Request for block `block_number` of an open file
    #[must_use]
    pub fn request(handle: u32, block_number: u32) -> Self {
        Self {
            handle,
            block_number,
            last: false,
            data: Vec::new(),
        }
    }

    pub fn encode(&self, buffer: &mut BytesMut) -> Dnp3Result<()> {
        let mut block = self.block_number & !Self::LAST_BLOCK;
        if self.last {
            block |= Self::LAST_BLOCK;
        }
        buffer.put_u32_le(self.handle);
        buffer.put_u32_le(block);
        buffer.put_slice(&self.data);
        Ok(())
    }

    /// Decode an object occupying exactly `size` bytes
    pub fn decode(cursor: &mut ReadCursor<'_>, size: usize) -> Dnp3Result<Self> {
        if size < 8 {
            return Err(Dnp3Error::FragmentInvalid(format!(
                "file transport object of {} bytes",
                size
            )));
        }
        let handle = cursor.read_u32()?;
        let block = cursor.read_u32()?;
        let data = cursor.read_bytes(size - 8)?.to_vec();
        Ok(Self {
            handle,
            block_number: block & !Self::LAST_BLOCK,
            last: block & Self::LAST_BLOCK != 0,
            data,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_command_layout() {
        let command = FileCommand::open_for_read("/log.txt", 1024, 7);
        let mut buffer = BytesMut::new();
        command.encode(&mut buffer).unwrap();
        assert_eq!(buffer.len(), 26 + 8);
        assert_eq!(&buffer[0..4], &[26, 0, 8, 0]);
        let mut cursor = ReadCursor::new(&buffer);
        assert_eq!(FileCommand::decode(&mut cursor).unwrap(), command);
    }

    #[test]
    fn test_file_transport_last_bit() {
        let data = [0x01, 0x00, 0x00, 0x00, 0x02, 0x00, 0x00, 0x80, 0xAA, 0xBB];
        let mut cursor = ReadCursor::new(&data);
        let block = FileTransport::decode(&mut cursor, data.len()).unwrap();
        assert_eq!(block.handle, 1);
        assert_eq!(block.block_number, 2);
        assert!(block.last);
        assert_eq!(block.data, vec![0xAA, 0xBB]);
    }

    #[test]
    fn test_file_status_text() {
        let status = FileCommandStatus {
            handle: 9,
            file_size: 100,
            max_block_size: 512,
            request_id: 1,
            status: FileStatus::FileNotFound,
            text: "missing".to_string(),
        };
        let mut buffer = BytesMut::new();
        status.encode(&mut buffer).unwrap();
        let mut cursor = ReadCursor::new(&buffer);
        assert_eq!(FileCommandStatus::decode(&mut cursor, buffer.len()).unwrap(), status);
    }
}
