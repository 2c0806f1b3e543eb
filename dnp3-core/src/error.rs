use thiserror::Error;

/// Main error type for DNP3 operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Dnp3Error {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Timeout")]
    Timeout,

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Fragment invalid: {0}")]
    FragmentInvalid(String),

    #[error("Unknown object g{group}v{variation}")]
    UnknownObject { group: u8, variation: u8 },

    #[error("Unknown function code {0}")]
    UnknownFunction(u8),

    #[error("Unsupported qualifier 0x{0:02X}")]
    UnsupportedQualifier(u8),

    #[error("Fragment buffer overflow: {needed} bytes needed, {remaining} remaining")]
    WriteOverflow { needed: usize, remaining: usize },

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias for DNP3 operations
pub type Dnp3Result<T> = Result<T, Dnp3Error>;
