//! Application layer module for the DNP3 protocol
//!
//! This crate provides the application-layer fragment codec shared by master and
//! outstation: function codes, control fields and headers, sequence numbers, the
//! supported object variations, and a parser and writer for object headers.

pub mod cursor;
pub mod file;
pub mod function;
pub mod header;
pub mod measurement;
pub mod objects;
pub mod parse;
pub mod sequence;
pub mod variation;
pub mod writer;

pub use file::{FileCommand, FileCommandStatus, FileMode, FileStatus, FileTransport};
pub use function::FunctionCode;
pub use header::{Control, Request, RequestHeader, Response, ResponseHeader};
pub use objects::{CommandObject, HeaderRange, ObjectData, ObjectHeader, QualifierCode};
pub use parse::parse_object_headers;
pub use sequence::Sequence;
pub use variation::Variation;
pub use writer::FragmentWriter;
