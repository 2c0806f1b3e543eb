//! Application control field and request/response headers

use crate::function::FunctionCode;
use crate::objects::ObjectHeader;
use crate::parse::parse_object_headers;
use crate::sequence::Sequence;
use dnp3_core::{Dnp3Error, Dnp3Result, Iin};
use std::fmt;

/// Application control field: FIR, FIN, CON, UNS and the sequence number
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Control {
    pub fir: bool,
    pub fin: bool,
    pub con: bool,
    pub uns: bool,
    pub seq: Sequence,
}

impl Control {
    const FIR: u8 = 0x80;
    const FIN: u8 = 0x40;
    const CON: u8 = 0x20;
    const UNS: u8 = 0x10;

    /// Single-fragment request from a master
    #[must_use]
    pub const fn request(seq: Sequence) -> Self {
        Self {
            fir: true,
            fin: true,
            con: false,
            uns: false,
            seq,
        }
    }

    /// Solicited response fragment
    #[must_use]
    pub const fn response(seq: Sequence, fir: bool, fin: bool, con: bool) -> Self {
        Self {
            fir,
            fin,
            con,
            uns: false,
            seq,
        }
    }

    /// Unsolicited response fragment
    #[must_use]
    pub const fn unsolicited_response(seq: Sequence, con: bool) -> Self {
        Self {
            fir: true,
            fin: true,
            con,
            uns: true,
            seq,
        }
    }

    /// Confirm of a solicited (`uns == false`) or unsolicited response
    #[must_use]
    pub const fn confirm(seq: Sequence, uns: bool) -> Self {
        Self {
            fir: true,
            fin: true,
            con: false,
            uns,
            seq,
        }
    }

    #[must_use]
    pub const fn from_u8(value: u8) -> Self {
        Self {
            fir: value & Self::FIR != 0,
            fin: value & Self::FIN != 0,
            con: value & Self::CON != 0,
            uns: value & Self::UNS != 0,
            seq: Sequence::new(value),
        }
    }

    #[must_use]
    pub const fn to_u8(&self) -> u8 {
        let mut value = self.seq.value();
        if self.fir {
            value |= Self::FIR;
        }
        if self.fin {
            value |= Self::FIN;
        }
        if self.con {
            value |= Self::CON;
        }
        if self.uns {
            value |= Self::UNS;
        }
        value
    }

    #[must_use]
    pub const fn is_fir_and_fin(&self) -> bool {
        self.fir && self.fin
    }
}

impl fmt::Display for Control {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[fir: {} fin: {} con: {} uns: {} seq: {}]",
            self.fir, self.fin, self.con, self.uns, self.seq
        )
    }
}

/// Header of a request: control field and function code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestHeader {
    pub control: Control,
    pub function: FunctionCode,
}

impl RequestHeader {
    pub const LENGTH: usize = 2;

    #[must_use]
    pub const fn new(control: Control, function: FunctionCode) -> Self {
        Self { control, function }
    }

    #[must_use]
    pub const fn to_bytes(&self) -> [u8; 2] {
        [self.control.to_u8(), self.function.as_u8()]
    }
}

/// Header of a response: control field, function code and IIN
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseHeader {
    pub control: Control,
    pub function: FunctionCode,
    pub iin: Iin,
}

impl ResponseHeader {
    pub const LENGTH: usize = 4;

    #[must_use]
    pub const fn new(control: Control, function: FunctionCode, iin: Iin) -> Self {
        Self {
            control,
            function,
            iin,
        }
    }

    #[must_use]
    pub const fn is_unsolicited(&self) -> bool {
        matches!(self.function, FunctionCode::UnsolicitedResponse)
    }

    #[must_use]
    pub const fn to_bytes(&self) -> [u8; 4] {
        let iin = self.iin.to_bytes();
        [self.control.to_u8(), self.function.as_u8(), iin[0], iin[1]]
    }
}

/// A received request fragment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Request<'a> {
    pub header: RequestHeader,
    pub objects: &'a [u8],
}

impl<'a> Request<'a> {
    /// Parse the request header
    ///
    /// Object headers are parsed lazily by [`Request::object_headers`] so that a
    /// malformed object section can still be answered with the right sequence number.
    ///
    /// # Errors
    ///
    /// Returns `Dnp3Error::FragmentInvalid` for a fragment shorter than the header,
    /// `Dnp3Error::UnknownFunction` for an unknown code, and `Dnp3Error::Protocol`
    /// if the function code is a response code.
    pub fn parse(data: &'a [u8]) -> Dnp3Result<Self> {
        if data.len() < RequestHeader::LENGTH {
            return Err(Dnp3Error::FragmentInvalid(format!(
                "request of {} bytes is shorter than its header",
                data.len()
            )));
        }
        let control = Control::from_u8(data[0]);
        let function =
            FunctionCode::from_u8(data[1]).ok_or(Dnp3Error::UnknownFunction(data[1]))?;
        if function.is_response() {
            return Err(Dnp3Error::Protocol(format!(
                "response function {} in a request",
                function
            )));
        }
        Ok(Self {
            header: RequestHeader::new(control, function),
            objects: &data[RequestHeader::LENGTH..],
        })
    }

    /// Parse the object headers that follow the request header
    pub fn object_headers(&self) -> Dnp3Result<Vec<ObjectHeader>> {
        parse_object_headers(self.objects, self.header.function.request_has_object_data())
    }
}

/// A received response fragment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Response<'a> {
    pub header: ResponseHeader,
    pub objects: &'a [u8],
}

impl<'a> Response<'a> {
    /// Parse the response header
    ///
    /// # Errors
    ///
    /// Fails if the fragment is shorter than four bytes or does not carry a
    /// RESPONSE/UNSOLICITED_RESPONSE function code.
    pub fn parse(data: &'a [u8]) -> Dnp3Result<Self> {
        if data.len() < ResponseHeader::LENGTH {
            return Err(Dnp3Error::FragmentInvalid(format!(
                "response of {} bytes is shorter than its header",
                data.len()
            )));
        }
        let control = Control::from_u8(data[0]);
        let function =
            FunctionCode::from_u8(data[1]).ok_or(Dnp3Error::UnknownFunction(data[1]))?;
        if !function.is_response() {
            return Err(Dnp3Error::Protocol(format!(
                "request function {} in a response",
                function
            )));
        }
        let iin = Iin::from_bytes([data[2], data[3]]);
        Ok(Self {
            header: ResponseHeader::new(control, function, iin),
            objects: &data[ResponseHeader::LENGTH..],
        })
    }

    /// Parse the object headers that follow the response header
    pub fn object_headers(&self) -> Dnp3Result<Vec<ObjectHeader>> {
        parse_object_headers(self.objects, true)
    }
}
