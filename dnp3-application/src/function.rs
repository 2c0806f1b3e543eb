use std::fmt;

/// Application-layer function code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FunctionCode {
    Confirm,
    Read,
    Write,
    Select,
    Operate,
    DirectOperate,
    DirectOperateNoResponse,
    ColdRestart,
    WarmRestart,
    EnableUnsolicited,
    DisableUnsolicited,
    DelayMeasure,
    RecordCurrentTime,
    OpenFile,
    CloseFile,
    Response,
    UnsolicitedResponse,
}

impl FunctionCode {
    /// Decode a function code byte
    ///
    /// # Returns
    ///
    /// `None` for codes this implementation does not know. The outstation answers those
    /// with IIN2 NO_FUNC_CODE_SUPPORT.
    #[must_use]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Confirm),
            1 => Some(Self::Read),
            2 => Some(Self::Write),
            3 => Some(Self::Select),
            4 => Some(Self::Operate),
            5 => Some(Self::DirectOperate),
            6 => Some(Self::DirectOperateNoResponse),
            13 => Some(Self::ColdRestart),
            14 => Some(Self::WarmRestart),
            20 => Some(Self::EnableUnsolicited),
            21 => Some(Self::DisableUnsolicited),
            23 => Some(Self::DelayMeasure),
            24 => Some(Self::RecordCurrentTime),
            25 => Some(Self::OpenFile),
            26 => Some(Self::CloseFile),
            129 => Some(Self::Response),
            130 => Some(Self::UnsolicitedResponse),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_u8(&self) -> u8 {
        match self {
            Self::Confirm => 0,
            Self::Read => 1,
            Self::Write => 2,
            Self::Select => 3,
            Self::Operate => 4,
            Self::DirectOperate => 5,
            Self::DirectOperateNoResponse => 6,
            Self::ColdRestart => 13,
            Self::WarmRestart => 14,
            Self::EnableUnsolicited => 20,
            Self::DisableUnsolicited => 21,
            Self::DelayMeasure => 23,
            Self::RecordCurrentTime => 24,
            Self::OpenFile => 25,
            Self::CloseFile => 26,
            Self::Response => 129,
            Self::UnsolicitedResponse => 130,
        }
    }

    /// Sent by an outstation rather than a master
    #[must_use]
    pub const fn is_response(&self) -> bool {
        matches!(self, Self::Response | Self::UnsolicitedResponse)
    }

    /// Object headers in a request with this function carry object data
    ///
    /// READ requests name objects by range or count only.
    #[must_use]
    pub const fn request_has_object_data(&self) -> bool {
        !matches!(self, Self::Read)
    }
}

impl fmt::Display for FunctionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}({})", self, self.as_u8())
    }
}
