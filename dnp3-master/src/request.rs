//! Requests that can be submitted to an association

use crate::error::{CommandResponseError, TaskError};
use dnp3_application::{
    CommandObject, FragmentWriter, FunctionCode, ObjectData, ObjectHeader, Variation,
};
use dnp3_core::{Classes, CommandStatus, Control};

/// Objects requested by a READ
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadRequest {
    /// Class 0/1/2/3 data
    ClassScan(Classes),
    /// Points `start..=stop` of one variation
    Range {
        variation: Variation,
        start: u16,
        stop: u16,
    },
    /// Every point of one variation
    AllObjects(Variation),
    /// Several of the above in one request
    Multiple(Vec<ReadRequest>),
}

impl ReadRequest {
    /// Class 0/1/2/3 scan
    #[must_use]
    pub fn integrity() -> Self {
        Self::ClassScan(Classes::all())
    }

    #[must_use]
    pub fn class_scan(classes: Classes) -> Self {
        Self::ClassScan(classes)
    }

    #[must_use]
    pub fn range(variation: Variation, start: u16, stop: u16) -> Self {
        Self::Range {
            variation,
            start,
            stop,
        }
    }

    pub(crate) fn write(&self, writer: &mut FragmentWriter) -> Result<(), TaskError> {
        match self {
            Self::ClassScan(classes) => {
                if !classes.any() {
                    return Err(TaskError::BadRequest("class scan without classes".to_string()));
                }
                writer.write_class_read(*classes)?;
            }
            Self::Range {
                variation,
                start,
                stop,
            } => {
                if start > stop {
                    return Err(TaskError::BadRequest(format!(
                        "range start {} is after stop {}",
                        start, stop
                    )));
                }
                writer.write_range(*variation, *start, *stop)?;
            }
            Self::AllObjects(variation) => writer.write_all_objects(*variation)?,
            Self::Multiple(requests) => {
                for request in requests {
                    request.write(writer)?;
                }
            }
        }
        Ok(())
    }
}

/// How a command is delivered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandMode {
    /// DIRECT_OPERATE, answered with an echo
    DirectOperate,
    /// DIRECT_OPERATE_NR, no response expected
    DirectOperateNoAck,
    /// SELECT followed by OPERATE with the identical objects
    SelectBeforeOperate,
}

/// Ordered control objects of a command request
///
/// Consecutive objects of the same variation share one object header.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommandHeaders {
    objects: Vec<CommandObject>,
}

impl CommandHeaders {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`CommandHeaders::push`]
    #[must_use]
    pub fn add(mut self, index: u16, control: impl Into<Control>) -> Self {
        self.push(index, control);
        self
    }

    pub fn push(&mut self, index: u16, control: impl Into<Control>) {
        self.objects.push(CommandObject::new(index, control));
    }

    pub fn objects(&self) -> &[CommandObject] {
        &self.objects
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    fn groups(&self) -> impl Iterator<Item = &[CommandObject]> {
        self.objects
            .chunk_by(|a, b| a.variation() == b.variation())
    }

    pub(crate) fn write(&self, writer: &mut FragmentWriter) -> Result<(), TaskError> {
        for group in self.groups() {
            writer.write_commands(group)?;
        }
        Ok(())
    }

    /// Verify that a response echoes these objects with a success status
    ///
    /// # Errors
    ///
    /// The first non-success status found is reported as `BadStatus`; structural
    /// differences are reported as count or value mismatches.
    pub(crate) fn compare(&self, headers: &[ObjectHeader]) -> Result<(), CommandResponseError> {
        let groups: Vec<&[CommandObject]> = self.groups().collect();
        if groups.len() != headers.len() {
            return Err(CommandResponseError::HeaderCountMismatch);
        }
        for (expected, header) in groups.iter().zip(headers) {
            let ObjectData::Commands(received) = &header.data else {
                return Err(CommandResponseError::HeaderCountMismatch);
            };
            if received.len() != expected.len() {
                return Err(CommandResponseError::ObjectCountMismatch);
            }
            for (sent, echoed) in expected.iter().zip(received) {
                if echoed.status != CommandStatus::Success {
                    return Err(CommandResponseError::BadStatus(echoed.status));
                }
                if sent.index != echoed.index || !sent.control.same_parameters(&echoed.control) {
                    return Err(CommandResponseError::ObjectValueMismatch);
                }
            }
        }
        Ok(())
    }
}

/// Restart requested from the outstation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RestartType {
    Cold,
    Warm,
}

impl RestartType {
    pub(crate) const fn function(&self) -> FunctionCode {
        match self {
            Self::Cold => FunctionCode::ColdRestart,
            Self::Warm => FunctionCode::WarmRestart,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dnp3_application::{
        Control as AppControl, HeaderRange, QualifierCode, RequestHeader, Sequence,
    };
    use dnp3_core::{AnalogOutput, Crob, OpType};

    fn writer() -> FragmentWriter {
        FragmentWriter::request(
            RequestHeader::new(AppControl::request(Sequence::new(0)), FunctionCode::Operate),
            2048,
        )
    }

    fn echo(headers: &CommandHeaders) -> Vec<ObjectHeader> {
        headers
            .groups()
            .map(|group| {
                ObjectHeader::new(
                    group[0].variation(),
                    QualifierCode::CountAndPrefix16,
                    HeaderRange::Count(group.len() as u16),
                    ObjectData::Commands(group.to_vec()),
                )
            })
            .collect()
    }

    #[test]
    fn test_groups_by_variation() {
        let headers = CommandHeaders::new()
            .add(1, Crob::from_op_type(OpType::LatchOn))
            .add(2, Crob::from_op_type(OpType::LatchOff))
            .add(3, AnalogOutput::I16(5));
        assert_eq!(headers.groups().count(), 2);
        let mut writer = writer();
        headers.write(&mut writer).unwrap();
        assert!(writer.has_objects());
    }

    #[test]
    fn test_compare_accepts_echo() {
        let headers = CommandHeaders::new().add(3, Crob::from_op_type(OpType::LatchOn));
        assert_eq!(headers.compare(&echo(&headers)), Ok(()));
    }

    #[test]
    fn test_compare_reports_status_and_mismatch() {
        let headers = CommandHeaders::new().add(3, Crob::from_op_type(OpType::LatchOn));

        let mut rejected = echo(&headers);
        if let ObjectData::Commands(objects) = &mut rejected[0].data {
            objects[0] = objects[0].with_status(CommandStatus::NoSelect);
        }
        assert_eq!(
            headers.compare(&rejected),
            Err(CommandResponseError::BadStatus(CommandStatus::NoSelect))
        );

        let other = CommandHeaders::new().add(4, Crob::from_op_type(OpType::LatchOn));
        assert_eq!(
            headers.compare(&echo(&other)),
            Err(CommandResponseError::ObjectValueMismatch)
        );
        assert_eq!(headers.compare(&[]), Err(CommandResponseError::HeaderCountMismatch));
    }

    #[test]
    fn test_read_range_validation() {
        let mut writer = writer();
        assert!(ReadRequest::range(Variation::Group30Var0, 5, 1).write(&mut writer).is_err());
        assert!(ReadRequest::class_scan(Classes::none()).write(&mut writer).is_err());
        ReadRequest::Multiple(vec![
            ReadRequest::AllObjects(Variation::Group1Var0),
            ReadRequest::range(Variation::Group30Var0, 0, 9),
        ])
        .write(&mut writer)
        .unwrap();
        assert_eq!(writer.len(), 2 + 3 + 5);
    }
}
