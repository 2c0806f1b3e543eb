//! Callbacks invoked by the association worker
//!
//! Handlers are owned by the worker and called synchronously from it, so they must not
//! block for long.

use crate::association::ConnectionState;
use crate::error::TaskError;
use dnp3_application::{
    FunctionCode, ObjectData, ObjectHeader, QualifierCode, ResponseHeader, Sequence, Variation,
};
use dnp3_core::{Iin, Measurement, Timestamp};
use std::time::SystemTime;

/// Why a response carrying measurements was received
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReadType {
    /// Integrity poll run automatically on (re)connection or remediation
    StartupIntegrity,
    /// Unsolicited response
    Unsolicited,
    /// Read submitted once by the user
    SinglePoll,
    /// Read run by a periodic poll or an automatic event scan
    PeriodicPoll,
}

/// Description of an object header passed alongside its measurements
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderInfo {
    pub variation: Variation,
    pub qualifier: QualifierCode,
    /// True for event variations
    pub is_event: bool,
}

/// Receiver of measurements extracted from responses
pub trait ReadHandler: Send {
    /// Called before the headers of a fragment are handled
    fn begin_fragment(&mut self, _read_type: ReadType, _iin: Iin) {}

    /// Called once per measurement header
    fn handle_measurements(&mut self, info: HeaderInfo, measurements: &[(u16, Measurement)]);

    /// Called after every header of a fragment has been handled
    fn end_fragment(&mut self, _read_type: ReadType, _iin: Iin) {}
}

/// Application services needed by an association
pub trait AssociationHandler: Send {
    /// Current time used for time synchronization
    ///
    /// `None` makes time synchronization fail with `SystemTimeNotAvailable`.
    fn get_current_time(&self) -> Option<Timestamp> {
        Timestamp::try_from_system_time(SystemTime::now())
    }
}

/// Kind of task reported to [`AssociationInformation`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskType {
    UserRead,
    PeriodicPoll,
    StartupIntegrity,
    AutoEventScan,
    Command,
    ClearRestartBit,
    EnableUnsolicited,
    DisableUnsolicited,
    TimeSync,
    Restart,
    LinkStatus,
    FileRead,
}

/// Observer of association activity
pub trait AssociationInformation: Send {
    /// A request of the task was sent; multi-step tasks report every request
    fn task_start(&mut self, _task_type: TaskType, _function: FunctionCode, _seq: Sequence) {}

    fn task_success(&mut self, _task_type: TaskType) {}

    /// An attempt failed; the task may still be retried
    fn task_fail(&mut self, _task_type: TaskType, _error: &TaskError) {}

    /// An unsolicited response was received
    fn unsolicited_response(&mut self, _is_duplicate: bool, _seq: Sequence) {}

    fn connection_state_changed(&mut self, _state: ConnectionState) {}
}

/// Handler that ignores everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NullHandler;

impl ReadHandler for NullHandler {
    fn handle_measurements(&mut self, _info: HeaderInfo, _measurements: &[(u16, Measurement)]) {}
}

impl AssociationHandler for NullHandler {}

impl AssociationInformation for NullHandler {}

/// Pass every measurement header of a response to `handler`
pub(crate) fn extract_measurements(
    read_type: ReadType,
    header: &ResponseHeader,
    objects: &[ObjectHeader],
    handler: &mut dyn ReadHandler,
) {
    handler.begin_fragment(read_type, header.iin);
    for object in objects {
        if let ObjectData::Measurements(values) = &object.data {
            let info = HeaderInfo {
                variation: object.variation,
                qualifier: object.qualifier,
                is_event: object
                    .variation
                    .layout()
                    .map(|layout| layout.event)
                    .unwrap_or(false),
            };
            handler.handle_measurements(info, values);
        }
    }
    handler.end_fragment(read_type, header.iin);
}

#[cfg(test)]
mod tests {
    use super::*;
    use dnp3_application::{Control, HeaderRange};
    use dnp3_core::{AnalogInput, Flags};

    #[derive(Default)]
    struct Recorder {
        calls: Vec<String>,
    }

    impl ReadHandler for Recorder {
        fn begin_fragment(&mut self, read_type: ReadType, _iin: Iin) {
            self.calls.push(format!("begin {:?}", read_type));
        }

        fn handle_measurements(&mut self, info: HeaderInfo, measurements: &[(u16, Measurement)]) {
            self.calls.push(format!(
                "{} event={} n={}",
                info.variation,
                info.is_event,
                measurements.len()
            ));
        }

        fn end_fragment(&mut self, _read_type: ReadType, _iin: Iin) {
            self.calls.push("end".to_string());
        }
    }

    #[test]
    fn test_extract_skips_non_measurement_headers() {
        let header = ResponseHeader::new(
            Control::response(Sequence::new(0), true, true, false),
            FunctionCode::Response,
            Iin::default(),
        );
        let value = Measurement::from(AnalogInput::new(1.0, Flags::ONLINE, None));
        let objects = vec![
            ObjectHeader::new(
                Variation::Group32Var1,
                QualifierCode::CountAndPrefix16,
                HeaderRange::Count(1),
                ObjectData::Measurements(vec![(7, value)]),
            ),
            ObjectHeader::new(
                Variation::Group80Var1,
                QualifierCode::Range8,
                HeaderRange::Range { start: 7, stop: 7 },
                ObjectData::IinBits(vec![(7, false)]),
            ),
        ];
        let mut recorder = Recorder::default();
        extract_measurements(ReadType::SinglePoll, &header, &objects, &mut recorder);
        assert_eq!(recorder.calls, vec!["begin SinglePoll", "g32v1 event=true n=1", "end"]);
    }
}
