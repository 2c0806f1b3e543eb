//! Control handling
//!
//! The [`CommandArbiter`] enforces select-before-operate: an OPERATE is accepted only
//! when it directly follows a SELECT of the same point with the same parameters and
//! arrives before the select timeout. Whether a control is actually carried out is
//! decided by the application's [`ControlHandler`], whose status is reported verbatim.

use crate::database::{Database, UpdateMode};
use dnp3_application::{CommandObject, Sequence};
use dnp3_core::{
    AnalogOutputStatus, BinaryOutputStatus, CommandStatus, Control, Flags, PointType,
};
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;

/// How an OPERATE was requested
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperateType {
    /// OPERATE following a SELECT
    SelectBeforeOperate,
    DirectOperate,
    /// DIRECT_OPERATE_NR, the master expects no response
    DirectOperateNoAck,
}

/// Application callbacks that carry out controls
///
/// Called from the outstation task, once per control object.
#[cfg_attr(test, mockall::automock)]
pub trait ControlHandler: Send {
    /// Called before the controls of one request
    fn begin_fragment(&mut self) {}

    /// Called after the controls of one request
    fn end_fragment(&mut self, _database: &mut Database) {}

    /// Check whether a control could be carried out, without doing it
    fn select(&mut self, index: u16, control: &Control) -> CommandStatus;

    /// Carry out a control
    ///
    /// On `Success` the arbiter reflects the commanded value in the output status point
    /// of the same index. The handler may update other points through `database`.
    fn operate(
        &mut self,
        index: u16,
        control: &Control,
        op_type: OperateType,
        database: &mut Database,
    ) -> CommandStatus;
}

/// Handler that accepts every control
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAllControls;

impl ControlHandler for AcceptAllControls {
    fn select(&mut self, _index: u16, _control: &Control) -> CommandStatus {
        CommandStatus::Success
    }

    fn operate(
        &mut self,
        index: u16,
        _control: &Control,
        op_type: OperateType,
        _database: &mut Database,
    ) -> CommandStatus {
        log::debug!("accepted {:?} of output {}", op_type, index);
        CommandStatus::Success
    }
}

/// Where a control request sits in the request stream
#[derive(Debug, Clone, Copy)]
pub(crate) struct RequestContext {
    pub(crate) seq: Sequence,
    /// Number of the request among all requests received
    pub(crate) frame: u32,
    pub(crate) received: Instant,
}

#[derive(Debug, Clone, Copy)]
struct Selection {
    control: Control,
    seq: Sequence,
    frame: u32,
    at: Instant,
}

#[derive(Debug)]
pub(crate) struct CommandArbiter {
    select_timeout: Duration,
    max_controls: usize,
    selections: HashMap<(PointType, u16), Selection>,
}

impl CommandArbiter {
    pub(crate) fn new(select_timeout: Duration, max_controls: usize) -> Self {
        Self {
            select_timeout,
            max_controls,
            selections: HashMap::new(),
        }
    }

    #[cfg(test)]
    fn selected(&self) -> usize {
        self.selections.len()
    }

    fn too_many(&self, objects: &[CommandObject]) -> Option<Vec<CommandObject>> {
        if self.max_controls != 0 && objects.len() > self.max_controls {
            log::warn!(
                "{} controls in one request, limit is {}",
                objects.len(),
                self.max_controls
            );
            return Some(
                objects
                    .iter()
                    .map(|o| o.with_status(CommandStatus::TooManyOps))
                    .collect(),
            );
        }
        None
    }

    fn validate(object: &CommandObject, db: &Database) -> Result<(), CommandStatus> {
        if !object.control.is_valid() {
            return Err(CommandStatus::FormatError);
        }
        if db.get(object.control.feedback_type(), object.index).is_none() {
            log::warn!(
                "control of {} {} which does not exist",
                object.control.feedback_type(),
                object.index
            );
            return Err(CommandStatus::NotSupported);
        }
        Ok(())
    }

    /// Handle a SELECT request, returning the objects to echo with their status
    pub(crate) fn select(
        &mut self,
        objects: &[CommandObject],
        ctx: RequestContext,
        db: &mut Database,
        handler: &mut dyn ControlHandler,
    ) -> Vec<CommandObject> {
        if let Some(rejected) = self.too_many(objects) {
            return rejected;
        }
        handler.begin_fragment();
        let results = objects
            .iter()
            .map(|object| {
                let key = (object.control.feedback_type(), object.index);
                // any earlier selection of this point is superseded
                self.selections.remove(&key);
                let status = match Self::validate(object, db) {
                    Ok(()) => handler.select(object.index, &object.control),
                    Err(status) => status,
                };
                if status == CommandStatus::Success {
                    self.selections.insert(
                        key,
                        Selection {
                            control: object.control,
                            seq: ctx.seq,
                            frame: ctx.frame,
                            at: ctx.received,
                        },
                    );
                }
                object.with_status(status)
            })
            .collect();
        handler.end_fragment(db);
        results
    }

    /// Handle an OPERATE request
    pub(crate) fn operate(
        &mut self,
        objects: &[CommandObject],
        ctx: RequestContext,
        db: &mut Database,
        handler: &mut dyn ControlHandler,
    ) -> Vec<CommandObject> {
        if let Some(rejected) = self.too_many(objects) {
            return rejected;
        }
        handler.begin_fragment();
        let results = objects
            .iter()
            .map(|object| {
                let status = match Self::validate(object, db)
                    .and_then(|()| self.match_selection(object, ctx))
                {
                    Ok(()) => Self::execute(object, OperateType::SelectBeforeOperate, db, handler),
                    Err(status) => status,
                };
                object.with_status(status)
            })
            .collect();
        handler.end_fragment(db);
        results
    }

    /// Handle DIRECT_OPERATE and DIRECT_OPERATE_NR
    pub(crate) fn direct_operate(
        &mut self,
        objects: &[CommandObject],
        op_type: OperateType,
        db: &mut Database,
        handler: &mut dyn ControlHandler,
    ) -> Vec<CommandObject> {
        if let Some(rejected) = self.too_many(objects) {
            return rejected;
        }
        handler.begin_fragment();
        let results = objects
            .iter()
            .map(|object| {
                let status = match Self::validate(object, db) {
                    Ok(()) => Self::execute(object, op_type, db, handler),
                    Err(status) => status,
                };
                object.with_status(status)
            })
            .collect();
        handler.end_fragment(db);
        results
    }

    /// Consume the selection of the object's point and check it matches
    fn match_selection(
        &mut self,
        object: &CommandObject,
        ctx: RequestContext,
    ) -> Result<(), CommandStatus> {
        let key = (object.control.feedback_type(), object.index);
        let Some(selection) = self.selections.remove(&key) else {
            log::warn!("OPERATE of output {} without SELECT", object.index);
            return Err(CommandStatus::NoSelect);
        };
        if selection.seq.next() != ctx.seq {
            log::warn!("OPERATE with non-consecutive sequence number");
            return Err(CommandStatus::NoSelect);
        }
        if selection.frame.wrapping_add(1) != ctx.frame {
            log::warn!("OPERATE does not directly follow its SELECT");
            return Err(CommandStatus::NoSelect);
        }
        if !selection.control.same_parameters(&object.control) {
            log::warn!("OPERATE parameters differ from SELECT");
            return Err(CommandStatus::NoSelect);
        }
        if ctx.received.saturating_duration_since(selection.at) > self.select_timeout {
            log::warn!("OPERATE after select timeout");
            return Err(CommandStatus::Timeout);
        }
        Ok(())
    }

    fn execute(
        object: &CommandObject,
        op_type: OperateType,
        db: &mut Database,
        handler: &mut dyn ControlHandler,
    ) -> CommandStatus {
        let status = handler.operate(object.index, &object.control, op_type, db);
        if status == CommandStatus::Success {
            apply_feedback(object, db);
        }
        status
    }
}

/// Reflect a successful control in the output status point of the same index
fn apply_feedback(object: &CommandObject, db: &mut Database) {
    let result = match object.control {
        Control::Crob(crob) => match crob.commanded_state() {
            Some(state) => db.update(
                object.index,
                BinaryOutputStatus::new(state, Flags::ONLINE, None),
                UpdateMode::Detect,
            ),
            None => return,
        },
        Control::AnalogOutput(value) => db.update(
            object.index,
            AnalogOutputStatus::new(value.value(), Flags::ONLINE, None),
            UpdateMode::Detect,
        ),
    };
    if let Err(err) = result {
        log::warn!("control feedback not applied: {}", err);
    }
}
