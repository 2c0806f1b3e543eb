//! Association worker
//!
//! Each association runs in its own task. It owns the [`Association`] and the user
//! handlers, executes one task at a time, and processes messages from the channel
//! (received fragments, link changes, user requests) while idle and while waiting for
//! responses. All async methods take `&mut self` because the handlers are `Send` only.

use crate::association::{Association, ConnectionState};
use crate::auto::event_scan_classes;
use crate::config::TimeSyncProcedure;
use crate::error::{CommandResponseError, TaskError, TimeSyncError};
use crate::handler::{
    extract_measurements, AssociationHandler, AssociationInformation, ReadHandler, ReadType,
    TaskType,
};
use crate::poll::Next;
use crate::request::{CommandHeaders, CommandMode, ReadRequest, RestartType};
use crate::task::{Task, TaskKind, TaskOutput};
use bytes::Bytes;
use dnp3_application::{
    Control, FileCommand, FileCommandStatus, FileStatus, FileTransport, FragmentWriter,
    FunctionCode, ObjectData, ObjectHeader, RequestHeader, Response, ResponseHeader, Sequence,
    Variation,
};
use dnp3_core::{Classes, EndpointAddress, EventClasses, Timestamp};
use dnp3_transport::{Fragment, FragmentSink, LinkState};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;

/// Message sent from the channel and handles to an association worker
#[derive(Debug)]
pub(crate) enum Message {
    Fragment(Fragment),
    Link(LinkState),
    Submit(Task),
    SetEnabled(bool),
    AddPoll {
        request: ReadRequest,
        period: Duration,
        reply: oneshot::Sender<u64>,
    },
    RemovePoll(u64),
    DemandPoll(u64),
    Shutdown,
}

/// Event that aborts the task in flight
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Interrupt {
    LinkDown,
    Disabled,
    Shutdown,
}

impl From<Interrupt> for TaskError {
    fn from(interrupt: Interrupt) -> Self {
        match interrupt {
            Interrupt::LinkDown => TaskError::NoConnection,
            Interrupt::Disabled => TaskError::Disabled,
            Interrupt::Shutdown => TaskError::Shutdown,
        }
    }
}

/// User callbacks owned by the worker
pub(crate) struct Handlers {
    pub(crate) read: Box<dyn ReadHandler>,
    pub(crate) association: Box<dyn AssociationHandler>,
    pub(crate) info: Box<dyn AssociationInformation>,
}

/// Solicited response matched to the task in flight
struct ReceivedResponse {
    header: ResponseHeader,
    data: Bytes,
}

impl ReceivedResponse {
    fn objects(&self) -> Result<Vec<ObjectHeader>, TaskError> {
        Ok(Response::parse(&self.data)?.object_headers()?)
    }

    /// Reject the response if the outstation flagged the request as unsupported
    fn check_iin(&self) -> Result<(), TaskError> {
        if self.header.iin.has_request_error() {
            return Err(TaskError::RejectedByIin2(self.header.iin.iin2));
        }
        Ok(())
    }
}

pub(crate) struct AssociationSession {
    association: Association,
    master: EndpointAddress,
    response_timeout: Duration,
    fragment_size: usize,
    sink: Arc<dyn FragmentSink>,
    receiver: mpsc::UnboundedReceiver<Message>,
    handlers: Handlers,
    /// Last time anything was received from the outstation
    last_rx: Instant,
    /// Last unsolicited fragment processed, for duplicate detection
    last_unsolicited: Option<Bytes>,
    current: Option<TaskType>,
    running: bool,
}

async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

fn find_delay(objects: &[ObjectHeader]) -> Option<Duration> {
    objects.iter().find_map(|header| match header.data {
        ObjectData::Delay(delay) => Some(delay),
        _ => None,
    })
}

impl AssociationSession {
    pub(crate) fn new(
        association: Association,
        master: EndpointAddress,
        response_timeout: Duration,
        fragment_size: usize,
        sink: Arc<dyn FragmentSink>,
        receiver: mpsc::UnboundedReceiver<Message>,
        handlers: Handlers,
    ) -> Self {
        Self {
            association,
            master,
            response_timeout,
            fragment_size,
            sink,
            receiver,
            handlers,
            last_rx: Instant::now(),
            last_unsolicited: None,
            current: None,
            running: true,
        }
    }

    /// Run until shutdown or until every sender is dropped
    pub(crate) async fn run(mut self) {
        log::info!("association {} started", self.association.address());
        while self.running {
            match self.association.next_task(Instant::now()) {
                Next::Now(task) => self.execute(task).await,
                Next::NotBefore(at) => self.idle(Some(at)).await,
                Next::None => self.idle(None).await,
            }
        }

        self.association.fail_all(TaskError::Shutdown);
        self.receiver.close();
        while let Ok(message) = self.receiver.try_recv() {
            if let Message::Submit(task) = message {
                task.fail(TaskError::Shutdown);
            }
        }
        log::info!("association {} stopped", self.association.address());
    }

    fn keep_alive_deadline(&self) -> Option<Instant> {
        if self.association.connection() != ConnectionState::Connected {
            return None;
        }
        self.association
            .config()
            .keep_alive_timeout
            .map(|timeout| self.last_rx + timeout)
    }

    async fn idle(&mut self, wake: Option<Instant>) {
        let keep_alive = self.keep_alive_deadline();
        let deadline = match (wake, keep_alive) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };

        tokio::select! {
            message = self.receiver.recv() => match message {
                Some(message) => {
                    // state changes are applied; nothing is in flight to abort
                    if let Ok(Some(response)) = self.handle_message(message).await {
                        log::warn!(
                            "unexpected response seq {} from {} while idle",
                            response.header.control.seq,
                            self.association.address()
                        );
                    }
                }
                None => self.running = false,
            },
            _ = sleep_until_opt(deadline) => {
                if keep_alive.is_some_and(|at| at <= Instant::now()) {
                    self.keep_alive().await;
                }
            }
        }
    }

    async fn keep_alive(&mut self) {
        log::debug!("keep-alive check for {}", self.association.address());
        if let Err(err) = self.sink.check_link_status(self.association.address()).await {
            log::warn!("keep-alive for {} failed: {}", self.association.address(), err);
        }
        self.last_rx = Instant::now();
    }

    async fn handle_message(
        &mut self,
        message: Message,
    ) -> Result<Option<ReceivedResponse>, Interrupt> {
        match message {
            Message::Fragment(fragment) => return Ok(self.handle_fragment(fragment).await),
            Message::Link(state) => {
                let connection = match state {
                    LinkState::Up => ConnectionState::Connected,
                    LinkState::Down => ConnectionState::Disconnected,
                };
                if connection != self.association.connection() {
                    log::info!("association {} {}", self.association.address(), connection);
                    self.association.set_connection(connection);
                    self.handlers.info.connection_state_changed(connection);
                }
                if connection == ConnectionState::Disconnected {
                    return Err(Interrupt::LinkDown);
                }
                self.last_rx = Instant::now();
            }
            Message::Submit(task) => self.association.submit(task),
            Message::SetEnabled(enabled) => {
                self.association.set_enabled(enabled);
                if !enabled {
                    return Err(Interrupt::Disabled);
                }
            }
            Message::AddPoll {
                request,
                period,
                reply,
            } => {
                let id = self.association.add_poll(request, period, Instant::now());
                let _ = reply.send(id);
            }
            Message::RemovePoll(id) => {
                self.association.remove_poll(id);
            }
            Message::DemandPoll(id) => {
                self.association.demand_poll(id);
            }
            Message::Shutdown => {
                self.running = false;
                return Err(Interrupt::Shutdown);
            }
        }
        Ok(None)
    }

    async fn handle_fragment(&mut self, fragment: Fragment) -> Option<ReceivedResponse> {
        self.last_rx = Instant::now();
        let header = match Response::parse(&fragment.data) {
            Ok(response) => response.header,
            Err(err) => {
                log::warn!("dropping fragment from {}: {}", fragment.source, err);
                return None;
            }
        };

        if header.is_unsolicited() {
            self.handle_unsolicited(header, fragment.data).await;
            return None;
        }

        Some(ReceivedResponse {
            header,
            data: fragment.data,
        })
    }

    async fn handle_unsolicited(&mut self, header: ResponseHeader, data: Bytes) {
        let seq = header.control.seq;
        if !self.association.is_enabled() {
            log::warn!(
                "ignoring unsolicited response from disabled association {}",
                self.association.address()
            );
            return;
        }

        let is_duplicate = self.last_unsolicited.as_ref() == Some(&data);
        self.handlers.info.unsolicited_response(is_duplicate, seq);
        if is_duplicate {
            log::info!("duplicate unsolicited response seq {}", seq);
            if header.control.con {
                self.confirm_unsolicited(seq).await;
            }
            return;
        }

        let objects = match Response::parse(&data).and_then(|response| response.object_headers()) {
            Ok(objects) => objects,
            Err(err) => {
                log::warn!("malformed unsolicited response: {}", err);
                return;
            }
        };

        // data before the first integrity scan would be overwritten anyway; the
        // outstation repeats it if left unconfirmed
        if !objects.is_empty() && !self.association.is_integrity_complete() {
            log::warn!("ignoring unsolicited data before the integrity scan completed");
            return;
        }

        self.association.process_iin(header.iin);
        if !objects.is_empty() {
            extract_measurements(
                ReadType::Unsolicited,
                &header,
                &objects,
                self.handlers.read.as_mut(),
            );
        }
        if header.control.con {
            self.confirm_unsolicited(seq).await;
        }
        self.last_unsolicited = Some(data);
    }

    async fn confirm_unsolicited(&mut self, seq: Sequence) {
        if let Err(err) = self.confirm(seq, true).await {
            log::warn!("unable to confirm unsolicited response: {}", err);
        }
    }

    async fn send(&mut self, data: Bytes) -> Result<(), TaskError> {
        let fragment = Fragment::new(self.master, self.association.address(), data);
        self.sink.send(fragment).await?;
        Ok(())
    }

    async fn confirm(&mut self, seq: Sequence, uns: bool) -> Result<(), TaskError> {
        let writer = FragmentWriter::request(
            RequestHeader::new(Control::confirm(seq, uns), FunctionCode::Confirm),
            self.fragment_size,
        );
        self.send(writer.finish()).await
    }

    /// Build and send a request, returning its sequence number
    async fn send_request(
        &mut self,
        function: FunctionCode,
        build: impl FnOnce(&mut FragmentWriter) -> Result<(), TaskError>,
    ) -> Result<Sequence, TaskError> {
        let seq = self.association.increment_seq();
        let mut writer = FragmentWriter::request(
            RequestHeader::new(Control::request(seq), function),
            self.fragment_size,
        );
        build(&mut writer)?;
        if let Some(task_type) = self.current {
            self.handlers.info.task_start(task_type, function, seq);
        }
        log::debug!("{} seq {} to {}", function, seq, self.association.address());
        self.send(writer.finish()).await?;
        Ok(seq)
    }

    /// Wait for the solicited response carrying `seq`
    ///
    /// Other messages are processed while waiting. Responses with another sequence
    /// number are ignored.
    async fn wait_response(&mut self, seq: Sequence) -> Result<ReceivedResponse, TaskError> {
        let deadline = Instant::now() + self.response_timeout;
        loop {
            let message = tokio::select! {
                message = self.receiver.recv() => message,
                _ = tokio::time::sleep_until(deadline) => return Err(TaskError::ResponseTimeout),
            };
            let Some(message) = message else {
                self.running = false;
                return Err(TaskError::Shutdown);
            };
            if let Some(response) = self.handle_message(message).await? {
                if response.header.control.seq == seq {
                    return Ok(response);
                }
                log::warn!(
                    "ignoring response seq {} while expecting {}",
                    response.header.control.seq,
                    seq
                );
            }
        }
    }

    /// Request answered by a single fragment
    async fn exchange(
        &mut self,
        function: FunctionCode,
        build: impl FnOnce(&mut FragmentWriter) -> Result<(), TaskError>,
    ) -> Result<ReceivedResponse, TaskError> {
        let seq = self.send_request(function, build).await?;
        let response = self.wait_response(seq).await?;
        if !response.header.control.is_fir_and_fin() {
            return Err(TaskError::MultiFragmentResponse);
        }
        self.association.process_iin(response.header.iin);
        if response.header.control.con {
            self.confirm(seq, false).await?;
        }
        Ok(response)
    }

    async fn execute(&mut self, task: Task) {
        let task_type = task.kind.task_type();
        self.current = Some(task_type);
        let result = self.run_task(&task.kind).await;
        self.current = None;

        match &result {
            Ok(_) => self.handlers.info.task_success(task_type),
            Err(err) => {
                log::warn!("{:?} on {} failed: {}", task_type, self.association.address(), err);
                self.handlers.info.task_fail(task_type, err);
            }
        }
        self.association.complete_task(task, result, Instant::now());
    }

    async fn run_task(&mut self, kind: &TaskKind) -> Result<TaskOutput, TaskError> {
        match kind {
            TaskKind::Read { request, read_type } => self.read(request, *read_type).await,
            TaskKind::Poll(due) => self.read(&due.request, ReadType::PeriodicPoll).await,
            TaskKind::StartupIntegrity(classes) => {
                self.read(&ReadRequest::class_scan(*classes), ReadType::StartupIntegrity)
                    .await
            }
            TaskKind::EventScan(classes) => {
                self.read(
                    &ReadRequest::class_scan(event_scan_classes(*classes)),
                    ReadType::PeriodicPoll,
                )
                .await
            }
            TaskKind::Command { mode, headers } => self.operate(*mode, headers).await,
            TaskKind::TimeSync(procedure) => self.synchronize_time(*procedure).await,
            TaskKind::Restart(restart) => self.restart(*restart).await,
            TaskKind::LinkStatus => {
                self.sink.check_link_status(self.association.address()).await?;
                Ok(TaskOutput::Done)
            }
            TaskKind::FileRead {
                file_name,
                max_block_size,
            } => self.read_file(file_name, *max_block_size).await,
            TaskKind::ClearRestartBit => self.clear_restart_bit().await,
            TaskKind::EnableUnsolicited(classes) => {
                self.change_unsolicited(FunctionCode::EnableUnsolicited, *classes).await
            }
            TaskKind::DisableUnsolicited(classes) => {
                self.change_unsolicited(FunctionCode::DisableUnsolicited, *classes).await
            }
        }
    }

    /// READ with possibly many response fragments
    async fn read(
        &mut self,
        request: &ReadRequest,
        read_type: ReadType,
    ) -> Result<TaskOutput, TaskError> {
        let mut seq = self
            .send_request(FunctionCode::Read, |writer| request.write(writer))
            .await?;
        let mut is_first = true;

        loop {
            let response = self.wait_response(seq).await?;
            let control = response.header.control;
            if control.fir && !is_first {
                return Err(TaskError::UnexpectedFir);
            }
            if !control.fir && is_first {
                return Err(TaskError::NeverReceivedFir);
            }
            if !control.fin && !control.con {
                return Err(TaskError::NonFinWithoutCon);
            }

            let objects = response.objects()?;
            self.association.process_iin(response.header.iin);
            if response.header.iin.has_request_error() {
                log::warn!(
                    "read of {} answered with {}",
                    self.association.address(),
                    response.header.iin
                );
            }
            extract_measurements(
                read_type,
                &response.header,
                &objects,
                self.handlers.read.as_mut(),
            );

            if control.con {
                self.confirm(seq, false).await?;
            }
            if control.fin {
                return Ok(TaskOutput::Done);
            }
            is_first = false;
            seq = self.association.increment_seq();
        }
    }

    async fn operate(
        &mut self,
        mode: CommandMode,
        headers: &CommandHeaders,
    ) -> Result<TaskOutput, TaskError> {
        if headers.is_empty() {
            return Err(TaskError::BadRequest("command without objects".to_string()));
        }
        match mode {
            CommandMode::DirectOperate => {
                self.command_exchange(FunctionCode::DirectOperate, headers).await?;
            }
            CommandMode::DirectOperateNoAck => {
                self.send_request(FunctionCode::DirectOperateNoResponse, |writer| {
                    headers.write(writer)
                })
                .await?;
            }
            CommandMode::SelectBeforeOperate => {
                self.command_exchange(FunctionCode::Select, headers).await?;
                self.command_exchange(FunctionCode::Operate, headers).await?;
            }
        }
        Ok(TaskOutput::Done)
    }

    async fn command_exchange(
        &mut self,
        function: FunctionCode,
        headers: &CommandHeaders,
    ) -> Result<(), TaskError> {
        let response = self.exchange(function, |writer| headers.write(writer)).await?;
        let objects = response.objects()?;
        if objects.is_empty() {
            response.check_iin()?;
            return Err(CommandResponseError::HeaderCountMismatch.into());
        }
        headers.compare(&objects)?;
        Ok(())
    }

    fn current_time(&mut self) -> Result<Timestamp, TaskError> {
        self.handlers
            .association
            .get_current_time()
            .ok_or(TaskError::TimeSync(TimeSyncError::SystemTimeNotAvailable))
    }

    fn check_time_iin(response: &ReceivedResponse) -> Result<(), TaskError> {
        if response.header.iin.has_request_error() {
            return Err(TimeSyncError::IinError(response.header.iin.iin2).into());
        }
        Ok(())
    }

    async fn synchronize_time(
        &mut self,
        procedure: TimeSyncProcedure,
    ) -> Result<TaskOutput, TaskError> {
        let time = match procedure {
            TimeSyncProcedure::NonLan => {
                let start = self.current_time()?;
                let response = self.exchange(FunctionCode::DelayMeasure, |_| Ok(())).await?;
                let end = self.current_time()?;
                Self::check_time_iin(&response)?;

                let delay = find_delay(&response.objects()?)
                    .ok_or(TaskError::UnexpectedResponseHeaders)?;
                let elapsed = end
                    .raw_value()
                    .checked_sub(start.raw_value())
                    .ok_or(TimeSyncError::ClockRollback)?;
                let round_trip = Duration::from_millis(elapsed);
                let propagation = round_trip
                    .checked_sub(delay)
                    .ok_or(TimeSyncError::BadOutstationTimeDelay(delay))?
                    / 2;

                let now = self.current_time()?;
                let time = now.checked_add(propagation).ok_or(TimeSyncError::Overflow)?;
                (Variation::Group50Var1, time)
            }
            TimeSyncProcedure::Lan => {
                let recorded = self.current_time()?;
                let response = self.exchange(FunctionCode::RecordCurrentTime, |_| Ok(())).await?;
                Self::check_time_iin(&response)?;
                (Variation::Group50Var3, recorded)
            }
        };

        let (variation, timestamp) = time;
        let response = self
            .exchange(FunctionCode::Write, |writer| Ok(writer.write_time(variation, timestamp)?))
            .await?;
        Self::check_time_iin(&response)?;
        if response.header.iin.iin1.get_need_time() {
            return Err(TimeSyncError::StillNeedsTime.into());
        }
        Ok(TaskOutput::Done)
    }

    async fn restart(&mut self, restart: RestartType) -> Result<TaskOutput, TaskError> {
        let response = self.exchange(restart.function(), |_| Ok(())).await?;
        response.check_iin()?;
        find_delay(&response.objects()?)
            .map(TaskOutput::Delay)
            .ok_or(TaskError::UnexpectedResponseHeaders)
    }

    async fn clear_restart_bit(&mut self) -> Result<TaskOutput, TaskError> {
        let response = self
            .exchange(FunctionCode::Write, |writer| Ok(writer.write_iin_bit(7, false)?))
            .await?;
        response.check_iin()?;
        if response.header.iin.iin1.get_device_restart() {
            return Err(TaskError::RestartNotCleared);
        }
        Ok(TaskOutput::Done)
    }

    async fn change_unsolicited(
        &mut self,
        function: FunctionCode,
        classes: EventClasses,
    ) -> Result<TaskOutput, TaskError> {
        let response = self
            .exchange(function, |writer| Ok(writer.write_class_read(Classes::new(false, classes))?))
            .await?;
        response.check_iin()?;
        Ok(TaskOutput::Done)
    }

    async fn read_file(
        &mut self,
        file_name: &str,
        max_block_size: u16,
    ) -> Result<TaskOutput, TaskError> {
        let command = FileCommand::open_for_read(file_name, max_block_size, 0);
        let response = self
            .exchange(FunctionCode::OpenFile, |writer| Ok(writer.write_file_command(&command)?))
            .await?;
        response.check_iin()?;
        let status = response
            .objects()?
            .into_iter()
            .find_map(|header| match header.data {
                ObjectData::FileStatus(status) => Some(status),
                _ => None,
            })
            .ok_or(TaskError::UnexpectedResponseHeaders)?;
        if status.status != FileStatus::Success {
            return Err(TaskError::File(status.status));
        }

        let handle = status.handle;
        let mut contents = Vec::new();
        let mut block = 0u32;
        let result = loop {
            match self.read_file_block(handle, block).await {
                Ok(transport) => {
                    contents.extend_from_slice(&transport.data);
                    if transport.last {
                        break Ok(());
                    }
                    block = block.wrapping_add(1);
                }
                Err(err) => break Err(err),
            }
        };

        // the handle is released even after a failed transfer while the link remains
        if self.running && self.association.is_active() {
            let close = FileCommandStatus::close(handle, 0);
            let closed = self
                .exchange(FunctionCode::CloseFile, |writer| Ok(writer.write_file_status(&close)?))
                .await;
            result?;
            closed?.check_iin()?;
        } else {
            result?;
        }
        Ok(TaskOutput::File(contents))
    }

    async fn read_file_block(
        &mut self,
        handle: u32,
        block: u32,
    ) -> Result<FileTransport, TaskError> {
        let request = FileTransport::request(handle, block);
        let response = self
            .exchange(FunctionCode::Read, |writer| Ok(writer.write_file_transport(&request)?))
            .await?;
        response.check_iin()?;
        let transport = response
            .objects()?
            .into_iter()
            .find_map(|header| match header.data {
                ObjectData::FileTransport(transport) => Some(transport),
                _ => None,
            })
            .ok_or(TaskError::UnexpectedResponseHeaders)?;
        if transport.handle != handle || transport.block_number != block {
            return Err(TaskError::UnexpectedResponseHeaders);
        }
        Ok(transport)
    }
}
