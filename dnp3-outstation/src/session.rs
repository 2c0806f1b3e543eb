//! Outstation worker
//!
//! The worker owns the application handlers and answers one request at a time. While
//! idle it also reports events in unsolicited responses once the master enabled them.
//! All async methods take `&mut self` because the handlers are `Send` only.

use crate::application::{OutstationApplication, OutstationInformation, RestartDelay};
use crate::config::{EventRemoval, OutstationConfig};
use crate::control::{CommandArbiter, ControlHandler, OperateType, RequestContext};
use crate::database::read::ReadPlan;
use crate::database::{Database, DatabaseHandle};
use bytes::Bytes;
use dnp3_application::{
    CommandObject, Control, FragmentWriter, FunctionCode, ObjectData, ObjectHeader, Request,
    ResponseHeader, Sequence, Variation,
};
use dnp3_core::{Dnp3Error, EventClass, EventClasses, Iin, Iin1, Iin2, Timestamp};
use dnp3_transport::{Fragment, FragmentSink, LinkState};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::Instant;

/// Message sent from an outstation handle to its worker
#[derive(Debug)]
pub(crate) enum Message {
    Fragment(Fragment),
    Link(LinkState),
    Shutdown,
}

/// User callbacks owned by the worker
pub(crate) struct Handlers {
    pub(crate) application: Box<dyn OutstationApplication>,
    pub(crate) control: Box<dyn ControlHandler>,
    pub(crate) info: Box<dyn OutstationInformation>,
}

/// How a wait for a confirm ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Confirm {
    Received,
    Timeout,
    /// A request, link loss or shutdown arrived first
    Interrupted,
}

/// Last non-read request and its response, for duplicate detection
struct LastExchange {
    request: Bytes,
    response: Option<Bytes>,
}

#[derive(Debug)]
struct Unsolicited {
    /// The startup null response was confirmed
    null_confirmed: bool,
    /// Classes the master enabled
    enabled: EventClasses,
    seq: Sequence,
    retries: usize,
    /// Earliest time of the next attempt after a failed one
    next_attempt: Option<Instant>,
    /// Retries ran out; wait for new data or a request
    exhausted: bool,
}

async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

pub(crate) struct OutstationSession {
    config: OutstationConfig,
    database: DatabaseHandle,
    sink: Arc<dyn FragmentSink>,
    receiver: mpsc::UnboundedReceiver<Message>,
    handlers: Handlers,
    arbiter: CommandArbiter,
    restart_iin: bool,
    broadcast_iin: bool,
    link_up: bool,
    /// Number of requests received, used to check that OPERATE follows SELECT
    frame: u32,
    last_exchange: Option<LastExchange>,
    /// When RECORD_CURRENT_TIME was received
    recorded_time: Option<Instant>,
    unsolicited: Unsolicited,
    /// Request that interrupted a wait for a confirm
    pending: Option<Fragment>,
    running: bool,
}

impl OutstationSession {
    pub(crate) fn new(
        config: OutstationConfig,
        database: DatabaseHandle,
        sink: Arc<dyn FragmentSink>,
        receiver: mpsc::UnboundedReceiver<Message>,
        handlers: Handlers,
    ) -> Self {
        let arbiter = CommandArbiter::new(config.select_timeout, config.max_controls_per_request);
        Self {
            config,
            database,
            sink,
            receiver,
            handlers,
            arbiter,
            restart_iin: true,
            broadcast_iin: false,
            link_up: true,
            frame: 0,
            last_exchange: None,
            recorded_time: None,
            unsolicited: Unsolicited {
                null_confirmed: false,
                enabled: EventClasses::none(),
                seq: Sequence::default(),
                retries: 0,
                next_attempt: None,
                exhausted: false,
            },
            pending: None,
            running: true,
        }
    }

    /// Run until shutdown or until every handle is dropped
    pub(crate) async fn run(mut self) {
        log::info!("outstation {} started", self.config.address);
        while self.running {
            if let Some(fragment) = self.pending.take() {
                self.handle_fragment(fragment).await;
                continue;
            }
            if self.unsolicited_ready(Instant::now()) {
                self.send_unsolicited().await;
                continue;
            }
            self.idle().await;
        }
        log::info!("outstation {} stopped", self.config.address);
    }

    async fn idle(&mut self) {
        let retry_at = self.unsolicited_retry_at(Instant::now());
        tokio::select! {
            message = self.receiver.recv() => match message {
                Some(message) => self.handle_message(message).await,
                None => self.running = false,
            },
            _ = self.database.changed() => {
                self.unsolicited.exhausted = false;
            }
            _ = sleep_until_opt(retry_at) => {}
        }
    }

    async fn handle_message(&mut self, message: Message) {
        match message {
            Message::Fragment(fragment) => self.handle_fragment(fragment).await,
            Message::Link(state) => self.set_link(state),
            Message::Shutdown => self.running = false,
        }
    }

    fn set_link(&mut self, state: LinkState) {
        let up = state == LinkState::Up;
        if up != self.link_up {
            log::info!("outstation {} link {}", self.config.address, state);
        }
        self.link_up = up;
        if up {
            self.unsolicited.next_attempt = None;
            self.unsolicited.exhausted = false;
        }
    }

    /// Current internal indications
    fn iin(&self, db: &Database) -> Iin {
        let mut iin = Iin::default();
        iin.iin1.set(Iin1::DEVICE_RESTART, self.restart_iin);
        iin.iin1.set(Iin1::BROADCAST, self.broadcast_iin);
        let pending = db.pending_classes();
        iin.iin1.set(Iin1::CLASS_1_EVENTS, pending.class1);
        iin.iin1.set(Iin1::CLASS_2_EVENTS, pending.class2);
        iin.iin1.set(Iin1::CLASS_3_EVENTS, pending.class3);
        self.handlers.application.application_iin().apply(&mut iin);
        iin.iin2.set(Iin2::EVENT_BUFFER_OVERFLOW, db.events().is_overflown());
        iin
    }

    fn response_writer(&self, control: Control, function: FunctionCode) -> FragmentWriter {
        FragmentWriter::response(
            ResponseHeader::new(control, function, Iin::default()),
            self.config.fragment_size(),
        )
    }

    /// Set the IIN of a finished response; the broadcast indication is reported once
    fn finish_response(&mut self, mut writer: FragmentWriter, errors: Iin2) -> Bytes {
        let iin = {
            let db = self.database.lock();
            self.iin(&db)
        };
        writer.set_iin(Iin::new(iin.iin1, iin.iin2 | errors));
        self.broadcast_iin = false;
        writer.finish()
    }

    async fn send(&mut self, data: Bytes) {
        let fragment = Fragment::new(self.config.address, self.config.master_address, data);
        if let Err(err) = self.sink.send(fragment).await {
            log::warn!("outstation {} send failed: {}", self.config.address, err);
        }
    }

    async fn handle_fragment(&mut self, fragment: Fragment) {
        if fragment.source != self.config.master_address {
            log::warn!("ignoring request from unknown master {}", fragment.source);
            return;
        }
        let broadcast = fragment.destination.is_broadcast();
        if !broadcast && fragment.destination != self.config.address {
            log::debug!("ignoring request for {}", fragment.destination);
            return;
        }

        let request = match Request::parse(&fragment.data) {
            Ok(request) => request,
            Err(Dnp3Error::UnknownFunction(code)) => {
                log::warn!("unsupported function code {}", code);
                if !broadcast {
                    let seq = Control::from_u8(fragment.data[0]).seq;
                    self.respond_error(seq, Iin2::NO_FUNC_CODE_SUPPORT).await;
                }
                return;
            }
            Err(err) => {
                log::warn!("ignoring malformed request: {}", err);
                return;
            }
        };

        let header = request.header;
        if header.function == FunctionCode::Confirm {
            log::debug!("unexpected confirm seq {}", header.control.seq);
            return;
        }

        self.frame = self.frame.wrapping_add(1);
        self.unsolicited.exhausted = false;
        self.handlers.info.request_received(header.function);
        log::debug!("{} seq {} from {}", header.function, header.control.seq, fragment.source);

        let objects = request.object_headers();
        if broadcast {
            self.handle_broadcast(header.function, objects);
            return;
        }

        if header.function == FunctionCode::Read {
            self.last_exchange = None;
            self.handle_read(header.control.seq, objects).await;
            return;
        }

        if let Some(last) = &self.last_exchange
            && last.request == fragment.data
        {
            log::info!(
                "duplicate {} seq {}, repeating response",
                header.function,
                header.control.seq
            );
            if let Some(response) = last.response.clone() {
                self.send(response).await;
            }
            return;
        }

        let received = Instant::now();
        let response = self.handle_non_read(header.control.seq, header.function, objects, received);
        self.last_exchange = Some(LastExchange {
            request: fragment.data,
            response: response.clone(),
        });
        if let Some(response) = response {
            self.send(response).await;
        }
    }

    async fn respond_error(&mut self, seq: Sequence, errors: Iin2) {
        let writer = self.response_writer(
            Control::response(seq, true, true, false),
            FunctionCode::Response,
        );
        let response = self.finish_response(writer, errors);
        self.send(response).await;
    }

    fn handle_broadcast(
        &mut self,
        function: FunctionCode,
        objects: Result<Vec<ObjectHeader>, Dnp3Error>,
    ) {
        if !self.config.features.broadcast {
            log::debug!("broadcast {} ignored", function);
            return;
        }
        self.broadcast_iin = true;
        self.handlers.info.broadcast_received(function);
        let Ok(objects) = objects else {
            log::warn!("malformed broadcast {}", function);
            return;
        };
        match function {
            FunctionCode::DirectOperateNoResponse => {
                if let Err(errors) = self.operate(&objects, function, None) {
                    log::warn!("broadcast controls rejected: {:?}", errors);
                }
            }
            FunctionCode::Write => {
                let errors = self.write(&objects, Instant::now());
                if errors != Iin2::default() {
                    log::warn!("broadcast WRITE partly rejected");
                }
            }
            other => log::warn!("broadcast {} not supported", other),
        }
    }

    /// Error bits for a request whose object headers could not be parsed
    fn parse_error(err: &Dnp3Error) -> Iin2 {
        log::warn!("bad object headers: {}", err);
        match err {
            Dnp3Error::UnknownObject { .. } => Iin2::OBJECT_UNKNOWN,
            _ => Iin2::PARAMETER_ERROR,
        }
    }

    /// Process any request except READ, returning the response if one is due
    fn handle_non_read(
        &mut self,
        seq: Sequence,
        function: FunctionCode,
        objects: Result<Vec<ObjectHeader>, Dnp3Error>,
        received: Instant,
    ) -> Option<Bytes> {
        let mut writer = self.response_writer(
            Control::response(seq, true, true, false),
            FunctionCode::Response,
        );
        let objects = match objects {
            Ok(objects) => objects,
            Err(err) => {
                if function == FunctionCode::DirectOperateNoResponse {
                    return None;
                }
                let errors = Self::parse_error(&err);
                return Some(self.finish_response(writer, errors));
            }
        };

        let errors = match function {
            FunctionCode::Write => self.write(&objects, received),
            FunctionCode::Select | FunctionCode::Operate | FunctionCode::DirectOperate => {
                let ctx = RequestContext {
                    seq,
                    frame: self.frame,
                    received,
                };
                match self.operate(&objects, function, Some(ctx)) {
                    Ok(results) => write_command_results(&mut writer, &results),
                    Err(errors) => errors,
                }
            }
            FunctionCode::DirectOperateNoResponse => {
                if let Err(errors) = self.operate(&objects, function, None) {
                    log::warn!("DIRECT_OPERATE_NR rejected: {:?}", errors);
                }
                return None;
            }
            FunctionCode::ColdRestart | FunctionCode::WarmRestart => {
                self.restart(function, &mut writer)
            }
            FunctionCode::EnableUnsolicited => self.change_unsolicited(&objects, true),
            FunctionCode::DisableUnsolicited => self.change_unsolicited(&objects, false),
            FunctionCode::DelayMeasure => {
                let delay = self.handlers.application.processing_delay();
                match writer.write_delay(Variation::Group52Var2, delay) {
                    Ok(()) => Iin2::default(),
                    Err(_) => Iin2::PARAMETER_ERROR,
                }
            }
            FunctionCode::RecordCurrentTime => {
                self.recorded_time = Some(received);
                Iin2::default()
            }
            other => {
                log::warn!("{} is not supported", other);
                Iin2::NO_FUNC_CODE_SUPPORT
            }
        };
        Some(self.finish_response(writer, errors))
    }

    fn write(&mut self, objects: &[ObjectHeader], received: Instant) -> Iin2 {
        let mut errors = Iin2::default();
        for header in objects {
            match (&header.variation, &header.data) {
                (Variation::Group80Var1, ObjectData::IinBits(bits)) => {
                    for &(index, value) in bits {
                        if index == 7 && !value {
                            if self.restart_iin {
                                log::info!("restart indication cleared");
                                self.handlers.info.restart_iin_cleared();
                            }
                            self.restart_iin = false;
                        } else {
                            errors |= Iin2::PARAMETER_ERROR;
                        }
                    }
                }
                (Variation::Group50Var1, ObjectData::Time(time)) => {
                    if !self.handlers.application.write_absolute_time(*time) {
                        errors |= Iin2::PARAMETER_ERROR;
                    }
                }
                (Variation::Group50Var3, ObjectData::Time(time)) => {
                    let adjusted = self
                        .recorded_time
                        .take()
                        .and_then(|at| shifted(*time, at, received));
                    match adjusted {
                        Some(time) if self.handlers.application.write_absolute_time(time) => {}
                        Some(_) => errors |= Iin2::PARAMETER_ERROR,
                        None => {
                            log::warn!("last recorded time written without RECORD_CURRENT_TIME");
                            errors |= Iin2::PARAMETER_ERROR;
                        }
                    }
                }
                (variation, _) => {
                    log::warn!("WRITE of {} is not supported", variation);
                    errors |= Iin2::NO_FUNC_CODE_SUPPORT;
                }
            }
        }
        errors
    }

    /// Run controls through the arbiter
    ///
    /// Returns the controls with their status, one list per object header, or the
    /// error bits if a header does not hold controls.
    fn operate(
        &mut self,
        objects: &[ObjectHeader],
        function: FunctionCode,
        ctx: Option<RequestContext>,
    ) -> Result<Vec<Vec<CommandObject>>, Iin2> {
        let mut commands = Vec::new();
        let mut sizes = Vec::new();
        for header in objects {
            let ObjectData::Commands(items) = &header.data else {
                log::warn!("{} with non-control object {}", function, header.variation);
                return Err(Iin2::PARAMETER_ERROR);
            };
            sizes.push(items.len());
            commands.extend_from_slice(items);
        }

        let results = {
            let mut db = self.database.lock();
            let handler = self.handlers.control.as_mut();
            match (function, ctx) {
                (FunctionCode::Select, Some(ctx)) => {
                    self.arbiter.select(&commands, ctx, &mut db, handler)
                }
                (FunctionCode::Operate, Some(ctx)) => {
                    self.arbiter.operate(&commands, ctx, &mut db, handler)
                }
                (FunctionCode::DirectOperateNoResponse, _) => self.arbiter.direct_operate(
                    &commands,
                    OperateType::DirectOperateNoAck,
                    &mut db,
                    handler,
                ),
                _ => self.arbiter.direct_operate(
                    &commands,
                    OperateType::DirectOperate,
                    &mut db,
                    handler,
                ),
            }
        };

        let mut results = results.into_iter();
        Ok(sizes
            .into_iter()
            .map(|size| results.by_ref().take(size).collect())
            .collect())
    }

    fn restart(&mut self, function: FunctionCode, writer: &mut FragmentWriter) -> Iin2 {
        let delay = if function == FunctionCode::ColdRestart {
            self.handlers.application.cold_restart()
        } else {
            self.handlers.application.warm_restart()
        };
        let written = match delay {
            Some(RestartDelay::Seconds(value)) => writer.write_delay(Variation::Group52Var1, value),
            Some(RestartDelay::Milliseconds(value)) => {
                writer.write_delay(Variation::Group52Var2, value)
            }
            None => return Iin2::NO_FUNC_CODE_SUPPORT,
        };
        match written {
            Ok(()) => Iin2::default(),
            Err(_) => Iin2::PARAMETER_ERROR,
        }
    }

    fn change_unsolicited(&mut self, objects: &[ObjectHeader], enable: bool) -> Iin2 {
        if !self.config.features.unsolicited {
            return Iin2::NO_FUNC_CODE_SUPPORT;
        }
        let mut errors = Iin2::default();
        for header in objects {
            let class = match header.variation {
                Variation::Group60Var2 => EventClass::Class1,
                Variation::Group60Var3 => EventClass::Class2,
                Variation::Group60Var4 => EventClass::Class3,
                other => {
                    log::warn!("cannot change unsolicited reporting of {}", other);
                    errors |= Iin2::PARAMETER_ERROR;
                    continue;
                }
            };
            self.unsolicited.enabled.set(class, enable);
        }
        log::info!("unsolicited reporting enabled for {:?}", self.unsolicited.enabled);
        errors
    }

    async fn handle_read(&mut self, seq: Sequence, objects: Result<Vec<ObjectHeader>, Dnp3Error>) {
        let objects = match objects {
            Ok(objects) => objects,
            Err(err) => {
                let errors = Self::parse_error(&err);
                self.respond_error(seq, errors).await;
                return;
            }
        };

        let mut plan = {
            let mut db = self.database.lock();
            let plan = ReadPlan::new(&objects, &mut db);
            if plan.is_empty(&db) {
                log::debug!("READ selected no data");
            }
            plan
        };

        let mut seq = seq;
        let mut fir = true;
        loop {
            let mut writer = self.response_writer(
                Control::response(seq, fir, true, false),
                FunctionCode::Response,
            );
            let progress = plan.write(&mut self.database.lock(), &mut writer);
            let con = !progress.complete || progress.events > 0;
            writer.set_control(Control::response(seq, fir, progress.complete, con));
            // the IIN still reports an overflow that the written events resolve
            let response = self.finish_response(writer, plan.iin2);
            if progress.events > 0 && self.config.event_removal == EventRemoval::Eager {
                self.database.lock().events_mut().clear_written();
            }
            self.send(response).await;

            if !con {
                return;
            }
            match self.wait_confirm(seq, false).await {
                Confirm::Received => {
                    let cleared = self.database.lock().events_mut().clear_written();
                    self.handlers.info.confirm_received(false, cleared);
                    if progress.complete {
                        return;
                    }
                }
                Confirm::Timeout => {
                    log::warn!("solicited confirm timeout, seq {}", seq);
                    self.handlers.info.solicited_confirm_timeout();
                    self.database.lock().events_mut().unselect();
                    return;
                }
                Confirm::Interrupted => {
                    self.database.lock().events_mut().unselect();
                    return;
                }
            }
            seq = seq.next();
            fir = false;
        }
    }

    /// Wait for a confirm of the response carrying `seq`
    ///
    /// A request arriving first is kept in `pending` for the main loop.
    async fn wait_confirm(&mut self, seq: Sequence, unsolicited: bool) -> Confirm {
        let deadline = Instant::now() + self.config.confirm_timeout;
        loop {
            let message = tokio::select! {
                message = self.receiver.recv() => message,
                _ = tokio::time::sleep_until(deadline) => return Confirm::Timeout,
            };
            match message {
                None | Some(Message::Shutdown) => {
                    self.running = false;
                    return Confirm::Interrupted;
                }
                Some(Message::Link(state)) => {
                    self.set_link(state);
                    if state == LinkState::Down {
                        return Confirm::Interrupted;
                    }
                }
                Some(Message::Fragment(fragment)) => {
                    let control = match Request::parse(&fragment.data) {
                        Ok(request) if request.header.function == FunctionCode::Confirm => {
                            request.header.control
                        }
                        _ => {
                            self.pending = Some(fragment);
                            return Confirm::Interrupted;
                        }
                    };
                    if control.seq == seq && control.uns == unsolicited {
                        return Confirm::Received;
                    }
                    log::warn!(
                        "ignoring confirm seq {} uns {} while expecting seq {}",
                        control.seq,
                        control.uns,
                        seq
                    );
                }
            }
        }
    }

    fn unsolicited_ready(&self, now: Instant) -> bool {
        let state = &self.unsolicited;
        if !self.config.features.unsolicited || !self.link_up || state.exhausted {
            return false;
        }
        if state.next_attempt.is_some_and(|at| at > now) {
            return false;
        }
        if !state.null_confirmed {
            return true;
        }
        let pending = self.database.lock().pending_classes();
        pending.intersect(state.enabled).any()
    }

    fn unsolicited_retry_at(&self, now: Instant) -> Option<Instant> {
        if !self.config.features.unsolicited || !self.link_up || self.unsolicited.exhausted {
            return None;
        }
        self.unsolicited.next_attempt.filter(|at| *at > now)
    }

    async fn send_unsolicited(&mut self) {
        let seq = self.unsolicited.seq;
        let mut writer = self.response_writer(
            Control::unsolicited_response(seq, true),
            FunctionCode::UnsolicitedResponse,
        );
        if self.unsolicited.null_confirmed {
            let mut db = self.database.lock();
            let enabled = self.unsolicited.enabled;
            db.events_mut().select_classes(enabled);
            db.events_mut().write_selected(&mut writer);
            // whatever did not fit waits for the next unsolicited response
            db.events_mut().release_selected();
        }
        let response = self.finish_response(writer, Iin2::default());
        log::debug!("unsolicited response seq {}", seq);
        self.send(response).await;
        self.unsolicited.seq = seq.next();

        match self.wait_confirm(seq, true).await {
            Confirm::Received => {
                let cleared = self.database.lock().events_mut().clear_written();
                self.handlers.info.confirm_received(true, cleared);
                self.unsolicited.null_confirmed = true;
                self.unsolicited.retries = 0;
                self.unsolicited.next_attempt = None;
            }
            Confirm::Timeout => {
                self.database.lock().events_mut().unselect();
                self.unsolicited.retries += 1;
                self.handlers.info.unsolicited_confirm_timeout(self.unsolicited.retries);
                log::warn!("unsolicited confirm timeout, seq {}", seq);
                if self
                    .config
                    .max_unsolicited_retries
                    .is_some_and(|max| self.unsolicited.retries > max)
                {
                    log::warn!("unsolicited retries exhausted");
                    self.unsolicited.exhausted = true;
                    self.unsolicited.retries = 0;
                }
                self.unsolicited.next_attempt =
                    Some(Instant::now() + self.config.unsolicited_retry_delay);
            }
            Confirm::Interrupted => {
                self.database.lock().events_mut().unselect();
                self.unsolicited.next_attempt =
                    Some(Instant::now() + self.config.unsolicited_retry_delay);
            }
        }
    }
}

/// Echo controls with their status, one header per request header
fn write_command_results(writer: &mut FragmentWriter, results: &[Vec<CommandObject>]) -> Iin2 {
    for header in results {
        if let Err(err) = writer.write_commands(header) {
            log::warn!("control response does not fit: {}", err);
            return Iin2::PARAMETER_ERROR;
        }
    }
    Iin2::default()
}

/// Time of a g50v3 write, shifted by the time since it was recorded
fn shifted(time: Timestamp, recorded: Instant, received: Instant) -> Option<Timestamp> {
    time.checked_add(received.saturating_duration_since(recorded))
}
