//! Master channel and association handles
//!
//! A [`MasterChannel`] owns the associations that share one link. Fragments received
//! from the link are routed to the association whose outstation address matches the
//! fragment source. Each association runs as a spawned worker and is driven through an
//! [`AssociationHandle`].

use crate::association::Association;
use crate::config::{AssociationConfig, MasterConfig, TimeSyncProcedure};
use crate::error::{AssociationError, TaskError};
use crate::handler::{AssociationHandler, AssociationInformation, ReadHandler, ReadType};
use crate::request::{CommandHeaders, CommandMode, ReadRequest, RestartType};
use crate::session::{AssociationSession, Handlers, Message};
use crate::task::{Task, TaskKind, TaskOutput};
use dnp3_core::EndpointAddress;
use dnp3_transport::{Fragment, FragmentSink, LinkState};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, RwLock};

type Registry = Arc<RwLock<HashMap<EndpointAddress, mpsc::UnboundedSender<Message>>>>;

/// Master side of one communication channel
pub struct MasterChannel {
    config: MasterConfig,
    sink: Arc<dyn FragmentSink>,
    associations: Registry,
}

impl MasterChannel {
    /// Create a channel that sends through `sink`
    #[must_use]
    pub fn new(config: MasterConfig, sink: Arc<dyn FragmentSink>) -> Self {
        Self {
            config,
            sink,
            associations: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    #[must_use]
    pub fn config(&self) -> &MasterConfig {
        &self.config
    }

    /// Add an association and spawn its worker
    ///
    /// The association starts disabled; call [`AssociationHandle::enable`] to begin
    /// communicating.
    ///
    /// # Errors
    ///
    /// Returns `AssociationError::DuplicateAddress` if the outstation address is
    /// already associated on this channel.
    pub async fn add_association(
        &self,
        address: EndpointAddress,
        config: AssociationConfig,
        read_handler: Box<dyn ReadHandler>,
        association_handler: Box<dyn AssociationHandler>,
        information: Box<dyn AssociationInformation>,
    ) -> Result<AssociationHandle, AssociationError> {
        let mut associations = self.associations.write().await;
        if associations.contains_key(&address) {
            return Err(AssociationError::DuplicateAddress(address));
        }

        let (sender, receiver) = mpsc::unbounded_channel();
        let session = AssociationSession::new(
            Association::new(address, config),
            self.config.address,
            self.config.response_timeout,
            self.config.fragment_size(),
            self.sink.clone(),
            receiver,
            Handlers {
                read: read_handler,
                association: association_handler,
                info: information,
            },
        );
        tokio::spawn(session.run());
        associations.insert(address, sender.clone());
        log::info!("added association {} to master {}", address, self.config.address);

        Ok(AssociationHandle { address, sender })
    }

    /// Stop and remove an association
    ///
    /// Tasks still queued on it fail with `TaskError::Shutdown`.
    pub async fn remove_association(
        &self,
        address: EndpointAddress,
    ) -> Result<(), AssociationError> {
        let sender = self
            .associations
            .write()
            .await
            .remove(&address)
            .ok_or(AssociationError::NoSuchAssociation(address))?;
        let _ = sender.send(Message::Shutdown);
        Ok(())
    }

    /// Route a fragment received from the link
    pub async fn on_fragment_received(&self, fragment: Fragment) {
        if fragment.destination != self.config.address {
            log::warn!(
                "dropping fragment for {} received on master {}",
                fragment.destination,
                self.config.address
            );
            return;
        }

        let associations = self.associations.read().await;
        match associations.get(&fragment.source) {
            Some(sender) => {
                let _ = sender.send(Message::Fragment(fragment));
            }
            None => log::warn!("dropping fragment from unknown outstation {}", fragment.source),
        }
    }

    /// Notify every association of a link state change
    pub async fn on_link_state_changed(&self, state: LinkState) {
        log::info!("link {} on master {}", state, self.config.address);
        for sender in self.associations.read().await.values() {
            let _ = sender.send(Message::Link(state));
        }
    }

    /// Stop every association
    pub async fn shutdown(&self) {
        for (_, sender) in self.associations.write().await.drain() {
            let _ = sender.send(Message::Shutdown);
        }
    }
}

/// Handle used to drive one association
///
/// Handles are cheap to clone. Every request is queued on the association and resolved
/// when the corresponding task completes.
#[derive(Debug, Clone)]
pub struct AssociationHandle {
    address: EndpointAddress,
    sender: mpsc::UnboundedSender<Message>,
}

impl AssociationHandle {
    #[must_use]
    pub fn address(&self) -> EndpointAddress {
        self.address
    }

    fn send(&self, message: Message) -> Result<(), TaskError> {
        self.sender.send(message).map_err(|_| TaskError::Shutdown)
    }

    /// Allow the association to communicate
    pub fn enable(&self) -> Result<(), TaskError> {
        self.send(Message::SetEnabled(true))
    }

    /// Stop communicating; the task in flight fails with `TaskError::Disabled`
    pub fn disable(&self) -> Result<(), TaskError> {
        self.send(Message::SetEnabled(false))
    }

    async fn run(&self, kind: TaskKind) -> Result<TaskOutput, TaskError> {
        let (promise, reply) = oneshot::channel();
        self.send(Message::Submit(Task::user(kind, promise)))?;
        reply.await.map_err(|_| TaskError::Shutdown)?
    }

    /// Read once; measurements go to the association's read handler
    ///
    /// # Errors
    ///
    /// Fails with the terminal error of the task after retries are exhausted.
    pub async fn read(&self, request: ReadRequest) -> Result<(), TaskError> {
        self.run(TaskKind::Read {
            request,
            read_type: ReadType::SinglePoll,
        })
        .await
        .map(|_| ())
    }

    /// Send controls with the given mode
    ///
    /// Commands are never retried automatically.
    pub async fn operate(
        &self,
        mode: CommandMode,
        headers: CommandHeaders,
    ) -> Result<(), TaskError> {
        self.run(TaskKind::Command { mode, headers }).await.map(|_| ())
    }

    pub async fn synchronize_time(&self, procedure: TimeSyncProcedure) -> Result<(), TaskError> {
        self.run(TaskKind::TimeSync(procedure)).await.map(|_| ())
    }

    /// Cold restart, returning the delay announced by the outstation
    pub async fn cold_restart(&self) -> Result<Duration, TaskError> {
        self.restart(RestartType::Cold).await
    }

    /// Warm restart, returning the delay announced by the outstation
    pub async fn warm_restart(&self) -> Result<Duration, TaskError> {
        self.restart(RestartType::Warm).await
    }

    async fn restart(&self, restart: RestartType) -> Result<Duration, TaskError> {
        match self.run(TaskKind::Restart(restart)).await? {
            TaskOutput::Delay(delay) => Ok(delay),
            _ => Err(TaskError::UnexpectedResponseHeaders),
        }
    }

    /// Ask the link layer to verify the outstation is reachable
    pub async fn check_link_status(&self) -> Result<(), TaskError> {
        self.run(TaskKind::LinkStatus).await.map(|_| ())
    }

    /// Read a whole file from the outstation
    pub async fn read_file(
        &self,
        file_name: impl Into<String>,
        max_block_size: u16,
    ) -> Result<Vec<u8>, TaskError> {
        let kind = TaskKind::FileRead {
            file_name: file_name.into(),
            max_block_size,
        };
        match self.run(kind).await? {
            TaskOutput::File(contents) => Ok(contents),
            _ => Err(TaskError::UnexpectedResponseHeaders),
        }
    }

    /// Add a periodic poll, first run one period from now
    pub async fn add_poll(
        &self,
        request: ReadRequest,
        period: Duration,
    ) -> Result<PollHandle, TaskError> {
        let (reply, id) = oneshot::channel();
        self.send(Message::AddPoll {
            request,
            period,
            reply,
        })?;
        let id = id.await.map_err(|_| TaskError::Shutdown)?;
        Ok(PollHandle {
            id,
            sender: self.sender.clone(),
        })
    }
}

/// Handle to a periodic poll
#[derive(Debug, Clone)]
pub struct PollHandle {
    id: u64,
    sender: mpsc::UnboundedSender<Message>,
}

impl PollHandle {
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Run the poll as soon as possible without moving its schedule
    pub fn demand(&self) -> Result<(), TaskError> {
        self.sender
            .send(Message::DemandPoll(self.id))
            .map_err(|_| TaskError::Shutdown)
    }

    pub fn remove(self) -> Result<(), TaskError> {
        self.sender
            .send(Message::RemovePoll(self.id))
            .map_err(|_| TaskError::Shutdown)
    }
}
