//! Outstation handle
//!
//! An [`Outstation`] spawns the worker that answers the master and gives the
//! application access to the point database. Received fragments and link changes are
//! fed in by whatever owns the transport.

use crate::application::{OutstationApplication, OutstationInformation};
use crate::config::OutstationConfig;
use crate::control::ControlHandler;
use crate::database::{Database, DatabaseHandle};
use crate::error::OutstationError;
use crate::session::{Handlers, Message, OutstationSession};
use dnp3_core::EndpointAddress;
use dnp3_transport::{Fragment, FragmentSink, LinkState};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Running outstation
///
/// Clones drive the same worker. The worker stops on [`Outstation::shutdown`] or when
/// every clone has been dropped.
#[derive(Debug, Clone)]
pub struct Outstation {
    address: EndpointAddress,
    sender: mpsc::UnboundedSender<Message>,
    database: DatabaseHandle,
}

impl Outstation {
    /// Create the database and spawn the worker
    ///
    /// Points are added afterwards through [`Outstation::transaction`].
    #[must_use]
    pub fn spawn(
        config: OutstationConfig,
        sink: Arc<dyn FragmentSink>,
        application: Box<dyn OutstationApplication>,
        control: Box<dyn ControlHandler>,
        information: Box<dyn OutstationInformation>,
    ) -> Self {
        let address = config.address;
        let database = DatabaseHandle::new(Database::new(config.event_buffer));
        let (sender, receiver) = mpsc::unbounded_channel();
        let session = OutstationSession::new(
            config,
            database.clone(),
            sink,
            receiver,
            Handlers {
                application,
                control,
                info: information,
            },
        );
        tokio::spawn(session.run());
        log::info!("spawned outstation {}", address);

        Self {
            address,
            sender,
            database,
        }
    }

    #[must_use]
    pub fn address(&self) -> EndpointAddress {
        self.address
    }

    #[must_use]
    pub fn database(&self) -> &DatabaseHandle {
        &self.database
    }

    /// Modify the database atomically, see [`DatabaseHandle::transaction`]
    pub fn transaction<T, E>(&self, f: impl FnOnce(&mut Database) -> Result<T, E>) -> Result<T, E> {
        self.database.transaction(f)
    }

    /// Deliver a fragment received from the link
    ///
    /// # Errors
    ///
    /// Returns `OutstationError::Shutdown` if the worker has stopped.
    pub fn on_fragment_received(&self, fragment: Fragment) -> Result<(), OutstationError> {
        self.sender
            .send(Message::Fragment(fragment))
            .map_err(|_| OutstationError::Shutdown)
    }

    /// Report a link state change
    ///
    /// # Errors
    ///
    /// Returns `OutstationError::Shutdown` if the worker has stopped.
    pub fn on_link_state_changed(&self, state: LinkState) -> Result<(), OutstationError> {
        self.sender
            .send(Message::Link(state))
            .map_err(|_| OutstationError::Shutdown)
    }

    /// Stop the worker
    pub fn shutdown(&self) {
        let _ = self.sender.send(Message::Shutdown);
    }

    /// True once the worker has stopped
    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        self.sender.is_closed()
    }
}
