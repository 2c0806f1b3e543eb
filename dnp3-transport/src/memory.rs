//! In-memory fragment sink

use crate::error::TransportError;
use crate::fragment::Fragment;
use crate::sink::FragmentSink;
use async_trait::async_trait;
use dnp3_core::EndpointAddress;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;

/// Sink that forwards fragments into an unbounded channel
///
/// Clones share the same channel and link flag.
#[derive(Debug, Clone)]
pub struct MemorySink {
    sender: mpsc::UnboundedSender<Fragment>,
    link_up: Arc<AtomicBool>,
}

impl MemorySink {
    /// Create a sink and the receiver that observes everything sent through it
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Fragment>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (
            Self {
                sender,
                link_up: Arc::new(AtomicBool::new(true)),
            },
            receiver,
        )
    }

    /// Simulate the link going up or down
    pub fn set_link_up(&self, up: bool) {
        self.link_up.store(up, Ordering::SeqCst);
    }

    pub fn is_link_up(&self) -> bool {
        self.link_up.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FragmentSink for MemorySink {
    async fn send(&self, fragment: Fragment) -> Result<(), TransportError> {
        if !self.is_link_up() {
            return Err(TransportError::LinkDown);
        }
        self.sender.send(fragment).map_err(|_| TransportError::Closed)
    }

    async fn check_link_status(&self, _destination: EndpointAddress) -> Result<(), TransportError> {
        if self.is_link_up() {
            Ok(())
        } else {
            Err(TransportError::LinkDown)
        }
    }
}
