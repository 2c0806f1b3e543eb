//! Outgoing side of the transport boundary

use crate::error::TransportError;
use crate::fragment::Fragment;
use async_trait::async_trait;
use dnp3_core::EndpointAddress;

/// Destination for fragments produced by a session
///
/// Implementations own link framing, segmentation, and the physical connection.
#[async_trait]
pub trait FragmentSink: Send + Sync {
    /// Send one fragment
    ///
    /// # Errors
    ///
    /// Returns `TransportError::LinkDown` if the link cannot carry the fragment, or
    /// `TransportError::SendFailed` if the underlying write failed.
    async fn send(&self, fragment: Fragment) -> Result<(), TransportError>;

    /// Ask the link layer to verify that `destination` is reachable
    ///
    /// The default implementation reports success, which suits transports without a link
    /// layer status request.
    async fn check_link_status(&self, _destination: EndpointAddress) -> Result<(), TransportError> {
        Ok(())
    }
}
