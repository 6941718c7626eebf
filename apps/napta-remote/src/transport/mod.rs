use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

pub mod mock;
pub mod websocket;

pub use mock::{MockConnector, MockPeer};
pub use websocket::WebSocketConnector;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to connect to {url}: {reason}")]
    Connect { url: String, reason: String },
}

/// One open duplex channel carrying JSON text frames.
///
/// The inbound receiver yields `None` once the channel is closed by either
/// side. Dropping the outbound sender asks the driver to close the channel.
pub struct ChannelLink {
    outbound: mpsc::UnboundedSender<String>,
    inbound: mpsc::UnboundedReceiver<String>,
    driver: Option<JoinHandle<()>>,
}

impl ChannelLink {
    pub fn new(
        outbound: mpsc::UnboundedSender<String>,
        inbound: mpsc::UnboundedReceiver<String>,
        driver: Option<JoinHandle<()>>,
    ) -> Self {
        Self {
            outbound,
            inbound,
            driver,
        }
    }

    pub fn into_parts(
        self,
    ) -> (
        mpsc::UnboundedSender<String>,
        mpsc::UnboundedReceiver<String>,
        Option<JoinHandle<()>>,
    ) {
        (self.outbound, self.inbound, self.driver)
    }
}

/// Opens channels to the display. Reconnection and heartbeats are not part of
/// this contract; a closed link stays closed.
#[async_trait]
pub trait ChannelConnector: Send + Sync {
    async fn connect(&self) -> Result<ChannelLink, TransportError>;

    /// Human readable endpoint for logs.
    fn endpoint(&self) -> String;
}
