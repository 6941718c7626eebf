use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::{ChannelConnector, ChannelLink, TransportError};

const MOCK_ENDPOINT: &str = "mock://control";

/// The display's end of a mock channel.
pub struct MockPeer {
    /// Frames pushed here reach the client as inbound messages.
    pub to_client: mpsc::UnboundedSender<String>,
    /// Frames the client sent. Yields `None` once the client closed its side.
    pub from_client: mpsc::UnboundedReceiver<String>,
}

impl MockPeer {
    pub fn push(&self, frame: impl Into<String>) -> bool {
        self.to_client.send(frame.into()).is_ok()
    }

    /// Drains frames the client has sent so far without waiting.
    pub fn sent(&mut self) -> Vec<String> {
        let mut frames = Vec::new();
        while let Ok(frame) = self.from_client.try_recv() {
            frames.push(frame);
        }
        frames
    }
}

/// In-memory connector; every successful `connect` hands the far end to the
/// receiver returned from [`MockConnector::new`].
pub struct MockConnector {
    peers: mpsc::UnboundedSender<MockPeer>,
    refuse: AtomicBool,
    attempts: AtomicUsize,
}

impl MockConnector {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<MockPeer>) {
        let (peers, rx) = mpsc::unbounded_channel();
        (
            Self {
                peers,
                refuse: AtomicBool::new(false),
                attempts: AtomicUsize::new(0),
            },
            rx,
        )
    }

    pub fn set_refuse(&self, refuse: bool) {
        self.refuse.store(refuse, Ordering::SeqCst);
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChannelConnector for MockConnector {
    async fn connect(&self) -> Result<ChannelLink, TransportError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.refuse.load(Ordering::SeqCst) {
            return Err(TransportError::Connect {
                url: MOCK_ENDPOINT.to_string(),
                reason: "connection refused".to_string(),
            });
        }

        let (tx_out, rx_out) = mpsc::unbounded_channel();
        let (tx_in, rx_in) = mpsc::unbounded_channel();
        let peer = MockPeer {
            to_client: tx_in,
            from_client: rx_out,
        };
        self.peers.send(peer).map_err(|_| TransportError::Connect {
            url: MOCK_ENDPOINT.to_string(),
            reason: "no peer listener".to_string(),
        })?;
        Ok(ChannelLink::new(tx_out, rx_in, None))
    }

    fn endpoint(&self) -> String {
        MOCK_ENDPOINT.to_string()
    }
}
