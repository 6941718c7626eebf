use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, trace, warn};

use super::{ChannelConnector, ChannelLink, TransportError};

/// Connects to the display's control endpoint over WebSocket.
#[derive(Debug, Clone)]
pub struct WebSocketConnector {
    url: String,
}

impl WebSocketConnector {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

#[async_trait]
impl ChannelConnector for WebSocketConnector {
    async fn connect(&self) -> Result<ChannelLink, TransportError> {
        debug!(target: "napta::transport", url = %self.url, "opening control channel");
        let (ws_stream, _) = connect_async(self.url.as_str())
            .await
            .map_err(|err| TransportError::Connect {
                url: self.url.clone(),
                reason: err.to_string(),
            })?;

        let (tx_out, rx_out) = mpsc::unbounded_channel::<String>();
        let (tx_in, rx_in) = mpsc::unbounded_channel::<String>();

        let url = self.url.clone();
        let driver = tokio::spawn(async move {
            handle_websocket(ws_stream, rx_out, tx_in).await;
            debug!(target: "napta::transport", url = %url, "control channel finished");
        });

        Ok(ChannelLink::new(tx_out, rx_in, Some(driver)))
    }

    fn endpoint(&self) -> String {
        self.url.clone()
    }
}

/// Pumps frames between the socket and the link until either side closes.
async fn handle_websocket(
    ws_stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    mut rx_out: mpsc::UnboundedReceiver<String>,
    tx_in: mpsc::UnboundedSender<String>,
) {
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    let send_task = tokio::spawn(async move {
        while let Some(text) = rx_out.recv().await {
            trace!(target: "napta::transport", frame = %text, "sending frame");
            if ws_sender.send(Message::Text(text)).await.is_err() {
                return;
            }
        }
        // Outbound side dropped: the session is being torn down.
        let _ = ws_sender.send(Message::Close(None)).await;
    });

    while let Some(msg) = ws_receiver.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                trace!(target: "napta::transport", frame = %text, "received frame");
                if tx_in.send(text).is_err() {
                    break;
                }
            }
            Ok(Message::Close(_)) => break,
            Err(err) => {
                warn!(target: "napta::transport", error = %err, "control channel failed");
                break;
            }
            _ => {}
        }
    }

    send_task.abort();
    let _ = send_task.await;
}
