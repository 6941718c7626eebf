//! Live control session for one playable script.
//!
//! A [`SessionController`] is created per scope (one script id) and owns the
//! channel for that scope. Inbound frames are applied in receipt order by a
//! single reader task; outbound frames are validated against the scope's
//! [`PlayableScriptMeta`] before anything is sent.

mod state;

pub use state::{SessionNotice, SessionState};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use catalog_sdk::PlayableScriptMeta;
use control_proto::{
    decode_server, encode_client, ClientMessage, Direction, ProtoError, ServerMessage,
};
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::transport::ChannelConnector;

const NOTICE_CAPACITY: usize = 32;
const CLOSE_GRACE: Duration = Duration::from_millis(500);

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("player slot {slot} is outside 1..={max_players}")]
    InvalidSlot { slot: u32, max_players: u32 },
    #[error("key {0} is not supported by this script")]
    UnsupportedKey(Direction),
    #[error("control channel not ready ({0})")]
    ChannelNotReady(SessionState),
    #[error(transparent)]
    Protocol(#[from] ProtoError),
}

/// Immutable inputs of one session scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionScope {
    pub script_id: String,
    pub meta: PlayableScriptMeta,
}

impl SessionScope {
    pub fn new(meta: PlayableScriptMeta) -> Self {
        Self {
            script_id: meta.script_id.clone(),
            meta,
        }
    }
}

struct Shared {
    script_id: String,
    state: watch::Sender<SessionState>,
    notices: broadcast::Sender<SessionNotice>,
    last_notice: Mutex<Option<SessionNotice>>,
    closed: AtomicBool,
}

impl Shared {
    fn set_state(&self, next: SessionState) {
        let previous = self.state.send_replace(next);
        if previous != next {
            debug!(
                target: "napta::session",
                script_id = %self.script_id,
                from = %previous,
                to = %next,
                "session state changed"
            );
        }
    }

    fn apply_frame(&self, frame: &str) {
        match decode_server(frame) {
            Ok(ServerMessage::Status(status)) => {
                self.state.send_if_modified(|current| {
                    let next = state::apply_status(*current, status);
                    if next == *current {
                        return false;
                    }
                    info!(
                        target: "napta::session",
                        script_id = %self.script_id,
                        from = %current,
                        to = %next,
                        "display status changed"
                    );
                    *current = next;
                    true
                });
            }
            Ok(ServerMessage::Error(reason)) => {
                warn!(
                    target: "napta::session",
                    script_id = %self.script_id,
                    reason = %reason,
                    "display reported an error"
                );
                let notice = SessionNotice::ServerError(reason);
                if let Ok(mut last) = self.last_notice.lock() {
                    *last = Some(notice.clone());
                }
                let _ = self.notices.send(notice);
            }
            Err(err) => {
                debug!(
                    target: "napta::session",
                    script_id = %self.script_id,
                    error = %err,
                    "ignoring undecodable frame"
                );
            }
        }
    }
}

pub struct SessionController {
    scope: SessionScope,
    shared: Arc<Shared>,
    outbound: Option<mpsc::UnboundedSender<String>>,
    reader: Option<JoinHandle<()>>,
    driver: Option<JoinHandle<()>>,
    owned_slot: Option<u32>,
}

impl SessionController {
    /// Enters the scope: `Disconnected → Connecting → Waiting`, or
    /// `ChannelError` when the channel cannot be opened.
    pub async fn connect<C>(scope: SessionScope, connector: &C) -> Self
    where
        C: ChannelConnector + ?Sized,
    {
        let (state, _) = watch::channel(SessionState::Disconnected);
        let (notices, _) = broadcast::channel(NOTICE_CAPACITY);
        let shared = Arc::new(Shared {
            script_id: scope.script_id.clone(),
            state,
            notices,
            last_notice: Mutex::new(None),
            closed: AtomicBool::new(false),
        });

        let mut controller = Self {
            scope,
            shared,
            outbound: None,
            reader: None,
            driver: None,
            owned_slot: None,
        };

        controller.shared.set_state(SessionState::Connecting);
        match connector.connect().await {
            Ok(link) => {
                let (outbound, inbound, driver) = link.into_parts();
                controller.outbound = Some(outbound);
                controller.driver = driver;
                controller.shared.set_state(SessionState::Waiting);
                controller.reader = Some(tokio::spawn(read_frames(
                    Arc::clone(&controller.shared),
                    inbound,
                )));
                info!(
                    target: "napta::session",
                    script_id = %controller.scope.script_id,
                    endpoint = %connector.endpoint(),
                    "session channel open"
                );
            }
            Err(err) => {
                warn!(
                    target: "napta::session",
                    script_id = %controller.scope.script_id,
                    error = %err,
                    "session channel failed to open"
                );
                controller.shared.set_state(SessionState::ChannelError);
            }
        }
        controller
    }

    pub fn script_id(&self) -> &str {
        &self.scope.script_id
    }

    pub fn meta(&self) -> &PlayableScriptMeta {
        &self.scope.meta
    }

    pub fn state(&self) -> SessionState {
        *self.shared.state.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<SessionState> {
        self.shared.state.subscribe()
    }

    pub fn subscribe_notices(&self) -> broadcast::Receiver<SessionNotice> {
        self.shared.notices.subscribe()
    }

    pub fn last_notice(&self) -> Option<SessionNotice> {
        self.shared
            .last_notice
            .lock()
            .ok()
            .and_then(|last| last.clone())
    }

    /// Slot most recently requested by this client. The display may still
    /// refuse it through an error notice.
    pub fn owned_slot(&self) -> Option<u32> {
        self.owned_slot
    }

    pub fn choose_player(&mut self, slot: u32) -> Result<(), SessionError> {
        if !self.scope.meta.accepts_slot(slot) {
            return Err(SessionError::InvalidSlot {
                slot,
                max_players: self.scope.meta.max_players,
            });
        }
        self.send(&ClientMessage::ChoosePlayer {
            player_number: slot,
        })?;
        self.owned_slot = Some(slot);
        Ok(())
    }

    /// Sends exactly one key frame per call.
    pub fn send_key(&self, direction: Direction) -> Result<(), SessionError> {
        if !self.scope.meta.supports(direction) {
            return Err(SessionError::UnsupportedKey(direction));
        }
        self.send(&ClientMessage::Key { key: direction })
    }

    fn send(&self, message: &ClientMessage) -> Result<(), SessionError> {
        let state = self.state();
        if !state.accepts_input() {
            return Err(SessionError::ChannelNotReady(state));
        }
        let outbound = self
            .outbound
            .as_ref()
            .ok_or(SessionError::ChannelNotReady(state))?;
        let frame = encode_client(message)?;
        if outbound.send(frame).is_err() {
            self.shared.set_state(SessionState::ChannelError);
            return Err(SessionError::ChannelNotReady(SessionState::ChannelError));
        }
        Ok(())
    }

    /// Leaves the scope. Frames arriving after this point are discarded and the
    /// channel is released. Safe to call more than once.
    pub async fn close(&mut self) {
        if self.shared.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(reader) = self.reader.take() {
            reader.abort();
            let _ = reader.await;
        }
        self.outbound.take();
        if let Some(mut driver) = self.driver.take() {
            if tokio::time::timeout(CLOSE_GRACE, &mut driver).await.is_err() {
                driver.abort();
            }
        }
        self.owned_slot = None;
        self.shared.set_state(SessionState::Disconnected);
        info!(
            target: "napta::session",
            script_id = %self.scope.script_id,
            "session closed"
        );
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        self.shared.closed.store(true, Ordering::SeqCst);
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
        if let Some(driver) = self.driver.take() {
            driver.abort();
        }
    }
}

async fn read_frames(shared: Arc<Shared>, mut inbound: mpsc::UnboundedReceiver<String>) {
    while let Some(frame) = inbound.recv().await {
        if shared.closed.load(Ordering::SeqCst) {
            return;
        }
        shared.apply_frame(&frame);
    }
    if !shared.closed.load(Ordering::SeqCst) {
        warn!(
            target: "napta::session",
            script_id = %shared.script_id,
            "session channel lost"
        );
        shared.set_state(SessionState::ChannelError);
    }
}
