//! Binds the catalog's current script to at most one live session.
//!
//! The catalog is only ever replaced by a fresh listing from the backend, and
//! every successful switch is followed by such a listing. Whenever the current
//! script id differs from the scoped one, the old session is closed before a
//! new channel is opened.

use catalog_sdk::{
    Catalog, CatalogClient, CatalogError, ImagePayload, PlayableScriptMeta, ScriptDescriptor,
    SwitchRequest,
};
use control_proto::Direction;
use thiserror::Error;
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};

use crate::session::{SessionController, SessionError, SessionNotice, SessionScope, SessionState};
use crate::transport::ChannelConnector;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error("no playable session is active")]
    NoActiveSession,
}

pub struct ScriptOrchestrator<C: ChannelConnector> {
    catalog_client: CatalogClient,
    connector: C,
    catalog: Option<Catalog>,
    scoped_script: Option<String>,
    session: Option<SessionController>,
}

impl<C: ChannelConnector> ScriptOrchestrator<C> {
    pub fn new(catalog_client: CatalogClient, connector: C) -> Self {
        Self {
            catalog_client,
            connector,
            catalog: None,
            scoped_script: None,
            session: None,
        }
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    /// Last listing received from the backend.
    pub fn catalog(&self) -> Option<&Catalog> {
        self.catalog.as_ref()
    }

    pub fn current_script(&self) -> Option<&ScriptDescriptor> {
        self.catalog.as_ref().and_then(Catalog::current)
    }

    /// Script id the session layer is currently scoped to, playable or not.
    pub fn scoped_script(&self) -> Option<&str> {
        self.scoped_script.as_deref()
    }

    pub fn has_session(&self) -> bool {
        self.session.is_some()
    }

    pub fn session_state(&self) -> Option<SessionState> {
        self.session.as_ref().map(SessionController::state)
    }

    pub fn session_meta(&self) -> Option<&PlayableScriptMeta> {
        self.session.as_ref().map(SessionController::meta)
    }

    pub fn owned_slot(&self) -> Option<u32> {
        self.session.as_ref().and_then(SessionController::owned_slot)
    }

    pub fn last_notice(&self) -> Option<SessionNotice> {
        self.session.as_ref().and_then(SessionController::last_notice)
    }

    pub fn subscribe_state(&self) -> Option<watch::Receiver<SessionState>> {
        self.session.as_ref().map(SessionController::subscribe_state)
    }

    pub fn subscribe_notices(&self) -> Option<broadcast::Receiver<SessionNotice>> {
        self.session
            .as_ref()
            .map(SessionController::subscribe_notices)
    }

    /// Fetches a fresh listing and re-scopes the session if the current
    /// script changed.
    pub async fn refresh(&mut self) -> Result<(), OrchestratorError> {
        let catalog = self.catalog_client.list_scripts().await?;
        self.catalog = Some(catalog);
        self.reconcile().await
    }

    /// Switches the display and then refetches the catalog. The image
    /// requirement is checked against the script's descriptor before the
    /// switch is sent; a fresh listing is fetched when the cached catalog does
    /// not know the script.
    pub async fn switch_script(
        &mut self,
        script_id: &str,
        image: Option<ImagePayload>,
    ) -> Result<(), OrchestratorError> {
        let request = self.switch_request(script_id).await?;
        let request = match image {
            Some(image) => request.with_image_named(image.bytes, image.file_name),
            None => request,
        };

        self.catalog_client.switch_script(request).await?;
        info!(target: "napta::orchestrator", script_id, "switch acknowledged; refreshing catalog");
        self.refresh().await
    }

    /// Tears down and rebuilds the session for the current script even if it
    /// did not change. This is the way out of `ChannelError`.
    pub async fn rescope(&mut self) -> Result<(), OrchestratorError> {
        let current = self.current_script().cloned();
        self.scope_to(current).await
    }

    pub fn choose_player(&mut self, slot: u32) -> Result<(), OrchestratorError> {
        let session = self
            .session
            .as_mut()
            .ok_or(OrchestratorError::NoActiveSession)?;
        session.choose_player(slot)?;
        Ok(())
    }

    pub fn send_key(&self, direction: Direction) -> Result<(), OrchestratorError> {
        let session = self
            .session
            .as_ref()
            .ok_or(OrchestratorError::NoActiveSession)?;
        session.send_key(direction)?;
        Ok(())
    }

    pub async fn shutdown(&mut self) {
        self.teardown().await;
        self.scoped_script = None;
    }

    /// The lookup listing is not cached: only `refresh` replaces the catalog,
    /// so the scoped session always matches the cached current script.
    async fn switch_request(&self, script_id: &str) -> Result<SwitchRequest, OrchestratorError> {
        let cached = self.catalog.as_ref().and_then(|catalog| catalog.get(script_id));
        if let Some(descriptor) = cached {
            return Ok(SwitchRequest::for_descriptor(descriptor));
        }
        debug!(
            target: "napta::orchestrator",
            script_id,
            "script not in cached catalog; fetching listing"
        );
        let listing = self.catalog_client.list_scripts().await?;
        Ok(match listing.get(script_id) {
            Some(descriptor) => SwitchRequest::for_descriptor(descriptor),
            None => SwitchRequest::new(script_id),
        })
    }

    async fn reconcile(&mut self) -> Result<(), OrchestratorError> {
        let current = self.current_script().cloned();
        let current_id = current.as_ref().map(|descriptor| descriptor.id.as_str());
        if current_id == self.scoped_script.as_deref() {
            return Ok(());
        }
        debug!(
            target: "napta::orchestrator",
            from = ?self.scoped_script,
            to = ?current_id,
            "current script changed"
        );
        self.scope_to(current).await
    }

    async fn scope_to(
        &mut self,
        current: Option<ScriptDescriptor>,
    ) -> Result<(), OrchestratorError> {
        self.teardown().await;
        self.scoped_script = None;

        let Some(descriptor) = current else {
            return Ok(());
        };
        if !descriptor.is_playable {
            self.scoped_script = Some(descriptor.id);
            return Ok(());
        }

        match self.catalog_client.get_playable_meta(&descriptor.id).await {
            Ok(meta) => {
                let controller =
                    SessionController::connect(SessionScope::new(meta), &self.connector).await;
                info!(
                    target: "napta::orchestrator",
                    script_id = %descriptor.id,
                    state = %controller.state(),
                    "session scoped"
                );
                self.session = Some(controller);
                self.scoped_script = Some(descriptor.id);
                Ok(())
            }
            Err(err @ CatalogError::MetaUnavailable { .. }) => {
                warn!(
                    target: "napta::orchestrator",
                    script_id = %descriptor.id,
                    error = %err,
                    "playable script has no usable metadata; no session"
                );
                self.scoped_script = Some(descriptor.id);
                Ok(())
            }
            // Scope stays unset so the next refresh tries again.
            Err(err) => Err(err.into()),
        }
    }

    async fn teardown(&mut self) {
        if let Some(mut session) = self.session.take() {
            debug!(
                target: "napta::orchestrator",
                script_id = %session.script_id(),
                "tearing down session"
            );
            session.close().await;
        }
    }
}
