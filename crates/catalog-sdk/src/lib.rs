//! Asynchronous client for the matrix display script catalog.
//!
//! The client is stateless: every call re-queries the backend. Callers own
//! caching, but after a successful [`CatalogClient::switch_script`] they must
//! call [`CatalogClient::list_scripts`] again before trusting the current
//! script. Nothing here retries; failures are returned as-is.

mod model;
mod switch;

pub use model::{Catalog, PlayableScriptMeta, ScriptDescriptor};
pub use switch::{ImagePayload, SwitchRequest};

use reqwest::multipart::{Form, Part};
use reqwest::Client;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use crate::model::{RawListing, RawPlayable};
use crate::switch::{rejection_reason, ChangeScriptBody};

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("catalog backend unavailable: {0}")]
    Unavailable(String),
    #[error("script '{script_id}' requires an image payload")]
    PreconditionFailed { script_id: String },
    #[error("switch rejected: {0}")]
    SwitchRejected(String),
    #[error("no playable metadata for script '{script_id}': {reason}")]
    MetaUnavailable { script_id: String, reason: String },
    #[error("invalid catalog url '{0}'")]
    InvalidUrl(String),
}

impl From<reqwest::Error> for CatalogError {
    fn from(err: reqwest::Error) -> Self {
        CatalogError::Unavailable(err.to_string())
    }
}

#[derive(Clone, Debug)]
pub struct CatalogClient {
    http: Client,
    base_url: String,
}

impl CatalogClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, Client::new())
    }

    pub fn with_client(base_url: impl Into<String>, http: Client) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { http, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `GET /scripts`.
    pub async fn list_scripts(&self) -> Result<Catalog, CatalogError> {
        let url = self.endpoint(&["scripts"])?;
        debug!(target: "napta::catalog", %url, "listing scripts");
        let res = self.http.get(url).send().await.map_err(|err| {
            warn!(target: "napta::catalog", error = %err, "script listing failed");
            CatalogError::from(err)
        })?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            warn!(target: "napta::catalog", %status, "script listing returned error status");
            return Err(CatalogError::Unavailable(format!(
                "unexpected status: {status} body={body}"
            )));
        }

        let listing = res.json::<RawListing>().await?;
        let catalog = Catalog::from(listing);
        debug!(
            target: "napta::catalog",
            scripts = catalog.scripts.len(),
            current = ?catalog.current_script_id,
            "script listing received"
        );
        Ok(catalog)
    }

    /// `POST /scripts/change`.
    ///
    /// Fails with [`CatalogError::PreconditionFailed`] before touching the
    /// network when the target needs an image and none is attached.
    pub async fn switch_script(&self, request: SwitchRequest) -> Result<(), CatalogError> {
        request.validate()?;
        let url = self.endpoint(&["scripts", "change"])?;
        let (script_id, image) = request.into_parts();

        let builder = self.http.post(url);
        let builder = match image {
            Some(image) => {
                debug!(
                    target: "napta::catalog",
                    script_id = %script_id,
                    image_bytes = image.bytes.len(),
                    "switching script with image"
                );
                let part = Part::bytes(image.bytes)
                    .file_name(image.file_name)
                    .mime_str("application/octet-stream")?;
                let form = Form::new()
                    .text("script_id", script_id.clone())
                    .part("image", part);
                builder.multipart(form)
            }
            None => {
                debug!(target: "napta::catalog", script_id = %script_id, "switching script");
                builder.json(&ChangeScriptBody {
                    script_id: &script_id,
                })
            }
        };

        let res = builder.send().await.map_err(|err| {
            warn!(
                target: "napta::catalog",
                script_id = %script_id,
                error = %err,
                "switch request failed"
            );
            CatalogError::from(err)
        })?;

        let status = res.status();
        if status.is_success() {
            return Ok(());
        }
        let body = res.text().await.unwrap_or_default();
        let reason = rejection_reason(status, &body);
        warn!(
            target: "napta::catalog",
            script_id = %script_id,
            %status,
            reason = %reason,
            "switch rejected"
        );
        Err(CatalogError::SwitchRejected(reason))
    }

    /// `GET /scripts/{script_id}/playable`.
    pub async fn get_playable_meta(
        &self,
        script_id: &str,
    ) -> Result<PlayableScriptMeta, CatalogError> {
        let url = self.endpoint(&["scripts", script_id, "playable"])?;
        debug!(target: "napta::catalog", script_id, "fetching playable metadata");
        let res = self.http.get(url).send().await.map_err(|err| {
            warn!(
                target: "napta::catalog",
                script_id,
                error = %err,
                "playable metadata request failed"
            );
            CatalogError::from(err)
        })?;

        let status = res.status();
        if status.is_client_error() {
            let body = res.text().await.unwrap_or_default();
            return Err(CatalogError::MetaUnavailable {
                script_id: script_id.to_string(),
                reason: rejection_reason(status, &body),
            });
        }
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(CatalogError::Unavailable(format!(
                "unexpected status: {status} body={body}"
            )));
        }

        let raw = res
            .json::<RawPlayable>()
            .await
            .map_err(|err| CatalogError::MetaUnavailable {
                script_id: script_id.to_string(),
                reason: err.to_string(),
            })?;
        raw.into_meta(script_id)
            .ok_or_else(|| CatalogError::MetaUnavailable {
                script_id: script_id.to_string(),
                reason: "player bounds are inconsistent".to_string(),
            })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, CatalogError> {
        let invalid = || CatalogError::InvalidUrl(self.base_url.clone());
        let mut url = Url::parse(&self.base_url).map_err(|_| invalid())?;
        url.path_segments_mut()
            .map_err(|_| invalid())?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_appends_segments_and_escapes_ids() {
        let client = CatalogClient::new("http://127.0.0.1:8042/");
        assert_eq!(client.base_url(), "http://127.0.0.1:8042");
        assert_eq!(
            client.endpoint(&["scripts"]).unwrap().as_str(),
            "http://127.0.0.1:8042/scripts"
        );
        assert_eq!(
            client
                .endpoint(&["scripts", "my script", "playable"])
                .unwrap()
                .as_str(),
            "http://127.0.0.1:8042/scripts/my%20script/playable"
        );
    }

    #[test]
    fn endpoint_keeps_base_path_prefix() {
        let client = CatalogClient::new("http://display.local/api");
        assert_eq!(
            client.endpoint(&["scripts", "change"]).unwrap().as_str(),
            "http://display.local/api/scripts/change"
        );
    }

    #[test]
    fn rejects_unparseable_base_url() {
        let client = CatalogClient::new("not a url");
        assert!(matches!(
            client.endpoint(&["scripts"]),
            Err(CatalogError::InvalidUrl(_))
        ));
    }
}
