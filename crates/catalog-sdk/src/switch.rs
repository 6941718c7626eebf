use reqwest::StatusCode;
use serde::Serialize;
use serde_json::Value;

use crate::model::ScriptDescriptor;
use crate::CatalogError;

const DEFAULT_IMAGE_NAME: &str = "upload.bin";

/// Binary attachment forwarded to scripts that draw an uploaded image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePayload {
    pub bytes: Vec<u8>,
    pub file_name: String,
}

/// Request to make `script_id` the active script.
#[derive(Debug, Clone)]
pub struct SwitchRequest {
    script_id: String,
    requires_image: bool,
    image: Option<ImagePayload>,
}

impl SwitchRequest {
    /// A switch whose image requirement is unknown; the backend decides.
    pub fn new(script_id: impl Into<String>) -> Self {
        Self {
            script_id: script_id.into(),
            requires_image: false,
            image: None,
        }
    }

    pub fn for_descriptor(descriptor: &ScriptDescriptor) -> Self {
        Self {
            script_id: descriptor.id.clone(),
            requires_image: descriptor.requires_image,
            image: None,
        }
    }

    pub fn with_image(self, bytes: Vec<u8>) -> Self {
        self.with_image_named(bytes, DEFAULT_IMAGE_NAME)
    }

    pub fn with_image_named(mut self, bytes: Vec<u8>, file_name: impl Into<String>) -> Self {
        self.image = Some(ImagePayload {
            bytes,
            file_name: file_name.into(),
        });
        self
    }

    pub fn image(&self) -> Option<&ImagePayload> {
        self.image.as_ref()
    }

    pub(crate) fn validate(&self) -> Result<(), CatalogError> {
        if self.requires_image && self.image.is_none() {
            return Err(CatalogError::PreconditionFailed {
                script_id: self.script_id.clone(),
            });
        }
        Ok(())
    }

    pub(crate) fn into_parts(self) -> (String, Option<ImagePayload>) {
        (self.script_id, self.image)
    }
}

/// Structured body used when no image is attached.
#[derive(Debug, Serialize)]
pub(crate) struct ChangeScriptBody<'a> {
    pub script_id: &'a str,
}

/// Extracts the operator-facing reason from a rejected switch.
pub(crate) fn rejection_reason(status: StatusCode, body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<Value>(body) {
        match value.get("detail") {
            Some(Value::String(detail)) => return detail.clone(),
            Some(Value::Array(entries)) => {
                let messages: Vec<&str> = entries
                    .iter()
                    .filter_map(|entry| entry.get("msg").and_then(Value::as_str))
                    .collect();
                if !messages.is_empty() {
                    return messages.join("; ");
                }
            }
            _ => {}
        }
    }

    let trimmed = body.trim();
    if !trimmed.is_empty() {
        return trimmed.to_string();
    }
    status
        .canonical_reason()
        .map(str::to_string)
        .unwrap_or_else(|| status.as_str().to_string())
}
