//! Wire types for the two collaborator endpoints.
//!
//! Both endpoints take the same request shape and answer with small JSON
//! objects; optional fields are omitted when absent so the types round-trip
//! against servers that leave them out entirely.

use serde::{Deserialize, Serialize};

/// Request body for both `POST /detect` and `POST /save`:
/// `{ "image": "data:image/jpeg;base64,..." }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageRequest {
    pub image: String,
}

impl ImageRequest {
    pub fn new(image: String) -> Self {
        Self { image }
    }
}

/// `POST /detect` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectResponse {
    pub smile_detected: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// `POST /save` response. `path` is relative and is expected to be servable
/// under the configured static-asset prefix.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
