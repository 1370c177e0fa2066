use smile_booth_common::config::SaveConfig;
use smile_booth_common::frame::FrameSnapshot;
use smile_booth_common::protocol::{ImageRequest, SaveResponse};
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum SaveError {
    #[error("save request failed: {0}")]
    Transport(String),
    #[error("invalid save response: {0}")]
    Decode(String),
}

/// Hands a captured frame to the persistence collaborator.
pub trait SelfieStore {
    async fn save(&self, frame: &FrameSnapshot) -> Result<SaveResponse, SaveError>;
}

pub struct HttpStore {
    client: reqwest::Client,
    url: String,
}

impl HttpStore {
    pub fn new(client: reqwest::Client, config: &SaveConfig) -> Self {
        Self {
            client,
            url: config.url.clone(),
        }
    }
}

impl SelfieStore for HttpStore {
    async fn save(&self, frame: &FrameSnapshot) -> Result<SaveResponse, SaveError> {
        let response = self
            .client
            .post(&self.url)
            .json(&ImageRequest::new(frame.to_data_uri()))
            .send()
            .await
            .map_err(|e| SaveError::Transport(e.to_string()))?;

        let status = response.status();
        let result: SaveResponse = response
            .json()
            .await
            .map_err(|e| SaveError::Decode(e.to_string()))?;
        debug!(
            seq = frame.seq,
            %status,
            success = result.success,
            path = result.path.as_deref().unwrap_or(""),
            "save response"
        );
        Ok(result)
    }
}
