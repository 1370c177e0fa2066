use smile_booth_common::config::DetectConfig;
use smile_booth_common::frame::FrameSnapshot;
use smile_booth_common::protocol::{DetectResponse, ImageRequest};
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum DetectError {
    #[error("detect request failed: {0}")]
    Transport(String),
    #[error("invalid detect response: {0}")]
    Decode(String),
}

/// Asks the detection collaborator whether a frame shows a smile.
pub trait SmileDetector {
    async fn detect(&self, frame: &FrameSnapshot) -> Result<DetectResponse, DetectError>;
}

pub struct HttpDetector {
    client: reqwest::Client,
    url: String,
}

impl HttpDetector {
    pub fn new(client: reqwest::Client, config: &DetectConfig) -> Self {
        Self {
            client,
            url: config.url.clone(),
        }
    }
}

impl SmileDetector for HttpDetector {
    async fn detect(&self, frame: &FrameSnapshot) -> Result<DetectResponse, DetectError> {
        let response = self
            .client
            .post(&self.url)
            .json(&ImageRequest::new(frame.to_data_uri()))
            .send()
            .await
            .map_err(|e| DetectError::Transport(e.to_string()))?;

        // The endpoint reports application errors in the JSON body, with a
        // non-2xx status for some of them; decode the body either way.
        let status = response.status();
        let result: DetectResponse = response
            .json()
            .await
            .map_err(|e| DetectError::Decode(e.to_string()))?;
        debug!(
            seq = frame.seq,
            %status,
            smile = result.smile_detected,
            "detect response"
        );
        Ok(result)
    }
}
