//! Camera sources the detection loop samples from.
//!
//! Two production modes, selected by `camera.mode` in the config: `mjpeg`
//! holds onto a `multipart/x-mixed-replace` stream and keeps only the most
//! recent frame, `still` fetches one JPEG per sample. Connect failures are
//! the camera-permission errors of the UI: reported once, never retried
//! here — the user re-issues the start action.

mod mjpeg;

use bytes::Bytes;
use futures_util::StreamExt;
use smile_booth_common::config::CameraConfig;
use smile_booth_common::frame::FrameSnapshot;
use std::io::Cursor;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use mjpeg::MultipartParser;

#[derive(Debug, thiserror::Error)]
pub enum CameraError {
    #[error("camera connection failed: {0}")]
    Connect(String),
    #[error("camera returned HTTP status {0}")]
    Status(u16),
    #[error("camera fetch failed: {0}")]
    Fetch(String),
    #[error("unknown camera mode {0:?}, expected \"mjpeg\" or \"still\"")]
    UnknownMode(String),
}

/// Where detection and capture snapshots come from.
///
/// `Ok(None)` means the source is alive but has nothing to offer right now
/// (stream connected but no frame decoded yet, or the stream has ended);
/// the loop treats it as a silent no-op tick.
pub trait FrameSource {
    async fn snapshot(&mut self) -> Result<Option<FrameSnapshot>, CameraError>;

    /// Release the underlying device or connection.
    fn close(&mut self) {}
}

/// Builds a camera session on demand, so a failed start can be retried by
/// the user without tearing the controller down.
pub trait CameraConnector {
    type Source: FrameSource;

    async fn connect(&self) -> Result<Self::Source, CameraError>;
}

pub struct HttpCameraConnector {
    config: CameraConfig,
}

impl HttpCameraConnector {
    pub fn new(config: CameraConfig) -> Self {
        Self { config }
    }
}

impl CameraConnector for HttpCameraConnector {
    type Source = Camera;

    async fn connect(&self) -> Result<Camera, CameraError> {
        Camera::connect(&self.config).await
    }
}

/// A connected camera source in one of the two production modes.
pub enum Camera {
    Mjpeg(MjpegCamera),
    Still(StillCamera),
}

impl Camera {
    pub async fn connect(config: &CameraConfig) -> Result<Self, CameraError> {
        let timeout = Duration::from_secs(config.connect_timeout_secs);
        match config.mode.as_str() {
            "mjpeg" => Ok(Self::Mjpeg(MjpegCamera::connect(&config.url, timeout).await?)),
            "still" => Ok(Self::Still(StillCamera::connect(&config.url, timeout).await?)),
            other => Err(CameraError::UnknownMode(other.to_string())),
        }
    }
}

impl FrameSource for Camera {
    async fn snapshot(&mut self) -> Result<Option<FrameSnapshot>, CameraError> {
        match self {
            Self::Mjpeg(cam) => cam.snapshot(),
            Self::Still(cam) => cam.snapshot().await,
        }
    }

    fn close(&mut self) {
        if let Self::Mjpeg(cam) = self {
            cam.close();
        }
    }
}

/// Live MJPEG stream. A background task parses the multipart body and keeps
/// only the latest JPEG in a watch slot; sampling never blocks on the network.
pub struct MjpegCamera {
    latest: watch::Receiver<Option<Bytes>>,
    reader: JoinHandle<()>,
    seq: u64,
}

impl MjpegCamera {
    pub async fn connect(url: &str, connect_timeout: Duration) -> Result<Self, CameraError> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| CameraError::Connect(e.to_string()))?;
        let response = client
            .get(url)
            .send()
            .await
            .map_err(|e| CameraError::Connect(e.to_string()))?;

        if !response.status().is_success() {
            return Err(CameraError::Status(response.status().as_u16()));
        }

        debug!(url, status = %response.status(), "connected to MJPEG stream");

        let (tx, rx) = watch::channel(None);
        let reader = tokio::spawn(read_stream(response, tx));

        Ok(Self {
            latest: rx,
            reader,
            seq: 0,
        })
    }

    /// Latest frame the reader has decoded, if any. Once the reader task is
    /// gone the stream is dead and sampling goes silent; re-serving the
    /// frozen last frame would keep detection (and auto-capture) chewing on
    /// a stale image forever.
    pub fn snapshot(&mut self) -> Result<Option<FrameSnapshot>, CameraError> {
        if self.reader.is_finished() {
            return Ok(None);
        }
        let jpeg = self.latest.borrow_and_update().clone();
        Ok(jpeg.map(|bytes| {
            self.seq += 1;
            FrameSnapshot::now(bytes.to_vec(), self.seq)
        }))
    }

    pub fn close(&mut self) {
        self.reader.abort();
    }
}

impl Drop for MjpegCamera {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

async fn read_stream(response: reqwest::Response, tx: watch::Sender<Option<Bytes>>) {
    let mut parser = MultipartParser::new();
    let mut body = response.bytes_stream();
    let mut frames: u64 = 0;

    while let Some(chunk) = body.next().await {
        let chunk = match chunk {
            Ok(c) => c,
            Err(e) => {
                warn!(error = %e, "camera stream error, reader stopping");
                return;
            }
        };
        for jpeg in parser.push(&chunk) {
            frames += 1;
            if frames % 100 == 0 {
                debug!(frames, bytes = jpeg.len(), "frames received");
            }
            if tx.send(Some(jpeg)).is_err() {
                // Camera handle dropped, nobody is sampling anymore
                return;
            }
        }
    }
    debug!(frames, "camera stream ended");
}

/// Single-frame endpoint polled once per sample.
pub struct StillCamera {
    client: reqwest::Client,
    url: String,
    seq: u64,
}

impl StillCamera {
    pub async fn connect(url: &str, connect_timeout: Duration) -> Result<Self, CameraError> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| CameraError::Connect(e.to_string()))?;

        // Probe once so a bad URL or denied camera fails the start action
        // instead of every later tick.
        let response = client
            .get(url)
            .send()
            .await
            .map_err(|e| CameraError::Connect(e.to_string()))?;
        if !response.status().is_success() {
            return Err(CameraError::Status(response.status().as_u16()));
        }

        Ok(Self {
            client,
            url: url.to_string(),
            seq: 0,
        })
    }

    pub async fn snapshot(&mut self) -> Result<Option<FrameSnapshot>, CameraError> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| CameraError::Fetch(e.to_string()))?;
        if !response.status().is_success() {
            return Err(CameraError::Status(response.status().as_u16()));
        }
        let jpeg = response
            .bytes()
            .await
            .map_err(|e| CameraError::Fetch(e.to_string()))?;
        self.seq += 1;
        Ok(Some(FrameSnapshot::now(jpeg.to_vec(), self.seq)))
    }
}

/// Read the pixel dimensions out of a JPEG header, for resolution logging.
pub fn jpeg_dimensions(jpeg: &[u8]) -> Option<(u32, u32)> {
    image::ImageReader::new(Cursor::new(jpeg))
        .with_guessed_format()
        .ok()?
        .into_dimensions()
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, RgbImage};

    #[test]
    fn jpeg_dimensions_of_encoded_image() {
        let mut encoded = Vec::new();
        RgbImage::new(64, 48)
            .write_to(&mut Cursor::new(&mut encoded), ImageFormat::Jpeg)
            .unwrap();
        assert_eq!(jpeg_dimensions(&encoded), Some((64, 48)));
    }

    #[test]
    fn jpeg_dimensions_of_garbage_is_none() {
        assert_eq!(jpeg_dimensions(b"not an image"), None);
    }

    #[tokio::test]
    async fn dead_stream_stops_serving_the_last_frame() {
        let (frame_tx, frame_rx) = watch::channel(None);
        let (finish_tx, finish_rx) = tokio::sync::oneshot::channel::<()>();
        // Stands in for read_stream: one frame, then the connection is gone
        let reader = tokio::spawn(async move {
            frame_tx
                .send(Some(Bytes::from_static(b"\xFF\xD8last")))
                .unwrap();
            let _ = finish_rx.await;
        });
        let mut camera = MjpegCamera {
            latest: frame_rx,
            reader,
            seq: 0,
        };

        // While the reader lives, the latest frame is served
        let frame = loop {
            if let Some(f) = camera.snapshot().unwrap() {
                break f;
            }
            tokio::task::yield_now().await;
        };
        assert_eq!(frame.jpeg, b"\xFF\xD8last");

        // Reader exits; the stream is dead and sampling must go silent
        // instead of re-serving the frozen frame
        finish_tx.send(()).unwrap();
        while !camera.reader.is_finished() {
            tokio::task::yield_now().await;
        }
        assert!(camera.snapshot().unwrap().is_none());
        assert!(camera.snapshot().unwrap().is_none());
    }
}
