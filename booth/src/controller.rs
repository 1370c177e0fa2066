//! The capture loop controller.
//!
//! One actor owns the whole session: the camera source, the cooldown clock,
//! the status generation and the pending status revert. Its `run` loop
//! selects over three event sources — user commands, the poll interval
//! (armed only while a camera session exists) and the one-shot revert
//! deadline. Detect requests are awaited inside the tick body, so in-flight
//! requests never overlap and a slow response cannot land after a newer one.

use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use smile_booth_common::config::{LoopConfig, SaveConfig};
use smile_booth_common::frame::FrameSnapshot;

use crate::camera::{self, CameraConnector, FrameSource};
use crate::detect::SmileDetector;
use crate::store::SelfieStore;
use crate::view::{self, View, ViewState};

#[derive(Debug)]
pub enum Command {
    StartCamera,
    TakeSelfie,
    Shutdown,
}

/// What asked for a capture. Automatic captures are throttled by the
/// cooldown window; manual ones bypass it and leave the throttle untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trigger {
    Automatic,
    Manual,
}

/// Cloneable command side of the controller.
#[derive(Clone)]
pub struct ControllerHandle {
    tx: mpsc::Sender<Command>,
}

impl ControllerHandle {
    pub async fn start_camera(&self) {
        let _ = self.tx.send(Command::StartCamera).await;
    }

    pub async fn take_selfie(&self) {
        let _ = self.tx.send(Command::TakeSelfie).await;
    }

    pub async fn shutdown(&self) {
        let _ = self.tx.send(Command::Shutdown).await;
    }
}

struct Session<C> {
    camera: C,
    /// Set only by automatic captures; gates the cooldown window.
    last_auto_capture: Option<Instant>,
}

struct PendingRevert {
    deadline: Instant,
    /// Status generation at scheduling time; the revert is dropped when a
    /// newer status write has happened since.
    generation: u64,
}

pub struct Controller<K: CameraConnector, D: SmileDetector, S: SelfieStore> {
    connector: K,
    detector: D,
    store: S,
    view: View,
    rx: mpsc::Receiver<Command>,
    session: Option<Session<K::Source>>,
    pending_revert: Option<PendingRevert>,
    poll_interval: Duration,
    cooldown: Duration,
    status_revert: Duration,
    static_prefix: String,
    logged_resolution: bool,
}

impl<K, D, S> Controller<K, D, S>
where
    K: CameraConnector,
    D: SmileDetector,
    S: SelfieStore,
{
    pub fn new(
        connector: K,
        detector: D,
        store: S,
        loop_config: &LoopConfig,
        save_config: &SaveConfig,
    ) -> (Self, ControllerHandle, watch::Receiver<ViewState>) {
        let (tx, rx) = mpsc::channel(16);
        let (view, view_rx) = View::new();
        let controller = Self {
            connector,
            detector,
            store,
            view,
            rx,
            session: None,
            pending_revert: None,
            poll_interval: Duration::from_millis(loop_config.poll_interval_ms),
            cooldown: Duration::from_millis(loop_config.cooldown_ms),
            status_revert: Duration::from_millis(loop_config.status_revert_ms),
            static_prefix: save_config.static_prefix.clone(),
            logged_resolution: false,
        };
        (controller, ControllerHandle { tx }, view_rx)
    }

    /// Drive the controller until Shutdown arrives or every handle is gone.
    pub async fn run(mut self) {
        let mut ticker: Option<Interval> = None;

        loop {
            let revert_deadline = self.pending_revert.as_ref().map(|p| p.deadline);

            tokio::select! {
                cmd = self.rx.recv() => match cmd {
                    Some(Command::StartCamera) => {
                        if self.start_camera().await && ticker.is_none() {
                            ticker = Some(make_ticker(self.poll_interval));
                        }
                    }
                    Some(Command::TakeSelfie) => {
                        self.capture_and_save(Trigger::Manual).await;
                    }
                    Some(Command::Shutdown) | None => break,
                },
                _ = async { ticker.as_mut().unwrap().tick().await }, if ticker.is_some() => {
                    self.on_tick().await;
                }
                _ = tokio::time::sleep_until(revert_deadline.unwrap_or_else(Instant::now)),
                        if revert_deadline.is_some() => {
                    self.apply_pending_revert();
                }
            }
        }

        self.teardown();
        info!("capture loop stopped");
    }

    /// Acquire the camera and begin detecting. Idempotent: a second start
    /// while a session is live does nothing. Returns true when a new session
    /// was created.
    async fn start_camera(&mut self) -> bool {
        if self.session.is_some() {
            debug!("camera already running, ignoring start");
            return false;
        }

        match self.connector.connect().await {
            Ok(camera) => {
                self.session = Some(Session {
                    camera,
                    last_auto_capture: None,
                });
                self.view.set_controls(false, true);
                self.view.set_status(view::STATUS_CAMERA_STARTED);
                info!("camera session started");
                true
            }
            Err(e) => {
                warn!(error = %e, "camera access failed");
                self.view.set_status(view::STATUS_CAMERA_ERROR);
                false
            }
        }
    }

    /// One detection tick: sample, ask the detector, maybe capture.
    async fn on_tick(&mut self) {
        let frame = match self.snapshot().await {
            Some(f) => f,
            None => return, // no session or no frame yet
        };

        match self.detector.detect(&frame).await {
            Ok(result) if result.smile_detected => {
                self.view.set_status(view::STATUS_SMILE);
                let now = Instant::now();
                let cooled_down = self
                    .session
                    .as_ref()
                    .and_then(|s| s.last_auto_capture)
                    .map_or(true, |last| now.duration_since(last) >= self.cooldown);
                if cooled_down {
                    self.capture_and_save(Trigger::Automatic).await;
                    if let Some(session) = self.session.as_mut() {
                        session.last_auto_capture = Some(now);
                    }
                } else {
                    debug!("smile acknowledged but capture throttled");
                }
            }
            Ok(result) => match result.error {
                Some(err) => {
                    self.view.set_status(&format!("Error: {err}"));
                }
                None => {
                    self.view.set_status(view::STATUS_NO_SMILE);
                }
            },
            Err(e) => {
                warn!(error = %e, "smile detection request failed");
                self.view.set_status(view::STATUS_DETECT_ERROR);
            }
        }
    }

    /// Capture a fresh frame and hand it to the persistence collaborator.
    /// The frame is sampled independently of the one that triggered
    /// detection, so the saved image can differ slightly.
    async fn capture_and_save(&mut self, trigger: Trigger) {
        let frame = match self.snapshot().await {
            Some(f) => f,
            None => return,
        };
        info!(?trigger, seq = frame.seq, bytes = frame.len(), "capturing selfie");

        match self.store.save(&frame).await {
            Ok(result) if result.success => {
                let generation = self.view.set_status(view::STATUS_CAPTURED);
                match result.path {
                    Some(path) => {
                        let url = view::asset_url(&self.static_prefix, &path);
                        info!(url, "selfie stored");
                        self.view.push_gallery_entry(url, frame.captured_at_ms);
                    }
                    None => warn!("save succeeded but returned no path"),
                }
                self.pending_revert = Some(PendingRevert {
                    deadline: Instant::now() + self.status_revert,
                    generation,
                });
            }
            Ok(result) => match result.error {
                Some(err) => {
                    self.view.set_status(&format!("Error: {err}"));
                }
                // A failure that names no reason gets logged but leaves the
                // status alone, matching the observed endpoint contract.
                None => warn!("save failed without an error message"),
            },
            Err(e) => {
                warn!(error = %e, "selfie save request failed");
                self.view.set_status(view::STATUS_SAVE_ERROR);
            }
        }
    }

    /// Fresh frame from the live session, logging the native resolution the
    /// first time one shows up. None when there is no session or no frame.
    async fn snapshot(&mut self) -> Option<FrameSnapshot> {
        let session = self.session.as_mut()?;
        let frame = match session.camera.snapshot().await {
            Ok(Some(f)) => f,
            Ok(None) => return None,
            Err(e) => {
                debug!(error = %e, "camera snapshot failed, skipping tick");
                return None;
            }
        };
        if !self.logged_resolution {
            self.logged_resolution = true;
            match camera::jpeg_dimensions(&frame.jpeg) {
                Some((width, height)) => info!(width, height, "camera native resolution"),
                None => warn!(bytes = frame.len(), "first frame is not a decodable JPEG"),
            }
        }
        Some(frame)
    }

    /// Put the "active" message back, unless something newer was written
    /// since the revert was scheduled.
    fn apply_pending_revert(&mut self) {
        if let Some(pending) = self.pending_revert.take() {
            if self.view.status_generation() == pending.generation {
                self.view.set_status(view::STATUS_ACTIVE);
            } else {
                debug!("status changed since capture, skipping revert");
            }
        }
    }

    fn teardown(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.camera.close();
            info!("camera session closed");
        }
    }
}

fn make_ticker(period: Duration) -> Interval {
    // First tick one full period after start, not immediately
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}
