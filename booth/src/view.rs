//! Observable presentation surface for the capture loop.
//!
//! The controller never touches a UI directly; it publishes a [`ViewState`]
//! through a watch channel and whoever renders (the log tail in `main`, a
//! future frontend) subscribes. Status writes carry a generation counter so
//! a delayed revert can tell whether anything newer landed in the meantime.

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tracing::debug;

pub const STATUS_IDLE: &str = "Start the camera to begin smile detection.";
pub const STATUS_CAMERA_STARTED: &str = "Camera started. Smile detection active!";
pub const STATUS_ACTIVE: &str = "Smile detection active!";
pub const STATUS_SMILE: &str = "Smile detected!";
pub const STATUS_NO_SMILE: &str = "No smile detected. Smile to take a selfie!";
pub const STATUS_CAMERA_ERROR: &str = "Error accessing camera. Please check permissions.";
pub const STATUS_DETECT_ERROR: &str = "Error communicating with server.";
pub const STATUS_CAPTURED: &str = "Selfie captured!";
pub const STATUS_SAVE_ERROR: &str = "Error saving selfie.";

/// One saved selfie, most recent first in [`ViewState::gallery`].
#[derive(Debug, Clone, PartialEq)]
pub struct GalleryEntry {
    pub url: String,
    pub captured_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct ViewState {
    pub status: String,
    pub start_enabled: bool,
    pub capture_enabled: bool,
    /// Show the "no images yet" placeholder; cleared by the first entry.
    pub placeholder: bool,
    pub gallery: Vec<GalleryEntry>,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            status: STATUS_IDLE.to_string(),
            start_enabled: true,
            capture_enabled: false,
            placeholder: true,
            gallery: Vec::new(),
        }
    }
}

/// Single writer for the view state, owned by the controller.
pub struct View {
    tx: watch::Sender<ViewState>,
    generation: u64,
}

impl View {
    pub fn new() -> (Self, watch::Receiver<ViewState>) {
        let (tx, rx) = watch::channel(ViewState::default());
        (Self { tx, generation: 0 }, rx)
    }

    /// Replace the status text. Returns the generation of this write.
    pub fn set_status(&mut self, text: &str) -> u64 {
        self.generation += 1;
        debug!(status = text, generation = self.generation, "status updated");
        self.tx.send_modify(|v| {
            v.status.clear();
            v.status.push_str(text);
        });
        self.generation
    }

    /// Generation of the most recent status write.
    pub fn status_generation(&self) -> u64 {
        self.generation
    }

    pub fn set_controls(&mut self, start_enabled: bool, capture_enabled: bool) {
        self.tx.send_modify(|v| {
            v.start_enabled = start_enabled;
            v.capture_enabled = capture_enabled;
        });
    }

    /// Prepend a saved selfie, clearing the placeholder on the first one.
    pub fn push_gallery_entry(&mut self, url: String, captured_at_ms: i64) {
        let captured_at = DateTime::from_timestamp_millis(captured_at_ms).unwrap_or_else(Utc::now);
        self.tx.send_modify(|v| {
            v.placeholder = false;
            v.gallery.insert(0, GalleryEntry { url, captured_at });
        });
    }
}

/// Join the static-asset prefix with the relative path a save response returns.
pub fn asset_url(prefix: &str, path: &str) -> String {
    format!(
        "{}/{}",
        prefix.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_writes_bump_generation() {
        let (mut view, rx) = View::new();
        assert_eq!(view.status_generation(), 0);
        let first = view.set_status(STATUS_SMILE);
        let second = view.set_status(STATUS_CAPTURED);
        assert!(second > first);
        assert_eq!(rx.borrow().status, STATUS_CAPTURED);
    }

    #[test]
    fn gallery_is_most_recent_first() {
        let (mut view, rx) = View::new();
        assert!(rx.borrow().placeholder);
        view.push_gallery_entry("/static/uploads/a.jpg".into(), 1_708_300_000_000);
        view.push_gallery_entry("/static/uploads/b.jpg".into(), 1_708_300_001_000);
        let state = rx.borrow();
        assert!(!state.placeholder);
        assert_eq!(state.gallery[0].url, "/static/uploads/b.jpg");
        assert_eq!(state.gallery[1].url, "/static/uploads/a.jpg");
    }

    #[test]
    fn controls_start_disabled_capture_enabled_after_update() {
        let (mut view, rx) = View::new();
        assert!(rx.borrow().start_enabled);
        assert!(!rx.borrow().capture_enabled);
        view.set_controls(false, true);
        assert!(!rx.borrow().start_enabled);
        assert!(rx.borrow().capture_enabled);
    }

    #[test]
    fn asset_url_normalizes_slashes() {
        assert_eq!(asset_url("/static", "uploads/img1.jpg"), "/static/uploads/img1.jpg");
        assert_eq!(asset_url("/static/", "/uploads/img1.jpg"), "/static/uploads/img1.jpg");
        assert_eq!(asset_url("/media", "x.jpg"), "/media/x.jpg");
    }
}
