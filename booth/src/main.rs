mod camera;
mod controller;
mod detect;
mod store;
mod view;

use smile_booth_common::config::Config;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info};

use camera::HttpCameraConnector;
use controller::Controller;
use detect::HttpDetector;
use store::HttpStore;

#[tokio::main]
async fn main() {
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));

    let config = match Config::load(&config_path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {}: {e}", config_path.display());
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.level.parse().unwrap_or_default()),
        )
        .init();

    info!(
        camera = config.camera.url,
        mode = config.camera.mode,
        detect = config.detect.url,
        save = config.save.url,
        poll_ms = config.capture_loop.poll_interval_ms,
        cooldown_ms = config.capture_loop.cooldown_ms,
        "starting smile booth"
    );

    let client = match reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(config.camera.connect_timeout_secs))
        .build()
    {
        Ok(c) => c,
        Err(e) => {
            error!(error = %e, "failed to build HTTP client");
            std::process::exit(1);
        }
    };

    let connector = HttpCameraConnector::new(config.camera.clone());
    let detector = HttpDetector::new(client.clone(), &config.detect);
    let store = HttpStore::new(client, &config.save);

    let (controller, handle, mut view_rx) =
        Controller::new(connector, detector, store, &config.capture_loop, &config.save);
    let runner = tokio::spawn(controller.run());

    // The log tail is the presentation surface of this headless build
    tokio::spawn(async move {
        while view_rx.changed().await.is_ok() {
            let state = view_rx.borrow_and_update().clone();
            info!(
                status = state.status,
                selfies = state.gallery.len(),
                "view updated"
            );
        }
    });

    handle.start_camera().await;

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for shutdown signal");
    }
    info!("shutting down");
    handle.shutdown().await;
    runner.await.ok();
}
