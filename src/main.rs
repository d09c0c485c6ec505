use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use spotwatch::analytics::{spawn_session, Monitor, OccupancyClassifier, Session, SpotModel, SvmModel};
use spotwatch::api::{start_server, AppState};
use spotwatch::camera::{load_components, FrameSource, VideoFileSource};
use spotwatch::config::{Config, ModelConfig, ModelKind};
use spotwatch::spots::{derive_regions, SpotLayout, StatusBoard};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("spotwatch=debug".parse()?))
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    let components = load_components(&config.mask.path)?;
    let source = VideoFileSource::open(&config.video.path)?;
    let layout = SpotLayout::new(derive_regions(&components), source.frame_size())?;
    tracing::info!(
        spots = layout.len(),
        frame = %layout.frame_size(),
        "derived spot regions from mask"
    );

    let model = load_model(&config.model)?;
    let classifier = OccupancyClassifier::new(model, config.model.input_size);
    let monitor = Monitor::new(layout, classifier, &config.monitor)?;
    let session = Session::new(source, monitor)?;

    let board = StatusBoard::new();
    let shutdown = Arc::new(AtomicBool::new(false));

    let server_handle = if config.http.enabled {
        let state = AppState::new(board.clone());
        let port = config.http.port;
        Some(tokio::spawn(async move {
            if let Err(e) = start_server(state, port).await {
                tracing::error!(error = %e, "HTTP server failed");
            }
        }))
    } else {
        None
    };

    let signal_flag = Arc::clone(&shutdown);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("shutdown signal received");
            signal_flag.store(true, Ordering::Relaxed);
        }
    });

    let result = spawn_session(session, board.clone(), shutdown).await;

    if let Some(handle) = server_handle {
        handle.abort();
    }

    let summary = result??;
    if let Some((frame, occupancy)) = board.summary() {
        tracing::info!(frame, "final occupancy: {}", occupancy);
    }
    tracing::info!(
        frames = summary.frames,
        samples = summary.samples,
        "shutdown complete"
    );

    Ok(())
}

fn load_model(config: &ModelConfig) -> Result<Box<dyn SpotModel>, Box<dyn std::error::Error>> {
    match config.kind {
        ModelKind::Svm => Ok(Box::new(SvmModel::load(&config.path)?)),
        #[cfg(feature = "onnx")]
        ModelKind::Onnx => Ok(Box::new(spotwatch::analytics::OnnxModel::load(&config.path)?)),
        #[cfg(not(feature = "onnx"))]
        ModelKind::Onnx => Err("onnx models need the `onnx` feature".into()),
    }
}
