use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use serde::Serialize;

use crate::spots::{OccupancySummary, StatusBoard};

#[derive(Clone)]
pub struct AppState {
    pub board: StatusBoard,
}

impl AppState {
    pub fn new(board: StatusBoard) -> Self {
        Self { board }
    }
}

#[derive(Serialize)]
struct SummaryResponse {
    frame_index: u64,
    #[serde(flatten)]
    summary: OccupancySummary,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/summary", get(summary_handler))
        .route("/api/spots", get(spots_handler))
        .route("/api/spots/{index}", get(spot_handler))
        .with_state(state)
}

pub async fn start_server(state: AppState, port: u16) -> Result<(), std::io::Error> {
    let app = router(state);

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("starting HTTP server on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await
}

fn not_ready() -> Response {
    (StatusCode::SERVICE_UNAVAILABLE, "no frame processed yet").into_response()
}

async fn summary_handler(State(state): State<AppState>) -> Response {
    match state.board.summary() {
        Some((frame_index, summary)) => axum::Json(SummaryResponse {
            frame_index,
            summary,
        })
        .into_response(),
        None => not_ready(),
    }
}

async fn spots_handler(State(state): State<AppState>) -> Response {
    match state.board.latest() {
        Some(snapshot) => axum::Json(snapshot).into_response(),
        None => not_ready(),
    }
}

async fn spot_handler(State(state): State<AppState>, Path(index): Path<usize>) -> Response {
    let Some(snapshot) = state.board.latest() else {
        return not_ready();
    };

    match snapshot.spots.get(index) {
        Some(spot) => axum::Json(*spot).into_response(),
        None => (StatusCode::NOT_FOUND, "spot not found").into_response(),
    }
}
