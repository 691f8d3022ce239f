//! Triangular Peg Solitaire Web API
//!
//! Serves one game session to a presentation layer over REST. Best-move
//! advice is computed in the background after every board change and is
//! polled through `GET /best`.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::{Context, Result};
use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use clap::Parser;
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tracing::info;
use tracing_subscriber::EnvFilter;

use tripeg_core::{Board, EventSink, GameEvent, Hole, Jump, Vector};
use tripeg_solver::{book, AdviceSource, GameSession, OpeningBook};

// =============================================================================
// Configuration
// =============================================================================

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Config {
    /// Address to listen on
    #[arg(long, env = "TRIPEG_ADDR", default_value = "0.0.0.0:8000")]
    addr: SocketAddr,
    /// Opening book (.db for SQLite, otherwise binary)
    #[arg(long, env = "TRIPEG_BOOK")]
    book: Option<PathBuf>,
}

// =============================================================================
// Session State
// =============================================================================

/// Reports session events to the log.
struct LogSink;

impl EventSink for LogSink {
    fn emit(&self, event: GameEvent) {
        info!(?event, "game event");
    }
}

/// Shared application state
struct AppStateInner {
    session: Mutex<GameSession>,
}

type AppState = Arc<AppStateInner>;

impl AppStateInner {
    fn new(book: Option<Arc<dyn OpeningBook>>) -> Self {
        Self {
            session: Mutex::new(GameSession::new(Arc::new(LogSink), book)),
        }
    }

    fn session(&self) -> MutexGuard<'_, GameSession> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// =============================================================================
// JSON Models
// =============================================================================

#[derive(Serialize)]
struct HoleModel {
    position: Hole,
    occupied: bool,
}

#[derive(Serialize)]
struct GameStateModel {
    holes: Vec<HoleModel>,
    peg_count: u8,
    history: Vec<String>,
    can_undo: bool,
    terminal: bool,
}

#[derive(Serialize)]
struct LegalMoveModel {
    origin: Hole,
    vectors: Vec<Vector>,
}

#[derive(Deserialize)]
struct MoveRequest {
    origin: Hole,
    vector: Vector,
}

#[derive(Serialize)]
struct BestMoveModel {
    /// Next jump, null while pending or on a terminal board
    best: Option<Jump>,
    best_score: Option<u8>,
    source: Option<&'static str>,
    pending: bool,
}

#[derive(Serialize)]
struct HealthModel {
    status: String,
}

#[derive(Serialize)]
struct ErrorModel {
    detail: String,
}

type ApiError = (StatusCode, Json<ErrorModel>);

fn bad_request(detail: impl ToString) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorModel {
            detail: detail.to_string(),
        }),
    )
}

fn board_to_model(board: &Board) -> GameStateModel {
    GameStateModel {
        holes: board
            .holes()
            .map(|(position, occupied)| HoleModel { position, occupied })
            .collect(),
        peg_count: board.peg_count(),
        history: board.history().iter().map(Jump::to_string).collect(),
        can_undo: board.history_len() > 0,
        terminal: board.is_terminal(),
    }
}

// =============================================================================
// Handlers
// =============================================================================

async fn get_game(State(state): State<AppState>) -> Json<GameStateModel> {
    let session = state.session();
    Json(board_to_model(session.board()))
}

async fn get_moves(State(state): State<AppState>) -> Json<Vec<LegalMoveModel>> {
    let moves = state.session().legal_moves();
    Json(
        moves
            .iter()
            .map(|(origin, vectors)| LegalMoveModel {
                origin,
                vectors: vectors.to_vec(),
            })
            .collect(),
    )
}

async fn make_move(
    State(state): State<AppState>,
    Json(req): Json<MoveRequest>,
) -> Result<Json<GameStateModel>, ApiError> {
    let mut session = state.session();
    session.apply(req.origin, req.vector).map_err(bad_request)?;
    Ok(Json(board_to_model(session.board())))
}

async fn undo(State(state): State<AppState>) -> Result<Json<GameStateModel>, ApiError> {
    let mut session = state.session();
    session.undo().map_err(bad_request)?;
    Ok(Json(board_to_model(session.board())))
}

async fn restart(State(state): State<AppState>) -> Json<GameStateModel> {
    let mut session = state.session();
    session.restart();
    Json(board_to_model(session.board()))
}

async fn get_best(State(state): State<AppState>) -> Json<BestMoveModel> {
    let session = state.session();
    let advice = session.advice();
    Json(BestMoveModel {
        best: advice.as_ref().and_then(|a| a.best_move().ok()),
        best_score: advice.as_ref().map(|a| a.best_score),
        source: advice.as_ref().map(|a| match a.source {
            AdviceSource::Book => "book",
            AdviceSource::Search => "search",
        }),
        pending: session.is_pending(),
    })
}

async fn health() -> Json<HealthModel> {
    Json(HealthModel {
        status: "ok".to_string(),
    })
}

fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/game", get(get_game))
        .route("/moves", get(get_moves))
        .route("/move", post(make_move))
        .route("/undo", post(undo))
        .route("/restart", post(restart))
        .route("/best", get(get_best))
        .route("/health", get(health))
        .layer(cors)
        .with_state(state)
}

fn load_book(path: Option<&PathBuf>) -> Option<Arc<dyn OpeningBook>> {
    let path = path?;
    match book::open(path) {
        Ok(book) => {
            info!(path = %path.display(), "loaded opening book");
            Some(book)
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "failed to load opening book, using live search");
            None
        }
    }
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::parse();
    let book = load_book(config.book.as_ref());
    if book.is_none() {
        info!("no opening book - every suggestion uses live search");
    }

    let state: AppState = Arc::new(AppStateInner::new(book));

    let listener = tokio::net::TcpListener::bind(config.addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.addr))?;
    info!("Tripeg API running on http://{}", config.addr);
    axum::serve(listener, app(state)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    async fn send(state: &AppState, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => request
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => request.body(Body::empty()).unwrap(),
        };

        let response = app(state.clone()).oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn state() -> AppState {
        Arc::new(AppStateInner::new(None))
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = send(&state(), "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"status": "ok"}));
    }

    #[tokio::test]
    async fn test_initial_game() {
        let (status, body) = send(&state(), "GET", "/game", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["peg_count"], 14);
        assert_eq!(body["can_undo"], false);
        assert_eq!(body["terminal"], false);
        assert_eq!(body["holes"].as_array().unwrap().len(), 15);
        assert_eq!(body["holes"][14], json!({"position": [4, 8], "occupied": false}));
    }

    #[tokio::test]
    async fn test_moves() {
        let (_, body) = send(&state(), "GET", "/moves", None).await;
        assert_eq!(
            body,
            json!([
                {"origin": [2, 4], "vectors": [[2, 4]]},
                {"origin": [6, 4], "vectors": [[-2, 4]]},
            ])
        );
    }

    #[tokio::test]
    async fn test_move_then_undo() {
        let state = state();
        let (status, body) = send(
            &state,
            "POST",
            "/move",
            Some(json!({"origin": [2, 4], "vector": [2, 4]})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["peg_count"], 13);
        assert_eq!(body["history"], json!(["(2,4)+(2,4)"]));
        assert_eq!(body["can_undo"], true);

        let (status, body) = send(&state, "POST", "/undo", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["peg_count"], 14);
        assert_eq!(body["history"], json!([]));
    }

    #[tokio::test]
    async fn test_illegal_move() {
        let state = state();
        let (status, body) = send(
            &state,
            "POST",
            "/move",
            Some(json!({"origin": [0, 0], "vector": [4, 0]})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["detail"], "illegal move (4,0) from (0,0)");

        let (_, body) = send(&state, "GET", "/game", None).await;
        assert_eq!(body["peg_count"], 14);
    }

    #[tokio::test]
    async fn test_undo_empty() {
        let (status, body) = send(&state(), "POST", "/undo", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["detail"], "no move to undo");
    }

    #[tokio::test]
    async fn test_restart() {
        let state = state();
        send(&state, "POST", "/move", Some(json!({"origin": [6, 4], "vector": [-2, 4]}))).await;
        let (status, body) = send(&state, "POST", "/restart", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["peg_count"], 14);
        assert_eq!(body["history"], json!([]));
    }

    #[tokio::test]
    async fn test_best_move() {
        let state = state();
        state.session().wait();

        let (status, body) = send(&state, "GET", "/best", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["pending"], false);
        assert_eq!(body["best_score"], 1);
        assert_eq!(body["source"], "search");

        let best: Jump = serde_json::from_value(body["best"].clone()).unwrap();
        assert!(state.session().board().is_legal(best.origin, best.vector));
    }
}
