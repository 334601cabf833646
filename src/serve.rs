use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use axum::extract::{Path as AxumPath, State};
use axum::http::StatusCode;
use axum::http::{HeaderValue, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use clap::Parser;
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tower_http::cors::CorsLayer;
use tracing::{debug, info};

use crate::config::EditorConfig;
use crate::editor::{Action, Editor, EditorStatus, Notice, Tool};
use crate::export::ExportFormat;
use crate::layout::Point;
use crate::mindmap::{MindMap, NodeEdit, NodeId};
use crate::persistence::FileStorage;
use crate::render::{RenderFrame, render_svg};
use crate::settings::Settings;
use crate::study::{Flashcard, Summary};
use crate::viewport::WheelInput;

/// Arguments for running the mindflow HTTP API
#[derive(Debug, Clone, Parser)]
#[command(name = "mindflow serve", about = "Serve the current mind map over an HTTP API.")]
pub struct ServeArgs {
    /// Address to bind the HTTP server to.
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    /// Port to listen on.
    #[arg(long, default_value_t = 5150)]
    pub port: u16,

    /// Directory holding the saved map and settings (overrides MINDFLOW_DATA_DIR).
    #[arg(long = "data-dir")]
    pub data_dir: Option<PathBuf>,
}

/// One editor behind one lock. Every request and the autosave timer take
/// the same lock, so inputs run one at a time in arrival order.
pub struct ServeState {
    editor: Mutex<Editor>,
}

impl ServeState {
    pub fn new(editor: Editor) -> Arc<Self> {
        Arc::new(Self {
            editor: Mutex::new(editor),
        })
    }

    pub async fn autosave(&self) -> bool {
        self.editor.lock().await.tick_autosave()
    }
}

#[derive(Debug, Clone, Deserialize)]
struct ActionRequest {
    action: Action,
}

#[derive(Debug, Clone, Deserialize)]
struct ToolRequest {
    tool: Tool,
}

#[derive(Debug, Clone, Deserialize)]
struct TitleRequest {
    title: String,
}

#[derive(Debug, Clone, Deserialize)]
struct ConnectionRequest {
    source: NodeId,
    target: NodeId,
}

/// Pointer input in screen coordinates.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
enum PointerEvent {
    Click {
        #[serde(default)]
        target: Option<NodeId>,
        x: f64,
        y: f64,
    },
    DoubleClick {
        #[serde(default)]
        target: Option<NodeId>,
        x: f64,
        y: f64,
    },
    Down {
        #[serde(default)]
        target: Option<NodeId>,
        x: f64,
        y: f64,
    },
    Move {
        x: f64,
        y: f64,
    },
    Up,
    Pan {
        dx: f64,
        dy: f64,
    },
    Wheel(WheelInput),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct PointerResponse {
    status: EditorStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    edit_node: Option<NodeId>,
}

pub fn router(state: Arc<ServeState>) -> Router {
    Router::new()
        .route("/api/map", get(get_map))
        .route("/api/status", get(get_status))
        .route("/api/frame", get(get_frame))
        .route("/api/frame/svg", get(get_frame_svg))
        .route("/api/actions", post(post_action))
        .route("/api/pointer", post(post_pointer))
        .route("/api/tool", put(put_tool))
        .route("/api/title", put(put_title))
        .route("/api/settings", get(get_settings).put(put_settings))
        .route("/api/nodes/:id", put(put_node))
        .route("/api/connections", post(post_connection))
        .route("/api/summary", get(get_summary))
        .route("/api/flashcards", get(get_flashcards))
        .route("/api/export/:format", get(get_export))
        .route("/api/notices", get(get_notices))
        .with_state(state)
        .layer(CorsLayer::permissive())
}

pub async fn run_serve(args: ServeArgs, mut config: EditorConfig) -> Result<()> {
    if let Some(dir) = args.data_dir.clone() {
        config.data_dir = dir;
    }

    let storage = FileStorage::new(config.data_dir.clone());
    let state = ServeState::new(Editor::open(Box::new(storage), &config));
    let app = router(state.clone());

    let autosave = tokio::spawn(autosave_loop(state.clone(), config.autosave_interval));

    let addr = format!("{}:{}", args.host, args.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind HTTP server to {addr}"))?;

    println!("mindflow server listening on http://{addr}");
    println!("Data directory: {}", config.data_dir.display());
    println!("Press Ctrl+C to stop.");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .context("HTTP server error")?;

    autosave.abort();
    let mut editor = state.editor.lock().await;
    if editor.is_dirty() && !editor.save() {
        return Err(anyhow!(
            "failed to save the mind map on shutdown; unsaved changes were lost"
        ));
    }
    info!("server stopped");
    Ok(())
}

async fn autosave_loop(state: Arc<ServeState>, period: Duration) {
    let mut ticker = tokio::time::interval(period);
    // The first tick completes immediately.
    ticker.tick().await;
    loop {
        ticker.tick().await;
        if state.autosave().await {
            debug!("autosave tick saved the map");
        }
    }
}

fn bad_request(message: impl Into<String>) -> (StatusCode, String) {
    (StatusCode::BAD_REQUEST, message.into())
}

fn internal_error(err: anyhow::Error) -> (StatusCode, String) {
    (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
}

async fn get_map(State(state): State<Arc<ServeState>>) -> Json<MindMap> {
    Json(state.editor.lock().await.map().clone())
}

async fn get_status(State(state): State<Arc<ServeState>>) -> Json<EditorStatus> {
    Json(state.editor.lock().await.status())
}

async fn get_frame(State(state): State<Arc<ServeState>>) -> Json<RenderFrame> {
    Json(state.editor.lock().await.frame())
}

async fn get_frame_svg(
    State(state): State<Arc<ServeState>>,
) -> Result<Response, (StatusCode, String)> {
    let (frame, background) = {
        let editor = state.editor.lock().await;
        (editor.frame(), editor.settings().theme.background())
    };
    let svg = render_svg(&frame, background).map_err(internal_error)?;

    let mut response = Response::new(svg.into());
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("image/svg+xml"),
    );
    Ok(response)
}

async fn post_action(
    State(state): State<Arc<ServeState>>,
    Json(request): Json<ActionRequest>,
) -> Json<EditorStatus> {
    let mut editor = state.editor.lock().await;
    editor.apply(request.action);
    Json(editor.status())
}

async fn post_pointer(
    State(state): State<Arc<ServeState>>,
    Json(event): Json<PointerEvent>,
) -> Json<PointerResponse> {
    let mut editor = state.editor.lock().await;
    let mut edit_node = None;
    match event {
        PointerEvent::Click { target, x, y } => editor.click(target, Point::new(x, y)),
        PointerEvent::DoubleClick { target, x, y } => {
            edit_node = editor.double_click(target, Point::new(x, y));
        }
        PointerEvent::Down { target, x, y } => editor.pointer_down(target, Point::new(x, y)),
        PointerEvent::Move { x, y } => editor.pointer_move(Point::new(x, y)),
        PointerEvent::Up => editor.pointer_up(),
        PointerEvent::Pan { dx, dy } => editor.pan_by(Point::new(dx, dy)),
        PointerEvent::Wheel(input) => editor.wheel(input),
    }
    Json(PointerResponse {
        status: editor.status(),
        edit_node,
    })
}

async fn put_tool(
    State(state): State<Arc<ServeState>>,
    Json(request): Json<ToolRequest>,
) -> Json<EditorStatus> {
    let mut editor = state.editor.lock().await;
    editor.set_tool(request.tool);
    Json(editor.status())
}

async fn put_title(
    State(state): State<Arc<ServeState>>,
    Json(request): Json<TitleRequest>,
) -> Json<EditorStatus> {
    let mut editor = state.editor.lock().await;
    editor.set_title(&request.title);
    Json(editor.status())
}

async fn get_settings(State(state): State<Arc<ServeState>>) -> Json<Settings> {
    Json(state.editor.lock().await.settings().clone())
}

async fn put_settings(
    State(state): State<Arc<ServeState>>,
    Json(settings): Json<Settings>,
) -> Json<Settings> {
    let mut editor = state.editor.lock().await;
    editor.update_settings(settings);
    Json(editor.settings().clone())
}

async fn put_node(
    State(state): State<Arc<ServeState>>,
    AxumPath(id): AxumPath<NodeId>,
    Json(edit): Json<NodeEdit>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let mut editor = state.editor.lock().await;
    if !editor.map().contains(id) {
        return Err((StatusCode::NOT_FOUND, format!("node {id} not found")));
    }
    editor.edit_node(id, edit);
    Ok(StatusCode::NO_CONTENT)
}

async fn post_connection(
    State(state): State<Arc<ServeState>>,
    Json(request): Json<ConnectionRequest>,
) -> Json<EditorStatus> {
    let mut editor = state.editor.lock().await;
    editor.connect(request.source, request.target);
    Json(editor.status())
}

async fn get_summary(State(state): State<Arc<ServeState>>) -> Json<Summary> {
    Json(state.editor.lock().await.summary())
}

async fn get_flashcards(State(state): State<Arc<ServeState>>) -> Json<Vec<Flashcard>> {
    Json(state.editor.lock().await.flashcards())
}

async fn get_export(
    State(state): State<Arc<ServeState>>,
    AxumPath(format): AxumPath<String>,
) -> Result<Response, (StatusCode, String)> {
    let format: ExportFormat = format.parse().map_err(bad_request)?;
    let mut editor = state.editor.lock().await;
    let Some((name, bytes)) = editor.export(format) else {
        return Err((
            StatusCode::NOT_IMPLEMENTED,
            format!("{format} export is not available yet"),
        ));
    };

    let disposition = HeaderValue::from_str(&format!("attachment; filename=\"{name}\""))
        .map_err(|err| internal_error(err.into()))?;
    let mut response = Response::new(bytes.into());
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(format.mime_type()),
    );
    headers.insert(header::CONTENT_DISPOSITION, disposition);
    Ok(response)
}

async fn get_notices(State(state): State<Arc<ServeState>>) -> Json<Vec<Notice>> {
    Json(state.editor.lock().await.drain_notices())
}
