use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{DefaultBodyLimit, Path, State, rejection::BytesRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::Mutex;

use crate::error::GraphError;
use crate::graph::{Graph, Link, Node, NodeId};
use crate::ops::NewLink;
use crate::store::GraphStore;

/// Whole-graph saves from the editor routinely exceed axum's 2 MB default.
pub const MAX_BODY_BYTES: usize = 64 * 1024 * 1024;

type Body = Result<Bytes, BytesRejection>;

#[derive(Clone)]
pub struct AppState {
    store: Arc<Mutex<GraphStore>>,
}

impl AppState {
    pub fn new(store: GraphStore) -> Self {
        AppState {
            store: Arc::new(Mutex::new(store)),
        }
    }
}

#[derive(Debug)]
pub enum ApiError {
    Graph(GraphError),
    UnknownNode(String),
    Body(BytesRejection),
    Task(tokio::task::JoinError),
}

impl From<GraphError> for ApiError {
    fn from(value: GraphError) -> Self {
        ApiError::Graph(value)
    }
}

#[derive(Serialize)]
struct ErrorBody {
    status: &'static str,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Graph(error) => {
                let status = match &error {
                    GraphError::NotFound(_) => StatusCode::NOT_FOUND,
                    GraphError::InvalidArgument(_)
                    | GraphError::Conflict { .. }
                    | GraphError::MalformedDocument(_) => StatusCode::BAD_REQUEST,
                    GraphError::Persistence { .. } => StatusCode::INTERNAL_SERVER_ERROR,
                };
                match &error {
                    GraphError::NotFound(node_id) => {
                        tracing::warn!(node_id, "graph api request failed: node not found")
                    }
                    GraphError::Conflict {
                        source_id,
                        target_id,
                    } => tracing::warn!(
                        source_id,
                        target_id,
                        "graph api request failed: link already exists"
                    ),
                    error => tracing::warn!(%error, "graph api request failed"),
                }
                (status, error.to_string())
            }
            ApiError::UnknownNode(raw) => {
                tracing::warn!(id = %raw, "graph api request failed: not a node id");
                (StatusCode::NOT_FOUND, "Node not found".to_string())
            }
            ApiError::Body(rejection) => {
                tracing::warn!(error = %rejection.body_text(), "graph api request body rejected");
                (rejection.status(), rejection.body_text())
            }
            ApiError::Task(error) => {
                tracing::error!(%error, "graph store task failed");
                (StatusCode::INTERNAL_SERVER_ERROR, error.to_string())
            }
        };

        (
            status,
            Json(ErrorBody {
                status: "error",
                message,
            }),
        )
            .into_response()
    }
}

#[derive(Serialize)]
struct Ack {
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<&'static str>,
}

impl Ack {
    fn success(message: &'static str) -> Self {
        Ack {
            status: "success",
            message: Some(message),
        }
    }

    fn bare() -> Self {
        Ack {
            status: "success",
            message: None,
        }
    }
}

#[derive(Serialize)]
struct NodeResponse {
    status: &'static str,
    node: Node,
}

#[derive(Serialize)]
struct LinkResponse {
    status: &'static str,
    link: Link,
}

#[derive(Serialize)]
struct ValidateResponse {
    status: &'static str,
    message: &'static str,
    data: Graph,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/graph", get(get_graph).post(save_graph))
        .route(
            "/api/node/{id}",
            get(get_node).put(update_node).delete(delete_node),
        )
        .route("/api/link", post(create_link))
        .route("/api/reset", post(reset_graph))
        .route("/api/validate", post(validate_graph))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(state)
}

async fn get_graph(State(state): State<AppState>) -> Result<Json<Graph>, ApiError> {
    let graph = run_store(state.store.clone(), |store| Ok(store.graph().clone())).await?;
    Ok(Json(graph))
}

async fn save_graph(State(state): State<AppState>, body: Body) -> Result<Json<Ack>, ApiError> {
    let document = parse_body(&body_bytes(body)?)?;
    run_store(state.store.clone(), move |store| {
        store.replace_graph(document);
        Ok(())
    })
    .await?;
    Ok(Json(Ack::success("Graph saved")))
}

async fn get_node(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Node>, ApiError> {
    let id = parse_node_id(&id)?;
    let node = run_store(state.store.clone(), move |store| store.get_node(id)).await?;
    Ok(Json(node))
}

async fn update_node(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Body,
) -> Result<Json<NodeResponse>, ApiError> {
    let id = parse_node_id(&id)?;
    let patch = parse_body(&body_bytes(body)?)?;
    let node = run_store(state.store.clone(), move |store| store.update_node(id, patch)).await?;
    Ok(Json(NodeResponse {
        status: "success",
        node,
    }))
}

async fn delete_node(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Ack>, ApiError> {
    // Non-integer ids cannot exist, so deleting one is the same no-op.
    if let Ok(id) = id.parse::<NodeId>() {
        run_store(state.store.clone(), move |store| Ok(store.delete_node(id))).await?;
    }
    Ok(Json(Ack::bare()))
}

async fn create_link(
    State(state): State<AppState>,
    body: Body,
) -> Result<Json<LinkResponse>, ApiError> {
    let request = NewLink::from_value(parse_body(&body_bytes(body)?)?)?;
    let link = run_store(state.store.clone(), move |store| store.create_link(request)).await?;
    Ok(Json(LinkResponse {
        status: "success",
        link,
    }))
}

async fn reset_graph(State(state): State<AppState>) -> Result<Json<Ack>, ApiError> {
    run_store(state.store.clone(), |store| {
        store.reset();
        Ok(())
    })
    .await?;
    Ok(Json(Ack::success("Graph reset")))
}

async fn validate_graph(
    State(state): State<AppState>,
    body: Body,
) -> Result<Json<ValidateResponse>, ApiError> {
    let body = body_bytes(body)?;
    let document = if body.iter().all(u8::is_ascii_whitespace) {
        None
    } else {
        Some(parse_body(&body)?)
    };
    let (data, _) = run_store(state.store.clone(), move |store| Ok(store.validate(document))).await?;
    Ok(Json(ValidateResponse {
        status: "success",
        message: "Graph validated and normalized",
        data,
    }))
}

fn body_bytes(body: Body) -> Result<Bytes, ApiError> {
    body.map_err(ApiError::Body)
}

fn parse_body(body: &Bytes) -> Result<Value, GraphError> {
    Ok(serde_json::from_slice(body)?)
}

fn parse_node_id(raw: &str) -> Result<NodeId, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::UnknownNode(raw.to_string()))
}

/// Runs `operation` against the store on the blocking pool.
///
/// The store lock is held for the whole operation, so mutations and their
/// file writes are serialised.
async fn run_store<T, F>(store: Arc<Mutex<GraphStore>>, operation: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&mut GraphStore) -> Result<T, GraphError> + Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        let mut store = store.blocking_lock();
        operation(&mut store)
    })
    .await
    .map_err(ApiError::Task)?
    .map_err(ApiError::from)
}
