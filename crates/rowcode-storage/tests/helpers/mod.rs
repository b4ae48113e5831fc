use axum::extract::{Multipart, Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{post, put};
use axum::{Form, Json, Router};
use parking_lot::Mutex;
use serde_json::json;
use std::collections::HashMap;
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::Arc;

/// One attachment request as seen by the fake record API.
#[derive(Debug, Clone)]
pub struct ReceivedUpload {
    pub table_id: String,
    pub record_id: String,
    pub field_id: String,
    pub authorization: Option<String>,
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub size_bytes: usize,
}

#[derive(Default)]
pub struct ServerState {
    /// Statuses returned (in order) before the server starts answering 200.
    pub scripted: Mutex<VecDeque<u16>>,
    pub uploads: Mutex<Vec<ReceivedUpload>>,
    pub token_requests: Mutex<Vec<HashMap<String, String>>>,
    /// Lifetime handed out by the token endpoint.
    pub token_ttl_secs: Mutex<Option<u64>>,
}

/// Fake record API bound to an ephemeral local port.
pub struct TestServer {
    pub addr: SocketAddr,
    pub state: Arc<ServerState>,
}

impl TestServer {
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn token_url(&self) -> String {
        format!("http://{}/oauth/token", self.addr)
    }

    /// Answer the next requests with these statuses, then 200.
    pub fn script(&self, statuses: &[u16]) {
        self.state.scripted.lock().extend(statuses.iter().copied());
    }

    pub fn uploads(&self) -> Vec<ReceivedUpload> {
        self.state.uploads.lock().clone()
    }

    pub fn token_requests(&self) -> usize {
        self.state.token_requests.lock().len()
    }
}

/// Start the fake API in the background.
pub async fn spawn_test_server() -> TestServer {
    let state = Arc::new(ServerState::default());

    let app = Router::new()
        .route(
            "/tables/{table_id}/records/{record_id}/attachments/{field_id}",
            put(attach),
        )
        .route("/oauth/token", post(issue_token))
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test listener");
    let addr = listener.local_addr().expect("Failed to read local address");

    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("Test server failed");
    });

    TestServer { addr, state }
}

async fn attach(
    State(state): State<Arc<ServerState>>,
    Path((table_id, record_id, field_id)): Path<(String, String, String)>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Response {
    let mut upload = ReceivedUpload {
        table_id,
        record_id,
        field_id,
        authorization: headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        file_name: None,
        content_type: None,
        size_bytes: 0,
    };

    while let Ok(Some(field)) = multipart.next_field().await {
        if field.name() != Some("file") {
            continue;
        }
        upload.file_name = field.file_name().map(str::to_string);
        upload.content_type = field.content_type().map(str::to_string);
        upload.size_bytes = field.bytes().await.map(|b| b.len()).unwrap_or(0);
    }

    let record_id = upload.record_id.clone();
    state.uploads.lock().push(upload);

    let scripted = state.scripted.lock().pop_front();
    match scripted {
        Some(status) if status != 200 => (
            StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            format!("scripted failure {}", status),
        )
            .into_response(),
        _ => Json(json!({
            "token": format!("att-{}", record_id),
            "url": format!("https://files.example.com/{}", record_id),
        }))
        .into_response(),
    }
}

async fn issue_token(
    State(state): State<Arc<ServerState>>,
    Form(params): Form<HashMap<String, String>>,
) -> Response {
    if params.get("client_secret").map(String::as_str) != Some("shh") {
        return (StatusCode::UNAUTHORIZED, "invalid_client").into_response();
    }

    let issued = {
        let mut requests = state.token_requests.lock();
        requests.push(params);
        requests.len()
    };
    let ttl = *state.token_ttl_secs.lock();

    Json(json!({
        "access_token": format!("minted-{}", issued),
        "token_type": "Bearer",
        "expires_in": ttl.unwrap_or(3600),
    }))
    .into_response()
}
