use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{FromRequest, Request, State};
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::{Form, Json};
use serde::{Deserialize, Serialize};

use crate::hub::BroadcastHub;
use crate::pipeline::{JobId, JobRequest};
use crate::server::AppState;

const INDEX_HTML: &str = include_str!("../../static/index.html");

#[derive(Debug, Default, Deserialize)]
pub struct TranslateBody {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default, alias = "target_language")]
    pub target_lang: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AcceptedResponse {
    pub loading: bool,
    pub job_id: JobId,
    pub video_id: String,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub loading: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub observers: usize,
    pub active_jobs: usize,
}

pub async fn index_handler() -> Html<&'static str> {
    Html(INDEX_HTML)
}

pub async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "healthy".to_string(),
            observers: state.hub.observer_count(),
            active_jobs: state.pipeline.active_jobs(),
        }),
    )
}

/// Start a job and answer immediately; results only travel over `/ws`
#[tracing::instrument(skip(state, request))]
pub async fn translate_handler(State(state): State<AppState>, request: Request) -> Response {
    let body = read_body(request).await.unwrap_or_default();
    let url = body.url.unwrap_or_default();

    match state.pipeline.start(JobRequest::new(url.trim(), body.target_lang)) {
        Ok(handle) => (
            StatusCode::OK,
            Json(AcceptedResponse {
                loading: true,
                job_id: handle.job_id,
                video_id: handle.video_id.to_string(),
            }),
        )
            .into_response(),
        Err(e) => {
            tracing::warn!(url = %url, error = %e, "Rejected translate request");
            (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse {
                    error: e.to_string(),
                    loading: false,
                }),
            )
                .into_response()
        }
    }
}

/// JSON or urlencoded form, picked by content type
async fn read_body(request: Request) -> Option<TranslateBody> {
    let is_form = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("application/x-www-form-urlencoded"));

    let parsed = if is_form {
        Form::<TranslateBody>::from_request(request, &()).await.map(|Form(body)| body).map_err(|e| e.body_text())
    } else {
        Json::<TranslateBody>::from_request(request, &()).await.map(|Json(body)| body).map_err(|e| e.body_text())
    };

    parsed
        .map_err(|e| tracing::debug!(error = %e, "Unreadable translate body"))
        .ok()
}

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| forward_events(socket, state.hub))
}

/// Push every broadcast to one socket until either side closes
async fn forward_events(mut socket: WebSocket, hub: Arc<BroadcastHub>) {
    let mut observer = hub.subscribe();
    let observer_id = observer.id();
    tracing::info!(observer_id, "Observer connected");

    loop {
        tokio::select! {
            event = observer.recv() => {
                let Some(event) = event else {
                    // Hub stopped
                    let _ = socket.send(Message::Close(None)).await;
                    break;
                };
                let text = match event.to_json() {
                    Ok(text) => text,
                    Err(e) => {
                        tracing::error!(error = %e, "Failed to serialize event");
                        continue;
                    }
                };
                if socket.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
            }
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            }
        }
    }

    hub.unsubscribe(observer_id);
    tracing::info!(observer_id, "Observer disconnected");
}
