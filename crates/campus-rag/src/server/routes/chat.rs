//! Chat endpoint

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use crate::router::ChatError;
use crate::server::state::AppState;
use crate::session::SessionStore;
use crate::types::ChatRequest;

/// POST /chat/generate - answer one chat turn
pub async fn generate(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Response {
    let mut request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            tracing::warn!("Rejected chat request: {}", rejection.body_text());
            return ChatError::MalformedRequest {
                session_id: SessionStore::resolve_id(None),
                message: rejection.body_text(),
            }
            .into_response();
        }
    };

    let session_id = SessionStore::resolve_id(request.session_id.as_deref());
    request.session_id = Some(session_id.clone());

    tracing::info!(
        "Chat turn for session {} (use_knowledge: {})",
        session_id,
        request.use_knowledge
    );

    let router = state.router();
    match tokio::spawn(async move { router.handle(request).await }).await {
        Ok(Ok(response)) => Json(response).into_response(),
        Ok(Err(e)) => e.into_response(),
        Err(e) => ChatError::Internal {
            session_id,
            message: e.to_string(),
        }
        .into_response(),
    }
}

impl IntoResponse for ChatError {
    fn into_response(self) -> Response {
        if let ChatError::Internal { session_id, message } = &self {
            tracing::error!("Internal failure for session {}: {}", session_id, message);
        }

        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self.body())).into_response()
    }
}
