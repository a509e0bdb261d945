//! Administrative endpoint: account creation passthrough
//!
//! `POST /users` with `{email, password, displayName}`. All three fields are
//! checked before the identity provider is contacted. Provider failures are
//! reduced to a message string.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use clickrank_core::{ClickrankError, NewUserRequest};
use clickrank_identity::IdentityVerifier;
use clickrank_store::ScoreStore;

use crate::AppState;

/// Successful creation
#[derive(Debug, Serialize)]
pub struct CreatedUser {
    pub uid: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credential: Option<String>,
}

/// Error body
#[derive(Debug, Serialize)]
pub struct ErrorMessage {
    pub message: String,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorMessage {
            message: message.into(),
        }),
    )
        .into_response()
}

fn status_for(error: &ClickrankError) -> StatusCode {
    match error {
        ClickrankError::MissingField(_) | ClickrankError::InvalidMessage(_) => StatusCode::BAD_REQUEST,
        ClickrankError::AccountExists(_) => StatusCode::CONFLICT,
        _ => StatusCode::BAD_GATEWAY,
    }
}

/// POST /users
pub async fn create_user<V: IdentityVerifier, S: ScoreStore>(
    State(state): State<AppState<V, S>>,
    payload: Result<Json<NewUserRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(request) => request,
        Err(rejection) => return error_response(StatusCode::BAD_REQUEST, rejection.body_text()),
    };

    match state.runtime.create_user(request).await {
        Ok(uid) => {
            let credential = state.runtime.sessions().verifier().credential_for(&uid);
            tracing::info!(user = %uid, "user created via admin endpoint");
            (
                StatusCode::CREATED,
                Json(CreatedUser {
                    uid: uid.to_string(),
                    credential,
                }),
            )
                .into_response()
        }
        Err(e) => {
            let status = status_for(&e);
            if e.is_client_error() {
                tracing::debug!(error = %e, "user creation rejected");
            } else {
                tracing::warn!(error = %e, "identity provider failed to create user");
            }
            error_response(status, e.to_string())
        }
    }
}
