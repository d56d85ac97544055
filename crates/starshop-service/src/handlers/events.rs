//! Front-end event handlers.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use starshop_core::{Event, Outgoing};

use crate::auth::ServiceAuth;
use crate::error::ApiError;
use crate::state::AppState;

/// Messages for the front end to render.
#[derive(Debug, Serialize)]
pub struct MessagesResponse {
    /// Replies and queued notifications, in delivery order.
    pub messages: Vec<Outgoing>,
}

/// Handle one user or admin action.
///
/// The response carries the direct replies followed by every notification
/// queued since the last call.
pub async fn post_event(
    State(state): State<Arc<AppState>>,
    auth: ServiceAuth,
    Json(event): Json<Event>,
) -> Result<Json<MessagesResponse>, ApiError> {
    tracing::debug!(
        user_id = %event.user_id,
        service = %auth.service_name,
        "Received event"
    );

    let mut messages = state.dispatcher.handle(&event).await;
    messages.extend(state.outbox.drain());

    Ok(Json(MessagesResponse { messages }))
}

/// Take queued notifications.
pub async fn poll_outbox(
    State(state): State<Arc<AppState>>,
    _auth: ServiceAuth,
) -> Result<Json<MessagesResponse>, ApiError> {
    Ok(Json(MessagesResponse {
        messages: state.outbox.drain(),
    }))
}
