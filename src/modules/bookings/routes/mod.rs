//! HTTP handlers for `/api/bookings`.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use devevent_http::error::AppError;
use serde_json::{json, Value};

use super::{models::BookingInput, recorder::BookingRecorder};
use crate::error::CoreError;

pub fn router(recorder: BookingRecorder) -> Router {
    Router::new()
        .route("/", post(create_booking))
        .with_state(recorder)
}

async fn create_booking(
    State(recorder): State<BookingRecorder>,
    body: Result<Json<BookingInput>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let Json(input) = body.map_err(|e| AppError::bad_request(e.body_text()))?;

    let email = input.email.unwrap_or_default();
    let event_id = input
        .event_id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| CoreError::validation("eventId", "required"))?;

    let booking = recorder.create_booking(&event_id, &email).await?;
    Ok((StatusCode::CREATED, Json(json!({ "booking": booking }))))
}
