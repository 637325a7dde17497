//! HTTP handlers for `/api/events`.

use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        FromRef, Path, Query, State,
    },
    http::StatusCode,
    routing::get,
    Json, Router,
};
use devevent_authz::{Actor, SessionStore};
use devevent_http::error::AppError;
use devevent_kernel::settings::ListingSettings;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{
    models::{Event, EventInput, EventPage, ListOrder},
    repository::EventRepository,
};

#[derive(Clone)]
pub struct EventsState {
    pub repository: EventRepository,
    pub sessions: Arc<SessionStore>,
    pub listing: ListingSettings,
}

impl FromRef<EventsState> for Arc<SessionStore> {
    fn from_ref(state: &EventsState) -> Self {
        state.sessions.clone()
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct PageParams {
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

impl PageParams {
    /// Resolve defaults and clamp `limit` to the configured maximum.
    pub fn resolve(&self, listing: &ListingSettings) -> (u64, u64) {
        let page = self.page.unwrap_or(1);
        let limit = self
            .limit
            .unwrap_or(listing.default_limit)
            .min(listing.max_limit);
        (page, limit)
    }
}

pub fn router(state: EventsState) -> Router {
    Router::new()
        .route("/", get(list_events).post(create_event))
        .route(
            "/{slug}",
            get(get_event).put(update_event).delete(delete_event),
        )
        .route("/{slug}/similar", get(similar_events))
        .with_state(state)
}

async fn list_events(
    State(state): State<EventsState>,
    params: Result<Query<PageParams>, QueryRejection>,
) -> Result<Json<EventPage>, AppError> {
    let Query(params) = params.map_err(|e| AppError::bad_request(e.body_text()))?;
    let (page, limit) = params.resolve(&state.listing);

    let page = state
        .repository
        .list_paginated(page, limit, ListOrder::Upcoming)
        .await?;
    Ok(Json(page))
}

async fn create_event(
    actor: Actor,
    State(state): State<EventsState>,
    body: Result<Json<EventInput>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let Json(input) = body.map_err(|e| AppError::bad_request(e.body_text()))?;

    let event = state.repository.create(input).await?;
    tracing::info!(username = %actor.username, slug = %event.slug, "event published");

    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Event created successfully", "event": event })),
    ))
}

async fn get_event(
    State(state): State<EventsState>,
    Path(slug): Path<String>,
) -> Result<Json<Value>, AppError> {
    let event = state.repository.get_by_slug(&slug).await?;
    Ok(Json(json!({ "event": event })))
}

async fn update_event(
    actor: Actor,
    State(state): State<EventsState>,
    Path(slug): Path<String>,
    body: Result<Json<EventInput>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    let Json(patch) = body.map_err(|e| AppError::bad_request(e.body_text()))?;

    let event = state.repository.update_by_slug(&slug, patch).await?;
    tracing::info!(username = %actor.username, slug = %event.slug, "event edited");

    Ok(Json(
        json!({ "message": "Event updated successfully", "event": event }),
    ))
}

async fn delete_event(
    actor: Actor,
    State(state): State<EventsState>,
    Path(slug): Path<String>,
) -> Result<Json<Value>, AppError> {
    let deleted = state.repository.delete_by_slug(&slug).await?;
    tracing::info!(username = %actor.username, slug = %slug, deleted, "event delete");
    Ok(Json(json!({ "deleted": deleted })))
}

async fn similar_events(
    State(state): State<EventsState>,
    Path(slug): Path<String>,
) -> Json<Vec<Event>> {
    Json(state.repository.find_similar(&slug).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_params_apply_defaults_and_cap() {
        let listing = ListingSettings::default();

        assert_eq!(PageParams::default().resolve(&listing), (1, 5));

        let params = PageParams {
            page: Some(3),
            limit: Some(1000),
        };
        assert_eq!(params.resolve(&listing), (3, 100));

        // zero is passed through and rejected by the repository
        let params = PageParams {
            page: Some(0),
            limit: Some(0),
        };
        assert_eq!(params.resolve(&listing), (0, 0));
    }
}
