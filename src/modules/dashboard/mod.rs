//! Signed-in event management listing, mounted at `/api/dashboard` so it
//! never competes with event slugs under `/api/events/{slug}`.

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    extract::{rejection::QueryRejection, Query, State},
    routing::get,
    Json, Router,
};
use devevent_authz::{Actor, SessionStore};
use devevent_db::Database;
use devevent_http::error::AppError;
use devevent_kernel::{settings::ListingSettings, InitCtx, Module};

use super::events::{
    routes::{EventsState, PageParams},
    EventPage, EventRepository, ListOrder,
};

pub struct DashboardModule {
    state: EventsState,
}

impl DashboardModule {
    pub fn new(db: &Database, sessions: Arc<SessionStore>, listing: ListingSettings) -> Self {
        Self {
            state: EventsState {
                repository: EventRepository::new(db),
                sessions,
                listing,
            },
        }
    }
}

async fn dashboard_events(
    actor: Actor,
    State(state): State<EventsState>,
    params: Result<Query<PageParams>, QueryRejection>,
) -> Result<Json<EventPage>, AppError> {
    let Query(params) = params.map_err(|e| AppError::bad_request(e.body_text()))?;
    let (page, limit) = params.resolve(&state.listing);

    tracing::debug!(username = %actor.username, page, limit, "dashboard listing");
    let page = state
        .repository
        .list_paginated(page, limit, ListOrder::Newest)
        .await?;
    Ok(Json(page))
}

#[async_trait]
impl Module for DashboardModule {
    fn name(&self) -> &'static str {
        "dashboard"
    }

    async fn init(&self, _ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "dashboard module initialized");
        Ok(())
    }

    fn routes(&self) -> Router {
        Router::new()
            .route("/events", get(dashboard_events))
            .with_state(self.state.clone())
    }

    fn openapi(&self) -> Option<serde_json::Value> {
        Some(serde_json::json!({
            "paths": {
                "/events": {
                    "get": {
                        "summary": "List events for the dashboard, newest first",
                        "tags": ["Dashboard"],
                        "parameters": [
                            { "name": "page", "in": "query", "schema": { "type": "integer", "minimum": 1 } },
                            { "name": "limit", "in": "query", "schema": { "type": "integer", "minimum": 1 } }
                        ],
                        "responses": {
                            "200": {
                                "description": "One page of events",
                                "content": {
                                    "application/json": {
                                        "schema": { "$ref": "#/components/schemas/EventPage" }
                                    }
                                }
                            },
                            "400": {
                                "description": "Invalid pagination",
                                "content": {
                                    "application/json": {
                                        "schema": { "$ref": "#/components/schemas/ErrorResponse" }
                                    }
                                }
                            },
                            "401": {
                                "description": "Missing or expired session",
                                "content": {
                                    "application/json": {
                                        "schema": { "$ref": "#/components/schemas/ErrorResponse" }
                                    }
                                }
                            }
                        }
                    }
                }
            }
        }))
    }
}

/// Create the dashboard module over an open store handle
pub fn create_module(
    db: &Database,
    sessions: Arc<SessionStore>,
    listing: ListingSettings,
) -> Arc<dyn Module> {
    Arc::new(DashboardModule::new(db, sessions, listing))
}
