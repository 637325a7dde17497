pub mod models;
pub mod repository;
pub mod routes;

use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;
use devevent_authz::SessionStore;
use devevent_db::Database;
use devevent_kernel::{settings::ListingSettings, InitCtx, Migration, Module};

pub use models::{Event, EventInput, EventPage, ListOrder, Mode};
pub use repository::EventRepository;

/// Schema the events table relies on
pub fn migrations() -> Vec<Migration> {
    vec![Migration {
        id: "001_slug_unique",
        up: "DEFINE TABLE IF NOT EXISTS events SCHEMALESS;\
             DEFINE INDEX IF NOT EXISTS events_slug_unique ON TABLE events FIELDS slug UNIQUE;",
    }]
}

/// Public event listing, management by slug and similarity lookup
pub struct EventsModule {
    state: routes::EventsState,
}

impl EventsModule {
    pub fn new(db: &Database, sessions: Arc<SessionStore>, listing: ListingSettings) -> Self {
        Self {
            state: routes::EventsState {
                repository: EventRepository::new(db),
                sessions,
                listing,
            },
        }
    }
}

#[async_trait]
impl Module for EventsModule {
    fn name(&self) -> &'static str {
        "events"
    }

    async fn init(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(
            module = self.name(),
            default_limit = ctx.settings.listing.default_limit,
            max_limit = ctx.settings.listing.max_limit,
            "events module initialized"
        );
        Ok(())
    }

    fn routes(&self) -> Router {
        routes::router(self.state.clone())
    }

    fn openapi(&self) -> Option<serde_json::Value> {
        let error = serde_json::json!({
            "description": "Error",
            "content": {
                "application/json": {
                    "schema": { "$ref": "#/components/schemas/ErrorResponse" }
                }
            }
        });
        let page_params = serde_json::json!([
            { "name": "page", "in": "query", "schema": { "type": "integer", "minimum": 1 } },
            { "name": "limit", "in": "query", "schema": { "type": "integer", "minimum": 1 } }
        ]);
        let slug_param = serde_json::json!([
            { "name": "slug", "in": "path", "required": true, "schema": { "type": "string" } }
        ]);

        Some(serde_json::json!({
            "paths": {
                "/": {
                    "get": {
                        "summary": "List upcoming events",
                        "tags": ["Events"],
                        "parameters": page_params,
                        "responses": {
                            "200": {
                                "description": "One page of events",
                                "content": {
                                    "application/json": {
                                        "schema": { "$ref": "#/components/schemas/EventPage" }
                                    }
                                }
                            },
                            "400": error
                        }
                    },
                    "post": {
                        "summary": "Create an event",
                        "tags": ["Events"],
                        "requestBody": {
                            "required": true,
                            "content": {
                                "application/json": {
                                    "schema": { "$ref": "#/components/schemas/EventInput" }
                                }
                            }
                        },
                        "responses": {
                            "201": { "description": "Event created" },
                            "400": error,
                            "401": error,
                            "409": error
                        }
                    }
                },
                "/{slug}": {
                    "get": {
                        "summary": "Fetch an event by slug",
                        "tags": ["Events"],
                        "parameters": slug_param,
                        "responses": {
                            "200": { "description": "The event" },
                            "404": error
                        }
                    },
                    "put": {
                        "summary": "Update an event; absent fields are kept",
                        "tags": ["Events"],
                        "parameters": slug_param,
                        "requestBody": {
                            "required": true,
                            "content": {
                                "application/json": {
                                    "schema": { "$ref": "#/components/schemas/EventInput" }
                                }
                            }
                        },
                        "responses": {
                            "200": { "description": "Event updated" },
                            "400": error,
                            "401": error,
                            "404": error,
                            "409": error
                        }
                    },
                    "delete": {
                        "summary": "Delete an event",
                        "tags": ["Events"],
                        "parameters": slug_param,
                        "responses": {
                            "200": { "description": "Number of deleted events (0 or 1)" },
                            "401": error
                        }
                    }
                },
                "/{slug}/similar": {
                    "get": {
                        "summary": "Events sharing a tag with this one",
                        "tags": ["Events"],
                        "parameters": slug_param,
                        "responses": {
                            "200": {
                                "description": "Similar events",
                                "content": {
                                    "application/json": {
                                        "schema": {
                                            "type": "array",
                                            "items": { "$ref": "#/components/schemas/Event" }
                                        }
                                    }
                                }
                            }
                        }
                    }
                }
            },
            "components": {
                "schemas": {
                    "Event": {
                        "type": "object",
                        "properties": {
                            "id": { "type": "string" },
                            "title": { "type": "string" },
                            "slug": { "type": "string" },
                            "description": { "type": "string" },
                            "overview": { "type": "string" },
                            "image": { "type": "string" },
                            "venue": { "type": "string" },
                            "location": { "type": "string" },
                            "date": { "type": "string", "format": "date" },
                            "time": { "type": "string", "pattern": "^\\d{2}:\\d{2}$" },
                            "mode": { "type": "string", "enum": ["online", "offline", "hybrid"] },
                            "audience": { "type": "string" },
                            "agenda": { "type": "array", "items": { "type": "string" } },
                            "organizer": { "type": "string" },
                            "tags": { "type": "array", "items": { "type": "string" } },
                            "createdAt": { "type": "string", "format": "date-time" },
                            "updatedAt": { "type": "string", "format": "date-time" }
                        }
                    },
                    "EventInput": {
                        "type": "object",
                        "description": "All fields are required on create and optional on update",
                        "properties": {
                            "title": { "type": "string" },
                            "description": { "type": "string" },
                            "overview": { "type": "string" },
                            "image": { "type": "string" },
                            "venue": { "type": "string" },
                            "location": { "type": "string" },
                            "date": { "type": "string" },
                            "time": { "type": "string" },
                            "mode": { "type": "string" },
                            "audience": { "type": "string" },
                            "agenda": { "type": "array", "items": { "type": "string" } },
                            "organizer": { "type": "string" },
                            "tags": { "type": "array", "items": { "type": "string" } }
                        }
                    },
                    "EventPage": {
                        "type": "object",
                        "properties": {
                            "events": {
                                "type": "array",
                                "items": { "$ref": "#/components/schemas/Event" }
                            },
                            "total": { "type": "integer" },
                            "currentPage": { "type": "integer" },
                            "totalPages": { "type": "integer" }
                        },
                        "required": ["events", "total", "currentPage", "totalPages"]
                    }
                }
            }
        }))
    }

    fn migrations(&self) -> Vec<Migration> {
        migrations()
    }

    async fn start(&self, _ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "events module started");
        Ok(())
    }

    async fn stop(&self) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "events module stopped");
        Ok(())
    }
}

/// Create the events module over an open store handle
pub fn create_module(
    db: &Database,
    sessions: Arc<SessionStore>,
    listing: ListingSettings,
) -> Arc<dyn Module> {
    Arc::new(EventsModule::new(db, sessions, listing))
}
