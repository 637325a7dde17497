pub mod models;
pub mod recorder;
pub mod routes;

use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;
use devevent_db::Database;
use devevent_kernel::{InitCtx, Migration, Module};

pub use models::{Booking, BookingInput};
pub use recorder::BookingRecorder;

/// Visitor bookings for published events
pub struct BookingsModule {
    recorder: BookingRecorder,
}

impl BookingsModule {
    pub fn new(db: &Database) -> Self {
        Self {
            recorder: BookingRecorder::new(db),
        }
    }
}

#[async_trait]
impl Module for BookingsModule {
    fn name(&self) -> &'static str {
        "bookings"
    }

    async fn init(&self, _ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "bookings module initialized");
        Ok(())
    }

    fn routes(&self) -> Router {
        routes::router(self.recorder.clone())
    }

    fn migrations(&self) -> Vec<Migration> {
        vec![Migration {
            id: "001_event_index",
            up: "DEFINE TABLE IF NOT EXISTS bookings SCHEMALESS;\
                 DEFINE INDEX IF NOT EXISTS bookings_event_id ON TABLE bookings FIELDS eventId;",
        }]
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

        Some(serde_json::json!({
            "paths": {
                "/": {
                    "post": {
                        "summary": "Book a spot at an event",
                        "tags": ["Bookings"],
                        "requestBody": {
                            "required": true,
                            "content": {
                                "application/json": {
                                    "schema": { "$ref": "#/components/schemas/BookingInput" }
                                }
                            }
                        },
                        "responses": {
                            "201": {
                                "description": "Booking recorded",
                                "content": {
                                    "application/json": {
                                        "schema": {
                                            "type": "object",
                                            "properties": {
                                                "booking": { "$ref": "#/components/schemas/Booking" }
                                            }
                                        }
                                    }
                                }
                            },
                            "400": error,
                            "404": error
                        }
                    }
                }
            },
            "components": {
                "schemas": {
                    "Booking": {
                        "type": "object",
                        "properties": {
                            "id": { "type": "string" },
                            "eventId": { "type": "string" },
                            "email": { "type": "string", "format": "email" },
                            "createdAt": { "type": "string", "format": "date-time" },
                            "updatedAt": { "type": "string", "format": "date-time" }
                        },
                        "required": ["id", "eventId", "email", "createdAt", "updatedAt"]
                    },
                    "BookingInput": {
                        "type": "object",
                        "properties": {
                            "eventId": { "type": "string" },
                            "email": { "type": "string" }
                        },
                        "required": ["eventId", "email"]
                    }
                }
            }
        }))
    }

    async fn start(&self, _ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "bookings module started");
        Ok(())
    }

    async fn stop(&self) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "bookings module stopped");
        Ok(())
    }
}

/// Create the bookings module over an open store handle
pub fn create_module(db: &Database) -> Arc<dyn Module> {
    Arc::new(BookingsModule::new(db))
}
