//! Router builder for the DevEvent HTTP server

use axum::{
    extract::Request,
    http::{HeaderValue, StatusCode},
    routing::get,
    Router,
};
use std::time::Duration;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use uuid::{Timestamp, Uuid};

use devevent_kernel::ModuleRegistry;

/// Request ID generator producing time-ordered UUIDs
#[derive(Clone, Default)]
pub struct MakeRequestUuidV7;

impl MakeRequestId for MakeRequestUuidV7 {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        let timestamp = Timestamp::now(uuid::NoContext);
        let request_id = Uuid::new_v7(timestamp)
            .to_string()
            .parse::<HeaderValue>()
            .ok()?;
        Some(RequestId::new(request_id))
    }
}

/// Builder for constructing the main HTTP router
pub struct RouterBuilder {
    router: Router,
}

impl RouterBuilder {
    /// Create a new router builder
    pub fn new() -> Self {
        Self {
            router: Router::new(),
        }
    }

    /// Add a route to the router
    pub fn route(mut self, path: &str, route: axum::routing::MethodRouter) -> Self {
        self.router = self.router.route(path, route);
        self
    }

    /// Mount a module's router under `/api/{module_name}`
    pub fn mount_module(mut self, module_name: &str, module_router: Router) -> Self {
        let api_path = format!("/api/{}", module_name);
        self.router = self.router.nest(&api_path, module_router);
        self
    }

    /// Add tracing middleware
    pub fn with_tracing(mut self) -> Self {
        self.router = self.router.layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().include_headers(false))
                .on_request(DefaultOnRequest::new().level(tracing::Level::INFO))
                .on_response(DefaultOnResponse::new().level(tracing::Level::INFO)),
        );
        self
    }

    /// Add CORS middleware
    pub fn with_cors(mut self) -> Self {
        self.router = self.router.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );
        self
    }

    /// Add request ID middleware, echoing the id back on the response
    pub fn with_request_id(mut self) -> Self {
        self.router = self
            .router
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuidV7));
        self
    }

    /// Add timeout middleware; slow requests get `408 Request Timeout`
    pub fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.router = self.router.layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_millis(timeout_ms),
        ));
        self
    }

    /// Add OpenAPI documentation by collecting specs from all modules
    pub fn with_openapi(mut self, registry: &ModuleRegistry) -> Self {
        // Start with base OpenAPI spec
        let mut openapi_spec = serde_json::json!({
            "openapi": "3.1.0",
            "info": {
                "title": "DevEvent API",
                "version": "1.0.0",
                "description": "Event listing and booking API"
            },
            "paths": {},
            "components": {
                "schemas": {}
            }
        });

        // Add common error response schema
        openapi_spec["components"]["schemas"]["ErrorResponse"] = serde_json::json!({
            "type": "object",
            "properties": {
                "error": {
                    "type": "object",
                    "properties": {
                        "code": {
                            "type": "string"
                        },
                        "message": {
                            "type": "string"
                        },
                        "details": {
                            "type": "array",
                            "items": {}
                        },
                        "trace_id": {
                            "type": "string"
                        },
                        "timestamp": {
                            "type": "string"
                        }
                    },
                    "required": ["code", "message", "trace_id", "timestamp"]
                }
            },
            "required": ["error"]
        });

        // Add server health endpoint
        openapi_spec["paths"]["/healthz"] = serde_json::json!({
            "get": {
                "summary": "Health check",
                "responses": {
                    "200": {
                        "description": "OK",
                        "content": {
                            "text/plain": {
                                "schema": {
                                    "type": "string"
                                }
                            }
                        }
                    }
                }
            }
        });

        // Collect OpenAPI specs from all modules
        for module in registry.modules() {
            if let Some(module_spec) = module.openapi() {
                // Merge paths from module
                if let Some(paths) = module_spec.get("paths") {
                    if let Some(paths_obj) = paths.as_object() {
                        for (path, path_item) in paths_obj {
                            // Prefix module paths with /api/{module_name}
                            let prefixed_path = match path.as_str() {
                                "/" => format!("/api/{}", module.name()),
                                _ => format!("/api/{}{}", module.name(), path),
                            };
                            openapi_spec["paths"][prefixed_path] = path_item.clone();
                        }
                    }
                }

                // Merge schemas from module
                if let Some(components) = module_spec.get("components") {
                    if let Some(schemas) = components.get("schemas") {
                        if let Some(schemas_obj) = schemas.as_object() {
                            for (schema_name, schema_def) in schemas_obj {
                                openapi_spec["components"]["schemas"][schema_name] =
                                    schema_def.clone();
                            }
                        }
                    }
                }
            }
        }

        // Deserialize our JSON spec into a proper utoipa OpenApi object
        // This allows SwaggerUI to serve it correctly
        let openapi_obj: utoipa::openapi::OpenApi = serde_json::from_value(openapi_spec.clone())
            .unwrap_or_else(|_| {
                utoipa::openapi::OpenApiBuilder::new()
                    .info(
                        utoipa::openapi::InfoBuilder::new()
                            .title("DevEvent API")
                            .version("1.0.0")
                            .build(),
                    )
                    .build()
            });

        // Mount Swagger UI at /swagger-ui with our merged OpenAPI spec
        // SwaggerUI will serve both the UI and the spec
        self.router = self.router.merge(
            utoipa_swagger_ui::SwaggerUi::new("/swagger-ui")
                .url("/api-docs/openapi.json", openapi_obj.clone()),
        );

        // Also serve the raw JSON spec at /docs/openapi.json for external consumers
        self.router = self.router.route(
            "/docs/openapi.json",
            get(move || async move { axum::Json(openapi_spec.clone()) }),
        );

        self
    }

    /// Build the final router
    pub fn build(self) -> Router {
        self.router
    }
}

impl Default for RouterBuilder {
    fn default() -> Self {
        Self::new()
    }
}
