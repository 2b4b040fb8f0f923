//! Router builder for the libris HTTP server

use axum::{
    error_handling::HandleErrorLayer,
    extract::Request,
    http::{HeaderValue, StatusCode, Uri},
    middleware,
    routing::get,
    BoxError, Router,
};
use std::time::Duration;
use tower::{
    timeout::{error::Elapsed, TimeoutLayer},
    util::{MapRequest, MapRequestLayer},
    Layer, ServiceBuilder,
};
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use uuid::Uuid;

use libris_kernel::ModuleRegistry;

use crate::error::{self, AppError};

/// Router ready to serve: `/api/...` paths are routed without a trailing slash.
pub type App = MapRequest<Router, fn(Request) -> Request>;

/// Builder for constructing the main HTTP router
///
/// Layers wrap only what has been added before them, so add routes, modules,
/// the OpenAPI endpoints and the fallback first, then the middleware.
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

    /// Answer unmatched paths, and known paths hit with an unsupported
    /// method, with the JSON 404 envelope
    pub fn with_not_found_fallback(mut self) -> Self {
        self.router = self
            .router
            .method_not_allowed_fallback(not_found)
            .fallback(not_found);
        self
    }

    /// Attach a `stack` to 500 bodies rendered by this router when `enabled`
    pub fn with_error_diagnostics(mut self, enabled: bool) -> Self {
        self.router = self
            .router
            .layer(middleware::from_fn_with_state(enabled, error::scope_diagnostics));
        self
    }

    /// Add tracing middleware
    pub fn with_tracing(mut self) -> Self {
        self.router = self.router.layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().include_headers(true))
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

    /// Add request ID middleware; the id is echoed back on the response
    pub fn with_request_id(mut self) -> Self {
        self.router = self
            .router
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuidV7));
        self
    }

    /// Add timeout middleware; an elapsed request is answered with a 408 envelope
    pub fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.router = self.router.layer(
            ServiceBuilder::new()
                .layer(HandleErrorLayer::new(timeout_error))
                .layer(TimeoutLayer::new(Duration::from_millis(timeout_ms))),
        );
        self
    }

    /// Add OpenAPI documentation by collecting specs from all modules
    pub fn with_openapi(mut self, registry: &ModuleRegistry) -> Self {
        let openapi_spec = merge_openapi(registry);

        // Deserialize our JSON spec into a proper utoipa OpenApi object
        // so SwaggerUI can serve it
        let openapi_obj: utoipa::openapi::OpenApi = serde_json::from_value(openapi_spec.clone())
            .unwrap_or_else(|err| {
                tracing::warn!(error = %err, "merged OpenAPI document is invalid; serving a stub");
                utoipa::openapi::OpenApiBuilder::new()
                    .info(
                        utoipa::openapi::InfoBuilder::new()
                            .title("Libris API")
                            .version("1.0.0")
                            .build(),
                    )
                    .build()
            });

        self.router = self.router.merge(
            utoipa_swagger_ui::SwaggerUi::new("/swagger-ui")
                .url("/api-docs/openapi.json", openapi_obj),
        );

        // Also serve the raw JSON spec for external consumers
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

/// Wrap `router` so `/api/books/` is routed like `/api/books`.
pub fn into_app(router: Router) -> App {
    MapRequestLayer::new(trim_api_trailing_slash as fn(Request) -> Request).layer(router)
}

/// Only `/api/` paths are rewritten; Swagger UI relies on its trailing slash.
fn trim_api_trailing_slash(mut request: Request) -> Request {
    let rewritten = {
        let path = request.uri().path();
        if path.starts_with("/api/") && path.ends_with('/') {
            let trimmed = path.trim_end_matches('/');
            let target = match request.uri().query() {
                Some(query) => format!("{trimmed}?{query}"),
                None => trimmed.to_string(),
            };
            target.parse::<Uri>().ok()
        } else {
            None
        }
    };

    if let Some(uri) = rewritten {
        *request.uri_mut() = uri;
    }
    request
}

impl Default for RouterBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Merge the base document with every module's fragment, prefixing module
/// paths with `/api/{module_name}`.
pub fn merge_openapi(registry: &ModuleRegistry) -> serde_json::Value {
    let mut openapi_spec = serde_json::json!({
        "openapi": "3.1.0",
        "info": {
            "title": "Libris API",
            "version": "1.0.0",
            "description": "Books directory API"
        },
        "paths": {},
        "components": {
            "schemas": {}
        }
    });

    openapi_spec["components"]["schemas"]["ErrorResponse"] = serde_json::json!({
        "type": "object",
        "properties": {
            "status": { "type": "integer" },
            "code": { "type": "string" },
            "message": { "type": "string" },
            "details": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "field": { "type": "string" },
                        "message": { "type": "string" }
                    }
                }
            },
            "stack": { "type": "string" },
            "trace_id": { "type": "string" },
            "timestamp": { "type": "string" }
        },
        "required": ["status", "code", "message", "trace_id", "timestamp"]
    });

    for path in ["/", "/healthz"] {
        openapi_spec["paths"][path] = serde_json::json!({
            "get": {
                "summary": "Liveness check",
                "responses": {
                    "200": {
                        "description": "OK",
                        "content": {
                            "text/plain": { "schema": { "type": "string" } }
                        }
                    }
                }
            }
        });
    }

    for module in registry.modules() {
        let Some(module_spec) = module.openapi() else {
            continue;
        };

        if let Some(paths) = module_spec.get("paths").and_then(|paths| paths.as_object()) {
            for (path, path_item) in paths {
                let prefixed_path = match path.as_str() {
                    "/" => format!("/api/{}", module.name()),
                    _ => format!("/api/{}{}", module.name(), path),
                };
                openapi_spec["paths"][prefixed_path] = path_item.clone();
            }
        }

        if let Some(schemas) = module_spec
            .get("components")
            .and_then(|components| components.get("schemas"))
            .and_then(|schemas| schemas.as_object())
        {
            for (schema_name, schema_def) in schemas {
                openapi_spec["components"]["schemas"][schema_name] = schema_def.clone();
            }
        }
    }

    openapi_spec
}

async fn not_found() -> AppError {
    AppError::not_found("Not Found")
}

async fn timeout_error(err: BoxError) -> AppError {
    if err.is::<Elapsed>() {
        AppError::Status {
            status: StatusCode::REQUEST_TIMEOUT,
            message: "Request timed out".to_string(),
        }
    } else {
        AppError::Internal(anyhow::anyhow!(err))
    }
}

/// Request ID generator producing time-ordered UUIDs
#[derive(Clone, Copy)]
struct MakeRequestUuidV7;

impl MakeRequestId for MakeRequestUuidV7 {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        let request_id = Uuid::now_v7().to_string().parse::<HeaderValue>().ok()?;
        Some(RequestId::new(request_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::StatusCode};
    use tower::ServiceExt;

    fn get_request(uri: &str) -> axum::http::Request<Body> {
        axum::http::Request::builder()
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn test_module_mounting() {
        let module_router = Router::new().route("/", get(|| async { "module" }));

        let router = RouterBuilder::new()
            .mount_module("test", module_router)
            .build();

        let response = router.oneshot(get_request("/api/test")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_fallback_returns_json_404() {
        let router = RouterBuilder::new()
            .route("/health", get(|| async { "ok" }))
            .with_not_found_fallback()
            .build();

        let response = router.oneshot(get_request("/nope")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["status"], 404);
        assert_eq!(body["message"], "Not Found");
    }

    #[tokio::test]
    async fn test_middleware_chain_sets_request_id() {
        let router = RouterBuilder::new()
            .route("/health", get(|| async { "ok" }))
            .with_tracing()
            .with_cors()
            .with_request_id()
            .with_timeout(5000)
            .build();

        let response = router.oneshot(get_request("/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let request_id = response
            .headers()
            .get("x-request-id")
            .and_then(|value| value.to_str().ok())
            .unwrap();
        assert!(Uuid::parse_str(request_id).is_ok());
    }

    async fn json_body(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_unsupported_method_is_json_404() {
        let module_router = Router::new().route("/search", get(|| async { "found" }));
        let router = RouterBuilder::new()
            .mount_module("books", module_router)
            .with_not_found_fallback()
            .build();

        let request = axum::http::Request::builder()
            .method("POST")
            .uri("/api/books/search")
            .body(Body::empty())
            .unwrap();
        let response = router.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body = json_body(response).await;
        assert_eq!(body["status"], 404);
        assert_eq!(body["message"], "Not Found");
    }

    #[tokio::test]
    async fn test_elapsed_request_is_json_408() {
        let router = RouterBuilder::new()
            .route(
                "/slow",
                get(|| async {
                    tokio::time::sleep(Duration::from_millis(200)).await;
                    "late"
                }),
            )
            .with_timeout(10)
            .build();

        let response = router.oneshot(get_request("/slow")).await.unwrap();
        assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);

        let body = json_body(response).await;
        assert_eq!(body["status"], 408);
        assert_eq!(body["message"], "Request timed out");
    }

    #[tokio::test]
    async fn test_diagnostics_flag_is_per_router() {
        async fn boom() -> Result<&'static str, AppError> {
            Err(AppError::Internal(anyhow::anyhow!("boom")))
        }

        let local = RouterBuilder::new()
            .route("/boom", get(boom))
            .with_error_diagnostics(true)
            .build();
        let production = RouterBuilder::new()
            .route("/boom", get(boom))
            .with_error_diagnostics(false)
            .build();

        let body = json_body(local.oneshot(get_request("/boom")).await.unwrap()).await;
        assert!(body["stack"].as_str().unwrap().contains("boom"));

        let body = json_body(production.oneshot(get_request("/boom")).await.unwrap()).await;
        assert_eq!(body["status"], 500);
        assert!(body.get("stack").is_none());
    }

    #[tokio::test]
    async fn test_api_paths_ignore_trailing_slash() {
        let module_router = Router::new().route("/", get(|| async { "listed" }));
        let app = into_app(
            RouterBuilder::new()
                .mount_module("books", module_router)
                .with_not_found_fallback()
                .build(),
        );

        let response = app.clone().oneshot(get_request("/api/books/")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app.oneshot(get_request("/api/books/?page=2")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn test_trailing_slash_rewrite_is_scoped_to_api() {
        let rewritten = trim_api_trailing_slash(get_request("/api/books/?query=dune"));
        assert_eq!(rewritten.uri(), "/api/books?query=dune");

        let untouched = trim_api_trailing_slash(get_request("/swagger-ui/"));
        assert_eq!(untouched.uri(), "/swagger-ui/");
    }

    #[test]
    fn test_openapi_base_document() {
        let spec = merge_openapi(&ModuleRegistry::new());
        assert!(spec["paths"]["/healthz"]["get"].is_object());
        assert!(spec["components"]["schemas"]["ErrorResponse"].is_object());
    }
}
