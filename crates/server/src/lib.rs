pub mod config;
pub mod error;
pub mod routes;
pub mod state;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use state::AppState;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Templater API",
        version = "0.1.0",
        description = "Control surface for resumable function-template generation"
    ),
    paths(
        routes::health_check,
        routes::get_generation,
        routes::start_generation,
        routes::pause_generation,
        routes::resume_generation,
        routes::reset_generation,
        routes::list_artifacts,
        routes::get_artifact,
        routes::sse::events_stream,
    ),
    components(schemas(
        routes::HealthResponse,
        routes::StartGenerationRequest,
        routes::GenerationStartedResponse,
        error::ErrorResponse,
    )),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "generation", description = "Generation session control"),
        (name = "events", description = "Real-time event streaming (SSE)"),
    )
)]
pub struct ApiDoc;

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api/openapi.json", ApiDoc::openapi()))
        .route("/health", get(routes::health_check))
        .route("/api/generation", get(routes::get_generation))
        .route("/api/generation/start", post(routes::start_generation))
        .route("/api/generation/pause", post(routes::pause_generation))
        .route("/api/generation/resume", post(routes::resume_generation))
        .route("/api/generation/reset", post(routes::reset_generation))
        .route("/api/generation/artifacts", get(routes::list_artifacts))
        .route(
            "/api/generation/artifacts/{id}",
            get(routes::get_artifact),
        )
        .route("/api/events", get(routes::sse::events_stream))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
