//! Warden Server - the HTTP boundary of the auth adapter.
//!
//! On startup the server compares the store's recorded schema version with
//! [`warden_db::SCHEMA_VERSION`] and refuses to serve on a mismatch (see
//! [`startup::check_schema`]). It never creates or alters tables; that is
//! the migration tool's job.
//!
//! Every credential or token failure is answered with the same
//! `401 {"error":"unauthorized"}`.
//!
//! The OpenAPI document is served at `/api-doc/openapi.json` with a Swagger UI
//! at `/swagger-ui`.

pub mod api_doc;
pub mod config;
pub mod error;
pub mod reaper;
pub mod routes;
pub mod startup;
pub mod state;

use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::api_doc::ApiDoc;

pub use config::{SchemaCheck, ServerConfig};
pub use error::{ApiError, ServerError, ServerResult};
pub use state::AppState;

/// Build the HTTP router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(routes::health))
        .route("/v1/principals", post(routes::create_principal))
        .route(
            "/v1/principals/{login}",
            get(routes::get_principal).put(routes::update_principal),
        )
        .route("/v1/sessions", post(routes::create_session))
        .route(
            "/v1/sessions/current",
            get(routes::current_session).delete(routes::end_session),
        )
        .merge(SwaggerUi::new("/swagger-ui").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
