//! Axum router construction.
//!
//! [`build`] assembles the complete application router:
//! - `/health` heartbeat, unauthenticated
//! - `/api` task, chat, conversation and account routes behind a bearer session
//! - optional Swagger UI / OpenAPI document (disable with `TASKMATE_ENABLE_SWAGGER=false`)
//! - CORS and per-request trace-id layers

mod api;
pub mod doc;
mod health;

use std::sync::Arc;

use axum::Router;
use axum::middleware;
use tower::ServiceBuilder;
use utoipa_swagger_ui::SwaggerUi;

use crate::middleware::{cors, trace};
use crate::state::AppState;

// ── Router builder ────────────────────────────────────────────────────────────

/// Build the complete Axum [`Router`] for the application.
pub fn build(state: Arc<AppState>) -> Router {
    let mut app = Router::new()
        .merge(health::router())
        .nest("/api", api::router(state.clone()));

    if state.config.enable_swagger {
        app = app.merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", doc::get_docs()));
    }

    app
        // Outermost layers execute first on the way in.
        .layer(ServiceBuilder::new().layer(cors::cors_layer(state.clone())))
        .layer(middleware::from_fn(trace::trace_middleware))
        .with_state(state)
}
