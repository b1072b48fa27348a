pub mod health;

use axum::{
    routing::{delete, get, patch, post, put},
    Router,
};

use crate::document::handlers as document;
use crate::optimize::handlers as optimize;
use crate::state::AppState;
use crate::versions::handlers as versions;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Document API
        .route("/api/v1/cv", get(document::handle_get_cv))
        .route("/api/v1/cv/personal", put(document::handle_update_personal))
        .route("/api/v1/cv/template", put(document::handle_set_template))
        .route(
            "/api/v1/cv/sections",
            put(document::handle_update_section_order),
        )
        .route("/api/v1/cv/reset", post(document::handle_reset))
        .route("/api/v1/cv/load", post(document::handle_load))
        .route("/api/v1/cv/save", post(document::handle_save))
        .route("/api/v1/cv/status", get(document::handle_save_status))
        // Section entry API
        .route(
            "/api/v1/cv/:section/entries",
            post(document::handle_add_entry),
        )
        .route(
            "/api/v1/cv/:section/entries/:id",
            patch(document::handle_update_entry).delete(document::handle_remove_entry),
        )
        .route(
            "/api/v1/cv/:section/reorder",
            put(document::handle_reorder_entries),
        )
        // Bullet points nested under a work-experience entry
        .route(
            "/api/v1/cv/experience/:id/bullets",
            post(document::handle_add_bullet),
        )
        .route(
            "/api/v1/cv/experience/:id/bullets/reorder",
            put(document::handle_reorder_bullets),
        )
        .route(
            "/api/v1/cv/experience/:id/bullets/:bullet_id",
            patch(document::handle_update_bullet).delete(document::handle_remove_bullet),
        )
        // Versions API
        .route(
            "/api/v1/versions",
            get(versions::handle_list_versions).post(versions::handle_create_version),
        )
        .route(
            "/api/v1/versions/:id/activate",
            post(versions::handle_activate_version),
        )
        .route(
            "/api/v1/versions/:id/duplicate",
            post(versions::handle_duplicate_version),
        )
        .route(
            "/api/v1/versions/:id",
            delete(versions::handle_delete_version),
        )
        // Job-targeting optimizer
        .route("/api/v1/optimize", post(optimize::handle_analyze))
        .route("/api/v1/optimize/apply", post(optimize::handle_apply))
        .with_state(state)
}
