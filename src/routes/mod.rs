use axum::http::HeaderValue;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub mod attributes;
pub mod documents;
pub mod expense_groups;
pub mod health;
pub mod schedule;

pub fn create_router(state: AppState) -> Router<()> {
    let cors = if let Some(origins) = state.config.cors_allowed_origin.as_ref() {
        let headers: Vec<HeaderValue> = origins
            .split(',')
            .filter_map(|value| {
                let trimmed = value.trim();
                (!trimmed.is_empty()).then(|| {
                    trimmed
                        .parse::<HeaderValue>()
                        .expect("invalid CORS allowed origin")
                })
            })
            .collect();

        CorsLayer::new()
            .allow_origin(AllowOrigin::list(headers))
            .allow_methods(tower_http::cors::AllowMethods::mirror_request())
            .allow_headers(tower_http::cors::AllowHeaders::mirror_request())
    } else {
        CorsLayer::new()
            .allow_origin(AllowOrigin::mirror_request())
            .allow_methods(tower_http::cors::AllowMethods::mirror_request())
            .allow_headers(tower_http::cors::AllowHeaders::mirror_request())
    };

    let source_routes = Router::new()
        .route("/profile", get(attributes::employee_profile))
        .route("/employees", get(attributes::list_employees))
        .route("/categories", get(attributes::list_categories))
        .route("/cost_centers", get(attributes::list_cost_centers))
        .route("/projects", get(attributes::list_projects))
        .route("/sync", post(attributes::sync_attributes));

    let expense_group_routes = Router::new()
        .route(
            "/",
            get(expense_groups::list_expense_groups).post(expense_groups::create_expense_groups),
        )
        .route("/:expense_group_id", get(expense_groups::get_expense_group))
        .route(
            "/:expense_group_id/expenses",
            get(expense_groups::list_group_expenses),
        );

    let document_routes = Router::new()
        .route(
            "/bills",
            get(documents::list_bills).post(documents::create_bills),
        )
        .route("/bills/trigger", post(documents::trigger_bills))
        .route(
            "/checks",
            get(documents::list_checks).post(documents::create_checks),
        )
        .route("/checks/trigger", post(documents::trigger_checks))
        .route(
            "/journal_entries",
            get(documents::list_journal_entries).post(documents::create_journal_entries),
        )
        .route(
            "/journal_entries/trigger",
            post(documents::trigger_journal_entries),
        )
        .route(
            "/credit_card_purchases",
            get(documents::list_credit_card_purchases).post(documents::create_credit_card_purchases),
        )
        .route(
            "/credit_card_purchases/trigger",
            post(documents::trigger_credit_card_purchases),
        );

    let schedule_routes = Router::new()
        .route("/", post(schedule::upsert_schedule))
        .route("/trigger", post(schedule::trigger_sync))
        // Remote scheduler callbacks carry a trailing slash.
        .route("/trigger/", post(schedule::trigger_sync));

    let workspace_routes = Router::new()
        .nest("/source", source_routes)
        .nest("/expense_groups", expense_group_routes)
        .nest("/schedule", schedule_routes)
        .merge(document_routes);

    Router::new()
        .nest("/api/workspaces/:workspace_id", workspace_routes)
        .route("/api/health", get(health::health_check))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
