//! HTTP surface: one axum router per domain module, assembled under `/api/v1`.

pub mod assistant;
pub mod audit;
pub mod envelope;
pub mod health;
pub mod instruments;
pub mod kb;
pub mod live;
pub mod metrics;
pub mod monitor;
pub mod notes;
pub mod order_drafts;
pub mod plans;
pub mod portfolios;
pub mod radar;
pub mod rebalance;
pub mod risk;
pub mod scores;
pub mod sim;
pub mod state;
pub mod tasks;
pub mod watchlists;
pub mod workspace;

use std::time::Instant;

use axum::Router;
use axum::extract::{MatchedPath, Request, State};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, patch, post};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use state::AppState;

async fn record_metrics(State(state): State<AppState>, matched_path: Option<MatchedPath>, request: Request, next: Next) -> Response {
    let route = matched_path.map(|p| p.as_str().to_string()).unwrap_or_else(|| request.uri().path().to_string());
    let start = Instant::now();
    let response = next.run(request).await;
    state.metrics.observe_http(&route, response.status().as_u16(), start.elapsed().as_secs_f64());
    response
}

pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/health", get(health::health))
        .route("/instruments/search", get(instruments::search))
        .route("/stocks/:exchange/:symbol/workspace", get(workspace::get_workspace))
        .route("/scores/calc", post(scores::calc))
        .route("/plans/generate", post(plans::generate))
        .route("/radar/run", post(radar::run))
        .route("/radar/results", get(radar::results))
        .route("/portfolios", post(portfolios::create))
        .route("/portfolios/:id", get(portfolios::get))
        .route("/rebalance/suggest", post(rebalance::suggest))
        .route("/order_drafts", post(order_drafts::create))
        .route("/order_drafts/:id", patch(order_drafts::update).delete(order_drafts::delete))
        .route("/risk/check", post(risk::check))
        .route("/risk/rules", get(risk::list_rules))
        .route("/risk/rules/:key", patch(risk::override_rule))
        .route("/sim/confirm", post(sim::confirm))
        .route("/sim/orders", get(sim::orders))
        .route("/sim/trades", get(sim::trades))
        .route("/tasks/run", post(tasks::run))
        .route("/tasks/:id", get(tasks::get))
        .route("/audit", get(audit::list))
        .route("/watchlists", get(watchlists::list))
        .route("/watchlists/:name/items", post(watchlists::add_item).delete(watchlists::remove_item))
        .route("/notes", post(notes::create).get(notes::list))
        .route("/monitor/rules", post(monitor::create_rule))
        .route("/monitor/check", post(monitor::check))
        .route("/monitor/alerts", get(monitor::alerts))
        .route("/kb/search", get(kb::search))
        .route("/kb/documents", post(kb::create_document))
        .route("/assistant/chat", post(assistant::chat))
        .route("/live/orders", post(live::orders))
        .with_state(state.clone());

    Router::new()
        .nest("/api/v1", api)
        .route("/metrics", get(metrics::render))
        .with_state(state.clone())
        .layer(middleware::from_fn_with_state(state, record_metrics))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use std::sync::Arc;
    use tower::ServiceExt;

    use crate::config::Config;
    use crate::infrastructure::observability::Metrics;
    use crate::infrastructure::persistence::Database;
    use crate::infrastructure::providers::{LocalProvider, ProviderRegistry};
    use crate::service::task_orchestrator::TaskOrchestrator;

    async fn test_state() -> AppState {
        let db = Database::new_in_memory().await.unwrap();
        let mut registry = ProviderRegistry::new(vec!["local".to_string()]);
        registry.register(Arc::new(LocalProvider::new()));
        let providers = Arc::new(registry);
        let metrics = Arc::new(Metrics::new().unwrap());
        let orchestrator = Arc::new(TaskOrchestrator::with_metrics(db.pool.clone(), providers.clone(), 2, metrics.clone()));
        let mut config = Config::from_env().unwrap();
        config.db_path = ":memory:".to_string();

        AppState {
            pool: db.pool,
            config: Arc::new(config),
            providers,
            orchestrator,
            metrics,
        }
    }

    #[tokio::test]
    async fn health_endpoint_reports_store_ok() {
        let state = test_state().await;
        let app = router(state);

        let response = app
            .oneshot(Request::builder().uri("/api/v1/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), axum::http::StatusCode::OK);
    }

    #[tokio::test]
    async fn unknown_portfolio_is_a_validation_error() {
        let state = test_state().await;
        let app = router(state);

        let response = app
            .oneshot(
                Request::builder()
                    .uri(format!("/api/v1/portfolios/{}", uuid::Uuid::new_v4()))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), axum::http::StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn metrics_endpoint_serves_prometheus_text() {
        let state = test_state().await;
        let app = router(state);

        let response = app
            .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), axum::http::StatusCode::OK);
    }
}
