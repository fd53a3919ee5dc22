use crate::handlers;
use axum::{
    routing::{delete, get, post, put},
    Router,
};
use driftwatch_monitor::MonitorService;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub struct ApiServer {
    service: Arc<MonitorService>,
}

impl ApiServer {
    #[must_use]
    pub const fn new(service: Arc<MonitorService>) -> Self {
        Self { service }
    }

    pub fn router(&self) -> Router {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        Router::new()
            .route("/api/wallets", get(handlers::list_wallets))
            .route("/api/wallets", post(handlers::subscribe_wallet))
            .route("/api/wallets/:wallet", get(handlers::get_wallet))
            .route("/api/wallets/:wallet", put(handlers::update_wallet))
            .route("/api/wallets/:wallet", delete(handlers::remove_wallet))
            .route("/api/wallets/:wallet/target", put(handlers::set_target))
            .route(
                "/api/wallets/:wallet/force-check",
                post(handlers::force_check),
            )
            .route("/api/wallets/:wallet/actions", get(handlers::recent_actions))
            .route("/api/service/start", put(handlers::start_service))
            .route("/api/service/stop", put(handlers::stop_service))
            .route("/api/service/restart", put(handlers::restart_service))
            .route("/api/service/status", get(handlers::service_status))
            .layer(cors)
            .layer(TraceLayer::new_for_http())
            .with_state(self.service.clone())
    }

    /// Starts the web server listening on the specified address.
    ///
    /// # Errors
    /// Returns an error if the server fails to bind to the address or serve
    /// requests.
    pub async fn serve(self, addr: &str) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        tracing::info!("Web API listening on {}", addr);

        axum::serve(listener, self.router()).await?;

        Ok(())
    }
}
