/*!
 * HTTP Server
 * Shared state, the merged router and the serve loop with graceful shutdown
 */

use crate::abis::{self, AbisService, TemplateSource};
use crate::capture::{self, CaptureService, ProfileSource};
use crate::config::ServiceConfig;
use crate::delivery::{Dispatcher, MemoryQueues};
use crate::error::{ApiError, ApiResult, ServiceError, ServiceResult};
use crate::mv::{self, MvService};
use crate::scheduler::DeliveryScheduler;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde_json::Value;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

#[derive(Clone)]
pub struct AppState {
    pub queues: Arc<MemoryQueues>,
    pub abis: Arc<AbisService>,
    pub mv: Arc<MvService>,
    pub capture: Arc<CaptureService>,
}

impl AppState {
    pub fn new(config: &ServiceConfig, templates: Arc<dyn TemplateSource>) -> ServiceResult<Self> {
        let queues = Arc::new(MemoryQueues::with_capacity(config.server.queue_capacity));
        queues.declare(&config.abis.outbound_queue);
        queues.declare(&config.mv.outbound_queue);

        let dispatcher = Arc::new(Dispatcher::new(Arc::clone(&queues), config.server.http_timeout())?);
        let scheduler = Arc::new(DeliveryScheduler::new(dispatcher));

        let abis = AbisService::new(&config.abis, templates, Arc::clone(&scheduler));
        let mv = MvService::new(&config.mv, scheduler);
        let capture = CaptureService::new(
            ProfileSource::new(config.sbi.profile_dir.clone()),
            config.sbi.default_profile.clone(),
        );

        Ok(Self {
            queues,
            abis: Arc::new(abis),
            mv: Arc::new(mv),
            capture: Arc::new(capture),
        })
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/queues/:name", get(drain_queue))
        .merge(abis::routes::router())
        .merge(mv::routes::router())
        .merge(capture::routes::router())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health() -> StatusCode {
    StatusCode::OK
}

/// Pop everything waiting on an outbound queue
async fn drain_queue(State(state): State<AppState>, Path(name): Path<String>) -> ApiResult<Json<Vec<Value>>> {
    state
        .queues
        .drain(&name)
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Queue {name}")))
}

pub struct Server {
    config: ServiceConfig,
    state: AppState,
}

impl Server {
    pub fn new(config: ServiceConfig, templates: Arc<dyn TemplateSource>) -> ServiceResult<Self> {
        let state = AppState::new(&config, templates)?;
        Ok(Self { config, state })
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub async fn run(self) -> ServiceResult<()> {
        let addr = self.config.server.listen_addr;
        let listener = TcpListener::bind(addr).await?;

        info!(%addr, "Mock services listening");
        info!(
            queue = %self.config.abis.destination(),
            find_duplicate = self.config.abis.find_duplicate,
            force_duplicate = self.config.abis.force_duplicate,
            "ABIS ready"
        );
        info!(
            queue = %self.config.mv.destination(),
            default_decision = %self.config.mv.default_decision,
            "Manual verification ready"
        );
        info!(profile_dir = %self.config.sbi.profile_dir.display(), "SBI capture ready");

        axum::serve(listener, router(self.state))
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| ServiceError::Server(e.to_string()))?;

        info!("Mock services shutting down");
        Ok(())
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, initiating graceful shutdown"),
        _ = terminate => info!("Received terminate signal, initiating graceful shutdown"),
    }
}
