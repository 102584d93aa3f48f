// MindCare - HTTP Server Module
// Chat analysis, alert dashboard feed and monitoring stream

mod handlers;
mod middleware;

pub use handlers::{create_router, health_check, metrics_endpoint, AppError};
pub use middleware::{identity_middleware, require_responder};

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::metrics::Telemetry;
use crate::notify::AlertBroadcaster;
use crate::pipeline::MessagePipeline;

/// Shared state handed to every handler
pub struct AppState {
    pipeline: Arc<MessagePipeline>,
    broadcaster: Arc<AlertBroadcaster>,
    telemetry: Arc<Telemetry>,
    started_at: Instant,
}

impl AppState {
    pub fn new(
        pipeline: Arc<MessagePipeline>,
        broadcaster: Arc<AlertBroadcaster>,
        telemetry: Arc<Telemetry>,
    ) -> Self {
        Self {
            pipeline,
            broadcaster,
            telemetry,
            started_at: Instant::now(),
        }
    }

    pub fn pipeline(&self) -> &MessagePipeline {
        &self.pipeline
    }

    pub fn broadcaster(&self) -> &AlertBroadcaster {
        &self.broadcaster
    }

    pub fn telemetry(&self) -> &Telemetry {
        &self.telemetry
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}

/// Start the HTTP server
pub async fn serve(state: AppState, bind_address: &str) -> Result<()> {
    let addr: SocketAddr = bind_address.parse()?;

    let app = create_router(Arc::new(state))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    tracing::info!("Starting MindCare server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
