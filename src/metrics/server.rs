use actix_web::{web, App, HttpResponse, HttpServer, Responder};
use kameo::actor::ActorRef;
use prometheus::{Encoder, TextEncoder};
use serde::Deserialize;
use std::sync::Arc;

use crate::actors::{GetSystemHealth, HealthMonitorActor};
use crate::store::DeadLetterSink;

use super::Metrics;

const DEFAULT_DEAD_LETTER_LIMIT: i32 = 50;

/// Shared state behind the operations endpoints.
#[derive(Clone)]
pub struct OpsState {
    pub metrics: Arc<Metrics>,
    pub health: ActorRef<HealthMonitorActor>,
    pub dead_letters: Arc<dyn DeadLetterSink>,
}

/// Start the operations HTTP server (metrics, health, dead letters).
/// Runs its own actix system on a dedicated thread so it never competes with
/// the consumer runtime.
pub fn start_ops_server(state: OpsState, port: u16) -> std::thread::JoinHandle<()> {
    std::thread::spawn(move || {
        let system = actix_web::rt::System::new();
        if let Err(e) = system.block_on(serve(state, port)) {
            tracing::error!(error = %e, port, "Operations server error");
        }
    })
}

async fn serve(state: OpsState, port: u16) -> std::io::Result<()> {
    tracing::info!("📊 Starting operations server on http://0.0.0.0:{}/metrics", port);

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(state.clone()))
            .route("/metrics", web::get().to(metrics_handler))
            .route("/health", web::get().to(health_handler))
            .route("/dead-letters", web::get().to(dead_letters_handler))
    })
    .workers(1)
    .bind(("0.0.0.0", port))?
    .run()
    .await
}

async fn metrics_handler(state: web::Data<OpsState>) -> impl Responder {
    let encoder = TextEncoder::new();
    let metric_families = state.metrics.registry().gather();

    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode metrics");
        return HttpResponse::InternalServerError().finish();
    }

    HttpResponse::Ok()
        .content_type("text/plain; version=0.0.4")
        .body(buffer)
}

async fn health_handler(state: web::Data<OpsState>) -> impl Responder {
    match state.health.ask(GetSystemHealth).send().await {
        Ok(health) if health.overall_status.is_unhealthy() => {
            HttpResponse::ServiceUnavailable().json(health)
        }
        Ok(health) => HttpResponse::Ok().json(health),
        Err(e) => {
            tracing::error!(error = %e, "Health monitor unreachable");
            HttpResponse::ServiceUnavailable().json(serde_json::json!({
                "overall_status": { "status": "unhealthy", "reason": "health monitor unreachable" }
            }))
        }
    }
}

#[derive(Debug, Deserialize)]
struct DeadLetterQuery {
    limit: Option<i32>,
}

async fn dead_letters_handler(
    state: web::Data<OpsState>,
    query: web::Query<DeadLetterQuery>,
) -> impl Responder {
    let limit = query.limit.unwrap_or(DEFAULT_DEAD_LETTER_LIMIT).clamp(1, 1000);

    match state.dead_letters.recent(limit).await {
        Ok(letters) => HttpResponse::Ok().json(letters),
        Err(e) => {
            tracing::error!(error = %e, "Failed to read dead letters");
            HttpResponse::InternalServerError().json(serde_json::json!({
                "error": e.to_string()
            }))
        }
    }
}
