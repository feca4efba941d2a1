use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use metrics_exporter_prometheus::PrometheusHandle;
use staffdir_storage::Database;

use crate::employees;
use crate::mailer::MailerHandle;
use crate::telemetry;

#[derive(Clone)]
pub struct AppState {
    metrics: PrometheusHandle,
    storage: Database,
    mailer: MailerHandle,
    clock: Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>,
    debug: bool,
}

impl AppState {
    pub fn new(
        metrics: PrometheusHandle,
        storage: Database,
        mailer: MailerHandle,
        debug: bool,
    ) -> Self {
        Self {
            metrics,
            storage,
            mailer,
            clock: Arc::new(Utc::now),
            debug,
        }
    }

    #[cfg(test)]
    pub fn with_clock(mut self, clock: Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>) -> Self {
        self.clock = clock;
        self
    }

    pub fn metrics(&self) -> &PrometheusHandle {
        &self.metrics
    }

    pub fn storage(&self) -> &Database {
        &self.storage
    }

    pub fn mailer(&self) -> &MailerHandle {
        &self.mailer
    }

    pub fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }

    pub fn debug(&self) -> bool {
        self.debug
    }
}

pub fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics))
        .route("/employees", post(employees::create).get(employees::list))
        .route("/employees/:id", get(employees::fetch))
        .with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    let body = telemetry::render_metrics(state.metrics());
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/plain; version=0.0.4")
        .body(Body::from(body))
        .unwrap()
}
