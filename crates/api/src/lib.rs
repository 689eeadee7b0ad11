//! Dashboard API Server
//!
//! REST API serving AQI and activity predictions from the persisted model
//! bundles, plus the health-authority and citizen dashboard views.

use axum::{
    extract::{MatchedPath, Request, State},
    http::header,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use dashboard::Dashboard;
use dataset::{AirQualityRecord, HealthRecord};
use inference_engine::{ActivityBundle, ActivityPredictor, AirQualityBundle, AirQualityPredictor};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use serde::Serialize;
use serde_json::json;
use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;
use storage::ArtifactStore;
use tokio::sync::RwLock;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

mod error;
mod routes;
mod settings;

pub use error::ApiError;
pub use routes::predictions::{ActivityRequest, PredictionResponse};
pub use settings::{LoggingConfig, ServerConfig, Settings};

/// Application state shared across handlers, read-only after startup
pub struct AppState {
    pub air_quality: Option<AirQualityPredictor>,
    pub activity: Option<ActivityPredictor>,
    pub dashboard: Option<Dashboard>,
    /// Prometheus exposition handle
    pub metrics: Option<PrometheusHandle>,
    pub version: String,
    pub start_time: Instant,
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

impl AppState {
    /// State with nothing loaded
    pub fn new() -> Self {
        Self {
            air_quality: None,
            activity: None,
            dashboard: None,
            metrics: None,
            version: env!("CARGO_PKG_VERSION").to_string(),
            start_time: Instant::now(),
        }
    }

    pub fn with_air_quality(mut self, predictor: AirQualityPredictor) -> Self {
        self.air_quality = Some(predictor);
        self
    }

    pub fn with_activity(mut self, predictor: ActivityPredictor) -> Self {
        self.activity = Some(predictor);
        self
    }

    pub fn with_dashboard(mut self, dashboard: Dashboard) -> Self {
        self.dashboard = Some(dashboard);
        self
    }

    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    /// Load bundles and dashboard tables; anything missing is logged and left unset
    pub fn load(settings: &Settings) -> Self {
        let mut state = Self::new();
        let store = ArtifactStore::new(&settings.server.artifact_dir);

        match AirQualityBundle::load(&store) {
            Ok(bundle) => state.air_quality = Some(AirQualityPredictor::new(bundle)),
            Err(e) => warn!("Air quality model not loaded: {}", e),
        }
        match ActivityBundle::load(&store) {
            Ok(bundle) => state.activity = Some(ActivityPredictor::new(bundle)),
            Err(e) => warn!("Activity model not loaded: {}", e),
        }

        let data = &settings.data;
        let air = dataset::load::<AirQualityRecord>(&data.air_path, usize::MAX, data.seed);
        let health = dataset::load::<HealthRecord>(&data.health_path, usize::MAX, data.seed);
        match (air, health) {
            (Ok(air), Ok(health)) => {
                state.dashboard = Some(Dashboard::new(air, health, settings.dashboard.clone()))
            }
            (Err(e), _) | (_, Err(e)) => warn!("Dashboard data not loaded: {}", e),
        }
        state
    }
}

/// Health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub components: ComponentStatus,
}

/// Component status
#[derive(Debug, Serialize)]
pub struct ComponentStatus {
    pub air_quality_model: ComponentHealth,
    pub activity_model: ComponentHealth,
    pub dashboard_data: ComponentHealth,
}

/// Individual component health
#[derive(Debug, Serialize)]
pub struct ComponentHealth {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub metrics: BTreeMap<String, f64>,
}

impl ComponentHealth {
    fn ok(run_id: Option<String>, metrics: BTreeMap<String, f64>) -> Self {
        Self {
            status: "ok".to_string(),
            run_id,
            metrics,
        }
    }

    fn unavailable() -> Self {
        Self {
            status: "unavailable".to_string(),
            run_id: None,
            metrics: BTreeMap::new(),
        }
    }

    fn is_ok(&self) -> bool {
        self.status == "ok"
    }
}

/// Create the application router
pub fn create_router(state: Arc<RwLock<AppState>>) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/api/v1/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .route(
            "/api/predict/air-quality",
            post(routes::predictions::predict_air_quality),
        )
        .route(
            "/api/predict/activity",
            post(routes::predictions::predict_activity),
        )
        .route(
            "/api/citizens/predict-activity",
            post(routes::predictions::predict_activity),
        )
        .route(
            "/api/health-authorities/risk-map",
            get(routes::authorities::get_risk_map),
        )
        .route(
            "/api/health-authorities/alerts",
            get(routes::authorities::get_alerts),
        )
        .route(
            "/api/health-authorities/stats",
            get(routes::authorities::get_stats),
        )
        .route(
            "/api/citizens/personal-alerts",
            get(routes::citizens::get_personal_alerts),
        )
        .route("/api/citizens/trends", get(routes::citizens::get_trends))
        .layer(middleware::from_fn(track_requests))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Request counter and latency histogram per route
async fn track_requests(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let path = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());
    let method = request.method().to_string();

    let response = next.run(request).await;

    let status = response.status().as_u16().to_string();
    metrics::counter!(
        "http_requests_total",
        "method" => method.clone(),
        "path" => path.clone(),
        "status" => status
    )
    .increment(1);
    metrics::histogram!(
        "http_request_duration_seconds",
        "method" => method,
        "path" => path
    )
    .record(start.elapsed().as_secs_f64());
    response
}

/// Service index
async fn index_handler(State(state): State<Arc<RwLock<AppState>>>) -> impl IntoResponse {
    let state = state.read().await;
    Json(json!({
        "message": "Health & Air Quality Dashboard API",
        "version": state.version,
        "endpoints": {
            "health_authorities": {
                "risk_map": "GET /api/health-authorities/risk-map",
                "alerts": "GET /api/health-authorities/alerts?severity=&limit=50",
                "stats": "GET /api/health-authorities/stats",
            },
            "citizens": {
                "personal_alerts": "GET /api/citizens/personal-alerts?user_id=",
                "trends": "GET /api/citizens/trends?user_id=&metric=all&days=7",
                "predict_activity": "POST /api/citizens/predict-activity",
            },
            "predictions": {
                "air_quality": "POST /api/predict/air-quality",
                "activity": "POST /api/predict/activity",
            },
            "system": {
                "health": "GET /api/v1/health",
                "metrics": "GET /metrics",
            },
        },
    }))
}

/// Health check handler
async fn health_handler(State(state): State<Arc<RwLock<AppState>>>) -> impl IntoResponse {
    let state = state.read().await;

    let air_quality_model = state.air_quality.as_ref().map_or_else(ComponentHealth::unavailable, |p| {
        let bundle = p.bundle();
        ComponentHealth::ok(Some(bundle.run_id.to_string()), bundle.metrics.clone())
    });
    let activity_model = state.activity.as_ref().map_or_else(ComponentHealth::unavailable, |p| {
        let bundle = p.bundle();
        ComponentHealth::ok(Some(bundle.run_id.to_string()), bundle.metrics.clone())
    });
    let dashboard_data = state.dashboard.as_ref().map_or_else(ComponentHealth::unavailable, |d| {
        let mut rows = BTreeMap::new();
        rows.insert("air_rows".to_string(), d.air_rows() as f64);
        rows.insert("health_rows".to_string(), d.health_rows() as f64);
        ComponentHealth::ok(None, rows)
    });

    let healthy =
        air_quality_model.is_ok() && activity_model.is_ok() && dashboard_data.is_ok();
    let response = HealthResponse {
        status: if healthy { "healthy" } else { "degraded" }.to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        version: state.version.clone(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        components: ComponentStatus {
            air_quality_model,
            activity_model,
            dashboard_data,
        },
    };

    Json(response)
}

/// Prometheus text exposition
async fn metrics_handler(State(state): State<Arc<RwLock<AppState>>>) -> impl IntoResponse {
    let state = state.read().await;
    let body = state.metrics.as_ref().map(|h| h.render()).unwrap_or_default();
    ([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], body)
}

/// Initialize logging
pub fn init_logging(config: &LoggingConfig) -> Result<(), tracing::subscriber::SetGlobalDefaultError> {
    let level = Level::from_str(&config.level).unwrap_or(Level::INFO);
    let builder = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true);

    if config.json {
        tracing::subscriber::set_global_default(builder.json().finish())
    } else {
        tracing::subscriber::set_global_default(builder.finish())
    }
}

/// Run the server until Ctrl-C
pub async fn run_server(settings: &Settings) -> anyhow::Result<()> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    let state = AppState::load(settings).with_metrics(handle);
    let app = create_router(Arc::new(RwLock::new(state)));

    let addr = settings.server.addr();
    info!("Starting API server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for shutdown signal: {}", e);
            }
            info!("Shutting down API server");
        })
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use metrics_exporter_prometheus::PrometheusBuilder;
    use tower::ServiceExt;

    pub(crate) async fn call(
        state: AppState,
        request: Request<Body>,
    ) -> (StatusCode, serde_json::Value) {
        let app = create_router(Arc::new(RwLock::new(state)));
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, body)
    }

    pub(crate) fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_health_degraded_without_models() {
        let (status, body) = call(AppState::new(), get("/api/v1/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "degraded");
        assert_eq!(body["components"]["air_quality_model"]["status"], "unavailable");
    }

    #[tokio::test]
    async fn test_index_lists_endpoints() {
        let (status, body) = call(AppState::new(), get("/")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body["endpoints"]["predictions"]["air_quality"],
            "POST /api/predict/air-quality"
        );
    }

    #[tokio::test]
    async fn test_metrics_endpoint_is_text() {
        let handle = PrometheusBuilder::new().build_recorder().handle();
        let app = create_router(Arc::new(RwLock::new(AppState::new().with_metrics(handle))));
        let response = app.oneshot(get("/metrics")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let content_type = response.headers()[header::CONTENT_TYPE].to_str().unwrap();
        assert!(content_type.starts_with("text/plain"));
    }

    #[tokio::test]
    async fn test_unknown_route() {
        let (status, _) = call(AppState::new(), get("/api/v2/nothing")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
