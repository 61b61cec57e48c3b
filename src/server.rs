use crate::metrics::METRICS;
use crate::ClickGuardService;
use axum::{
    extract::{Json, Path, Query, Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    routing::{get, post, put},
    Router,
};
use clickguard_core::{ClickGuardConfig, Error as CoreError, Mode, ThresholdRule, VisitEvent};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

pub type SharedService = Arc<ClickGuardService>;

/// API Key Authentication
#[derive(Clone)]
pub struct ApiKeyAuth {
    keys: HashSet<String>,
}

impl ApiKeyAuth {
    pub fn new(config_keys: Vec<String>) -> Self {
        let mut keys = HashSet::new();

        // Add keys from config file
        for key in config_keys {
            keys.insert(key);
        }

        // Add keys from environment variables (takes precedence)
        // CLICKGUARD_API_KEY - single key
        if let Ok(env_key) = std::env::var("CLICKGUARD_API_KEY") {
            if !env_key.is_empty() {
                keys.insert(env_key);
            }
        }

        // CLICKGUARD_API_KEYS - comma-separated keys
        if let Ok(env_keys) = std::env::var("CLICKGUARD_API_KEYS") {
            for key in env_keys.split(',') {
                let trimmed = key.trim();
                if !trimmed.is_empty() {
                    keys.insert(trimmed.to_string());
                }
            }
        }

        Self { keys }
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn validate(&self, api_key: &str) -> bool {
        self.keys.contains(api_key)
    }
}

/// Authentication middleware
pub async fn auth_middleware(
    State(auth): State<ApiKeyAuth>,
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Result<axum::response::Response, StatusCode> {
    // If no API keys configured, allow all requests
    if auth.is_empty() {
        return Ok(next.run(request).await);
    }

    // Extract API key from header
    let api_key = headers
        .get("X-API-Key")
        .and_then(|v| v.to_str().ok())
        .ok_or(StatusCode::UNAUTHORIZED)?;

    // Validate API key
    if !auth.validate(api_key) {
        return Err(StatusCode::UNAUTHORIZED);
    }

    Ok(next.run(request).await)
}

/// Simple token bucket rate limiter
struct RateLimiter {
    tokens: Arc<tokio::sync::Mutex<u32>>,
    max_tokens: u32,
    refill_interval: std::time::Duration,
    last_refill: Arc<tokio::sync::Mutex<Instant>>,
}

impl RateLimiter {
    fn new(requests_per_second: u32) -> Self {
        Self {
            tokens: Arc::new(tokio::sync::Mutex::new(requests_per_second)),
            max_tokens: requests_per_second,
            refill_interval: std::time::Duration::from_secs(1),
            last_refill: Arc::new(tokio::sync::Mutex::new(Instant::now())),
        }
    }

    async fn allow(&self) -> bool {
        let mut tokens = self.tokens.lock().await;
        let mut last_refill = self.last_refill.lock().await;

        // Refill tokens based on elapsed time
        let elapsed = last_refill.elapsed();
        if elapsed >= self.refill_interval {
            let refills = (elapsed.as_secs_f64() / self.refill_interval.as_secs_f64()) as u32;
            *tokens = (*tokens + refills).min(self.max_tokens);
            *last_refill = Instant::now();
        }

        // Consume a token if available
        if *tokens > 0 {
            *tokens -= 1;
            true
        } else {
            false
        }
    }
}

pub struct ClickGuardServer {
    service: SharedService,
    config_path: String,
    rate_limiter: Option<Arc<RateLimiter>>,
    api_auth: ApiKeyAuth,
}

impl ClickGuardServer {
    pub fn new(
        service: SharedService,
        config_path: String,
        rate_limit: Option<u32>,
        api_keys: Vec<String>,
    ) -> Self {
        let rate_limiter = rate_limit.map(|rps| Arc::new(RateLimiter::new(rps)));
        let api_auth = ApiKeyAuth::new(api_keys);
        Self {
            service,
            config_path,
            rate_limiter,
            api_auth,
        }
    }

    pub async fn run(self, host: &str, port: u16) -> anyhow::Result<()> {
        if self.api_auth.is_empty() {
            warn!("No API keys configured - protected routes are open");
        }
        let rate_limiter = self.rate_limiter.clone();
        let api_auth = self.api_auth.clone();

        // Public routes (no auth required)
        let public_routes = Router::new()
            .route("/status", get(handle_status))
            .route("/health", get(handle_health))
            .route("/metrics", get(handle_metrics));

        // Protected routes (require API key if configured)
        let protected_routes = Router::new()
            .route(
                "/api/v1/evaluate",
                post(move |service, body| {
                    handle_evaluate_with_rate_limit(service, body, rate_limiter.clone())
                }),
            )
            .route("/api/v1/policies", get(handle_policies))
            .route("/api/v1/policies/:mode", get(handle_policy))
            .route("/api/v1/policies/:mode/rules", put(handle_upsert_rule))
            .route(
                "/api/v1/policies/:mode/rules/:rule_id/toggle",
                post(handle_toggle_rule),
            )
            .route("/api/v1/policies/:mode/activate", post(handle_activate))
            .route("/api/v1/signals", get(handle_signals))
            .route("/api/v1/signals/:key", get(handle_signal))
            .route("/api/v1/verdicts", get(handle_verdicts))
            .layer(axum::middleware::from_fn_with_state(
                api_auth.clone(),
                auth_middleware,
            ));

        let app = Router::new()
            .merge(public_routes)
            .merge(protected_routes)
            .with_state(self.service.clone());

        let addr = format!("{}:{}", host, port);
        let listener = tokio::net::TcpListener::bind(&addr).await?;
        info!("ClickGuard Server running on http://{}", addr);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal(
                self.service.clone(),
                self.config_path.clone(),
            ))
            .await?;

        info!("ClickGuard Server shut down gracefully");
        Ok(())
    }
}

fn error_status(err: &CoreError) -> StatusCode {
    match err {
        CoreError::NotFound { .. } => StatusCode::NOT_FOUND,
        CoreError::InvalidRule { .. } | CoreError::InvalidEvent { .. } => StatusCode::BAD_REQUEST,
    }
}

fn error_body(err: &CoreError) -> Json<Value> {
    Json(serde_json::json!({ "error": err.to_string() }))
}

// Evaluation API

async fn handle_evaluate_with_rate_limit(
    service: State<SharedService>,
    body: Json<VisitEvent>,
    rate_limiter: Option<Arc<RateLimiter>>,
) -> (StatusCode, Json<Value>) {
    // Apply rate limiting if configured
    if let Some(limiter) = rate_limiter {
        if !limiter.allow().await {
            return (
                StatusCode::TOO_MANY_REQUESTS,
                Json(serde_json::json!({
                    "error": "Rate limit exceeded",
                    "message": "Too many requests. Please try again later."
                })),
            );
        }
    }

    handle_evaluate(service, body).await
}

pub async fn handle_evaluate(
    State(service): State<SharedService>,
    Json(event): Json<VisitEvent>,
) -> (StatusCode, Json<Value>) {
    match service.evaluate(&event) {
        Ok(report) => (StatusCode::OK, Json(serde_json::json!(report))),
        Err(err) => (error_status(&err), error_body(&err)),
    }
}

// Policy API

pub async fn handle_policies(State(service): State<SharedService>) -> (StatusCode, Json<Value>) {
    let snapshot = service.policies.snapshot();
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "active": snapshot.active,
            "aggressive": snapshot.aggressive,
            "smart": snapshot.smart,
        })),
    )
}

pub async fn handle_policy(
    State(service): State<SharedService>,
    Path(mode): Path<String>,
) -> (StatusCode, Json<Value>) {
    let mode: Mode = match mode.parse() {
        Ok(mode) => mode,
        Err(err) => return (error_status(&err), error_body(&err)),
    };
    let snapshot = service.policies.snapshot();
    (
        StatusCode::OK,
        Json(serde_json::json!(snapshot.policy(mode))),
    )
}

pub async fn handle_upsert_rule(
    State(service): State<SharedService>,
    Path(mode): Path<String>,
    Json(rule): Json<ThresholdRule>,
) -> (StatusCode, Json<Value>) {
    let mode: Mode = match mode.parse() {
        Ok(mode) => mode,
        Err(err) => return (error_status(&err), error_body(&err)),
    };

    match service.policies.upsert_rule(mode, rule.clone()) {
        Ok(()) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "message": "Rule upserted successfully",
                "mode": mode,
                "rule": rule,
            })),
        ),
        Err(err) => (error_status(&err), error_body(&err)),
    }
}

#[derive(serde::Deserialize)]
pub struct ToggleRequest {
    pub enabled: bool,
}

pub async fn handle_toggle_rule(
    State(service): State<SharedService>,
    Path((mode, rule_id)): Path<(String, String)>,
    Json(req): Json<ToggleRequest>,
) -> (StatusCode, Json<Value>) {
    let mode: Mode = match mode.parse() {
        Ok(mode) => mode,
        Err(err) => return (error_status(&err), error_body(&err)),
    };

    match service.policies.toggle_rule(mode, &rule_id, req.enabled) {
        Ok(()) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "message": "Rule toggled successfully",
                "mode": mode,
                "rule_id": rule_id,
                "enabled": req.enabled,
            })),
        ),
        Err(err) => (error_status(&err), error_body(&err)),
    }
}

pub async fn handle_activate(
    State(service): State<SharedService>,
    Path(mode): Path<String>,
) -> (StatusCode, Json<Value>) {
    let mode: Mode = match mode.parse() {
        Ok(mode) => mode,
        Err(err) => return (error_status(&err), error_body(&err)),
    };

    service.policies.activate(mode);
    info!(mode = mode.as_str(), "Active mode switched");
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "message": "Mode activated",
            "active": mode,
        })),
    )
}

// Signal catalog API

pub async fn handle_signals() -> (StatusCode, Json<Value>) {
    (
        StatusCode::OK,
        Json(serde_json::json!({ "signals": clickguard_core::signal::catalog() })),
    )
}

pub async fn handle_signal(Path(key): Path<String>) -> (StatusCode, Json<Value>) {
    match clickguard_core::signal::get(&key) {
        Ok(signal) => (StatusCode::OK, Json(serde_json::json!(signal))),
        Err(err) => (error_status(&err), error_body(&err)),
    }
}

// Verdict log API

#[derive(serde::Deserialize)]
pub struct VerdictsQuery {
    pub limit: Option<usize>,
}

pub async fn handle_verdicts(
    State(service): State<SharedService>,
    Query(query): Query<VerdictsQuery>,
) -> (StatusCode, Json<Value>) {
    let limit = query.limit.unwrap_or(50);
    let verdicts = service.verdict_log.recent(limit);
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "count": verdicts.len(),
            "verdicts": verdicts,
        })),
    )
}

// Public routes

async fn handle_status(State(service): State<SharedService>) -> (StatusCode, Json<Value>) {
    let snapshot = service.policies.snapshot();
    let runtime = service.runtime();

    let rule_counts = |mode: Mode| {
        let rules = &snapshot.policy(mode).rules;
        serde_json::json!({
            "total": rules.len(),
            "enabled": rules.normalize().count(),
        })
    };

    (
        StatusCode::OK,
        Json(serde_json::json!({
            "status": "active",
            "version": env!("CARGO_PKG_VERSION"),
            "uptime_seconds": service.started_at.elapsed().as_secs(),
            "active_mode": snapshot.active,
            "rules": {
                "aggressive": rule_counts(Mode::Aggressive),
                "smart": rule_counts(Mode::Smart),
            },
            "agents": runtime.agents.len(),
            "whitelist_entries": runtime.whitelist.ips.len() + runtime.whitelist.user_ids.len(),
            "verdicts_logged": service.verdict_log.len(),
            "metrics": METRICS.snapshot(),
        })),
    )
}

async fn handle_health() -> (StatusCode, Json<Value>) {
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "status": "healthy",
            "timestamp": chrono::Utc::now().to_rfc3339(),
        })),
    )
}

async fn handle_metrics() -> String {
    METRICS.to_prometheus()
}

async fn shutdown_signal(service: SharedService, config_path: String) {
    // Add a small delay to ensure logs can flush
    tokio::time::sleep(tokio::time::Duration::from_millis(10)).await;

    // Spawn reload handler as a background task (it runs forever)
    #[cfg(unix)]
    {
        let service = service.clone();
        let config_path = config_path.clone();
        tokio::spawn(async move {
            let mut stream = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::hangup())
                .expect("failed to install SIGHUP handler");
            loop {
                if stream.recv().await.is_none() {
                    warn!("SIGHUP signal stream closed unexpectedly");
                    std::future::pending::<()>().await;
                }

                info!("SIGHUP received, reloading configuration...");
                match ClickGuardConfig::from_file(&config_path) {
                    Ok(config) => {
                        if let Err(e) = service.reload_from_config(&config) {
                            // The running configuration stays in place on a bad reload.
                            error!("Failed to reload service: {}", e);
                        }
                    }
                    Err(e) => {
                        error!("Failed to load config file for reload: {}", e);
                    }
                }
            }
        });
    }

    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
        info!("Termination signal received (Ctrl+C)");
    };

    #[cfg(unix)]
    let terminate = async {
        let mut stream = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler");
        match stream.recv().await {
            Some(_) => {
                info!("Termination signal received (SIGTERM)");
            }
            None => {
                warn!("SIGTERM signal stream closed unexpectedly - waiting indefinitely");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
