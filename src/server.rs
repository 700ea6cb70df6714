// ABOUTME: Application state and HTTP server bootstrap
// ABOUTME: Wires the status register, relay, stores, and token stub into one axum router

use agentline_core::{
    config::Config, metrics, CallEventSource, NotificationRelay, SampleCallSource,
    ServiceCredential, StatusRegister,
};
use anyhow::{Context, Result};
use axum::{
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::future::Future;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    routes,
    socket::{ws_handler, SocketKeepalive},
    stores::{CallStore, LogStore, RestStore},
    token::TokenIssuer,
};

/// State shared by every handler. Cloning is cheap.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub status: Arc<StatusRegister>,
    pub relay: Arc<NotificationRelay>,
    pub keepalive: SocketKeepalive,
    pub tokens: TokenIssuer,
    pub credential: Arc<ServiceCredential>,
    pub log_store: Option<Arc<dyn LogStore>>,
    pub call_store: Option<Arc<dyn CallStore>>,
    pub metrics: Option<PrometheusHandle>,
    pub started_at: chrono::DateTime<chrono::Utc>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .field("status", &self.status.get())
            .field("relay", &self.relay)
            .field("keepalive", &self.keepalive)
            .field("credential", &self.credential)
            .field("log_store", &self.log_store.as_ref().map(|_| "<LogStore>"))
            .field("call_store", &self.call_store.as_ref().map(|_| "<CallStore>"))
            .field("metrics", &self.metrics.as_ref().map(|_| "<PrometheusHandle>"))
            .field("started_at", &self.started_at)
            .finish()
    }
}

impl AppState {
    /// State with no external stores attached and the sample event source
    pub fn new(config: Config, credential: ServiceCredential) -> Self {
        let source = SampleCallSource::new(
            config.relay.sample_caller.clone(),
            config.relay.sample_name.clone(),
        );
        let relay = NotificationRelay::new(config.relay_interval(), Arc::new(source));

        Self {
            keepalive: SocketKeepalive::from_config(&config.server),
            tokens: TokenIssuer::new(config.token.ttl_secs),
            config: Arc::new(config),
            status: Arc::new(StatusRegister::new()),
            relay: Arc::new(relay),
            credential: Arc::new(credential),
            log_store: None,
            call_store: None,
            metrics: None,
            started_at: chrono::Utc::now(),
        }
    }

    /// Build state from configuration. Fails if the identity credential is
    /// missing or invalid; a missing store only disables its route.
    pub fn from_config(config: Config) -> Result<Self> {
        let credential = ServiceCredential::load(&config.identity)
            .context("Cannot start without an identity platform credential")?;
        tracing::info!(
            project_id = %credential.project_id,
            client_email = %credential.client_email,
            "Identity credential loaded"
        );

        let log_store = match config.log_store.as_ref() {
            Some(store) => Some(RestStore::new(store)?),
            None => {
                tracing::warn!("No log store configured; log submissions will fail");
                None
            }
        };
        let call_store = match config.call_store.as_ref() {
            Some(store) => Some(RestStore::new(store)?),
            None => {
                tracing::warn!("No call store configured; incoming call lookups will fail");
                None
            }
        };

        let mut state = Self::new(config, credential);
        if let Some(store) = log_store {
            state = state.with_log_store(Arc::new(store));
        }
        if let Some(store) = call_store {
            state = state.with_call_store(Arc::new(store));
        }
        Ok(state)
    }

    pub fn with_log_store(mut self, store: Arc<dyn LogStore>) -> Self {
        self.log_store = Some(store);
        self
    }

    pub fn with_call_store(mut self, store: Arc<dyn CallStore>) -> Self {
        self.call_store = Some(store);
        self
    }

    /// Replace the relay, e.g. to inject real call data or a different interval
    pub fn with_relay(mut self, relay: NotificationRelay) -> Self {
        self.relay = Arc::new(relay);
        self
    }

    /// Keep the configured interval but take events from `source`
    pub fn with_event_source(self, source: Arc<dyn CallEventSource>) -> Self {
        let interval = self.relay.interval();
        self.with_relay(NotificationRelay::new(interval, source))
    }

    pub fn with_keepalive(mut self, keepalive: SocketKeepalive) -> Self {
        self.keepalive = keepalive;
        self
    }

    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }
}

/// All routes, with tracing and CORS layers applied
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route(
            "/agent/status",
            get(routes::get_status).post(routes::set_status),
        )
        .route("/call/incoming", get(routes::incoming_call))
        .route("/webrtc/token", get(routes::webrtc_token))
        .route("/api/logs/save", post(routes::save_log))
        .route("/health", get(routes::health))
        .route("/metrics", get(routes::metrics_handler))
        .route("/socket", get(ws_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serve `state` on an already-bound listener until `shutdown` resolves
pub async fn serve<F>(listener: tokio::net::TcpListener, state: AppState, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = build_router(state);
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown)
    .await
    .context("HTTP server failed")?;
    Ok(())
}

/// Start the server from configuration.
///
/// State (and with it the identity credential) is resolved before the
/// listener is bound, so a misconfigured process never opens its port.
pub async fn start_server(config: Config) -> Result<()> {
    let addr = config.bind_address();
    let state = AppState::from_config(config)?;

    let metrics_handle =
        metrics::init_metrics().context("Failed to initialize Prometheus metrics")?;
    let state = state.with_metrics(metrics_handle);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!(
        addr = %addr,
        relay_interval_secs = state.relay.interval().as_secs(),
        "Starting HTTP server"
    );

    serve(listener, state, shutdown_signal()).await?;
    tracing::info!("Server stopped");
    Ok(())
}

/// Resolves on Ctrl-C, or SIGTERM on unix
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
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
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
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
    tracing::info!("Shutdown signal received");
}
