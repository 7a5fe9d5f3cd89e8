//! `CadenceServer`: router assembly and the listener task.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::{get, post};
use cadence_inference::{ModelRegistry, Predictor};
use cadence_settings::CadenceSettings;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::config::ServerConfig;
use crate::errors::envelope_timeout;
use crate::handlers;
use crate::shutdown::ShutdownCoordinator;

/// Shared handler state.
#[derive(Clone, Debug)]
pub struct AppState {
    /// Runs predictions against `registry`.
    pub predictor: Predictor,
    /// Model lifecycle, read by `/health`.
    pub registry: Arc<ModelRegistry>,
    /// Settings the process started with.
    pub settings: Arc<CadenceSettings>,
    /// When the server was built.
    pub start_time: Instant,
}

/// The HTTP server.
pub struct CadenceServer {
    config: ServerConfig,
    state: AppState,
    shutdown: Arc<ShutdownCoordinator>,
}

impl CadenceServer {
    /// Build a server over `registry`. Models may still be loading.
    pub fn new(settings: CadenceSettings, registry: Arc<ModelRegistry>) -> Self {
        let config = ServerConfig::from_settings(&settings.server);
        let state = AppState {
            predictor: Predictor::new(Arc::clone(&registry)),
            registry,
            settings: Arc::new(settings),
            start_time: Instant::now(),
        };
        Self {
            config,
            state,
            shutdown: Arc::new(ShutdownCoordinator::new()),
        }
    }

    /// The axum router with all routes and layers.
    pub fn router(&self) -> Router {
        Router::new()
            .route("/predict", post(handlers::predict))
            .route("/health", get(handlers::health))
            .route("/genres", get(handlers::genres))
            .layer(DefaultBodyLimit::max(self.config.max_upload_bytes))
            .layer(TimeoutLayer::new(self.config.request_timeout))
            .layer(middleware::map_response(envelope_timeout))
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive())
            .with_state(self.state.clone())
    }

    /// Load models on a blocking thread. Requests before it finishes get
    /// `SERVICE_NOT_READY`; the outcome is recorded in the registry.
    pub fn load_models_in_background(&self) -> JoinHandle<()> {
        let registry = Arc::clone(&self.state.registry);
        let settings = Arc::clone(&self.state.settings);
        tokio::task::spawn_blocking(move || {
            let _ = registry.load(&settings.inference);
        })
    }

    /// Bind and serve until the shutdown token fires.
    ///
    /// Returns the bound address (useful with port `0`) and the serve task.
    pub async fn listen(&self) -> std::io::Result<(SocketAddr, JoinHandle<()>)> {
        let listener = TcpListener::bind(self.config.bind_addr()).await?;
        let addr = listener.local_addr()?;
        let app = self.router();
        let token = self.shutdown.token();

        let handle = tokio::spawn(async move {
            let result = axum::serve(listener, app)
                .with_graceful_shutdown(async move { token.cancelled().await })
                .await;
            match result {
                Ok(()) => info!("server stopped"),
                Err(e) => error!(error = %e, "server error"),
            }
        });

        info!(%addr, "listening");
        Ok((addr, handle))
    }

    /// Shutdown coordinator for the listener.
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.shutdown
    }

    /// Transport configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Handler state.
    pub fn state(&self) -> &AppState {
        &self.state
    }
}
