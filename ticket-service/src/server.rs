//! HTTP server with graceful shutdown

use std::any::Any;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Body;
use axum::routing::get;
use axum::{middleware, Router};
use http::{header, HeaderValue, Method, StatusCode};
use tokio::net::TcpListener;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tower_http::{
    catch_panic::{CatchPanicLayer, ResponseForPanic},
    compression::CompressionLayer,
    cors::{AllowOrigin, CorsLayer},
    limit::RequestBodyLimitLayer,
    timeout::TimeoutLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};

use crate::{
    config::Config,
    error::{Error, Result},
    handlers::{collect_failures, envelope_rejections, route_not_found, ErrorNormalizer, Failure},
    health::health,
    middleware::{
        apply_security_headers, request_id_layer, request_id_propagation_layer,
        sensitive_headers_layer,
    },
    observability::panic_message,
    state::AppState,
    tickets::{ticket_routes, TICKETS_PATH},
};

/// Assemble every route of the service
///
/// Unmatched paths and unsupported methods fall through to a `RouteNotFound`
/// failure, and every failure a handler returns is rendered by the state's
/// error normalizer.
pub fn build_router(state: &AppState) -> Router {
    let health_routes = Router::new()
        .route("/health", get(health))
        .method_not_allowed_fallback(route_not_found)
        .with_state(state.clone());

    Router::new()
        .merge(health_routes)
        .nest(TICKETS_PATH, ticket_routes(state.tickets()))
        .fallback(route_not_found)
        .method_not_allowed_fallback(route_not_found)
        .layer(middleware::from_fn_with_state(
            state.normalizer(),
            collect_failures,
        ))
}

/// Process-wide signal that an unrecoverable condition occurred
///
/// Tripping it starts a graceful shutdown; [`Server::serve`] then returns
/// [`Error::Fatal`].
#[derive(Debug, Clone, Default)]
pub struct FatalSignal(CancellationToken);

impl FatalSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trip(&self, reason: &str) {
        tracing::error!(reason, "fatal condition, shutting down");
        self.0.cancel();
    }

    pub fn is_tripped(&self) -> bool {
        self.0.is_cancelled()
    }

    /// Resolves once tripped
    pub async fn tripped(&self) {
        self.0.cancelled().await;
    }
}

/// Renders an escaped panic as a generic failure and trips the fatal signal
#[derive(Debug, Clone)]
pub struct PanicResponder {
    normalizer: Arc<ErrorNormalizer>,
    fatal: FatalSignal,
}

impl PanicResponder {
    pub fn new(normalizer: Arc<ErrorNormalizer>, fatal: FatalSignal) -> Self {
        Self { normalizer, fatal }
    }
}

impl ResponseForPanic for PanicResponder {
    type ResponseBody = Body;

    fn response_for_panic(
        &mut self,
        payload: Box<dyn Any + Send + 'static>,
    ) -> http::Response<Self::ResponseBody> {
        let message = panic_message(payload.as_ref());
        self.fatal.trip(&message);
        let failure = Failure::Unexpected(anyhow::anyhow!("panic in request handler: {message}"));
        self.normalizer.render(&failure)
    }
}

/// Server instance
pub struct Server {
    config: Config,
    fatal: FatalSignal,
}

impl Server {
    /// Create a new server instance
    pub fn new(config: Config) -> Self {
        Self {
            config,
            fatal: FatalSignal::new(),
        }
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn fatal_signal(&self) -> FatalSignal {
        self.fatal.clone()
    }

    /// Wrap `app` in the configured middleware stack
    ///
    /// Layers are listed innermost first.
    pub fn apply_middleware(&self, app: Router) -> Router {
        let settings = &self.config.middleware;
        let normalizer = Arc::new(ErrorNormalizer::new(self.config.mode()));

        let app = if settings.catch_panic {
            app.layer(CatchPanicLayer::custom(PanicResponder::new(
                normalizer.clone(),
                self.fatal.clone(),
            )))
        } else {
            app
        };

        let app = app
            .layer(RequestBodyLimitLayer::new(self.config.body_limit_bytes()))
            .layer(TimeoutLayer::with_status_code(
                StatusCode::REQUEST_TIMEOUT,
                self.config.timeout(),
            ))
            .layer(middleware::map_response_with_state(
                normalizer,
                envelope_rejections,
            ))
            .layer(
                TraceLayer::new_for_http()
                    .make_span_with(DefaultMakeSpan::new().include_headers(true))
                    .on_response(DefaultOnResponse::new().include_headers(true)),
            )
            .layer(request_id_propagation_layer())
            .layer(request_id_layer())
            .layer(sensitive_headers_layer());

        let app = apply_security_headers(app, &settings.security_headers);

        let app = if settings.compression {
            app.layer(CompressionLayer::new())
        } else {
            app
        };

        app.layer(self.build_cors_layer())
    }

    /// Run the server with the given router
    pub async fn serve(self, app: Router) -> Result<()> {
        let address = SocketAddr::from(([0, 0, 0, 0], self.config.service.port));

        tracing::info!("Starting {} on {}", self.config.service.name, address);
        self.log_middleware_config();

        let app = self.apply_middleware(app);
        let listener = TcpListener::bind(&address)
            .await
            .map_err(|source| Error::Bind { address, source })?;

        tracing::info!("Server listening on {}", address);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal(self.fatal.clone()))
            .await?;

        if self.fatal.is_tripped() {
            return Err(Error::Fatal("a panic escaped a request handler".to_string()));
        }

        tracing::info!("Server shutdown complete");
        Ok(())
    }

    fn log_middleware_config(&self) {
        let settings = &self.config.middleware;
        tracing::info!("Middleware configuration:");
        tracing::info!("  - Environment: {}", self.config.mode());
        tracing::info!("  - Panic recovery: {}", settings.catch_panic);
        tracing::info!("  - Request body limit: {} KB", settings.body_limit_kb);
        tracing::info!("  - Compression: {}", settings.compression);
        tracing::info!(
            "  - Security headers: {}",
            settings.security_headers.enabled
        );
        if settings.allowed_origins.is_empty() {
            tracing::info!("  - CORS: permissive");
        } else {
            tracing::info!("  - CORS origins: {}", settings.allowed_origins.join(", "));
        }
        tracing::info!(
            "  - Request timeout: {} seconds",
            self.config.service.timeout_secs
        );
    }

    /// Allow-listed origins with credentials, or permissive without a list
    fn build_cors_layer(&self) -> CorsLayer {
        let configured = &self.config.middleware.allowed_origins;
        if configured.is_empty() {
            tracing::debug!("Enabling permissive CORS");
            return CorsLayer::permissive();
        }

        let origins: Vec<HeaderValue> = configured
            .iter()
            .filter_map(|origin| match HeaderValue::from_str(origin) {
                Ok(value) => Some(value),
                Err(_) => {
                    tracing::warn!("Ignoring invalid CORS origin: {}", origin);
                    None
                }
            })
            .collect();

        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_credentials(true)
            .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
    }
}

/// Wait for SIGINT, SIGTERM or a tripped [`FatalSignal`]
async fn shutdown_signal(fatal: FatalSignal) {
    let ctrl_c = async {
        if let Err(error) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", error);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(error) => {
                tracing::error!("Failed to install SIGTERM handler: {}", error);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl+C), starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        },
        _ = fatal.tripped() => {
            tracing::info!("Fatal signal tripped, starting graceful shutdown");
        },
    }

    tracing::info!("Shutdown signal received, draining requests...");
}
