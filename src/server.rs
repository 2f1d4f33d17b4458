pub mod errors;
pub mod handlers;
pub mod session_cookie;
pub mod views;

pub use errors::AppError;

use std::sync::Arc;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
};
use color_eyre::eyre::{Context, Result};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::config::{Config, ServerConfig};
use crate::mid::{MidConnector, ResponseValidator};
use crate::service::{AuthenticationService, SignatureService};
use crate::session::{FlowSessions, SessionManager, SessionStore};

/// Shared state of the request handlers.
#[derive(Clone)]
pub struct AppState {
    pub authentication: AuthenticationService,
    pub signature: SignatureService,
    pub sessions: FlowSessions,
}

impl AppState {
    pub fn new(
        connector: Arc<dyn MidConnector>,
        store: Arc<dyn SessionStore>,
        validator: ResponseValidator,
        config: &Config,
    ) -> Self {
        let validator = Arc::new(validator);
        let manager = SessionManager::new(store)
            .with_expiry(time::Duration::minutes(config.session.expiry_minutes))
            .with_max_sessions(config.session.max_sessions);

        Self {
            authentication: AuthenticationService::new(
                connector.clone(),
                validator.clone(),
                &config.mid,
            ),
            signature: SignatureService::new(connector, validator, &config.mid),
            sessions: FlowSessions::new(manager),
        }
    }
}

pub struct Server {
    router: Router,
    listener: TcpListener,
}

impl Server {
    /// Builds the router and binds the listener.
    ///
    /// Binding to port 0 lets the OS pick a free port, see [`Server::port`].
    pub async fn new(state: AppState, config: &ServerConfig) -> Result<Self> {
        let trace_layer =
            TraceLayer::new_for_http().make_span_with(|request: &'_ axum::extract::Request<_>| {
                let uri = request.uri().to_string();
                tracing::info_span!("request", method = %request.method(), uri)
            });

        let flows = Router::new()
            .route("/", get(handlers::index))
            .route(
                "/authenticationRequest",
                post(handlers::authentication::authentication_request),
            )
            .route("/authenticate", post(handlers::authentication::authenticate))
            .route(
                "/signatureRequest",
                post(handlers::signature::signature_request),
            )
            .route("/sign", post(handlers::signature::sign))
            .layer(middleware::from_fn(session_cookie::browser_session));

        let router = Router::new()
            .merge(flows)
            .route("/health", get(handlers::health_check))
            .layer(DefaultBodyLimit::max(config.max_upload_bytes))
            .layer(trace_layer)
            .with_state(state);

        let addr = format!("{}:{}", config.host, config.port);
        let listener = TcpListener::bind(&addr)
            .await
            .wrap_err_with(|| format!("Failed to bind to {addr}"))?;

        Ok(Self { router, listener })
    }

    /// Returns the port the server is bound to.
    pub fn port(&self) -> Result<u16> {
        Ok(self
            .listener
            .local_addr()
            .wrap_err("Failed to read local address")?
            .port())
    }

    pub async fn run(self) -> Result<()> {
        let addr = self.listener.local_addr()?;
        tracing::info!("Listening on http://{addr}");
        axum::serve(self.listener, self.router)
            .await
            .wrap_err("Server error")
    }
}
