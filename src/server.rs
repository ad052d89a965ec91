use crate::backend::BackendClient;
use crate::config::Config;
use crate::cors::cors;
use crate::engine::ReasoningEngine;
use crate::error::GatewayError;
use crate::protocol::HealthResponse;
use crate::relay;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::header::CONTENT_TYPE;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{middleware, Json, Router};
use axum_server::tls_rustls::RustlsConfig;
use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

pub struct ServerState {
    pub(crate) config: Arc<Config>,
    pub(crate) engine: Arc<dyn ReasoningEngine>,
    pub(crate) backend: BackendClient,
}

impl ServerState {
    pub fn new(
        config: Arc<Config>,
        backend: BackendClient,
        engine: Arc<dyn ReasoningEngine>,
    ) -> Self {
        Self {
            config,
            engine,
            backend,
        }
    }
}

type ServerResult<T> = Result<T, Box<dyn Error + Send + Sync>>;

pub fn router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route(
            "/chat",
            post(relay::chat).layer(DefaultBodyLimit::max(state.config.max_body_bytes)),
        )
        .route("/ppt/preview", get(preview))
        .route("/health", get(health))
        .layer(middleware::from_fn_with_state(state.clone(), cors))
        .with_state(state)
}

pub async fn run(state: Arc<ServerState>) -> ServerResult<()> {
    let config = Arc::clone(&state.config);
    let app = router(state);

    match config.tls() {
        Some((cert, key)) => {
            let tls = RustlsConfig::from_pem_file(cert, key).await?;
            let addr = tokio::net::lookup_host(config.listen_addr())
                .await?
                .next()
                .ok_or_else(|| format!("cannot resolve {}", config.listen_addr()))?;

            let handle = axum_server::Handle::new();
            let shutdown = handle.clone();
            tokio::spawn(async move {
                shutdown_signal().await;
                shutdown.graceful_shutdown(Some(SHUTDOWN_GRACE));
            });

            print_banner("https", &addr.to_string());
            axum_server::bind_rustls(addr, tls)
                .handle(handle)
                .serve(app.into_make_service())
                .await?;
        }
        None => {
            let listener = tokio::net::TcpListener::bind(config.listen_addr()).await?;
            print_banner("http", &listener.local_addr()?.to_string());
            axum::serve(listener, app)
                .with_graceful_shutdown(shutdown_signal())
                .await?;
        }
    }

    tracing::info!("gateway stopped");
    Ok(())
}

fn print_banner(scheme: &str, addr: &str) {
    println!("chat-gateway listening on {}://{}", scheme, addr);
    println!("  SSE endpoint: POST /chat");
    println!("  Health check: GET /health");
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse::ok())
}

/// Passes the backend's preview body and status through unchanged.
async fn preview(State(state): State<Arc<ServerState>>) -> Result<Response, GatewayError> {
    let upstream = state
        .backend
        .get(&state.config.preview_path)
        .await
        .inspect_err(|err| tracing::error!(error = %err, "preview request failed"))?;

    Ok((
        upstream.status,
        [(CONTENT_TYPE, "application/json")],
        upstream.body,
    )
        .into_response())
}
