//! HTTP surface for the annotation pipeline: session management,
//! annotation submission, ICD-O-3 lookups, job control, and the prompt /
//! few-shot libraries, all behind one axum [`Router`].

mod error;
mod routes;
mod state;

use std::net::SocketAddr;

use anyhow::anyhow;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

pub use error::Error;
pub use state::AppState;

/// Configuration for serving the annotation API.
pub struct ServeConfig {
    /// The socket address (IP and port) the server will bind to.
    pub listen_address: SocketAddr,
    /// Shared application state (dictionary, engine, stores, job runtime).
    pub state: AppState,
    /// Allowed CORS origins; an empty list means permissive (any origin).
    pub cors_origins: Vec<String>,
    /// Cancellation token for graceful shutdown.
    pub shutdown_signal: CancellationToken,
    /// The version string to log on startup.
    pub version: String,
    /// Optional oneshot sender to send back the bound address (useful when
    /// port 0 was requested and the caller needs the one the OS picked).
    pub bound_addr_sender: Option<tokio::sync::oneshot::Sender<SocketAddr>>,
}

/// Starts and runs the annotation server with the provided configuration.
pub async fn serve(
    ServeConfig { listen_address, state, cors_origins, shutdown_signal, version, bound_addr_sender }: ServeConfig,
) -> anyhow::Result<()> {
    log::info!("annotator {version}");

    let app = routes::router().layer(TraceLayer::new_for_http()).layer(cors_layer(&cors_origins)).with_state(state);

    let listener = TcpListener::bind(listen_address).await.map_err(|e| anyhow!("failed to bind to {listen_address}: {e}"))?;

    if let Some(sender) = bound_addr_sender {
        sender.send(listener.local_addr()?).map_err(|_| anyhow!("failed to send back bound address"))?;
    }

    log::info!("listening on http://{listen_address}");

    // Run with graceful shutdown
    tokio::select! {
        result = axum::serve(listener, app.into_make_service()) => {
            result.map_err(|e| anyhow!("server error: {e}"))?;
        }
        _ = shutdown_signal.cancelled() => {
            log::info!("received shutdown signal, shutting down gracefully...");
        }
    }

    Ok(())
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() {
        return CorsLayer::permissive();
    }

    let parsed: Vec<_> = origins
        .iter()
        .filter_map(|origin| {
            origin.parse().inspect_err(|_| log::warn!("ignoring unparseable CORS origin: {origin}")).ok()
        })
        .collect();
    CorsLayer::new().allow_origin(AllowOrigin::list(parsed)).allow_methods(tower_http::cors::Any).allow_headers(tower_http::cors::Any)
}
