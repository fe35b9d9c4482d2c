//! HTTP surface.
//!
//! A thin axum layer over [`crate::workflow`]: handlers translate form and
//! JSON input into workflow calls and wrap the outcome in the
//! `{success, message, data}` envelope.

pub mod response;
pub mod routes;
pub mod state;

pub use response::{ApiError, ApiResponse};
pub use routes::router;
pub use state::AppState;

use crate::error::PdfLayoutError;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{info, warn};

/// Bind `addr` and serve until Ctrl+C or SIGTERM.
///
/// The upload and output directories are created up front.
pub async fn serve(state: AppState, addr: SocketAddr) -> Result<(), PdfLayoutError> {
    let cfg = state.config();
    for dir in [&cfg.upload_dir, &cfg.output_dir] {
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| PdfLayoutError::io(dir, e))?;
    }

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| PdfLayoutError::Io {
            path: addr.to_string().into(),
            source: e,
        })?;
    info!(
        "Listening on http://{} (uploads: {}, results: {})",
        addr,
        cfg.upload_dir.display(),
        cfg.output_dir.display()
    );
    if !cfg.llm.is_configured() {
        warn!("No LLM API key configured; translation returns text unchanged");
    }
    if cfg.parser.token.is_none() {
        warn!("MINERU_TOKEN not set; parsing endpoints will fail");
    }

    axum::serve(listener, router(state.clone()))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| PdfLayoutError::Internal(format!("server error: {e}")))?;

    info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Could not listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("Could not listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
