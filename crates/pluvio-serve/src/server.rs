use crate::api::router;
use crate::error::ServeResult;
use crate::predictor::Predictor;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

/// Serve `predictor` on `address` until interrupted.
pub async fn serve(address: SocketAddr, predictor: Predictor) -> ServeResult<()> {
    let listener = tokio::net::TcpListener::bind(address).await?;
    info!(
        address = %listener.local_addr()?,
        model = %predictor.model_name(),
        version = predictor.version().version,
        "Prediction service listening"
    );

    axum::serve(listener, router(Arc::new(predictor))).with_graceful_shutdown(shutdown_signal()).await?;

    info!("Prediction service stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
