//! HTTP listener

use axum::Router;
use tokio::sync::broadcast;
use tracing::info;

/// Serve `app` until `shutdown` fires
pub async fn serve(
    port: u16,
    app: Router,
    mut shutdown: broadcast::Receiver<()>,
) -> anyhow::Result<()> {
    let addr = format!("0.0.0.0:{}", port);
    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
        })
        .await?;

    Ok(())
}
