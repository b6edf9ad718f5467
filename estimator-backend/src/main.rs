use anyhow::Context;
use estimator_backend::{create_app, AppState};
use inference_client::InferenceClient;
use room_estimator::{AnalyzerConfig, RoomAnalyzer};
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    info!("Starting room estimator backend");

    let config = AnalyzerConfig::from_env().context("Failed to load analyzer config")?;
    let collaborators = InferenceClient::from_env()?.into_collaborators();
    let analyzer = RoomAnalyzer::new(collaborators, config)?;

    let app = create_app(Arc::new(AppState::new(analyzer)));

    let addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Server listening on {}", addr);

    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}
