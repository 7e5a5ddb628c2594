use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use greenaudit_core::{LlmGateway, PageSource};
use greenaudit_extraction::{DocumentLoader, PdfiumPageSource};
use greenaudit_gateway::AnthropicGateway;
use greenaudit_reasoning::{AnalysisEngine, VerificationEngine};

mod handlers;
mod routes;
mod state;

use state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("greenaudit=info".parse()?))
        .init();

    let config = greenaudit_core::AppConfig::from_env();
    let host = config.server_host.clone();
    let port = config.server_port;

    let gateway: Arc<dyn LlmGateway> = Arc::new(AnthropicGateway::new(&config)?);
    let pages: Arc<dyn PageSource> = Arc::new(PdfiumPageSource::new()?);

    let loader = Arc::new(DocumentLoader::new(
        Arc::clone(&gateway),
        pages,
        config.extraction.clone(),
        &config.gateway,
    ));
    let analysis = Arc::new(AnalysisEngine::new(Arc::clone(&gateway), &config.gateway));
    let verification = Arc::new(VerificationEngine::new(
        gateway,
        config.verification.clone(),
        &config.gateway,
    ));

    let state = AppState {
        config,
        loader,
        analysis,
        verification,
        sessions: Arc::new(RwLock::new(HashMap::new())),
    };

    let app = routes::create_router()
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr = format!("{host}:{port}");
    tracing::info!("greenaudit server listening on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
