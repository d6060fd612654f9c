use dotenv::dotenv;
use listing_extractor::{
    api, config::Config, coordinator, validator, value, Extractor, ImageRelay, PageFetcher,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(api::extract, api::image_relay, api::health),
    components(
        schemas(
            api::ExtractRequest,
            api::ErrorResponse,
            api::RelayRejection,
            api::HealthResponse,
            coordinator::ExtractionResult,
            validator::ValidationReport,
            value::ListingData
        )
    ),
    tags(
        (name = "extraction", description = "Listing extraction"),
        (name = "images", description = "Listing photo relay"),
        (name = "health", description = "Liveness")
    )
)]
struct ApiDoc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt::init();

    let config = Config::from_env()?;
    tracing::info!(
        port = config.port,
        trusted_image_hosts = ?config.image_policy.hosts,
        "🔧 configuration loaded"
    );

    let fetcher = PageFetcher::new(&config.fetch)?;
    let extractor = Extractor::new(Arc::new(fetcher), config.schema.clone(), config.extractor.clone());
    let relay = ImageRelay::new(config.image_policy.clone(), config.relay_timeout)?
        .with_max_bytes(config.relay_max_bytes);
    let state = Arc::new(api::AppState { extractor, relay });

    let app = api::router(state)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http());

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("🚀 listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}
