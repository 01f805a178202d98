use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

mod config;
mod events;
mod fields;
mod matching;
mod models;
mod routes;
mod schema;
mod services;

use config::AppConfig;
use fields::FieldRegistry;
use tandem_shared::clients::db::create_pool;
use tandem_shared::clients::rabbitmq::RabbitMQClient;
use tandem_shared::clients::redis::RedisClient;

pub use tandem_shared::clients::db::DbPool;

pub struct AppState {
    pub db: DbPool,
    pub config: AppConfig,
    pub rabbitmq: RabbitMQClient,
    pub redis: RedisClient,
    pub registry: FieldRegistry,
    pub http: reqwest::Client,
    pub metrics_handle: metrics_exporter_prometheus::PrometheusHandle,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tandem_shared::middleware::init_tracing("tandem-user");

    let config = AppConfig::load()?;
    let port = config.port;

    // Set JWT_SECRET env var for the auth extractor middleware
    std::env::set_var("JWT_SECRET", &config.jwt_secret);

    // A broken field catalog must stop the service here, never surface as
    // per-request validation noise.
    let registry = FieldRegistry::load_from_path(&config.field_catalog_path)?;

    let db = create_pool(&config.database_url);
    let rabbitmq = RabbitMQClient::connect(&config.rabbitmq_url).await?;
    let redis = RedisClient::connect(&config.redis_url).await?;

    let http = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(10))
        .build()?;

    let metrics_handle = tandem_shared::middleware::init_metrics();

    let state = Arc::new(AppState {
        db,
        config,
        rabbitmq,
        redis,
        registry,
        http,
        metrics_handle,
    });

    // Spawn RabbitMQ subscribers for account events
    let registered_state = state.clone();
    tokio::spawn(async move {
        if let Err(e) = events::subscriber::listen_user_registered(registered_state).await {
            tracing::error!(error = %e, "user.registered subscriber failed");
        }
    });

    let login_state = state.clone();
    tokio::spawn(async move {
        if let Err(e) = events::subscriber::listen_user_logins(login_state).await {
            tracing::error!(error = %e, "user.logged_in subscriber failed");
        }
    });

    let app = Router::new()
        .route("/health", get(routes::health::health_check))
        .route("/metrics", get(routes::health::metrics))
        .route("/me", get(routes::profile::get_profile).patch(routes::profile::update_profile))
        .route("/profiles/:id", get(routes::profile::get_public_profile))
        .route("/fields", get(routes::fields::list_fields))
        .route("/search", get(routes::search::search_profiles))
        .route("/reactions", post(routes::reactions::send_reaction))
        .route("/reactions/check/:target_id", get(routes::reactions::check_reaction))
        .route("/suggestions", get(routes::suggestions::get_suggestions))
        .route("/export/profiles.csv", get(routes::export::export_profiles))
        .layer(axum::middleware::from_fn(
            tandem_shared::middleware::metrics_middleware,
        ))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = format!("0.0.0.0:{port}");
    tracing::info!(addr = %addr, "tandem-user starting");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
