use anyhow::Result;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use common::{
    cache::{RedisConfig, RedisPool},
    database::{DatabaseConfig, health_check, init_pool, run_migrations},
};
use web::{
    AppState,
    air_quality::{AirQualityClient, AirQualityConfig},
    classifier::{ClassifierConfig, ImageClassifier, OnnxScorer},
    config::ServerConfig,
    identity::IdentityGateway,
    oauth::{GoogleProvider, OAuthConfig},
    repositories::{MIGRATOR, PgBalanceStore},
    routes,
    session::SessionManager,
};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting web service");

    let server_config = ServerConfig::from_env()?;

    // Initialize database connection pool
    let db_config = DatabaseConfig::from_env()?;
    let pool = init_pool(&db_config).await?;

    if health_check(&pool).await? {
        info!("Database connection successful");
    } else {
        anyhow::bail!("Failed to connect to database");
    }

    run_migrations(&pool, &MIGRATOR).await?;

    // Initialize Redis for sessions
    let redis_config = RedisConfig::from_env()?;
    let redis_pool = RedisPool::new(&redis_config).await?;

    let sessions = SessionManager::new(
        Arc::new(redis_pool),
        server_config.session_ttl_seconds,
        server_config.session_cookie_secure,
    );

    let provider = GoogleProvider::new(OAuthConfig::google_from_env()?)?;

    // The model is loaded once and shared by every request
    let classifier_config = ClassifierConfig::from_env()?;
    let scorer = OnnxScorer::load(&classifier_config.model_path)?;

    let air_quality = AirQualityClient::new(AirQualityConfig::from_env()?)?;

    tokio::fs::create_dir_all(&server_config.upload_dir).await?;

    let app_state = AppState {
        accounts: Arc::new(PgBalanceStore::new(pool)),
        air_quality,
        classifier: ImageClassifier::new(Arc::new(scorer)),
        identity: IdentityGateway::new(Arc::new(provider), sessions),
        cookie_key: server_config.cookie_key()?,
        upload_dir: server_config.upload_dir.clone(),
    };

    let app = routes::create_router(app_state, server_config.body_limit_bytes());

    let listener = TcpListener::bind(&server_config.bind_address).await?;
    info!("Web service listening on {}", server_config.bind_address);

    axum::serve(listener, app).await?;

    Ok(())
}
