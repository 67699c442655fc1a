use sipakerte::{
    AppState,
    auth,
    config::{AppConfig, Env},
    create_router,
    models::{NewUser, Role},
    repository::{PostgresRepository, RepositoryState},
    session::{self, SessionStore},
    storage::{S3StorageClient, StorageState},
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// How often the background sweeper evicts idle sessions.
const SWEEP_PERIOD: Duration = Duration::from_secs(60);

/// main
///
/// The asynchronous entry point for the application, responsible for initializing
/// all core components: Configuration, Logging, Database, Storage, Sessions, and
/// the HTTP Server.
#[tokio::main]
async fn main() {
    // 1. Configuration & Environment Loading (Fail-Fast)
    // Loads .env file settings before configuration can be read.
    dotenv::dotenv().ok();
    // AppConfig::load() implements the fail-fast principle for missing Production
    // secrets.
    let config = AppConfig::load();

    // 2. Logging Filter Setup
    // Sets the default log level. It prioritizes the RUST_LOG environment
    // variable, falling back to sensible defaults for local development.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "sipakerte=debug,tower_http=info,axum=trace".into());

    // 3. Initialize Logging based on Environment
    // The structured logging format is dynamically selected based on the APP_ENV.
    match config.env {
        Env::Local => {
            // LOCAL: Pretty print output for human readability during debugging.
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        Env::Production => {
            // PROD: JSON format output for ingestion by centralized log
            // aggregators. This is essential for monitoring.
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
    }

    tracing::info!("Application starting in {:?} mode", config.env);

    // 4. Database Initialization (Postgres)
    // Creates a connection pool to the Postgres instance defined in the
    // configuration.
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.db_url)
        .await
        .expect("FATAL: Failed to connect to Postgres. Check DATABASE_URL.");

    // Instantiate the Repository, wrapping it in an Arc for thread-safe sharing.
    let repo = Arc::new(PostgresRepository::new(pool)) as RepositoryState;

    // 5. Administrator Seed
    // The registration endpoint only ever creates WARGA accounts, so the first
    // administrator must exist before anyone can manage the registry.
    ensure_default_admin(&repo, &config).await;

    // 6. Storage Initialization (S3/MinIO)
    // Instantiates the S3-compatible client using credentials resolved by
    // AppConfig.
    let s3_client = S3StorageClient::new(
        &config.s3_endpoint,
        &config.s3_region,
        &config.s3_key,
        &config.s3_secret,
        &config.s3_bucket,
    )
    .await;

    // LOCAL-ONLY: Ensure the MinIO bucket is created if running locally.
    // This is a development convenience for the Dockerized setup.
    if config.env == Env::Local {
        use sipakerte::storage::StorageService;
        s3_client.ensure_bucket_exists().await;
    }

    // Instantiate the Storage State, ready to be shared.
    let storage = Arc::new(s3_client) as StorageState;

    // 7. Session Registry & Idle Sweeper
    // One store for both the route gate and the API auth extractor; the sweeper
    // task evicts sessions that sat idle past the configured span.
    let sessions = Arc::new(SessionStore::new(config.session_idle));
    // The sweeper runs for the life of the process; the handle is not joined.
    let _sweeper = session::spawn_sweeper(sessions.clone(), SWEEP_PERIOD);

    // 8. Unified State Assembly
    // Bundles all initialized dependencies into the shared AppState.
    let app_state = AppState {
        repo,
        storage,
        sessions,
        config,
    };

    // 9. Router and Server Startup
    let app = create_router(app_state);

    // Binds the TCP listener and initiates the HTTP server.
    let listener = TcpListener::bind("0.0.0.0:8000")
        .await
        .expect("FATAL: Failed to bind 0.0.0.0:8000");

    tracing::info!("HTTP server bound successfully.");
    tracing::info!("Listening on 0.0.0.0:8000");
    tracing::info!("API Documentation (Swagger UI) available at: http://localhost:8000/swagger-ui");

    // The long-running Axum server process.
    axum::serve(listener, app)
        .await
        .expect("FATAL: HTTP server terminated unexpectedly");
}

/// ensure_default_admin
///
/// Creates the seed administrator account when none exists yet, using the
/// credentials from AppConfig. Idempotent: a registry that already has an admin
/// is left untouched.
async fn ensure_default_admin(repo: &RepositoryState, config: &AppConfig) {
    if repo.has_admin().await {
        return;
    }

    let password_hash = auth::hash_password(&config.admin_password)
        .expect("FATAL: Failed to hash the seed admin password");

    match repo
        .create_user(NewUser {
            email: config.admin_email.clone(),
            password_hash,
            role: Role::Admin,
        })
        .await
    {
        Some(user) => tracing::info!(email = %user.email, "seeded administrator account"),
        // A concurrent seed (multi-instance start) losing the insert race is
        // fine; the admin exists either way.
        None => tracing::warn!("administrator seed skipped: email already registered"),
    }
}
