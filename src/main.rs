use axum::{http::HeaderValue, routing::get, Router};
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use vanish::{
    clock::{Clock, SystemClock},
    config::Config,
    db,
    message::{
        start_retention_task, InMemoryMessageRepository, MessageRepository,
        PostgresMessageRepository,
    },
    room::{
        self,
        repository::{InMemoryRoomRepository, PostgresRoomRepository, RoomRepository},
    },
    shared::{AppError, AppState},
    websockets::websocket_handler,
};

type Stores = (
    Arc<dyn RoomRepository + Send + Sync>,
    Arc<dyn MessageRepository + Send + Sync>,
);

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let _ = dotenvy::dotenv();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vanish=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting vanish chat relay");

    let config = Config::from_env()?;
    let (room_repository, message_repository) = open_stores(&config).await?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let retention_max_age = config.room_ttl();
    let retention_interval = config.retention_interval;
    let cors = cors_layer(&config.allowed_origins);
    let bind_addr = config.bind_addr.clone();

    let app_state = AppState::new(
        config,
        room_repository,
        Arc::clone(&message_repository),
        Arc::clone(&clock),
    );

    tokio::spawn(app_state.sweeper().run());
    tokio::spawn(start_retention_task(
        message_repository,
        clock,
        retention_max_age,
        retention_interval,
    ));

    let app = Router::new()
        .route("/", get(room::root))
        .route("/health", get(room::health))
        .route("/room/:room_id/info", get(room::room_info))
        .route("/room/:room_id/history", get(room::room_history))
        .route("/ws/:room_id", get(websocket_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(app_state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("Server running on http://{}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

/// Postgres when DATABASE_URL is set, in-memory otherwise
async fn open_stores(config: &Config) -> Result<Stores, AppError> {
    let Some(database_url) = &config.database_url else {
        warn!("DATABASE_URL not set, using in-memory store");
        let room_repository: Arc<dyn RoomRepository + Send + Sync> =
            Arc::new(InMemoryRoomRepository::new());
        let message_repository: Arc<dyn MessageRepository + Send + Sync> =
            Arc::new(InMemoryMessageRepository::new());
        return Ok((room_repository, message_repository));
    };

    let pool = sqlx::PgPool::connect(database_url)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;
    db::ensure_schema(&pool).await?;
    info!("Using PostgreSQL store");

    let room_repository: Arc<dyn RoomRepository + Send + Sync> =
        Arc::new(PostgresRoomRepository::new(pool.clone()));
    let message_repository: Arc<dyn MessageRepository + Send + Sync> =
        Arc::new(PostgresMessageRepository::new(pool));
    Ok((room_repository, message_repository))
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(Any)
        .allow_headers(Any)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
