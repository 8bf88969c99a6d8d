use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;

use threadboard_auth::session::ssr::create_db_pool;
use threadboard_core::memory::MemoryStore;
use threadboard_core::notification::NotificationBus;
use threadboard_core::state::ForumState;
use threadboard_core::store::ssr::PgStore;
use threadboard_core::store::ContentStore;

use crate::config::ServerConfig;
use crate::routes::create_router;

mod config;
mod routes;

async fn create_store(config: &ServerConfig) -> anyhow::Result<Arc<dyn ContentStore>> {
    match &config.db_url {
        Some(db_url) => {
            let pool = create_db_pool(db_url, config.db_max_connections).await?;
            sqlx::migrate!("../migrations/").run(&pool).await?;
            log::info!("Connected to database, migrations are up to date.");
            Ok(Arc::new(PgStore::new(pool)))
        },
        None => Ok(Arc::new(MemoryStore::new(config.target_lock_cache_size))),
    }
}

/// Logs every notification published on the bus until it is closed.
fn spawn_notification_logger(notification_bus: &NotificationBus) {
    let mut receiver = notification_bus.subscribe();
    tokio::spawn(async move {
        loop {
            match receiver.recv().await {
                Ok(notification) => log::info!("Notification: {notification:?}"),
                Err(RecvError::Lagged(skipped_count)) => log::warn!("Notification logger skipped {skipped_count} notifications."),
                Err(RecvError::Closed) => break,
            }
        }
    });
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServerConfig::from_env();
    simple_logger::init_with_level(config.log_level)?;

    let subscriber = tracing_subscriber::fmt().with_max_level(tracing::Level::ERROR).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let store = create_store(&config).await?;
    let notification_bus = NotificationBus::default();
    spawn_notification_logger(&notification_bus);

    let app = create_router(ForumState::new(store, notification_bus));

    log::info!("listening on http://{}", &config.site_addr);
    let listener = tokio::net::TcpListener::bind(&config.site_addr).await?;
    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}
