use std::sync::Arc;

use mentor_server::config::Config;
use mentor_server::memory::MemoryStore;
use mentor_server::pg::PgStore;
use mentor_server::store::SharedStore;
use mentor_server::{app, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let config = Config::from_env();

    let store: SharedStore = match &config.database_url {
        Some(url) => {
            log::info!("Connecting to PostgreSQL");
            Arc::new(PgStore::connect(url).await?)
        }
        None => {
            log::warn!("DATABASE_URL is not set, keeping everything in memory");
            Arc::new(MemoryStore::new())
        }
    };

    let addr = config.bind_addr;
    let app = app(AppState::new(store, config));

    let listener = tokio::net::TcpListener::bind(addr).await?;
    log::info!("Starting mentor HTTP Server on http://{}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}
