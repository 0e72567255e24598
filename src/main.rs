use std::sync::Arc;

use log::*;

mod api_models;
mod config;
mod error;
mod models;
mod routes;
mod stats;
mod store;
mod sweeper;
mod tally;
mod votes;

use crate::config::Settings;
use crate::store::{MemoryStore, PostgresStore, Store};
use crate::sweeper::Sweeper;

/**
 * Struct for carrying application state into tide request handlers
 */
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    /**
     * Upper bound on answers tallied at the same time for one poll
     */
    pub tally_concurrency: usize,
}

/**
 * Pick the store based on the settings
 */
async fn create_store(settings: &Settings) -> error::Result<Arc<dyn Store>> {
    match &settings.database_url {
        Some(url) => {
            let store = PostgresStore::connect(url, settings.pool_size).await?;
            Ok(Arc::new(store))
        }
        None => {
            warn!("DATABASE_URL is not set, polls will only be kept in memory!");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

#[async_std::main]
async fn main() -> Result<(), std::io::Error> {
    pretty_env_logger::init();

    let settings = Settings::from_env()
        .map_err(|err| std::io::Error::new(std::io::ErrorKind::InvalidInput, err))?;
    debug!(
        "Sweep interval: {:?}, tally concurrency: {}",
        settings.sweep_interval, settings.tally_concurrency
    );

    match create_store(&settings).await {
        Ok(store) => {
            let sweeper = settings
                .sweep_interval
                .map(|interval| Sweeper::spawn(store.clone(), interval));

            let state = AppState {
                store,
                tally_concurrency: settings.tally_concurrency,
            };
            let app = routes::build(state);
            info!("Listening on {}", settings.listen_addr);
            let served = app.listen(settings.listen_addr.clone()).await;

            if let Some(sweeper) = sweeper {
                sweeper.stop().await;
            }
            served
        }
        Err(err) => {
            error!("Could not initialize store! {:?}", err);
            Err(std::io::Error::new(std::io::ErrorKind::Other, err))
        }
    }
}
