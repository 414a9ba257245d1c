//! English/Paiute dictionary: a REST API over words and sentences, and a
//! client library mirroring the front-end views.

#[cfg(feature = "client")]
pub mod client;
pub mod config;
pub mod controllers;
pub mod database;
pub mod error;
pub mod media;
pub mod models;
pub mod search;
pub mod server;
pub mod state;

use config::DictionaryConfig;
use database::DictionaryStore;
use state::AppState;

/// Opens the store named by `config` and serves until Ctrl-C.
pub async fn run(config: DictionaryConfig) -> anyhow::Result<()> {
    let addr = config.bind_addr().await?;
    let store = DictionaryStore::open(&config.database.path)?;
    let words = store.count::<models::Word>()?;
    let sentences = store.count::<models::Sentence>()?;
    tracing::info!(path = ?store.db_path, words, sentences, "dictionary store ready");
    let app_state = AppState::new(store, config.search);
    let app = server::router(app_state, config.server.cors_permissive);
    server::serve(app, addr).await?;
    Ok(())
}
