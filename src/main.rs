use std::sync::Arc;

use semantic_search::embedding::OpenRouterEmbedder;
use semantic_search::server::{start_server, AppState};
use semantic_search::store::sqlite::{SqliteChunkStore, SqliteDocumentStore};
use semantic_search::store::{ChunkStore, DocumentStore};
use semantic_search::{Database, Embedder, Indexer, SearchConfig, SearchEngine};

#[tokio::main]
async fn main() {
    let config = match SearchConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("[server] startup failed: {e}");
            std::process::exit(1);
        }
    };

    let db = match Database::init(&config.db_path) {
        Ok(db) => db,
        Err(e) => {
            eprintln!("[server] startup failed: {e}");
            std::process::exit(1);
        }
    };

    let embedder: Arc<dyn Embedder> = match OpenRouterEmbedder::new(&config) {
        Ok(embedder) => Arc::new(embedder),
        Err(e) => {
            eprintln!("[server] startup failed: {e}");
            std::process::exit(1);
        }
    };

    let documents: Arc<dyn DocumentStore> = Arc::new(SqliteDocumentStore::new(db.clone()));
    let chunks: Arc<dyn ChunkStore> = Arc::new(SqliteChunkStore::new(db.clone()));

    let indexer = Arc::new(Indexer::new(
        documents.clone(),
        chunks.clone(),
        embedder.clone(),
        config.clone(),
    ));
    let engine = Arc::new(SearchEngine::new(
        documents,
        chunks,
        embedder,
        config.clone(),
    ));

    let state = AppState {
        db,
        indexer,
        engine,
    };

    let shutdown = match start_server(state, config.port).await {
        Ok(tx) => tx,
        Err(e) => {
            eprintln!("[server] startup failed: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = tokio::signal::ctrl_c().await {
        eprintln!("[server] failed to listen for shutdown signal: {e}");
    }
    let _ = shutdown.send(());
}
