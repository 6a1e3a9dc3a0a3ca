pub mod auth;
pub mod chunking;
pub mod config;
pub mod db;
pub mod embedding;
pub mod error;
pub mod indexer;
pub mod search;
pub mod server;
pub mod store;
pub mod vector;

pub use chunking::split_text;
pub use config::SearchConfig;
pub use db::Database;
pub use embedding::{Embedder, OpenRouterEmbedder};
pub use error::{AppError, AppResult};
pub use indexer::{IndexSummary, Indexer, RemoveSummary};
pub use search::{SearchEngine, SearchOptions, SearchResult};
pub use server::{build_router, start_server, AppState};
pub use store::{ChunkFilter, ChunkRecord, ChunkStore, DocumentStore, NewChunk};
pub use vector::{cosine_similarity, euclidean_distance};
