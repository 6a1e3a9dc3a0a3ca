use std::cmp::Ordering;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;

use crate::config::SearchConfig;
use crate::embedding::Embedder;
use crate::error::AppResult;
use crate::store::{ChunkFilter, ChunkRecord, ChunkStore, DocumentStore};
use crate::vector::cosine_similarity;

const DEFAULT_LIMIT: usize = 5;

/// One ranked search hit. `full_content` is the source document's current
/// content; when the document cannot be re-fetched it degrades to the
/// matched chunk's own text.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    pub document_id: String,
    pub title: String,
    pub text_snippet: String,
    pub full_content: String,
    pub content_type: String,
    pub score: f64,
}

#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    /// Every query is scoped to this owner's chunks.
    pub owner_id: i64,
    pub content_type: Option<String>,
    pub limit: Option<usize>,
    pub threshold: Option<f64>,
}

/// Ranks an owner's chunks against an embedded query: score, threshold
/// filter, per-document dedup, then hydrate with current source content.
pub struct SearchEngine {
    documents: Arc<dyn DocumentStore>,
    chunks: Arc<dyn ChunkStore>,
    embedder: Arc<dyn Embedder>,
    config: SearchConfig,
}

struct ScoredChunk {
    chunk: ChunkRecord,
    score: f64,
}

impl SearchEngine {
    pub fn new(
        documents: Arc<dyn DocumentStore>,
        chunks: Arc<dyn ChunkStore>,
        embedder: Arc<dyn Embedder>,
        config: SearchConfig,
    ) -> Self {
        Self {
            documents,
            chunks,
            embedder,
            config,
        }
    }

    pub async fn query_search(
        &self,
        user_query: &str,
        options: SearchOptions,
    ) -> AppResult<Vec<SearchResult>> {
        let owner_id = options.owner_id;
        let limit = options.limit.unwrap_or(DEFAULT_LIMIT);
        let threshold = options
            .threshold
            .unwrap_or(self.config.similarity_threshold);

        eprintln!(
            "[search] query: \"{user_query}\" | owner: {owner_id} | threshold: {threshold}"
        );

        // 1. Convert the search string into a vector
        let query_vector = self.embedder.generate(user_query).await?;

        // 2. Retrieve stored chunks, scoped to owner and optionally to one
        //    content type. The full owner-scoped set is loaded each query.
        let stored = self
            .chunks
            .find_many(&ChunkFilter::for_owner(
                owner_id,
                options.content_type.as_deref(),
            ))
            .await?;
        eprintln!("[search] found {} chunks for owner {owner_id}", stored.len());

        // 3. Score every chunk; 4. strict threshold filter
        let qualifying: Vec<ScoredChunk> = stored
            .into_iter()
            .map(|chunk| {
                let score = cosine_similarity(&query_vector, &chunk.embedding);
                ScoredChunk { chunk, score }
            })
            .filter(|scored| scored.score > threshold)
            .collect();
        eprintln!(
            "[search] results after threshold filter: {}",
            qualifying.len()
        );

        // 5. Deduplicate by parent document, keeping the best chunk each
        let mut best_per_doc: HashMap<String, ScoredChunk> = HashMap::new();
        for scored in qualifying {
            match best_per_doc.entry(scored.chunk.parent_doc_id.clone()) {
                Entry::Occupied(mut entry) => {
                    if scored.score > entry.get().score {
                        entry.insert(scored);
                    }
                }
                Entry::Vacant(entry) => {
                    entry.insert(scored);
                }
            }
        }

        // 6. Rank and apply the limit AFTER deduplication, so it bounds
        //    distinct documents rather than raw chunk matches
        let mut ranked: Vec<ScoredChunk> = best_per_doc.into_values().collect();
        ranked.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        ranked.truncate(limit);

        // 7. Hydrate each hit with the document's current content
        let mut results = Vec::with_capacity(ranked.len());
        for scored in ranked {
            results.push(self.hydrate(scored).await);
        }

        eprintln!("[search] unique documents returned: {}", results.len());
        Ok(results)
    }

    /// Re-fetch the source document for its current content. Both an absent
    /// document and a store failure degrade to the chunk's own text; the
    /// two are logged as distinct events.
    async fn hydrate(&self, scored: ScoredChunk) -> SearchResult {
        let chunk = scored.chunk;
        let document = match self
            .documents
            .find(&chunk.parent_type, &chunk.parent_doc_id)
            .await
        {
            Ok(Some(document)) => Some(document),
            Ok(None) => {
                eprintln!(
                    "[search] document {} not found; using chunk text as fallback",
                    chunk.parent_doc_id
                );
                None
            }
            Err(e) => {
                eprintln!(
                    "[search] error fetching document {}: {e}; using chunk text as fallback",
                    chunk.parent_doc_id
                );
                None
            }
        };

        let title = chunk
            .title_reference
            .clone()
            .filter(|t| !t.is_empty())
            .or_else(|| {
                document
                    .as_ref()
                    .and_then(|d| d.get("title"))
                    .and_then(|v| v.as_str())
                    .map(str::to_string)
            })
            .unwrap_or_else(|| "Untitled".to_string());

        let full_content = document
            .as_ref()
            .and_then(|d| d.get("content"))
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| chunk.content.clone());

        SearchResult {
            document_id: chunk.parent_doc_id,
            title,
            text_snippet: chunk.content,
            full_content,
            content_type: chunk.parent_type,
            score: scored.score,
        }
    }
}
