use std::sync::Arc;

use serde::Serialize;

use crate::chunking::split_text;
use crate::config::SearchConfig;
use crate::embedding::Embedder;
use crate::error::{AppError, AppResult};
use crate::store::{ChunkFilter, ChunkStore, DocumentStore, NewChunk};

/// Outcome of an indexing call.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexSummary {
    pub success: bool,
    pub document_id: String,
    pub content_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<String>>,
    pub chunks_created: usize,
}

/// Outcome of removing a document from the index.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveSummary {
    pub success: bool,
    pub document_id: String,
    pub chunks_removed: u64,
}

/// Builds the chunk index: fetch source document, clear prior chunks,
/// chunk the text, embed each chunk, persist the records.
///
/// Re-indexing is a full replace per `(document, content type)` pair. The
/// delete runs before re-chunking, so a failure partway through leaves the
/// document under-indexed until the next successful run; there is no
/// rollback across the delete-then-reinsert step. Concurrent re-indexing of
/// the same document relies on the store's own write ordering.
pub struct Indexer {
    documents: Arc<dyn DocumentStore>,
    chunks: Arc<dyn ChunkStore>,
    embedder: Arc<dyn Embedder>,
    config: SearchConfig,
}

impl Indexer {
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

    /// Index a single text field of a document. `title_field` defaults to
    /// `"title"`; its value is snapshotted onto every chunk.
    pub async fn index_document(
        &self,
        content_type: &str,
        document_id: &str,
        field: &str,
        title_field: Option<&str>,
        owner_id: i64,
    ) -> AppResult<IndexSummary> {
        let result = self
            .index_fields_inner(content_type, document_id, &[field], title_field, owner_id)
            .await;
        match result {
            Ok(chunks_created) => {
                eprintln!(
                    "[indexer] indexed {chunks_created} chunks for {content_type}:{document_id}"
                );
                Ok(IndexSummary {
                    success: true,
                    document_id: document_id.to_string(),
                    content_type: content_type.to_string(),
                    fields: None,
                    chunks_created,
                })
            }
            Err(e) => {
                eprintln!("[indexer] indexing failed for {content_type}:{document_id}: {e}");
                Err(e)
            }
        }
    }

    /// Index several fields of a document as one concatenated text body.
    pub async fn index_document_fields(
        &self,
        content_type: &str,
        document_id: &str,
        fields: &[String],
        title_field: Option<&str>,
        owner_id: i64,
    ) -> AppResult<IndexSummary> {
        let field_refs: Vec<&str> = fields.iter().map(String::as_str).collect();
        let result = self
            .index_fields_inner(content_type, document_id, &field_refs, title_field, owner_id)
            .await;
        match result {
            Ok(chunks_created) => {
                eprintln!(
                    "[indexer] indexed {chunks_created} chunks for {content_type}:{document_id}"
                );
                Ok(IndexSummary {
                    success: true,
                    document_id: document_id.to_string(),
                    content_type: content_type.to_string(),
                    fields: Some(fields.to_vec()),
                    chunks_created,
                })
            }
            Err(e) => {
                eprintln!("[indexer] indexing failed for {content_type}:{document_id}: {e}");
                Err(e)
            }
        }
    }

    /// Remove every chunk derived from `document_id`, regardless of content
    /// type. Idempotent: removing an unindexed document reports 0 removed.
    pub async fn remove_document(&self, document_id: &str) -> AppResult<RemoveSummary> {
        let chunks_removed = self
            .chunks
            .delete_many(&ChunkFilter::for_document_any_type(document_id))
            .await?;
        eprintln!("[indexer] removed {chunks_removed} chunks for document {document_id}");
        Ok(RemoveSummary {
            success: true,
            document_id: document_id.to_string(),
            chunks_removed,
        })
    }

    async fn index_fields_inner(
        &self,
        content_type: &str,
        document_id: &str,
        fields: &[&str],
        title_field: Option<&str>,
        owner_id: i64,
    ) -> AppResult<usize> {
        let document = self
            .documents
            .find(content_type, document_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!(
                    "document {document_id} not found in {content_type}"
                ))
            })?;

        // Combine field contents, skipping empty/missing fields
        let text = fields
            .iter()
            .filter_map(|field| document.get(field).and_then(|v| v.as_str()))
            .filter(|text| !text.is_empty())
            .collect::<Vec<_>>()
            .join(" ");

        if text.trim().is_empty() {
            return Err(AppError::Validation(if fields.len() == 1 {
                format!(
                    "field \"{}\" is empty or does not exist on document {document_id}",
                    fields[0]
                )
            } else {
                format!(
                    "no content found in fields [{}] for document {document_id}",
                    fields.join(", ")
                )
            }));
        }

        // Full replace: clear old chunks before re-chunking
        self.chunks
            .delete_many(&ChunkFilter::for_document(document_id, content_type))
            .await?;

        let title_field = title_field.unwrap_or("title");
        let title = document
            .get(title_field)
            .and_then(|v| v.as_str())
            .filter(|t| !t.is_empty())
            .unwrap_or("Untitled")
            .to_string();

        let text_chunks = split_text(&text, self.config.chunk_size, self.config.chunk_overlap);

        // Strictly sequential: one provider call in flight at a time
        let mut created = 0usize;
        for chunk_text in text_chunks {
            let vector = self.embedder.generate(&chunk_text).await?;
            self.chunks
                .create(NewChunk {
                    content: chunk_text,
                    embedding: vector,
                    parent_doc_id: document_id.to_string(),
                    parent_type: content_type.to_string(),
                    title_reference: Some(title.clone()),
                    owner: owner_id,
                })
                .await?;
            created += 1;
        }

        Ok(created)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use crate::store::memory::{MemoryChunkStore, MemoryDocumentStore};

    struct FakeEmbedder;

    #[async_trait]
    impl Embedder for FakeEmbedder {
        async fn generate(&self, text: &str) -> AppResult<Vec<f32>> {
            Ok(vec![text.len() as f32, 1.0, 0.0])
        }
    }

    /// Fails after a fixed number of successful calls.
    struct FlakyEmbedder {
        allow: std::sync::atomic::AtomicUsize,
    }

    #[async_trait]
    impl Embedder for FlakyEmbedder {
        async fn generate(&self, _text: &str) -> AppResult<Vec<f32>> {
            use std::sync::atomic::Ordering;
            if self.allow.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                Ok(vec![1.0, 0.0])
            } else {
                Err(AppError::Provider("embedding provider down".into()))
            }
        }
    }

    fn setup(embedder: Arc<dyn Embedder>) -> (Arc<MemoryDocumentStore>, Arc<MemoryChunkStore>, Indexer) {
        let documents = Arc::new(MemoryDocumentStore::new());
        let chunks = Arc::new(MemoryChunkStore::new());
        let config = SearchConfig {
            api_key: "sk-test".into(),
            ..SearchConfig::default()
        };
        let indexer = Indexer::new(documents.clone(), chunks.clone(), embedder, config);
        (documents, chunks, indexer)
    }

    #[tokio::test]
    async fn test_index_document_creates_owned_chunks() {
        let (documents, chunks, indexer) = setup(Arc::new(FakeEmbedder));
        documents.insert(
            "article",
            "d1",
            serde_json::json!({
                "title": "Mammals",
                "content": "Cats are mammals. Dogs are mammals too.",
            }),
        );

        let summary = indexer
            .index_document("article", "d1", "content", None, 7)
            .await
            .unwrap();
        assert!(summary.success);
        assert_eq!(summary.chunks_created, 1);
        assert_eq!(summary.document_id, "d1");
        assert_eq!(summary.content_type, "article");

        let stored = chunks.find_many(&ChunkFilter::default()).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].owner, 7);
        assert_eq!(stored[0].parent_doc_id, "d1");
        assert_eq!(stored[0].parent_type, "article");
        assert_eq!(stored[0].title_reference.as_deref(), Some("Mammals"));
        assert_eq!(stored[0].content, "Cats are mammals. Dogs are mammals too.");
    }

    #[tokio::test]
    async fn test_index_document_missing_document() {
        let (_documents, _chunks, indexer) = setup(Arc::new(FakeEmbedder));
        let err = indexer
            .index_document("article", "ghost", "content", None, 7)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_index_document_empty_field_has_no_side_effects() {
        let (documents, chunks, indexer) = setup(Arc::new(FakeEmbedder));
        documents.insert("article", "d1", serde_json::json!({"content": "Some text."}));
        indexer
            .index_document("article", "d1", "content", None, 7)
            .await
            .unwrap();

        // Re-index against a now-empty field: validation must fire before
        // the old chunks are cleared
        documents.insert("article", "d1", serde_json::json!({"content": ""}));
        let err = indexer
            .index_document("article", "d1", "content", None, 7)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let stored = chunks.find_many(&ChunkFilter::default()).await.unwrap();
        assert_eq!(stored.len(), 1, "existing chunks must survive a rejected re-index");
    }

    #[tokio::test]
    async fn test_reindex_replaces_chunks() {
        let (documents, chunks, indexer) = setup(Arc::new(FakeEmbedder));
        documents.insert("article", "d1", serde_json::json!({"content": "First version."}));
        indexer
            .index_document("article", "d1", "content", None, 7)
            .await
            .unwrap();
        let first = chunks.find_many(&ChunkFilter::default()).await.unwrap();

        documents.insert("article", "d1", serde_json::json!({"content": "Second version."}));
        indexer
            .index_document("article", "d1", "content", None, 7)
            .await
            .unwrap();
        let second = chunks.find_many(&ChunkFilter::default()).await.unwrap();

        assert_eq!(second.len(), 1);
        assert_ne!(second[0].id, first[0].id);
        assert_eq!(second[0].content, "Second version.");
    }

    #[tokio::test]
    async fn test_title_falls_back_to_untitled() {
        let (documents, chunks, indexer) = setup(Arc::new(FakeEmbedder));
        documents.insert("article", "d1", serde_json::json!({"content": "Body text."}));
        indexer
            .index_document("article", "d1", "content", None, 7)
            .await
            .unwrap();

        let stored = chunks.find_many(&ChunkFilter::default()).await.unwrap();
        assert_eq!(stored[0].title_reference.as_deref(), Some("Untitled"));
    }

    #[tokio::test]
    async fn test_custom_title_field() {
        let (documents, chunks, indexer) = setup(Arc::new(FakeEmbedder));
        documents.insert(
            "article",
            "d1",
            serde_json::json!({"content": "Body.", "headline": "Big News"}),
        );
        indexer
            .index_document("article", "d1", "content", Some("headline"), 7)
            .await
            .unwrap();

        let stored = chunks.find_many(&ChunkFilter::default()).await.unwrap();
        assert_eq!(stored[0].title_reference.as_deref(), Some("Big News"));
    }

    #[tokio::test]
    async fn test_index_document_fields_concatenates() {
        let (documents, chunks, indexer) = setup(Arc::new(FakeEmbedder));
        documents.insert(
            "article",
            "d1",
            serde_json::json!({
                "title": "T",
                "summary": "Short summary.",
                "body": "Longer body.",
                "empty": "",
            }),
        );

        let fields = vec!["summary".to_string(), "empty".to_string(), "body".to_string()];
        let summary = indexer
            .index_document_fields("article", "d1", &fields, None, 7)
            .await
            .unwrap();
        assert_eq!(summary.fields.as_deref(), Some(&fields[..]));
        assert_eq!(summary.chunks_created, 1);

        let stored = chunks.find_many(&ChunkFilter::default()).await.unwrap();
        assert_eq!(stored[0].content, "Short summary. Longer body.");
    }

    #[tokio::test]
    async fn test_index_document_fields_all_empty() {
        let (documents, _chunks, indexer) = setup(Arc::new(FakeEmbedder));
        documents.insert("article", "d1", serde_json::json!({"a": "", "title": "T"}));

        let fields = vec!["a".to_string(), "missing".to_string()];
        let err = indexer
            .index_document_fields("article", "d1", &fields, None, 7)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_provider_failure_aborts_and_leaves_under_indexed() {
        let (documents, chunks, indexer) = setup(Arc::new(FakeEmbedder));
        let long_text = "A sentence that repeats itself endlessly. ".repeat(40);
        documents.insert("article", "d1", serde_json::json!({"content": long_text}));
        indexer
            .index_document("article", "d1", "content", None, 7)
            .await
            .unwrap();
        let before = chunks.find_many(&ChunkFilter::default()).await.unwrap();
        assert!(before.len() > 1);

        // Re-index with an embedder that dies after one chunk: the old set
        // is already cleared and only the first new chunk lands
        let flaky = Arc::new(FlakyEmbedder {
            allow: std::sync::atomic::AtomicUsize::new(1),
        });
        let indexer = Indexer::new(
            documents.clone(),
            chunks.clone(),
            flaky,
            SearchConfig {
                api_key: "sk-test".into(),
                ..SearchConfig::default()
            },
        );
        let err = indexer
            .index_document("article", "d1", "content", None, 7)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Provider(_)));

        let after = chunks.find_many(&ChunkFilter::default()).await.unwrap();
        assert_eq!(after.len(), 1, "partial re-index is not rolled back");
    }

    #[tokio::test]
    async fn test_remove_document_is_idempotent() {
        let (documents, _chunks, indexer) = setup(Arc::new(FakeEmbedder));
        documents.insert("article", "d1", serde_json::json!({"content": "Text."}));
        indexer
            .index_document("article", "d1", "content", None, 7)
            .await
            .unwrap();

        let first = indexer.remove_document("d1").await.unwrap();
        assert_eq!(first.chunks_removed, 1);

        let second = indexer.remove_document("d1").await.unwrap();
        assert!(second.success);
        assert_eq!(second.chunks_removed, 0);
    }

    #[tokio::test]
    async fn test_remove_document_spans_content_types() {
        let (documents, chunks, indexer) = setup(Arc::new(FakeEmbedder));
        documents.insert("article", "d1", serde_json::json!({"content": "Article body."}));
        documents.insert("note", "d1", serde_json::json!({"content": "Note body."}));
        indexer
            .index_document("article", "d1", "content", None, 7)
            .await
            .unwrap();
        indexer
            .index_document("note", "d1", "content", None, 7)
            .await
            .unwrap();

        let removed = indexer.remove_document("d1").await.unwrap();
        assert_eq!(removed.chunks_removed, 2);
        assert!(chunks.find_many(&ChunkFilter::default()).await.unwrap().is_empty());
    }
}
