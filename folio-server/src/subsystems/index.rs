//! Ephemeral in-memory vector index, built per question.
//!
//! Brute-force cosine similarity over every document. Knowledge bases here
//! are a few hundred rows, so a linear scan is all we need.

use folio_core::embeddings::{EmbeddingBackend, EmbeddingError};

use super::knowledge::Document;

#[derive(Debug, Clone, PartialEq)]
pub struct ScoredDocument {
    pub document: Document,
    pub score: f32,
}

#[derive(Debug, Default)]
pub struct VectorIndex {
    entries: Vec<(Document, Vec<f32>)>,
}

impl VectorIndex {
    /// Embed every document and index it. An empty input builds an empty
    /// index without calling the backend.
    pub async fn build(
        documents: Vec<Document>,
        embedder: &dyn EmbeddingBackend,
    ) -> Result<Self, EmbeddingError> {
        if documents.is_empty() {
            return Ok(Self::default());
        }

        let texts: Vec<String> = documents.iter().map(|d| d.text.clone()).collect();
        let vectors = embedder.embed_documents(&texts).await?;
        if vectors.len() != documents.len() {
            return Err(EmbeddingError::BatchSizeMismatch {
                expected: documents.len(),
                actual: vectors.len(),
            });
        }

        Ok(Self {
            entries: documents.into_iter().zip(vectors).collect(),
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Top-`k` documents for `question`. Returns an empty result without
    /// embedding when `k == 0` or the index is empty.
    pub async fn retrieve(
        &self,
        question: &str,
        k: usize,
        embedder: &dyn EmbeddingBackend,
    ) -> Result<Vec<ScoredDocument>, EmbeddingError> {
        if k == 0 || self.is_empty() {
            return Ok(Vec::new());
        }
        let query = embedder.embed_query(question).await?;
        Ok(self.search(&query, k))
    }

    /// Rank by descending cosine similarity. The sort is stable, so ties keep
    /// insertion order.
    pub fn search(&self, query: &[f32], k: usize) -> Vec<ScoredDocument> {
        let mut scored: Vec<ScoredDocument> = self
            .entries
            .iter()
            .map(|(document, vector)| ScoredDocument {
                document: document.clone(),
                score: cosine_similarity(query, vector),
            })
            .collect();

        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(k);
        scored
    }
}

/// Cosine similarity; 0.0 for mismatched lengths or zero-norm vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }
    let score = dot / denom;
    if score.is_finite() {
        score
    } else {
        0.0
    }
}
