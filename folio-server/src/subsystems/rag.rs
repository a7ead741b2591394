//! RAG question answering.
//!
//! Per question: load every knowledge row, embed it into a fresh index,
//! retrieve the top-k documents, generate an answer, log the interaction and
//! sanitize the answer for Telegram. Nothing is cached between questions.

use folio_core::embeddings::EmbeddingError;
use folio_core::error::FolioError;
use thiserror::Error;

use crate::context::AppContext;

use super::answer::{build_prompt, generate_answer, GeneratedAnswer};
use super::index::{ScoredDocument, VectorIndex};
use super::interaction::{log_interaction, Sender};
use super::knowledge::load_documents;
use super::sanitize::sanitize;

/// Shown to users when the pipeline itself (not the model) fails.
pub const UNAVAILABLE_MESSAGE: &str =
    "The portfolio assistant is unavailable right now. Please try again later.";

#[derive(Error, Debug)]
pub enum RagError {
    #[error("question must not be empty")]
    EmptyQuestion,

    #[error("failed to load knowledge: {0}")]
    Knowledge(#[from] FolioError),

    #[error("failed to embed knowledge: {0}")]
    Embedding(#[from] EmbeddingError),
}

#[derive(Debug, Clone)]
pub struct RagAnswer {
    pub question: String,
    pub context: Vec<ScoredDocument>,
    pub answer: GeneratedAnswer,
    /// MarkdownV2-safe text, cut to `rag.max_message_chars`.
    pub sanitized: String,
}

pub async fn ask(ctx: &AppContext, question: &str, sender: &Sender) -> Result<RagAnswer, RagError> {
    let question = question.trim();
    if question.is_empty() {
        return Err(RagError::EmptyQuestion);
    }

    let start = std::time::Instant::now();
    let rag = &ctx.config.rag;

    let documents = load_documents(ctx.store.as_ref()).await?;
    let index = VectorIndex::build(documents, ctx.embedder.as_ref()).await?;
    let context = index
        .retrieve(question, rag.top_k, ctx.embedder.as_ref())
        .await?;

    let prompt = build_prompt(&rag.owner_name, &context, question);
    let answer = generate_answer(ctx.generator.as_ref(), &prompt).await;

    log_interaction(ctx.store.as_ref(), sender, question, &answer.text).await;

    let sanitized = sanitize(&answer.text, rag.max_message_chars);

    tracing::info!(
        source = %sender.source,
        indexed = index.len(),
        retrieved = context.len(),
        kind = ?answer.kind,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Answered RAG question"
    );

    Ok(RagAnswer {
        question: question.to_string(),
        context,
        answer,
        sanitized,
    })
}
