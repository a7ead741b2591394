//! Answer generation from retrieved context.

use folio_core::generation::GenerationBackend;
use serde::Serialize;

use super::index::ScoredDocument;

/// Returned when the model answers with nothing.
pub const EMPTY_FALLBACK: &str = "I couldn't find anything to say about that. \
     Try asking about my projects, skills or experience!";

/// Returned when the generation service fails.
pub const ERROR_FALLBACK: &str =
    "Sorry, something went wrong while answering your question. Please try again later.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerKind {
    Generated,
    EmptyFallback,
    ErrorFallback,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedAnswer {
    pub text: String,
    pub kind: AnswerKind,
}

impl GeneratedAnswer {
    pub fn is_fallback(&self) -> bool {
        self.kind != AnswerKind::Generated
    }
}

/// Fill the assistant prompt. Context documents are separated by a blank line.
pub fn build_prompt(owner_name: &str, context: &[ScoredDocument], question: &str) -> String {
    let context = context
        .iter()
        .map(|d| d.document.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        r#"You are {owner}'s assistant for their portfolio.
Answer the question based on the provided context in a friendly and professional tone.

Instructions:
1. Only use facts from the context below
2. If the context does not cover the question, say so politely
3. Mention project names when they are relevant
4. Keep the answer concise

Context:
{context}

Question: {question}

Answer:"#,
        owner = owner_name,
        context = context,
        question = question
    )
}

/// Call the generation service, substituting canned text on empty output or error.
pub async fn generate_answer(generator: &dyn GenerationBackend, prompt: &str) -> GeneratedAnswer {
    match generator.generate(prompt).await {
        Ok(Some(text)) if !text.trim().is_empty() => GeneratedAnswer {
            text: text.trim().to_string(),
            kind: AnswerKind::Generated,
        },
        Ok(_) => {
            tracing::warn!(backend = generator.name(), "Generation returned no text");
            GeneratedAnswer {
                text: EMPTY_FALLBACK.to_string(),
                kind: AnswerKind::EmptyFallback,
            }
        }
        Err(e) => {
            tracing::error!(backend = generator.name(), error = %e, "Answer generation failed");
            GeneratedAnswer {
                text: ERROR_FALLBACK.to_string(),
                kind: AnswerKind::ErrorFallback,
            }
        }
    }
}
