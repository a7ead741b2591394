//! Best-effort persistence of answered questions.

use chrono::Utc;
use folio_core::error::FolioResult;
use folio_core::models::{NewMessage, NewMlPrediction};
use folio_core::store::RecordStore;

/// Who asked, as recorded on the `messages` row.
#[derive(Debug, Clone, PartialEq)]
pub struct Sender {
    pub name: String,
    pub contact: String,
    pub source: String,
}

impl Sender {
    /// Anonymous caller of the HTTP `/rag/ask` endpoint.
    pub fn http() -> Self {
        Self {
            name: "RAG User".to_string(),
            contact: "bot@portfolio.com".to_string(),
            source: "rag".to_string(),
        }
    }

    pub fn telegram(user_id: i64, display_name: &str) -> Self {
        let name = if display_name.trim().is_empty() {
            format!("telegram user {}", user_id)
        } else {
            display_name.to_string()
        };
        Self {
            name,
            contact: format!("telegram:{}", user_id),
            source: "telegram".to_string(),
        }
    }
}

/// Record the question as a message and the answer as a prediction linked to it.
///
/// Never fails: store errors are logged and swallowed so the caller still
/// gets its answer.
pub async fn log_interaction(
    store: &dyn RecordStore,
    sender: &Sender,
    question: &str,
    answer: &str,
) {
    if let Err(e) = try_log_interaction(store, sender, question, answer).await {
        tracing::warn!(
            source = %sender.source,
            error = %e,
            "Failed to log RAG interaction"
        );
    }
}

async fn try_log_interaction(
    store: &dyn RecordStore,
    sender: &Sender,
    question: &str,
    answer: &str,
) -> FolioResult<()> {
    let now = Utc::now();
    let message = store
        .create_message(&NewMessage {
            name: sender.name.clone(),
            email: sender.contact.clone(),
            message: question.to_string(),
            source: sender.source.clone(),
            date_sent: now,
        })
        .await?;

    let prediction = store
        .create_prediction(&NewMlPrediction {
            message_id: Some(message.id),
            input_text: question.to_string(),
            prediction: Some(answer.to_string()),
            created_at: now,
        })
        .await?;

    tracing::debug!(
        message_id = message.id,
        prediction_id = prediction.id,
        "Logged RAG interaction"
    );
    Ok(())
}
