//! Discussion-group moderation: spam removal and casual replies.
//!
//! Each inbound discussion message is classified by the generation service.
//! Spam is deleted and its author gets a DM; anything else gets a short
//! reply. Classifier failures count as not-spam.

use folio_core::generation::GenerationBackend;
use folio_core::telegram::{ChatId, IncomingMessage, Messenger, OutgoingMessage};

use crate::context::AppContext;

use super::sanitize::sanitize;

pub const SPAM_NOTICE: &str = "Your message in the discussion group was removed because it \
     looked like spam. If this was a mistake, please rephrase and try again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Spam,
    Ham,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModerationOutcome {
    Removed,
    Replied,
    Ignored,
}

pub fn classification_prompt(text: &str) -> String {
    format!(
        r#"You moderate the comments of a developer's portfolio channel.
Classify the following comment as spam (advertising, scams, links to unrelated
services, gibberish) or ham (anything else).
Answer with exactly one word: spam or ham.

Comment:
{}"#,
        text
    )
}

pub fn reply_prompt(owner_name: &str, text: &str) -> String {
    format!(
        r#"You are {}, replying to a comment under a post in your portfolio channel.
Write a short, friendly and casual reply (one or two sentences, an emoji is fine).

Comment:
{}

Reply:"#,
        owner_name, text
    )
}

/// First word of the model's answer decides; anything but `spam` is ham.
pub fn parse_verdict(label: &str) -> Verdict {
    let first = label
        .trim()
        .trim_matches(|c: char| !c.is_alphanumeric())
        .split(|c: char| !c.is_alphanumeric())
        .next()
        .unwrap_or("");
    if first.eq_ignore_ascii_case("spam") {
        Verdict::Spam
    } else {
        Verdict::Ham
    }
}

pub async fn classify(generator: &dyn GenerationBackend, text: &str) -> Verdict {
    match generator.generate(&classification_prompt(text)).await {
        Ok(Some(label)) => parse_verdict(&label),
        Ok(None) => Verdict::Ham,
        Err(e) => {
            tracing::warn!(error = %e, "Spam classification failed, treating as ham");
            Verdict::Ham
        }
    }
}

/// `None` on error or empty output: no reply is sent.
pub async fn generate_reply(
    generator: &dyn GenerationBackend,
    owner_name: &str,
    text: &str,
) -> Option<String> {
    match generator.generate(&reply_prompt(owner_name, text)).await {
        Ok(Some(reply)) if !reply.trim().is_empty() => Some(reply.trim().to_string()),
        Ok(_) => None,
        Err(e) => {
            tracing::warn!(error = %e, "Reply generation failed");
            None
        }
    }
}

/// Handle one message from the linked discussion group.
pub async fn moderate_message(
    ctx: &AppContext,
    messenger: &dyn Messenger,
    message: &IncomingMessage,
) -> ModerationOutcome {
    let text = match message.text.as_deref() {
        Some(t) if !t.trim().is_empty() => t,
        _ => return ModerationOutcome::Ignored,
    };
    let author = match &message.from {
        Some(user) if !user.is_bot => user,
        _ => return ModerationOutcome::Ignored,
    };

    let chat_id = ChatId::Id(message.chat.id);

    match classify(ctx.generator.as_ref(), text).await {
        Verdict::Spam => {
            if let Err(e) = messenger.delete_message(&chat_id, message.message_id).await {
                tracing::error!(
                    chat_id = message.chat.id,
                    message_id = message.message_id,
                    error = %e,
                    "Failed to delete spam"
                );
                return ModerationOutcome::Ignored;
            }
            tracing::info!(chat_id = message.chat.id, author = author.id, "Removed spam message");

            if let Err(e) = messenger
                .send_message(&OutgoingMessage::plain(author.id, SPAM_NOTICE))
                .await
            {
                // Users who never started the bot cannot be messaged.
                tracing::warn!(author = author.id, error = %e, "Failed to notify spam author");
            }
            ModerationOutcome::Removed
        }
        Verdict::Ham => {
            let reply = match generate_reply(
                ctx.generator.as_ref(),
                &ctx.config.rag.owner_name,
                text,
            )
            .await
            {
                Some(r) => r,
                None => return ModerationOutcome::Ignored,
            };

            let outgoing = OutgoingMessage::markdown(
                chat_id,
                sanitize(&reply, ctx.config.rag.max_message_chars),
            )
            .reply_to(message.message_id);

            match messenger.send_message(&outgoing).await {
                Ok(_) => ModerationOutcome::Replied,
                Err(e) => {
                    tracing::error!(
                        chat_id = message.chat.id,
                        error = %e,
                        "Failed to send discussion reply"
                    );
                    ModerationOutcome::Ignored
                }
            }
        }
    }
}
