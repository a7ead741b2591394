//! Telegram long-polling loop.
//!
//! Updates are fetched with `getUpdates` and every message is handled in its
//! own task, so a slow RAG answer never holds up moderation or other chats.

use std::sync::Arc;
use std::time::Duration;

use folio_core::telegram::{ChatId, IncomingMessage, Messenger, OutgoingMessage};
use tokio::sync::broadcast;

use crate::context::AppContext;
use crate::router;
use crate::subsystems::moderation;

/// Pause after a failed poll before asking again.
const POLL_ERROR_BACKOFF: Duration = Duration::from_secs(5);

pub async fn run_bot_loop(
    ctx: Arc<AppContext>,
    messenger: Arc<dyn Messenger>,
    mut shutdown: broadcast::Receiver<()>,
) {
    let channel = ChatId::parse(&ctx.config.telegram.channel_id);
    match messenger.get_chat(&channel).await {
        Ok(chat) => {
            tracing::info!(channel = %channel, chat_id = chat.id, "Update channel reachable")
        }
        Err(e) => tracing::warn!(
            channel = %channel,
            error = %e,
            "Update channel not reachable, posts may fail"
        ),
    }

    let timeout = ctx.config.telegram.poll_timeout_seconds;
    let mut offset: Option<i64> = None;
    tracing::info!("Telegram bot polling started (timeout: {}s)", timeout);

    loop {
        tokio::select! {
            result = messenger.get_updates(offset, timeout) => {
                match result {
                    Ok(updates) => {
                        for update in updates {
                            offset = Some(update.update_id + 1);
                            if let Some(message) = update.message {
                                let ctx = ctx.clone();
                                let messenger = messenger.clone();
                                tokio::spawn(async move {
                                    handle_message(&ctx, messenger.as_ref(), &message).await;
                                });
                            }
                        }
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "getUpdates failed");
                        tokio::select! {
                            _ = tokio::time::sleep(POLL_ERROR_BACKOFF) => {}
                            _ = shutdown.recv() => break,
                        }
                    }
                }
            }
            _ = shutdown.recv() => {
                tracing::info!("Telegram bot shutting down...");
                break;
            }
        }
    }
}

/// Route one inbound message: discussion-group messages go to moderation,
/// private chats and explicit commands go to the command router.
pub async fn handle_message(
    ctx: &AppContext,
    messenger: &dyn Messenger,
    message: &IncomingMessage,
) {
    if ctx.config.telegram.discussion_chat_id == Some(message.chat.id) {
        let outcome = moderation::moderate_message(ctx, messenger, message).await;
        tracing::debug!(
            chat_id = message.chat.id,
            outcome = ?outcome,
            "Moderated discussion message"
        );
        return;
    }

    let is_private = message.chat.kind == "private";
    let is_command = message
        .text
        .as_deref()
        .map(|t| t.trim_start().starts_with('/'))
        .unwrap_or(false);
    if !is_private && !is_command {
        return;
    }

    let reply = match router::dispatch(ctx, message).await {
        Some(r) => r,
        None => return,
    };

    let chat_id = ChatId::Id(message.chat.id);
    let mut outgoing = if reply.markdown {
        OutgoingMessage::markdown(chat_id, reply.text)
    } else {
        OutgoingMessage::plain(chat_id, reply.text)
    };
    if let Some(keyboard) = reply.keyboard {
        outgoing = outgoing.with_keyboard(keyboard);
    }

    if let Err(e) = messenger.send_message(&outgoing).await {
        tracing::error!(chat_id = message.chat.id, error = %e, "Failed to send bot reply");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subsystems::testing::{harness, ScriptedGenerator};
    use folio_core::telegram::{Chat, User};

    fn message(chat_id: i64, kind: &str, text: &str) -> IncomingMessage {
        IncomingMessage {
            message_id: 9,
            from: Some(User {
                id: 42,
                is_bot: false,
                first_name: "Ada".to_string(),
                username: None,
            }),
            chat: Chat {
                id: chat_id,
                kind: kind.to_string(),
                title: None,
                username: None,
            },
            text: Some(text.to_string()),
        }
    }

    #[tokio::test]
    async fn test_private_command_gets_reply_in_same_chat() {
        let h = harness(ScriptedGenerator::replying("unused"));

        handle_message(&h.ctx, h.messenger.as_ref(), &message(42, "private", "/help")).await;

        let sent = h.messenger.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].chat_id, ChatId::Id(42));
        assert!(sent[0].reply_markup.is_some());
        assert!(sent[0].parse_mode.is_none());
    }

    #[tokio::test]
    async fn test_group_chatter_is_ignored() {
        let h = harness(ScriptedGenerator::replying("unused"));

        handle_message(&h.ctx, h.messenger.as_ref(), &message(-7, "group", "hello all")).await;

        assert!(h.messenger.sent().is_empty());
        assert!(h.generator.prompts().is_empty());
    }

    #[tokio::test]
    async fn test_discussion_messages_go_to_moderation() {
        let h = harness(ScriptedGenerator::replying("spam"));

        // The harness configures -500 as the discussion group.
        handle_message(&h.ctx, h.messenger.as_ref(), &message(-500, "supergroup", "buy now")).await;

        assert_eq!(h.messenger.deleted(), vec![(ChatId::Id(-500), 9)]);
    }

    #[tokio::test]
    async fn test_loop_stops_on_shutdown() {
        let h = harness(ScriptedGenerator::replying("unused"));
        let (tx, rx) = broadcast::channel(1);
        let ctx = Arc::new(h.ctx.clone());
        let messenger: Arc<dyn Messenger> = h.messenger.clone();

        let handle = tokio::spawn(run_bot_loop(ctx, messenger, rx));
        tokio::time::sleep(Duration::from_millis(50)).await;
        tx.send(()).unwrap();

        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
