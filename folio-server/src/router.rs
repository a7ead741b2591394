use std::sync::OnceLock;

use folio_core::telegram::{IncomingMessage, ReplyKeyboard};
use regex::Regex;

use crate::context::AppContext;
use crate::subsystems::interaction::Sender;
use crate::subsystems::{rag, scheduler};

pub const HELP_TEXT: &str = "📋 Available commands:\n\n\
/start - Register and subscribe to portfolio updates\n\
/projects - Show all projects\n\
/help - Show this message\n\n\
Or just ask me anything about the portfolio!";

const WELCOME: &str =
    "Welcome! You are now subscribed to portfolio updates. Send /help to see what I can do.";
const ALREADY_REGISTERED: &str = "You are already registered!";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BotCommand {
    Start,
    Projects,
    Help,
    PostUpdate,
    Unknown(String),
    /// Free text, answered by the RAG pipeline.
    Ask(String),
}

/// What the bot sends back to the chat the message came from.
#[derive(Debug, Clone, PartialEq)]
pub struct BotReply {
    pub text: String,
    /// Text is already MarkdownV2-escaped.
    pub markdown: bool,
    pub keyboard: Option<ReplyKeyboard>,
}

impl BotReply {
    fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            markdown: false,
            keyboard: None,
        }
    }
}

fn command_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)^/([A-Za-z_]+)(?:@\w+)?(?:\s+(.*))?$").ok())
        .as_ref()
}

/// Parse message text. `/cmd@botname args` is accepted; blank text is `None`.
pub fn parse_command(text: &str) -> Option<BotCommand> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    let caps = match command_regex().and_then(|re| re.captures(text)) {
        Some(c) => c,
        None if text.starts_with('/') => return Some(BotCommand::Unknown(text.to_string())),
        None => return Some(BotCommand::Ask(text.to_string())),
    };

    let name = caps.get(1).map(|m| m.as_str().to_ascii_lowercase())?;
    Some(match name.as_str() {
        "start" => BotCommand::Start,
        "projects" => BotCommand::Projects,
        "help" => BotCommand::Help,
        "postupdate" => BotCommand::PostUpdate,
        _ => BotCommand::Unknown(name),
    })
}

/// Route one private/bot message to its handler.
pub async fn dispatch(ctx: &AppContext, message: &IncomingMessage) -> Option<BotReply> {
    let command = parse_command(message.text.as_deref()?)?;
    let user = message.from.as_ref()?;

    let reply = match command {
        BotCommand::Start => handle_start(ctx, user.id, &user.display_name()).await,
        BotCommand::Projects => handle_projects(ctx).await,
        BotCommand::Help => BotReply {
            keyboard: Some(ReplyKeyboard::single_column(["/start", "/projects", "/help"])),
            ..BotReply::plain(HELP_TEXT)
        },
        BotCommand::PostUpdate => handle_post_update(ctx, user.id).await,
        BotCommand::Unknown(name) => {
            tracing::debug!(command = %name, "Unknown bot command");
            BotReply::plain("Unknown command. Send /help to see what I can do.")
        }
        BotCommand::Ask(question) => {
            handle_question(ctx, user.id, &user.display_name(), &question).await
        }
    };
    Some(reply)
}

async fn handle_start(ctx: &AppContext, user_id: i64, username: &str) -> BotReply {
    let telegram_id = user_id.to_string();

    // Repeat /start is a read; only unknown users reach the insert.
    if let Ok(Some(existing)) = ctx.store.get_subscriber(&telegram_id).await {
        tracing::debug!(
            user_id = user_id,
            subscribed_at = %existing.subscribed_at,
            "Subscriber already registered"
        );
        return BotReply::plain(ALREADY_REGISTERED);
    }

    match ctx.store.register_subscriber(&telegram_id).await {
        Ok(registration) if registration.is_new() => {
            tracing::info!(user_id = user_id, username = %username, "New subscriber registered");
            BotReply::plain(WELCOME)
        }
        Ok(_) => BotReply::plain(ALREADY_REGISTERED),
        Err(e) => {
            tracing::error!(user_id = user_id, error = %e, "Failed to register subscriber");
            BotReply::plain("Registration failed. Please try again later.")
        }
    }
}

async fn handle_projects(ctx: &AppContext) -> BotReply {
    let projects = match ctx.store.list_projects().await {
        Ok(p) => p,
        Err(e) => {
            tracing::error!(error = %e, "Failed to list projects");
            return BotReply::plain("Could not load projects. Please try again later.");
        }
    };

    if projects.is_empty() {
        return BotReply::plain("No projects yet. Check back soon!");
    }

    let body = projects
        .iter()
        .map(|p| {
            format!(
                "• {}\n{}\n{}",
                p.title,
                p.description.as_deref().unwrap_or("No description"),
                p.project_url.as_deref().unwrap_or("No URL")
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    let text = format!("📁 Projects:\n\n{}", body);
    BotReply::plain(text.chars().take(ctx.config.rag.max_message_chars).collect::<String>())
}

async fn handle_post_update(ctx: &AppContext, user_id: i64) -> BotReply {
    if user_id != ctx.config.telegram.admin_user_id {
        tracing::warn!(user_id = user_id, "Unauthorized /postupdate attempt");
        return BotReply::plain("Only the admin can post updates! 😎");
    }

    match scheduler::trigger_sync(ctx).await {
        Ok(report) => match report.posted_repository {
            Some(repo) => {
                BotReply::plain(format!("Update from {} posted to the channel! 🔥", repo))
            }
            None => BotReply::plain("Projects synced, but nothing was posted."),
        },
        Err(e) => {
            tracing::error!(error = %e, "Manual sync failed");
            BotReply::plain(format!("Posting failed: {}. Try again later! 🚀", e))
        }
    }
}

async fn handle_question(
    ctx: &AppContext,
    user_id: i64,
    username: &str,
    question: &str,
) -> BotReply {
    match rag::ask(ctx, question, &Sender::telegram(user_id, username)).await {
        Ok(answer) => BotReply {
            text: answer.sanitized,
            markdown: true,
            keyboard: None,
        },
        Err(e) => {
            tracing::error!(user_id = user_id, error = %e, "RAG question failed");
            BotReply::plain(rag::UNAVAILABLE_MESSAGE)
        }
    }
}
