//! Update scheduler: GitHub sync and channel auto-posting
//!
//! Every `scheduler.interval_seconds` (default 1h) a tick:
//! 1. lists the owner's GitHub repositories
//! 2. upserts one project per repository, keyed by URL, and tells every
//!    subscriber about newly created projects
//! 3. picks the most recently pushed repository and fetches its latest commits
//! 4. renders a promotional post (LLM, canned fallback) and sends it to the
//!    configured channel as MarkdownV2
//!
//! A failing step ends the tick early. There is no retry inside a tick; the
//! next tick is the retry.

use std::sync::Arc;

use folio_core::error::FolioError;
use folio_core::generation::GenerationBackend;
use folio_core::github::{Commit, GithubError, Repository};
use folio_core::models::{Project, ProjectSync, UpsertOutcome};
use folio_core::telegram::{ChatId, Messenger, OutgoingMessage, TelegramError};
use futures::stream::{self, StreamExt};
use thiserror::Error;
use tokio::sync::broadcast;

use crate::context::AppContext;

use super::sanitize::sanitize;

/// Description stored for repositories that have none.
pub const PLACEHOLDER_DESCRIPTION: &str = "A cool project, no description yet!";

/// Max concurrent subscriber notifications.
const NOTIFY_CONCURRENCY: usize = 8;

/// Commit messages in the fallback post are cut to this many characters.
const FALLBACK_MESSAGE_CHARS: usize = 30;

// ============================================================================
// PUBLIC API
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostKind {
    Generated,
    Fallback,
}

/// Report from one sync tick
#[derive(Debug, Clone, Default)]
pub struct SyncReport {
    pub repositories: usize,
    pub projects_created: usize,
    pub projects_updated: usize,
    pub subscribers_notified: usize,
    pub posted_repository: Option<String>,
    pub post_kind: Option<PostKind>,
}

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("GitHub request failed: {0}")]
    Github(#[from] GithubError),

    #[error("store operation failed: {0}")]
    Store(#[from] FolioError),

    #[error("no repositories found for {owner}")]
    NoRepositories { owner: String },

    #[error("no commits found in {repository}")]
    NoCommits { repository: String },

    #[error("failed to send channel post: {0}")]
    Telegram(#[from] TelegramError),
}

/// Called from the bot router on `/postupdate` (manual trigger).
pub async fn trigger_sync(ctx: &AppContext) -> Result<SyncReport, SyncError> {
    tracing::info!("Manual sync triggered");
    run_sync_tick(ctx).await
}

/// Called from main.rs to start the background sync loop.
pub async fn run_scheduler_loop(ctx: Arc<AppContext>, mut shutdown: broadcast::Receiver<()>) {
    let interval = tokio::time::Duration::from_secs(ctx.config.scheduler.interval_seconds);
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    tracing::info!(
        "Update scheduler started (interval: {}s)",
        ctx.config.scheduler.interval_seconds
    );

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match run_sync_tick(&ctx).await {
                    Ok(report) => tracing::info!(
                        repositories = report.repositories,
                        created = report.projects_created,
                        updated = report.projects_updated,
                        notified = report.subscribers_notified,
                        posted = ?report.posted_repository,
                        "Sync tick complete"
                    ),
                    Err(e) => tracing::error!(error = %e, "Sync tick failed, retrying next tick"),
                }
            }
            _ = shutdown.recv() => {
                tracing::info!("Update scheduler shutting down");
                break;
            }
        }
    }
}

/// One Idle→Syncing→Idle pass.
pub async fn run_sync_tick(ctx: &AppContext) -> Result<SyncReport, SyncError> {
    let github = &ctx.config.github;
    let mut report = SyncReport::default();

    let repos = ctx.code_host.list_repositories(&github.owner).await?;
    report.repositories = repos.len();
    if repos.is_empty() {
        return Err(SyncError::NoRepositories {
            owner: github.owner.clone(),
        });
    }

    ctx.store
        .ensure_user(github.owner_user_id, &github.owner)
        .await?;

    let mut created = Vec::new();
    for repo in &repos {
        let (project, outcome) = ctx
            .store
            .upsert_project_by_url(&project_sync(github.owner_user_id, repo))
            .await?;
        match outcome {
            UpsertOutcome::Created => {
                report.projects_created += 1;
                created.push(project);
            }
            UpsertOutcome::Updated => report.projects_updated += 1,
        }
    }

    if let Some(messenger) = &ctx.messenger {
        for project in &created {
            report.subscribers_notified +=
                notify_new_project(ctx, messenger.as_ref(), project).await;
        }
    }

    let latest = match latest_repository(&repos) {
        Some(r) => r,
        None => return Ok(report),
    };

    let messenger = match &ctx.messenger {
        Some(m) => m,
        None => {
            tracing::warn!("Telegram disabled, skipping channel post");
            return Ok(report);
        }
    };

    let branch = match &latest.default_branch {
        Some(b) => b.clone(),
        None => {
            ctx.code_host
                .default_branch(&github.owner, &latest.name)
                .await?
        }
    };
    let commits = ctx
        .code_host
        .recent_commits(&github.owner, &latest.name, &branch, github.commit_count)
        .await?;
    if commits.is_empty() {
        return Err(SyncError::NoCommits {
            repository: latest.name.clone(),
        });
    }

    let (post, kind) = render_post(ctx.generator.as_ref(), latest, &commits).await;
    let text = sanitize(&post, ctx.config.rag.max_message_chars);

    messenger
        .send_message(&OutgoingMessage::markdown(
            ChatId::parse(&ctx.config.telegram.channel_id),
            text,
        ))
        .await?;

    tracing::info!(
        repository = %latest.name,
        commits = commits.len(),
        kind = ?kind,
        channel = %ctx.config.telegram.channel_id,
        "Posted update to channel"
    );
    report.posted_repository = Some(latest.name.clone());
    report.post_kind = Some(kind);

    Ok(report)
}

// ============================================================================
// Helpers
// ============================================================================

pub fn project_sync(user_id: i64, repo: &Repository) -> ProjectSync {
    let description = repo
        .description
        .as_deref()
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .unwrap_or(PLACEHOLDER_DESCRIPTION)
        .to_string();

    ProjectSync {
        user_id,
        title: repo.name.clone(),
        description,
        project_url: repo.html_url.clone(),
        date_completed: repo.pushed_at.map(|t| t.date_naive()),
    }
}

/// Most recently pushed repository; never-pushed repositories sort last.
pub fn latest_repository(repos: &[Repository]) -> Option<&Repository> {
    repos.iter().max_by_key(|r| r.pushed_at)
}

pub fn post_prompt(repo: &Repository, commits: &[Commit]) -> String {
    let messages = commits
        .iter()
        .map(|c| first_line(&c.message))
        .collect::<Vec<_>>()
        .join(", ");
    let files = commits
        .iter()
        .flat_map(|c| c.changed_files.iter().map(String::as_str))
        .take(20)
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "Write a bold and playful Telegram post about the fresh commits in the repository {name}. \
         Use everyday slang and emojis (🔥🚀💻). Max 1500 characters. \
         Plain text only, no markdown.\n\
         Commits: {messages}.\n\
         Changed files: {files}.\n\
         Repository URL: {url}",
        name = repo.name,
        messages = messages,
        files = if files.is_empty() { "none listed" } else { files.as_str() },
        url = repo.html_url
    )
}

pub fn fallback_post(repo: &Repository, commits: &[Commit]) -> String {
    let summary = commits
        .iter()
        .take(3)
        .map(|c| truncate_chars(first_line(&c.message), FALLBACK_MESSAGE_CHARS))
        .collect::<Vec<_>>()
        .join(", ");
    let summary = if summary.is_empty() {
        "quiet for now".to_string()
    } else {
        summary
    };

    format!(
        "🆕 Fresh commits in {}! 🔥\nCommits: {}\nCheck it out: {} 🚀",
        repo.name, summary, repo.html_url
    )
}

pub async fn render_post(
    generator: &dyn GenerationBackend,
    repo: &Repository,
    commits: &[Commit],
) -> (String, PostKind) {
    match generator.generate(&post_prompt(repo, commits)).await {
        Ok(Some(text)) if !text.trim().is_empty() => (text.trim().to_string(), PostKind::Generated),
        Ok(_) => {
            tracing::warn!(
                repository = %repo.name,
                "Post generation returned no text, using fallback"
            );
            (fallback_post(repo, commits), PostKind::Fallback)
        }
        Err(e) => {
            tracing::error!(
                repository = %repo.name,
                error = %e,
                "Post generation failed, using fallback"
            );
            (fallback_post(repo, commits), PostKind::Fallback)
        }
    }
}

pub fn new_project_notice(project: &Project) -> String {
    format!(
        "🆕 New project: {}\nDescription: {}\nLink: {}\nCompleted: {}",
        project.title,
        project.description.as_deref().unwrap_or("No description"),
        project.project_url.as_deref().unwrap_or("Not specified"),
        project
            .date_completed
            .map(|d| d.to_string())
            .unwrap_or_else(|| "Not specified".to_string())
    )
}

/// Tell every subscriber about a new project. Returns how many were reached.
async fn notify_new_project(
    ctx: &AppContext,
    messenger: &dyn Messenger,
    project: &Project,
) -> usize {
    let subscribers = match ctx.store.list_subscribers().await {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "Failed to list subscribers for new-project notice");
            return 0;
        }
    };

    let text = new_project_notice(project);
    stream::iter(subscribers)
        .map(|subscriber| {
            let text = text.clone();
            async move {
                let chat_id = ChatId::parse(&subscriber.telegram_user_id);
                match messenger.send_message(&OutgoingMessage::plain(chat_id, text)).await {
                    Ok(_) => true,
                    Err(e) => {
                        tracing::warn!(
                            subscriber = %subscriber.telegram_user_id,
                            error = %e,
                            "Failed to send new-project notice"
                        );
                        false
                    }
                }
            }
        })
        .buffer_unordered(NOTIFY_CONCURRENCY)
        .filter(|sent| futures::future::ready(*sent))
        .count()
        .await
}

fn first_line(message: &str) -> &str {
    message.lines().next().unwrap_or("").trim()
}

fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let mut cut: String = text.chars().take(max).collect();
        cut.push_str("...");
        cut
    }
}

// ============================================================================
// TESTS
// ============================================================================
