//! folio-cli: command-line client for the Folio HTTP API
//!
//! # Subcommands
//! - `ask <question> [--json]` - ask the portfolio assistant
//! - `projects [--user <id>] [--json]` - list projects
//! - `status` - show server health

use clap::{Parser, Subcommand};
use serde::Deserialize;

const DEFAULT_SERVER: &str = "http://127.0.0.1:8000";

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Debug, Parser)]
#[command(name = "folio-cli", version, about = "Query a Folio portfolio server")]
struct Cli {
    /// Folio HTTP server URL (overrides FOLIO_HTTP_URL env var)
    #[arg(long, env = "FOLIO_HTTP_URL", default_value = DEFAULT_SERVER)]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Ask a question about the portfolio
    Ask {
        /// Question text; multiple words are joined with spaces
        #[arg(required = true, num_args = 1..)]
        question: Vec<String>,

        /// Print the raw JSON response
        #[arg(long)]
        json: bool,
    },

    /// List projects
    Projects {
        /// Only projects owned by this user id
        #[arg(long)]
        user: Option<i64>,

        /// Print the raw JSON response
        #[arg(long)]
        json: bool,
    },

    /// Show Folio server status
    Status,
}

// ============================================================================
// API Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct AskResponse {
    pub answer: String,
    #[serde(default)]
    pub kind: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ProjectSummary {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub project_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ApiError {
    pub error: String,
}

/// One project as a two-line listing entry.
pub fn format_project(p: &ProjectSummary) -> String {
    let description: String = p
        .description
        .as_deref()
        .filter(|d| !d.trim().is_empty())
        .unwrap_or("No description")
        .lines()
        .next()
        .unwrap_or("")
        .chars()
        .take(80)
        .collect();
    match &p.project_url {
        Some(url) => format!("[{}] {} ({})\n    {}", p.id, p.title, url, description),
        None => format!("[{}] {}\n    {}", p.id, p.title, description),
    }
}

/// Extract the server's error message, falling back to the raw body.
pub fn error_message(body: &str) -> String {
    serde_json::from_str::<ApiError>(body)
        .map(|e| e.error)
        .unwrap_or_else(|_| body.to_string())
}

// ============================================================================
// HTTP Client Calls
// ============================================================================

fn client(timeout_secs: u64) -> anyhow::Result<reqwest::blocking::Client> {
    Ok(reqwest::blocking::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()?)
}

fn do_ask(server: &str, question: &str, json_output: bool) -> anyhow::Result<()> {
    let url = format!("{}/rag/ask", server);
    let resp = match client(120)?
        .post(&url)
        .json(&serde_json::json!({ "question": question }))
        .send()
    {
        Ok(r) => r,
        Err(e) => {
            eprintln!("folio-cli: connection failed to {}: {}", url, e);
            std::process::exit(1);
        }
    };

    let status = resp.status();
    let body = resp.text()?;
    if !status.is_success() {
        eprintln!("folio-cli: server returned {}: {}", status, error_message(&body));
        std::process::exit(1);
    }

    if json_output {
        println!("{}", body);
        return Ok(());
    }

    let answer: AskResponse = serde_json::from_str(&body)?;
    println!("{}", answer.answer);
    if answer.kind.as_deref() == Some("empty_fallback") {
        eprintln!("(no answer could be generated)");
    }
    Ok(())
}

fn do_projects(server: &str, user: Option<i64>, json_output: bool) -> anyhow::Result<()> {
    let url = match user {
        Some(id) => format!("{}/api/users/{}/projects", server, id),
        None => format!("{}/api/projects", server),
    };
    let resp = match client(30)?.get(&url).send() {
        Ok(r) => r,
        Err(e) => {
            eprintln!("folio-cli: connection failed to {}: {}", url, e);
            std::process::exit(1);
        }
    };

    let status = resp.status();
    let body = resp.text()?;
    if !status.is_success() {
        eprintln!("folio-cli: server returned {}: {}", status, error_message(&body));
        std::process::exit(1);
    }

    if json_output {
        println!("{}", body);
        return Ok(());
    }

    let projects: Vec<ProjectSummary> = serde_json::from_str(&body)?;
    if projects.is_empty() {
        eprintln!("No projects found");
        return Ok(());
    }
    for p in &projects {
        println!("{}", format_project(p));
    }
    Ok(())
}

/// Show the server status by calling GET /health.
fn do_status(server: &str) -> anyhow::Result<()> {
    let url = format!("{}/health", server);

    match client(10)?.get(&url).send() {
        Ok(r) if r.status().is_success() => {
            let body: serde_json::Value = r.json().unwrap_or_default();
            println!("Folio server: {}", body["status"].as_str().unwrap_or("unknown"));
            println!("Version:      {}", body["version"].as_str().unwrap_or("?"));
            println!("Store:        {}", body["store"].as_str().unwrap_or("?"));
            println!("Embedding:    {}", body["embedding"].as_str().unwrap_or("?"));
            println!("Generation:   {}", body["generation"].as_str().unwrap_or("?"));
            println!("Telegram:     {}", body["telegram"].as_bool().unwrap_or(false));
        }
        Ok(r) => {
            eprintln!("folio-cli: server unhealthy (HTTP {})", r.status());
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("folio-cli: cannot reach {}: {}", url, e);
            std::process::exit(1);
        }
    }

    Ok(())
}

// ============================================================================
// Main
// ============================================================================

fn main() {
    let cli = Cli::parse();
    let server = cli.server.trim_end_matches('/').to_string();

    let result = match cli.command {
        Commands::Ask { question, json } => do_ask(&server, &question.join(" "), json),
        Commands::Projects { user, json } => do_projects(&server, user, json),
        Commands::Status => do_status(&server),
    };

    if let Err(e) = result {
        eprintln!("folio-cli: {}", e);
        std::process::exit(1);
    }
}
