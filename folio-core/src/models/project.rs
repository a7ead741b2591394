use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::FolioError;

const MAX_TITLE_LEN: usize = 100;
const MAX_URL_LEN: usize = 255;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Project {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub project_url: Option<String>,
    pub date_completed: Option<NaiveDate>,
}

/// Payload for creating a project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewProject {
    pub user_id: i64,
    pub title: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub project_url: Option<String>,
    pub date_completed: Option<NaiveDate>,
}

/// Partial update; absent fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub project_url: Option<String>,
    pub date_completed: Option<NaiveDate>,
}

/// Repository metadata mapped onto a project keyed by `project_url`.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectSync {
    pub user_id: i64,
    pub title: String,
    pub description: String,
    pub project_url: String,
    pub date_completed: Option<NaiveDate>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    Updated,
}

impl NewProject {
    pub fn validate(&self) -> Result<(), FolioError> {
        validate_title(Some(&self.title))?;
        validate_url("image_url", self.image_url.as_deref())?;
        validate_url("project_url", self.project_url.as_deref())
    }
}

impl ProjectUpdate {
    pub fn validate(&self) -> Result<(), FolioError> {
        validate_title(self.title.as_deref())?;
        validate_url("image_url", self.image_url.as_deref())?;
        validate_url("project_url", self.project_url.as_deref())
    }

    pub fn apply_to(&self, project: &mut Project) {
        if let Some(title) = &self.title {
            project.title = title.clone();
        }
        if let Some(description) = &self.description {
            project.description = Some(description.clone());
        }
        if let Some(image_url) = &self.image_url {
            project.image_url = Some(image_url.clone());
        }
        if let Some(project_url) = &self.project_url {
            project.project_url = Some(project_url.clone());
        }
        if let Some(date) = self.date_completed {
            project.date_completed = Some(date);
        }
    }
}

fn validate_title(title: Option<&str>) -> Result<(), FolioError> {
    match title {
        Some(t) if t.trim().is_empty() => {
            Err(FolioError::Validation("title must not be empty".to_string()))
        }
        Some(t) if t.chars().count() > MAX_TITLE_LEN => Err(FolioError::Validation(format!(
            "title must be at most {} characters",
            MAX_TITLE_LEN
        ))),
        _ => Ok(()),
    }
}

fn validate_url(field: &str, url: Option<&str>) -> Result<(), FolioError> {
    match url {
        Some(u) if u.chars().count() > MAX_URL_LEN => Err(FolioError::Validation(format!(
            "{} must be at most {} characters",
            field, MAX_URL_LEN
        ))),
        _ => Ok(()),
    }
}
