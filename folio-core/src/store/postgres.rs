//! PostgreSQL [`RecordStore`] backed by a bounded sqlx pool.

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::PgPool;

use crate::error::{FolioError, FolioResult};
use crate::models::{
    BlogPost, Education, Message, MlPrediction, NewMessage, NewMlPrediction, NewProject, Profile,
    Project, ProjectSync, ProjectTagName, ProjectUpdate, Registration, Skill, SocialMedia,
    TelegramSubscriber, Testimonial, UpsertOutcome, WorkExperience,
};

use super::RecordStore;

const PROJECT_COLUMNS: &str =
    "id, user_id, title, description, image_url, project_url, date_completed";

const SELECT_SUBSCRIBER: &str = "SELECT id, telegram_user_id, subscribed_at \
     FROM telegram_subscribers WHERE telegram_user_id = $1";

/// SQLSTATE for unique_violation.
const UNIQUE_VIOLATION: &str = "23505";

/// Project writes can only hit the `project_url` unique index, so a unique
/// violation is reported as a rejected URL instead of a database failure.
fn project_write_error(e: sqlx::Error, url: Option<&str>) -> FolioError {
    let unique = e
        .as_database_error()
        .and_then(|d| d.code())
        .is_some_and(|code| code == UNIQUE_VIOLATION);
    if unique {
        FolioError::duplicate_project_url(url.unwrap_or_default())
    } else {
        FolioError::Database(e)
    }
}

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Upsert row: the project plus whether the statement inserted it.
#[derive(sqlx::FromRow)]
struct UpsertRow {
    id: i64,
    user_id: i64,
    title: String,
    description: Option<String>,
    image_url: Option<String>,
    project_url: Option<String>,
    date_completed: Option<NaiveDate>,
    inserted: bool,
}

#[async_trait]
impl RecordStore for PgStore {
    async fn list_projects(&self) -> FolioResult<Vec<Project>> {
        let rows = sqlx::query_as::<_, Project>(&format!(
            "SELECT {} FROM projects ORDER BY id",
            PROJECT_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn list_project_tags(&self) -> FolioResult<Vec<ProjectTagName>> {
        let rows = sqlx::query_as::<_, ProjectTagName>(
            r#"
            SELECT pt.project_id, t.tag_name
            FROM project_tags pt
            JOIN tags t ON t.id = pt.tag_id
            ORDER BY pt.project_id, t.tag_name
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn list_skills(&self) -> FolioResult<Vec<Skill>> {
        let rows = sqlx::query_as::<_, Skill>(
            r#"
            SELECT id, user_id, skill_name, description, proficiency_level
            FROM skills ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn list_work_experience(&self) -> FolioResult<Vec<WorkExperience>> {
        let rows = sqlx::query_as::<_, WorkExperience>(
            r#"
            SELECT id, user_id, company, position, description, start_date, end_date
            FROM work_experience ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn list_education(&self) -> FolioResult<Vec<Education>> {
        let rows = sqlx::query_as::<_, Education>(
            r#"
            SELECT id, user_id, institution, degree, field_of_study, start_date, end_date
            FROM education ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn list_blog_posts(&self) -> FolioResult<Vec<BlogPost>> {
        let rows = sqlx::query_as::<_, BlogPost>(
            "SELECT id, user_id, title, content, date_published FROM blog_posts ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn list_testimonials(&self) -> FolioResult<Vec<Testimonial>> {
        let rows = sqlx::query_as::<_, Testimonial>(
            "SELECT id, user_id, quote, author, date FROM testimonials ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn list_social_media(&self) -> FolioResult<Vec<SocialMedia>> {
        let rows = sqlx::query_as::<_, SocialMedia>(
            "SELECT id, user_id, platform_name, profile_url FROM social_media ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn list_profiles(&self) -> FolioResult<Vec<Profile>> {
        let rows = sqlx::query_as::<_, Profile>(
            r#"
            SELECT id, user_id, name, bio, photo_url, email, phone, address, resume_url
            FROM profiles ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn create_project(&self, project: &NewProject) -> FolioResult<Project> {
        let created = sqlx::query_as::<_, Project>(&format!(
            r#"
            INSERT INTO projects
                (user_id, title, description, image_url, project_url, date_completed)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {}
            "#,
            PROJECT_COLUMNS
        ))
        .bind(project.user_id)
        .bind(&project.title)
        .bind(&project.description)
        .bind(&project.image_url)
        .bind(&project.project_url)
        .bind(project.date_completed)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| project_write_error(e, project.project_url.as_deref()))?;
        Ok(created)
    }

    async fn get_project(&self, id: i64) -> FolioResult<Project> {
        sqlx::query_as::<_, Project>(&format!(
            "SELECT {} FROM projects WHERE id = $1",
            PROJECT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| FolioError::not_found("project", id))
    }

    async fn list_projects_by_user(&self, user_id: i64) -> FolioResult<Vec<Project>> {
        let rows = sqlx::query_as::<_, Project>(&format!(
            "SELECT {} FROM projects WHERE user_id = $1 ORDER BY id",
            PROJECT_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn update_project(&self, id: i64, update: &ProjectUpdate) -> FolioResult<Project> {
        sqlx::query_as::<_, Project>(&format!(
            r#"
            UPDATE projects SET
                title = COALESCE($2, title),
                description = COALESCE($3, description),
                image_url = COALESCE($4, image_url),
                project_url = COALESCE($5, project_url),
                date_completed = COALESCE($6, date_completed)
            WHERE id = $1
            RETURNING {}
            "#,
            PROJECT_COLUMNS
        ))
        .bind(id)
        .bind(&update.title)
        .bind(&update.description)
        .bind(&update.image_url)
        .bind(&update.project_url)
        .bind(update.date_completed)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| project_write_error(e, update.project_url.as_deref()))?
        .ok_or_else(|| FolioError::not_found("project", id))
    }

    async fn delete_project(&self, id: i64) -> FolioResult<()> {
        let result = sqlx::query("DELETE FROM projects WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(FolioError::not_found("project", id));
        }
        Ok(())
    }

    async fn upsert_project_by_url(
        &self,
        sync: &ProjectSync,
    ) -> FolioResult<(Project, UpsertOutcome)> {
        // xmax is 0 only for freshly inserted tuples.
        let row = sqlx::query_as::<_, UpsertRow>(&format!(
            r#"
            INSERT INTO projects (user_id, title, description, project_url, date_completed)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (project_url) DO UPDATE SET
                title = EXCLUDED.title,
                description = EXCLUDED.description,
                date_completed = EXCLUDED.date_completed
            RETURNING {}, (xmax = 0) AS inserted
            "#,
            PROJECT_COLUMNS
        ))
        .bind(sync.user_id)
        .bind(&sync.title)
        .bind(&sync.description)
        .bind(&sync.project_url)
        .bind(sync.date_completed)
        .fetch_one(&self.pool)
        .await?;

        let outcome = if row.inserted {
            UpsertOutcome::Created
        } else {
            UpsertOutcome::Updated
        };
        let project = Project {
            id: row.id,
            user_id: row.user_id,
            title: row.title,
            description: row.description,
            image_url: row.image_url,
            project_url: row.project_url,
            date_completed: row.date_completed,
        };
        Ok((project, outcome))
    }

    async fn ensure_user(&self, id: i64, username: &str) -> FolioResult<()> {
        let result =
            sqlx::query("INSERT INTO users (id, username) VALUES ($1, $2) ON CONFLICT DO NOTHING")
                .bind(id)
                .bind(username)
                .execute(&self.pool)
                .await?;
        if result.rows_affected() > 0 {
            tracing::info!(user_id = id, username, "Created owner user");
        }
        Ok(())
    }

    async fn create_message(&self, message: &NewMessage) -> FolioResult<Message> {
        let created = sqlx::query_as::<_, Message>(
            r#"
            INSERT INTO messages (name, email, message, source, date_sent)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, name, email, message, source, date_sent
            "#,
        )
        .bind(&message.name)
        .bind(&message.email)
        .bind(&message.message)
        .bind(&message.source)
        .bind(message.date_sent)
        .fetch_one(&self.pool)
        .await?;
        Ok(created)
    }

    async fn create_prediction(&self, prediction: &NewMlPrediction) -> FolioResult<MlPrediction> {
        let created = sqlx::query_as::<_, MlPrediction>(
            r#"
            INSERT INTO ml_predictions (message_id, input_text, prediction, created_at)
            VALUES ($1, $2, $3, $4)
            RETURNING id, message_id, input_text, prediction, created_at
            "#,
        )
        .bind(prediction.message_id)
        .bind(&prediction.input_text)
        .bind(&prediction.prediction)
        .bind(prediction.created_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(created)
    }

    async fn register_subscriber(&self, telegram_user_id: &str) -> FolioResult<Registration> {
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query_as::<_, TelegramSubscriber>(
            r#"
            INSERT INTO telegram_subscribers (telegram_user_id)
            VALUES ($1)
            ON CONFLICT (telegram_user_id) DO NOTHING
            RETURNING id, telegram_user_id, subscribed_at
            "#,
        )
        .bind(telegram_user_id)
        .fetch_optional(&mut *tx)
        .await?;

        let registration = match inserted {
            Some(subscriber) => Registration::New(subscriber),
            None => {
                let existing = sqlx::query_as::<_, TelegramSubscriber>(SELECT_SUBSCRIBER)
                    .bind(telegram_user_id)
                    .fetch_one(&mut *tx)
                    .await?;
                Registration::Existing(existing)
            }
        };

        tx.commit().await?;
        Ok(registration)
    }

    async fn get_subscriber(
        &self,
        telegram_user_id: &str,
    ) -> FolioResult<Option<TelegramSubscriber>> {
        let row = sqlx::query_as::<_, TelegramSubscriber>(SELECT_SUBSCRIBER)
            .bind(telegram_user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn list_subscribers(&self) -> FolioResult<Vec<TelegramSubscriber>> {
        let rows = sqlx::query_as::<_, TelegramSubscriber>(
            "SELECT id, telegram_user_id, subscribed_at FROM telegram_subscribers ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn health(&self) -> FolioResult<String> {
        Ok(crate::db::health_check(&self.pool).await?)
    }
}

// ============================================================================
// TESTS: require a live PostgreSQL; skipped when unavailable
// ============================================================================
