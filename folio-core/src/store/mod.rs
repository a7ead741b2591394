//! Record store abstraction.
//!
//! The [`RecordStore`] trait is the only way the rest of Folio touches
//! persisted rows. The RAG pipeline uses the bulk reads, the scheduler uses
//! [`upsert_project_by_url`](RecordStore::upsert_project_by_url), the bot and
//! HTTP API use the project and subscriber operations.
//!
//! Two backends exist: [`PgStore`] (sqlx/PostgreSQL, production) and
//! [`MemoryStore`] (local demos and tests). Every operation is its own short
//! statement or transaction; nothing is held across calls.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;

use crate::error::FolioResult;
use crate::models::{
    BlogPost, Education, Message, MlPrediction, NewMessage, NewMlPrediction, NewProject, Profile,
    Project, ProjectSync, ProjectTagName, ProjectUpdate, Registration, Skill, SocialMedia,
    TelegramSubscriber, Testimonial, UpsertOutcome, WorkExperience,
};

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[async_trait]
pub trait RecordStore: Send + Sync {
    // --- knowledge bulk reads -------------------------------------------

    async fn list_projects(&self) -> FolioResult<Vec<Project>>;
    async fn list_project_tags(&self) -> FolioResult<Vec<ProjectTagName>>;
    async fn list_skills(&self) -> FolioResult<Vec<Skill>>;
    async fn list_work_experience(&self) -> FolioResult<Vec<WorkExperience>>;
    async fn list_education(&self) -> FolioResult<Vec<Education>>;
    async fn list_blog_posts(&self) -> FolioResult<Vec<BlogPost>>;
    async fn list_testimonials(&self) -> FolioResult<Vec<Testimonial>>;
    async fn list_social_media(&self) -> FolioResult<Vec<SocialMedia>>;
    async fn list_profiles(&self) -> FolioResult<Vec<Profile>>;

    // --- projects -------------------------------------------------------

    async fn create_project(&self, project: &NewProject) -> FolioResult<Project>;

    /// Returns `FolioError::NotFound` when absent.
    async fn get_project(&self, id: i64) -> FolioResult<Project>;

    async fn list_projects_by_user(&self, user_id: i64) -> FolioResult<Vec<Project>>;

    /// Returns `FolioError::NotFound` when absent.
    async fn update_project(&self, id: i64, update: &ProjectUpdate) -> FolioResult<Project>;

    /// Returns `FolioError::NotFound` when absent.
    async fn delete_project(&self, id: i64) -> FolioResult<()>;

    /// Create the project if no row has this `project_url`, otherwise
    /// overwrite its title, description and completion date.
    async fn upsert_project_by_url(
        &self,
        sync: &ProjectSync,
    ) -> FolioResult<(Project, UpsertOutcome)>;

    /// Make sure a user row with this id exists.
    async fn ensure_user(&self, id: i64, username: &str) -> FolioResult<()>;

    // --- interactions ---------------------------------------------------

    async fn create_message(&self, message: &NewMessage) -> FolioResult<Message>;
    async fn create_prediction(&self, prediction: &NewMlPrediction) -> FolioResult<MlPrediction>;

    // --- telegram subscribers -------------------------------------------

    /// Idempotent: registering the same telegram user twice yields one row.
    async fn register_subscriber(&self, telegram_user_id: &str) -> FolioResult<Registration>;

    async fn get_subscriber(&self, telegram_user_id: &str)
        -> FolioResult<Option<TelegramSubscriber>>;

    async fn list_subscribers(&self) -> FolioResult<Vec<TelegramSubscriber>>;

    /// Backend description for health reporting.
    async fn health(&self) -> FolioResult<String>;
}
