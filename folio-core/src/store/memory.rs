//! In-memory [`RecordStore`] for local demos and tests.
//!
//! All tables live behind one `tokio::sync::RwLock`. Ids are assigned from
//! per-table counters starting at 1, mirroring `BIGSERIAL`.

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::error::{FolioError, FolioResult};
use crate::models::{
    BlogPost, Education, Message, MlPrediction, NewMessage, NewMlPrediction, NewProject, Profile,
    Project, ProjectSync, ProjectTagName, ProjectUpdate, Registration, Skill, SocialMedia,
    TelegramSubscriber, Testimonial, UpsertOutcome, WorkExperience,
};

use super::RecordStore;

#[derive(Default)]
struct Tables {
    users: HashSet<i64>,
    projects: Vec<Project>,
    project_tags: Vec<ProjectTagName>,
    skills: Vec<Skill>,
    work_experience: Vec<WorkExperience>,
    education: Vec<Education>,
    blog_posts: Vec<BlogPost>,
    testimonials: Vec<Testimonial>,
    social_media: Vec<SocialMedia>,
    profiles: Vec<Profile>,
    messages: Vec<Message>,
    predictions: Vec<MlPrediction>,
    subscribers: Vec<TelegramSubscriber>,
    next_project_id: i64,
    next_message_id: i64,
    next_prediction_id: i64,
    next_subscriber_id: i64,
}

fn next_id(counter: &mut i64) -> i64 {
    *counter += 1;
    *counter
}

#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_project_tag(&self, project_id: i64, tag_name: &str) {
        self.tables.write().await.project_tags.push(ProjectTagName {
            project_id,
            tag_name: tag_name.to_string(),
        });
    }

    pub async fn add_skill(&self, skill: Skill) {
        self.tables.write().await.skills.push(skill);
    }

    pub async fn add_work_experience(&self, experience: WorkExperience) {
        self.tables.write().await.work_experience.push(experience);
    }

    pub async fn add_education(&self, education: Education) {
        self.tables.write().await.education.push(education);
    }

    pub async fn add_blog_post(&self, post: BlogPost) {
        self.tables.write().await.blog_posts.push(post);
    }

    pub async fn add_testimonial(&self, testimonial: Testimonial) {
        self.tables.write().await.testimonials.push(testimonial);
    }

    pub async fn add_social_media(&self, social: SocialMedia) {
        self.tables.write().await.social_media.push(social);
    }

    pub async fn add_profile(&self, profile: Profile) {
        self.tables.write().await.profiles.push(profile);
    }

    pub async fn messages(&self) -> Vec<Message> {
        self.tables.read().await.messages.clone()
    }

    pub async fn predictions(&self) -> Vec<MlPrediction> {
        self.tables.read().await.predictions.clone()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn list_projects(&self) -> FolioResult<Vec<Project>> {
        Ok(self.tables.read().await.projects.clone())
    }

    async fn list_project_tags(&self) -> FolioResult<Vec<ProjectTagName>> {
        Ok(self.tables.read().await.project_tags.clone())
    }

    async fn list_skills(&self) -> FolioResult<Vec<Skill>> {
        Ok(self.tables.read().await.skills.clone())
    }

    async fn list_work_experience(&self) -> FolioResult<Vec<WorkExperience>> {
        Ok(self.tables.read().await.work_experience.clone())
    }

    async fn list_education(&self) -> FolioResult<Vec<Education>> {
        Ok(self.tables.read().await.education.clone())
    }

    async fn list_blog_posts(&self) -> FolioResult<Vec<BlogPost>> {
        Ok(self.tables.read().await.blog_posts.clone())
    }

    async fn list_testimonials(&self) -> FolioResult<Vec<Testimonial>> {
        Ok(self.tables.read().await.testimonials.clone())
    }

    async fn list_social_media(&self) -> FolioResult<Vec<SocialMedia>> {
        Ok(self.tables.read().await.social_media.clone())
    }

    async fn list_profiles(&self) -> FolioResult<Vec<Profile>> {
        Ok(self.tables.read().await.profiles.clone())
    }

    async fn create_project(&self, project: &NewProject) -> FolioResult<Project> {
        let mut tables = self.tables.write().await;
        if let Some(url) = &project.project_url {
            if tables
                .projects
                .iter()
                .any(|p| p.project_url.as_deref() == Some(url.as_str()))
            {
                return Err(FolioError::duplicate_project_url(url));
            }
        }
        let id = next_id(&mut tables.next_project_id);
        let created = Project {
            id,
            user_id: project.user_id,
            title: project.title.clone(),
            description: project.description.clone(),
            image_url: project.image_url.clone(),
            project_url: project.project_url.clone(),
            date_completed: project.date_completed,
        };
        tables.projects.push(created.clone());
        Ok(created)
    }

    async fn get_project(&self, id: i64) -> FolioResult<Project> {
        self.tables
            .read()
            .await
            .projects
            .iter()
            .find(|p| p.id == id)
            .cloned()
            .ok_or_else(|| FolioError::not_found("project", id))
    }

    async fn list_projects_by_user(&self, user_id: i64) -> FolioResult<Vec<Project>> {
        Ok(self
            .tables
            .read()
            .await
            .projects
            .iter()
            .filter(|p| p.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn update_project(&self, id: i64, update: &ProjectUpdate) -> FolioResult<Project> {
        let mut tables = self.tables.write().await;
        if !tables.projects.iter().any(|p| p.id == id) {
            return Err(FolioError::not_found("project", id));
        }
        if let Some(url) = &update.project_url {
            if tables
                .projects
                .iter()
                .any(|p| p.id != id && p.project_url.as_deref() == Some(url.as_str()))
            {
                return Err(FolioError::duplicate_project_url(url));
            }
        }
        let project = tables
            .projects
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| FolioError::not_found("project", id))?;
        update.apply_to(project);
        Ok(project.clone())
    }

    async fn delete_project(&self, id: i64) -> FolioResult<()> {
        let mut tables = self.tables.write().await;
        let before = tables.projects.len();
        tables.projects.retain(|p| p.id != id);
        if tables.projects.len() == before {
            return Err(FolioError::not_found("project", id));
        }
        tables.project_tags.retain(|t| t.project_id != id);
        Ok(())
    }

    async fn upsert_project_by_url(
        &self,
        sync: &ProjectSync,
    ) -> FolioResult<(Project, UpsertOutcome)> {
        let mut tables = self.tables.write().await;
        if let Some(existing) = tables
            .projects
            .iter_mut()
            .find(|p| p.project_url.as_deref() == Some(sync.project_url.as_str()))
        {
            existing.title = sync.title.clone();
            existing.description = Some(sync.description.clone());
            existing.date_completed = sync.date_completed;
            return Ok((existing.clone(), UpsertOutcome::Updated));
        }

        let id = next_id(&mut tables.next_project_id);
        let created = Project {
            id,
            user_id: sync.user_id,
            title: sync.title.clone(),
            description: Some(sync.description.clone()),
            image_url: None,
            project_url: Some(sync.project_url.clone()),
            date_completed: sync.date_completed,
        };
        tables.projects.push(created.clone());
        Ok((created, UpsertOutcome::Created))
    }

    async fn ensure_user(&self, id: i64, _username: &str) -> FolioResult<()> {
        self.tables.write().await.users.insert(id);
        Ok(())
    }

    async fn create_message(&self, message: &NewMessage) -> FolioResult<Message> {
        let mut tables = self.tables.write().await;
        let id = next_id(&mut tables.next_message_id);
        let created = Message {
            id,
            name: message.name.clone(),
            email: message.email.clone(),
            message: message.message.clone(),
            source: message.source.clone(),
            date_sent: message.date_sent,
        };
        tables.messages.push(created.clone());
        Ok(created)
    }

    async fn create_prediction(&self, prediction: &NewMlPrediction) -> FolioResult<MlPrediction> {
        let mut tables = self.tables.write().await;
        let id = next_id(&mut tables.next_prediction_id);
        let created = MlPrediction {
            id,
            message_id: prediction.message_id,
            input_text: prediction.input_text.clone(),
            prediction: prediction.prediction.clone(),
            created_at: prediction.created_at,
        };
        tables.predictions.push(created.clone());
        Ok(created)
    }

    async fn register_subscriber(&self, telegram_user_id: &str) -> FolioResult<Registration> {
        let mut tables = self.tables.write().await;
        if let Some(existing) = tables
            .subscribers
            .iter()
            .find(|s| s.telegram_user_id == telegram_user_id)
        {
            return Ok(Registration::Existing(existing.clone()));
        }
        let id = next_id(&mut tables.next_subscriber_id);
        let created = TelegramSubscriber {
            id,
            telegram_user_id: telegram_user_id.to_string(),
            subscribed_at: Utc::now(),
        };
        tables.subscribers.push(created.clone());
        Ok(Registration::New(created))
    }

    async fn get_subscriber(
        &self,
        telegram_user_id: &str,
    ) -> FolioResult<Option<TelegramSubscriber>> {
        Ok(self
            .tables
            .read()
            .await
            .subscribers
            .iter()
            .find(|s| s.telegram_user_id == telegram_user_id)
            .cloned())
    }

    async fn list_subscribers(&self) -> FolioResult<Vec<TelegramSubscriber>> {
        Ok(self.tables.read().await.subscribers.clone())
    }

    async fn health(&self) -> FolioResult<String> {
        Ok("memory".to_string())
    }
}
