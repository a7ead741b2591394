//! Knowledge loader: renders every portfolio row into a flat text document.
//!
//! Each record type has a fixed template. Null or blank fields are replaced
//! with a placeholder so every row produces a non-empty document.

use std::collections::HashMap;

use chrono::NaiveDate;
use folio_core::error::FolioResult;
use folio_core::models::{
    BlogPost, Education, Profile, Project, ProjectTagName, Skill, SocialMedia, Testimonial,
    WorkExperience,
};
use folio_core::store::RecordStore;

/// Rendered text of one knowledge row. Lives for a single query.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub text: String,
}

impl Document {
    fn new(text: String) -> Self {
        Self { text }
    }
}

/// Fetch every knowledge type and render it. Any fetch error aborts the load.
pub async fn load_documents(store: &dyn RecordStore) -> FolioResult<Vec<Document>> {
    let (projects, tags, skills, experience, education) = tokio::try_join!(
        store.list_projects(),
        store.list_project_tags(),
        store.list_skills(),
        store.list_work_experience(),
        store.list_education(),
    )?;
    let (posts, testimonials, social, profiles) = tokio::try_join!(
        store.list_blog_posts(),
        store.list_testimonials(),
        store.list_social_media(),
        store.list_profiles(),
    )?;

    let tags_by_project = group_tags(tags);

    let mut documents = Vec::with_capacity(
        projects.len()
            + skills.len()
            + experience.len()
            + education.len()
            + posts.len()
            + testimonials.len()
            + social.len()
            + profiles.len(),
    );

    for project in &projects {
        let tags = tags_by_project
            .get(&project.id)
            .map(Vec::as_slice)
            .unwrap_or(&[]);
        documents.push(Document::new(render_project(project, tags)));
    }
    documents.extend(skills.iter().map(|s| Document::new(render_skill(s))));
    documents.extend(experience.iter().map(|e| Document::new(render_work_experience(e))));
    documents.extend(education.iter().map(|e| Document::new(render_education(e))));
    documents.extend(posts.iter().map(|p| Document::new(render_blog_post(p))));
    documents.extend(testimonials.iter().map(|t| Document::new(render_testimonial(t))));
    documents.extend(social.iter().map(|s| Document::new(render_social_media(s))));
    documents.extend(profiles.iter().map(|p| Document::new(render_profile(p))));

    tracing::debug!(documents = documents.len(), "Loaded knowledge documents");
    Ok(documents)
}

fn group_tags(tags: Vec<ProjectTagName>) -> HashMap<i64, Vec<String>> {
    let mut grouped: HashMap<i64, Vec<String>> = HashMap::new();
    for tag in tags {
        grouped.entry(tag.project_id).or_default().push(tag.tag_name);
    }
    grouped
}

/// Value if present and not blank, otherwise the placeholder.
fn or<'a>(value: Option<&'a str>, placeholder: &'a str) -> &'a str {
    match value {
        Some(v) if !v.trim().is_empty() => v,
        _ => placeholder,
    }
}

fn date_or(date: Option<NaiveDate>, placeholder: &str) -> String {
    date.map(|d| d.to_string())
        .unwrap_or_else(|| placeholder.to_string())
}

pub fn render_project(project: &Project, tags: &[String]) -> String {
    let tags = if tags.is_empty() {
        "No tags".to_string()
    } else {
        tags.join(", ")
    };
    format!(
        "Project: {}\nDescription: {}\nURL: {}\nCompleted: {}\nTags: {}",
        or(Some(project.title.as_str()), "Untitled project"),
        or(project.description.as_deref(), "No description"),
        or(project.project_url.as_deref(), "No URL"),
        date_or(project.date_completed, "Not completed"),
        tags
    )
}

pub fn render_skill(skill: &Skill) -> String {
    let proficiency = skill
        .proficiency_level
        .map(|p| p.to_string())
        .unwrap_or_else(|| "Not specified".to_string());
    format!(
        "Skill: {}\nDescription: {}\nProficiency: {}",
        or(Some(skill.skill_name.as_str()), "Unnamed skill"),
        or(skill.description.as_deref(), "No description"),
        proficiency
    )
}

pub fn render_work_experience(experience: &WorkExperience) -> String {
    format!(
        "Work Experience: {} at {}\nDescription: {}\nPeriod: {} to {}",
        or(Some(experience.position.as_str()), "Unknown position"),
        or(Some(experience.company.as_str()), "Unknown company"),
        or(experience.description.as_deref(), "No description"),
        date_or(experience.start_date, "Unknown"),
        date_or(experience.end_date, "Present")
    )
}

pub fn render_education(education: &Education) -> String {
    format!(
        "Education: {} in {}\nInstitution: {}\nPeriod: {} to {}",
        or(education.degree.as_deref(), "No degree"),
        or(education.field_of_study.as_deref(), "No field"),
        or(education.institution.as_deref(), "No institution"),
        date_or(education.start_date, "Unknown"),
        date_or(education.end_date, "Present")
    )
}

pub fn render_blog_post(post: &BlogPost) -> String {
    let published = post
        .date_published
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "Not published".to_string());
    format!(
        "Blog Post: {}\nContent: {}\nPublished: {}",
        or(Some(post.title.as_str()), "Untitled post"),
        or(post.content.as_deref(), "No content"),
        published
    )
}

pub fn render_testimonial(testimonial: &Testimonial) -> String {
    format!(
        "Testimonial: {}\nAuthor: {}\nDate: {}",
        or(testimonial.quote.as_deref(), "No quote"),
        or(testimonial.author.as_deref(), "Anonymous"),
        date_or(testimonial.date, "No date")
    )
}

pub fn render_social_media(social: &SocialMedia) -> String {
    format!(
        "Social Media: {}\nProfile URL: {}",
        or(social.platform_name.as_deref(), "Unknown platform"),
        or(social.profile_url.as_deref(), "No URL")
    )
}

pub fn render_profile(profile: &Profile) -> String {
    format!(
        "Profile: {}\nBio: {}\nEmail: {}\nPhone: {}\nAddress: {}\nResume URL: {}",
        or(profile.name.as_deref(), "Unnamed"),
        or(profile.bio.as_deref(), "No bio"),
        or(profile.email.as_deref(), "No email"),
        or(profile.phone.as_deref(), "No phone"),
        or(profile.address.as_deref(), "No address"),
        or(profile.resume_url.as_deref(), "No resume")
    )
}
