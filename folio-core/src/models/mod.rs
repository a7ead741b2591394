pub mod interaction;
pub mod knowledge;
pub mod project;
pub mod subscriber;

pub use interaction::{Message, MlPrediction, NewMessage, NewMlPrediction};
pub use knowledge::{
    BlogPost, Education, Profile, ProjectTagName, Skill, SocialMedia, Testimonial, WorkExperience,
};
pub use project::{NewProject, Project, ProjectSync, ProjectUpdate, UpsertOutcome};
pub use subscriber::{Registration, TelegramSubscriber};
