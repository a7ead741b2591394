use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct TelegramSubscriber {
    pub id: i64,
    pub telegram_user_id: String,
    pub subscribed_at: DateTime<Utc>,
}

/// Result of an idempotent `/start` registration.
#[derive(Debug, Clone)]
pub enum Registration {
    New(TelegramSubscriber),
    Existing(TelegramSubscriber),
}

impl Registration {
    pub fn is_new(&self) -> bool {
        matches!(self, Registration::New(_))
    }

    pub fn subscriber(&self) -> &TelegramSubscriber {
        match self {
            Registration::New(s) | Registration::Existing(s) => s,
        }
    }
}
