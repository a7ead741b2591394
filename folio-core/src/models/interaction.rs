use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Message {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub message: String,
    pub source: String,
    pub date_sent: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMessage {
    pub name: String,
    pub email: String,
    pub message: String,
    pub source: String,
    pub date_sent: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct MlPrediction {
    pub id: i64,
    pub message_id: Option<i64>,
    pub input_text: String,
    pub prediction: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMlPrediction {
    pub message_id: Option<i64>,
    pub input_text: String,
    pub prediction: Option<String>,
    pub created_at: DateTime<Utc>,
}
