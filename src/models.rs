//! Domain shapes, mirroring the rows of the `profiles`, `surveys` and
//! `survey_responses` tables. Field names follow the store's wire format
//! (`user_id`, `is_active`, `type`, ...).

use std::collections::HashMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuestionKind {
    #[serde(rename = "text")]
    ShortText,
    #[serde(rename = "multiple")]
    MultipleChoice,
    #[serde(rename = "rating")]
    Rating,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    /// Unique within the parent survey; keys the answer maps.
    pub id: String,
    #[serde(rename = "type")]
    pub kind: QuestionKind,
    #[serde(rename = "question")]
    pub prompt: String,
    /// Declared choices; only meaningful for `MultipleChoice`.
    #[serde(default)]
    pub options: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Survey {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub description: Option<String>,
    pub questions: Vec<Question>,
    pub is_active: bool,
    pub created_at: String,
    pub updated_at: String,
}

/// One respondent's complete set of answers, keyed by question id. The
/// value type depends on the question kind: a string for text and
/// multiple choice, an integer 1-5 for ratings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SurveyResponse {
    pub id: String,
    pub survey_id: String,
    pub answers: HashMap<String, Value>,
    pub respondent_email: Option<String>,
    pub submitted_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    pub email: String,
    pub full_name: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Partial update for a survey. Only fields present in the patch are
/// written; `user_id` and the timestamps are never client-writable.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SurveyPatch {
    pub title: Option<String>,
    /// Absent leaves the description alone; an explicit JSON `null`
    /// clears it.
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    pub questions: Option<Vec<Question>>,
    pub is_active: Option<bool>,
}

fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Deserialize::deserialize(deserializer).map(Some)
}
