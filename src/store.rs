//! # Survey store
//!
//! Repository over the three row tables (`profiles`, `surveys`,
//! `survey_responses`), backed by SQLite.
//!
//! Every operation is a single round trip with no retry or idempotency
//! key; listings come back newest first. Cross-table ids (`user_id`,
//! `survey_id`) are weak references, plain columns without foreign key
//! constraints, so deleting a survey orphans its responses and a survey
//! can be created before its owner has a profile row. `submit_response`
//! does not look at `is_active`; the access path in front of it owns
//! that check.

use std::collections::HashMap;

use chrono::Utc;
use rusqlite::{params, types::Value as SqlValue, Connection, OptionalExtension, Row};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::{
    error::AppError,
    models::{Profile, Question, Survey, SurveyPatch, SurveyResponse},
};

pub struct SurveyStore {
    conn: Mutex<Connection>,
}

fn now_string() -> String {
    Utc::now().to_rfc3339()
}

fn init_schema(conn: &Connection) -> Result<(), AppError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS profiles (
            id TEXT PRIMARY KEY,
            email TEXT NOT NULL,
            full_name TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
          );
          CREATE TABLE IF NOT EXISTS surveys (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            title TEXT NOT NULL,
            description TEXT,
            questions TEXT NOT NULL,
            is_active INTEGER NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
          );
          CREATE INDEX IF NOT EXISTS idx_surveys_user ON surveys(user_id);
          CREATE TABLE IF NOT EXISTS survey_responses (
            id TEXT PRIMARY KEY,
            survey_id TEXT NOT NULL,
            answers TEXT NOT NULL,
            respondent_email TEXT,
            submitted_at TEXT NOT NULL
          );
          CREATE INDEX IF NOT EXISTS idx_responses_survey ON survey_responses(survey_id);",
    )?;
    Ok(())
}

fn json_column<T: DeserializeOwned>(row: &Row, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn survey_from_row(row: &Row) -> rusqlite::Result<Survey> {
    Ok(Survey {
        id: row.get(0)?,
        user_id: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        questions: json_column(row, 4)?,
        is_active: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

fn response_from_row(row: &Row) -> rusqlite::Result<SurveyResponse> {
    Ok(SurveyResponse {
        id: row.get(0)?,
        survey_id: row.get(1)?,
        answers: json_column(row, 2)?,
        respondent_email: row.get(3)?,
        submitted_at: row.get(4)?,
    })
}

const SURVEY_COLUMNS: &str =
    "id, user_id, title, description, questions, is_active, created_at, updated_at";
const RESPONSE_COLUMNS: &str = "id, survey_id, answers, respondent_email, submitted_at";

fn get_survey_locked(conn: &Connection, survey_id: &str) -> Result<Survey, AppError> {
    conn.query_row(
        &format!("SELECT {SURVEY_COLUMNS} FROM surveys WHERE id = ?1"),
        params![survey_id],
        survey_from_row,
    )
    .optional()?
    .ok_or(AppError::NotFound)
}

impl SurveyStore {
    pub fn open(path: &str) -> Result<Self, AppError> {
        Self::from_connection(Connection::open(path)?)
    }

    /// Fresh store with no file behind it; used by the tests.
    pub fn open_in_memory() -> Result<Self, AppError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, AppError> {
        init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub async fn list_surveys_for_user(&self, user_id: &str) -> Result<Vec<Survey>, AppError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(&format!(
            "SELECT {SURVEY_COLUMNS} FROM surveys WHERE user_id = ?1 \
            ORDER BY created_at DESC, rowid DESC"
        ))?;
        let rows = stmt.query_map(params![user_id], survey_from_row)?;

        let mut surveys = Vec::new();
        for row in rows {
            surveys.push(row?);
        }
        Ok(surveys)
    }

    pub async fn get_survey(&self, survey_id: &str) -> Result<Survey, AppError> {
        let conn = self.conn.lock().await;
        get_survey_locked(&conn, survey_id)
    }

    /// Same as [`get_survey`](Self::get_survey), but the ownership
    /// predicate runs here at the data-access boundary rather than in
    /// whatever renders the result.
    pub async fn get_survey_for_owner(
        &self,
        survey_id: &str,
        user_id: &str,
    ) -> Result<Survey, AppError> {
        let survey = self.get_survey(survey_id).await?;
        if survey.user_id != user_id {
            return Err(AppError::Forbidden);
        }
        Ok(survey)
    }

    pub async fn create_survey(
        &self,
        user_id: &str,
        title: &str,
        description: Option<&str>,
        questions: &[Question],
    ) -> Result<Survey, AppError> {
        let conn = self.conn.lock().await;

        let survey = Survey {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            title: title.to_string(),
            description: description.map(str::to_string),
            questions: questions.to_vec(),
            is_active: true,
            created_at: now_string(),
            updated_at: now_string(),
        };

        conn.execute(
            "INSERT INTO surveys (id, user_id, title, description, questions, is_active, created_at, updated_at) \
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                survey.id,
                survey.user_id,
                survey.title,
                survey.description,
                serde_json::to_string(&survey.questions)?,
                survey.is_active,
                survey.created_at,
                survey.updated_at,
            ],
        )?;

        Ok(survey)
    }

    /// Partial update: only fields present in the patch are written.
    /// Last write wins; there is no version check.
    pub async fn update_survey(
        &self,
        survey_id: &str,
        patch: &SurveyPatch,
    ) -> Result<Survey, AppError> {
        let conn = self.conn.lock().await;

        let mut sets: Vec<&str> = Vec::new();
        let mut values: Vec<SqlValue> = Vec::new();

        if let Some(title) = &patch.title {
            sets.push("title = ?");
            values.push(SqlValue::Text(title.clone()));
        }
        if let Some(description) = &patch.description {
            sets.push("description = ?");
            values.push(match description {
                Some(text) => SqlValue::Text(text.clone()),
                None => SqlValue::Null,
            });
        }
        if let Some(questions) = &patch.questions {
            sets.push("questions = ?");
            values.push(SqlValue::Text(serde_json::to_string(questions)?));
        }
        if let Some(is_active) = patch.is_active {
            sets.push("is_active = ?");
            values.push(SqlValue::Integer(is_active as i64));
        }
        sets.push("updated_at = ?");
        values.push(SqlValue::Text(now_string()));
        values.push(SqlValue::Text(survey_id.to_string()));

        let sql = format!("UPDATE surveys SET {} WHERE id = ?", sets.join(", "));
        let changed = conn.execute(&sql, rusqlite::params_from_iter(values))?;
        if changed == 0 {
            return Err(AppError::NotFound);
        }

        get_survey_locked(&conn, survey_id)
    }

    pub async fn delete_survey(&self, survey_id: &str) -> Result<(), AppError> {
        let conn = self.conn.lock().await;
        let deleted = conn.execute("DELETE FROM surveys WHERE id = ?1", params![survey_id])?;
        if deleted == 0 {
            return Err(AppError::NotFound);
        }
        Ok(())
    }

    pub async fn submit_response(
        &self,
        survey_id: &str,
        answers: &HashMap<String, Value>,
        respondent_email: Option<&str>,
    ) -> Result<SurveyResponse, AppError> {
        let conn = self.conn.lock().await;

        let response = SurveyResponse {
            id: Uuid::new_v4().to_string(),
            survey_id: survey_id.to_string(),
            answers: answers.clone(),
            respondent_email: respondent_email.map(str::to_string),
            submitted_at: now_string(),
        };

        conn.execute(
            "INSERT INTO survey_responses (id, survey_id, answers, respondent_email, submitted_at) \
            VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                response.id,
                response.survey_id,
                serde_json::to_string(&response.answers)?,
                response.respondent_email,
                response.submitted_at,
            ],
        )?;

        Ok(response)
    }

    pub async fn list_responses(&self, survey_id: &str) -> Result<Vec<SurveyResponse>, AppError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(&format!(
            "SELECT {RESPONSE_COLUMNS} FROM survey_responses WHERE survey_id = ?1 \
            ORDER BY submitted_at DESC, rowid DESC"
        ))?;
        let rows = stmt.query_map(params![survey_id], response_from_row)?;

        let mut responses = Vec::new();
        for row in rows {
            responses.push(row?);
        }
        Ok(responses)
    }

    pub async fn count_responses(&self, survey_id: &str) -> Result<i64, AppError> {
        let conn = self.conn.lock().await;
        let count = conn.query_row(
            "SELECT COUNT(*) FROM survey_responses WHERE survey_id = ?1",
            params![survey_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    pub async fn upsert_profile(
        &self,
        user_id: &str,
        email: &str,
        full_name: Option<&str>,
    ) -> Result<Profile, AppError> {
        let conn = self.conn.lock().await;

        let now = now_string();
        conn.execute(
            "INSERT INTO profiles (id, email, full_name, created_at, updated_at) \
            VALUES (?1, ?2, ?3, ?4, ?4) \
            ON CONFLICT(id) DO UPDATE SET \
            email = excluded.email, full_name = excluded.full_name, updated_at = excluded.updated_at",
            params![user_id, email, full_name, now],
        )?;

        let profile = conn.query_row(
            "SELECT id, email, full_name, created_at, updated_at FROM profiles WHERE id = ?1",
            params![user_id],
            |row| {
                Ok(Profile {
                    id: row.get(0)?,
                    email: row.get(1)?,
                    full_name: row.get(2)?,
                    created_at: row.get(3)?,
                    updated_at: row.get(4)?,
                })
            },
        )?;
        Ok(profile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::QuestionKind;
    use serde_json::json;

    fn store() -> SurveyStore {
        SurveyStore::open_in_memory().unwrap()
    }

    fn choice_question(id: &str) -> Question {
        Question {
            id: id.to_string(),
            kind: QuestionKind::MultipleChoice,
            prompt: "How was it?".to_string(),
            options: vec!["Good".to_string(), "Bad".to_string()],
        }
    }

    #[tokio::test]
    async fn list_is_newest_first_and_scoped_to_owner() {
        let store = store();
        let first = store
            .create_survey("alice", "First", None, &[choice_question("q1")])
            .await
            .unwrap();
        let second = store
            .create_survey("alice", "Second", None, &[choice_question("q1")])
            .await
            .unwrap();
        store
            .create_survey("bob", "Other", None, &[choice_question("q1")])
            .await
            .unwrap();

        let surveys = store.list_surveys_for_user("alice").await.unwrap();
        assert_eq!(
            surveys.iter().map(|s| s.id.as_str()).collect::<Vec<_>>(),
            vec![second.id.as_str(), first.id.as_str()]
        );
    }

    #[tokio::test]
    async fn list_is_empty_when_owner_has_no_surveys() {
        let surveys = store().list_surveys_for_user("nobody").await.unwrap();
        assert!(surveys.is_empty());
    }

    #[tokio::test]
    async fn get_twice_returns_equal_data() {
        let store = store();
        let created = store
            .create_survey("alice", "Satisfaction", Some("desc"), &[choice_question("q1")])
            .await
            .unwrap();

        let a = store.get_survey(&created.id).await.unwrap();
        let b = store.get_survey(&created.id).await.unwrap();
        assert_eq!(serde_json::to_value(&a).unwrap(), serde_json::to_value(&b).unwrap());
        assert_eq!(a.title, "Satisfaction");
        assert!(a.is_active);
    }

    #[tokio::test]
    async fn get_missing_is_not_found() {
        let err = store().get_survey("missing").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound));
    }

    #[tokio::test]
    async fn ownership_is_enforced_at_the_store() {
        let store = store();
        let survey = store
            .create_survey("alice", "Mine", None, &[choice_question("q1")])
            .await
            .unwrap();

        let err = store
            .get_survey_for_owner(&survey.id, "mallory")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden));

        let ok = store.get_survey_for_owner(&survey.id, "alice").await.unwrap();
        assert_eq!(ok.id, survey.id);
    }

    #[tokio::test]
    async fn update_only_touches_patched_fields() {
        let store = store();
        let survey = store
            .create_survey("alice", "Before", Some("keep me"), &[choice_question("q1")])
            .await
            .unwrap();

        let patch = SurveyPatch {
            title: Some("After".to_string()),
            is_active: Some(false),
            ..Default::default()
        };
        let updated = store.update_survey(&survey.id, &patch).await.unwrap();

        assert_eq!(updated.title, "After");
        assert!(!updated.is_active);
        assert_eq!(updated.description.as_deref(), Some("keep me"));
        assert_eq!(updated.questions.len(), 1);
        assert_eq!(updated.created_at, survey.created_at);
    }

    #[tokio::test]
    async fn create_works_without_a_profile_row() {
        // user_id is a weak reference; owners need no profiles row first.
        let store = store();
        let survey = store
            .create_survey("fresh-user", "First survey", None, &[choice_question("q1")])
            .await
            .unwrap();

        let fetched = store.get_survey(&survey.id).await.unwrap();
        assert_eq!(fetched.user_id, "fresh-user");
    }

    #[tokio::test]
    async fn null_description_clears_while_absent_leaves_it() {
        let store = store();
        let survey = store
            .create_survey("alice", "T", Some("old description"), &[choice_question("q1")])
            .await
            .unwrap();

        let keep: SurveyPatch = serde_json::from_str(r#"{"title":"Renamed"}"#).unwrap();
        let updated = store.update_survey(&survey.id, &keep).await.unwrap();
        assert_eq!(updated.description.as_deref(), Some("old description"));

        let clear: SurveyPatch = serde_json::from_str(r#"{"description":null}"#).unwrap();
        let updated = store.update_survey(&survey.id, &clear).await.unwrap();
        assert_eq!(updated.description, None);

        let set: SurveyPatch = serde_json::from_str(r#"{"description":"fresh"}"#).unwrap();
        let updated = store.update_survey(&survey.id, &set).await.unwrap();
        assert_eq!(updated.description.as_deref(), Some("fresh"));
    }

    #[tokio::test]
    async fn update_missing_is_not_found() {
        let patch = SurveyPatch {
            title: Some("nope".to_string()),
            ..Default::default()
        };
        let err = store().update_survey("missing", &patch).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound));
    }

    #[tokio::test]
    async fn delete_missing_is_not_found() {
        let err = store().delete_survey("never-existed").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound));
    }

    #[tokio::test]
    async fn delete_orphans_responses() {
        let store = store();
        let survey = store
            .create_survey("alice", "Doomed", None, &[choice_question("q1")])
            .await
            .unwrap();
        let answers = HashMap::from([("q1".to_string(), json!("Good"))]);
        store.submit_response(&survey.id, &answers, None).await.unwrap();

        store.delete_survey(&survey.id).await.unwrap();

        // No cascade: the response row survives its survey.
        assert_eq!(store.count_responses(&survey.id).await.unwrap(), 1);
        let err = store.get_survey(&survey.id).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound));
    }

    #[tokio::test]
    async fn responses_are_newest_first() {
        let store = store();
        let survey = store
            .create_survey("alice", "S", None, &[choice_question("q1")])
            .await
            .unwrap();

        let good = HashMap::from([("q1".to_string(), json!("Good"))]);
        let bad = HashMap::from([("q1".to_string(), json!("Bad"))]);
        let first = store.submit_response(&survey.id, &good, None).await.unwrap();
        let second = store
            .submit_response(&survey.id, &bad, Some("b@example.com"))
            .await
            .unwrap();

        let responses = store.list_responses(&survey.id).await.unwrap();
        assert_eq!(
            responses.iter().map(|r| r.id.as_str()).collect::<Vec<_>>(),
            vec![second.id.as_str(), first.id.as_str()]
        );
        assert_eq!(responses[0].respondent_email.as_deref(), Some("b@example.com"));
        assert_eq!(store.count_responses(&survey.id).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn store_accepts_responses_for_inactive_surveys() {
        // The is_active refusal lives in the submit handler, not here.
        let store = store();
        let survey = store
            .create_survey("alice", "Closed", None, &[choice_question("q1")])
            .await
            .unwrap();
        let patch = SurveyPatch {
            is_active: Some(false),
            ..Default::default()
        };
        store.update_survey(&survey.id, &patch).await.unwrap();

        let answers = HashMap::from([("q1".to_string(), json!("Good"))]);
        let response = store.submit_response(&survey.id, &answers, None).await;
        assert!(response.is_ok());
    }

    #[tokio::test]
    async fn profile_upsert_keeps_created_at() {
        let store = store();
        let first = store
            .upsert_profile("alice", "a@example.com", None)
            .await
            .unwrap();
        let second = store
            .upsert_profile("alice", "alice@example.com", Some("Alice"))
            .await
            .unwrap();

        assert_eq!(second.created_at, first.created_at);
        assert_eq!(second.email, "alice@example.com");
        assert_eq!(second.full_name.as_deref(), Some("Alice"));
    }
}
