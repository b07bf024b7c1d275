//! HTTP handlers. Each one is a thin binding of a store operation plus
//! the validation that must run before any write; errors surface once,
//! through [`AppError`]'s response mapping.

use std::{collections::HashMap, sync::Arc};

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use crate::{
    error::AppError,
    models::{Profile, Question, Survey, SurveyPatch, SurveyResponse},
    results::{aggregate, SurveyResults},
    state::AppState,
    validate::{validate_answers, validate_new_survey},
};

/// Identity of the authenticated caller. Authentication itself happens
/// upstream; the id arrives on every owner-scoped request as a header.
pub const USER_HEADER: &str = "x-user-id";

fn require_user(headers: &HeaderMap) -> Result<String, AppError> {
    headers
        .get(USER_HEADER)
        .and_then(|value| value.to_str().ok())
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .ok_or(AppError::Unauthorized)
}

#[derive(Deserialize)]
pub struct CreateSurveyRequest {
    pub title: String,
    pub description: Option<String>,
    pub questions: Vec<Question>,
}

#[derive(Serialize)]
pub struct CreatedSurvey {
    #[serde(flatten)]
    pub survey: Survey,
    /// Payload of the shareable link and QR code.
    pub share_url: String,
}

#[derive(Deserialize)]
pub struct SubmitRequest {
    pub answers: HashMap<String, Value>,
    pub respondent_email: Option<String>,
}

#[derive(Deserialize)]
pub struct ProfileRequest {
    pub email: String,
    pub full_name: Option<String>,
}

#[derive(Serialize)]
pub struct DashboardSummary {
    pub surveys: Vec<Survey>,
    pub response_counts: HashMap<String, i64>,
    pub total_responses: i64,
}

pub async fn list_surveys_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<Survey>>, AppError> {
    let user = require_user(&headers)?;
    let surveys = state.store.list_surveys_for_user(&user).await?;
    Ok(Json(surveys))
}

pub async fn create_survey_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<CreateSurveyRequest>,
) -> Result<Json<CreatedSurvey>, AppError> {
    let user = require_user(&headers)?;
    validate_new_survey(&request.title, &request.questions)?;

    let survey = state
        .store
        .create_survey(
            &user,
            &request.title,
            request.description.as_deref(),
            &request.questions,
        )
        .await?;

    info!("Survey {} created by {user}", survey.id);
    let share_url = format!("{}/survey/{}", state.config.public_origin, survey.id);
    Ok(Json(CreatedSurvey { survey, share_url }))
}

pub async fn get_survey_handler(
    State(state): State<Arc<AppState>>,
    Path(survey_id): Path<String>,
) -> Result<Json<Survey>, AppError> {
    let survey = state.store.get_survey(&survey_id).await?;
    Ok(Json(survey))
}

pub async fn update_survey_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(survey_id): Path<String>,
    Json(patch): Json<SurveyPatch>,
) -> Result<Json<Survey>, AppError> {
    let user = require_user(&headers)?;
    let current = state.store.get_survey_for_owner(&survey_id, &user).await?;

    // A patch must leave the survey well formed, so validate the merged
    // title and question list, not just the fields being written.
    let title = patch.title.as_deref().unwrap_or(&current.title);
    let questions = patch.questions.as_deref().unwrap_or(&current.questions);
    validate_new_survey(title, questions)?;

    let updated = state.store.update_survey(&survey_id, &patch).await?;
    Ok(Json(updated))
}

pub async fn delete_survey_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(survey_id): Path<String>,
) -> Result<StatusCode, AppError> {
    let user = require_user(&headers)?;
    state.store.get_survey_for_owner(&survey_id, &user).await?;
    state.store.delete_survey(&survey_id).await?;

    info!("Survey {survey_id} deleted by {user}");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn submit_response_handler(
    State(state): State<Arc<AppState>>,
    Path(survey_id): Path<String>,
    Json(request): Json<SubmitRequest>,
) -> Result<Json<SurveyResponse>, AppError> {
    let survey = state.store.get_survey(&survey_id).await?;
    if !survey.is_active {
        return Err(AppError::Validation(
            "survey is no longer accepting responses".to_string(),
        ));
    }
    validate_answers(&survey, &request.answers)?;

    let response = state
        .store
        .submit_response(&survey_id, &request.answers, request.respondent_email.as_deref())
        .await?;
    Ok(Json(response))
}

pub async fn list_responses_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(survey_id): Path<String>,
) -> Result<Json<Vec<SurveyResponse>>, AppError> {
    let user = require_user(&headers)?;
    state.store.get_survey_for_owner(&survey_id, &user).await?;
    let responses = state.store.list_responses(&survey_id).await?;
    Ok(Json(responses))
}

pub async fn results_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(survey_id): Path<String>,
) -> Result<Json<SurveyResults>, AppError> {
    let user = require_user(&headers)?;
    let survey = state.store.get_survey_for_owner(&survey_id, &user).await?;
    let responses = state.store.list_responses(&survey_id).await?;
    Ok(Json(aggregate(&survey, &responses)))
}

pub async fn dashboard_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<DashboardSummary>, AppError> {
    let user = require_user(&headers)?;
    let surveys = state.store.list_surveys_for_user(&user).await?;

    // One count per survey, fanned out together; a failed count reads
    // as zero rather than failing the whole summary.
    let counts = join_all(surveys.iter().map(|survey| {
        let store = &state.store;
        let id = survey.id.clone();
        async move {
            let count = store.count_responses(&id).await.unwrap_or(0);
            (id, count)
        }
    }))
    .await;

    let response_counts: HashMap<String, i64> = counts.into_iter().collect();
    let total_responses = response_counts.values().sum();

    Ok(Json(DashboardSummary {
        surveys,
        response_counts,
        total_responses,
    }))
}

pub async fn profile_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<ProfileRequest>,
) -> Result<Json<Profile>, AppError> {
    let user = require_user(&headers)?;
    if request.email.trim().is_empty() {
        return Err(AppError::Validation("email must not be empty".to_string()));
    }

    let profile = state
        .store
        .upsert_profile(&user, &request.email, request.full_name.as_deref())
        .await?;
    Ok(Json(profile))
}
