//! Survey handlers (`/api/surveys`)

use axum::{extract::State, http::Method, response::IntoResponse};
use chrono::{NaiveDate, Utc};
use safewatch_common::types::{CampaignId, ContactId, Pagination, SurveyId};
use safewatch_common::Error;
use safewatch_core::deletion::{plan_delete, DeletePlan, DeleteTarget};
use safewatch_core::surveys::{analyze_responses, validate_question, validate_submission};
use safewatch_storage::models::{
    CreateQuestion, CreateSurvey, Survey, SurveyFilter, SurveyQuestion, SurveyStatus, UpdateSurvey,
};
use safewatch_storage::repository::{CampaignRepository, ContactRepository, SurveyRepository};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::info;

use crate::auth::AppState;
use crate::request::ApiRequest;
use crate::response::{ApiResponse, ApiResult};

#[derive(Debug, Serialize)]
pub struct SurveyDetail {
    #[serde(flatten)]
    pub survey: Survey,
    pub questions: Vec<SurveyQuestion>,
    pub response_count: i64,
}

#[derive(Debug, Deserialize)]
struct NewSurvey {
    title: Option<String>,
    description: Option<String>,
    campaign_id: Option<CampaignId>,
    status: Option<String>,
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
    is_anonymous: Option<bool>,
    #[serde(default)]
    questions: Vec<CreateQuestion>,
}

#[derive(Debug, Deserialize)]
struct NewResponse {
    survey_id: SurveyId,
    contact_id: Option<ContactId>,
    #[serde(default)]
    answers: Value,
}

pub async fn handle(State(state): State<Arc<AppState>>, req: ApiRequest) -> ApiResult {
    let surveys = SurveyRepository::new(state.db_pool.pool().clone());

    match (req.method(), req.crud_action()) {
        (&Method::GET, "list") => list(&surveys, &req).await,
        (&Method::GET, "detail") => detail(&surveys, &req).await,
        (&Method::GET, "responses") => responses(&surveys, &req).await,
        (&Method::GET, "analytics") => analytics(&surveys, &req).await,
        (&Method::POST, "create") => create(&state, &surveys, &req).await,
        (&Method::POST, "add_question") => add_question(&surveys, &req).await,
        (&Method::POST, "submit_response") => submit_response(&state, &surveys, &req).await,
        (&Method::PUT, "update") => update(&state, &surveys, &req).await,
        (&Method::DELETE, "delete") => delete(&surveys, &req).await,
        (&Method::DELETE, "delete_question") => delete_question(&surveys, &req).await,
        _ => Err(req.unknown_action()),
    }
}

fn not_found() -> Error {
    Error::not_found("Survey not found")
}

/// The target survey: `survey_id`, falling back to `id`
fn survey_id(req: &ApiRequest) -> Result<SurveyId, Error> {
    match req.uuid("survey_id")? {
        Some(id) => Ok(id),
        None => req
            .uuid("id")?
            .ok_or_else(|| Error::validation("survey_id is required")),
    }
}

fn check_window(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Result<(), Error> {
    match (start, end) {
        (Some(start), Some(end)) if end < start => Err(Error::validation(
            "End date must be on or after the start date",
        )),
        _ => Ok(()),
    }
}

async fn check_campaign(state: &AppState, campaign_id: Option<CampaignId>) -> Result<(), Error> {
    let Some(id) = campaign_id else {
        return Ok(());
    };
    if CampaignRepository::new(state.db_pool.pool().clone())
        .exists(id)
        .await?
    {
        Ok(())
    } else {
        Err(Error::not_found("Campaign not found"))
    }
}

async fn list(surveys: &SurveyRepository, req: &ApiRequest) -> ApiResult {
    let filter = SurveyFilter {
        status: req.parse_param("status")?,
        campaign_id: req.uuid("campaign_id")?,
        search: req.param("search").map(str::to_string),
    };
    let page = req.page();
    let (rows, total) = surveys.list(&filter, page).await?;
    Ok(ApiResponse::paginated(rows, Pagination::new(page, total)).into_response())
}

async fn detail(surveys: &SurveyRepository, req: &ApiRequest) -> ApiResult {
    let id = req.id()?;
    let survey = surveys.get(id).await?.ok_or_else(not_found)?;
    Ok(ApiResponse::ok(SurveyDetail {
        survey,
        questions: surveys.questions(id).await?,
        response_count: surveys.response_count(id).await?,
    })
    .into_response())
}

async fn responses(surveys: &SurveyRepository, req: &ApiRequest) -> ApiResult {
    let id = survey_id(req)?;
    if surveys.get(id).await?.is_none() {
        return Err(not_found().into());
    }
    let page = req.page();
    let (rows, total) = surveys.list_responses(id, page).await?;
    Ok(ApiResponse::paginated(rows, Pagination::new(page, total)).into_response())
}

async fn analytics(surveys: &SurveyRepository, req: &ApiRequest) -> ApiResult {
    let id = survey_id(req)?;
    if surveys.get(id).await?.is_none() {
        return Err(not_found().into());
    }
    let questions = surveys.questions(id).await?;
    let responses = surveys.all_responses(id).await?;
    Ok(ApiResponse::ok(analyze_responses(&questions, &responses)).into_response())
}

async fn create(state: &AppState, surveys: &SurveyRepository, req: &ApiRequest) -> ApiResult {
    let input: NewSurvey = req.body()?;
    let title = input
        .title
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .ok_or_else(|| Error::validation("Title is required"))?;
    let status = input
        .status
        .map(|s| s.trim().parse::<SurveyStatus>().map_err(Error::validation))
        .transpose()?;
    check_window(input.start_date, input.end_date)?;
    check_campaign(state, input.campaign_id).await?;

    let questions = input
        .questions
        .into_iter()
        .map(validate_question)
        .collect::<Result<Vec<_>, _>>()?;

    let (survey, questions) = surveys
        .create(
            CreateSurvey {
                title,
                description: input.description,
                campaign_id: input.campaign_id,
                status,
                start_date: input.start_date,
                end_date: input.end_date,
                is_anonymous: input.is_anonymous,
                created_by: state.actor(req),
            },
            questions,
        )
        .await?;

    info!(survey_id = %survey.id, questions = questions.len(), "Survey created");
    Ok(ApiResponse::created(SurveyDetail {
        survey,
        questions,
        response_count: 0,
    })
    .with_message("Survey created")
    .into_response())
}

async fn update(state: &AppState, surveys: &SurveyRepository, req: &ApiRequest) -> ApiResult {
    let id = req.id()?;
    let mut changes: UpdateSurvey = req.body()?;
    let current = surveys.get(id).await?.ok_or_else(not_found)?;

    if let Some(title) = changes.title.take() {
        let title = title.trim().to_string();
        if title.is_empty() {
            return Err(Error::validation("Title must not be empty").into());
        }
        changes.title = Some(title);
    }
    check_window(
        changes.start_date.or(current.start_date),
        changes.end_date.or(current.end_date),
    )?;
    check_campaign(state, changes.campaign_id).await?;

    let survey = surveys.update(id, changes).await?.ok_or_else(not_found)?;
    info!(survey_id = %id, "Survey updated");
    Ok(ApiResponse::ok(survey)
        .with_message("Survey updated")
        .into_response())
}

/// Questions are frozen once responses arrive
async fn add_question(surveys: &SurveyRepository, req: &ApiRequest) -> ApiResult {
    let id = survey_id(req)?;
    let question: CreateQuestion = req.body()?;
    let question = validate_question(question)?;

    if surveys.get(id).await?.is_none() {
        return Err(not_found().into());
    }
    if surveys.response_count(id).await? > 0 {
        return Err(Error::invalid_state("Cannot add questions to a survey with responses").into());
    }

    let question = surveys.add_question(id, question).await?;
    Ok(ApiResponse::created(question)
        .with_message("Question added")
        .into_response())
}

async fn delete_question(surveys: &SurveyRepository, req: &ApiRequest) -> ApiResult {
    let id = survey_id(req)?;
    let question_id = req.require_uuid("question_id")?;

    if surveys.response_count(id).await? > 0 {
        return Err(
            Error::invalid_state("Cannot delete questions from a survey with responses").into(),
        );
    }
    if !surveys.delete_question(id, question_id).await? {
        return Err(Error::not_found("Question not found").into());
    }
    Ok(ApiResponse::message("Question deleted").into_response())
}

async fn submit_response(state: &AppState, surveys: &SurveyRepository, req: &ApiRequest) -> ApiResult {
    let input: NewResponse = req.body()?;
    let survey = surveys.get(input.survey_id).await?.ok_or_else(not_found)?;
    let questions = surveys.questions(survey.id).await?;

    let submission = validate_submission(
        &survey,
        &questions,
        input.contact_id,
        &input.answers,
        Utc::now().date_naive(),
    )?;

    // anonymous surveys have already dropped the contact
    if let Some(contact_id) = submission.contact_id {
        let contacts = ContactRepository::new(state.db_pool.pool().clone());
        if contacts.get(contact_id).await?.is_none() {
            return Err(Error::not_found("Contact not found").into());
        }
    }

    let response = surveys
        .insert_response(survey.id, submission.contact_id, submission.answers)
        .await?;

    info!(survey_id = %survey.id, response_id = %response.id, "Survey response submitted");
    Ok(ApiResponse::created(response)
        .with_message("Response submitted")
        .into_response())
}

/// Surveys with responses are archived rather than removed
async fn delete(surveys: &SurveyRepository, req: &ApiRequest) -> ApiResult {
    let id = req.id()?;
    if surveys.get(id).await?.is_none() {
        return Err(not_found().into());
    }

    let plan = plan_delete(DeleteTarget::Survey {
        responses: surveys.response_count(id).await?,
    });
    match plan {
        DeletePlan::Retire { status, .. } => {
            surveys.archive(id).await?;
            info!(survey_id = %id, status, "Survey retired");
        }
        DeletePlan::Remove { .. } => {
            surveys.delete(id).await?;
            info!(survey_id = %id, "Survey deleted");
        }
    }
    Ok(ApiResponse::message(plan.message()).into_response())
}
