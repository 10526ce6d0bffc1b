//! Campaign handlers (`/api/campaigns`)

use axum::{extract::State, http::Method, response::IntoResponse};
use chrono::NaiveDate;
use safewatch_common::types::{CampaignId, Pagination, UserId};
use safewatch_common::Error;
use safewatch_core::campaigns::{check_budget, check_dates, check_transition};
use safewatch_core::deletion::{plan_delete, DeletePlan, DeleteTarget};
use safewatch_storage::models::{
    Campaign, CampaignEvent, CampaignFilter, CampaignMilestone, CampaignObjective, CampaignStatus,
    Collaborator, CollaboratorRole, CreateCampaign, CreateEvent, CreateMilestone, CreateObjective,
    UpdateCampaign, UpdateObjective,
};
use safewatch_storage::repository::{CampaignRepository, UserRepository};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use crate::auth::AppState;
use crate::request::ApiRequest;
use crate::response::{ApiResponse, ApiResult};

/// Campaign with every sub-entity
#[derive(Debug, Serialize)]
pub struct CampaignDetail {
    #[serde(flatten)]
    pub campaign: Campaign,
    pub objectives: Vec<CampaignObjective>,
    pub milestones: Vec<CampaignMilestone>,
    pub collaborators: Vec<Collaborator>,
    pub events: Vec<CampaignEvent>,
    pub alert_count: i64,
    pub survey_count: i64,
}

/// Campaign fields as sent on create and update; enums arrive as text
#[derive(Debug, Default, Deserialize)]
struct CampaignInput {
    name: Option<String>,
    description: Option<String>,
    category: Option<String>,
    priority: Option<String>,
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
    budget: Option<f64>,
    target_audience: Option<String>,
    region: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct StatusChange {
    #[serde(default)]
    status: String,
}

#[derive(Debug, Deserialize)]
struct NewCollaborator {
    campaign_id: CampaignId,
    user_id: UserId,
    role: Option<CollaboratorRole>,
}

pub async fn handle(State(state): State<Arc<AppState>>, req: ApiRequest) -> ApiResult {
    let campaigns = CampaignRepository::new(state.db_pool.pool().clone());

    match (req.method(), req.crud_action()) {
        (&Method::GET, "list") => list(&campaigns, &req).await,
        (&Method::GET, "detail") => detail(&campaigns, &req).await,
        (&Method::POST, "create") => create(&state, &campaigns, &req).await,
        (&Method::POST, "add_objective") => add_objective(&campaigns, &req).await,
        (&Method::POST, "add_milestone") => add_milestone(&campaigns, &req).await,
        (&Method::POST, "add_collaborator") => add_collaborator(&state, &campaigns, &req).await,
        (&Method::POST, "add_event") => add_event(&campaigns, &req).await,
        (&Method::PUT, "update") => update(&campaigns, &req).await,
        (&Method::PUT, "update_status") => update_status(&campaigns, &req).await,
        (&Method::PUT, "update_objective") => update_objective(&campaigns, &req).await,
        (&Method::PUT, "complete_milestone") => complete_milestone(&campaigns, &req).await,
        (&Method::DELETE, "delete") => delete(&campaigns, &req).await,
        (&Method::DELETE, "delete_objective") => {
            remove(campaigns.delete_objective(req.id()?).await?, "Objective")
        }
        (&Method::DELETE, "delete_milestone") => {
            remove(campaigns.delete_milestone(req.id()?).await?, "Milestone")
        }
        (&Method::DELETE, "delete_event") => {
            remove(campaigns.delete_event(req.id()?).await?, "Event")
        }
        (&Method::DELETE, "remove_collaborator") => {
            let removed = campaigns
                .remove_collaborator(req.require_uuid("campaign_id")?, req.require_uuid("user_id")?)
                .await?;
            remove(removed, "Collaborator")
        }
        _ => Err(req.unknown_action()),
    }
}

fn not_found() -> Error {
    Error::not_found("Campaign not found")
}

fn parse_enum<T: std::str::FromStr<Err = String>>(value: Option<String>) -> Result<Option<T>, Error> {
    value
        .map(|v| v.trim().parse::<T>().map_err(Error::validation))
        .transpose()
}

fn required_text(value: Option<String>, field: &str) -> Result<String, Error> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| Error::validation(format!("{} is required", field)))
}

async fn require_campaign(campaigns: &CampaignRepository, id: CampaignId) -> Result<(), Error> {
    if campaigns.exists(id).await? {
        Ok(())
    } else {
        Err(not_found())
    }
}

fn remove(removed: bool, what: &str) -> ApiResult {
    if !removed {
        return Err(Error::not_found(format!("{} not found", what)).into());
    }
    Ok(ApiResponse::message(format!("{} removed", what)).into_response())
}

async fn list(campaigns: &CampaignRepository, req: &ApiRequest) -> ApiResult {
    let filter = CampaignFilter {
        status: req.parse_param("status")?,
        category: req.parse_param("category")?,
        priority: req.parse_param("priority")?,
        search: req.param("search").map(str::to_string),
    };
    let page = req.page();
    let (rows, total) = campaigns.list(&filter, page).await?;
    Ok(ApiResponse::paginated(rows, Pagination::new(page, total)).into_response())
}

async fn detail(campaigns: &CampaignRepository, req: &ApiRequest) -> ApiResult {
    let id = req.id()?;
    let campaign = campaigns.get(id).await?.ok_or_else(not_found)?;
    let (alert_count, survey_count) = campaigns.dependent_counts(id).await?;

    Ok(ApiResponse::ok(CampaignDetail {
        campaign,
        objectives: campaigns.objectives(id).await?,
        milestones: campaigns.milestones(id).await?,
        collaborators: campaigns.collaborators(id).await?,
        events: campaigns.events(id).await?,
        alert_count,
        survey_count,
    })
    .into_response())
}

async fn create(state: &AppState, campaigns: &CampaignRepository, req: &ApiRequest) -> ApiResult {
    let input: CampaignInput = req.body()?;

    let name = required_text(input.name, "Name")?;
    let category = parse_enum(input.category)?
        .ok_or_else(|| Error::validation("Category is required"))?;
    let start_date = input
        .start_date
        .ok_or_else(|| Error::validation("Start date is required"))?;
    check_dates(start_date, input.end_date)?;
    check_budget(input.budget)?;

    let campaign = campaigns
        .create(CreateCampaign {
            name,
            description: input.description,
            category,
            priority: parse_enum(input.priority)?,
            start_date,
            end_date: input.end_date,
            budget: input.budget,
            target_audience: input.target_audience,
            region: input.region,
            created_by: state.actor(req),
        })
        .await?;

    info!(campaign_id = %campaign.id, name = %campaign.name, "Campaign created");
    Ok(ApiResponse::created(campaign)
        .with_message("Campaign created")
        .into_response())
}

async fn update(campaigns: &CampaignRepository, req: &ApiRequest) -> ApiResult {
    let id = req.id()?;
    let changes: CampaignInput = req.body()?;
    let current = campaigns.get(id).await?.ok_or_else(not_found)?;

    let name = match changes.name {
        Some(name) => Some(required_text(Some(name), "Name")?),
        None => None,
    };
    let start = changes.start_date.unwrap_or(current.start_date);
    check_dates(start, changes.end_date.or(current.end_date))?;
    check_budget(changes.budget)?;

    let updated = campaigns
        .update(
            id,
            UpdateCampaign {
                name,
                description: changes.description,
                category: parse_enum(changes.category)?,
                priority: parse_enum(changes.priority)?,
                start_date: changes.start_date,
                end_date: changes.end_date,
                budget: changes.budget,
                target_audience: changes.target_audience,
                region: changes.region,
            },
        )
        .await?
        .ok_or_else(not_found)?;

    info!(campaign_id = %id, "Campaign updated");
    Ok(ApiResponse::ok(updated)
        .with_message("Campaign updated")
        .into_response())
}

async fn update_status(campaigns: &CampaignRepository, req: &ApiRequest) -> ApiResult {
    let id = req.id()?;
    let body: StatusChange = req.body()?;
    let to: CampaignStatus = parse_enum(Some(body.status))?
        .ok_or_else(|| Error::validation("Status is required"))?;

    let current = campaigns.get(id).await?.ok_or_else(not_found)?;
    let from = current
        .status_enum()
        .ok_or_else(|| Error::Internal(format!("Unknown campaign status: {}", current.status)))?;
    check_transition(from, to)?;

    let updated = campaigns
        .transition_status(id, from, to)
        .await?
        .ok_or_else(|| Error::invalid_state("Campaign status changed by another request"))?;

    info!(campaign_id = %id, from = %from, to = %to, "Campaign status changed");
    Ok(ApiResponse::ok(updated)
        .with_message(format!("Campaign status changed to {}", to))
        .into_response())
}

async fn add_objective(campaigns: &CampaignRepository, req: &ApiRequest) -> ApiResult {
    let mut input: CreateObjective = req.body()?;
    input.title = required_text(Some(input.title), "Title")?;
    require_campaign(campaigns, input.campaign_id).await?;

    let objective = campaigns.add_objective(input).await?;
    Ok(ApiResponse::created(objective)
        .with_message("Objective added")
        .into_response())
}

async fn update_objective(campaigns: &CampaignRepository, req: &ApiRequest) -> ApiResult {
    let input: UpdateObjective = req.body()?;
    if input.current_value.is_some_and(|v| v < 0.0) {
        return Err(Error::validation("Current value must not be negative").into());
    }

    let objective = campaigns
        .update_objective(req.id()?, input)
        .await?
        .ok_or_else(|| Error::not_found("Objective not found"))?;
    Ok(ApiResponse::ok(objective)
        .with_message("Objective updated")
        .into_response())
}

async fn add_milestone(campaigns: &CampaignRepository, req: &ApiRequest) -> ApiResult {
    let mut input: CreateMilestone = req.body()?;
    input.title = required_text(Some(input.title), "Title")?;
    require_campaign(campaigns, input.campaign_id).await?;

    let milestone = campaigns.add_milestone(input).await?;
    Ok(ApiResponse::created(milestone)
        .with_message("Milestone added")
        .into_response())
}

async fn complete_milestone(campaigns: &CampaignRepository, req: &ApiRequest) -> ApiResult {
    let milestone = campaigns
        .complete_milestone(req.id()?)
        .await?
        .ok_or_else(|| Error::not_found("Pending milestone not found"))?;
    Ok(ApiResponse::ok(milestone)
        .with_message("Milestone completed")
        .into_response())
}

async fn add_collaborator(
    state: &AppState,
    campaigns: &CampaignRepository,
    req: &ApiRequest,
) -> ApiResult {
    let input: NewCollaborator = req.body()?;
    require_campaign(campaigns, input.campaign_id).await?;

    let users = UserRepository::new(state.db_pool.pool().clone());
    if users.get(input.user_id).await?.is_none() {
        return Err(Error::not_found("User not found").into());
    }

    campaigns
        .add_collaborator(
            input.campaign_id,
            input.user_id,
            input.role.unwrap_or(CollaboratorRole::Viewer),
        )
        .await?;

    let collaborators = campaigns.collaborators(input.campaign_id).await?;
    Ok(ApiResponse::created(collaborators)
        .with_message("Collaborator added")
        .into_response())
}

async fn add_event(campaigns: &CampaignRepository, req: &ApiRequest) -> ApiResult {
    let mut input: CreateEvent = req.body()?;
    input.title = required_text(Some(input.title), "Title")?;
    require_campaign(campaigns, input.campaign_id).await?;

    let event = campaigns.add_event(input).await?;
    Ok(ApiResponse::created(event)
        .with_message("Event added")
        .into_response())
}

/// Archived when alerts or surveys reference it, otherwise removed with its sub-entities
async fn delete(campaigns: &CampaignRepository, req: &ApiRequest) -> ApiResult {
    let id = req.id()?;
    require_campaign(campaigns, id).await?;

    let (alerts, surveys) = campaigns.dependent_counts(id).await?;
    let plan = plan_delete(DeleteTarget::Campaign { alerts, surveys });
    match plan {
        DeletePlan::Retire { status, .. } => {
            campaigns.archive(id).await?;
            info!(campaign_id = %id, alerts, surveys, status, "Campaign retired");
        }
        DeletePlan::Remove { .. } => {
            campaigns.delete(id).await?;
            info!(campaign_id = %id, "Campaign deleted");
        }
    }
    Ok(ApiResponse::message(plan.message()).into_response())
}
