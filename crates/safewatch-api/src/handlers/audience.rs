//! Audience handlers (`/api/audience`): contacts and segments

use axum::{extract::State, http::Method, response::IntoResponse};
use safewatch_common::types::{ContactId, Pagination, SegmentId};
use safewatch_common::Error;
use safewatch_core::audience::{
    check_members_added, check_membership_ids, check_missing_contacts, merge_import_skips,
    prepare_import, validate_contact, validate_contact_update, ContactInput,
};
use safewatch_core::deletion::{plan_delete, DeletePlan, DeleteTarget};
use safewatch_storage::models::{
    Contact, ContactFilter, CreateSegment, Segment, SegmentFilter, UpdateSegment,
};
use safewatch_storage::repository::{ContactRepository, ImportSkip, SegmentRepository};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::info;

use crate::auth::AppState;
use crate::request::ApiRequest;
use crate::response::{ApiResponse, ApiResult};

#[derive(Debug, Serialize)]
pub struct ContactDetail {
    #[serde(flatten)]
    pub contact: Contact,
    pub segments: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct SegmentDetail {
    #[serde(flatten)]
    pub segment: Segment,
    pub eligible_recipients: i64,
    pub contacts: Vec<Contact>,
    pub pagination: Pagination,
}

#[derive(Debug, Serialize)]
pub struct ImportSummary {
    pub imported: usize,
    pub skipped: usize,
    pub errors: Vec<ImportSkip>,
}

#[derive(Debug, Default, Deserialize)]
struct NewSegment {
    name: Option<String>,
    description: Option<String>,
    criteria: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct Membership {
    segment_id: SegmentId,
    #[serde(default)]
    contact_ids: Vec<ContactId>,
}

#[derive(Debug, Default, Deserialize)]
struct ImportRequest {
    #[serde(default)]
    contacts: Vec<Value>,
    segment_id: Option<SegmentId>,
}

pub async fn handle(State(state): State<Arc<AppState>>, req: ApiRequest) -> ApiResult {
    let contacts = ContactRepository::new(state.db_pool.pool().clone());
    let segments = SegmentRepository::new(state.db_pool.pool().clone());

    let action = match req.method() {
        &Method::GET => req.action_or("contacts"),
        &Method::POST => req.action_or("create_contact"),
        _ => req.action_or(""),
    };

    match (req.method(), action) {
        (&Method::GET, "contacts") => list_contacts(&contacts, &req).await,
        (&Method::GET, "contact") => contact_detail(&contacts, &req).await,
        (&Method::GET, "segments") => list_segments(&segments, &req).await,
        (&Method::GET, "segment") => segment_detail(&segments, &req).await,
        (&Method::POST, "create_contact") => create_contact(&contacts, &req).await,
        (&Method::POST, "create_segment") => create_segment(&state, &segments, &req).await,
        (&Method::POST, "add_to_segment") => add_to_segment(&contacts, &segments, &req).await,
        (&Method::POST, "bulk_import") => bulk_import(&contacts, &segments, &req).await,
        (&Method::PUT, "update_contact") => update_contact(&contacts, &req).await,
        (&Method::PUT, "update_segment") => update_segment(&segments, &req).await,
        (&Method::DELETE, "delete_contact") => delete_contact(&contacts, &req).await,
        (&Method::DELETE, "delete_segment") => delete_segment(&segments, &req).await,
        (&Method::DELETE, "remove_from_segment") => remove_from_segment(&segments, &req).await,
        _ => Err(req.unknown_action()),
    }
}

fn contact_not_found() -> Error {
    Error::not_found("Contact not found")
}

fn segment_not_found() -> Error {
    Error::not_found("Segment not found")
}

async fn list_contacts(contacts: &ContactRepository, req: &ApiRequest) -> ApiResult {
    let filter = ContactFilter {
        search: req.param("search").map(str::to_string),
        status: req.parse_param("status")?,
        region: req.param("region").map(str::to_string),
        segment_id: req.uuid("segment_id")?,
    };
    let page = req.page();
    let (rows, total) = contacts.list(&filter, page).await?;
    Ok(ApiResponse::paginated(rows, Pagination::new(page, total)).into_response())
}

async fn contact_detail(contacts: &ContactRepository, req: &ApiRequest) -> ApiResult {
    let id = req.id()?;
    let contact = contacts.get(id).await?.ok_or_else(contact_not_found)?;
    let segments = contacts.segment_names(id).await?;
    Ok(ApiResponse::ok(ContactDetail { contact, segments }).into_response())
}

async fn create_contact(contacts: &ContactRepository, req: &ApiRequest) -> ApiResult {
    let input: ContactInput = req.body()?;
    let contact = validate_contact(input)?;

    if let Some(email) = &contact.email {
        if contacts.email_exists(email, None).await? {
            return Err(Error::conflict("A contact with this email already exists").into());
        }
    }

    let created = contacts.create(contact).await?;
    info!(contact_id = %created.id, "Contact created");
    Ok(ApiResponse::created(created)
        .with_message("Contact created")
        .into_response())
}

async fn update_contact(contacts: &ContactRepository, req: &ApiRequest) -> ApiResult {
    let id = req.id()?;
    let input: ContactInput = req.body()?;
    let update = validate_contact_update(input)?;

    if let Some(email) = &update.email {
        if contacts.email_exists(email, Some(id)).await? {
            return Err(Error::conflict("A contact with this email already exists").into());
        }
    }

    let contact = contacts
        .update(id, update)
        .await?
        .ok_or_else(contact_not_found)?;
    Ok(ApiResponse::ok(contact)
        .with_message("Contact updated")
        .into_response())
}

/// Segment members are deactivated rather than removed
async fn delete_contact(contacts: &ContactRepository, req: &ApiRequest) -> ApiResult {
    let id = req.id()?;
    if contacts.get(id).await?.is_none() {
        return Err(contact_not_found().into());
    }

    let plan = plan_delete(DeleteTarget::Contact {
        in_segment: contacts.has_memberships(id).await?,
    });
    match plan {
        DeletePlan::Retire { status, .. } => {
            contacts.deactivate(id).await?;
            info!(contact_id = %id, status, "Contact retired");
        }
        DeletePlan::Remove { .. } => {
            contacts.delete(id).await?;
            info!(contact_id = %id, "Contact deleted");
        }
    }
    Ok(ApiResponse::message(plan.message()).into_response())
}

async fn list_segments(segments: &SegmentRepository, req: &ApiRequest) -> ApiResult {
    let filter = SegmentFilter {
        search: req.param("search").map(str::to_string),
        status: req.parse_param("status")?,
    };
    let page = req.page();
    let (rows, total) = segments.list(&filter, page).await?;
    Ok(ApiResponse::paginated(rows, Pagination::new(page, total)).into_response())
}

async fn segment_detail(segments: &SegmentRepository, req: &ApiRequest) -> ApiResult {
    let id = req.id()?;
    let segment = segments.get(id).await?.ok_or_else(segment_not_found)?;
    let page = req.page();
    let (contacts, total) = segments.members(id, page).await?;

    Ok(ApiResponse::ok(SegmentDetail {
        segment,
        eligible_recipients: segments.eligible_count(id).await?,
        contacts,
        pagination: Pagination::new(page, total),
    })
    .into_response())
}

async fn create_segment(state: &AppState, segments: &SegmentRepository, req: &ApiRequest) -> ApiResult {
    let input: NewSegment = req.body()?;
    let name = input
        .name
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .ok_or_else(|| Error::validation("Segment name is required"))?;

    let segment = segments
        .create(CreateSegment {
            name,
            description: input.description,
            criteria: input.criteria,
            created_by: state.actor(req),
        })
        .await?;

    info!(segment_id = %segment.id, name = %segment.name, "Segment created");
    Ok(ApiResponse::created(segment)
        .with_message("Segment created")
        .into_response())
}

async fn update_segment(segments: &SegmentRepository, req: &ApiRequest) -> ApiResult {
    let mut update: UpdateSegment = req.body()?;
    if let Some(name) = update.name.take() {
        let name = name.trim().to_string();
        if name.is_empty() {
            return Err(Error::validation("Segment name must not be empty").into());
        }
        update.name = Some(name);
    }

    let segment = segments
        .update(req.id()?, update)
        .await?
        .ok_or_else(segment_not_found)?;
    Ok(ApiResponse::ok(segment)
        .with_message("Segment updated")
        .into_response())
}

/// Segments an alert points at are archived rather than removed
async fn delete_segment(segments: &SegmentRepository, req: &ApiRequest) -> ApiResult {
    let id = req.id()?;
    if !segments.exists(id).await? {
        return Err(segment_not_found().into());
    }

    let plan = plan_delete(DeleteTarget::Segment {
        referenced_by_alerts: segments.referenced_by_alerts(id).await?,
    });
    match plan {
        DeletePlan::Retire { status, .. } => {
            segments.archive(id).await?;
            info!(segment_id = %id, status, "Segment retired");
        }
        DeletePlan::Remove { .. } => {
            segments.delete(id).await?;
            info!(segment_id = %id, "Segment deleted");
        }
    }
    Ok(ApiResponse::message(plan.message()).into_response())
}

async fn add_to_segment(
    contacts: &ContactRepository,
    segments: &SegmentRepository,
    req: &ApiRequest,
) -> ApiResult {
    let input: Membership = req.body()?;
    check_membership_ids(&input.contact_ids)?;
    if !segments.exists(input.segment_id).await? {
        return Err(segment_not_found().into());
    }

    check_missing_contacts(&contacts.missing_ids(&input.contact_ids).await?)?;

    let added = check_members_added(
        segments
            .add_members(input.segment_id, &input.contact_ids)
            .await?,
    )?;

    info!(segment_id = %input.segment_id, added, "Contacts added to segment");
    Ok(ApiResponse::ok(serde_json::json!({ "added": added }))
        .with_message(format!("{} contact(s) added to segment", added))
        .into_response())
}

async fn remove_from_segment(segments: &SegmentRepository, req: &ApiRequest) -> ApiResult {
    let removed = segments
        .remove_member(req.require_uuid("segment_id")?, req.require_uuid("contact_id")?)
        .await?;
    if !removed {
        return Err(Error::not_found("Contact is not in this segment").into());
    }
    Ok(ApiResponse::message("Contact removed from segment").into_response())
}

/// Invalid rows and duplicate emails are reported per row; the rest go in one transaction
async fn bulk_import(
    contacts: &ContactRepository,
    segments: &SegmentRepository,
    req: &ApiRequest,
) -> ApiResult {
    let input: ImportRequest = req.body()?;
    if input.contacts.is_empty() {
        return Err(Error::validation("contacts must not be empty").into());
    }
    if let Some(segment_id) = input.segment_id {
        if !segments.exists(segment_id).await? {
            return Err(segment_not_found().into());
        }
    }

    let (rows, invalid) = prepare_import(input.contacts);
    let (imported, duplicates) = contacts.import(rows, input.segment_id).await?;
    let errors = merge_import_skips(invalid, duplicates);

    info!(imported, skipped = errors.len(), "Contacts imported");
    Ok(ApiResponse::ok(ImportSummary {
        imported,
        skipped: errors.len(),
        errors,
    })
    .with_message(format!("{} contact(s) imported", imported))
    .into_response())
}
