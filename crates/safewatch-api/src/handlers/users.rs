//! User handlers (`/api/users`)

use axum::{extract::State, http::Method, response::IntoResponse};
use safewatch_common::types::Pagination;
use safewatch_common::Error;
use safewatch_core::deletion::{plan_delete, DeletePlan, DeleteTarget};
use safewatch_core::password::hash_password;
use safewatch_core::users::{validate_new_user, validate_user_changes, NewUserInput, UserChanges};
use safewatch_storage::models::UserFilter;
use safewatch_storage::repository::UserRepository;
use std::sync::Arc;
use tracing::info;

use crate::auth::AppState;
use crate::handlers::auth::login;
use crate::request::ApiRequest;
use crate::response::{ApiResponse, ApiResult};

pub async fn handle(State(state): State<Arc<AppState>>, req: ApiRequest) -> ApiResult {
    let users = UserRepository::new(state.db_pool.pool().clone());

    match (req.method(), req.crud_action()) {
        (&Method::GET, "list") => list(&users, &req).await,
        (&Method::GET, "detail") => detail(&users, &req).await,
        (&Method::GET, "roles") => Ok(ApiResponse::ok(users.roles().await?).into_response()),
        (&Method::POST, "create") => create(&users, &req).await,
        (&Method::POST, "login") => login(&state, &req).await,
        (&Method::PUT, "update") => update(&users, &req).await,
        (&Method::DELETE, "delete") => delete(&users, &req).await,
        _ => Err(req.unknown_action()),
    }
}

async fn list(users: &UserRepository, req: &ApiRequest) -> ApiResult {
    let filter = UserFilter {
        search: req.param("search").map(str::to_string),
        role: req.param("role").map(str::to_string),
        status: req.parse_param("status")?,
    };
    let page = req.page();
    let (rows, total) = users.list(&filter, page).await?;
    Ok(ApiResponse::paginated(rows, Pagination::new(page, total)).into_response())
}

async fn detail(users: &UserRepository, req: &ApiRequest) -> ApiResult {
    let user = users
        .get(req.id()?)
        .await?
        .ok_or_else(|| Error::not_found("User not found"))?;
    Ok(ApiResponse::ok(user).into_response())
}

async fn check_role(users: &UserRepository, role: &str) -> Result<(), Error> {
    if !users.role_exists(role).await? {
        return Err(Error::validation(format!("Invalid role: {}", role)));
    }
    Ok(())
}

async fn create(users: &UserRepository, req: &ApiRequest) -> ApiResult {
    let input: NewUserInput = req.body()?;
    let (user, password) = validate_new_user(input)?;

    check_role(users, &user.role).await?;
    if users.username_exists(&user.username).await? {
        return Err(Error::conflict("Username already exists").into());
    }
    if users.email_exists(&user.email, None).await? {
        return Err(Error::conflict("Email already exists").into());
    }

    let created = users.create(user, hash_password(&password)?).await?;
    info!(user_id = %created.id, username = %created.username, "User created");
    Ok(ApiResponse::created(created)
        .with_message("User created")
        .into_response())
}

async fn update(users: &UserRepository, req: &ApiRequest) -> ApiResult {
    let id = req.id()?;
    let changes: UserChanges = req.body()?;
    let (update, password) = validate_user_changes(changes)?;

    if let Some(role) = &update.role {
        check_role(users, role).await?;
    }
    if let Some(email) = &update.email {
        if users.email_exists(email, Some(id)).await? {
            return Err(Error::conflict("Email already exists").into());
        }
    }
    let password_hash = password.as_deref().map(hash_password).transpose()?;

    let user = users
        .update(id, update, password_hash)
        .await?
        .ok_or_else(|| Error::not_found("User not found"))?;

    info!(user_id = %id, "User updated");
    Ok(ApiResponse::ok(user).with_message("User updated").into_response())
}

/// Users who authored campaigns or alerts are deactivated, others removed
async fn delete(users: &UserRepository, req: &ApiRequest) -> ApiResult {
    let id = req.id()?;
    if users.get(id).await?.is_none() {
        return Err(Error::not_found("User not found").into());
    }

    let plan = plan_delete(DeleteTarget::User {
        authored_records: users.has_authored_records(id).await?,
    });
    match plan {
        DeletePlan::Retire { status, .. } => {
            users.deactivate(id).await?;
            info!(user_id = %id, status, "User retired");
        }
        DeletePlan::Remove { .. } => {
            users.delete(id).await?;
            info!(user_id = %id, "User deleted");
        }
    }
    Ok(ApiResponse::message(plan.message()).into_response())
}
