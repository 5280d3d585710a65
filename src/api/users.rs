//! User management endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use axum_extra::extract::Multipart;
use serde_json::{json, Value};
use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    models::{
        notification::{Notification, RegisterSubscription},
        user::{CreateUser, UpdateProfile, User, UserQuery, UserShort},
    },
};

use super::{read_multipart, AuthenticatedUser};

/// List users
#[utoipa::path(
    get,
    path = "/users",
    tag = "users",
    security(("bearer_auth" = [])),
    params(UserQuery),
    responses(
        (status = 200, description = "Paged user list"),
        (status = 403, description = "Admin only")
    )
)]
pub async fn list_users(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Query(query): Query<UserQuery>,
) -> AppResult<Json<Value>> {
    claims.require_admin()?;

    let (items, total) = state.services.users.list(&query).await?;
    Ok(Json(json!({"items": items, "total": total})))
}

/// Get a user
#[utoipa::path(
    get,
    path = "/users/{id}",
    tag = "users",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "User ID")),
    responses(
        (status = 200, description = "User", body = User),
        (status = 404, description = "User not found")
    )
)]
pub async fn get_user(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<User>> {
    claims.require_self_or_admin(id)?;

    let user = state.services.users.get(id).await?;
    Ok(Json(user))
}

/// Register a user account
#[utoipa::path(
    post,
    path = "/users",
    tag = "users",
    security(("bearer_auth" = [])),
    request_body = CreateUser,
    responses(
        (status = 201, description = "User created", body = User),
        (status = 400, description = "Invalid request"),
        (status = 409, description = "Username taken")
    )
)]
pub async fn create_user(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(request): Json<CreateUser>,
) -> AppResult<(StatusCode, Json<User>)> {
    claims.require_admin()?;
    request
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let user = state.services.users.create(request).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// Update own profile
#[utoipa::path(
    put,
    path = "/auth/profile",
    tag = "users",
    security(("bearer_auth" = [])),
    request_body = UpdateProfile,
    responses(
        (status = 200, description = "Profile updated", body = User),
        (status = 401, description = "Wrong current password")
    )
)]
pub async fn update_my_profile(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(request): Json<UpdateProfile>,
) -> AppResult<Json<User>> {
    request
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let user = state
        .services
        .users
        .update_profile(claims.user_id, request)
        .await?;
    Ok(Json(user))
}

/// Upload own profile photo
#[utoipa::path(
    post,
    path = "/auth/profile/photo",
    tag = "users",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Photo stored"),
        (status = 400, description = "No file in request")
    )
)]
pub async fn upload_my_photo(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    multipart: Multipart,
) -> AppResult<Json<Value>> {
    let (_fields, file) = read_multipart(multipart).await?;
    let file = file.ok_or_else(|| AppError::Validation("Photo file is required".to_string()))?;

    let url = state
        .services
        .users
        .set_photo(claims.user_id, &file.filename, &file.bytes)
        .await?;

    Ok(Json(json!({"photo_url": url})))
}

/// Own notification inbox
#[utoipa::path(
    get,
    path = "/notifications",
    tag = "users",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Notifications, newest first", body = Vec<Notification>)
    )
)]
pub async fn list_notifications(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<Vec<Notification>>> {
    let notifications = state.services.users.notifications(claims.user_id, 50).await?;
    Ok(Json(notifications))
}

/// Mark one notification as read
#[utoipa::path(
    post,
    path = "/notifications/{id}/read",
    tag = "users",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Notification ID")),
    responses(
        (status = 204, description = "Marked read"),
        (status = 404, description = "Not found or already read")
    )
)]
pub async fn mark_notification_read(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<StatusCode> {
    state
        .services
        .users
        .mark_notification_read(claims.user_id, id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Register a push device token
#[utoipa::path(
    post,
    path = "/notifications/subscriptions",
    tag = "users",
    security(("bearer_auth" = [])),
    request_body = RegisterSubscription,
    responses(
        (status = 201, description = "Subscription registered")
    )
)]
pub async fn register_subscription(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(request): Json<RegisterSubscription>,
) -> AppResult<(StatusCode, Json<Value>)> {
    request
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let subscription = state
        .services
        .users
        .register_subscription(claims.user_id, &request.device_token)
        .await?;

    Ok((StatusCode::CREATED, Json(json!({"id": subscription.id}))))
}

/// Short profile used by admin screens
#[utoipa::path(
    get,
    path = "/users/{id}/summary",
    tag = "users",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "User ID")),
    responses(
        (status = 200, description = "Ledger summary", body = UserShort)
    )
)]
pub async fn user_summary(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<UserShort>> {
    claims.require_self_or_admin(id)?;

    let user = state.services.users.get(id).await?;
    Ok(Json(UserShort {
        id: user.id,
        username: user.username,
        name: user.name,
        role: user.role,
        unpaid_fines: user.unpaid_fines,
        active_loans: user.active_loans,
    }))
}
