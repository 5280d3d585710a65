//! Fine payment endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use axum_extra::extract::Multipart;
use uuid::Uuid;
use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    models::{
        loan::Loan,
        payment::{BatchDetails, InitiatePayment, PaymentVerdict},
    },
};

use super::{read_multipart, AuthenticatedUser};

/// Returned loans with fines open for settlement (borrower)
#[utoipa::path(
    get,
    path = "/payments/settleable",
    tag = "payments",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Loans whose fine can enter a batch")
    )
)]
pub async fn settleable_loans(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<Vec<Loan>>> {
    let loans = state.services.payments.settleable_loans(claims.user_id).await?;
    Ok(Json(loans))
}

/// Start a fine settlement batch (borrower)
#[utoipa::path(
    post,
    path = "/payments",
    tag = "payments",
    security(("bearer_auth" = [])),
    request_body = InitiatePayment,
    responses(
        (status = 201, description = "Batch created", body = BatchDetails),
        (status = 400, description = "Invalid request"),
        (status = 409, description = "A loan in the batch is not settleable")
    )
)]
pub async fn initiate_payment(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(request): Json<InitiatePayment>,
) -> AppResult<(StatusCode, Json<BatchDetails>)> {
    request
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let batch = state.services.payments.initiate(claims.user_id, request).await?;
    Ok((StatusCode::CREATED, Json(batch)))
}

/// Upload the payment proof for a bank/QRIS batch (borrower)
#[utoipa::path(
    post,
    path = "/payments/{id}/proof",
    tag = "payments",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Batch ID")),
    responses(
        (status = 200, description = "Proof stored, awaiting verification", body = BatchDetails),
        (status = 400, description = "No file in request"),
        (status = 409, description = "Batch is not awaiting a proof")
    )
)]
pub async fn upload_proof(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(batch_id): Path<Uuid>,
    multipart: Multipart,
) -> AppResult<Json<BatchDetails>> {
    let (_fields, file) = read_multipart(multipart).await?;
    let file = file.ok_or_else(|| AppError::Validation("Proof file is required".to_string()))?;

    let batch = state
        .services
        .payments
        .upload_proof(batch_id, claims.user_id, &file.filename, &file.bytes)
        .await?;

    Ok(Json(batch))
}

/// Verify a pending batch (admin)
#[utoipa::path(
    post,
    path = "/payments/{id}/verify",
    tag = "payments",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Batch ID")),
    request_body = PaymentVerdict,
    responses(
        (status = 200, description = "Verdict applied", body = BatchDetails),
        (status = 400, description = "Missing rejection note"),
        (status = 409, description = "Batch is not pending verification")
    )
)]
pub async fn verify_payment(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(batch_id): Path<Uuid>,
    Json(verdict): Json<PaymentVerdict>,
) -> AppResult<Json<BatchDetails>> {
    claims.require_admin()?;

    let batch = state.services.payments.verify(batch_id, verdict).await?;
    Ok(Json(batch))
}

/// Abandon an unverified batch (borrower)
#[utoipa::path(
    post,
    path = "/payments/{id}/cancel",
    tag = "payments",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Batch ID")),
    responses(
        (status = 200, description = "Batch cancelled", body = BatchDetails),
        (status = 409, description = "Batch already verified")
    )
)]
pub async fn cancel_payment(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(batch_id): Path<Uuid>,
) -> AppResult<Json<BatchDetails>> {
    let batch = state.services.payments.cancel(batch_id, claims.user_id).await?;
    Ok(Json(batch))
}

/// One batch with its loans
#[utoipa::path(
    get,
    path = "/payments/{id}",
    tag = "payments",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Batch ID")),
    responses(
        (status = 200, description = "Batch details", body = BatchDetails),
        (status = 404, description = "Batch not found")
    )
)]
pub async fn get_payment(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(batch_id): Path<Uuid>,
) -> AppResult<Json<BatchDetails>> {
    let batch = state.services.payments.batch_details(batch_id).await?;
    claims.require_self_or_admin(batch.user_id)?;
    Ok(Json(batch))
}

/// Batches of a user
#[utoipa::path(
    get,
    path = "/users/{id}/payments",
    tag = "payments",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "User ID")),
    responses(
        (status = 200, description = "User's batches", body = Vec<BatchDetails>)
    )
)]
pub async fn get_user_payments(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(user_id): Path<i32>,
) -> AppResult<Json<Vec<BatchDetails>>> {
    claims.require_self_or_admin(user_id)?;

    let batches = state.services.payments.user_batches(user_id).await?;
    Ok(Json(batches))
}

/// Admin verification queue
#[utoipa::path(
    get,
    path = "/payments/queue/pending",
    tag = "payments",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Batches pending verification", body = Vec<BatchDetails>)
    )
)]
pub async fn pending_payments(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<Vec<BatchDetails>>> {
    claims.require_admin()?;

    let batches = state.services.payments.pending_batches().await?;
    Ok(Json(batches))
}
