//! Loan lifecycle endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    error::AppResult,
    models::{
        enums::LoanStatus,
        loan::{CreateLoan, FineSummary, LoanDecision, LoanDetails},
    },
};

use super::AuthenticatedUser;

/// Loan response after a state change
#[derive(Serialize, ToSchema)]
pub struct LoanResponse {
    /// Loan ID
    pub id: i32,
    /// Borrow code for the pickup slip
    pub borrow_code: String,
    /// Stored status after the change
    pub status: LoanStatus,
    /// Due date
    pub expected_return_date: DateTime<Utc>,
    /// Status message
    pub message: String,
}

/// Request a loan (borrower)
#[utoipa::path(
    post,
    path = "/loans",
    tag = "loans",
    security(("bearer_auth" = [])),
    request_body = CreateLoan,
    responses(
        (status = 201, description = "Loan requested", body = LoanResponse),
        (status = 400, description = "Invalid request"),
        (status = 404, description = "Book not found"),
        (status = 422, description = "Out of stock or already borrowed")
    )
)]
pub async fn create_loan(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(request): Json<CreateLoan>,
) -> AppResult<(StatusCode, Json<LoanResponse>)> {
    let loan = state.services.loans.request_loan(claims.user_id, request).await?;

    Ok((
        StatusCode::CREATED,
        Json(LoanResponse {
            id: loan.id,
            borrow_code: loan.borrow_code.clone(),
            status: loan.status,
            expected_return_date: loan.expected_return_date,
            message: "Loan requested, awaiting approval".to_string(),
        }),
    ))
}

/// Approve or reject a pending loan request (admin)
#[utoipa::path(
    post,
    path = "/loans/{id}/decision",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Loan ID")),
    request_body = LoanDecision,
    responses(
        (status = 200, description = "Decision applied", body = LoanResponse),
        (status = 404, description = "Loan not found"),
        (status = 409, description = "Loan is not awaiting a decision"),
        (status = 422, description = "Stock ran out before approval")
    )
)]
pub async fn decide_loan(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(loan_id): Path<i32>,
    Json(decision): Json<LoanDecision>,
) -> AppResult<Json<LoanResponse>> {
    claims.require_admin()?;

    let approve = decision.approve;
    let loan = state
        .services
        .loans
        .decide_request(loan_id, approve, decision.note)
        .await?;

    Ok(Json(LoanResponse {
        id: loan.id,
        borrow_code: loan.borrow_code.clone(),
        status: loan.status,
        expected_return_date: loan.expected_return_date,
        message: if approve {
            "Loan approved".to_string()
        } else {
            "Loan rejected".to_string()
        },
    }))
}

/// Confirm physical handoff of the book (admin)
#[utoipa::path(
    post,
    path = "/loans/{id}/pickup",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Loan ID")),
    responses(
        (status = 200, description = "Handoff confirmed", body = LoanResponse),
        (status = 409, description = "Loan is not approved for pickup")
    )
)]
pub async fn confirm_pickup(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(loan_id): Path<i32>,
) -> AppResult<Json<LoanResponse>> {
    claims.require_admin()?;

    let loan = state.services.loans.confirm_pickup(loan_id).await?;

    Ok(Json(LoanResponse {
        id: loan.id,
        borrow_code: loan.borrow_code.clone(),
        status: loan.status,
        expected_return_date: loan.expected_return_date,
        message: "Handoff confirmed".to_string(),
    }))
}

/// Acknowledge the loan start (borrower)
#[utoipa::path(
    post,
    path = "/loans/{id}/confirm",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Loan ID")),
    responses(
        (status = 200, description = "Borrowing started", body = LoanResponse),
        (status = 409, description = "Loan is not in the taken state")
    )
)]
pub async fn confirm_borrow(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(loan_id): Path<i32>,
) -> AppResult<Json<LoanResponse>> {
    let loan = state
        .services
        .loans
        .confirm_borrow(loan_id, claims.user_id)
        .await?;

    Ok(Json(LoanResponse {
        id: loan.id,
        borrow_code: loan.borrow_code.clone(),
        status: loan.status,
        expected_return_date: loan.expected_return_date,
        message: "Borrowing started".to_string(),
    }))
}

/// Loan details
#[utoipa::path(
    get,
    path = "/loans/{id}",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Loan ID")),
    responses(
        (status = 200, description = "Loan details", body = LoanDetails),
        (status = 404, description = "Loan not found")
    )
)]
pub async fn get_loan(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(loan_id): Path<i32>,
) -> AppResult<Json<LoanDetails>> {
    let details = state.services.loans.loan_details(loan_id).await?;
    claims.require_self_or_admin(details.user_id)?;
    Ok(Json(details))
}

/// Loans of a user
#[utoipa::path(
    get,
    path = "/users/{id}/loans",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "User ID")),
    responses(
        (status = 200, description = "User's loans", body = Vec<LoanDetails>),
        (status = 404, description = "User not found")
    )
)]
pub async fn get_user_loans(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(user_id): Path<i32>,
) -> AppResult<Json<Vec<LoanDetails>>> {
    claims.require_self_or_admin(user_id)?;

    let loans = state.services.loans.user_loans(user_id).await?;
    Ok(Json(loans))
}

/// Fine position of a user: unpaid settled fines plus running accrual
#[utoipa::path(
    get,
    path = "/users/{id}/fines",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "User ID")),
    responses(
        (status = 200, description = "Fine summary", body = FineSummary),
        (status = 404, description = "User not found")
    )
)]
pub async fn get_user_fines(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(user_id): Path<i32>,
) -> AppResult<Json<FineSummary>> {
    claims.require_self_or_admin(user_id)?;

    let summary = state.services.loans.fine_summary(user_id).await?;
    Ok(Json(summary))
}

/// Admin queue: loans in one stored status
#[utoipa::path(
    get,
    path = "/loans/queue/{status}",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(("status" = String, Path, description = "Stored loan status")),
    responses(
        (status = 200, description = "Loans in that status", body = Vec<LoanDetails>),
        (status = 400, description = "Unknown status")
    )
)]
pub async fn loan_queue(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(status): Path<String>,
) -> AppResult<Json<Vec<LoanDetails>>> {
    claims.require_admin()?;

    let status: LoanStatus = status
        .parse()
        .map_err(crate::error::AppError::Validation)?;
    let loans = state.services.loans.queue(status).await?;
    Ok(Json(loans))
}
