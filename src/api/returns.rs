//! Return proof submission and review endpoints

use axum::{
    extract::{Path, State},
    Json,
};
use axum_extra::extract::Multipart;
use chrono::{DateTime, Utc};

use crate::{
    error::{AppError, AppResult},
    models::loan::{LoanDetails, ReturnProofMeta, ReturnReview},
};

use super::{parse_field, read_multipart, AuthenticatedUser};

/// Submit return evidence (borrower). Multipart form: the proof photo plus
/// optional capture metadata fields `latitude`, `longitude`, `accuracy_m`,
/// `captured_at` (RFC 3339) and `address`.
#[utoipa::path(
    post,
    path = "/loans/{id}/return",
    tag = "returns",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Loan ID")),
    responses(
        (status = 200, description = "Return submitted for review", body = LoanDetails),
        (status = 400, description = "Missing photo or malformed metadata"),
        (status = 409, description = "Loan is not out with the borrower")
    )
)]
pub async fn submit_return(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(loan_id): Path<i32>,
    multipart: Multipart,
) -> AppResult<Json<LoanDetails>> {
    let (fields, file) = read_multipart(multipart).await?;
    let file = file.ok_or_else(|| AppError::Validation("Proof photo is required".to_string()))?;

    let latitude: Option<f64> = parse_field(&fields, "latitude")?;
    let longitude: Option<f64> = parse_field(&fields, "longitude")?;
    let meta = match (latitude, longitude) {
        (Some(latitude), Some(longitude)) => Some(ReturnProofMeta {
            latitude,
            longitude,
            accuracy_m: parse_field(&fields, "accuracy_m")?,
            captured_at: parse_field::<DateTime<Utc>>(&fields, "captured_at")?
                .unwrap_or_else(Utc::now),
            address: fields.get("address").cloned(),
        }),
        (None, None) => None,
        _ => {
            return Err(AppError::Validation(
                "Latitude and longitude must be provided together".to_string(),
            ))
        }
    };

    state
        .services
        .returns
        .submit(loan_id, claims.user_id, &file.filename, &file.bytes, meta)
        .await?;

    let details = state.services.loans.loan_details(loan_id).await?;
    Ok(Json(details))
}

/// Review submitted return evidence (admin). Multipart form: `approve`
/// (`true`/`false`), optional `fine_amount` and `reason`, optional
/// counter-proof photo when rejecting.
#[utoipa::path(
    post,
    path = "/loans/{id}/return/review",
    tag = "returns",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Loan ID")),
    responses(
        (status = 200, description = "Verdict applied", body = LoanDetails),
        (status = 400, description = "Missing mandatory reason"),
        (status = 409, description = "Loan is not awaiting review")
    )
)]
pub async fn review_return(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(loan_id): Path<i32>,
    multipart: Multipart,
) -> AppResult<Json<LoanDetails>> {
    claims.require_admin()?;

    let (fields, file) = read_multipart(multipart).await?;
    let approve: bool = parse_field(&fields, "approve")?
        .ok_or_else(|| AppError::Validation("Field approve is required".to_string()))?;

    let review = ReturnReview {
        approve,
        fine_amount: parse_field(&fields, "fine_amount")?,
        reason: fields.get("reason").cloned(),
    };
    let admin_proof = file
        .as_ref()
        .map(|f| (f.filename.as_str(), f.bytes.as_slice()));

    state
        .services
        .returns
        .review(loan_id, review, admin_proof)
        .await?;

    let details = state.services.loans.loan_details(loan_id).await?;
    Ok(Json(details))
}
