//! OpenAPI documentation

use axum::Router;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{auth, books, health, loans, payments, returns, users};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Pustaka API",
        version = "1.0.0",
        description = "Library Lending Management REST API",
        license(name = "AGPL-3.0", url = "https://www.gnu.org/licenses/agpl-3.0.html")
    ),
    servers(
        (url = "/api/v1", description = "API v1")
    ),
    paths(
        // Health
        health::health_check,
        health::readiness_check,
        // Auth
        auth::login,
        auth::me,
        // Books
        books::list_books,
        books::get_book,
        books::create_book,
        books::update_book,
        books::upload_cover,
        // Users
        users::list_users,
        users::get_user,
        users::create_user,
        users::update_my_profile,
        users::upload_my_photo,
        users::list_notifications,
        users::mark_notification_read,
        users::register_subscription,
        users::user_summary,
        // Loans
        loans::create_loan,
        loans::decide_loan,
        loans::confirm_pickup,
        loans::confirm_borrow,
        loans::get_loan,
        loans::get_user_loans,
        loans::get_user_fines,
        loans::loan_queue,
        // Returns
        returns::submit_return,
        returns::review_return,
        // Payments
        payments::settleable_loans,
        payments::initiate_payment,
        payments::upload_proof,
        payments::verify_payment,
        payments::cancel_payment,
        payments::get_payment,
        payments::get_user_payments,
        payments::pending_payments,
    ),
    components(
        schemas(
            // Books
            crate::models::book::Book,
            crate::models::book::CreateBook,
            crate::models::book::UpdateBook,
            crate::models::book::BookList,
            // Users
            crate::models::user::User,
            crate::models::user::UserShort,
            crate::models::user::CreateUser,
            crate::models::user::UpdateProfile,
            crate::models::user::LoginRequest,
            crate::models::user::LoginResponse,
            // Loans
            crate::models::loan::CreateLoan,
            crate::models::loan::LoanDecision,
            crate::models::loan::ReturnReview,
            crate::models::loan::LoanDetails,
            crate::models::loan::ReturnProofMeta,
            crate::models::loan::FineSummary,
            loans::LoanResponse,
            // Payments
            crate::models::payment::BatchDetails,
            crate::models::payment::InitiatePayment,
            crate::models::payment::PaymentVerdict,
            // Notifications
            crate::models::notification::Notification,
            crate::models::notification::RegisterSubscription,
            // Enums
            crate::models::enums::LoanStatus,
            crate::models::enums::FinePaymentStatus,
            crate::models::enums::PaymentMethod,
            crate::models::enums::UserRole,
            // Errors
            crate::error::ErrorResponse,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "auth", description = "Authentication endpoints"),
        (name = "books", description = "Book catalog management"),
        (name = "users", description = "User management and notifications"),
        (name = "loans", description = "Loan lifecycle"),
        (name = "returns", description = "Return proof review"),
        (name = "payments", description = "Fine payment verification")
    )
)]
pub struct ApiDoc;

/// Create the OpenAPI documentation router
pub fn create_openapi_router() -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
