//! API integration tests
//!
//! Exercise the loan lifecycle and fine settlement against a running server
//! with a seeded admin (admin/admin) and members (budi/budi123, siti/siti123),
//! using the default configuration (penalty of 1000 per day).

use reqwest::{multipart, Client};
use serde_json::{json, Value};

const BASE_URL: &str = "http://localhost:8080/api/v1";
const PENALTY_PER_DAY: i64 = 1000;

/// Helper to log in and get a bearer token
async fn get_token(client: &Client, username: &str, password: &str) -> String {
    let response = client
        .post(format!("{}/auth/login", BASE_URL))
        .json(&json!({
            "username": username,
            "password": password
        }))
        .send()
        .await
        .expect("Failed to send login request");

    let body: Value = response.json().await.expect("Failed to parse login response");
    body["token"].as_str().expect("No token in response").to_string()
}

async fn admin_token(client: &Client) -> String {
    get_token(client, "admin", "admin").await
}

async fn member_token(client: &Client) -> String {
    get_token(client, "budi", "budi123").await
}

/// Create a book with one copy and return its id
async fn create_book(client: &Client, token: &str, title: &str) -> i64 {
    let response = client
        .post(format!("{}/books", BASE_URL))
        .header("Authorization", format!("Bearer {}", token))
        .json(&json!({
            "title": title,
            "author": "Pramoedya Ananta Toer",
            "total_stock": 1
        }))
        .send()
        .await
        .expect("Failed to create book");

    assert_eq!(response.status(), 201);
    let body: Value = response.json().await.expect("Failed to parse book response");
    body["id"].as_i64().expect("No book id")
}

/// Walk a fresh loan to the borrowing state; the due date may be in the past
/// to provoke fines.
async fn loan_to_borrowing(
    client: &Client,
    admin: &str,
    member: &str,
    book_id: i64,
    expected_return_date: &str,
) -> i64 {
    let response = client
        .post(format!("{}/loans", BASE_URL))
        .header("Authorization", format!("Bearer {}", member))
        .json(&json!({
            "book_id": book_id,
            "expected_return_date": expected_return_date
        }))
        .send()
        .await
        .expect("Failed to request loan");
    assert_eq!(response.status(), 201);
    let body: Value = response.json().await.expect("Failed to parse loan response");
    let loan_id = body["id"].as_i64().expect("No loan id");

    let response = client
        .post(format!("{}/loans/{}/decision", BASE_URL, loan_id))
        .header("Authorization", format!("Bearer {}", admin))
        .json(&json!({"approve": true}))
        .send()
        .await
        .expect("Failed to approve loan");
    assert!(response.status().is_success());

    let response = client
        .post(format!("{}/loans/{}/pickup", BASE_URL, loan_id))
        .header("Authorization", format!("Bearer {}", admin))
        .send()
        .await
        .expect("Failed to confirm pickup");
    assert!(response.status().is_success());

    let response = client
        .post(format!("{}/loans/{}/confirm", BASE_URL, loan_id))
        .header("Authorization", format!("Bearer {}", member))
        .send()
        .await
        .expect("Failed to confirm borrow");
    assert!(response.status().is_success());

    loan_id
}

/// Submit a return proof photo with capture metadata
async fn submit_return(client: &Client, member: &str, loan_id: i64) {
    let form = multipart::Form::new()
        .part(
            "photo",
            multipart::Part::bytes(vec![0xFF, 0xD8, 0xFF, 0xE0])
                .file_name("bukti.jpg")
                .mime_str("image/jpeg")
                .unwrap(),
        )
        .text("latitude", "-6.200000")
        .text("longitude", "106.816666")
        .text("accuracy_m", "12.5")
        .text("address", "Perpustakaan Pusat, Jakarta");

    let response = client
        .post(format!("{}/loans/{}/return", BASE_URL, loan_id))
        .header("Authorization", format!("Bearer {}", member))
        .multipart(form)
        .send()
        .await
        .expect("Failed to submit return");
    assert!(response.status().is_success());

    let body: Value = response.json().await.expect("Failed to parse return response");
    assert_eq!(body["status"], "ready_for_return");
}

/// Approve a submitted return with no manual fine, returning the loan body
async fn approve_return(client: &Client, admin: &str, loan_id: i64) -> Value {
    let form = multipart::Form::new().text("approve", "true");

    let response = client
        .post(format!("{}/loans/{}/return/review", BASE_URL, loan_id))
        .header("Authorization", format!("Bearer {}", admin))
        .multipart(form)
        .send()
        .await
        .expect("Failed to review return");
    assert!(response.status().is_success());

    response.json().await.expect("Failed to parse review response")
}

/// A date `days` away from now, RFC 3339 (negative = past)
fn days_from_now(days: i64) -> String {
    (chrono::Utc::now() + chrono::Duration::days(days)).to_rfc3339()
}

#[tokio::test]
#[ignore] // Run with: cargo test -- --ignored
async fn test_health_check() {
    let client = Client::new();

    let response = client
        .get(format!("{}/health", BASE_URL))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());

    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
#[ignore]
async fn test_login_invalid_credentials() {
    let client = Client::new();

    let response = client
        .post(format!("{}/auth/login", BASE_URL))
        .json(&json!({
            "username": "admin",
            "password": "wrong"
        }))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), 401);
}

#[tokio::test]
#[ignore]
async fn test_unauthorized_access() {
    let client = Client::new();

    let response = client
        .get(format!("{}/books", BASE_URL))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), 401);
}

#[tokio::test]
#[ignore]
async fn test_overdue_return_accrues_daily_fine_and_restores_stock() {
    let client = Client::new();
    let admin = admin_token(&client).await;
    let member = member_token(&client).await;

    let book_id = create_book(&client, &admin, "Bumi Manusia (fine test)").await;
    // Due 5 days ago: the approved return must carry 5 days of fines
    let loan_id = loan_to_borrowing(&client, &admin, &member, book_id, &days_from_now(-5)).await;

    submit_return(&client, &member, loan_id).await;
    let loan = approve_return(&client, &admin, loan_id).await;

    assert_eq!(loan["status"], "returned");
    assert_eq!(loan["fine_amount"].as_i64().unwrap(), 5 * PENALTY_PER_DAY);
    assert!(loan["actual_return_date"].is_string());

    // Stock restored to 1
    let response = client
        .get(format!("{}/books/{}", BASE_URL, book_id))
        .header("Authorization", format!("Bearer {}", admin))
        .send()
        .await
        .expect("Failed to fetch book");
    let book: Value = response.json().await.expect("Failed to parse book");
    assert_eq!(book["available_stock"].as_i64().unwrap(), 1);
}

#[tokio::test]
#[ignore]
async fn test_on_time_return_has_no_fine() {
    let client = Client::new();
    let admin = admin_token(&client).await;
    let member = member_token(&client).await;

    let book_id = create_book(&client, &admin, "Laskar Pelangi (on time)").await;
    // Due within the hour: returning now is on time regardless of hour
    let due = (chrono::Utc::now() + chrono::Duration::hours(1)).to_rfc3339();
    let loan_id = loan_to_borrowing(&client, &admin, &member, book_id, &due).await;

    submit_return(&client, &member, loan_id).await;
    let loan = approve_return(&client, &admin, loan_id).await;

    assert_eq!(loan["status"], "returned");
    assert_eq!(loan["fine_amount"].as_i64().unwrap(), 0);
}

#[tokio::test]
#[ignore]
async fn test_second_request_for_same_book_is_refused() {
    let client = Client::new();
    let admin = admin_token(&client).await;
    let member = member_token(&client).await;

    let book_id = create_book(&client, &admin, "Cantik Itu Luka (double)").await;
    let _loan_id = loan_to_borrowing(&client, &admin, &member, book_id, &days_from_now(7)).await;

    let response = client
        .post(format!("{}/loans", BASE_URL))
        .header("Authorization", format!("Bearer {}", member))
        .json(&json!({
            "book_id": book_id,
            "expected_return_date": days_from_now(7)
        }))
        .send()
        .await
        .expect("Failed to send request");

    // Distinguishable "already borrowed" error, not a generic failure
    assert_eq!(response.status(), 422);
    let body: Value = response.json().await.expect("Failed to parse error");
    assert_eq!(body["error"], "AlreadyBorrowed");
}

#[tokio::test]
#[ignore]
async fn test_return_rejection_keeps_loan_active_with_pending_fine() {
    let client = Client::new();
    let admin = admin_token(&client).await;
    let member = member_token(&client).await;

    let book_id = create_book(&client, &admin, "Perahu Kertas (reject)").await;
    let loan_id = loan_to_borrowing(&client, &admin, &member, book_id, &days_from_now(-2)).await;
    submit_return(&client, &member, loan_id).await;

    let form = multipart::Form::new()
        .text("approve", "false")
        .text("reason", "wrong location")
        .text("fine_amount", "5000");

    let response = client
        .post(format!("{}/loans/{}/return/review", BASE_URL, loan_id))
        .header("Authorization", format!("Bearer {}", admin))
        .multipart(form)
        .send()
        .await
        .expect("Failed to review return");
    assert!(response.status().is_success());

    let loan: Value = response.json().await.expect("Failed to parse loan");
    // Back to an active status (overdue classification, since it is late)
    assert_eq!(loan["status"], "overdue");
    assert_eq!(loan["pending_fine"].as_i64().unwrap(), 5000);
    assert!(loan["actual_return_date"].is_null());
}

#[tokio::test]
#[ignore]
async fn test_reject_without_reason_is_a_validation_error() {
    let client = Client::new();
    let admin = admin_token(&client).await;
    let member = member_token(&client).await;

    let book_id = create_book(&client, &admin, "Supernova (no reason)").await;
    let loan_id = loan_to_borrowing(&client, &admin, &member, book_id, &days_from_now(3)).await;
    submit_return(&client, &member, loan_id).await;

    let form = multipart::Form::new().text("approve", "false");

    let response = client
        .post(format!("{}/loans/{}/return/review", BASE_URL, loan_id))
        .header("Authorization", format!("Bearer {}", admin))
        .multipart(form)
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), 400);
}

#[tokio::test]
#[ignore]
async fn test_qris_payment_reject_returns_to_awaiting_proof() {
    let client = Client::new();
    let admin = admin_token(&client).await;
    let member = member_token(&client).await;

    let book_id = create_book(&client, &admin, "Ronggeng Dukuh Paruk (qris)").await;
    // 10 days late at 1000/day = 10000 fine
    let loan_id = loan_to_borrowing(&client, &admin, &member, book_id, &days_from_now(-10)).await;
    submit_return(&client, &member, loan_id).await;
    approve_return(&client, &admin, loan_id).await;

    // Unpaid ledger before settlement
    let me: Value = client
        .get(format!("{}/auth/me", BASE_URL))
        .header("Authorization", format!("Bearer {}", member))
        .send()
        .await
        .expect("Failed to fetch profile")
        .json()
        .await
        .expect("Failed to parse profile");
    let unpaid_before = me["unpaid_fines"].as_i64().unwrap();

    // Initiate via QRIS
    let response = client
        .post(format!("{}/payments", BASE_URL))
        .header("Authorization", format!("Bearer {}", member))
        .json(&json!({"loan_ids": [loan_id], "method": "qris"}))
        .send()
        .await
        .expect("Failed to initiate payment");
    assert_eq!(response.status(), 201);
    let batch: Value = response.json().await.expect("Failed to parse batch");
    let batch_id = batch["id"].as_str().expect("No batch id").to_string();
    assert_eq!(batch["status"], "awaiting_proof");
    assert_eq!(batch["total_amount"].as_i64().unwrap(), 10 * PENALTY_PER_DAY);

    // Upload proof
    let form = multipart::Form::new().part(
        "proof",
        multipart::Part::bytes(vec![0xFF, 0xD8, 0xFF, 0xE0])
            .file_name("transfer.jpg")
            .mime_str("image/jpeg")
            .unwrap(),
    );
    let response = client
        .post(format!("{}/payments/{}/proof", BASE_URL, batch_id))
        .header("Authorization", format!("Bearer {}", member))
        .multipart(form)
        .send()
        .await
        .expect("Failed to upload proof");
    assert!(response.status().is_success());
    let batch: Value = response.json().await.expect("Failed to parse batch");
    assert_eq!(batch["status"], "pending_verification");

    // Admin rejects: back to awaiting_proof, ledger untouched
    let response = client
        .post(format!("{}/payments/{}/verify", BASE_URL, batch_id))
        .header("Authorization", format!("Bearer {}", admin))
        .json(&json!({"approve": false, "note": "blurry"}))
        .send()
        .await
        .expect("Failed to verify payment");
    assert!(response.status().is_success());
    let batch: Value = response.json().await.expect("Failed to parse batch");
    assert_eq!(batch["status"], "awaiting_proof");
    assert_eq!(batch["admin_note"], "blurry");

    let me: Value = client
        .get(format!("{}/auth/me", BASE_URL))
        .header("Authorization", format!("Bearer {}", member))
        .send()
        .await
        .expect("Failed to fetch profile")
        .json()
        .await
        .expect("Failed to parse profile");
    assert_eq!(me["unpaid_fines"].as_i64().unwrap(), unpaid_before);
}

#[tokio::test]
#[ignore]
async fn test_payment_approval_settles_batch_and_ledger_atomically() {
    let client = Client::new();
    let admin = admin_token(&client).await;
    let member = member_token(&client).await;

    let book_id = create_book(&client, &admin, "Atheis (settle)").await;
    let loan_id = loan_to_borrowing(&client, &admin, &member, book_id, &days_from_now(-3)).await;
    submit_return(&client, &member, loan_id).await;
    approve_return(&client, &admin, loan_id).await;

    let me: Value = client
        .get(format!("{}/auth/me", BASE_URL))
        .header("Authorization", format!("Bearer {}", member))
        .send()
        .await
        .expect("Failed to fetch profile")
        .json()
        .await
        .expect("Failed to parse profile");
    let unpaid_before = me["unpaid_fines"].as_i64().unwrap();

    let response = client
        .post(format!("{}/payments", BASE_URL))
        .header("Authorization", format!("Bearer {}", member))
        .json(&json!({"loan_ids": [loan_id], "method": "cash"}))
        .send()
        .await
        .expect("Failed to initiate payment");
    assert_eq!(response.status(), 201);
    let batch: Value = response.json().await.expect("Failed to parse batch");
    let batch_id = batch["id"].as_str().expect("No batch id").to_string();
    // Cash skips the proof stage
    assert_eq!(batch["status"], "pending_verification");
    let total = batch["total_amount"].as_i64().unwrap();
    assert_eq!(total, 3 * PENALTY_PER_DAY);

    let response = client
        .post(format!("{}/payments/{}/verify", BASE_URL, batch_id))
        .header("Authorization", format!("Bearer {}", admin))
        .json(&json!({"approve": true}))
        .send()
        .await
        .expect("Failed to verify payment");
    assert!(response.status().is_success());
    let batch: Value = response.json().await.expect("Failed to parse batch");
    assert_eq!(batch["status"], "paid");

    // Loan and ledger settled together
    let loan: Value = client
        .get(format!("{}/loans/{}", BASE_URL, loan_id))
        .header("Authorization", format!("Bearer {}", member))
        .send()
        .await
        .expect("Failed to fetch loan")
        .json()
        .await
        .expect("Failed to parse loan");
    assert_eq!(loan["fine_payment_status"], "paid");
    assert!(loan["fine_payment_at"].is_string());

    let me: Value = client
        .get(format!("{}/auth/me", BASE_URL))
        .header("Authorization", format!("Bearer {}", member))
        .send()
        .await
        .expect("Failed to fetch profile")
        .json()
        .await
        .expect("Failed to parse profile");
    assert_eq!(me["unpaid_fines"].as_i64().unwrap(), unpaid_before - total);
}

#[tokio::test]
#[ignore]
async fn test_batch_with_paid_loan_is_refused_whole() {
    let client = Client::new();
    let admin = admin_token(&client).await;
    let member = member_token(&client).await;

    // Settle one loan fully
    let paid_book = create_book(&client, &admin, "Salah Asuhan (paid)").await;
    let paid_loan = loan_to_borrowing(&client, &admin, &member, paid_book, &days_from_now(-1)).await;
    submit_return(&client, &member, paid_loan).await;
    approve_return(&client, &admin, paid_loan).await;

    let response = client
        .post(format!("{}/payments", BASE_URL))
        .header("Authorization", format!("Bearer {}", member))
        .json(&json!({"loan_ids": [paid_loan], "method": "cash"}))
        .send()
        .await
        .expect("Failed to initiate payment");
    let batch: Value = response.json().await.expect("Failed to parse batch");
    let batch_id = batch["id"].as_str().expect("No batch id").to_string();
    client
        .post(format!("{}/payments/{}/verify", BASE_URL, batch_id))
        .header("Authorization", format!("Bearer {}", admin))
        .json(&json!({"approve": true}))
        .send()
        .await
        .expect("Failed to verify payment");

    // Second loan with an open fine
    let open_book = create_book(&client, &admin, "Sitti Nurbaya (open)").await;
    let open_loan = loan_to_borrowing(&client, &admin, &member, open_book, &days_from_now(-2)).await;
    submit_return(&client, &member, open_loan).await;
    approve_return(&client, &admin, open_loan).await;

    // Mixed batch: the paid loan poisons the whole initiation
    let response = client
        .post(format!("{}/payments", BASE_URL))
        .header("Authorization", format!("Bearer {}", member))
        .json(&json!({"loan_ids": [open_loan, paid_loan], "method": "bank"}))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 409);

    // The open loan is untouched and still settleable alone
    let loan: Value = client
        .get(format!("{}/loans/{}", BASE_URL, open_loan))
        .header("Authorization", format!("Bearer {}", member))
        .send()
        .await
        .expect("Failed to fetch loan")
        .json()
        .await
        .expect("Failed to parse loan");
    assert_eq!(loan["fine_payment_status"], "none");
    assert!(loan["payment_batch_id"].is_null());
}

#[tokio::test]
#[ignore]
async fn test_concurrent_return_approvals_have_one_winner() {
    let client = Client::new();
    let admin = admin_token(&client).await;
    let member = member_token(&client).await;

    let book_id = create_book(&client, &admin, "Olenka (race)").await;
    let loan_id = loan_to_borrowing(&client, &admin, &member, book_id, &days_from_now(1)).await;
    submit_return(&client, &member, loan_id).await;

    let review = |client: Client, admin: String| async move {
        let form = multipart::Form::new().text("approve", "true");
        client
            .post(format!("{}/loans/{}/return/review", BASE_URL, loan_id))
            .header("Authorization", format!("Bearer {}", admin))
            .multipart(form)
            .send()
            .await
            .expect("Failed to send review")
            .status()
    };

    let (first, second) = tokio::join!(
        review(client.clone(), admin.clone()),
        review(client.clone(), admin.clone())
    );

    // Exactly one wins; the loser observes the conflict
    let statuses = [first.as_u16(), second.as_u16()];
    assert!(statuses.contains(&200), "statuses: {:?}", statuses);
    assert!(statuses.contains(&409), "statuses: {:?}", statuses);
}

#[tokio::test]
#[ignore]
async fn test_out_of_stock_request_is_refused() {
    let client = Client::new();
    let admin = admin_token(&client).await;
    let member = member_token(&client).await;

    let book_id = create_book(&client, &admin, "Telegram (stock)").await;
    // Someone else takes the single copy
    let other = get_token(&client, "siti", "siti123").await;
    loan_to_borrowing(&client, &admin, &other, book_id, &days_from_now(7)).await;

    let response = client
        .post(format!("{}/loans", BASE_URL))
        .header("Authorization", format!("Bearer {}", member))
        .json(&json!({
            "book_id": book_id,
            "expected_return_date": days_from_now(7)
        }))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), 422);
    let body: Value = response.json().await.expect("Failed to parse error");
    assert_eq!(body["error"], "OutOfStock");
}
