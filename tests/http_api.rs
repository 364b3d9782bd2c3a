#![cfg(feature = "web")]

use attendance::app::{AppState, router};
use attendance::columns;
use attendance::login::DEFAULT_CREDENTIAL_SHEET;
use attendance::mailer::LogNotifier;
use attendance::marking::DEFAULT_AUDIT_SHEET;
use attendance::store::MemoryStore;
use attendance::store::memory::OpKind;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceExt;

fn setup() -> (Arc<MemoryStore>, Router) {
    let store = Arc::new(
        MemoryStore::default()
            .with_sheet(
                DEFAULT_CREDENTIAL_SHEET,
                vec![vec!["teacher1", "pw1", "ClassA", "", "ClassB"]],
            )
            .with_sheet(
                "ClassA",
                vec![
                    vec!["RollNumber", "Name", "Email", "Section"],
                    vec!["R1", "Asha", "a@x", "S1"],
                    vec!["R2", "Ben", "b@x", "S1"],
                ],
            )
            .with_sheet(DEFAULT_AUDIT_SHEET, vec![vec!["Date", "User"]]),
    );
    let state = AppState::new(
        store.clone(),
        Arc::new(LogNotifier),
        DEFAULT_CREDENTIAL_SHEET,
        DEFAULT_AUDIT_SHEET,
    );
    (store, router(Arc::new(state)))
}

async fn call(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn post(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn login_success() {
    let (_, app) = setup();
    let (status, body) = call(
        app,
        post("/login", json!({"username": "teacher1", "password": "pw1"})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({"success": true, "user": {"username": "teacher1", "classSheets": ["ClassA", "ClassB"]}})
    );
}

#[tokio::test]
async fn login_failures() {
    let (_, app) = setup();

    let (status, body) = call(app.clone(), post("/login", json!({"username": "teacher1"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Username and password are required");

    let (wrong_status, wrong) = call(
        app.clone(),
        post("/login", json!({"username": "teacher1", "password": "nope"})),
    )
    .await;
    let (unknown_status, unknown) = call(
        app,
        post("/login", json!({"username": "ghost", "password": "pw1"})),
    )
    .await;
    assert_eq!(wrong_status, StatusCode::UNAUTHORIZED);
    assert_eq!(unknown_status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong, unknown);
}

#[tokio::test]
async fn login_store_failure_is_500() {
    let (store, app) = setup();
    store.fail_on(OpKind::Read);
    let (status, body) = call(
        app,
        post("/login", json!({"username": "teacher1", "password": "pw1"})),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Internal Server Error");
}

#[tokio::test]
async fn class_data_lists_roster_rows() {
    let (_, app) = setup();
    let (status, body) = call(app, get("/attendance/ClassA")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({"success": true, "data": [["R1", "Asha", "a@x", "S1"], ["R2", "Ben", "b@x", "S1"]]})
    );
}

#[tokio::test]
async fn class_data_errors() {
    let (_, app) = setup();

    let (status, _) = call(app.clone(), get("/attendance/")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = call(app, get("/attendance/NoSuchClass")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Internal Server Error");
}

#[tokio::test]
async fn mark_uses_server_date() {
    let (store, app) = setup();
    let before = columns::today();
    let (status, body) = call(
        app,
        post(
            "/attendance/mark",
            json!({
                "classSheet": "ClassA",
                "attendance": [{"rollNumber": "R1", "status": "Present"}, {"rollNumber": "R2", "status": "Absent"}],
                "user": "teacher1",
                "date": "1999-01-01",
            }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "Attendance marked successfully!");
    assert_eq!(body["rowsAffected"], 2);

    let after = columns::today();
    let label = store.sheet("ClassA").unwrap()[0][4].clone();
    assert_ne!(label, "1999-01-01");
    assert!(label == before || label == after);
    assert_eq!(store.sheet(DEFAULT_AUDIT_SHEET).unwrap().len(), 3);
}

#[tokio::test]
async fn mark_missing_fields_is_400() {
    let (store, app) = setup();
    let (status, body) = call(
        app.clone(),
        post("/attendance/mark", json!({"classSheet": "ClassA", "user": "teacher1", "date": "2024-06-01"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["error"],
        "Missing required fields: classSheet, attendance, user, or date"
    );

    let (status, _) = call(
        app,
        post(
            "/attendance/mark",
            json!({"classSheet": "ClassA", "attendance": [], "user": "teacher1", "date": "2024-06-01"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(store.ops().is_empty());
}

#[tokio::test]
async fn mark_unknown_roll_is_500() {
    let (store, app) = setup();
    let (status, body) = call(
        app,
        post(
            "/attendance/mark",
            json!({
                "classSheet": "ClassA",
                "attendance": [{"rollNumber": "R9", "status": "Present"}],
                "user": "teacher1",
                "date": "2024-06-01",
            }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Failed to mark attendance");
    assert_eq!(store.count(OpKind::BatchWrite), 0);
}

#[tokio::test]
async fn malformed_mark_body_is_json_400() {
    let (store, app) = setup();
    let bodies = [
        json!({"classSheet": "ClassA", "attendance": [{"rollNumber": "R1"}], "user": "teacher1", "date": "2024-06-01"}),
        json!({"classSheet": "ClassA", "attendance": [{"rollNumber": 1, "status": "Present"}], "user": "teacher1", "date": "2024-06-01"}),
        json!({"classSheet": "ClassA", "attendance": "R1", "user": "teacher1", "date": "2024-06-01"}),
    ];
    for body in bodies {
        let (status, response) = call(app.clone(), post("/attendance/mark", body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            response["error"],
            "Missing required fields: classSheet, attendance, user, or date"
        );
    }

    let raw = Request::builder()
        .method("POST")
        .uri("/attendance/mark")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, response) = call(app, raw).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(response["error"].is_string());
    assert!(store.ops().is_empty());
}

#[tokio::test]
async fn malformed_login_body_is_json_400() {
    let (_, app) = setup();
    let (status, body) = call(
        app.clone(),
        post("/login", json!({"username": 7, "password": "pw1"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Username and password are required");

    let no_content_type = Request::builder()
        .method("POST")
        .uri("/login")
        .body(Body::from(r#"{"username":"teacher1","password":"pw1"}"#))
        .unwrap();
    let (status, body) = call(app, no_content_type).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Username and password are required");
}
