//! Integration tests: login, incident review over HTTP, envelope codes, export/import.

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use http_body_util::BodyExt;
use led_api::server::{self, AppState, EMPLOYEE_HEADER};
use led_core::{LedConfig, LedService};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::util::ServiceExt;

async fn test_app() -> axum::Router {
    let service = Arc::new(LedService::in_memory(LedConfig::default()));
    service.bootstrap().await.unwrap();
    server::router(Arc::new(AppState { service }))
}

fn request(method: &str, uri: &str, employee: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(employee) = employee {
        builder = builder.header(EMPLOYEE_HEADER, employee);
    }
    match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn call(app: &axum::Router, req: Request<Body>) -> Value {
    let res = app.clone().oneshot(req).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body = res.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&body).unwrap()
}

fn incident_body() -> Value {
    json!({
        "incidentName": "Payment gateway outage",
        "incidentDate": "2024-01-15",
        "discoveryDate": "2024-01-16",
        "businessUnit": "Risk Management",
        "causeOfAccident": "System",
        "involvedParties": "Internal",
        "potentialLoss": 500000,
        "recovery": 100000,
        "recoverySource": "Insurance"
    })
}

#[tokio::test]
async fn health() {
    let app = test_app().await;
    let res = app
        .clone()
        .oneshot(request("GET", "/health", None, None))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body = res.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&body[..], b"ok");
}

#[tokio::test]
async fn login_current_logout() {
    let app = test_app().await;
    let j = call(
        &app,
        request("POST", "/auth/login", None, Some(json!({ "employeeId": "EMP002" }))),
    )
    .await;
    assert_eq!(j["code"], 200);
    assert_eq!(j["data"]["user"]["role"], "Approver");

    let j = call(&app, request("GET", "/auth/current", None, None)).await;
    assert_eq!(j["data"]["employeeId"], "EMP002");

    call(&app, request("POST", "/auth/logout", None, None)).await;
    let j = call(&app, request("GET", "/auth/current", None, None)).await;
    assert!(j["data"].is_null());

    let j = call(
        &app,
        request("POST", "/auth/login", None, Some(json!({ "employeeId": "nobody" }))),
    )
    .await;
    assert_eq!(j["code"], 401);
}

#[tokio::test]
async fn incident_review_flow() {
    let app = test_app().await;
    let j = call(
        &app,
        request("POST", "/incidents", Some("EMP001"), Some(incident_body())),
    )
    .await;
    assert_eq!(j["code"], 200);
    assert_eq!(j["data"]["actualLoss"], 400000.0);
    assert_eq!(j["data"]["reviewStatus"], "Pending Approval L1");
    assert_eq!(j["data"]["capabilities"]["canEdit"], true);
    assert_eq!(j["data"]["capabilities"]["canDelete"], false);
    let id = j["data"]["id"].as_str().unwrap().to_string();

    let j = call(
        &app,
        request("POST", &format!("/incidents/{}/approve", id), Some("EMP003"), None),
    )
    .await;
    assert_eq!(j["code"], 403);

    let j = call(
        &app,
        request("POST", &format!("/incidents/{}/approve", id), Some("EMP002"), None),
    )
    .await;
    assert_eq!(j["code"], 200);
    assert_eq!(j["data"]["reviewStatus"], "Pending Approval L2");

    let j = call(
        &app,
        request(
            "POST",
            &format!("/incidents/{}/reject", id),
            Some("EMP003"),
            Some(json!({ "comment": "Loss figures unsupported" })),
        ),
    )
    .await;
    assert_eq!(j["data"]["reviewStatus"], "Rejected");
    assert_eq!(j["data"]["reviewHistory"][1]["comment"], "Loss figures unsupported");

    let j = call(
        &app,
        request("POST", &format!("/incidents/{}/approve", id), Some("EMP003"), None),
    )
    .await;
    assert_eq!(j["code"], 409);

    let j = call(&app, request("GET", "/dashboard", Some("EMP003"), None)).await;
    assert_eq!(j["data"]["totalIncidents"], 1);
    assert_eq!(j["data"]["totalActualLoss"], 400000.0);
}

#[tokio::test]
async fn envelope_codes_for_common_failures() {
    let app = test_app().await;

    let j = call(&app, request("GET", "/incidents", None, None)).await;
    assert_eq!(j["code"], 401);

    let mut body = incident_body();
    body["discoveryDate"] = json!("2024-01-01");
    body["incidentName"] = json!("abc");
    let j = call(&app, request("POST", "/incidents", Some("EMP001"), Some(body))).await;
    assert_eq!(j["code"], 400);
    assert!(j["errors"]["discoveryDate"].is_string());
    assert!(j["errors"]["incidentName"].is_string());

    let j = call(
        &app,
        request("GET", "/incidents/does-not-exist", Some("EMP001"), None),
    )
    .await;
    assert_eq!(j["code"], 404);

    let j = call(&app, request("GET", "/users", Some("EMP001"), None)).await;
    assert_eq!(j["code"], 403);

    let j = call(&app, request("GET", "/incidents", Some("EMP001"), None)).await;
    assert_eq!(j["code"], 200);
    assert_eq!(j["data"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn registration_review_over_http() {
    let app = test_app().await;
    let j = call(
        &app,
        request(
            "POST",
            "/registrations",
            None,
            Some(json!({
                "name": "Zhao Liu",
                "employeeId": "EMP020",
                "department": "Compliance",
                "requestedRole": "Inputter",
                "reason": "New joiner"
            })),
        ),
    )
    .await;
    assert_eq!(j["code"], 200);
    let id = j["data"]["id"].as_str().unwrap().to_string();

    let j = call(
        &app,
        request("GET", "/registrations?status=Pending", Some("EMP003"), None),
    )
    .await;
    assert_eq!(j["data"].as_array().unwrap().len(), 1);

    let j = call(
        &app,
        request(
            "POST",
            &format!("/registrations/{}/approve", id),
            Some("EMP003"),
            None,
        ),
    )
    .await;
    assert_eq!(j["code"], 200);
    assert_eq!(j["data"]["employeeId"], "EMP020");

    let j = call(
        &app,
        request("POST", "/auth/login", None, Some(json!({ "employeeId": "EMP020" }))),
    )
    .await;
    assert_eq!(j["code"], 200);
}

#[tokio::test]
async fn iam_items_and_business_units() {
    let app = test_app().await;
    let j = call(
        &app,
        request(
            "POST",
            "/iam-items",
            Some("EMP002"),
            Some(json!({ "issue": "Tighten change control", "pic": "IT team", "priority": "High" })),
        ),
    )
    .await;
    assert_eq!(j["code"], 200);
    assert_eq!(j["data"]["status"], "Pending");
    let id = j["data"]["id"].as_str().unwrap().to_string();

    let j = call(
        &app,
        request(
            "POST",
            &format!("/iam-items/{}/update", id),
            Some("EMP002"),
            Some(json!({ "status": "In Progress", "progress": 120 })),
        ),
    )
    .await;
    assert_eq!(j["data"]["progress"], 100);

    let j = call(&app, request("GET", "/iam-items/summary", Some("EMP001"), None)).await;
    assert_eq!(j["data"]["inProgress"], 1);

    let j = call(
        &app,
        request(
            "POST",
            "/business-units",
            Some("EMP003"),
            Some(json!({ "code": "rm", "name": "Duplicate" })),
        ),
    )
    .await;
    assert_eq!(j["code"], 400);

    let j = call(&app, request("GET", "/business-units", Some("EMP001"), None)).await;
    assert_eq!(j["data"].as_array().unwrap().len(), 4);
}

#[tokio::test]
async fn export_import_reset() {
    let app = test_app().await;
    call(
        &app,
        request("POST", "/incidents", Some("EMP001"), Some(incident_body())),
    )
    .await;

    let res = app
        .clone()
        .oneshot(request("GET", "/data/export", Some("EMP002"), None))
        .await
        .unwrap();
    let disposition = res
        .headers()
        .get(header::CONTENT_DISPOSITION)
        .and_then(|v| v.to_str().ok())
        .unwrap()
        .to_string();
    assert!(disposition.contains("led-data-"));
    let document = res.into_body().collect().await.unwrap().to_bytes();
    let snapshot: Value = serde_json::from_slice(&document).unwrap();
    assert_eq!(snapshot["incidents"].as_array().unwrap().len(), 1);
    assert!(snapshot["exportDate"].is_string());

    let import = |employee: &'static str, body: Vec<u8>| {
        Request::builder()
            .method("POST")
            .uri("/data/import")
            .header(EMPLOYEE_HEADER, employee)
            .body(Body::from(body))
            .unwrap()
    };

    let j = call(&app, import("EMP002", document.to_vec())).await;
    assert_eq!(j["code"], 403);

    let j = call(&app, import("EMP003", b"{ not json".to_vec())).await;
    assert_eq!(j["code"], 400);

    let j = call(&app, request("POST", "/data/reset", Some("EMP003"), None)).await;
    assert_eq!(j["code"], 200);
    let j = call(&app, request("GET", "/incidents", Some("EMP003"), None)).await;
    assert_eq!(j["data"].as_array().unwrap().len(), 0);

    let j = call(&app, import("EMP003", document.to_vec())).await;
    assert_eq!(j["code"], 200);
    assert_eq!(j["data"]["incidents"], 1);
    let j = call(&app, request("GET", "/incidents", Some("EMP003"), None)).await;
    assert_eq!(j["data"][0]["actualLoss"], 400000.0);
}
