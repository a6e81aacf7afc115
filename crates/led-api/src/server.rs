//! Axum server and routes.
//!
//! Every endpoint answers HTTP 200 with a `{code, message, data}` envelope; `code` carries
//! the outcome. The acting user is named by the `x-employee-id` header.

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, HeaderMap, HeaderValue},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use led_core::{IncidentView, LedError, LedResult, LedService, Session};
use led_types::{
    BusinessUnit, BusinessUnitPatch, DashboardStats, IamItem, IamItemPatch, IamSummary,
    ImportReport, IncidentPatch, IncidentQuery, LoginRequest, NewBusinessUnit, NewIamItem,
    NewIncident, NewRegistration, NewUser, RegistrationStatus, ReviewComment, StatusChange, User,
    UserPatch, UserRegistration, ValidationErrors,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

/// Header naming the employee a request acts for.
pub const EMPLOYEE_HEADER: &str = "x-employee-id";

pub struct AppState {
    pub service: Arc<LedService>,
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    /// Field-level failures for code 400 validation errors.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<ValidationErrors>,
}

type ApiJson<T> = Json<ApiResponse<T>>;

/// Envelope code for an error.
pub fn error_code(e: &LedError) -> i32 {
    match e {
        LedError::Validation(_) | LedError::Serialization(_) => 400,
        LedError::AuthenticationFailed(_) => 401,
        LedError::Unauthorized(_) => 403,
        LedError::NotFound { .. } => 404,
        LedError::Transition(_) => 409,
        LedError::Store(_) => 500,
    }
}

fn failure<T>(e: LedError) -> ApiResponse<T> {
    let code = error_code(&e);
    if code == 500 {
        tracing::error!(error = %e, "request failed");
    } else {
        tracing::debug!(code, error = %e, "request rejected");
    }
    let errors = match &e {
        LedError::Validation(errors) => Some(errors.clone()),
        _ => None,
    };
    ApiResponse {
        code,
        message: e.to_string(),
        data: None,
        errors,
    }
}

fn respond<T>(result: LedResult<T>, message: &str) -> ApiJson<T> {
    Json(match result {
        Ok(data) => ApiResponse {
            code: 200,
            message: message.to_string(),
            data: Some(data),
            errors: None,
        },
        Err(e) => failure(e),
    })
}

async fn session_from(state: &AppState, headers: &HeaderMap) -> LedResult<Session> {
    let employee_id = headers
        .get(EMPLOYEE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            LedError::AuthenticationFailed(format!("missing {} header", EMPLOYEE_HEADER))
        })?;
    state.service.session_for(employee_id).await
}

fn comment_of(body: Option<Json<ReviewComment>>) -> Option<String> {
    body.and_then(|Json(b)| b.comment)
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handle_health))
        .route("/auth/login", post(handle_login))
        .route("/auth/logout", post(handle_logout))
        .route("/auth/current", get(handle_current_user))
        .route("/incidents", get(handle_list_incidents).post(handle_create_incident))
        .route("/incidents/:id", get(handle_get_incident))
        .route("/incidents/:id/update", post(handle_update_incident))
        .route("/incidents/:id/status", post(handle_incident_status))
        .route("/incidents/:id/approve", post(handle_approve_incident))
        .route("/incidents/:id/reject", post(handle_reject_incident))
        .route("/incidents/:id/delete", post(handle_delete_incident))
        .route("/iam-items", get(handle_list_iam_items).post(handle_create_iam_item))
        .route("/iam-items/linkable-incidents", get(handle_linkable_incidents))
        .route("/iam-items/summary", get(handle_iam_summary))
        .route("/iam-items/:id/update", post(handle_update_iam_item))
        .route("/iam-items/:id/delete", post(handle_delete_iam_item))
        .route("/users", get(handle_list_users).post(handle_create_user))
        .route("/users/:id/update", post(handle_update_user))
        .route("/users/:id/deactivate", post(handle_deactivate_user))
        .route(
            "/registrations",
            get(handle_list_registrations).post(handle_submit_registration),
        )
        .route("/registrations/:id/approve", post(handle_approve_registration))
        .route("/registrations/:id/reject", post(handle_reject_registration))
        .route("/registrations/:id/delete", post(handle_delete_registration))
        .route(
            "/business-units",
            get(handle_list_business_units).post(handle_create_business_unit),
        )
        .route("/business-units/:id/update", post(handle_update_business_unit))
        .route("/business-units/:id/delete", post(handle_delete_business_unit))
        .route("/dashboard", get(handle_dashboard))
        .route("/data/export", get(handle_export))
        .route("/data/import", post(handle_import))
        .route("/data/reset", post(handle_reset))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn handle_health() -> &'static str {
    "ok"
}

// --- auth ---

async fn handle_login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> ApiJson<Session> {
    respond(state.service.login(&req.employee_id).await, "Login successful")
}

async fn handle_logout(State(state): State<Arc<AppState>>) -> ApiJson<()> {
    respond(state.service.logout().await, "Logged out")
}

async fn handle_current_user(State(state): State<Arc<AppState>>) -> ApiJson<Option<User>> {
    respond(state.service.current_user().await, "ok")
}

// --- incidents ---

async fn handle_list_incidents(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<IncidentQuery>,
) -> ApiJson<Vec<IncidentView>> {
    let result: LedResult<Vec<IncidentView>> = async {
        let session = session_from(&state, &headers).await?;
        state.service.list_incidents(&session, &query).await
    }
    .await;
    respond(result, "ok")
}

async fn handle_create_incident(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<NewIncident>,
) -> ApiJson<IncidentView> {
    let result: LedResult<IncidentView> = async {
        let session = session_from(&state, &headers).await?;
        state.service.create_incident(&session, req).await
    }
    .await;
    respond(result, "Incident created")
}

async fn handle_get_incident(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ApiJson<IncidentView> {
    let result: LedResult<IncidentView> = async {
        let session = session_from(&state, &headers).await?;
        state.service.get_incident(&session, &id).await
    }
    .await;
    respond(result, "ok")
}

async fn handle_update_incident(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(patch): Json<IncidentPatch>,
) -> ApiJson<IncidentView> {
    let result: LedResult<IncidentView> = async {
        let session = session_from(&state, &headers).await?;
        state.service.update_incident(&session, &id, patch).await
    }
    .await;
    respond(result, "Incident updated")
}

async fn handle_incident_status(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(req): Json<StatusChange>,
) -> ApiJson<IncidentView> {
    let result: LedResult<IncidentView> = async {
        let session = session_from(&state, &headers).await?;
        state
            .service
            .set_incident_status(&session, &id, req.status)
            .await
    }
    .await;
    respond(result, "Incident status updated")
}

async fn handle_approve_incident(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    body: Option<Json<ReviewComment>>,
) -> ApiJson<IncidentView> {
    let result: LedResult<IncidentView> = async {
        let session = session_from(&state, &headers).await?;
        state
            .service
            .approve_incident(&session, &id, comment_of(body))
            .await
    }
    .await;
    respond(result, "Incident approved")
}

async fn handle_reject_incident(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    body: Option<Json<ReviewComment>>,
) -> ApiJson<IncidentView> {
    let result: LedResult<IncidentView> = async {
        let session = session_from(&state, &headers).await?;
        state
            .service
            .reject_incident(&session, &id, comment_of(body))
            .await
    }
    .await;
    respond(result, "Incident rejected")
}

async fn handle_delete_incident(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ApiJson<()> {
    let result: LedResult<()> = async {
        let session = session_from(&state, &headers).await?;
        state.service.delete_incident(&session, &id).await
    }
    .await;
    respond(result, "Incident deleted")
}

// --- IAM items ---

async fn handle_list_iam_items(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> ApiJson<Vec<IamItem>> {
    let result: LedResult<Vec<IamItem>> = async {
        let session = session_from(&state, &headers).await?;
        state.service.list_iam_items(&session).await
    }
    .await;
    respond(result, "ok")
}

async fn handle_create_iam_item(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<NewIamItem>,
) -> ApiJson<IamItem> {
    let result: LedResult<IamItem> = async {
        let session = session_from(&state, &headers).await?;
        state.service.create_iam_item(&session, req).await
    }
    .await;
    respond(result, "IAM item created")
}

async fn handle_linkable_incidents(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> ApiJson<Vec<IncidentView>> {
    let result: LedResult<Vec<IncidentView>> = async {
        let session = session_from(&state, &headers).await?;
        state.service.linkable_incidents(&session).await
    }
    .await;
    respond(result, "ok")
}

async fn handle_iam_summary(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> ApiJson<IamSummary> {
    let result: LedResult<IamSummary> = async {
        let session = session_from(&state, &headers).await?;
        state.service.iam_summary(&session).await
    }
    .await;
    respond(result, "ok")
}

async fn handle_update_iam_item(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(patch): Json<IamItemPatch>,
) -> ApiJson<IamItem> {
    let result: LedResult<IamItem> = async {
        let session = session_from(&state, &headers).await?;
        state.service.update_iam_item(&session, &id, patch).await
    }
    .await;
    respond(result, "IAM item updated")
}

async fn handle_delete_iam_item(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ApiJson<()> {
    let result: LedResult<()> = async {
        let session = session_from(&state, &headers).await?;
        state.service.delete_iam_item(&session, &id).await
    }
    .await;
    respond(result, "IAM item deleted")
}

// --- users and registrations ---

async fn handle_list_users(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> ApiJson<Vec<User>> {
    let result: LedResult<Vec<User>> = async {
        let session = session_from(&state, &headers).await?;
        state.service.list_users(&session).await
    }
    .await;
    respond(result, "ok")
}

async fn handle_create_user(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<NewUser>,
) -> ApiJson<User> {
    let result: LedResult<User> = async {
        let session = session_from(&state, &headers).await?;
        state.service.create_user(&session, req).await
    }
    .await;
    respond(result, "User created")
}

async fn handle_update_user(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(patch): Json<UserPatch>,
) -> ApiJson<User> {
    let result: LedResult<User> = async {
        let session = session_from(&state, &headers).await?;
        state.service.update_user(&session, &id, patch).await
    }
    .await;
    respond(result, "User updated")
}

async fn handle_deactivate_user(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ApiJson<User> {
    let result: LedResult<User> = async {
        let session = session_from(&state, &headers).await?;
        state.service.deactivate_user(&session, &id).await
    }
    .await;
    respond(result, "User deactivated")
}

#[derive(Debug, Deserialize)]
struct RegistrationFilter {
    #[serde(default)]
    status: Option<RegistrationStatus>,
}

async fn handle_submit_registration(
    State(state): State<Arc<AppState>>,
    Json(req): Json<NewRegistration>,
) -> ApiJson<UserRegistration> {
    respond(
        state.service.submit_registration(req).await,
        "Registration submitted",
    )
}

async fn handle_list_registrations(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(filter): Query<RegistrationFilter>,
) -> ApiJson<Vec<UserRegistration>> {
    let result: LedResult<Vec<UserRegistration>> = async {
        let session = session_from(&state, &headers).await?;
        state
            .service
            .list_registrations(&session, filter.status)
            .await
    }
    .await;
    respond(result, "ok")
}

async fn handle_approve_registration(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    body: Option<Json<ReviewComment>>,
) -> ApiJson<User> {
    let result: LedResult<User> = async {
        let session = session_from(&state, &headers).await?;
        state
            .service
            .approve_registration(&session, &id, comment_of(body))
            .await
    }
    .await;
    respond(result, "Registration approved")
}

async fn handle_reject_registration(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    body: Option<Json<ReviewComment>>,
) -> ApiJson<UserRegistration> {
    let result: LedResult<UserRegistration> = async {
        let session = session_from(&state, &headers).await?;
        state
            .service
            .reject_registration(&session, &id, comment_of(body))
            .await
    }
    .await;
    respond(result, "Registration rejected")
}

async fn handle_delete_registration(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ApiJson<()> {
    let result: LedResult<()> = async {
        let session = session_from(&state, &headers).await?;
        state.service.delete_registration(&session, &id).await
    }
    .await;
    respond(result, "Registration deleted")
}

// --- business units ---

async fn handle_list_business_units(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> ApiJson<Vec<BusinessUnit>> {
    let result: LedResult<Vec<BusinessUnit>> = async {
        let session = session_from(&state, &headers).await?;
        state.service.list_business_units(&session).await
    }
    .await;
    respond(result, "ok")
}

async fn handle_create_business_unit(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<NewBusinessUnit>,
) -> ApiJson<BusinessUnit> {
    let result: LedResult<BusinessUnit> = async {
        let session = session_from(&state, &headers).await?;
        state.service.create_business_unit(&session, req).await
    }
    .await;
    respond(result, "Business unit created")
}

async fn handle_update_business_unit(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(patch): Json<BusinessUnitPatch>,
) -> ApiJson<BusinessUnit> {
    let result: LedResult<BusinessUnit> = async {
        let session = session_from(&state, &headers).await?;
        state
            .service
            .update_business_unit(&session, &id, patch)
            .await
    }
    .await;
    respond(result, "Business unit updated")
}

async fn handle_delete_business_unit(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ApiJson<()> {
    let result: LedResult<()> = async {
        let session = session_from(&state, &headers).await?;
        state.service.delete_business_unit(&session, &id).await
    }
    .await;
    respond(result, "Business unit deleted")
}

// --- dashboard and data transfer ---

async fn handle_dashboard(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> ApiJson<DashboardStats> {
    let result: LedResult<DashboardStats> = async {
        let session = session_from(&state, &headers).await?;
        state.service.dashboard(&session).await
    }
    .await;
    respond(result, "ok")
}

/// The pretty-printed export document itself, as a download. Errors use the envelope.
async fn handle_export(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    let result: LedResult<String> = async {
        let session = session_from(&state, &headers).await?;
        state.service.export_json(&session).await
    }
    .await;
    match result {
        Ok(document) => {
            let file_name = led_core::export_file_name(chrono::Utc::now().date_naive());
            let disposition = HeaderValue::from_str(&format!("attachment; filename=\"{}\"", file_name))
                .unwrap_or_else(|_| HeaderValue::from_static("attachment"));
            (
                [
                    (
                        header::CONTENT_TYPE,
                        HeaderValue::from_static("application/json"),
                    ),
                    (header::CONTENT_DISPOSITION, disposition),
                ],
                document,
            )
                .into_response()
        }
        Err(e) => Json(failure::<()>(e)).into_response(),
    }
}

/// Raw JSON body; decoding is part of the import so a malformed document is reported
/// in the envelope rather than rejected by the extractor.
async fn handle_import(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiJson<ImportReport> {
    let result: LedResult<ImportReport> = async {
        let session = session_from(&state, &headers).await?;
        let text = std::str::from_utf8(&body)
            .map_err(|e| LedError::Serialization(format!("body is not UTF-8: {}", e)))?;
        state.service.import_data(&session, text).await
    }
    .await;
    respond(result, "Data imported")
}

async fn handle_reset(State(state): State<Arc<AppState>>, headers: HeaderMap) -> ApiJson<()> {
    let result: LedResult<()> = async {
        let session = session_from(&state, &headers).await?;
        state.service.reset_data(&session).await
    }
    .await;
    respond(result, "All data reset")
}
