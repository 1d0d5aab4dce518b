//! JSON API for approval flows.
//!
//! - `PUT /api/approval-flow`   replace a quote's whole approval flow
//! - `GET /api/quotes/{id}`     quote detail with its committed flow
//! - `GET /api/approvers`       directory listing, `?role=` narrows to one team

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, put},
    Json, Router,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, info, warn};
use uuid::Uuid;

use quoteflow_core::audit::AuditSink;
use quoteflow_core::directory::Directory;
use quoteflow_core::domain::approval::{
    ApprovalParty, ApprovalStatus, ApprovalStep, Approver, ApproverId,
};
use quoteflow_core::domain::company::Company;
use quoteflow_core::domain::quote::{Plan, QuoteId, QuoteType};
use quoteflow_core::errors::{ApplicationError, InterfaceError};
use quoteflow_core::flows::{CommittedFlow, FlowCommitRequest, StepSubmission};
use quoteflow_db::repositories::{
    ApprovalFlowRepository, QuoteRepository, SqlApprovalFlowRepository, SqlQuoteRepository,
};
use quoteflow_db::{DbPool, FlowPersister, SqlDirectory};

const CORRELATION_HEADER: &str = "x-correlation-id";
const QUOTE_ID_REQUIRED: &str = "Quote ID is required";
const INVALID_STEPS: &str = "Invalid approval steps data";
const INVALID_VERSION: &str = "Version must be a non-negative integer";

#[derive(Clone)]
pub struct ApiState {
    persister: FlowPersister,
    quotes: Arc<dyn QuoteRepository>,
    directory: Arc<dyn Directory>,
}

impl ApiState {
    pub fn new(
        flows: Arc<dyn ApprovalFlowRepository>,
        quotes: Arc<dyn QuoteRepository>,
        directory: Arc<dyn Directory>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self { persister: FlowPersister::new(flows, directory.clone(), audit), quotes, directory }
    }

    pub fn from_pool(db_pool: DbPool, audit: Arc<dyn AuditSink>) -> Self {
        Self::new(
            Arc::new(SqlApprovalFlowRepository::new(db_pool.clone())),
            Arc::new(SqlQuoteRepository::new(db_pool.clone())),
            Arc::new(SqlDirectory::new(db_pool)),
            audit,
        )
    }
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/api/approval-flow", put(update_approval_flow))
        .route("/api/quotes/{id}", get(quote_detail))
        .route("/api/approvers", get(list_approvers))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Request / Response types
// ---------------------------------------------------------------------------

/// Body of `PUT /api/approval-flow`. Fields stay loose so missing or
/// mistyped values get the route's own 400 messages.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateApprovalFlowBody {
    #[serde(default)]
    pub quote_id: Option<Value>,
    #[serde(default)]
    pub approval_steps: Option<Value>,
    #[serde(default)]
    pub version: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct StepPayload {
    status: ApprovalStatus,
    assignee: AssigneeRef,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    #[serde(default)]
    info_requested: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AssigneeRef {
    id: ApproverId,
}

impl From<StepPayload> for StepSubmission {
    fn from(step: StepPayload) -> Self {
        Self {
            status: step.status,
            assignee_id: step.assignee.id,
            created_at: step.created_at,
            updated_at: step.updated_at,
            info_requested: step.info_requested,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ApproversQuery {
    pub role: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
    pub message: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowData {
    pub quote_id: String,
    pub version: u32,
    pub step_number: u32,
    pub current_step_id: Option<String>,
    pub approval_steps: Vec<ApprovalStep>,
}

impl From<CommittedFlow> for FlowData {
    fn from(flow: CommittedFlow) -> Self {
        Self {
            quote_id: flow.quote_id.0,
            version: flow.version,
            step_number: flow.step_number,
            current_step_id: flow.current_step_id.map(|id| id.0),
            approval_steps: flow.steps,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct QuoteDetail {
    pub id: String,
    pub name: String,
    pub company: Option<Company>,
    pub filename: String,
    pub tcv: Decimal,
    pub plan: Plan,
    pub term_months: u32,
    pub quote_type: QuoteType,
    pub seats: u32,
    pub discount_percentage: Decimal,
    pub approval_steps: Vec<ApprovalStep>,
    pub step_number: u32,
    pub current_step: Option<ApprovalStep>,
    pub frozen: bool,
    pub version: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: String,
}

/// Error response carrying the status code and the `{error}` body.
#[derive(Debug)]
pub struct ApiFailure {
    status: StatusCode,
    message: String,
}

impl ApiFailure {
    fn bad_request(message: impl Into<String>) -> Self {
        Self { status: StatusCode::BAD_REQUEST, message: message.into() }
    }

    fn from_interface(error: InterfaceError) -> Self {
        let status = match &error {
            InterfaceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            InterfaceError::NotFound { .. } => StatusCode::NOT_FOUND,
            InterfaceError::Conflict { .. } => StatusCode::CONFLICT,
            InterfaceError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            InterfaceError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };

        // storage detail goes to the log only
        let message = match &error {
            InterfaceError::ServiceUnavailable { .. } | InterfaceError::Internal { .. } => {
                error!(
                    event_name = "api.request.failed",
                    correlation_id = %error.correlation_id(),
                    error = %error,
                    "request failed"
                );
                error.user_message().to_string()
            }
            _ => error.message().to_string(),
        };

        Self { status, message }
    }

    fn storage(detail: impl std::fmt::Display, correlation_id: &str) -> Self {
        Self::from_interface(
            ApplicationError::Persistence(detail.to_string()).into_interface(correlation_id),
        )
    }
}

impl IntoResponse for ApiFailure {
    fn into_response(self) -> Response {
        (self.status, Json(ApiError { error: self.message })).into_response()
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn update_approval_flow(
    State(state): State<ApiState>,
    headers: HeaderMap,
    body: Result<Json<UpdateApprovalFlowBody>, JsonRejection>,
) -> Result<Json<ApiResponse<FlowData>>, ApiFailure> {
    let correlation_id = correlation_id(&headers);
    let Json(body) = body.map_err(|rejection| {
        warn!(
            event_name = "api.approval_flow.malformed_body",
            correlation_id = %correlation_id,
            error = %rejection,
            "approval flow body could not be parsed"
        );
        ApiFailure::bad_request(INVALID_STEPS)
    })?;

    let quote_id = quote_id_from(body.quote_id.as_ref())
        .ok_or_else(|| ApiFailure::bad_request(QUOTE_ID_REQUIRED))?;
    let steps = match body.approval_steps {
        Some(steps @ Value::Array(_)) => serde_json::from_value::<Vec<StepPayload>>(steps)
            .map_err(|_| ApiFailure::bad_request(INVALID_STEPS))?,
        _ => return Err(ApiFailure::bad_request(INVALID_STEPS)),
    };
    let expected_version = version_from(body.version.as_ref())?;

    info!(
        event_name = "api.approval_flow.received",
        correlation_id = %correlation_id,
        quote_id = %quote_id.0,
        steps = steps.len(),
        expected_version = ?expected_version,
        "approval flow update received"
    );

    let request = FlowCommitRequest {
        quote_id,
        expected_version,
        steps: steps.into_iter().map(StepSubmission::from).collect(),
    };
    let committed = state.persister.commit(request, &correlation_id).await.map_err(|error| {
        ApiFailure::from_interface(ApplicationError::from(error).into_interface(&correlation_id))
    })?;

    Ok(Json(ApiResponse {
        success: true,
        data: FlowData::from(committed),
        message: "Approval flow updated successfully".to_string(),
    }))
}

async fn quote_detail(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<QuoteDetail>, ApiFailure> {
    let correlation_id = correlation_id(&headers);
    let quote = state
        .quotes
        .find_by_id(&QuoteId(id.clone()))
        .await
        .map_err(|error| ApiFailure::storage(error, &correlation_id))?
        .ok_or_else(|| {
            ApiFailure::from_interface(
                ApplicationError::NotFound { entity: "quote", id }.into_interface(&correlation_id),
            )
        })?;
    let company = state
        .directory
        .company(quote.company_id)
        .await
        .map_err(|error| ApiFailure::storage(error, &correlation_id))?;

    Ok(Json(QuoteDetail {
        current_step: quote.current_step().cloned(),
        frozen: quote.is_frozen(),
        id: quote.id.0,
        name: quote.name,
        company,
        filename: quote.filename,
        tcv: quote.tcv,
        plan: quote.plan,
        term_months: quote.term_months,
        quote_type: quote.quote_type,
        seats: quote.seats,
        discount_percentage: quote.discount_percentage,
        approval_steps: quote.approval_steps,
        step_number: quote.step_number,
        version: quote.version,
        created_at: quote.created_at,
        updated_at: quote.updated_at,
    }))
}

async fn list_approvers(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Query(query): Query<ApproversQuery>,
) -> Result<Json<Vec<Approver>>, ApiFailure> {
    let role = match query.role.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(raw) => Some(raw.parse::<ApprovalParty>().map_err(ApiFailure::bad_request)?),
    };

    let approvers = state
        .directory
        .approvers(role)
        .await
        .map_err(|error| ApiFailure::storage(error, &correlation_id(&headers)))?;
    Ok(Json(approvers))
}

fn correlation_id(headers: &HeaderMap) -> String {
    headers
        .get(CORRELATION_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format!("req-{}", Uuid::new_v4()))
}

/// Accepts string or numeric quote ids; blank strings count as missing.
fn quote_id_from(value: Option<&Value>) -> Option<QuoteId> {
    match value? {
        Value::String(id) if !id.trim().is_empty() => Some(QuoteId(id.trim().to_string())),
        Value::Number(id) => Some(QuoteId(id.to_string())),
        _ => None,
    }
}

/// Accepts numeric or numeric-string versions. Absent or null means the
/// caller did not read a version and last writer wins.
fn version_from(value: Option<&Value>) -> Result<Option<u32>, ApiFailure> {
    let parsed = match value {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::Number(number)) => number.as_u64().and_then(|raw| u32::try_from(raw).ok()),
        Some(Value::String(raw)) => raw.trim().parse::<u32>().ok(),
        Some(_) => None,
    };
    parsed.map(Some).ok_or_else(|| ApiFailure::bad_request(INVALID_VERSION))
}
