use axum::{
	Json, Router,
	extract::{Path, State, rejection::JsonRejection},
	http::{HeaderValue, StatusCode, header},
	response::{IntoResponse, Response},
	routing::{get, post},
};
use serde::Serialize;
use uuid::Uuid;

use dossier_service::{
	AdmissionStatus, Error, ErrorKind, GenerateRequest, RetrieveRequest, RetrieveResponse,
	TicketView,
};

use crate::state::AppState;

pub fn router(state: AppState) -> Router {
	Router::new()
		.route("/health", get(health))
		.route("/v1/retrieve", post(retrieve))
		.route("/v1/generate", post(generate))
		.route("/v1/generate/tickets/{ticket_id}", get(ticket))
		.with_state(state)
}

pub fn admin_router(state: AppState) -> Router {
	Router::new().route("/v1/admin/admission", get(admission)).with_state(state)
}

async fn health() -> StatusCode {
	StatusCode::OK
}

async fn retrieve(
	State(state): State<AppState>,
	payload: Result<Json<RetrieveRequest>, JsonRejection>,
) -> Result<Json<RetrieveResponse>, ApiError> {
	let Json(payload) = payload?;
	let response = state.service.retrieve(payload).await?;

	Ok(Json(response))
}

/// 200 with the document, or 202 with a ticket while the generation provider is throttling.
async fn generate(
	State(state): State<AppState>,
	payload: Result<Json<GenerateRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
	let Json(payload) = payload?;
	let outcome = state.service.generate(payload).await?;
	let status = if outcome.is_queued() { StatusCode::ACCEPTED } else { StatusCode::OK };

	Ok((status, Json(outcome)).into_response())
}

async fn ticket(
	State(state): State<AppState>,
	Path(ticket_id): Path<String>,
) -> Result<Json<TicketView>, ApiError> {
	let ticket_id = Uuid::parse_str(ticket_id.trim()).map_err(|_| {
		ApiError::new(
			StatusCode::BAD_REQUEST,
			"invalid_request",
			ErrorKind::Input,
			"ticket_id must be a UUID.",
		)
	})?;
	let view = state.service.ticket(ticket_id)?;

	Ok(Json(view))
}

async fn admission(State(state): State<AppState>) -> Json<AdmissionStatus> {
	Json(state.service.admission_status())
}

#[derive(Debug, Serialize)]
struct ErrorBody {
	error_code: String,
	kind: ErrorKind,
	message: String,
}

#[derive(Debug)]
pub struct ApiError {
	status: StatusCode,
	error_code: String,
	kind: ErrorKind,
	message: String,
	retry_after_secs: Option<u64>,
}
impl ApiError {
	fn new(
		status: StatusCode,
		error_code: impl Into<String>,
		kind: ErrorKind,
		message: impl Into<String>,
	) -> Self {
		Self {
			status,
			error_code: error_code.into(),
			kind,
			message: message.into(),
			retry_after_secs: None,
		}
	}
}
impl From<Error> for ApiError {
	fn from(err: Error) -> Self {
		let kind = err.kind();
		let status = match kind {
			ErrorKind::Input => StatusCode::BAD_REQUEST,
			ErrorKind::Evidence => StatusCode::UNPROCESSABLE_ENTITY,
			ErrorKind::Upstream => StatusCode::BAD_GATEWAY,
			ErrorKind::Structural => StatusCode::INTERNAL_SERVER_ERROR,
			ErrorKind::Capacity => StatusCode::TOO_MANY_REQUESTS,
			ErrorKind::NotFound => StatusCode::NOT_FOUND,
		};

		if status.is_server_error() {
			tracing::error!(error_code = err.code(), error = %err, "Request failed.");
		}

		let mut api_err = Self::new(status, err.code(), kind, err.to_string());

		if let Error::Throttled { retry_after_ms: Some(ms) } = err {
			api_err.retry_after_secs = Some(ms.div_ceil(1_000));
		}

		api_err
	}
}
impl From<JsonRejection> for ApiError {
	fn from(rejection: JsonRejection) -> Self {
		Self::new(
			StatusCode::BAD_REQUEST,
			"invalid_request",
			ErrorKind::Input,
			format!("Invalid request body: {}", rejection.body_text()),
		)
	}
}
impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let body =
			ErrorBody { error_code: self.error_code, kind: self.kind, message: self.message };
		let mut response = (self.status, Json(body)).into_response();

		if let Some(secs) = self.retry_after_secs {
			response.headers_mut().insert(header::RETRY_AFTER, HeaderValue::from(secs));
		}

		response
	}
}
