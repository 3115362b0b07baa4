use serde::Serialize;
use uuid::Uuid;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Coarse failure class, used to pick a transport status and to tell "retry later" apart from
/// "this request is malformed".
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
	Input,
	/// Well-formed request that the scope's evidence cannot support.
	Evidence,
	Upstream,
	Structural,
	Capacity,
	NotFound,
}
impl ErrorKind {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Input => "input",
			Self::Evidence => "evidence",
			Self::Upstream => "upstream",
			Self::Structural => "structural",
			Self::Capacity => "capacity",
			Self::NotFound => "not_found",
		}
	}
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Invalid request: {message}")]
	InvalidRequest { message: String },
	#[error("No usable evidence: {message}")]
	NoEvidence { message: String },
	#[error("Provider error: {message}")]
	Provider { message: String },
	#[error("Generation output was truncated: {message}")]
	TruncatedOutput { message: String },
	#[error("Generation output is invalid: {message}")]
	InvalidOutput { message: String },
	#[error("Caller {caller_id} already has a generation in progress.")]
	CallerBusy { caller_id: String },
	#[error("Generation queue is full ({capacity} entries).")]
	QueueFull { capacity: usize },
	#[error("Generation provider is throttling requests.")]
	Throttled { retry_after_ms: Option<u64> },
	#[error("Ticket {ticket_id} was not found.")]
	TicketNotFound { ticket_id: Uuid },
}
impl Error {
	pub fn kind(&self) -> ErrorKind {
		match self {
			Self::InvalidRequest { .. } => ErrorKind::Input,
			Self::NoEvidence { .. } => ErrorKind::Evidence,
			Self::Provider { .. } => ErrorKind::Upstream,
			Self::TruncatedOutput { .. } | Self::InvalidOutput { .. } => ErrorKind::Structural,
			Self::CallerBusy { .. } | Self::QueueFull { .. } | Self::Throttled { .. } =>
				ErrorKind::Capacity,
			Self::TicketNotFound { .. } => ErrorKind::NotFound,
		}
	}

	/// Stable machine-readable code.
	pub fn code(&self) -> &'static str {
		match self {
			Self::InvalidRequest { .. } => "invalid_request",
			Self::NoEvidence { .. } => "no_evidence",
			Self::Provider { .. } => "provider",
			Self::TruncatedOutput { .. } => "truncated_output",
			Self::InvalidOutput { .. } => "invalid_output",
			Self::CallerBusy { .. } => "caller_busy",
			Self::QueueFull { .. } => "queue_full",
			Self::Throttled { .. } => "upstream_throttled",
			Self::TicketNotFound { .. } => "ticket_not_found",
		}
	}
}
impl From<dossier_providers::Error> for Error {
	fn from(err: dossier_providers::Error) -> Self {
		match err {
			dossier_providers::Error::Throttled { retry_after_ms } => Self::Throttled { retry_after_ms },
			other => Self::Provider { message: other.to_string() },
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn provider_throttling_keeps_retry_hint() {
		let err = Error::from(dossier_providers::Error::Throttled { retry_after_ms: Some(1_500) });

		assert!(matches!(err, Error::Throttled { retry_after_ms: Some(1_500) }));
		assert_eq!(err.kind(), ErrorKind::Capacity);
		assert_eq!(err.code(), "upstream_throttled");
	}

	#[test]
	fn other_provider_failures_are_upstream() {
		let err = Error::from(dossier_providers::Error::InvalidResponse {
			message: "missing data".to_string(),
		});

		assert_eq!(err.kind(), ErrorKind::Upstream);
		assert!(err.to_string().contains("missing data"));
	}
}
