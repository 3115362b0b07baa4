pub mod coverage;
pub mod extract;
pub mod prompt;
pub mod validate;

pub use coverage::{CoverageReport, SourceTally};
pub use validate::ValidationWarning;

use std::{collections::HashMap, time::Duration};

use serde_json::Value;

use dossier_config::{Generation, LlmProviderConfig};
use dossier_domain::{
	document::{GenerationOutput, RawGenerationOutput},
	evidence::EvidenceUnit,
};

use crate::{AdmissionController, Error, GenerationProvider, Result};

/// `base × 2^(attempt − 1)` capped at `max_backoff_ms`, never shorter than the provider's
/// `Retry-After`.
pub fn backoff_delay(cfg: &Generation, attempt: u32, retry_after_ms: Option<u64>) -> Duration {
	let exponent = attempt.saturating_sub(1).min(32);
	let delay = cfg.base_backoff_ms.saturating_mul(1_u64 << exponent).min(cfg.max_backoff_ms);

	Duration::from_millis(delay.max(retry_after_ms.unwrap_or(0)))
}

/// Calls the provider under the configured timeout, backing off on throttling.
///
/// Every throttled attempt is reported to the admission controller, and reaching
/// `throttle_escalation_threshold` consecutive throttles switches it to queued mode. Other
/// errors surface immediately.
pub async fn call_with_retry(
	provider: &dyn GenerationProvider,
	llm_cfg: &LlmProviderConfig,
	cfg: &Generation,
	admission: &AdmissionController,
	messages: &[Value],
	max_tokens: u32,
) -> Result<String> {
	let mut attempt = 0_u32;

	loop {
		attempt += 1;

		let call = provider.generate(llm_cfg, messages, max_tokens, llm_cfg.temperature);
		let result = match tokio::time::timeout(Duration::from_millis(cfg.timeout_ms), call).await {
			Ok(result) => result,
			Err(_) => Err(Error::Provider {
				message: format!("Generation timed out after {} ms.", cfg.timeout_ms),
			}),
		};
		let retry_after_ms = match result {
			Ok(text) => return Ok(text),
			Err(Error::Throttled { retry_after_ms }) => retry_after_ms,
			Err(err) => return Err(err),
		};

		admission.record_throttle();

		if attempt >= cfg.throttle_escalation_threshold {
			admission.escalate();
		}
		if attempt >= cfg.max_attempts {
			tracing::warn!(attempts = attempt, "Generation provider kept throttling; giving up.");

			return Err(Error::Throttled { retry_after_ms });
		}

		let delay = backoff_delay(cfg, attempt, retry_after_ms);

		tracing::warn!(
			attempt,
			delay_ms = delay.as_millis() as u64,
			retry_after_ms,
			"Generation provider throttled the request. Backing off."
		);

		tokio::time::sleep(delay).await;
	}
}

/// Extracts, parses and validates raw model text against the working set.
pub fn parse_output(
	raw_text: &str,
	working_set: &[EvidenceUnit],
	excerpt_chars: usize,
) -> Result<(GenerationOutput, Vec<ValidationWarning>)> {
	let Some(json) = extract::last_json_object(raw_text) else {
		return Err(Error::TruncatedOutput {
			message: "No complete JSON object found in generation output.".to_string(),
		});
	};
	let raw: RawGenerationOutput = serde_json::from_str(json)
		.map_err(|err| Error::InvalidOutput { message: err.to_string() })?;
	let units: HashMap<&str, &EvidenceUnit> =
		working_set.iter().map(|unit| (unit.id.as_str(), unit)).collect();
	let (document, warnings) = validate::validate_output(raw, &units, excerpt_chars)?;

	for warning in &warnings {
		tracing::warn!(
			code = %warning.code,
			paragraph_index = warning.paragraph_index,
			evidence_id = warning.evidence_id.as_deref(),
			"{}",
			warning.message
		);
	}

	Ok((document, warnings))
}
