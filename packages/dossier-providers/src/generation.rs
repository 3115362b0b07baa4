use std::time::Duration;

use reqwest::{
	Client, StatusCode,
	header::{HeaderMap, RETRY_AFTER},
};
use serde_json::Value;

use crate::{Error, Result};

const MAX_ERROR_BODY_CHARS: usize = 300;

/// Streams an OpenAI-compatible chat completion and returns the accumulated content.
///
/// HTTP 429 and 503 surface as [`Error::Throttled`] carrying the `Retry-After` hint so callers
/// can back off. Servers that ignore `stream: true` and answer with a single JSON body are
/// accepted as well.
pub async fn generate(
	cfg: &dossier_config::LlmProviderConfig,
	messages: &[Value],
	max_tokens: u32,
	temperature: f32,
) -> Result<String> {
	let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;
	let url = format!("{}{}", cfg.api_base, cfg.path);
	let body = serde_json::json!({
		"model": cfg.model,
		"temperature": temperature,
		"max_tokens": max_tokens,
		"stream": true,
		"messages": messages,
	});
	let mut res = client
		.post(url)
		.headers(crate::auth_headers(&cfg.api_key, &cfg.default_headers)?)
		.json(&body)
		.send()
		.await?;
	let status = res.status();

	if status == StatusCode::TOO_MANY_REQUESTS || status == StatusCode::SERVICE_UNAVAILABLE {
		let retry_after_ms = retry_after_ms(res.headers());

		tracing::warn!(status = status.as_u16(), ?retry_after_ms, "Generation provider throttled.");

		return Err(Error::Throttled { retry_after_ms });
	}
	if !status.is_success() {
		let text = res.text().await.unwrap_or_default();

		return Err(Error::Http { status: status.as_u16(), message: error_body_message(&text) });
	}

	let mut stream = SseAccumulator::default();

	while let Some(chunk) = res.chunk().await? {
		stream.push(&chunk)?;

		if stream.done {
			break;
		}
	}

	stream.finish()
}

/// `Retry-After` in milliseconds. Only the delta-seconds form is honoured.
pub fn retry_after_ms(headers: &HeaderMap) -> Option<u64> {
	let raw = headers.get(RETRY_AFTER)?.to_str().ok()?.trim();
	let seconds: f64 = raw.parse().ok()?;

	if !seconds.is_finite() || seconds < 0.0 {
		return None;
	}

	Some((seconds * 1_000.0).round() as u64)
}

fn error_body_message(body: &str) -> String {
	let trimmed = body.trim();

	if let Ok(json) = serde_json::from_str::<Value>(trimmed) {
		let message = json
			.get("error")
			.and_then(|err| err.get("message").or(Some(err)))
			.and_then(|msg| msg.as_str())
			.or_else(|| json.get("message").and_then(|msg| msg.as_str()));

		if let Some(message) = message {
			return message.to_string();
		}
	}
	if trimmed.is_empty() {
		return "empty error body".to_string();
	}

	trimmed.chars().take(MAX_ERROR_BODY_CHARS).collect()
}

#[derive(Debug, Default)]
struct SseAccumulator {
	pending: Vec<u8>,
	unframed: Vec<u8>,
	content: String,
	saw_event: bool,
	done: bool,
}
impl SseAccumulator {
	fn push(&mut self, bytes: &[u8]) -> Result<()> {
		if !self.saw_event {
			self.unframed.extend_from_slice(bytes);
		}

		self.pending.extend_from_slice(bytes);

		while !self.done
			&& let Some(pos) = self.pending.iter().position(|byte| *byte == b'\n')
		{
			let line: Vec<u8> = self.pending.drain(..=pos).collect();
			let line = String::from_utf8_lossy(&line).into_owned();

			self.handle_line(line.trim_end_matches(['\r', '\n']))?;
		}

		Ok(())
	}

	fn handle_line(&mut self, line: &str) -> Result<()> {
		let Some(data) = line.strip_prefix("data:") else { return Ok(()) };

		if !self.saw_event {
			self.saw_event = true;
			self.unframed.clear();
		}

		let data = data.trim();

		if data.is_empty() {
			return Ok(());
		}
		if data == "[DONE]" {
			self.done = true;

			return Ok(());
		}

		let event: Value = serde_json::from_str(data)?;

		if let Some(err) = event.get("error") {
			return Err(Error::InvalidResponse {
				message: format!("Generation stream reported an error: {}", error_text(err)),
			});
		}
		if let Some(delta) = event
			.get("choices")
			.and_then(|v| v.as_array())
			.and_then(|arr| arr.first())
			.and_then(|choice| choice.get("delta"))
			.and_then(|delta| delta.get("content"))
			.and_then(|content| content.as_str())
		{
			self.content.push_str(delta);
		}

		Ok(())
	}

	fn finish(mut self) -> Result<String> {
		if !self.done && !self.pending.is_empty() {
			let line = String::from_utf8_lossy(&std::mem::take(&mut self.pending)).into_owned();

			self.handle_line(line.trim_end_matches(['\r', '\n']))?;
		}
		if self.saw_event {
			return Ok(self.content);
		}

		parse_unframed_completion(&self.unframed)
	}
}

fn parse_unframed_completion(body: &[u8]) -> Result<String> {
	if body.iter().all(u8::is_ascii_whitespace) {
		return Err(Error::InvalidResponse {
			message: "Generation response was empty.".to_string(),
		});
	}

	let json: Value = serde_json::from_slice(body)?;

	json.get("choices")
		.and_then(|v| v.as_array())
		.and_then(|arr| arr.first())
		.and_then(|choice| choice.get("message"))
		.and_then(|msg| msg.get("content"))
		.and_then(|content| content.as_str())
		.map(str::to_string)
		.ok_or_else(|| Error::InvalidResponse {
			message: "Generation response is missing message content.".to_string(),
		})
}

fn error_text(err: &Value) -> String {
	err.get("message")
		.and_then(|msg| msg.as_str())
		.map(str::to_string)
		.unwrap_or_else(|| err.to_string())
}

#[cfg(test)]
mod tests {
	use reqwest::header::HeaderValue;

	use super::*;

	fn accumulate(chunks: &[&str]) -> Result<String> {
		let mut stream = SseAccumulator::default();

		for chunk in chunks {
			stream.push(chunk.as_bytes())?;
		}

		stream.finish()
	}

	#[test]
	fn accumulates_deltas_split_across_chunks() {
		let out = accumulate(&[
			"data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n\n",
			"data: {\"choices\":[{\"delta\":{\"content\":\"{\\\"ti\"}}]}\n",
			"\ndata: {\"choices\":[{\"delta\":{\"con",
			"tent\":\"tle\\\"}\"}}]}\r\n\r\n",
			"data: [DONE]\n\n",
			"data: {\"choices\":[{\"delta\":{\"content\":\"ignored\"}}]}\n\n",
		])
		.expect("Failed to accumulate stream.");

		assert_eq!(out, "{\"title\"}");
	}

	#[test]
	fn handles_final_line_without_newline() {
		let out = accumulate(&["data: {\"choices\":[{\"delta\":{\"content\":\"tail\"}}]}"])
			.expect("Failed to accumulate stream.");

		assert_eq!(out, "tail");
	}

	#[test]
	fn accepts_non_streaming_completion() {
		let out = accumulate(&["{\"choices\":[{\"message\":", "{\"content\":\"whole\"}}]}"])
			.expect("Failed to parse unframed completion.");

		assert_eq!(out, "whole");
	}

	#[test]
	fn stream_errors_are_reported() {
		let err = accumulate(&["data: {\"error\":{\"message\":\"overloaded\"}}\n\n"])
			.expect_err("Expected stream error.");

		assert!(err.to_string().contains("overloaded"));
	}

	#[test]
	fn empty_body_is_invalid() {
		let err = accumulate(&["  \n"]).expect_err("Expected empty response error.");

		assert!(matches!(err, Error::InvalidResponse { .. }));
	}

	#[test]
	fn parses_retry_after_seconds() {
		let mut headers = HeaderMap::new();

		assert_eq!(retry_after_ms(&headers), None);

		headers.insert(RETRY_AFTER, HeaderValue::from_static("2"));

		assert_eq!(retry_after_ms(&headers), Some(2_000));

		headers.insert(RETRY_AFTER, HeaderValue::from_static("0.5"));

		assert_eq!(retry_after_ms(&headers), Some(500));

		headers.insert(RETRY_AFTER, HeaderValue::from_static("Wed, 21 Oct 2015 07:28:00 GMT"));

		assert_eq!(retry_after_ms(&headers), None);
	}

	#[test]
	fn normalizes_error_bodies() {
		assert_eq!(error_body_message("{\"error\":{\"message\":\"bad key\"}}"), "bad key");
		assert_eq!(error_body_message("{\"error\":\"quota\"}"), "quota");
		assert_eq!(error_body_message(""), "empty error body");
		assert_eq!(error_body_message("plain failure"), "plain failure");
	}
}
