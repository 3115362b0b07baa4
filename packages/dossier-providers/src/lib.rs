pub mod embedding;
pub mod generation;
pub mod qdrant;

mod error;

pub use error::{Error, Result};

use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderName};
use serde_json::{Map, Value};

pub fn auth_headers(api_key: &str, default_headers: &Map<String, Value>) -> Result<HeaderMap> {
	let mut headers = HeaderMap::new();

	headers.insert(AUTHORIZATION, format!("Bearer {api_key}").parse()?);

	for (key, value) in default_headers {
		let Some(raw) = value.as_str() else {
			return Err(Error::InvalidConfig {
				message: format!("Default header {key} must be a string."),
			});
		};

		headers.insert(HeaderName::from_bytes(key.as_bytes())?, raw.parse()?);
	}

	Ok(headers)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn rejects_non_string_default_headers() {
		let mut defaults = Map::new();

		defaults.insert("x-team".to_string(), Value::from(7));

		let err = auth_headers("key", &defaults).expect_err("Expected invalid header config.");

		assert!(matches!(err, Error::InvalidConfig { .. }));
	}

	#[test]
	fn merges_bearer_and_default_headers() {
		let mut defaults = Map::new();

		defaults.insert("x-team".to_string(), Value::from("research"));

		let headers = auth_headers("secret", &defaults).expect("Failed to build headers.");

		assert_eq!(headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok()), Some("Bearer secret"));
		assert_eq!(headers.get("x-team").and_then(|v| v.to_str().ok()), Some("research"));
	}
}
