use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::text;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UsageType {
	/// Verbatim quotation.
	Direct,
	/// Close paraphrase carrying the passage's argument.
	Substantial,
	/// Supporting pointer without reproduced content.
	Reference,
}
impl UsageType {
	pub fn parse(raw: &str) -> Option<Self> {
		match raw.trim().to_ascii_lowercase().as_str() {
			"direct" => Some(Self::Direct),
			"substantial" => Some(Self::Substantial),
			"reference" => Some(Self::Reference),
			_ => None,
		}
	}

	pub fn as_str(self) -> &'static str {
		match self {
			Self::Direct => "direct",
			Self::Substantial => "substantial",
			Self::Reference => "reference",
		}
	}
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Citation {
	pub evidence_id: String,
	pub usage_type: UsageType,
	/// Character offsets as the model gave them; positions outside the unit are kept and warned
	/// about during validation.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub char_start: Option<i64>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub char_end: Option<i64>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub quoted_text: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Paragraph {
	pub text: String,
	pub evidence_ids: Vec<String>,
	pub citations: Vec<Citation>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Section {
	pub heading: String,
	pub paragraphs: Vec<Paragraph>,
}

/// Validated, citation-complete document.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GenerationOutput {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub title: Option<String>,
	pub sections: Vec<Section>,
}
impl GenerationOutput {
	pub fn paragraphs(&self) -> impl Iterator<Item = &Paragraph> {
		self.sections.iter().flat_map(|section| section.paragraphs.iter())
	}

	pub fn paragraph_count(&self) -> usize {
		self.paragraphs().count()
	}

	pub fn word_count(&self) -> usize {
		self.paragraphs().map(|paragraph| text::word_count(&paragraph.text)).sum()
	}

	pub fn citations(&self) -> impl Iterator<Item = &Citation> {
		self.paragraphs().flat_map(|paragraph| paragraph.citations.iter())
	}
}

/// Shape the generation service is asked to emit, parsed leniently before validation.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct RawGenerationOutput {
	#[serde(default)]
	pub title: Option<String>,
	#[serde(default)]
	pub sections: Vec<RawSection>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct RawSection {
	#[serde(default)]
	pub heading: String,
	#[serde(default)]
	pub paragraphs: Vec<RawParagraph>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct RawParagraph {
	#[serde(default)]
	pub text: String,
	#[serde(default)]
	pub evidence_ids: Vec<String>,
	/// `None` when the model omitted the array entirely.
	#[serde(default)]
	pub citations: Option<Vec<RawCitation>>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct RawCitation {
	pub evidence_id: String,
	pub usage_type: String,
	/// Kept untyped so a float or string position degrades to a warning instead of failing the
	/// whole parse.
	#[serde(default)]
	pub char_start: Option<Value>,
	#[serde(default)]
	pub char_end: Option<Value>,
	#[serde(default)]
	pub quoted_text: Option<String>,
}

/// Reads a citation position leniently: integers, integral floats and numeric strings.
pub fn position_value(value: &Value) -> Option<i64> {
	match value {
		Value::Number(number) => number.as_i64().or_else(|| {
			number
				.as_f64()
				.filter(|float| float.fract() == 0.0 && float.abs() < i64::MAX as f64)
				.map(|float| float as i64)
		}),
		Value::String(raw) => raw.trim().parse().ok(),
		_ => None,
	}
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	#[test]
	fn positions_are_read_leniently() {
		assert_eq!(position_value(&json!(12)), Some(12));
		assert_eq!(position_value(&json!(-4)), Some(-4));
		assert_eq!(position_value(&json!(5.0)), Some(5));
		assert_eq!(position_value(&json!(" 7 ")), Some(7));
		assert_eq!(position_value(&json!(5.5)), None);
		assert_eq!(position_value(&json!(u64::MAX)), None);
		assert_eq!(position_value(&json!("five")), None);
		assert_eq!(position_value(&json!(true)), None);
	}

	#[test]
	fn usage_type_parse_is_case_insensitive() {
		assert_eq!(UsageType::parse(" Direct "), Some(UsageType::Direct));
		assert_eq!(UsageType::parse("reference"), Some(UsageType::Reference));
		assert_eq!(UsageType::parse("paraphrase"), None);
	}

	#[test]
	fn counts_words_and_citations_across_sections() {
		let citation = |id: &str| Citation {
			evidence_id: id.to_string(),
			usage_type: UsageType::Reference,
			char_start: None,
			char_end: None,
			quoted_text: None,
		};
		let output = GenerationOutput {
			title: None,
			sections: vec![
				Section {
					heading: "One".to_string(),
					paragraphs: vec![Paragraph {
						text: "Three little words".to_string(),
						evidence_ids: vec!["a".to_string()],
						citations: vec![citation("a")],
					}],
				},
				Section {
					heading: "Two".to_string(),
					paragraphs: vec![Paragraph {
						text: "Two words".to_string(),
						evidence_ids: vec!["b".to_string(), "c".to_string()],
						citations: vec![citation("b"), citation("c")],
					}],
				},
			],
		};

		assert_eq!(output.paragraph_count(), 2);
		assert_eq!(output.word_count(), 5);
		assert_eq!(output.citations().count(), 3);
	}
}
