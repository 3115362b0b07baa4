use std::{collections::HashMap, fmt::Write as _};

use serde_json::Value;

use dossier_config::Generation;
use dossier_domain::{
	argument::ArgumentationLine,
	evidence::{EvidenceUnit, SourceRecord},
};

const SYSTEM_PROMPT: &str = "You write evidence-bound analytical documents. \
Every paragraph must rest on the evidence blocks you are given and must list the evidence ids it \
relies on. Never invent evidence ids, sources, or quotations. \
Output must be valid JSON only and must match the provided schema exactly. \
Do not add explanations or extra fields.";

pub struct PromptInput<'a> {
	pub query: &'a str,
	pub approach: Option<&'a str>,
	pub word_limit: u32,
	pub argumentation: Option<&'a ArgumentationLine>,
	pub units: &'a [EvidenceUnit],
	pub sources: &'a HashMap<String, SourceRecord>,
}

/// Output budget scaled from the requested length and capped by configuration.
pub fn max_tokens(cfg: &Generation, word_limit: u32) -> u32 {
	cfg.max_tokens.min(word_limit.saturating_mul(2).saturating_add(1_024))
}

pub fn build_messages(input: &PromptInput<'_>) -> Vec<Value> {
	let schema = serde_json::json!({
		"title": "string",
		"sections": [{
			"heading": "string",
			"paragraphs": [{
				"text": "string",
				"evidence_ids": ["string"],
				"citations": [{
					"evidence_id": "string",
					"usage_type": "direct|substantial|reference",
					"char_start": 0,
					"char_end": 0,
					"quoted_text": "string"
				}]
			}]
		}]
	});
	let schema_text = serde_json::to_string_pretty(&schema)
		.unwrap_or_else(|_| "{\"title\": \"string\", \"sections\": []}".to_string());
	let mut user_prompt = format!(
		"Return JSON matching this exact schema:\n{schema_text}\nConstraints:\n\
- WORD_LIMIT = {word_limit}\n\
- Each paragraph lists at least one evidence id in evidence_ids.\n\
- usage_type is direct for verbatim quotes, substantial for close paraphrase, reference otherwise.\n\
- char_start and char_end are character offsets into the cited evidence text.\n\
Question:\n{query}\n",
		word_limit = input.word_limit,
		query = input.query.trim(),
	);

	if let Some(approach) = input.approach.map(str::trim).filter(|approach| !approach.is_empty()) {
		let _ = writeln!(user_prompt, "Approach:\n{approach}");
	}
	if let Some(line) = input.argumentation {
		let _ = writeln!(user_prompt, "Argumentation line:\nThesis: {}", line.thesis.trim());

		for section in &line.sections {
			let _ = writeln!(user_prompt, "- {}", section.title.trim());

			for point in &section.key_points {
				let _ = writeln!(user_prompt, "  * {}", point.trim());
			}
		}
	}

	user_prompt.push_str("Evidence:\n");

	for unit in input.units {
		user_prompt.push_str(&evidence_block(unit, input.sources.get(&unit.source_id)));
	}

	vec![
		serde_json::json!({ "role": "system", "content": SYSTEM_PROMPT }),
		serde_json::json!({ "role": "user", "content": user_prompt }),
	]
}

fn evidence_block(unit: &EvidenceUnit, source: Option<&SourceRecord>) -> String {
	let title = source.map(|source| source.title.as_str()).filter(|title| !title.is_empty());
	let mut header = format!("[evidence_id: {}] source ", unit.id);

	match title {
		Some(title) => {
			let _ = write!(header, "\"{title}\"");
		},
		None => header.push_str(&unit.source_id),
	}

	let _ = write!(header, " ({})", unit.source_category);

	if let Some(page) = unit.page_number {
		let _ = write!(header, ", page {page}");
	}
	if let Some(paragraph) = unit.paragraph_index {
		let _ = write!(header, ", paragraph {paragraph}");
	}
	if unit.is_expanded_context {
		header.push_str(", adjacent context");
	}

	format!("{header}\n{}\n\n", unit.text.trim())
}

#[cfg(test)]
mod tests {
	use dossier_domain::evidence::SourceCategory;

	use super::*;

	fn unit(id: &str) -> EvidenceUnit {
		EvidenceUnit {
			id: id.to_string(),
			source_id: "gdpr".to_string(),
			source_category: SourceCategory::Regulation,
			page_number: Some(4),
			paragraph_index: None,
			sequence_index: 0,
			text: "Personal data shall be processed lawfully.".to_string(),
			similarity: 0.9,
			derived_score: 1.0,
			is_expanded_context: false,
		}
	}

	#[test]
	fn max_tokens_scales_with_word_limit() {
		let cfg = Generation::default();

		assert_eq!(max_tokens(&cfg, 500), 2_024);
		assert_eq!(max_tokens(&cfg, 10_000), 8_192);
	}

	#[test]
	fn evidence_blocks_carry_id_title_and_category() {
		let sources = HashMap::from([(
			"gdpr".to_string(),
			SourceRecord {
				id: "gdpr".to_string(),
				category: SourceCategory::Regulation,
				title: "GDPR".to_string(),
			},
		)]);
		let units = vec![unit("u-1")];
		let messages = build_messages(&PromptInput {
			query: "When is processing lawful?",
			approach: Some("doctrinal"),
			word_limit: 800,
			argumentation: None,
			units: &units,
			sources: &sources,
		});
		let user = messages[1]["content"].as_str().expect("user prompt should be a string.");

		assert_eq!(messages[0]["role"], "system");
		assert!(user.contains("[evidence_id: u-1] source \"GDPR\" (regulation), page 4"));
		assert!(user.contains("WORD_LIMIT = 800"));
		assert!(user.contains("Approach:\ndoctrinal"));
	}
}
