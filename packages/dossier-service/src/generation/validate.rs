use std::collections::HashMap;

use serde::Serialize;
use serde_json::Value;

use dossier_domain::{
	document::{
		self, Citation, GenerationOutput, Paragraph, RawCitation, RawGenerationOutput, RawParagraph,
		Section, UsageType,
	},
	evidence::{self, EvidenceUnit},
};

use crate::{Error, Result};

/// Non-fatal finding returned next to the document.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ValidationWarning {
	pub code: String,
	pub paragraph_index: usize,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub evidence_id: Option<String>,
	pub message: String,
}

/// Checks the parsed output against the working set and heals missing citations.
///
/// Fatal: a document without paragraphs, a paragraph without evidence ids, an unknown evidence
/// id anywhere, an unknown usage type. Out-of-range positions and quotes that do not occur in
/// their unit are kept as given and produce warnings.
pub fn validate_output(
	raw: RawGenerationOutput,
	units: &HashMap<&str, &EvidenceUnit>,
	excerpt_chars: usize,
) -> Result<(GenerationOutput, Vec<ValidationWarning>)> {
	let mut warnings = Vec::new();
	let mut sections = Vec::with_capacity(raw.sections.len());
	let mut paragraph_index = 0_usize;

	for raw_section in raw.sections {
		let mut paragraphs = Vec::with_capacity(raw_section.paragraphs.len());

		for raw_paragraph in raw_section.paragraphs {
			paragraphs.push(validate_paragraph(
				raw_paragraph,
				paragraph_index,
				units,
				excerpt_chars,
				&mut warnings,
			)?);

			paragraph_index += 1;
		}

		sections.push(Section { heading: raw_section.heading.trim().to_string(), paragraphs });
	}

	if paragraph_index == 0 {
		return Err(Error::InvalidOutput { message: "Document has no paragraphs.".to_string() });
	}

	let title = raw.title.map(|title| title.trim().to_string()).filter(|title| !title.is_empty());

	Ok((GenerationOutput { title, sections }, warnings))
}

/// Reference citation over the unit's opening characters.
pub fn synthesize_citation(unit: &EvidenceUnit, excerpt_chars: usize) -> Citation {
	let excerpt = unit.excerpt(excerpt_chars);

	Citation {
		evidence_id: unit.id.clone(),
		usage_type: UsageType::Reference,
		char_start: Some(0),
		char_end: Some(excerpt.chars().count() as i64),
		quoted_text: None,
	}
}

fn validate_paragraph(
	raw: RawParagraph,
	paragraph_index: usize,
	units: &HashMap<&str, &EvidenceUnit>,
	excerpt_chars: usize,
	warnings: &mut Vec<ValidationWarning>,
) -> Result<Paragraph> {
	let mut evidence_ids: Vec<String> = Vec::with_capacity(raw.evidence_ids.len());

	for evidence_id in raw.evidence_ids {
		let evidence_id = evidence_id.trim().to_string();

		if evidence_id.is_empty() {
			continue;
		}

		known_unit(units, &evidence_id, paragraph_index)?;

		if !evidence_ids.contains(&evidence_id) {
			evidence_ids.push(evidence_id);
		}
	}

	if evidence_ids.is_empty() {
		return Err(Error::InvalidOutput {
			message: format!("Paragraph {paragraph_index} has no evidence_ids."),
		});
	}

	let mut citations = Vec::new();

	for raw_citation in raw.citations.unwrap_or_default() {
		let citation = validate_citation(raw_citation, paragraph_index, units, warnings)?;

		if !evidence_ids.contains(&citation.evidence_id) {
			warnings.push(ValidationWarning {
				code: "citation_evidence_added".to_string(),
				paragraph_index,
				evidence_id: Some(citation.evidence_id.clone()),
				message: "Cited evidence id was missing from evidence_ids and has been added."
					.to_string(),
			});
			evidence_ids.push(citation.evidence_id.clone());
		}

		citations.push(citation);
	}

	for evidence_id in &evidence_ids {
		if citations.iter().any(|citation| &citation.evidence_id == evidence_id) {
			continue;
		}
		if let Some(unit) = units.get(evidence_id.as_str()) {
			citations.push(synthesize_citation(unit, excerpt_chars));
		}
	}

	Ok(Paragraph { text: raw.text.trim().to_string(), evidence_ids, citations })
}

fn validate_citation(
	raw: RawCitation,
	paragraph_index: usize,
	units: &HashMap<&str, &EvidenceUnit>,
	warnings: &mut Vec<ValidationWarning>,
) -> Result<Citation> {
	let evidence_id = raw.evidence_id.trim().to_string();
	let unit = known_unit(units, &evidence_id, paragraph_index)?;
	let Some(usage_type) = UsageType::parse(&raw.usage_type) else {
		return Err(Error::InvalidOutput {
			message: format!(
				"Paragraph {paragraph_index} cites {evidence_id} with unknown usage_type {:?}.",
				raw.usage_type
			),
		});
	};
	let char_start =
		read_position(raw.char_start, "char_start", &evidence_id, paragraph_index, warnings);
	let char_end = read_position(raw.char_end, "char_end", &evidence_id, paragraph_index, warnings);
	let len = unit.char_len() as i64;
	let in_range = [char_start, char_end]
		.into_iter()
		.flatten()
		.all(|position| (0..=len).contains(&position))
		&& match (char_start, char_end) {
			(Some(start), Some(end)) => start < end,
			_ => true,
		};

	if !in_range {
		warnings.push(ValidationWarning {
			code: "citation_position_out_of_range".to_string(),
			paragraph_index,
			evidence_id: Some(evidence_id.clone()),
			message: format!(
				"Citation positions {char_start:?}..{char_end:?} do not fit a unit of {len} characters."
			),
		});
	}

	let quoted_text =
		raw.quoted_text.map(|quote| quote.trim().to_string()).filter(|quote| !quote.is_empty());

	if let Some(quote) = quoted_text.as_deref()
		&& !evidence::quote_matches(&unit.text, quote)
	{
		warnings.push(ValidationWarning {
			code: "quote_not_found".to_string(),
			paragraph_index,
			evidence_id: Some(evidence_id.clone()),
			message: "Quoted text does not occur in the cited unit.".to_string(),
		});
	}

	Ok(Citation { evidence_id, usage_type, char_start, char_end, quoted_text })
}

/// Integer view of a position. Anything that is not an integer is dropped with a warning.
fn read_position(
	raw: Option<Value>,
	field: &str,
	evidence_id: &str,
	paragraph_index: usize,
	warnings: &mut Vec<ValidationWarning>,
) -> Option<i64> {
	let value = raw?;
	let position = document::position_value(&value);

	if position.is_none() {
		warnings.push(ValidationWarning {
			code: "citation_position_unreadable".to_string(),
			paragraph_index,
			evidence_id: Some(evidence_id.to_string()),
			message: format!("Citation {field} {value} is not an integer; dropped."),
		});
	}

	position
}

fn known_unit<'a>(
	units: &HashMap<&str, &'a EvidenceUnit>,
	evidence_id: &str,
	paragraph_index: usize,
) -> Result<&'a EvidenceUnit> {
	units.get(evidence_id).copied().ok_or_else(|| Error::InvalidOutput {
		message: format!("Paragraph {paragraph_index} references unknown evidence id {evidence_id}."),
	})
}
