use std::collections::{HashMap, HashSet};

use serde::Serialize;

use dossier_config::Quality;
use dossier_domain::{
	document::{GenerationOutput, UsageType},
	evidence::{EvidenceUnit, SourceCategory, SourceRecord},
};

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SourceTally {
	pub source_id: String,
	pub title: String,
	pub category: SourceCategory,
	pub direct: u32,
	pub substantial: u32,
	pub reference: u32,
}
impl SourceTally {
	pub fn total(&self) -> u32 {
		self.direct + self.substantial + self.reference
	}
}

/// Informational report on how much of the working set the document actually cites.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CoverageReport {
	pub required_source_count: usize,
	pub used_source_count: usize,
	pub missing_source_ids: Vec<String>,
	pub quality_score: f32,
	pub coverage_ratio: f32,
	pub primary_coverage_ratio: f32,
	/// Citations per thousand words of paragraph text.
	pub citation_density: f32,
	/// Mean usage weight per paragraph.
	pub citation_strength: f32,
	pub sources: Vec<SourceTally>,
}

pub fn usage_weight(cfg: &Quality, usage_type: UsageType) -> f32 {
	match usage_type {
		UsageType::Direct => cfg.direct_weight,
		UsageType::Substantial => cfg.substantial_weight,
		UsageType::Reference => cfg.reference_weight,
	}
}

pub fn coverage_report(
	cfg: &Quality,
	document: &GenerationOutput,
	working_set: &[EvidenceUnit],
	sources: &HashMap<String, SourceRecord>,
) -> CoverageReport {
	let unit_by_id: HashMap<&str, &EvidenceUnit> =
		working_set.iter().map(|unit| (unit.id.as_str(), unit)).collect();
	let mut tallies: Vec<SourceTally> = Vec::new();
	let mut slot_of: HashMap<&str, usize> = HashMap::new();

	for unit in working_set {
		if slot_of.contains_key(unit.source_id.as_str()) {
			continue;
		}

		let record = sources.get(&unit.source_id);

		slot_of.insert(unit.source_id.as_str(), tallies.len());
		tallies.push(SourceTally {
			source_id: unit.source_id.clone(),
			title: record.map(|record| record.title.clone()).unwrap_or_default(),
			category: record.map(|record| record.category).unwrap_or(unit.source_category),
			direct: 0,
			substantial: 0,
			reference: 0,
		});
	}

	let mut citation_count = 0_usize;
	let mut weight_sum = 0.0_f32;

	for citation in document.citations() {
		citation_count += 1;
		weight_sum += usage_weight(cfg, citation.usage_type);

		let Some(unit) = unit_by_id.get(citation.evidence_id.as_str()) else { continue };
		let Some(&slot) = slot_of.get(unit.source_id.as_str()) else { continue };
		let tally = &mut tallies[slot];

		match citation.usage_type {
			UsageType::Direct => tally.direct += 1,
			UsageType::Substantial => tally.substantial += 1,
			UsageType::Reference => tally.reference += 1,
		}
	}

	let used: HashSet<&str> = tallies
		.iter()
		.filter(|tally| tally.total() > 0)
		.map(|tally| tally.source_id.as_str())
		.collect();
	let missing_source_ids: Vec<String> = tallies
		.iter()
		.filter(|tally| !used.contains(tally.source_id.as_str()))
		.map(|tally| tally.source_id.clone())
		.collect();
	let primary_required = tallies.iter().filter(|tally| tally.category.is_primary()).count();
	let primary_used = tallies
		.iter()
		.filter(|tally| tally.category.is_primary() && tally.total() > 0)
		.count();
	let coverage_ratio = ratio(used.len(), tallies.len(), 0.0);
	let primary_coverage_ratio = ratio(primary_used, primary_required, 1.0);
	let words = document.word_count();
	let citation_density =
		if words == 0 { 0.0 } else { citation_count as f32 * 1_000.0 / words as f32 };
	let paragraphs = document.paragraph_count();
	let citation_strength = if paragraphs == 0 { 0.0 } else { weight_sum / paragraphs as f32 };
	let density_term = if cfg.density_target > 0.0 {
		(citation_density / cfg.density_target).min(1.0)
	} else {
		0.0
	};
	let quality_score = (cfg.coverage_weight * coverage_ratio
		+ cfg.primary_coverage_weight * primary_coverage_ratio
		+ cfg.density_weight * density_term
		+ cfg.strength_weight * citation_strength.min(cfg.strength_cap))
	.clamp(0.0, 100.0);

	CoverageReport {
		required_source_count: tallies.len(),
		used_source_count: used.len(),
		missing_source_ids,
		quality_score,
		coverage_ratio,
		primary_coverage_ratio,
		citation_density,
		citation_strength,
		sources: tallies,
	}
}

fn ratio(numerator: usize, denominator: usize, empty: f32) -> f32 {
	if denominator == 0 { empty } else { numerator as f32 / denominator as f32 }
}

#[cfg(test)]
mod tests {
	use dossier_domain::document::{Citation, Paragraph, Section};

	use super::*;

	fn unit(id: &str, source_id: &str, category: SourceCategory) -> EvidenceUnit {
		EvidenceUnit {
			id: id.to_string(),
			source_id: source_id.to_string(),
			source_category: category,
			page_number: None,
			paragraph_index: None,
			sequence_index: 0,
			text: "Evidence text.".to_string(),
			similarity: 0.9,
			derived_score: 1.0,
			is_expanded_context: false,
		}
	}

	fn document(citations: &[(&str, UsageType)]) -> GenerationOutput {
		GenerationOutput {
			title: None,
			sections: vec![Section {
				heading: "H".to_string(),
				paragraphs: vec![Paragraph {
					text: "word ".repeat(200),
					evidence_ids: citations.iter().map(|(id, _)| id.to_string()).collect(),
					citations: citations
						.iter()
						.map(|(id, usage_type)| Citation {
							evidence_id: id.to_string(),
							usage_type: *usage_type,
							char_start: None,
							char_end: None,
							quoted_text: None,
						})
						.collect(),
				}],
			}],
		}
	}

	fn working_set() -> Vec<EvidenceUnit> {
		vec![
			unit("s1", "statute", SourceCategory::Statute),
			unit("b1", "book", SourceCategory::Book),
			unit("n1", "news", SourceCategory::News),
		]
	}

	#[test]
	fn tallies_and_missing_sources() {
		let sources = HashMap::from([(
			"statute".to_string(),
			SourceRecord {
				id: "statute".to_string(),
				category: SourceCategory::Statute,
				title: "Act".to_string(),
			},
		)]);
		let report = coverage_report(
			&Quality::default(),
			&document(&[("s1", UsageType::Direct), ("b1", UsageType::Reference)]),
			&working_set(),
			&sources,
		);

		assert_eq!(report.required_source_count, 3);
		assert_eq!(report.used_source_count, 2);
		assert_eq!(report.missing_source_ids, vec!["news".to_string()]);
		assert_eq!(report.sources[0].title, "Act");
		assert_eq!(report.sources[0].direct, 1);
		assert!((report.primary_coverage_ratio - 1.0).abs() < 1e-6);
		assert!((report.citation_density - 10.0).abs() < 1e-4);
		assert!((report.citation_strength - 1.5).abs() < 1e-6);
	}

	#[test]
	fn quality_is_in_range_and_monotonic_in_citations() {
		let cfg = Quality::default();
		let sources = HashMap::new();
		let mut cited: Vec<(&str, UsageType)> = Vec::new();
		let mut previous = coverage_report(&cfg, &document(&cited), &working_set(), &sources);

		for next in [
			("n1", UsageType::Reference),
			("b1", UsageType::Substantial),
			("s1", UsageType::Direct),
			("s1", UsageType::Reference),
			("b1", UsageType::Direct),
		] {
			cited.push(next);

			let report = coverage_report(&cfg, &document(&cited), &working_set(), &sources);

			assert!((0.0..=100.0).contains(&report.quality_score));
			assert!(report.quality_score >= previous.quality_score);

			previous = report;
		}
	}

	#[test]
	fn empty_working_set_scores_zero_coverage() {
		let report = coverage_report(
			&Quality::default(),
			&document(&[]),
			&[],
			&HashMap::new(),
		);

		assert_eq!(report.required_source_count, 0);
		assert_eq!(report.coverage_ratio, 0.0);
		assert_eq!(report.primary_coverage_ratio, 1.0);
	}
}
