use std::collections::HashMap;

use dossier_config::Scoring;
use dossier_domain::{evidence::EvidenceUnit, patterns, text};

use crate::ranking::groups::{self, ArgumentGroup};

pub fn length_norm(cfg: &Scoring, chars: usize) -> f32 {
	let ideal = cfg.ideal_unit_chars.max(1) as f32;

	(cfg.length_floor + (1.0 - cfg.length_floor) * chars as f32 / ideal).clamp(cfg.length_floor, 1.0)
}

pub fn positional_bias(cfg: &Scoring, sequence_index: u32) -> f32 {
	(1.0 - cfg.position_decay * sequence_index as f32).max(cfg.position_floor)
}

pub fn keyword_bonus(cfg: &Scoring, query_tokens: &[String], unit_text: &str) -> f32 {
	if query_tokens.is_empty() {
		return 0.0;
	}

	let unit_tokens = text::token_set(unit_text);
	let matched = query_tokens.iter().filter(|token| unit_tokens.contains(token.as_str())).count();

	cfg.keyword_bonus_max * matched as f32 / query_tokens.len() as f32
}

pub fn coherence_bonus(cfg: &Scoring, group: &ArgumentGroup) -> f32 {
	let members = group.unit_ids.len();

	if members < 2 {
		return 0.0;
	}

	let raw = cfg.coherence_step * (members - 1) as f32
		+ cfg.coherence_marker_step * group.citation_markers as f32;

	raw.min(cfg.coherence_bonus_max)
}

pub fn pattern_bonus(cfg: &Scoring, unit_text: &str) -> f32 {
	let matches = patterns::count_citation_markers(unit_text);

	(cfg.pattern_bonus_per_match * matches as f32).min(cfg.pattern_bonus_max)
}

/// Recomputes `derived_score` for every unit and returns them ranked.
///
/// `similarity × category_weight × length_norm × positional_bias` plus the keyword, coherence
/// and pattern bonuses. Pure and deterministic: identical input yields identical scores and
/// order.
pub fn score_units(cfg: &Scoring, query: &str, mut units: Vec<EvidenceUnit>) -> Vec<EvidenceUnit> {
	let query_tokens = text::query_tokens(query, cfg.keyword_min_token_chars as usize);
	let groups = groups::detect_groups(&units, cfg.group_gap_threshold);
	let coherence_by_unit: HashMap<String, f32> = groups
		.iter()
		.flat_map(|group| {
			let bonus = coherence_bonus(cfg, group);

			group.unit_ids.iter().map(move |id| (id.clone(), bonus))
		})
		.collect();

	for unit in &mut units {
		let base = unit.similarity
			* unit.source_category.weight()
			* length_norm(cfg, unit.char_len())
			* positional_bias(cfg, unit.sequence_index);
		let coherence = coherence_by_unit.get(&unit.id).copied().unwrap_or(0.0);

		unit.derived_score = base
			+ keyword_bonus(cfg, &query_tokens, &unit.text)
			+ coherence
			+ pattern_bonus(cfg, &unit.text);
	}

	super::sort_ranked(&mut units);

	tracing::debug!(
		units = units.len(),
		groups = groups.len(),
		top_score = units.first().map(|unit| unit.derived_score),
		"Scored evidence units."
	);

	units
}

#[cfg(test)]
mod tests {
	use dossier_domain::evidence::SourceCategory;

	use super::*;

	fn unit(id: &str, category: SourceCategory, sequence_index: u32, text: &str) -> EvidenceUnit {
		EvidenceUnit {
			id: id.to_string(),
			source_id: format!("src-{id}"),
			source_category: category,
			page_number: None,
			paragraph_index: None,
			sequence_index,
			text: text.to_string(),
			similarity: 0.8,
			derived_score: 0.0,
			is_expanded_context: false,
		}
	}

	#[test]
	fn length_norm_is_clamped() {
		let cfg = Scoring::default();

		assert!((length_norm(&cfg, 0) - 0.7).abs() < 1e-6);
		assert!((length_norm(&cfg, 300) - 0.85).abs() < 1e-6);
		assert!((length_norm(&cfg, 5_000) - 1.0).abs() < 1e-6);
	}

	#[test]
	fn positional_bias_has_floor() {
		let cfg = Scoring::default();

		assert!((positional_bias(&cfg, 0) - 1.0).abs() < 1e-6);
		assert!((positional_bias(&cfg, 10) - 0.95).abs() < 1e-6);
		assert!((positional_bias(&cfg, 500) - 0.9).abs() < 1e-6);
	}

	#[test]
	fn keyword_bonus_uses_long_query_tokens_only() {
		let cfg = Scoring::default();
		let tokens = text::query_tokens("the data privacy act", 4);

		assert_eq!(tokens, vec!["data", "privacy"]);
		assert!((keyword_bonus(&cfg, &tokens, "Privacy matters.") - 0.075).abs() < 1e-6);
		assert_eq!(keyword_bonus(&cfg, &[], "Privacy matters."), 0.0);
	}

	#[test]
	fn bonuses_are_capped() {
		let cfg = Scoring::default();
		let group = ArgumentGroup {
			source_id: "s".to_string(),
			unit_ids: (0..10).map(|idx| idx.to_string()).collect(),
			citation_markers: 10,
		};

		assert!((coherence_bonus(&cfg, &group) - 0.25).abs() < 1e-6);
		assert!(
			(pattern_bonus(&cfg, "§ 1, § 2, § 3, § 4, § 5, § 6, § 7 and [1] [2]") - 0.1).abs()
				< 1e-6
		);
		assert!((pattern_bonus(&cfg, "See § 1 and § 2.") - 0.04).abs() < 1e-6);
	}

	#[test]
	fn category_weight_orders_equal_units() {
		let cfg = Scoring::default();
		let ranked = score_units(
			&cfg,
			"unrelated",
			vec![
				unit("n", SourceCategory::News, 0, "Plain statement of facts."),
				unit("s", SourceCategory::Statute, 0, "Plain statement of facts."),
				unit("b", SourceCategory::Book, 0, "Plain statement of facts."),
			],
		);
		let ids: Vec<&str> = ranked.iter().map(|unit| unit.id.as_str()).collect();

		assert_eq!(ids, vec!["s", "b", "n"]);
	}

	#[test]
	fn scoring_is_deterministic() {
		let cfg = Scoring::default();
		let units = vec![
			unit("a", SourceCategory::CaseLaw, 3, "Therefore, as held in Smith v. Jones (2019)."),
			unit("b", SourceCategory::Academic, 1, "Privacy is a fundamental right."),
			unit("c", SourceCategory::Unknown, 0, "Privacy is a fundamental right."),
		];
		let first = score_units(&cfg, "fundamental privacy right", units.clone());
		let second = score_units(&cfg, "fundamental privacy right", units);

		assert_eq!(first, second);
	}
}
