use std::collections::HashSet;

use dossier_config::Argument;
use dossier_domain::{argument::ArgumentProfile, evidence::EvidenceUnit, text};

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ArgumentBonus {
	pub focus: f32,
	pub topic: f32,
	pub approach: f32,
}
impl ArgumentBonus {
	pub fn total(self) -> f32 {
		self.focus + self.topic + self.approach
	}
}

pub fn argument_bonus(cfg: &Argument, profile: &ArgumentProfile, unit_text: &str) -> ArgumentBonus {
	let lowered = unit_text.to_lowercase();
	let tokens = text::token_set(unit_text);

	ArgumentBonus {
		focus: term_ratio(&profile.focus_terms, &tokens) * cfg.focus_bonus_max,
		topic: topic_ratio(cfg, &profile.section_topics, &lowered, &tokens) * cfg.topic_bonus_max,
		approach: term_ratio(&profile.approach_terms, &tokens) * cfg.approach_bonus_max,
	}
}

/// Adds the capped argument bonuses and re-sorts. A missing or empty profile leaves the units
/// untouched.
pub fn rerank(cfg: &Argument, profile: Option<&ArgumentProfile>, units: &mut [EvidenceUnit]) {
	let Some(profile) = profile.filter(|profile| !profile.is_empty()) else { return };

	for unit in units.iter_mut() {
		unit.derived_score += argument_bonus(cfg, profile, &unit.text).total();
	}

	super::sort_ranked(units);
}

fn term_ratio(terms: &[String], tokens: &HashSet<String>) -> f32 {
	if terms.is_empty() {
		return 0.0;
	}

	let matched = terms.iter().filter(|term| tokens.contains(term.as_str())).count();

	matched as f32 / terms.len() as f32
}

fn topic_ratio(
	cfg: &Argument,
	topics: &[String],
	lowered_text: &str,
	tokens: &HashSet<String>,
) -> f32 {
	if topics.is_empty() {
		return 0.0;
	}

	let matched = topics
		.iter()
		.filter(|topic| {
			if lowered_text.contains(topic.as_str()) {
				return true;
			}

			let shared = text::significant_terms(topic)
				.iter()
				.filter(|word| tokens.contains(word.as_str()))
				.count();

			shared >= cfg.topic_min_shared_words as usize
		})
		.count();

	matched as f32 / topics.len() as f32
}

#[cfg(test)]
mod tests {
	use dossier_domain::{
		argument::{ArgumentSection, ArgumentationLine},
		evidence::SourceCategory,
	};

	use super::*;

	fn unit(id: &str, score: f32, text: &str) -> EvidenceUnit {
		EvidenceUnit {
			id: id.to_string(),
			source_id: "s".to_string(),
			source_category: SourceCategory::Academic,
			page_number: None,
			paragraph_index: None,
			sequence_index: 0,
			text: text.to_string(),
			similarity: score,
			derived_score: score,
			is_expanded_context: false,
		}
	}

	fn profile() -> ArgumentProfile {
		ArgumentProfile::from_line(&ArgumentationLine {
			thesis: "surveillance violates privacy".to_string(),
			sections: vec![ArgumentSection {
				title: "Judicial oversight of interception".to_string(),
				key_points: Vec::new(),
			}],
			approach: Some("comparative".to_string()),
		})
	}

	#[test]
	fn missing_profile_is_a_no_op() {
		let cfg = Argument::default();
		let mut units = vec![unit("a", 0.2, "privacy"), unit("b", 0.9, "other")];
		let before = units.clone();

		rerank(&cfg, None, &mut units);

		assert_eq!(units, before);

		rerank(&cfg, Some(&ArgumentProfile::default()), &mut units);

		assert_eq!(units, before);
	}

	#[test]
	fn bonuses_stay_within_caps() {
		let cfg = Argument::default();
		let bonus = argument_bonus(
			&cfg,
			&profile(),
			"Surveillance violates privacy; judicial oversight of interception is comparative.",
		);

		assert!((bonus.focus - 0.3).abs() < 1e-6);
		assert!((bonus.topic - 0.25).abs() < 1e-6);
		assert!((bonus.approach - 0.15).abs() < 1e-6);
	}

	#[test]
	fn topic_matches_on_two_shared_significant_words() {
		let cfg = Argument::default();
		let bonus = argument_bonus(&cfg, &profile(), "Interception requires prior judicial approval.");

		assert!((bonus.topic - 0.25).abs() < 1e-6);

		let weak = argument_bonus(&cfg, &profile(), "Interception is common.");

		assert_eq!(weak.topic, 0.0);
	}

	#[test]
	fn rerank_promotes_on_argument_units() {
		let cfg = Argument::default();
		let mut units = vec![
			unit("off", 0.6, "Tax law basics."),
			unit("on", 0.5, "Surveillance violates privacy under judicial oversight of interception."),
		];

		rerank(&cfg, Some(&profile()), &mut units);

		assert_eq!(units[0].id, "on");
		assert!(units[0].derived_score > 0.6);
		assert!((units[1].derived_score - 0.6).abs() < 1e-6);
	}
}
