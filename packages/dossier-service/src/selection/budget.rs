use std::collections::HashSet;

use serde::Serialize;

use dossier_config::Selection;
use dossier_domain::evidence::EvidenceUnit;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct SelectionBudget {
	pub max_total_chars: usize,
	pub max_units_per_source: usize,
	pub hard_max_units_per_source: usize,
	pub target_source_count: usize,
}
impl SelectionBudget {
	/// Explicit budget. The hard cap is raised to the soft quota when given lower.
	pub fn new(
		max_total_chars: usize,
		max_units_per_source: usize,
		hard_max_units_per_source: usize,
		target_source_count: usize,
	) -> Self {
		let max_units_per_source = max_units_per_source.max(1);

		Self {
			max_total_chars,
			max_units_per_source,
			hard_max_units_per_source: hard_max_units_per_source.max(max_units_per_source),
			target_source_count,
		}
	}

	/// Derives the budget from the pool size, its distinct sources and the per-unit estimate.
	pub fn derive(cfg: &Selection, pool: &[EvidenceUnit]) -> Self {
		let distinct_sources =
			pool.iter().map(|unit| unit.source_id.as_str()).collect::<HashSet<_>>().len();
		let target_units = pool.len().min(cfg.max_units as usize);
		let max_total_chars = (cfg.max_context_chars as usize)
			.min(target_units.saturating_mul(cfg.unit_chars_estimate as usize));
		let target_source_count = distinct_sources.min(cfg.max_sources as usize);
		let soft = if target_source_count == 0 {
			1
		} else {
			target_units.div_ceil(target_source_count).max(1)
		};
		let hard = soft.saturating_mul(cfg.hard_cap_multiplier as usize);

		Self::new(max_total_chars, soft, hard, target_source_count)
	}
}

#[cfg(test)]
mod tests {
	use dossier_domain::evidence::SourceCategory;

	use super::*;

	fn pool(sources: &[(&str, usize)]) -> Vec<EvidenceUnit> {
		let mut out = Vec::new();

		for (source_id, count) in sources {
			for idx in 0..*count {
				out.push(EvidenceUnit {
					id: format!("{source_id}-{idx}"),
					source_id: source_id.to_string(),
					source_category: SourceCategory::Book,
					page_number: None,
					paragraph_index: None,
					sequence_index: idx as u32,
					text: "x".repeat(100),
					similarity: 0.5,
					derived_score: 0.5,
					is_expanded_context: false,
				});
			}
		}

		out
	}

	#[test]
	fn derives_quotas_from_pool_shape() {
		let cfg = Selection::default();
		let budget = SelectionBudget::derive(&cfg, &pool(&[("a", 5), ("b", 4), ("c", 1)]));

		assert_eq!(budget.max_total_chars, 12_000);
		assert_eq!(budget.target_source_count, 3);
		assert_eq!(budget.max_units_per_source, 4);
		assert_eq!(budget.hard_max_units_per_source, 8);
	}

	#[test]
	fn context_cap_and_source_cap_apply() {
		let cfg = Selection { max_context_chars: 5_000, max_sources: 2, ..Selection::default() };
		let budget = SelectionBudget::derive(&cfg, &pool(&[("a", 3), ("b", 3), ("c", 3)]));

		assert_eq!(budget.max_total_chars, 5_000);
		assert_eq!(budget.target_source_count, 2);
		assert_eq!(budget.max_units_per_source, 5);
	}

	#[test]
	fn empty_pool_yields_zero_budget() {
		let budget = SelectionBudget::derive(&Selection::default(), &[]);

		assert_eq!(budget.max_total_chars, 0);
		assert_eq!(budget.target_source_count, 0);
		assert_eq!(budget.max_units_per_source, 1);
	}

	#[test]
	fn hard_cap_never_below_soft_quota() {
		let budget = SelectionBudget::new(1_000, 4, 2, 3);

		assert_eq!(budget.hard_max_units_per_source, 4);
	}
}
