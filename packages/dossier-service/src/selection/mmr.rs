use std::{cmp::Ordering, collections::HashSet};

use dossier_config::Selection;
use dossier_domain::{evidence::EvidenceUnit, text};

use crate::selection::{SelectionBudget, SelectionOutcome, WorkingSet};

#[derive(Clone, Copy, Debug)]
struct MmrPick {
	idx: usize,
	mmr_score: f32,
}
impl MmrPick {
	fn better_than(self, other: &Self, ranked: &[EvidenceUnit]) -> bool {
		match self.mmr_score.partial_cmp(&other.mmr_score) {
			Some(Ordering::Greater) => true,
			Some(Ordering::Less) => false,
			_ => {
				let lhs = &ranked[self.idx];
				let rhs = &ranked[other.idx];

				lhs.derived_score > rhs.derived_score
					|| (lhs.derived_score == rhs.derived_score && lhs.id < rhs.id)
			},
		}
	}
}

/// Maximal marginal relevance selection with token-set Jaccard as the redundancy measure.
pub fn select_mmr(
	cfg: &Selection,
	ranked: &[EvidenceUnit],
	budget: &SelectionBudget,
) -> SelectionOutcome {
	let mut set = WorkingSet::new(ranked, budget);

	if ranked.is_empty() {
		return set.finish();
	}

	let max_score = ranked.iter().map(|unit| unit.derived_score).fold(f32::MIN, f32::max);
	let scale = if max_score > f32::EPSILON { max_score } else { 1.0 };
	let relevance: Vec<f32> = ranked.iter().map(|unit| unit.derived_score / scale).collect();
	let tokens: Vec<HashSet<String>> =
		ranked.iter().map(|unit| text::token_set(&unit.text)).collect();
	let seed = (0..ranked.len())
		.filter(|&idx| set.admits(idx, budget.max_units_per_source))
		.min_by(|&a, &b| crate::ranking::cmp_ranked(&ranked[a], &ranked[b]));

	let Some(seed) = seed else {
		tracing::debug!(pool = ranked.len(), "No evidence unit fits the selection budget.");

		return set.finish();
	};

	set.push(seed, "top_relevance", Some(cfg.mmr_lambda * relevance[seed]));

	loop {
		let next = pick_next(cfg, ranked, &set, &relevance, &tokens, budget.max_units_per_source)
			.map(|pick| (pick, "mmr"))
			.or_else(|| {
				pick_next(cfg, ranked, &set, &relevance, &tokens, budget.hard_max_units_per_source)
					.map(|pick| (pick, "hard_cap_backfill"))
			});
		let Some((pick, reason)) = next else { break };

		set.push(pick.idx, reason, Some(pick.mmr_score));
	}

	set.finish()
}

fn pick_next(
	cfg: &Selection,
	ranked: &[EvidenceUnit],
	set: &WorkingSet<'_>,
	relevance: &[f32],
	tokens: &[HashSet<String>],
	quota: usize,
) -> Option<MmrPick> {
	let mut best: Option<MmrPick> = None;

	for idx in 0..ranked.len() {
		if !set.admits(idx, quota) {
			continue;
		}

		let redundancy = set
			.picked()
			.iter()
			.map(|&picked| text::jaccard(&tokens[idx], &tokens[picked]))
			.fold(0.0_f32, f32::max);
		let diversity =
			if set.count(&ranked[idx].source_id) == 0 { cfg.source_diversity_bonus } else { 0.0 };
		let candidate = MmrPick {
			idx,
			mmr_score: cfg.mmr_lambda * relevance[idx] - (1.0 - cfg.mmr_lambda) * redundancy
				+ diversity,
		};

		if best.as_ref().map(|current| candidate.better_than(current, ranked)).unwrap_or(true) {
			best = Some(candidate);
		}
	}

	best
}
