use std::collections::HashMap;

use dossier_config::Selection;
use dossier_domain::evidence::EvidenceUnit;

use crate::{
	ranking::groups::{self, ArgumentGroup},
	selection::{SelectionBudget, SelectionOutcome, WorkingSet},
};

/// Tiered selection: primary-authority reserve, source coverage, round-robin, then leftover
/// fill under the hard cap.
pub fn select_tiered(
	cfg: &Selection,
	ranked: &[EvidenceUnit],
	budget: &SelectionBudget,
	groups: &[ArgumentGroup],
) -> SelectionOutcome {
	let mut set = WorkingSet::new(ranked, budget);
	let by_source = units_by_source(ranked);
	let soft = budget.max_units_per_source;

	reserve_primary(cfg, ranked, budget, groups, &by_source, &mut set);

	for (source_id, indices) in &by_source {
		if set.count(source_id) > 0 {
			continue;
		}
		if let Some(&idx) = indices.iter().find(|&&idx| set.admits(idx, soft)) {
			set.push(idx, "source_coverage", None);
		}
	}

	loop {
		let mut round: Vec<usize> = by_source
			.iter()
			.filter(|(source_id, _)| set.count(source_id) > 0)
			.filter_map(|(_, indices)| indices.iter().copied().find(|&idx| set.admits(idx, soft)))
			.collect();

		round.sort_by(|&a, &b| crate::ranking::cmp_ranked(&ranked[a], &ranked[b]));

		let mut progressed = false;

		for idx in round {
			if set.admits(idx, soft) {
				set.push(idx, "round_robin", None);

				progressed = true;
			}
		}

		if !progressed {
			break;
		}
	}

	for idx in 0..ranked.len() {
		if set.admits(idx, budget.hard_max_units_per_source) {
			set.push(idx, "leftover_fill", None);
		}
	}

	set.finish()
}

fn reserve_primary(
	cfg: &Selection,
	ranked: &[EvidenceUnit],
	budget: &SelectionBudget,
	groups: &[ArgumentGroup],
	by_source: &[(&str, Vec<usize>)],
	set: &mut WorkingSet<'_>,
) {
	let soft = budget.max_units_per_source;
	let reserve = (cfg.primary_reserve_ratio * budget.max_total_chars as f32).floor() as usize;
	let group_of = groups::membership(groups);
	let index_of: HashMap<&str, usize> =
		ranked.iter().enumerate().map(|(idx, unit)| (unit.id.as_str(), idx)).collect();
	let mut reserved_chars = 0_usize;

	for (source_id, indices) in by_source {
		let Some(&best) = indices.iter().find(|&&idx| set.admits(idx, soft)) else { continue };

		if !ranked[best].source_category.is_primary() {
			continue;
		}

		if let Some(&group_idx) = group_of.get(ranked[best].id.as_str()) {
			let members: Vec<usize> = groups[group_idx]
				.unit_ids
				.iter()
				.filter_map(|unit_id| index_of.get(unit_id.as_str()).copied())
				.filter(|&idx| !set.is_picked(idx))
				.collect();
			let chars: usize = members.iter().map(|&idx| ranked[idx].char_len()).sum();

			if members.len() >= 2
				&& members.len() <= soft
				&& reserved_chars + chars <= reserve
				&& set.fits_chars(chars)
				&& set.can_open(source_id)
			{
				for idx in members {
					set.push(idx, "primary_group", None);
				}

				reserved_chars += chars;

				continue;
			}
		}

		reserved_chars += ranked[best].char_len();

		set.push(best, "primary_reserve", None);
	}

	tracing::debug!(reserved_chars, reserve, "Reserved primary-authority evidence.");
}

/// Pool indices per source, sources in order of their best unit.
fn units_by_source(ranked: &[EvidenceUnit]) -> Vec<(&str, Vec<usize>)> {
	let mut order: Vec<(&str, Vec<usize>)> = Vec::new();
	let mut position: HashMap<&str, usize> = HashMap::new();
	let mut sorted: Vec<usize> = (0..ranked.len()).collect();

	sorted.sort_by(|&a, &b| crate::ranking::cmp_ranked(&ranked[a], &ranked[b]));

	for idx in sorted {
		let source_id = ranked[idx].source_id.as_str();
		let slot = *position.entry(source_id).or_insert_with(|| {
			order.push((source_id, Vec::new()));

			order.len() - 1
		});

		order[slot].1.push(idx);
	}

	order
}
