use std::collections::{HashMap, HashSet};

use dossier_config::Selection;
use dossier_domain::evidence::EvidenceUnit;

use crate::{
	SourceCatalog,
	selection::{SelectionBudget, SelectionDecision},
};

/// Primary-authority sources among the selected anchors, in first-seen order.
pub fn sources_to_expand(selected: &[EvidenceUnit]) -> Vec<String> {
	let mut seen = HashSet::new();

	selected
		.iter()
		.filter(|unit| unit.source_category.is_primary() && !unit.is_expanded_context)
		.filter(|unit| seen.insert(unit.source_id.as_str()))
		.map(|unit| unit.source_id.clone())
		.collect()
}

/// Fetches each source once. Failures are logged and the source is left unexpanded.
pub async fn fetch_siblings(
	catalog: &dyn SourceCatalog,
	source_ids: &[String],
) -> HashMap<String, Vec<EvidenceUnit>> {
	let mut out = HashMap::new();

	for source_id in source_ids {
		match catalog.list_units_by_source(source_id).await {
			Ok(units) => {
				out.insert(source_id.clone(), units);
			},
			Err(err) => {
				tracing::warn!(
					source_id = %source_id,
					error = %err,
					"Failed to fetch source units for context expansion."
				);
			},
		}
	}

	out
}

/// Inserts the ±1 `sequence_index` neighbours of every primary anchor right after it while the
/// total stays within `expansion_ratio × max_total_chars`. Neighbours are exempt from the
/// per-source quotas and never expand further.
pub fn apply_expansion(
	cfg: &Selection,
	budget: &SelectionBudget,
	selected: Vec<EvidenceUnit>,
	siblings: &HashMap<String, Vec<EvidenceUnit>>,
) -> (Vec<EvidenceUnit>, Vec<SelectionDecision>) {
	let limit = (cfg.expansion_ratio * budget.max_total_chars as f32).floor() as usize;
	let mut total: usize = selected.iter().map(EvidenceUnit::char_len).sum();
	let mut present: HashSet<String> = selected.iter().map(|unit| unit.id.clone()).collect();
	let mut out = Vec::with_capacity(selected.len());
	let mut decisions = Vec::new();

	for anchor in selected {
		let neighbours = if anchor.source_category.is_primary() && !anchor.is_expanded_context {
			neighbours_of(&anchor, siblings)
		} else {
			Vec::new()
		};
		let mut added = Vec::new();

		for neighbour in neighbours {
			if present.contains(&neighbour.id) {
				continue;
			}

			let chars = neighbour.char_len();
			let mut decision = SelectionDecision {
				unit_id: neighbour.id.clone(),
				source_id: neighbour.source_id.clone(),
				selected: false,
				selected_rank: None,
				selected_reason: None,
				skipped_reason: None,
				mmr_score: None,
			};

			if total + chars > limit {
				decision.skipped_reason = Some("expansion_budget".to_string());

				decisions.push(decision);

				continue;
			}

			total += chars;

			present.insert(neighbour.id.clone());

			decision.selected = true;
			decision.selected_reason = Some("adjacent_context".to_string());

			decisions.push(decision);
			added.push(EvidenceUnit {
				source_category: anchor.source_category,
				similarity: anchor.similarity,
				derived_score: cfg.expanded_score_factor * anchor.derived_score,
				is_expanded_context: true,
				..neighbour.clone()
			});
		}

		out.push(anchor);
		out.extend(added);
	}

	(out, decisions)
}

/// Fetches what the selected anchors need and applies the expansion.
pub async fn expand(
	catalog: &dyn SourceCatalog,
	cfg: &Selection,
	budget: &SelectionBudget,
	selected: Vec<EvidenceUnit>,
) -> (Vec<EvidenceUnit>, Vec<SelectionDecision>) {
	let source_ids = sources_to_expand(&selected);

	if source_ids.is_empty() {
		return (selected, Vec::new());
	}

	let siblings = fetch_siblings(catalog, &source_ids).await;
	let (units, decisions) = apply_expansion(cfg, budget, selected, &siblings);
	let added = decisions.iter().filter(|decision| decision.selected).count();

	tracing::info!(
		sources = source_ids.len(),
		added,
		skipped = decisions.len() - added,
		"Expanded primary-authority context."
	);

	(units, decisions)
}

fn neighbours_of<'a>(
	anchor: &EvidenceUnit,
	siblings: &'a HashMap<String, Vec<EvidenceUnit>>,
) -> Vec<&'a EvidenceUnit> {
	let Some(units) = siblings.get(&anchor.source_id) else { return Vec::new() };
	let before = anchor.sequence_index.checked_sub(1);
	let after = anchor.sequence_index.checked_add(1);

	[before, after]
		.into_iter()
		.flatten()
		.filter_map(|sequence| units.iter().find(|unit| unit.sequence_index == sequence))
		.collect()
}
