pub mod budget;
pub mod expansion;
pub mod mmr;
pub mod tiered;

pub use budget::SelectionBudget;

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use dossier_config::Config;
use dossier_domain::evidence::EvidenceUnit;

use crate::ranking::groups;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Strategy {
	Mmr,
	Tiered,
}
impl Strategy {
	/// Config values are normalized to lower case before validation.
	pub fn parse(raw: &str) -> Option<Self> {
		match raw {
			"mmr" => Some(Self::Mmr),
			"tiered" => Some(Self::Tiered),
			_ => None,
		}
	}

	pub fn as_str(self) -> &'static str {
		match self {
			Self::Mmr => "mmr",
			Self::Tiered => "tiered",
		}
	}
}

/// Why a unit was or was not taken. Kept for the response and for logging.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SelectionDecision {
	pub unit_id: String,
	pub source_id: String,
	pub selected: bool,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub selected_rank: Option<u32>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub selected_reason: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub skipped_reason: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub mmr_score: Option<f32>,
}

#[derive(Clone, Debug, Default)]
pub struct SelectionOutcome {
	/// Selected units in pick order.
	pub units: Vec<EvidenceUnit>,
	/// One entry per pool unit, in ranked order.
	pub decisions: Vec<SelectionDecision>,
}
impl SelectionOutcome {
	pub fn total_chars(&self) -> usize {
		self.units.iter().map(EvidenceUnit::char_len).sum()
	}
}

/// Runs the configured strategy over a ranked pool.
pub fn select(cfg: &Config, ranked: &[EvidenceUnit], budget: &SelectionBudget) -> SelectionOutcome {
	let strategy = Strategy::parse(&cfg.selection.strategy).unwrap_or(Strategy::Mmr);
	let outcome = match strategy {
		Strategy::Mmr => mmr::select_mmr(&cfg.selection, ranked, budget),
		Strategy::Tiered => {
			let groups = groups::detect_groups(ranked, cfg.scoring.group_gap_threshold);

			tiered::select_tiered(&cfg.selection, ranked, budget, &groups)
		},
	};

	tracing::info!(
		strategy = strategy.as_str(),
		pool = ranked.len(),
		selected = outcome.units.len(),
		total_chars = outcome.total_chars(),
		max_total_chars = budget.max_total_chars,
		"Selected evidence units."
	);

	outcome
}

/// Budget bookkeeping shared by both strategies. Indices refer to the ranked pool.
pub(crate) struct WorkingSet<'a> {
	ranked: &'a [EvidenceUnit],
	budget: &'a SelectionBudget,
	total_chars: usize,
	per_source: HashMap<&'a str, usize>,
	picked: Vec<usize>,
	picked_set: HashSet<usize>,
	reasons: HashMap<usize, (&'static str, Option<f32>)>,
}
impl<'a> WorkingSet<'a> {
	pub(crate) fn new(ranked: &'a [EvidenceUnit], budget: &'a SelectionBudget) -> Self {
		Self {
			ranked,
			budget,
			total_chars: 0,
			per_source: HashMap::new(),
			picked: Vec::new(),
			picked_set: HashSet::new(),
			reasons: HashMap::new(),
		}
	}

	pub(crate) fn total_chars(&self) -> usize {
		self.total_chars
	}

	pub(crate) fn is_picked(&self, idx: usize) -> bool {
		self.picked_set.contains(&idx)
	}

	pub(crate) fn picked(&self) -> &[usize] {
		&self.picked
	}

	pub(crate) fn count(&self, source_id: &str) -> usize {
		self.per_source.get(source_id).copied().unwrap_or(0)
	}

	pub(crate) fn fits_chars(&self, chars: usize) -> bool {
		self.total_chars + chars <= self.budget.max_total_chars
	}

	/// A new source may only be opened while fewer than `target_source_count` are represented.
	pub(crate) fn can_open(&self, source_id: &str) -> bool {
		self.count(source_id) > 0 || self.per_source.len() < self.budget.target_source_count
	}

	/// Whether `idx` can still be taken with at most `quota` units per source.
	pub(crate) fn admits(&self, idx: usize, quota: usize) -> bool {
		let unit = &self.ranked[idx];

		!self.is_picked(idx)
			&& self.fits_chars(unit.char_len())
			&& self.count(&unit.source_id) < quota.min(self.budget.hard_max_units_per_source)
			&& self.can_open(&unit.source_id)
	}

	pub(crate) fn push(&mut self, idx: usize, reason: &'static str, mmr_score: Option<f32>) {
		let ranked = self.ranked;
		let unit = &ranked[idx];

		if !self.picked_set.insert(idx) {
			return;
		}

		self.total_chars += unit.char_len();
		*self.per_source.entry(unit.source_id.as_str()).or_default() += 1;

		self.picked.push(idx);
		self.reasons.insert(idx, (reason, mmr_score));
	}

	pub(crate) fn finish(self) -> SelectionOutcome {
		let mut decisions = Vec::with_capacity(self.ranked.len());

		for (idx, unit) in self.ranked.iter().enumerate() {
			let mut decision = SelectionDecision {
				unit_id: unit.id.clone(),
				source_id: unit.source_id.clone(),
				selected: false,
				selected_rank: None,
				selected_reason: None,
				skipped_reason: None,
				mmr_score: None,
			};

			if let Some((reason, mmr_score)) = self.reasons.get(&idx) {
				decision.selected = true;
				decision.selected_rank = self
					.picked
					.iter()
					.position(|picked| *picked == idx)
					.map(|rank| rank as u32 + 1);
				decision.selected_reason = Some((*reason).to_string());
				decision.mmr_score = *mmr_score;
			} else {
				decision.skipped_reason = Some(self.skip_reason(unit).to_string());
			}

			decisions.push(decision);
		}

		let units = self.picked.iter().map(|&idx| self.ranked[idx].clone()).collect();

		SelectionOutcome { units, decisions }
	}

	fn skip_reason(&self, unit: &EvidenceUnit) -> &'static str {
		if !self.fits_chars(unit.char_len()) {
			"exceeds_budget"
		} else if self.count(&unit.source_id) >= self.budget.hard_max_units_per_source {
			"source_hard_cap"
		} else if !self.can_open(&unit.source_id) {
			"source_limit"
		} else {
			"not_selected"
		}
	}
}
