use std::collections::{BTreeMap, HashMap};

use dossier_domain::{
	evidence::EvidenceUnit,
	patterns::{self, UnitClass},
};

/// A run of units from one source judged to form a coherent sub-argument.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArgumentGroup {
	pub source_id: String,
	/// Member ids ordered by `sequence_index`.
	pub unit_ids: Vec<String>,
	pub citation_markers: usize,
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum GroupState {
	Idle,
	Open { members: Vec<usize>, last_sequence: u32 },
}

#[derive(Clone, Copy, Debug)]
struct Step {
	index: usize,
	sequence: u32,
	class: UnitClass,
}

/// Detects argument groups with one linear pass per source over units ordered by
/// `sequence_index`. Only groups with at least two members are returned, ordered by source id
/// and then by position.
pub fn detect_groups(units: &[EvidenceUnit], gap_threshold: u32) -> Vec<ArgumentGroup> {
	let mut by_source: BTreeMap<&str, Vec<usize>> = BTreeMap::new();

	for (index, unit) in units.iter().enumerate() {
		by_source.entry(unit.source_id.as_str()).or_default().push(index);
	}

	let mut out = Vec::new();

	for (source_id, mut indices) in by_source {
		indices.sort_by(|&a, &b| {
			units[a]
				.sequence_index
				.cmp(&units[b].sequence_index)
				.then_with(|| units[a].id.cmp(&units[b].id))
		});

		let mut state = GroupState::Idle;
		let mut closed = Vec::new();

		for index in indices {
			let step = Step {
				index,
				sequence: units[index].sequence_index,
				class: patterns::classify(&units[index].text),
			};
			let (next, finished) = reduce(state, step, gap_threshold);

			state = next;

			closed.extend(finished);
		}

		closed.extend(close(state));

		for members in closed {
			out.push(ArgumentGroup {
				source_id: source_id.to_string(),
				citation_markers: members
					.iter()
					.map(|&idx| patterns::count_citation_markers(&units[idx].text))
					.sum(),
				unit_ids: members.into_iter().map(|idx| units[idx].id.clone()).collect(),
			});
		}
	}

	out
}

/// Maps every grouped unit id to the index of its group in `groups`.
pub fn membership(groups: &[ArgumentGroup]) -> HashMap<&str, usize> {
	let mut out = HashMap::new();

	for (group_idx, group) in groups.iter().enumerate() {
		for unit_id in &group.unit_ids {
			out.insert(unit_id.as_str(), group_idx);
		}
	}

	out
}

fn reduce(state: GroupState, step: Step, gap_threshold: u32) -> (GroupState, Option<Vec<usize>>) {
	match (step.class, state) {
		(UnitClass::Boundary, state) => (open(step), close(state)),
		(UnitClass::Linked, GroupState::Open { mut members, last_sequence })
			if step.sequence.saturating_sub(last_sequence) <= gap_threshold =>
		{
			members.push(step.index);

			(GroupState::Open { members, last_sequence: step.sequence }, None)
		},
		(UnitClass::Linked, state) => (open(step), close(state)),
		(UnitClass::Plain, state) => (GroupState::Idle, close(state)),
	}
}

fn open(step: Step) -> GroupState {
	GroupState::Open { members: vec![step.index], last_sequence: step.sequence }
}

fn close(state: GroupState) -> Option<Vec<usize>> {
	match state {
		GroupState::Open { members, .. } if members.len() >= 2 => Some(members),
		_ => None,
	}
}

#[cfg(test)]
mod tests {
	use dossier_domain::evidence::SourceCategory;

	use super::*;

	fn unit(id: &str, source_id: &str, sequence_index: u32, text: &str) -> EvidenceUnit {
		EvidenceUnit {
			id: id.to_string(),
			source_id: source_id.to_string(),
			source_category: SourceCategory::Statute,
			page_number: None,
			paragraph_index: None,
			sequence_index,
			text: text.to_string(),
			similarity: 0.5,
			derived_score: 0.0,
			is_expanded_context: false,
		}
	}

	#[test]
	fn boundary_opens_and_linked_units_extend() {
		let units = vec![
			unit("c", "s", 2, "Moreover, the duty applies to processors."),
			unit("a", "s", 0, "Article 5 Principles of processing"),
			unit("b", "s", 1, "Therefore personal data shall be processed lawfully."),
			unit("d", "s", 3, "The weather is irrelevant here."),
			unit("e", "s", 4, "However, see also § 7."),
		];
		let groups = detect_groups(&units, 3);

		assert_eq!(groups.len(), 1);
		assert_eq!(groups[0].unit_ids, vec!["a", "b", "c"]);
		assert_eq!(groups[0].citation_markers, 1);
	}

	#[test]
	fn linked_unit_beyond_gap_starts_new_group() {
		let units = vec![
			unit("a", "s", 0, "Thus the rule applies."),
			unit("b", "s", 2, "Moreover it binds the state."),
			unit("c", "s", 9, "Consequently the claim fails."),
			unit("d", "s", 10, "Accordingly costs follow."),
		];
		let groups = detect_groups(&units, 3);

		assert_eq!(groups.len(), 2);
		assert_eq!(groups[0].unit_ids, vec!["a", "b"]);
		assert_eq!(groups[1].unit_ids, vec!["c", "d"]);
	}

	#[test]
	fn sources_are_grouped_independently_and_singletons_dropped() {
		let units = vec![
			unit("a1", "a", 0, "Article 1 Scope"),
			unit("b1", "b", 1, "Therefore the scope is wide."),
			unit("a2", "a", 5, "Section 2 Definitions"),
		];

		assert!(detect_groups(&units, 3).is_empty());
	}

	#[test]
	fn detection_is_reproducible() {
		let units = vec![
			unit("a", "s", 0, "Chapter 2 Remedies"),
			unit("b", "s", 1, "Furthermore damages are available."),
			unit("c", "t", 0, "In addition, Smith v. Jones applies."),
			unit("d", "t", 1, "Hence the same result."),
		];

		assert_eq!(detect_groups(&units, 3), detect_groups(&units, 3));
		assert_eq!(membership(&detect_groups(&units, 3)).len(), 4);
	}
}
