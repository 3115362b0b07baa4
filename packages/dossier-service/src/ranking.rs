pub mod argument;
pub mod groups;
pub mod scoring;

use std::cmp::Ordering;

use dossier_domain::evidence::EvidenceUnit;

pub fn cmp_f32_desc(a: f32, b: f32) -> Ordering {
	match (a.is_nan(), b.is_nan()) {
		(true, true) => Ordering::Equal,
		(true, false) => Ordering::Greater,
		(false, true) => Ordering::Less,
		(false, false) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
	}
}

/// Descending `derived_score`, ties broken by ascending id.
pub fn cmp_ranked(a: &EvidenceUnit, b: &EvidenceUnit) -> Ordering {
	cmp_f32_desc(a.derived_score, b.derived_score).then_with(|| a.id.cmp(&b.id))
}

pub fn sort_ranked(units: &mut [EvidenceUnit]) {
	units.sort_by(cmp_ranked);
}
