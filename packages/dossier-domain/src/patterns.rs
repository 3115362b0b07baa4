use std::sync::LazyLock;

use regex::Regex;

/// How a unit participates in argument-group detection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnitClass {
	/// Opens with a structural heading and always starts a new group.
	Boundary,
	/// Carries a citation or a discourse connective and may continue the open group.
	Linked,
	Plain,
}

static CITATION_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
	[
		r"§\s*\d+",
		r"(?i)\bart(?:icle)?\.?\s+\d+",
		r"\b[A-Z][\w.&'-]*(?:\s+[A-Z][\w.&'-]*)*\s+v\.?\s+[A-Z][\w.&'-]*",
		r"\((?:1[6-9]|20)\d{2}\)",
		r"(?i)\bsee also\b",
		r"(?i)\bsupra\b",
		r"(?i)\binfra\b",
		r"(?i)\bibid\b",
		r"(?i)\bpara(?:graph)?\.?\s+\d+",
		r"\[\d+\]",
	]
	.into_iter()
	.filter_map(|pattern| Regex::new(pattern).ok())
	.collect()
});
static DISCOURSE_CONNECTIVE: LazyLock<Option<Regex>> = LazyLock::new(|| {
	Regex::new(
		r"(?i)\b(?:therefore|moreover|furthermore|however|consequently|thus|accordingly|nevertheless|hence|in addition|in contrast|by contrast|on the other hand)\b",
	)
	.ok()
});
static STRUCTURAL_HEADING: LazyLock<Option<Regex>> = LazyLock::new(|| {
	Regex::new(
		r"^(?:(?i:article|art\.|section|sec\.|chapter|part|title)\s+(?:\d+|[IVXLC]+)\b|§\s*\d+|[IVXLC]+[.)]\s|\d+(?:\.\d+)+\.?\s|\d+[.)]\s)",
	)
	.ok()
});

/// Number of citation and cross-reference markers in `text`.
pub fn count_citation_markers(text: &str) -> usize {
	CITATION_PATTERNS.iter().map(|re| re.find_iter(text).count()).sum()
}

pub fn has_discourse_connective(text: &str) -> bool {
	DISCOURSE_CONNECTIVE.as_ref().map(|re| re.is_match(text)).unwrap_or(false)
}

pub fn opens_with_structural_heading(text: &str) -> bool {
	STRUCTURAL_HEADING.as_ref().map(|re| re.is_match(text.trim_start())).unwrap_or(false)
}

pub fn classify(text: &str) -> UnitClass {
	if opens_with_structural_heading(text) {
		UnitClass::Boundary
	} else if count_citation_markers(text) > 0 || has_discourse_connective(text) {
		UnitClass::Linked
	} else {
		UnitClass::Plain
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn every_citation_pattern_compiles() {
		assert_eq!(CITATION_PATTERNS.len(), 10);
		assert!(DISCOURSE_CONNECTIVE.is_some());
		assert!(STRUCTURAL_HEADING.is_some());
	}

	#[test]
	fn counts_citation_markers() {
		assert_eq!(count_citation_markers("See § 12 of the code."), 1);
		assert_eq!(count_citation_markers("Under Article 5 and Art. 3 combined"), 2);
		assert_eq!(count_citation_markers("As held in Smith v. Jones (2019) [12]"), 3);
		assert_eq!(count_citation_markers("see also the note supra, ibid."), 3);
		assert_eq!(count_citation_markers("paragraph 4 governs"), 1);
		assert_eq!(count_citation_markers("nothing to see here"), 0);
	}

	#[test]
	fn detects_discourse_connectives() {
		assert!(has_discourse_connective("Therefore, the claim fails."));
		assert!(has_discourse_connective("In addition the court noted"));
		assert!(!has_discourse_connective("The claim fails."));
	}

	#[test]
	fn classifies_units() {
		assert_eq!(classify("Article 12 Freedom of expression"), UnitClass::Boundary);
		assert_eq!(classify("§ 3 Scope"), UnitClass::Boundary);
		assert_eq!(classify("IV. Remedies"), UnitClass::Boundary);
		assert_eq!(classify("2.1 Background"), UnitClass::Boundary);
		assert_eq!(classify("Moreover, the tribunal found"), UnitClass::Linked);
		assert_eq!(classify("The tribunal relied on § 4."), UnitClass::Linked);
		assert_eq!(classify("The weather was fine."), UnitClass::Plain);
	}
}
