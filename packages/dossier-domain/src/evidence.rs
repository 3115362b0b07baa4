use std::fmt;

use serde::{Deserialize, Serialize};

/// Coarse authority tier a [`SourceCategory`] belongs to, from strongest to weakest.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoryTier {
	PrimaryAuthority,
	Academic,
	Institutional,
	Informal,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SourceCategory {
	Constitution,
	Statute,
	Treaty,
	CaseLaw,
	Regulation,
	Academic,
	Book,
	Institutional,
	News,
	Informal,
	#[default]
	Unknown,
}
impl SourceCategory {
	pub const ALL: [Self; 11] = [
		Self::Constitution,
		Self::Statute,
		Self::Treaty,
		Self::CaseLaw,
		Self::Regulation,
		Self::Academic,
		Self::Book,
		Self::Institutional,
		Self::News,
		Self::Informal,
		Self::Unknown,
	];

	/// Parses a catalog category label. Anything unrecognised maps to [`SourceCategory::Unknown`].
	pub fn parse(raw: &str) -> Self {
		let normalized: String = raw
			.trim()
			.chars()
			.map(|ch| if ch == '-' || ch.is_whitespace() { '_' } else { ch.to_ascii_lowercase() })
			.collect();

		match normalized.as_str() {
			"constitution" | "constitutional" => Self::Constitution,
			"statute" | "legislation" | "act" | "code" => Self::Statute,
			"treaty" | "convention" => Self::Treaty,
			"case_law" | "caselaw" | "judgment" | "jurisprudence" => Self::CaseLaw,
			"regulation" | "directive" => Self::Regulation,
			"academic" | "journal" | "article" | "thesis" => Self::Academic,
			"book" | "monograph" | "textbook" => Self::Book,
			"institutional" | "report" | "official" => Self::Institutional,
			"news" | "press" => Self::News,
			"informal" | "blog" | "web" => Self::Informal,
			_ => Self::Unknown,
		}
	}

	pub fn as_str(self) -> &'static str {
		match self {
			Self::Constitution => "constitution",
			Self::Statute => "statute",
			Self::Treaty => "treaty",
			Self::CaseLaw => "case_law",
			Self::Regulation => "regulation",
			Self::Academic => "academic",
			Self::Book => "book",
			Self::Institutional => "institutional",
			Self::News => "news",
			Self::Informal => "informal",
			Self::Unknown => "unknown",
		}
	}

	/// Multiplier applied to similarity by the scoring engine.
	pub fn weight(self) -> f32 {
		match self {
			Self::Constitution | Self::Statute => 1.40,
			Self::Treaty => 1.35,
			Self::CaseLaw | Self::Regulation => 1.30,
			Self::Academic => 1.10,
			Self::Book => 1.00,
			Self::Institutional => 0.95,
			Self::News => 0.85,
			Self::Informal | Self::Unknown => 0.75,
		}
	}

	pub fn tier(self) -> CategoryTier {
		match self {
			Self::Constitution | Self::Statute | Self::Treaty | Self::CaseLaw | Self::Regulation =>
				CategoryTier::PrimaryAuthority,
			Self::Academic | Self::Book => CategoryTier::Academic,
			Self::Institutional => CategoryTier::Institutional,
			Self::News | Self::Informal | Self::Unknown => CategoryTier::Informal,
		}
	}

	pub fn is_primary(self) -> bool {
		self.tier() == CategoryTier::PrimaryAuthority
	}
}
impl fmt::Display for SourceCategory {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}
impl From<String> for SourceCategory {
	fn from(value: String) -> Self {
		Self::parse(&value)
	}
}
impl From<SourceCategory> for String {
	fn from(value: SourceCategory) -> Self {
		value.as_str().to_string()
	}
}

/// One retrieved passage. Lives for a single request and is never persisted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EvidenceUnit {
	pub id: String,
	pub source_id: String,
	#[serde(default)]
	pub source_category: SourceCategory,
	#[serde(default)]
	pub page_number: Option<u32>,
	#[serde(default)]
	pub paragraph_index: Option<u32>,
	/// Position inside the source; adjacency key for grouping and expansion.
	pub sequence_index: u32,
	pub text: String,
	pub similarity: f32,
	#[serde(default)]
	pub derived_score: f32,
	#[serde(default)]
	pub is_expanded_context: bool,
}
impl EvidenceUnit {
	pub fn char_len(&self) -> usize {
		self.text.chars().count()
	}

	/// First `max_chars` characters of the text, cut on a char boundary.
	pub fn excerpt(&self, max_chars: usize) -> &str {
		match self.text.char_indices().nth(max_chars) {
			Some((byte_idx, _)) => &self.text[..byte_idx],
			None => &self.text,
		}
	}
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SourceRecord {
	pub id: String,
	#[serde(default)]
	pub category: SourceCategory,
	#[serde(default)]
	pub title: String,
}

/// Whether `quote` occurs in `text`, ignoring differences in whitespace runs and letter case.
pub fn quote_matches(text: &str, quote: &str) -> bool {
	if quote.trim().is_empty() {
		return false;
	}
	if text.contains(quote) {
		return true;
	}

	let haystack = collapse_whitespace(text);
	let needle = collapse_whitespace(quote);

	haystack.contains(&needle)
}

fn collapse_whitespace(value: &str) -> String {
	value.split_whitespace().map(str::to_lowercase).collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn category_labels_round_trip_through_parse() {
		for category in SourceCategory::ALL {
			assert_eq!(SourceCategory::parse(category.as_str()), category);
		}
	}

	#[test]
	fn unrecognised_labels_are_unknown() {
		assert_eq!(SourceCategory::parse("podcast"), SourceCategory::Unknown);
		assert_eq!(SourceCategory::parse(""), SourceCategory::Unknown);
		assert_eq!(SourceCategory::parse("Case-Law"), SourceCategory::CaseLaw);
	}

	#[test]
	fn primary_authority_outweighs_every_other_tier() {
		let weakest_primary = SourceCategory::ALL
			.iter()
			.filter(|category| category.is_primary())
			.map(|category| category.weight())
			.fold(f32::INFINITY, f32::min);
		let strongest_other = SourceCategory::ALL
			.iter()
			.filter(|category| !category.is_primary())
			.map(|category| category.weight())
			.fold(0.0_f32, f32::max);

		assert!(weakest_primary > strongest_other);
		assert_eq!(SourceCategory::Unknown.tier(), CategoryTier::Informal);
	}

	#[test]
	fn quote_matching_tolerates_whitespace_and_case() {
		let text = "The Court held that the\nmeasure was   disproportionate.";

		assert!(quote_matches(text, "measure was disproportionate"));
		assert!(quote_matches(text, "the court HELD"));
		assert!(!quote_matches(text, "measure was lawful"));
		assert!(!quote_matches(text, "   "));
	}

	#[test]
	fn excerpt_respects_char_boundaries() {
		let unit = EvidenceUnit {
			id: "u".to_string(),
			source_id: "s".to_string(),
			source_category: SourceCategory::Book,
			page_number: None,
			paragraph_index: None,
			sequence_index: 0,
			text: "§§§ abc".to_string(),
			similarity: 0.5,
			derived_score: 0.0,
			is_expanded_context: false,
		};

		assert_eq!(unit.excerpt(2), "§§");
		assert_eq!(unit.excerpt(100), "§§§ abc");
		assert_eq!(unit.char_len(), 7);
	}
}
