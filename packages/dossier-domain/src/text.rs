use std::collections::{BTreeSet, HashSet};

use unicode_segmentation::UnicodeSegmentation;

const STOPWORDS: &[&str] = &[
	"a", "about", "above", "after", "again", "against", "all", "also", "an", "and", "any", "are",
	"as", "at", "be", "been", "before", "being", "between", "both", "but", "by", "can", "could",
	"did", "do", "does", "doing", "down", "during", "each", "few", "for", "from", "further", "had",
	"has", "have", "having", "he", "her", "here", "hers", "him", "his", "how", "i", "if", "in",
	"into", "is", "it", "its", "itself", "may", "might", "more", "most", "must", "no", "nor",
	"not", "of", "off", "on", "once", "only", "or", "other", "our", "ours", "out", "over", "own",
	"same", "shall", "she", "should", "so", "some", "such", "than", "that", "the", "their",
	"theirs", "them", "then", "there", "these", "they", "this", "those", "through", "to", "too",
	"under", "until", "up", "upon", "very", "was", "we", "were", "what", "when", "where", "which",
	"while", "who", "whom", "why", "will", "with", "within", "without", "would", "you", "your",
];

/// Lower-cased words of `text` in order, split on Unicode word boundaries.
pub fn words(text: &str) -> Vec<String> {
	text.unicode_words().map(str::to_lowercase).collect()
}

pub fn word_count(text: &str) -> usize {
	text.unicode_words().count()
}

/// Distinct lower-cased words with at least `min_chars` characters, in first-seen order.
pub fn query_tokens(query: &str, min_chars: usize) -> Vec<String> {
	let mut seen = HashSet::new();
	let mut out = Vec::new();

	for word in words(query) {
		if word.chars().count() < min_chars {
			continue;
		}
		if seen.insert(word.clone()) {
			out.push(word);
		}
	}

	out
}

pub fn token_set(text: &str) -> HashSet<String> {
	words(text).into_iter().collect()
}

pub fn is_stopword(word: &str) -> bool {
	STOPWORDS.binary_search(&word).is_ok()
}

/// Content-bearing words: three characters or longer, not a stopword, not purely numeric.
pub fn significant_terms(text: &str) -> BTreeSet<String> {
	words(text)
		.into_iter()
		.filter(|word| {
			word.chars().count() >= 3
				&& !is_stopword(word)
				&& !word.chars().all(|ch| ch.is_ascii_digit())
		})
		.collect()
}

/// Jaccard similarity of two token sets. Two empty sets are treated as disjoint.
pub fn jaccard(lhs: &HashSet<String>, rhs: &HashSet<String>) -> f32 {
	if lhs.is_empty() || rhs.is_empty() {
		return 0.0;
	}

	let intersection = lhs.intersection(rhs).count();
	let union = lhs.len() + rhs.len() - intersection;

	intersection as f32 / union as f32
}
