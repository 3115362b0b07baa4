use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::text;

/// Argument outline supplied by the caller to steer ranking toward a planned structure.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ArgumentationLine {
	#[serde(default)]
	pub thesis: String,
	#[serde(default)]
	pub sections: Vec<ArgumentSection>,
	#[serde(default)]
	pub approach: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ArgumentSection {
	pub title: String,
	#[serde(default)]
	pub key_points: Vec<String>,
}

/// Lower-cased matching terms derived from an [`ArgumentationLine`] for a single request.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ArgumentProfile {
	pub focus_terms: Vec<String>,
	pub section_topics: Vec<String>,
	pub approach_terms: Vec<String>,
}
impl ArgumentProfile {
	pub fn from_line(line: &ArgumentationLine) -> Self {
		let mut focus: BTreeSet<String> = text::significant_terms(&line.thesis);

		for section in &line.sections {
			for point in &section.key_points {
				focus.extend(text::significant_terms(point));
			}
		}

		let mut section_topics = Vec::new();

		for section in &line.sections {
			let topic = section.title.trim().to_lowercase();

			if !topic.is_empty() && !section_topics.contains(&topic) {
				section_topics.push(topic);
			}
		}

		let approach_terms = line
			.approach
			.as_deref()
			.map(|approach| text::significant_terms(approach).into_iter().collect())
			.unwrap_or_default();

		Self { focus_terms: focus.into_iter().collect(), section_topics, approach_terms }
	}

	pub fn is_empty(&self) -> bool {
		self.focus_terms.is_empty()
			&& self.section_topics.is_empty()
			&& self.approach_terms.is_empty()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn profile_collects_lowercased_terms() {
		let line = ArgumentationLine {
			thesis: "Mass Surveillance violates Privacy".to_string(),
			sections: vec![
				ArgumentSection {
					title: "  Proportionality Review ".to_string(),
					key_points: vec!["Necessity in a democratic society".to_string()],
				},
				ArgumentSection {
					title: "proportionality review".to_string(),
					key_points: Vec::new(),
				},
			],
			approach: Some("Comparative constitutional analysis".to_string()),
		};
		let profile = ArgumentProfile::from_line(&line);

		assert!(profile.focus_terms.contains(&"surveillance".to_string()));
		assert!(profile.focus_terms.contains(&"democratic".to_string()));
		assert!(!profile.focus_terms.contains(&"in".to_string()));
		assert_eq!(profile.section_topics, vec!["proportionality review".to_string()]);
		assert_eq!(
			profile.approach_terms,
			vec!["analysis".to_string(), "comparative".to_string(), "constitutional".to_string()]
		);
		assert!(!profile.is_empty());
	}

	#[test]
	fn blank_line_yields_empty_profile() {
		assert!(ArgumentProfile::from_line(&ArgumentationLine::default()).is_empty());
	}
}
