use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
	pub service: Service,
	pub storage: Storage,
	pub providers: Providers,
	pub retrieval: Retrieval,
	#[serde(default)]
	pub scoring: Scoring,
	#[serde(default)]
	pub argument: Argument,
	#[serde(default)]
	pub selection: Selection,
	#[serde(default)]
	pub generation: Generation,
	#[serde(default)]
	pub quality: Quality,
	#[serde(default)]
	pub admission: Admission,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Service {
	pub http_bind: String,
	pub admin_bind: String,
	pub log_level: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Storage {
	pub qdrant: Qdrant,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Qdrant {
	pub url: String,
	/// Evidence units, one point per unit, filtered by `scope_id` and `source_id` payload keys.
	pub collection: String,
	/// Source catalog records, one point per source, filtered by `scope_id`.
	pub sources_collection: String,
	pub vector_dim: u32,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Providers {
	pub embedding: EmbeddingProviderConfig,
	pub generation: LlmProviderConfig,
}

#[derive(Clone, Debug, Deserialize)]
pub struct EmbeddingProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub dimensions: u32,
	pub timeout_ms: u64,
	pub default_headers: Map<String, Value>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct LlmProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub temperature: f32,
	pub timeout_ms: u64,
	pub default_headers: Map<String, Value>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Retrieval {
	pub candidate_k: u32,
	pub top_k: u32,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Scoring {
	pub ideal_unit_chars: u32,
	pub length_floor: f32,
	pub position_decay: f32,
	pub position_floor: f32,
	pub keyword_bonus_max: f32,
	pub keyword_min_token_chars: u32,
	pub coherence_bonus_max: f32,
	pub coherence_step: f32,
	pub coherence_marker_step: f32,
	/// Largest `sequence_index` gap that still continues an argument group.
	pub group_gap_threshold: u32,
	pub pattern_bonus_per_match: f32,
	pub pattern_bonus_max: f32,
}
impl Default for Scoring {
	fn default() -> Self {
		Self {
			ideal_unit_chars: 600,
			length_floor: 0.7,
			position_decay: 0.005,
			position_floor: 0.9,
			keyword_bonus_max: 0.15,
			keyword_min_token_chars: 4,
			coherence_bonus_max: 0.25,
			coherence_step: 0.05,
			coherence_marker_step: 0.02,
			group_gap_threshold: 3,
			pattern_bonus_per_match: 0.02,
			pattern_bonus_max: 0.1,
		}
	}
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Argument {
	pub focus_bonus_max: f32,
	pub topic_bonus_max: f32,
	pub approach_bonus_max: f32,
	pub topic_min_shared_words: u32,
}
impl Default for Argument {
	fn default() -> Self {
		Self {
			focus_bonus_max: 0.3,
			topic_bonus_max: 0.25,
			approach_bonus_max: 0.15,
			topic_min_shared_words: 2,
		}
	}
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Selection {
	/// Either "mmr" or "tiered".
	pub strategy: String,
	pub mmr_lambda: f32,
	pub source_diversity_bonus: f32,
	pub unit_chars_estimate: u32,
	pub max_context_chars: u32,
	pub max_units: u32,
	pub max_sources: u32,
	pub hard_cap_multiplier: u32,
	/// Share of the character budget the tiered strategy may spend on primary-authority groups.
	pub primary_reserve_ratio: f32,
	pub expansion_enabled: bool,
	pub expansion_ratio: f32,
	pub expanded_score_factor: f32,
}
impl Default for Selection {
	fn default() -> Self {
		Self {
			strategy: "mmr".to_string(),
			mmr_lambda: 0.7,
			source_diversity_bonus: 0.02,
			unit_chars_estimate: 1_200,
			max_context_chars: 48_000,
			max_units: 40,
			max_sources: 12,
			hard_cap_multiplier: 2,
			primary_reserve_ratio: 0.4,
			expansion_enabled: true,
			expansion_ratio: 1.1,
			expanded_score_factor: 0.9,
		}
	}
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Generation {
	pub max_tokens: u32,
	pub default_word_limit: u32,
	pub timeout_ms: u64,
	pub max_attempts: u32,
	pub base_backoff_ms: u64,
	pub max_backoff_ms: u64,
	pub throttle_escalation_threshold: u32,
	pub excerpt_chars: u32,
}
impl Default for Generation {
	fn default() -> Self {
		Self {
			max_tokens: 8_192,
			default_word_limit: 1_500,
			timeout_ms: 180_000,
			max_attempts: 5,
			base_backoff_ms: 1_000,
			max_backoff_ms: 30_000,
			throttle_escalation_threshold: 3,
			excerpt_chars: 100,
		}
	}
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Quality {
	pub coverage_weight: f32,
	pub primary_coverage_weight: f32,
	pub density_weight: f32,
	pub strength_weight: f32,
	/// Citations per 1000 words that earn the full density share.
	pub density_target: f32,
	pub strength_cap: f32,
	pub direct_weight: f32,
	pub substantial_weight: f32,
	pub reference_weight: f32,
}
impl Default for Quality {
	fn default() -> Self {
		Self {
			coverage_weight: 40.0,
			primary_coverage_weight: 30.0,
			density_weight: 20.0,
			strength_weight: 10.0,
			density_target: 10.0,
			strength_cap: 2.0,
			direct_weight: 1.0,
			substantial_weight: 0.75,
			reference_weight: 0.5,
		}
	}
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Admission {
	pub lock_timeout_secs: u64,
	pub queue_capacity: u32,
	pub max_queue_residency_secs: u64,
	pub inter_item_delay_ms: u64,
	pub throttled_delay_ms: u64,
	pub cooldown_secs: u64,
	pub estimated_generation_secs: u64,
	pub ticket_retention_secs: u64,
}
impl Default for Admission {
	fn default() -> Self {
		Self {
			lock_timeout_secs: 300,
			queue_capacity: 64,
			max_queue_residency_secs: 600,
			inter_item_delay_ms: 2_000,
			throttled_delay_ms: 10_000,
			cooldown_secs: 120,
			estimated_generation_secs: 60,
			ticket_retention_secs: 3_600,
		}
	}
}
