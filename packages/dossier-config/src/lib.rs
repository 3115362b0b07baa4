mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	Admission, Argument, Config, EmbeddingProviderConfig, Generation, LlmProviderConfig,
	Providers, Qdrant, Quality, Retrieval, Scoring, Selection, Service, Storage,
};

use std::{fs, path::Path};

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;

	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	for (label, value) in [
		("service.http_bind", &cfg.service.http_bind),
		("service.admin_bind", &cfg.service.admin_bind),
		("storage.qdrant.url", &cfg.storage.qdrant.url),
		("storage.qdrant.collection", &cfg.storage.qdrant.collection),
		("storage.qdrant.sources_collection", &cfg.storage.qdrant.sources_collection),
	] {
		if value.trim().is_empty() {
			return Err(Error::Validation { message: format!("{label} must be non-empty.") });
		}
	}

	if cfg.storage.qdrant.collection == cfg.storage.qdrant.sources_collection {
		return Err(Error::Validation {
			message: "storage.qdrant.sources_collection must differ from storage.qdrant.collection."
				.to_string(),
		});
	}
	if cfg.providers.embedding.dimensions == 0 {
		return Err(Error::Validation {
			message: "providers.embedding.dimensions must be greater than zero.".to_string(),
		});
	}
	if cfg.providers.embedding.dimensions != cfg.storage.qdrant.vector_dim {
		return Err(Error::Validation {
			message: "providers.embedding.dimensions must match storage.qdrant.vector_dim."
				.to_string(),
		});
	}

	for (label, key) in [
		("embedding", &cfg.providers.embedding.api_key),
		("generation", &cfg.providers.generation.api_key),
	] {
		if key.trim().is_empty() {
			return Err(Error::Validation {
				message: format!("Provider {label} api_key must be non-empty."),
			});
		}
	}

	if !cfg.providers.generation.temperature.is_finite()
		|| cfg.providers.generation.temperature < 0.0
	{
		return Err(Error::Validation {
			message: "providers.generation.temperature must be a finite number, zero or greater."
				.to_string(),
		});
	}
	if cfg.retrieval.candidate_k == 0 {
		return Err(Error::Validation {
			message: "retrieval.candidate_k must be greater than zero.".to_string(),
		});
	}
	if cfg.retrieval.top_k == 0 || cfg.retrieval.top_k > cfg.retrieval.candidate_k {
		return Err(Error::Validation {
			message: "retrieval.top_k must be in the range 1-retrieval.candidate_k.".to_string(),
		});
	}

	validate_scoring(cfg)?;
	validate_selection(cfg)?;
	validate_generation(cfg)?;
	validate_quality(cfg)?;
	validate_admission(cfg)?;

	Ok(())
}

fn validate_scoring(cfg: &Config) -> Result<()> {
	let scoring = &cfg.scoring;

	for (label, value) in [
		("scoring.keyword_bonus_max", scoring.keyword_bonus_max),
		("scoring.coherence_bonus_max", scoring.coherence_bonus_max),
		("scoring.coherence_step", scoring.coherence_step),
		("scoring.coherence_marker_step", scoring.coherence_marker_step),
		("scoring.pattern_bonus_per_match", scoring.pattern_bonus_per_match),
		("scoring.pattern_bonus_max", scoring.pattern_bonus_max),
		("scoring.position_decay", scoring.position_decay),
		("argument.focus_bonus_max", cfg.argument.focus_bonus_max),
		("argument.topic_bonus_max", cfg.argument.topic_bonus_max),
		("argument.approach_bonus_max", cfg.argument.approach_bonus_max),
	] {
		non_negative_finite(label, value)?;
	}
	for (label, value) in
		[("scoring.length_floor", scoring.length_floor), ("scoring.position_floor", scoring.position_floor)]
	{
		if !value.is_finite() || !(0.0..=1.0).contains(&value) {
			return Err(Error::Validation {
				message: format!("{label} must be in the range 0.0-1.0."),
			});
		}
	}

	if scoring.ideal_unit_chars == 0 {
		return Err(Error::Validation {
			message: "scoring.ideal_unit_chars must be greater than zero.".to_string(),
		});
	}
	if cfg.argument.topic_min_shared_words == 0 {
		return Err(Error::Validation {
			message: "argument.topic_min_shared_words must be greater than zero.".to_string(),
		});
	}

	Ok(())
}

fn validate_selection(cfg: &Config) -> Result<()> {
	let selection = &cfg.selection;

	if !matches!(selection.strategy.as_str(), "mmr" | "tiered") {
		return Err(Error::Validation {
			message: "selection.strategy must be one of mmr or tiered.".to_string(),
		});
	}
	if !selection.mmr_lambda.is_finite() || !(0.0..=1.0).contains(&selection.mmr_lambda) {
		return Err(Error::Validation {
			message: "selection.mmr_lambda must be in the range 0.0-1.0.".to_string(),
		});
	}

	non_negative_finite("selection.source_diversity_bonus", selection.source_diversity_bonus)?;

	if !selection.primary_reserve_ratio.is_finite()
		|| !(0.0..=1.0).contains(&selection.primary_reserve_ratio)
	{
		return Err(Error::Validation {
			message: "selection.primary_reserve_ratio must be in the range 0.0-1.0.".to_string(),
		});
	}
	if !selection.expansion_ratio.is_finite() || selection.expansion_ratio < 1.0 {
		return Err(Error::Validation {
			message: "selection.expansion_ratio must be 1.0 or greater.".to_string(),
		});
	}
	if !selection.expanded_score_factor.is_finite()
		|| !(0.0..=1.0).contains(&selection.expanded_score_factor)
	{
		return Err(Error::Validation {
			message: "selection.expanded_score_factor must be in the range 0.0-1.0.".to_string(),
		});
	}

	for (label, value) in [
		("selection.unit_chars_estimate", selection.unit_chars_estimate),
		("selection.max_context_chars", selection.max_context_chars),
		("selection.max_units", selection.max_units),
		("selection.max_sources", selection.max_sources),
		("selection.hard_cap_multiplier", selection.hard_cap_multiplier),
	] {
		if value == 0 {
			return Err(Error::Validation {
				message: format!("{label} must be greater than zero."),
			});
		}
	}

	Ok(())
}

fn validate_generation(cfg: &Config) -> Result<()> {
	let generation = &cfg.generation;

	for (label, value) in [
		("generation.max_tokens", generation.max_tokens),
		("generation.default_word_limit", generation.default_word_limit),
		("generation.max_attempts", generation.max_attempts),
		("generation.throttle_escalation_threshold", generation.throttle_escalation_threshold),
		("generation.excerpt_chars", generation.excerpt_chars),
	] {
		if value == 0 {
			return Err(Error::Validation {
				message: format!("{label} must be greater than zero."),
			});
		}
	}

	if generation.timeout_ms == 0 {
		return Err(Error::Validation {
			message: "generation.timeout_ms must be greater than zero.".to_string(),
		});
	}
	if generation.max_backoff_ms < generation.base_backoff_ms {
		return Err(Error::Validation {
			message: "generation.max_backoff_ms must be at least generation.base_backoff_ms."
				.to_string(),
		});
	}
	if generation.max_attempts < generation.throttle_escalation_threshold {
		return Err(Error::Validation {
			message:
				"generation.max_attempts must be at least generation.throttle_escalation_threshold."
					.to_string(),
		});
	}

	Ok(())
}

fn validate_quality(cfg: &Config) -> Result<()> {
	let quality = &cfg.quality;

	for (label, value) in [
		("quality.coverage_weight", quality.coverage_weight),
		("quality.primary_coverage_weight", quality.primary_coverage_weight),
		("quality.density_weight", quality.density_weight),
		("quality.strength_weight", quality.strength_weight),
		("quality.direct_weight", quality.direct_weight),
		("quality.substantial_weight", quality.substantial_weight),
		("quality.reference_weight", quality.reference_weight),
	] {
		non_negative_finite(label, value)?;
	}
	for (label, value) in
		[("quality.density_target", quality.density_target), ("quality.strength_cap", quality.strength_cap)]
	{
		if !value.is_finite() || value <= 0.0 {
			return Err(Error::Validation {
				message: format!("{label} must be greater than zero."),
			});
		}
	}

	Ok(())
}

fn validate_admission(cfg: &Config) -> Result<()> {
	let admission = &cfg.admission;

	if admission.queue_capacity == 0 {
		return Err(Error::Validation {
			message: "admission.queue_capacity must be greater than zero.".to_string(),
		});
	}

	for (label, value) in [
		("admission.lock_timeout_secs", admission.lock_timeout_secs),
		("admission.max_queue_residency_secs", admission.max_queue_residency_secs),
		("admission.cooldown_secs", admission.cooldown_secs),
		("admission.ticket_retention_secs", admission.ticket_retention_secs),
	] {
		if value == 0 {
			return Err(Error::Validation {
				message: format!("{label} must be greater than zero."),
			});
		}
	}

	if admission.throttled_delay_ms < admission.inter_item_delay_ms {
		return Err(Error::Validation {
			message: "admission.throttled_delay_ms must be at least admission.inter_item_delay_ms."
				.to_string(),
		});
	}

	Ok(())
}

fn non_negative_finite(label: &str, value: f32) -> Result<()> {
	if !value.is_finite() {
		return Err(Error::Validation { message: format!("{label} must be a finite number.") });
	}
	if value < 0.0 {
		return Err(Error::Validation { message: format!("{label} must be zero or greater.") });
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	cfg.selection.strategy = cfg.selection.strategy.trim().to_ascii_lowercase();
	cfg.providers.embedding.api_base =
		cfg.providers.embedding.api_base.trim_end_matches('/').to_string();
	cfg.providers.generation.api_base =
		cfg.providers.generation.api_base.trim_end_matches('/').to_string();
}
