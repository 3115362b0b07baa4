use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use dossier_domain::{
	argument::ArgumentationLine,
	document::GenerationOutput,
	evidence::SourceCategory,
};

use crate::{
	DossierService, Error, Result,
	generation::{
		self, CoverageReport, ValidationWarning, coverage,
		prompt::{self, PromptInput},
	},
	queue,
	retrieve::{self, RankedCandidates},
	selection::{self, SelectionBudget, SelectionDecision, expansion},
};

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct GenerateRequest {
	pub query: String,
	pub scope_id: String,
	pub caller_id: String,
	#[serde(default)]
	pub approach: Option<String>,
	#[serde(default)]
	pub word_limit: Option<u32>,
	#[serde(default)]
	pub argumentation: Option<ArgumentationLine>,
}

/// Where a cited evidence id points, for rendering footnotes.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EvidenceIndexEntry {
	pub evidence_id: String,
	pub source_id: String,
	pub source_title: String,
	pub source_category: SourceCategory,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub page_number: Option<u32>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub paragraph_index: Option<u32>,
	pub sequence_index: u32,
	pub excerpt: String,
	pub derived_score: f32,
	pub is_expanded_context: bool,
}

#[derive(Clone, Debug, Serialize)]
pub struct GenerateResponse {
	pub document: GenerationOutput,
	pub evidence_index: Vec<EvidenceIndexEntry>,
	pub coverage_report: CoverageReport,
	pub warnings: Vec<ValidationWarning>,
	pub budget: SelectionBudget,
	pub selection: Vec<SelectionDecision>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct QueuedResponse {
	pub queued: bool,
	pub ticket_id: Uuid,
	pub position: usize,
	pub estimated_wait_seconds: u64,
}

#[derive(Clone, Debug, Serialize)]
#[serde(untagged)]
pub enum GenerateOutcome {
	Completed(Box<GenerateResponse>),
	Queued(QueuedResponse),
}
impl GenerateOutcome {
	pub fn is_queued(&self) -> bool {
		matches!(self, Self::Queued(_))
	}
}

impl DossierService {
	/// Generates a cited document, or queues the request while the provider is throttling.
	pub async fn generate(self: &Arc<Self>, req: GenerateRequest) -> Result<GenerateOutcome> {
		validate_request(&req)?;

		if self.admission.is_queue_mode() {
			let (ticket, spawn_worker) = self.admission.enqueue(req)?;

			if spawn_worker {
				queue::spawn_worker(Arc::clone(self));
			}

			return Ok(GenerateOutcome::Queued(QueuedResponse {
				queued: true,
				ticket_id: ticket.ticket_id,
				position: ticket.position,
				estimated_wait_seconds: ticket.estimated_wait_seconds,
			}));
		}

		let _permit = self.admission.try_acquire(&req.caller_id)?;
		let response = self.run_pipeline(&req).await?;

		Ok(GenerateOutcome::Completed(Box::new(response)))
	}

	/// Retrieval, selection, expansion, generation and validation for one request.
	pub(crate) async fn run_pipeline(&self, req: &GenerateRequest) -> Result<GenerateResponse> {
		let cfg = &self.cfg;
		let RankedCandidates { units: ranked, sources } =
			self.rank_candidates(&req.query, &req.scope_id, req.argumentation.as_ref()).await?;

		if ranked.is_empty() {
			return Err(Error::NoEvidence {
				message: format!("No evidence found in scope {}.", req.scope_id.trim()),
			});
		}

		let budget = SelectionBudget::derive(&cfg.selection, &ranked);
		let outcome = selection::select(cfg, &ranked, &budget);

		if outcome.units.is_empty() {
			return Err(Error::NoEvidence {
				message: "No evidence unit fits within the context budget.".to_string(),
			});
		}

		let mut decisions = outcome.decisions;
		let working_set = if cfg.selection.expansion_enabled {
			let (units, expanded) = expansion::expand(
				self.providers.catalog.as_ref(),
				&cfg.selection,
				&budget,
				outcome.units,
			)
			.await;

			decisions.extend(expanded);

			units
		} else {
			outcome.units
		};
		let word_limit = req.word_limit.unwrap_or(cfg.generation.default_word_limit);
		let messages = prompt::build_messages(&PromptInput {
			query: &req.query,
			approach: req.approach.as_deref(),
			word_limit,
			argumentation: req.argumentation.as_ref(),
			units: &working_set,
			sources: &sources,
		});
		let raw_text = generation::call_with_retry(
			self.providers.generation.as_ref(),
			&cfg.providers.generation,
			&cfg.generation,
			&self.admission,
			&messages,
			prompt::max_tokens(&cfg.generation, word_limit),
		)
		.await?;
		let excerpt_chars = cfg.generation.excerpt_chars as usize;
		let (document, warnings) =
			generation::parse_output(&raw_text, &working_set, excerpt_chars)?;
		let coverage_report =
			coverage::coverage_report(&cfg.quality, &document, &working_set, &sources);
		let evidence_index = working_set
			.iter()
			.map(|unit| EvidenceIndexEntry {
				evidence_id: unit.id.clone(),
				source_id: unit.source_id.clone(),
				source_title: sources
					.get(&unit.source_id)
					.map(|record| record.title.clone())
					.unwrap_or_default(),
				source_category: unit.source_category,
				page_number: unit.page_number,
				paragraph_index: unit.paragraph_index,
				sequence_index: unit.sequence_index,
				excerpt: unit.excerpt(excerpt_chars).to_string(),
				derived_score: unit.derived_score,
				is_expanded_context: unit.is_expanded_context,
			})
			.collect();

		tracing::info!(
			caller_id = %req.caller_id,
			scope_id = %req.scope_id,
			working_set = working_set.len(),
			paragraphs = document.paragraph_count(),
			warnings = warnings.len(),
			quality_score = coverage_report.quality_score,
			"Generated document."
		);

		Ok(GenerateResponse {
			document,
			evidence_index,
			coverage_report,
			warnings,
			budget,
			selection: decisions,
		})
	}
}

fn validate_request(req: &GenerateRequest) -> Result<()> {
	retrieve::require_non_empty("query", &req.query)?;
	retrieve::require_non_empty("scope_id", &req.scope_id)?;
	retrieve::require_non_empty("caller_id", &req.caller_id)?;

	if req.word_limit == Some(0) {
		return Err(Error::InvalidRequest {
			message: "word_limit must be greater than zero.".to_string(),
		});
	}

	Ok(())
}
