//! In-memory providers and fixtures shared by the service and API test suites.

use std::{
	collections::{HashMap, HashSet, VecDeque},
	sync::{
		Arc, Mutex, MutexGuard,
		atomic::{AtomicUsize, Ordering},
	},
};

use serde_json::{Map, Value, json};
use tokio::sync::Notify;

use dossier_config::{
	Admission, Argument, Config, EmbeddingProviderConfig, Generation, LlmProviderConfig,
	Providers as ProviderConfigs, Qdrant, Quality, Retrieval, Scoring, Selection, Service,
	Storage,
};
use dossier_domain::evidence::{EvidenceUnit, SourceCategory, SourceRecord};
use dossier_service::{
	BoxFuture, DossierService, EmbeddingProvider, Error, GenerationProvider, Providers, Result,
	RetrievalProvider, SourceCatalog,
};

pub const VECTOR_DIM: u32 = 8;

pub fn test_config() -> Config {
	Config {
		service: Service {
			http_bind: "127.0.0.1:0".to_string(),
			admin_bind: "127.0.0.1:0".to_string(),
			log_level: "info".to_string(),
		},
		storage: Storage {
			qdrant: Qdrant {
				url: "http://127.0.0.1:1".to_string(),
				collection: "dossier_units_test".to_string(),
				sources_collection: "dossier_sources_test".to_string(),
				vector_dim: VECTOR_DIM,
			},
		},
		providers: ProviderConfigs {
			embedding: dummy_embedding_provider(),
			generation: dummy_llm_provider(),
		},
		retrieval: Retrieval { candidate_k: 100, top_k: 20 },
		scoring: Scoring::default(),
		argument: Argument::default(),
		selection: Selection::default(),
		generation: Generation::default(),
		quality: Quality::default(),
		admission: Admission::default(),
	}
}

pub fn dummy_embedding_provider() -> EmbeddingProviderConfig {
	EmbeddingProviderConfig {
		provider_id: "test".to_string(),
		api_base: "http://127.0.0.1:1".to_string(),
		api_key: "test-key".to_string(),
		path: "/".to_string(),
		model: "test".to_string(),
		dimensions: VECTOR_DIM,
		timeout_ms: 1_000,
		default_headers: Map::new(),
	}
}

pub fn dummy_llm_provider() -> LlmProviderConfig {
	LlmProviderConfig {
		provider_id: "test".to_string(),
		api_base: "http://127.0.0.1:1".to_string(),
		api_key: "test-key".to_string(),
		path: "/".to_string(),
		model: "test".to_string(),
		temperature: 0.2,
		timeout_ms: 1_000,
		default_headers: Map::new(),
	}
}

pub fn source(id: &str, category: SourceCategory, title: &str) -> SourceRecord {
	SourceRecord { id: id.to_string(), category, title: title.to_string() }
}

pub fn unit(
	id: &str,
	source_id: &str,
	sequence_index: u32,
	similarity: f32,
	text: &str,
) -> EvidenceUnit {
	EvidenceUnit {
		id: id.to_string(),
		source_id: source_id.to_string(),
		source_category: SourceCategory::Unknown,
		page_number: Some(sequence_index / 4 + 1),
		paragraph_index: Some(sequence_index),
		sequence_index,
		text: text.to_string(),
		similarity,
		derived_score: 0.0,
		is_expanded_context: false,
	}
}

/// Model output with one section whose paragraphs cite the given evidence ids.
pub fn document_json(paragraphs: &[(&str, &[&str])]) -> String {
	let paragraphs: Vec<Value> = paragraphs
		.iter()
		.map(|(text, evidence_ids)| json!({ "text": text, "evidence_ids": evidence_ids }))
		.collect();

	json!({
		"title": "Dossier",
		"sections": [{ "heading": "Analysis", "paragraphs": paragraphs }],
	})
	.to_string()
}

pub fn service(
	cfg: Config,
	corpus: Arc<InMemoryCorpus>,
	generation: Arc<ScriptedGeneration>,
) -> Arc<DossierService> {
	let providers =
		Providers::new(Arc::new(StubEmbedding::default()), corpus.clone(), corpus, generation);

	Arc::new(DossierService::new(cfg, providers))
}

#[derive(Default)]
pub struct StubEmbedding {
	pub calls: AtomicUsize,
}
impl EmbeddingProvider for StubEmbedding {
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, Result<Vec<Vec<f32>>>> {
		self.calls.fetch_add(1, Ordering::SeqCst);

		let dim = cfg.dimensions as usize;
		let vectors = texts.iter().map(|_| vec![0.0; dim]).collect();

		Box::pin(async move { Ok(vectors) })
	}
}

/// Scoped sources and units. Search ignores the query vector and ranks by stored similarity.
#[derive(Default)]
pub struct InMemoryCorpus {
	sources: Vec<(String, SourceRecord)>,
	units: Vec<(String, EvidenceUnit)>,
	failing_sources: HashSet<String>,
	sibling_fetches: Mutex<HashMap<String, usize>>,
}
impl InMemoryCorpus {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_source(
		mut self,
		scope_id: &str,
		record: SourceRecord,
		units: impl IntoIterator<Item = EvidenceUnit>,
	) -> Self {
		self.units.extend(units.into_iter().map(|unit| (scope_id.to_string(), unit)));
		self.sources.push((scope_id.to_string(), record));

		self
	}

	/// Units searchable in the scope without a catalog record.
	pub fn with_uncatalogued(
		mut self,
		scope_id: &str,
		units: impl IntoIterator<Item = EvidenceUnit>,
	) -> Self {
		self.units.extend(units.into_iter().map(|unit| (scope_id.to_string(), unit)));

		self
	}

	/// Makes sibling listing fail for `source_id`.
	pub fn failing_source(mut self, source_id: &str) -> Self {
		self.failing_sources.insert(source_id.to_string());

		self
	}

	pub fn sibling_fetches(&self, source_id: &str) -> usize {
		self.fetches().get(source_id).copied().unwrap_or(0)
	}

	pub fn total_sibling_fetches(&self) -> usize {
		self.fetches().values().sum()
	}

	fn fetches(&self) -> MutexGuard<'_, HashMap<String, usize>> {
		self.sibling_fetches.lock().unwrap_or_else(|err| err.into_inner())
	}
}
impl RetrievalProvider for InMemoryCorpus {
	fn search<'a>(
		&'a self,
		_vector: &'a [f32],
		scope_id: &'a str,
		limit: u32,
	) -> BoxFuture<'a, Result<Vec<EvidenceUnit>>> {
		let mut hits: Vec<EvidenceUnit> = self
			.units
			.iter()
			.filter(|(scope, _)| scope == scope_id)
			.map(|(_, unit)| unit.clone())
			.collect();

		hits.sort_by(|a, b| b.similarity.total_cmp(&a.similarity).then_with(|| a.id.cmp(&b.id)));
		hits.truncate(limit as usize);

		Box::pin(async move { Ok(hits) })
	}
}
impl SourceCatalog for InMemoryCorpus {
	fn list_sources<'a>(&'a self, scope_id: &'a str) -> BoxFuture<'a, Result<Vec<SourceRecord>>> {
		let records = self
			.sources
			.iter()
			.filter(|(scope, _)| scope == scope_id)
			.map(|(_, record)| record.clone())
			.collect();

		Box::pin(async move { Ok(records) })
	}

	fn list_units_by_source<'a>(
		&'a self,
		source_id: &'a str,
	) -> BoxFuture<'a, Result<Vec<EvidenceUnit>>> {
		*self.fetches().entry(source_id.to_string()).or_insert(0) += 1;

		let result = if self.failing_sources.contains(source_id) {
			Err(Error::Provider { message: format!("Catalog lookup failed for {source_id}.") })
		} else {
			let mut siblings: Vec<EvidenceUnit> = self
				.units
				.iter()
				.filter(|(_, unit)| unit.source_id == source_id)
				.map(|(_, unit)| unit.clone())
				.collect();

			siblings.sort_by_key(|unit| unit.sequence_index);

			Ok(siblings)
		};

		Box::pin(async move { result })
	}
}

/// One scripted reply from [`ScriptedGeneration`].
pub enum Step {
	Respond(String),
	Throttle { retry_after_ms: Option<u64> },
	Fail(String),
	/// Signals `started`, then waits for `release` before answering with `text`.
	Hold { started: Arc<Notify>, release: Arc<Notify>, text: String },
}

#[derive(Clone, Debug)]
pub struct RecordedCall {
	pub messages: Vec<Value>,
	pub max_tokens: u32,
}

/// Replays queued steps in order, then answers every further call with the fallback text.
pub struct ScriptedGeneration {
	steps: Mutex<VecDeque<Step>>,
	fallback: String,
	calls: Mutex<Vec<RecordedCall>>,
}
impl ScriptedGeneration {
	pub fn new(fallback: impl Into<String>) -> Self {
		Self {
			steps: Mutex::new(VecDeque::new()),
			fallback: fallback.into(),
			calls: Mutex::default(),
		}
	}

	pub fn push(&self, step: Step) {
		self.steps.lock().unwrap_or_else(|err| err.into_inner()).push_back(step);
	}

	pub fn push_throttles(&self, count: usize) {
		for _ in 0..count {
			self.push(Step::Throttle { retry_after_ms: None });
		}
	}

	pub fn call_count(&self) -> usize {
		self.recorded().len()
	}

	pub fn calls(&self) -> Vec<RecordedCall> {
		self.recorded().clone()
	}

	fn recorded(&self) -> MutexGuard<'_, Vec<RecordedCall>> {
		self.calls.lock().unwrap_or_else(|err| err.into_inner())
	}
}
impl GenerationProvider for ScriptedGeneration {
	fn generate<'a>(
		&'a self,
		_cfg: &'a LlmProviderConfig,
		messages: &'a [Value],
		max_tokens: u32,
		_temperature: f32,
	) -> BoxFuture<'a, Result<String>> {
		self.recorded().push(RecordedCall { messages: messages.to_vec(), max_tokens });

		let step = self.steps.lock().unwrap_or_else(|err| err.into_inner()).pop_front();
		let fallback = self.fallback.clone();

		Box::pin(async move {
			match step {
				None => Ok(fallback),
				Some(Step::Respond(text)) => Ok(text),
				Some(Step::Throttle { retry_after_ms }) => Err(Error::Throttled { retry_after_ms }),
				Some(Step::Fail(message)) => Err(Error::Provider { message }),
				Some(Step::Hold { started, release, text }) => {
					started.notify_one();
					release.notified().await;

					Ok(text)
				},
			}
		})
	}
}
