pub mod admission;
pub mod generate;
pub mod generation;
pub mod ranking;
pub mod retrieve;
pub mod selection;

mod error;
mod queue;

pub use admission::{
	AdmissionController, AdmissionMode, AdmissionStatus, CallerPermit, QueuedTicket, TicketError,
	TicketState, TicketView,
};
pub use error::{Error, ErrorKind, Result};
pub use generate::{
	EvidenceIndexEntry, GenerateOutcome, GenerateRequest, GenerateResponse, QueuedResponse,
};
pub use retrieve::{RetrieveRequest, RetrieveResponse};

use std::{future::Future, pin::Pin, sync::Arc};

use serde_json::Value;

use dossier_config::{Config, EmbeddingProviderConfig, LlmProviderConfig};
use dossier_domain::evidence::{EvidenceUnit, SourceRecord};
use dossier_providers::{embedding, generation as llm, qdrant::QdrantStore};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub trait EmbeddingProvider
where
	Self: Send + Sync,
{
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, Result<Vec<Vec<f32>>>>;
}

pub trait RetrievalProvider
where
	Self: Send + Sync,
{
	fn search<'a>(
		&'a self,
		vector: &'a [f32],
		scope_id: &'a str,
		limit: u32,
	) -> BoxFuture<'a, Result<Vec<EvidenceUnit>>>;
}

pub trait SourceCatalog
where
	Self: Send + Sync,
{
	fn list_sources<'a>(&'a self, scope_id: &'a str) -> BoxFuture<'a, Result<Vec<SourceRecord>>>;

	/// Units of one source ordered by `sequence_index`.
	fn list_units_by_source<'a>(
		&'a self,
		source_id: &'a str,
	) -> BoxFuture<'a, Result<Vec<EvidenceUnit>>>;
}

/// Chat-completion backend. Throttling must be reported as [`Error::Throttled`] so the retry
/// loop can back off and escalate.
pub trait GenerationProvider
where
	Self: Send + Sync,
{
	fn generate<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		messages: &'a [Value],
		max_tokens: u32,
		temperature: f32,
	) -> BoxFuture<'a, Result<String>>;
}

#[derive(Clone)]
pub struct Providers {
	pub embedding: Arc<dyn EmbeddingProvider>,
	pub retrieval: Arc<dyn RetrievalProvider>,
	pub catalog: Arc<dyn SourceCatalog>,
	pub generation: Arc<dyn GenerationProvider>,
}
impl Providers {
	pub fn new(
		embedding: Arc<dyn EmbeddingProvider>,
		retrieval: Arc<dyn RetrievalProvider>,
		catalog: Arc<dyn SourceCatalog>,
		generation: Arc<dyn GenerationProvider>,
	) -> Self {
		Self { embedding, retrieval, catalog, generation }
	}

	/// HTTP embedding and generation clients with Qdrant serving retrieval and the catalog.
	pub fn with_qdrant(store: QdrantStore) -> Self {
		let http = Arc::new(HttpProviders);
		let store = Arc::new(store);

		Self { embedding: http.clone(), retrieval: store.clone(), catalog: store, generation: http }
	}
}

pub struct DossierService {
	pub cfg: Config,
	pub providers: Providers,
	pub admission: Arc<AdmissionController>,
}
impl DossierService {
	pub fn new(cfg: Config, providers: Providers) -> Self {
		let admission = Arc::new(AdmissionController::new(&cfg.admission));

		Self { cfg, providers, admission }
	}

	pub fn admission_status(&self) -> AdmissionStatus {
		self.admission.status()
	}

	pub fn ticket(&self, ticket_id: uuid::Uuid) -> Result<TicketView> {
		self.admission.ticket(ticket_id)
	}
}

struct HttpProviders;
impl EmbeddingProvider for HttpProviders {
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, Result<Vec<Vec<f32>>>> {
		Box::pin(async move { Ok(embedding::embed(cfg, texts).await?) })
	}
}
impl GenerationProvider for HttpProviders {
	fn generate<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		messages: &'a [Value],
		max_tokens: u32,
		temperature: f32,
	) -> BoxFuture<'a, Result<String>> {
		Box::pin(async move { Ok(llm::generate(cfg, messages, max_tokens, temperature).await?) })
	}
}

impl RetrievalProvider for QdrantStore {
	fn search<'a>(
		&'a self,
		vector: &'a [f32],
		scope_id: &'a str,
		limit: u32,
	) -> BoxFuture<'a, Result<Vec<EvidenceUnit>>> {
		Box::pin(async move { Ok(QdrantStore::search(self, vector, scope_id, limit).await?) })
	}
}
impl SourceCatalog for QdrantStore {
	fn list_sources<'a>(&'a self, scope_id: &'a str) -> BoxFuture<'a, Result<Vec<SourceRecord>>> {
		Box::pin(async move { Ok(QdrantStore::list_sources(self, scope_id).await?) })
	}

	fn list_units_by_source<'a>(
		&'a self,
		source_id: &'a str,
	) -> BoxFuture<'a, Result<Vec<EvidenceUnit>>> {
		Box::pin(async move { Ok(QdrantStore::list_units_by_source(self, source_id).await?) })
	}
}
