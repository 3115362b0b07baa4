use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use dossier_domain::{
	argument::{ArgumentProfile, ArgumentationLine},
	evidence::{EvidenceUnit, SourceRecord},
};

use crate::{
	DossierService, Error, Result,
	ranking::{argument, scoring},
};

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RetrieveRequest {
	pub query: String,
	pub scope_id: String,
	#[serde(default)]
	pub limit: Option<u32>,
	#[serde(default)]
	pub argumentation: Option<ArgumentationLine>,
}

#[derive(Clone, Debug, Serialize)]
pub struct RetrieveResponse {
	pub candidate_count: usize,
	pub units: Vec<EvidenceUnit>,
}

/// Scored candidates plus the catalog records of their scope.
pub(crate) struct RankedCandidates {
	pub units: Vec<EvidenceUnit>,
	pub sources: HashMap<String, SourceRecord>,
}

impl DossierService {
	/// Ranks evidence for a query without selection, generation or caller locking.
	pub async fn retrieve(&self, req: RetrieveRequest) -> Result<RetrieveResponse> {
		require_non_empty("query", &req.query)?;
		require_non_empty("scope_id", &req.scope_id)?;

		if req.limit == Some(0) {
			return Err(Error::InvalidRequest {
				message: "limit must be greater than zero.".to_string(),
			});
		}

		let ranked =
			self.rank_candidates(&req.query, &req.scope_id, req.argumentation.as_ref()).await?;
		let candidate_count = ranked.units.len();
		let limit = req.limit.unwrap_or(self.cfg.retrieval.top_k) as usize;
		let mut units = ranked.units;

		units.truncate(limit);

		tracing::info!(
			scope_id = %req.scope_id,
			candidate_count,
			returned = units.len(),
			"Retrieved evidence units."
		);

		Ok(RetrieveResponse { candidate_count, units })
	}

	/// Embeds the query, searches the scope, applies catalog categories, scores and re-ranks.
	pub(crate) async fn rank_candidates(
		&self,
		query: &str,
		scope_id: &str,
		argumentation: Option<&ArgumentationLine>,
	) -> Result<RankedCandidates> {
		let query = query.trim();
		let scope_id = scope_id.trim();
		let vectors = self
			.providers
			.embedding
			.embed(&self.cfg.providers.embedding, &[query.to_string()])
			.await?;
		let Some(vector) = vectors.into_iter().next() else {
			return Err(Error::Provider {
				message: "Embedding provider returned no vector for the query.".to_string(),
			});
		};
		let mut units = self
			.providers
			.retrieval
			.search(&vector, scope_id, self.cfg.retrieval.candidate_k)
			.await?;
		let sources: HashMap<String, SourceRecord> = self
			.providers
			.catalog
			.list_sources(scope_id)
			.await?
			.into_iter()
			.map(|record| (record.id.clone(), record))
			.collect();
		let mut uncatalogued = 0_usize;

		for unit in &mut units {
			match sources.get(&unit.source_id) {
				Some(record) => unit.source_category = record.category,
				None => uncatalogued += 1,
			}
		}

		if uncatalogued > 0 {
			tracing::warn!(
				scope_id,
				uncatalogued,
				"Some retrieved units have no catalog entry. Keeping their stored category."
			);
		}

		let mut ranked = scoring::score_units(&self.cfg.scoring, query, units);
		let profile = argumentation.map(ArgumentProfile::from_line);

		argument::rerank(&self.cfg.argument, profile.as_ref(), &mut ranked);

		Ok(RankedCandidates { units: ranked, sources })
	}
}

pub(crate) fn require_non_empty(field: &str, value: &str) -> Result<()> {
	if value.trim().is_empty() {
		return Err(Error::InvalidRequest { message: format!("{field} is required.") });
	}

	Ok(())
}
