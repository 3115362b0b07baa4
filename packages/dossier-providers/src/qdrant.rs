use std::collections::HashMap;

use qdrant_client::{
	Qdrant,
	qdrant::{
		Condition, Filter, PointId, Query, QueryPointsBuilder, ScrollPointsBuilder, Value,
		point_id::PointIdOptions, value::Kind,
	},
};

use crate::Result;
use dossier_domain::evidence::{EvidenceUnit, SourceCategory, SourceRecord};

const SCROLL_PAGE_SIZE: u32 = 256;

/// Evidence units and the source catalog, stored as two Qdrant collections.
pub struct QdrantStore {
	pub client: Qdrant,
	pub collection: String,
	pub sources_collection: String,
	pub vector_dim: u32,
}
impl QdrantStore {
	pub fn new(cfg: &dossier_config::Qdrant) -> Result<Self> {
		let client = Qdrant::from_url(&cfg.url).build()?;

		Ok(Self {
			client,
			collection: cfg.collection.clone(),
			sources_collection: cfg.sources_collection.clone(),
			vector_dim: cfg.vector_dim,
		})
	}

	pub async fn search(
		&self,
		vector: &[f32],
		scope_id: &str,
		limit: u32,
	) -> Result<Vec<EvidenceUnit>> {
		let search = QueryPointsBuilder::new(self.collection.clone())
			.query(Query::new_nearest(vector.to_vec()))
			.filter(Filter::must([Condition::matches("scope_id", scope_id.to_string())]))
			.with_payload(true)
			.limit(limit as u64);
		let response = self.client.query(search).await?;
		let mut out = Vec::with_capacity(response.result.len());

		for point in &response.result {
			match unit_from_payload(point.id.as_ref(), &point.payload, point.score) {
				Some(unit) => out.push(unit),
				None => tracing::warn!(scope_id, "Retrieved point is missing unit payload fields."),
			}
		}

		Ok(out)
	}

	pub async fn list_sources(&self, scope_id: &str) -> Result<Vec<SourceRecord>> {
		let filter = Filter::must([Condition::matches("scope_id", scope_id.to_string())]);
		let mut out = Vec::new();
		let mut offset: Option<PointId> = None;

		loop {
			let mut request = ScrollPointsBuilder::new(self.sources_collection.clone())
				.filter(filter.clone())
				.limit(SCROLL_PAGE_SIZE)
				.with_payload(true);

			if let Some(offset) = offset.take() {
				request = request.offset(offset);
			}

			let response = self.client.scroll(request).await?;

			for point in &response.result {
				match source_from_payload(point.id.as_ref(), &point.payload) {
					Some(record) => out.push(record),
					None => tracing::warn!(scope_id, "Source point is missing catalog fields."),
				}
			}

			match response.next_page_offset {
				Some(next) => offset = Some(next),
				None => break,
			}
		}

		Ok(out)
	}

	/// Every unit of one source, ordered by `sequence_index`.
	pub async fn list_units_by_source(&self, source_id: &str) -> Result<Vec<EvidenceUnit>> {
		let filter = Filter::must([Condition::matches("source_id", source_id.to_string())]);
		let mut out = Vec::new();
		let mut offset: Option<PointId> = None;

		loop {
			let mut request = ScrollPointsBuilder::new(self.collection.clone())
				.filter(filter.clone())
				.limit(SCROLL_PAGE_SIZE)
				.with_payload(true);

			if let Some(offset) = offset.take() {
				request = request.offset(offset);
			}

			let response = self.client.scroll(request).await?;

			for point in &response.result {
				if let Some(unit) = unit_from_payload(point.id.as_ref(), &point.payload, 0.0) {
					out.push(unit);
				}
			}

			match response.next_page_offset {
				Some(next) => offset = Some(next),
				None => break,
			}
		}

		out.sort_by(|a, b| a.sequence_index.cmp(&b.sequence_index).then_with(|| a.id.cmp(&b.id)));

		Ok(out)
	}
}

pub fn point_id_to_string(point_id: &PointId) -> Option<String> {
	match &point_id.point_id_options {
		Some(PointIdOptions::Uuid(id)) => Some(id.clone()),
		Some(PointIdOptions::Num(num)) => Some(num.to_string()),
		None => None,
	}
}

pub fn payload_string(payload: &HashMap<String, Value>, key: &str) -> Option<String> {
	let value = payload.get(key)?;

	match &value.kind {
		Some(Kind::StringValue(text)) => Some(text.to_string()),
		_ => None,
	}
}

pub fn payload_u32(payload: &HashMap<String, Value>, key: &str) -> Option<u32> {
	let value = payload.get(key)?;

	match &value.kind {
		Some(Kind::IntegerValue(value)) => u32::try_from(*value).ok(),
		Some(Kind::DoubleValue(value)) =>
			if value.fract() == 0.0 && *value >= 0.0 {
				u32::try_from(*value as i64).ok()
			} else {
				None
			},
		_ => None,
	}
}

/// Builds a unit from a point. The `unit_id` payload key wins over the point id.
pub fn unit_from_payload(
	point_id: Option<&PointId>,
	payload: &HashMap<String, Value>,
	similarity: f32,
) -> Option<EvidenceUnit> {
	let id = payload_string(payload, "unit_id").or_else(|| point_id.and_then(point_id_to_string))?;
	let source_id = payload_string(payload, "source_id")?;
	let text = payload_string(payload, "text")?;
	let sequence_index = payload_u32(payload, "sequence_index")?;
	let source_category = payload_string(payload, "source_category")
		.map(|raw| SourceCategory::parse(&raw))
		.unwrap_or_default();

	Some(EvidenceUnit {
		id,
		source_id,
		source_category,
		page_number: payload_u32(payload, "page_number"),
		paragraph_index: payload_u32(payload, "paragraph_index"),
		sequence_index,
		text,
		similarity: similarity.clamp(0.0, 1.0),
		derived_score: 0.0,
		is_expanded_context: false,
	})
}

pub fn source_from_payload(
	point_id: Option<&PointId>,
	payload: &HashMap<String, Value>,
) -> Option<SourceRecord> {
	let id =
		payload_string(payload, "source_id").or_else(|| point_id.and_then(point_id_to_string))?;
	let category = payload_string(payload, "category")
		.map(|raw| SourceCategory::parse(&raw))
		.unwrap_or_default();
	let title = payload_string(payload, "title").unwrap_or_default();

	Some(SourceRecord { id, category, title })
}
