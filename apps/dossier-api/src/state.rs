use std::sync::Arc;

use dossier_config::Config;
use dossier_providers::qdrant::QdrantStore;
use dossier_service::{DossierService, Providers};

#[derive(Clone)]
pub struct AppState {
	pub service: Arc<DossierService>,
}
impl AppState {
	pub fn new(config: Config) -> color_eyre::Result<Self> {
		let qdrant = QdrantStore::new(&config.storage.qdrant)?;
		let service = DossierService::new(config, Providers::with_qdrant(qdrant));

		Ok(Self { service: Arc::new(service) })
	}

	pub fn from_service(service: Arc<DossierService>) -> Self {
		Self { service }
	}
}
