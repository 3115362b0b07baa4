use std::sync::Arc;

use crate::{DossierService, admission::WorkerStep};

pub(crate) fn spawn_worker(service: Arc<DossierService>) {
	tokio::spawn(run_worker(service));
}

/// Drains the queue one entry at a time and exits once it is empty.
async fn run_worker(service: Arc<DossierService>) {
	tracing::info!("Generation queue worker started.");

	loop {
		let entry = match service.admission.next_entry() {
			WorkerStep::Run(entry) => entry,
			WorkerStep::Exit => break,
		};
		let outcome = service.run_pipeline(&entry.request).await;

		match &outcome {
			Ok(response) => tracing::info!(
				ticket_id = %entry.ticket_id,
				caller_id = %entry.caller_id,
				paragraphs = response.document.paragraph_count(),
				"Queued generation completed."
			),
			Err(err) => tracing::error!(
				ticket_id = %entry.ticket_id,
				caller_id = %entry.caller_id,
				error_code = err.code(),
				error = %err,
				"Queued generation failed."
			),
		}

		service.admission.complete(entry.ticket_id, outcome);

		if let Some(delay) = service.admission.pacing_delay() {
			tokio::time::sleep(delay).await;
		}
	}

	tracing::info!("Generation queue worker drained the queue.");
}
