use std::{sync::Arc, time::Duration};

use tokio::sync::Notify;

use dossier_domain::evidence::SourceCategory;
use dossier_service::{
	AdmissionMode, DossierService, ErrorKind, GenerateOutcome, GenerateRequest, TicketState,
};
use dossier_testkit::{InMemoryCorpus, ScriptedGeneration, Step};

fn document() -> String {
	dossier_testkit::document_json(&[("The statute requires consent.", &["s1"])])
}

fn corpus() -> Arc<InMemoryCorpus> {
	Arc::new(InMemoryCorpus::new().with_source(
		"eu",
		dossier_testkit::source("statute", SourceCategory::Statute, "Data Act"),
		[dossier_testkit::unit("s1", "statute", 0, 0.8, "Processing requires consent.")],
	))
}

fn request(caller_id: &str) -> GenerateRequest {
	GenerateRequest {
		query: "consent".to_string(),
		scope_id: "eu".to_string(),
		caller_id: caller_id.to_string(),
		..Default::default()
	}
}

fn spawn_generate(
	service: &Arc<DossierService>,
	caller_id: &str,
) -> tokio::task::JoinHandle<dossier_service::Result<GenerateOutcome>> {
	let service = Arc::clone(service);
	let req = request(caller_id);

	tokio::spawn(async move { service.generate(req).await })
}

#[tokio::test]
async fn same_caller_is_rejected_until_its_generation_completes() {
	let generation = Arc::new(ScriptedGeneration::new(document()));
	let started = Arc::new(Notify::new());
	let release = Arc::new(Notify::new());

	generation.push(Step::Hold {
		started: Arc::clone(&started),
		release: Arc::clone(&release),
		text: document(),
	});

	let service = dossier_testkit::service(dossier_testkit::test_config(), corpus(), generation);
	let first = spawn_generate(&service, "caller-a");

	started.notified().await;

	let busy = service
		.generate(request("caller-a"))
		.await
		.expect_err("A second request from the same caller must be rejected.");
	let other = service
		.generate(request("caller-b"))
		.await
		.expect("Other callers should not be blocked.");

	assert_eq!(busy.code(), "caller_busy");
	assert_eq!(busy.kind(), ErrorKind::Capacity);
	assert!(!other.is_queued());
	assert_eq!(service.admission_status().in_flight_callers, 1);

	release.notify_one();

	let outcome = first
		.await
		.expect("Generation task should join.")
		.expect("Held generation should succeed.");

	assert!(!outcome.is_queued());
	assert_eq!(service.admission_status().in_flight_callers, 0);

	service
		.generate(request("caller-a"))
		.await
		.expect("Caller should be free after completion.");
}

#[tokio::test(start_paused = true)]
async fn abandoned_lock_is_taken_over_after_the_lock_timeout() {
	let mut cfg = dossier_testkit::test_config();

	cfg.admission.lock_timeout_secs = 5;
	cfg.generation.timeout_ms = 600_000;

	let generation = Arc::new(ScriptedGeneration::new(document()));
	let started = Arc::new(Notify::new());
	let release = Arc::new(Notify::new());

	generation.push(Step::Hold {
		started: Arc::clone(&started),
		release: Arc::clone(&release),
		text: document(),
	});

	let service = dossier_testkit::service(cfg, corpus(), generation);
	let stuck = spawn_generate(&service, "caller-a");

	started.notified().await;

	let busy = service
		.generate(request("caller-a"))
		.await
		.expect_err("The lock is still fresh.");

	assert_eq!(busy.code(), "caller_busy");

	tokio::time::advance(Duration::from_secs(6)).await;

	service
		.generate(request("caller-a"))
		.await
		.expect("A lock past its timeout should be taken over.");

	release.notify_one();
	stuck
		.await
		.expect("Generation task should join.")
		.expect("The abandoned generation still completes.");

	assert_eq!(service.admission_status().in_flight_callers, 0);
}

#[tokio::test(start_paused = true)]
async fn repeated_throttling_switches_to_queued_mode_until_cooldown() {
	let cfg = dossier_testkit::test_config();
	let poll_interval = Duration::from_millis(500);
	let cooldown = Duration::from_secs(cfg.admission.cooldown_secs);
	let generation = Arc::new(ScriptedGeneration::new(document()));

	generation.push_throttles(3);

	let service = dossier_testkit::service(cfg, corpus(), generation.clone());
	let first = service
		.generate(request("caller-a"))
		.await
		.expect("Generation should succeed after backing off.");

	assert!(!first.is_queued());
	assert_eq!(generation.call_count(), 4);

	let status = service.admission_status();

	assert_eq!(status.mode, AdmissionMode::Queued);
	assert!(status.activated_at.is_some());

	let queued = match service.generate(request("caller-b")).await {
		Ok(GenerateOutcome::Queued(queued)) => queued,
		other => panic!("Expected a queued response, got {other:?}."),
	};

	assert!(queued.queued);
	assert_eq!(queued.position, 1);
	assert_eq!(queued.estimated_wait_seconds, 62);

	let busy = service
		.generate(request("caller-b"))
		.await
		.expect_err("A caller with a pending ticket must be rejected.");

	assert_eq!(busy.code(), "caller_busy");

	let mut view = service.ticket(queued.ticket_id).expect("Ticket should exist.");

	for _ in 0..100 {
		if view.status == TicketState::Completed {
			break;
		}

		tokio::time::sleep(poll_interval).await;

		view = service.ticket(queued.ticket_id).expect("Ticket should exist.");
	}

	assert_eq!(view.status, TicketState::Completed);

	let result = view.result.expect("Completed ticket carries a result.");

	assert_eq!(result.document.paragraph_count(), 1);
	assert_eq!(service.admission_status().mode, AdmissionMode::Queued);

	tokio::time::advance(cooldown).await;

	let status = service.admission_status();

	assert_eq!(status.mode, AdmissionMode::Normal);
	assert!(status.activated_at.is_none());

	let outcome =
		service.generate(request("caller-c")).await.expect("Normal mode should run inline.");

	assert!(!outcome.is_queued());
}

#[tokio::test(start_paused = true)]
async fn exhausted_retries_surface_as_throttled() {
	let cfg = dossier_testkit::test_config();
	let max_attempts = cfg.generation.max_attempts as usize;
	let generation = Arc::new(ScriptedGeneration::new(document()));

	generation.push_throttles(max_attempts);

	let service = dossier_testkit::service(cfg, corpus(), generation.clone());
	let err = service
		.generate(request("caller-a"))
		.await
		.expect_err("Throttling past the attempt limit must fail.");

	assert_eq!(err.code(), "upstream_throttled");
	assert_eq!(err.kind(), ErrorKind::Capacity);
	assert_eq!(generation.call_count(), max_attempts);
	assert_eq!(service.admission_status().mode, AdmissionMode::Queued);
	assert_eq!(service.admission_status().in_flight_callers, 0);
}

#[tokio::test]
async fn unknown_ticket_is_not_found() {
	let service = dossier_testkit::service(
		dossier_testkit::test_config(),
		corpus(),
		Arc::new(ScriptedGeneration::new(document())),
	);
	let err = service.ticket(uuid::Uuid::new_v4()).expect_err("Unknown ticket must fail.");

	assert_eq!(err.code(), "ticket_not_found");
	assert_eq!(err.kind(), ErrorKind::NotFound);
}
