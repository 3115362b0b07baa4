use std::{
	collections::{HashMap, VecDeque},
	sync::{Arc, Mutex, MutexGuard},
	time::Duration,
};

use serde::{Serialize, Serializer};
use time::{OffsetDateTime, format_description::well_known::Rfc3339};
use tokio::time::Instant;
use uuid::Uuid;

use dossier_config::Admission;

use crate::{Error, ErrorKind, GenerateRequest, GenerateResponse, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AdmissionMode {
	Normal,
	Queued,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketState {
	Queued,
	Running,
	Completed,
	Failed,
	Expired,
}
impl TicketState {
	fn is_pending(self) -> bool {
		matches!(self, Self::Queued | Self::Running)
	}
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TicketError {
	pub error_code: String,
	pub kind: ErrorKind,
	pub message: String,
}
impl From<&Error> for TicketError {
	fn from(err: &Error) -> Self {
		Self { error_code: err.code().to_string(), kind: err.kind(), message: err.to_string() }
	}
}

#[derive(Clone, Debug, Serialize)]
pub struct TicketView {
	pub ticket_id: Uuid,
	pub status: TicketState,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub position: Option<usize>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub result: Option<GenerateResponse>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub error: Option<TicketError>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct QueuedTicket {
	pub ticket_id: Uuid,
	/// 1-based position in the queue at the time of enqueueing.
	pub position: usize,
	pub estimated_wait_seconds: u64,
}

#[derive(Clone, Debug, Serialize)]
pub struct AdmissionStatus {
	pub mode: AdmissionMode,
	#[serde(serialize_with = "serialize_rfc3339", skip_serializing_if = "Option::is_none")]
	pub activated_at: Option<OffsetDateTime>,
	pub queue_depth: usize,
	pub in_flight_callers: usize,
}

/// Queued generation waiting for the worker.
#[derive(Clone, Debug)]
pub struct QueueEntry {
	pub ticket_id: Uuid,
	pub caller_id: String,
	pub request: GenerateRequest,
	pub enqueued_at: Instant,
}

#[derive(Debug)]
pub(crate) enum WorkerStep {
	Run(Box<QueueEntry>),
	Exit,
}

/// Single-flight lock for one caller. `epoch` grows on every acquisition so a permit left over
/// from timed-out work cannot release a newer lock.
#[derive(Clone, Copy, Debug)]
struct CallerLock {
	in_flight: bool,
	started_at: Instant,
	epoch: u64,
}

#[derive(Debug)]
struct TicketRecord {
	caller_id: String,
	state: TicketState,
	result: Option<Box<GenerateResponse>>,
	error: Option<TicketError>,
	finished_at: Option<Instant>,
}

#[derive(Debug)]
struct AdmissionState {
	callers: HashMap<String, CallerLock>,
	mode: AdmissionMode,
	activated_at: Option<OffsetDateTime>,
	last_throttle_at: Option<Instant>,
	queue: VecDeque<QueueEntry>,
	running: Option<Uuid>,
	worker_running: bool,
	tickets: HashMap<Uuid, TicketRecord>,
}
impl AdmissionState {
	fn has_pending_ticket(&self, caller_id: &str) -> bool {
		self.tickets.values().any(|ticket| ticket.state.is_pending() && ticket.caller_id == caller_id)
	}

	fn holds_live_lock(&self, caller_id: &str, now: Instant, lock_timeout: Duration) -> bool {
		self.callers
			.get(caller_id)
			.is_some_and(|lock| lock.in_flight && now.duration_since(lock.started_at) < lock_timeout)
	}
}

/// Per-caller single-flight locks, the normal/queued mode switch, the FIFO queue and the ticket
/// board. All state sits behind one mutex that is never held across an await.
#[derive(Debug)]
pub struct AdmissionController {
	cfg: Admission,
	state: Mutex<AdmissionState>,
}
impl AdmissionController {
	pub fn new(cfg: &Admission) -> Self {
		Self {
			cfg: cfg.clone(),
			state: Mutex::new(AdmissionState {
				callers: HashMap::new(),
				mode: AdmissionMode::Normal,
				activated_at: None,
				last_throttle_at: None,
				queue: VecDeque::new(),
				running: None,
				worker_running: false,
				tickets: HashMap::new(),
			}),
		}
	}

	/// Takes the caller's single-flight lock. A lock older than `lock_timeout_secs` is treated
	/// as abandoned and taken over.
	pub fn try_acquire(self: &Arc<Self>, caller_id: &str) -> Result<CallerPermit> {
		let now = Instant::now();
		let mut state = self.state();

		if state.has_pending_ticket(caller_id)
			|| state.holds_live_lock(caller_id, now, self.lock_timeout())
		{
			return Err(Error::CallerBusy { caller_id: caller_id.to_string() });
		}

		let lock = state.callers.entry(caller_id.to_string()).or_insert(CallerLock {
			in_flight: false,
			started_at: now,
			epoch: 0,
		});

		if lock.in_flight {
			tracing::warn!(
				caller_id,
				stale_epoch = lock.epoch,
				"Taking over an abandoned caller lock."
			);
		}

		lock.in_flight = true;
		lock.started_at = now;
		lock.epoch += 1;

		Ok(CallerPermit {
			controller: Arc::clone(self),
			caller_id: caller_id.to_string(),
			epoch: lock.epoch,
		})
	}

	pub fn record_throttle(&self) {
		self.state().last_throttle_at = Some(Instant::now());
	}

	/// Switches to queued mode. Repeated calls while queued are no-ops.
	pub fn escalate(&self) {
		let mut state = self.state();

		if state.mode == AdmissionMode::Queued {
			return;
		}

		state.mode = AdmissionMode::Queued;
		state.activated_at = Some(OffsetDateTime::now_utc());

		tracing::warn!("Generation provider keeps throttling. Switching admission to queued mode.");
	}

	/// Current mode. Leaves queued mode once the queue is drained and the cooldown since the
	/// last throttle has elapsed.
	pub fn mode(&self) -> AdmissionMode {
		let mut state = self.state();

		self.settle_mode(&mut state, Instant::now());

		state.mode
	}

	pub fn is_queue_mode(&self) -> bool {
		self.mode() == AdmissionMode::Queued
	}

	/// Appends a request to the queue. The flag tells the caller to start a worker.
	pub fn enqueue(&self, request: GenerateRequest) -> Result<(QueuedTicket, bool)> {
		let now = Instant::now();
		let mut state = self.state();

		self.prune(&mut state, now);

		if state.has_pending_ticket(&request.caller_id)
			|| state.holds_live_lock(&request.caller_id, now, self.lock_timeout())
		{
			return Err(Error::CallerBusy { caller_id: request.caller_id });
		}

		let capacity = self.cfg.queue_capacity as usize;

		if state.queue.len() >= capacity {
			return Err(Error::QueueFull { capacity });
		}

		let ticket_id = Uuid::new_v4();
		let caller_id = request.caller_id.clone();

		state.tickets.insert(
			ticket_id,
			TicketRecord {
				caller_id: caller_id.clone(),
				state: TicketState::Queued,
				result: None,
				error: None,
				finished_at: None,
			},
		);
		state.queue.push_back(QueueEntry { ticket_id, caller_id, request, enqueued_at: now });

		let position = state.queue.len();
		let per_item =
			self.cfg.estimated_generation_secs + self.cfg.inter_item_delay_ms.div_ceil(1_000);
		let spawn_worker = !state.worker_running;

		state.worker_running = true;

		tracing::info!(%ticket_id, position, "Queued generation request.");

		Ok((
			QueuedTicket { ticket_id, position, estimated_wait_seconds: position as u64 * per_item },
			spawn_worker,
		))
	}

	/// Hands the next live entry to the worker, expiring stale ones on the way. Returns
	/// [`WorkerStep::Exit`] and clears the worker flag once the queue is empty.
	pub(crate) fn next_entry(&self) -> WorkerStep {
		let now = Instant::now();
		let mut state = self.state();

		self.prune(&mut state, now);

		let Some(entry) = state.queue.pop_front() else {
			state.worker_running = false;

			return WorkerStep::Exit;
		};

		if let Some(ticket) = state.tickets.get_mut(&entry.ticket_id) {
			ticket.state = TicketState::Running;
		}

		state.running = Some(entry.ticket_id);

		WorkerStep::Run(Box::new(entry))
	}

	/// Records the outcome of a queued run.
	pub(crate) fn complete(&self, ticket_id: Uuid, outcome: Result<GenerateResponse>) {
		let now = Instant::now();
		let mut state = self.state();

		if state.running == Some(ticket_id) {
			state.running = None;
		}

		let Some(ticket) = state.tickets.get_mut(&ticket_id) else { return };

		ticket.finished_at = Some(now);

		match outcome {
			Ok(response) => {
				ticket.state = TicketState::Completed;
				ticket.result = Some(Box::new(response));
			},
			Err(err) => {
				ticket.state = TicketState::Failed;
				ticket.error = Some(TicketError::from(&err));
			},
		}
	}

	/// Pause before the next queued item, or `None` when nothing is waiting.
	pub(crate) fn pacing_delay(&self) -> Option<Duration> {
		let now = Instant::now();
		let state = self.state();

		if state.queue.is_empty() {
			return None;
		}
		if state.last_throttle_at.is_some_and(|at| now.duration_since(at) < self.cooldown()) {
			return Some(Duration::from_millis(self.cfg.throttled_delay_ms));
		}

		Some(Duration::from_millis(self.cfg.inter_item_delay_ms))
	}

	pub fn ticket(&self, ticket_id: Uuid) -> Result<TicketView> {
		let now = Instant::now();
		let mut state = self.state();

		self.prune(&mut state, now);

		let Some(ticket) = state.tickets.get(&ticket_id) else {
			return Err(Error::TicketNotFound { ticket_id });
		};
		let position = match ticket.state {
			TicketState::Queued => state
				.queue
				.iter()
				.position(|entry| entry.ticket_id == ticket_id)
				.map(|idx| idx + 1),
			_ => None,
		};

		Ok(TicketView {
			ticket_id,
			status: ticket.state,
			position,
			result: ticket.result.as_deref().cloned(),
			error: ticket.error.clone(),
		})
	}

	pub fn status(&self) -> AdmissionStatus {
		let now = Instant::now();
		let mut state = self.state();

		self.settle_mode(&mut state, now);

		let lock_timeout = self.lock_timeout();

		AdmissionStatus {
			mode: state.mode,
			activated_at: state.activated_at,
			queue_depth: state.queue.len(),
			in_flight_callers: state
				.callers
				.keys()
				.filter(|caller_id| state.holds_live_lock(caller_id, now, lock_timeout))
				.count(),
		}
	}

	fn release(&self, caller_id: &str, epoch: u64) {
		let mut state = self.state();
		let Some(lock) = state.callers.get_mut(caller_id) else { return };

		if lock.epoch != epoch {
			tracing::debug!(caller_id, epoch, current_epoch = lock.epoch, "Ignoring stale permit.");

			return;
		}

		lock.in_flight = false;
	}

	fn settle_mode(&self, state: &mut AdmissionState, now: Instant) {
		if state.mode != AdmissionMode::Queued || !state.queue.is_empty() || state.running.is_some()
		{
			return;
		}

		let cooled =
			state.last_throttle_at.is_none_or(|at| now.duration_since(at) >= self.cooldown());

		if cooled {
			state.mode = AdmissionMode::Normal;
			state.activated_at = None;

			tracing::info!("Admission returned to normal mode.");
		}
	}

	fn prune(&self, state: &mut AdmissionState, now: Instant) {
		let residency = Duration::from_secs(self.cfg.max_queue_residency_secs);
		let retention = Duration::from_secs(self.cfg.ticket_retention_secs);
		let mut expired = Vec::new();

		state.queue.retain(|entry| {
			let live = now.duration_since(entry.enqueued_at) <= residency;

			if !live {
				expired.push(entry.ticket_id);
			}

			live
		});

		for ticket_id in expired {
			tracing::warn!(%ticket_id, "Abandoning queued generation past its residency limit.");

			if let Some(ticket) = state.tickets.get_mut(&ticket_id) {
				ticket.state = TicketState::Expired;
				ticket.finished_at = Some(now);
			}
		}

		state.tickets.retain(|_, ticket| {
			ticket.finished_at.is_none_or(|finished_at| now.duration_since(finished_at) < retention)
		});
	}

	fn lock_timeout(&self) -> Duration {
		Duration::from_secs(self.cfg.lock_timeout_secs)
	}

	fn cooldown(&self) -> Duration {
		Duration::from_secs(self.cfg.cooldown_secs)
	}

	fn state(&self) -> MutexGuard<'_, AdmissionState> {
		self.state.lock().unwrap_or_else(|err| err.into_inner())
	}
}

/// Releases the caller's lock on drop, unless a newer acquisition has superseded it.
#[derive(Debug)]
pub struct CallerPermit {
	controller: Arc<AdmissionController>,
	caller_id: String,
	epoch: u64,
}
impl CallerPermit {
	pub fn caller_id(&self) -> &str {
		&self.caller_id
	}

	pub fn epoch(&self) -> u64 {
		self.epoch
	}
}
impl Drop for CallerPermit {
	fn drop(&mut self) {
		self.controller.release(&self.caller_id, self.epoch);
	}
}

fn serialize_rfc3339<S>(value: &Option<OffsetDateTime>, serializer: S) -> Result<S::Ok, S::Error>
where
	S: Serializer,
{
	match value {
		Some(value) => {
			let formatted = value.format(&Rfc3339).map_err(serde::ser::Error::custom)?;

			serializer.serialize_str(&formatted)
		},
		None => serializer.serialize_none(),
	}
}
