use std::time::Duration;

use reqwest::Client;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tracing::{error, info, warn};

use braid_domain::{
	message::{ClientMessage, WorkerMessage},
	sync::{SyncPayload, SyncStatus, SyncSubmission},
	ttl,
};
use braid_storage::db::WorkerStore;

use crate::{Error, Result};

const WEBHOOK_TIMEOUT_MS: u64 = 10_000;
const MAX_REFUSALS: i64 = 2;

/// Everything the worker needs is handed over at spawn time; submissions
/// carry their own webhook URL, so no long-lived secret lives here.
pub struct WorkerContext {
	pub store: WorkerStore,
	pub version: String,
	pub retention_hours: i64,
}

/// Inbound edge of the worker context: page messages, intercepted sync
/// submissions, and replay opportunities.
#[derive(Debug)]
pub enum WorkerEvent {
	Client(ClientMessage),
	Intercept { body: Value, reply: oneshot::Sender<SyncStatus> },
	Online,
	ReplayTick,
	Shutdown,
}

/// The worker loop. The host may replace this task at any suspension
/// point, which is why nothing but the in-flight event lives in memory.
pub async fn run_worker(
	ctx: WorkerContext,
	mut inbox: mpsc::Receiver<WorkerEvent>,
	outbound: mpsc::Sender<WorkerMessage>,
) {
	info!(version = %ctx.version, "Worker loop started.");

	while let Some(event) = inbox.recv().await {
		match event {
			WorkerEvent::Client(message) => handle_client_message(&ctx, &outbound, message).await,
			WorkerEvent::Intercept { body, reply } => {
				let status = handle_submission(&ctx, &outbound, body).await;
				let _ = reply.send(status);
			},
			WorkerEvent::Online | WorkerEvent::ReplayTick => {
				if let Err(err) = drain_queue(&ctx, &outbound).await {
					error!(error = %err, "Queue replay failed; waiting for the next opportunity.");
				}
			},
			WorkerEvent::Shutdown => break,
		}
	}

	info!(version = %ctx.version, "Worker loop stopped.");
}

async fn handle_client_message(
	ctx: &WorkerContext,
	outbound: &mpsc::Sender<WorkerMessage>,
	message: ClientMessage,
) {
	match message {
		ClientMessage::Ping => {
			let _ = outbound.send(WorkerMessage::Pong).await;
		},
		ClientMessage::ClientReady => {
			// The page is listening now; flush anything buffered while it
			// was not.
			if let Err(err) = drain_queue(ctx, outbound).await {
				error!(error = %err, "Early-submission replay failed.");
			}
		},
		ClientMessage::SyncData { mut payload } => {
			if payload.enqueue_time == 0 {
				payload.enqueue_time = ttl::now_ms();
			}

			let _ = process_submission(ctx, outbound, payload).await;
			let _ = outbound.send(WorkerMessage::SyncReceived).await;
		},
		ClientMessage::CacheNewEntry { results } => {
			info!(count = results.len(), "Immediate sync requested by the page.");

			let _ = outbound.send(WorkerMessage::SyncReceived).await;

			if let Err(err) = drain_queue(ctx, outbound).await {
				error!(error = %err, "Requested replay failed.");
			}
		},
	}
}

/// The intercepted `/api/sync` body. Whatever happens here, the page gets a
/// status back, never an error.
async fn handle_submission(
	ctx: &WorkerContext,
	outbound: &mpsc::Sender<WorkerMessage>,
	body: Value,
) -> SyncStatus {
	let mut submission: SyncSubmission = match serde_json::from_value(body) {
		Ok(submission) => submission,
		Err(err) => {
			warn!(error = %err, "Dropping malformed sync submission.");

			return SyncStatus::Delivered;
		},
	};

	submission.enqueue_time = ttl::now_ms();

	process_submission(ctx, outbound, submission).await
}

async fn process_submission(
	ctx: &WorkerContext,
	outbound: &mpsc::Sender<WorkerMessage>,
	submission: SyncSubmission,
) -> SyncStatus {
	match deliver(&submission).await {
		Ok(()) => {
			finish_acceptance(ctx, outbound, &submission.payload).await;

			SyncStatus::Delivered
		},
		Err(err) => {
			let refusals = if matches!(err, DeliveryError::Refused(_)) { 1 } else { 0 };

			info!(error = %err, "Webhook not accepting; queueing submission for replay.");

			if let Err(err) = ctx.store.enqueue(&submission, refusals).await {
				error!(error = %err, "Failed to queue sync submission.");
			}

			SyncStatus::Queued
		},
	}
}

/// FIFO replay of the durable queue. Stops (and reports failure so the
/// platform reschedules) at the first record the webhook will not take,
/// which keeps that record at the head.
async fn drain_queue(ctx: &WorkerContext, outbound: &mpsc::Sender<WorkerMessage>) -> Result<()> {
	let retention_ms = ttl::hours_to_ms(ctx.retention_hours);

	loop {
		let Some(record) = ctx.store.peek().await? else {
			return Ok(());
		};
		let now = ttl::now_ms();

		if now - record.submission.enqueue_time >= retention_ms {
			warn!(queue_id = record.queue_id, "Dropping sync record past retention.");
			ctx.store.remove(record.queue_id).await?;

			continue;
		}

		match deliver(&record.submission).await {
			Ok(()) => {
				ctx.store.remove(record.queue_id).await?;
				finish_acceptance(ctx, outbound, &record.submission.payload).await;
			},
			Err(DeliveryError::Refused(status)) => {
				let refusals = ctx.store.record_refusal(record.queue_id).await?;

				if refusals >= MAX_REFUSALS {
					warn!(
						queue_id = record.queue_id,
						%status,
						"Webhook keeps refusing this payload; dropping it."
					);
					ctx.store.remove(record.queue_id).await?;

					continue;
				}

				return Err(Error::SyncFailed(format!("Webhook refused the payload: {status}.")));
			},
			Err(err) => return Err(Error::SyncFailed(err.to_string())),
		}
	}
}

async fn finish_acceptance(
	ctx: &WorkerContext,
	outbound: &mpsc::Sender<WorkerMessage>,
	payload: &SyncPayload,
) {
	if let Err(err) = advance_cursor(&ctx.store, payload).await {
		error!(error = %err, "Failed to advance the sync cursor.");
	}

	let _ = outbound.send(WorkerMessage::SyncSuccess).await;
}

// An explicit comparison loop; both sides are already normalized to
// milliseconds.
async fn advance_cursor(store: &WorkerStore, payload: &SyncPayload) -> braid_storage::Result<()> {
	let prior = store.last_sync_timestamp().await?;
	let mut newest = prior;

	for result in &payload.results {
		if result.timestamp > newest {
			newest = result.timestamp;
		}
	}

	if newest > prior {
		store.advance_last_sync(newest).await?;
	}

	Ok(())
}

#[derive(Debug, thiserror::Error)]
enum DeliveryError {
	#[error("Webhook refused the payload with status {0}.")]
	Refused(reqwest::StatusCode),
	#[error("Webhook unreachable: {0}")]
	Transient(String),
}

async fn deliver(submission: &SyncSubmission) -> std::result::Result<(), DeliveryError> {
	let client = Client::builder()
		.timeout(Duration::from_millis(WEBHOOK_TIMEOUT_MS))
		.build()
		.map_err(|err| DeliveryError::Transient(err.to_string()))?;
	let response = client
		.post(&submission.webhook_url)
		.json(&submission.payload)
		.send()
		.await
		.map_err(|err| DeliveryError::Transient(err.to_string()))?;
	let status = response.status();

	if status.is_success() {
		return Ok(());
	}
	if status.is_client_error() {
		return Err(DeliveryError::Refused(status));
	}

	Err(DeliveryError::Transient(format!("Webhook answered {status}.")))
}
