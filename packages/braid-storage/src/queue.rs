use braid_domain::sync::{SyncPayload, SyncSubmission};

use crate::{
	Result,
	db::WorkerStore,
	models::{QueueRow, QueuedSubmission},
};

impl WorkerStore {
	/// Appends a submission to the durable queue. `refusals` is non-zero
	/// when the record enters the queue because of a remote refusal rather
	/// than a transient failure.
	pub async fn enqueue(&self, submission: &SyncSubmission, refusals: i64) -> Result<i64> {
		let payload = serde_json::to_string(&submission.payload)?;
		let result = sqlx::query(
			"INSERT INTO sync_queue (webhook_url, payload, enqueued_at_ms, refusals) \
			 VALUES ($1, $2, $3, $4)",
		)
		.bind(&submission.webhook_url)
		.bind(payload)
		.bind(submission.enqueue_time)
		.bind(refusals)
		.execute(&self.pool)
		.await?;

		Ok(result.last_insert_rowid())
	}

	/// Head of the FIFO queue, if any. The record stays queued until it is
	/// explicitly removed, which is what keeps failed replays at the head.
	pub async fn peek(&self) -> Result<Option<QueuedSubmission>> {
		let row: Option<QueueRow> = sqlx::query_as(
			"SELECT queue_id, webhook_url, payload, enqueued_at_ms, refusals \
			 FROM sync_queue ORDER BY queue_id ASC LIMIT 1",
		)
		.fetch_optional(&self.pool)
		.await?;
		let Some(row) = row else {
			return Ok(None);
		};
		let payload: SyncPayload = serde_json::from_str(&row.payload)?;

		Ok(Some(QueuedSubmission {
			queue_id: row.queue_id,
			submission: SyncSubmission {
				webhook_url: row.webhook_url,
				payload,
				enqueue_time: row.enqueued_at_ms,
			},
			refusals: row.refusals,
		}))
	}

	pub async fn remove(&self, queue_id: i64) -> Result<()> {
		sqlx::query("DELETE FROM sync_queue WHERE queue_id = $1")
			.bind(queue_id)
			.execute(&self.pool)
			.await?;

		Ok(())
	}

	/// Counts a remote refusal against the record and returns the new total.
	pub async fn record_refusal(&self, queue_id: i64) -> Result<i64> {
		sqlx::query("UPDATE sync_queue SET refusals = refusals + 1 WHERE queue_id = $1")
			.bind(queue_id)
			.execute(&self.pool)
			.await?;

		let row: (i64,) = sqlx::query_as("SELECT refusals FROM sync_queue WHERE queue_id = $1")
			.bind(queue_id)
			.fetch_one(&self.pool)
			.await?;

		Ok(row.0)
	}

	pub async fn depth(&self) -> Result<i64> {
		let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM sync_queue").fetch_one(&self.pool).await?;

		Ok(row.0)
	}
}
