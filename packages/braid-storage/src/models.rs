use braid_domain::sync::SyncSubmission;

#[derive(Debug, sqlx::FromRow)]
pub struct QueueRow {
	pub queue_id: i64,
	pub webhook_url: String,
	pub payload: String,
	pub enqueued_at_ms: i64,
	pub refusals: i64,
}

#[derive(Clone, Debug)]
pub struct QueuedSubmission {
	pub queue_id: i64,
	pub submission: SyncSubmission,
	pub refusals: i64,
}
