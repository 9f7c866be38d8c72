use crate::{Error, Result, db::WorkerStore};

pub const LAST_SYNC_KEY: &str = "lastSyncTimestamp";

impl WorkerStore {
	pub async fn last_sync_timestamp(&self) -> Result<i64> {
		let row: Option<(String,)> = sqlx::query_as("SELECT value FROM sync_meta WHERE key = $1")
			.bind(LAST_SYNC_KEY)
			.fetch_optional(&self.pool)
			.await?;
		let Some((raw,)) = row else {
			return Ok(0);
		};

		raw.parse::<i64>()
			.map_err(|err| Error::InvalidArgument(format!("Stored cursor is not a timestamp: {err}.")))
	}

	/// Moves the watermark forward. Never regresses.
	pub async fn advance_last_sync(&self, candidate_ms: i64) -> Result<bool> {
		let current = self.last_sync_timestamp().await?;

		if candidate_ms <= current {
			return Ok(false);
		}

		sqlx::query(
			"INSERT INTO sync_meta (key, value) VALUES ($1, $2) \
			 ON CONFLICT (key) DO UPDATE SET value = excluded.value",
		)
		.bind(LAST_SYNC_KEY)
		.bind(candidate_ms.to_string())
		.execute(&self.pool)
		.await?;

		Ok(true)
	}
}
