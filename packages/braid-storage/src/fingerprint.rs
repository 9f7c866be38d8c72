use tracing::warn;
use uuid::Uuid;

use crate::{Result, db::PageStore};

pub const FINGERPRINT_KEY: &str = "searchGptFingerprintId";

impl PageStore {
	/// Returns the stable per-profile fingerprint, creating it on first
	/// access. Falls back to an unpersisted id if the store is unwritable.
	pub async fn fingerprint_id(&self) -> String {
		match self.try_fingerprint_id().await {
			Ok(id) => id,
			Err(err) => {
				warn!(error = %err, "Fingerprint lookup failed; using an ephemeral id.");

				Uuid::new_v4().to_string()
			},
		}
	}

	async fn try_fingerprint_id(&self) -> Result<String> {
		let row: Option<(String,)> = sqlx::query_as("SELECT value FROM page_kv WHERE key = $1")
			.bind(FINGERPRINT_KEY)
			.fetch_optional(&self.pool)
			.await?;

		if let Some((value,)) = row {
			return Ok(value);
		}

		let id = Uuid::new_v4().to_string();

		sqlx::query("INSERT INTO page_kv (key, value) VALUES ($1, $2) ON CONFLICT (key) DO NOTHING")
			.bind(FINGERPRINT_KEY)
			.bind(&id)
			.execute(&self.pool)
			.await?;

		Ok(id)
	}
}
