use tracing::warn;

use braid_domain::result::SearchHistoryItem;

use crate::{Result, db::PageStore};

impl PageStore {
	/// Prepends the item, collapsing prior entries for the same query and
	/// truncating to the configured limit.
	pub async fn history_save(&self, item: &SearchHistoryItem) {
		if let Err(err) = self.try_history_save(item).await {
			warn!(error = %err, query = %item.query, "History save failed.");
		}
	}

	async fn try_history_save(&self, item: &SearchHistoryItem) -> Result<()> {
		let mut tx = self.pool.begin().await?;

		sqlx::query("DELETE FROM search_history WHERE query = $1")
			.bind(&item.query)
			.execute(&mut *tx)
			.await?;
		sqlx::query(
			"INSERT INTO search_history (id, query, timestamp_ms, result_id) \
			 VALUES ($1, $2, $3, $4) \
			 ON CONFLICT (id) DO UPDATE \
			 SET query = excluded.query, timestamp_ms = excluded.timestamp_ms, \
			     result_id = excluded.result_id",
		)
		.bind(&item.id)
		.bind(&item.query)
		.bind(item.timestamp)
		.bind(&item.result_id)
		.execute(&mut *tx)
		.await?;
		sqlx::query(
			"DELETE FROM search_history WHERE id NOT IN \
			 (SELECT id FROM search_history ORDER BY timestamp_ms DESC, id DESC LIMIT $1)",
		)
		.bind(self.history_limit as i64)
		.execute(&mut *tx)
		.await?;

		tx.commit().await?;

		Ok(())
	}

	/// Most recent first.
	pub async fn history_get(&self) -> Vec<SearchHistoryItem> {
		match self.try_history_get().await {
			Ok(items) => items,
			Err(err) => {
				warn!(error = %err, "History read failed.");

				Vec::new()
			},
		}
	}

	async fn try_history_get(&self) -> Result<Vec<SearchHistoryItem>> {
		let rows: Vec<(String, String, i64, String)> = sqlx::query_as(
			"SELECT id, query, timestamp_ms, result_id FROM search_history \
			 ORDER BY timestamp_ms DESC, id DESC",
		)
		.fetch_all(&self.pool)
		.await?;

		Ok(rows
			.into_iter()
			.map(|(id, query, timestamp, result_id)| SearchHistoryItem {
				id,
				query,
				timestamp,
				result_id,
			})
			.collect())
	}

	pub async fn history_clear(&self) {
		if let Err(err) = sqlx::query("DELETE FROM search_history").execute(&self.pool).await {
			warn!(error = %err, "History clear failed.");
		}
	}
}
