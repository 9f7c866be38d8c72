use std::{collections::HashSet, future::Future, pin::Pin};

use sqlx::{Sqlite, Transaction};
use tracing::warn;

use braid_domain::{
	result::{CacheEntry, Reply, SearchResult},
	ttl,
};

use crate::{Result, db::PageStore};

pub const CONV_PREFIX: &str = "conv_";

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

fn conv_key(id: &str) -> String {
	format!("{CONV_PREFIX}{id}")
}

impl PageStore {
	/// Upserts the node and, for non-roots, appends a reply stub to the
	/// stored parent. The store is advisory: failures are logged, never
	/// surfaced to the search path.
	pub async fn save(&self, result: &SearchResult) {
		if let Err(err) = self.try_save(result).await {
			warn!(error = %err, id = %result.id, "Artifact save failed.");
		}
	}

	async fn try_save(&self, result: &SearchResult) -> Result<()> {
		let now = ttl::now_ms();
		let expires_at = ttl::expires_at(now, self.ttl_hours);
		let mut stored = result.clone();

		// Parents persist stubs only; full children live under their own key.
		stored.replies = stored.replies.iter().map(|reply| Reply::Stub(reply.stub())).collect();

		let entry = CacheEntry { value: stored, timestamp: now, expires_at };
		let encoded = serde_json::to_string(&entry)?;
		let mut tx = self.pool.begin().await?;

		upsert_entry(&mut tx, &conv_key(&result.id), &encoded, now, expires_at).await?;

		if let Some(parent_id) = result.parent_id.as_deref() {
			self.append_reply_stub(&mut tx, parent_id, result, now).await?;
		}

		tx.commit().await?;

		Ok(())
	}

	// Single-pass read-modify-write inside the save transaction, so a failed
	// append can never leave a half-written parent behind.
	async fn append_reply_stub(
		&self,
		tx: &mut Transaction<'_, Sqlite>,
		parent_id: &str,
		child: &SearchResult,
		now: i64,
	) -> Result<()> {
		let key = conv_key(parent_id);
		let row: Option<(String,)> = sqlx::query_as("SELECT value FROM cache_entries WHERE key = $1")
			.bind(&key)
			.fetch_optional(&mut **tx)
			.await?;
		let Some((raw,)) = row else {
			return Ok(());
		};
		let mut entry: CacheEntry = serde_json::from_str(&raw)?;

		if entry.value.replies.iter().any(|reply| reply.id() == child.id) {
			return Ok(());
		}

		entry.value.replies.push(Reply::Stub(child.stub()));
		entry.timestamp = now;
		entry.expires_at = ttl::expires_at(now, self.ttl_hours);

		let encoded = serde_json::to_string(&entry)?;

		upsert_entry(tx, &key, &encoded, now, entry.expires_at).await?;

		Ok(())
	}

	/// Returns the stored node iff it has not expired. Expired entries are
	/// deleted on read.
	pub async fn get(&self, id: &str) -> Option<SearchResult> {
		match self.try_get(id).await {
			Ok(found) => found,
			Err(err) => {
				warn!(error = %err, id = %id, "Artifact read failed.");

				None
			},
		}
	}

	async fn try_get(&self, id: &str) -> Result<Option<SearchResult>> {
		let key = conv_key(id);
		let row: Option<(String, i64)> =
			sqlx::query_as("SELECT value, expires_at_ms FROM cache_entries WHERE key = $1")
				.bind(&key)
				.fetch_optional(&self.pool)
				.await?;
		let Some((raw, expires_at_ms)) = row else {
			return Ok(None);
		};

		if ttl::is_expired(expires_at_ms, ttl::now_ms()) {
			sqlx::query("DELETE FROM cache_entries WHERE key = $1")
				.bind(&key)
				.execute(&self.pool)
				.await?;

			return Ok(None);
		}

		let entry: CacheEntry = serde_json::from_str(&raw)?;

		Ok(Some(entry.value))
	}

	/// Returns the root with replies recursively expanded. Missing or
	/// expired children stay as stubs; a visit set stops any accidental
	/// cycle from re-entering a node within one expansion.
	pub async fn get_thread(&self, root_id: &str) -> Option<SearchResult> {
		let root = self.get(root_id).await?;
		let mut visited = HashSet::new();

		visited.insert(root.id.clone());

		Some(self.expand(root, &mut visited).await)
	}

	fn expand<'a>(
		&'a self,
		mut node: SearchResult,
		visited: &'a mut HashSet<String>,
	) -> BoxFuture<'a, SearchResult> {
		Box::pin(async move {
			let replies = std::mem::take(&mut node.replies);
			let mut expanded = Vec::with_capacity(replies.len());

			for reply in replies {
				let stub = reply.stub();

				if !visited.insert(stub.id.clone()) {
					expanded.push(Reply::Stub(stub));

					continue;
				}

				match self.get(&stub.id).await {
					Some(child) => {
						let child = self.expand(child, &mut *visited).await;

						expanded.push(Reply::Full(Box::new(child)));
					},
					None => expanded.push(Reply::Stub(stub)),
				}
			}

			node.replies = expanded;
			node
		})
	}

	/// Every non-expired envelope, for diagnostics and legacy sync paths.
	pub async fn get_all_entries(&self) -> Vec<CacheEntry> {
		match self.try_get_all_entries().await {
			Ok(entries) => entries,
			Err(err) => {
				warn!(error = %err, "Artifact scan failed.");

				Vec::new()
			},
		}
	}

	async fn try_get_all_entries(&self) -> Result<Vec<CacheEntry>> {
		let rows: Vec<(String, i64)> =
			sqlx::query_as("SELECT value, expires_at_ms FROM cache_entries ORDER BY key")
				.fetch_all(&self.pool)
				.await?;
		let now = ttl::now_ms();
		let mut entries = Vec::with_capacity(rows.len());

		for (raw, expires_at_ms) in rows {
			if ttl::is_expired(expires_at_ms, now) {
				continue;
			}

			match serde_json::from_str::<CacheEntry>(&raw) {
				Ok(entry) => entries.push(entry),
				Err(err) => warn!(error = %err, "Skipping undecodable cache entry."),
			}
		}

		Ok(entries)
	}

	pub async fn clear(&self) {
		if let Err(err) = sqlx::query("DELETE FROM cache_entries").execute(&self.pool).await {
			warn!(error = %err, "Artifact clear failed.");
		}
	}
}

async fn upsert_entry(
	tx: &mut Transaction<'_, Sqlite>,
	key: &str,
	encoded: &str,
	now: i64,
	expires_at: i64,
) -> Result<()> {
	sqlx::query(
		"INSERT INTO cache_entries (key, value, written_at_ms, expires_at_ms) \
		 VALUES ($1, $2, $3, $4) \
		 ON CONFLICT (key) DO UPDATE \
		 SET value = excluded.value, written_at_ms = excluded.written_at_ms, \
		     expires_at_ms = excluded.expires_at_ms",
	)
	.bind(key)
	.bind(encoded)
	.bind(now)
	.bind(expires_at)
	.execute(&mut **tx)
	.await?;

	Ok(())
}
