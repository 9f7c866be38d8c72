use std::path::Path;

use sqlx::{
	SqlitePool,
	sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};

use crate::{Result, schema};

/// The page context's private store: artifacts, history, and the
/// fingerprint key. Never opened by worker code.
pub struct PageStore {
	pub pool: SqlitePool,
	pub(crate) ttl_hours: i64,
	pub(crate) history_limit: u32,
}
impl PageStore {
	pub async fn open(path: &Path, cache: &braid_config::Cache) -> Result<Self> {
		let pool = connect(path).await?;
		let store = Self { pool, ttl_hours: cache.ttl_hours, history_limit: cache.history_limit };

		apply_schema(&store.pool, schema::PAGE_SCHEMA).await?;

		Ok(store)
	}
}

/// The worker context's private store: the durable sync queue and the last
/// sync cursor. Never opened by page code.
pub struct WorkerStore {
	pub pool: SqlitePool,
}
impl WorkerStore {
	pub async fn open(path: &Path) -> Result<Self> {
		let pool = connect(path).await?;
		let store = Self { pool };

		apply_schema(&store.pool, schema::WORKER_SCHEMA).await?;

		Ok(store)
	}
}

async fn connect(path: &Path) -> Result<SqlitePool> {
	let options = SqliteConnectOptions::new().filename(path).create_if_missing(true);
	let pool = SqlitePoolOptions::new().max_connections(1).connect_with(options).await?;

	Ok(pool)
}

async fn apply_schema(pool: &SqlitePool, sql: &str) -> Result<()> {
	for statement in sql.split(';') {
		let trimmed = statement.trim();

		if trimmed.is_empty() {
			continue;
		}

		sqlx::query(trimmed).execute(pool).await?;
	}

	Ok(())
}
