pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error(transparent)]
	Storage(#[from] braid_storage::Error),
	#[error("Sync delivery failed: {0}")]
	SyncFailed(String),
}
