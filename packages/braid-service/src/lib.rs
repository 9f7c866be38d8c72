pub mod prompts;
pub mod search;
pub mod similarity;

pub use search::{SearchRequest, Service};
pub use similarity::SimilarityError;

use std::{future::Future, pin::Pin};

use serde_json::Value;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Seam between the orchestrator and the background sync engine. The page
/// side of the engine implements this; tests record through it. Submission
/// is fire-and-forget by contract: implementations must never surface
/// delivery state back into the search path.
pub trait SyncSink
where
	Self: Send + Sync,
{
	fn submit(&self, body: Value) -> BoxFuture<'static, ()>;
}
