// std
use std::{path::PathBuf, sync::Arc, time::Duration};

// crates.io
use clap::{Parser, Subcommand};
use color_eyre::eyre;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

// self
use braid_domain::message::WorkerMessage;
use braid_service::{BoxFuture, SearchRequest, Service, SyncSink};
use braid_storage::db::{PageStore, WorkerStore};
use braid_sync::{
	bus::ClientBus,
	lifecycle::{Registry, RegistrySettings},
};

pub const WORKER_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Parser)]
#[command(version, rename_all = "kebab")]
pub struct Args {
	#[arg(long, short = 'c', value_name = "FILE")]
	pub config: PathBuf,
	#[command(subcommand)]
	pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
	/// Run one search and print the results as JSON.
	Search {
		query: String,
		/// Id of a stored result to thread the query under.
		#[arg(long)]
		parent: Option<String>,
		/// Session id for the semantic cache tier.
		#[arg(long)]
		user: Option<String>,
	},
	/// Print the recent search history.
	History,
	/// Wipe the local artifact store and history.
	Clear,
}

struct BusSink {
	bus: ClientBus,
}
impl SyncSink for BusSink {
	fn submit(&self, body: Value) -> BoxFuture<'static, ()> {
		let bus = self.bus.clone();

		Box::pin(async move {
			let _ = bus.submit(body).await;
		})
	}
}

pub async fn run(args: Args) -> color_eyre::Result<()> {
	let config = braid_config::load(&args.config)?;
	let filter = EnvFilter::new(config.service.log_level.clone());

	tracing_subscriber::fmt().with_env_filter(filter).init();

	let config = Arc::new(config);
	let page_store = Arc::new(PageStore::open(&config.storage.page_path, &config.cache).await?);
	let (bus, worker_tx) = ClientBus::new();
	let settings = RegistrySettings {
		retention_hours: config.cache.retention_hours,
		replay_interval: config.sync.replay_interval_secs.map(Duration::from_secs),
	};
	let mut registry = Registry::new(settings, worker_tx);
	let worker_store = WorkerStore::open(&config.storage.worker_path).await?;

	registry.register(WORKER_VERSION, worker_store, &bus).await;

	match args.command {
		Command::Search { query, parent, user } => {
			let service = Service {
				config: config.clone(),
				store: page_store.clone(),
				sync: Arc::new(BusSink { bus: bus.clone() }),
			};
			let parent = match parent {
				Some(id) => Some(
					page_store
						.get(&id)
						.await
						.ok_or_else(|| eyre::eyre!("No stored result under id {id}."))?,
				),
				None => None,
			};
			let mut events = bus.sync_events();
			let cancel = CancellationToken::new();
			let results =
				service.search(SearchRequest { query, parent, user_id: user }, &cancel).await;

			println!("{}", serde_json::to_string_pretty(&results)?);

			// The hand-off is fire-and-forget; give it a moment so a
			// confirmation can be surfaced before exit.
			let confirmation = tokio::time::timeout(Duration::from_secs(2), async {
				loop {
					match events.recv().await {
						Ok(WorkerMessage::SyncSuccess) => return true,
						Ok(_) => {},
						Err(_) => return false,
					}
				}
			})
			.await;

			if matches!(confirmation, Ok(true)) {
				info!("Results synced.");
			}
		},
		Command::History => {
			let items = page_store.history_get().await;

			println!("{}", serde_json::to_string_pretty(&items)?);
		},
		Command::Clear => {
			page_store.clear().await;
			page_store.history_clear().await;
			info!("Local artifact store cleared.");
		},
	}

	registry.shutdown().await;

	Ok(())
}
