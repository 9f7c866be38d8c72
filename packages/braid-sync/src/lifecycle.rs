use std::time::Duration;

use tokio::{
	sync::mpsc,
	task::JoinHandle,
	time::{self, MissedTickBehavior},
};
use tracing::info;

use braid_domain::message::WorkerMessage;
use braid_storage::db::WorkerStore;

use crate::{
	bus::ClientBus,
	worker::{self, WorkerContext, WorkerEvent},
};

/// Background-sync registration tag. Its presence (a configured replay
/// interval) is a progressive enhancement; without it, replay only happens
/// on explicit triggers while a worker is alive.
pub const SYNC_TAG: &str = "sync-cache";

const INBOX_CAPACITY: usize = 64;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorkerState {
	Registered,
	Installing,
	Installed,
	Activating,
	Activated,
	Redundant,
}

pub struct RegistrySettings {
	pub retention_hours: i64,
	pub replay_interval: Option<Duration>,
}

struct Registration {
	version: String,
	state: WorkerState,
	inbox: mpsc::Sender<WorkerEvent>,
	task: JoinHandle<()>,
	ticker: Option<JoinHandle<()>>,
}

/// Owns worker installation and replacement. A newly registered version
/// skips waiting and claims the page immediately, so the newest code is
/// the one handling the next message.
pub struct Registry {
	settings: RegistrySettings,
	outbound: mpsc::Sender<WorkerMessage>,
	active: Option<Registration>,
}
impl Registry {
	pub fn new(settings: RegistrySettings, outbound: mpsc::Sender<WorkerMessage>) -> Self {
		Self { settings, outbound, active: None }
	}

	/// Auto-update semantics: registering the version already in control is
	/// a no-op; a changed version installs, activates, and claims the page
	/// without a reload.
	pub async fn register(&mut self, version: &str, store: WorkerStore, bus: &ClientBus) {
		if let Some(active) = self.active.as_ref()
			&& active.state == WorkerState::Activated
			&& active.version == version
		{
			info!(version = %version, "Worker already current.");

			return;
		}

		info!(version = %version, "Installing worker.");

		let (inbox_tx, inbox_rx) = mpsc::channel(INBOX_CAPACITY);
		let ctx = WorkerContext {
			store,
			version: version.to_string(),
			retention_hours: self.settings.retention_hours,
		};
		let task = tokio::spawn(worker::run_worker(ctx, inbox_rx, self.outbound.clone()));

		// Skip waiting: the previous worker goes redundant now, not when
		// the last client closes. Shutdown rides the same mpsc as ordinary
		// messages, so the old worker finishes everything already sent.
		if let Some(mut old) = self.active.take() {
			old.state = WorkerState::Redundant;

			let _ = old.inbox.send(WorkerEvent::Shutdown).await;

			if let Some(ticker) = old.ticker.take() {
				ticker.abort();
			}

			info!(version = %old.version, "Worker is redundant.");
		}

		// Claim: rebind the page's controller. The bus re-pings, which is
		// the controller-change edge of the handshake.
		bus.set_controller(inbox_tx.clone()).await;
		info!(version = %version, "Worker activated and controlling the page.");

		let ticker = self
			.settings
			.replay_interval
			.map(|interval| spawn_ticker(interval, inbox_tx.clone()));

		if ticker.is_some() {
			info!(tag = SYNC_TAG, "Background sync registered.");
		}

		self.active = Some(Registration {
			version: version.to_string(),
			state: WorkerState::Activated,
			inbox: inbox_tx,
			task,
			ticker,
		});
	}

	pub fn active_version(&self) -> Option<&str> {
		self.active.as_ref().map(|registration| registration.version.as_str())
	}

	pub fn active_state(&self) -> Option<WorkerState> {
		self.active.as_ref().map(|registration| registration.state)
	}

	/// Connectivity regained: wake the worker so it drains its queue.
	pub async fn notify_online(&self) {
		if let Some(active) = self.active.as_ref() {
			let _ = active.inbox.send(WorkerEvent::Online).await;
		}
	}

	pub async fn shutdown(mut self) {
		if let Some(mut active) = self.active.take() {
			let _ = active.inbox.send(WorkerEvent::Shutdown).await;

			if let Some(ticker) = active.ticker.take() {
				ticker.abort();
			}

			let _ = active.task.await;
		}
	}
}

fn spawn_ticker(interval: Duration, inbox: mpsc::Sender<WorkerEvent>) -> JoinHandle<()> {
	tokio::spawn(async move {
		let mut timer = time::interval(interval);

		timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
		// The first tick fires immediately; skip it so replay starts one
		// full interval after activation.
		timer.tick().await;

		loop {
			timer.tick().await;

			if inbox.send(WorkerEvent::ReplayTick).await.is_err() {
				return;
			}
		}
	})
}
