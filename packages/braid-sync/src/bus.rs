use std::{collections::VecDeque, sync::Arc};

use serde_json::Value;
use tokio::sync::{Mutex, broadcast, mpsc, oneshot, watch};
use tracing::{info, warn};

use braid_domain::{
	message::{ClientMessage, WorkerMessage},
	sync::SyncStatus,
};

use crate::worker::WorkerEvent;

const CHANNEL_CAPACITY: usize = 64;

/// The page-side event bus. It holds the current controller, gates worker
/// traffic behind the PING/PONG handshake, and buffers anything posted
/// before the handshake completes.
#[derive(Clone)]
pub struct ClientBus {
	inner: Arc<BusInner>,
}

struct BusInner {
	controller: Mutex<Option<mpsc::Sender<WorkerEvent>>>,
	buffer: Mutex<VecDeque<ClientMessage>>,
	ready_tx: watch::Sender<bool>,
	events_tx: broadcast::Sender<WorkerMessage>,
}

impl ClientBus {
	/// Builds the bus plus the sender every worker uses to talk back to
	/// the page.
	pub fn new() -> (Self, mpsc::Sender<WorkerMessage>) {
		let (from_worker_tx, from_worker_rx) = mpsc::channel(CHANNEL_CAPACITY);
		let (ready_tx, _) = watch::channel(false);
		let (events_tx, _) = broadcast::channel(CHANNEL_CAPACITY);
		let bus = Self {
			inner: Arc::new(BusInner {
				controller: Mutex::new(None),
				buffer: Mutex::new(VecDeque::new()),
				ready_tx,
				events_tx,
			}),
		};

		tokio::spawn(bus.clone().listen(from_worker_rx));

		(bus, from_worker_tx)
	}

	async fn listen(self, mut from_worker: mpsc::Receiver<WorkerMessage>) {
		while let Some(message) = from_worker.recv().await {
			match message {
				WorkerMessage::Pong => self.handle_pong().await,
				other => {
					let _ = self.inner.events_tx.send(other);
				},
			}
		}
	}

	async fn handle_pong(&self) {
		// `ready` resolves exactly once; later PONGs only confirm the
		// controller is alive.
		if self.is_ready() {
			return;
		}

		self.inner.ready_tx.send_replace(true);
		info!("Worker handshake complete.");
		self.send_now(ClientMessage::ClientReady).await;
		self.flush_buffer().await;
	}

	async fn flush_buffer(&self) {
		loop {
			let next = self.inner.buffer.lock().await.pop_front();
			let Some(message) = next else {
				return;
			};

			self.send_now(message).await;
		}
	}

	/// Resolves once the current worker has answered a PING. Never
	/// un-resolves, even across controller changes.
	pub async fn ready(&self) {
		let mut rx = self.inner.ready_tx.subscribe();

		while !*rx.borrow_and_update() {
			if rx.changed().await.is_err() {
				return;
			}
		}
	}

	pub fn is_ready(&self) -> bool {
		*self.inner.ready_tx.borrow()
	}

	/// Installs a controller and runs the PING side of the handshake, both
	/// on first availability and on every controller change.
	pub async fn set_controller(&self, controller: mpsc::Sender<WorkerEvent>) {
		{
			let mut current = self.inner.controller.lock().await;

			*current = Some(controller);
		}

		self.send_now(ClientMessage::Ping).await;
	}

	/// Posts an application message to the worker, buffering until the
	/// handshake has completed.
	pub async fn post(&self, message: ClientMessage) {
		if self.is_ready() {
			self.send_now(message).await;
		} else {
			self.inner.buffer.lock().await.push_back(message);
		}
	}

	/// The intercepted sync endpoint. The body never reaches the network
	/// as-is, and the page always gets a status back.
	pub async fn submit(&self, body: Value) -> SyncStatus {
		self.ready().await;

		let controller = self.inner.controller.lock().await.clone();
		let Some(controller) = controller else {
			warn!("No worker controller; submission stays with the page until the next worker.");

			return SyncStatus::Queued;
		};
		let (reply_tx, reply_rx) = oneshot::channel();
		let event = WorkerEvent::Intercept { body, reply: reply_tx };

		if controller.send(event).await.is_err() {
			warn!("Worker controller is gone; submission not handed over.");

			return SyncStatus::Queued;
		}

		match reply_rx.await {
			Ok(status) => status,
			Err(_) => SyncStatus::Queued,
		}
	}

	/// Worker-to-page notifications other than the handshake PONG.
	pub fn sync_events(&self) -> broadcast::Receiver<WorkerMessage> {
		self.inner.events_tx.subscribe()
	}

	async fn send_now(&self, message: ClientMessage) {
		let controller = self.inner.controller.lock().await.clone();
		let Some(controller) = controller else {
			warn!("No worker controller; dropping handshake message.");

			return;
		};

		if controller.send(WorkerEvent::Client(message)).await.is_err() {
			warn!("Worker controller is gone; message dropped.");
		}
	}
}
