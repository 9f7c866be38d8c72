use std::time::Duration;

use braid_domain::message::{ClientMessage, WorkerMessage};
use braid_sync::{
	bus::ClientBus,
	lifecycle::{Registry, RegistrySettings, WorkerState},
};

fn settings() -> RegistrySettings {
	RegistrySettings { retention_hours: 24, replay_interval: None }
}

async fn await_ready(bus: &ClientBus) {
	tokio::time::timeout(Duration::from_secs(2), bus.ready())
		.await
		.expect("Handshake did not complete in time.");
}

#[tokio::test]
async fn handshake_resolves_ready_after_registration() {
	let dir = braid_testkit::temp_dir();
	let (bus, worker_tx) = ClientBus::new();
	let mut registry = Registry::new(settings(), worker_tx);

	assert!(!bus.is_ready());

	registry.register("v1", braid_testkit::open_worker_store(&dir).await, &bus).await;
	await_ready(&bus).await;

	assert!(bus.is_ready());
	assert_eq!(registry.active_version(), Some("v1"));
	assert_eq!(registry.active_state(), Some(WorkerState::Activated));
}

#[tokio::test]
async fn registering_the_current_version_is_a_no_op() {
	let dir = braid_testkit::temp_dir();
	let (bus, worker_tx) = ClientBus::new();
	let mut registry = Registry::new(settings(), worker_tx);

	registry.register("v1", braid_testkit::open_worker_store(&dir).await, &bus).await;
	await_ready(&bus).await;
	registry.register("v1", braid_testkit::open_worker_store(&dir).await, &bus).await;

	assert_eq!(registry.active_version(), Some("v1"));
	assert!(bus.is_ready());
}

#[tokio::test]
async fn a_second_pong_does_not_unresolve_ready() {
	let dir = braid_testkit::temp_dir();
	let (bus, worker_tx) = ClientBus::new();
	let mut registry = Registry::new(settings(), worker_tx);

	registry.register("v1", braid_testkit::open_worker_store(&dir).await, &bus).await;
	await_ready(&bus).await;

	// A controller change re-pings; the second PONG must leave `ready`
	// resolved.
	registry.register("v2", braid_testkit::open_worker_store(&dir).await, &bus).await;
	tokio::time::sleep(Duration::from_millis(100)).await;

	assert!(bus.is_ready());
	assert_eq!(registry.active_version(), Some("v2"));
}

#[tokio::test]
async fn messages_posted_before_ready_are_forwarded_after_the_handshake() {
	let dir = braid_testkit::temp_dir();
	let (bus, worker_tx) = ClientBus::new();
	let mut registry = Registry::new(settings(), worker_tx);
	let mut events = bus.sync_events();

	// No worker yet: the bus must hold the message, not drop it.
	bus.post(ClientMessage::CacheNewEntry { results: Vec::new() }).await;

	registry.register("v1", braid_testkit::open_worker_store(&dir).await, &bus).await;
	await_ready(&bus).await;

	let acked = tokio::time::timeout(Duration::from_secs(2), async {
		loop {
			match events.recv().await {
				Ok(WorkerMessage::SyncReceived) => return true,
				Ok(_) => {},
				Err(_) => return false,
			}
		}
	})
	.await
	.expect("No acknowledgement for the buffered message.");

	assert!(acked);
}
