// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Lifecycle of the process-wide client.

use std::sync::Arc;
use std::time::Duration;

use error_explorer::{
	AutoCaptureOptions, ClientBuilder, ExplorerError, Level, MemoryTransport, Options,
	TransportMode, User,
};
use parking_lot::Mutex;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// The global client is process-wide; tests touching it run one at a time.
static LOCK: Mutex<()> = parking_lot::const_mutex(());

fn options() -> Options {
	Options::builder("t", "p").build().unwrap()
}

fn init_memory(auto_capture: AutoCaptureOptions) -> Arc<MemoryTransport> {
	let transport = Arc::new(MemoryTransport::new());
	let options = Options::builder("t", "p")
		.auto_capture(auto_capture)
		.build()
		.unwrap();
	error_explorer::init_with(ClientBuilder::new(options).transport(transport.clone())).unwrap();
	transport
}

#[test]
fn capture_before_init_is_not_initialized() {
	let _lock = LOCK.lock();
	error_explorer::reset();

	let result = error_explorer::capture_exception(&std::fmt::Error, None);
	assert!(matches!(result, Err(ExplorerError::NotInitialized)));
	assert!(matches!(
		error_explorer::capture_message("hello", Level::Info, None),
		Err(ExplorerError::NotInitialized)
	));
	assert!(!error_explorer::is_initialized());
}

#[test]
fn capture_after_reset_is_not_initialized() {
	let _lock = LOCK.lock();
	error_explorer::reset();
	init_memory(AutoCaptureOptions::disabled());

	error_explorer::reset();

	assert!(matches!(
		error_explorer::capture_exception(&std::fmt::Error, None),
		Err(ExplorerError::NotInitialized)
	));
}

#[test]
fn capture_message_records_one_send() {
	let _lock = LOCK.lock();
	error_explorer::reset();
	let transport = init_memory(AutoCaptureOptions::disabled());

	let id = error_explorer::capture_message("hello", Level::Info, None)
		.unwrap()
		.unwrap();

	assert!(!id.is_empty());
	assert_eq!(transport.send_count(), 1);
	assert_eq!(error_explorer::last_event_id().unwrap(), Some(id));
	error_explorer::reset();
}

#[test]
fn second_init_fails_unless_forced() {
	let _lock = LOCK.lock();
	error_explorer::reset();
	let first = init_memory(AutoCaptureOptions::disabled());

	let second = Arc::new(MemoryTransport::new());
	let result =
		error_explorer::init_with(ClientBuilder::new(options()).transport(second.clone()));
	assert!(matches!(result, Err(ExplorerError::AlreadyInitialized)));

	error_explorer::init_with(
		ClientBuilder::new(options())
			.transport(second.clone())
			.force_reinit(true),
	)
	.unwrap();
	assert!(first.is_shut_down());

	error_explorer::capture_message("to the new client", Level::Info, None).unwrap();
	assert_eq!(first.send_count(), 0);
	assert_eq!(second.send_count(), 1);
	error_explorer::reset();
}

#[test]
fn reset_twice_then_init_again() {
	let _lock = LOCK.lock();
	error_explorer::reset();
	init_memory(AutoCaptureOptions::disabled());

	error_explorer::reset();
	error_explorer::reset();

	let transport = init_memory(AutoCaptureOptions::disabled());
	assert!(error_explorer::is_initialized());
	error_explorer::capture_message("again", Level::Info, None).unwrap();
	assert_eq!(transport.send_count(), 1);
	error_explorer::reset();
}

#[test]
fn reset_discards_global_context() {
	let _lock = LOCK.lock();
	error_explorer::reset();
	init_memory(AutoCaptureOptions::disabled());
	error_explorer::set_tag("stale", "yes").unwrap();
	error_explorer::set_user(User::with_id("7")).unwrap();

	error_explorer::reset();
	let transport = init_memory(AutoCaptureOptions::disabled());
	error_explorer::capture_message("fresh", Level::Info, None).unwrap();

	let event = &transport.events()[0];
	assert!(event.tags.is_empty());
	assert!(event.user.is_none());
	error_explorer::reset();
}

#[test]
fn closed_client_stays_installed_and_silent() {
	let _lock = LOCK.lock();
	error_explorer::reset();
	let transport = init_memory(AutoCaptureOptions::disabled());

	assert!(error_explorer::close(Some(Duration::from_millis(50))).unwrap());
	assert_eq!(
		error_explorer::capture_message("late", Level::Info, None).unwrap(),
		None
	);
	assert_eq!(transport.send_count(), 0);
	assert!(matches!(
		error_explorer::init(options()),
		Err(ExplorerError::AlreadyInitialized)
	));
	error_explorer::reset();
}

#[test]
fn global_scope_push_does_not_leak() {
	let _lock = LOCK.lock();
	error_explorer::reset();
	let transport = init_memory(AutoCaptureOptions::disabled());
	error_explorer::set_tags([("a", "1")]).unwrap();

	error_explorer::with_scope(|scope| {
		scope.set_tag("a", "2");
		error_explorer::capture_message("inside", Level::Info, None).unwrap();
	})
	.unwrap();
	error_explorer::capture_message("outside", Level::Info, None).unwrap();

	let events = transport.events();
	assert_eq!(events[0].tags.get("a").map(String::as_str), Some("2"));
	assert_eq!(events[1].tags.get("a").map(String::as_str), Some("1"));
	error_explorer::reset();
}

#[test]
fn thread_panic_is_reported_by_hook() {
	let _lock = LOCK.lock();
	error_explorer::reset();
	let transport = init_memory(AutoCaptureOptions::default());

	let handle = std::thread::Builder::new()
		.name("worker".to_string())
		.spawn(|| panic!("worker exploded"))
		.unwrap();
	assert!(handle.join().is_err());

	let events = transport.events();
	assert_eq!(events.len(), 1);
	let event = &events[0];
	assert_eq!(event.level, Level::Critical);
	assert_eq!(event.exception[0].exception_type, "panic");
	assert_eq!(event.exception[0].value, "worker exploded");
	assert_eq!(event.tags.get("thread").map(String::as_str), Some("worker"));
	assert!(event.tags.contains_key("panic.location"));
	error_explorer::reset();
}

#[test]
fn thread_panic_ignored_when_toggle_off() {
	let _lock = LOCK.lock();
	error_explorer::reset();
	let transport = init_memory(AutoCaptureOptions {
		unhandled_threads: false,
		..AutoCaptureOptions::default()
	});

	let handle = std::thread::Builder::new()
		.name("worker".to_string())
		.spawn(|| panic!("not reported"))
		.unwrap();
	assert!(handle.join().is_err());

	assert_eq!(transport.send_count(), 0);
	error_explorer::reset();
}

#[test]
fn panic_after_reset_is_not_reported() {
	let _lock = LOCK.lock();
	error_explorer::reset();
	let transport = init_memory(AutoCaptureOptions::default());
	error_explorer::reset();

	let handle = std::thread::spawn(|| panic!("after reset"));
	assert!(handle.join().is_err());

	assert_eq!(transport.send_count(), 0);
}

async fn collector() -> MockServer {
	let server = MockServer::start().await;
	Mock::given(method("POST"))
		.and(path("/api/v1/webhook"))
		.respond_with(
			ResponseTemplate::new(200).set_body_json(serde_json::json!({ "event_id": "srv-1" })),
		)
		.mount(&server)
		.await;
	server
}

fn http_options(server: &MockServer, mode: TransportMode) -> Options {
	Options::builder("t", "p")
		.endpoint(format!("{}/api/v1/webhook", server.uri()))
		.auto_capture(AutoCaptureOptions::disabled())
		.transport_mode(mode)
		.build()
		.unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn init_inside_runtime_with_async_http_transport() {
	let server = collector().await;
	let _lock = LOCK.lock();
	error_explorer::reset();

	error_explorer::init(http_options(&server, TransportMode::Async)).unwrap();
	let id = error_explorer::capture_message("from a runtime", Level::Info, None).unwrap();

	assert!(id.is_some());
	assert!(error_explorer::flush(Duration::from_secs(5)).unwrap());
	error_explorer::reset();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn init_inside_runtime_with_sync_http_transport() {
	let server = collector().await;
	let _lock = LOCK.lock();
	error_explorer::reset();

	error_explorer::init(http_options(&server, TransportMode::Sync)).unwrap();
	let id = error_explorer::capture_message("from a runtime", Level::Info, None).unwrap();

	assert_eq!(id.as_deref(), Some("srv-1"));
	error_explorer::reset();
}
