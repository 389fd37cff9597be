// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! HTTP delivery to the collector endpoint.
//!
//! All network I/O happens on one dedicated delivery thread, which also
//! builds and drops the blocking HTTP client. Callers only touch channels,
//! so the transport can be created and used from inside an async runtime.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender, TrySendError};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use chrono::Utc;
use error_explorer_core::{Options, TransportMode};
use hmac::{Hmac, Mac};
use parking_lot::{Condvar, Mutex};
use reqwest::blocking::Client;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, RETRY_AFTER};
use serde::Deserialize;
use sha2::Sha256;
use tracing::{debug, error, info};
use url::Url;

use super::retry::{retry_blocking, RetryConfig};
use super::Transport;
use crate::error::TransportError;
use crate::serialize::SerializedEvent;

type HmacSha256 = Hmac<Sha256>;

/// Header identifying the SDK.
pub const SDK_HEADER: &str = "X-Error-Explorer-Sdk";
/// Unix timestamp (seconds) the signature covers.
pub const TIMESTAMP_HEADER: &str = "X-Error-Explorer-Timestamp";
/// `sha256=<hex>` HMAC of `<timestamp>.<body>`.
pub const SIGNATURE_HEADER: &str = "X-Error-Explorer-Signature";

const WORKER_THREAD_NAME: &str = "error-explorer-transport";

/// Compute the request signature for a payload.
///
/// Returns the hex-encoded HMAC-SHA256 of `"{timestamp}.{body}"`.
pub fn sign_payload(secret: &[u8], timestamp: i64, body: &[u8]) -> String {
	let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC can take key of any size");
	mac.update(timestamp.to_string().as_bytes());
	mac.update(b".");
	mac.update(body);
	hex::encode(mac.finalize().into_bytes())
}

/// Response body from the collector.
#[derive(Debug, Deserialize)]
struct CollectorResponse {
	#[serde(default)]
	event_id: Option<String>,
}

/// Everything the delivery thread needs to reach the collector.
struct DeliverySettings {
	endpoint: Url,
	token: String,
	hmac_secret: Option<String>,
	retry: RetryConfig,
	request_timeout: Duration,
	debug: bool,
}

type Reply = SyncSender<Result<String, TransportError>>;

struct Job {
	event: SerializedEvent,
	/// Present for synchronous sends, which wait for the outcome.
	reply: Option<Reply>,
}

/// State shared between the transport handle and the delivery thread.
struct Shared {
	pending: Mutex<usize>,
	drained: Condvar,
	shut_down: AtomicBool,
}

impl Shared {
	fn begin(&self) {
		*self.pending.lock() += 1;
	}

	fn complete(&self) {
		let mut pending = self.pending.lock();
		*pending = pending.saturating_sub(1);
		if *pending == 0 {
			self.drained.notify_all();
		}
	}

	fn wait_drained(&self, timeout: Duration) -> bool {
		let deadline = Instant::now() + timeout;
		let mut pending = self.pending.lock();
		while *pending > 0 {
			if self.drained.wait_until(&mut pending, deadline).timed_out() {
				return *pending == 0;
			}
		}
		true
	}
}

/// Lives on the delivery thread only.
struct Delivery {
	client: Client,
	settings: DeliverySettings,
}

impl Delivery {
	fn deliver(&self, event: &SerializedEvent) -> Result<String, TransportError> {
		retry_blocking(&self.settings.retry, || self.post(event))
	}

	fn post(&self, event: &SerializedEvent) -> Result<String, TransportError> {
		let settings = &self.settings;
		let mut request = self
			.client
			.post(settings.endpoint.clone())
			.header(AUTHORIZATION, format!("Bearer {}", settings.token))
			.header(CONTENT_TYPE, "application/json")
			.header(SDK_HEADER, crate::sdk_user_agent())
			.body(event.body.clone());

		if let Some(secret) = &settings.hmac_secret {
			let timestamp = Utc::now().timestamp();
			let signature = sign_payload(secret.as_bytes(), timestamp, &event.body);
			request = request
				.header(TIMESTAMP_HEADER, timestamp.to_string())
				.header(SIGNATURE_HEADER, format!("sha256={signature}"));
		}

		debug!(event_id = %event.event_id, endpoint = %settings.endpoint, "Sending event");
		let response = request.send()?;
		let status = response.status();

		if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
			let retry_after = response
				.headers()
				.get(RETRY_AFTER)
				.and_then(|v| v.to_str().ok())
				.and_then(|s| s.parse().ok());
			return Err(TransportError::RateLimited {
				retry_after_secs: retry_after,
			});
		}

		if !status.is_success() {
			let message = response.text().unwrap_or_default();
			return Err(TransportError::ServerError {
				status: status.as_u16(),
				message,
			});
		}

		let body = response.text().unwrap_or_default();
		let assigned = serde_json::from_str::<CollectorResponse>(&body)
			.ok()
			.and_then(|r| r.event_id)
			.filter(|id| !id.is_empty());

		Ok(assigned.unwrap_or_else(|| event.event_id.to_string()))
	}
}

fn run_worker(
	settings: DeliverySettings,
	shared: Arc<Shared>,
	jobs: Receiver<Job>,
	ready: SyncSender<Result<(), TransportError>>,
) {
	crate::client::mark_thread_as_sdk();

	let client = match Client::builder()
		.user_agent(crate::sdk_user_agent())
		.timeout(settings.request_timeout)
		.build()
	{
		Ok(client) => client,
		Err(e) => {
			let _ = ready.send(Err(e.into()));
			return;
		}
	};
	let _ = ready.send(Ok(()));

	let debug = settings.debug;
	let delivery = Delivery { client, settings };
	for job in jobs {
		let result = delivery.deliver(&job.event);
		shared.complete();
		match job.reply {
			Some(reply) => {
				let _ = reply.send(result);
			}
			None => {
				if let Err(e) = result {
					if debug {
						error!(event_id = %job.event.event_id, error = %e, "Failed to deliver event");
					}
				}
			}
		}
	}
	debug!("Delivery worker stopped");
}

/// Delivers events to the collector over HTTPS.
///
/// In [`TransportMode::Async`] `send` only enqueues and returns the event's
/// own id. In [`TransportMode::Sync`] `send` waits, bounded by the request
/// timeout and retry budget, for the delivery thread to answer and returns
/// the collector's id.
pub struct HttpTransport {
	mode: TransportMode,
	shared: Arc<Shared>,
	jobs: Mutex<Option<SyncSender<Job>>>,
	worker: Mutex<Option<JoinHandle<()>>>,
	sync_wait: Duration,
}

impl HttpTransport {
	pub fn new(options: &Options) -> Result<Self, TransportError> {
		Self::with_retry(options, RetryConfig::default())
	}

	pub fn with_retry(options: &Options, retry: RetryConfig) -> Result<Self, TransportError> {
		let attempts = retry.max_attempts.max(1);
		let sync_wait = options
			.request_timeout
			.saturating_mul(attempts)
			.saturating_add(retry.max_delay.saturating_mul(attempts));

		let settings = DeliverySettings {
			endpoint: options.endpoint.clone(),
			token: options.token.clone(),
			hmac_secret: options.hmac_secret.clone(),
			retry,
			request_timeout: options.request_timeout,
			debug: options.debug,
		};
		let shared = Arc::new(Shared {
			pending: Mutex::new(0),
			drained: Condvar::new(),
			shut_down: AtomicBool::new(false),
		});

		let (jobs_tx, jobs_rx) = mpsc::sync_channel(options.queue_capacity);
		let (ready_tx, ready_rx) = mpsc::sync_channel(1);
		let worker_shared = Arc::clone(&shared);
		let handle = std::thread::Builder::new()
			.name(WORKER_THREAD_NAME.to_string())
			.spawn(move || run_worker(settings, worker_shared, jobs_rx, ready_tx))
			.map_err(|e| TransportError::Rejected(format!("failed to spawn worker: {e}")))?;

		match ready_rx.recv() {
			Ok(Ok(())) => {}
			Ok(Err(e)) => {
				let _ = handle.join();
				return Err(e);
			}
			Err(_) => {
				return Err(TransportError::Rejected(
					"delivery worker exited during startup".to_string(),
				));
			}
		}

		info!(
			endpoint = %options.endpoint,
			mode = ?options.transport_mode,
			signed = options.hmac_secret.is_some(),
			"HTTP transport initialized"
		);

		Ok(Self {
			mode: options.transport_mode,
			shared,
			jobs: Mutex::new(Some(jobs_tx)),
			worker: Mutex::new(Some(handle)),
			sync_wait,
		})
	}

	/// Events accepted but not yet delivered.
	pub fn pending(&self) -> usize {
		*self.shared.pending.lock()
	}

	fn enqueue(&self, job: Job) -> Result<(), TransportError> {
		let Some(jobs) = self.jobs.lock().clone() else {
			return Err(TransportError::Shutdown);
		};

		self.shared.begin();
		match jobs.try_send(job) {
			Ok(()) => Ok(()),
			Err(TrySendError::Full(_)) => {
				self.shared.complete();
				Err(TransportError::QueueFull)
			}
			Err(TrySendError::Disconnected(_)) => {
				self.shared.complete();
				Err(TransportError::Shutdown)
			}
		}
	}
}

impl Transport for HttpTransport {
	fn send(&self, event: SerializedEvent) -> Result<String, TransportError> {
		if self.shared.shut_down.load(Ordering::SeqCst) {
			return Err(TransportError::Shutdown);
		}

		match self.mode {
			TransportMode::Async => {
				let event_id = event.event_id.to_string();
				self.enqueue(Job { event, reply: None })?;
				Ok(event_id)
			}
			TransportMode::Sync => {
				let (reply_tx, reply_rx) = mpsc::sync_channel(1);
				self.enqueue(Job {
					event,
					reply: Some(reply_tx),
				})?;
				match reply_rx.recv_timeout(self.sync_wait) {
					Ok(result) => result,
					Err(RecvTimeoutError::Timeout) => Err(TransportError::Timeout(self.sync_wait)),
					Err(RecvTimeoutError::Disconnected) => Err(TransportError::Shutdown),
				}
			}
		}
	}

	fn flush(&self, timeout: Duration) -> bool {
		self.shared.wait_drained(timeout)
	}

	fn shutdown(&self, timeout: Duration) -> bool {
		self.shared.shut_down.store(true, Ordering::SeqCst);
		let drained = self.flush(timeout);

		self.jobs.lock().take();
		if drained {
			if let Some(handle) = self.worker.lock().take() {
				let _ = handle.join();
			}
		}

		debug!(drained, "HTTP transport shut down");
		drained
	}
}

impl Drop for HttpTransport {
	fn drop(&mut self) {
		self.jobs.lock().take();
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::serialize::serialize_event;
	use error_explorer_core::Event;
	use wiremock::matchers::{header, header_exists, method, path};
	use wiremock::{Mock, MockServer, ResponseTemplate};

	fn options_for(server_uri: &str, mode: TransportMode) -> Options {
		Options::builder("test_token_12345", "test-project")
			.endpoint(format!("{server_uri}/api/v1/webhook"))
			.hmac_secret("shared-secret")
			.transport_mode(mode)
			.build()
			.unwrap()
	}

	fn serialized() -> SerializedEvent {
		serialize_event(&Event::default()).unwrap()
	}

	#[test]
	fn test_sign_payload_is_hex_sha256() {
		let sig = sign_payload(b"secret", 1_700_000_000, b"{}");
		assert_eq!(sig.len(), 64);
		assert!(sig.chars().all(|c| c.is_ascii_hexdigit()));
		assert_ne!(sig, sign_payload(b"secret", 1_700_000_001, b"{}"));
		assert_ne!(sig, sign_payload(b"other", 1_700_000_000, b"{}"));
	}

	#[tokio::test]
	async fn test_construct_and_drop_inside_current_thread_runtime() {
		let options = Options::builder("t", "p")
			.endpoint("http://127.0.0.1:9/api/v1/webhook")
			.build()
			.unwrap();
		let transport = HttpTransport::with_retry(&options, RetryConfig::none()).unwrap();

		let event = serialized();
		let expected = event.event_id.to_string();
		assert_eq!(transport.send(event).unwrap(), expected);
		drop(transport);
	}

	#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
	async fn test_sync_send_returns_collector_id() {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.and(path("/api/v1/webhook"))
			.and(header("authorization", "Bearer test_token_12345"))
			.and(header_exists("x-error-explorer-signature"))
			.and(header_exists("x-error-explorer-timestamp"))
			.respond_with(
				ResponseTemplate::new(200).set_body_json(serde_json::json!({ "event_id": "srv-1" })),
			)
			.expect(1)
			.mount(&server)
			.await;

		let options = options_for(&server.uri(), TransportMode::Sync);
		let transport = HttpTransport::with_retry(&options, RetryConfig::none()).unwrap();

		assert_eq!(transport.send(serialized()).unwrap(), "srv-1");
		assert_eq!(transport.pending(), 0);
	}

	#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
	async fn test_sync_send_surfaces_server_error() {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.respond_with(ResponseTemplate::new(401).set_body_string("bad token"))
			.mount(&server)
			.await;

		let options = options_for(&server.uri(), TransportMode::Sync);
		let transport = HttpTransport::with_retry(&options, RetryConfig::none()).unwrap();

		assert!(matches!(
			transport.send(serialized()),
			Err(TransportError::ServerError { status: 401, .. })
		));
	}

	#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
	async fn test_rate_limit_reads_retry_after() {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "30"))
			.mount(&server)
			.await;

		let options = options_for(&server.uri(), TransportMode::Sync);
		let transport = HttpTransport::with_retry(&options, RetryConfig::none()).unwrap();

		assert!(matches!(
			transport.send(serialized()),
			Err(TransportError::RateLimited {
				retry_after_secs: Some(30)
			})
		));
	}

	#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
	async fn test_async_send_returns_local_id_and_flush_drains() {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.and(path("/api/v1/webhook"))
			.respond_with(ResponseTemplate::new(200))
			.expect(3)
			.mount(&server)
			.await;

		let options = options_for(&server.uri(), TransportMode::Async);
		let transport = HttpTransport::with_retry(&options, RetryConfig::none()).unwrap();

		for _ in 0..3 {
			let event = serialized();
			let local = event.event_id.to_string();
			assert_eq!(transport.send(event).unwrap(), local);
		}
		assert!(transport.flush(Duration::from_secs(5)));
		assert_eq!(transport.pending(), 0);
		assert!(transport.shutdown(Duration::from_secs(1)));
	}

	#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
	async fn test_send_after_shutdown_fails_in_both_modes() {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.respond_with(ResponseTemplate::new(200))
			.expect(0)
			.mount(&server)
			.await;

		for mode in [TransportMode::Async, TransportMode::Sync] {
			let options = options_for(&server.uri(), mode);
			let transport = HttpTransport::with_retry(&options, RetryConfig::none()).unwrap();

			assert!(transport.shutdown(Duration::ZERO));
			assert!(matches!(
				transport.send(serialized()),
				Err(TransportError::Shutdown)
			));
			assert!(transport.shutdown(Duration::ZERO));
		}
	}

	#[test]
	fn test_flush_with_nothing_pending_returns_immediately() {
		let options = Options::builder("t", "p").build().unwrap();
		let transport = HttpTransport::with_retry(&options, RetryConfig::none()).unwrap();

		let started = Instant::now();
		assert!(transport.flush(Duration::ZERO));
		assert!(started.elapsed() < Duration::from_millis(100));
	}
}
