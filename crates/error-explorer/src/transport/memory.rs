// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! In-memory transport for tests and local demos.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use error_explorer_core::Event;
use parking_lot::Mutex;

use super::Transport;
use crate::error::TransportError;
use crate::serialize::SerializedEvent;

/// Records every event it is handed instead of delivering it.
#[derive(Debug, Default)]
pub struct MemoryTransport {
	sent: Mutex<Vec<SerializedEvent>>,
	response_id: Mutex<Option<String>>,
	failing: AtomicBool,
	send_calls: AtomicUsize,
	flush_calls: AtomicUsize,
	shut_down: AtomicBool,
}

impl MemoryTransport {
	pub fn new() -> Self {
		Self::default()
	}

	/// Answer every send with a fixed id, like a collector would.
	pub fn with_event_id(id: impl Into<String>) -> Self {
		let transport = Self::default();
		*transport.response_id.lock() = Some(id.into());
		transport
	}

	/// Make subsequent sends fail.
	pub fn set_failing(&self, failing: bool) {
		self.failing.store(failing, Ordering::SeqCst);
	}

	pub fn sent(&self) -> Vec<SerializedEvent> {
		self.sent.lock().clone()
	}

	/// Recorded events, decoded.
	pub fn events(&self) -> Vec<Event> {
		self
			.sent
			.lock()
			.iter()
			.filter_map(|e| e.to_event().ok())
			.collect()
	}

	pub fn send_count(&self) -> usize {
		self.send_calls.load(Ordering::SeqCst)
	}

	pub fn flush_count(&self) -> usize {
		self.flush_calls.load(Ordering::SeqCst)
	}

	pub fn is_shut_down(&self) -> bool {
		self.shut_down.load(Ordering::SeqCst)
	}

	pub fn clear(&self) {
		self.sent.lock().clear();
	}
}

impl Transport for MemoryTransport {
	fn send(&self, event: SerializedEvent) -> Result<String, TransportError> {
		self.send_calls.fetch_add(1, Ordering::SeqCst);

		if self.failing.load(Ordering::SeqCst) {
			return Err(TransportError::Rejected("memory transport set to fail".to_string()));
		}

		let id = self
			.response_id
			.lock()
			.clone()
			.unwrap_or_else(|| event.event_id.to_string());
		self.sent.lock().push(event);
		Ok(id)
	}

	fn flush(&self, _timeout: Duration) -> bool {
		self.flush_calls.fetch_add(1, Ordering::SeqCst);
		true
	}

	fn shutdown(&self, timeout: Duration) -> bool {
		self.shut_down.store(true, Ordering::SeqCst);
		self.flush(timeout)
	}
}
