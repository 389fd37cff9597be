// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Event delivery.
//!
//! The client hands every event to a [`Transport`] as an opaque
//! [`SerializedEvent`]. The transport decides how and when it reaches the
//! collector; the client only relies on `send` returning an id and `flush`
//! honouring its timeout.

mod http;
mod memory;
mod retry;

use std::time::Duration;

use crate::error::TransportError;
use crate::serialize::SerializedEvent;

pub use http::{sign_payload, HttpTransport, SDK_HEADER, SIGNATURE_HEADER, TIMESTAMP_HEADER};
pub use memory::MemoryTransport;
pub use retry::{retry_blocking, RetryConfig, RetryableError};

/// Delivery boundary between the client and the collector.
pub trait Transport: Send + Sync {
	/// Accept an event for delivery.
	///
	/// Returns the id the collector assigned, or the event's own id when
	/// delivery happens later.
	fn send(&self, event: SerializedEvent) -> Result<String, TransportError>;

	/// Wait until every event accepted so far has been delivered or
	/// `timeout` elapses. Returns whether everything drained.
	fn flush(&self, timeout: Duration) -> bool;

	/// Flush, then stop accepting events.
	fn shutdown(&self, timeout: Duration) -> bool {
		self.flush(timeout)
	}
}
