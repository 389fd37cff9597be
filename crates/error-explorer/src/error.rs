// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for the reporting SDK.

use error_explorer_core::ConfigError;
use thiserror::Error;

use crate::transport::RetryableError;

/// Result type alias for SDK operations.
pub type Result<T> = std::result::Result<T, ExplorerError>;

/// Errors surfaced to the host application.
///
/// Capture operations never return these; they only come out of lifecycle
/// calls (`init`, singleton access) and explicit transport construction.
#[derive(Debug, Error)]
pub enum ExplorerError {
	/// No client has been initialized, or it was reset.
	#[error("error explorer has not been initialized")]
	NotInitialized,

	/// `init` was called while a client is live and no reinit was requested.
	#[error("error explorer is already initialized")]
	AlreadyInitialized,

	/// Options failed validation.
	#[error("configuration error: {0}")]
	Configuration(#[from] ConfigError),

	/// Transport construction or delivery failed.
	#[error("transport error: {0}")]
	Transport(#[from] TransportError),

	/// Failed to serialize an event.
	#[error("serialization error: {0}")]
	Serialization(#[from] serde_json::Error),

	/// The client has been closed.
	#[error("client has been closed")]
	ClientClosed,
}

/// Failures while handing an event to the collector.
#[derive(Debug, Error)]
pub enum TransportError {
	/// HTTP request failed.
	#[error("HTTP request failed: {0}")]
	RequestFailed(#[from] reqwest::Error),

	/// Collector returned an error.
	#[error("server error (status {status}): {message}")]
	ServerError {
		/// HTTP status code.
		status: u16,
		/// Error message from the collector.
		message: String,
	},

	/// Rate limited by the collector.
	#[error("rate limited, retry after {retry_after_secs:?} seconds")]
	RateLimited {
		/// Optional Retry-After header value.
		retry_after_secs: Option<u64>,
	},

	/// The async delivery queue is full.
	#[error("delivery queue is full")]
	QueueFull,

	/// The transport has been shut down.
	#[error("transport has been shut down")]
	Shutdown,

	/// The collector answered with something unreadable.
	#[error("invalid response: {0}")]
	InvalidResponse(String),

	/// The transport refused the event.
	#[error("event rejected: {0}")]
	Rejected(String),

	/// A synchronous delivery did not finish within its bound.
	#[error("delivery did not complete within {0:?}")]
	Timeout(std::time::Duration),
}

impl RetryableError for TransportError {
	fn is_retryable(&self) -> bool {
		match self {
			TransportError::RequestFailed(e) => e.is_retryable(),
			TransportError::ServerError { status, .. } => {
				matches!(*status, 408 | 429 | 500 | 502 | 503 | 504)
			}
			TransportError::RateLimited { .. } => true,
			_ => false,
		}
	}
}
