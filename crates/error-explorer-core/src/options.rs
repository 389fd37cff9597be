// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Validated client options.

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;
use url::Url;

use crate::config::{AutoCaptureLayer, OptionsLayer};
use crate::error::ConfigError;

/// Collector endpoint used when none is configured.
pub const DEFAULT_ENDPOINT: &str = "https://error-explorer.com/api/v1/webhook";
/// Default breadcrumb ring capacity.
pub const DEFAULT_MAX_BREADCRUMBS: usize = 100;
/// Upper bound accepted for `max_breadcrumbs`.
pub const MAX_BREADCRUMBS_LIMIT: usize = 1000;

/// Which automatic capture hooks `init` installs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AutoCaptureOptions {
	/// Report panics on the main thread.
	pub uncaught_exceptions: bool,
	/// Report panics on every other thread.
	pub unhandled_threads: bool,
	/// Turn `tracing` events into events and breadcrumbs.
	pub logging: bool,
}

impl AutoCaptureOptions {
	pub fn disabled() -> Self {
		Self {
			uncaught_exceptions: false,
			unhandled_threads: false,
			logging: false,
		}
	}
}

impl Default for AutoCaptureOptions {
	fn default() -> Self {
		Self {
			uncaught_exceptions: true,
			unhandled_threads: true,
			logging: true,
		}
	}
}

/// Whether `send` blocks on network I/O.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportMode {
	/// Queue events for a background worker.
	#[default]
	Async,
	/// Deliver on the caller's thread.
	Sync,
}

impl FromStr for TransportMode {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_ascii_lowercase().as_str() {
			"async" => Ok(Self::Async),
			"sync" => Ok(Self::Sync),
			other => Err(ConfigError::InvalidValue {
				key: "transport_mode".to_string(),
				message: format!("expected 'async' or 'sync', got '{other}'"),
			}),
		}
	}
}

/// Fully resolved and validated client options.
///
/// Construct with [`Options::builder`], [`Options::load`] or
/// [`OptionsLayer::finalize`]; all three run [`Options::validate`].
#[derive(Clone)]
pub struct Options {
	pub token: String,
	pub project: String,
	pub environment: String,
	pub release: Option<String>,
	pub endpoint: Url,
	/// Request signing key, used by the HTTP transport.
	pub hmac_secret: Option<String>,
	pub debug: bool,
	pub send_default_pii: bool,
	pub server_name: Option<String>,
	pub max_breadcrumbs: usize,
	pub auto_capture: AutoCaptureOptions,
	pub transport_mode: TransportMode,
	pub request_timeout: Duration,
	/// Bound for `close()` and the panic hook flush.
	pub shutdown_timeout: Duration,
	/// Pending events the async transport holds before rejecting new ones.
	pub queue_capacity: usize,
}

impl Options {
	pub fn builder(token: impl Into<String>, project: impl Into<String>) -> OptionsBuilder {
		OptionsBuilder::new(token, project)
	}

	/// Load options from defaults, an optional TOML file, then environment.
	pub fn load(config_path: Option<&Path>) -> Result<Options, ConfigError> {
		let mut merged = OptionsLayer::default();
		if let Some(path) = config_path {
			merged.merge(OptionsLayer::from_toml_file(path)?);
		}
		merged.merge(OptionsLayer::from_env()?);
		merged.finalize()
	}

	/// Check invariants that public field access could have broken.
	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.token.trim().is_empty() {
			return Err(ConfigError::MissingRequired("token"));
		}
		if self.project.trim().is_empty() {
			return Err(ConfigError::MissingRequired("project"));
		}
		if !matches!(self.endpoint.scheme(), "http" | "https") {
			return Err(ConfigError::InvalidValue {
				key: "endpoint".to_string(),
				message: format!("unsupported scheme '{}'", self.endpoint.scheme()),
			});
		}
		if self.max_breadcrumbs > MAX_BREADCRUMBS_LIMIT {
			return Err(ConfigError::InvalidValue {
				key: "max_breadcrumbs".to_string(),
				message: format!("must be at most {MAX_BREADCRUMBS_LIMIT}"),
			});
		}
		if self.queue_capacity == 0 {
			return Err(ConfigError::InvalidValue {
				key: "queue_capacity".to_string(),
				message: "must be greater than zero".to_string(),
			});
		}
		Ok(())
	}
}

impl fmt::Debug for Options {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Options")
			.field("token", &"[REDACTED]")
			.field("project", &self.project)
			.field("environment", &self.environment)
			.field("release", &self.release)
			.field("endpoint", &self.endpoint.as_str())
			.field("hmac_secret", &self.hmac_secret.as_ref().map(|_| "[REDACTED]"))
			.field("debug", &self.debug)
			.field("send_default_pii", &self.send_default_pii)
			.field("server_name", &self.server_name)
			.field("max_breadcrumbs", &self.max_breadcrumbs)
			.field("auto_capture", &self.auto_capture)
			.field("transport_mode", &self.transport_mode)
			.field("request_timeout", &self.request_timeout)
			.field("shutdown_timeout", &self.shutdown_timeout)
			.field("queue_capacity", &self.queue_capacity)
			.finish()
	}
}

/// Programmatic construction of [`Options`].
#[derive(Debug, Clone)]
pub struct OptionsBuilder {
	layer: OptionsLayer,
}

impl OptionsBuilder {
	pub fn new(token: impl Into<String>, project: impl Into<String>) -> Self {
		Self {
			layer: OptionsLayer {
				token: Some(token.into()),
				project: Some(project.into()),
				..Default::default()
			},
		}
	}

	/// Example: `production`, `staging`, `development`
	pub fn environment(mut self, environment: impl Into<String>) -> Self {
		self.layer.environment = Some(environment.into());
		self
	}

	/// Example: `1.2.3` or a git commit SHA
	pub fn release(mut self, release: impl Into<String>) -> Self {
		self.layer.release = Some(release.into());
		self
	}

	pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
		self.layer.endpoint = Some(endpoint.into());
		self
	}

	pub fn hmac_secret(mut self, secret: impl Into<String>) -> Self {
		self.layer.hmac_secret = Some(secret.into());
		self
	}

	pub fn debug(mut self, debug: bool) -> Self {
		self.layer.debug = Some(debug);
		self
	}

	pub fn send_default_pii(mut self, send: bool) -> Self {
		self.layer.send_default_pii = Some(send);
		self
	}

	pub fn server_name(mut self, name: impl Into<String>) -> Self {
		self.layer.server_name = Some(name.into());
		self
	}

	pub fn max_breadcrumbs(mut self, max: usize) -> Self {
		self.layer.max_breadcrumbs = Some(max);
		self
	}

	pub fn auto_capture(mut self, auto_capture: AutoCaptureOptions) -> Self {
		self.layer.auto_capture = Some(AutoCaptureLayer {
			uncaught_exceptions: Some(auto_capture.uncaught_exceptions),
			unhandled_threads: Some(auto_capture.unhandled_threads),
			logging: Some(auto_capture.logging),
		});
		self
	}

	pub fn transport_mode(mut self, mode: TransportMode) -> Self {
		self.layer.transport_mode = Some(mode);
		self
	}

	pub fn request_timeout(mut self, timeout: Duration) -> Self {
		self.layer.request_timeout_ms = Some(duration_ms(timeout));
		self
	}

	pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
		self.layer.shutdown_timeout_ms = Some(duration_ms(timeout));
		self
	}

	pub fn queue_capacity(mut self, capacity: usize) -> Self {
		self.layer.queue_capacity = Some(capacity);
		self
	}

	pub fn build(self) -> Result<Options, ConfigError> {
		self.layer.finalize()
	}
}

fn duration_ms(d: Duration) -> u64 {
	u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn builder_applies_defaults() {
		let options = Options::builder("t", "p").build().unwrap();

		assert_eq!(options.environment, "production");
		assert_eq!(options.endpoint.as_str(), DEFAULT_ENDPOINT);
		assert_eq!(options.max_breadcrumbs, DEFAULT_MAX_BREADCRUMBS);
		assert!(!options.debug);
		assert!(!options.send_default_pii);
		assert_eq!(options.auto_capture, AutoCaptureOptions::default());
		assert_eq!(options.transport_mode, TransportMode::Async);
		assert_eq!(options.shutdown_timeout, Duration::from_secs(2));
	}

	#[test]
	fn builder_requires_token() {
		let result = Options::builder("  ", "p").build();
		assert!(matches!(result, Err(ConfigError::MissingRequired("token"))));
	}

	#[test]
	fn builder_requires_project() {
		let result = Options::builder("t", "").build();
		assert!(matches!(result, Err(ConfigError::MissingRequired("project"))));
	}

	#[test]
	fn rejects_non_http_endpoint() {
		let result = Options::builder("t", "p").endpoint("ftp://example.com").build();
		assert!(matches!(result, Err(ConfigError::InvalidValue { key, .. }) if key == "endpoint"));
	}

	#[test]
	fn rejects_relative_endpoint() {
		let result = Options::builder("t", "p").endpoint("/api/v1/webhook").build();
		assert!(matches!(result, Err(ConfigError::InvalidValue { key, .. }) if key == "endpoint"));
	}

	#[test]
	fn rejects_oversized_breadcrumb_ring() {
		let result = Options::builder("t", "p").max_breadcrumbs(5000).build();
		assert!(matches!(result, Err(ConfigError::InvalidValue { key, .. }) if key == "max_breadcrumbs"));
	}

	#[test]
	fn validate_catches_field_edits() {
		let mut options = Options::builder("t", "p").build().unwrap();
		options.token.clear();
		assert!(matches!(options.validate(), Err(ConfigError::MissingRequired("token"))));
	}

	#[test]
	fn debug_output_redacts_secrets() {
		let options = Options::builder("secret_token", "p")
			.hmac_secret("secret_hmac")
			.build()
			.unwrap();
		let rendered = format!("{options:?}");
		assert!(!rendered.contains("secret_token"));
		assert!(!rendered.contains("secret_hmac"));
		assert!(rendered.contains("[REDACTED]"));
	}

	#[test]
	fn transport_mode_parses_case_insensitively() {
		assert_eq!("SYNC".parse::<TransportMode>().unwrap(), TransportMode::Sync);
		assert!("later".parse::<TransportMode>().is_err());
	}
}
