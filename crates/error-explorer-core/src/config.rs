// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Layered option loading: defaults, TOML file, environment.
//!
//! Each source produces an [`OptionsLayer`] where every field is optional.
//! Layers are merged (later wins per field) and then finalized into
//! validated [`Options`].
//!
//! Environment convention: `ERROR_EXPLORER_<FIELD>`, with auto-capture
//! toggles under `ERROR_EXPLORER_AUTO_CAPTURE_<FIELD>`.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, trace};
use url::Url;

use crate::error::ConfigError;
use crate::options::{
	AutoCaptureOptions, Options, TransportMode, DEFAULT_ENDPOINT, DEFAULT_MAX_BREADCRUMBS,
};

const DEFAULT_ENVIRONMENT: &str = "production";
const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;
const DEFAULT_SHUTDOWN_TIMEOUT_MS: u64 = 2_000;
const DEFAULT_QUEUE_CAPACITY: usize = 100;

/// Client options layer - all fields are Option for merging.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OptionsLayer {
	pub token: Option<String>,
	pub project: Option<String>,
	pub environment: Option<String>,
	pub release: Option<String>,
	pub endpoint: Option<String>,
	pub hmac_secret: Option<String>,
	pub debug: Option<bool>,
	pub send_default_pii: Option<bool>,
	pub server_name: Option<String>,
	pub max_breadcrumbs: Option<usize>,
	pub auto_capture: Option<AutoCaptureLayer>,
	pub transport_mode: Option<TransportMode>,
	pub request_timeout_ms: Option<u64>,
	pub shutdown_timeout_ms: Option<u64>,
	pub queue_capacity: Option<usize>,
}

/// `[auto_capture]` table.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AutoCaptureLayer {
	pub uncaught_exceptions: Option<bool>,
	pub unhandled_threads: Option<bool>,
	pub logging: Option<bool>,
}

impl AutoCaptureLayer {
	fn merge(&mut self, other: AutoCaptureLayer) {
		merge_value(&mut self.uncaught_exceptions, other.uncaught_exceptions);
		merge_value(&mut self.unhandled_threads, other.unhandled_threads);
		merge_value(&mut self.logging, other.logging);
	}

	fn finalize(self) -> AutoCaptureOptions {
		let defaults = AutoCaptureOptions::default();
		AutoCaptureOptions {
			uncaught_exceptions: self.uncaught_exceptions.unwrap_or(defaults.uncaught_exceptions),
			unhandled_threads: self.unhandled_threads.unwrap_or(defaults.unhandled_threads),
			logging: self.logging.unwrap_or(defaults.logging),
		}
	}

	fn is_empty(&self) -> bool {
		self.uncaught_exceptions.is_none() && self.unhandled_threads.is_none() && self.logging.is_none()
	}
}

impl OptionsLayer {
	/// Merge another layer into this one. Other layer takes precedence.
	pub fn merge(&mut self, other: OptionsLayer) {
		merge_value(&mut self.token, other.token);
		merge_value(&mut self.project, other.project);
		merge_value(&mut self.environment, other.environment);
		merge_value(&mut self.release, other.release);
		merge_value(&mut self.endpoint, other.endpoint);
		merge_value(&mut self.hmac_secret, other.hmac_secret);
		merge_value(&mut self.debug, other.debug);
		merge_value(&mut self.send_default_pii, other.send_default_pii);
		merge_value(&mut self.server_name, other.server_name);
		merge_value(&mut self.max_breadcrumbs, other.max_breadcrumbs);
		if let Some(incoming) = other.auto_capture {
			self
				.auto_capture
				.get_or_insert_with(AutoCaptureLayer::default)
				.merge(incoming);
		}
		merge_value(&mut self.transport_mode, other.transport_mode);
		merge_value(&mut self.request_timeout_ms, other.request_timeout_ms);
		merge_value(&mut self.shutdown_timeout_ms, other.shutdown_timeout_ms);
		merge_value(&mut self.queue_capacity, other.queue_capacity);
	}

	pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
		toml::from_str(content).map_err(|e| ConfigError::TomlParse {
			path: Default::default(),
			source: e,
		})
	}

	pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
		let path = path.as_ref();
		debug!(path = %path.display(), "loading config file");
		let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
			path: path.to_path_buf(),
			source: e,
		})?;

		let layer = toml::from_str(&content).map_err(|e| ConfigError::TomlParse {
			path: path.to_path_buf(),
			source: e,
		})?;

		trace!("parsed options layer from TOML");
		Ok(layer)
	}

	pub fn from_env() -> Result<Self, ConfigError> {
		Self::from_lookup(|name| std::env::var(name).ok())
	}

	/// Build a layer from an arbitrary variable lookup.
	pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
	where
		F: Fn(&str) -> Option<String>,
	{
		debug!("loading environment variables");
		let var = |name: &str| lookup(name).filter(|s| !s.is_empty());
		let flag = |name: &str| var(name).map(|v| v.eq_ignore_ascii_case("true") || v == "1");

		let auto_capture = AutoCaptureLayer {
			uncaught_exceptions: flag("ERROR_EXPLORER_AUTO_CAPTURE_UNCAUGHT_EXCEPTIONS"),
			unhandled_threads: flag("ERROR_EXPLORER_AUTO_CAPTURE_UNHANDLED_THREADS"),
			logging: flag("ERROR_EXPLORER_AUTO_CAPTURE_LOGGING"),
		};

		Ok(Self {
			token: var("ERROR_EXPLORER_TOKEN"),
			project: var("ERROR_EXPLORER_PROJECT"),
			environment: var("ERROR_EXPLORER_ENVIRONMENT"),
			release: var("ERROR_EXPLORER_RELEASE"),
			endpoint: var("ERROR_EXPLORER_ENDPOINT"),
			hmac_secret: var("ERROR_EXPLORER_HMAC_SECRET"),
			debug: flag("ERROR_EXPLORER_DEBUG"),
			send_default_pii: flag("ERROR_EXPLORER_SEND_DEFAULT_PII"),
			server_name: var("ERROR_EXPLORER_SERVER_NAME"),
			max_breadcrumbs: parse_var(&var, "ERROR_EXPLORER_MAX_BREADCRUMBS")?,
			auto_capture: (!auto_capture.is_empty()).then_some(auto_capture),
			transport_mode: var("ERROR_EXPLORER_TRANSPORT_MODE")
				.map(|v| v.parse())
				.transpose()?,
			request_timeout_ms: parse_var(&var, "ERROR_EXPLORER_REQUEST_TIMEOUT_MS")?,
			shutdown_timeout_ms: parse_var(&var, "ERROR_EXPLORER_SHUTDOWN_TIMEOUT_MS")?,
			queue_capacity: parse_var(&var, "ERROR_EXPLORER_QUEUE_CAPACITY")?,
		})
	}

	/// Resolve defaults and validate.
	pub fn finalize(self) -> Result<Options, ConfigError> {
		let token = self.token.ok_or(ConfigError::MissingRequired("token"))?;
		let project = self.project.ok_or(ConfigError::MissingRequired("project"))?;

		let endpoint_str = self.endpoint.unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());
		let endpoint = Url::parse(&endpoint_str).map_err(|e| ConfigError::InvalidValue {
			key: "endpoint".to_string(),
			message: format!("'{endpoint_str}': {e}"),
		})?;

		let options = Options {
			token,
			project,
			environment: self
				.environment
				.unwrap_or_else(|| DEFAULT_ENVIRONMENT.to_string()),
			release: self.release,
			endpoint,
			hmac_secret: self.hmac_secret.filter(|s| !s.is_empty()),
			debug: self.debug.unwrap_or(false),
			send_default_pii: self.send_default_pii.unwrap_or(false),
			server_name: self.server_name,
			max_breadcrumbs: self.max_breadcrumbs.unwrap_or(DEFAULT_MAX_BREADCRUMBS),
			auto_capture: self.auto_capture.unwrap_or_default().finalize(),
			transport_mode: self.transport_mode.unwrap_or_default(),
			request_timeout: Duration::from_millis(
				self.request_timeout_ms.unwrap_or(DEFAULT_REQUEST_TIMEOUT_MS),
			),
			shutdown_timeout: Duration::from_millis(
				self.shutdown_timeout_ms.unwrap_or(DEFAULT_SHUTDOWN_TIMEOUT_MS),
			),
			queue_capacity: self.queue_capacity.unwrap_or(DEFAULT_QUEUE_CAPACITY),
		};

		options.validate()?;
		Ok(options)
	}
}

fn merge_value<T>(target: &mut Option<T>, incoming: Option<T>) {
	if incoming.is_some() {
		*target = incoming;
	}
}

fn parse_var<T, F>(var: &F, name: &str) -> Result<Option<T>, ConfigError>
where
	T: std::str::FromStr,
	F: Fn(&str) -> Option<String>,
{
	match var(name) {
		Some(v) => v.parse().map(Some).map_err(|_| ConfigError::InvalidValue {
			key: name.to_string(),
			message: format!("invalid number '{v}'"),
		}),
		None => Ok(None),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::collections::HashMap;
	use std::io::Write;

	fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
		let map: HashMap<String, String> = vars
			.iter()
			.map(|(k, v)| (k.to_string(), v.to_string()))
			.collect();
		move |name| map.get(name).cloned()
	}

	#[test]
	fn toml_layer_parses_nested_auto_capture() {
		let layer = OptionsLayer::from_toml_str(
			r#"
			token = "test_token_12345"
			project = "test-project"
			environment = "test"
			send_default_pii = true

			[auto_capture]
			uncaught_exceptions = false
			logging = false
			"#,
		)
		.unwrap();

		let options = layer.finalize().unwrap();
		assert_eq!(options.environment, "test");
		assert!(options.send_default_pii);
		assert!(!options.auto_capture.uncaught_exceptions);
		assert!(options.auto_capture.unhandled_threads);
		assert!(!options.auto_capture.logging);
	}

	#[test]
	fn toml_rejects_unknown_keys() {
		let result = OptionsLayer::from_toml_str(
			r#"
			token = "t"
			project = "p"
			capture_signals = false
			"#,
		);
		assert!(matches!(result, Err(ConfigError::TomlParse { .. })));
	}

	#[test]
	fn toml_rejects_unknown_auto_capture_keys() {
		let result = OptionsLayer::from_toml_str(
			r#"
			[auto_capture]
			signals = true
			"#,
		);
		assert!(matches!(result, Err(ConfigError::TomlParse { .. })));
	}

	#[test]
	fn missing_token_fails_finalize() {
		let layer = OptionsLayer::from_toml_str("project = \"p\"").unwrap();
		assert!(matches!(layer.finalize(), Err(ConfigError::MissingRequired("token"))));
	}

	#[test]
	fn env_overrides_toml() {
		let mut merged = OptionsLayer::from_toml_str(
			r#"
			token = "file_token"
			project = "file_project"
			release = "1.0.0"
			"#,
		)
		.unwrap();
		merged.merge(
			OptionsLayer::from_lookup(lookup(&[
				("ERROR_EXPLORER_TOKEN", "env_token"),
				("ERROR_EXPLORER_DEBUG", "TRUE"),
				("ERROR_EXPLORER_RELEASE", ""),
			]))
			.unwrap(),
		);

		let options = merged.finalize().unwrap();
		assert_eq!(options.token, "env_token");
		assert_eq!(options.project, "file_project");
		assert_eq!(options.release.as_deref(), Some("1.0.0"));
		assert!(options.debug);
	}

	#[test]
	fn env_auto_capture_merges_per_field() {
		let mut merged = OptionsLayer::from_toml_str(
			r#"
			token = "t"
			project = "p"
			[auto_capture]
			logging = false
			"#,
		)
		.unwrap();
		merged.merge(
			OptionsLayer::from_lookup(lookup(&[(
				"ERROR_EXPLORER_AUTO_CAPTURE_UNHANDLED_THREADS",
				"0",
			)]))
			.unwrap(),
		);

		let auto = merged.finalize().unwrap().auto_capture;
		assert!(auto.uncaught_exceptions);
		assert!(!auto.unhandled_threads);
		assert!(!auto.logging);
	}

	#[test]
	fn env_rejects_bad_numbers() {
		let result = OptionsLayer::from_lookup(lookup(&[("ERROR_EXPLORER_MAX_BREADCRUMBS", "lots")]));
		assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
	}

	#[test]
	fn env_parses_transport_mode() {
		let layer =
			OptionsLayer::from_lookup(lookup(&[("ERROR_EXPLORER_TRANSPORT_MODE", "sync")])).unwrap();
		assert_eq!(layer.transport_mode, Some(TransportMode::Sync));
	}

	#[test]
	fn file_layer_reads_from_disk() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		writeln!(file, "token = \"t\"\nproject = \"p\"\nmax_breadcrumbs = 5").unwrap();

		let options = OptionsLayer::from_toml_file(file.path())
			.unwrap()
			.finalize()
			.unwrap();
		assert_eq!(options.max_breadcrumbs, 5);
	}

	#[test]
	fn missing_file_is_an_error() {
		let result = OptionsLayer::from_toml_file("/nonexistent/error-explorer.toml");
		assert!(matches!(result, Err(ConfigError::FileRead { .. })));
	}

	#[test]
	fn empty_hmac_secret_is_unset() {
		let mut layer = OptionsLayer::from_toml_str("token = \"t\"\nproject = \"p\"").unwrap();
		layer.hmac_secret = Some(String::new());
		assert!(layer.finalize().unwrap().hmac_secret.is_none());
	}
}
