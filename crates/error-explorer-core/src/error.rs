// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for configuration and value parsing.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while building or validating client options.
#[derive(Debug, Error)]
pub enum ConfigError {
	#[error("missing required option: {0}")]
	MissingRequired(&'static str),

	#[error("invalid value for {key}: {message}")]
	InvalidValue { key: String, message: String },

	#[error("failed to parse TOML config at {path}: {source}")]
	TomlParse {
		path: PathBuf,
		#[source]
		source: toml::de::Error,
	},

	#[error("failed to read config file {path}: {source}")]
	FileRead {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},
}

/// Errors raised when parsing enum values from strings.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
	#[error("invalid level: {0}")]
	InvalidLevel(String),

	#[error("invalid breadcrumb type: {0}")]
	InvalidBreadcrumbType(String),
}
