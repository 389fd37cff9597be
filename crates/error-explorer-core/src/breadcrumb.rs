// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Breadcrumb types (application events leading up to a report).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ParseError;
use crate::level::Level;

/// A timestamped record of something the application did.
///
/// Breadcrumbs are immutable once they enter a [`BreadcrumbBuffer`]; the
/// buffer assigns `timestamp` if the caller left it empty.
///
/// [`BreadcrumbBuffer`]: crate::BreadcrumbBuffer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Breadcrumb {
	pub message: String,
	/// "http", "navigation", "auth", "log"
	pub category: String,
	#[serde(rename = "type")]
	pub kind: BreadcrumbType,
	pub level: Level,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub timestamp: Option<DateTime<Utc>>,
	#[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
	pub data: serde_json::Map<String, serde_json::Value>,
}

impl Breadcrumb {
	pub fn new(message: impl Into<String>) -> Self {
		Self {
			message: message.into(),
			..Default::default()
		}
	}

	pub fn category(mut self, category: impl Into<String>) -> Self {
		self.category = category.into();
		self
	}

	pub fn kind(mut self, kind: BreadcrumbType) -> Self {
		self.kind = kind;
		self
	}

	pub fn level(mut self, level: Level) -> Self {
		self.level = level;
		self
	}

	pub fn timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
		self.timestamp = Some(timestamp);
		self
	}

	pub fn data(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
		self.data.insert(key.into(), value.into());
		self
	}
}

impl Default for Breadcrumb {
	fn default() -> Self {
		Self {
			message: String::new(),
			category: "default".to_string(),
			kind: BreadcrumbType::Default,
			level: Level::Info,
			timestamp: None,
			data: serde_json::Map::new(),
		}
	}
}

/// Kind of event a breadcrumb records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreadcrumbType {
	#[default]
	Default,
	Debug,
	Error,
	Info,
	Navigation,
	Http,
	Query,
	Transaction,
	Ui,
	User,
}

impl fmt::Display for BreadcrumbType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let s = match self {
			Self::Default => "default",
			Self::Debug => "debug",
			Self::Error => "error",
			Self::Info => "info",
			Self::Navigation => "navigation",
			Self::Http => "http",
			Self::Query => "query",
			Self::Transaction => "transaction",
			Self::Ui => "ui",
			Self::User => "user",
		};
		f.write_str(s)
	}
}

impl FromStr for BreadcrumbType {
	type Err = ParseError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"default" => Ok(Self::Default),
			"debug" => Ok(Self::Debug),
			"error" => Ok(Self::Error),
			"info" => Ok(Self::Info),
			"navigation" => Ok(Self::Navigation),
			"http" => Ok(Self::Http),
			"query" => Ok(Self::Query),
			"transaction" => Ok(Self::Transaction),
			"ui" => Ok(Self::Ui),
			"user" => Ok(Self::User),
			_ => Err(ParseError::InvalidBreadcrumbType(s.to_string())),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;

	proptest! {
		#[test]
		fn breadcrumb_type_roundtrip(kind in prop_oneof![
			Just(BreadcrumbType::Default),
			Just(BreadcrumbType::Debug),
			Just(BreadcrumbType::Error),
			Just(BreadcrumbType::Info),
			Just(BreadcrumbType::Navigation),
			Just(BreadcrumbType::Http),
			Just(BreadcrumbType::Query),
			Just(BreadcrumbType::Transaction),
			Just(BreadcrumbType::Ui),
			Just(BreadcrumbType::User),
		]) {
			let parsed: BreadcrumbType = kind.to_string().parse().unwrap();
			prop_assert_eq!(kind, parsed);
		}
	}

	#[test]
	fn builder_sets_fields() {
		let crumb = Breadcrumb::new("User authenticated")
			.category("auth")
			.kind(BreadcrumbType::User)
			.level(Level::Info)
			.data("provider", "google");

		assert_eq!(crumb.message, "User authenticated");
		assert_eq!(crumb.category, "auth");
		assert_eq!(crumb.kind, BreadcrumbType::User);
		assert_eq!(crumb.data["provider"], "google");
		assert!(crumb.timestamp.is_none());
	}

	#[test]
	fn serializes_kind_as_type() {
		let crumb = Breadcrumb::new("SELECT 1").kind(BreadcrumbType::Query);
		let json = serde_json::to_value(&crumb).unwrap();
		assert_eq!(json["type"], "query");
		assert!(json.get("data").is_none());
	}
}
