// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Event payload types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::breadcrumb::Breadcrumb;
use crate::context::User;
use crate::level::Level;

/// Locally generated identifier for an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventId(pub Uuid);

impl EventId {
	pub fn new() -> Self {
		Self(Uuid::now_v7())
	}
}

impl Default for EventId {
	fn default() -> Self {
		Self::new()
	}
}

impl fmt::Display for EventId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0.simple())
	}
}

impl FromStr for EventId {
	type Err = uuid::Error;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Ok(Self(Uuid::parse_str(s)?))
	}
}

/// SDK identification attached to every event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SdkInfo {
	pub name: String,
	pub version: String,
}

/// One error in an exception chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exception {
	#[serde(rename = "type")]
	pub exception_type: String,
	pub value: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub stacktrace: Option<Stacktrace>,
}

/// Stack trace containing multiple frames, innermost call last.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Stacktrace {
	pub frames: Vec<Frame>,
}

/// A single stack frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Frame {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub function: Option<String>,
	/// Module path of the function
	#[serde(skip_serializing_if = "Option::is_none")]
	pub module: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub filename: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub lineno: Option<u32>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub colno: Option<u32>,
	/// User code vs dependency
	pub in_app: bool,
}

/// A fully merged report, ready for serialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
	pub event_id: EventId,
	pub timestamp: DateTime<Utc>,
	pub level: Level,
	pub platform: String,
	pub project: String,
	pub environment: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub release: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub server_name: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub message: Option<String>,
	/// Outermost error first, followed by its sources.
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub exception: Vec<Exception>,
	#[serde(default)]
	pub tags: HashMap<String, String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub user: Option<User>,
	#[serde(default)]
	pub extra: serde_json::Map<String, serde_json::Value>,
	#[serde(default)]
	pub breadcrumbs: Vec<Breadcrumb>,
	pub sdk: SdkInfo,
}

impl Event {
	/// Message events use the text; exception events use the outermost value.
	pub fn title(&self) -> &str {
		if let Some(first) = self.exception.first() {
			return &first.value;
		}
		self.message.as_deref().unwrap_or_default()
	}
}

impl Default for Event {
	fn default() -> Self {
		Self {
			event_id: EventId::new(),
			timestamp: Utc::now(),
			level: Level::Error,
			platform: "rust".to_string(),
			project: String::new(),
			environment: "production".to_string(),
			release: None,
			server_name: None,
			message: None,
			exception: Vec::new(),
			tags: HashMap::new(),
			user: None,
			extra: serde_json::Map::new(),
			breadcrumbs: Vec::new(),
			sdk: SdkInfo {
				name: String::new(),
				version: String::new(),
			},
		}
	}
}
