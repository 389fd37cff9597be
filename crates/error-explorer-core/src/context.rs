// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! User identity and per-capture context overlays.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::level::Level;

/// Identity of the user affected by an event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub id: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub email: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub username: Option<String>,
	/// IP address (sensitive, stripped with the other PII fields)
	#[serde(skip_serializing_if = "Option::is_none")]
	pub ip_address: Option<String>,
}

impl User {
	pub fn with_id(id: impl Into<String>) -> Self {
		Self {
			id: Some(id.into()),
			..Default::default()
		}
	}

	pub fn email(mut self, email: impl Into<String>) -> Self {
		self.email = Some(email.into());
		self
	}

	pub fn username(mut self, username: impl Into<String>) -> Self {
		self.username = Some(username.into());
		self
	}

	pub fn ip_address(mut self, ip: impl Into<String>) -> Self {
		self.ip_address = Some(ip.into());
		self
	}

	/// A user without an id cannot be attributed server-side.
	pub fn is_identified(&self) -> bool {
		self.id.as_deref().is_some_and(|id| !id.is_empty())
	}

	/// Returns a copy that keeps only the id.
	pub fn without_pii(&self) -> Self {
		Self {
			id: self.id.clone(),
			..Default::default()
		}
	}
}

/// Tags, extra data and user supplied for a single capture only.
///
/// The overlay applies on top of the merged scope chain for one event and is
/// never stored.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CaptureContext {
	pub tags: HashMap<String, String>,
	pub extra: serde_json::Map<String, serde_json::Value>,
	pub user: Option<User>,
	pub level: Option<Level>,
}

impl CaptureContext {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
		self.tags.insert(key.into(), value.into());
		self
	}

	pub fn extra(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
		self.extra.insert(key.into(), value.into());
		self
	}

	pub fn user(mut self, user: User) -> Self {
		self.user = Some(user);
		self
	}

	pub fn level(mut self, level: Level) -> Self {
		self.level = Some(level);
		self
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn without_pii_keeps_only_id() {
		let user = User::with_id("12345")
			.email("developer@example.com")
			.username("dev_user")
			.ip_address("10.0.0.1");

		let stripped = user.without_pii();
		assert_eq!(stripped.id.as_deref(), Some("12345"));
		assert!(stripped.email.is_none());
		assert!(stripped.username.is_none());
		assert!(stripped.ip_address.is_none());
	}

	#[test]
	fn identified_requires_non_empty_id() {
		assert!(User::with_id("1").is_identified());
		assert!(!User::with_id("").is_identified());
		assert!(!User::default().email("a@b.c").is_identified());
	}

	#[test]
	fn capture_context_builder() {
		let ctx = CaptureContext::new()
			.tag("checkpoint", "main_flow")
			.extra("elapsed_time", "5s")
			.level(Level::Warning);

		assert_eq!(ctx.tags["checkpoint"], "main_flow");
		assert_eq!(ctx.extra["elapsed_time"], "5s");
		assert_eq!(ctx.level, Some(Level::Warning));
		assert!(ctx.user.is_none());
	}
}
