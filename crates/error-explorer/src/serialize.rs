// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Serialization boundary between the client and transports.

use error_explorer_core::{Event, EventId};

/// An event encoded for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerializedEvent {
	pub event_id: EventId,
	pub body: Vec<u8>,
}

impl SerializedEvent {
	/// Decode the payload back into an event.
	pub fn to_event(&self) -> serde_json::Result<Event> {
		serde_json::from_slice(&self.body)
	}
}

/// Encode an event as the JSON payload the collector accepts.
pub fn serialize_event(event: &Event) -> serde_json::Result<SerializedEvent> {
	Ok(SerializedEvent {
		event_id: event.event_id,
		body: serde_json::to_vec(event)?,
	})
}
