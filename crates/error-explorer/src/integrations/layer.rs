// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Tracing layer that turns log events into breadcrumbs and error events.

use std::fmt;

use error_explorer_core::{Breadcrumb, BreadcrumbType, CaptureContext, Level};
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::Context;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::Layer;

use crate::client::{is_capturing, Client};

/// Target prefix of the SDK's own log events, which are never reported.
const SDK_TARGET_PREFIX: &str = "error_explorer";

/// A tracing Layer reporting log events to Error Explorer.
///
/// `ERROR` events are captured as messages, `WARN` and `INFO` events are
/// recorded as breadcrumbs on the current scope, and everything below is
/// ignored. Nothing is recorded unless the client enables
/// `auto_capture.logging`.
///
/// ```ignore
/// use tracing_subscriber::layer::SubscriberExt;
///
/// let subscriber = tracing_subscriber::registry()
///     .with(tracing_subscriber::fmt::layer())
///     .with(error_explorer::ExplorerLayer::new());
/// tracing::subscriber::set_global_default(subscriber)?;
/// ```
#[derive(Clone, Default)]
pub struct ExplorerLayer {
	client: Option<Client>,
}

impl ExplorerLayer {
	/// Report to whichever client `init` installed.
	pub fn new() -> Self {
		Self { client: None }
	}

	/// Report to `client` regardless of the global one.
	pub fn for_client(client: Client) -> Self {
		Self {
			client: Some(client),
		}
	}

	fn target_client(&self) -> Option<Client> {
		match &self.client {
			Some(client) => Some(client.clone()),
			None => super::attached(),
		}
	}
}

impl<S> Layer<S> for ExplorerLayer
where
	S: Subscriber + for<'a> LookupSpan<'a>,
{
	fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
		let metadata = event.metadata();
		let target = metadata.target();
		if target.starts_with(SDK_TARGET_PREFIX) || is_capturing() {
			return;
		}

		let level = *metadata.level();
		if level > tracing::Level::INFO {
			return;
		}

		let Some(client) = self.target_client() else {
			return;
		};
		if !client.options().auto_capture.logging || client.is_closed() {
			return;
		}

		let mut visitor = FieldVisitor::default();
		event.record(&mut visitor);
		let message = visitor.message.unwrap_or_default();

		if level == tracing::Level::ERROR {
			let mut context = CaptureContext::new().tag("logger", target);
			for (key, value) in visitor.fields {
				context = context.extra(key, value);
			}
			client.capture_message(message, Level::Error, Some(context));
		} else {
			let crumb_level = if level == tracing::Level::WARN {
				Level::Warning
			} else {
				Level::Info
			};
			let mut breadcrumb = Breadcrumb::new(message)
				.category("log")
				.kind(BreadcrumbType::Default)
				.level(crumb_level)
				.data("logger", target);
			for (key, value) in visitor.fields {
				breadcrumb = breadcrumb.data(key, value);
			}
			client.add_breadcrumb_to_current_scope(breadcrumb);
		}
	}
}

#[derive(Default)]
struct FieldVisitor {
	message: Option<String>,
	fields: Vec<(String, serde_json::Value)>,
}

impl FieldVisitor {
	fn push(&mut self, field: &Field, value: serde_json::Value) {
		self.fields.push((field.name().to_string(), value));
	}
}

impl Visit for FieldVisitor {
	fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
		let rendered = format!("{value:?}");
		if field.name() == "message" {
			self.message = Some(rendered);
		} else {
			self.push(field, serde_json::Value::String(rendered));
		}
	}

	fn record_str(&mut self, field: &Field, value: &str) {
		if field.name() == "message" {
			self.message = Some(value.to_string());
		} else {
			self.push(field, serde_json::Value::String(value.to_string()));
		}
	}

	fn record_i64(&mut self, field: &Field, value: i64) {
		self.push(field, value.into());
	}

	fn record_u64(&mut self, field: &Field, value: u64) {
		self.push(field, value.into());
	}

	fn record_bool(&mut self, field: &Field, value: bool) {
		self.push(field, value.into());
	}

	fn record_f64(&mut self, field: &Field, value: f64) {
		self.push(field, value.into());
	}

	fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
		self.push(field, serde_json::Value::String(value.to_string()));
	}
}
