// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Process-wide client.
//!
//! The free functions here forward to the client installed by [`init`].
//! They fail with [`ExplorerError::NotInitialized`] before `init` and after
//! [`reset`]; the capture functions otherwise keep the client's never-fail
//! contract and return `Ok(None)` when an event could not be sent.

use std::error::Error;
use std::time::Duration;

use error_explorer_core::{Breadcrumb, CaptureContext, Event, Level, Options, User};
use parking_lot::RwLock;
use tracing::info;

use crate::client::{Client, ClientBuilder};
use crate::error::{ExplorerError, Result};
use crate::integrations;
use crate::scope::ScopeGuard;

static CURRENT: RwLock<Option<Client>> = parking_lot::const_rwlock(None);

/// Initialize the global client with the HTTP transport.
pub fn init(options: Options) -> Result<Client> {
	init_with(ClientBuilder::new(options))
}

/// Initialize the global client from a configured builder.
///
/// Fails with [`ExplorerError::AlreadyInitialized`] while a client is
/// installed, unless the builder enables `force_reinit`, in which case the
/// old client is torn down first.
pub fn init_with(builder: ClientBuilder) -> Result<Client> {
	let mut current = CURRENT.write();
	if current.is_some() && !builder.is_force_reinit() {
		return Err(ExplorerError::AlreadyInitialized);
	}

	let client = builder.build()?;
	if let Some(previous) = current.take() {
		integrations::detach(previous.id());
		previous.teardown();
	}
	integrations::attach(&client);
	*current = Some(client.clone());

	info!(client_id = client.id(), "Global error explorer client installed");
	Ok(client)
}

/// Tear down the global client. Calling it without a client is a no-op.
pub fn reset() {
	let previous = CURRENT.write().take();
	if let Some(client) = previous {
		integrations::detach(client.id());
		client.teardown();
		info!(client_id = client.id(), "Global error explorer client reset");
	}
}

/// The installed client.
pub fn get() -> Result<Client> {
	CURRENT.read().clone().ok_or(ExplorerError::NotInitialized)
}

pub fn is_initialized() -> bool {
	CURRENT.read().is_some()
}

pub fn capture_exception<E>(error: &E, context: Option<CaptureContext>) -> Result<Option<String>>
where
	E: Error + ?Sized + 'static,
{
	Ok(get()?.capture_exception(error, context))
}

pub fn capture_message(
	message: impl Into<String>,
	level: Level,
	context: Option<CaptureContext>,
) -> Result<Option<String>> {
	Ok(get()?.capture_message(message, level, context))
}

pub fn capture_event(event: Event, context: Option<CaptureContext>) -> Result<Option<String>> {
	Ok(get()?.capture_event(event, context))
}

pub fn push_scope() -> Result<ScopeGuard> {
	Ok(get()?.push_scope())
}

pub fn with_scope<R>(f: impl FnOnce(&ScopeGuard) -> R) -> Result<R> {
	Ok(get()?.with_scope(f))
}

pub fn set_user(user: User) -> Result<()> {
	get()?.set_user(user);
	Ok(())
}

pub fn set_tag(key: impl Into<String>, value: impl Into<String>) -> Result<()> {
	get()?.set_tag(key, value);
	Ok(())
}

pub fn set_tags<I, K, V>(tags: I) -> Result<()>
where
	I: IntoIterator<Item = (K, V)>,
	K: Into<String>,
	V: Into<String>,
{
	get()?.set_tags(tags);
	Ok(())
}

pub fn set_extra(key: impl Into<String>, value: serde_json::Value) -> Result<()> {
	get()?.set_extra(key, value);
	Ok(())
}

pub fn add_breadcrumb(breadcrumb: Breadcrumb) -> Result<()> {
	get()?.add_breadcrumb(breadcrumb);
	Ok(())
}

pub fn flush(timeout: Duration) -> Result<bool> {
	Ok(get()?.flush(timeout))
}

/// Close the global client. It stays installed (and keeps rejecting
/// captures) until [`reset`].
pub fn close(timeout: Option<Duration>) -> Result<bool> {
	Ok(get()?.close(timeout))
}

pub fn last_event_id() -> Result<Option<String>> {
	Ok(get()?.last_event_id())
}
