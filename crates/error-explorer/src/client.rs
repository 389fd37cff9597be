// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The reporting client.

use std::any::Any;
use std::cell::Cell;
use std::error::Error;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use error_explorer_core::{
	Breadcrumb, CaptureContext, Event, Exception, Level, Options, SdkInfo, Stacktrace, User,
};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::backtrace::capture_backtrace;
use crate::error::{ExplorerError, Result};
use crate::integrations::panic::payload_message;
use crate::scope::{self, MergedContext, Scope, ScopeGuard};
use crate::serialize::serialize_event;
use crate::transport::{HttpTransport, Transport};

/// Hook run on every event right before it is serialized.
///
/// Returning `None` drops the event.
pub type BeforeSend = Arc<dyn Fn(Event) -> Option<Event> + Send + Sync>;

/// Upper bound on recorded `source()` links, in case of a cyclic chain.
const MAX_EXCEPTION_CHAIN: usize = 16;

static NEXT_CLIENT_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
	static CAPTURING: Cell<bool> = const { Cell::new(false) };
}

/// Flag the current thread as SDK-internal for its whole lifetime.
pub(crate) fn mark_thread_as_sdk() {
	let _ = CAPTURING.try_with(|flag| flag.set(true));
}

/// Whether the current thread is inside a capture (or is an SDK thread).
pub(crate) fn is_capturing() -> bool {
	CAPTURING.try_with(Cell::get).unwrap_or(true)
}

struct CaptureGuard {
	previous: bool,
}

impl CaptureGuard {
	fn enter() -> Self {
		let previous = CAPTURING.try_with(|flag| flag.replace(true)).unwrap_or(true);
		Self { previous }
	}
}

impl Drop for CaptureGuard {
	fn drop(&mut self) {
		let previous = self.previous;
		let _ = CAPTURING.try_with(|flag| flag.set(previous));
	}
}

/// Builder for a [`Client`].
pub struct ClientBuilder {
	options: Options,
	transport: Option<Arc<dyn Transport>>,
	before_send: Option<BeforeSend>,
	force_reinit: bool,
}

impl ClientBuilder {
	pub fn new(options: Options) -> Self {
		Self {
			options,
			transport: None,
			before_send: None,
			force_reinit: false,
		}
	}

	/// Deliver through `transport` instead of the HTTP transport.
	pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
		self.transport = Some(transport);
		self
	}

	pub fn before_send<F>(mut self, hook: F) -> Self
	where
		F: Fn(Event) -> Option<Event> + Send + Sync + 'static,
	{
		self.before_send = Some(Arc::new(hook));
		self
	}

	/// Replace a live global client instead of failing. Only read by
	/// [`init_with`](crate::init_with).
	pub fn force_reinit(mut self, force: bool) -> Self {
		self.force_reinit = force;
		self
	}

	pub(crate) fn is_force_reinit(&self) -> bool {
		self.force_reinit
	}

	/// Validate the options and construct the client.
	///
	/// Without an explicit transport this builds an [`HttpTransport`] for
	/// `options.endpoint`.
	pub fn build(self) -> Result<Client> {
		self.options.validate()?;

		let transport = match self.transport {
			Some(transport) => transport,
			None => Arc::new(HttpTransport::new(&self.options)?) as Arc<dyn Transport>,
		};

		let id = NEXT_CLIENT_ID.fetch_add(1, Ordering::Relaxed);
		let inner = Arc::new(ClientInner {
			id,
			global: RwLock::new(Scope::new(self.options.max_breadcrumbs)),
			options: self.options,
			transport,
			before_send: self.before_send,
			closed: AtomicBool::new(false),
			last_event_id: Mutex::new(None),
		});

		info!(
			client_id = id,
			project = %inner.options.project,
			environment = %inner.options.environment,
			"Error explorer client initialized"
		);

		Ok(Client { inner })
	}
}

struct ClientInner {
	id: u64,
	options: Options,
	transport: Arc<dyn Transport>,
	global: RwLock<Scope>,
	before_send: Option<BeforeSend>,
	closed: AtomicBool,
	last_event_id: Mutex<Option<String>>,
}

/// Captures errors and messages and hands them to a [`Transport`].
///
/// Cloning is cheap; clones share configuration, global scope and
/// transport. Capture methods never fail: any problem while building or
/// sending an event is swallowed (and logged when `debug` is on) and the
/// call returns `None`.
///
/// ```ignore
/// use error_explorer::{Client, ClientBuilder, Options, Level};
///
/// let client = ClientBuilder::new(Options::builder("token", "my-app").build()?).build()?;
/// client.set_tag("region", "eu-west-1");
///
/// {
///     let scope = client.push_scope();
///     scope.set_tag("request_id", "abc123");
///     client.capture_message("processing failed", Level::Warning, None);
/// }
///
/// client.close(None);
/// ```
#[derive(Clone)]
pub struct Client {
	inner: Arc<ClientInner>,
}

impl Client {
	pub fn builder(options: Options) -> ClientBuilder {
		ClientBuilder::new(options)
	}

	/// Capture an error with its `source()` chain and a backtrace.
	///
	/// The outermost error comes first in the event's exception list.
	pub fn capture_exception<E>(&self, error: &E, context: Option<CaptureContext>) -> Option<String>
	where
		E: Error + ?Sized + 'static,
	{
		if self.refuse_if_closed() {
			return None;
		}

		let mut exceptions = vec![Exception {
			exception_type: error_type_name(error, std::any::type_name::<E>()),
			value: error.to_string(),
			stacktrace: Some(capture_backtrace()),
		}];

		let mut source = error.source();
		while let Some(cause) = source {
			if exceptions.len() >= MAX_EXCEPTION_CHAIN {
				break;
			}
			exceptions.push(Exception {
				exception_type: error_type_name(cause, "dyn Error"),
				value: cause.to_string(),
				stacktrace: None,
			});
			source = cause.source();
		}

		let event = Event {
			level: Level::Error,
			exception: exceptions,
			..Default::default()
		};
		self.dispatch(event, context)
	}

	pub fn capture_error<E>(&self, error: &E) -> Option<String>
	where
		E: Error + ?Sized + 'static,
	{
		self.capture_exception(error, None)
	}

	pub fn capture_message(
		&self,
		message: impl Into<String>,
		level: Level,
		context: Option<CaptureContext>,
	) -> Option<String> {
		let event = Event {
			level,
			message: Some(message.into()),
			..Default::default()
		};
		self.dispatch(event, context)
	}

	/// Send a caller-built event through the same merge pipeline.
	///
	/// Tags, extra and user already on the event take precedence over
	/// scopes; `context` still overrides them. An event that brings its own
	/// breadcrumbs keeps them instead of the scope breadcrumbs.
	pub fn capture_event(&self, event: Event, context: Option<CaptureContext>) -> Option<String> {
		self.dispatch(event, context)
	}

	/// Report the error payload of a joined thread, e.g. from
	/// `handle.join()`.
	pub fn capture_join_error(
		&self,
		thread_name: Option<&str>,
		payload: &(dyn Any + Send),
	) -> Option<String> {
		let thread = thread_name.unwrap_or("<unnamed>");
		let mut event = Event {
			level: Level::Error,
			exception: vec![Exception {
				exception_type: "panic".to_string(),
				value: payload_message(payload),
				stacktrace: None,
			}],
			..Default::default()
		};
		event.tags.insert("thread".to_string(), thread.to_string());
		self.dispatch(event, None)
	}

	pub(crate) fn capture_panic(
		&self,
		message: String,
		location: Option<String>,
		thread: &str,
		stacktrace: Stacktrace,
	) -> Option<String> {
		let mut event = Event {
			level: Level::Critical,
			exception: vec![Exception {
				exception_type: "panic".to_string(),
				value: message,
				stacktrace: Some(stacktrace),
			}],
			..Default::default()
		};
		if let Some(location) = location {
			event.tags.insert("panic.location".to_string(), location);
		}
		event.tags.insert("thread".to_string(), thread.to_string());
		self.dispatch(event, None)
	}

	fn refuse_if_closed(&self) -> bool {
		let closed = self.inner.closed.load(Ordering::SeqCst);
		if closed && self.inner.options.debug {
			warn!(client_id = self.inner.id, "Client is closed, event dropped");
		}
		closed
	}

	fn dispatch(&self, mut event: Event, context: Option<CaptureContext>) -> Option<String> {
		if self.refuse_if_closed() {
			return None;
		}
		let _capturing = CaptureGuard::enter();
		let inner = &self.inner;
		let options = &inner.options;

		let global = inner.global.read().clone();
		let pushed = scope::pushed_scopes(inner.id);
		let mut merged = MergedContext::from_layers(
			std::iter::once(&global).chain(pushed.iter()),
			options.max_breadcrumbs,
		);

		merged.tags.extend(std::mem::take(&mut event.tags));
		merged.extra.extend(std::mem::take(&mut event.extra));
		if let Some(user) = event.user.take() {
			merged.user = Some(user);
		}
		if let Some(context) = &context {
			merged.apply(context);
			if let Some(level) = context.level {
				event.level = level;
			}
		}

		event.tags = merged.tags;
		event.extra = merged.extra;
		event.user = if options.send_default_pii {
			merged.user
		} else {
			merged
				.user
				.map(|user| user.without_pii())
				.filter(User::is_identified)
		};
		if event.breadcrumbs.is_empty() {
			event.breadcrumbs = merged.breadcrumbs;
		}

		event.project = options.project.clone();
		event.environment = options.environment.clone();
		event.release = event.release.or_else(|| options.release.clone());
		event.server_name = event.server_name.or_else(|| options.server_name.clone());
		event.sdk = SdkInfo {
			name: crate::SDK_NAME.to_string(),
			version: crate::SDK_VERSION.to_string(),
		};

		if let Some(hook) = &inner.before_send {
			match hook(event) {
				Some(kept) => event = kept,
				None => {
					debug!(client_id = inner.id, "Event dropped by before_send");
					return None;
				}
			}
		}

		let serialized = match serialize_event(&event) {
			Ok(serialized) => serialized,
			Err(e) => {
				self.report_failure(&ExplorerError::from(e));
				return None;
			}
		};

		let local_id = serialized.event_id;
		match inner.transport.send(serialized) {
			Ok(id) => {
				let id = if id.is_empty() {
					local_id.to_string()
				} else {
					id
				};
				debug!(event_id = %id, level = %event.level, "Event captured");
				*inner.last_event_id.lock() = Some(id.clone());
				Some(id)
			}
			Err(e) => {
				self.report_failure(&ExplorerError::from(e));
				None
			}
		}
	}

	fn report_failure(&self, error: &ExplorerError) {
		if self.inner.options.debug {
			warn!(client_id = self.inner.id, error = %error, "Failed to capture event");
		}
	}

	pub fn set_user(&self, user: User) {
		self.inner.global.write().set_user(user);
	}

	pub fn clear_user(&self) {
		self.inner.global.write().clear_user();
	}

	pub fn set_tag(&self, key: impl Into<String>, value: impl Into<String>) {
		self.inner.global.write().set_tag(key, value);
	}

	pub fn set_tags<I, K, V>(&self, tags: I)
	where
		I: IntoIterator<Item = (K, V)>,
		K: Into<String>,
		V: Into<String>,
	{
		let tags: Vec<(String, String)> = tags
			.into_iter()
			.map(|(k, v)| (k.into(), v.into()))
			.collect();
		self.inner.global.write().set_tags(tags);
	}

	pub fn remove_tag(&self, key: &str) {
		self.inner.global.write().remove_tag(key);
	}

	pub fn set_extra(&self, key: impl Into<String>, value: serde_json::Value) {
		self.inner.global.write().set_extra(key, value);
	}

	/// Record a breadcrumb on the global scope.
	pub fn add_breadcrumb(&self, breadcrumb: Breadcrumb) {
		self.inner.global.write().add_breadcrumb(breadcrumb);
	}

	pub fn clear_breadcrumbs(&self) {
		self.inner.global.write().clear_breadcrumbs();
	}

	/// Record on the innermost scope this thread pushed, else globally.
	pub(crate) fn add_breadcrumb_to_current_scope(&self, breadcrumb: Breadcrumb) {
		let mut pending = Some(breadcrumb);
		scope::with_top_mut(self.inner.id, |scope| {
			if let Some(breadcrumb) = pending.take() {
				scope.add_breadcrumb(breadcrumb);
			}
		});
		if let Some(breadcrumb) = pending {
			self.add_breadcrumb(breadcrumb);
		}
	}

	/// Snapshot of the global scope.
	pub fn global_scope(&self) -> Scope {
		self.inner.global.read().clone()
	}

	/// Push a copy of the current scope for this thread.
	///
	/// The copy starts from the innermost scope this thread already pushed,
	/// or the global scope. It is popped when the guard drops.
	pub fn push_scope(&self) -> ScopeGuard {
		let base = scope::current_top(self.inner.id)
			.map(|top| top.fork())
			.unwrap_or_else(|| self.inner.global.read().fork());
		ScopeGuard::push(self.inner.id, base)
	}

	/// Run `f` inside a freshly pushed scope.
	pub fn with_scope<R>(&self, f: impl FnOnce(&ScopeGuard) -> R) -> R {
		let guard = self.push_scope();
		f(&guard)
	}

	/// Wait for the transport to drain. Returns `false` on timeout.
	pub fn flush(&self, timeout: Duration) -> bool {
		self.inner.transport.flush(timeout)
	}

	/// Flush and stop accepting events.
	///
	/// Uses `options.shutdown_timeout` when `timeout` is `None`. Returns
	/// whether everything drained. Closing twice is a no-op that returns
	/// `true`.
	pub fn close(&self, timeout: Option<Duration>) -> bool {
		if self.inner.closed.swap(true, Ordering::SeqCst) {
			return true;
		}
		let timeout = timeout.unwrap_or(self.inner.options.shutdown_timeout);
		let drained = self.inner.transport.shutdown(timeout);
		info!(client_id = self.inner.id, drained, "Error explorer client closed");
		drained
	}

	/// Close without waiting and drop all scope state.
	pub(crate) fn teardown(&self) {
		self.inner.closed.store(true, Ordering::SeqCst);
		*self.inner.global.write() = Scope::new(self.inner.options.max_breadcrumbs);
		self.inner.transport.shutdown(Duration::ZERO);
		debug!(client_id = self.inner.id, "Client torn down");
	}

	pub fn is_closed(&self) -> bool {
		self.inner.closed.load(Ordering::SeqCst)
	}

	pub fn options(&self) -> &Options {
		&self.inner.options
	}

	/// Identifies this client's pushed scopes on the thread-local stack.
	pub fn id(&self) -> u64 {
		self.inner.id
	}

	/// Id returned by the most recent successful capture.
	pub fn last_event_id(&self) -> Option<String> {
		self.inner.last_event_id.lock().clone()
	}
}

impl std::fmt::Debug for Client {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Client")
			.field("id", &self.inner.id)
			.field("project", &self.inner.options.project)
			.field("closed", &self.is_closed())
			.finish()
	}
}

/// Best-effort error type name.
///
/// Trait objects carry no type name, so for those the name is taken from
/// the leading identifier of the `Debug` rendering.
fn error_type_name<E: Error + ?Sized>(error: &E, static_name: &str) -> String {
	if !static_name.starts_with("dyn ") {
		return static_name.to_string();
	}

	let debug = format!("{error:?}");
	let name: String = debug
		.chars()
		.take_while(|c| c.is_alphanumeric() || *c == '_' || *c == ':')
		.collect();
	if name.is_empty() || name.starts_with(|c: char| c.is_ascii_digit()) {
		"Error".to_string()
	} else {
		name
	}
}
