// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Scoped context: the global scope plus a per-thread stack of pushed scopes.
//!
//! Each client owns one global [`Scope`] guarded by a lock. Scopes created
//! with [`Client::push_scope`] live on a thread-local stack, tagged with the
//! id of the client that pushed them, so concurrent requests on different
//! threads never see each other's pushed context.
//!
//! A [`ScopeGuard`] is `!Send`: a pushed scope belongs to the thread that
//! pushed it. Holding a guard across an `.await` therefore makes the future
//! `!Send`, which keeps a pushed scope from migrating between runtime
//! worker threads. Sharing one pushed scope between concurrent flows is not
//! supported.
//!
//! [`Client::push_scope`]: crate::Client::push_scope

use std::cell::RefCell;
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};

use error_explorer_core::{Breadcrumb, BreadcrumbBuffer, CaptureContext, User};

/// Contextual state attached to every event captured while it is active.
#[derive(Debug, Clone)]
pub struct Scope {
	tags: HashMap<String, String>,
	user: Option<User>,
	extra: serde_json::Map<String, serde_json::Value>,
	breadcrumbs: BreadcrumbBuffer,
}

impl Scope {
	pub fn new(max_breadcrumbs: usize) -> Self {
		Self {
			tags: HashMap::new(),
			user: None,
			extra: serde_json::Map::new(),
			breadcrumbs: BreadcrumbBuffer::new(max_breadcrumbs),
		}
	}

	pub fn set_tag(&mut self, key: impl Into<String>, value: impl Into<String>) {
		self.tags.insert(key.into(), value.into());
	}

	pub fn set_tags<I, K, V>(&mut self, tags: I)
	where
		I: IntoIterator<Item = (K, V)>,
		K: Into<String>,
		V: Into<String>,
	{
		for (key, value) in tags {
			self.tags.insert(key.into(), value.into());
		}
	}

	pub fn remove_tag(&mut self, key: &str) {
		self.tags.remove(key);
	}

	pub fn set_user(&mut self, user: User) {
		self.user = Some(user);
	}

	pub fn clear_user(&mut self) {
		self.user = None;
	}

	pub fn set_extra(&mut self, key: impl Into<String>, value: serde_json::Value) {
		self.extra.insert(key.into(), value);
	}

	pub fn add_breadcrumb(&mut self, breadcrumb: Breadcrumb) {
		self.breadcrumbs.push(breadcrumb);
	}

	pub fn clear_breadcrumbs(&mut self) {
		self.breadcrumbs.clear();
	}

	pub fn tags(&self) -> &HashMap<String, String> {
		&self.tags
	}

	pub fn user(&self) -> Option<&User> {
		self.user.as_ref()
	}

	pub fn extra(&self) -> &serde_json::Map<String, serde_json::Value> {
		&self.extra
	}

	pub fn breadcrumbs(&self) -> impl Iterator<Item = &Breadcrumb> {
		self.breadcrumbs.iter()
	}

	/// Copy tags, user and extra into a fresh scope with no breadcrumbs.
	pub(crate) fn fork(&self) -> Scope {
		Scope {
			tags: self.tags.clone(),
			user: self.user.clone(),
			extra: self.extra.clone(),
			breadcrumbs: BreadcrumbBuffer::new(self.breadcrumbs.capacity()),
		}
	}
}

/// Context resolved for one event.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct MergedContext {
	pub tags: HashMap<String, String>,
	pub user: Option<User>,
	pub extra: serde_json::Map<String, serde_json::Value>,
	pub breadcrumbs: Vec<Breadcrumb>,
}

impl MergedContext {
	/// Merge scopes from outermost to innermost; inner values win per key.
	///
	/// The user is taken whole from the innermost scope that has one.
	/// Breadcrumbs from every layer are interleaved in the order they were
	/// added, regardless of their timestamps, and trimmed to the most recent
	/// `max_breadcrumbs`.
	pub fn from_layers<'a, I>(layers: I, max_breadcrumbs: usize) -> Self
	where
		I: IntoIterator<Item = &'a Scope>,
	{
		let mut merged = MergedContext::default();
		let mut sequenced: Vec<(u64, &Breadcrumb)> = Vec::new();
		for scope in layers {
			merged
				.tags
				.extend(scope.tags.iter().map(|(k, v)| (k.clone(), v.clone())));
			if let Some(user) = &scope.user {
				merged.user = Some(user.clone());
			}
			merged
				.extra
				.extend(scope.extra.iter().map(|(k, v)| (k.clone(), v.clone())));
			sequenced.extend(scope.breadcrumbs.iter_sequenced());
		}

		sequenced.sort_by_key(|(sequence, _)| *sequence);
		let excess = sequenced.len().saturating_sub(max_breadcrumbs);
		merged.breadcrumbs = sequenced
			.into_iter()
			.skip(excess)
			.map(|(_, breadcrumb)| breadcrumb.clone())
			.collect();
		merged
	}

	/// Overlay a per-capture context.
	pub fn apply(&mut self, context: &CaptureContext) {
		self
			.tags
			.extend(context.tags.iter().map(|(k, v)| (k.clone(), v.clone())));
		self
			.extra
			.extend(context.extra.iter().map(|(k, v)| (k.clone(), v.clone())));
		if let Some(user) = &context.user {
			self.user = Some(user.clone());
		}
	}
}

static NEXT_TOKEN: AtomicU64 = AtomicU64::new(1);

struct StackEntry {
	client_id: u64,
	token: u64,
	scope: Scope,
}

thread_local! {
	static SCOPE_STACK: RefCell<Vec<StackEntry>> = const { RefCell::new(Vec::new()) };
}

/// Clone of the innermost pushed scope for `client_id` on this thread.
pub(crate) fn current_top(client_id: u64) -> Option<Scope> {
	SCOPE_STACK
		.try_with(|stack| {
			let stack = stack.try_borrow().ok()?;
			stack
				.iter()
				.rev()
				.find(|entry| entry.client_id == client_id)
				.map(|entry| entry.scope.clone())
		})
		.ok()
		.flatten()
}

/// Clones of all pushed scopes for `client_id` on this thread, outermost first.
pub(crate) fn pushed_scopes(client_id: u64) -> Vec<Scope> {
	SCOPE_STACK
		.try_with(|stack| {
			let Ok(stack) = stack.try_borrow() else {
				return Vec::new();
			};
			stack
				.iter()
				.filter(|entry| entry.client_id == client_id)
				.map(|entry| entry.scope.clone())
				.collect()
		})
		.unwrap_or_default()
}

/// Run `f` on the innermost pushed scope for `client_id`, if any.
pub(crate) fn with_top_mut<R>(client_id: u64, f: impl FnOnce(&mut Scope) -> R) -> Option<R> {
	SCOPE_STACK
		.try_with(|stack| {
			let mut stack = stack.try_borrow_mut().ok()?;
			stack
				.iter_mut()
				.rev()
				.find(|entry| entry.client_id == client_id)
				.map(|entry| f(&mut entry.scope))
		})
		.ok()
		.flatten()
}

/// Handle to a pushed scope. Dropping it pops the scope.
///
/// The scope is popped on every exit path: normal return, early return via
/// `?`, and unwinding. Guards dropped out of order pop everything pushed
/// after them as well.
#[must_use = "the scope is popped as soon as the guard is dropped"]
pub struct ScopeGuard {
	client_id: u64,
	index: usize,
	token: u64,
	_not_send: PhantomData<*const ()>,
}

impl ScopeGuard {
	pub(crate) fn push(client_id: u64, scope: Scope) -> Self {
		let token = NEXT_TOKEN.fetch_add(1, Ordering::Relaxed);
		let index = SCOPE_STACK.with(|stack| {
			let mut stack = stack.borrow_mut();
			stack.push(StackEntry {
				client_id,
				token,
				scope,
			});
			stack.len() - 1
		});

		Self {
			client_id,
			index,
			token,
			_not_send: PhantomData,
		}
	}

	fn with_scope<R>(&self, f: impl FnOnce(&mut Scope) -> R) -> Option<R> {
		SCOPE_STACK
			.try_with(|stack| {
				let mut stack = stack.try_borrow_mut().ok()?;
				match stack.get_mut(self.index) {
					Some(entry) if entry.token == self.token => Some(f(&mut entry.scope)),
					_ => None,
				}
			})
			.ok()
			.flatten()
	}

	pub fn set_tag(&self, key: impl Into<String>, value: impl Into<String>) {
		self.with_scope(|scope| scope.set_tag(key, value));
	}

	pub fn set_tags<I, K, V>(&self, tags: I)
	where
		I: IntoIterator<Item = (K, V)>,
		K: Into<String>,
		V: Into<String>,
	{
		self.with_scope(|scope| scope.set_tags(tags));
	}

	pub fn remove_tag(&self, key: &str) {
		self.with_scope(|scope| scope.remove_tag(key));
	}

	pub fn set_user(&self, user: User) {
		self.with_scope(|scope| scope.set_user(user));
	}

	pub fn clear_user(&self) {
		self.with_scope(|scope| scope.clear_user());
	}

	pub fn set_extra(&self, key: impl Into<String>, value: serde_json::Value) {
		self.with_scope(|scope| scope.set_extra(key, value));
	}

	pub fn add_breadcrumb(&self, breadcrumb: Breadcrumb) {
		self.with_scope(|scope| scope.add_breadcrumb(breadcrumb));
	}

	/// Snapshot of this scope's state.
	pub fn snapshot(&self) -> Option<Scope> {
		self.with_scope(|scope| scope.clone())
	}

	pub fn client_id(&self) -> u64 {
		self.client_id
	}
}

impl Drop for ScopeGuard {
	fn drop(&mut self) {
		let _ = SCOPE_STACK.try_with(|stack| {
			if let Ok(mut stack) = stack.try_borrow_mut() {
				let owned = stack
					.get(self.index)
					.is_some_and(|entry| entry.token == self.token);
				if owned {
					stack.truncate(self.index);
				}
			}
		});
	}
}

impl std::fmt::Debug for ScopeGuard {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ScopeGuard")
			.field("client_id", &self.client_id)
			.field("index", &self.index)
			.finish()
	}
}
