// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Automatic capture hooks.
//!
//! Process-wide hooks (the panic hook) cannot carry a client, so they report
//! to whichever client `init` attached last. `reset` detaches it and the
//! hooks become pass-throughs.

pub mod layer;
pub mod panic;

use parking_lot::RwLock;
use tracing::debug;

use crate::client::Client;

static ATTACHED: RwLock<Option<Client>> = parking_lot::const_rwlock(None);

/// Make `client` the target of process-wide hooks, installing them as its
/// auto-capture options require.
pub(crate) fn attach(client: &Client) {
	let auto = client.options().auto_capture;
	if auto.uncaught_exceptions || auto.unhandled_threads {
		panic::install_panic_hook();
	}
	*ATTACHED.write() = Some(client.clone());
	debug!(client_id = client.id(), "Client attached to auto-capture hooks");
}

/// Detach `client_id` if it is still the attached client.
pub(crate) fn detach(client_id: u64) {
	let mut attached = ATTACHED.write();
	if attached.as_ref().is_some_and(|c| c.id() == client_id) {
		*attached = None;
		debug!(client_id, "Client detached from auto-capture hooks");
	}
}

/// The attached client, unless the slot is being swapped right now.
pub(crate) fn attached() -> Option<Client> {
	ATTACHED.try_read().and_then(|guard| guard.clone())
}
