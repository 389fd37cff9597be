// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error Explorer reporting SDK for Rust applications.
//!
//! Captures errors, panics and log events, enriches them with scoped
//! context and breadcrumbs, and delivers them to the Error Explorer
//! collector.
//!
//! # Global client
//!
//! ```ignore
//! use error_explorer::{CaptureContext, Level, Options, User};
//!
//! let options = Options::builder(std::env::var("ERROR_EXPLORER_TOKEN")?, "my-app")
//!     .environment("staging")
//!     .release(env!("CARGO_PKG_VERSION"))
//!     .build()?;
//! error_explorer::init(options)?;
//!
//! error_explorer::set_user(User::with_id("42"))?;
//! error_explorer::with_scope(|scope| {
//!     scope.set_tag("request_id", "abc123");
//!     if let Err(e) = handle_request() {
//!         let context = CaptureContext::new().extra("attempt", 2);
//!         error_explorer::capture_exception(&e, Some(context)).ok();
//!     }
//! })?;
//!
//! error_explorer::close(None)?;
//! ```
//!
//! # Independent clients
//!
//! [`ClientBuilder`] builds clients that are not tied to the global slot,
//! with any [`Transport`]. Tests typically pair it with
//! [`MemoryTransport`].

pub mod backtrace;
mod client;
mod error;
mod global;
pub mod integrations;
mod scope;
mod serialize;
pub mod transport;

pub use client::{BeforeSend, Client, ClientBuilder};
pub use error::{ExplorerError, Result, TransportError};
pub use global::{
	add_breadcrumb, capture_event, capture_exception, capture_message, close, flush, get, init,
	init_with, is_initialized, last_event_id, push_scope, reset, set_extra, set_tag, set_tags,
	set_user, with_scope,
};
pub use integrations::layer::ExplorerLayer;
pub use integrations::panic::install_panic_hook;
pub use scope::{Scope, ScopeGuard};
pub use serialize::{serialize_event, SerializedEvent};
pub use transport::{HttpTransport, MemoryTransport, RetryConfig, Transport};

pub use error_explorer_core::{
	AutoCaptureOptions, Breadcrumb, BreadcrumbType, CaptureContext, ConfigError, Event, EventId,
	Exception, Frame, Level, Options, OptionsBuilder, OptionsLayer, SdkInfo, Stacktrace,
	TransportMode, User,
};

/// SDK name reported with every event.
pub const SDK_NAME: &str = "error-explorer-rust";
/// SDK version reported with every event.
pub const SDK_VERSION: &str = env!("CARGO_PKG_VERSION");

pub(crate) fn sdk_user_agent() -> String {
	format!("{SDK_NAME}/{SDK_VERSION}")
}
