// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Core types for the Error Explorer reporting SDK.
//!
//! This crate holds the data model shared by the SDK and its integrations.
//! It performs no I/O apart from reading configuration files:
//! - Breadcrumbs and the bounded breadcrumb ring buffer
//! - User identity and per-capture context overlays
//! - The event payload handed to a transport
//! - Validated client options and the layered configuration loader

pub mod breadcrumb;
pub mod buffer;
pub mod config;
pub mod context;
pub mod error;
pub mod event;
pub mod level;
pub mod options;

pub use breadcrumb::{Breadcrumb, BreadcrumbType};
pub use buffer::BreadcrumbBuffer;
pub use config::OptionsLayer;
pub use context::{CaptureContext, User};
pub use error::{ConfigError, ParseError};
pub use event::{Event, EventId, Exception, Frame, SdkInfo, Stacktrace};
pub use level::Level;
pub use options::{
	AutoCaptureOptions, Options, OptionsBuilder, TransportMode, DEFAULT_ENDPOINT,
	DEFAULT_MAX_BREADCRUMBS,
};
