// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Panic hook reporting panics to the attached client.

use std::any::Any;
use std::cell::Cell;
use std::panic::PanicHookInfo;
use std::sync::Once;

use error_explorer_core::AutoCaptureOptions;
use tracing::debug;

use crate::backtrace::capture_backtrace;

static INSTALL: Once = Once::new();

thread_local! {
	static IN_HOOK: Cell<bool> = const { Cell::new(false) };
}

/// Install the reporting panic hook once per process.
///
/// The previously installed hook still runs after the report, so the usual
/// panic message is printed.
pub fn install_panic_hook() {
	INSTALL.call_once(|| {
		let previous = std::panic::take_hook();
		std::panic::set_hook(Box::new(move |info| {
			report_panic(info);
			previous(info);
		}));
		debug!("Panic hook installed");
	});
}

struct HookReentry;

impl HookReentry {
	fn enter() -> Option<Self> {
		let first = IN_HOOK.try_with(|flag| !flag.replace(true)).unwrap_or(false);
		first.then_some(HookReentry)
	}
}

impl Drop for HookReentry {
	fn drop(&mut self) {
		let _ = IN_HOOK.try_with(|flag| flag.set(false));
	}
}

fn report_panic(info: &PanicHookInfo<'_>) {
	let Some(_reentry) = HookReentry::enter() else {
		return;
	};
	let Some(client) = super::attached() else {
		return;
	};

	let thread = std::thread::current();
	let thread_name = thread.name().unwrap_or("<unnamed>");
	let auto = client.options().auto_capture;
	if !should_report(thread_name, auto, crate::client::is_capturing()) || client.is_closed() {
		return;
	}

	let message = payload_message(info.payload());
	let location = info
		.location()
		.map(|l| format!("{}:{}:{}", l.file(), l.line(), l.column()));

	client.capture_panic(message, location, thread_name, capture_backtrace());
	client.flush(client.options().shutdown_timeout);
}

/// Panics on SDK threads, or raised while a capture is running, are never
/// reported.
fn should_report(thread_name: &str, auto: AutoCaptureOptions, sdk_thread: bool) -> bool {
	if sdk_thread {
		return false;
	}
	if thread_name == "main" {
		auto.uncaught_exceptions
	} else {
		auto.unhandled_threads
	}
}

/// Text of a panic payload.
pub(crate) fn payload_message(payload: &(dyn Any + Send)) -> String {
	if let Some(s) = payload.downcast_ref::<&str>() {
		(*s).to_string()
	} else if let Some(s) = payload.downcast_ref::<String>() {
		s.clone()
	} else {
		"Box<dyn Any>".to_string()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn payload_message_handles_common_payloads() {
		let literal: Box<dyn Any + Send> = Box::new("static message");
		let formatted: Box<dyn Any + Send> = Box::new(format!("value was {}", 7));
		let opaque: Box<dyn Any + Send> = Box::new(42u32);

		assert_eq!(payload_message(literal.as_ref()), "static message");
		assert_eq!(payload_message(formatted.as_ref()), "value was 7");
		assert_eq!(payload_message(opaque.as_ref()), "Box<dyn Any>");
	}

	#[test]
	fn should_report_follows_thread_toggles() {
		let all = AutoCaptureOptions::default();
		let threads_only = AutoCaptureOptions {
			uncaught_exceptions: false,
			..AutoCaptureOptions::default()
		};

		assert!(should_report("main", all, false));
		assert!(should_report("worker", all, false));
		assert!(!should_report("main", threads_only, false));
		assert!(should_report("worker", threads_only, false));
		assert!(!should_report("worker", AutoCaptureOptions::disabled(), false));
	}

	#[test]
	fn panics_on_sdk_threads_are_skipped() {
		let all = AutoCaptureOptions::default();
		assert!(!should_report("error-explorer-transport", all, true));
		assert!(!should_report("main", all, true));
	}

	#[test]
	fn reentry_guard_allows_one_level() {
		let outer = HookReentry::enter();
		assert!(outer.is_some());
		assert!(HookReentry::enter().is_none());
		drop(outer);
		assert!(HookReentry::enter().is_some());
	}
}
