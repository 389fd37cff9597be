// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Backtrace capture and parsing.

use error_explorer_core::{Frame, Stacktrace};
use rustc_demangle::demangle;
use std::backtrace::Backtrace;

/// Parse a Rust backtrace into a Stacktrace, innermost call last.
pub fn parse_backtrace(backtrace: &Backtrace) -> Stacktrace {
	let mut frames = parse_backtrace_string(&format!("{backtrace}"));
	frames.reverse();
	Stacktrace { frames }
}

/// Parse std's backtrace rendering (`N: symbol` lines each optionally
/// followed by an `at file:line:col` line), innermost call first.
fn parse_backtrace_string(bt_string: &str) -> Vec<Frame> {
	let mut frames: Vec<Frame> = Vec::new();

	for line in bt_string.lines() {
		let line = line.trim();
		if line.is_empty() {
			continue;
		}

		if let Some(location) = line.strip_prefix("at ") {
			if let Some(frame) = frames.last_mut() {
				apply_location(frame, location);
			}
			continue;
		}

		if let Some(frame) = parse_frame_line(line) {
			frames.push(frame);
		}
	}

	frames
}

/// Parse a single `N: function` line into a Frame.
fn parse_frame_line(line: &str) -> Option<Frame> {
	let function_part = match line.split_once(':') {
		Some((prefix, rest)) if prefix.trim().parse::<u32>().is_ok() => rest.trim(),
		_ => line,
	};

	if function_part.is_empty() {
		return None;
	}

	let demangled = format!("{:#}", demangle(function_part));
	let module = demangled.rfind("::").map(|idx| demangled[..idx].to_string());
	let in_app = is_in_app_frame(&demangled);

	Some(Frame {
		function: Some(demangled),
		module,
		in_app,
		..Default::default()
	})
}

/// Fill filename, line and column from `path:line:col`.
fn apply_location(frame: &mut Frame, location: &str) {
	let mut parts = location.rsplitn(3, ':');
	let col = parts.next();
	let line = parts.next();
	let path = parts.next();

	match (path, line.and_then(|l| l.parse().ok()), col.and_then(|c| c.parse().ok())) {
		(Some(path), Some(lineno), Some(colno)) => {
			frame.filename = Some(path.to_string());
			frame.lineno = Some(lineno);
			frame.colno = Some(colno);
		}
		_ => frame.filename = Some(location.to_string()),
	}
}

/// Determine if a frame is from application code rather than std, common
/// runtime crates, or this SDK.
fn is_in_app_frame(function: &str) -> bool {
	const SYSTEM_PREFIXES: &[&str] = &[
		"std::",
		"core::",
		"alloc::",
		"<std::",
		"<core::",
		"<alloc::",
		"tokio::",
		"<tokio::",
		"futures::",
		"<futures::",
		"tracing::",
		"<tracing::",
		"tracing_subscriber::",
		"<tracing_subscriber::",
		"error_explorer::",
		"<error_explorer::",
		"error_explorer_core::",
		"panic_unwind::",
		"rust_begin_unwind",
		"rust_panic",
		"__rust_",
		"_rust_",
		"__libc_start",
		"_start",
	];

	const SYSTEM_CONTAINS: &[&str] = &[
		"::panic::",
		"::panicking::",
		"::rt::",
		"::sys_common::",
	];

	if SYSTEM_PREFIXES.iter().any(|prefix| function.starts_with(prefix)) {
		return false;
	}

	!SYSTEM_CONTAINS.iter().any(|needle| function.contains(needle))
}

/// Capture a fresh backtrace and parse it.
pub fn capture_backtrace() -> Stacktrace {
	let backtrace = Backtrace::force_capture();
	parse_backtrace(&backtrace)
}
