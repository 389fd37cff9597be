// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Severity levels shared by breadcrumbs and events.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ParseError;

/// Severity of a breadcrumb or captured event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Level {
	Debug,
	#[default]
	Info,
	Warning,
	Error,
	Critical,
}

impl Level {
	pub fn as_str(&self) -> &'static str {
		match self {
			Self::Debug => "debug",
			Self::Info => "info",
			Self::Warning => "warning",
			Self::Error => "error",
			Self::Critical => "critical",
		}
	}
}

impl fmt::Display for Level {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for Level {
	type Err = ParseError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"debug" => Ok(Self::Debug),
			"info" => Ok(Self::Info),
			"warning" | "warn" => Ok(Self::Warning),
			"error" => Ok(Self::Error),
			"critical" | "fatal" => Ok(Self::Critical),
			_ => Err(ParseError::InvalidLevel(s.to_string())),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;

	proptest! {
		#[test]
		fn level_roundtrip(level in prop_oneof![
			Just(Level::Debug),
			Just(Level::Info),
			Just(Level::Warning),
			Just(Level::Error),
			Just(Level::Critical),
		]) {
			let parsed: Level = level.to_string().parse().unwrap();
			prop_assert_eq!(level, parsed);
		}
	}

	#[test]
	fn aliases_parse() {
		assert_eq!("warn".parse::<Level>().unwrap(), Level::Warning);
		assert_eq!("fatal".parse::<Level>().unwrap(), Level::Critical);
	}

	#[test]
	fn unknown_level_is_rejected() {
		assert_eq!(
			"loud".parse::<Level>(),
			Err(ParseError::InvalidLevel("loud".to_string()))
		);
	}

	#[test]
	fn default_is_info() {
		assert_eq!(Level::default(), Level::Info);
	}
}
