// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Bounded FIFO ring of breadcrumbs.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;

use crate::breadcrumb::Breadcrumb;

/// Process-wide insertion counter, shared by every buffer so entries from
/// different scopes can be interleaved in the order they were added.
static NEXT_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Holds at most `capacity` of the most recent breadcrumbs, oldest first.
#[derive(Debug, Clone)]
pub struct BreadcrumbBuffer {
	capacity: usize,
	entries: VecDeque<(u64, Breadcrumb)>,
}

impl BreadcrumbBuffer {
	pub fn new(capacity: usize) -> Self {
		Self {
			capacity,
			entries: VecDeque::with_capacity(capacity),
		}
	}

	/// Appends a breadcrumb, evicting the oldest entry when full.
	///
	/// The timestamp is set to now if the breadcrumb carries none. A
	/// zero-capacity buffer drops everything.
	pub fn push(&mut self, mut breadcrumb: Breadcrumb) {
		if self.capacity == 0 {
			return;
		}

		if breadcrumb.timestamp.is_none() {
			breadcrumb.timestamp = Some(Utc::now());
		}

		while self.entries.len() >= self.capacity {
			self.entries.pop_front();
		}
		let sequence = NEXT_SEQUENCE.fetch_add(1, Ordering::Relaxed);
		self.entries.push_back((sequence, breadcrumb));
	}

	pub fn iter(&self) -> impl Iterator<Item = &Breadcrumb> {
		self.entries.iter().map(|(_, breadcrumb)| breadcrumb)
	}

	/// Entries with their insertion sequence. Sequences increase across all
	/// buffers in the process, whatever the breadcrumb timestamps say.
	pub fn iter_sequenced(&self) -> impl Iterator<Item = (u64, &Breadcrumb)> {
		self.entries.iter().map(|(sequence, breadcrumb)| (*sequence, breadcrumb))
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	pub fn capacity(&self) -> usize {
		self.capacity
	}

	pub fn clear(&mut self) {
		self.entries.clear();
	}

	/// Snapshot in insertion order.
	pub fn to_vec(&self) -> Vec<Breadcrumb> {
		self.iter().cloned().collect()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use chrono::TimeZone;
	use proptest::prelude::*;

	proptest! {
		#[test]
		fn keeps_last_n_in_insertion_order(capacity in 1usize..50, extra in 1usize..50) {
			let mut buffer = BreadcrumbBuffer::new(capacity);
			let total = capacity + extra;
			for i in 0..total {
				buffer.push(Breadcrumb::new(format!("crumb_{i}")));
			}

			prop_assert_eq!(buffer.len(), capacity);
			let messages: Vec<String> = buffer.iter().map(|b| b.message.clone()).collect();
			let expected: Vec<String> = (extra..total).map(|i| format!("crumb_{i}")).collect();
			prop_assert_eq!(messages, expected);
		}
	}

	#[test]
	fn assigns_missing_timestamp() {
		let mut buffer = BreadcrumbBuffer::new(3);
		buffer.push(Breadcrumb::new("no time"));
		assert!(buffer.iter().next().unwrap().timestamp.is_some());
	}

	#[test]
	fn keeps_supplied_timestamp() {
		let ts = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
		let mut buffer = BreadcrumbBuffer::new(3);
		buffer.push(Breadcrumb::new("timed").timestamp(ts));
		assert_eq!(buffer.iter().next().unwrap().timestamp, Some(ts));
	}

	#[test]
	fn sequence_follows_insertion_not_timestamp() {
		let later = Utc::now() + chrono::Duration::seconds(60);
		let mut first = BreadcrumbBuffer::new(3);
		let mut second = BreadcrumbBuffer::new(3);
		first.push(Breadcrumb::new("first").timestamp(later));
		second.push(Breadcrumb::new("second"));
		first.push(Breadcrumb::new("third"));

		let mut all: Vec<(u64, &Breadcrumb)> =
			first.iter_sequenced().chain(second.iter_sequenced()).collect();
		all.sort_by_key(|(sequence, _)| *sequence);
		let messages: Vec<&str> = all.iter().map(|(_, b)| b.message.as_str()).collect();
		assert_eq!(messages, vec!["first", "second", "third"]);
	}

	#[test]
	fn zero_capacity_drops_everything() {
		let mut buffer = BreadcrumbBuffer::new(0);
		buffer.push(Breadcrumb::new("dropped"));
		assert!(buffer.is_empty());
	}

	#[test]
	fn clear_empties_buffer() {
		let mut buffer = BreadcrumbBuffer::new(2);
		buffer.push(Breadcrumb::new("a"));
		buffer.clear();
		assert!(buffer.is_empty());
		assert_eq!(buffer.capacity(), 2);
	}
}
