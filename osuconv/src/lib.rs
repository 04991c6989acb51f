pub mod algos;
pub mod convert;
pub mod file;
pub mod point;
pub mod random;

use std::ops::{Bound, RangeBounds};

use file::beatmap::Timestamp;

pub trait Timestamped {
	fn timestamp(&self) -> Timestamp;
}

pub trait TimestampedSlice<T: Timestamped> {
	fn between(&self, time_range: impl RangeBounds<Timestamp>) -> &[T];
}

impl<T: Timestamped> TimestampedSlice<T> for [T] {
	/// Subslice of time-sorted items whose timestamp falls in `time_range`.
	fn between(&self, time_range: impl RangeBounds<Timestamp>) -> &[T] {
		let start_index = match time_range.start_bound() {
			Bound::Included(start) => self.partition_point(|o| o.timestamp() < *start),
			Bound::Excluded(start) => self.partition_point(|o| o.timestamp() <= *start),
			Bound::Unbounded => 0,
		};

		let end_index = match time_range.end_bound() {
			Bound::Included(end) => self.partition_point(|o| o.timestamp() <= *end),
			Bound::Excluded(end) => self.partition_point(|o| o.timestamp() < *end),
			Bound::Unbounded => self.len(),
		};

		if start_index >= end_index {
			return &[];
		}

		&self[start_index..end_index]
	}
}

/// Last item of a time-sorted slice starting at or before `time`.
pub fn last_at_or_before<T: Timestamped>(items: &[T], time: Timestamp) -> Option<&T> {
	let index = items.partition_point(|o| o.timestamp() <= time);
	index.checked_sub(1).map(|i| &items[i])
}

#[cfg(test)]
mod tests {
	use super::{last_at_or_before, Timestamped, TimestampedSlice};
	use crate::file::beatmap::Timestamp;

	struct At(Timestamp);

	impl Timestamped for At {
		fn timestamp(&self) -> Timestamp {
			self.0
		}
	}

	fn times(items: &[At]) -> Vec<Timestamp> {
		items.iter().map(|o| o.0).collect()
	}

	#[test]
	fn between_bounds() {
		let items = [At(0), At(100), At(100), At(250), At(400)];

		assert_eq!(times(items.between(100..400)), vec![100, 100, 250]);
		assert_eq!(times(items.between(100..=400)), vec![100, 100, 250, 400]);
		assert_eq!(times(items.between(..100)), vec![0]);
		assert_eq!(times(items.between(500..)), Vec::<Timestamp>::new());
	}

	#[test]
	fn last_before() {
		let items = [At(10), At(20), At(30)];

		assert!(last_at_or_before(&items, 5).is_none());
		assert_eq!(last_at_or_before(&items, 20).map(|o| o.0), Some(20));
		assert_eq!(last_at_or_before(&items, 29).map(|o| o.0), Some(20));
		assert_eq!(last_at_or_before(&items, 1000).map(|o| o.0), Some(30));
	}
}
