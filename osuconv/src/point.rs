use std::ops::{Add, Sub};

/// Position in osu! pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Point {
	pub x: f64,
	pub y: f64,
}

impl Point {
	#[must_use]
	pub const fn new(x: f64, y: f64) -> Self {
		Self { x, y }
	}

	#[must_use]
	pub fn len(self) -> f64 {
		self.x.hypot(self.y)
	}

	#[must_use]
	pub fn distance_to(self, other: Self) -> f64 {
		(self - other).len()
	}
}

impl Add for Point {
	type Output = Self;

	fn add(self, rhs: Self) -> Self::Output {
		Self {
			x: self.x + rhs.x,
			y: self.y + rhs.y,
		}
	}
}

impl Sub for Point {
	type Output = Self;

	fn sub(self, rhs: Self) -> Self::Output {
		Self {
			x: self.x - rhs.x,
			y: self.y - rhs.y,
		}
	}
}

/// Inclusive numeric range. The bounds are reordered on construction so that `min <= max`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InclusiveRange<T> {
	pub min: T,
	pub max: T,
}

impl<T: PartialOrd + Copy> InclusiveRange<T> {
	#[must_use]
	pub fn new(a: T, b: T) -> Self {
		if b < a {
			Self { min: b, max: a }
		} else {
			Self { min: a, max: b }
		}
	}

	#[must_use]
	pub fn contains(&self, value: T) -> bool {
		self.min <= value && value <= self.max
	}
}

#[cfg(test)]
mod tests {
	use super::{InclusiveRange, Point};

	#[test]
	fn distance() {
		let a = Point::new(100., 100.);
		let b = Point::new(103., 104.);
		assert!((a.distance_to(b) - 5.).abs() < f64::EPSILON);
		assert_eq!(a + Point::new(3., 4.), b);
	}

	#[test]
	fn range_reorders_bounds() {
		let range = InclusiveRange::new(7, 2);
		assert_eq!(range, InclusiveRange { min: 2, max: 7 });
		assert!(range.contains(2));
		assert!(range.contains(7));
		assert!(!range.contains(8));
	}
}
