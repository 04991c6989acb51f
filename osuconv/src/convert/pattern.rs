use std::collections::HashSet;
use std::fmt;
use std::ops::{BitAnd, BitOr, BitOrAssign};

use crate::file::beatmap::{
	column_to_x, HitObject, HitObjectParams, HitSample, HitSound, HoldParams, Timestamp, PLAYFIELD_HEIGHT,
};

/// Bit flags describing how a pattern should be laid out.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[repr(transparent)]
pub struct PatternType(u16);

impl PatternType {
	pub const NONE: Self = Self(0);
	/// Keep the same columns as the last row.
	pub const FORCE_STACK: Self = Self(1);
	/// Keep different columns from the last row.
	pub const FORCE_NOT_STACK: Self = Self(1 << 1);
	/// Keep as a single note at its original position.
	pub const KEEP_SINGLE: Self = Self(1 << 2);
	/// Use lower chord probabilities.
	pub const LOW_PROBABILITY: Self = Self(1 << 3);
	/// Reserved.
	pub const ALTERNATE: Self = Self(1 << 4);
	/// Ignore the repeat count.
	pub const FORCE_SIG_SLIDER: Self = Self(1 << 5);
	/// Convert sliders to circles.
	pub const FORCE_NOT_SLIDER: Self = Self(1 << 6);
	/// Notes gathered together.
	pub const GATHERED: Self = Self(1 << 7);
	pub const MIRROR: Self = Self(1 << 8);
	/// Columns flipped from the last row.
	pub const REVERSE: Self = Self(1 << 9);
	/// Single note bouncing between opposite columns.
	pub const CYCLE: Self = Self(1 << 10);
	/// Next note goes one column to the right.
	pub const STAIR: Self = Self(1 << 11);
	/// Next note goes one column to the left.
	pub const REVERSE_STAIR: Self = Self(1 << 12);

	const NAMES: [(Self, &'static str); 13] = [
		(Self::FORCE_STACK, "ForceStack"),
		(Self::FORCE_NOT_STACK, "ForceNotStack"),
		(Self::KEEP_SINGLE, "KeepSingle"),
		(Self::LOW_PROBABILITY, "LowProbability"),
		(Self::ALTERNATE, "Alternate"),
		(Self::FORCE_SIG_SLIDER, "ForceSigSlider"),
		(Self::FORCE_NOT_SLIDER, "ForceNotSlider"),
		(Self::GATHERED, "Gathered"),
		(Self::MIRROR, "Mirror"),
		(Self::REVERSE, "Reverse"),
		(Self::CYCLE, "Cycle"),
		(Self::STAIR, "Stair"),
		(Self::REVERSE_STAIR, "ReverseStair"),
	];

	#[must_use]
	pub const fn has_any(self, other: Self) -> bool {
		self.0 & other.0 > 0
	}

	pub fn remove(&mut self, other: Self) {
		self.0 &= !other.0;
	}
}

impl fmt::Display for PatternType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		if *self == Self::NONE {
			return write!(f, "None");
		}

		let mut first = true;
		for (flag, name) in Self::NAMES {
			if self.has_any(flag) {
				if !first {
					write!(f, ", ")?;
				}
				write!(f, "{name}")?;
				first = false;
			}
		}

		Ok(())
	}
}

impl BitAnd for PatternType {
	type Output = Self;

	fn bitand(self, rhs: Self) -> Self::Output {
		Self(self.0 & rhs.0)
	}
}

impl BitOr for PatternType {
	type Output = Self;

	fn bitor(self, rhs: Self) -> Self::Output {
		Self(self.0 | rhs.0)
	}
}

impl BitOrAssign for PatternType {
	fn bitor_assign(&mut self, rhs: Self) {
		self.0 |= rhs.0;
	}
}

/// Time span covered by a note. Circles have `start == end`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NoteSpan {
	pub start: Timestamp,
	pub end: Timestamp,
}

impl NoteSpan {
	#[must_use]
	pub const fn new(start: Timestamp, end: Timestamp) -> Self {
		Self { start, end }
	}

	#[must_use]
	pub const fn at(time: Timestamp) -> Self {
		Self::new(time, time)
	}

	const fn covers(self, time: Timestamp) -> bool {
		self.start <= time && time < self.end
	}

	/// Whether two notes in the same column would overlap.
	///
	/// Notes starting at the same time always conflict, and a hold
	/// excludes every other note starting in `[start, end)`.
	#[must_use]
	pub const fn conflicts_with(self, other: Self) -> bool {
		self.start == other.start || self.covers(other.start) || other.covers(self.start)
	}
}

/// A note of the converted chart, addressed by column.
#[derive(Clone, Debug, PartialEq)]
pub struct ManiaNote {
	pub column: i32,
	pub start_time: Timestamp,
	pub end_time: Timestamp,
	pub hit_sound: HitSound,
	pub hit_sample: Option<HitSample>,
}

impl ManiaNote {
	#[must_use]
	pub const fn circle(column: i32, time: Timestamp) -> Self {
		Self::hold(column, time, time)
	}

	/// A note spanning `[start_time, end_time]`. It is a circle if both times are equal.
	#[must_use]
	pub const fn hold(column: i32, start_time: Timestamp, end_time: Timestamp) -> Self {
		Self {
			column,
			start_time,
			end_time,
			hit_sound: HitSound::NONE,
			hit_sample: None,
		}
	}

	#[must_use]
	pub fn with_sounds(mut self, hit_sound: HitSound, hit_sample: Option<HitSample>) -> Self {
		self.hit_sound = hit_sound;
		self.hit_sample = hit_sample;
		self
	}

	#[must_use]
	pub const fn span(&self) -> NoteSpan {
		NoteSpan::new(self.start_time, self.end_time)
	}

	#[must_use]
	pub const fn is_hold(&self) -> bool {
		self.end_time > self.start_time
	}

	/// Hit object of this note in a chart with `columns` columns.
	#[must_use]
	pub fn to_hit_object(&self, columns: i32) -> HitObject {
		let params = if self.is_hold() {
			HitObjectParams::Hold(HoldParams {
				end_time: self.end_time,
			})
		} else {
			HitObjectParams::Circle
		};

		let mut hit_object = HitObject::new(
			column_to_x(self.column, columns),
			PLAYFIELD_HEIGHT / 2,
			self.start_time,
			params,
		);
		hit_object.hit_sound = self.hit_sound;
		hit_object.hit_sample.clone_from(&self.hit_sample);
		hit_object
	}
}

/// Notes emitted by one generation step.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Pattern {
	notes: Vec<ManiaNote>,
}

impl Pattern {
	#[must_use]
	pub const fn new() -> Self {
		Self { notes: Vec::new() }
	}

	#[must_use]
	pub fn notes(&self) -> &[ManiaNote] {
		&self.notes
	}

	#[must_use]
	pub fn len(&self) -> usize {
		self.notes.len()
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.notes.is_empty()
	}

	#[must_use]
	pub fn first_column(&self) -> Option<i32> {
		self.notes.first().map(|note| note.column)
	}

	#[must_use]
	pub fn column_has_object(&self, column: i32) -> bool {
		self.notes.iter().any(|note| note.column == column)
	}

	/// Number of distinct columns holding a note.
	#[must_use]
	pub fn column_with_objects(&self) -> usize {
		self.notes.iter().map(|note| note.column).collect::<HashSet<_>>().len()
	}

	/// Whether a note covering `span` in `column` would overlap a note of this pattern.
	#[must_use]
	pub fn conflicts(&self, column: i32, span: NoteSpan) -> bool {
		(self.notes.iter()).any(|note| note.column == column && note.span().conflicts_with(span))
	}

	pub fn push(&mut self, note: ManiaNote) {
		self.notes.push(note);
	}

	pub fn append(&mut self, other: Self) {
		self.notes.extend(other.notes);
	}

	/// Splits off the notes that end exactly at `end_time`.
	/// Returns `(others, ending)`.
	#[must_use]
	pub fn split_ending_at(self, end_time: Timestamp) -> (Self, Self) {
		let (ending, others): (Vec<_>, Vec<_>) =
			self.notes.into_iter().partition(|note| note.end_time == end_time);
		(Self { notes: others }, Self { notes: ending })
	}
}

/// Every note placed so far, per column. Consulted by each placement so that
/// no note ever starts inside a hold of the same column.
#[derive(Clone, Debug)]
pub struct ColumnOccupancy {
	columns: Vec<Vec<NoteSpan>>,
}

impl ColumnOccupancy {
	#[must_use]
	pub fn new(columns: i32) -> Self {
		let columns = usize::try_from(columns).unwrap_or_default();
		Self {
			columns: vec![Vec::new(); columns],
		}
	}

	fn spans(&self, column: i32) -> Option<&[NoteSpan]> {
		let column = usize::try_from(column).ok()?;
		self.columns.get(column).map(Vec::as_slice)
	}

	/// Whether `column` exists and nothing recorded in it overlaps `span`.
	#[must_use]
	pub fn is_free(&self, column: i32, span: NoteSpan) -> bool {
		self.spans(column)
			.is_some_and(|spans| !spans.iter().any(|recorded| recorded.conflicts_with(span)))
	}

	pub fn record(&mut self, note: &ManiaNote) {
		let column = usize::try_from(note.column).ok();
		if let Some(spans) = column.and_then(|column| self.columns.get_mut(column)) {
			spans.push(note.span());
		}
	}
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;

	use super::{ColumnOccupancy, ManiaNote, NoteSpan, Pattern, PatternType};
	use crate::file::beatmap::{kind, HitSound};

	#[test]
	fn pattern_type_display() {
		assert_eq!(PatternType::NONE.to_string(), "None");
		assert_eq!(
			(PatternType::FORCE_NOT_STACK | PatternType::KEEP_SINGLE | PatternType::STAIR).to_string(),
			"ForceNotStack, KeepSingle, Stair"
		);

		let mut pattern_type = PatternType::FORCE_NOT_STACK | PatternType::LOW_PROBABILITY;
		pattern_type.remove(PatternType::FORCE_NOT_STACK);
		assert_eq!(pattern_type, PatternType::LOW_PROBABILITY);
	}

	#[test]
	fn span_conflicts() {
		let hold = NoteSpan::new(1000, 2000);

		assert!(hold.conflicts_with(NoteSpan::at(1000)));
		assert!(hold.conflicts_with(NoteSpan::at(1999)));
		assert!(!hold.conflicts_with(NoteSpan::at(2000)));
		assert!(!hold.conflicts_with(NoteSpan::at(999)));
		assert!(NoteSpan::at(1500).conflicts_with(hold));
		assert!(NoteSpan::new(500, 1200).conflicts_with(hold));
		assert!(!NoteSpan::at(500).conflicts_with(NoteSpan::at(501)));
	}

	#[test]
	fn occupancy_reserves_holds() {
		let mut occupancy = ColumnOccupancy::new(4);
		occupancy.record(&ManiaNote::hold(2, 1000, 2000));

		assert!(!occupancy.is_free(2, NoteSpan::at(1500)));
		assert!(occupancy.is_free(2, NoteSpan::at(2000)));
		assert!(occupancy.is_free(1, NoteSpan::at(1500)));
		assert!(!occupancy.is_free(4, NoteSpan::at(0)));
		assert!(!occupancy.is_free(-1, NoteSpan::at(0)));
	}

	#[test]
	fn pattern_columns() {
		let mut pattern = Pattern::new();
		pattern.push(ManiaNote::circle(1, 100));
		pattern.push(ManiaNote::circle(1, 200));
		pattern.push(ManiaNote::hold(3, 100, 400));

		assert_eq!(pattern.first_column(), Some(1));
		assert_eq!(pattern.column_with_objects(), 2);
		assert!(pattern.conflicts(3, NoteSpan::at(300)));
		assert!(!pattern.conflicts(1, NoteSpan::at(300)));

		let (others, ending) = pattern.split_ending_at(400);
		assert_eq!(others.len(), 2);
		assert_eq!(ending.notes(), &[ManiaNote::hold(3, 100, 400)]);
	}

	#[test]
	fn notes_become_hit_objects() {
		let circle = ManiaNote::circle(1, 500).with_sounds(HitSound::CLAP, None);
		let hit_object = circle.to_hit_object(4);
		assert_eq!((hit_object.x, hit_object.y, hit_object.time), (128, 192, 500));
		assert_eq!(hit_object.hit_sound, HitSound::CLAP);
		assert!(hit_object.is::<kind::Circle>());

		let hold = ManiaNote::hold(3, 500, 900).to_hit_object(4);
		assert_eq!(hold.column_index(4), 3);
		assert_eq!(hold.get::<kind::Hold>().map(|p| p.end_time), Ok(900));
	}
}
