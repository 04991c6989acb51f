//! Shared machinery of the pattern generators.

use super::config::ConversionConfig;
use super::pattern::{ColumnOccupancy, ManiaNote, NoteSpan, Pattern};
use crate::file::beatmap::{BeatmapFile, HitObject};
use crate::random::RandomEngine;

/// Random column walks give up after this many steps and fall back to a linear scan.
const MAX_SEARCH_STEPS: usize = 1024;

pub trait PatternGenerator {
	fn generate(&mut self, rng: &mut RandomEngine) -> Pattern;
}

/// First column picked at random. The leftmost column of 8K charts is kept for special notes.
#[must_use]
pub const fn random_start(total_columns: i32) -> i32 {
	if total_columns == 8 {
		1
	} else {
		0
	}
}

/// Draws a note count from the probabilities of getting 2, 3, 4... notes.
///
/// `odds[0]` is the probability for 2 notes, `odds[1]` for 3 notes, and so on.
/// Higher counts are checked first.
pub fn random_note_count(rng: &mut RandomEngine, odds: &[f64]) -> usize {
	let value = rng.next_real();

	for (i, probability) in odds.iter().enumerate().rev() {
		if value >= 1. - probability {
			return i + 2;
		}
	}

	1
}

type NextColumn<'p> = Box<dyn Fn(i32, &mut RandomEngine) -> i32 + 'p>;
type ColumnValidator<'p> = Box<dyn Fn(i32) -> bool + 'p>;

/// Constraints of a [`GeneratorContext::find_available_column`] call.
#[derive(Default)]
pub struct ColumnSearch<'p> {
	lower: Option<i32>,
	upper: Option<i32>,
	next: Option<NextColumn<'p>>,
	validator: Option<ColumnValidator<'p>>,
	patterns: Vec<&'p Pattern>,
	span: Option<NoteSpan>,
}

impl<'p> ColumnSearch<'p> {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	/// Lowest column picked at random. Defaults to the context's random start.
	#[must_use]
	pub const fn lower(mut self, lower: i32) -> Self {
		self.lower = Some(lower);
		self
	}

	/// Exclusive upper bound of the columns picked at random. Defaults to the column count.
	#[must_use]
	pub const fn upper(mut self, upper: i32) -> Self {
		self.upper = Some(upper);
		self
	}

	/// Walks columns with `next` instead of picking them at random.
	#[must_use]
	pub fn next_with(mut self, next: impl Fn(i32, &mut RandomEngine) -> i32 + 'p) -> Self {
		self.next = Some(Box::new(next));
		self
	}

	#[must_use]
	pub fn validate(mut self, validator: impl Fn(i32) -> bool + 'p) -> Self {
		self.validator = Some(Box::new(validator));
		self
	}

	/// Rejects columns that hold any note of `pattern`.
	#[must_use]
	pub fn avoid(mut self, pattern: &'p Pattern) -> Self {
		self.patterns.push(pattern);
		self
	}

	/// Rejects columns where a note covering `span` would overlap an already placed note.
	#[must_use]
	pub const fn span(mut self, span: NoteSpan) -> Self {
		self.span = Some(span);
		self
	}
}

/// Everything a generator knows about the object it converts.
#[derive(Clone, Copy, Debug)]
pub struct GeneratorContext<'a> {
	pub hit_object: &'a HitObject,
	pub beatmap: &'a BeatmapFile,
	pub previous_pattern: &'a Pattern,
	pub occupancy: &'a ColumnOccupancy,
	pub total_columns: i32,
	pub random_start: i32,
	/// Rough difficulty of the source chart, between 0 and 12.
	pub conversion_difficulty: f64,
	/// Beat length of the uninherited timing point active at the object.
	pub beat_length: f64,
	pub kiai: bool,
	pub config: &'a ConversionConfig,
}

impl GeneratorContext<'_> {
	/// Random column in `[lower, upper)`, bounds defaulting to the random start and the column count.
	pub fn random_column(&self, rng: &mut RandomEngine, lower: Option<i32>, upper: Option<i32>) -> i32 {
		let lower = lower.unwrap_or(self.random_start);
		let upper = upper.unwrap_or(self.total_columns);
		rng.next_int(lower, upper - 1)
	}

	/// Column of the source object in the converted chart.
	#[must_use]
	pub fn object_column(&self) -> i32 {
		self.hit_object.column_index(self.total_columns)
	}

	/// Columns left once those of the previous pattern and the reserved ones are taken out.
	#[must_use]
	pub fn usable_columns(&self) -> usize {
		usize::try_from(self.total_columns - self.random_start)
			.unwrap_or_default()
			.saturating_sub(self.previous_pattern.column_with_objects())
	}

	#[must_use]
	pub fn is_placeable(&self, pattern: &Pattern, column: i32, span: NoteSpan) -> bool {
		(0..self.total_columns).contains(&column)
			&& !pattern.conflicts(column, span)
			&& self.occupancy.is_free(column, span)
	}

	/// Finds a column satisfying `search`, starting with `initial`.
	///
	/// `None` if no column between the search bounds is valid.
	pub fn find_available_column(
		&self,
		rng: &mut RandomEngine,
		initial: i32,
		search: &ColumnSearch<'_>,
	) -> Option<i32> {
		let lower = search.lower.unwrap_or(self.random_start);
		let upper = search.upper.unwrap_or(self.total_columns);

		let is_valid = |column: i32| {
			(0..self.total_columns).contains(&column)
				&& search.validator.as_ref().map_or(true, |validator| validator(column))
				&& !search.patterns.iter().any(|pattern| pattern.column_has_object(column))
				&& search.span.map_or(true, |span| self.occupancy.is_free(column, span))
		};

		if is_valid(initial) {
			return Some(initial);
		}

		if !(lower..upper).any(is_valid) {
			return None;
		}

		let mut column = initial;
		for _ in 0..MAX_SEARCH_STEPS {
			column = match &search.next {
				Some(next) => next(column, rng),
				None => rng.next_int(lower, upper - 1),
			};

			if is_valid(column) {
				return Some(column);
			}
		}

		(lower..upper).find(|&column| is_valid(column))
	}

	/// Adds `note` to `pattern`, moving it to a random free column if its own can't take it.
	/// The note is dropped when no column can.
	pub fn place(&self, rng: &mut RandomEngine, pattern: &mut Pattern, mut note: ManiaNote) {
		let span = note.span();

		if !self.is_placeable(pattern, note.column, span) {
			let taken: &Pattern = pattern;
			let search = ColumnSearch::new()
				.span(span)
				.validate(|column| !taken.conflicts(column, span));

			let Some(column) = self.find_available_column(rng, note.column, &search) else {
				tracing::trace!(
					"Dropping note at {}ms in column {}: no free column",
					note.start_time,
					note.column
				);
				return;
			};

			note.column = column;
		}

		pattern.push(note);
	}
}

#[cfg(test)]
pub(crate) mod tests {
	use pretty_assertions::assert_eq;

	use super::{random_note_count, ColumnSearch, GeneratorContext};
	use crate::convert::config::ConversionConfig;
	use crate::convert::pattern::{ColumnOccupancy, ManiaNote, NoteSpan, Pattern};
	use crate::file::beatmap::{BeatmapFile, HitObject, HitObjectParams};
	use crate::random::RandomEngine;

	pub(crate) fn context<'a>(
		hit_object: &'a HitObject,
		beatmap: &'a BeatmapFile,
		previous_pattern: &'a Pattern,
		occupancy: &'a ColumnOccupancy,
		config: &'a ConversionConfig,
		total_columns: i32,
	) -> GeneratorContext<'a> {
		GeneratorContext {
			hit_object,
			beatmap,
			previous_pattern,
			occupancy,
			total_columns,
			random_start: super::random_start(total_columns),
			conversion_difficulty: 5.,
			beat_length: 500.,
			kiai: false,
			config,
		}
	}

	#[test]
	fn note_counts() {
		let mut rng = RandomEngine::new(7);

		for _ in 0..32 {
			assert_eq!(random_note_count(&mut rng, &[0., 0.]), 1);
			assert_eq!(random_note_count(&mut rng, &[1., 0.]), 2);
			assert_eq!(random_note_count(&mut rng, &[1., 1., 1.]), 4);

			let count = random_note_count(&mut rng, &[0.5, 0.2]);
			assert!((1..=3).contains(&count));
		}
	}

	#[test]
	fn available_columns() {
		let circle = HitObject::new(0, 0, 1000, HitObjectParams::Circle);
		let beatmap = BeatmapFile::default();
		let config = ConversionConfig::default();

		let mut previous = Pattern::new();
		previous.push(ManiaNote::circle(0, 900));
		previous.push(ManiaNote::circle(1, 900));

		let mut occupancy = ColumnOccupancy::new(4);
		occupancy.record(&ManiaNote::hold(2, 500, 1500));

		let ctx = context(&circle, &beatmap, &previous, &occupancy, &config, 4);
		let mut rng = RandomEngine::new(1);

		let search = ColumnSearch::new().avoid(&previous).span(NoteSpan::at(1000));
		assert_eq!(ctx.find_available_column(&mut rng, 0, &search), Some(3));

		let search = ColumnSearch::new()
			.avoid(&previous)
			.span(NoteSpan::at(1000))
			.validate(|column| column != 3);
		assert_eq!(ctx.find_available_column(&mut rng, 0, &search), None);

		// the hold is over by then
		let search = ColumnSearch::new().avoid(&previous).span(NoteSpan::at(1500)).upper(3);
		assert_eq!(ctx.find_available_column(&mut rng, 0, &search), Some(2));
	}

	#[test]
	fn placement_moves_or_drops_notes() {
		let circle = HitObject::new(0, 0, 1000, HitObjectParams::Circle);
		let beatmap = BeatmapFile::default();
		let config = ConversionConfig::default();
		let previous = Pattern::new();

		let mut occupancy = ColumnOccupancy::new(2);
		occupancy.record(&ManiaNote::hold(0, 0, 5000));

		let ctx = context(&circle, &beatmap, &previous, &occupancy, &config, 2);
		let mut rng = RandomEngine::new(3);
		let mut pattern = Pattern::new();

		ctx.place(&mut rng, &mut pattern, ManiaNote::circle(0, 1000));
		assert_eq!(pattern.notes(), &[ManiaNote::circle(1, 1000)]);

		ctx.place(&mut rng, &mut pattern, ManiaNote::circle(1, 1000));
		assert_eq!(pattern.len(), 1);

		ctx.place(&mut rng, &mut pattern, ManiaNote::circle(1, 1200));
		assert_eq!(pattern.len(), 2);
	}
}
