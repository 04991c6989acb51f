//! Conversion of circles, driven by the rhythm and spacing of the notes before them.

use super::generator::{random_note_count, ColumnSearch, GeneratorContext, PatternGenerator};
use super::pattern::{ManiaNote, NoteSpan, Pattern, PatternType};
use crate::file::beatmap::HitObject;
use crate::point::Point;
use crate::random::RandomEngine;

pub struct HitObjectPatternGenerator<'a> {
	ctx: GeneratorContext<'a>,
	/// Circles converted together. The first one is `ctx.hit_object`.
	group: &'a [HitObject],
	convert_type: PatternType,
	stair_type: PatternType,
}

impl<'a> HitObjectPatternGenerator<'a> {
	/// `previous_time` and `previous_position` describe the last converted note,
	/// `density` the average spacing in ms of the recent ones.
	#[must_use]
	pub fn new(
		ctx: GeneratorContext<'a>,
		group: &'a [HitObject],
		previous_time: i32,
		previous_position: Point,
		density: f64,
		last_stair: PatternType,
	) -> Self {
		let hit_object = ctx.hit_object;
		let thresholds = &ctx.config.time_thresholds;

		let position_separation = hit_object.position().distance_to(previous_position);
		let time_separation = hit_object.time.saturating_sub(previous_time);
		let close = position_separation < ctx.config.stack_distance;
		let dense_threshold = ctx.beat_length / ctx.config.density_divisor;

		let mut convert_type = PatternType::NONE;
		if time_separation <= thresholds.keep_single {
			convert_type |= PatternType::FORCE_NOT_STACK | PatternType::KEEP_SINGLE;
		} else if time_separation <= thresholds.keep_stair {
			convert_type |= PatternType::FORCE_NOT_STACK | PatternType::KEEP_SINGLE | last_stair;
		} else if time_separation <= thresholds.low_probability {
			convert_type |= PatternType::FORCE_NOT_STACK | PatternType::LOW_PROBABILITY;
		} else if time_separation <= thresholds.not_stacked {
			convert_type |= PatternType::FORCE_NOT_STACK;
		} else if time_separation <= thresholds.cycle && close {
			convert_type |= PatternType::CYCLE | PatternType::KEEP_SINGLE;
		} else if time_separation <= thresholds.stack && close {
			convert_type |= PatternType::FORCE_STACK | PatternType::LOW_PROBABILITY;
		} else if close && density >= dense_threshold {
			convert_type |= PatternType::REVERSE | PatternType::LOW_PROBABILITY;
		} else if density < dense_threshold || ctx.kiai {
			// high density
		} else {
			convert_type |= PatternType::LOW_PROBABILITY;
		}

		if !convert_type.has_any(PatternType::KEEP_SINGLE) {
			if hit_object.hit_sound.has_finish() && ctx.total_columns != 8 {
				convert_type |= PatternType::MIRROR;
			} else if hit_object.hit_sound.has_clap() {
				convert_type |= PatternType::GATHERED;
			}
		}

		Self {
			ctx,
			group,
			convert_type,
			stair_type: last_stair,
		}
	}

	#[must_use]
	pub const fn convert_type(&self) -> PatternType {
		self.convert_type
	}

	/// Stair direction the next circles should follow.
	#[must_use]
	pub const fn stair_type(&self) -> PatternType {
		self.stair_type
	}

	fn has(&self, flag: PatternType) -> bool {
		self.convert_type.has_any(flag)
	}

	fn note(&self, column: i32) -> ManiaNote {
		let hit_object = self.ctx.hit_object;
		ManiaNote::circle(column, hit_object.time).with_sounds(hit_object.hit_sound, hit_object.hit_sample.clone())
	}

	fn add(&self, rng: &mut RandomEngine, pattern: &mut Pattern, column: i32) {
		self.ctx.place(rng, pattern, self.note(column));
	}

	fn has_special_column(&self) -> bool {
		let hit_sound = self.ctx.hit_object.hit_sound;
		hit_sound.has_clap() && hit_sound.has_finish()
	}

	fn generate_core(&self, rng: &mut RandomEngine) -> Pattern {
		let ctx = &self.ctx;
		let total = ctx.total_columns;
		let random_start = ctx.random_start;
		let previous = ctx.previous_pattern;
		let mut pattern = Pattern::new();

		if total == 1 {
			self.add(rng, &mut pattern, 0);
			return pattern;
		}

		let last_column = previous.first_column().unwrap_or(0);

		if self.has(PatternType::REVERSE) && !previous.is_empty() {
			for column in random_start..total {
				if previous.column_has_object(column) {
					self.add(rng, &mut pattern, random_start + total - column - 1);
				}
			}
			return pattern;
		}

		if self.has(PatternType::CYCLE)
			&& previous.len() == 1
			&& (total != 8 || last_column != 0)
			&& (total % 2 == 0 || last_column != total / 2)
		{
			self.add(rng, &mut pattern, random_start + total - last_column - 1);
			return pattern;
		}

		if self.has(PatternType::FORCE_STACK) && !previous.is_empty() {
			for column in random_start..total {
				if previous.column_has_object(column) {
					self.add(rng, &mut pattern, column);
				}
			}
			return pattern;
		}

		if previous.len() == 1 {
			if self.has(PatternType::STAIR) {
				let mut column = last_column + 1;
				if column == total {
					column = random_start;
				}
				self.add(rng, &mut pattern, column);
				return pattern;
			}

			if self.has(PatternType::REVERSE_STAIR) {
				let mut column = last_column - 1;
				if column == random_start - 1 {
					column = total - 1;
				}
				self.add(rng, &mut pattern, column);
				return pattern;
			}
		}

		if self.has(PatternType::KEEP_SINGLE) {
			return self.generate_random_notes(rng, 1);
		}

		let difficulty = ctx.conversion_difficulty;
		let low = self.has(PatternType::LOW_PROBABILITY);

		if self.has(PatternType::MIRROR) {
			return if difficulty > 6.5 {
				self.generate_random_pattern_with_mirrored(rng, 0.12, 0.38, 0.12)
			} else if difficulty > 4. {
				self.generate_random_pattern_with_mirrored(rng, 0.12, 0.17, 0.)
			} else {
				self.generate_random_pattern_with_mirrored(rng, 0.12, 0., 0.)
			};
		}

		let odds = if difficulty > 6.5 {
			if low {
				[0.78, 0.42, 0., 0.]
			} else {
				[1., 0.62, 0., 0.]
			}
		} else if difficulty > 4. {
			if low {
				[0.35, 0.08, 0., 0.]
			} else {
				[0.52, 0.15, 0., 0.]
			}
		} else if difficulty > 2. {
			if low {
				[0.18, 0., 0., 0.]
			} else {
				[0.45, 0., 0., 0.]
			}
		} else {
			[0.; 4]
		};

		self.generate_random_pattern(rng, odds)
	}

	fn generate_random_notes(&self, rng: &mut RandomEngine, note_count: usize) -> Pattern {
		let ctx = &self.ctx;
		let time = ctx.hit_object.time;

		// the previous pattern only holds circles, so its columns stay usable as a last resort
		let (note_count, allow_stacking) = match ctx.usable_columns() {
			_ if !self.has(PatternType::FORCE_NOT_STACK) => (note_count, true),
			0 => {
				tracing::trace!("Stacking the circle at {time}ms: the previous pattern took every column");
				(note_count.min(1), true)
			}
			usable => (note_count.min(usable), false),
		};

		let total = ctx.total_columns;
		let random_start = ctx.random_start;
		let gathered = self.has(PatternType::GATHERED);

		let mut pattern = Pattern::new();
		let mut column = ctx.object_column();

		for _ in 0..note_count {
			let found = {
				let mut search = ColumnSearch::new()
					.next_with(move |last, rng: &mut RandomEngine| {
						if gathered {
							let next = last + 1;
							if next >= total {
								random_start
							} else {
								next
							}
						} else {
							rng.next_int(random_start, total - 1)
						}
					})
					.avoid(&pattern)
					.span(NoteSpan::at(time));

				if !allow_stacking {
					search = search.avoid(ctx.previous_pattern);
				}

				ctx.find_available_column(rng, column, &search)
			};

			let Some(found) = found else {
				tracing::trace!("No free column left for a note at {time}ms");
				break;
			};
			column = found;
			self.add(rng, &mut pattern, column);
		}

		pattern
	}

	/// Note count of a chord, capped for low column counts. Claps always ask for at least two notes.
	fn random_note_count(&self, rng: &mut RandomEngine, [mut p2, mut p3, mut p4, mut p5]: [f64; 4]) -> usize {
		match self.ctx.total_columns {
			2 => (p2, p3, p4, p5) = (0., 0., 0., 0.),
			3 => (p2, p3, p4, p5) = (p2.min(0.1), 0., 0., 0.),
			4 => (p2, p3, p4, p5) = (p2.min(0.23), p3.min(0.04), 0., 0.),
			5 => (p3, p4, p5) = (p3.min(0.15), p4.min(0.03), 0.),
			_ => {}
		}

		if self.ctx.hit_object.hit_sound.has_clap() {
			p2 = 1.;
		}

		random_note_count(rng, &[p2, p3, p4, p5])
	}

	/// Returns the note count and whether a note goes to the centre column.
	fn random_note_count_mirrored(
		&self,
		rng: &mut RandomEngine,
		mut centre_probability: f64,
		mut p2: f64,
		mut p3: f64,
	) -> (usize, bool) {
		let total = self.ctx.total_columns;
		match total {
			2 => (centre_probability, p2, p3) = (0., 0., 0.),
			3 => (centre_probability, p2, p3) = (centre_probability.min(0.03), 0., 0.),
			4 => {
				centre_probability = 0.;
				p2 = 1. - ((1. - p2) * 2.).max(0.8);
				p3 = 0.;
			}
			5 => (centre_probability, p3) = (centre_probability.min(0.03), 0.),
			6 => {
				centre_probability = 0.;
				p2 = 1. - ((1. - p2) * 2.).max(0.5);
				p3 = 1. - ((1. - p3) * 2.).max(0.85);
			}
			_ => {}
		}

		let p2 = p2.clamp(0., 1.);
		let p3 = p3.clamp(0., 1.);

		let centre_value = rng.next_real();
		let note_count = random_note_count(rng, &[p2, p3]);

		let add_to_centre = total % 2 != 0 && note_count != 3 && centre_value > 1. - centre_probability;
		(note_count, add_to_centre)
	}

	fn generate_random_pattern_with_mirrored(
		&self,
		rng: &mut RandomEngine,
		centre_probability: f64,
		p2: f64,
		p3: f64,
	) -> Pattern {
		if self.has(PatternType::FORCE_NOT_STACK) {
			return self.generate_random_pattern(rng, [0.5 + p2 / 2., p2, (p2 + p3) / 2., p3]);
		}

		let ctx = &self.ctx;
		let total = ctx.total_columns;
		let random_start = ctx.random_start;
		let time = ctx.hit_object.time;

		let (note_count, add_to_centre) = self.random_note_count_mirrored(rng, centre_probability, p2, p3);
		let column_limit = (if total % 2 == 0 { total } else { total - 1 }) / 2;

		let mut pattern = Pattern::new();
		let mut column = ctx.random_column(rng, None, Some(column_limit));

		for _ in 0..note_count {
			let found = {
				let search = ColumnSearch::new()
					.upper(column_limit)
					.avoid(&pattern)
					.span(NoteSpan::at(time));
				ctx.find_available_column(rng, column, &search)
			};

			let Some(found) = found else {
				break;
			};
			column = found;

			self.add(rng, &mut pattern, column);
			self.add(rng, &mut pattern, random_start + total - column - 1);
		}

		if add_to_centre {
			self.add(rng, &mut pattern, total / 2);
		}

		if random_start > 0 && self.has_special_column() {
			self.add(rng, &mut pattern, 0);
		}

		pattern
	}

	fn generate_random_pattern(&self, rng: &mut RandomEngine, odds: [f64; 4]) -> Pattern {
		let note_count = self.random_note_count(rng, odds);
		let mut pattern = self.generate_random_notes(rng, note_count);

		if self.ctx.random_start > 0 && self.has_special_column() {
			self.add(rng, &mut pattern, 0);
		}

		pattern
	}

	/// Circles of the same group land on distinct columns, as many as there are free ones.
	fn generate_simultaneous(&self, rng: &mut RandomEngine) -> Pattern {
		let ctx = &self.ctx;
		let mut pattern = Pattern::new();

		for hit_object in self.group {
			let found = {
				let search = ColumnSearch::new()
					.lower(0)
					.avoid(&pattern)
					.span(NoteSpan::at(hit_object.time));
				ctx.find_available_column(rng, hit_object.column_index(ctx.total_columns), &search)
			};

			let Some(column) = found else {
				tracing::trace!("No free column left for the circle at {}ms", hit_object.time);
				break;
			};

			let note = ManiaNote::circle(column, hit_object.time)
				.with_sounds(hit_object.hit_sound, hit_object.hit_sample.clone());
			ctx.place(rng, &mut pattern, note);
		}

		pattern
	}
}

impl PatternGenerator for HitObjectPatternGenerator<'_> {
	fn generate(&mut self, rng: &mut RandomEngine) -> Pattern {
		let pattern = if self.group.len() > 1 {
			self.generate_simultaneous(rng)
		} else {
			self.generate_core(rng)
		};

		for note in pattern.notes() {
			if self.has(PatternType::STAIR) && note.column == self.ctx.total_columns - 1 {
				self.stair_type = PatternType::REVERSE_STAIR;
			}
			if self.has(PatternType::REVERSE_STAIR) && note.column == self.ctx.random_start {
				self.stair_type = PatternType::STAIR;
			}
		}

		tracing::debug!(
			"Circle at {}ms ({}) -> {} note(s)",
			self.ctx.hit_object.time,
			self.convert_type,
			pattern.len()
		);

		pattern
	}
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;

	use super::HitObjectPatternGenerator;
	use crate::convert::config::ConversionConfig;
	use crate::convert::generator::tests::context;
	use crate::convert::generator::PatternGenerator;
	use crate::convert::pattern::{ColumnOccupancy, ManiaNote, Pattern, PatternType};
	use crate::file::beatmap::{BeatmapFile, HitObject, HitObjectParams, HitSound};
	use crate::point::Point;
	use crate::random::RandomEngine;

	fn circle(x: i32, time: i32) -> HitObject {
		HitObject::new(x, 192, time, HitObjectParams::Circle)
	}

	#[test]
	fn pattern_types_follow_spacing() {
		let beatmap = BeatmapFile::default();
		let config = ConversionConfig::default();
		let previous = Pattern::new();
		let occupancy = ColumnOccupancy::new(4);
		let origin = Point::new(256., 192.);

		let convert_type = |object: &HitObject, previous_time: i32, density: f64| {
			let group = std::slice::from_ref(object);
			let ctx = context(object, &beatmap, &previous, &occupancy, &config, 4);
			HitObjectPatternGenerator::new(ctx, group, previous_time, origin, density, PatternType::STAIR)
				.convert_type()
		};

		let near = circle(256, 1000);
		let far = circle(0, 1000);

		assert_eq!(
			convert_type(&near, 950, 100.),
			PatternType::FORCE_NOT_STACK | PatternType::KEEP_SINGLE
		);
		assert_eq!(
			convert_type(&near, 910, 100.),
			PatternType::FORCE_NOT_STACK | PatternType::KEEP_SINGLE | PatternType::STAIR
		);
		assert_eq!(
			convert_type(&near, 870, 100.),
			PatternType::CYCLE | PatternType::KEEP_SINGLE
		);
		assert_eq!(convert_type(&far, 870, 100.), PatternType::NONE);
		assert_eq!(
			convert_type(&near, 500, 300.),
			PatternType::REVERSE | PatternType::LOW_PROBABILITY
		);
		assert_eq!(convert_type(&far, 500, 300.), PatternType::LOW_PROBABILITY);

		let mut finish = circle(0, 1000);
		finish.hit_sound = HitSound::FINISH;
		assert_eq!(
			convert_type(&finish, 500, 300.),
			PatternType::LOW_PROBABILITY | PatternType::MIRROR
		);
	}

	#[test]
	fn stair_walks_and_turns() {
		let beatmap = BeatmapFile::default();
		let config = ConversionConfig::default();
		let occupancy = ColumnOccupancy::new(4);
		let mut rng = RandomEngine::new(0);

		let mut previous = Pattern::new();
		previous.push(ManiaNote::circle(2, 910));

		// 90ms after the last note, far away: keep walking the stair
		let object = circle(0, 1000);
		let group = std::slice::from_ref(&object);
		let ctx = context(&object, &beatmap, &previous, &occupancy, &config, 4);
		let mut generator =
			HitObjectPatternGenerator::new(ctx, group, 910, Point::new(0., 0.), 100., PatternType::STAIR);

		let pattern = generator.generate(&mut rng);
		assert_eq!(pattern.notes().iter().map(|n| n.column).collect::<Vec<_>>(), vec![3]);
		assert_eq!(generator.stair_type(), PatternType::REVERSE_STAIR);
	}

	#[test]
	fn finish_circles_mirror_around_the_centre() {
		let beatmap = BeatmapFile::default();
		let config = ConversionConfig::default();
		let previous = Pattern::new();
		let occupancy = ColumnOccupancy::new(7);

		let mut object = circle(0, 1000);
		object.hit_sound = HitSound::FINISH;
		let group = std::slice::from_ref(&object);

		for seed in 0..10 {
			let ctx = context(&object, &beatmap, &previous, &occupancy, &config, 7);
			let mut generator =
				HitObjectPatternGenerator::new(ctx, group, 500, Point::new(256., 192.), 300., PatternType::STAIR);
			assert!(generator.convert_type().has_any(PatternType::MIRROR));

			let pattern = generator.generate(&mut RandomEngine::new(seed));
			let mut columns: Vec<_> = pattern.notes().iter().map(|n| n.column).collect();
			columns.sort_unstable();

			let mut mirrored: Vec<_> = columns.iter().map(|c| 6 - c).collect();
			mirrored.sort_unstable();
			assert_eq!(columns, mirrored, "seed {seed}");
		}
	}

	#[test]
	fn full_previous_row_still_leaves_room() {
		let beatmap = BeatmapFile::default();
		let config = ConversionConfig::default();

		let mut previous = Pattern::new();
		previous.push(ManiaNote::circle(0, 0));
		previous.push(ManiaNote::circle(1, 0));

		let mut occupancy = ColumnOccupancy::new(2);
		for note in previous.notes() {
			occupancy.record(note);
		}

		let object = circle(256, 50);
		let group = std::slice::from_ref(&object);

		for seed in 0..5 {
			let ctx = context(&object, &beatmap, &previous, &occupancy, &config, 2);
			let mut generator =
				HitObjectPatternGenerator::new(ctx, group, 0, Point::new(256., 192.), 100., PatternType::STAIR);
			assert!(generator.convert_type().has_any(PatternType::FORCE_NOT_STACK));

			let pattern = generator.generate(&mut RandomEngine::new(seed));
			assert_eq!(pattern.len(), 1);
			assert_eq!(pattern.notes()[0].start_time, 50);
		}
	}

	#[test]
	fn simultaneous_circles_take_distinct_columns() {
		let beatmap = BeatmapFile::default();
		let config = ConversionConfig::default();
		let previous = Pattern::new();
		let occupancy = ColumnOccupancy::new(3);

		let group: Vec<_> = (0..5).map(|i| circle(i * 100, 2000)).collect();
		let ctx = context(&group[0], &beatmap, &previous, &occupancy, &config, 3);
		let mut generator =
			HitObjectPatternGenerator::new(ctx, &group, 0, Point::new(0., 0.), 0., PatternType::STAIR);

		let pattern = generator.generate(&mut RandomEngine::new(42));
		assert_eq!(pattern.len(), 3);
		assert_eq!(pattern.column_with_objects(), 3);
		assert!(pattern.notes().iter().all(|n| n.start_time == 2000));
	}
}
