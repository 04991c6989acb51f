//! Conversion of objects with a duration: sliders, spinners and holds.

use super::generator::{random_note_count, ColumnSearch, GeneratorContext, PatternGenerator};
use super::pattern::{ManiaNote, NoteSpan, Pattern, PatternType};
use crate::file::beatmap::{BeatmapFile, HitObject, HitSound, SliderParams, Timestamp, MAX_SLIDES};
use crate::random::RandomEngine;

/// Where the edges of a slider fall in time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SliderTiming {
	pub start_time: Timestamp,
	pub end_time: Timestamp,
	/// Number of times the slider's curve is travelled.
	pub span_count: i32,
	pub segment_duration: i32,
}

impl SliderTiming {
	/// `None` if no uninherited timing point precedes the slider.
	#[must_use]
	#[allow(clippy::cast_possible_truncation)]
	pub fn of(beatmap: &BeatmapFile, hit_object: &HitObject, slider: &SliderParams) -> Option<Self> {
		let duration = beatmap.slider_duration(hit_object.time, slider)?;
		let start_time = hit_object.time;
		let end_time = start_time.saturating_add(duration.max(0.).floor() as Timestamp);
		let span_count = i32::try_from(slider.slides.clamp(1, MAX_SLIDES)).unwrap_or(1);

		Some(Self {
			start_time,
			end_time,
			span_count,
			segment_duration: end_time.saturating_sub(start_time) / span_count,
		})
	}

	/// Times of the slider's edges, head and tail included.
	pub fn node_times(self) -> impl Iterator<Item = Timestamp> {
		(0..=self.span_count).map(move |i| self.start_time + self.segment_duration * i)
	}
}

pub struct DistanceObjectPatternGenerator<'a> {
	ctx: GeneratorContext<'a>,
	slider: &'a SliderParams,
	timing: SliderTiming,
	convert_type: PatternType,
}

impl<'a> DistanceObjectPatternGenerator<'a> {
	#[must_use]
	pub fn new(ctx: GeneratorContext<'a>, slider: &'a SliderParams, timing: SliderTiming) -> Self {
		let convert_type = if ctx.kiai {
			PatternType::NONE
		} else {
			PatternType::LOW_PROBABILITY
		};

		Self {
			ctx,
			slider,
			timing,
			convert_type,
		}
	}

	#[must_use]
	pub const fn convert_type(&self) -> PatternType {
		self.convert_type
	}

	fn has(&self, flag: PatternType) -> bool {
		self.convert_type.has_any(flag)
	}

	fn spans(&self) -> usize {
		usize::try_from(self.timing.span_count).unwrap_or(1)
	}

	/// Hit sound of the slider edge at or right before `time`.
	fn sound_at(&self, time: Timestamp) -> HitSound {
		let SliderTiming {
			start_time,
			segment_duration,
			..
		} = self.timing;

		let index = if segment_duration == 0 {
			0
		} else {
			(time - start_time) / segment_duration
		};

		usize::try_from(index)
			.ok()
			.and_then(|index| self.slider.edge_hitsounds.get(index).copied())
			.unwrap_or(self.ctx.hit_object.hit_sound)
	}

	fn add(&self, rng: &mut RandomEngine, pattern: &mut Pattern, column: i32, start: Timestamp, end: Timestamp) {
		let note = ManiaNote::hold(column, start, end)
			.with_sounds(self.sound_at(start), self.ctx.hit_object.hit_sample.clone());
		self.ctx.place(rng, pattern, note);
	}

	/// Column away from the previous pattern, if the conversion asks for it and one is left.
	fn unstacked_column(&self, rng: &mut RandomEngine, column: i32, span: NoteSpan) -> i32 {
		let ctx = &self.ctx;
		let columns = usize::try_from(ctx.total_columns).unwrap_or_default();

		if self.has(PatternType::FORCE_NOT_STACK) && ctx.previous_pattern.column_with_objects() < columns {
			let search = ColumnSearch::new().avoid(ctx.previous_pattern).span(span);
			ctx.find_available_column(rng, column, &search).unwrap_or(column)
		} else {
			column
		}
	}

	fn generate_random_hold_notes(&self, rng: &mut RandomEngine, start: Timestamp, note_count: usize) -> Pattern {
		// - - - -
		// ■ - ■ ■
		// □ - □ □
		// ■ - ■ ■

		let ctx = &self.ctx;
		let end = self.timing.end_time;
		let span = NoteSpan::new(start, end);
		let usable = ctx.usable_columns();

		let mut pattern = Pattern::new();
		let mut column = ctx.random_column(rng, None, None);

		for i in 0..note_count {
			let found = {
				let mut search = ColumnSearch::new().avoid(&pattern).span(span);
				if i < usable {
					search = search.avoid(ctx.previous_pattern);
				}
				ctx.find_available_column(rng, column, &search)
			};

			let Some(found) = found else {
				break;
			};
			column = found;
			self.add(rng, &mut pattern, column, start, end);
		}

		pattern
	}

	fn generate_random_notes(&self, rng: &mut RandomEngine, start: Timestamp, note_count: usize) -> Pattern {
		// - - - -
		// x - - -
		// - - x -
		// - - - x
		// x - - -

		let ctx = &self.ctx;
		let mut pattern = Pattern::new();

		let mut column = self.unstacked_column(rng, ctx.object_column(), NoteSpan::at(start));
		let mut time = start;

		for _ in 0..note_count {
			self.add(rng, &mut pattern, column, time, time);
			time = time.saturating_add(self.timing.segment_duration);

			let last = column;
			let search = ColumnSearch::new()
				.validate(move |c| c != last)
				.span(NoteSpan::at(time));
			let Some(found) = ctx.find_available_column(rng, column, &search) else {
				break;
			};
			column = found;
		}

		pattern
	}

	fn generate_stair(&self, rng: &mut RandomEngine, start: Timestamp) -> Pattern {
		// - - - -
		// x - - -
		// - x - -
		// - - x -
		// - - - x
		// - - x -
		// - x - -
		// x - - -

		let ctx = &self.ctx;
		let mut pattern = Pattern::new();

		let mut column = ctx.object_column();
		let mut increasing = rng.next_bool();
		let mut time = start;

		for _ in 0..=self.spans() {
			self.add(rng, &mut pattern, column, time, time);
			time = time.saturating_add(self.timing.segment_duration);

			// bounce off the borders of the stage
			if increasing {
				if column >= ctx.total_columns - 1 {
					increasing = false;
					column -= 1;
				} else {
					column += 1;
				}
			} else if column <= ctx.random_start {
				increasing = true;
				column += 1;
			} else {
				column -= 1;
			}
		}

		pattern
	}

	fn generate_random_multiple_notes(&self, rng: &mut RandomEngine, start: Timestamp) -> Pattern {
		// - - - -
		// x - - -
		// - x x -
		// - - - x
		// x - x -

		let ctx = &self.ctx;
		let total = ctx.total_columns;
		let legacy = i32::from((4..=8).contains(&total));
		let interval = rng.next_int(1, total - legacy - 1);

		let mut pattern = Pattern::new();
		let mut column = ctx.object_column();
		let mut time = start;

		for _ in 0..=self.spans() {
			self.add(rng, &mut pattern, column, time, time);

			column += interval;
			if column >= total - ctx.random_start {
				column = column - total - ctx.random_start + legacy;
			}
			column += ctx.random_start;

			// no long runs of doubles in 2K
			if total > 2 {
				self.add(rng, &mut pattern, column, time, time);
			}

			column = ctx.random_column(rng, None, None);
			time = time.saturating_add(self.timing.segment_duration);
		}

		pattern
	}

	fn generate_n_random_notes(
		&self,
		rng: &mut RandomEngine,
		start: Timestamp,
		mut p2: f64,
		mut p3: f64,
		mut p4: f64,
	) -> Pattern {
		match self.ctx.total_columns {
			2 => (p2, p3, p4) = (0., 0., 0.),
			3 => (p2, p3, p4) = (p2.min(0.1), 0., 0.),
			4 => (p2, p3, p4) = (p2.min(0.3), p3.min(0.04), 0.),
			5 => (p2, p3, p4) = (p2.min(0.34), p3.min(0.1), p4.min(0.03)),
			_ => {}
		}

		let sound = self.sound_at(start);
		if !self.has(PatternType::LOW_PROBABILITY) && (sound.has_clap() || sound.has_finish()) {
			p2 = 1.;
		}

		let note_count = random_note_count(rng, &[p2, p3, p4]);
		self.generate_random_hold_notes(rng, start, note_count)
	}

	fn generate_tiled_hold_notes(&self, rng: &mut RandomEngine, start: Timestamp) -> Pattern {
		// - - - -
		// ■ ■ ■ ■
		// □ □ □ □
		// □ □ □ □
		// □ □ □ ■
		// □ □ ■ -
		// □ ■ - -
		// ■ - - -

		let ctx = &self.ctx;
		let SliderTiming {
			span_count,
			segment_duration,
			..
		} = self.timing;

		let column_repeat = span_count.min(ctx.total_columns);
		// integer rounding may make this earlier than the slider's end time
		let end = start + segment_duration * span_count;

		let mut pattern = Pattern::new();
		let mut column = self.unstacked_column(rng, ctx.object_column(), NoteSpan::new(start, end));
		let mut time = start;

		for _ in 0..column_repeat {
			let found = {
				let search = ColumnSearch::new().avoid(&pattern).span(NoteSpan::new(time, end));
				ctx.find_available_column(rng, column, &search)
			};

			let Some(found) = found else {
				break;
			};
			column = found;
			self.add(rng, &mut pattern, column, time, end);
			time = time.saturating_add(segment_duration);
		}

		pattern
	}

	fn generate_hold_and_normal_notes(&self, rng: &mut RandomEngine, start: Timestamp) -> Pattern {
		// - - - -
		// ■ x x -
		// ■ - x x
		// ■ x - x
		// ■ - x x

		let ctx = &self.ctx;
		let total = ctx.total_columns;
		let end = self.timing.end_time;

		let mut pattern = Pattern::new();
		let hold_column = self.unstacked_column(rng, ctx.object_column(), NoteSpan::new(start, end));
		self.add(rng, &mut pattern, hold_column, start, end);
		let hold_column = pattern.first_column().unwrap_or(hold_column);

		let mut column = ctx.random_column(rng, None, None);

		let difficulty = ctx.conversion_difficulty;
		let note_count = if difficulty > 6.5 {
			random_note_count(rng, &[0.63, 0.])
		} else if difficulty > 4. {
			random_note_count(rng, &[if total < 6 { 0.12 } else { 0.45 }, 0.])
		} else if difficulty > 2.5 {
			random_note_count(rng, &[if total < 6 { 0. } else { 0.24 }, 0.])
		} else {
			0
		};
		let note_count = note_count.min(usize::try_from(total - 1).unwrap_or_default());

		let head = self.sound_at(start);
		let ignore_head = !(head.has_whistle() || head.has_finish() || head.has_clap());

		let mut time = start;
		for _ in 0..=self.spans() {
			let mut row = Pattern::new();

			if !(ignore_head && time == start) {
				for _ in 0..note_count {
					let found = {
						let search = ColumnSearch::new()
							.validate(|c| c != hold_column)
							.avoid(&row)
							.span(NoteSpan::at(time));
						ctx.find_available_column(rng, column, &search)
					};

					let Some(found) = found else {
						break;
					};
					column = found;
					self.add(rng, &mut row, column, time, time);
				}
			}

			pattern.append(row);
			time = time.saturating_add(self.timing.segment_duration);
		}

		pattern
	}
}

impl PatternGenerator for DistanceObjectPatternGenerator<'_> {
	fn generate(&mut self, rng: &mut RandomEngine) -> Pattern {
		let SliderTiming {
			start_time: start,
			end_time: end,
			span_count,
			segment_duration,
		} = self.timing;
		let total = self.ctx.total_columns;

		if total == 1 {
			let mut pattern = Pattern::new();
			self.add(rng, &mut pattern, 0, start, end);
			return pattern;
		}

		let difficulty = self.ctx.conversion_difficulty;
		let low = self.has(PatternType::LOW_PROBABILITY);

		let pattern = if span_count > 1 {
			if segment_duration <= 90 {
				self.generate_random_hold_notes(rng, start, 1)
			} else if segment_duration <= 120 {
				self.convert_type |= PatternType::FORCE_NOT_STACK;
				self.generate_random_notes(rng, start, self.spans() + 1)
			} else if segment_duration <= 160 {
				self.generate_stair(rng, start)
			} else if segment_duration <= 200 && difficulty > 3. {
				self.generate_random_multiple_notes(rng, start)
			} else if end.saturating_sub(start) >= 4000 {
				self.generate_n_random_notes(rng, start, 0.23, 0., 0.)
			} else if segment_duration > 400 && span_count < total - 1 - self.ctx.random_start {
				self.generate_tiled_hold_notes(rng, start)
			} else {
				self.generate_hold_and_normal_notes(rng, start)
			}
		} else if segment_duration <= 110 {
			let columns = usize::try_from(total).unwrap_or_default();
			if self.ctx.previous_pattern.column_with_objects() < columns {
				self.convert_type |= PatternType::FORCE_NOT_STACK;
			} else {
				self.convert_type.remove(PatternType::FORCE_NOT_STACK);
			}
			self.generate_random_notes(rng, start, if segment_duration < 80 { 1 } else { 2 })
		} else if difficulty > 6.5 {
			if low {
				self.generate_n_random_notes(rng, start, 0.78, 0.3, 0.)
			} else {
				self.generate_n_random_notes(rng, start, 0.85, 0.36, 0.03)
			}
		} else if difficulty > 4. {
			if low {
				self.generate_n_random_notes(rng, start, 0.43, 0.08, 0.)
			} else {
				self.generate_n_random_notes(rng, start, 0.56, 0.18, 0.)
			}
		} else if difficulty > 2.5 {
			if low {
				self.generate_n_random_notes(rng, start, 0.3, 0., 0.)
			} else {
				self.generate_n_random_notes(rng, start, 0.37, 0.08, 0.)
			}
		} else if low {
			self.generate_n_random_notes(rng, start, 0.17, 0., 0.)
		} else {
			self.generate_n_random_notes(rng, start, 0.27, 0., 0.)
		};

		tracing::debug!(
			"Slider at {start}ms, {span_count} span(s) of {segment_duration}ms ({}) -> {} note(s)",
			self.convert_type,
			pattern.len()
		);

		pattern
	}
}

/// Spinners and holds: one note spanning the whole object.
pub struct EndTimeObjectPatternGenerator<'a> {
	ctx: GeneratorContext<'a>,
	end_time: Timestamp,
}

impl<'a> EndTimeObjectPatternGenerator<'a> {
	#[must_use]
	pub const fn new(ctx: GeneratorContext<'a>, end_time: Timestamp) -> Self {
		Self { ctx, end_time }
	}
}

impl PatternGenerator for EndTimeObjectPatternGenerator<'_> {
	fn generate(&mut self, rng: &mut RandomEngine) -> Pattern {
		let ctx = &self.ctx;
		let hit_object = ctx.hit_object;
		let start = hit_object.time;
		let duration = self.end_time.saturating_sub(start);

		let end = if duration >= ctx.config.short_hold {
			self.end_time
		} else {
			start
		};
		let span = NoteSpan::new(start, end);

		let column = if ctx.total_columns == 8 {
			if hit_object.hit_sound.has_finish() && duration < 1000 {
				0
			} else {
				let initial = ctx.random_column(rng, None, None);
				let search = ColumnSearch::new().avoid(ctx.previous_pattern).span(span);
				ctx.find_available_column(rng, initial, &search).unwrap_or(initial)
			}
		} else {
			ctx.random_column(rng, Some(0), None)
		};

		let mut pattern = Pattern::new();
		let note = ManiaNote::hold(column, start, end)
			.with_sounds(hit_object.hit_sound, hit_object.hit_sample.clone());
		ctx.place(rng, &mut pattern, note);

		tracing::debug!(
			"{} from {start}ms to {}ms -> {} note(s)",
			hit_object.object_type(),
			self.end_time,
			pattern.len()
		);

		pattern
	}
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;

	use super::{DistanceObjectPatternGenerator, EndTimeObjectPatternGenerator, SliderTiming};
	use crate::convert::config::ConversionConfig;
	use crate::convert::generator::tests::context;
	use crate::convert::generator::PatternGenerator;
	use crate::convert::pattern::{ColumnOccupancy, ManiaNote, Pattern};
	use crate::file::beatmap::{
		BeatmapFile, HitObject, HitObjectParams, SliderCurveType, SliderParams, SpinnerParams, TimingPoint,
	};
	use crate::random::RandomEngine;

	fn beatmap() -> BeatmapFile {
		let mut beatmap = BeatmapFile {
			timing_points: vec![TimingPoint {
				time: 0,
				beat_length: 500.,
				..TimingPoint::default()
			}],
			..BeatmapFile::default()
		};
		// 100 osu! pixels per beat
		beatmap.difficulty.slider_multiplier = 1.;
		beatmap
	}

	fn slider(time: i32, slides: u32, length: f64) -> HitObject {
		HitObject::new(
			0,
			192,
			time,
			HitObjectParams::Slider(SliderParams {
				first_curve_type: SliderCurveType::Linear,
				curve_points: Vec::new(),
				slides,
				length,
				edge_hitsounds: Vec::new(),
				edge_samplesets: Vec::new(),
			}),
		)
	}

	fn convert_slider(object: &HitObject, columns: i32, seed: u64) -> Pattern {
		let beatmap = beatmap();
		let config = ConversionConfig::default();
		let previous = Pattern::new();
		let occupancy = ColumnOccupancy::new(columns);

		let HitObjectParams::Slider(params) = &object.params else {
			panic!("not a slider");
		};
		let timing = SliderTiming::of(&beatmap, object, params).unwrap();
		let ctx = context(object, &beatmap, &previous, &occupancy, &config, columns);

		DistanceObjectPatternGenerator::new(ctx, params, timing).generate(&mut RandomEngine::new(seed))
	}

	#[test]
	fn slider_timing() {
		let beatmap = beatmap();
		let object = slider(1000, 2, 100.);
		let HitObjectParams::Slider(params) = &object.params else {
			panic!("not a slider");
		};

		let timing = SliderTiming::of(&beatmap, &object, params).unwrap();
		assert_eq!(
			timing,
			SliderTiming {
				start_time: 1000,
				end_time: 2000,
				span_count: 2,
				segment_duration: 500,
			}
		);
		assert_eq!(timing.node_times().collect::<Vec<_>>(), vec![1000, 1500, 2000]);

		assert!(SliderTiming::of(&BeatmapFile::default(), &object, params).is_none());
	}

	#[test]
	fn fast_repeats_become_one_hold() {
		// 3 spans of 62.5ms
		let pattern = convert_slider(&slider(1000, 3, 12.5), 4, 42);

		assert_eq!(pattern.len(), 1);
		let note = &pattern.notes()[0];
		assert_eq!((note.start_time, note.end_time), (1000, 1187));
		assert!((0..4).contains(&note.column));
	}

	#[test]
	fn slow_repeats_tile_holds() {
		// 2 spans of 500ms on 7 columns
		let pattern = convert_slider(&slider(1000, 2, 100.), 7, 42);

		let spans: Vec<_> = pattern.notes().iter().map(|n| (n.start_time, n.end_time)).collect();
		assert_eq!(spans, vec![(1000, 2000), (1500, 2000)]);
		assert_eq!(pattern.column_with_objects(), 2);
	}

	#[test]
	fn spinners_span_their_duration() {
		let beatmap = beatmap();
		let config = ConversionConfig::default();
		let previous = Pattern::new();
		let occupancy = ColumnOccupancy::new(4);
		let mut rng = RandomEngine::new(42);

		let spinner = HitObject::new(256, 192, 1000, HitObjectParams::Spinner(SpinnerParams { end_time: 3000 }));
		let ctx = context(&spinner, &beatmap, &previous, &occupancy, &config, 4);
		let pattern = EndTimeObjectPatternGenerator::new(ctx, 3000).generate(&mut rng);
		assert_eq!(pattern.len(), 1);
		assert_eq!((pattern.notes()[0].start_time, pattern.notes()[0].end_time), (1000, 3000));

		let short = HitObject::new(256, 192, 1000, HitObjectParams::Spinner(SpinnerParams { end_time: 1050 }));
		let ctx = context(&short, &beatmap, &previous, &occupancy, &config, 4);
		let pattern = EndTimeObjectPatternGenerator::new(ctx, 1050).generate(&mut rng);
		assert_eq!(pattern.len(), 1);
		assert!(!pattern.notes()[0].is_hold());
	}

	#[test]
	fn generated_holds_respect_reservations() {
		let beatmap = beatmap();
		let config = ConversionConfig::default();
		let previous = Pattern::new();

		let mut occupancy = ColumnOccupancy::new(2);
		occupancy.record(&ManiaNote::hold(0, 0, 10_000));
		occupancy.record(&ManiaNote::hold(1, 0, 10_000));

		let spinner = HitObject::new(256, 192, 1000, HitObjectParams::Spinner(SpinnerParams { end_time: 3000 }));
		let ctx = context(&spinner, &beatmap, &previous, &occupancy, &config, 2);
		let pattern = EndTimeObjectPatternGenerator::new(ctx, 3000).generate(&mut RandomEngine::new(1));
		assert!(pattern.is_empty());
	}
}
