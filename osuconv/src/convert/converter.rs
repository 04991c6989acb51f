use std::collections::VecDeque;

use super::config::ConversionConfig;
use super::distance::{DistanceObjectPatternGenerator, EndTimeObjectPatternGenerator, SliderTiming};
use super::generator::{random_start, GeneratorContext, PatternGenerator};
use super::hit_object::HitObjectPatternGenerator;
use super::pattern::{ColumnOccupancy, ManiaNote, Pattern, PatternType};
use crate::file::beatmap::{
	kind, BeatmapFile, Dialect, GeneralSection, HitObject, HitObjectParams, SliderParams, Timestamp,
	PLAYFIELD_HEIGHT, PLAYFIELD_WIDTH,
};
use crate::point::Point;
use crate::random::RandomEngine;

/// Highest column count osu!mania supports.
pub const MAX_COLUMNS: u32 = 18;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConvertError {
	#[error("No uninherited timing point at or before the hit object at {time}ms")]
	MissingTimingContext { time: Timestamp },
	#[error("Invalid conversion configuration: {0}")]
	InvalidConfiguration(String),
}

/// Generator that converts a source object.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum GeneratorKind<'o> {
	/// The circle and the `group_len - 1` circles after it, converted as one chord.
	Density { group_len: usize },
	Distance(&'o SliderParams),
	/// Spinners and holds, ending at the given time.
	EndTime(Timestamp),
}

/// Picks the generator of `object` given the objects following it.
#[must_use]
pub fn select_generator<'o>(
	object: &'o HitObject,
	following: &[HitObject],
	simultaneous_window: Timestamp,
) -> GeneratorKind<'o> {
	match &object.params {
		HitObjectParams::Circle => {
			let grouped = (following.iter())
				.take_while(|next| next.is::<kind::Circle>() && next.time - object.time <= simultaneous_window)
				.count();
			GeneratorKind::Density { group_len: 1 + grouped }
		}
		HitObjectParams::Slider(slider) => GeneratorKind::Distance(slider),
		HitObjectParams::Spinner(spinner) => GeneratorKind::EndTime(spinner.end_time),
		HitObjectParams::Hold(hold) => GeneratorKind::EndTime(hold.end_time),
	}
}

/// Column count picked for a chart when none is asked for.
///
/// osu!mania charts keep their own. Other charts get more columns
/// the fewer sliders and spinners they have and the higher their OD.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap, clippy::cast_precision_loss)]
pub fn target_columns(source: &BeatmapFile) -> i32 {
	let difficulty = &source.difficulty;
	let rounded_circle_size = difficulty.circle_size.round();
	let rounded_overall_difficulty = difficulty.overall_difficulty.round();

	if source.general.mode == GeneralSection::MODE_MANIA {
		return (rounded_circle_size as i32).clamp(1, MAX_COLUMNS as i32);
	}

	let total = source.hit_objects.len();
	let long = source.count::<kind::Slider>() + source.count::<kind::Spinner>();
	let percent_slider_or_spinner = if total == 0 {
		0.
	} else {
		long as f64 / total as f64
	};

	if percent_slider_or_spinner < 0.2 {
		7
	} else if percent_slider_or_spinner < 0.3 || rounded_circle_size >= 5. {
		if rounded_overall_difficulty > 5. {
			7
		} else {
			6
		}
	} else if percent_slider_or_spinner > 0.6 {
		if rounded_overall_difficulty > 4. {
			5
		} else {
			4
		}
	} else {
		(rounded_overall_difficulty as i32 + 1).clamp(4, 7)
	}
}

/// Rough difficulty of a chart between 0 and 12, from its HP, AR and note rate.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn conversion_difficulty(source: &BeatmapFile) -> f64 {
	let mut drain_seconds = source.drain_time() / 1000;
	if drain_seconds == 0 {
		drain_seconds = 10_000;
	}

	let difficulty = &source.difficulty;
	let hp = f64::from(difficulty.hp_drain_rate);
	let ar = f64::from(difficulty.approach_rate.clamp(4., 7.));
	let note_rate = source.hit_objects.len() as f64 / f64::from(drain_seconds);

	let value = ((hp + ar) / 1.5 + note_rate * 9.) / 38. * 5. / 1.15;
	value.min(12.)
}

/// Seed osu! derives from the difficulty settings of a chart.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn default_seed(source: &BeatmapFile) -> u64 {
	let difficulty = &source.difficulty;
	let seed = (difficulty.hp_drain_rate + difficulty.circle_size).round() as i32 * 20
		+ (difficulty.overall_difficulty * 41.2) as i32
		+ difficulty.approach_rate.round() as i32;

	u64::from(seed.unsigned_abs())
}

/// What the converter remembers between two source objects.
struct ConversionState {
	last_time: Timestamp,
	last_position: Point,
	last_stair: PatternType,
	last_pattern: Pattern,
	note_times: VecDeque<Timestamp>,
	density: f64,
	occupancy: ColumnOccupancy,
	notes: Vec<ManiaNote>,
}

impl ConversionState {
	fn new(columns: i32) -> Self {
		Self {
			last_time: 0,
			last_position: Point::new(0., 0.),
			last_stair: PatternType::STAIR,
			last_pattern: Pattern::new(),
			note_times: VecDeque::new(),
			density: f64::from(i32::MAX),
			occupancy: ColumnOccupancy::new(columns),
			notes: Vec::new(),
		}
	}

	fn record(&mut self, time: Timestamp, position: Point) {
		self.last_time = time;
		self.last_position = position;
	}

	/// Average spacing of the last `max_notes` note times.
	#[allow(clippy::cast_precision_loss)]
	fn compute_density(&mut self, time: Timestamp, max_notes: usize) {
		if self.note_times.len() >= max_notes {
			self.note_times.pop_front();
		}
		self.note_times.push_back(time);

		if let (Some(first), Some(last)) = (self.note_times.front(), self.note_times.back()) {
			if self.note_times.len() >= 2 {
				self.density = f64::from(last - first) / self.note_times.len() as f64;
			}
		}
	}

	fn emit(&mut self, pattern: &Pattern) {
		for note in pattern.notes() {
			self.occupancy.record(note);
			self.notes.push(note.clone());
		}
	}

	/// Emits `pattern` and makes it the one the next generator builds upon.
	fn accept(&mut self, pattern: Pattern) {
		self.emit(&pattern);
		self.last_pattern = pattern;
	}
}

/// Converts an osu! chart into an osu!mania chart.
///
/// ```
/// use osuconv::convert::{ConversionConfig, ManiaBeatmapConverter};
/// use osuconv::file::beatmap::BeatmapFile;
///
/// let source: BeatmapFile = "osu file format v14\n\
///     [TimingPoints]\n0,500,4,2,0,100,1,0\n\
///     [HitObjects]\n100,100,0,1,0,0:0:0:0:\n"
///     .parse()
///     .unwrap();
///
/// let converter = ManiaBeatmapConverter::new(&source, ConversionConfig::with_columns(4)).unwrap();
/// let mania = converter.convert(42).unwrap();
/// assert_eq!(mania.general.mode, 3);
/// assert_eq!(mania.hit_objects.len(), 1);
/// ```
pub struct ManiaBeatmapConverter<'a> {
	source: &'a BeatmapFile,
	config: ConversionConfig,
	columns: i32,
	conversion_difficulty: f64,
}

impl<'a> ManiaBeatmapConverter<'a> {
	/// # Errors
	///
	/// Returns [`ConvertError::InvalidConfiguration`] for a column count outside of `1..=18`
	/// and for nonsensical pattern thresholds.
	pub fn new(source: &'a BeatmapFile, config: ConversionConfig) -> Result<Self, ConvertError> {
		let columns = match config.columns {
			Some(columns @ 1..=MAX_COLUMNS) => i32::try_from(columns)
				.map_err(|_| ConvertError::InvalidConfiguration(format!("column count {columns} is too large")))?,
			Some(columns) => {
				return Err(ConvertError::InvalidConfiguration(format!(
					"column count must be between 1 and {MAX_COLUMNS}, got {columns}"
				)));
			}
			None => target_columns(source),
		};

		if config.simultaneous_window < 0 {
			return Err(ConvertError::InvalidConfiguration(format!(
				"simultaneous window can't be negative, got {}ms",
				config.simultaneous_window
			)));
		}

		if config.max_notes_for_density == 0 {
			return Err(ConvertError::InvalidConfiguration(
				"density needs at least one note".to_owned(),
			));
		}

		if config.density_divisor.is_nan() || config.density_divisor <= 0. {
			return Err(ConvertError::InvalidConfiguration(format!(
				"density divisor must be positive, got {}",
				config.density_divisor
			)));
		}

		Ok(Self {
			source,
			config,
			columns,
			conversion_difficulty: conversion_difficulty(source),
		})
	}

	#[must_use]
	pub const fn columns(&self) -> i32 {
		self.columns
	}

	fn context<'s>(
		&'s self,
		hit_object: &'s HitObject,
		state: &'s ConversionState,
		beat_length: f64,
	) -> GeneratorContext<'s> {
		GeneratorContext {
			hit_object,
			beatmap: self.source,
			previous_pattern: &state.last_pattern,
			occupancy: &state.occupancy,
			total_columns: self.columns,
			random_start: random_start(self.columns),
			conversion_difficulty: self.conversion_difficulty,
			beat_length,
			kiai: self.source.is_kiai_at(hit_object.time),
			config: &self.config,
		}
	}

	/// Converts the chart. The same seed always gives the same chart.
	///
	/// # Errors
	///
	/// Returns [`ConvertError::MissingTimingContext`] if an object comes before every uninherited timing point.
	#[allow(clippy::cast_precision_loss)]
	pub fn convert(&self, seed: u64) -> Result<BeatmapFile, ConvertError> {
		let mut objects = self.source.hit_objects.clone();
		objects.sort_by_key(|object| object.time);

		let mut rng = RandomEngine::new(seed);
		let mut state = ConversionState::new(self.columns);
		let max_notes = self.config.max_notes_for_density;

		let mut index = 0;
		while let Some(object) = objects.get(index) {
			let time = object.time;
			let beat_length = (self.source.timing_point_at(time))
				.ok_or(ConvertError::MissingTimingContext { time })?
				.beat_length;

			let following = &objects[index + 1..];
			match select_generator(object, following, self.config.simultaneous_window) {
				GeneratorKind::Density { group_len } => {
					let group = &objects[index..index + group_len];

					state.compute_density(time, max_notes);
					let (previous_time, previous_position) = (state.last_time, state.last_position);
					state.record(time, object.position());

					let ctx = self.context(object, &state, beat_length);
					let mut generator = HitObjectPatternGenerator::new(
						ctx,
						group,
						previous_time,
						previous_position,
						state.density,
						state.last_stair,
					);
					let pattern = generator.generate(&mut rng);
					let stair_type = generator.stair_type();

					state.last_stair = stair_type;
					state.accept(pattern);
					index += group_len;
				}
				GeneratorKind::Distance(slider) => {
					let timing = SliderTiming::of(self.source, object, slider)
						.ok_or(ConvertError::MissingTimingContext { time })?;

					for node_time in timing.node_times() {
						state.record(node_time, object.position());
						state.compute_density(node_time, max_notes);
					}

					let ctx = self.context(object, &state, beat_length);
					let pattern = DistanceObjectPatternGenerator::new(ctx, slider, timing).generate(&mut rng);

					// only the notes ending with the slider shape the next pattern
					if pattern.len() > 1 {
						let (others, ending) = pattern.split_ending_at(timing.end_time);
						state.emit(&others);
						state.accept(ending);
					} else {
						state.accept(pattern);
					}
					index += 1;
				}
				GeneratorKind::EndTime(end_time) => {
					let centre = Point::new(
						f64::from(PLAYFIELD_WIDTH) / 2.,
						f64::from(PLAYFIELD_HEIGHT) / 2.,
					);
					state.record(end_time, centre);
					state.compute_density(end_time, max_notes);

					let ctx = self.context(object, &state, beat_length);
					let pattern = EndTimeObjectPatternGenerator::new(ctx, end_time).generate(&mut rng);
					state.emit(&pattern);
					index += 1;
				}
			}
		}

		let mut notes = state.notes;
		notes.sort_by_key(|note| (note.start_time, note.column));

		let mut beatmap = self.source.clone();
		beatmap.general.mode = GeneralSection::MODE_MANIA;
		beatmap.difficulty.circle_size = self.columns as f32;
		if beatmap.dialect == Dialect::Legacy {
			beatmap.osu_file_format = Dialect::LATEST_STABLE_VERSION;
			beatmap.dialect = Dialect::Modern;
		}
		beatmap.hit_objects = (notes.iter()).map(|note| note.to_hit_object(self.columns)).collect();

		tracing::info!(
			"Converted {} objects into {} notes on {} columns",
			objects.len(),
			beatmap.hit_objects.len(),
			self.columns
		);

		Ok(beatmap)
	}
}
