use crate::file::beatmap::Timestamp;

/// Time separations (ms) between a circle and the previous note that decide its pattern type.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimeSeparationThresholds {
	/// At or below: single note, never stacked on the previous row.
	pub keep_single: Timestamp,
	/// At or below: single note that keeps walking the current stair.
	pub keep_stair: Timestamp,
	/// At or below: not stacked, lower chance of chords.
	pub low_probability: Timestamp,
	/// At or below: not stacked.
	pub not_stacked: Timestamp,
	/// At or below, with close positions: single note mirrored from the previous one.
	pub cycle: Timestamp,
	/// At or below, with close positions: same columns as the previous row.
	pub stack: Timestamp,
}

impl Default for TimeSeparationThresholds {
	fn default() -> Self {
		Self {
			keep_single: 80,
			keep_stair: 95,
			low_probability: 105,
			not_stacked: 125,
			cycle: 135,
			stack: 150,
		}
	}
}

/// Knobs of the osu!mania conversion.
#[derive(Clone, Debug, PartialEq)]
pub struct ConversionConfig {
	/// Column count of the output. Derived from the source chart when `None`.
	pub columns: Option<u32>,
	/// Circles starting within this many milliseconds of a group's first circle are
	/// converted together as one chord.
	pub simultaneous_window: Timestamp,
	pub time_thresholds: TimeSeparationThresholds,
	/// Distance in osu! pixels under which two objects count as stacked.
	pub stack_distance: f64,
	/// Note density is compared against `beat_length / density_divisor`.
	pub density_divisor: f64,
	/// How many recent note times the density is computed from.
	pub max_notes_for_density: usize,
	/// Spinners and holds shorter than this (ms) become single notes.
	pub short_hold: Timestamp,
}

impl Default for ConversionConfig {
	fn default() -> Self {
		Self {
			columns: None,
			simultaneous_window: 0,
			time_thresholds: TimeSeparationThresholds::default(),
			stack_distance: 20.,
			density_divisor: 2.5,
			max_notes_for_density: 7,
			short_hold: 100,
		}
	}
}

impl ConversionConfig {
	#[must_use]
	pub fn with_columns(columns: u32) -> Self {
		Self {
			columns: Some(columns),
			..Self::default()
		}
	}
}
