//! osu!standard to osu!mania conversion.
//!
//! Every source object goes through one of three pattern generators:
//! circles through the density one, sliders through the distance one,
//! spinners and holds through the end time one.

pub mod config;
pub mod converter;
pub mod distance;
pub mod generator;
pub mod hit_object;
pub mod pattern;

pub use config::{ConversionConfig, TimeSeparationThresholds};
pub use converter::{
	conversion_difficulty, default_seed, select_generator, target_columns, ConvertError, GeneratorKind,
	ManiaBeatmapConverter, MAX_COLUMNS,
};

use crate::file::beatmap::BeatmapFile;

/// Converts `source` with the default settings.
/// The column count is derived from the source when `columns` is `None`.
///
/// # Errors
///
/// See [`ManiaBeatmapConverter::new`] and [`ManiaBeatmapConverter::convert`].
pub fn convert_to_mania(source: &BeatmapFile, columns: Option<u32>, seed: u64) -> Result<BeatmapFile, ConvertError> {
	let config = ConversionConfig {
		columns,
		..ConversionConfig::default()
	};

	ManiaBeatmapConverter::new(source, config)?.convert(seed)
}
