use std::fmt;
use std::io::{self, Write};
use std::num::ParseIntError;
use std::ops::{BitAnd, BitOr, BitOrAssign};
use std::path::Path;
use std::str::FromStr;

use error_stack::{Report, Result};

pub mod errors;
pub mod parsing;
pub mod serializing;
pub mod utils;

use crate::point::Point;
use crate::{last_at_or_before, Timestamped, TimestampedSlice};
pub use errors::*;
use parsing::{parse_beatmap, BeatmapParseError};
use serializing::serialize_beatmap_file;

/// Time in milliseconds from the beginning of the beatmap's audio.
pub type Timestamp = i32;

/// Width of the osu! playfield in osu! pixels.
pub const PLAYFIELD_WIDTH: i32 = 512;
/// Height of the osu! playfield in osu! pixels.
pub const PLAYFIELD_HEIGHT: i32 = 384;

/// Most slides a slider may have.
pub const MAX_SLIDES: u32 = 10_000;
/// Longest slider length accepted, in osu! pixels.
pub const MAX_SLIDER_LENGTH: f64 = 1_000_000.;

/// Field layout rules of a `.osu` file, selected from its format version.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Dialect {
	/// Format versions below 12. Hit samples and timing point fields may be truncated.
	Legacy,
	/// Format versions 12 and above, including lazer's v128.
	#[default]
	Modern,
}

impl Dialect {
	pub const FIRST_MODERN_VERSION: u32 = 12;
	/// Latest format version written by osu!stable.
	pub const LATEST_STABLE_VERSION: u32 = 14;

	#[must_use]
	pub const fn from_format_version(version: u32) -> Self {
		if version < Self::FIRST_MODERN_VERSION {
			Self::Legacy
		} else {
			Self::Modern
		}
	}
}

/// Draw order of hit circle overlays compared to hit numbers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OverlayPosition {
	/// use skin setting
	#[default]
	NoChange,
	/// draw overlays under numbers
	Below,
	/// draw overlays on top of numbers
	Above,
}

impl FromStr for OverlayPosition {
	type Err = InvalidOverlayPositionError;

	fn from_str(op_str: &str) -> core::result::Result<Self, Self::Err> {
		match op_str {
			"NoChange" => Ok(Self::NoChange),
			"Below" => Ok(Self::Below),
			"Above" => Ok(Self::Above),
			_ => Err(InvalidOverlayPositionError::from(op_str)),
		}
	}
}

impl fmt::Display for OverlayPosition {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let s = match self {
			Self::NoChange => "NoChange",
			Self::Below => "Below",
			Self::Above => "Above",
		};
		write!(f, "{s}")
	}
}

/// General information about the beatmap
#[derive(Clone, Debug, PartialEq)]
#[allow(clippy::struct_excessive_bools)]
pub struct GeneralSection {
	/// Location of the audio file relative to the current folder
	pub audio_filename: String,
	/// Milliseconds of silence before the audio starts playing
	pub audio_lead_in: i32,
	/// Deprecated
	pub audio_hash: Option<String>,
	/// Time in milliseconds when the audio preview should start
	pub preview_time: Timestamp,
	/// Speed of the countdown before the first hit object
	/// - 0 = no countdown
	/// - 1 = normal
	/// - 2 = half
	/// - 3 = double
	pub countdown: i32,
	/// Sample set that will be used if timing points do not override it (Normal, Soft, Drum)
	pub sample_set: String,
	/// Multiplier for the threshold in time where hit objects placed close together stack (0–1)
	pub stack_leniency: f64,
	/// - 0 = osu!
	/// - 1 = osu!taiko
	/// - 2 = osu!catch
	/// - 3 = osu!mania
	pub mode: u8,
	/// Whether or not breaks have a letterboxing effect
	pub letterbox_in_breaks: bool,
	/// Deprecated
	pub story_fire_in_front: bool,
	/// Whether or not the storyboard can use the user's skin images
	pub use_skin_sprites: bool,
	/// Deprecated
	pub always_show_playfield: bool,
	/// Draw order of hit circle overlays compared to hit numbers
	pub overlay_position: OverlayPosition,
	/// Preferred skin to use during gameplay
	pub skin_preference: Option<String>,
	/// Whether or not a warning about flashing colours should be shown at the beginning of the map
	pub epilepsy_warning: bool,
	/// Time in beats that the countdown starts before the first hit object
	pub countdown_offset: i32,
	/// Whether or not the "N+1" style key layout is used for osu!mania
	pub special_style: bool,
	/// Whether or not the storyboard allows widescreen viewing
	pub widescreen_storyboard: bool,
	/// Whether or not sound samples will change rate when playing with speed-changing mods
	pub samples_match_playback_rate: bool,
}

impl GeneralSection {
	pub const MODE_OSU: u8 = 0;
	pub const MODE_MANIA: u8 = 3;
}

impl Default for GeneralSection {
	fn default() -> Self {
		Self {
			audio_filename: String::new(),
			audio_lead_in: 0,
			audio_hash: None,
			preview_time: -1,
			countdown: 1,
			sample_set: "Normal".to_owned(),
			stack_leniency: 0.7,
			mode: Self::MODE_OSU,
			letterbox_in_breaks: false,
			story_fire_in_front: true,
			use_skin_sprites: false,
			always_show_playfield: false,
			overlay_position: OverlayPosition::NoChange,
			skin_preference: None,
			epilepsy_warning: false,
			countdown_offset: 0,
			special_style: false,
			widescreen_storyboard: false,
			samples_match_playback_rate: false,
		}
	}
}

/// Saved settings for the beatmap editor
#[derive(Clone, Debug, PartialEq)]
pub struct EditorSection {
	/// Time in milliseconds of bookmarks
	pub bookmarks: Vec<Timestamp>,
	/// Distance snap multiplier
	pub distance_spacing: f64,
	/// Beat snap divisor
	pub beat_divisor: f64,
	/// Grid size
	pub grid_size: i32,
	/// Scale factor for the object timeline
	pub timeline_zoom: Option<f64>,
}

impl Default for EditorSection {
	fn default() -> Self {
		Self {
			bookmarks: Vec::new(),
			distance_spacing: 1.,
			beat_divisor: 4.,
			grid_size: 4,
			timeline_zoom: None,
		}
	}
}

/// Information used to identify the beatmap
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MetadataSection {
	/// Romanised song title
	pub title: String,
	/// Song title
	pub title_unicode: String,
	/// Romanised song artist
	pub artist: String,
	/// Song artist
	pub artist_unicode: String,
	/// Beatmap creator
	pub creator: String,
	/// Difficulty name
	pub version: String,
	/// Original media the song was produced for
	pub source: String,
	/// Search terms
	pub tags: Vec<String>,
	/// Difficulty ID
	pub beatmap_id: Option<i32>,
	/// Beatmap ID
	pub beatmap_set_id: Option<i32>,
}

/// Difficulty settings
#[derive(Clone, Debug, PartialEq)]
pub struct DifficultySection {
	/// HP setting (0–10)
	pub hp_drain_rate: f32,
	/// CS setting (0–10). In osu!mania, this is the column count.
	pub circle_size: f32,
	/// OD setting (0–10)
	pub overall_difficulty: f32,
	/// AR setting (0–10)
	pub approach_rate: f32,
	/// Base slider velocity in hundreds of osu! pixels per beat
	pub slider_multiplier: f64,
	/// Amount of slider ticks per beat
	pub slider_tick_rate: f64,
}

impl Default for DifficultySection {
	fn default() -> Self {
		Self {
			hp_drain_rate: 5.,
			circle_size: 5.,
			overall_difficulty: 5.,
			approach_rate: 5.,
			slider_multiplier: 1.4,
			slider_tick_rate: 1.,
		}
	}
}

/// Beatmap graphic event. Storyboard events are not kept.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
	Background {
		/// Location of the background image relative to the beatmap directory.
		filename: String,
		/// Offset in osu! pixels from the center of the screen.
		/// For example, an offset of `50,100` would have the
		/// background shown 50 osu! pixels to the right and
		/// 100 osu! pixels down from the center of the screen.
		x_offset: i32,
		/// Vertical offset in osu! pixels from the center of the screen.
		y_offset: i32,
	},
	Video {
		/// Time at which the video starts playing.
		start_time: Timestamp,
		/// Location of the video relative to the beatmap directory.
		filename: String,
		/// Horizontal offset in osu! pixels from the center of the screen.
		x_offset: i32,
		/// Vertical offset in osu! pixels from the center of the screen.
		y_offset: i32,
	},
	Break {
		start_time: Timestamp,
		end_time: Timestamp,
	},
}

impl Timestamped for Event {
	fn timestamp(&self) -> Timestamp {
		match self {
			Self::Background { .. } => 0,
			Self::Video { start_time, .. } | Self::Break { start_time, .. } => *start_time,
		}
	}
}

/// Timing and control points
#[derive(Clone, Debug, PartialEq)]
pub struct TimingPoint {
	/// Start time of the timing section, in milliseconds from the beginning of the beatmap's audio.
	/// The end of the timing section is the next timing point's time (or never, if this is the last timing point).
	pub time: Timestamp,
	/// This property has two meanings:
	/// - For uninherited timing points, the duration of a beat, in milliseconds.
	/// - For inherited timing points, a negative inverse slider velocity multiplier, as a percentage.
	///   For example, `-50` would make all sliders in this timing section twice as fast as `slider_multiplier`.
	pub beat_length: f64,
	/// Amount of beats in a measure. Inherited timing points ignore this property.
	pub meter: i32,
	/// Default sample set for hit objects (0 = beatmap default, 1 = normal, 2 = soft, 3 = drum).
	pub sample_set: SampleBank,
	/// Custom sample index for hit objects. `0` indicates osu!'s default hitsounds.
	pub sample_index: u32,
	/// Volume percentage for hit objects.
	pub volume: u8,
	/// Whether or not the timing point is uninherited.
	pub uninherited: bool,
	/// Bit flags that give the timing point extra effects.
	pub effects: u32,
}

impl Default for TimingPoint {
	fn default() -> Self {
		Self {
			time: 0,
			beat_length: 500.,
			meter: 4,
			sample_set: SampleBank::Auto,
			sample_index: 0,
			volume: 100,
			uninherited: true,
			effects: 0,
		}
	}
}

impl Timestamped for TimingPoint {
	fn timestamp(&self) -> Timestamp {
		self.time
	}
}

impl TimingPoint {
	pub const EFFECT_KIAI: u32 = 0b0001;
	pub const EFFECT_OMIT_FIRST_BARLINE: u32 = 0b1000;

	#[must_use]
	pub const fn is_kiai(&self) -> bool {
		self.effects & Self::EFFECT_KIAI != 0
	}

	/// Slider velocity multiplier given by this point.
	/// Uninherited points always reset it to `1`.
	#[must_use]
	pub fn slider_velocity(&self) -> f64 {
		if self.uninherited || self.beat_length >= 0. || self.beat_length.is_nan() {
			1.
		} else {
			(100. / -self.beat_length).clamp(0.1, 10.)
		}
	}
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Color {
	/// Red value in range `[0, 255]`.
	pub r: u8,
	/// Green value in range `[0, 255]`.
	pub g: u8,
	/// Blue value in range `[0, 255]`.
	pub b: u8,
	/// Alpha value in range `[0, 255]`.
	pub a: Option<u8>,
}

impl Color {
	#[must_use]
	pub fn to_osu_string(&self) -> String {
		let Self { r, g, b, a } = self;
		a.map_or_else(|| format!("{r},{g},{b}"), |a| format!("{r},{g},{b},{a}"))
	}
}

/// Combo and skin colors
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ColorsSection {
	/// Additive combo colors
	pub combo_colors: Vec<Color>,
	/// Additive slider track color
	pub slider_track_override: Option<Color>,
	/// Slider border color
	pub slider_border: Option<Color>,
}

/// A bank of samples for normal, whistle, finish and clap hitsounds.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
#[repr(u8)]
pub enum SampleBank {
	#[default]
	Auto = 0,
	Normal = 1,
	Soft = 2,
	Drum = 3,
}

impl FromStr for SampleBank {
	type Err = InvalidSampleBankError;

	fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
		match s {
			"0" => Ok(Self::Auto),
			"1" => Ok(Self::Normal),
			"2" => Ok(Self::Soft),
			"3" => Ok(Self::Drum),
			s => Err(InvalidSampleBankError::from(s)),
		}
	}
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HitSampleSet {
	/// Sample set of the normal sound.
	pub normal_set: SampleBank,
	/// Sample set of the whistle, finish, and clap sounds.
	pub addition_set: SampleBank,
}

impl HitSampleSet {
	#[must_use]
	pub fn to_osu_string(&self) -> String {
		let Self {
			normal_set,
			addition_set,
		} = *self;
		format!("{}:{}", normal_set as u8, addition_set as u8)
	}
}

impl FromStr for HitSampleSet {
	type Err = InvalidHitSampleSetError;

	fn from_str(s: &str) -> core::result::Result<Self, Self::Err> {
		let (normal_set, addition_set) = s.split_once(':').ok_or_else(|| InvalidHitSampleSetError::from(s))?;

		let normal_set = normal_set
			.parse()
			.map_err(|e: InvalidSampleBankError| InvalidHitSampleSetError {
				hss_string: s.to_owned(),
				context: format!("couldn't parse normal_set: {e}"),
			})?;

		let addition_set = addition_set
			.parse()
			.map_err(|e: InvalidSampleBankError| InvalidHitSampleSetError {
				hss_string: s.to_owned(),
				context: format!("couldn't parse addition_set: {e}"),
			})?;

		Ok(Self {
			normal_set,
			addition_set,
		})
	}
}

/// Type of curve used to construct a slider at a particular point.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum SliderCurveType {
	/// inherit the previous point's curve type
	Inherit,
	/// bézier curve
	Bezier,
	/// centripetal catmull-rom
	Catmull,
	/// linear
	Linear,
	/// perfect circle (legacy) / perfect curve (lazer)
	PerfectCurve,
}

impl SliderCurveType {
	/// Parses a curve type letter. Returns `None` for anything but `B`, `C`, `L` and `P`.
	#[must_use]
	pub fn from_letter(letter: &str) -> Option<Self> {
		match letter {
			"B" => Some(Self::Bezier),
			"C" => Some(Self::Catmull),
			"L" => Some(Self::Linear),
			"P" => Some(Self::PerfectCurve),
			_ => None,
		}
	}

	#[must_use]
	pub const fn letter(self) -> Option<char> {
		match self {
			Self::Inherit => None,
			Self::Bezier => Some('B'),
			Self::Catmull => Some('C'),
			Self::Linear => Some('L'),
			Self::PerfectCurve => Some('P'),
		}
	}
}

/// Anchor point used to construct a slider.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SliderPoint {
	/// Type of curve starting at this point, or [`SliderCurveType::Inherit`].
	pub curve_type: SliderCurveType,
	/// Horizontal coordinate of the slider point.
	pub x: i32,
	/// Vertical coordinate of the slider point.
	pub y: i32,
}

impl SliderPoint {
	#[must_use]
	pub const fn new(curve_type: SliderCurveType, x: i32, y: i32) -> Self {
		Self { curve_type, x, y }
	}

	#[must_use]
	pub fn to_point(&self) -> Point {
		Point {
			x: f64::from(self.x),
			y: f64::from(self.y),
		}
	}
}

#[derive(Clone, Debug, PartialEq)]
pub struct SliderParams {
	/// Curve type of the first anchor point.
	pub first_curve_type: SliderCurveType,
	/// Anchor points used to construct the slider. Each point is in the format `x:y`.
	///
	/// The curve type is individual to each point as lazer allows
	/// sliders to have multiple points of different curve types while stable doesn't.
	///
	/// ```text
	/// P|213:282|P|257:269|234:254|P|158:283|129:306|B|39:234|L|57:105|68:173
	/// ```
	pub curve_points: Vec<SliderPoint>,
	/// Amount of times the player has to follow the slider's curve back-and-forth before
	/// the slider is complete. It can also be interpreted as the repeat count plus one.
	pub slides: u32,
	/// Visual length in osu! pixels of the slider.
	pub length: f64,
	/// Hitsounds that play when hitting edges of the slider's curve.
	/// The first sound is the one that plays when the slider is first clicked,
	/// and the last sound is the one that plays when the slider's end is hit.
	pub edge_hitsounds: Vec<HitSound>,
	/// Sample sets used for the edge hitsounds.
	pub edge_samplesets: Vec<HitSampleSet>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SpinnerParams {
	/// End time of the spinner, in milliseconds from the beginning of the beatmap's audio.
	pub end_time: Timestamp,
}

/// `x` determines the column index of the hold (see [`HitObject::column_index`]).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HoldParams {
	/// End time of the hold, in milliseconds from the beginning of the beatmap's audio.
	pub end_time: Timestamp,
}

/// Extra parameters specific to the object's type.
#[derive(Clone, Debug, PartialEq)]
pub enum HitObjectParams {
	Circle,
	Slider(SliderParams),
	/// Note: `x` and `y` do not affect spinners. They default to the center of the playfield, `256,192`.
	Spinner(SpinnerParams),
	/// (osu!mania only)
	Hold(HoldParams),
}

impl HitObjectParams {
	#[must_use]
	pub const fn object_type(&self) -> HitObjectType {
		match self {
			Self::Circle => HitObjectType::Circle,
			Self::Slider(_) => HitObjectType::Slider,
			Self::Spinner(_) => HitObjectType::Spinner,
			Self::Hold(_) => HitObjectType::Hold,
		}
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HitObjectType {
	Circle,
	Slider,
	Spinner,
	/// osu!mania only
	Hold,
}

impl fmt::Display for HitObjectType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let s = match self {
			Self::Circle => "circle",
			Self::Slider => "slider",
			Self::Spinner => "spinner",
			Self::Hold => "hold",
		};
		write!(f, "{s}")
	}
}

/// Kind markers for type-checked access to hit object parameters.
///
/// ```
/// use osuconv::file::beatmap::{kind, HitObject, HitObjectParams, SpinnerParams};
///
/// let spinner = HitObject::new(256, 192, 1000, HitObjectParams::Spinner(SpinnerParams { end_time: 3000 }));
/// assert_eq!(spinner.get::<kind::Spinner>().map(|p| p.end_time), Ok(3000));
/// assert!(spinner.get::<kind::Slider>().is_err());
/// ```
pub mod kind {
	use super::{HitObjectParams, HoldParams, SliderParams, SpinnerParams};

	pub trait ObjectKind: 'static {
		type Params: 'static;

		/// Name used in type mismatch errors.
		const NAME: &'static str;

		fn params(params: &HitObjectParams) -> Option<&Self::Params>;
	}

	pub struct Circle;
	pub struct Slider;
	pub struct Spinner;
	pub struct Hold;
	/// Matches every hit object and yields the whole parameter enum.
	pub struct All;

	impl ObjectKind for Circle {
		type Params = ();

		const NAME: &'static str = "circle";

		fn params(params: &HitObjectParams) -> Option<&Self::Params> {
			matches!(params, HitObjectParams::Circle).then_some(&())
		}
	}

	impl ObjectKind for Slider {
		type Params = SliderParams;

		const NAME: &'static str = "slider";

		fn params(params: &HitObjectParams) -> Option<&Self::Params> {
			match params {
				HitObjectParams::Slider(p) => Some(p),
				_ => None,
			}
		}
	}

	impl ObjectKind for Spinner {
		type Params = SpinnerParams;

		const NAME: &'static str = "spinner";

		fn params(params: &HitObjectParams) -> Option<&Self::Params> {
			match params {
				HitObjectParams::Spinner(p) => Some(p),
				_ => None,
			}
		}
	}

	impl ObjectKind for Hold {
		type Params = HoldParams;

		const NAME: &'static str = "hold";

		fn params(params: &HitObjectParams) -> Option<&Self::Params> {
			match params {
				HitObjectParams::Hold(p) => Some(p),
				_ => None,
			}
		}
	}

	impl ObjectKind for All {
		type Params = HitObjectParams;

		const NAME: &'static str = "any";

		fn params(params: &HitObjectParams) -> Option<&Self::Params> {
			Some(params)
		}
	}
}

use kind::ObjectKind;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HitSample {
	/// Sample set of the normal sound.
	pub normal_set: SampleBank,
	/// Sample set of the whistle, finish, and clap sounds.
	pub addition_set: SampleBank,
	/// Index of the sample. If this is `0`, the timing point's sample index will be used instead.
	pub index: u32,
	/// Volume of the sample from 1 to 100. If this is `0`, the timing point's volume will be used instead.
	///
	/// Some ranked maps have volumes above 255, hence the `u32`.
	pub volume: u32,
	/// Custom filename of the addition sound.
	pub filename: Option<String>,
}

impl HitSample {
	#[must_use]
	pub fn to_osu_string(&self) -> String {
		let Self {
			normal_set,
			addition_set,
			index,
			volume,
			filename,
		} = self;

		format!(
			"{}:{}:{index}:{volume}:{}",
			*normal_set as u8,
			*addition_set as u8,
			filename.as_ref().map_or("", |filename| filename.as_str())
		)
	}
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[repr(transparent)]
pub struct HitSound(u8);

impl fmt::Display for HitSound {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		self.0.fmt(f)
	}
}

impl FromStr for HitSound {
	type Err = ParseIntError;

	fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
		Ok(Self(u8::from_str(s)?))
	}
}

impl HitSound {
	pub const NONE: Self = Self(0b0000);
	pub const NORMAL: Self = Self(0b0001);
	pub const WHISTLE: Self = Self(0b0010);
	pub const FINISH: Self = Self(0b0100);
	pub const CLAP: Self = Self(0b1000);

	#[must_use]
	pub const fn bits(self) -> u8 {
		self.0
	}

	#[must_use]
	pub const fn has_any(&self, other: Self) -> bool {
		self.0 & other.0 > 0
	}

	#[must_use]
	pub const fn has_whistle(&self) -> bool {
		self.has_any(Self::WHISTLE)
	}

	#[must_use]
	pub const fn has_finish(&self) -> bool {
		self.has_any(Self::FINISH)
	}

	#[must_use]
	pub const fn has_clap(&self) -> bool {
		self.has_any(Self::CLAP)
	}
}

impl BitAnd for HitSound {
	type Output = Self;

	fn bitand(self, rhs: Self) -> Self::Output {
		Self(self.0 & rhs.0)
	}
}

impl BitOr for HitSound {
	type Output = Self;

	fn bitor(self, rhs: Self) -> Self::Output {
		Self(self.0 | rhs.0)
	}
}

impl BitOrAssign for HitSound {
	fn bitor_assign(&mut self, rhs: Self) {
		self.0 |= rhs.0;
	}
}

/// Hit object
#[derive(Clone, Debug, PartialEq)]
pub struct HitObject {
	/// Horizontal position in osu! pixels of the object.
	pub x: i32,
	/// Vertical position in osu! pixels of the object.
	pub y: i32,
	/// Time when the object is to be hit, in milliseconds from the beginning of the beatmap's audio.
	pub time: Timestamp,
	/// Specifies how many combo colors to skip. `None` if the hit object does not have a new combo.
	pub combo_color_skip: Option<u8>,
	/// Bit flags indicating the hitsound applied to the object.
	pub hit_sound: HitSound,
	/// Extra parameters specific to the object's type.
	pub params: HitObjectParams,
	/// Information about which samples are played when the object is hit.
	/// `None` when the line has no hit sample field, which legacy files allow.
	pub hit_sample: Option<HitSample>,
}

impl HitObject {
	/// Position of the bit that signifies whether a hit object is a hit circle in its `type` bit flags.
	pub const RAW_TYPE_HIT_CIRCLE: u8 = 0;
	/// Position of the bit that signifies whether a hit object is a slider in its `type` bit flags.
	pub const RAW_TYPE_SLIDER: u8 = 1;
	/// Position of the bit that signifies whether a hit object is a spinner in its `type` bit flags.
	pub const RAW_TYPE_SPINNER: u8 = 3;
	/// Position of the bit that signifies whether a hit object is an osu!mania hold in its `type` bit flags.
	pub const RAW_TYPE_OSU_MANIA_HOLD: u8 = 7;
	/// Position of the bit that signifies whether a hit object is on a new combo.
	pub const RAW_NEW_COMBO: u8 = 2;

	const RAW_TYPE_MASK: u8 = 1 << Self::RAW_TYPE_HIT_CIRCLE
		| 1 << Self::RAW_TYPE_SLIDER
		| 1 << Self::RAW_TYPE_SPINNER
		| 1 << Self::RAW_TYPE_OSU_MANIA_HOLD;

	#[must_use]
	pub const fn new(x: i32, y: i32, time: Timestamp, params: HitObjectParams) -> Self {
		Self {
			x,
			y,
			time,
			combo_color_skip: None,
			hit_sound: HitSound::NONE,
			params,
			hit_sample: None,
		}
	}

	const fn raw_is_base_type(raw_object_type: u8, base_type: u8) -> bool {
		raw_object_type & (1 << base_type) > 0
	}

	#[must_use]
	pub const fn raw_is_new_combo(raw_object_type: u8) -> bool {
		Self::raw_is_base_type(raw_object_type, Self::RAW_NEW_COMBO)
	}

	/// Resolves the object type from raw `type` bit flags.
	///
	/// # Errors
	///
	/// Fails unless exactly one of the circle, slider, spinner and hold bits is set.
	pub const fn type_from_raw(raw_object_type: u8) -> std::result::Result<HitObjectType, InvalidHitObjectTypeError> {
		let type_bits = raw_object_type & Self::RAW_TYPE_MASK;
		if type_bits.count_ones() != 1 {
			return Err(InvalidHitObjectTypeError(raw_object_type));
		}

		Ok(if Self::raw_is_base_type(type_bits, Self::RAW_TYPE_HIT_CIRCLE) {
			HitObjectType::Circle
		} else if Self::raw_is_base_type(type_bits, Self::RAW_TYPE_SLIDER) {
			HitObjectType::Slider
		} else if Self::raw_is_base_type(type_bits, Self::RAW_TYPE_SPINNER) {
			HitObjectType::Spinner
		} else {
			HitObjectType::Hold
		})
	}

	#[must_use]
	pub const fn object_type(&self) -> HitObjectType {
		self.params.object_type()
	}

	/// Parameters of this object if it is of kind `K`.
	///
	/// # Errors
	///
	/// Returns a [`TypeMismatchError`] naming the expected kind and the actual type otherwise.
	pub fn get<K: ObjectKind>(&self) -> std::result::Result<&K::Params, TypeMismatchError> {
		K::params(&self.params).ok_or(TypeMismatchError {
			expected: K::NAME,
			found: self.object_type(),
		})
	}

	#[must_use]
	pub fn is<K: ObjectKind>(&self) -> bool {
		K::params(&self.params).is_some()
	}

	#[must_use]
	pub const fn is_new_combo(&self) -> bool {
		self.combo_color_skip.is_some()
	}

	#[must_use]
	pub fn raw_object_type(&self) -> u8 {
		let rt = match self.object_type() {
			HitObjectType::Circle => Self::RAW_TYPE_HIT_CIRCLE,
			HitObjectType::Slider => Self::RAW_TYPE_SLIDER,
			HitObjectType::Spinner => Self::RAW_TYPE_SPINNER,
			HitObjectType::Hold => Self::RAW_TYPE_OSU_MANIA_HOLD,
		};

		let ccskip = self
			.combo_color_skip
			.map_or(0, |n| 1 << Self::RAW_NEW_COMBO | (n & 0b111) << 4);

		1 << rt | ccskip
	}

	#[must_use]
	pub fn position(&self) -> Point {
		Point::new(f64::from(self.x), f64::from(self.y))
	}

	/// End time of objects that carry one explicitly. Sliders need timing context, see [`BeatmapFile::end_time`].
	#[must_use]
	pub const fn explicit_end_time(&self) -> Option<Timestamp> {
		match &self.params {
			HitObjectParams::Circle => Some(self.time),
			HitObjectParams::Slider(_) => None,
			HitObjectParams::Spinner(SpinnerParams { end_time }) | HitObjectParams::Hold(HoldParams { end_time }) => {
				Some(*end_time)
			}
		}
	}

	/// Column of this object in an osu!mania chart with `columns` columns.
	///
	/// Computed by `floor(x * columns / 512)` and clamped between `0` and `columns - 1`.
	#[must_use]
	pub fn column_index(&self, columns: i32) -> i32 {
		column_index_of(self.x, columns)
	}
}

#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn column_index_of(x: i32, columns: i32) -> i32 {
	let columns = columns.max(1);
	let column = (f64::from(x) * f64::from(columns) / f64::from(PLAYFIELD_WIDTH)).floor() as i32;
	column.clamp(0, columns - 1)
}

/// `x` coordinate of a column, rounded up so that [`column_index_of`] maps it back to `column`.
#[must_use]
pub const fn column_to_x(column: i32, columns: i32) -> i32 {
	(column * PLAYFIELD_WIDTH + columns - 1) / columns
}

impl Timestamped for HitObject {
	fn timestamp(&self) -> Timestamp {
		self.time
	}
}

/// `.osu` is a human-readable file format containing information about a beatmap.
#[derive(Clone, Debug, Default, PartialEq)]
#[allow(clippy::module_name_repetitions)]
pub struct BeatmapFile {
	/// Version from the first line of the file.
	/// For example, `osu file format v14` is the latest *stable* version.
	/// `osu file format v128` is the current version that osu!lazer uses.
	pub osu_file_format: u32,
	/// Field layout rules the file was read with.
	pub dialect: Dialect,
	/// General information about the beatmap
	pub general: GeneralSection,
	/// Saved settings for the beatmap editor
	pub editor: EditorSection,
	/// Information used to identify the beatmap
	pub metadata: MetadataSection,
	/// Difficulty settings
	pub difficulty: DifficultySection,
	/// Beatmap graphic events, in file order
	pub events: Vec<Event>,
	/// Timing and control points, sorted by time
	pub timing_points: Vec<TimingPoint>,
	/// Combo and skin colors
	pub colors: Option<ColorsSection>,
	/// Hit objects, sorted by time
	pub hit_objects: Vec<HitObject>,
}

impl BeatmapFile {
	/// Parses an osu! beatmap file.
	///
	/// # Errors
	///
	/// This function will return an error if the file can't be read or could not be parsed correctly.
	/// The report carries the path of the file.
	pub fn parse<P: AsRef<Path>>(path: P) -> Result<Self, BeatmapFileParseError> {
		let path = path.as_ref();

		let content = std::fs::read_to_string(path)
			.map_err(|e| Report::new(e).change_context(BeatmapFileParseError::new(path)))?;

		parse_beatmap(&content, None).map_err(|e| Report::new(e).change_context(BeatmapFileParseError::new(path)))
	}

	/// Write this beatmap file as a `.osu` file.
	///
	/// # Errors
	///
	/// This function will return an error if an IO issue occured.
	pub fn write<W: Write>(&self, writer: &mut W) -> io::Result<()> {
		serialize_beatmap_file(self, writer)
	}

	/// Sorts timing points and hit objects by time, keeping file order for equal times.
	pub fn sort(&mut self) {
		self.timing_points.sort_by_key(|tp| tp.time);
		self.hit_objects.sort_by_key(|ho| ho.time);
	}

	pub fn objects<K: ObjectKind>(&self) -> impl Iterator<Item = (&HitObject, &K::Params)> {
		(self.hit_objects.iter()).filter_map(|o| K::params(&o.params).map(|p| (o, p)))
	}

	#[must_use]
	pub fn count<K: ObjectKind>(&self) -> usize {
		self.hit_objects.iter().filter(|o| o.is::<K>()).count()
	}

	/// Last uninherited timing point at or before `time`.
	#[must_use]
	pub fn timing_point_at(&self, time: Timestamp) -> Option<&TimingPoint> {
		let candidates = self.timing_points.between(..=time);
		candidates.iter().rev().find(|tp| tp.uninherited)
	}

	/// Like [`Self::timing_point_at`], but falls back to the first uninherited timing point
	/// when `time` precedes all of them.
	#[must_use]
	pub fn nearest_timing_point_at(&self, time: Timestamp) -> Option<&TimingPoint> {
		(self.timing_point_at(time)).or_else(|| self.timing_points.iter().find(|tp| tp.uninherited))
	}

	/// Last timing point of any kind at or before `time`. It decides slider velocity and kiai.
	#[must_use]
	pub fn difficulty_point_at(&self, time: Timestamp) -> Option<&TimingPoint> {
		last_at_or_before(&self.timing_points, time)
	}

	#[must_use]
	pub fn slider_velocity_at(&self, time: Timestamp) -> f64 {
		self.difficulty_point_at(time).map_or(1., TimingPoint::slider_velocity)
	}

	#[must_use]
	pub fn is_kiai_at(&self, time: Timestamp) -> bool {
		self.difficulty_point_at(time).is_some_and(TimingPoint::is_kiai)
	}

	/// Duration in milliseconds of a slider starting at `time`, all slides included.
	///
	/// `None` if there is no uninherited timing point at or before `time`.
	#[must_use]
	pub fn slider_duration(&self, time: Timestamp, slider: &SliderParams) -> Option<f64> {
		let timing_point = self.timing_point_at(time)?;
		let pixels_per_beat = self.difficulty.slider_multiplier * 100. * self.slider_velocity_at(time);
		if pixels_per_beat <= 0. {
			return Some(0.);
		}

		Some(slider.length / pixels_per_beat * timing_point.beat_length * f64::from(slider.slides))
	}

	/// End time of a hit object. `None` for sliders without timing context.
	#[must_use]
	#[allow(clippy::cast_possible_truncation)]
	pub fn end_time(&self, hit_object: &HitObject) -> Option<Timestamp> {
		match &hit_object.params {
			HitObjectParams::Slider(slider) => {
				let duration = self.slider_duration(hit_object.time, slider)?;
				Some(hit_object.time.saturating_add(duration.max(0.).floor() as Timestamp))
			}
			_ => hit_object.explicit_end_time(),
		}
	}

	/// Total duration of the break periods.
	#[must_use]
	pub fn total_break_time(&self) -> Timestamp {
		(self.events.iter())
			.map(|event| match event {
				Event::Break { start_time, end_time } => (end_time - start_time).max(0),
				_ => 0,
			})
			.sum()
	}

	/// Time between the first and last object start, breaks excluded.
	#[must_use]
	pub fn drain_time(&self) -> Timestamp {
		match (self.hit_objects.first(), self.hit_objects.last()) {
			(Some(first), Some(last)) => (last.time - first.time - self.total_break_time()).max(0),
			_ => 0,
		}
	}
}

impl FromStr for BeatmapFile {
	type Err = BeatmapParseError;

	/// Parses beatmap text, detecting the dialect from the version header.
	fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
		parse_beatmap(s, None)
	}
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;

	use super::{
		column_index_of, column_to_x, kind, BeatmapFile, Dialect, HitObject, HitObjectParams, HitObjectType,
		HoldParams, SliderCurveType, SliderParams, SpinnerParams, TimingPoint, TypeMismatchError,
	};

	fn slider(time: i32, slides: u32, length: f64) -> HitObject {
		HitObject::new(
			100,
			100,
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

	#[test]
	fn dialect_from_version() {
		assert_eq!(Dialect::from_format_version(3), Dialect::Legacy);
		assert_eq!(Dialect::from_format_version(11), Dialect::Legacy);
		assert_eq!(Dialect::from_format_version(12), Dialect::Modern);
		assert_eq!(Dialect::from_format_version(128), Dialect::Modern);
	}

	#[test]
	fn raw_type_discriminant_is_exclusive() {
		assert_eq!(HitObject::type_from_raw(1), Ok(HitObjectType::Circle));
		assert_eq!(HitObject::type_from_raw(2 | 4), Ok(HitObjectType::Slider));
		assert_eq!(HitObject::type_from_raw(12), Ok(HitObjectType::Spinner));
		assert_eq!(HitObject::type_from_raw(128), Ok(HitObjectType::Hold));
		assert_eq!(HitObject::type_from_raw(0b0101_0001), Ok(HitObjectType::Circle));

		assert!(HitObject::type_from_raw(0).is_err());
		assert!(HitObject::type_from_raw(4).is_err());
		assert!(HitObject::type_from_raw(1 | 2).is_err());
		assert!(HitObject::type_from_raw(8 | 128).is_err());
	}

	#[test]
	fn raw_object_type_keeps_combo_skip() {
		let mut circle = HitObject::new(0, 0, 0, HitObjectParams::Circle);
		circle.combo_color_skip = Some(3);
		assert_eq!(circle.raw_object_type(), 0b0011_0101);
	}

	#[test]
	fn typed_access() {
		let spinner = HitObject::new(256, 192, 1000, HitObjectParams::Spinner(SpinnerParams { end_time: 2500 }));

		assert_eq!(spinner.get::<kind::Spinner>(), Ok(&SpinnerParams { end_time: 2500 }));
		assert_eq!(
			spinner.get::<kind::Hold>(),
			Err(TypeMismatchError {
				expected: "hold",
				found: HitObjectType::Spinner,
			})
		);
		assert!(spinner.get::<kind::All>().is_ok());
		assert!(spinner.is::<kind::Spinner>());
		assert!(!spinner.is::<kind::Circle>());
	}

	#[test]
	fn counting_by_kind() {
		let beatmap = BeatmapFile {
			hit_objects: vec![
				HitObject::new(0, 0, 0, HitObjectParams::Circle),
				slider(100, 1, 100.),
				HitObject::new(0, 0, 200, HitObjectParams::Circle),
				HitObject::new(0, 0, 300, HitObjectParams::Hold(HoldParams { end_time: 400 })),
			],
			..BeatmapFile::default()
		};

		assert_eq!(beatmap.count::<kind::Circle>(), 2);
		assert_eq!(beatmap.count::<kind::Slider>(), 1);
		assert_eq!(beatmap.count::<kind::Spinner>(), 0);
		assert_eq!(beatmap.count::<kind::All>(), 4);

		let hold_ends: Vec<_> = beatmap.objects::<kind::Hold>().map(|(_, p)| p.end_time).collect();
		assert_eq!(hold_ends, vec![400]);
	}

	#[test]
	fn columns_round_trip() {
		for columns in 1..=18 {
			for column in 0..columns {
				let x = column_to_x(column, columns);
				assert_eq!(column_index_of(x, columns), column, "{columns}K column {column}");
			}
		}

		assert_eq!(column_index_of(-20, 4), 0);
		assert_eq!(column_index_of(512, 4), 3);
		assert_eq!(column_to_x(0, 4), 0);
		assert_eq!(column_to_x(1, 4), 128);
	}

	#[test]
	fn timing_lookups() {
		let beatmap = BeatmapFile {
			timing_points: vec![
				TimingPoint {
					time: 1000,
					beat_length: 400.,
					..TimingPoint::default()
				},
				TimingPoint {
					time: 2000,
					beat_length: -50.,
					uninherited: false,
					effects: TimingPoint::EFFECT_KIAI,
					..TimingPoint::default()
				},
			],
			..BeatmapFile::default()
		};

		assert!(beatmap.timing_point_at(999).is_none());
		assert_eq!(beatmap.nearest_timing_point_at(0).map(|tp| tp.time), Some(1000));
		assert_eq!(beatmap.timing_point_at(2500).map(|tp| tp.time), Some(1000));
		assert_eq!(beatmap.difficulty_point_at(2500).map(|tp| tp.time), Some(2000));
		assert!((beatmap.slider_velocity_at(2500) - 2.).abs() < f64::EPSILON);
		assert!((beatmap.slider_velocity_at(1500) - 1.).abs() < f64::EPSILON);
		assert!(beatmap.is_kiai_at(2000));
		assert!(!beatmap.is_kiai_at(1999));
	}

	#[test]
	fn slider_end_time() {
		let mut beatmap = BeatmapFile {
			timing_points: vec![TimingPoint {
				time: 0,
				beat_length: 500.,
				..TimingPoint::default()
			}],
			..BeatmapFile::default()
		};
		beatmap.difficulty.slider_multiplier = 1.;

		// 100px at 100px per beat is one beat, twice
		assert_eq!(beatmap.end_time(&slider(1000, 2, 100.)), Some(2000));

		beatmap.timing_points.push(TimingPoint {
			time: 3000,
			beat_length: -50.,
			uninherited: false,
			..TimingPoint::default()
		});
		assert_eq!(beatmap.end_time(&slider(3000, 1, 100.)), Some(3250));

		beatmap.timing_points.clear();
		assert_eq!(beatmap.end_time(&slider(1000, 1, 100.)), None);
	}

	#[test]
	fn endless_sliders_saturate() {
		let mut beatmap = BeatmapFile {
			timing_points: vec![TimingPoint::default()],
			..BeatmapFile::default()
		};
		beatmap.difficulty.slider_multiplier = 1.;

		assert_eq!(beatmap.end_time(&slider(1000, 1, 1e9)), Some(i32::MAX));
		assert_eq!(beatmap.end_time(&slider(1000, u32::MAX, f64::INFINITY)), Some(i32::MAX));
	}
}
