use std::num::{ParseFloatError, ParseIntError};
use std::str::FromStr;

use super::{
	BeatmapFile, Color, ColorsSection, DifficultySection, Dialect, EditorSection, Event, GeneralSection, HitObject,
	HitObjectParams, HitObjectType, HitSample, HitSampleSet, HitSound, HoldParams, InvalidHitObjectTypeError,
	InvalidHitSampleSetError, InvalidOverlayPositionError, InvalidSampleBankError, MetadataSection, SliderCurveType,
	SliderParams, SliderPoint, SpinnerParams, Timestamp, TimingPoint, MAX_SLIDER_LENGTH, MAX_SLIDES,
};

#[derive(Debug, thiserror::Error)]
#[error("Could not split line with {split_char:?}")]
pub struct InvalidKeyValuePairError {
	pub split_char: char,
}

/// Parse a `field:value` pair (arbitrary spaces allowed).
pub(crate) fn parse_field_value_pair(line: &str) -> Result<(&str, &str), InvalidKeyValuePairError> {
	let (field, value) = (line.split_once(':')).ok_or(InvalidKeyValuePairError { split_char: ':' })?;
	Ok((field.trim(), value.trim()))
}

#[derive(Debug, thiserror::Error)]
#[error("Invalid list of {type_name}")]
pub struct InvalidListError {
	pub type_name: &'static str,
}

impl InvalidListError {
	#[must_use]
	pub fn of<T>() -> Self {
		Self {
			type_name: std::any::type_name::<T>(),
		}
	}
}

pub(crate) fn parse_list_of_with_sep<T: FromStr>(line: &str, sep: char) -> Result<Vec<T>, InvalidListError> {
	let mut tobjs = Vec::new();
	for value in line.split(sep) {
		let value = value.trim();
		if value.is_empty() {
			continue;
		}

		tobjs.push(value.parse::<T>().map_err(|_| InvalidListError::of::<T>())?);
	}

	Ok(tobjs)
}

pub(crate) fn parse_list_of<T: FromStr>(line: &str) -> Result<Vec<T>, InvalidListError> {
	parse_list_of_with_sep(line, ',')
}

#[must_use]
pub(crate) fn to_standardized_path(path: &str) -> String {
	path.replace('\\', "/")
}

pub(crate) const SECTION_GENERAL: &str = "[General]";
pub(crate) const SECTION_EDITOR: &str = "[Editor]";
pub(crate) const SECTION_METADATA: &str = "[Metadata]";
pub(crate) const SECTION_DIFFICULTY: &str = "[Difficulty]";
pub(crate) const SECTION_EVENTS: &str = "[Events]";
pub(crate) const SECTION_TIMING_POINTS: &str = "[TimingPoints]";
pub(crate) const SECTION_COLOURS: &str = "[Colours]";
pub(crate) const SECTION_HIT_OBJECTS: &str = "[HitObjects]";

pub(crate) const FORMAT_HEADER_PREFIX: &str = "osu file format v";

#[derive(Debug, thiserror::Error)]
#[error("Couldn't parse section {section} at line {line_number}: {line:?}")]
pub struct SectionParseError {
	pub section: &'static str,
	/// 1-based line number in the parsed text.
	pub line_number: usize,
	pub line: String,
	#[source]
	pub kind: SectionParseErrorKind,
}

impl SectionParseError {
	/// Name of the field whose value failed to parse, if the error is about a single field.
	#[must_use]
	pub fn field(&self) -> Option<&'static str> {
		let field_error = match &self.kind {
			SectionParseErrorKind::FieldValueParse(e)
			| SectionParseErrorKind::EventParse(EventParseError::Field(e))
			| SectionParseErrorKind::TimingPointParse(TimingPointParseError::Field(e))
			| SectionParseErrorKind::HitObjectParse(
				HitObjectParseError::Field(e) | HitObjectParseError::HitSampleParse(HitSampleParseError::Field(e)),
			) => e,
			_ => return None,
		};

		Some(field_error.field)
	}
}

#[derive(Debug, thiserror::Error)]
pub enum SectionParseErrorKind {
	#[error("Invalid key-value pair")]
	InvalidKeyValuePair(
		#[from]
		#[source]
		InvalidKeyValuePairError,
	),

	#[error(transparent)]
	FieldValueParse(#[from] FieldValueParseError),

	#[error(transparent)]
	EventParse(#[from] EventParseError),

	#[error("Could not parse timing point")]
	TimingPointParse(
		#[from]
		#[source]
		TimingPointParseError,
	),

	#[error(transparent)]
	HitObjectParse(#[from] HitObjectParseError),

	#[error("Invalid color")]
	ColorParse(
		#[from]
		#[source]
		ColorParseError,
	),
}

/// Where a line sits in the parsed text.
#[derive(Clone, Copy)]
struct LineContext<'a> {
	section: &'static str,
	line_number: usize,
	line: &'a str,
}

impl<'a> LineContext<'a> {
	fn err<T: Into<SectionParseErrorKind>>(self, kind: T) -> SectionParseError {
		SectionParseError {
			section: self.section,
			line_number: self.line_number,
			line: self.line.to_owned(),
			kind: kind.into(),
		}
	}

	fn wrap<T: Into<SectionParseErrorKind>>(self) -> impl FnOnce(T) -> SectionParseError + 'a {
		move |kind| self.err(kind)
	}

	fn field<T>(self, value: &str, field: &'static str) -> Result<T, SectionParseError>
	where
		T: FromStr,
		T::Err: Into<FieldValueParseErrorKind>,
	{
		parse_field(value, field).map_err(self.wrap())
	}

	fn flag(self, value: &str, field: &'static str) -> Result<bool, SectionParseError> {
		parse_flag(value, field).map_err(self.wrap())
	}

	fn timestamp(self, value: &str, field: &'static str) -> Result<Timestamp, SectionParseError> {
		parse_timestamp(value, field).map_err(self.wrap())
	}
}

#[derive(Debug, thiserror::Error)]
#[error("Couldn't parse value of field {field:?}")]
pub struct FieldValueParseError {
	pub field: &'static str,
	#[source]
	pub kind: FieldValueParseErrorKind,
}

impl FieldValueParseError {
	fn out_of_range(field: &'static str, value: impl ToString) -> Self {
		Self {
			field,
			kind: FieldValueParseErrorKind::OutOfRange(value.to_string()),
		}
	}
}

#[derive(Debug, thiserror::Error)]
pub enum FieldValueParseErrorKind {
	#[error("Invalid int")]
	InvalidInt(
		#[from]
		#[source]
		ParseIntError,
	),

	#[error("Invalid float")]
	InvalidFloat(
		#[from]
		#[source]
		ParseFloatError,
	),

	#[error("Timestamp {0:?} is out of range")]
	TimestampOutOfRange(String),

	#[error("Value {0:?} is out of range")]
	OutOfRange(String),

	#[error(transparent)]
	InvalidList(#[from] InvalidListError),

	#[error(transparent)]
	InvalidOverlayPosition(#[from] InvalidOverlayPositionError),

	#[error(transparent)]
	InvalidSampleBank(#[from] InvalidSampleBankError),

	#[error(transparent)]
	InvalidHitSampleSet(#[from] InvalidHitSampleSetError),
}

fn parse_field<T>(value: &str, field: &'static str) -> Result<T, FieldValueParseError>
where
	T: FromStr,
	T::Err: Into<FieldValueParseErrorKind>,
{
	(value.trim().parse::<T>()).map_err(|e| FieldValueParseError { field, kind: e.into() })
}

fn parse_flag(value: &str, field: &'static str) -> Result<bool, FieldValueParseError> {
	Ok(parse_field::<u8>(value, field)? != 0)
}

/// Parses a time in milliseconds. Decimal times are floored.
#[allow(clippy::cast_possible_truncation)]
fn parse_timestamp(value: &str, field: &'static str) -> Result<Timestamp, FieldValueParseError> {
	let value = value.trim();
	if let Ok(time) = value.parse::<Timestamp>() {
		return Ok(time);
	}

	let time: f64 = parse_field(value, field)?;
	if !time.is_finite() || time < f64::from(Timestamp::MIN) || time > f64::from(Timestamp::MAX) {
		return Err(FieldValueParseError {
			field,
			kind: FieldValueParseErrorKind::TimestampOutOfRange(value.to_owned()),
		});
	}

	Ok(time.floor() as Timestamp)
}

#[allow(clippy::cast_possible_truncation)]
fn parse_coordinate(value: &str, field: &'static str) -> Result<i32, FieldValueParseError> {
	let value = value.trim();
	if let Ok(coordinate) = value.parse::<i32>() {
		return Ok(coordinate);
	}

	let coordinate: f64 = parse_field(value, field)?;
	Ok(coordinate.clamp(f64::from(i32::MIN), f64::from(i32::MAX)) as i32)
}

fn is_section_header(line: &str) -> bool {
	line.starts_with('[') && line.ends_with(']')
}

/// Feeds every line of the current section to `parse_line`.
/// Stops at the next section header, which is stored in `section_header`.
fn for_each_line<'a>(
	reader: &mut impl Iterator<Item = (usize, &'a str)>,
	section_header: &mut Option<String>,
	mut parse_line: impl FnMut(usize, &'a str) -> Result<(), SectionParseError>,
) -> Result<(), SectionParseError> {
	*section_header = None;

	while let Some((line_number, line)) = reader.next() {
		if is_section_header(line) {
			*section_header = Some(line.to_owned());
			break;
		}

		parse_line(line_number, line)?;
	}

	Ok(())
}

/// Parse a `[General]` section
fn parse_general_section<'a>(
	reader: &mut impl Iterator<Item = (usize, &'a str)>,
	section_header: &mut Option<String>,
) -> Result<GeneralSection, SectionParseError> {
	let mut section = GeneralSection::default();

	for_each_line(reader, section_header, |line_number, line| {
		let ctx = LineContext {
			section: SECTION_GENERAL,
			line_number,
			line,
		};

		let (field, value) = parse_field_value_pair(line).map_err(ctx.wrap())?;

		match field {
			"AudioFilename" => section.audio_filename = to_standardized_path(value),
			"AudioLeadIn" => section.audio_lead_in = ctx.field(value, "AudioLeadIn")?,
			"AudioHash" => section.audio_hash = Some(value.to_owned()),
			"PreviewTime" => section.preview_time = ctx.timestamp(value, "PreviewTime")?,
			"Countdown" => section.countdown = ctx.field(value, "Countdown")?,
			"SampleSet" => section.sample_set = value.to_owned(),
			"StackLeniency" => section.stack_leniency = ctx.field(value, "StackLeniency")?,
			"Mode" => section.mode = ctx.field(value, "Mode")?,
			"LetterboxInBreaks" => section.letterbox_in_breaks = ctx.flag(value, "LetterboxInBreaks")?,
			"StoryFireInFront" => section.story_fire_in_front = ctx.flag(value, "StoryFireInFront")?,
			"UseSkinSprites" => section.use_skin_sprites = ctx.flag(value, "UseSkinSprites")?,
			"AlwaysShowPlayfield" => section.always_show_playfield = ctx.flag(value, "AlwaysShowPlayfield")?,
			"OverlayPosition" => section.overlay_position = ctx.field(value, "OverlayPosition")?,
			"SkinPreference" => section.skin_preference = Some(value.to_owned()),
			"EpilepsyWarning" => section.epilepsy_warning = ctx.flag(value, "EpilepsyWarning")?,
			"CountdownOffset" => section.countdown_offset = ctx.field(value, "CountdownOffset")?,
			"SpecialStyle" => section.special_style = ctx.flag(value, "SpecialStyle")?,
			"WidescreenStoryboard" => section.widescreen_storyboard = ctx.flag(value, "WidescreenStoryboard")?,
			"SamplesMatchPlaybackRate" => {
				section.samples_match_playback_rate = ctx.flag(value, "SamplesMatchPlaybackRate")?;
			}
			key => tracing::warn!("{SECTION_GENERAL} section: unknown field {key:?}"),
		}

		Ok(())
	})?;

	Ok(section)
}

/// Parse a `[Editor]` section
fn parse_editor_section<'a>(
	reader: &mut impl Iterator<Item = (usize, &'a str)>,
	section_header: &mut Option<String>,
) -> Result<EditorSection, SectionParseError> {
	let mut section = EditorSection::default();

	for_each_line(reader, section_header, |line_number, line| {
		let ctx = LineContext {
			section: SECTION_EDITOR,
			line_number,
			line,
		};

		let (field, value) = parse_field_value_pair(line).map_err(ctx.wrap())?;

		match field {
			"Bookmarks" => {
				section.bookmarks = parse_list_of(value)
					.map_err(|e| FieldValueParseError {
						field: "Bookmarks",
						kind: e.into(),
					})
					.map_err(ctx.wrap())?;
			}
			"DistanceSpacing" => section.distance_spacing = ctx.field(value, "DistanceSpacing")?,
			"BeatDivisor" => section.beat_divisor = ctx.field(value, "BeatDivisor")?,
			"GridSize" => section.grid_size = ctx.field(value, "GridSize")?,
			"TimelineZoom" => section.timeline_zoom = Some(ctx.field(value, "TimelineZoom")?),
			key => tracing::warn!("{SECTION_EDITOR} section: unknown field {key:?}"),
		}

		Ok(())
	})?;

	Ok(section)
}

/// Parse a `[Metadata]` section
fn parse_metadata_section<'a>(
	reader: &mut impl Iterator<Item = (usize, &'a str)>,
	section_header: &mut Option<String>,
) -> Result<MetadataSection, SectionParseError> {
	let mut section = MetadataSection::default();

	for_each_line(reader, section_header, |line_number, line| {
		let ctx = LineContext {
			section: SECTION_METADATA,
			line_number,
			line,
		};

		let (field, value) = parse_field_value_pair(line).map_err(ctx.wrap())?;

		match field {
			"Title" => section.title = value.to_owned(),
			"TitleUnicode" => section.title_unicode = value.to_owned(),
			"Artist" => section.artist = value.to_owned(),
			"ArtistUnicode" => section.artist_unicode = value.to_owned(),
			"Creator" => section.creator = value.to_owned(),
			"Version" => section.version = value.to_owned(),
			"Source" => section.source = value.to_owned(),
			"Tags" => section.tags = value.split(' ').map(ToOwned::to_owned).collect(),
			"BeatmapID" => section.beatmap_id = Some(ctx.field(value, "BeatmapID")?),
			"BeatmapSetID" => section.beatmap_set_id = Some(ctx.field(value, "BeatmapSetID")?),
			key => tracing::warn!("{SECTION_METADATA} section: unknown field {key:?}"),
		}

		Ok(())
	})?;

	Ok(section)
}

/// Parse a `[Difficulty]` section
fn parse_difficulty_section<'a>(
	reader: &mut impl Iterator<Item = (usize, &'a str)>,
	section_header: &mut Option<String>,
) -> Result<DifficultySection, SectionParseError> {
	let mut section = DifficultySection::default();
	let mut approach_rate: Option<f32> = None;

	for_each_line(reader, section_header, |line_number, line| {
		let ctx = LineContext {
			section: SECTION_DIFFICULTY,
			line_number,
			line,
		};

		let (field, value) = parse_field_value_pair(line).map_err(ctx.wrap())?;

		match field {
			"HPDrainRate" => section.hp_drain_rate = ctx.field(value, "HPDrainRate")?,
			"CircleSize" => section.circle_size = ctx.field(value, "CircleSize")?,
			"OverallDifficulty" => section.overall_difficulty = ctx.field(value, "OverallDifficulty")?,
			"ApproachRate" => approach_rate = Some(ctx.field(value, "ApproachRate")?),
			"SliderMultiplier" => section.slider_multiplier = ctx.field(value, "SliderMultiplier")?,
			"SliderTickRate" => section.slider_tick_rate = ctx.field(value, "SliderTickRate")?,
			key => tracing::warn!("{SECTION_DIFFICULTY} section: unknown field {key:?}"),
		}

		Ok(())
	})?;

	// Old files have no approach rate; the game reads it from the overall difficulty.
	section.approach_rate = approach_rate.unwrap_or(section.overall_difficulty);

	Ok(section)
}

#[derive(Debug, thiserror::Error)]
pub enum EventParseError {
	#[error("Unknown event type: {0:?}")]
	UnknownEventType(String),

	#[error("{event} event has no {field}")]
	MissingField {
		event: &'static str,
		field: &'static str,
	},

	#[error(transparent)]
	Field(#[from] FieldValueParseError),
}

fn parse_event(line: &str) -> Result<Option<Event>, EventParseError> {
	let values: Vec<&str> = line.split(',').map(str::trim).collect();
	let event_type = values[0];

	// Ignoring storyboard events
	match event_type {
		"3" | "4" | "5" | "6" | "Sample" | "Sprite" | "Animation" | "F" | "M" | "MX" | "MY" | "S" | "V" | "R" | "C"
		| "L" | "T" | "P" => {
			tracing::info!("Ignoring storyboard event {:?}", line);
			return Ok(None);
		}
		t if t.starts_with('_') => {
			tracing::info!("Ignoring storyboard event {:?}", line);
			return Ok(None);
		}
		_ => (),
	}

	let missing = |event: &'static str, field: &'static str| EventParseError::MissingField { event, field };
	let offset = |index: usize, field: &'static str| -> Result<i32, FieldValueParseError> {
		values.get(index).map_or(Ok(0), |v| parse_field(v, field))
	};

	let event = match event_type {
		"0" | "Background" => {
			let filename = values.get(2).ok_or_else(|| missing("Background", "filename"))?;

			Event::Background {
				filename: filename.trim_matches('"').to_owned(),
				x_offset: offset(3, "xOffset")?,
				y_offset: offset(4, "yOffset")?,
			}
		}
		"1" | "Video" => {
			let start_time = values.get(1).ok_or_else(|| missing("Video", "start time"))?;
			let filename = values.get(2).ok_or_else(|| missing("Video", "filename"))?;

			Event::Video {
				start_time: parse_timestamp(start_time, "startTime")?,
				filename: filename.trim_matches('"').to_owned(),
				x_offset: offset(3, "xOffset")?,
				y_offset: offset(4, "yOffset")?,
			}
		}
		"2" | "Break" => {
			let start_time = values.get(1).ok_or_else(|| missing("Break", "start time"))?;
			let end_time = values.get(2).ok_or_else(|| missing("Break", "end time"))?;

			Event::Break {
				start_time: parse_timestamp(start_time, "startTime")?,
				end_time: parse_timestamp(end_time, "endTime")?,
			}
		}
		t => return Err(EventParseError::UnknownEventType(t.to_owned())),
	};

	Ok(Some(event))
}

/// Parse a `[Events]` section
fn parse_events_section<'a>(
	reader: &mut impl Iterator<Item = (usize, &'a str)>,
	section_header: &mut Option<String>,
) -> Result<Vec<Event>, SectionParseError> {
	let mut events: Vec<Event> = Vec::new();

	for_each_line(reader, section_header, |line_number, line| {
		let ctx = LineContext {
			section: SECTION_EVENTS,
			line_number,
			line,
		};

		if let Some(event) = parse_event(line).map_err(ctx.wrap())? {
			events.push(event);
		}

		Ok(())
	})?;

	Ok(events)
}

#[derive(Debug, thiserror::Error)]
pub enum TimingPointParseError {
	#[error("Expected between 2 and 8 values, got {0}")]
	WrongValueCount(usize),

	#[error(transparent)]
	Field(#[from] FieldValueParseError),
}

/// Parse a timing point line.
///
/// Missing trailing fields take their defaults. A missing uninherited flag is read from the sign
/// of the beat length in legacy files and means "uninherited" in modern ones.
///
/// # Errors
///
/// Fails if the line has less than 2 or more than 8 values, or if any value is malformed.
pub fn parse_timing_point(line: &str, dialect: Dialect) -> Result<TimingPoint, TimingPointParseError> {
	let values: Vec<&str> = line.split(',').collect();
	if !(2..=8).contains(&values.len()) {
		return Err(TimingPointParseError::WrongValueCount(values.len()));
	}

	let mut timing_point = TimingPoint {
		time: parse_timestamp(values[0], "time")?,
		beat_length: parse_field(values[1], "beatLength")?,
		..TimingPoint::default()
	};

	if let Some(meter) = values.get(2) {
		timing_point.meter = parse_field(meter, "meter")?;
	}
	if let Some(sample_set) = values.get(3) {
		timing_point.sample_set = parse_field(sample_set, "sampleSet")?;
	}
	if let Some(sample_index) = values.get(4) {
		timing_point.sample_index = parse_field(sample_index, "sampleIndex")?;
	}
	if let Some(volume) = values.get(5) {
		timing_point.volume = parse_field(volume, "volume")?;
	}

	timing_point.uninherited = match (values.get(6), dialect) {
		(Some(uninherited), _) => parse_flag(uninherited, "uninherited")?,
		(None, Dialect::Legacy) => timing_point.beat_length >= 0.,
		(None, Dialect::Modern) => true,
	};

	if let Some(effects) = values.get(7) {
		timing_point.effects = parse_field(effects, "effects")?;
	}

	Ok(timing_point)
}

/// Parse a `[TimingPoints]` section
fn parse_timing_points_section<'a>(
	reader: &mut impl Iterator<Item = (usize, &'a str)>,
	section_header: &mut Option<String>,
	dialect: Dialect,
) -> Result<Vec<TimingPoint>, SectionParseError> {
	let mut timing_points: Vec<TimingPoint> = Vec::new();

	for_each_line(reader, section_header, |line_number, line| {
		let ctx = LineContext {
			section: SECTION_TIMING_POINTS,
			line_number,
			line,
		};

		timing_points.push(parse_timing_point(line, dialect).map_err(ctx.wrap())?);
		Ok(())
	})?;

	Ok(timing_points)
}

#[derive(Debug, thiserror::Error)]
pub enum ColorParseError {
	#[error("Invalid RGB(A) values list")]
	InvalidList(
		#[from]
		#[source]
		InvalidListError,
	),

	#[error("Expected 3 or 4 numbers between 0 and 255")]
	WrongNumberCount,
}

fn parse_color(line: &str) -> Result<Color, ColorParseError> {
	let nums = parse_list_of(line)?;
	if let [r, g, b] = nums[..] {
		Ok(Color { r, g, b, a: None })
	} else if let [r, g, b, a] = nums[..] {
		Ok(Color { r, g, b, a: Some(a) })
	} else {
		Err(ColorParseError::WrongNumberCount)
	}
}

/// Parse a `[Colours]` section
fn parse_colors_section<'a>(
	reader: &mut impl Iterator<Item = (usize, &'a str)>,
	section_header: &mut Option<String>,
) -> Result<ColorsSection, SectionParseError> {
	let mut colors_section: ColorsSection = ColorsSection::default();

	for_each_line(reader, section_header, |line_number, line| {
		let ctx = LineContext {
			section: SECTION_COLOURS,
			line_number,
			line,
		};

		let (field, value) = parse_field_value_pair(line).map_err(ctx.wrap())?;
		let value = parse_color(value).map_err(ctx.wrap())?;

		if field.starts_with("Combo") {
			// NOTE: This doesn't take into account the actual written index of the combo color.
			colors_section.combo_colors.push(value);
		} else {
			match field {
				"SliderTrackOverride" => colors_section.slider_track_override = Some(value),
				"SliderBorder" => colors_section.slider_border = Some(value),
				field => tracing::warn!("{SECTION_COLOURS} section: unknown field {field:?}"),
			}
		}

		Ok(())
	})?;

	Ok(colors_section)
}

#[derive(Debug, thiserror::Error)]
pub enum HitSampleParseError {
	#[error("Expected {min} to 5 colon-separated values in a {dialect:?} hit sample, got {count}")]
	WrongValueCount {
		count: usize,
		min: usize,
		dialect: Dialect,
	},

	#[error(transparent)]
	Field(#[from] FieldValueParseError),
}

/// Parse the `normalSet:additionSet:index:volume:filename` trailer of a hit object.
///
/// Legacy files may cut it after `additionSet` or `index`. An empty trailer means there is no hit sample.
///
/// # Errors
///
/// Fails if the trailer has the wrong amount of values for the dialect or if a value is malformed.
pub fn parse_hit_sample(line: &str, dialect: Dialect) -> Result<Option<HitSample>, HitSampleParseError> {
	if line.trim().is_empty() {
		return Ok(None);
	}

	let args = line.split(':').collect::<Vec<_>>();
	let min = match dialect {
		Dialect::Legacy => 2,
		Dialect::Modern => 4,
	};

	if args.len() < min || args.len() > 5 {
		return Err(HitSampleParseError::WrongValueCount {
			count: args.len(),
			min,
			dialect,
		});
	}

	let mut hit_sample = HitSample {
		normal_set: parse_field(args[0], "normalSet")?,
		addition_set: parse_field(args[1], "additionSet")?,
		..HitSample::default()
	};

	if let Some(index) = args.get(2) {
		hit_sample.index = parse_field(index, "index")?;
	}
	if let Some(volume) = args.get(3) {
		hit_sample.volume = parse_field(volume, "volume")?;
	}
	if let Some(filename) = args.get(4).filter(|f| !f.is_empty()) {
		hit_sample.filename = Some((*filename).to_owned());
	}

	Ok(Some(hit_sample))
}

#[derive(Debug, thiserror::Error)]
pub enum CurvePointsParseError {
	#[error("Not enough tokens")]
	NotEnoughTokens,

	#[error("Unknown curve type: {0:?}")]
	InvalidCurveType(String),

	#[error("Invalid slider point: {0:?}")]
	InvalidSliderPoint(String),
}

fn parse_curve_points(line: &str) -> Result<(SliderCurveType, Vec<SliderPoint>), CurvePointsParseError> {
	let mut curve_tokens = line.split('|');

	let first_curve_token = curve_tokens.next().ok_or(CurvePointsParseError::NotEnoughTokens)?;
	let first_curve_type = SliderCurveType::from_letter(first_curve_token)
		.ok_or_else(|| CurvePointsParseError::InvalidCurveType(first_curve_token.to_owned()))?;

	let mut curve_points = Vec::new();
	let mut curve_type = SliderCurveType::Inherit;
	for curve_token in curve_tokens {
		if let Some((x, y)) = curve_token.split_once(':') {
			let invalid_point = || CurvePointsParseError::InvalidSliderPoint(curve_token.to_owned());
			let x = parse_coordinate(x, "x").map_err(|_| invalid_point())?;
			let y = parse_coordinate(y, "y").map_err(|_| invalid_point())?;

			curve_points.push(SliderPoint { curve_type, x, y });

			curve_type = SliderCurveType::Inherit;
		} else {
			curve_type = SliderCurveType::from_letter(curve_token)
				.ok_or_else(|| CurvePointsParseError::InvalidCurveType(curve_token.to_owned()))?;
		}
	}

	if curve_points.is_empty() {
		return Err(CurvePointsParseError::NotEnoughTokens);
	}

	Ok((first_curve_type, curve_points))
}

#[derive(Debug, thiserror::Error)]
pub enum HitObjectParseError {
	#[error("Expected at least 5 comma-separated arguments for the hit object, got {0}")]
	NotEnoughArguments(usize),

	#[error(transparent)]
	InvalidHitObjectType(#[from] InvalidHitObjectTypeError),

	#[error("Expected at least 3 object parameters for slider, got {0}")]
	WrongSliderParameterCount(usize),

	#[error("Expected at least 1 object parameter for spinner, got {0}")]
	WrongSpinnerParameterCount(usize),

	#[error("Expected at least 1 object parameter for hold, got {0}")]
	WrongHoldParameterCount(usize),

	#[error("Slider must have at least one slide")]
	ZeroSlides,

	#[error("Invalid edge list")]
	InvalidEdgeList(
		#[from]
		#[source]
		InvalidListError,
	),

	#[error("Couldn't parse curve points")]
	CurvePointsParse(
		#[from]
		#[source]
		CurvePointsParseError,
	),

	#[error("Couldn't parse hitsample")]
	HitSampleParse(
		#[from]
		#[source]
		HitSampleParseError,
	),

	#[error(transparent)]
	Field(#[from] FieldValueParseError),
}

/// Parse a hit object line.
///
/// # Errors
///
/// Fails if the line doesn't conform to the osu! hit object format of the given dialect.
pub fn parse_hit_object(line: &str, dialect: Dialect) -> Result<HitObject, HitObjectParseError> {
	let args = line.split(',').collect::<Vec<_>>();
	let [x, y, time, object_type, hit_sound, object_params @ ..] = &args[..] else {
		return Err(HitObjectParseError::NotEnoughArguments(args.len()));
	};

	let x = parse_coordinate(x, "x")?;
	let y = parse_coordinate(y, "y")?;
	let time = parse_timestamp(time, "time")?;
	let raw_object_type: u8 = parse_field(object_type, "type")?;
	let hit_sound: HitSound = parse_field(hit_sound, "hitSound")?;

	let mut hit_sample_leftover: Option<&str> = None;

	let params = match HitObject::type_from_raw(raw_object_type)? {
		HitObjectType::Circle => {
			hit_sample_leftover = object_params.first().copied();
			HitObjectParams::Circle
		}
		HitObjectType::Slider => {
			let [curve_points, slides, length, leftover @ ..] = object_params else {
				return Err(HitObjectParseError::WrongSliderParameterCount(object_params.len()));
			};

			let (first_curve_type, curve_points) = parse_curve_points(curve_points)?;

			let slides: u32 = parse_field(slides, "slides")?;
			if slides == 0 {
				return Err(HitObjectParseError::ZeroSlides);
			}
			if slides > MAX_SLIDES {
				return Err(FieldValueParseError::out_of_range("slides", slides).into());
			}

			let length: f64 = parse_field(length, "length")?;
			if !(0. ..=MAX_SLIDER_LENGTH).contains(&length) {
				return Err(FieldValueParseError::out_of_range("length", length).into());
			}

			let mut edge_hitsounds = Vec::new();
			let mut edge_samplesets = Vec::new();
			if let Some(ehitsounds) = leftover.first() {
				edge_hitsounds = parse_list_of_with_sep::<HitSound>(ehitsounds, '|')?;
			}
			if let Some(esamplesets) = leftover.get(1) {
				edge_samplesets = parse_list_of_with_sep::<HitSampleSet>(esamplesets, '|')?;
			}
			hit_sample_leftover = leftover.get(2).copied();

			// Just in case there were no edge hitsounds/samplesets
			let edges = slides as usize + 1;
			if edge_hitsounds.is_empty() {
				edge_hitsounds = vec![HitSound::NONE; edges];
			}
			if edge_samplesets.is_empty() {
				edge_samplesets = vec![HitSampleSet::default(); edges];
			}

			HitObjectParams::Slider(SliderParams {
				first_curve_type,
				curve_points,
				slides,
				length,
				edge_hitsounds,
				edge_samplesets,
			})
		}
		HitObjectType::Spinner => {
			let [end_time, leftover @ ..] = object_params else {
				return Err(HitObjectParseError::WrongSpinnerParameterCount(object_params.len()));
			};

			hit_sample_leftover = leftover.first().copied();
			HitObjectParams::Spinner(SpinnerParams {
				end_time: parse_timestamp(end_time, "endTime")?,
			})
		}
		HitObjectType::Hold => {
			let [leftover, ..] = object_params else {
				return Err(HitObjectParseError::WrongHoldParameterCount(object_params.len()));
			};

			// `endTime:hitSample`
			let end_time = match leftover.split_once(':') {
				Some((end_time, hit_sample)) => {
					hit_sample_leftover = Some(hit_sample);
					end_time
				}
				None => *leftover,
			};

			HitObjectParams::Hold(HoldParams {
				end_time: parse_timestamp(end_time, "endTime")?,
			})
		}
	};

	let hit_sample = match hit_sample_leftover {
		Some(hit_sample) => parse_hit_sample(hit_sample, dialect)?,
		None => None,
	};

	let combo_color_skip = HitObject::raw_is_new_combo(raw_object_type).then_some((raw_object_type & 0b0111_0000) >> 4);

	Ok(HitObject {
		x,
		y,
		time,
		combo_color_skip,
		hit_sound,
		params,
		hit_sample,
	})
}

/// Parse a `[HitObjects]` section
fn parse_hit_objects_section<'a>(
	reader: &mut impl Iterator<Item = (usize, &'a str)>,
	section_header: &mut Option<String>,
	dialect: Dialect,
) -> Result<Vec<HitObject>, SectionParseError> {
	let mut hit_objects: Vec<HitObject> = Vec::new();

	for_each_line(reader, section_header, |line_number, line| {
		let ctx = LineContext {
			section: SECTION_HIT_OBJECTS,
			line_number,
			line,
		};

		hit_objects.push(parse_hit_object(line, dialect).map_err(ctx.wrap())?);
		Ok(())
	})?;

	Ok(hit_objects)
}

#[derive(Debug, thiserror::Error)]
pub enum BeatmapParseError {
	#[error("Line {line_number} doesn't match \"osu file format v<version>\": {line:?}")]
	InvalidOsuFileFormat { line_number: usize, line: String },

	#[error(transparent)]
	SectionParse(#[from] SectionParseError),
}

/// Parses the text of a `.osu` file.
///
/// The dialect is `declared` if given, otherwise it is detected from the `osu file format v<N>` header.
/// Files without a header are read with the modern dialect unless told otherwise.
///
/// # Errors
///
/// Fails on the first malformed line. The error carries the section, line number and line.
pub fn parse_beatmap(content: &str, declared: Option<Dialect>) -> Result<BeatmapFile, BeatmapParseError> {
	let mut reader = (content.lines().enumerate())
		.map(|(index, line)| (index + 1, line.trim_start_matches('\u{feff}').trim()))
		// Ignore comments and empty lines
		.filter(|(_, line)| !line.is_empty() && !line.starts_with("//"))
		.peekable();

	let mut format_version = None;
	if let Some(&(line_number, line)) = reader.peek() {
		if let Some(version) = line.strip_prefix(FORMAT_HEADER_PREFIX) {
			let version = version.trim().parse::<u32>().map_err(|_| BeatmapParseError::InvalidOsuFileFormat {
				line_number,
				line: line.to_owned(),
			})?;

			format_version = Some(version);
			reader.next();
		}
	}

	let dialect = declared
		.or_else(|| format_version.map(Dialect::from_format_version))
		.unwrap_or_default();

	let mut beatmap = BeatmapFile {
		osu_file_format: format_version.unwrap_or(match dialect {
			Dialect::Legacy => Dialect::FIRST_MODERN_VERSION - 1,
			Dialect::Modern => Dialect::LATEST_STABLE_VERSION,
		}),
		dialect,
		..BeatmapFile::default()
	};

	let mut section_header: Option<String> = None;
	for (line_number, line) in reader.by_ref() {
		if is_section_header(line) {
			section_header = Some(line.to_owned());
			break;
		}

		tracing::warn!("Ignoring line {line_number} outside of any section: {line:?}");
	}

	// Read file lazily section by section
	while let Some(section_str) = section_header.take() {
		match section_str.as_str() {
			SECTION_GENERAL => beatmap.general = parse_general_section(&mut reader, &mut section_header)?,
			SECTION_EDITOR => beatmap.editor = parse_editor_section(&mut reader, &mut section_header)?,
			SECTION_METADATA => beatmap.metadata = parse_metadata_section(&mut reader, &mut section_header)?,
			SECTION_DIFFICULTY => beatmap.difficulty = parse_difficulty_section(&mut reader, &mut section_header)?,
			SECTION_EVENTS => beatmap.events = parse_events_section(&mut reader, &mut section_header)?,
			SECTION_TIMING_POINTS => {
				beatmap.timing_points = parse_timing_points_section(&mut reader, &mut section_header, dialect)?;
			}
			SECTION_COLOURS => beatmap.colors = Some(parse_colors_section(&mut reader, &mut section_header)?),
			SECTION_HIT_OBJECTS => {
				beatmap.hit_objects = parse_hit_objects_section(&mut reader, &mut section_header, dialect)?;
			}
			unknown => {
				tracing::warn!("Skipping unknown section {unknown}");
				for_each_line(&mut reader, &mut section_header, |_, _| Ok(()))?;
			}
		}
	}

	beatmap.sort();
	Ok(beatmap)
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;

	use super::{
		parse_beatmap, parse_curve_points, parse_hit_object, parse_hit_sample, parse_timing_point, BeatmapParseError,
		CurvePointsParseError, FieldValueParseErrorKind, HitObjectParseError, SectionParseErrorKind,
	};
	use crate::file::beatmap::{
		kind, Dialect, Event, HitObjectParams, HitObjectType, HitSample, HitSound, HoldParams, SampleBank,
		SliderCurveType, SliderPoint, TimingPoint,
	};

	const SAMPLE: &str = "osu file format v14\r
\r
[General]\r
AudioFilename: audio.mp3\r
AudioLeadIn: 0\r
PreviewTime: 12000\r
Mode: 0\r
SomethingNew: 1\r
\r
[Editor]\r
Bookmarks: 1000,2000\r
DistanceSpacing: 1.2\r
BeatDivisor: 4\r
GridSize: 32\r
\r
[Metadata]\r
Title:Sample Song\r
Artist:Someone\r
Creator:Mapper\r
Version:Hard\r
Tags:one two three\r
BeatmapID:123\r
\r
[Difficulty]\r
HPDrainRate:5\r
CircleSize:4\r
OverallDifficulty:7\r
ApproachRate:8\r
SliderMultiplier:1.4\r
SliderTickRate:1\r
\r
[Events]\r
//Background and Video events\r
0,0,\"bg.jpg\",0,0\r
Sprite,Foreground,Centre,\"sb.png\",320,240\r
 F,0,1000,2000,0,1\r
2,5000,7000\r
\r
[TimingPoints]\r
0,500,4,2,0,60,1,0\r
4000,-50,4,2,0,60,0,1\r
\r
[Colours]\r
Combo1 : 255,128,0\r
SliderBorder : 0,0,0\r
\r
[Fonts]\r
HitCircleFont: default\r
\r
[HitObjects]\r
256,192,1500,12,0,3000,0:0:0:0:\r
100,100,0,5,2,0:0:0:0:\r
200,100,500,2,0,B|250:100|300:150,2,140,2|0|8,0:0|0:0|1:2,0:0:0:0:\r
";

	#[test]
	fn curve_points() {
		let curve_points = "B|B|465:225|B|473:217|457:121";
		let (curve_type, control_points) = parse_curve_points(curve_points).unwrap();

		assert_eq!(curve_type, SliderCurveType::Bezier);
		assert_eq!(control_points.as_slice(), &[
			SliderPoint::new(SliderCurveType::Bezier, 465, 225),
			SliderPoint::new(SliderCurveType::Bezier, 473, 217),
			SliderPoint::new(SliderCurveType::Inherit, 457, 121),
		]);
	}

	#[test]
	fn unknown_curve_letter() {
		assert!(matches!(
			parse_curve_points("X|100:100"),
			Err(CurvePointsParseError::InvalidCurveType(letter)) if letter == "X"
		));

		let err = parse_hit_object("0,0,0,2,0,Q|1:1,1,100", Dialect::Modern).unwrap_err();
		assert!(matches!(
			err,
			HitObjectParseError::CurvePointsParse(CurvePointsParseError::InvalidCurveType(_))
		));
	}

	#[test]
	fn full_file() {
		let beatmap = parse_beatmap(SAMPLE, None).unwrap();

		assert_eq!(beatmap.osu_file_format, 14);
		assert_eq!(beatmap.dialect, Dialect::Modern);
		assert_eq!(beatmap.general.audio_filename, "audio.mp3");
		assert_eq!(beatmap.general.preview_time, 12000);
		assert_eq!(beatmap.editor.bookmarks, vec![1000, 2000]);
		assert_eq!(beatmap.editor.grid_size, 32);
		assert_eq!(beatmap.metadata.title, "Sample Song");
		assert_eq!(beatmap.metadata.tags, vec!["one", "two", "three"]);
		assert_eq!(beatmap.metadata.beatmap_id, Some(123));
		assert!((beatmap.difficulty.approach_rate - 8.).abs() < f32::EPSILON);

		assert_eq!(beatmap.events, vec![
			Event::Background {
				filename: "bg.jpg".to_owned(),
				x_offset: 0,
				y_offset: 0,
			},
			Event::Break {
				start_time: 5000,
				end_time: 7000,
			},
		]);

		assert_eq!(beatmap.timing_points.len(), 2);
		assert!(!beatmap.timing_points[1].uninherited);
		assert!(beatmap.timing_points[1].is_kiai());

		let colors = beatmap.colors.as_ref().unwrap();
		assert_eq!(colors.combo_colors.len(), 1);
		assert!(colors.slider_border.is_some());

		// Sorted by time, whatever the file order
		let times: Vec<_> = beatmap.hit_objects.iter().map(|o| o.time).collect();
		assert_eq!(times, vec![0, 500, 1500]);
		assert_eq!(beatmap.hit_objects[0].combo_color_skip, Some(0));
		assert_eq!(beatmap.hit_objects[0].hit_sound, HitSound::WHISTLE);

		let (_, slider) = beatmap.objects::<kind::Slider>().next().unwrap();
		assert_eq!(slider.slides, 2);
		assert_eq!(slider.edge_hitsounds, vec![HitSound::WHISTLE, HitSound::NONE, HitSound::CLAP]);
		assert_eq!(slider.edge_samplesets[2].addition_set, SampleBank::Soft);

		assert_eq!(beatmap.count::<kind::Spinner>(), 1);
	}

	#[test]
	fn dialect_field_count_fidelity() {
		let legacy = parse_hit_object("100,100,1000,1,0", Dialect::Legacy).unwrap();
		let modern = parse_hit_object("100,100,1000,1,0,0:0:0:0:", Dialect::Modern).unwrap();

		assert_eq!((legacy.x, legacy.y, legacy.time), (modern.x, modern.y, modern.time));
		assert_eq!(legacy.object_type(), modern.object_type());
		assert_eq!(legacy.raw_object_type(), modern.raw_object_type());
		assert_eq!(legacy.hit_sample, None);
		assert_eq!(modern.hit_sample, Some(HitSample::default()));
	}

	#[test]
	fn hit_sample_layouts() {
		let legacy = parse_hit_sample("1:2:3", Dialect::Legacy).unwrap().unwrap();
		assert_eq!(legacy.normal_set, SampleBank::Normal);
		assert_eq!(legacy.addition_set, SampleBank::Soft);
		assert_eq!(legacy.index, 3);
		assert_eq!(legacy.volume, 0);

		assert!(parse_hit_sample("1:2:3", Dialect::Modern).is_err());
		assert!(parse_hit_sample("1:2:3:4:5:6", Dialect::Legacy).is_err());

		let modern = parse_hit_sample("3:0:0:70:kick.wav", Dialect::Modern).unwrap().unwrap();
		assert_eq!(modern.volume, 70);
		assert_eq!(modern.filename.as_deref(), Some("kick.wav"));

		assert_eq!(parse_hit_sample("", Dialect::Modern).unwrap(), None);
	}

	#[test]
	fn timing_point_dialects() {
		let legacy = parse_timing_point("100,-100", Dialect::Legacy).unwrap();
		assert!(!legacy.uninherited);
		assert_eq!(legacy.meter, 4);
		assert_eq!(legacy.volume, 100);

		let legacy = parse_timing_point("100,333.33", Dialect::Legacy).unwrap();
		assert!(legacy.uninherited);

		let modern = parse_timing_point("100,-100,4,1,0,80", Dialect::Modern).unwrap();
		assert!(modern.uninherited);
		assert_eq!(modern.sample_set, SampleBank::Normal);
		assert_eq!(modern.volume, 80);

		assert!(parse_timing_point("100", Dialect::Modern).is_err());
		assert!(parse_timing_point("1,2,3,0,5,6,1,0,9", Dialect::Modern).is_err());
	}

	#[test]
	fn decimal_times_are_floored() {
		let tp = parse_timing_point("1234.9,500", Dialect::Modern).unwrap();
		assert_eq!(tp, TimingPoint {
			time: 1234,
			beat_length: 500.,
			..TimingPoint::default()
		});

		let circle = parse_hit_object("10.5,20,99.99,1,0", Dialect::Legacy).unwrap();
		assert_eq!((circle.x, circle.time), (10, 99));
	}

	#[test]
	fn hold_end_time_and_sample() {
		let hold = parse_hit_object("64,192,1000,128,0,1500:0:0:0:0:", Dialect::Modern).unwrap();
		assert_eq!(hold.object_type(), HitObjectType::Hold);
		assert_eq!(hold.params, HitObjectParams::Hold(HoldParams { end_time: 1500 }));
		assert_eq!(hold.hit_sample, Some(HitSample::default()));

		let bare = parse_hit_object("64,192,1000,128,0,1500", Dialect::Legacy).unwrap();
		assert_eq!(bare.params, HitObjectParams::Hold(HoldParams { end_time: 1500 }));
		assert_eq!(bare.hit_sample, None);
	}

	#[test]
	fn absurd_slider_values_are_rejected() {
		for line in [
			"100,100,1000,2,0,L|200:100,1,1e9",
			"100,100,1000,2,0,L|200:100,1,inf",
			"100,100,1000,2,0,L|200:100,1,-20",
			"100,100,1000,2,0,L|200:100,4000000000,100",
		] {
			let Err(HitObjectParseError::Field(err)) = parse_hit_object(line, Dialect::Legacy) else {
				panic!("{line:?} should not parse");
			};
			assert!(matches!(err.kind, FieldValueParseErrorKind::OutOfRange(_)), "{line:?}");
		}

		let slider = parse_hit_object("100,100,1000,2,0,L|200:100,10000,100", Dialect::Legacy).unwrap();
		assert!(slider.is::<kind::Slider>());
	}

	#[test]
	fn invalid_hit_object_type_has_context() {
		let text = "osu file format v14\n[HitObjects]\n100,100,0,1,0,0:0:0:0:\n100,100,100,3,0,0:0:0:0:\n";
		let Err(BeatmapParseError::SectionParse(err)) = parse_beatmap(text, None) else {
			panic!("expected a section error");
		};

		assert_eq!(err.section, "[HitObjects]");
		assert_eq!(err.line_number, 4);
		assert_eq!(err.line, "100,100,100,3,0,0:0:0:0:");
		assert!(matches!(
			err.kind,
			SectionParseErrorKind::HitObjectParse(HitObjectParseError::InvalidHitObjectType(_))
		));
	}

	#[test]
	fn field_errors_name_the_field() {
		let text = "osu file format v14\n\n[Difficulty]\nHPDrainRate: 5\nCircleSize: four\n";
		let Err(BeatmapParseError::SectionParse(err)) = parse_beatmap(text, None) else {
			panic!("expected a section error");
		};

		assert_eq!(err.section, "[Difficulty]");
		assert_eq!(err.line_number, 5);
		assert_eq!(err.field(), Some("CircleSize"));

		let text = "osu file format v14\n[TimingPoints]\n0,500,4,2,0,loud,1,0\n";
		let Err(BeatmapParseError::SectionParse(err)) = parse_beatmap(text, None) else {
			panic!("expected a section error");
		};
		assert_eq!(err.field(), Some("volume"));
		assert_eq!(err.line_number, 3);
	}

	#[test]
	fn modern_short_hit_sample_is_an_error() {
		let text = "osu file format v14\n[HitObjects]\n100,100,0,1,0,0:0:0\n";
		assert!(parse_beatmap(text, None).is_err());

		let text = "osu file format v9\n[HitObjects]\n100,100,0,1,0,0:0:0\n";
		let beatmap = parse_beatmap(text, None).unwrap();
		assert_eq!(beatmap.dialect, Dialect::Legacy);
		assert!(beatmap.hit_objects[0].hit_sample.is_some());
	}

	#[test]
	fn header_detection() {
		let text = "\u{feff}osu file format v128\n[General]\nMode: 3\n";
		let beatmap = parse_beatmap(text, None).unwrap();
		assert_eq!(beatmap.osu_file_format, 128);
		assert_eq!(beatmap.general.mode, 3);

		let headerless = "[TimingPoints]\n0,-100\n";
		let modern = parse_beatmap(headerless, None).unwrap();
		let legacy = parse_beatmap(headerless, Some(Dialect::Legacy)).unwrap();
		assert!(modern.timing_points[0].uninherited);
		assert!(!legacy.timing_points[0].uninherited);

		assert!(matches!(
			parse_beatmap("osu file format vX\n", None),
			Err(BeatmapParseError::InvalidOsuFileFormat { line_number: 1, .. })
		));
	}

	#[test]
	fn approach_rate_defaults_to_overall_difficulty() {
		let beatmap = parse_beatmap("osu file format v5\n[Difficulty]\nOverallDifficulty:6\n", None).unwrap();
		assert!((beatmap.difficulty.approach_rate - 6.).abs() < f32::EPSILON);
	}
}
