use std::io::{self, Write};

use super::parsing::{
	FORMAT_HEADER_PREFIX, SECTION_COLOURS, SECTION_DIFFICULTY, SECTION_EDITOR, SECTION_EVENTS, SECTION_GENERAL,
	SECTION_HIT_OBJECTS, SECTION_METADATA, SECTION_TIMING_POINTS,
};
use super::utils::SliderPointsView;
use super::{
	BeatmapFile, ColorsSection, DifficultySection, EditorSection, Event, GeneralSection, HitObject, HitObjectParams,
	HitSampleSet, HitSound, HoldParams, MetadataSection, OverlayPosition, SliderParams, SpinnerParams, TimingPoint,
};

fn serialize_general_section<W: Write>(section: &GeneralSection, writer: &mut W) -> io::Result<()> {
	writeln!(writer, "{SECTION_GENERAL}\r")?;
	writeln!(writer, "AudioFilename: {}\r", section.audio_filename)?;
	writeln!(writer, "AudioLeadIn: {}\r", section.audio_lead_in)?;
	// do not write AudioHash (deprecated)
	writeln!(writer, "PreviewTime: {}\r", section.preview_time)?;
	writeln!(writer, "Countdown: {}\r", section.countdown)?;
	writeln!(writer, "SampleSet: {}\r", section.sample_set)?;
	writeln!(writer, "StackLeniency: {}\r", section.stack_leniency)?;
	writeln!(writer, "Mode: {}\r", section.mode)?;
	writeln!(writer, "LetterboxInBreaks: {}\r", u8::from(section.letterbox_in_breaks))?;
	// do not write StoryFireInFront (deprecated)
	if section.use_skin_sprites {
		writeln!(writer, "UseSkinSprites: {}\r", u8::from(section.use_skin_sprites))?;
	}
	// do not write AlwaysShowPlayfield (deprecated)
	if section.overlay_position != OverlayPosition::NoChange {
		writeln!(writer, "OverlayPosition: {}\r", section.overlay_position)?;
	}
	if let Some(skin_preference) = &section.skin_preference {
		writeln!(writer, "SkinPreference: {skin_preference}\r")?;
	}
	if section.epilepsy_warning {
		writeln!(writer, "EpilepsyWarning: {}\r", u8::from(section.epilepsy_warning))?;
	}
	if section.countdown_offset != 0 {
		writeln!(writer, "CountdownOffset: {}\r", section.countdown_offset)?;
	}
	if section.special_style {
		writeln!(writer, "SpecialStyle: {}\r", u8::from(section.special_style))?;
	}
	writeln!(writer, "WidescreenStoryboard: {}\r", u8::from(section.widescreen_storyboard))?;
	writeln!(
		writer,
		"SamplesMatchPlaybackRate: {}\r",
		u8::from(section.samples_match_playback_rate)
	)?;
	writeln!(writer, "\r")
}

fn serialize_editor_section<W: Write>(section: &EditorSection, writer: &mut W) -> io::Result<()> {
	writeln!(writer, "{SECTION_EDITOR}\r")?;
	if !section.bookmarks.is_empty() {
		let bookmarks: Vec<_> = section.bookmarks.iter().map(i32::to_string).collect();
		writeln!(writer, "Bookmarks: {}\r", &bookmarks.join(","))?;
	}
	writeln!(writer, "DistanceSpacing: {}\r", section.distance_spacing)?;
	writeln!(writer, "BeatDivisor: {}\r", section.beat_divisor)?;
	writeln!(writer, "GridSize: {}\r", section.grid_size)?;
	if let Some(timeline_zoom) = section.timeline_zoom {
		writeln!(writer, "TimelineZoom: {timeline_zoom}\r")?;
	}
	writeln!(writer, "\r")
}

fn serialize_metadata_section<W: Write>(section: &MetadataSection, writer: &mut W) -> io::Result<()> {
	writeln!(writer, "{SECTION_METADATA}\r")?;
	writeln!(writer, "Title:{}\r", section.title)?;
	writeln!(writer, "TitleUnicode:{}\r", section.title_unicode)?;
	writeln!(writer, "Artist:{}\r", section.artist)?;
	writeln!(writer, "ArtistUnicode:{}\r", section.artist_unicode)?;
	writeln!(writer, "Creator:{}\r", section.creator)?;
	writeln!(writer, "Version:{}\r", section.version)?;
	writeln!(writer, "Source:{}\r", section.source)?;
	if !section.tags.is_empty() {
		writeln!(writer, "Tags:{}\r", section.tags.join(" "))?;
	}
	if let Some(beatmap_id) = section.beatmap_id {
		writeln!(writer, "BeatmapID:{beatmap_id}\r")?;
	}
	if let Some(beatmap_set_id) = section.beatmap_set_id {
		writeln!(writer, "BeatmapSetID:{beatmap_set_id}\r")?;
	}
	writeln!(writer, "\r")
}

fn serialize_difficulty_section<W: Write>(section: &DifficultySection, writer: &mut W) -> io::Result<()> {
	writeln!(writer, "{SECTION_DIFFICULTY}\r")?;
	writeln!(writer, "HPDrainRate:{}\r", section.hp_drain_rate)?;
	writeln!(writer, "CircleSize:{}\r", section.circle_size)?;
	writeln!(writer, "OverallDifficulty:{}\r", section.overall_difficulty)?;
	writeln!(writer, "ApproachRate:{}\r", section.approach_rate)?;
	writeln!(writer, "SliderMultiplier:{}\r", section.slider_multiplier)?;
	writeln!(writer, "SliderTickRate:{}\r", section.slider_tick_rate)?;
	writeln!(writer, "\r")
}

fn serialize_event<W: Write>(event: &Event, writer: &mut W) -> io::Result<()> {
	match event {
		Event::Background {
			filename,
			x_offset,
			y_offset,
		} => writeln!(writer, "0,0,\"{filename}\",{x_offset},{y_offset}\r"),
		Event::Video {
			start_time,
			filename,
			x_offset,
			y_offset,
		} => writeln!(writer, "Video,{start_time},\"{filename}\",{x_offset},{y_offset}\r"),
		Event::Break { start_time, end_time } => writeln!(writer, "2,{start_time},{end_time}\r"),
	}
}

fn serialize_timing_point<W: Write>(timing_point: &TimingPoint, writer: &mut W) -> io::Result<()> {
	let TimingPoint {
		time,
		beat_length,
		meter,
		sample_set,
		sample_index,
		volume,
		uninherited,
		effects,
	} = timing_point;

	writeln!(
		writer,
		"{time},{beat_length},{meter},{},{sample_index},{volume},{},{effects}\r",
		*sample_set as u8,
		u8::from(*uninherited),
	)
}

fn serialize_color_section<W: Write>(section: &ColorsSection, writer: &mut W) -> io::Result<()> {
	writeln!(writer, "{SECTION_COLOURS}\r")?;
	for (i, combo_color) in section.combo_colors.iter().enumerate() {
		writeln!(writer, "Combo{} : {}\r", i + 1, combo_color.to_osu_string())?;
	}
	if let Some(slider_track_override) = section.slider_track_override {
		writeln!(
			writer,
			"SliderTrackOverride : {}\r",
			slider_track_override.to_osu_string()
		)?;
	}
	if let Some(slider_border) = section.slider_border {
		writeln!(writer, "SliderBorder : {}\r", slider_border.to_osu_string())?;
	}
	writeln!(writer, "\r")
}

fn serialize_hit_object<W: Write>(hit_object: &HitObject, writer: &mut W) -> io::Result<()> {
	let HitObject {
		x,
		y,
		time,
		hit_sound,
		params,
		hit_sample,
		..
	} = hit_object;

	let raw_object_type = hit_object.raw_object_type();
	write!(writer, "{x},{y},{time},{raw_object_type},{hit_sound}")?;
	match params {
		HitObjectParams::Circle => {}
		HitObjectParams::Slider(SliderParams {
			first_curve_type,
			curve_points,
			slides,
			length,
			edge_hitsounds,
			edge_samplesets,
		}) => {
			let curve = SliderPointsView {
				first_curve_type: *first_curve_type,
				points: curve_points,
			};
			write!(writer, ",{curve},{slides},{length}")?;

			if !edge_hitsounds.is_empty() && !edge_samplesets.is_empty() {
				let edge_hitsounds: Vec<_> = edge_hitsounds.iter().map(HitSound::to_string).collect();
				let edge_samplesets: Vec<_> = edge_samplesets.iter().map(HitSampleSet::to_osu_string).collect();
				write!(writer, ",{},{}", edge_hitsounds.join("|"), edge_samplesets.join("|"))?;
			}
		}
		HitObjectParams::Spinner(SpinnerParams { end_time }) => write!(writer, ",{end_time}")?,
		HitObjectParams::Hold(HoldParams { end_time }) => {
			// the hit sample of a hold is glued to its end time
			write!(writer, ",{end_time}")?;
			if let Some(hit_sample) = hit_sample {
				write!(writer, ":{}", hit_sample.to_osu_string())?;
			}
			return writeln!(writer, "\r");
		}
	}

	if let Some(hit_sample) = hit_sample {
		write!(writer, ",{}", hit_sample.to_osu_string())?;
	}
	writeln!(writer, "\r")
}

/// Write a beatmap file as a `.osu` file, with CRLF line endings.
///
/// # Errors
///
/// This function will return an error if an IO issue occured.
pub fn serialize_beatmap_file<W: Write>(bm_file: &BeatmapFile, writer: &mut W) -> io::Result<()> {
	write!(writer, "{FORMAT_HEADER_PREFIX}{}\r\n\r\n", bm_file.osu_file_format)?;

	serialize_general_section(&bm_file.general, writer)?;
	serialize_editor_section(&bm_file.editor, writer)?;
	serialize_metadata_section(&bm_file.metadata, writer)?;
	serialize_difficulty_section(&bm_file.difficulty, writer)?;

	writeln!(writer, "{SECTION_EVENTS}\r")?;
	for event in &bm_file.events {
		serialize_event(event, writer)?;
	}
	writeln!(writer, "\r")?;

	writeln!(writer, "{SECTION_TIMING_POINTS}\r")?;
	for timing_point in &bm_file.timing_points {
		serialize_timing_point(timing_point, writer)?;
	}
	writeln!(writer, "\r")?;

	if let Some(colors) = &bm_file.colors {
		serialize_color_section(colors, writer)?;
	}

	writeln!(writer, "{SECTION_HIT_OBJECTS}\r")?;
	for hit_object in &bm_file.hit_objects {
		serialize_hit_object(hit_object, writer)?;
	}

	Ok(())
}
