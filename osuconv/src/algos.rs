//! Post-processing of converted charts.

use crate::file::beatmap::{kind, BeatmapFile, Event, HitObjectParams, Timestamp};

/// Shortest break osu! accepts, in milliseconds.
pub const MIN_BREAK_LENGTH: Timestamp = 650;

/// Turns long stretches with almost no objects into breaks.
///
/// A window of `window_beats` beats slides over the end of every object. When fewer than
/// `threshold` objects start inside it, the gap up to the next object becomes a break,
/// provided it is long enough and not covered by an existing break.
/// New breaks are appended after the existing events.
///
/// Returns how many breaks were added.
#[allow(clippy::cast_possible_truncation)]
pub fn add_breaks(beatmap: &mut BeatmapFile, window_beats: u32, threshold: usize) -> usize {
	let mut spans: Vec<(Timestamp, Timestamp)> = (beatmap.hit_objects.iter())
		.map(|object| (object.time, beatmap.end_time(object).unwrap_or(object.time)))
		.collect();
	spans.sort_by_key(|&(start, _)| start);

	let mut breaks = Vec::new();
	let mut latest_end = Timestamp::MIN;

	for (i, &(_, end)) in spans.iter().enumerate() {
		latest_end = latest_end.max(end);

		let Some(&(next_start, _)) = spans.get(i + 1) else {
			break;
		};

		if next_start.saturating_sub(latest_end) < MIN_BREAK_LENGTH {
			continue;
		}

		let Some(timing_point) = beatmap.nearest_timing_point_at(latest_end) else {
			continue;
		};

		let window = (timing_point.beat_length * f64::from(window_beats)) as Timestamp;
		let window_end = latest_end.saturating_add(window);
		let in_window = (spans[i + 1..].iter())
			.take_while(|&&(start, _)| start < window_end)
			.count();

		if in_window >= threshold {
			continue;
		}

		let covered = (beatmap.events.iter()).any(|event| match *event {
			Event::Break { start_time, end_time } => start_time < next_start && latest_end < end_time,
			_ => false,
		});

		if !covered {
			breaks.push(Event::Break {
				start_time: latest_end,
				end_time: next_start,
			});
		}
	}

	tracing::debug!("Added {} break(s)", breaks.len());

	let added = breaks.len();
	beatmap.events.extend(breaks);
	added
}

/// Turns holds lasting a quarter beat or less into circles.
///
/// Returns how many holds were shortened.
pub fn remove_short_holds(beatmap: &mut BeatmapFile) -> usize {
	let mut removed = 0;

	for index in 0..beatmap.hit_objects.len() {
		let object = &beatmap.hit_objects[index];
		let Ok(hold) = object.get::<kind::Hold>() else {
			continue;
		};

		let Some(timing_point) = beatmap.nearest_timing_point_at(object.time) else {
			continue;
		};

		if f64::from(hold.end_time) - f64::from(object.time) <= timing_point.beat_length / 4. {
			beatmap.hit_objects[index].params = HitObjectParams::Circle;
			removed += 1;
		}
	}

	tracing::debug!("Removed {removed} short hold(s)");
	removed
}
