use std::fmt;

use crate::file::beatmap::{SliderCurveType, SliderPoint};

/// Displays slider curve points the way they are written in `.osu` files.
pub struct SliderPointsView<'a> {
	pub first_curve_type: SliderCurveType,
	pub points: &'a [SliderPoint],
}

impl fmt::Display for SliderPointsView<'_> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		if let Some(letter) = self.first_curve_type.letter() {
			write!(f, "{letter}")?;
		}

		for &SliderPoint { curve_type, x, y } in self.points {
			write!(f, "|")?;
			if let Some(letter) = curve_type.letter() {
				write!(f, "{letter}|")?;
			}
			write!(f, "{x}:{y}")?;
		}

		Ok(())
	}
}

/// Difficulty name of a converted chart.
#[must_use]
pub fn converted_version_name(version: &str) -> String {
	format!("{version} Converted")
}

/// Removes characters that can't appear in a file name on common file systems.
#[must_use]
pub fn sanitize_file_name(name: &str) -> String {
	name.chars()
		.filter(|c| !matches!(c, '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*') && !c.is_control())
		.collect::<String>()
		.trim_end_matches(['.', ' '])
		.to_owned()
}

#[cfg(test)]
mod tests {
	use super::{converted_version_name, sanitize_file_name, SliderPointsView};
	use crate::file::beatmap::{SliderCurveType, SliderPoint};

	#[test]
	fn curve_points() {
		let points = &[
			SliderPoint::new(SliderCurveType::Bezier, 465, 225),
			SliderPoint::new(SliderCurveType::Bezier, 473, 217),
			SliderPoint::new(SliderCurveType::Inherit, 457, 121),
		];

		let view = SliderPointsView {
			first_curve_type: SliderCurveType::Bezier,
			points,
		};
		assert_eq!(view.to_string(), "B|B|465:225|B|473:217|457:121");
	}

	#[test]
	fn curve_points_stable() {
		let points = &[
			SliderPoint::new(SliderCurveType::Inherit, 465, 225),
			SliderPoint::new(SliderCurveType::Inherit, 465, 225),
			SliderPoint::new(SliderCurveType::Inherit, 457, 121),
		];

		let view = SliderPointsView {
			first_curve_type: SliderCurveType::Linear,
			points,
		};
		assert_eq!(view.to_string(), "L|465:225|465:225|457:121");
	}

	#[test]
	fn file_names() {
		assert_eq!(converted_version_name("Insane"), "Insane Converted");
		assert_eq!(sanitize_file_name("what?: a/b*c. "), "what abc");
		assert_eq!(sanitize_file_name("Artist - Title [Hard]"), "Artist - Title [Hard]");
	}
}
