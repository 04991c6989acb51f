use std::path::{Path, PathBuf};

use super::HitObjectType;

#[derive(Debug, thiserror::Error)]
#[error("Invalid overlay position: {op_string:?}")]
pub struct InvalidOverlayPositionError {
	pub op_string: String,
}

impl From<&str> for InvalidOverlayPositionError {
	fn from(op_string: &str) -> Self {
		Self {
			op_string: op_string.to_owned(),
		}
	}
}

#[derive(Debug, thiserror::Error)]
#[error("Invalid sample bank: {sb_string:?}")]
pub struct InvalidSampleBankError {
	pub sb_string: String,
}

impl From<&str> for InvalidSampleBankError {
	fn from(sb_string: &str) -> Self {
		Self {
			sb_string: sb_string.to_owned(),
		}
	}
}

#[derive(Debug, thiserror::Error)]
#[error("Invalid hit sample set {hss_string:?}: {context}")]
pub struct InvalidHitSampleSetError {
	pub hss_string: String,
	pub context: String,
}

impl From<&str> for InvalidHitSampleSetError {
	fn from(hss_string: &str) -> Self {
		Self {
			hss_string: hss_string.to_owned(),
			context: "expected `normal_set:addition_set`".to_owned(),
		}
	}
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("Hit object type {0:#010b} must set exactly one of the circle, slider, spinner and hold bits")]
pub struct InvalidHitObjectTypeError(pub u8);

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("Expected a {expected} hit object, found a {found}")]
pub struct TypeMismatchError {
	pub expected: &'static str,
	pub found: HitObjectType,
}

/// Context of every error report produced while reading a `.osu` file from disk.
#[derive(Debug, thiserror::Error)]
#[error("Could not parse osu! beatmap file {path:?}")]
pub struct BeatmapFileParseError {
	pub path: PathBuf,
}

impl BeatmapFileParseError {
	#[must_use]
	pub fn new(path: &Path) -> Self {
		Self {
			path: path.to_path_buf(),
		}
	}
}
