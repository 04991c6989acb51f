//! Parsing every beatmap of a directory at once.

use std::path::{Path, PathBuf};

use error_stack::{Report, Result};
use rayon::prelude::*;
use walkdir::WalkDir;

use super::beatmap::{BeatmapFile, BeatmapFileParseError};

#[derive(Debug, thiserror::Error)]
#[error("Could not list beatmap files in {path:?}")]
pub struct BatchError {
	pub path: PathBuf,
}

/// Outcome of parsing one file of a batch.
pub type BatchEntry = (PathBuf, Result<BeatmapFile, BeatmapFileParseError>);

/// Lists the `.osu` files directly inside `dir`, sorted by file name.
///
/// # Errors
///
/// Fails if the directory itself can't be read.
pub fn list_beatmap_files(dir: &Path) -> Result<Vec<PathBuf>, BatchError> {
	let mut paths = Vec::new();

	for entry in WalkDir::new(dir).min_depth(1).max_depth(1).sort_by_file_name() {
		let entry = entry.map_err(|e| Report::new(e).change_context(BatchError { path: dir.to_path_buf() }))?;

		let path = entry.path();
		if entry.file_type().is_file() && path.extension().is_some_and(|ext| ext == "osu") {
			paths.push(path.to_path_buf());
		}
	}

	Ok(paths)
}

/// Parses every `.osu` file directly inside `dir` on the rayon thread pool.
///
/// Results come back in file name order. A file that fails to parse doesn't stop the others.
///
/// # Errors
///
/// Fails only if the directory itself can't be read.
pub fn parse_directory<P: AsRef<Path>>(dir: P) -> Result<Vec<BatchEntry>, BatchError> {
	let paths = list_beatmap_files(dir.as_ref())?;
	tracing::debug!("Parsing {} beatmap files in {:?}", paths.len(), dir.as_ref());

	Ok(paths
		.into_par_iter()
		.map(|path| {
			let beatmap = BeatmapFile::parse(&path);
			if let Err(e) = &beatmap {
				tracing::warn!("{e:?}");
			}
			(path, beatmap)
		})
		.collect())
}

#[cfg(test)]
mod tests {
	use std::fs;

	use tempfile::tempdir;

	use super::parse_directory;
	use crate::file::beatmap::parsing::BeatmapParseError;

	const VALID: &str = "osu file format v14\r\n[HitObjects]\r\n256,192,1000,1,0,0:0:0:0:\r\n";
	const BROKEN: &str = "osu file format v14\r\n[HitObjects]\r\n256,192,1000,0,0,0:0:0:0:\r\n";

	#[test]
	fn isolates_failures_and_keeps_order() {
		let dir = tempdir().unwrap();
		fs::write(dir.path().join("c.osu"), VALID).unwrap();
		fs::write(dir.path().join("a.osu"), VALID).unwrap();
		fs::write(dir.path().join("b.osu"), BROKEN).unwrap();
		fs::write(dir.path().join("notes.txt"), "not a beatmap").unwrap();
		fs::create_dir(dir.path().join("nested")).unwrap();
		fs::write(dir.path().join("nested").join("d.osu"), VALID).unwrap();

		let results = parse_directory(dir.path()).unwrap();

		let names: Vec<_> = (results.iter())
			.map(|(path, _)| path.file_name().unwrap().to_string_lossy().into_owned())
			.collect();
		assert_eq!(names, vec!["a.osu", "b.osu", "c.osu"]);

		assert!(results[0].1.is_ok());
		assert!(results[2].1.is_ok());

		let report = results[1].1.as_ref().unwrap_err();
		assert!(report.contains::<BeatmapParseError>());
		assert!(report.current_context().path.ends_with("b.osu"));
	}

	#[test]
	fn missing_directory_is_an_error() {
		let dir = tempdir().unwrap();
		assert!(parse_directory(dir.path().join("nope")).is_err());
	}
}
