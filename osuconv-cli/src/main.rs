use std::error::Error;
use std::fs::File;
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use error_stack::Report;
use osuconv::algos::{add_breaks, remove_short_holds};
use osuconv::convert::{convert_to_mania, default_seed, ConvertError, MAX_COLUMNS};
use osuconv::file::batch::parse_directory;
use osuconv::file::beatmap::utils::{converted_version_name, sanitize_file_name};
use osuconv::file::beatmap::{kind, BeatmapFile, BeatmapFileParseError, GeneralSection};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

const PATH_HELP: &str = "Path to beatmap file or folder containing beatmap files.";

#[derive(Subcommand)]
enum Commands {
    /// Parse beatmaps and print a summary of each one.
    Parse {
        #[arg(help = PATH_HELP)]
        path: PathBuf,
    },

    /// Convert beatmaps to osu!mania.
    Convert {
        #[arg(
            short,
            long,
            value_parser = clap::value_parser!(u32).range(1..=i64::from(MAX_COLUMNS)),
            help = "Column count of the converted beatmap (derived from each beatmap by default)."
        )]
        columns: Option<u32>,

        #[arg(
            short,
            long,
            help = "Seed of the conversion (derived from the difficulty settings by default)."
        )]
        seed: Option<u64>,

        #[arg(
            short,
            long,
            help = "Output path where to write the converted beatmap (defaults to stdout). Ignored for folders."
        )]
        out_path: Option<PathBuf>,

        #[arg(long, help = "Turn long stretches without objects into breaks.")]
        breaks: bool,

        #[arg(long, help = "Turn holds lasting a quarter beat or less into circles.")]
        remove_short_holds: bool,

        #[arg(help = PATH_HELP)]
        path: PathBuf,
    },
}

#[derive(Clone, Copy)]
struct ConvertOptions {
    columns: Option<u32>,
    seed: Option<u64>,
    breaks: bool,
    remove_short_holds: bool,
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt::init();
    let Cli { command } = Cli::parse();

    match command {
        Commands::Parse { path } => cli_parse(&path),

        Commands::Convert {
            columns,
            seed,
            out_path,
            breaks,
            remove_short_holds,
            path,
        } => {
            let options = ConvertOptions {
                columns,
                seed,
                breaks,
                remove_short_holds,
            };

            if path.is_dir() {
                cli_convert_directory(&path, options)?;
            } else {
                cli_convert_file(&path, out_path.as_deref(), options)?;
            }
        }
    }

    Ok(())
}

fn report_parse_failure(report: &Report<BeatmapFileParseError>) {
    tracing::error!("\n{report:?}");
}

fn summary(beatmap: &BeatmapFile) -> String {
    let metadata = &beatmap.metadata;
    format!(
        "v{} {} - {} [{}]: {} circles, {} sliders, {} spinners, {} holds, {} timing points",
        beatmap.osu_file_format,
        metadata.artist,
        metadata.title,
        metadata.version,
        beatmap.count::<kind::Circle>(),
        beatmap.count::<kind::Slider>(),
        beatmap.count::<kind::Spinner>(),
        beatmap.count::<kind::Hold>(),
        beatmap.timing_points.len(),
    )
}

fn cli_parse(path: &Path) {
    if path.is_dir() {
        let Ok(entries) = parse_directory(path) else {
            tracing::error!("Could not list beatmaps in {}", path.display());
            return;
        };

        for (path, result) in entries {
            match result {
                Ok(beatmap) => println!("{}: {}", path.display(), summary(&beatmap)),
                Err(report) => report_parse_failure(&report),
            }
        }
    } else {
        match BeatmapFile::parse(path) {
            Ok(beatmap) => println!("{}: {}", path.display(), summary(&beatmap)),
            Err(report) => report_parse_failure(&report),
        }
    }
}

fn convert_beatmap(source: &BeatmapFile, options: ConvertOptions) -> Result<BeatmapFile, ConvertError> {
    let seed = options.seed.unwrap_or_else(|| default_seed(source));
    tracing::info!("Converting [{}] with seed {seed}...", source.metadata.version);

    let mut beatmap = convert_to_mania(source, options.columns, seed)?;
    beatmap.metadata.version = converted_version_name(&source.metadata.version);

    if options.remove_short_holds {
        remove_short_holds(&mut beatmap);
    }

    if options.breaks {
        add_breaks(&mut beatmap, 6, 2);
    }

    Ok(beatmap)
}

fn write_beatmap_out(beatmap: &BeatmapFile, path: Option<&Path>) -> io::Result<()> {
    if let Some(path) = path {
        tracing::info!("Write beatmap to {}...", path.display());
        let mut out_file = BufWriter::new(File::create(path)?);
        beatmap.write(&mut out_file)?;
    } else {
        beatmap.write(&mut io::stdout().lock())?;
    }

    Ok(())
}

fn cli_convert_file(path: &Path, out_path: Option<&Path>, options: ConvertOptions) -> Result<(), Box<dyn Error>> {
    tracing::info!("Parsing {}...", path.display());
    let source = match BeatmapFile::parse(path) {
        Ok(beatmap) => beatmap,
        Err(report) => {
            report_parse_failure(&report);
            return Ok(());
        }
    };

    let beatmap = convert_beatmap(&source, options)?;
    write_beatmap_out(&beatmap, out_path)?;

    Ok(())
}

/// osu!mania beatmaps, including earlier conversions, are left alone in folders.
fn is_conversion_source(beatmap: &BeatmapFile) -> bool {
    beatmap.general.mode != GeneralSection::MODE_MANIA
}

/// Converts every beatmap of `dir`, writing `<name> Converted.osu` next to each source.
fn cli_convert_directory(dir: &Path, options: ConvertOptions) -> Result<(), Box<dyn Error>> {
    let entries = parse_directory(dir).map_err(|report| format!("{report:?}"))?;

    let mut converted = 0;
    for (path, result) in &entries {
        let source = match result {
            Ok(source) => source,
            Err(report) => {
                report_parse_failure(report);
                continue;
            }
        };

        if !is_conversion_source(source) {
            tracing::info!("Skipping {}: already an osu!mania beatmap", path.display());
            continue;
        }

        let beatmap = match convert_beatmap(source, options) {
            Ok(beatmap) => beatmap,
            Err(err) => {
                tracing::error!("Could not convert {}: {err}", path.display());
                continue;
            }
        };

        let stem = path.file_stem().map(|s| s.to_string_lossy()).unwrap_or_default();
        let out_path = path.with_file_name(format!("{} Converted.osu", sanitize_file_name(&stem)));
        write_beatmap_out(&beatmap, Some(&out_path))?;
        converted += 1;
    }

    tracing::info!("Converted {converted} of {} beatmaps", entries.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use osuconv::convert::convert_to_mania;
    use osuconv::file::beatmap::{BeatmapFile, HitObject, HitObjectParams, TimingPoint};

    use super::is_conversion_source;

    #[test]
    fn converted_beatmaps_are_not_converted_again() {
        let source = BeatmapFile {
            timing_points: vec![TimingPoint::default()],
            hit_objects: vec![HitObject::new(256, 192, 0, HitObjectParams::Circle)],
            ..BeatmapFile::default()
        };
        assert!(is_conversion_source(&source));

        let converted = convert_to_mania(&source, Some(4), 0).unwrap();
        assert!(!is_conversion_source(&converted));
    }
}
