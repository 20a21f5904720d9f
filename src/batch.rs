use crate::config::AppConfig;
use crate::session::{Session, Step};
use crate::sink::WavSink;
use crate::source::WavFileSource;
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub struct SplitArgs {
    pub input_pattern: String,
    pub output_dir: PathBuf,
}

/// Export every window of every file matching the pattern as its own WAV file.
///
/// Returns the number of files written. A file that fails is logged and skipped.
pub fn run_split(args: &SplitArgs, config: &AppConfig) -> Result<usize> {
    tracing::info!("Starting split");
    tracing::info!("Input pattern: {}", args.input_pattern);
    tracing::info!("Output directory: {:?}", args.output_dir);

    fs::create_dir_all(&args.output_dir).context("Failed to create output directory")?;

    let paths: Vec<PathBuf> = glob::glob(&args.input_pattern)
        .context("Failed to read glob pattern")?
        .filter_map(|entry| entry.ok())
        .collect();

    if paths.is_empty() {
        tracing::warn!("No files found matching pattern: {}", args.input_pattern);
        return Ok(0);
    }

    tracing::info!("Found {} files to split", paths.len());

    let mut written = 0;
    for path in paths {
        match split_file(&path, &args.output_dir, config) {
            Ok(count) => {
                tracing::info!("Split {:?} into {} windows", path, count);
                written += count;
            }
            Err(e) => tracing::error!("Failed to split {:?}: {:#}", path, e),
        }
    }

    tracing::info!("Split complete, {} files written", written);
    Ok(written)
}

fn split_file(input_path: &Path, output_dir: &Path, config: &AppConfig) -> Result<usize> {
    let file_stem = input_path
        .file_stem()
        .ok_or_else(|| anyhow::anyhow!("Invalid filename: {:?} has no stem", input_path))?;

    // Ensure stem is not empty to prevent "_w000.wav" collisions
    if file_stem.is_empty() {
        anyhow::bail!("Invalid filename: {:?} has empty stem", input_path);
    }

    let source = WavFileSource::open(input_path, config.navigation.channel)
        .context("Failed to open WAV file")?;
    let mut session = Session::without_analyzer();
    session
        .open(Box::new(source), config.navigation.window_secs)
        .context("Failed to load first window")?;

    let mut sink = WavSink::new(config.export.sample_format);
    let mut count = 0;
    if session.is_empty() {
        return Ok(count);
    }

    loop {
        let index = session.window_index().unwrap_or_default();
        let output_path =
            output_dir.join(format!("{}_w{:03}.wav", file_stem.to_string_lossy(), index));
        session
            .export_crop(&mut sink, &output_path)
            .with_context(|| format!("Failed to write {:?}", output_path))?;
        count += 1;

        if session.advance().context("Failed to load next window")? == Step::BoundaryReached {
            break;
        }
    }

    Ok(count)
}
