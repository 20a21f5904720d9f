use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use frame_explorer::batch::{run_split, SplitArgs};
use frame_explorer::error::{CropError, ExplorerError};
use frame_explorer::metrics::SessionMetrics;
use frame_explorer::sink::{AudioSink, WavSink};
use frame_explorer::timebase::to_sample;
use frame_explorer::utils::{format_duration, format_range};
use frame_explorer::{AppConfig, Session, SpectrogramAnalyzer, Step, WavFileSource, WaveformChannel};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "frame_explorer",
    version,
    about = "Step through long recordings window by window, crop and export"
)]
struct Cli {
    /// Config file (default: per-user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Window duration in seconds (overrides the config file)
    #[arg(short, long, global = true)]
    window_secs: Option<f64>,

    /// Channel to use for stereo files
    #[arg(long, global = true, value_parser = ["left", "right"])]
    channel: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show the file's window layout
    Info { input: PathBuf },

    /// Analyze every window and list its top classes
    Windows {
        input: PathBuf,

        /// Number of classes to show per window
        #[arg(long)]
        top: Option<usize>,
    },

    /// Export a time range (absolute seconds) to a WAV file
    Crop {
        input: PathBuf,

        /// Window to crop from (default: the window containing the start time)
        #[arg(long)]
        window: Option<usize>,

        #[arg(long)]
        from: f64,

        #[arg(long)]
        to: f64,

        #[arg(short, long)]
        output: PathBuf,
    },

    /// Play a window, or a time range of it, normalized to full scale
    Play {
        input: PathBuf,

        #[arg(long, default_value_t = 0)]
        window: usize,

        #[arg(long, requires = "to")]
        from: Option<f64>,

        #[arg(long, requires = "from")]
        to: Option<f64>,
    },

    /// Step through a file interactively
    Browse { input: PathBuf },

    /// Export every window of all files matching a glob pattern
    Split {
        pattern: String,

        #[arg(short, long, default_value = "./windows/")]
        output: PathBuf,
    },

    /// Print the effective configuration
    Config {
        /// Also write it to the config path
        #[arg(long)]
        save: bool,
    },
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .try_init();
}

fn load_config(cli: &Cli) -> Result<AppConfig> {
    let mut config = match &cli.config {
        Some(path) => AppConfig::load_from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => {
            let path = AppConfig::default_path();
            if path.exists() {
                AppConfig::load_or_default(path)
            } else {
                AppConfig::default()
            }
        }
    };

    if let Some(secs) = cli.window_secs {
        config.navigation.window_secs = secs;
    }
    match cli.channel.as_deref() {
        Some("right") => config.navigation.channel = WaveformChannel::Right,
        Some(_) => config.navigation.channel = WaveformChannel::Left,
        None => {}
    }

    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn open_session(input: &Path, config: &AppConfig, analyze: bool) -> Result<Session> {
    let source = WavFileSource::open(input, config.navigation.channel)
        .with_context(|| format!("Failed to open {}", input.display()))?;

    let mut session = if analyze && config.analysis.enabled {
        Session::new(Box::new(SpectrogramAnalyzer::from_config(&config.analysis)))
    } else {
        Session::without_analyzer()
    }
    .with_metrics(SessionMetrics::new(&config.metrics)?);
    session
        .open(Box::new(source), config.navigation.window_secs)
        .context("Failed to load first window")?;

    if session.is_empty() {
        bail!("{} contains no samples", input.display());
    }
    Ok(session)
}

fn print_window(session: &Session, top_n: usize) {
    let (Some(index), Some(bounds)) = (session.window_index(), session.current_window_bounds())
    else {
        println!("(no window loaded)");
        return;
    };
    println!(
        "window {}/{}  {}",
        index + 1,
        session.window_count(),
        format_range(bounds)
    );
    if let Some(crop) = session.current_crop_bounds() {
        println!("  crop {}", format_range(crop));
    }
    if let Some(analysis) = session.analysis() {
        for (class, score) in analysis.top_classes(top_n) {
            println!("  {:>6.3}  {}", score, analysis.class_name(class));
        }
    } else if let Some(err) = session.analysis_error() {
        println!("  analysis unavailable: {}", err);
    }
}

fn print_step(session: &Session, step: Step, top_n: usize) {
    if step.boundary_reached() {
        println!("(boundary reached)");
    } else {
        print_window(session, top_n);
    }
}

/// Play the current crop, falling back to the raw samples when it is silent.
fn play_with_fallback(session: &Session, sink: &mut dyn AudioSink) -> Result<()> {
    match session.play_crop(sink) {
        Err(ExplorerError::Crop(CropError::SilentSelection { .. })) => {
            tracing::warn!("Selection is silent, playing it unmodified");
            let samples = session.extract_crop()?;
            sink.play(&samples, session.sample_rate().unwrap_or_default())?;
            Ok(())
        }
        other => other.map_err(Into::into),
    }
}

fn report(err: &ExplorerError) {
    match err {
        ExplorerError::Audio(e) => println!("{}", e.user_message()),
        ExplorerError::Crop(e) => {
            println!("{}", e);
            if let Some(hint) = e.recovery_hint() {
                println!("  hint: {}", hint);
            }
        }
        other => println!("{}", other),
    }
}

#[cfg(feature = "audio_playback")]
fn open_player(config: &AppConfig) -> Result<frame_explorer::sink::RodioSink> {
    Ok(frame_explorer::sink::RodioSink::open_default(
        config.export.sample_format,
    )?)
}

#[cfg(not(feature = "audio_playback"))]
fn open_player(_config: &AppConfig) -> Result<WavSink> {
    bail!("this build has no audio output; rebuild with --features audio_playback")
}

fn cmd_info(input: &Path, config: &AppConfig) -> Result<()> {
    let session = open_session(input, config, false)?;
    let window_samples = session.window_samples().unwrap_or_default();
    let count = session.window_count();
    let last_len = session.total_samples() - (count as u64 - 1) * window_samples;

    println!("file:          {}", input.display());
    println!("sample rate:   {} Hz", session.sample_rate().unwrap_or_default());
    println!(
        "duration:      {} ({} samples)",
        format_duration(session.total_duration()),
        session.total_samples()
    );
    println!(
        "window:        {:.3}s ({} samples)",
        session.window_duration().unwrap_or_default(),
        window_samples
    );
    println!("windows:       {} (last has {} samples)", count, last_len);
    Ok(())
}

fn cmd_windows(input: &Path, top: Option<usize>, config: &AppConfig) -> Result<()> {
    let mut session = open_session(input, config, true)?;
    let top_n = top.unwrap_or(config.analysis.top_n);
    loop {
        print_window(&session, top_n);
        if session.advance()? == Step::BoundaryReached {
            break;
        }
    }
    eprintln!("{}", session.metrics().summary());
    Ok(())
}

/// Index of the window holding time `t`, found from the sample position.
fn window_containing(session: &Session, t: f64) -> Option<usize> {
    let sample_rate = session.sample_rate()?;
    let window_samples = session.window_samples()?;
    let sample = to_sample(t, sample_rate).max(0) as u64;
    Some((sample / window_samples) as usize)
}

fn select_crop(
    session: &mut Session,
    window: Option<usize>,
    from: f64,
    to: f64,
) -> Result<()> {
    let index = match window {
        Some(index) => index,
        None => window_containing(session, from.min(to))
            .context("No window loaded to crop from")?,
    };
    session.seek_window(index)?;
    session.propose_crop(from, to)?;
    Ok(())
}

fn cmd_crop(
    input: &Path,
    window: Option<usize>,
    (from, to): (f64, f64),
    output: &Path,
    config: &AppConfig,
) -> Result<()> {
    let mut session = open_session(input, config, false)?;
    select_crop(&mut session, window, from, to)?;
    let mut sink = WavSink::new(config.export.sample_format);
    session.export_crop(&mut sink, output)?;
    if let Some(bounds) = session.current_crop_bounds() {
        println!("Saved {} to {}", format_range(bounds), output.display());
    }
    Ok(())
}

fn cmd_play(input: &Path, window: usize, range: Option<(f64, f64)>, config: &AppConfig) -> Result<()> {
    let mut player = open_player(config)?;
    let mut session = open_session(input, config, false)?;
    match range {
        Some((from, to)) => select_crop(&mut session, Some(window), from, to)?,
        None => {
            session.seek_window(window)?;
        }
    }
    play_with_fallback(&session, &mut player)?;
    #[cfg(feature = "audio_playback")]
    player.wait_until_done();
    Ok(())
}

/// One line of input in the interactive browser.
#[derive(Debug, Clone, PartialEq)]
enum BrowseCommand {
    Next,
    Prev,
    Goto(usize),
    Crop(f64, f64),
    ResetCrop,
    Play,
    Save(PathBuf),
    Status,
    Help,
    Quit,
}

impl BrowseCommand {
    fn parse(line: &str) -> Result<Self, String> {
        let mut words = line.split_whitespace();
        let Some(verb) = words.next() else {
            return Ok(BrowseCommand::Status);
        };
        let mut number = |name: &str| -> Result<f64, String> {
            words
                .next()
                .ok_or_else(|| format!("missing {}", name))?
                .parse::<f64>()
                .map_err(|e| format!("bad {}: {}", name, e))
        };

        match verb {
            "n" | "next" => Ok(BrowseCommand::Next),
            "p" | "prev" => Ok(BrowseCommand::Prev),
            "g" | "goto" => {
                let index = number("window index")?;
                if index < 1.0 || index.fract() != 0.0 {
                    return Err("window index starts at 1".to_string());
                }
                Ok(BrowseCommand::Goto(index as usize - 1))
            }
            "c" | "crop" => {
                let t_min = number("start time")?;
                let t_max = number("end time")?;
                Ok(BrowseCommand::Crop(t_min, t_max))
            }
            "r" | "reset" => Ok(BrowseCommand::ResetCrop),
            "play" => Ok(BrowseCommand::Play),
            "s" | "save" => match words.next() {
                Some(path) => Ok(BrowseCommand::Save(PathBuf::from(path))),
                None => Err("missing output path".to_string()),
            },
            "i" | "info" => Ok(BrowseCommand::Status),
            "h" | "help" | "?" => Ok(BrowseCommand::Help),
            "q" | "quit" | "exit" => Ok(BrowseCommand::Quit),
            other => Err(format!("unknown command '{}'", other)),
        }
    }
}

const BROWSE_HELP: &str = "\
commands:
  n | next              next window
  p | prev              previous window
  g | goto <n>          jump to window n (1-based)
  c | crop <t0> <t1>    select a range in absolute seconds
  r | reset             select the whole window
  play                  play the selection
  s | save <path>       export the selection as WAV
  i | info              show the current window
  q | quit";

fn cmd_browse(input: &Path, config: &AppConfig) -> Result<()> {
    let mut session = open_session(input, config, true)?;
    let mut sink = WavSink::new(config.export.sample_format);
    let mut player: Option<Box<dyn AudioSink>> = None;
    let top_n = config.analysis.top_n;

    print_window(&session, top_n);
    let stdin = io::stdin();
    loop {
        print!("> ");
        io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }

        let command = match BrowseCommand::parse(&line) {
            Ok(command) => command,
            Err(e) => {
                println!("{} (h for help)", e);
                continue;
            }
        };

        let outcome: frame_explorer::Result<()> = match command {
            BrowseCommand::Quit => break,
            BrowseCommand::Help => {
                println!("{}", BROWSE_HELP);
                Ok(())
            }
            BrowseCommand::Status => {
                print_window(&session, top_n);
                Ok(())
            }
            BrowseCommand::Next => session
                .advance()
                .map(|step| print_step(&session, step, top_n)),
            BrowseCommand::Prev => session
                .retreat()
                .map(|step| print_step(&session, step, top_n)),
            BrowseCommand::Goto(index) => session
                .seek_window(index)
                .map(|step| print_step(&session, step, top_n)),
            BrowseCommand::Crop(t_min, t_max) => session.propose_crop(t_min, t_max).map(|_| {
                if let Some(bounds) = session.current_crop_bounds() {
                    println!("crop {}", format_range(bounds));
                }
            }),
            BrowseCommand::ResetCrop => session.full_window().map(|_| ()),
            BrowseCommand::Play => {
                if player.is_none() {
                    match open_player(config) {
                        Ok(p) => player = Some(Box::new(p)),
                        Err(e) => {
                            println!("{}", e);
                            continue;
                        }
                    }
                }
                if let Some(p) = player.as_deref_mut() {
                    if let Err(e) = play_with_fallback(&session, p) {
                        println!("{:#}", e);
                    }
                }
                Ok(())
            }
            BrowseCommand::Save(path) => session
                .export_crop(&mut sink, &path)
                .map(|_| println!("saved {}", path.display())),
        };

        if let Err(e) = outcome {
            report(&e);
            if e.is_fatal() {
                bail!("session closed: {}", e);
            }
        }
    }

    tracing::debug!("{}", session.metrics().summary());
    Ok(())
}

fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    let config = load_config(&cli)?;

    match &cli.command {
        Command::Info { input } => cmd_info(input, &config),
        Command::Windows { input, top } => cmd_windows(input, *top, &config),
        Command::Crop {
            input,
            window,
            from,
            to,
            output,
        } => cmd_crop(input, *window, (*from, *to), output, &config),
        Command::Play {
            input,
            window,
            from,
            to,
        } => cmd_play(input, *window, from.zip(*to), &config),
        Command::Browse { input } => cmd_browse(input, &config),
        Command::Split { pattern, output } => {
            let args = SplitArgs {
                input_pattern: pattern.clone(),
                output_dir: output.clone(),
            };
            let written = run_split(&args, &config)?;
            println!("{} files written to {}", written, output.display());
            Ok(())
        }
        Command::Config { save } => {
            print!("{}", toml::to_string_pretty(&config)?);
            if *save {
                let path = cli.config.clone().unwrap_or_else(AppConfig::default_path);
                config.save_to_file(&path)?;
                eprintln!("Saved {}", path.display());
            }
            Ok(())
        }
    }
}
