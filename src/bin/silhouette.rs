use std::{
    collections::HashMap,
    fs,
    path::PathBuf,
    sync::{Arc, Mutex},
};

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use colored::Colorize;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use log::LevelFilter;
use serde_json::{Value, json};
use silhouette::{
    CancellationToken, CascadeJobFactory, FfmpegLogLevel, JobResult, JobScheduler,
    ProgressCallback, ProgressInfo, ScanOptions, ScanOutcome, SilhouetteError, SnapshotFormat,
    SnapshotRecord,
};

const CLI_AFTER_HELP: &str = "Examples:\n  silhouette scan\n  silhouette scan --input footage --output people --progress\n  silhouette scan --cascade models/haarcascade_fullbody.xml --extension avi --json\n  silhouette completions zsh > _silhouette";

#[derive(Debug, Parser)]
#[command(
    name = "silhouette",
    version,
    about = "Find people in videos and keep de-duplicated snapshots",
    after_help = CLI_AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Scan every video under a directory and write snapshots.
    #[command(
        about = "Scan videos for people",
        after_help = "Examples:\n  silhouette scan --input video --output image\n  silhouette scan --frame-skip 10 --threads 4 --format jpg"
    )]
    Scan(ScanArgs),

    /// Generate shell completion scripts.
    #[command(about = "Generate shell completions")]
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Debug, Parser, Clone)]
struct ScanArgs {
    /// Directory searched recursively for videos. Created if missing.
    #[arg(long, default_value = "video")]
    input: PathBuf,

    /// Directory snapshots are written to. Created if missing.
    #[arg(long, default_value = "image")]
    output: PathBuf,

    /// Haar cascade definition used for detection.
    #[arg(long, default_value = "haarcascade_fullbody.xml")]
    cascade: PathBuf,

    /// Video file extension to look for.
    #[arg(long, default_value = "mp4")]
    extension: String,

    /// Snapshot image format (png, jpg, jpeg, bmp).
    #[arg(long, default_value = "png")]
    format: String,

    /// Run the detector on every Nth frame.
    #[arg(long, default_value_t = silhouette::DEFAULT_FRAME_SKIP)]
    frame_skip: u64,

    /// Worker thread count (defaults to one per core).
    #[arg(long)]
    threads: Option<usize>,

    /// Show one progress bar per video.
    #[arg(long)]
    progress: bool,

    /// Print the summary as JSON.
    #[arg(long)]
    json: bool,

    /// Show debug logging.
    #[arg(long)]
    verbose: bool,

    /// FFmpeg log level (quiet, fatal, error, warning, info, debug).
    #[arg(long)]
    log_level: Option<String>,
}

fn parse_snapshot_format(value: &str) -> Option<SnapshotFormat> {
    SnapshotFormat::from_extension(value)
}

fn log_filter(verbose: bool, progress: bool) -> LevelFilter {
    if verbose {
        LevelFilter::Debug
    } else if progress {
        LevelFilter::Warn
    } else {
        LevelFilter::Info
    }
}

fn init_logging(args: &ScanArgs) -> Result<(), Box<dyn std::error::Error>> {
    let filter = log_filter(args.verbose, args.progress);
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(filter.as_str().to_ascii_lowercase()),
    )
    .init();

    let ffmpeg_level = match &args.log_level {
        Some(level) => level
            .parse::<FfmpegLogLevel>()
            .map_err(|_| format!("unsupported --log-level: {level}"))?,
        None => FfmpegLogLevel::from_log_filter(filter),
    };
    silhouette::set_ffmpeg_log_level(ffmpeg_level);
    Ok(())
}

/// Size rayon's global pool. Must run before the first parallel scan; `None`
/// and `Some(0)` keep rayon's default of one worker per core.
fn configure_threads(threads: Option<usize>) -> Result<(), rayon::ThreadPoolBuildError> {
    if let Some(threads) = threads.filter(|&threads| threads > 0) {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()?;
    }
    Ok(())
}

/// Where `Snapshot saved:` lines go when no progress bars are drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SnapshotEcho {
    Stdout,
    Stderr,
}

impl SnapshotEcho {
    /// stdout carries only the JSON document in `--json` mode.
    fn for_output(json: bool) -> Self {
        if json { Self::Stderr } else { Self::Stdout }
    }
}

/// Console sink for job progress. Bars are only drawn with `--progress`;
/// snapshot lines are always printed.
struct ConsoleProgress {
    multi: Option<MultiProgress>,
    echo: SnapshotEcho,
    bars: Mutex<HashMap<String, ProgressBar>>,
    percent_style: ProgressStyle,
    frame_style: ProgressStyle,
}

impl ConsoleProgress {
    fn for_args(args: &ScanArgs) -> Result<Self, Box<dyn std::error::Error>> {
        Self::new(args.progress && !args.json, SnapshotEcho::for_output(args.json))
    }

    fn new(show_bars: bool, echo: SnapshotEcho) -> Result<Self, Box<dyn std::error::Error>> {
        let percent_style =
            ProgressStyle::with_template("{prefix:>24} {bar:40.cyan/blue} {pos:>3}% {elapsed}")?
                .progress_chars("##-");
        let frame_style =
            ProgressStyle::with_template("{prefix:>24} {spinner:.green} frame {pos} {elapsed}")?;

        Ok(Self {
            multi: show_bars.then(MultiProgress::new),
            echo,
            bars: Mutex::new(HashMap::new()),
            percent_style,
            frame_style,
        })
    }

    fn bar_for(&self, info: &ProgressInfo) -> Option<ProgressBar> {
        let multi = self.multi.as_ref()?;
        let mut bars = self.bars.lock().ok()?;
        let bar = bars.entry(info.video.clone()).or_insert_with(|| {
            let bar = match info.percentage {
                Some(_) => ProgressBar::new(100).with_style(self.percent_style.clone()),
                None => ProgressBar::no_length().with_style(self.frame_style.clone()),
            };
            multi.add(bar.with_prefix(info.video.clone()))
        });
        Some(bar.clone())
    }

    fn finish(&self) {
        if let Ok(bars) = self.bars.lock() {
            for bar in bars.values() {
                bar.finish();
            }
        }
    }
}

impl ProgressCallback for ConsoleProgress {
    fn on_progress(&self, info: &ProgressInfo) {
        let Some(bar) = self.bar_for(info) else {
            return;
        };
        match info.percentage {
            Some(percentage) => {
                bar.set_position(u64::from(percentage));
                if percentage >= 100 {
                    bar.finish();
                }
            }
            None => bar.set_position(info.frame_index),
        }
    }

    fn on_snapshot(&self, snapshot: &SnapshotRecord) {
        let line = format!("Snapshot saved: {}", snapshot.path.display());
        match (&self.multi, self.echo) {
            (Some(multi), _) => {
                let _ = multi.println(line);
            }
            (None, SnapshotEcho::Stdout) => println!("{line}"),
            (None, SnapshotEcho::Stderr) => eprintln!("{line}"),
        }
    }
}

fn result_json(result: &JobResult) -> Value {
    match &result.outcome {
        Ok(report) => json!({
            "video": result.video.display().to_string(),
            "status": "ok",
            "frames_read": report.frames_read,
            "frames_sampled": report.frames_sampled,
            "frames_with_detections": report.frames_with_detections,
            "duplicates_skipped": report.duplicates_skipped,
            "write_failures": report.write_failures,
            "snapshots": report
                .snapshots
                .iter()
                .map(|snapshot| snapshot.path.display().to_string())
                .collect::<Vec<_>>(),
        }),
        Err(error) => json!({
            "video": result.video.display().to_string(),
            "status": "failed",
            "error": error.to_string(),
        }),
    }
}

fn print_summary(outcome: &ScanOutcome) {
    for result in outcome.results() {
        match &result.outcome {
            Ok(report) => println!(
                "{} {} ({} frame(s), {} snapshot(s))",
                "done".green().bold(),
                result.video.display(),
                report.frames_read,
                report.snapshots_saved()
            ),
            Err(error) => println!(
                "{} {}: {}",
                "failed".red().bold(),
                result.video.display(),
                error
            ),
        }
    }

    let failed = outcome.failed_count();
    let summary = format!(
        "Saved {} snapshot(s) from {} video(s)",
        outcome.snapshot_count(),
        outcome.results().len() - failed
    );
    if failed == 0 {
        println!("{} {}", "success:".green().bold(), summary.green());
    } else {
        println!(
            "{} {}",
            "warning:".yellow().bold(),
            format!("{summary}; {failed} video(s) failed").yellow()
        );
    }
}

fn scan(args: ScanArgs) -> Result<(), Box<dyn std::error::Error>> {
    init_logging(&args)?;
    configure_threads(args.threads)?;

    if args.frame_skip == 0 {
        return Err("--frame-skip must be greater than 0".into());
    }
    let format = parse_snapshot_format(&args.format)
        .ok_or(format!("unsupported --format: {}", args.format))?;

    fs::create_dir_all(&args.input)?;
    fs::create_dir_all(&args.output)?;

    let token = CancellationToken::new();
    let handler_token = token.clone();
    ctrlc::set_handler(move || handler_token.cancel())?;

    let console = Arc::new(ConsoleProgress::for_args(&args)?);
    let options = ScanOptions::new()
        .with_progress(console.clone())
        .with_cancellation(token.clone())
        .with_frame_skip(args.frame_skip)
        .with_snapshot_format(format);

    let scheduler = JobScheduler::new(CascadeJobFactory::new(&args.cascade), &args.output, options);
    let outcome = scheduler.scan_directory(&args.input, &args.extension)?;
    console.finish();

    if matches!(outcome, ScanOutcome::NoVideos) {
        println!("No video files found in the specified directory.");
        return Ok(());
    }

    if args.json {
        let payload = json!({
            "input": args.input.display().to_string(),
            "output": args.output.display().to_string(),
            "snapshots": outcome.snapshot_count(),
            "failed": outcome.failed_count(),
            "videos": outcome.results().iter().map(result_json).collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else {
        print_summary(&outcome);
    }

    if token.is_cancelled() {
        return Err(SilhouetteError::Cancelled.into());
    }
    Ok(())
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Scan(args) => scan(args)?,
        Commands::Completions { shell } => {
            let mut command = Cli::command();
            clap_complete::generate(shell, &mut command, "silhouette", &mut std::io::stdout());
        }
    }

    Ok(())
}

fn main() {
    if let Err(error) = run() {
        eprintln!("error: {error}");
        std::process::exit(1);
    }
}
