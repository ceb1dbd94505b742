//! Moonlabel: vision-model annotations to ready-to-train datasets.
//!
//! Moonlabel asks a vision backend to find objects in (or describe) a batch
//! of images, then packages the images and their annotations as a zip
//! archive in YOLO, Pascal VOC, COCO or plain caption layout.
//!
//! # Modules
//!
//! - [`ir`]: result model (detections, captions, batches, label registry)
//! - [`request`]: sequential backend calls over a batch
//! - [`backend`]: the [`backend::VisionBackend`] seam and the HTTP client
//! - [`encode`]: per-format annotation writers
//! - [`archive`]: zip layout and assembly
//! - [`export`]: validated export requests and the export pipeline
//! - [`inspect`]: read-back reports for exported archives
//! - [`config`]: backend configuration
//! - [`error`]: error types
//!
//! # Example
//!
//! ```
//! use moonlabel::ir::{Batch, CaptionResult, ExportFormat, ImageFile};
//! use moonlabel::{export, ExportOptions, ExportRequest};
//!
//! let batch = Batch::Captions(vec![CaptionResult::new(
//!     ImageFile::new("cat.jpg", Vec::new()),
//!     "A cat asleep on a windowsill.",
//! )]);
//! let request = ExportRequest::new(ExportFormat::Caption, batch, ExportOptions::default())?;
//! let output = export(&request, None)?;
//! assert_eq!(output.summary.images, 1);
//! # Ok::<(), moonlabel::MoonlabelError>(())
//! ```

pub mod archive;
pub mod backend;
pub mod config;
pub mod encode;
pub mod error;
pub mod export;
pub mod inspect;
pub mod ir;
pub mod request;

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use tracing::{info, level_filters::LevelFilter, warn};
use walkdir::WalkDir;

pub use error::{BackendError, MoonlabelError};
pub use export::{export, CaptionSource, ExportOptions, ExportOutput, ExportRequest, ExportSummary};

use archive::layout::CollisionPolicy;
use config::{BackendConfig, BackendMode, DEFAULT_STATION_ENDPOINT};
use ir::io_manifest::{self, CaptionEntry, DetectionEntry, Manifest};
use ir::{CaptionLength, ExportFormat, ImageFile, LabelIndex};
use request::{FailurePolicy, Progress, RequestOrchestrator};

const IMAGE_EXTENSIONS: [&str; 8] = ["jpg", "jpeg", "png", "bmp", "gif", "webp", "tif", "tiff"];

/// The moonlabel CLI application.
#[derive(Parser)]
#[command(name = "moonlabel")]
#[command(version, author, about)]
#[command(propagate_version = true)]
struct Cli {
    /// More log output (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Only log errors.
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Detect objects in images and save the results as a batch manifest.
    Detect(DetectArgs),
    /// Caption images and save the results as a batch manifest.
    Caption(CaptionArgs),
    /// Export a batch manifest as a dataset archive.
    Export(ExportArgs),
    /// Print every YOLO line of a detection manifest.
    Lines(LinesArgs),
    /// Summarize an exported dataset archive.
    Inspect(InspectArgs),
}

/// Backend selection shared by the commands that call a backend.
#[derive(clap::Args)]
struct BackendArgs {
    /// Where inference runs.
    #[arg(long, value_enum, env = "MOONLABEL_MODE", default_value = "cloud")]
    mode: ModeArg,

    /// API key for cloud mode.
    #[arg(long, env = "MOONLABEL_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Base URL of the station in station mode.
    #[arg(long, env = "MOONLABEL_STATION_ENDPOINT", default_value = DEFAULT_STATION_ENDPOINT)]
    station_endpoint: String,

    /// Timeout for each backend request, in seconds.
    #[arg(long, env = "MOONLABEL_TIMEOUT_SECS", default_value_t = 60)]
    timeout_secs: u64,
}

impl BackendArgs {
    fn to_config(&self) -> BackendConfig {
        BackendConfig {
            mode: self.mode.into(),
            api_key: self.api_key.clone(),
            station_endpoint: self.station_endpoint.clone(),
            timeout: Duration::from_secs(self.timeout_secs),
        }
    }
}

#[derive(clap::Args)]
struct DetectArgs {
    /// Image files or directories (searched recursively).
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Comma-separated objects to look for, e.g. "person, car".
    #[arg(short, long)]
    labels: String,

    /// What to do with an image when one of its requests fails.
    #[arg(long, value_enum, default_value = "abandon-image")]
    on_error: FailurePolicyArg,

    /// Manifest file to write.
    #[arg(short, long)]
    output: PathBuf,

    #[command(flatten)]
    backend: BackendArgs,
}

#[derive(clap::Args)]
struct CaptionArgs {
    /// Image files or directories (searched recursively).
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Caption length.
    #[arg(long, value_enum, default_value = "short")]
    length: CaptionLengthArg,

    /// Manifest file to write.
    #[arg(short, long)]
    output: PathBuf,

    #[command(flatten)]
    backend: BackendArgs,
}

#[derive(clap::Args)]
struct ExportArgs {
    /// Batch manifest written by `detect` or `caption`.
    #[arg(short, long)]
    input: PathBuf,

    /// Annotation format of the archive.
    #[arg(short, long, value_enum)]
    format: FormatArg,

    /// Archive file to write.
    #[arg(short, long)]
    output: PathBuf,

    /// How to handle images that would share a file name.
    #[arg(long, value_enum, default_value = "rename")]
    collisions: CollisionArg,

    /// Ask the backend for fresh captions instead of using the manifest's.
    #[arg(long)]
    regenerate_captions: bool,

    /// Caption length used with --regenerate-captions.
    #[arg(long, value_enum, default_value = "short", requires = "regenerate_captions")]
    caption_length: CaptionLengthArg,

    #[command(flatten)]
    backend: BackendArgs,
}

#[derive(clap::Args)]
struct LinesArgs {
    /// Detection manifest.
    #[arg(short, long)]
    input: PathBuf,
}

#[derive(clap::Args)]
struct InspectArgs {
    /// Archive to inspect.
    archive: PathBuf,

    /// Output format for the report.
    #[arg(long, value_enum, default_value = "text")]
    output: ReportFormatArg,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ModeArg {
    Cloud,
    Station,
    Local,
}

impl From<ModeArg> for BackendMode {
    fn from(value: ModeArg) -> Self {
        match value {
            ModeArg::Cloud => BackendMode::Cloud,
            ModeArg::Station => BackendMode::Station,
            ModeArg::Local => BackendMode::Local,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum FormatArg {
    Yolo,
    Voc,
    Coco,
    Caption,
}

impl From<FormatArg> for ExportFormat {
    fn from(value: FormatArg) -> Self {
        match value {
            FormatArg::Yolo => ExportFormat::Yolo,
            FormatArg::Voc => ExportFormat::Voc,
            FormatArg::Coco => ExportFormat::Coco,
            FormatArg::Caption => ExportFormat::Caption,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum CaptionLengthArg {
    Short,
    Medium,
    Long,
}

impl From<CaptionLengthArg> for CaptionLength {
    fn from(value: CaptionLengthArg) -> Self {
        match value {
            CaptionLengthArg::Short => CaptionLength::Short,
            CaptionLengthArg::Medium => CaptionLength::Medium,
            CaptionLengthArg::Long => CaptionLength::Long,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum FailurePolicyArg {
    AbandonImage,
    SkipLabel,
}

impl From<FailurePolicyArg> for FailurePolicy {
    fn from(value: FailurePolicyArg) -> Self {
        match value {
            FailurePolicyArg::AbandonImage => FailurePolicy::AbandonImage,
            FailurePolicyArg::SkipLabel => FailurePolicy::SkipLabel,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum CollisionArg {
    Rename,
    Overwrite,
    Error,
}

impl From<CollisionArg> for CollisionPolicy {
    fn from(value: CollisionArg) -> Self {
        match value {
            CollisionArg::Rename => CollisionPolicy::Rename,
            CollisionArg::Overwrite => CollisionPolicy::Overwrite,
            CollisionArg::Error => CollisionPolicy::Error,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ReportFormatArg {
    Text,
    Json,
}

/// Run the moonlabel CLI.
///
/// This is the main entry point for the CLI, called from `main.rs`.
pub fn run() -> Result<(), MoonlabelError> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    match cli.command {
        Some(Commands::Detect(args)) => run_detect(args),
        Some(Commands::Caption(args)) => run_caption(args),
        Some(Commands::Export(args)) => run_export(args),
        Some(Commands::Lines(args)) => run_lines(args),
        Some(Commands::Inspect(args)) => run_inspect(args),
        None => {
            println!("moonlabel {}", env!("CARGO_PKG_VERSION"));
            println!();
            println!("Turn vision-model detections and captions into dataset archives.");
            println!();
            println!("Run 'moonlabel --help' for usage information.");
            Ok(())
        }
    }
}

fn init_tracing(verbose: u8, quiet: bool) {
    let level = if quiet {
        LevelFilter::ERROR
    } else {
        match verbose {
            0 => LevelFilter::WARN,
            1 => LevelFilter::INFO,
            2 => LevelFilter::DEBUG,
            _ => LevelFilter::TRACE,
        }
    };

    // A subscriber may already be installed when run() is called twice in
    // one process; the first one stays.
    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Execute the detect subcommand.
fn run_detect(args: DetectArgs) -> Result<(), MoonlabelError> {
    let labels = request::parse_label_terms(&args.labels);
    if labels.is_empty() {
        return Err(MoonlabelError::NoLabelTerms);
    }

    let paths = collect_image_paths(&args.inputs)?;
    let mut backend = backend::connect(&args.backend.to_config())?;
    let images = read_images(&paths)?;

    let run = RequestOrchestrator::new(&mut backend)
        .with_failure_policy(args.on_error.into())
        .detect_images(images, &labels, log_progress);

    for failure in &run.failures {
        warn!("{failure}");
    }
    if run.all_failed() {
        return Err(MoonlabelError::DetectionFailed { total: run.total() });
    }

    let mut entries = Vec::with_capacity(run.results.len());
    for (idx, result) in run.indices.iter().zip(&run.results) {
        entries.push(DetectionEntry {
            file: manifest_path(&paths[*idx])?,
            detections: result.detections.clone(),
        });
    }
    let objects: usize = entries.iter().map(|entry| entry.detections.len()).sum();
    let images = entries.len();

    io_manifest::write_manifest(&args.output, &Manifest::Detections { images: entries })?;
    println!(
        "Detected {} object(s) in {} of {} image(s); wrote {}",
        objects,
        images,
        run.total(),
        args.output.display()
    );
    Ok(())
}

/// Execute the caption subcommand.
fn run_caption(args: CaptionArgs) -> Result<(), MoonlabelError> {
    let paths = collect_image_paths(&args.inputs)?;
    let mut backend = backend::connect(&args.backend.to_config())?;
    let images = read_images(&paths)?;

    let results = RequestOrchestrator::new(&mut backend).caption_images(
        images,
        args.length.into(),
        log_progress,
    );

    let mut entries = Vec::with_capacity(results.len());
    for (path, result) in paths.iter().zip(results) {
        entries.push(CaptionEntry {
            file: manifest_path(path)?,
            caption: result.caption,
        });
    }
    let empty = entries.iter().filter(|entry| entry.caption.is_empty()).count();
    let images = entries.len();

    io_manifest::write_manifest(&args.output, &Manifest::Captions { images: entries })?;
    println!(
        "Captioned {} image(s) ({} empty); wrote {}",
        images,
        empty,
        args.output.display()
    );
    Ok(())
}

/// Execute the export subcommand.
fn run_export(args: ExportArgs) -> Result<(), MoonlabelError> {
    let batch = io_manifest::read_batch(&args.input)?;

    let caption_source = if args.regenerate_captions {
        CaptionSource::Regenerate(args.caption_length.into())
    } else {
        CaptionSource::Reuse
    };
    let options = ExportOptions {
        caption_source,
        collisions: args.collisions.into(),
    };
    let request = ExportRequest::new(args.format.into(), batch, options)?;

    let output = if request.needs_backend() {
        let mut connected = backend::connect(&args.backend.to_config())?;
        let backend: &mut dyn backend::VisionBackend = &mut *connected;
        export(&request, Some(backend))?
    } else {
        export(&request, None)?
    };

    fs::write(&args.output, &output.archive)?;
    println!("{}", output.summary);
    println!("Wrote {}", args.output.display());
    Ok(())
}

/// Execute the lines subcommand.
fn run_lines(args: LinesArgs) -> Result<(), MoonlabelError> {
    let manifest = io_manifest::read_manifest(&args.input)?;
    let Manifest::Detections { images } = manifest else {
        return Err(MoonlabelError::FormatMismatch {
            format: ExportFormat::Yolo.name(),
            batch: "captions",
        });
    };

    let labels = LabelIndex::from_labels(
        images
            .iter()
            .flat_map(|entry| entry.detections.iter().map(|det| det.label.as_str())),
    );
    for entry in &images {
        print!(
            "{}",
            encode::yolo::label_file_contents(&entry.detections, &labels)?
        );
    }
    Ok(())
}

/// Execute the inspect subcommand.
fn run_inspect(args: InspectArgs) -> Result<(), MoonlabelError> {
    let bytes = fs::read(&args.archive)?;
    let report = inspect::inspect_archive(&bytes)?;

    match args.output {
        ReportFormatArg::Text => print!("{report}"),
        ReportFormatArg::Json => {
            let json =
                serde_json::to_string_pretty(&report).map_err(MoonlabelError::ReportJsonWrite)?;
            println!("{json}");
        }
    }
    Ok(())
}

fn log_progress(progress: Progress) {
    info!(%progress, "processed");
}

/// Expands directories into the image files below them.
///
/// Files named explicitly are kept whatever their extension. Files found in
/// a directory are filtered by extension and sorted by relative path.
fn collect_image_paths(inputs: &[PathBuf]) -> Result<Vec<PathBuf>, MoonlabelError> {
    let mut paths = Vec::new();

    for input in inputs {
        if !input.is_dir() {
            paths.push(input.clone());
            continue;
        }

        let mut found = Vec::new();
        for entry in WalkDir::new(input).follow_links(true) {
            let entry = entry.map_err(|source| MoonlabelError::Io(std::io::Error::from(source)))?;
            if entry.file_type().is_file() && has_image_extension(entry.path()) {
                found.push(entry.into_path());
            }
        }
        found.sort_by_cached_key(|path| {
            path.strip_prefix(input)
                .unwrap_or(path)
                .to_string_lossy()
                .replace('\\', "/")
        });
        paths.extend(found);
    }

    if paths.is_empty() {
        return Err(MoonlabelError::NoImages);
    }
    Ok(paths)
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|allowed| ext.eq_ignore_ascii_case(allowed))
        })
        .unwrap_or(false)
}

fn read_images(paths: &[PathBuf]) -> Result<Vec<ImageFile>, MoonlabelError> {
    paths
        .iter()
        .map(|path| {
            let data = fs::read(path)?;
            let file_name = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();
            Ok(ImageFile::new(file_name, data))
        })
        .collect()
}

/// Absolute path recorded in a manifest, so it loads from any directory.
fn manifest_path(path: &Path) -> Result<String, MoonlabelError> {
    let absolute = fs::canonicalize(path)?;
    Ok(absolute.to_string_lossy().into_owned())
}
