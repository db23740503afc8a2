//! rowpro2tcx - Command-line interface for rowpro-tcx
//!
//! Commands:
//! - convert: Convert one RowPro export into a TCX document
//! - batch: Convert several exports into a directory
//! - inspect: Show what the parser found in an export

use clap::{Parser, Subcommand};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use rowpro_tcx::pipeline::{read_export, write_atomic, Conversion, Converter};
use rowpro_tcx::types::ParsedSession;
use rowpro_tcx::{ConvertError, ConverterConfig, Diagnostic, Sport, CONVERTER_VERSION};

/// rowpro2tcx - DigitalRowing RowPro exports to Garmin TCX
#[derive(Parser)]
#[command(name = "rowpro2tcx")]
#[command(version = CONVERTER_VERSION)]
#[command(about = "Convert RowPro CSV exports into TCX documents", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert one export
    Convert {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output file path (use - for stdout)
        #[arg(short, long)]
        output: PathBuf,

        #[command(flatten)]
        options: ConvertOptions,
    },

    /// Convert several exports, writing <stem>.tcx for each
    Batch {
        /// Input file paths
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Directory receiving the TCX files
        #[arg(long)]
        out_dir: PathBuf,

        #[command(flatten)]
        options: ConvertOptions,
    },

    /// Print the parsed session summary and diagnostics
    Inspect {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,

        /// TOML configuration file
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[derive(clap::Args)]
struct ConvertOptions {
    /// Sport written on the activity (running, biking, other, rowing)
    #[arg(long)]
    sport: Option<Sport>,

    /// Write the XML on a single line
    #[arg(long)]
    compact: bool,

    /// Fail on the first diagnostic
    #[arg(long)]
    strict: bool,

    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// RowPro version recorded in the Creator element
    #[arg(long)]
    rowpro_version: Option<String>,
}

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e))
                    .unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), RowproCliError> {
    match cli.command {
        Commands::Convert {
            input,
            output,
            options,
        } => cmd_convert(&input, &output, &options),

        Commands::Batch {
            inputs,
            out_dir,
            options,
        } => cmd_batch(&inputs, &out_dir, &options),

        Commands::Inspect {
            input,
            json,
            config,
        } => cmd_inspect(&input, json, config.as_deref()),
    }
}

/// File settings, then environment, then command-line flags
fn load_config(path: Option<&Path>) -> Result<ConverterConfig, RowproCliError> {
    let mut config = match path {
        Some(path) => ConverterConfig::from_file(path)?,
        None => ConverterConfig::default(),
    };
    config.apply_env(|k| std::env::var(k).ok())?;
    Ok(config)
}

fn build_converter(options: &ConvertOptions) -> Result<Converter, RowproCliError> {
    let mut config = load_config(options.config.as_deref())?;
    if let Some(sport) = options.sport {
        config.sport = sport;
    }
    if options.compact {
        config.pretty_print = false;
    }
    if options.strict {
        config.strict = true;
    }
    if let Some(version) = &options.rowpro_version {
        config.rowpro_version = Some(version.clone());
    }
    Ok(Converter::from_config(config)?)
}

fn is_stdio(path: &Path) -> bool {
    path.to_string_lossy() == "-"
}

fn cmd_convert(
    input: &Path,
    output: &Path,
    options: &ConvertOptions,
) -> Result<(), RowproCliError> {
    let converter = build_converter(options)?;

    let conversion = if is_stdio(input) {
        converter.convert_reader(io::stdin().lock(), "<stdin>")?
    } else {
        converter.convert_path(input)?
    };

    if is_stdio(output) {
        let mut stdout = io::stdout().lock();
        stdout.write_all(&conversion.xml)?;
        stdout.flush()?;
    } else {
        write_atomic(output, &conversion.xml)?;
    }

    report(input, &conversion);
    Ok(())
}

fn cmd_batch(
    inputs: &[PathBuf],
    out_dir: &Path,
    options: &ConvertOptions,
) -> Result<(), RowproCliError> {
    let converter = build_converter(options)?;
    fs::create_dir_all(out_dir)?;

    let mut failed = 0;
    for input in inputs {
        let Some(stem) = input.file_stem() else {
            tracing::error!(input = %input.display(), "input has no file name");
            failed += 1;
            continue;
        };
        let mut file_name = stem.to_os_string();
        file_name.push(".tcx");
        let output = out_dir.join(file_name);

        match converter.convert_file(input, &output) {
            Ok(conversion) => report(input, &conversion),
            Err(e) => {
                tracing::error!(input = %input.display(), "{e}");
                failed += 1;
            }
        }
    }

    if failed > 0 {
        return Err(RowproCliError::BatchFailed {
            failed,
            total: inputs.len(),
        });
    }
    Ok(())
}

fn cmd_inspect(input: &Path, json: bool, config: Option<&Path>) -> Result<(), RowproCliError> {
    let converter = Converter::from_config(load_config(config)?)?;

    let (raw, mut diagnostics) = if is_stdio(input) {
        read_export(io::stdin().lock(), "<stdin>")?
    } else {
        read_export(fs::File::open(input)?, &input.display().to_string())?
    };

    let mut parsed = converter.parse(&raw)?;
    diagnostics.append(&mut parsed.diagnostics);
    parsed.diagnostics = diagnostics;
    let report = InspectReport::from(&parsed);

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_inspect_report(&report);
    }
    Ok(())
}

fn report(input: &Path, conversion: &Conversion) {
    tracing::info!(
        input = %input.display(),
        activities = conversion.activities,
        trackpoints = conversion.trackpoints,
        diagnostics = conversion.diagnostics.len(),
        "converted"
    );
}

fn print_inspect_report(report: &InspectReport) {
    println!("rowpro2tcx v{}", CONVERTER_VERSION);
    println!();

    let or_dash = |v: Option<String>| v.unwrap_or_else(|| "-".to_string());
    println!("  start time:     {}", or_dash(report.start_time.clone()));
    println!("  total time:     {} s", or_dash(report.total_time.map(|v| v.to_string())));
    println!("  total distance: {} m", or_dash(report.total_distance.map(|v| v.to_string())));
    println!("  avg pace:       {}", or_dash(report.avg_pace.map(|v| v.to_string())));
    println!("  calories:       {}", or_dash(report.total_calories.map(|v| v.to_string())));
    println!("  avg heart rate: {}", or_dash(report.avg_heart_rate.map(|v| v.to_string())));
    println!("  slide:          {}", report.uses_slide);
    println!(
        "  samples:        {}{}",
        report.samples,
        if report.time_ordered { "" } else { " (out of order)" }
    );
    println!();

    if report.diagnostics.is_empty() {
        println!("No diagnostics");
    } else {
        println!("Diagnostics ({}):", report.diagnostics.len());
        for diagnostic in report.diagnostics {
            println!("  - {}", diagnostic);
        }
    }
}

// Error types

#[derive(Debug)]
enum RowproCliError {
    Io(io::Error),
    Convert(ConvertError),
    Json(serde_json::Error),
    BatchFailed { failed: usize, total: usize },
}

impl From<io::Error> for RowproCliError {
    fn from(e: io::Error) -> Self {
        RowproCliError::Io(e)
    }
}

impl From<ConvertError> for RowproCliError {
    fn from(e: ConvertError) -> Self {
        RowproCliError::Convert(e)
    }
}

impl From<serde_json::Error> for RowproCliError {
    fn from(e: serde_json::Error) -> Self {
        RowproCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<RowproCliError> for CliError {
    fn from(e: RowproCliError) -> Self {
        match e {
            RowproCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            RowproCliError::Convert(e) => {
                let (code, hint) = match &e {
                    ConvertError::UnsupportedLineEnding { .. } => (
                        "LINE_ENDING",
                        "RowPro exports are CRLF-delimited; convert the file with unix2dos",
                    ),
                    ConvertError::Xml(_) => ("XML_ERROR", "Report this as a bug"),
                    ConvertError::Io(_) => ("IO_ERROR", "Check file paths and permissions"),
                    ConvertError::Config(_) => (
                        "CONFIG_ERROR",
                        "Check the configuration file and ROWPRO_TCX_* variables",
                    ),
                    ConvertError::Strict(_) => (
                        "STRICT_MODE",
                        "Run 'rowpro2tcx inspect' for details or drop --strict",
                    ),
                };
                CliError {
                    code: code.to_string(),
                    message: e.to_string(),
                    hint: Some(hint.to_string()),
                }
            }
            RowproCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: None,
            },
            RowproCliError::BatchFailed { failed, total } => CliError {
                code: "BATCH_FAILED".to_string(),
                message: format!("{} of {} inputs failed", failed, total),
                hint: Some("See the log above for each failure".to_string()),
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct InspectReport<'a> {
    start_time: Option<String>,
    total_time: Option<f64>,
    total_distance: Option<f64>,
    avg_pace: Option<f64>,
    total_calories: Option<f64>,
    avg_heart_rate: Option<u16>,
    uses_slide: bool,
    samples: usize,
    time_ordered: bool,
    diagnostics: &'a [Diagnostic],
}

impl<'a> From<&'a ParsedSession> for InspectReport<'a> {
    fn from(parsed: &'a ParsedSession) -> Self {
        let session = &parsed.session;
        Self {
            start_time: session.start_time.map(|t| t.to_rfc3339()),
            total_time: session.total_time,
            total_distance: session.total_distance,
            avg_pace: session.avg_pace,
            total_calories: session.total_calories,
            avg_heart_rate: session.avg_heart_rate,
            uses_slide: session.uses_slide,
            samples: session.samples.len(),
            time_ordered: session.is_time_ordered(),
            diagnostics: &parsed.diagnostics,
        }
    }
}
