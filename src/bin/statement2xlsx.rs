//! CLI binary for statement2xlsx.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ConversionConfig` / `ServerConfig` and either serves the upload form or
//! converts one file.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use statement2xlsx::pipeline::ocr::TesseractCli;
use statement2xlsx::{
    convert_to_file, pdfium, serve, Backends, ConversionConfig, ServerConfig, StatementLayout,
};
use std::io;
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Serve the upload form on http://127.0.0.1:5000
  statement2xlsx serve

  # Listen on all interfaces, custom port
  statement2xlsx serve --host 0.0.0.0 --port 8080

  # Convert one statement
  statement2xlsx convert statement.pdf -o statement.xlsx

  # Scanned Hindi/English statement, higher DPI, stats as JSON
  statement2xlsx convert scan.pdf --lang eng+hin --dpi 300 --json

  # Extra line layout tried after the built-in Dr/Cr layout
  statement2xlsx convert scan.pdf --layout 'slash=(?P<date>\d{2}/\d{2}/\d{4})\s+(?P<narration>.+?)\s+(?P<amount>[\d,]+\.\d{2})\s+(?P<amount_type>Dr|Cr)\s+(?P<balance>[\d,]+\.\d{2})\s+(?P<balance_type>Dr|Cr)'

ENVIRONMENT VARIABLES:
  STATEMENT2XLSX_PDFIUM_LIB   Directory or file of the pdfium shared library
  STATEMENT2XLSX_TESSERACT    tesseract executable
  RUST_LOG                    Log filter, overrides --verbose / --quiet

SETUP:
  pdfium:     place libpdfium next to the binary or on the library path
  tesseract:  apt install tesseract-ocr  /  brew install tesseract
"#;

/// Convert PDF bank statements to Excel workbooks.
#[derive(Parser, Debug)]
#[command(
    name = "statement2xlsx",
    version,
    about = "Convert PDF bank statements to Excel workbooks",
    long_about = "Convert PDF bank statements to Excel workbooks. Statements with a text layer \
are converted from their embedded table; scanned statements fall back to OCR with tesseract.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "STATEMENT2XLSX_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "STATEMENT2XLSX_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the upload form and the /upload endpoint.
    Serve(ServeArgs),
    /// Convert one PDF to XLSX.
    Convert(ConvertArgs),
}

#[derive(Args, Debug)]
struct ServeArgs {
    /// Interface to bind.
    #[arg(long, env = "STATEMENT2XLSX_HOST", default_value = "127.0.0.1")]
    host: String,

    /// TCP port.
    #[arg(short, long, env = "STATEMENT2XLSX_PORT", default_value_t = 5000)]
    port: u16,

    /// Directory where uploads are staged during a request.
    #[arg(long, env = "STATEMENT2XLSX_UPLOAD_DIR", default_value = "uploads")]
    upload_dir: PathBuf,

    /// Largest accepted upload in MiB.
    #[arg(long, env = "STATEMENT2XLSX_MAX_UPLOAD_MB", default_value_t = 32)]
    max_upload_mb: usize,

    #[command(flatten)]
    engine: EngineArgs,
}

#[derive(Args, Debug)]
struct ConvertArgs {
    /// Local PDF file.
    input: PathBuf,

    /// Output workbook. Default: the input path with an .xlsx extension.
    #[arg(short, long, env = "STATEMENT2XLSX_OUTPUT")]
    output: Option<PathBuf>,

    /// Print conversion stats as JSON on stdout.
    #[arg(long)]
    json: bool,

    #[command(flatten)]
    engine: EngineArgs,
}

/// Engine options shared by both subcommands.
#[derive(Args, Debug)]
struct EngineArgs {
    /// Rendering DPI for OCR (72–600).
    #[arg(long, env = "STATEMENT2XLSX_DPI", default_value_t = 200,
          value_parser = clap::value_parser!(u32).range(72..=600))]
    dpi: u32,

    /// Pages recognised at once.
    #[arg(long, env = "STATEMENT2XLSX_OCR_CONCURRENCY", default_value_t = 2)]
    ocr_concurrency: usize,

    /// tesseract language(s), e.g. eng or eng+hin.
    #[arg(long = "lang", env = "STATEMENT2XLSX_LANG", default_value = "eng")]
    language: String,

    /// tesseract executable.
    #[arg(long = "tesseract", env = "STATEMENT2XLSX_TESSERACT", default_value = "tesseract")]
    tesseract_path: PathBuf,

    /// Directory or file of the pdfium shared library.
    #[arg(long = "pdfium-lib", env = "STATEMENT2XLSX_PDFIUM_LIB")]
    pdfium_lib: Option<PathBuf>,

    /// PDF user password for encrypted statements.
    #[arg(long, env = "STATEMENT2XLSX_PASSWORD")]
    password: Option<String>,

    /// Extra statement line layout as NAME=REGEX; repeatable.
    #[arg(long = "layout", value_name = "NAME=REGEX")]
    layouts: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner covers `convert` feedback, so library INFO logs are only
    // shown for `serve` unless --verbose is given.
    let show_progress = match &cli.command {
        Command::Convert(args) => !cli.quiet && !args.json,
        Command::Serve(_) => false,
    };
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    match cli.command {
        Command::Serve(args) => run_serve(args).await,
        Command::Convert(args) => run_convert(args, cli.quiet, show_progress).await,
    }
}

async fn run_serve(args: ServeArgs) -> Result<()> {
    let config = build_config(&args.engine)?;

    let probe = TesseractCli::new(&config);
    if !tokio::task::spawn_blocking(move || probe.is_available()).await? {
        warn!(
            "tesseract not found at '{}'; scanned statements will fail until it is installed",
            config.tesseract_path.display()
        );
    }
    let lib = config.pdfium_library_path.clone();
    if let Err(e) = tokio::task::spawn_blocking(move || pdfium::bind(lib.as_deref()).map(|_| ())).await? {
        warn!("{}", e);
    }

    let server = ServerConfig {
        host: args.host,
        port: args.port,
        upload_dir: args.upload_dir,
        max_upload_bytes: args.max_upload_mb.saturating_mul(1024 * 1024),
    };
    let backends = Backends::from_config(&config);
    serve(server, config, backends)
        .await
        .context("Server failed")
}

async fn run_convert(args: ConvertArgs, quiet: bool, show_progress: bool) -> Result<()> {
    let config = build_config(&args.engine)?;
    let backends = Backends::from_config(&config);
    let output = args
        .output
        .clone()
        .unwrap_or_else(|| args.input.with_extension("xlsx"));

    let spinner = show_progress.then(|| {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]),
        );
        bar.set_prefix("Converting");
        bar.set_message(args.input.display().to_string());
        bar.enable_steady_tick(Duration::from_millis(80));
        bar
    });

    let result = convert_to_file(&args.input, &output, &config, &backends).await;
    if let Some(bar) = &spinner {
        bar.finish_and_clear();
    }
    let conversion = result.context("Conversion failed")?;

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "output": output,
                "source": conversion.source,
                "stats": conversion.stats,
            }))
            .context("Failed to serialise stats")?
        );
    } else if !quiet {
        eprintln!(
            "{}  {} rows via {}  {}  →  {}",
            green("✔"),
            conversion.sheet.rows.len(),
            conversion.source,
            dim(&format!("{}ms", conversion.stats.total_duration_ms)),
            bold(&output.display().to_string()),
        );
    }

    Ok(())
}

/// Map engine args to `ConversionConfig`.
fn build_config(args: &EngineArgs) -> Result<ConversionConfig> {
    let mut builder = ConversionConfig::builder()
        .dpi(args.dpi)
        .ocr_concurrency(args.ocr_concurrency)
        .ocr_language(&args.language)
        .tesseract_path(&args.tesseract_path);

    if let Some(ref lib) = args.pdfium_lib {
        builder = builder.pdfium_library_path(lib);
    }
    if let Some(ref pwd) = args.password {
        builder = builder.password(pwd);
    }
    for layout_arg in &args.layouts {
        let (name, pattern) = layout_arg
            .split_once('=')
            .with_context(|| format!("Layout '{layout_arg}' must be NAME=REGEX"))?;
        builder = builder.layout(StatementLayout::new(name, pattern)?);
    }

    builder.build().context("Invalid configuration")
}
