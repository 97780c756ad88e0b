//! CLI binary for quiz2qti.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `WorkflowConfig`, drives one conversion episode, shows the preview and
//! asks before exporting.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use quiz2qti::{
    render_preview, CallbackRef, ConversionStatus, ExportType, HttpConversionClient,
    RemoteConversionClient, SelectedFile, Workflow, WorkflowCallback, WorkflowConfig,
};
use std::io::{self, BufRead, IsTerminal, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI callback using indicatif ─────────────────────────────────────────────

/// Terminal callback: a 0–100 progress bar for the episode, plus one log
/// line per status change, error and saved package.
struct CliCallback {
    bar: ProgressBar,
}

impl CliCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::hidden();
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  [{bar:42.green/238}] {pos:>3}%  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_length(100);
        Arc::new(Self { bar })
    }
}

impl WorkflowCallback for CliCallback {
    fn on_episode_start(&self, episode: u64) {
        self.bar.set_draw_target(indicatif::ProgressDrawTarget::stderr());
        self.bar.reset();
        self.bar.set_prefix("Converting");
        self.bar.set_message(format!("episode {episode}"));
        self.bar.enable_steady_tick(Duration::from_millis(80));
    }

    fn on_progress(&self, _episode: u64, progress: u8) {
        self.bar.set_position(u64::from(progress));
        if progress == 100 {
            self.bar.set_message("waiting for preview…");
        }
    }

    fn on_status_change(&self, _from: ConversionStatus, to: ConversionStatus) {
        match to {
            ConversionStatus::Complete => self.bar.finish_and_clear(),
            ConversionStatus::Error => self.bar.abandon(),
            _ => {}
        }
    }

    fn on_preview_ready(&self, _episode: u64, question_count: usize) {
        eprintln!(
            "{} {} questions ready for review",
            green("✔"),
            bold(&question_count.to_string())
        );
    }

    fn on_error(&self, message: &str) {
        eprintln!("{} {}", red("✘"), red(message));
    }

    fn on_package_saved(&self, path: &Path, size_bytes: usize) {
        eprintln!(
            "{} saved {}  {}",
            green("✔"),
            bold(&path.display().to_string()),
            dim(&format!("{:.2} KB", size_bytes as f64 / 1024.0)),
        );
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Convert pasted text and save quiz_package.zip in the current directory
  quiz2qti convert --text "What is 2+2?
  A) 3
  B) 4
  Answer: B"

  # Convert a document, export without asking
  quiz2qti convert --file week3.docx --yes -o exports/

  # Pipe quiz text in and only look at the preview
  cat quiz.txt | quiz2qti convert --stdin --preview-only

  # Preview as JSON
  quiz2qti convert --text-file quiz.txt --preview-only --json

  # Download the formatting guide
  quiz2qti instructions -o guide.txt

  # Check the service is up
  quiz2qti --server http://localhost:8000 ping

QUESTION FORMATS:
  Multiple choice   options A) B) C) D), then "Answer: B"
  True/False        end with (T/F), then "Answer: True"
  Short answer      start with "SA:", then "Answer: 1945"
  Essay             start with "Essay:", optional "Points: 10"
  Fill in blank     use _____ for the blank, then "Answer: Paris"

ENVIRONMENT VARIABLES:
  QUIZ2QTI_SERVER       Conversion service URL (default http://127.0.0.1:5000)
  QUIZ2QTI_TIMEOUT      Per-request timeout in seconds
  QUIZ2QTI_OUTPUT_DIR   Directory for quiz_package.zip
  RUST_LOG              Log filter, e.g. quiz2qti=debug
"#;

/// Convert quiz questions into a QTI package.
#[derive(Parser, Debug)]
#[command(
    name = "quiz2qti",
    version,
    about = "Convert quiz questions to a QTI package via a conversion service",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Conversion service base URL.
    #[arg(long, global = true, env = "QUIZ2QTI_SERVER", default_value = quiz2qti::config::DEFAULT_SERVER_URL)]
    server: String,

    /// Per-request timeout in seconds.
    #[arg(long, global = true, env = "QUIZ2QTI_TIMEOUT", default_value_t = 60)]
    timeout: u64,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "QUIZ2QTI_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "QUIZ2QTI_QUIET")]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Preview quiz content and export it as a package.
    Convert(ConvertArgs),
    /// Download the formatting guide.
    Instructions {
        /// Where to save the guide. Defaults to the name the service suggests.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Check the conversion service is reachable.
    Ping,
}

#[derive(Args, Debug)]
struct ConvertArgs {
    /// Quiz text to convert.
    #[arg(long)]
    text: Option<String>,

    /// Read quiz text from a file.
    #[arg(long, conflicts_with_all = ["text", "stdin"])]
    text_file: Option<PathBuf>,

    /// Read quiz text from standard input.
    #[arg(long, conflicts_with = "text")]
    stdin: bool,

    /// Upload a quiz document instead of text.
    #[arg(long)]
    file: Option<PathBuf>,

    /// Target format.
    #[arg(long, value_enum, default_value = "qti")]
    format: FormatArg,

    /// Directory to save quiz_package.zip into.
    #[arg(short, long, env = "QUIZ2QTI_OUTPUT_DIR", default_value = ".")]
    output_dir: PathBuf,

    /// Export without asking for confirmation.
    #[arg(short, long)]
    yes: bool,

    /// Stop after showing the preview.
    #[arg(long)]
    preview_only: bool,

    /// Print preview questions as JSON instead of text.
    #[arg(long)]
    json: bool,

    /// Disable the progress bar.
    #[arg(long, env = "QUIZ2QTI_NO_PROGRESS")]
    no_progress: bool,

    /// Milliseconds between progress ticks.
    #[arg(long, env = "QUIZ2QTI_TICK_MS", default_value_t = 200)]
    tick_ms: u64,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum FormatArg {
    Qti,
    Canvas,
}

impl From<FormatArg> for ExportType {
    fn from(v: FormatArg) -> Self {
        match v {
            FormatArg::Qti => ExportType::Qti,
            FormatArg::Canvas => ExportType::Canvas,
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Keep INFO logs out of the way while the progress bar is drawing.
    let show_progress = match &cli.command {
        Command::Convert(args) => !cli.quiet && !args.no_progress && !args.json,
        _ => false,
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

    match &cli.command {
        Command::Convert(args) => run_convert(&cli, args, show_progress).await,
        Command::Instructions { output } => run_instructions(&cli, output.as_deref()).await,
        Command::Ping => run_ping(&cli).await,
    }
}

async fn run_convert(cli: &Cli, args: &ConvertArgs, show_progress: bool) -> Result<()> {
    let callback: Option<CallbackRef> = if show_progress {
        Some(CliCallback::new() as CallbackRef)
    } else {
        None
    };

    let config = build_config(cli, args, callback)?;
    let mut workflow = Workflow::new(config).context("Failed to set up workflow")?;

    // ── Input ────────────────────────────────────────────────────────────
    if let Some(text) = read_text(args).await? {
        workflow.set_text(text);
    }
    if let Some(ref path) = args.file {
        let file = SelectedFile::load(path)
            .await
            .with_context(|| format!("Failed to load {}", path.display()))?;
        if !file.has_supported_extension() {
            warn!(
                "'{}' is not one of: {}",
                file.name(),
                quiz2qti::input::SUPPORTED_EXTENSIONS.join(", ")
            );
        }
        workflow.set_file(Some(file));
    }

    if !workflow.can_convert() {
        anyhow::bail!("Nothing to convert: pass --text, --text-file, --stdin or --file");
    }

    // ── Preview episode ──────────────────────────────────────────────────
    let export_type: ExportType = args.format.into();
    workflow
        .convert(export_type)
        .await
        .context("Conversion failed")?;

    let preview = workflow.preview();
    if args.json {
        let json =
            serde_json::to_string_pretty(preview.items()).context("Failed to serialise preview")?;
        println!("{json}");
    } else if !cli.quiet {
        println!(
            "{}\n",
            bold(&format!(
                "Preview: {} questions, export as {}",
                preview.len(),
                workflow.export_type()
            ))
        );
        println!("{}", render_preview(preview.items()));
    }

    if args.preview_only {
        workflow.hide_preview();
        return Ok(());
    }

    // ── Export ───────────────────────────────────────────────────────────
    if !args.yes && !confirm(&format!("Export {}?", workflow.export_type()))? {
        workflow.hide_preview();
        if !cli.quiet {
            eprintln!("{} export cancelled", cyan("◆"));
        }
        return Ok(());
    }

    match workflow.finalize().await.context("Export failed")? {
        Some(saved) => {
            if !cli.quiet && !show_progress {
                eprintln!("Saved {} ({} bytes)", saved.path.display(), saved.size_bytes);
            }
        }
        None => {
            if !cli.quiet {
                eprintln!(
                    "{} {} export is not available yet; nothing was downloaded",
                    cyan("⚠"),
                    workflow.export_type()
                );
            }
        }
    }

    Ok(())
}

async fn run_instructions(cli: &Cli, output: Option<&Path>) -> Result<()> {
    let client = HttpConversionClient::new(&cli.server, Duration::from_secs(cli.timeout))?;
    let doc = client
        .fetch_instructions()
        .await
        .context("Failed to download instructions")?;

    let path = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(&doc.file_name));
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .context("Output path has no file name")?;

    let size = doc.bytes.len();
    let saved = quiz2qti::export::save_package(&dir, &name, doc.bytes)
        .await
        .context("Failed to save instructions")?;
    if !cli.quiet {
        eprintln!("{} saved {} ({} bytes)", green("✔"), saved.display(), size);
    }
    Ok(())
}

async fn run_ping(cli: &Cli) -> Result<()> {
    let client = HttpConversionClient::new(&cli.server, Duration::from_secs(cli.timeout))?;
    let message = client
        .ping()
        .await
        .with_context(|| format!("Service at {} is not reachable", cli.server))?;
    if !cli.quiet {
        println!("{} {}  {}", green("✔"), cli.server, dim(&message));
    }
    Ok(())
}

/// Map CLI args to `WorkflowConfig`.
fn build_config(cli: &Cli, args: &ConvertArgs, callback: Option<CallbackRef>) -> Result<WorkflowConfig> {
    let mut builder = WorkflowConfig::builder()
        .server_url(cli.server.clone())
        .request_timeout_secs(cli.timeout)
        .tick_interval_ms(args.tick_ms)
        .output_dir(args.output_dir.clone());

    if let Some(cb) = callback {
        builder = builder.callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// Collect quiz text from `--text`, `--text-file` or `--stdin`.
async fn read_text(args: &ConvertArgs) -> Result<Option<String>> {
    if let Some(ref text) = args.text {
        return Ok(Some(text.clone()));
    }
    if let Some(ref path) = args.text_file {
        let text = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read quiz text from {:?}", path))?;
        return Ok(Some(text));
    }
    if args.stdin {
        let mut text = String::new();
        io::stdin()
            .read_to_string(&mut text)
            .context("Failed to read quiz text from stdin")?;
        return Ok(Some(text));
    }
    Ok(None)
}

/// Ask a yes/no question on the terminal. Anything but y/yes is "no".
fn confirm(question: &str) -> Result<bool> {
    if !io::stdin().is_terminal() {
        warn!("stdin is not a terminal; pass --yes to export non-interactively");
        return Ok(false);
    }
    eprint!("{question} [y/N] ");
    io::stderr().flush().ok();

    let mut answer = String::new();
    io::stdin()
        .lock()
        .read_line(&mut answer)
        .context("Failed to read answer")?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}
