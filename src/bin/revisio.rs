//! CLI binary for revisio.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `SheetConfig` and prints the generated sheet.

use anyhow::{Context, Result};
use clap::{ArgGroup, Parser};
use indicatif::{ProgressBar, ProgressStyle};
use revisio::{
    load_images, messages, write_sheet, FailurePolicy, Language, Notification, Orchestrator,
    ProgressCallback, RevisioError, SheetConfig, SheetForm, SheetProgressCallback, Stage,
};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
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

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a spinner showing the current step, with one
/// log line per finished stage.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  ⏱ {elapsed}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        bar.set_style(style);
        bar.set_prefix("Preparing");
        bar.set_message("Reading input…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self { bar })
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl SheetProgressCallback for CliProgressCallback {
    fn on_stage_start(&self, stage: Stage) {
        let prefix = match stage {
            Stage::Extraction => "Step 1/2",
            Stage::Supplementation => "Step 2/2",
        };
        self.bar.set_prefix(prefix);
    }

    fn on_stage_complete(&self, stage: Stage, items: usize) {
        let detail = match stage {
            Stage::Extraction => format!("{items} points"),
            Stage::Supplementation => format!("{items} bytes"),
        };
        self.bar
            .println(format!("  {} {:<16} {}", green("✓"), stage.to_string(), dim(&detail)));
    }

    fn on_stage_error(&self, stage: Stage, error: String) {
        // Truncate very long error messages to keep output tidy.
        let msg = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error
        };
        self.bar
            .println(format!("  {} {:<16} {}", red("✗"), stage.to_string(), red(&msg)));
    }

    fn on_notification(&self, notification: &Notification) {
        if !notification.is_failure() {
            self.bar.set_message(notification.title.clone());
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Sheet from a text snippet (stdout)
  revisio --topic "Plant biology" --language en \
    --text "Photosynthesis converts light into chemical energy."

  # Sheet from a notes file, written to disk
  revisio --topic "Cell cycle" --text-file notes.txt -o cell-cycle.md

  # Sheet from photographed pages, in German
  revisio --topic "Zellbiologie" --language de --image p1.jpg --image p2.jpg

  # Images from URLs, exported as Revisio_<topic>.md
  revisio --topic "Optics" --image https://example.com/lens.png --export

  # Keep placeholder content instead of failing when a stage fails
  revisio --topic "Optics" --text-file notes.txt --tolerant

  # JSON output (sheet + stats)
  revisio --topic "Optics" --text-file notes.txt --json > sheet.json

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID
  REVISIO_*               Every flag below also reads REVISIO_<FLAG>

The model must accept image input when --image is used.
"#;

/// Turn notes and photographed pages into revision sheets using LLMs.
#[derive(Parser, Debug)]
#[command(
    name = "revisio",
    version,
    about = "Turn notes and photographed pages into revision sheets using LLMs",
    long_about = "Extract the key points of a text or of photographed notes with an LLM, then \
expand them into a structured Markdown revision sheet in English, German or French. Supports \
OpenAI, Anthropic, Google Gemini, Azure OpenAI, and any OpenAI-compatible endpoint.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP,
    group(ArgGroup::new("content").required(true).args(["text", "text_file", "image"]))
)]
struct Cli {
    /// Topic of the sheet (at least 3 characters).
    #[arg(short, long, env = "REVISIO_TOPIC")]
    topic: String,

    /// Language of the sheet.
    #[arg(short, long, env = "REVISIO_LANGUAGE", value_enum, default_value = "fr")]
    language: LanguageArg,

    /// Text to revise.
    #[arg(long, env = "REVISIO_TEXT", conflicts_with_all = ["text_file", "image"])]
    text: Option<String>,

    /// File containing the text to revise.
    #[arg(long, env = "REVISIO_TEXT_FILE", conflicts_with = "image")]
    text_file: Option<PathBuf>,

    /// Image path or HTTP/HTTPS URL; repeat for several pages, in order.
    #[arg(short, long, env = "REVISIO_IMAGE", value_delimiter = ',')]
    image: Vec<String>,

    /// Write the Markdown sheet to this file instead of stdout.
    #[arg(short, long, env = "REVISIO_OUTPUT", conflicts_with = "export")]
    output: Option<PathBuf>,

    /// Write the sheet to `Revisio_<topic>.md` in the current directory.
    #[arg(long, env = "REVISIO_EXPORT")]
    export: bool,

    /// LLM model ID (e.g. gpt-4.1-mini, gpt-4.1, claude-sonnet-4-20250514).
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(
        long,
        env = "EDGEQUAKE_PROVIDER",
        long_help = "LLM provider. Auto-detected from API key env vars if not set.\n\
          Supported: openai, anthropic, gemini, azure, ollama, or any OpenAI-compatible URL."
    )]
    provider: Option<String>,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "REVISIO_TEMPERATURE", default_value_t = 0.2)]
    temperature: f32,

    /// Max LLM output tokens for the point list.
    #[arg(long, env = "REVISIO_EXTRACTION_MAX_TOKENS", default_value_t = 4096)]
    extraction_max_tokens: usize,

    /// Max LLM output tokens for the expanded sheet.
    #[arg(long, env = "REVISIO_SUPPLEMENTATION_MAX_TOKENS", default_value_t = 8192)]
    supplementation_max_tokens: usize,

    /// Path to a text file replacing the extraction instructions.
    #[arg(long, env = "REVISIO_EXTRACTION_PROMPT")]
    extraction_prompt: Option<PathBuf>,

    /// Path to a text file replacing the supplementation instructions.
    #[arg(long, env = "REVISIO_SUPPLEMENTATION_PROMPT")]
    supplementation_prompt: Option<PathBuf>,

    /// Show placeholder content instead of failing when a stage fails.
    #[arg(long, env = "REVISIO_TOLERANT")]
    tolerant: bool,

    /// Output structured JSON (sheet + stats) instead of Markdown.
    #[arg(long, env = "REVISIO_JSON")]
    json: bool,

    /// Disable the progress spinner.
    #[arg(long, env = "REVISIO_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "REVISIO_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "REVISIO_QUIET")]
    quiet: bool,

    /// HTTP download timeout for image URLs, in seconds.
    #[arg(long, env = "REVISIO_DOWNLOAD_TIMEOUT", default_value_t = 60)]
    download_timeout: u64,

    /// Per-call LLM timeout in seconds.
    #[arg(long, env = "REVISIO_API_TIMEOUT", default_value_t = 120)]
    api_timeout: u64,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum LanguageArg {
    En,
    De,
    Fr,
}

impl From<LanguageArg> for Language {
    fn from(v: LanguageArg) -> Self {
        match v {
            LanguageArg::En => Language::En,
            LanguageArg::De => Language::De,
            LanguageArg::Fr => Language::Fr,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs when the spinner is active; it
    // provides all the feedback that matters to the user.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
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

    // ── Build config ─────────────────────────────────────────────────────
    let progress = show_progress.then(CliProgressCallback::new);
    let config = build_config(
        &cli,
        progress
            .clone()
            .map(|cb| cb as Arc<dyn SheetProgressCallback>),
    )
    .await?;

    // ── Build form ───────────────────────────────────────────────────────
    let form = build_form(&cli, &config).await?;
    // Form errors are reported before the provider is set up.
    if let Some(notification) = form_rejection(&form) {
        if let Some(ref cb) = progress {
            cb.finish();
        }
        exit_with(&notification);
    }
    let orchestrator = Orchestrator::from_config(config).context("Failed to set up the LLM provider")?;

    // ── Run submission ───────────────────────────────────────────────────
    let outcome = orchestrator.submit(&form).await;
    if let Some(ref cb) = progress {
        cb.finish();
    }

    let generated = match outcome {
        Ok(generated) => generated,
        Err(notification) => exit_with(&notification),
    };

    let output_path = if cli.export {
        Some(PathBuf::from(generated.sheet.export_file_name()))
    } else {
        cli.output.clone()
    };

    if cli.json {
        let json =
            serde_json::to_string_pretty(&generated).context("Failed to serialise output")?;
        println!("{json}");
    } else if let Some(ref path) = output_path {
        write_sheet(&generated.sheet, path)
            .await
            .context("Failed to write revision sheet")?;
    } else {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        handle
            .write_all(generated.sheet.to_markdown().as_bytes())
            .context("Failed to write to stdout")?;
    }

    // ── Summary ──────────────────────────────────────────────────────────
    if !cli.quiet && !cli.json {
        let stats = &generated.stats;
        let target = output_path
            .as_ref()
            .map(|p| format!("  →  {}", bold(&p.display().to_string())))
            .unwrap_or_default();
        eprintln!(
            "{}  {} points  {}ms{}",
            green("✔"),
            generated.sheet.extracted_points.len(),
            stats.total_ms,
            target,
        );
        eprintln!(
            "   {} tokens in  /  {} tokens out",
            dim(&stats.input_tokens.to_string()),
            dim(&stats.output_tokens.to_string()),
        );
    }

    Ok(())
}

/// Map CLI args to `SheetConfig`.
async fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<SheetConfig> {
    let mut builder = SheetConfig::builder()
        .temperature(cli.temperature)
        .extraction_max_tokens(cli.extraction_max_tokens)
        .supplementation_max_tokens(cli.supplementation_max_tokens)
        .download_timeout_secs(cli.download_timeout)
        .api_timeout_secs(cli.api_timeout)
        .failure_policy(if cli.tolerant {
            FailurePolicy::Tolerant
        } else {
            FailurePolicy::Strict
        });

    if let Some(ref model) = cli.model {
        builder = builder.model(model);
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider);
    }
    if let Some(ref path) = cli.extraction_prompt {
        builder = builder.extraction_prompt(read_prompt(path).await?);
    }
    if let Some(ref path) = cli.supplementation_prompt {
        builder = builder.supplementation_prompt(read_prompt(path).await?);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

async fn read_prompt(path: &Path) -> Result<String> {
    tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read prompt from {:?}", path))
}

/// Map the content flags to a `SheetForm`, loading images concurrently.
/// The failure notification for a form that cannot be submitted, in the
/// form's language.
fn form_rejection(form: &SheetForm) -> Option<Notification> {
    match form.extraction_request() {
        Ok(_) => None,
        Err(RevisioError::Validation(reason)) => Some(Notification::failure(
            messages::generation_failed_title(form.language),
            reason,
        )),
        Err(e) => Some(Notification::failure(
            messages::generation_failed_title(form.language),
            e.to_string(),
        )),
    }
}

fn exit_with(notification: &Notification) -> ! {
    eprintln!("{} {}", red("✘"), bold(&notification.title));
    eprintln!("  {}", notification.description);
    std::process::exit(1);
}

async fn build_form(cli: &Cli, config: &SheetConfig) -> Result<SheetForm> {
    let language = cli.language.into();

    if !cli.image.is_empty() {
        let images = load_images(cli.image.as_slice(), config)
            .await
            .context("Failed to load images")?;
        return Ok(SheetForm::images(&cli.topic, images, language));
    }

    let text = match (&cli.text, &cli.text_file) {
        (Some(text), _) => text.clone(),
        (None, Some(path)) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read text from {:?}", path))?,
        (None, None) => String::new(),
    };
    Ok(SheetForm::text(&cli.topic, text, language))
}
