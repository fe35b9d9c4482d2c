//! CLI binary for edgequake-pdflayout.
//!
//! A thin shim over the library crate: maps flags and environment variables
//! onto `ServiceConfig`, then either runs the HTTP service or one workflow.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use edgequake_pdflayout::{
    normalize_file, parse_remote, serve, sibling_path, translate_document, write_layout,
    AppState, BatchOptions, ParseOutcome, ParserClient, ProgressCallback, ServiceConfig,
    SubmitOptions, TranslationProgressCallback, Translator,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
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
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Progress bar over the blocks of a layout; failed blocks are logged above
/// the bar.
struct CliProgressCallback {
    bar: ProgressBar,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>4}/{len} blocks  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("Translating");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            errors: AtomicUsize::new(0),
        })
    }
}

impl TranslationProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, total: usize) {
        self.bar.set_length(total as u64);
        self.bar.reset_eta();
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Translating {total} blocks…"))
        ));
    }

    fn on_block_complete(&self, _index: usize, _total: usize, _translated_len: usize) {
        self.bar.inc(1);
    }

    fn on_block_skipped(&self, _index: usize, _total: usize) {
        self.bar.inc(1);
    }

    fn on_block_error(&self, index: usize, total: usize, error: &str) {
        self.errors.fetch_add(1, Ordering::SeqCst);
        let msg: String = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };
        self.bar.println(format!(
            "  {} Block {:>4}/{:<4}  {}",
            red("✗"),
            index + 1,
            total,
            red(&msg)
        ));
        self.bar.inc(1);
    }

    fn on_batch_complete(&self, total: usize, translated: usize, failed: usize) {
        self.bar.finish_and_clear();
        let errors = self.errors.load(Ordering::SeqCst);
        if failed == 0 {
            eprintln!(
                "{} {}/{} blocks translated",
                green("✔"),
                bold(&translated.to_string()),
                total
            );
        } else {
            eprintln!(
                "{} {}/{} blocks translated  ({} failed)",
                if errors == total { red("✘") } else { cyan("⚠") },
                bold(&translated.to_string()),
                total,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Run the HTTP service
  pdflayout serve --bind 0.0.0.0:5000

  # Normalize a parser result into the canonical layout
  pdflayout normalize data/mineru/abc123/layout.json

  # Translate every block into English
  pdflayout translate data/mineru/abc123/layout.json --target-lang en

  # Submit a PDF by URL and wait for the layout
  pdflayout parse https://arxiv.org/pdf/1706.03762

  # Submit only; poll later through the service
  pdflayout parse --no-wait https://arxiv.org/pdf/1706.03762

ENVIRONMENT VARIABLES:
  MINERU_TOKEN            Token for the document-parsing service
  MINERU_BASE_URL         Parsing service base URL (default https://mineru.net/api/v4)
  MINERU_MODEL_VERSION    Parsing model version (default vlm)
  MINERU_MAX_WAIT         Seconds to wait for a parsing job (default 600)
  MINERU_POLL_INTERVAL    Seconds between status polls (default 5)
  QWEN_API_KEY            Primary LLM key (DashScope compatible mode)
  QWEN_BASE_URL           Primary LLM base URL
  QWEN_MODEL              Primary LLM model (default qwen-turbo)
  OPENAI_API_KEY          Fallback LLM key, used when QWEN_API_KEY is unset
  OPENAI_BASE_URL         Fallback LLM base URL
  DEFAULT_MODEL           Fallback LLM model
  PDFLAYOUT_UPLOAD_DIR    Upload directory (default data/files)
  PDFLAYOUT_OUTPUT_DIR    Result directory (default data/mineru)
  PDFLAYOUT_BIND          Listen address for `serve` (default 127.0.0.1:5000)
  PDFLAYOUT_TARGET_LANG   Default target language (default zh)

  A `.env` file in the working directory is loaded first.
"#;

/// Parse PDFs into layout blocks and translate them.
#[derive(Parser, Debug)]
#[command(
    name = "pdflayout",
    version,
    about = "Parse PDFs into positioned layout blocks and translate them",
    long_about = "Drives a remote document-parsing service, normalizes its result JSON \
into a canonical list of {page, bbox, text, type} blocks and optionally translates every \
block through an OpenAI-compatible LLM endpoint. Runs as an HTTP service or one-shot.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[command(flatten)]
    service: ServiceArgs,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "PDFLAYOUT_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "PDFLAYOUT_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP service.
    Serve {
        /// Listen address.
        #[arg(long, env = "PDFLAYOUT_BIND", default_value = "127.0.0.1:5000")]
        bind: SocketAddr,
    },

    /// Normalize a parser result JSON into `<name>_layout.json`.
    Normalize {
        /// Result JSON file.
        input: PathBuf,

        /// Write the layout here instead.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Normalize and translate every block into `<name>_<lang>.json`.
    Translate {
        /// Result or layout JSON file.
        input: PathBuf,

        /// Target language code (zh, en, ja, ko, …). Default: --default-target-lang.
        #[arg(long)]
        target_lang: Option<String>,

        /// LLM model override.
        #[arg(long)]
        model: Option<String>,

        /// Translate blocks that already carry a translation.
        #[arg(long)]
        force: bool,

        /// Write the translated layout here instead.
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Disable progress bar.
        #[arg(long)]
        no_progress: bool,
    },

    /// Submit a PDF URL to the parsing service.
    Parse {
        /// Publicly reachable PDF URL.
        file_url: String,

        /// Parsing model version override.
        #[arg(long)]
        model_version: Option<String>,

        /// Return the task id without waiting.
        #[arg(long)]
        no_wait: bool,
    },
}

/// Settings shared by every subcommand.
#[derive(Args, Debug)]
struct ServiceArgs {
    /// Parsing service token.
    #[arg(long, global = true, env = "MINERU_TOKEN", hide_env_values = true)]
    mineru_token: Option<String>,

    /// Parsing service base URL.
    #[arg(long, global = true, env = "MINERU_BASE_URL")]
    mineru_base_url: Option<String>,

    /// Default parsing model version.
    #[arg(long, global = true, env = "MINERU_MODEL_VERSION")]
    mineru_model_version: Option<String>,

    /// Seconds to wait for a parsing job.
    #[arg(long, global = true, env = "MINERU_MAX_WAIT")]
    max_wait: Option<u64>,

    /// Seconds between status polls.
    #[arg(long, global = true, env = "MINERU_POLL_INTERVAL")]
    poll_interval: Option<u64>,

    /// Primary LLM key.
    #[arg(long, global = true, env = "QWEN_API_KEY", hide_env_values = true)]
    qwen_api_key: Option<String>,

    /// Primary LLM base URL.
    #[arg(long, global = true, env = "QWEN_BASE_URL")]
    qwen_base_url: Option<String>,

    /// Primary LLM model.
    #[arg(long, global = true, env = "QWEN_MODEL")]
    qwen_model: Option<String>,

    /// Fallback LLM key.
    #[arg(long, global = true, env = "OPENAI_API_KEY", hide_env_values = true)]
    openai_api_key: Option<String>,

    /// Fallback LLM base URL.
    #[arg(long, global = true, env = "OPENAI_BASE_URL")]
    openai_base_url: Option<String>,

    /// Fallback LLM model.
    #[arg(long, global = true, env = "DEFAULT_MODEL")]
    default_model: Option<String>,

    /// Upload directory.
    #[arg(long, global = true, env = "PDFLAYOUT_UPLOAD_DIR")]
    upload_dir: Option<PathBuf>,

    /// Result directory.
    #[arg(long, global = true, env = "PDFLAYOUT_OUTPUT_DIR")]
    output_dir: Option<PathBuf>,

    /// Target language when a request names none.
    #[arg(long, global = true, env = "PDFLAYOUT_TARGET_LANG")]
    default_target_lang: Option<String>,

    /// Per-call LLM timeout in seconds.
    #[arg(long, global = true, env = "PDFLAYOUT_API_TIMEOUT")]
    api_timeout: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO logs while translating.
    let show_progress = !cli.quiet
        && matches!(&cli.command, Command::Translate { no_progress, .. } if !no_progress);
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

    let config = build_config(&cli.service)?;

    match cli.command {
        Command::Serve { bind } => {
            let state = AppState::new(config).context("Failed to initialise service")?;
            serve(state, bind).await.context("Server failed")?;
        }

        Command::Normalize { input, output } => {
            let normalized = normalize_file(&input, output.as_deref())
                .await
                .with_context(|| format!("Failed to normalize {}", input.display()))?;
            if !cli.quiet {
                eprintln!(
                    "{} {} blocks  →  {}",
                    if normalized.layout.is_empty() { cyan("⚠") } else { green("✔") },
                    bold(&normalized.layout.len().to_string()),
                    bold(&normalized.output_path.display().to_string()),
                );
            }
        }

        Command::Translate {
            input,
            target_lang,
            model,
            force,
            output,
            ..
        } => {
            let translator = Translator::from_config(&config);
            if !translator.config().is_configured() && !cli.quiet {
                eprintln!(
                    "{} {}",
                    cyan("⚠"),
                    dim("No QWEN_API_KEY or OPENAI_API_KEY set; text is copied unchanged")
                );
            }

            let mut options =
                BatchOptions::new(target_lang.unwrap_or_else(|| config.default_target_lang.clone()));
            options.model = model;
            options.force_retranslate = force;
            if show_progress {
                options.progress_callback =
                    Some(CliProgressCallback::new() as ProgressCallback);
            }

            let document = translate_document(&translator, &input, output.as_deref(), &options)
                .await
                .with_context(|| format!("Failed to translate {}", input.display()))?;

            if !cli.quiet {
                let summary = &document.summary;
                eprintln!(
                    "   {} translated  {} skipped  {} failed  →  {}",
                    summary.translated_count,
                    summary.skipped_count,
                    summary.failed_count,
                    bold(&document.output_path.display().to_string()),
                );
                if let Some(err) = &summary.first_error {
                    eprintln!("   {} {}", dim("first error:"), red(err));
                }
            }
        }

        Command::Parse {
            file_url,
            model_version,
            no_wait,
        } => {
            let client = ParserClient::new(config.parser.clone())
                .context("Failed to create parser client")?;
            let outcome = parse_remote(
                &client,
                &file_url,
                model_version.as_deref(),
                &SubmitOptions::default(),
                !no_wait,
                &config.output_dir,
            )
            .await
            .context("Parsing failed")?;

            match outcome {
                ParseOutcome::Submitted { task_id } => {
                    println!("{task_id}");
                    if !cli.quiet {
                        eprintln!("{} submitted task {}", green("✔"), bold(&task_id));
                    }
                }
                ParseOutcome::Completed { task_id, result } => {
                    let layout_path = sibling_path(&result.archive.result_json_path, "_layout");
                    write_layout(&layout_path, &result.layout)
                        .await
                        .context("Failed to write layout")?;
                    println!("{}", layout_path.display());
                    if !cli.quiet {
                        eprintln!(
                            "{} task {}  {} blocks  →  {}",
                            green("✔"),
                            bold(&task_id),
                            result.layout.len(),
                            dim(&result.archive.extract_dir.display().to_string()),
                        );
                    }
                }
            }
        }
    }

    Ok(())
}

/// Map CLI args onto `ServiceConfig`; unset values keep the defaults.
fn build_config(args: &ServiceArgs) -> Result<ServiceConfig> {
    let mut builder = ServiceConfig::builder();

    if let Some(ref token) = args.mineru_token {
        builder = builder.parser_token(token);
    }
    if let Some(ref url) = args.mineru_base_url {
        builder = builder.parser_base_url(url);
    }
    if let Some(ref version) = args.mineru_model_version {
        builder = builder.model_version(version);
    }
    if let Some(secs) = args.max_wait {
        builder = builder.max_wait(Duration::from_secs(secs));
    }
    if let Some(secs) = args.poll_interval {
        builder = builder.poll_interval(Duration::from_secs(secs));
    }
    if let Some(ref key) = args.qwen_api_key {
        builder = builder.primary_api_key(key);
    }
    if let Some(ref url) = args.qwen_base_url {
        builder = builder.primary_base_url(url);
    }
    if let Some(ref model) = args.qwen_model {
        builder = builder.primary_model(model);
    }
    if let Some(ref key) = args.openai_api_key {
        builder = builder.fallback_api_key(key);
    }
    if let Some(ref url) = args.openai_base_url {
        builder = builder.fallback_base_url(url);
    }
    if let Some(ref model) = args.default_model {
        builder = builder.fallback_model(model);
    }
    if let Some(ref dir) = args.upload_dir {
        builder = builder.upload_dir(dir);
    }
    if let Some(ref dir) = args.output_dir {
        builder = builder.output_dir(dir);
    }
    if let Some(secs) = args.api_timeout {
        builder = builder.api_timeout_secs(secs);
    }
    if let Some(lang) = args.default_target_lang.as_deref().map(str::trim) {
        if !lang.is_empty() {
            builder = builder.default_target_lang(lang);
        }
    }

    builder.build().context("Invalid configuration")
}
