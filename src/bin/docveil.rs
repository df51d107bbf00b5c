//! CLI binary for docveil.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `SummaryConfig`, prints summaries, and runs the upload server.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use docveil::crypto::{decrypt_file_to_memory, encrypt_file};
use docveil::{
    summarize, summarize_input_stream, summarize_to_file, Passphrase, ProgressCallback,
    ProgressEvent, SummaryConfig, SummaryProgressCallback,
};
use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
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
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress: a spinner while pages are summarized in parallel, then
/// a bar that advances once per refined page.
struct CliProgressCallback {
    bar: ProgressBar,
    summarized: AtomicUsize,
    started: Instant,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Reading document…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            summarized: AtomicUsize::new(0),
            started: Instant::now(),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} pages  \
             ⏱ {elapsed_precise}  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Summarizing");
        self.bar.reset_eta();
    }
}

impl SummaryProgressCallback for CliProgressCallback {
    fn on_pipeline_start(&self, total_pages: usize) {
        self.activate_bar(total_pages);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Summarizing {total_pages} pages…"))
        ));
    }

    fn on_page_summarized(&self, _page_num: usize, total_pages: usize) {
        let done = self.summarized.fetch_add(1, Ordering::SeqCst) + 1;
        self.bar
            .set_message(dim(&format!("{done}/{total_pages} drafted")));
        if done == total_pages {
            self.bar.set_prefix("Refining");
        }
    }

    fn on_page_refined(&self, page_num: usize, total_pages: usize, summary_len: usize) {
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {}",
            green("✓"),
            page_num,
            total_pages,
            dim(&format!("{summary_len:>5} chars")),
        ));
        self.bar.inc(1);
    }

    fn on_pipeline_error(&self, _error: &str) {
        // main reports the error itself once the run returns.
        self.bar.finish_and_clear();
    }

    fn on_pipeline_complete(&self, total_pages: usize) {
        self.bar.finish_and_clear();
        eprintln!(
            "{} {} pages summarized  {}",
            green("✔"),
            bold(&total_pages.to_string()),
            dim(&format!("{:.1}s", self.started.elapsed().as_secs_f64())),
        );
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Stream page summaries to stdout
  docveil summarize report.pdf

  # Write the report to a file
  docveil summarize report.pdf -o report_summary.txt

  # Summarize an encrypted upload
  ENCRYPTION_PASSPHRASE=... docveil summarize uploads/3f2a.pdf.enc

  # Encrypt / decrypt a document at rest
  docveil encrypt report.pdf report.pdf.enc
  docveil decrypt report.pdf.enc report.pdf

  # Run the upload + streaming server
  docveil serve --addr 0.0.0.0:8000 --upload-dir uploads

ENVIRONMENT VARIABLES:
  ENCRYPTION_PASSPHRASE   Passphrase for encrypted uploads (required by serve, encrypt, decrypt)
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID

A .env file in the working directory is loaded at startup.
"#;

/// Page-by-page document summaries with encrypted storage.
#[derive(Parser, Debug)]
#[command(
    name = "docveil",
    version,
    about = "Summarize documents page by page, refining each page against the last",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "DOCVEIL_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "DOCVEIL_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Summarize a PDF, encrypted upload, or URL.
    Summarize(SummarizeArgs),
    /// Encrypt a file into a salt ‖ nonce ‖ ciphertext envelope.
    Encrypt { input: PathBuf, output: PathBuf },
    /// Decrypt an envelope back into the original file.
    Decrypt { input: PathBuf, output: PathBuf },
    /// Serve the upload / stream / status / cleanup HTTP API.
    #[cfg(feature = "server")]
    Serve(ServeArgs),
}

#[derive(Args, Debug)]
struct SummarizeArgs {
    /// Local PDF, `.enc` envelope, or HTTP/HTTPS URL.
    input: String,

    /// Write the summary report to this file instead of stdout.
    #[arg(short, long, env = "DOCVEIL_OUTPUT")]
    output: Option<PathBuf>,

    /// Output structured JSON (raw + refined summaries, stats).
    #[arg(long, env = "DOCVEIL_JSON")]
    json: bool,

    /// Also save a timestamped report in this directory.
    #[arg(long, env = "DOCVEIL_OUTPUT_DIR")]
    output_dir: Option<PathBuf>,

    /// Disable progress bar.
    #[arg(long, env = "DOCVEIL_NO_PROGRESS")]
    no_progress: bool,

    #[command(flatten)]
    llm: LlmArgs,
}

#[cfg(feature = "server")]
#[derive(Args, Debug)]
struct ServeArgs {
    /// Address to bind.
    #[arg(long, env = "DOCVEIL_ADDR", default_value = "0.0.0.0:8000")]
    addr: String,

    /// Directory for encrypted uploads.
    #[arg(long, env = "DOCVEIL_UPLOAD_DIR", default_value = "uploads")]
    upload_dir: PathBuf,

    /// Directory for finished summary reports.
    #[arg(long, env = "DOCVEIL_OUTPUT_DIR", default_value = "summaries_output")]
    output_dir: PathBuf,

    /// Largest accepted upload, in MiB.
    #[arg(
        long,
        env = "DOCVEIL_MAX_UPLOAD_MB",
        default_value_t = docveil::server::DEFAULT_MAX_UPLOAD_MB
    )]
    max_upload_mb: usize,

    #[command(flatten)]
    llm: LlmArgs,
}

/// Flags shared by every command that calls the LLM.
#[derive(Args, Debug)]
struct LlmArgs {
    /// LLM model ID (e.g. gpt-4.1-nano, claude-sonnet-4-20250514, llama3.1:8b).
    #[arg(long, env = "DOCVEIL_MODEL")]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(long, env = "DOCVEIL_PROVIDER")]
    provider: Option<String>,

    /// Maximum concurrent page-summary calls (default: one per page).
    #[arg(short, long, env = "DOCVEIL_CONCURRENCY")]
    concurrency: Option<usize>,

    /// Max LLM output tokens per call.
    #[arg(long, env = "DOCVEIL_MAX_TOKENS", default_value_t = 2048)]
    max_tokens: usize,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "DOCVEIL_TEMPERATURE", default_value_t = 0.3)]
    temperature: f32,

    /// Retries per LLM call after the first attempt.
    #[arg(long, env = "DOCVEIL_MAX_RETRIES", default_value_t = 2)]
    max_retries: u32,

    /// Per-call LLM timeout in seconds.
    #[arg(long, env = "DOCVEIL_API_TIMEOUT", default_value_t = 120)]
    api_timeout: u64,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "DOCVEIL_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Text file with a custom refine prompt ({previous} and {current} placeholders).
    #[arg(long, env = "DOCVEIL_REFINE_PROMPT")]
    refine_prompt: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar gives all the feedback that matters during a summary
    // run, so INFO logs are suppressed while it is active.
    let show_progress = match cli.command {
        Command::Summarize(ref args) => !cli.quiet && !args.no_progress && !args.json,
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

    match cli.command {
        Command::Summarize(args) => run_summarize(args, show_progress, cli.quiet).await,
        Command::Encrypt { input, output } => {
            let passphrase = Passphrase::from_env()?;
            encrypt_file(&input, &output, &passphrase)
                .await
                .with_context(|| format!("Failed to encrypt {}", input.display()))?;
            if !cli.quiet {
                eprintln!("{} {}", green("✔"), bold(&output.display().to_string()));
            }
            Ok(())
        }
        Command::Decrypt { input, output } => {
            let passphrase = Passphrase::from_env()?;
            let plaintext = decrypt_file_to_memory(&input, &passphrase)
                .await
                .with_context(|| format!("Failed to decrypt {}", input.display()))?;
            tokio::fs::write(&output, plaintext)
                .await
                .with_context(|| format!("Failed to write {}", output.display()))?;
            if !cli.quiet {
                eprintln!("{} {}", green("✔"), bold(&output.display().to_string()));
            }
            Ok(())
        }
        #[cfg(feature = "server")]
        Command::Serve(args) => run_serve(args).await,
    }
}

async fn run_summarize(args: SummarizeArgs, show_progress: bool, quiet: bool) -> Result<()> {
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn SummaryProgressCallback>)
    } else {
        None
    };
    let mut config = build_config(&args.llm, progress_cb).await?;
    config.output_dir = args.output_dir.clone();

    // ── Report file ──────────────────────────────────────────────────────
    if let Some(ref output_path) = args.output {
        let output = summarize_to_file(&args.input, output_path, &config)
            .await
            .context("Summary failed")?;
        if !quiet {
            eprintln!(
                "{}  {} pages  {}ms  →  {}",
                green("✔"),
                output.stats.total_pages,
                output.stats.total_duration_ms,
                bold(&output_path.display().to_string()),
            );
        }
        return Ok(());
    }

    // ── JSON ─────────────────────────────────────────────────────────────
    if args.json {
        let output = summarize(&args.input, &config)
            .await
            .context("Summary failed")?;
        let json = serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
        println!("{json}");
        return Ok(());
    }

    // ── Stream pages to stdout as they are refined ───────────────────────
    let mut events = summarize_input_stream(&args.input, &config).await;
    let stdout = io::stdout();
    while let Some(event) = events.next().await {
        match event {
            ProgressEvent::Processing { page, summary, .. } => {
                let mut handle = stdout.lock();
                writeln!(handle, "========== PAGE {page} ==========\n\n{summary}\n")
                    .context("Failed to write to stdout")?;
                handle.flush().ok();
            }
            ProgressEvent::Complete {
                total_pages,
                saved_file,
            } => {
                if !quiet && !show_progress {
                    eprintln!("Summarized {total_pages} pages");
                }
                if let Some(path) = saved_file {
                    if !quiet {
                        eprintln!("   saved to {}", bold(&path.display().to_string()));
                    }
                }
            }
            ProgressEvent::Error { message } => bail!("Summary failed: {message}"),
        }
    }
    Ok(())
}

#[cfg(feature = "server")]
async fn run_serve(args: ServeArgs) -> Result<()> {
    use docveil::server::{start_server, ApiState};
    use docveil::JobRegistry;

    // A missing passphrase is a startup error, not a per-request one.
    let passphrase = Passphrase::from_env()?;
    tokio::fs::create_dir_all(&args.upload_dir)
        .await
        .with_context(|| format!("Failed to create {}", args.upload_dir.display()))?;

    let mut config = build_config(&args.llm, None).await?;
    config.output_dir = Some(args.output_dir);

    let registry = JobRegistry::new(args.upload_dir, passphrase);
    tracing::info!("Encrypted uploads go to {}", registry.upload_dir().display());
    let state = ApiState::new(registry, config).with_max_upload_mb(args.max_upload_mb);
    start_server(&args.addr, state)
        .await
        .with_context(|| format!("Server on {} stopped", args.addr))
}

/// Map CLI args to `SummaryConfig`.
async fn build_config(llm: &LlmArgs, progress: Option<ProgressCallback>) -> Result<SummaryConfig> {
    let mut builder = SummaryConfig::builder()
        .max_tokens(llm.max_tokens)
        .temperature(llm.temperature)
        .max_retries(llm.max_retries)
        .api_timeout_secs(llm.api_timeout)
        .download_timeout_secs(llm.download_timeout);

    if let Some(n) = llm.concurrency {
        if n == 0 {
            bail!("--concurrency must be at least 1");
        }
        builder = builder.concurrency(n);
    }
    if let Some(ref model) = llm.model {
        builder = builder.model(model);
    }
    if let Some(ref provider) = llm.provider {
        builder = builder.provider_name(provider);
    }
    if let Some(ref path) = llm.refine_prompt {
        let prompt = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read refine prompt from {:?}", path))?;
        builder = builder.refine_prompt(prompt);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
