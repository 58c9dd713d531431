//! CLI binary for edgequake-text2diagram.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `DiagramConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_text2diagram::pipeline::input::{default_batch_dir, single_output_stem};
use edgequake_text2diagram::{
    convert, convert_batch, read_input, DiagramConfig, DiagramProgressCallback, InputDocument,
    ProgressCallback, DEFAULT_MODEL,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
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

/// Terminal progress callback: a spinner while a request is in flight, a
/// bar once the batch size is known, and one log line per workflow.
struct CliProgressCallback {
    bar: ProgressBar,
    /// Start of the workflow currently in flight.
    started: Mutex<Option<Instant>>,
}

impl CliProgressCallback {
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0); // length set in on_batch_start

        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Generating");
        bar.set_message("waiting for the image model…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            started: Mutex::new(None),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} diagrams  \
             ⏱ {elapsed_precise}  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Generating");
        self.bar.reset_eta();
    }

    fn elapsed_secs(&self) -> f64 {
        self.started
            .lock()
            .ok()
            .and_then(|mut s| s.take())
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }

    /// Clear the bar if the run ended without `on_batch_complete`.
    fn finish(&self) {
        if !self.bar.is_finished() {
            self.bar.finish_and_clear();
        }
    }
}

impl DiagramProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, total: usize) {
        self.activate_bar(total);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Found {total} workflows"))
        ));
    }

    fn on_workflow_start(&self, _index: usize, _total: usize, title: &str) {
        if let Ok(mut s) = self.started.lock() {
            *s = Some(Instant::now());
        }
        self.bar.set_message(title.to_string());
    }

    fn on_rate_limited(&self, attempt: u32, max_attempts: u32, wait: Duration) {
        self.bar.println(format!(
            "    {} rate limited (attempt {}/{}), retrying in {}s",
            yellow("⏸"),
            attempt,
            max_attempts,
            wait.as_secs()
        ));
    }

    fn on_workflow_complete(&self, index: usize, total: usize, path: &Path) {
        let elapsed = self.elapsed_secs();
        self.bar.println(format!(
            "  {} {:>3}/{:<3}  {}  {}",
            green("✓"),
            index,
            total,
            path.display(),
            dim(&format!("{elapsed:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_workflow_error(&self, index: usize, total: usize, title: &str, error: &str) {
        let elapsed = self.elapsed_secs();

        let msg = if error.chars().count() > 80 {
            let cut: String = error.chars().take(79).collect();
            format!("{cut}\u{2026}")
        } else {
            error.to_string()
        };

        self.bar.println(format!(
            "  {} {:>3}/{:<3}  {}  {}  {}",
            red("✗"),
            index,
            total,
            title,
            red(&msg),
            dim(&format!("{elapsed:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_cooldown(&self, wait: Duration) {
        self.bar
            .set_message(format!("pausing {}s between requests", wait.as_secs()));
    }

    fn on_batch_complete(&self, total: usize, succeeded: usize) {
        let failed = total.saturating_sub(succeeded);
        self.bar.finish_and_clear();

        if failed == 0 {
            eprintln!(
                "{} {} diagrams generated successfully",
                green("✔"),
                bold(&succeeded.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} diagrams generated  ({} failed)",
                if failed == total { red("✘") } else { cyan("⚠") },
                bold(&succeeded.to_string()),
                total,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # One diagram for the whole document -> howto_diagram.png
  text2diagram howto.md

  # One diagram per "How to ..." section -> handbook_diagrams/01_<slug>.png, ...
  text2diagram --auto handbook.md

  # Batch mode into a chosen directory
  text2diagram -a handbook.md out/

  # Try it on the bundled sample document
  text2diagram --auto

  # Free-tier model, longer pause between batch requests
  text2diagram --model gemini-2.5-flash-image --delay 30 -a handbook.md

  # JSON result for scripting
  text2diagram --json -a handbook.md > result.json

WORKFLOW HEADINGS (batch mode):
  Any Markdown heading (# to ######) whose text starts with "How to",
  optionally wrapped in ** or __. A section ends at the next such heading,
  a horizontal rule (---, ***, ___) or the end of the document.

ENVIRONMENT VARIABLES:
  GOOGLE_API_KEY          Google Gemini API key
  GEMINI_API_KEY          Fallback when GOOGLE_API_KEY is unset
  TEXT2DIAGRAM_MODEL      Override the image model
  RUST_LOG                Override the log filter (e.g. edgequake_text2diagram=debug)

  A .env file in the working directory is loaded before anything else.
"#;

/// Convert how-to documentation into flowchart images.
#[derive(Parser, Debug)]
#[command(
    name = "text2diagram",
    version,
    about = "Convert how-to documentation into flowchart images",
    long_about = "Convert textual how-to documentation into flowchart diagrams using a Gemini \
image model. Renders the whole document as one diagram, or with --auto splits it into \
\"How to ...\" workflows and renders one diagram per workflow.",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Input text file. Defaults to the bundled sample document.
    input: Option<PathBuf>,

    /// Batch output directory (with --auto). Default: <input-stem>_diagrams.
    output_dir: Option<PathBuf>,

    /// Extract "How to" workflows and generate one diagram per workflow.
    #[arg(short, long)]
    auto: bool,

    /// Image model ID (e.g. gemini-3-pro-image-preview, gemini-2.5-flash-image).
    #[arg(long, env = "TEXT2DIAGRAM_MODEL", default_value = DEFAULT_MODEL)]
    model: String,

    /// Total attempts per diagram when rate-limited.
    #[arg(long, env = "TEXT2DIAGRAM_MAX_ATTEMPTS", default_value_t = 3,
          value_parser = clap::value_parser!(u32).range(1..))]
    max_attempts: u32,

    /// Seconds to pause between batch requests.
    #[arg(long, env = "TEXT2DIAGRAM_DELAY", default_value_t = 10)]
    delay: u64,

    /// Per-request timeout in seconds.
    #[arg(long, env = "TEXT2DIAGRAM_API_TIMEOUT", default_value_t = 300)]
    api_timeout: u64,

    /// Print the result as JSON.
    #[arg(long)]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "TEXT2DIAGRAM_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long)]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long)]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // .env first so clap's `env =` attributes can see its values.
    dotenv::dotenv().ok();

    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
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

    // ── Resolve input ────────────────────────────────────────────────────
    let doc = match cli.input {
        Some(ref path) => read_input(path)
            .await
            .with_context(|| format!("Failed to read input {}", path.display()))?,
        None => {
            if !cli.quiet {
                eprintln!("{}", dim("No input given, using the bundled sample document"));
            }
            InputDocument::sample()
        }
    };

    // ── Build config ─────────────────────────────────────────────────────
    let progress = show_progress.then(CliProgressCallback::new_dynamic);
    let config = build_config(
        &cli,
        progress
            .clone()
            .map(|cb| cb as Arc<dyn DiagramProgressCallback>),
    )?;

    // ── Run ──────────────────────────────────────────────────────────────
    if cli.auto {
        let result = run_batch(&cli, &doc, &config).await;
        if let Some(ref cb) = progress {
            cb.finish();
        }
        result?;
    } else {
        let result = convert(&doc.text, single_output_stem(&doc.stem), &config).await;
        if let Some(ref cb) = progress {
            cb.finish();
        }
        let output = result.context("Diagram generation failed")?;

        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&output).context("Failed to serialise output")?
            );
        } else if !cli.quiet {
            match (output.path(), &output.error) {
                (Some(path), _) => eprintln!(
                    "{}  {}  {}",
                    green("✔"),
                    bold(&path.display().to_string()),
                    dim(&format!("{}ms", output.duration_ms)),
                ),
                (None, Some(e)) => eprintln!("{}  {}", red("✘"), e),
                (None, None) => eprintln!("{}  no diagram generated", red("✘")),
            }
        }
    }

    Ok(())
}

async fn run_batch(cli: &Cli, doc: &InputDocument, config: &DiagramConfig) -> Result<()> {
    let output_dir = cli
        .output_dir
        .clone()
        .unwrap_or_else(|| default_batch_dir(&doc.stem));

    let output = convert_batch(&doc.text, &output_dir, config)
        .await
        .context("Batch generation failed")?;

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&output).context("Failed to serialise output")?
        );
        return Ok(());
    }
    if cli.quiet {
        return Ok(());
    }

    if output.is_empty() {
        eprintln!("{}  no \"How to\" workflows found", cyan("⚠"));
        return Ok(());
    }

    // The progress callback already printed per-workflow lines and the tally.
    if config.progress_callback.is_none() {
        eprintln!(
            "Generated {}/{} diagrams in {}ms",
            output.stats.succeeded, output.stats.total, output.stats.total_duration_ms
        );
    }
    eprintln!("   {}", dim(&format!("→ {}", output.output_dir.display())));
    let failed = output.failed_titles();
    if !failed.is_empty() {
        eprintln!("   {}", red("Failed:"));
        for title in failed {
            eprintln!("     - {title}");
        }
    }

    Ok(())
}

/// Map CLI args to `DiagramConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<DiagramConfig> {
    let mut builder = DiagramConfig::builder()
        .model(cli.model.clone())
        .max_attempts(cli.max_attempts)
        .inter_request_delay(Duration::from_secs(cli.delay))
        .api_timeout_secs(cli.api_timeout);

    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
