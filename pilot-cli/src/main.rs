//! Pilot CLI
//!
//! Runs one automation session against a screenshot on disk and prints the
//! decided steps as JSON. Useful for checking what the oracle would do on a
//! given screen without a device attached.
//!
//! Usage:
//!   pilot --task "open settings" --screenshot screen.png --tree tree.json
//!   LOG_LEVEL=debug pilot --task "..." --screenshot screen.png --no-markers

use anyhow::{bail, Context, Result};
use clap::Parser;
use pilot::{
    CoordinatePolicy, FixtureSurface, GeminiConfig, GeminiOracle, Pilot, PilotConfig,
    SessionState,
};
use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "pilot")]
#[command(about = "Drive a UI towards a task, one oracle-chosen action at a time")]
struct Args {
    /// Natural-language goal, e.g. "open settings"
    #[clap(long, short = 't')]
    task: String,

    /// PNG or JPEG screenshot used as the screen
    #[clap(long, short = 's')]
    screenshot: PathBuf,

    /// JSON element tree for the screenshot
    #[clap(long)]
    tree: Option<PathBuf>,

    /// JSON file with a full or partial PilotConfig; flags below override it
    #[clap(long)]
    config: Option<PathBuf>,

    /// Gemini model name
    #[clap(long, env = "GEMINI_MODEL")]
    model: Option<String>,

    #[clap(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    api_key: String,

    /// Delay after every dispatched action, in milliseconds
    #[clap(long)]
    settle_ms: Option<u64>,

    /// Give up on an oracle call after this many milliseconds
    #[clap(long)]
    oracle_timeout_ms: Option<u64>,

    /// Extra attempts when the oracle is unreachable
    #[clap(long)]
    oracle_retries: Option<u32>,

    /// Fail the session after this many cycles
    #[clap(long)]
    max_cycles: Option<u32>,

    /// Clamp oracle coordinates into the screenshot
    #[clap(long)]
    clamp: bool,

    /// Skip visual markers and their lead delays
    #[clap(long)]
    no_markers: bool,
}

impl Args {
    fn pilot_config(&self) -> Result<PilotConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let raw = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config {}", path.display()))?;
                serde_json::from_str(&raw)
                    .with_context(|| format!("Invalid config {}", path.display()))?
            }
            None => PilotConfig::default(),
        };
        if let Some(settle_ms) = self.settle_ms {
            config.agent.settle_delay_ms = settle_ms;
        }
        if let Some(timeout_ms) = self.oracle_timeout_ms {
            config.oracle.timeout_ms = Some(timeout_ms);
        }
        if let Some(retries) = self.oracle_retries {
            config.oracle.max_retries = retries;
        }
        if let Some(max_cycles) = self.max_cycles {
            config.agent.max_cycles = Some(max_cycles);
        }
        if self.clamp {
            config.agent.coordinate_policy = CoordinatePolicy::ClampToScreen;
        }
        if self.no_markers {
            config.executor.markers = None;
        }
        Ok(config)
    }

    fn gemini_config(&self) -> Result<GeminiConfig> {
        if self.api_key.trim().is_empty() {
            bail!("Gemini API key is empty");
        }
        let mut config = GeminiConfig::new(self.api_key.clone());
        if let Some(model) = &self.model {
            config.model = model.clone();
        }
        if let Ok(base_url) = env::var("GEMINI_BASE_URL") {
            config.base_url = base_url;
        }
        Ok(config)
    }

    fn surface(&self) -> Result<FixtureSurface> {
        FixtureSurface::from_files(&self.screenshot, self.tree.as_deref())
            .context("Failed to load the screen fixture")
    }
}

fn init_logging() -> Result<()> {
    let log_level = env::var("LOG_LEVEL")
        .map(|level| match level.to_lowercase().as_str() {
            "error" => Level::ERROR,
            "warn" => Level::WARN,
            "info" => Level::INFO,
            "debug" => Level::DEBUG,
            _ => Level::INFO,
        })
        .unwrap_or(Level::INFO);

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging()?;
    let args = Args::parse();

    let config = args.pilot_config()?;
    let surface = Arc::new(args.surface()?);
    let oracle = Arc::new(GeminiOracle::new(args.gemini_config()?));
    let pilot = Pilot::new(surface.clone(), oracle, config);

    let Some(session) = pilot.start(args.task.clone()) else {
        bail!("Could not start a session");
    };

    let stopper = session.clone();
    let final_state = tokio::select! {
        state = session.wait() => state,
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted, stopping session");
            stopper.stop();
            session.state()
        }
    };

    let report = serde_json::json!({
        "session": session.id(),
        "task": session.task(),
        "state": final_state.to_string(),
        "steps": session.steps(),
    });
    println!("{}", serde_json::to_string_pretty(&report)?);

    match final_state {
        SessionState::Failed(reason) => bail!("Session failed: {reason:?}"),
        _ => Ok(()),
    }
}
