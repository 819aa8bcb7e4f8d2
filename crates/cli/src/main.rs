//! `jobwatch`: track one generation job against a live backend and print
//! its outcome.

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use jobwatch_core::{
    ClientConfig, HttpStatusFetcher, JobFamily, JobHandle, JobStatus, ProgressMode, TrackerConfig,
    ENV_API_TOKEN, ENV_API_URL, ENV_REQUEST_TIMEOUT,
};
use jobwatch_tracker::{JobCallbacks, JobTracker, TrackerView};
use serde_json::Value;
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "jobwatch")]
#[command(about = "Poll a generation job until it completes, fails or times out.")]
struct Args {
    /// Job identifier returned by the generation request
    job_id: String,

    /// Base URL of the job status API (e.g. http://localhost:3000/api)
    #[arg(long, env = ENV_API_URL)]
    api_url: String,

    /// Bearer token sent with every status request
    #[arg(long, env = ENV_API_TOKEN, hide_env_values = true)]
    token: Option<String>,

    /// Job family: quiz, flashcard or content
    #[arg(long, default_value = "quiz")]
    family: JobFamily,

    /// Give up after this many seconds (default: 120)
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Per-request HTTP timeout in seconds
    #[arg(long, env = ENV_REQUEST_TIMEOUT, default_value_t = 30)]
    request_timeout_secs: u64,

    /// Show backend-reported progress instead of simulated progress
    #[arg(long)]
    reported_progress: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,
}

enum Outcome {
    Completed(Value),
    Failed(String),
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn,jobwatch=info".into());
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    // A second init (tests, embedding) is harmless.
    let _ = if json {
        builder.json().try_init()
    } else {
        builder.compact().try_init()
    };
}

fn tracker_config(args: &Args) -> TrackerConfig {
    let mut config = TrackerConfig::default();
    if let Some(secs) = args.timeout_secs {
        config = config.with_timeout_budget(Duration::from_secs(secs));
    }
    if args.reported_progress {
        config = config.with_progress_mode(ProgressMode::Reported);
    }
    config
}

/// Log status and whole-percent changes until the tracker goes away.
async fn report_progress(mut views: watch::Receiver<TrackerView>) {
    let mut last: Option<(Option<JobStatus>, u32)> = None;
    while views.changed().await.is_ok() {
        let view = views.borrow_and_update().clone();
        let Some(job_id) = view.job_id else { continue };
        let key = (view.status, view.displayed_percent as u32);
        if last.as_ref() == Some(&key) {
            continue;
        }
        info!(
            job_id = %job_id,
            status = view.status.map(|s| s.as_str()).unwrap_or("pending"),
            percent = key.1,
            message = view.message.as_deref().unwrap_or(""),
            "progress"
        );
        last = Some(key);
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();
    init_tracing(args.log_json);

    let mut client = ClientConfig::new(&args.api_url)
        .with_context(|| format!("invalid --api-url {}", args.api_url))?
        .with_request_timeout(Duration::from_secs(args.request_timeout_secs));
    if let Some(token) = &args.token {
        client = client.with_token(token);
    }
    let fetcher = HttpStatusFetcher::new(client).context("failed to build HTTP client")?;

    let (tx, mut rx) = mpsc::unbounded_channel();
    let completed_tx = tx.clone();
    let callbacks = JobCallbacks::new()
        .on_completed(move |result| {
            let _ = completed_tx.send(Outcome::Completed(result));
        })
        .on_failed(move |message| {
            let _ = tx.send(Outcome::Failed(message));
        });

    let mut tracker = JobTracker::new(Arc::new(fetcher), tracker_config(&args), callbacks);
    let reporter = tokio::spawn(report_progress(tracker.subscribe()));

    tracker
        .start(JobHandle::new(args.job_id.clone(), args.family))
        .await?;

    let interrupted = tokio::select! {
        res = tracker.settled() => {
            res?;
            false
        }
        _ = tokio::signal::ctrl_c() => true,
    };
    if interrupted {
        warn!(job_id = %args.job_id, "interrupted, stopping tracker");
        tracker.stop().await?;
    }
    reporter.abort();

    match rx.try_recv() {
        Ok(Outcome::Completed(result)) => {
            println!("{}", serde_json::to_string_pretty(&result)?);
            Ok(ExitCode::SUCCESS)
        }
        Ok(Outcome::Failed(message)) => {
            eprintln!("{message}");
            Ok(ExitCode::FAILURE)
        }
        Err(_) if interrupted => Ok(ExitCode::from(130)),
        Err(_) => anyhow::bail!("tracking ended without an outcome for job {}", args.job_id),
    }
}
