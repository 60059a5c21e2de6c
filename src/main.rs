use clap::{Parser, ValueEnum};
use formtrace::api::SimulatedApi;
use formtrace::clock::SystemClock;
use formtrace::config::{ConfigStore, FileConfigStore};
use formtrace::error::FtResult;
use formtrace::export::export_field_breakdown;
use formtrace::scenario::Scenario;
use formtrace::submit::{SignupForm, SubmitOutcome};
use formtrace::telemetry::{ChannelSink, FanoutSink, RecordingSink, TelemetrySink, TracingSink};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// replay scripted signup sessions and inspect the telemetry they produce
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "Replays a scripted signup session (focus, keystrokes, pastes, corrections, submits) against a simulated backend and reports the per-field interaction metrics and telemetry the session produced."
)]
struct Cli {
    /// scripted session to replay
    #[clap(short = 's', long, value_enum, default_value_t = Scenario::HappyPath)]
    scenario: Scenario,

    /// seed for the generated persona and the simulated backend
    #[clap(long, default_value_t = 42)]
    seed: u64,

    /// failure mode forced onto the simulated backend
    #[clap(short = 'f', long, value_enum, default_value_t = Failure::None)]
    fail: Failure,

    /// override the configured conflict probability (0..=1)
    #[clap(long)]
    conflict_rate: Option<f64>,

    /// override the configured change-sampling interval
    #[clap(long)]
    sample_every: Option<u32>,

    /// skip the simulated persistence and email delays
    #[clap(long)]
    no_delay: bool,

    /// print the full telemetry transcript as JSON lines
    #[clap(short = 't', long)]
    transcript: bool,

    /// write the per-field breakdown to a CSV file
    #[clap(long)]
    export_csv: Option<PathBuf>,

    /// config file to use instead of the platform default location
    #[clap(long)]
    config: Option<PathBuf>,

    /// suppress live telemetry log output
    #[clap(short = 'q', long)]
    quiet: bool,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum, strum_macros::Display)]
#[strum(serialize_all = "kebab-case")]
enum Failure {
    None,
    Conflict,
    Server,
    Network,
    BadRequest,
}

fn main() -> FtResult<()> {
    let cli = Cli::parse();

    let default_filter = if cli.quiet { "error" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .with_target(false)
        .init();

    let store = match &cli.config {
        Some(path) => FileConfigStore::with_path(path),
        None => FileConfigStore::new(),
    };
    let mut cfg = store.load();
    if let Some(rate) = cli.conflict_rate {
        cfg.conflict_rate = rate;
    }
    if let Some(every) = cli.sample_every {
        cfg.change_sample_every = every;
    }
    cfg.validate()?;

    let recording = Arc::new(RecordingSink::new());
    let live = Arc::new(ChannelSink::spawn(TracingSink));
    let sink: Arc<dyn TelemetrySink> = Arc::new(FanoutSink::new(vec![
        Arc::clone(&recording) as Arc<dyn TelemetrySink>,
        Arc::clone(&live) as Arc<dyn TelemetrySink>,
    ]));

    let mut api = SimulatedApi::new(Arc::clone(&sink))
        .with_seed(cli.seed)
        .with_conflict_rate(if cli.fail == Failure::Conflict {
            1.0
        } else {
            cfg.conflict_rate
        });
    if cli.no_delay {
        api = api.without_delays();
    } else {
        api = api
            .with_persist_delay(Duration::from_millis(cfg.persist_delay_ms))
            .with_email_delay(Duration::from_millis(cfg.welcome_email_delay_ms));
    }
    api = match cli.fail {
        Failure::Server => api.with_server_fault(),
        Failure::Network => api.with_transport_failure(),
        Failure::BadRequest => api.with_malformed_body(),
        Failure::None | Failure::Conflict => api,
    };

    let mut form = SignupForm::new(api, Arc::clone(&sink), Arc::new(SystemClock))
        .with_form_name(cfg.form_name.clone())
        .with_sample_every(cfg.change_sample_every);

    let outcome = cli.scenario.run(&mut form, cli.seed);

    // Drain the buffered channel before reporting.
    live.close();

    let summary = form.metrics().build_summary();

    println!();
    println!("scenario: {}", cli.scenario);
    match &outcome {
        Some(SubmitOutcome::Success { user_id }) => println!("outcome:  success ({user_id})"),
        Some(SubmitOutcome::ValidationFailed(errors)) => {
            println!("outcome:  validation failed ({} fields)", errors.len())
        }
        Some(SubmitOutcome::ApiError { status, message }) => {
            println!("outcome:  api error {status} ({message})")
        }
        Some(SubmitOutcome::NetworkError { message }) => {
            println!("outcome:  network error ({message})")
        }
        Some(SubmitOutcome::Rejected) => println!("outcome:  rejected"),
        None => println!("outcome:  abandoned before submit"),
    }
    if let Some(started) = summary.started_at_local() {
        println!("started:  {}", started.format("%Y-%m-%d %H:%M:%S%.3f"));
    }
    println!("duration: {}ms", summary.total_duration_ms);
    println!("attempts: {}", summary.submission_attempts);
    println!("visits:   {}", summary.visit_sequence_joined());
    println!();
    println!("field             focus  change  paste  dwell_ms  corrections");
    for (name, fm) in &summary.fields {
        println!(
            "{name:<17} {:>5} {:>7} {:>6} {:>9} {:>12}",
            fm.focus_count, fm.change_count, fm.paste_count, fm.total_focus_ms, fm.correction_count
        );
    }

    if cli.transcript {
        println!();
        for msg in recording.snapshot() {
            println!("{}", serde_json::to_string(&msg)?);
        }
    }

    if let Some(path) = &cli.export_csv {
        export_field_breakdown(&summary, path)?;
        println!();
        println!("breakdown written to {}", path.display());
    }

    Ok(())
}
