use std::fs::File;
use std::io::{self, BufWriter};
use std::path::PathBuf;

use clap::Parser;
use serde_json::json;
use tokio::sync::watch;

use rocket_telemetry_rs::config::ConfigOverrides;
use rocket_telemetry_rs::coordinator::StreamCoordinator;
use rocket_telemetry_rs::sink::{export_csv, SampleBuffer};
use rocket_telemetry_rs::source::LogFileSource;

/// Post-flight replay: runs a recorded log through the live pipeline and
/// writes the derived series as CSV.
#[derive(Parser, Debug)]
struct Args {
    /// Recorded log, one record per line (.gz accepted)
    #[arg(long)]
    log: PathBuf,

    /// CSV destination (stdout when omitted)
    #[arg(long)]
    out: Option<PathBuf>,

    #[command(flatten)]
    overrides: ConfigOverrides,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let mut args = Args::parse();

    // Recorder rows by default, and no point waiting long on a file
    if args.overrides.config.is_none() && args.overrides.layout.is_none() {
        args.overrides.layout = Some("recorder_csv".to_string());
    }
    args.overrides.timeout_secs.get_or_insert(0.5);
    let config = args.overrides.resolve()?;

    let mut source = LogFileSource::open(&args.log)?;
    let records = source.remaining();
    let mut coordinator = StreamCoordinator::new(&config);
    let mut buffer = SampleBuffer::new();
    let (_stop_tx, stop_rx) = watch::channel(false);

    match coordinator.run(&mut source, &mut buffer, stop_rx).await {
        Err(e) if e.is_source_closed() => log::info!("End of log {}", args.log.display()),
        Err(e) => return Err(e.into()),
        Ok(_) => {}
    }

    match args.out.as_ref() {
        Some(path) => export_csv(buffer.samples(), config.preset, BufWriter::new(File::create(path)?))?,
        None => export_csv(buffer.samples(), config.preset, io::stdout().lock())?,
    }

    let stats = coordinator.session().stats();
    let peak = buffer
        .samples()
        .iter()
        .map(|s| s.altitude_baro_m)
        .fold(f64::NEG_INFINITY, f64::max);
    let summary = json!({
        "log": args.log.display().to_string(),
        "layout": config.layout.name,
        "records": records,
        "accepted": stats.accepted,
        "rejected": stats.rejected,
        "non_monotonic": stats.non_monotonic,
        "calibration": coordinator.session().calibration().state(),
        "peak_altitude_baro_m": if buffer.is_empty() { None } else { Some(peak) },
        "final_drift_m": buffer.latest().map(|s| s.drift_m),
    });

    // Keep stdout clean for the CSV when it goes there
    let text = serde_json::to_string_pretty(&summary)?;
    if args.out.is_some() {
        println!("{}", text);
    } else {
        eprintln!("{}", text);
    }
    Ok(())
}
