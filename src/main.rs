use std::path::PathBuf;
use std::thread;

use anyhow::Result;
use chrono::Utc;
use clap::Parser;
use crossbeam::channel::{self, Receiver};
use serde::Serialize;
use tokio::sync::watch;
use tokio::time::Duration;

use rocket_telemetry_rs::config::ConfigOverrides;
use rocket_telemetry_rs::coordinator::StreamCoordinator;
use rocket_telemetry_rs::derivation::ChannelPreset;
use rocket_telemetry_rs::health_monitor::StallNotice;
use rocket_telemetry_rs::live_status::LiveStatusWriter;
use rocket_telemetry_rs::session::SessionMetadata;
use rocket_telemetry_rs::sink::{ChannelSink, SampleBuffer, SinkEvent};
use rocket_telemetry_rs::source::UdpSource;
use rocket_telemetry_rs::types::DerivedSample;

#[derive(Parser, Debug)]
#[command(name = "rocket_telemetry")]
#[command(about = "Live rocket telemetry receiver: decode, zero and derive flight channels", long_about = None)]
struct Args {
    /// Duration in seconds (0 = until Ctrl-C)
    #[arg(value_name = "SECONDS", default_value = "0")]
    duration: u64,

    /// UDP address to listen on
    #[arg(long, default_value = "0.0.0.0:5005")]
    bind: String,

    /// Output directory
    #[arg(long, default_value = "rocket_telemetry_sessions")]
    output_dir: PathBuf,

    /// Don't print derived samples to the console
    #[arg(long)]
    quiet: bool,

    #[command(flatten)]
    overrides: ConfigOverrides,
}

#[derive(Serialize)]
struct SessionExport<'a> {
    metadata: SessionMetadata,
    preset: ChannelPreset,
    total_stalls: u64,
    samples: &'a [DerivedSample],
    stalls: &'a [StallNotice],
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    let config = args.overrides.resolve()?;

    println!("[{}] Rocket Telemetry Starting", ts_now());
    println!("  Listening: {}", args.bind);
    println!("  Duration: {} seconds (0=continuous)", args.duration);
    println!("  Layout: {} (min {} fields)", config.layout.name, config.min_fields);
    println!("  Velocity: {:?}", config.velocity_mode);
    println!("  Output Dir: {}", args.output_dir.display());

    std::fs::create_dir_all(&args.output_dir)?;

    let mut source = UdpSource::bind(&args.bind).await?;
    let mut coordinator = StreamCoordinator::new(&config);
    let session_id = coordinator.session().session_id().to_string();

    let (stop_tx, stop_rx) = watch::channel(false);
    let duration = args.duration;
    tokio::spawn(async move {
        let deadline = async {
            if duration > 0 {
                tokio::time::sleep(Duration::from_secs(duration)).await;
            } else {
                std::future::pending::<()>().await;
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => log::info!("Ctrl-C received, stopping..."),
            _ = deadline => log::info!("Duration reached, stopping..."),
        }
        let _ = stop_tx.send(true);
    });

    // Console rendering runs off the receive task
    let (event_tx, event_rx) = channel::bounded::<SinkEvent>(256);
    let preset = config.preset;
    let quiet = args.quiet;
    let presenter = thread::spawn(move || present(event_rx, preset, quiet));

    let status_path = args.output_dir.join("live_status.json");
    let mut sink = (
        SampleBuffer::new(),
        (
            LiveStatusWriter::new(&session_id, status_path.clone(), preset, Duration::from_secs(2)),
            ChannelSink::new(event_tx),
        ),
    );

    let outcome = coordinator.run(&mut source, &mut sink, stop_rx).await;
    let (buffer, (mut status, channel_sink)) = sink;
    if channel_sink.dropped() > 0 {
        log::warn!("{} console events dropped", channel_sink.dropped());
    }
    drop(channel_sink);
    if presenter.join().is_err() {
        log::warn!("Console thread panicked");
    }

    // Save whatever was collected, however the run ended
    let export = SessionExport {
        metadata: coordinator.session().metadata(),
        preset,
        total_stalls: coordinator.health().total_stalls(),
        samples: buffer.samples(),
        stalls: buffer.stalls(),
    };
    let filename = args.output_dir.join(format!("{}.json", session_id));
    std::fs::write(&filename, serde_json::to_string_pretty(&export)?)?;
    println!(
        "[{}] Final save: {} samples, {} stalls to {}",
        ts_now(),
        buffer.len(),
        buffer.stalls().len(),
        filename.display()
    );
    status.flush_to(&status_path)?;

    let stats = export.metadata.stats;
    println!("\n=== Final Stats ===");
    println!("Accepted samples: {}", stats.accepted);
    println!("Rejected records: {}", stats.rejected);
    println!("Stalls: {}", stats.stalls);
    println!("Calibration complete: {}", status.status().calibration_complete);
    println!("{}", coordinator.health().format_status());
    if let Some(last) = buffer.latest() {
        println!("Last baro altitude: {:.2} m", last.altitude_baro_m);
        println!("Last drift: {:.1} m", last.drift_m);
    }

    outcome?;
    Ok(())
}

fn present(rx: Receiver<SinkEvent>, preset: ChannelPreset, quiet: bool) {
    for event in rx {
        match event {
            SinkEvent::Sample(sample) if !quiet => {
                let values: Vec<String> = preset
                    .channels()
                    .iter()
                    .map(|&c| format!("{}={:.2}", c.label(), sample.channel(c)))
                    .collect();
                println!("[{}] #{} {}", ts_now(), sample.time_index, values.join(" "));
            }
            SinkEvent::Sample(_) => {}
            SinkEvent::Stalled(notice) => {
                println!(
                    "[{}] No data received (timeout), silent {:.1}s",
                    ts_now(),
                    notice.silent_for.as_secs_f64()
                );
            }
            SinkEvent::Rejected(reason) => {
                println!("[{}] Dropped record: {}", ts_now(), reason);
            }
        }
    }
}

fn ts_now() -> String {
    Utc::now().format("%H:%M:%S").to_string()
}
