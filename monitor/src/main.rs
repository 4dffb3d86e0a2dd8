use anyhow::Context;
use burstcore::config::ConfigBus;
use burstcore::pipeline::Pipeline;
use burstcore::processing::EventLedger;
use burstcore::telemetry::MetricsRecorder;
use clap::Parser;
use control::bridge::{control_bind_address, ControlBridge};
use generator::SyntheticIq;
use settings::MonitorSettings;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use tokio::runtime::Builder as TokioBuilder;
use tokio::signal;

mod control;
mod generator;
mod settings;

#[derive(Parser)]
#[command(author, version, about = "Unattended radio-burst monitor")]
struct Args {
    /// Load run settings from YAML
    #[arg(long)]
    config: Option<PathBuf>,
    /// Process this many windows, drain, and print a run summary
    #[arg(long)]
    offline: Option<usize>,
    /// Keep the control bridge alive for live retuning (Ctrl+C to stop)
    #[arg(long, default_value_t = false)]
    serve: bool,
    #[arg(long, default_value_t = 9000)]
    port: u16,
    #[arg(long)]
    vlen: Option<usize>,
    #[arg(long)]
    nsigma: Option<f32>,
    /// Observing frequency in MHz
    #[arg(long)]
    frequency: Option<f64>,
    /// Bandwidth in MHz
    #[arg(long)]
    bandwidth: Option<f64>,
    #[arg(long)]
    trials: Option<usize>,
    #[arg(long)]
    ledger: Option<String>,
    #[arg(long)]
    seed: Option<u64>,
    /// Inject a synthetic burst every N windows
    #[arg(long)]
    burst_period: Option<usize>,
}

impl Args {
    fn settings(&self) -> anyhow::Result<MonitorSettings> {
        let mut settings = match &self.config {
            Some(path) => MonitorSettings::load(path)?,
            None => MonitorSettings::default(),
        };
        if let Some(vlen) = self.vlen {
            settings.vlen = vlen;
        }
        if let Some(nsigma) = self.nsigma {
            settings.nsigma = nsigma;
        }
        if let Some(frequency) = self.frequency {
            settings.frequency_mhz = frequency;
        }
        if let Some(bandwidth) = self.bandwidth {
            settings.bandwidth_mhz = bandwidth;
        }
        if let Some(trials) = self.trials {
            settings.trials = trials;
        }
        if let Some(ledger) = &self.ledger {
            settings.ledger = ledger.clone();
        }
        if let Some(seed) = self.seed {
            settings.seed = seed;
        }
        if self.burst_period.is_some() {
            settings.burst_period = self.burst_period;
        }
        Ok(settings)
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();
    let settings = args.settings()?;

    let bus = Arc::new(
        ConfigBus::new(settings.to_configuration()).context("validating run configuration")?,
    );
    let metrics = Arc::new(MetricsRecorder::new());
    // Without the bridge there is no way to stop a live run, so cap it.
    let limit = if args.serve {
        args.offline
    } else {
        Some(args.offline.unwrap_or(1_000))
    };
    let source = Box::new(SyntheticIq::from_settings(&settings, limit));
    let ledger_path = PathBuf::from(&settings.ledger);

    let (pipeline, mut results) = Pipeline::spawn(
        source,
        bus.clone(),
        settings.station(),
        ledger_path.clone(),
        metrics.clone(),
    );

    let bridge = args
        .serve
        .then(|| {
            Arc::new(ControlBridge::new(
                bus,
                metrics.clone(),
                control_bind_address(args.port),
            ))
        });

    // Drain detection results; feed the bridge when one is attached.
    let consumer = {
        let bridge = bridge.clone();
        thread::spawn(move || {
            while let Some(result) = results.blocking_recv() {
                if let Some(bridge) = &bridge {
                    bridge.publish(&result);
                }
            }
        })
    };

    if args.serve {
        log::info!("control bridge on port {} (Ctrl+C to stop)", args.port);
        let runtime = TokioBuilder::new_current_thread()
            .enable_all()
            .build()
            .context("creating runtime for signal handling")?;
        runtime.block_on(async {
            signal::ctrl_c().await.context("awaiting Ctrl+C to exit")?;
            Ok::<(), anyhow::Error>(())
        })?;
        pipeline.stop();
    } else {
        // Finite offline run: wait for the source to drain.
        pipeline.join();
    }
    consumer
        .join()
        .map_err(|_| anyhow::anyhow!("result consumer panicked"))?;

    let snap = metrics.snapshot();
    let recorded = EventLedger::read_all(&ledger_path)
        .map(|events| events.len())
        .unwrap_or(0);
    println!(
        "Run complete -> windows {}, events {}, ledger records {}, ledger errors {}, source retries {}",
        snap.processed, snap.events, recorded, snap.ledger_errors, snap.source_retries
    );

    Ok(())
}
