use crate::config::{ConfigBus, ConfigTap};
use crate::math::mjd::mjd_now;
use crate::prelude::{DetectionResult, ObserverInfo};
use crate::processing::{Detector, EventGate, EventLedger, Vectorizer};
use crate::source::{SampleSource, SourceError};
use crate::telemetry::MetricsRecorder;
use num_complex::Complex32;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tokio::sync::mpsc;

/// Depth of the bounded queues between stages. A full queue blocks the
/// upstream stage; samples are never silently dropped, which would corrupt
/// the rolling baseline.
const STAGE_QUEUE_DEPTH: usize = 8;
/// Depth of the lossy side-channel feeding visualization consumers.
const VIZ_QUEUE_DEPTH: usize = 4;

const MAX_SOURCE_RETRIES: u32 = 5;
const INITIAL_BACKOFF_MS: u64 = 50;
const MAX_BACKOFF_MS: u64 = 2_000;

struct SampleBlock {
    samples: Vec<Complex32>,
    mjd: f64,
}

/// Staged detection pipeline.
///
/// A source producer, a detect worker, and a gate worker run on their own
/// threads, joined by bounded channels. The shared configuration record is
/// polled by every stage between windows; stopping lets in-flight windows
/// drain before the threads are joined.
pub struct Pipeline {
    stop: Arc<AtomicBool>,
    threads: Vec<JoinHandle<()>>,
}

impl Pipeline {
    /// Starts the pipeline and returns it together with the lossy stream of
    /// detection results for display consumers.
    pub fn spawn(
        source: Box<dyn SampleSource>,
        bus: Arc<ConfigBus>,
        info: ObserverInfo,
        ledger_path: PathBuf,
        metrics: Arc<MetricsRecorder>,
    ) -> (Self, mpsc::Receiver<DetectionResult>) {
        let stop = Arc::new(AtomicBool::new(false));
        let (block_tx, block_rx) = mpsc::channel::<SampleBlock>(STAGE_QUEUE_DEPTH);
        let (gate_tx, gate_rx) = mpsc::channel::<DetectionResult>(STAGE_QUEUE_DEPTH);
        let (viz_tx, viz_rx) = mpsc::channel::<DetectionResult>(VIZ_QUEUE_DEPTH);

        let producer = {
            let stop = stop.clone();
            let bus = bus.clone();
            let metrics = metrics.clone();
            thread::spawn(move || run_producer(source, bus, stop, block_tx, metrics))
        };

        let detect = {
            let bus = bus.clone();
            let metrics = metrics.clone();
            thread::spawn(move || run_detect(bus, block_rx, gate_tx, viz_tx, metrics))
        };

        let gate = {
            thread::spawn(move || run_gate(bus, info, ledger_path, gate_rx, metrics))
        };

        (
            Self {
                stop,
                threads: vec![producer, detect, gate],
            },
            viz_rx,
        )
    }

    /// Signals the producer to stop, then drains and joins every stage.
    pub fn stop(mut self) {
        self.stop.store(true, Ordering::Release);
        self.join_threads();
    }

    /// Waits for the source to end on its own (offline runs).
    pub fn join(mut self) {
        self.join_threads();
    }

    fn join_threads(&mut self) {
        for handle in self.threads.drain(..) {
            if handle.join().is_err() {
                log::error!("pipeline worker panicked");
            }
        }
    }
}

fn run_producer(
    mut source: Box<dyn SampleSource>,
    bus: Arc<ConfigBus>,
    stop: Arc<AtomicBool>,
    block_tx: mpsc::Sender<SampleBlock>,
    metrics: Arc<MetricsRecorder>,
) {
    let mut tap = ConfigTap::new(bus);
    let mut retries = 0u32;
    let mut backoff_ms = INITIAL_BACKOFF_MS;
    log::info!("sample source {} streaming", source.descriptor());

    loop {
        if stop.load(Ordering::Acquire) {
            break;
        }
        if let Some((old, new)) = tap.poll() {
            if old.frequency_mhz != new.frequency_mhz || old.bandwidth_mhz != new.bandwidth_mhz {
                source.retune(new.frequency_mhz, new.bandwidth_mhz);
            }
        }
        let vlen = tap.current().vlen;
        let mut buffer = vec![Complex32::default(); vlen];
        match source.fill(&mut buffer) {
            Ok(0) => {
                log::info!("sample source {} ended", source.descriptor());
                break;
            }
            Ok(count) => {
                retries = 0;
                backoff_ms = INITIAL_BACKOFF_MS;
                buffer.truncate(count);
                let block = SampleBlock {
                    samples: buffer,
                    mjd: mjd_now(),
                };
                if block_tx.blocking_send(block).is_err() {
                    break;
                }
            }
            Err(SourceError::Transient(msg)) => {
                retries += 1;
                metrics.record_source_retry();
                if retries > MAX_SOURCE_RETRIES {
                    log::error!("source failed after {} retries: {}", MAX_SOURCE_RETRIES, msg);
                    break;
                }
                log::warn!("transient source error (retry {}): {}", retries, msg);
                thread::sleep(Duration::from_millis(backoff_ms));
                backoff_ms = (backoff_ms * 2).min(MAX_BACKOFF_MS);
            }
            Err(SourceError::Fatal(msg)) => {
                log::error!("sample source unavailable: {}", msg);
                break;
            }
        }
    }
}

fn run_detect(
    bus: Arc<ConfigBus>,
    mut block_rx: mpsc::Receiver<SampleBlock>,
    gate_tx: mpsc::Sender<DetectionResult>,
    viz_tx: mpsc::Sender<DetectionResult>,
    metrics: Arc<MetricsRecorder>,
) {
    let mut vectorizer = Vectorizer::new(bus.clone());
    let mut detector = Detector::new(bus);

    'blocks: while let Some(block) = block_rx.blocking_recv() {
        for window in vectorizer.push(&block.samples, block.mjd) {
            match detector.process(window) {
                Ok(Some(result)) => {
                    metrics.record_processed();
                    // Display consumers are lossy by design; the gate path
                    // keeps strict backpressure.
                    let _ = viz_tx.try_send(result.clone());
                    if gate_tx.blocking_send(result).is_err() {
                        break 'blocks;
                    }
                }
                Ok(None) => metrics.record_processed(),
                Err(err) => {
                    log::warn!("detector error: {}", err);
                    break 'blocks;
                }
            }
        }
    }
    detector.stop();
}

fn run_gate(
    bus: Arc<ConfigBus>,
    info: ObserverInfo,
    ledger_path: PathBuf,
    mut gate_rx: mpsc::Receiver<DetectionResult>,
    metrics: Arc<MetricsRecorder>,
) {
    let mut gate = EventGate::new(bus, info);
    let mut ledger = EventLedger::new(ledger_path);

    while let Some(result) = gate_rx.blocking_recv() {
        if let Some(event) = gate.offer(&result) {
            match ledger.append(&event) {
                Ok(()) => {
                    metrics.record_event();
                    log::info!(
                        "event MJD {:.6} sigma {:.2} trial {:?}",
                        event.mjd,
                        event.significance,
                        event.trial
                    );
                }
                Err(err) => {
                    metrics.record_ledger_error();
                    log::warn!("ledger append failed, continuing: {}", err);
                }
            }
        }
    }
    // Last stage to drain; the status surface now shows the run ended.
    metrics.mark_stopped();
}
