use num_complex::Complex32;
use serde::{Deserialize, Serialize};

/// Operating mode of the detector output stage.
///
/// `Monitor` forwards every result downstream for inspection; `Detect`
/// forwards only results whose significance exceeded the sigma threshold.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum DetectorMode {
    Monitor,
    Detect,
}

/// Record mode of the event gate.
///
/// `Wait` drops passing results; `Write` turns them into ledger events.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum RecordMode {
    Wait,
    Write,
}

/// One framed window of IQ samples, timestamped in Modified Julian Days.
#[derive(Debug, Clone)]
pub struct VectorPayload {
    pub samples: Vec<Complex32>,
    pub mjd: f64,
}

/// Per-vector output of the detector.
///
/// Carries the tuning the window was detected under, so downstream
/// consumers describe the detection correctly even when the configuration
/// has changed while the result sat in a queue.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DetectionResult {
    pub mjd: f64,
    /// Magnitude-squared spectrum, one entry per frequency bin.
    pub power: Vec<f32>,
    pub frequency_mhz: f64,
    pub bandwidth_mhz: f64,
    pub peak_bin: usize,
    /// Significance per dedispersion trial; empty when running a single trial
    /// or while the dedispersion buffer is still filling.
    pub trial_scores: Vec<f32>,
    pub best_trial: Option<usize>,
    pub significance: f32,
    pub passed: bool,
}

/// Station metadata stamped onto every recorded event.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ObserverInfo {
    pub observer: String,
    pub telescope: String,
    pub azimuth_deg: f32,
    pub elevation_deg: f32,
}

/// Immutable event record appended to the ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub mjd: f64,
    pub observer: String,
    pub telescope: String,
    pub azimuth_deg: f32,
    pub elevation_deg: f32,
    pub frequency_mhz: f64,
    pub bandwidth_mhz: f64,
    pub vlen: usize,
    pub trial: Option<usize>,
    pub significance: f32,
}

/// Common error type for the detection pipeline.
#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("sample source unavailable: {0}")]
    SourceUnavailable(String),
    #[error("ledger write failed: {0}")]
    LedgerWrite(String),
    #[error("detector stopped")]
    Stopped,
    #[error("internal failure: {0}")]
    Internal(String),
}

pub type PipelineResult<T> = Result<T, PipelineError>;
