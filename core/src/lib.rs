//! Streaming burst-detection core for small radio telescopes.
//!
//! The modules form a staged pipeline: a sample source feeds the vectorizer,
//! the detector scores each window against a rolling noise baseline (with an
//! optional dedispersion trial search), and the event gate decides which
//! detections reach the append-only ledger. A single swapped configuration
//! record keeps every stage consistent while parameters change live.

pub mod config;
pub mod math;
pub mod pipeline;
pub mod prelude;
pub mod processing;
pub mod source;
pub mod telemetry;

pub use config::{ConfigBus, ConfigPatch, ConfigTap, Configuration};
pub use prelude::{DetectionResult, Event, PipelineError, PipelineResult};
