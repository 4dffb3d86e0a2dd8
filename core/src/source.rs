use num_complex::Complex32;

/// Errors surfaced by a sample source.
///
/// `Transient` reads are retried with backoff by the pipeline producer;
/// `Fatal` stops the pipeline.
#[derive(thiserror::Error, Debug)]
pub enum SourceError {
    #[error("transient device error: {0}")]
    Transient(String),
    #[error("device unavailable: {0}")]
    Fatal(String),
}

/// Boundary to the SDR front end (or a stand-in for it).
///
/// Implementations fill caller-provided buffers with IQ samples at the
/// configured rate. `Ok(0)` signals end-of-stream, which finite offline
/// sources use to let the pipeline drain and exit cleanly.
pub trait SampleSource: Send {
    /// Device identifier string, echoed in logs and status output.
    fn descriptor(&self) -> &str;

    /// Fills `buffer` and returns the number of samples written.
    fn fill(&mut self, buffer: &mut [Complex32]) -> Result<usize, SourceError>;

    /// Applies new tuning; called by the producer when the shared
    /// configuration changes frequency or bandwidth.
    fn retune(&mut self, frequency_mhz: f64, bandwidth_mhz: f64);
}
