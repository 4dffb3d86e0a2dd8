pub mod fft;
pub mod mjd;
pub mod stats;

pub use fft::SpectrumHelper;
pub use stats::RunningStats;
