use num_complex::Complex32;
use rustfft::{Fft, FftPlanner};
use std::sync::Arc;

/// Helper that wraps the `rustfft` planner for reuse across windows.
pub struct SpectrumHelper {
    fft: Arc<dyn Fft<f32>>,
    buffer: Vec<Complex32>,
}

impl SpectrumHelper {
    pub fn new(size: usize) -> Self {
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(size);
        let buffer = vec![Complex32::default(); size];
        Self { fft, buffer }
    }

    pub fn size(&self) -> usize {
        self.buffer.len()
    }

    /// Magnitude-squared spectrum of one window. Input shorter than the
    /// planned size is zero-padded; longer input is truncated.
    pub fn power_spectrum(&mut self, input: &[Complex32]) -> Vec<f32> {
        let size = self.buffer.len();
        let n = input.len().min(size);
        self.buffer[..n].copy_from_slice(&input[..n]);
        for slot in self.buffer[n..].iter_mut() {
            *slot = Complex32::default();
        }

        self.fft.process(&mut self.buffer);
        self.buffer.iter().map(|c| c.norm_sqr()).collect()
    }
}
