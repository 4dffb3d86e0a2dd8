use crate::settings::MonitorSettings;
use burstcore::source::{SampleSource, SourceError};
use num_complex::Complex32;
use rand::{rngs::StdRng, SeedableRng};
use rand_distr::{Distribution, Normal};

/// Synthetic IQ front end standing in for the SDR device.
///
/// Produces seeded complex Gaussian noise and, optionally, a strong tone
/// burst every `burst_period` windows so unattended runs exercise the whole
/// detection path. A window limit turns the stream finite for offline runs.
pub struct SyntheticIq {
    descriptor: String,
    rng: StdRng,
    noise: Normal<f32>,
    burst_period: Option<usize>,
    burst_amplitude: f32,
    windows: usize,
    limit: Option<usize>,
    frequency_mhz: f64,
    bandwidth_mhz: f64,
}

impl SyntheticIq {
    pub fn from_settings(settings: &MonitorSettings, limit: Option<usize>) -> Self {
        Self {
            descriptor: settings.device.clone(),
            rng: StdRng::seed_from_u64(settings.seed),
            noise: Normal::new(0.0, settings.noise.max(f32::MIN_POSITIVE))
                .expect("noise level is finite"),
            burst_period: settings.burst_period,
            burst_amplitude: settings.burst_amplitude,
            windows: 0,
            limit,
            frequency_mhz: settings.frequency_mhz,
            bandwidth_mhz: settings.bandwidth_mhz,
        }
    }

    #[cfg(test)]
    pub fn tuning(&self) -> (f64, f64) {
        (self.frequency_mhz, self.bandwidth_mhz)
    }

    fn burst_due(&self) -> bool {
        match self.burst_period {
            Some(period) if period > 0 => (self.windows + 1) % period == 0,
            _ => false,
        }
    }
}

impl SampleSource for SyntheticIq {
    fn descriptor(&self) -> &str {
        &self.descriptor
    }

    fn fill(&mut self, buffer: &mut [Complex32]) -> Result<usize, SourceError> {
        if let Some(limit) = self.limit {
            if self.windows >= limit {
                return Ok(0);
            }
        }
        let vlen = buffer.len();
        let burst = self.burst_due();
        for (n, slot) in buffer.iter_mut().enumerate() {
            let mut sample = Complex32::new(
                self.noise.sample(&mut self.rng),
                self.noise.sample(&mut self.rng),
            );
            if burst {
                // Tone at one-eighth of the band, well clear of DC.
                let phase =
                    2.0 * std::f32::consts::PI * (vlen as f32 / 8.0) * n as f32 / vlen as f32;
                sample += Complex32::new(
                    self.burst_amplitude * phase.cos(),
                    self.burst_amplitude * phase.sin(),
                );
            }
            *slot = sample;
        }
        self.windows += 1;
        Ok(vlen)
    }

    fn retune(&mut self, frequency_mhz: f64, bandwidth_mhz: f64) {
        log::info!(
            "{} retuned {:.3}/{:.3} MHz -> {:.3}/{:.3} MHz",
            self.descriptor,
            self.frequency_mhz,
            self.bandwidth_mhz,
            frequency_mhz,
            bandwidth_mhz
        );
        self.frequency_mhz = frequency_mhz;
        self.bandwidth_mhz = bandwidth_mhz;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> MonitorSettings {
        MonitorSettings {
            seed: 13,
            burst_period: Some(4),
            burst_amplitude: 40.0,
            ..MonitorSettings::default()
        }
    }

    #[test]
    fn window_limit_ends_the_stream() {
        let mut source = SyntheticIq::from_settings(&settings(), Some(3));
        let mut buffer = vec![Complex32::default(); 64];
        for _ in 0..3 {
            assert_eq!(source.fill(&mut buffer).unwrap(), 64);
        }
        assert_eq!(source.fill(&mut buffer).unwrap(), 0);
    }

    #[test]
    fn bursts_arrive_on_schedule() {
        let mut source = SyntheticIq::from_settings(&settings(), None);
        let mut buffer = vec![Complex32::default(); 128];
        let mut peaks = Vec::new();
        for _ in 0..8 {
            source.fill(&mut buffer).unwrap();
            let peak = buffer.iter().map(|c| c.norm()).fold(0.0f32, f32::max);
            peaks.push(peak);
        }
        // Windows 4 and 8 (1-based) carry the tone.
        assert!(peaks[3] > 5.0 * peaks[0]);
        assert!(peaks[7] > 5.0 * peaks[4]);
    }

    #[test]
    fn seeded_streams_are_reproducible() {
        let mut a = SyntheticIq::from_settings(&settings(), None);
        let mut b = SyntheticIq::from_settings(&settings(), None);
        let mut buf_a = vec![Complex32::default(); 32];
        let mut buf_b = vec![Complex32::default(); 32];
        a.fill(&mut buf_a).unwrap();
        b.fill(&mut buf_b).unwrap();
        assert_eq!(buf_a, buf_b);
    }

    #[test]
    fn retune_updates_reported_tuning() {
        let mut source = SyntheticIq::from_settings(&settings(), None);
        source.retune(705.0, 10.0);
        assert_eq!(source.tuning(), (705.0, 10.0));
    }
}
