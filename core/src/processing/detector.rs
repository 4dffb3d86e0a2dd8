use crate::config::{requires_reset, ConfigBus, ConfigTap, Configuration};
use crate::math::{RunningStats, SpectrumHelper};
use crate::prelude::{DetectionResult, DetectorMode, PipelineError, PipelineResult, VectorPayload};
use crate::processing::dedisperse::{best_trial, Dedisperser};
use std::sync::Arc;

/// Lifecycle of the detector stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectorState {
    Idle,
    Running,
    Reconfiguring,
    Stopped,
}

/// Exponential weight of the rolling noise baseline, ~100-window memory.
const BASELINE_ALPHA: f32 = 0.01;

/// Scores each window against a rolling per-bin noise baseline and, when
/// more than one trial is configured, searches the dedispersion bank for
/// the best-matching delay profile.
///
/// Baseline statistics and the dedispersion buffer are owned here and
/// mutated only on the processing thread.
pub struct Detector {
    tap: ConfigTap,
    state: DetectorState,
    fft: SpectrumHelper,
    bins: Vec<RunningStats>,
    trial_stats: RunningStats,
    dedisperser: Option<Dedisperser>,
}

impl Detector {
    pub fn new(bus: Arc<ConfigBus>) -> Self {
        let tap = ConfigTap::new(bus);
        let cfg = tap.current().clone();
        let mut detector = Self {
            tap,
            state: DetectorState::Idle,
            fft: SpectrumHelper::new(cfg.vlen),
            bins: Vec::new(),
            trial_stats: RunningStats::new(BASELINE_ALPHA),
            dedisperser: None,
        };
        detector.rebuild(&cfg);
        detector
    }

    pub fn state(&self) -> DetectorState {
        self.state
    }

    pub fn stop(&mut self) {
        self.state = DetectorState::Stopped;
    }

    fn rebuild(&mut self, cfg: &Configuration) {
        self.fft = SpectrumHelper::new(cfg.vlen);
        self.bins = vec![RunningStats::new(BASELINE_ALPHA); cfg.vlen];
        self.trial_stats.reset();
        self.dedisperser = if cfg.trials > 1 {
            Some(Dedisperser::new(cfg))
        } else {
            None
        };
    }

    /// Processes one window.
    ///
    /// Returns `Ok(None)` when the window is withheld: a stale framing
    /// length after a live `vlen` change, or a sub-threshold result in
    /// `Detect` mode. `Monitor` mode always emits.
    pub fn process(&mut self, payload: VectorPayload) -> PipelineResult<Option<DetectionResult>> {
        if self.state == DetectorState::Stopped {
            return Err(PipelineError::Stopped);
        }

        if let Some((old, new)) = self.tap.poll() {
            if requires_reset(&old, &new) {
                log::info!(
                    "detector reconfiguring: vlen {} -> {}, trials {} -> {}",
                    old.vlen,
                    new.vlen,
                    old.trials,
                    new.trials
                );
                self.state = DetectorState::Reconfiguring;
                self.rebuild(&new);
            }
        }
        let cfg = self.tap.current().clone();

        if payload.samples.len() != cfg.vlen {
            // Window framed under a previous vlen; never mix lengths.
            log::debug!(
                "dropping stale window of {} samples (vlen {})",
                payload.samples.len(),
                cfg.vlen
            );
            return Ok(None);
        }
        self.state = DetectorState::Running;

        let power = self.fft.power_spectrum(&payload.samples);

        let mut peak_bin = 0;
        let mut peak_sig = f32::NEG_INFINITY;
        for (idx, &value) in power.iter().enumerate() {
            let sig = self.bins[idx].significance(value);
            if sig > peak_sig {
                peak_sig = sig;
                peak_bin = idx;
            }
        }
        for (idx, &value) in power.iter().enumerate() {
            self.bins[idx].update(value);
        }

        let (trial_scores, best, significance) = match self.dedisperser.as_mut() {
            Some(dedisperser) => match dedisperser.push(&power) {
                Some(sums) => {
                    let scores: Vec<f32> = sums
                        .iter()
                        .map(|&sum| self.trial_stats.significance(sum))
                        .collect();
                    let mean = sums.iter().sum::<f32>() / sums.len() as f32;
                    self.trial_stats.update(mean);
                    let best = best_trial(&scores);
                    let significance = best.map(|idx| scores[idx]).unwrap_or(0.0);
                    (scores, best, significance)
                }
                // Buffer still filling; fall back to the per-bin score.
                None => (Vec::new(), None, peak_sig),
            },
            None => (Vec::new(), None, peak_sig),
        };

        let passed = significance > cfg.nsigma;
        let result = DetectionResult {
            mjd: payload.mjd,
            power,
            frequency_mhz: cfg.frequency_mhz,
            bandwidth_mhz: cfg.bandwidth_mhz,
            peak_bin,
            trial_scores,
            best_trial: best,
            significance,
            passed,
        };

        match cfg.mode {
            DetectorMode::Monitor => Ok(Some(result)),
            DetectorMode::Detect => Ok(if passed { Some(result) } else { None }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_complex::Complex32;
    use rand::{rngs::StdRng, SeedableRng};
    use rand_distr::{Distribution, Normal};

    fn bus(cfg: Configuration) -> Arc<ConfigBus> {
        Arc::new(ConfigBus::new(cfg).unwrap())
    }

    fn noise_window(rng: &mut StdRng, vlen: usize) -> VectorPayload {
        let normal = Normal::new(0.0f32, 1.0f32).unwrap();
        VectorPayload {
            samples: (0..vlen)
                .map(|_| Complex32::new(normal.sample(rng), normal.sample(rng)))
                .collect(),
            mjd: 58_000.0,
        }
    }

    fn tone_window(vlen: usize, bin: usize, amplitude: f32) -> VectorPayload {
        VectorPayload {
            samples: (0..vlen)
                .map(|n| {
                    let phase =
                        2.0 * std::f32::consts::PI * bin as f32 * n as f32 / vlen as f32;
                    Complex32::new(amplitude * phase.cos(), amplitude * phase.sin())
                })
                .collect(),
            mjd: 58_000.5,
        }
    }

    #[test]
    fn injected_tone_is_flagged_at_its_bin() {
        let cfg = Configuration {
            vlen: 32,
            nsigma: 5.0,
            ..Configuration::default()
        };
        let mut detector = Detector::new(bus(cfg));
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..200 {
            detector.process(noise_window(&mut rng, 32)).unwrap();
        }

        let result = detector
            .process(tone_window(32, 5, 50.0))
            .unwrap()
            .expect("tone should pass threshold");
        assert!(result.passed);
        assert_eq!(result.peak_bin, 5);
        assert!(result.significance > 5.0);
        // Results carry the tuning they were detected under.
        assert_eq!(result.frequency_mhz, 1419.0);
        assert_eq!(result.bandwidth_mhz, 6.0);
    }

    #[test]
    fn threshold_above_impulse_significance_suppresses_detection() {
        let cfg = Configuration {
            vlen: 32,
            nsigma: 1e9,
            ..Configuration::default()
        };
        let mut detector = Detector::new(bus(cfg));
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..200 {
            detector.process(noise_window(&mut rng, 32)).unwrap();
        }
        assert!(detector
            .process(tone_window(32, 5, 50.0))
            .unwrap()
            .is_none());
    }

    #[test]
    fn monitor_mode_emits_every_window() {
        let cfg = Configuration {
            vlen: 16,
            mode: DetectorMode::Monitor,
            ..Configuration::default()
        };
        let mut detector = Detector::new(bus(cfg));
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..20 {
            let result = detector.process(noise_window(&mut rng, 16)).unwrap();
            assert!(result.is_some());
        }
    }

    #[test]
    fn constant_window_never_faults_and_scores_zero() {
        let cfg = Configuration {
            vlen: 16,
            mode: DetectorMode::Monitor,
            ..Configuration::default()
        };
        let mut detector = Detector::new(bus(cfg));
        let flat = VectorPayload {
            samples: vec![Complex32::new(1.0, 0.0); 16],
            mjd: 58_000.0,
        };
        let mut last = None;
        for _ in 0..50 {
            last = detector.process(flat.clone()).unwrap();
        }
        let result = last.unwrap();
        assert_eq!(result.significance, 0.0);
        assert!(!result.passed);
    }

    #[test]
    fn live_vlen_change_drops_stale_windows_then_resumes() {
        let cfg = Configuration {
            vlen: 16,
            mode: DetectorMode::Monitor,
            ..Configuration::default()
        };
        let shared = bus(cfg);
        let mut detector = Detector::new(shared.clone());
        let mut rng = StdRng::seed_from_u64(9);
        detector.process(noise_window(&mut rng, 16)).unwrap();
        assert_eq!(detector.state(), DetectorState::Running);

        shared.set_vlen(8).unwrap();
        // A window framed under the old length is withheld.
        assert!(detector.process(noise_window(&mut rng, 16)).unwrap().is_none());
        assert_eq!(detector.state(), DetectorState::Reconfiguring);

        let result = detector.process(noise_window(&mut rng, 8)).unwrap().unwrap();
        assert_eq!(result.power.len(), 8);
        assert_eq!(detector.state(), DetectorState::Running);
    }

    #[test]
    fn sigma_change_applies_without_reset() {
        let cfg = Configuration {
            vlen: 16,
            nsigma: 5.0,
            mode: DetectorMode::Monitor,
            ..Configuration::default()
        };
        let shared = bus(cfg);
        let mut detector = Detector::new(shared.clone());
        let mut rng = StdRng::seed_from_u64(5);
        for _ in 0..30 {
            detector.process(noise_window(&mut rng, 16)).unwrap();
        }
        shared.set_nsigma(0.1).unwrap();
        detector.process(noise_window(&mut rng, 16)).unwrap();
        // No reconfiguration happened, only the threshold moved.
        assert_eq!(detector.state(), DetectorState::Running);
    }

    #[test]
    fn stopped_detector_rejects_further_windows() {
        let cfg = Configuration {
            vlen: 8,
            ..Configuration::default()
        };
        let mut detector = Detector::new(bus(cfg));
        detector.stop();
        let window = VectorPayload {
            samples: vec![Complex32::default(); 8],
            mjd: 0.0,
        };
        assert!(matches!(
            detector.process(window),
            Err(PipelineError::Stopped)
        ));
    }

    #[test]
    fn trial_search_reports_scores_once_buffer_is_warm() {
        let cfg = Configuration {
            vlen: 16,
            frequency_mhz: 1400.0,
            bandwidth_mhz: 10.0,
            trials: 3,
            mode: DetectorMode::Monitor,
            ..Configuration::default()
        };
        let mut detector = Detector::new(bus(cfg));
        let mut rng = StdRng::seed_from_u64(21);
        let mut saw_scores = false;
        for _ in 0..6_000 {
            if let Some(result) = detector.process(noise_window(&mut rng, 16)).unwrap() {
                if !result.trial_scores.is_empty() {
                    assert_eq!(result.trial_scores.len(), 3);
                    assert!(result.best_trial.is_some());
                    saw_scores = true;
                }
            }
        }
        assert!(saw_scores, "dedispersion buffer never warmed");
    }
}
