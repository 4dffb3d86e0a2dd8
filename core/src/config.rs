use crate::prelude::{DetectorMode, PipelineError, PipelineResult, RecordMode};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

/// Live-tunable parameters shared by every pipeline stage.
///
/// The record is owned by the [`ConfigBus`]; stages only ever hold an
/// `Arc` snapshot, so a half-updated view is impossible.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Configuration {
    /// Window length in samples; also the FFT size.
    pub vlen: usize,
    /// Detection threshold in standard deviations above the baseline.
    pub nsigma: f32,
    pub frequency_mhz: f64,
    pub bandwidth_mhz: f64,
    pub mode: DetectorMode,
    /// Number of dedispersion trials searched; 1 disables the search.
    pub trials: usize,
    pub record: RecordMode,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            vlen: 512,
            nsigma: 5.0,
            frequency_mhz: 1419.0,
            bandwidth_mhz: 6.0,
            mode: DetectorMode::Detect,
            trials: 1,
            record: RecordMode::Wait,
        }
    }
}

impl Configuration {
    pub fn validate(&self) -> PipelineResult<()> {
        if self.vlen == 0 {
            return Err(PipelineError::InvalidConfig(
                "vlen must be at least 1".into(),
            ));
        }
        if !self.nsigma.is_finite() || self.nsigma < 0.0 {
            return Err(PipelineError::InvalidConfig(format!(
                "nsigma must be finite and non-negative, got {}",
                self.nsigma
            )));
        }
        if !self.frequency_mhz.is_finite() || self.frequency_mhz <= 0.0 {
            return Err(PipelineError::InvalidConfig(format!(
                "frequency must be positive, got {} MHz",
                self.frequency_mhz
            )));
        }
        if !self.bandwidth_mhz.is_finite() || self.bandwidth_mhz <= 0.0 {
            return Err(PipelineError::InvalidConfig(format!(
                "bandwidth must be positive, got {} MHz",
                self.bandwidth_mhz
            )));
        }
        if self.trials == 0 {
            return Err(PipelineError::InvalidConfig(
                "trial count must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// True when the change between two snapshots invalidates detector state
/// (baseline, dedispersion buffer, FFT plan). Threshold and mode changes
/// apply from the next vector without a reset.
pub fn requires_reset(old: &Configuration, new: &Configuration) -> bool {
    old.vlen != new.vlen
        || old.trials != new.trials
        || old.frequency_mhz != new.frequency_mhz
        || old.bandwidth_mhz != new.bandwidth_mhz
}

/// Partial update applied as a single atomic swap, used by the control
/// surface. Absent fields keep their current values.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ConfigPatch {
    pub vlen: Option<usize>,
    pub nsigma: Option<f32>,
    pub frequency_mhz: Option<f64>,
    pub bandwidth_mhz: Option<f64>,
    pub mode: Option<DetectorMode>,
    pub trials: Option<usize>,
    pub record: Option<RecordMode>,
}

/// Authoritative configuration record with validated atomic updates.
///
/// Every update validates the candidate first; on failure the prior record
/// stays in force. Successful updates swap the whole record and bump the
/// epoch, which [`ConfigTap`] holders poll between vectors.
pub struct ConfigBus {
    current: RwLock<Arc<Configuration>>,
    epoch: AtomicU64,
}

impl ConfigBus {
    pub fn new(initial: Configuration) -> PipelineResult<Self> {
        initial.validate()?;
        Ok(Self {
            current: RwLock::new(Arc::new(initial)),
            epoch: AtomicU64::new(0),
        })
    }

    pub fn snapshot(&self) -> Arc<Configuration> {
        self.current.read().expect("config lock poisoned").clone()
    }

    fn snapshot_versioned(&self) -> (u64, Arc<Configuration>) {
        let guard = self.current.read().expect("config lock poisoned");
        (self.epoch.load(Ordering::Acquire), guard.clone())
    }

    fn update<F>(&self, mutate: F) -> PipelineResult<Arc<Configuration>>
    where
        F: FnOnce(&mut Configuration),
    {
        let mut guard = self.current.write().expect("config lock poisoned");
        let mut next = (**guard).clone();
        mutate(&mut next);
        next.validate()?;
        let next = Arc::new(next);
        *guard = next.clone();
        self.epoch.fetch_add(1, Ordering::Release);
        Ok(next)
    }

    pub fn set_vlen(&self, vlen: usize) -> PipelineResult<()> {
        self.update(|cfg| cfg.vlen = vlen).map(|_| ())
    }

    pub fn set_nsigma(&self, nsigma: f32) -> PipelineResult<()> {
        self.update(|cfg| cfg.nsigma = nsigma).map(|_| ())
    }

    pub fn set_frequency(&self, frequency_mhz: f64) -> PipelineResult<()> {
        self.update(|cfg| cfg.frequency_mhz = frequency_mhz).map(|_| ())
    }

    pub fn set_bandwidth(&self, bandwidth_mhz: f64) -> PipelineResult<()> {
        self.update(|cfg| cfg.bandwidth_mhz = bandwidth_mhz).map(|_| ())
    }

    pub fn set_mode(&self, mode: DetectorMode) -> PipelineResult<()> {
        self.update(|cfg| cfg.mode = mode).map(|_| ())
    }

    pub fn set_trials(&self, trials: usize) -> PipelineResult<()> {
        self.update(|cfg| cfg.trials = trials).map(|_| ())
    }

    pub fn set_record(&self, record: RecordMode) -> PipelineResult<()> {
        self.update(|cfg| cfg.record = record).map(|_| ())
    }

    /// Applies every present field of the patch as one swap, so dependent
    /// stages never observe a partially applied change.
    pub fn apply(&self, patch: &ConfigPatch) -> PipelineResult<Arc<Configuration>> {
        self.update(|cfg| {
            if let Some(vlen) = patch.vlen {
                cfg.vlen = vlen;
            }
            if let Some(nsigma) = patch.nsigma {
                cfg.nsigma = nsigma;
            }
            if let Some(frequency_mhz) = patch.frequency_mhz {
                cfg.frequency_mhz = frequency_mhz;
            }
            if let Some(bandwidth_mhz) = patch.bandwidth_mhz {
                cfg.bandwidth_mhz = bandwidth_mhz;
            }
            if let Some(mode) = patch.mode {
                cfg.mode = mode;
            }
            if let Some(trials) = patch.trials {
                cfg.trials = trials;
            }
            if let Some(record) = patch.record {
                cfg.record = record;
            }
        })
    }
}

/// Per-stage view of the bus, polled between vector-processing steps.
pub struct ConfigTap {
    bus: Arc<ConfigBus>,
    epoch: u64,
    current: Arc<Configuration>,
}

impl ConfigTap {
    pub fn new(bus: Arc<ConfigBus>) -> Self {
        let (epoch, current) = bus.snapshot_versioned();
        Self {
            bus,
            epoch,
            current,
        }
    }

    pub fn current(&self) -> &Arc<Configuration> {
        &self.current
    }

    /// Returns `(old, new)` when the record changed since the last poll.
    pub fn poll(&mut self) -> Option<(Arc<Configuration>, Arc<Configuration>)> {
        let (epoch, latest) = self.bus.snapshot_versioned();
        if epoch == self.epoch {
            return None;
        }
        self.epoch = epoch;
        let old = std::mem::replace(&mut self.current, latest.clone());
        Some((old, latest))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejected_update_leaves_prior_config_in_force() {
        let bus = ConfigBus::new(Configuration::default()).unwrap();
        let before = bus.snapshot();
        assert!(bus.set_vlen(0).is_err());
        assert!(bus.set_nsigma(-1.0).is_err());
        assert!(bus.set_bandwidth(0.0).is_err());
        assert!(bus.set_trials(0).is_err());
        assert_eq!(*bus.snapshot(), *before);
    }

    #[test]
    fn tap_observes_whole_record_after_patch() {
        let bus = Arc::new(ConfigBus::new(Configuration::default()).unwrap());
        let mut tap = ConfigTap::new(bus.clone());
        assert!(tap.poll().is_none());

        let patch = ConfigPatch {
            vlen: Some(1024),
            nsigma: Some(7.5),
            ..Default::default()
        };
        bus.apply(&patch).unwrap();

        let (old, new) = tap.poll().expect("change visible");
        assert_eq!(old.vlen, 512);
        assert_eq!(new.vlen, 1024);
        assert_eq!(new.nsigma, 7.5);
        assert!(tap.poll().is_none());
    }

    #[test]
    fn invalid_patch_is_rejected_atomically() {
        let bus = ConfigBus::new(Configuration::default()).unwrap();
        let patch = ConfigPatch {
            vlen: Some(2048),
            bandwidth_mhz: Some(-4.0),
            ..Default::default()
        };
        assert!(bus.apply(&patch).is_err());
        // The valid half of the patch must not leak through.
        assert_eq!(bus.snapshot().vlen, 512);
    }

    #[test]
    fn reset_policy_tracks_framing_fields_only() {
        let base = Configuration::default();
        let mut sigma_only = base.clone();
        sigma_only.nsigma = 9.0;
        sigma_only.mode = DetectorMode::Monitor;
        assert!(!requires_reset(&base, &sigma_only));

        let mut reframed = base.clone();
        reframed.vlen = 256;
        assert!(requires_reset(&base, &reframed));

        let mut retuned = base;
        retuned.frequency_mhz = 705.0;
        assert!(requires_reset(&retuned, &Configuration::default()));
    }
}
