use anyhow::Context;
use burstcore::config::Configuration;
use burstcore::prelude::{DetectorMode, ObserverInfo, RecordMode};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Full run description: pipeline configuration, station metadata, and the
/// synthetic source parameters. Loadable from YAML; every field defaults.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorSettings {
    pub vlen: usize,
    pub nsigma: f32,
    pub frequency_mhz: f64,
    pub bandwidth_mhz: f64,
    pub mode: DetectorMode,
    pub trials: usize,
    pub record: RecordMode,

    pub observer: String,
    pub telescope: String,
    pub azimuth_deg: f32,
    pub elevation_deg: f32,

    pub device: String,
    pub ledger: String,
    pub seed: u64,
    pub noise: f32,
    /// Inject a synthetic burst every N windows; None leaves pure noise.
    pub burst_period: Option<usize>,
    pub burst_amplitude: f32,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            vlen: 512,
            nsigma: 5.0,
            frequency_mhz: 1419.0,
            bandwidth_mhz: 6.0,
            mode: DetectorMode::Detect,
            trials: 1,
            record: RecordMode::Wait,
            observer: "observers_save".into(),
            telescope: "telescope_save".into(),
            azimuth_deg: 180.0,
            elevation_deg: 75.0,
            device: "synthetic,seed=0".into(),
            ledger: "events.jsonl".into(),
            seed: 0,
            noise: 1.0,
            burst_period: None,
            burst_amplitude: 50.0,
        }
    }
}

impl MonitorSettings {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref)
            .with_context(|| format!("reading settings {}", path_ref.display()))?;
        let settings: MonitorSettings = serde_yaml::from_str(&contents)
            .with_context(|| format!("parsing settings {}", path_ref.display()))?;
        Ok(settings)
    }

    pub fn to_configuration(&self) -> Configuration {
        Configuration {
            vlen: self.vlen,
            nsigma: self.nsigma,
            frequency_mhz: self.frequency_mhz,
            bandwidth_mhz: self.bandwidth_mhz,
            mode: self.mode,
            trials: self.trials,
            record: self.record,
        }
    }

    pub fn station(&self) -> ObserverInfo {
        ObserverInfo {
            observer: self.observer.clone(),
            telescope: self.telescope.clone(),
            azimuth_deg: self.azimuth_deg,
            elevation_deg: self.elevation_deg,
        }
    }
}
