use crate::config::{ConfigBus, ConfigTap};
use crate::prelude::{DetectionResult, Event, ObserverInfo, RecordMode};
use std::sync::Arc;

/// Decides which detections become ledger events.
///
/// A result is recorded iff it passed threshold and the record mode is
/// `Write` at the moment it arrives. Mode changes apply to subsequent
/// results only; nothing already dropped is recovered.
pub struct EventGate {
    tap: ConfigTap,
    info: ObserverInfo,
}

impl EventGate {
    pub fn new(bus: Arc<ConfigBus>, info: ObserverInfo) -> Self {
        Self {
            tap: ConfigTap::new(bus),
            info,
        }
    }

    pub fn offer(&mut self, result: &DetectionResult) -> Option<Event> {
        self.tap.poll();
        let cfg = self.tap.current();
        if !result.passed || cfg.record != RecordMode::Write {
            return None;
        }
        // Record mode is read at arrival; the observational metadata comes
        // from the result itself, since the configuration may have moved
        // while it sat in the queue.
        Some(Event {
            mjd: result.mjd,
            observer: self.info.observer.clone(),
            telescope: self.info.telescope.clone(),
            azimuth_deg: self.info.azimuth_deg,
            elevation_deg: self.info.elevation_deg,
            frequency_mhz: result.frequency_mhz,
            bandwidth_mhz: result.bandwidth_mhz,
            vlen: result.power.len(),
            trial: result.best_trial,
            significance: result.significance,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Configuration;

    fn passing_result() -> DetectionResult {
        DetectionResult {
            mjd: 58_765.25,
            power: vec![0.0; 512],
            frequency_mhz: 1419.0,
            bandwidth_mhz: 6.0,
            significance: 8.2,
            passed: true,
            best_trial: Some(4),
            ..DetectionResult::default()
        }
    }

    fn station() -> ObserverInfo {
        ObserverInfo {
            observer: "glen".into(),
            telescope: "horn-1".into(),
            azimuth_deg: 180.0,
            elevation_deg: 75.0,
        }
    }

    #[test]
    fn wait_mode_drops_passing_results() {
        let bus = Arc::new(ConfigBus::new(Configuration::default()).unwrap());
        let mut gate = EventGate::new(bus, station());
        assert!(gate.offer(&passing_result()).is_none());
    }

    #[test]
    fn write_mode_records_passing_results_with_metadata() {
        let cfg = Configuration {
            record: RecordMode::Write,
            ..Configuration::default()
        };
        let bus = Arc::new(ConfigBus::new(cfg).unwrap());
        let mut gate = EventGate::new(bus, station());
        let event = gate.offer(&passing_result()).expect("recorded");
        assert_eq!(event.telescope, "horn-1");
        assert_eq!(event.trial, Some(4));
        assert_eq!(event.vlen, 512);
        assert_eq!(event.significance, 8.2);
    }

    #[test]
    fn failed_results_never_become_events() {
        let cfg = Configuration {
            record: RecordMode::Write,
            ..Configuration::default()
        };
        let bus = Arc::new(ConfigBus::new(cfg).unwrap());
        let mut gate = EventGate::new(bus, station());
        let mut result = passing_result();
        result.passed = false;
        assert!(gate.offer(&result).is_none());
    }

    #[test]
    fn queued_result_keeps_detection_time_metadata_across_retune() {
        let cfg = Configuration {
            record: RecordMode::Write,
            ..Configuration::default()
        };
        let bus = Arc::new(ConfigBus::new(cfg).unwrap());
        let mut gate = EventGate::new(bus.clone(), station());

        // The configuration moves while the result waits in the queue.
        bus.set_vlen(1024).unwrap();
        bus.set_frequency(705.0).unwrap();

        let event = gate.offer(&passing_result()).expect("recorded");
        assert_eq!(event.vlen, 512);
        assert_eq!(event.frequency_mhz, 1419.0);
        assert_eq!(event.bandwidth_mhz, 6.0);
    }

    #[test]
    fn toggling_to_write_is_not_retroactive() {
        let bus = Arc::new(ConfigBus::new(Configuration::default()).unwrap());
        let mut gate = EventGate::new(bus.clone(), station());

        assert!(gate.offer(&passing_result()).is_none());
        bus.set_record(RecordMode::Write).unwrap();
        // Only results arriving after the toggle are recorded, once each.
        assert!(gate.offer(&passing_result()).is_some());
        bus.set_record(RecordMode::Wait).unwrap();
        assert!(gate.offer(&passing_result()).is_none());
    }
}
