use crate::config::{ConfigBus, ConfigTap};
use crate::prelude::VectorPayload;
use num_complex::Complex32;
use std::sync::Arc;

/// Frames the flat sample stream into windows of the current `vlen`.
///
/// A window is always homogeneous in its framing length: when `vlen`
/// changes, the in-flight partial window is discarded rather than carried
/// across the boundary.
pub struct Vectorizer {
    tap: ConfigTap,
    pending: Vec<Complex32>,
    pending_mjd: f64,
}

impl Vectorizer {
    pub fn new(bus: Arc<ConfigBus>) -> Self {
        Self {
            tap: ConfigTap::new(bus),
            pending: Vec::new(),
            pending_mjd: 0.0,
        }
    }

    /// Absorbs a block of samples stamped with the block's arrival time and
    /// returns every completed window.
    pub fn push(&mut self, samples: &[Complex32], mjd: f64) -> Vec<VectorPayload> {
        if let Some((old, new)) = self.tap.poll() {
            if old.vlen != new.vlen {
                log::debug!(
                    "vectorizer reframing {} -> {}, dropping {} pending samples",
                    old.vlen,
                    new.vlen,
                    self.pending.len()
                );
                self.pending.clear();
            }
        }
        let vlen = self.tap.current().vlen;

        let mut out = Vec::new();
        for &sample in samples {
            if self.pending.is_empty() {
                self.pending_mjd = mjd;
            }
            self.pending.push(sample);
            if self.pending.len() == vlen {
                out.push(VectorPayload {
                    samples: std::mem::take(&mut self.pending),
                    mjd: self.pending_mjd,
                });
            }
        }
        out
    }

    /// Inverse operation: re-flattens windows into a sample stream for
    /// consumers that want per-sample values.
    pub fn flatten(payloads: &[VectorPayload]) -> Vec<Complex32> {
        payloads
            .iter()
            .flat_map(|payload| payload.samples.iter().copied())
            .collect()
    }
}
