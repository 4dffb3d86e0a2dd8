use crate::config::Configuration;
use ndarray::Array2;

/// Cold-plasma dispersion constant: delay in ms for frequencies in MHz and
/// dispersion measure in pc cm^-3.
const DISPERSION_CONST_MS: f64 = 4.148808e6;

/// Dispersion-measure spacing between consecutive trials, pc cm^-3.
/// Trial i searches DM = (i + 1) * DM_TRIAL_STEP.
pub const DM_TRIAL_STEP: f64 = 5.0;

/// Searches a bank of dispersion-measure trials over a rolling
/// dynamic-spectrum buffer.
///
/// Each incoming power spectrum becomes one row of the buffer. Once the
/// buffer covers the largest trial delay, every push yields one summed
/// profile per trial, with each channel read back along that trial's delay
/// track relative to the newest row.
pub struct Dedisperser {
    /// Whole-spectrum delays, `[trial][channel]`, relative to the top of
    /// the band.
    delays: Vec<Vec<usize>>,
    buffer: Array2<f32>,
    cursor: usize,
    filled: usize,
}

impl Dedisperser {
    pub fn new(cfg: &Configuration) -> Self {
        Self::with_dm_step(cfg, DM_TRIAL_STEP)
    }

    pub fn with_dm_step(cfg: &Configuration, dm_step: f64) -> Self {
        let vlen = cfg.vlen;
        let f_top = cfg.frequency_mhz + cfg.bandwidth_mhz / 2.0;
        let channel_width = cfg.bandwidth_mhz / vlen as f64;
        // Duration of one spectrum in ms at the complex sample rate.
        let t_samp_ms = vlen as f64 / (cfg.bandwidth_mhz * 1e3);

        let mut delays = Vec::with_capacity(cfg.trials);
        for trial in 0..cfg.trials {
            let dm = (trial + 1) as f64 * dm_step;
            let per_channel = (0..vlen)
                .map(|ch| {
                    let f_ch = f_top - (vlen - ch) as f64 * channel_width + channel_width / 2.0;
                    let delay_ms =
                        DISPERSION_CONST_MS * dm * (1.0 / (f_ch * f_ch) - 1.0 / (f_top * f_top));
                    (delay_ms / t_samp_ms).round().max(0.0) as usize
                })
                .collect::<Vec<_>>();
            delays.push(per_channel);
        }

        let depth = delays
            .iter()
            .flat_map(|trial| trial.iter().copied())
            .max()
            .unwrap_or(0)
            + 1;

        Self {
            delays,
            buffer: Array2::zeros((depth, vlen)),
            cursor: 0,
            filled: 0,
        }
    }

    /// Rows the buffer must hold before trial sums are produced.
    pub fn depth(&self) -> usize {
        self.buffer.nrows()
    }

    pub fn is_warm(&self) -> bool {
        self.filled >= self.depth()
    }

    pub fn delays(&self) -> &[Vec<usize>] {
        &self.delays
    }

    /// Absorbs one power spectrum; once warm, returns the per-trial
    /// delay-compensated channel means.
    pub fn push(&mut self, power: &[f32]) -> Option<Vec<f32>> {
        let depth = self.depth();
        let vlen = self.buffer.ncols();
        for ch in 0..vlen {
            self.buffer[[self.cursor, ch]] = power.get(ch).copied().unwrap_or(0.0);
        }
        let newest = self.cursor;
        self.cursor = (self.cursor + 1) % depth;
        self.filled += 1;
        if self.filled < depth {
            return None;
        }

        let sums = self
            .delays
            .iter()
            .map(|per_channel| {
                let total: f32 = per_channel
                    .iter()
                    .enumerate()
                    .map(|(ch, &delay)| self.buffer[[(newest + depth - delay) % depth, ch]])
                    .sum();
                total / vlen as f32
            })
            .collect();
        Some(sums)
    }

    pub fn reset(&mut self) {
        self.buffer.fill(0.0);
        self.cursor = 0;
        self.filled = 0;
    }
}

/// Index of the maximal score; ties resolve to the lowest index.
pub fn best_trial(scores: &[f32]) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (idx, &score) in scores.iter().enumerate() {
        match best {
            Some((_, top)) if score <= top => {}
            _ => best = Some((idx, score)),
        }
    }
    best.map(|(idx, _)| idx)
}
