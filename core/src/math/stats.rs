/// Exponentially-weighted running estimate of mean and variance.
///
/// The weight `alpha` sets the effective trailing window (~1/alpha updates).
/// Significance is zero until `WARMUP` updates have been absorbed and
/// whenever the estimated deviation is zero, so constant input can never
/// divide by zero.
#[derive(Debug, Clone)]
pub struct RunningStats {
    alpha: f32,
    mean: f32,
    var: f32,
    count: u64,
}

/// Updates absorbed before significance is reported.
const WARMUP: u64 = 8;

impl RunningStats {
    pub fn new(alpha: f32) -> Self {
        Self {
            alpha,
            mean: 0.0,
            var: 0.0,
            count: 0,
        }
    }

    pub fn update(&mut self, value: f32) {
        self.count += 1;
        if self.count == 1 {
            self.mean = value;
            self.var = 0.0;
            return;
        }
        // Early updates use the sample weight so the estimate settles fast,
        // then the exponential weight takes over.
        let alpha = self.alpha.max(1.0 / self.count as f32);
        let delta = value - self.mean;
        self.mean += alpha * delta;
        self.var = (1.0 - alpha) * (self.var + alpha * delta * delta);
    }

    pub fn mean(&self) -> f32 {
        self.mean
    }

    pub fn sigma(&self) -> f32 {
        self.var.max(0.0).sqrt()
    }

    /// Standard score of `value` against the current estimate, or 0 while
    /// warming up or when the deviation is degenerate.
    pub fn significance(&self, value: f32) -> f32 {
        if self.count < WARMUP {
            return 0.0;
        }
        let sigma = self.sigma();
        if sigma <= 0.0 {
            return 0.0;
        }
        (value - self.mean) / sigma
    }

    pub fn is_warm(&self) -> bool {
        self.count >= WARMUP
    }

    pub fn reset(&mut self) {
        self.mean = 0.0;
        self.var = 0.0;
        self.count = 0;
    }
}
