// src/metrics.rs
//
// Small, dependency-free online metrics helper for batch evaluation.
// OnlineStats: Welford running mean/variance + min/max.
// Intentionally simple + deterministic.

#[derive(Debug, Clone, Copy)]
pub struct OnlineStats {
    n: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl Default for OnlineStats {
    fn default() -> Self {
        Self {
            n: 0,
            mean: 0.0,
            m2: 0.0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
        }
    }
}

impl OnlineStats {
    /// Adds a sample if finite. Non-finite samples are ignored.
    pub fn add(&mut self, x: f64) {
        if !x.is_finite() {
            return;
        }

        self.n += 1;
        self.min = self.min.min(x);
        self.max = self.max.max(x);

        // Welford online variance.
        let delta = x - self.mean;
        self.mean += delta / (self.n as f64);
        let delta2 = x - self.mean;
        self.m2 += delta * delta2;
    }

    pub fn n(&self) -> u64 {
        self.n
    }

    pub fn mean(&self) -> f64 {
        if self.n == 0 {
            0.0
        } else {
            self.mean
        }
    }

    pub fn min(&self) -> f64 {
        if self.n == 0 {
            0.0
        } else {
            self.min
        }
    }

    pub fn max(&self) -> f64 {
        if self.n == 0 {
            0.0
        } else {
            self.max
        }
    }

    /// Population variance (divide by n).
    pub fn variance_population(&self) -> f64 {
        if self.n == 0 {
            0.0
        } else {
            self.m2 / (self.n as f64)
        }
    }

    pub fn stddev_population(&self) -> f64 {
        self.variance_population().sqrt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mean_min_max_over_samples() {
        let mut stats = OnlineStats::default();
        for x in [1.0, 2.0, 3.0, 4.0] {
            stats.add(x);
        }
        assert_eq!(stats.n(), 4);
        assert!((stats.mean() - 2.5).abs() < 1e-12);
        assert_eq!(stats.min(), 1.0);
        assert_eq!(stats.max(), 4.0);
        assert!((stats.variance_population() - 1.25).abs() < 1e-12);
    }

    #[test]
    fn non_finite_samples_ignored() {
        let mut stats = OnlineStats::default();
        stats.add(f64::NAN);
        stats.add(f64::INFINITY);
        stats.add(2.0);
        assert_eq!(stats.n(), 1);
        assert_eq!(stats.mean(), 2.0);
    }

    #[test]
    fn empty_stats_read_as_zero() {
        let stats = OnlineStats::default();
        assert_eq!(stats.mean(), 0.0);
        assert_eq!(stats.min(), 0.0);
        assert_eq!(stats.max(), 0.0);
    }
}
