//! Incremental score-distribution statistics.
//!
//! Gene counts run to the thousands, so distributions are accumulated in
//! O(1) per value (count/min/max/sum/sum-of-squares) instead of buffering
//! every score. Accumulators merge, so parallel batches can fold their
//! partials into one job-level aggregation point.

use serde::Serialize;

/// Running accumulator over the valid (finite) values of one score column.
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: usize,
    min: f64,
    max: f64,
    sum: f64,
    sum_sq: f64,
}

impl RunningStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a value. Non-finite values (NaN, ±inf) are ignored; only
    /// valid scores participate in the distribution.
    pub fn push(&mut self, value: f64) {
        if !value.is_finite() {
            return;
        }
        if self.count == 0 {
            self.min = value;
            self.max = value;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);
        }
        self.count += 1;
        self.sum += value;
        self.sum_sq += value * value;
    }

    /// Fold another accumulator into this one.
    pub fn merge(&mut self, other: &RunningStats) {
        if other.count == 0 {
            return;
        }
        if self.count == 0 {
            *self = other.clone();
            return;
        }
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
        self.count += other.count;
        self.sum += other.sum;
        self.sum_sq += other.sum_sq;
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn mean(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / self.count as f64)
    }

    /// Sample standard deviation (ddof = 1); 0.0 for a single value.
    pub fn std_dev(&self) -> Option<f64> {
        match self.count {
            0 => None,
            1 => Some(0.0),
            n => {
                let n = n as f64;
                let var = (self.sum_sq - self.sum * self.sum / n) / (n - 1.0);
                // Guard against tiny negative variance from rounding.
                Some(var.max(0.0).sqrt())
            }
        }
    }

    /// Summarize against the total row count of the scored dataset.
    pub fn summarize(&self, total_rows: usize) -> ScoreDistribution {
        let valid_percentage = if total_rows == 0 {
            0.0
        } else {
            self.count as f64 / total_rows as f64 * 100.0
        };
        ScoreDistribution {
            mean: self.mean(),
            min: (self.count > 0).then_some(self.min),
            max: (self.count > 0).then_some(self.max),
            std_dev: self.std_dev(),
            valid_count: self.count,
            valid_percentage,
        }
    }
}

/// Distribution summary of one score column, over valid values only.
///
/// Fields are `None` when the column had no valid value at all.
#[derive(Debug, Clone, Serialize)]
pub struct ScoreDistribution {
    pub mean: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub std_dev: Option<f64>,
    pub valid_count: usize,
    pub valid_percentage: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_values() {
        let mut stats = RunningStats::new();
        for v in [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0] {
            stats.push(v);
        }
        assert_eq!(stats.count(), 8);
        assert_eq!(stats.mean(), Some(5.0));
        let dist = stats.summarize(8);
        assert_eq!(dist.min, Some(2.0));
        assert_eq!(dist.max, Some(9.0));
        // Sample std dev of this set is sqrt(32/7).
        let expected = (32.0f64 / 7.0).sqrt();
        assert!((dist.std_dev.unwrap() - expected).abs() < 1e-12);
        assert_eq!(dist.valid_percentage, 100.0);
    }

    #[test]
    fn nan_and_infinite_values_ignored() {
        let mut stats = RunningStats::new();
        stats.push(1.0);
        stats.push(f64::NAN);
        stats.push(f64::INFINITY);
        stats.push(3.0);
        assert_eq!(stats.count(), 2);
        assert_eq!(stats.mean(), Some(2.0));
    }

    #[test]
    fn empty_summarizes_to_none_fields() {
        let dist = RunningStats::new().summarize(10);
        assert_eq!(dist.mean, None);
        assert_eq!(dist.min, None);
        assert_eq!(dist.max, None);
        assert_eq!(dist.std_dev, None);
        assert_eq!(dist.valid_count, 0);
        assert_eq!(dist.valid_percentage, 0.0);
    }

    #[test]
    fn single_value_std_dev_is_zero() {
        let mut stats = RunningStats::new();
        stats.push(4.2);
        assert_eq!(stats.std_dev(), Some(0.0));
    }

    #[test]
    fn merge_matches_sequential_accumulation() {
        let values = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];

        let mut sequential = RunningStats::new();
        for v in values {
            sequential.push(v);
        }

        let mut left = RunningStats::new();
        let mut right = RunningStats::new();
        for v in &values[..3] {
            left.push(*v);
        }
        for v in &values[3..] {
            right.push(*v);
        }
        left.merge(&right);

        assert_eq!(left.count(), sequential.count());
        assert_eq!(left.mean(), sequential.mean());
        assert_eq!(left.std_dev(), sequential.std_dev());
        let (l, s) = (left.summarize(6), sequential.summarize(6));
        assert_eq!(l.min, s.min);
        assert_eq!(l.max, s.max);
    }

    #[test]
    fn merge_into_empty() {
        let mut empty = RunningStats::new();
        let mut other = RunningStats::new();
        other.push(2.0);
        other.push(4.0);
        empty.merge(&other);
        assert_eq!(empty.count(), 2);
        assert_eq!(empty.mean(), Some(3.0));
    }

    #[test]
    fn valid_percentage_accounts_for_invalid_rows() {
        let mut stats = RunningStats::new();
        stats.push(1.0);
        stats.push(2.0);
        let dist = stats.summarize(8);
        assert_eq!(dist.valid_count, 2);
        assert_eq!(dist.valid_percentage, 25.0);
    }
}
