//! Probability metrics, reliability bins and isotonic calibration for binary outcomes.

use serde::{Deserialize, Serialize};

const EPS: f64 = 1e-12;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Metrics {
    pub samples: usize,
    pub brier: f64,
    pub log_loss: f64,
    pub accuracy: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CalibrationBin {
    pub bucket_start: f64,
    pub bucket_end: f64,
    pub count: usize,
    pub avg_pred: f64,
    pub actual_rate: f64,
}

/// `predictions` are probabilities of the positive class, `outcomes` are 0/1.
pub fn evaluate(predictions: &[f64], outcomes: &[f64]) -> Metrics {
    if predictions.is_empty() || predictions.len() != outcomes.len() {
        return Metrics::default();
    }

    let mut brier_sum = 0.0_f64;
    let mut log_loss_sum = 0.0_f64;
    let mut correct = 0usize;

    for (p, y) in predictions.iter().zip(outcomes) {
        brier_sum += (p - y).powi(2);
        let p = p.clamp(EPS, 1.0 - EPS);
        log_loss_sum += -(y * p.ln() + (1.0 - y) * (1.0 - p).ln());
        if (p > 0.5) == (*y > 0.5) {
            correct += 1;
        }
    }

    let n = predictions.len() as f64;
    Metrics {
        samples: predictions.len(),
        brier: brier_sum / n,
        log_loss: log_loss_sum / n,
        accuracy: correct as f64 / n,
    }
}

pub fn calibration_bins(predictions: &[f64], outcomes: &[f64], bins: usize) -> Vec<CalibrationBin> {
    let bins = bins.max(2);
    let mut counts = vec![0usize; bins];
    let mut pred_sum = vec![0.0_f64; bins];
    let mut actual_sum = vec![0.0_f64; bins];

    for (p, y) in predictions.iter().zip(outcomes) {
        let p = p.clamp(0.0, 1.0);
        let idx = ((p * bins as f64).floor() as usize).min(bins - 1);
        counts[idx] += 1;
        pred_sum[idx] += p;
        actual_sum[idx] += y;
    }

    (0..bins)
        .map(|i| {
            let count = counts[i];
            let (avg_pred, actual_rate) = if count > 0 {
                (pred_sum[i] / count as f64, actual_sum[i] / count as f64)
            } else {
                (0.0, 0.0)
            };
            CalibrationBin {
                bucket_start: i as f64 / bins as f64,
                bucket_end: (i + 1) as f64 / bins as f64,
                count,
                avg_pred,
                actual_rate,
            }
        })
        .collect()
}

/// Monotone map from raw scores to probabilities, fit with pool-adjacent-violators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IsotonicCalibrator {
    /// Block centres, strictly increasing.
    xs: Vec<f64>,
    /// Non-decreasing fitted values.
    ys: Vec<f64>,
}

struct Block {
    sum_x: f64,
    sum_y: f64,
    weight: f64,
}

impl Block {
    fn mean_y(&self) -> f64 {
        self.sum_y / self.weight
    }
}

impl IsotonicCalibrator {
    /// Identity map, used when there is nothing to fit on.
    pub fn identity() -> Self {
        Self {
            xs: vec![0.0, 1.0],
            ys: vec![0.0, 1.0],
        }
    }

    pub fn fit(scores: &[f64], outcomes: &[f64]) -> Self {
        let mut pairs: Vec<(f64, f64)> = scores
            .iter()
            .zip(outcomes)
            .filter(|(x, _)| x.is_finite())
            .map(|(x, y)| (*x, *y))
            .collect();
        if pairs.is_empty() {
            return Self::identity();
        }
        pairs.sort_by(|a, b| a.0.total_cmp(&b.0));

        let mut blocks: Vec<Block> = Vec::with_capacity(pairs.len());
        for (x, y) in pairs {
            // Equal scores share one block so the map stays a function.
            if let Some(last) = blocks.last_mut()
                && last.sum_x / last.weight == x
            {
                last.sum_x += x;
                last.sum_y += y;
                last.weight += 1.0;
            } else {
                blocks.push(Block {
                    sum_x: x,
                    sum_y: y,
                    weight: 1.0,
                });
            }
            while blocks.len() >= 2 {
                let n = blocks.len();
                if blocks[n - 2].mean_y() <= blocks[n - 1].mean_y() {
                    break;
                }
                let Some(top) = blocks.pop() else { break };
                if let Some(prev) = blocks.last_mut() {
                    prev.sum_x += top.sum_x;
                    prev.sum_y += top.sum_y;
                    prev.weight += top.weight;
                }
            }
        }

        Self {
            xs: blocks.iter().map(|b| b.sum_x / b.weight).collect(),
            ys: blocks.iter().map(Block::mean_y).collect(),
        }
    }

    /// Linear interpolation between block centres, flat beyond the ends.
    pub fn apply(&self, score: f64) -> f64 {
        let (Some(&first_x), Some(&last_x)) = (self.xs.first(), self.xs.last()) else {
            return score;
        };
        if score <= first_x {
            return self.ys[0];
        }
        if score >= last_x {
            return self.ys[self.ys.len() - 1];
        }
        let hi = self.xs.partition_point(|x| *x <= score);
        let lo = hi - 1;
        let (x0, x1) = (self.xs[lo], self.xs[hi]);
        let (y0, y1) = (self.ys[lo], self.ys[hi]);
        if x1 <= x0 {
            return y0;
        }
        y0 + (y1 - y0) * (score - x0) / (x1 - x0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn perfect_predictions_have_zero_brier() {
        let m = evaluate(&[1.0, 0.0, 1.0], &[1.0, 0.0, 1.0]);
        assert_eq!(m.samples, 3);
        assert_eq!(m.brier, 0.0);
        assert_eq!(m.accuracy, 1.0);
        assert!(m.log_loss < 1e-9);
    }

    #[test]
    fn coin_flip_metrics() {
        let m = evaluate(&[0.5, 0.5], &[1.0, 0.0]);
        assert!((m.brier - 0.25).abs() < 1e-12);
        assert!((m.log_loss - std::f64::consts::LN_2).abs() < 1e-12);
        assert_eq!(evaluate(&[], &[]), Metrics::default());
    }

    #[test]
    fn bins_collect_predictions() {
        let bins = calibration_bins(&[0.05, 0.15, 0.95, 1.0], &[0.0, 1.0, 1.0, 1.0], 10);
        assert_eq!(bins.len(), 10);
        assert_eq!(bins[0].count, 1);
        assert_eq!(bins[9].count, 2);
        assert_eq!(bins[9].actual_rate, 1.0);
    }

    #[test]
    fn isotonic_pools_violators() {
        let cal = IsotonicCalibrator::fit(&[0.1, 0.2, 0.3, 0.4], &[0.0, 1.0, 0.0, 1.0]);
        // 0.2 and 0.3 pool into one block at 0.25 with mean 0.5
        assert_eq!(cal.xs, vec![0.1, 0.25, 0.4]);
        assert_eq!(cal.ys, vec![0.0, 0.5, 1.0]);
        assert!((cal.apply(0.175) - 0.25).abs() < 1e-12);
        assert_eq!(cal.apply(-1.0), 0.0);
        assert_eq!(cal.apply(2.0), 1.0);
    }

    #[test]
    fn isotonic_output_is_monotone() {
        let scores: Vec<f64> = (0..50).map(|i| i as f64 / 50.0).collect();
        let outcomes: Vec<f64> = (0..50).map(|i| ((i * 7) % 3 == 0) as u8 as f64).collect();
        let cal = IsotonicCalibrator::fit(&scores, &outcomes);
        let mut last = f64::NEG_INFINITY;
        for i in 0..=100 {
            let p = cal.apply(i as f64 / 100.0);
            assert!(p >= last);
            last = p;
        }
    }

    #[test]
    fn empty_fit_is_identity() {
        let cal = IsotonicCalibrator::fit(&[], &[]);
        assert_eq!(cal.apply(0.3), 0.3);
    }
}
