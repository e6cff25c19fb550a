//! Gradient-boosted regression trees on logistic loss with Newton leaf weights.

use anyhow::{Result, anyhow, bail};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

const MIN_HESSIAN: f64 = 1e-16;
const PRIOR_CLAMP: f64 = 1e-6;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GbmParams {
    pub max_depth: usize,
    pub learning_rate: f64,
    pub n_trees: usize,
    /// Minimum hessian sum on each side of a split.
    pub min_child_weight: f64,
    /// Minimum loss reduction for a split to be kept.
    pub gamma: f64,
    pub subsample: f64,
    pub colsample: f64,
    /// L1 penalty on leaf weights.
    pub alpha: f64,
    /// L2 penalty on leaf weights.
    pub lambda: f64,
    pub seed: u64,
}

impl Default for GbmParams {
    fn default() -> Self {
        Self {
            max_depth: 5,
            learning_rate: 0.03,
            n_trees: 200,
            min_child_weight: 2.0,
            gamma: 0.05,
            subsample: 0.85,
            colsample: 0.75,
            alpha: 0.05,
            lambda: 0.5,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
enum Node {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tree {
    nodes: Vec<Node>,
}

impl Tree {
    /// Leaf value, already scaled by the learning rate. Values below the threshold go left.
    pub fn predict(&self, row: &[f64]) -> f64 {
        let mut idx = 0;
        loop {
            match self.nodes.get(idx) {
                Some(Node::Leaf { value }) => return *value,
                Some(Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                }) => {
                    let x = row.get(*feature).copied().unwrap_or(f64::NAN);
                    idx = if x < *threshold { *left } else { *right };
                }
                None => return 0.0,
            }
        }
    }

    pub fn depth(&self) -> usize {
        fn walk(nodes: &[Node], idx: usize) -> usize {
            match nodes.get(idx) {
                Some(Node::Split { left, right, .. }) => 1 + walk(nodes, *left).max(walk(nodes, *right)),
                _ => 0,
            }
        }
        walk(&self.nodes, 0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Gbm {
    pub n_features: usize,
    base_margin: f64,
    trees: Vec<Tree>,
    /// Mean split gain per feature, normalised to sum to 1.
    importance: Vec<f64>,
}

impl Gbm {
    /// Fits on `rows` (one feature vector per sample) against 0/1 `labels`.
    pub fn fit(rows: &[Vec<f64>], labels: &[f64], params: &GbmParams) -> Result<Self> {
        if rows.is_empty() {
            bail!("cannot fit a classifier on an empty dataset");
        }
        if rows.len() != labels.len() {
            bail!("{} rows but {} labels", rows.len(), labels.len());
        }
        let n_features = rows[0].len();
        if let Some(bad) = rows.iter().position(|r| r.len() != n_features) {
            bail!("row {bad} has {} features, expected {n_features}", rows[bad].len());
        }
        if !(0.0..=1.0).contains(&params.subsample) || params.subsample == 0.0 {
            return Err(anyhow!("subsample must be in (0, 1], got {}", params.subsample));
        }

        let mut rng = StdRng::seed_from_u64(params.seed);
        let prior = (labels.iter().sum::<f64>() / labels.len() as f64).clamp(PRIOR_CLAMP, 1.0 - PRIOR_CLAMP);
        let base_margin = (prior / (1.0 - prior)).ln();

        let mut margins = vec![base_margin; rows.len()];
        let mut trees = Vec::with_capacity(params.n_trees);
        let mut gain_sum = vec![0.0; n_features];
        let mut gain_count = vec![0usize; n_features];
        let n_cols = ((n_features as f64 * params.colsample).ceil() as usize).clamp(1, n_features.max(1));

        for _ in 0..params.n_trees {
            let mut grad = Vec::with_capacity(rows.len());
            let mut hess = Vec::with_capacity(rows.len());
            for (m, y) in margins.iter().zip(labels) {
                let p = sigmoid(*m);
                grad.push(p - y);
                hess.push((p * (1.0 - p)).max(MIN_HESSIAN));
            }

            let mut sample: Vec<usize> = (0..rows.len())
                .filter(|_| rng.r#gen::<f64>() < params.subsample)
                .collect();
            if sample.is_empty() {
                sample.push(rng.gen_range(0..rows.len()));
            }
            let mut columns: Vec<usize> = (0..n_features).collect();
            columns.shuffle(&mut rng);
            columns.truncate(n_cols);
            columns.sort_unstable();

            let mut builder = TreeBuilder {
                rows,
                grad: &grad,
                hess: &hess,
                columns: &columns,
                params,
                nodes: Vec::new(),
                gains: Vec::new(),
            };
            builder.grow(&sample, 0);
            for (feature, gain) in &builder.gains {
                gain_sum[*feature] += gain;
                gain_count[*feature] += 1;
            }
            let tree = Tree {
                nodes: builder.nodes,
            };

            for (m, row) in margins.iter_mut().zip(rows) {
                *m += tree.predict(row);
            }
            trees.push(tree);
        }

        let mean_gain: Vec<f64> = gain_sum
            .iter()
            .zip(&gain_count)
            .map(|(s, c)| if *c == 0 { 0.0 } else { s / *c as f64 })
            .collect();
        let total: f64 = mean_gain.iter().sum();
        let importance = if total > 0.0 {
            mean_gain.iter().map(|g| g / total).collect()
        } else {
            mean_gain
        };

        Ok(Self {
            n_features,
            base_margin,
            trees,
            importance,
        })
    }

    pub fn margin(&self, row: &[f64]) -> f64 {
        self.base_margin + self.trees.iter().map(|t| t.predict(row)).sum::<f64>()
    }

    /// Probability of the positive class.
    pub fn predict_proba(&self, row: &[f64]) -> f64 {
        sigmoid(self.margin(row))
    }

    pub fn predict_many(&self, rows: &[Vec<f64>]) -> Vec<f64> {
        rows.par_iter().map(|r| self.predict_proba(r)).collect()
    }

    pub fn feature_importance(&self) -> &[f64] {
        &self.importance
    }

    pub fn trees(&self) -> &[Tree] {
        &self.trees
    }
}

pub fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// Soft-thresholded gradient sum for the L1 penalty.
fn l1_shrink(g: f64, alpha: f64) -> f64 {
    if g > alpha {
        g - alpha
    } else if g < -alpha {
        g + alpha
    } else {
        0.0
    }
}

struct Candidate {
    feature: usize,
    threshold: f64,
    gain: f64,
}

struct TreeBuilder<'a> {
    rows: &'a [Vec<f64>],
    grad: &'a [f64],
    hess: &'a [f64],
    columns: &'a [usize],
    params: &'a GbmParams,
    nodes: Vec<Node>,
    gains: Vec<(usize, f64)>,
}

impl TreeBuilder<'_> {
    fn score(&self, g: f64, h: f64) -> f64 {
        let t = l1_shrink(g, self.params.alpha);
        t * t / (h + self.params.lambda)
    }

    fn leaf_value(&self, g: f64, h: f64) -> f64 {
        -l1_shrink(g, self.params.alpha) / (h + self.params.lambda) * self.params.learning_rate
    }

    fn grow(&mut self, sample: &[usize], depth: usize) -> usize {
        let g: f64 = sample.iter().map(|&i| self.grad[i]).sum();
        let h: f64 = sample.iter().map(|&i| self.hess[i]).sum();

        let split = if depth < self.params.max_depth && sample.len() >= 2 {
            self.best_split(sample, g, h)
        } else {
            None
        };
        let Some(split) = split else {
            let value = self.leaf_value(g, h);
            self.nodes.push(Node::Leaf { value });
            return self.nodes.len() - 1;
        };

        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = sample
            .iter()
            .copied()
            .partition(|&i| self.rows[i][split.feature] < split.threshold);

        let idx = self.nodes.len();
        self.nodes.push(Node::Leaf { value: 0.0 });
        self.gains.push((split.feature, split.gain));
        let left = self.grow(&left_rows, depth + 1);
        let right = self.grow(&right_rows, depth + 1);
        self.nodes[idx] = Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
        };
        idx
    }

    fn best_split(&self, sample: &[usize], g: f64, h: f64) -> Option<Candidate> {
        let parent = self.score(g, h);
        self.columns
            .par_iter()
            .filter_map(|&feature| self.best_for_feature(feature, sample, g, h, parent))
            // Ties go to the lower feature index so the result does not depend on scheduling.
            .reduce_with(|a, b| {
                if b.gain > a.gain || (b.gain == a.gain && b.feature < a.feature) {
                    b
                } else {
                    a
                }
            })
    }

    fn best_for_feature(
        &self,
        feature: usize,
        sample: &[usize],
        g: f64,
        h: f64,
        parent: f64,
    ) -> Option<Candidate> {
        let mut points: Vec<(f64, f64, f64)> = sample
            .iter()
            .map(|&i| (self.rows[i][feature], self.grad[i], self.hess[i]))
            .filter(|(x, _, _)| x.is_finite())
            .collect();
        points.sort_by(|a, b| a.0.total_cmp(&b.0));

        let mcw = self.params.min_child_weight;
        let mut best: Option<Candidate> = None;
        let (mut gl, mut hl) = (0.0, 0.0);
        for pair in points.windows(2) {
            let (x, gi, hi) = pair[0];
            gl += gi;
            hl += hi;
            let next = pair[1].0;
            if next <= x {
                continue;
            }
            let hr = h - hl;
            if hl < mcw || hr < mcw {
                continue;
            }
            let gain = 0.5 * (self.score(gl, hl) + self.score(g - gl, hr) - parent) - self.params.gamma;
            if gain > 0.0 && best.as_ref().is_none_or(|b| gain > b.gain) {
                best = Some(Candidate {
                    feature,
                    threshold: (x + next) / 2.0,
                    gain,
                });
            }
        }
        best
    }
}
