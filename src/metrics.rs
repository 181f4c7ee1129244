//! Classification metrics: per-class report and ROC curve

use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Precision, recall and F1 for one class
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

/// Text-renderable summary of a binary classifier's predictions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationReport {
    /// Metrics for class 0 and class 1
    pub classes: [ClassMetrics; 2],
    pub accuracy: f64,
    pub macro_avg: ClassMetrics,
    pub weighted_avg: ClassMetrics,
}

impl ClassificationReport {
    /// Build the report from true and predicted 0/1 labels
    ///
    /// Ratios with a zero denominator are reported as 0.
    pub fn new(truth: &Array1<usize>, predicted: &Array1<usize>) -> Self {
        let mut counts = [[0usize; 2]; 2];
        for (&t, &p) in truth.iter().zip(predicted.iter()) {
            if t < 2 && p < 2 {
                counts[t][p] += 1;
            }
        }

        let per_class = |class: usize| {
            let true_positive = counts[class][class] as f64;
            let predicted_total = (counts[0][class] + counts[1][class]) as f64;
            let support = counts[class][0] + counts[class][1];
            let precision = ratio(true_positive, predicted_total);
            let recall = ratio(true_positive, support as f64);
            ClassMetrics {
                precision,
                recall,
                f1: ratio(2.0 * precision * recall, precision + recall),
                support,
            }
        };
        let classes = [per_class(0), per_class(1)];
        let total = classes[0].support + classes[1].support;

        let macro_avg = ClassMetrics {
            precision: (classes[0].precision + classes[1].precision) / 2.0,
            recall: (classes[0].recall + classes[1].recall) / 2.0,
            f1: (classes[0].f1 + classes[1].f1) / 2.0,
            support: total,
        };
        let weighted = |metric: fn(&ClassMetrics) -> f64| {
            ratio(
                classes.iter().map(|c| metric(c) * c.support as f64).sum(),
                total as f64,
            )
        };
        let weighted_avg = ClassMetrics {
            precision: weighted(|c| c.precision),
            recall: weighted(|c| c.recall),
            f1: weighted(|c| c.f1),
            support: total,
        };

        Self {
            classes,
            accuracy: ratio((counts[0][0] + counts[1][1]) as f64, total as f64),
            macro_avg,
            weighted_avg,
        }
    }
}

impl fmt::Display for ClassificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{:>14} {:>9} {:>9} {:>9} {:>9}", "", "precision", "recall", "f1-score", "support")?;
        writeln!(f)?;
        for (class, m) in self.classes.iter().enumerate() {
            writeln!(
                f,
                "{:>14} {:>9.2} {:>9.2} {:>9.2} {:>9}",
                class, m.precision, m.recall, m.f1, m.support
            )?;
        }
        writeln!(f)?;
        writeln!(
            f,
            "{:>14} {:>9} {:>9} {:>9.2} {:>9}",
            "accuracy", "", "", self.accuracy, self.macro_avg.support
        )?;
        for (name, m) in [("macro avg", &self.macro_avg), ("weighted avg", &self.weighted_avg)] {
            writeln!(
                f,
                "{:>14} {:>9.2} {:>9.2} {:>9.2} {:>9}",
                name, m.precision, m.recall, m.f1, m.support
            )?;
        }
        Ok(())
    }
}

/// Receiver operating characteristic of a scored binary prediction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RocCurve {
    pub false_positive_rate: Vec<f64>,
    pub true_positive_rate: Vec<f64>,
    /// Score threshold of each point; the first is +inf (nothing predicted positive)
    pub thresholds: Vec<f64>,
    pub auc: f64,
}

impl RocCurve {
    /// Compute the curve with one point per distinct score, highest first
    ///
    /// When a class is absent its rate stays at 0 and the AUC is NaN.
    pub fn new(truth: &Array1<usize>, scores: &Array1<f64>) -> Self {
        let mut order: Vec<usize> = (0..scores.len()).collect();
        order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));

        let positives = truth.iter().filter(|&&t| t == 1).count() as f64;
        let negatives = truth.len() as f64 - positives;

        let mut fpr = vec![0.0];
        let mut tpr = vec![0.0];
        let mut thresholds = vec![f64::INFINITY];
        let (mut tp, mut fp) = (0.0, 0.0);
        for (position, &row) in order.iter().enumerate() {
            if truth[row] == 1 {
                tp += 1.0;
            } else {
                fp += 1.0;
            }
            let last_of_score = order
                .get(position + 1)
                .map_or(true, |&next| scores[next] != scores[row]);
            if last_of_score {
                fpr.push(ratio(fp, negatives));
                tpr.push(ratio(tp, positives));
                thresholds.push(scores[row]);
            }
        }

        let auc = if positives == 0.0 || negatives == 0.0 {
            f64::NAN
        } else {
            fpr.windows(2)
                .zip(tpr.windows(2))
                .map(|(x, y)| (x[1] - x[0]) * (y[0] + y[1]) / 2.0)
                .sum()
        };

        Self {
            false_positive_rate: fpr,
            true_positive_rate: tpr,
            thresholds,
            auc,
        }
    }
}

fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        0.0
    } else {
        numerator / denominator
    }
}
