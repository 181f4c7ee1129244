//! Churn classifiers: a bagged decision-tree forest and logistic regression

use crate::error::{PipelineError, Result};
use linfa::traits::Fit;
use linfa::Dataset;
use linfa_logistic::{FittedLogisticRegression, LogisticRegression};
use linfa_trees::{DecisionTree, SplitQuality};
use ndarray::{Array1, Array2, Axis};
use rand::seq::index::sample;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Binary classifier over a dense feature matrix
pub trait Classifier {
    /// Short name used in reports and logs
    fn name(&self) -> &'static str;

    /// Predicted class (0 or 1) per row
    fn predict(&self, features: &Array2<f64>) -> Array1<usize>;

    /// Estimated probability of class 1 per row
    fn predict_proba(&self, features: &Array2<f64>) -> Array1<f64>;
}

/// Models that can weigh each input column
pub trait FeatureImportance {
    /// One non-negative weight per input column, in input order
    fn feature_importances(&self) -> Array1<f64>;
}

/// Impurity measure used when splitting tree nodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Criterion {
    Gini,
    Entropy,
}

impl Criterion {
    fn split_quality(self) -> SplitQuality {
        match self {
            Criterion::Gini => SplitQuality::Gini,
            Criterion::Entropy => SplitQuality::Entropy,
        }
    }
}

/// Number of columns each tree is allowed to see
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MaxFeatures {
    /// Every column
    All,
    /// Square root of the column count
    Sqrt,
    /// Base-2 logarithm of the column count
    Log2,
}

impl MaxFeatures {
    fn resolve(self, n_features: usize) -> usize {
        let k = match self {
            MaxFeatures::All => n_features,
            MaxFeatures::Sqrt => (n_features as f64).sqrt().ceil() as usize,
            MaxFeatures::Log2 => (n_features as f64).log2().ceil() as usize,
        };
        k.clamp(1, n_features.max(1))
    }
}

/// Hyperparameters of one forest
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForestParams {
    pub n_estimators: usize,
    pub max_features: MaxFeatures,
    pub max_depth: Option<usize>,
    pub criterion: Criterion,
    /// Tree `i` draws from an RNG seeded with `seed + i`
    pub seed: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_features: MaxFeatures::Sqrt,
            max_depth: None,
            criterion: Criterion::Gini,
            seed: 42,
        }
    }
}

/// One fitted tree and the columns it was trained on
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ForestMember {
    tree: DecisionTree<f64, usize>,
    features: Vec<usize>,
}

/// Bagged ensemble of decision trees
///
/// Each member is fitted on a bootstrap sample of rows and a random subset of
/// columns. Prediction is a majority vote; ties go to class 1.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForest {
    pub params: ForestParams,
    members: Vec<ForestMember>,
    n_features: usize,
}

impl RandomForest {
    /// Fit a forest on a feature matrix and 0/1 labels
    pub fn fit(params: ForestParams, features: &Array2<f64>, labels: &Array1<usize>) -> Result<Self> {
        let (n_rows, n_features) = features.dim();
        if n_rows == 0 || n_features == 0 {
            return Err(PipelineError::EmptyInput { stage: "random_forest" });
        }
        if labels.len() != n_rows {
            return Err(PipelineError::invalid(
                "labels",
                labels.len(),
                format!("expected {n_rows} labels"),
            ));
        }
        if params.n_estimators == 0 {
            return Err(PipelineError::invalid("n_estimators", 0, "at least one tree is required"));
        }

        let members = (0..params.n_estimators)
            .into_par_iter()
            .map(|i| fit_member(&params, i as u64, features, labels))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            params,
            members,
            n_features,
        })
    }

    /// Number of fitted trees
    pub fn n_trees(&self) -> usize {
        self.members.len()
    }

    /// Share of trees voting for class 1, per row
    fn vote_share(&self, features: &Array2<f64>) -> Array1<f64> {
        use linfa::traits::Predict;

        let mut votes = Array1::<f64>::zeros(features.nrows());
        for member in &self.members {
            let subset = features.select(Axis(1), &member.features);
            let predicted: Array1<usize> = member.tree.predict(&subset);
            votes.zip_mut_with(&predicted, |vote, &class| {
                if class == 1 {
                    *vote += 1.0;
                }
            });
        }
        votes / self.members.len().max(1) as f64
    }
}

fn fit_member(
    params: &ForestParams,
    index: u64,
    features: &Array2<f64>,
    labels: &Array1<usize>,
) -> Result<ForestMember> {
    let (n_rows, n_features) = features.dim();
    let mut rng = ChaCha8Rng::seed_from_u64(params.seed.wrapping_add(index));

    let rows: Vec<usize> = (0..n_rows).map(|_| rng.gen_range(0..n_rows)).collect();
    let mut columns = sample(&mut rng, n_features, params.max_features.resolve(n_features)).into_vec();
    columns.sort_unstable();

    let records = features.select(Axis(0), &rows).select(Axis(1), &columns);
    let targets = labels.select(Axis(0), &rows);
    let dataset = Dataset::new(records, targets);

    let tree = DecisionTree::params()
        .split_quality(params.criterion.split_quality())
        .max_depth(params.max_depth)
        .fit(&dataset)
        .map_err(|e| PipelineError::Model(e.to_string()))?;

    Ok(ForestMember {
        tree,
        features: columns,
    })
}

impl Classifier for RandomForest {
    fn name(&self) -> &'static str {
        "Random Forest"
    }

    fn predict(&self, features: &Array2<f64>) -> Array1<usize> {
        self.vote_share(features).mapv(majority_class)
    }

    fn predict_proba(&self, features: &Array2<f64>) -> Array1<f64> {
        self.vote_share(features)
    }
}

/// Class 1 needs a strict majority; a tied vote goes to class 0
fn majority_class(share: f64) -> usize {
    usize::from(share > 0.5)
}

impl FeatureImportance for RandomForest {
    fn feature_importances(&self) -> Array1<f64> {
        let mut importances = Array1::<f64>::zeros(self.n_features);
        for member in &self.members {
            for (&column, weight) in member.features.iter().zip(member.tree.feature_importance()) {
                if weight.is_finite() {
                    importances[column] += weight;
                }
            }
        }
        let total = importances.sum();
        if total > 0.0 {
            importances /= total;
        }
        importances
    }
}

/// Exhaustive hyperparameter grid for the forest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForestGrid {
    pub n_estimators: Vec<usize>,
    pub max_features: Vec<MaxFeatures>,
    pub max_depth: Vec<Option<usize>>,
    pub criterion: Vec<Criterion>,
}

impl ForestGrid {
    /// True when some hyperparameter has no candidate values
    pub fn is_empty(&self) -> bool {
        self.n_estimators.is_empty()
            || self.max_features.is_empty()
            || self.max_depth.is_empty()
            || self.criterion.is_empty()
    }

    /// Cartesian product of the grid; `n_estimators` varies fastest
    pub fn candidates(&self) -> Vec<ForestParams> {
        let mut out = Vec::new();
        for &criterion in &self.criterion {
            for &max_depth in &self.max_depth {
                for &max_features in &self.max_features {
                    for &n_estimators in &self.n_estimators {
                        out.push(ForestParams {
                            n_estimators,
                            max_features,
                            max_depth,
                            criterion,
                            seed: 0,
                        });
                    }
                }
            }
        }
        out
    }
}

/// Outcome of a grid search
#[derive(Debug, Clone)]
pub struct GridSearchResult {
    /// Candidate with the highest mean CV accuracy
    pub best_params: ForestParams,
    pub best_score: f64,
    /// Mean CV accuracy of every candidate, in grid order
    pub scores: Vec<(ForestParams, f64)>,
    /// Best candidate refitted on all rows
    pub best_model: RandomForest,
}

/// Score every grid candidate by stratified k-fold accuracy and refit the best
///
/// Ties keep the earlier candidate.
pub fn grid_search(
    grid: &ForestGrid,
    features: &Array2<f64>,
    labels: &Array1<usize>,
    n_folds: usize,
    seed: u64,
) -> Result<GridSearchResult> {
    if grid.is_empty() {
        return Err(PipelineError::invalid("forest_grid", "[]", "grid has no candidates"));
    }
    let folds = stratified_folds(labels, n_folds)?;

    let mut scores = Vec::new();
    for mut candidate in grid.candidates() {
        candidate.seed = seed;
        let mut fold_scores = Vec::with_capacity(folds.len());
        for (train, validation) in &folds {
            let model = RandomForest::fit(
                candidate,
                &features.select(Axis(0), train),
                &labels.select(Axis(0), train),
            )?;
            let predicted = model.predict(&features.select(Axis(0), validation));
            fold_scores.push(accuracy(&labels.select(Axis(0), validation), &predicted));
        }
        let score = fold_scores.iter().sum::<f64>() / fold_scores.len() as f64;
        tracing::debug!(?candidate, score, "grid candidate scored");
        scores.push((candidate, score));
    }

    let (best_params, best_score) = scores
        .iter()
        .copied()
        .fold(None, |best: Option<(ForestParams, f64)>, (params, score)| match best {
            Some((_, best_score)) if best_score >= score => best,
            _ => Some((params, score)),
        })
        .ok_or_else(|| PipelineError::Model("grid search produced no scores".to_string()))?;

    let best_model = RandomForest::fit(best_params, features, labels)?;
    Ok(GridSearchResult {
        best_params,
        best_score,
        scores,
        best_model,
    })
}

/// Unshuffled stratified k-fold: each class is cut into `n_folds` contiguous
/// chunks and fold `k` validates on chunk `k` of every class.
///
/// Returns `(train_rows, validation_rows)` per fold.
pub fn stratified_folds(labels: &Array1<usize>, n_folds: usize) -> Result<Vec<(Vec<usize>, Vec<usize>)>> {
    if n_folds < 2 {
        return Err(PipelineError::invalid("cv_folds", n_folds, "at least two folds are required"));
    }
    if labels.len() < n_folds {
        return Err(PipelineError::invalid(
            "cv_folds",
            n_folds,
            format!("cannot exceed the {} available rows", labels.len()),
        ));
    }

    let n_classes = labels.iter().copied().max().map_or(0, |max| max + 1);
    let mut assignment = vec![0usize; labels.len()];
    for class in 0..n_classes {
        let rows: Vec<usize> = (0..labels.len()).filter(|&i| labels[i] == class).collect();
        let base = rows.len() / n_folds;
        let extra = rows.len() % n_folds;
        let mut start = 0;
        for fold in 0..n_folds {
            let size = base + usize::from(fold < extra);
            for &row in &rows[start..start + size] {
                assignment[row] = fold;
            }
            start += size;
        }
    }

    Ok((0..n_folds)
        .map(|fold| {
            let (validation, train): (Vec<usize>, Vec<usize>) =
                (0..labels.len()).partition(|&row| assignment[row] == fold);
            (train, validation)
        })
        .collect())
}

/// Share of rows where prediction equals truth
pub fn accuracy(truth: &Array1<usize>, predicted: &Array1<usize>) -> f64 {
    if truth.is_empty() {
        return 0.0;
    }
    let correct = truth
        .iter()
        .zip(predicted.iter())
        .filter(|(t, p)| t == p)
        .count();
    correct as f64 / truth.len() as f64
}

/// Logistic regression fitted with linfa's L-BFGS solver
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticModel {
    model: FittedLogisticRegression<f64, usize>,
    pub max_iterations: u64,
}

impl LogisticModel {
    /// Fit on a feature matrix and 0/1 labels; both classes must be present
    pub fn fit(features: &Array2<f64>, labels: &Array1<usize>, max_iterations: u64) -> Result<Self> {
        if features.nrows() == 0 {
            return Err(PipelineError::EmptyInput { stage: "logistic_regression" });
        }
        let dataset = Dataset::new(features.clone(), labels.clone());
        let model = LogisticRegression::default()
            .max_iterations(max_iterations)
            .fit(&dataset)
            .map_err(|e| PipelineError::Model(e.to_string()))?;

        Ok(Self {
            model,
            max_iterations,
        })
    }

    /// Fitted weights, one per input column
    pub fn coefficients(&self) -> &Array1<f64> {
        self.model.params()
    }

    pub fn intercept(&self) -> f64 {
        self.model.intercept()
    }
}

impl Classifier for LogisticModel {
    fn name(&self) -> &'static str {
        "Logistic Regression"
    }

    fn predict(&self, features: &Array2<f64>) -> Array1<usize> {
        use linfa::traits::Predict;

        self.model.predict(features)
    }

    fn predict_proba(&self, features: &Array2<f64>) -> Array1<f64> {
        // probability of the larger class label, i.e. churn
        self.model.predict_probabilities(features)
    }
}
