//! End-to-end churn pipeline: load, label, explore, encode, split, train,
//! evaluate and persist

use crate::config::PipelineConfig;
use crate::data::{derive_label, load_table};
use crate::eda::perform_eda;
use crate::encoding::encode_categoricals;
use crate::error::Result;
use crate::features::{feature_matrix, label_vector, select_and_split};
use crate::metrics::{ClassificationReport, RocCurve};
use crate::model::{grid_search, Classifier, FeatureImportance, ForestParams, LogisticModel};
use crate::report::{Artifact, ReportSink};
use crate::store::{ModelManifest, ModelStore};
use chrono::Utc;
use ndarray::{Array1, Array2};
use serde::Serialize;
use std::path::PathBuf;
use std::time::Instant;

/// Default file name of the persisted forest
pub const FOREST_DESTINATION: &str = "rfc_model.json";
/// Default file name of the persisted logistic regression
pub const LOGISTIC_DESTINATION: &str = "logistic_model.json";

/// Test-partition scores of one model
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelScore {
    pub name: String,
    pub train_accuracy: f64,
    pub test_accuracy: f64,
    pub test_auc: f64,
}

/// What a pipeline run produced
#[derive(Debug, Clone, Serialize)]
pub struct PipelineSummary {
    pub rows: usize,
    pub train_rows: usize,
    pub test_rows: usize,
    pub feature_names: Vec<String>,
    pub best_params: ForestParams,
    /// Mean cross-validated accuracy of `best_params`
    pub cv_score: f64,
    pub forest: ModelScore,
    pub logistic: ModelScore,
    pub forest_path: PathBuf,
    pub logistic_path: PathBuf,
}

/// Options that change which stages run
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    pub skip_eda: bool,
}

/// Run every stage with default options
pub fn run_pipeline(
    config: &PipelineConfig,
    sink: &mut dyn ReportSink,
    store: &impl ModelStore,
) -> Result<PipelineSummary> {
    run_pipeline_with(config, RunOptions::default(), sink, store)
}

/// Run the pipeline
///
/// # Arguments
/// * `config` - Validated before any stage runs
/// * `options` - Stage toggles
/// * `sink` - Receives EDA and evaluation artifacts
/// * `store` - Receives both fitted models
pub fn run_pipeline_with(
    config: &PipelineConfig,
    options: RunOptions,
    sink: &mut dyn ReportSink,
    store: &impl ModelStore,
) -> Result<PipelineSummary> {
    config.validate()?;
    let started = Instant::now();

    let mut table = load_table(&config.data_path)?;
    tracing::info!(
        path = %config.data_path.display(),
        rows = table.height(),
        columns = table.width(),
        "load_table: SUCCESS"
    );

    derive_label(
        &mut table,
        &config.status_column,
        &config.retained_value,
        &config.label_column,
    )?;
    tracing::info!(label = %config.label_column, "derive_label: SUCCESS");

    if options.skip_eda {
        tracing::info!("perform_eda: skipped");
    } else {
        perform_eda(&table, &config.label_column, sink)?;
        tracing::info!("perform_eda: SUCCESS");
    }

    encode_categoricals(&mut table, &config.category_columns, &config.label_column)?;
    tracing::info!(columns = config.category_columns.len(), "encode_categoricals: SUCCESS");

    let split = select_and_split(
        &table,
        &config.feature_columns,
        &config.label_column,
        config.test_fraction,
        config.seed,
    )?;
    tracing::info!(
        train = split.train_indices.len(),
        test = split.test_indices.len(),
        "select_and_split: SUCCESS"
    );

    let feature_names = split.feature_names();
    let x_train = feature_matrix(&split.train_features)?;
    let x_test = feature_matrix(&split.test_features)?;
    let y_train = label_vector(&split.train_labels)?;
    let y_test = label_vector(&split.test_labels)?;

    let search = grid_search(&config.forest_grid, &x_train, &y_train, config.cv_folds, config.seed)?;
    tracing::info!(
        params = ?search.best_params,
        cv_score = search.best_score,
        candidates = search.scores.len(),
        "grid_search: SUCCESS"
    );
    let forest = search.best_model;

    let logistic = LogisticModel::fit(&x_train, &y_train, config.logistic_max_iterations)?;
    tracing::info!(max_iterations = logistic.max_iterations, "logistic_regression: SUCCESS");

    let data = Partitions {
        x_train: &x_train,
        y_train: &y_train,
        x_test: &x_test,
        y_test: &y_test,
    };
    let (forest_score, forest_roc) = evaluate(&forest, &data, "Random_Forest", sink)?;
    let (logistic_score, logistic_roc) = evaluate(&logistic, &data, "Logistic_Regression", sink)?;

    sink.publish(
        &Artifact::RocCurves {
            title: "ROC".to_string(),
            curves: vec![
                (forest.name().to_string(), forest_roc),
                (logistic.name().to_string(), logistic_roc),
            ],
        },
        "results/ROC.png",
    )?;
    sink.publish(
        &importance_artifact(&forest.feature_importances(), &feature_names),
        "results/Feature_Importances.png",
    )?;
    tracing::info!("classification_report: SUCCESS");

    let forest_path = store.save(&forest, &manifest(forest.name(), &feature_names), FOREST_DESTINATION)?;
    let logistic_path = store.save(
        &logistic,
        &manifest(logistic.name(), &feature_names),
        LOGISTIC_DESTINATION,
    )?;
    tracing::info!("save_models: SUCCESS");

    tracing::info!(elapsed_s = started.elapsed().as_secs_f64(), "pipeline complete");
    Ok(PipelineSummary {
        rows: table.height(),
        train_rows: split.train_indices.len(),
        test_rows: split.test_indices.len(),
        feature_names,
        best_params: search.best_params,
        cv_score: search.best_score,
        forest: forest_score,
        logistic: logistic_score,
        forest_path,
        logistic_path,
    })
}

struct Partitions<'a> {
    x_train: &'a Array2<f64>,
    y_train: &'a Array1<usize>,
    x_test: &'a Array2<f64>,
    y_test: &'a Array1<usize>,
}

/// Publish train and test classification reports for one model and return
/// its scores with the test ROC curve
fn evaluate(
    model: &dyn Classifier,
    data: &Partitions<'_>,
    slug: &str,
    sink: &mut dyn ReportSink,
) -> Result<(ModelScore, RocCurve)> {
    let train_report = ClassificationReport::new(data.y_train, &model.predict(data.x_train));
    let test_report = ClassificationReport::new(data.y_test, &model.predict(data.x_test));

    for (partition, report) in [("train", &train_report), ("test", &test_report)] {
        sink.publish(
            &Artifact::Text {
                title: format!("{} {} results", model.name(), partition),
                body: report.to_string(),
            },
            &format!("results/Classification_{slug}_{partition}.png"),
        )?;
    }

    let roc = RocCurve::new(data.y_test, &model.predict_proba(data.x_test));
    tracing::info!(
        model = model.name(),
        train_accuracy = train_report.accuracy,
        test_accuracy = test_report.accuracy,
        auc = roc.auc,
        "model evaluated"
    );

    let score = ModelScore {
        name: model.name().to_string(),
        train_accuracy: train_report.accuracy,
        test_accuracy: test_report.accuracy,
        test_auc: roc.auc,
    };
    Ok((score, roc))
}

/// Bar chart of importances, largest first; ties keep input order
fn importance_artifact(importances: &Array1<f64>, feature_names: &[String]) -> Artifact {
    let mut ranked: Vec<(&String, f64)> = feature_names.iter().zip(importances.iter().copied()).collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1));

    Artifact::Bar {
        title: "Feature Importance".to_string(),
        y_label: "Importance".to_string(),
        labels: ranked.iter().map(|(name, _)| name.to_string()).collect(),
        values: ranked.iter().map(|&(_, value)| value).collect(),
    }
}

fn manifest(kind: &str, feature_names: &[String]) -> ModelManifest {
    ModelManifest {
        kind: kind.to_string(),
        feature_names: feature_names.to_vec(),
        created_at: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_importance_artifact_sorted() {
        let names = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let importances = Array1::from(vec![0.2, 0.5, 0.3]);

        match importance_artifact(&importances, &names) {
            Artifact::Bar { labels, values, .. } => {
                assert_eq!(labels, vec!["b", "c", "a"]);
                assert_eq!(values, vec![0.5, 0.3, 0.2]);
            }
            other => panic!("unexpected artifact: {other:?}"),
        }
    }

    #[test]
    fn test_invalid_config_fails_before_loading() {
        let config = PipelineConfig {
            test_fraction: 0.0,
            data_path: PathBuf::from("does/not/exist.csv"),
            ..PipelineConfig::default()
        };
        let mut sink = crate::report::MemorySink::new();
        let store = crate::store::JsonModelStore::new("unused");

        let result = run_pipeline(&config, &mut sink, &store);

        assert!(matches!(result, Err(crate::PipelineError::InvalidParameter { .. })));
        assert!(sink.artifacts.is_empty());
    }
}
