//! Report artifacts and the sinks that receive them

use crate::error::Result;
use crate::metrics::RocCurve;
use ndarray::Array2;

/// A renderable analysis or evaluation result
#[derive(Debug, Clone, PartialEq)]
pub enum Artifact {
    /// Distribution of one numeric column
    Histogram {
        title: String,
        x_label: String,
        values: Vec<f64>,
        bins: usize,
        /// Scale bar heights to a probability density
        density: bool,
        /// Kernel density estimate drawn over the bars, as (x, density) points
        kde: Option<Vec<(f64, f64)>>,
    },
    /// Labelled bars, drawn in the given order
    Bar {
        title: String,
        y_label: String,
        labels: Vec<String>,
        values: Vec<f64>,
    },
    /// Square matrix with labelled rows and columns
    Heatmap {
        title: String,
        labels: Vec<String>,
        matrix: Array2<f64>,
    },
    /// Preformatted monospace text
    Text { title: String, body: String },
    /// One ROC curve per named model
    RocCurves {
        title: String,
        curves: Vec<(String, RocCurve)>,
    },
}

impl Artifact {
    pub fn title(&self) -> &str {
        match self {
            Artifact::Histogram { title, .. }
            | Artifact::Bar { title, .. }
            | Artifact::Heatmap { title, .. }
            | Artifact::Text { title, .. }
            | Artifact::RocCurves { title, .. } => title,
        }
    }
}

/// Destination for artifacts; `destination` is a relative identifier such as
/// `eda/Churn.png`
pub trait ReportSink {
    fn publish(&mut self, artifact: &Artifact, destination: &str) -> Result<()>;
}

/// Sink that keeps every artifact in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    pub artifacts: Vec<(String, Artifact)>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Artifact last published under `destination`
    pub fn get(&self, destination: &str) -> Option<&Artifact> {
        self.artifacts
            .iter()
            .rev()
            .find(|(dest, _)| dest == destination)
            .map(|(_, artifact)| artifact)
    }

    pub fn destinations(&self) -> Vec<&str> {
        self.artifacts.iter().map(|(dest, _)| dest.as_str()).collect()
    }
}

impl ReportSink for MemorySink {
    fn publish(&mut self, artifact: &Artifact, destination: &str) -> Result<()> {
        tracing::debug!(destination, title = artifact.title(), "artifact recorded");
        self.artifacts.push((destination.to_string(), artifact.clone()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_sink_keeps_latest() {
        let mut sink = MemorySink::new();
        let first = Artifact::Text {
            title: "first".to_string(),
            body: String::new(),
        };
        let second = Artifact::Text {
            title: "second".to_string(),
            body: "x".to_string(),
        };

        sink.publish(&first, "results/report.png").unwrap();
        sink.publish(&second, "results/report.png").unwrap();

        assert_eq!(sink.destinations(), vec!["results/report.png", "results/report.png"]);
        assert_eq!(sink.get("results/report.png").map(Artifact::title), Some("second"));
        assert!(sink.get("eda/Churn.png").is_none());
    }
}
