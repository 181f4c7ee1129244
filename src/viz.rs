//! PNG rendering of report artifacts using Plotters

use crate::config::PlotConfig;
use crate::error::{PipelineError, Result};
use crate::metrics::RocCurve;
use crate::report::{Artifact, ReportSink};
use ndarray::Array2;
use plotters::prelude::*;
use std::path::{Path, PathBuf};

type DrawResult = std::result::Result<(), Box<dyn std::error::Error>>;

/// Color palette for model curves
const SERIES_COLORS: [RGBColor; 5] = [BLUE, RED, GREEN, MAGENTA, CYAN];

/// Sink that renders each artifact to `<root>/<destination>` as a PNG
#[derive(Debug, Clone)]
pub struct PlotSink {
    root: PathBuf,
    config: PlotConfig,
}

impl PlotSink {
    pub fn new(root: impl Into<PathBuf>, config: PlotConfig) -> Self {
        Self {
            root: root.into(),
            config,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn font(&self, size: u32) -> (&str, f64) {
        (self.config.font_family.as_str(), f64::from(size))
    }

    fn size(&self) -> (u32, u32) {
        (self.config.width, self.config.height)
    }
}

impl ReportSink for PlotSink {
    fn publish(&mut self, artifact: &Artifact, destination: &str) -> Result<()> {
        let path = self.root.join(destination);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let drawn = match artifact {
            Artifact::Histogram {
                title,
                x_label,
                values,
                bins,
                density,
                kde,
            } => self.draw_histogram(&path, title, x_label, values, *bins, *density, kde.as_deref()),
            Artifact::Bar {
                title,
                y_label,
                labels,
                values,
            } => self.draw_bars(&path, title, y_label, labels, values),
            Artifact::Heatmap {
                title,
                labels,
                matrix,
            } => self.draw_heatmap(&path, title, labels, matrix),
            Artifact::Text { title, body } => self.draw_text(&path, title, body),
            Artifact::RocCurves { title, curves } => self.draw_roc(&path, title, curves),
        };
        drawn.map_err(|e| PipelineError::Report(format!("{destination}: {e}")))?;

        tracing::info!(path = %path.display(), "artifact saved");
        Ok(())
    }
}

impl PlotSink {
    #[allow(clippy::too_many_arguments)]
    fn draw_histogram(
        &self,
        path: &Path,
        title: &str,
        x_label: &str,
        values: &[f64],
        bins: usize,
        density: bool,
        kde: Option<&[(f64, f64)]>,
    ) -> DrawResult {
        let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
        if finite.is_empty() {
            return Err("histogram has no finite values".into());
        }
        let bins = bins.max(1);
        let (lo, hi) = padded_range(&finite);
        let width = (hi - lo) / bins as f64;

        let mut counts = vec![0.0; bins];
        for v in &finite {
            let bin = (((v - lo) / width) as usize).min(bins - 1);
            counts[bin] += 1.0;
        }
        if density {
            let scale = finite.len() as f64 * width;
            counts.iter_mut().for_each(|c| *c /= scale);
        }

        let kde_max = kde
            .map(|points| points.iter().map(|&(_, y)| y).fold(0.0, f64::max))
            .unwrap_or(0.0);
        let y_max = counts.iter().copied().fold(kde_max, f64::max).max(f64::EPSILON) * 1.1;

        let root = BitMapBackend::new(path, self.size()).into_drawing_area();
        root.fill(&WHITE)?;

        let mut chart = ChartBuilder::on(&root)
            .caption(title, self.font(self.config.caption_size))
            .margin(10)
            .x_label_area_size(50)
            .y_label_area_size(70)
            .build_cartesian_2d(lo..hi, 0f64..y_max)?;

        chart
            .configure_mesh()
            .x_desc(x_label)
            .y_desc(if density { "Density" } else { "Count" })
            .axis_desc_style(self.font(15))
            .draw()?;

        chart.draw_series(counts.iter().enumerate().map(|(i, &count)| {
            let x0 = lo + i as f64 * width;
            Rectangle::new([(x0, 0.0), (x0 + width, count)], BLUE.mix(0.6).filled())
        }))?;

        if let Some(points) = kde {
            chart.draw_series(LineSeries::new(points.iter().copied(), RED.stroke_width(2)))?;
        }

        root.present()?;
        Ok(())
    }

    fn draw_bars(
        &self,
        path: &Path,
        title: &str,
        y_label: &str,
        labels: &[String],
        values: &[f64],
    ) -> DrawResult {
        if values.is_empty() {
            return Err("bar chart has no values".into());
        }
        let y_max = values.iter().copied().fold(0.0, f64::max).max(f64::EPSILON) * 1.1;
        let n = values.len() as u32;

        let root = BitMapBackend::new(path, self.size()).into_drawing_area();
        root.fill(&WHITE)?;

        let mut chart = ChartBuilder::on(&root)
            .caption(title, self.font(self.config.caption_size))
            .margin(10)
            .x_label_area_size(180)
            .y_label_area_size(70)
            .build_cartesian_2d((0u32..n).into_segmented(), 0f64..y_max)?;

        let label_of = |v: &SegmentValue<u32>| match v {
            SegmentValue::CenterOf(i) => labels.get(*i as usize).cloned().unwrap_or_default(),
            _ => String::new(),
        };
        chart
            .configure_mesh()
            .disable_x_mesh()
            .x_labels(values.len())
            .x_label_formatter(&label_of)
            .x_label_style(
                self.font(14)
                    .into_font()
                    .transform(FontTransform::Rotate90),
            )
            .y_desc(y_label)
            .axis_desc_style(self.font(15))
            .draw()?;

        chart.draw_series(
            Histogram::vertical(&chart)
                .style(BLUE.mix(0.7).filled())
                .margin(8)
                .data(values.iter().enumerate().map(|(i, &v)| (i as u32, v))),
        )?;

        root.present()?;
        Ok(())
    }

    fn draw_heatmap(
        &self,
        path: &Path,
        title: &str,
        labels: &[String],
        matrix: &Array2<f64>,
    ) -> DrawResult {
        let n = matrix.nrows() as u32;
        if n == 0 {
            return Err("heatmap has no cells".into());
        }

        let side = self.config.width.max(self.config.height);
        let root = BitMapBackend::new(path, (side, side)).into_drawing_area();
        root.fill(&WHITE)?;

        let mut chart = ChartBuilder::on(&root)
            .caption(title, self.font(self.config.caption_size))
            .margin(10)
            .x_label_area_size(220)
            .y_label_area_size(220)
            .build_cartesian_2d((0u32..n).into_segmented(), (0u32..n).into_segmented())?;

        // row 0 is drawn at the top
        let x_label = |v: &SegmentValue<u32>| match v {
            SegmentValue::CenterOf(i) => labels.get(*i as usize).cloned().unwrap_or_default(),
            _ => String::new(),
        };
        let y_label = |v: &SegmentValue<u32>| match v {
            SegmentValue::CenterOf(i) if *i < n => labels
                .get((n - 1 - *i) as usize)
                .cloned()
                .unwrap_or_default(),
            _ => String::new(),
        };
        chart
            .configure_mesh()
            .disable_mesh()
            .x_labels(n as usize)
            .y_labels(n as usize)
            .x_label_formatter(&x_label)
            .y_label_formatter(&y_label)
            .x_label_style(
                self.font(13)
                    .into_font()
                    .transform(FontTransform::Rotate90),
            )
            .y_label_style(self.font(13))
            .draw()?;

        chart.draw_series(matrix.indexed_iter().map(|((row, col), &value)| {
            let x = col as u32;
            let y = n - 1 - row as u32;
            Rectangle::new(
                [
                    (SegmentValue::Exact(x), SegmentValue::Exact(y)),
                    (SegmentValue::Exact(x + 1), SegmentValue::Exact(y + 1)),
                ],
                correlation_color(value).filled(),
            )
        }))?;

        root.present()?;
        Ok(())
    }

    fn draw_text(&self, path: &Path, title: &str, body: &str) -> DrawResult {
        let line_height = self.config.text_size as i32 + 6;
        let lines: Vec<&str> = body.lines().collect();
        let height = (80 + line_height * (lines.len() as i32 + 1)).max(200) as u32;

        let root = BitMapBackend::new(path, (self.config.width, height)).into_drawing_area();
        root.fill(&WHITE)?;

        let caption = TextStyle::from(self.font(self.config.caption_size).into_font()).color(&BLACK);
        root.draw_text(title, &caption, (20, 20))?;

        let style = TextStyle::from(("monospace", f64::from(self.config.text_size)).into_font())
            .color(&BLACK);
        for (i, line) in lines.iter().enumerate() {
            root.draw_text(line, &style, (20, 80 + line_height * i as i32))?;
        }

        root.present()?;
        Ok(())
    }

    fn draw_roc(&self, path: &Path, title: &str, curves: &[(String, RocCurve)]) -> DrawResult {
        let root = BitMapBackend::new(path, self.size()).into_drawing_area();
        root.fill(&WHITE)?;

        let mut chart = ChartBuilder::on(&root)
            .caption(title, self.font(self.config.caption_size))
            .margin(10)
            .x_label_area_size(50)
            .y_label_area_size(60)
            .build_cartesian_2d(0f64..1f64, 0f64..1.02f64)?;

        chart
            .configure_mesh()
            .x_desc("False Positive Rate")
            .y_desc("True Positive Rate")
            .axis_desc_style(self.font(15))
            .draw()?;

        chart.draw_series(LineSeries::new([(0.0, 0.0), (1.0, 1.0)], BLACK.mix(0.3)))?;

        for (i, (name, curve)) in curves.iter().enumerate() {
            let color = SERIES_COLORS[i % SERIES_COLORS.len()];
            let points = curve
                .false_positive_rate
                .iter()
                .copied()
                .zip(curve.true_positive_rate.iter().copied());
            chart
                .draw_series(LineSeries::new(points, color.stroke_width(2)))?
                .label(format!("{name} (AUC = {:.2})", curve.auc))
                .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(2)));
        }

        chart
            .configure_series_labels()
            .position(SeriesLabelPosition::LowerRight)
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .draw()?;

        root.present()?;
        Ok(())
    }
}

/// Data range with a small margin; a constant column gets a unit-wide range
fn padded_range(values: &[f64]) -> (f64, f64) {
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if (max - min).abs() < f64::EPSILON {
        (min - 0.5, max + 0.5)
    } else {
        let pad = (max - min) * 0.02;
        (min - pad, max + pad)
    }
}

/// Diverging blue-white-red scale over [-1, 1]; NaN is gray
fn correlation_color(value: f64) -> RGBColor {
    if !value.is_finite() {
        return RGBColor(190, 190, 190);
    }
    let v = value.clamp(-1.0, 1.0);
    let fade = |t: f64| (255.0 * (1.0 - t)).round() as u8;
    if v >= 0.0 {
        RGBColor(255, fade(v), fade(v))
    } else {
        RGBColor(fade(-v), fade(-v), 255)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn small_config() -> PlotConfig {
        PlotConfig {
            width: 480,
            height: 320,
            ..PlotConfig::default()
        }
    }

    #[test]
    fn test_histogram_png() {
        let dir = tempdir().unwrap();
        let mut sink = PlotSink::new(dir.path(), small_config());
        let artifact = Artifact::Histogram {
            title: "Customer_Age".to_string(),
            x_label: "Customer_Age".to_string(),
            values: vec![26.0, 31.0, 45.0, 45.0, 52.0, 61.0],
            bins: 5,
            density: true,
            kde: Some(vec![(25.0, 0.01), (45.0, 0.03), (62.0, 0.01)]),
        };

        sink.publish(&artifact, "eda/Customer_Age.png").unwrap();

        assert!(dir.path().join("eda/Customer_Age.png").exists());
    }

    #[test]
    fn test_bar_and_roc_png() {
        let dir = tempdir().unwrap();
        let mut sink = PlotSink::new(dir.path(), small_config());

        let bars = Artifact::Bar {
            title: "Marital_Status".to_string(),
            y_label: "Share".to_string(),
            labels: vec!["Married".to_string(), "Single".to_string()],
            values: vec![0.6, 0.4],
        };
        sink.publish(&bars, "eda/Marital_Status.png").unwrap();

        let truth = ndarray::Array1::from(vec![0, 1, 1, 0]);
        let curve = RocCurve::new(&truth, &ndarray::Array1::from(vec![0.2, 0.7, 0.6, 0.4]));
        let roc = Artifact::RocCurves {
            title: "ROC".to_string(),
            curves: vec![("Logistic Regression".to_string(), curve)],
        };
        sink.publish(&roc, "results/ROC.png").unwrap();

        assert!(dir.path().join("eda/Marital_Status.png").exists());
        assert!(dir.path().join("results/ROC.png").exists());
    }

    #[test]
    fn test_empty_histogram_is_an_error() {
        let dir = tempdir().unwrap();
        let mut sink = PlotSink::new(dir.path(), small_config());
        let artifact = Artifact::Histogram {
            title: "empty".to_string(),
            x_label: String::new(),
            values: vec![],
            bins: 10,
            density: false,
            kde: None,
        };

        let result = sink.publish(&artifact, "eda/empty.png");
        assert!(matches!(result, Err(PipelineError::Report(_))));
    }

    #[test]
    fn test_correlation_color() {
        assert_eq!(correlation_color(1.0), RGBColor(255, 0, 0));
        assert_eq!(correlation_color(-1.0), RGBColor(0, 0, 255));
        assert_eq!(correlation_color(0.0), RGBColor(255, 255, 255));
        assert_eq!(correlation_color(f64::NAN), RGBColor(190, 190, 190));
    }
}
