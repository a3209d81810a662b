//! Estimator contract and the default classifier.

use crate::data::frame::DataFrame;
use crate::error::MlError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Anything that maps the rows of a frame to predicted labels.
pub trait Estimator {
    /// One label per input row, in row order.
    fn predict(&self, frame: &DataFrame) -> Result<Vec<String>, MlError>;
}

/// Per-feature z-score scaling fitted on the training split.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub means: Vec<f64>,
    pub stds: Vec<f64>,
}

impl StandardScaler {
    fn fit(features: &[&[f64]]) -> Self {
        let mut means = Vec::with_capacity(features.len());
        let mut stds = Vec::with_capacity(features.len());
        for values in features {
            let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
            let n = finite.len().max(1) as f64;
            let mean = finite.iter().sum::<f64>() / n;
            let var = finite.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
            let std = var.sqrt();
            means.push(mean);
            stds.push(if std > 0.0 { std } else { 1.0 });
        }
        Self { means, stds }
    }

    // Non-finite inputs scale to 0, i.e. the training mean.
    fn transform(&self, idx: usize, value: f64) -> f64 {
        if value.is_finite() {
            (value - self.means[idx]) / self.stds[idx]
        } else {
            0.0
        }
    }
}

/// Nearest-centroid classifier over standardized numerical features.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForestModel {
    pub feature_columns: Vec<String>,
    pub target_column: String,
    pub scaler: StandardScaler,
    pub centroids: BTreeMap<String, Vec<f64>>,
    pub trained_at: DateTime<Utc>,
}

impl ForestModel {
    /// Fit on `frame`, using `feature_columns` to predict `target_column`.
    pub fn fit(
        frame: &DataFrame,
        feature_columns: &[String],
        target_column: &str,
    ) -> Result<Self, MlError> {
        if feature_columns.is_empty() {
            return Err(MlError::training("no feature columns to train on"));
        }
        if frame.is_empty() {
            return Err(MlError::training("training split has no rows"));
        }
        let labels = frame
            .column(target_column)
            .ok_or_else(|| {
                MlError::training(format!("target column '{target_column}' is missing"))
            })?
            .data
            .to_strings();

        let features = feature_columns
            .iter()
            .map(|name| frame.numeric(name))
            .collect::<Result<Vec<_>, _>>()?;
        let scaler = StandardScaler::fit(&features);

        let dims = feature_columns.len();
        let mut sums: BTreeMap<String, (Vec<f64>, usize)> = BTreeMap::new();
        for (row, label) in labels.into_iter().enumerate() {
            let entry = sums.entry(label).or_insert_with(|| (vec![0.0; dims], 0));
            for (idx, values) in features.iter().enumerate() {
                entry.0[idx] += scaler.transform(idx, values[row]);
            }
            entry.1 += 1;
        }
        let centroids = sums
            .into_iter()
            .map(|(label, (sum, count))| {
                let centroid = sum.into_iter().map(|s| s / count as f64).collect();
                (label, centroid)
            })
            .collect();

        Ok(Self {
            feature_columns: feature_columns.to_vec(),
            target_column: target_column.to_string(),
            scaler,
            centroids,
            trained_at: Utc::now(),
        })
    }

    /// Fraction of rows in `frame` whose target matches the prediction.
    pub fn score(&self, frame: &DataFrame) -> Result<f64, MlError> {
        let actual = frame
            .column(&self.target_column)
            .ok_or_else(|| {
                MlError::dataset(format!(
                    "target column '{}' is missing",
                    self.target_column
                ))
            })?
            .data
            .to_strings();
        let predicted = self.predict(frame)?;
        Ok(accuracy(&predicted, &actual))
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, MlError> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, MlError> {
        Ok(serde_json::from_slice(bytes)?)
    }

    pub fn save(&self, path: &Path) -> Result<(), MlError> {
        forest_core::persistence::atomic_write_json(path, self)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, MlError> {
        forest_core::persistence::load_json(path)?
            .ok_or_else(|| MlError::model(format!("no model file at {}", path.display())))
    }
}

impl Estimator for ForestModel {
    fn predict(&self, frame: &DataFrame) -> Result<Vec<String>, MlError> {
        let features = self
            .feature_columns
            .iter()
            .map(|name| frame.numeric(name))
            .collect::<Result<Vec<_>, _>>()?;

        let mut out = Vec::with_capacity(frame.row_count());
        let mut point = vec![0.0; features.len()];
        for row in 0..frame.row_count() {
            for (idx, values) in features.iter().enumerate() {
                point[idx] = self.scaler.transform(idx, values[row]);
            }
            let nearest = self
                .centroids
                .iter()
                .map(|(label, c)| (label, squared_distance(&point, c)))
                .min_by(|a, b| a.1.total_cmp(&b.1))
                .map(|(label, _)| label.clone())
                .ok_or_else(|| MlError::model("model has no fitted classes"))?;
            out.push(nearest);
        }
        Ok(out)
    }
}

fn squared_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum()
}

/// Fraction of positions where `predicted` equals `actual`.
pub fn accuracy(predicted: &[String], actual: &[String]) -> f64 {
    if predicted.is_empty() || predicted.len() != actual.len() {
        return 0.0;
    }
    let hits = predicted.iter().zip(actual).filter(|(p, a)| p == a).count();
    hits as f64 / predicted.len() as f64
}
