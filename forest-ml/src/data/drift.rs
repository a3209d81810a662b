//! Feature-by-feature and dataset-level drift detection.
//!
//! Numerical columns are compared with the two-sample Kolmogorov-Smirnov test
//! (drift when the p-value falls below the threshold). Everything else is
//! compared as categories with the Jensen-Shannon distance (drift when the
//! distance reaches the threshold). The dataset drifts when the share of
//! drifted columns reaches `drift_share`.

use crate::data::frame::{ColumnData, ColumnType, DataFrame};
use crate::error::MlError;
use chrono::{DateTime, Utc};
use forest_core::config::ValidationConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Statistical test applied to a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatTest {
    KolmogorovSmirnov,
    JensenShannon,
}

/// Drift result for one feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDrift {
    pub column_type: ColumnType,
    pub stattest: StatTest,
    pub threshold: f64,
    /// p-value for KS, distance for Jensen-Shannon.
    pub drift_score: f64,
    pub drift_detected: bool,
}

/// Dataset-level aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetDrift {
    pub number_of_columns: usize,
    pub number_of_drifted_columns: usize,
    pub share_of_drifted_columns: f64,
    pub drift_share: f64,
    pub dataset_drift: bool,
}

/// Full drift report, persisted for external inspection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriftReport {
    pub generated_at: DateTime<Utc>,
    pub dataset: DatasetDrift,
    pub columns: BTreeMap<String, ColumnDrift>,
}

/// Compares a reference dataset against a current one.
#[derive(Debug, Clone)]
pub struct DriftDetector {
    numerical_threshold: f64,
    categorical_threshold: f64,
    drift_share: f64,
}

impl DriftDetector {
    pub fn new(config: &ValidationConfig) -> Self {
        Self {
            numerical_threshold: config.numerical_threshold,
            categorical_threshold: config.categorical_threshold,
            drift_share: config.drift_share,
        }
    }

    /// Compute drift over every column present in both frames.
    pub fn detect(&self, reference: &DataFrame, current: &DataFrame) -> Result<DriftReport, MlError> {
        let mut columns = BTreeMap::new();

        for ref_col in reference.columns() {
            let Some(cur_col) = current.column(&ref_col.name) else {
                continue;
            };
            let drift = match (&ref_col.data, &cur_col.data) {
                (ColumnData::Numeric(a), ColumnData::Numeric(b)) => {
                    let p_value = ks_test(a, b).map_err(|e| {
                        MlError::drift(format!("column '{}': {e}", ref_col.name))
                    })?;
                    ColumnDrift {
                        column_type: ColumnType::Numerical,
                        stattest: StatTest::KolmogorovSmirnov,
                        threshold: self.numerical_threshold,
                        drift_score: p_value,
                        drift_detected: p_value < self.numerical_threshold,
                    }
                }
                (a, b) => {
                    let distance = jensen_shannon_distance(&a.to_strings(), &b.to_strings())
                        .map_err(|e| MlError::drift(format!("column '{}': {e}", ref_col.name)))?;
                    ColumnDrift {
                        column_type: ColumnType::Categorical,
                        stattest: StatTest::JensenShannon,
                        threshold: self.categorical_threshold,
                        drift_score: distance,
                        drift_detected: distance >= self.categorical_threshold,
                    }
                }
            };
            tracing::debug!(
                column = %ref_col.name,
                score = drift.drift_score,
                drifted = drift.drift_detected,
                "column drift"
            );
            columns.insert(ref_col.name.clone(), drift);
        }

        if columns.is_empty() {
            return Err(MlError::drift(
                "reference and current datasets have no columns in common",
            ));
        }

        let number_of_columns = columns.len();
        let number_of_drifted_columns = columns.values().filter(|c| c.drift_detected).count();
        let share_of_drifted_columns = number_of_drifted_columns as f64 / number_of_columns as f64;

        Ok(DriftReport {
            generated_at: Utc::now(),
            dataset: DatasetDrift {
                number_of_columns,
                number_of_drifted_columns,
                share_of_drifted_columns,
                drift_share: self.drift_share,
                dataset_drift: share_of_drifted_columns >= self.drift_share,
            },
            columns,
        })
    }

    /// Detect drift, write the report to `report_path`, and return the
    /// dataset-level drift flag.
    pub fn detect_dataset_drift(
        &self,
        reference: &DataFrame,
        current: &DataFrame,
        report_path: &Path,
    ) -> Result<bool, MlError> {
        let report = self.detect(reference, current)?;
        forest_core::persistence::atomic_write_yaml(report_path, &report)?;

        tracing::info!(
            "{}/{} features detected with drift.",
            report.dataset.number_of_drifted_columns,
            report.dataset.number_of_columns
        );
        Ok(report.dataset.dataset_drift)
    }
}

/// Two-sample Kolmogorov-Smirnov test; returns the asymptotic p-value.
///
/// Non-finite values are ignored.
pub fn ks_test(reference: &[f64], current: &[f64]) -> Result<f64, String> {
    let a = sorted_finite(reference);
    let b = sorted_finite(current);
    if a.is_empty() || b.is_empty() {
        return Err("no finite values to compare".to_string());
    }
    let d = ks_statistic(&a, &b);
    let (n, m) = (a.len() as f64, b.len() as f64);
    let en = (n * m / (n + m)).sqrt();
    Ok(kolmogorov_survival((en + 0.12 + 0.11 / en) * d))
}

fn sorted_finite(values: &[f64]) -> Vec<f64> {
    let mut out: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    out.sort_by(f64::total_cmp);
    out
}

/// Largest distance between the empirical CDFs of two sorted samples.
pub fn ks_statistic(a: &[f64], b: &[f64]) -> f64 {
    let (n, m) = (a.len(), b.len());
    let (mut i, mut j) = (0, 0);
    let mut d: f64 = 0.0;
    while i < n && j < m {
        let x = a[i].min(b[j]);
        while i < n && a[i] <= x {
            i += 1;
        }
        while j < m && b[j] <= x {
            j += 1;
        }
        d = d.max((i as f64 / n as f64 - j as f64 / m as f64).abs());
    }
    d
}

/// Complementary CDF of the Kolmogorov distribution, Q_KS(lambda).
fn kolmogorov_survival(lambda: f64) -> f64 {
    const EPS1: f64 = 1e-3;
    const EPS2: f64 = 1e-8;

    let a2 = -2.0 * lambda * lambda;
    let mut fac = 2.0;
    let mut sum = 0.0;
    let mut prev = 0.0;
    for j in 1..=100 {
        let jf = j as f64;
        let term = fac * (a2 * jf * jf).exp();
        sum += term;
        if term.abs() <= EPS1 * prev || term.abs() <= EPS2 * sum {
            return sum.clamp(0.0, 1.0);
        }
        fac = -fac;
        prev = term.abs();
    }
    // the series only fails to converge as lambda -> 0, where Q -> 1
    1.0
}

/// Jensen-Shannon distance (base 2, in `[0, 1]`) between category frequencies.
pub fn jensen_shannon_distance(reference: &[String], current: &[String]) -> Result<f64, String> {
    if reference.is_empty() || current.is_empty() {
        return Err("no values to compare".to_string());
    }

    let mut counts: BTreeMap<&str, (usize, usize)> = BTreeMap::new();
    for v in reference {
        counts.entry(v.as_str()).or_default().0 += 1;
    }
    for v in current {
        counts.entry(v.as_str()).or_default().1 += 1;
    }

    let (n, m) = (reference.len() as f64, current.len() as f64);
    let mut divergence = 0.0;
    for &(cp, cq) in counts.values() {
        let p = cp as f64 / n;
        let q = cq as f64 / m;
        let mid = (p + q) / 2.0;
        if p > 0.0 {
            divergence += 0.5 * p * (p / mid).log2();
        }
        if q > 0.0 {
            divergence += 0.5 * q * (q / mid).log2();
        }
    }
    Ok(divergence.clamp(0.0, 1.0).sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::frame::Column;
    use proptest::prelude::*;
    use tempfile::TempDir;

    fn detector() -> DriftDetector {
        DriftDetector::new(&ValidationConfig::default())
    }

    fn frame(elevation: Vec<f64>, soil: Vec<&str>) -> DataFrame {
        DataFrame::new(vec![
            Column::numeric("Elevation", elevation),
            Column::text("Soil", soil),
        ])
        .unwrap()
    }

    #[test]
    fn test_identical_datasets_have_no_drift() {
        let df = frame(
            (0..50).map(f64::from).collect(),
            (0..50).map(|i| if i % 3 == 0 { "loam" } else { "clay" }).collect(),
        );
        let report = detector().detect(&df, &df).unwrap();
        assert_eq!(report.dataset.number_of_columns, 2);
        assert_eq!(report.dataset.number_of_drifted_columns, 0);
        assert!(!report.dataset.dataset_drift);
        assert_eq!(report.columns["Elevation"].drift_score, 1.0);
        assert_eq!(report.columns["Soil"].drift_score, 0.0);
    }

    #[test]
    fn test_shifted_numeric_column_drifts() {
        let reference = frame((0..200).map(f64::from).collect(), vec!["a"; 200]);
        let current = frame((0..200).map(|i| f64::from(i) + 500.0).collect(), vec!["a"; 200]);
        let report = detector().detect(&reference, &current).unwrap();
        assert!(report.columns["Elevation"].drift_detected);
        assert!(!report.columns["Soil"].drift_detected);
        // one of two columns drifted: share 0.5 reaches the default drift_share
        assert!(report.dataset.dataset_drift);
    }

    #[test]
    fn test_disjoint_categories_have_max_distance() {
        let a: Vec<String> = vec!["x".into(); 10];
        let b: Vec<String> = vec!["y".into(); 10];
        let d = jensen_shannon_distance(&a, &b).unwrap();
        assert!((d - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_ks_statistic_disjoint_samples() {
        assert_eq!(ks_statistic(&[1.0, 2.0], &[3.0, 4.0]), 1.0);
        assert_eq!(ks_statistic(&[1.0, 2.0], &[1.0, 2.0]), 0.0);
    }

    #[test]
    fn test_no_common_columns_is_error() {
        let a = DataFrame::new(vec![Column::numeric("A", vec![1.0])]).unwrap();
        let b = DataFrame::new(vec![Column::numeric("B", vec![1.0])]).unwrap();
        assert!(matches!(detector().detect(&a, &b), Err(MlError::Drift(_))));
    }

    #[test]
    fn test_non_finite_only_column_is_error() {
        let a = DataFrame::new(vec![Column::numeric("A", vec![f64::NAN])]).unwrap();
        let err = detector().detect(&a, &a).unwrap_err();
        assert!(err.to_string().contains("column 'A'"));
    }

    #[test]
    fn test_report_is_written() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("drift_report").join("report.yaml");
        let df = frame(vec![1.0, 2.0, 3.0], vec!["a", "b", "c"]);

        let drifted = detector().detect_dataset_drift(&df, &df, &path).unwrap();
        assert!(!drifted);

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("number_of_columns: 2"));
        assert!(raw.contains("number_of_drifted_columns: 0"));
        assert!(raw.contains("dataset_drift: false"));
    }

    proptest! {
        #[test]
        fn prop_identical_samples_never_drift(values in prop::collection::vec(-1e6f64..1e6, 1..200)) {
            let p = ks_test(&values, &values).unwrap();
            prop_assert!(p >= 0.05);
            prop_assert_eq!(ks_statistic(&sorted_finite(&values), &sorted_finite(&values)), 0.0);
        }

        #[test]
        fn prop_p_value_in_unit_interval(
            a in prop::collection::vec(-100f64..100.0, 1..100),
            b in prop::collection::vec(-100f64..100.0, 1..100),
        ) {
            let p = ks_test(&a, &b).unwrap();
            prop_assert!((0.0..=1.0).contains(&p));
        }

        #[test]
        fn prop_js_distance_symmetric(
            a in prop::collection::vec("[a-d]", 1..50),
            b in prop::collection::vec("[a-d]", 1..50),
        ) {
            let ab = jensen_shannon_distance(&a, &b).unwrap();
            let ba = jensen_shannon_distance(&b, &a).unwrap();
            prop_assert!((ab - ba).abs() < 1e-12);
            prop_assert!((0.0..=1.0).contains(&ab));
        }
    }
}
