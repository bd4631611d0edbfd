// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;
use tseval_core::{EvalError, TimeSeriesBatch};

const STD_EPSILON: f64 = 1.0e-12;

/// Immutable reference data: real train/test series plus integer class
/// labels, loaded once at session start.
#[derive(Clone, Debug, PartialEq)]
pub struct ReferenceCorpus {
    x_train: TimeSeriesBatch,
    x_test: TimeSeriesBatch,
    y_train: Vec<i64>,
    y_test: Vec<i64>,
}

impl ReferenceCorpus {
    pub fn new(
        x_train: TimeSeriesBatch,
        y_train: Vec<i64>,
        x_test: TimeSeriesBatch,
        y_test: Vec<i64>,
    ) -> Result<Self, EvalError> {
        if y_train.len() != x_train.n() {
            return Err(EvalError::invalid_input(format!(
                "train label count mismatch: {} labels for {} series",
                y_train.len(),
                x_train.n()
            )));
        }
        if y_test.len() != x_test.n() {
            return Err(EvalError::invalid_input(format!(
                "test label count mismatch: {} labels for {} series",
                y_test.len(),
                x_test.n()
            )));
        }
        if x_train.channels() != x_test.channels() || x_train.series_len() != x_test.series_len() {
            return Err(EvalError::invalid_input(format!(
                "train/test shape mismatch: train is (channels={}, len={}), test is (channels={}, len={})",
                x_train.channels(),
                x_train.series_len(),
                x_test.channels(),
                x_test.series_len()
            )));
        }
        Ok(Self {
            x_train,
            x_test,
            y_train,
            y_test,
        })
    }

    pub fn x_train(&self) -> &TimeSeriesBatch {
        &self.x_train
    }

    pub fn x_test(&self) -> &TimeSeriesBatch {
        &self.x_test
    }

    pub fn y_train(&self) -> &[i64] {
        &self.y_train
    }

    pub fn y_test(&self) -> &[i64] {
        &self.y_test
    }

    pub fn channels(&self) -> usize {
        self.x_train.channels()
    }

    pub fn series_len(&self) -> usize {
        self.x_train.series_len()
    }

    /// Number of distinct classes in the train labels.
    pub fn n_classes(&self) -> usize {
        self.y_train.iter().collect::<BTreeSet<_>>().len()
    }
}

/// Resolves a dataset identity into a reference corpus. A directly
/// constructed [`ReferenceCorpus`] bypasses the lookup entirely (the
/// custom-dataset path).
pub trait ReferenceLoader {
    fn load(&self, dataset: &str, scaling: bool) -> Result<ReferenceCorpus, EvalError>;
}

/// Loads `<dataset>_TRAIN.tsv` / `<dataset>_TEST.tsv` from one directory:
/// tab-separated rows, class label first, one univariate series per line
/// (the archive layout the evaluation pipeline consumes).
///
/// With `scaling` set, both splits are standardized with the mean and
/// standard deviation of the train split.
#[derive(Clone, Debug)]
pub struct UcrDirectoryLoader {
    root: PathBuf,
}

impl UcrDirectoryLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn read_split(&self, dataset: &str, suffix: &str) -> Result<(Vec<Vec<f64>>, Vec<i64>), EvalError> {
        let path = self.root.join(format!("{dataset}_{suffix}.tsv"));
        let raw = fs::read_to_string(&path).map_err(|err| EvalError::io(&path, err))?;

        let mut rows = Vec::new();
        let mut labels = Vec::new();
        for (line_index, line) in raw.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let mut fields = line.split('\t');
            let label_field = fields.next().unwrap_or("");
            labels.push(parse_label(label_field, &path, line_index)?);

            let mut row = Vec::new();
            for field in fields {
                let value: f64 = field.trim().parse().map_err(|_| {
                    EvalError::corrupt(format!(
                        "unparseable value `{field}` at {}:{}",
                        path.display(),
                        line_index + 1
                    ))
                })?;
                row.push(value);
            }
            if row.is_empty() {
                return Err(EvalError::corrupt(format!(
                    "no series values at {}:{}",
                    path.display(),
                    line_index + 1
                )));
            }
            rows.push(row);
        }

        if rows.is_empty() {
            return Err(EvalError::corrupt(format!(
                "no series found in {}",
                path.display()
            )));
        }
        Ok((rows, labels))
    }
}

fn parse_label(field: &str, path: &Path, line_index: usize) -> Result<i64, EvalError> {
    let parsed: f64 = field.trim().parse().map_err(|_| {
        EvalError::corrupt(format!(
            "unparseable label `{field}` at {}:{}",
            path.display(),
            line_index + 1
        ))
    })?;
    if parsed.fract() != 0.0 {
        return Err(EvalError::corrupt(format!(
            "label `{field}` at {}:{} is not an integer",
            path.display(),
            line_index + 1
        )));
    }
    Ok(parsed as i64)
}

impl ReferenceLoader for UcrDirectoryLoader {
    fn load(&self, dataset: &str, scaling: bool) -> Result<ReferenceCorpus, EvalError> {
        let (mut train_rows, y_train) = self.read_split(dataset, "TRAIN")?;
        let (mut test_rows, y_test) = self.read_split(dataset, "TEST")?;

        if scaling {
            let count: usize = train_rows.iter().map(Vec::len).sum();
            let mean =
                train_rows.iter().flatten().sum::<f64>() / count as f64;
            let variance = train_rows
                .iter()
                .flatten()
                .map(|value| (value - mean).powi(2))
                .sum::<f64>()
                / count as f64;
            let std = variance.sqrt();
            if std < STD_EPSILON {
                return Err(EvalError::invalid_input(format!(
                    "cannot standardize dataset `{dataset}`: train split standard deviation is {std}"
                )));
            }
            for row in train_rows.iter_mut().chain(test_rows.iter_mut()) {
                for value in row {
                    *value = (*value - mean) / std;
                }
            }
        }

        let x_train = TimeSeriesBatch::from_univariate_rows(train_rows)?;
        let x_test = TimeSeriesBatch::from_univariate_rows(test_rows)?;
        debug!(
            dataset,
            n_train = x_train.n(),
            n_test = x_test.n(),
            series_len = x_train.series_len(),
            scaling,
            "loaded reference corpus"
        );
        ReferenceCorpus::new(x_train, y_train, x_test, y_test)
    }
}

#[cfg(test)]
mod tests {
    use super::{ReferenceCorpus, ReferenceLoader, UcrDirectoryLoader};
    use tseval_core::TimeSeriesBatch;

    fn write_dataset(dir: &std::path::Path, dataset: &str) {
        let train = "1\t0.0\t2.0\t4.0\n2\t1.0\t3.0\t5.0\n1\t2.0\t4.0\t6.0\n";
        let test = "2\t0.5\t2.5\t4.5\n1\t1.5\t3.5\t5.5\n";
        std::fs::write(dir.join(format!("{dataset}_TRAIN.tsv")), train)
            .expect("train file should write");
        std::fs::write(dir.join(format!("{dataset}_TEST.tsv")), test)
            .expect("test file should write");
    }

    #[test]
    fn loads_splits_with_labels_and_shapes() {
        let dir = tempfile::tempdir().expect("tempdir should create");
        write_dataset(dir.path(), "Synthetic");

        let loader = UcrDirectoryLoader::new(dir.path());
        let corpus = loader.load("Synthetic", false).expect("load should succeed");
        assert_eq!(corpus.x_train().n(), 3);
        assert_eq!(corpus.x_test().n(), 2);
        assert_eq!(corpus.series_len(), 3);
        assert_eq!(corpus.y_train(), &[1, 2, 1]);
        assert_eq!(corpus.y_test(), &[2, 1]);
        assert_eq!(corpus.n_classes(), 2);
        assert_eq!(corpus.x_train().series(0), &[0.0, 2.0, 4.0]);
    }

    #[test]
    fn scaling_standardizes_with_train_statistics() {
        let dir = tempfile::tempdir().expect("tempdir should create");
        write_dataset(dir.path(), "Synthetic");

        let loader = UcrDirectoryLoader::new(dir.path());
        let corpus = loader.load("Synthetic", true).expect("load should succeed");

        let train_values = corpus.x_train().values();
        let count = train_values.len() as f64;
        let mean = train_values.iter().sum::<f64>() / count;
        let variance =
            train_values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / count;
        assert!(mean.abs() < 1e-12, "train mean {mean} should be ~0");
        assert!(
            (variance - 1.0).abs() < 1e-9,
            "train variance {variance} should be ~1"
        );

        // Test split uses the train statistics, not its own.
        let unscaled = loader.load("Synthetic", false).expect("unscaled load");
        let raw_mean = unscaled.x_train().values().iter().sum::<f64>()
            / unscaled.x_train().values().len() as f64;
        let first_scaled = corpus.x_test().series(0)[0];
        assert!(first_scaled < 0.0, "0.5 sits below the train mean {raw_mean}");
    }

    #[test]
    fn missing_split_file_is_an_io_error() {
        let dir = tempfile::tempdir().expect("tempdir should create");
        let loader = UcrDirectoryLoader::new(dir.path());
        let err = loader
            .load("Absent", false)
            .expect_err("absent dataset must fail");
        assert!(matches!(err, tseval_core::EvalError::Io { .. }));
    }

    #[test]
    fn malformed_rows_are_reported_with_position() {
        let dir = tempfile::tempdir().expect("tempdir should create");
        std::fs::write(
            dir.path().join("Bad_TRAIN.tsv"),
            "1\t0.0\t1.0\nnot-a-label\t2.0\t3.0\n",
        )
        .expect("train file should write");
        std::fs::write(dir.path().join("Bad_TEST.tsv"), "1\t0.0\t1.0\n")
            .expect("test file should write");

        let loader = UcrDirectoryLoader::new(dir.path());
        let err = loader.load("Bad", false).expect_err("bad label must fail");
        let message = err.to_string();
        assert!(message.contains("unparseable label"));
        assert!(message.contains(":2"), "message should carry the line: {message}");
    }

    #[test]
    fn fractional_labels_are_rejected() {
        let dir = tempfile::tempdir().expect("tempdir should create");
        std::fs::write(dir.path().join("Frac_TRAIN.tsv"), "1.5\t0.0\t1.0\n")
            .expect("train file should write");
        std::fs::write(dir.path().join("Frac_TEST.tsv"), "1\t0.0\t1.0\n")
            .expect("test file should write");

        let loader = UcrDirectoryLoader::new(dir.path());
        let err = loader.load("Frac", false).expect_err("fractional label must fail");
        assert!(err.to_string().contains("not an integer"));
    }

    #[test]
    fn constant_train_split_cannot_be_standardized() {
        let dir = tempfile::tempdir().expect("tempdir should create");
        std::fs::write(dir.path().join("Flat_TRAIN.tsv"), "1\t2.0\t2.0\t2.0\n1\t2.0\t2.0\t2.0\n")
            .expect("train file should write");
        std::fs::write(dir.path().join("Flat_TEST.tsv"), "1\t2.0\t2.0\t2.0\n")
            .expect("test file should write");

        let loader = UcrDirectoryLoader::new(dir.path());
        let err = loader.load("Flat", true).expect_err("zero variance must fail");
        assert!(err.to_string().contains("standard deviation"));
    }

    #[test]
    fn corpus_validates_label_counts_and_split_shapes() {
        let x = TimeSeriesBatch::from_univariate_rows(vec![vec![0.0; 4]; 3])
            .expect("batch should be valid");
        let err = ReferenceCorpus::new(x.clone(), vec![1, 2], x.clone(), vec![1, 1, 1])
            .expect_err("label count mismatch must fail");
        assert!(err.to_string().contains("train label count mismatch"));

        let longer = TimeSeriesBatch::from_univariate_rows(vec![vec![0.0; 5]; 3])
            .expect("batch should be valid");
        let err = ReferenceCorpus::new(x, vec![1, 1, 2], longer, vec![1, 1, 2])
            .expect_err("shape mismatch must fail");
        assert!(err.to_string().contains("train/test shape mismatch"));
    }
}
