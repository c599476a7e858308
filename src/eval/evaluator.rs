//! Pocket-matching evaluation over a labeled pair set.

use super::metrics::{average_precision, precision_recall_curve, roc_curve, trapezoid};
use crate::dataset::PairSet;
use crate::entry::EntryPair;
use crate::error::{PocketBenchError, Result};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// A pocket matcher scoring pairs in one batch.
///
/// Scores must come back in pair order, one per pair. Non-finite scores
/// mark pairs the matcher could not score.
pub trait PocketMatcher {
    fn pair_match(&self, pairs: &[EntryPair]) -> Result<Vec<f64>>;
}

impl<F> PocketMatcher for F
where
    F: Fn(&[EntryPair]) -> Result<Vec<f64>>,
{
    fn pair_match(&self, pairs: &[EntryPair]) -> Result<Vec<f64>> {
        self(pairs)
    }
}

/// Float lists that may hold NaN or infinities.
///
/// JSON has no literal for them, so non-finite values are written as the
/// strings `"NaN"`, `"Infinity"` and `"-Infinity"`. `null` reads back as NaN.
mod json_floats {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[derive(Serialize, Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Number(f64),
        Text(String),
    }

    fn to_repr(value: f64) -> Repr {
        if value.is_finite() {
            Repr::Number(value)
        } else if value.is_nan() {
            Repr::Text("NaN".to_string())
        } else if value > 0.0 {
            Repr::Text("Infinity".to_string())
        } else {
            Repr::Text("-Infinity".to_string())
        }
    }

    fn from_repr(repr: Option<Repr>) -> Result<f64, String> {
        match repr {
            None => Ok(f64::NAN),
            Some(Repr::Number(value)) => Ok(value),
            Some(Repr::Text(text)) => match text.as_str() {
                "NaN" => Ok(f64::NAN),
                "Infinity" => Ok(f64::INFINITY),
                "-Infinity" => Ok(f64::NEG_INFINITY),
                other => Err(format!("invalid float '{}'", other)),
            },
        }
    }

    pub fn serialize<S: Serializer>(values: &[f64], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(values.iter().map(|v| to_repr(*v)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<f64>, D::Error> {
        Vec::<Option<Repr>>::deserialize(deserializer)?
            .into_iter()
            .map(|repr| from_repr(repr).map_err(D::Error::custom))
            .collect()
    }
}

/// Metrics and raw curves of one evaluation.
///
/// `pairs`, `scores` and `labels` are echoed unfiltered; curves and scalars
/// are computed on the finite-score subset only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub average_precision: f64,
    pub precision: Vec<f64>,
    pub recall: Vec<f64>,
    #[serde(with = "json_floats")]
    pub pr_thresholds: Vec<f64>,
    pub auc: f64,
    pub fpr: Vec<f64>,
    pub tpr: Vec<f64>,
    #[serde(with = "json_floats")]
    pub roc_thresholds: Vec<f64>,
    pub pairs: Vec<EntryPair>,
    #[serde(with = "json_floats")]
    pub scores: Vec<f64>,
    pub labels: Vec<bool>,
    /// Pairs left out of the metrics for a non-finite score.
    #[serde(default)]
    pub excluded: usize,
}

impl EvaluationResult {
    /// Write as pretty JSON; non-finite scores and thresholds are kept as text.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| PocketBenchError::io(parent, e))?;
            }
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).map_err(|e| PocketBenchError::io(path, e))?;
        Ok(())
    }

    /// Read a result written by [`save`](Self::save).
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(PocketBenchError::ResourceNotFound(path.to_path_buf()));
        }
        let json = fs::read_to_string(path).map_err(|e| PocketBenchError::io(path, e))?;
        Ok(serde_json::from_str(&json)?)
    }

    /// Print summary to stdout.
    pub fn print_summary(&self, dataset: &str) {
        let positives = self.labels.iter().filter(|l| **l).count();
        println!("\n========== Evaluation Results ==========");
        println!("Dataset: {}", dataset);
        println!(
            "Pairs: {} ({} positive, {} negative)",
            self.pairs.len(),
            positives,
            self.labels.len() - positives
        );
        if self.excluded > 0 {
            println!("Excluded (non-finite score): {}", self.excluded);
        }
        println!("----------------------------------------");
        println!("AUC:               {:.4}", self.auc);
        println!("Average precision: {:.4}", self.average_precision);
        println!("========================================\n");
    }
}

/// Computes ROC and precision-recall metrics for a matcher.
#[derive(Debug, Clone, Copy, Default)]
pub struct MatchEvaluator;

impl MatchEvaluator {
    pub fn new() -> Self {
        Self
    }

    /// Score every pair with a single matcher call and evaluate.
    pub fn evaluate<M: PocketMatcher + ?Sized>(
        &self,
        pair_set: &PairSet,
        matcher: &M,
    ) -> Result<EvaluationResult> {
        let scores = matcher.pair_match(&pair_set.pairs)?;
        self.evaluate_scores(pair_set, scores)
    }

    /// Evaluate precomputed scores aligned with `pair_set`.
    pub fn evaluate_scores(&self, pair_set: &PairSet, scores: Vec<f64>) -> Result<EvaluationResult> {
        if scores.len() != pair_set.len() {
            return Err(PocketBenchError::ScoreCountMismatch {
                expected: pair_set.len(),
                actual: scores.len(),
            });
        }

        let (valid_labels, valid_scores): (Vec<bool>, Vec<f64>) = pair_set
            .labels
            .iter()
            .zip(&scores)
            .filter(|(_, score)| score.is_finite())
            .map(|(label, score)| (*label, *score))
            .unzip();

        let excluded = scores.len() - valid_scores.len();
        if excluded > 0 {
            warn!(
                "{} of {} pairs have a non-finite score and are excluded from metrics",
                excluded,
                scores.len()
            );
        }
        if valid_scores.is_empty() {
            return Err(PocketBenchError::InsufficientData(
                "no valid scores".to_string(),
            ));
        }

        let roc = roc_curve(&valid_labels, &valid_scores)?;
        let pr = precision_recall_curve(&valid_labels, &valid_scores)?;
        let auc = trapezoid(&roc.fpr, &roc.tpr);
        let ap = average_precision(&pr);
        info!("AUC {:.4}, average precision {:.4}", auc, ap);

        Ok(EvaluationResult {
            average_precision: ap,
            precision: pr.precision,
            recall: pr.recall,
            pr_thresholds: pr.thresholds,
            auc,
            fpr: roc.fpr,
            tpr: roc.tpr,
            roc_thresholds: roc.thresholds,
            pairs: pair_set.pairs.clone(),
            scores,
            labels: pair_set.labels.clone(),
            excluded,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::test_entry;
    use std::cell::Cell;
    use tempfile::TempDir;

    fn pair_set(labels: &[bool]) -> PairSet {
        let pairs = (0..labels.len())
            .map(|i| EntryPair::new(test_entry(&format!("{}aaaA", i)), test_entry("9zzzB")))
            .collect();
        PairSet {
            pairs,
            labels: labels.to_vec(),
            dropped: 0,
        }
    }

    fn fixed(scores: Vec<f64>) -> impl Fn(&[EntryPair]) -> Result<Vec<f64>> {
        move |_| Ok(scores.clone())
    }

    #[test]
    fn test_perfect_separation() {
        let set = pair_set(&[true, false, true, false]);
        let result = MatchEvaluator::new()
            .evaluate(&set, &fixed(vec![0.9, 0.1, 0.8, 0.2]))
            .unwrap();

        assert!((result.auc - 1.0).abs() < 1e-12);
        assert!((result.average_precision - 1.0).abs() < 1e-12);
        assert_eq!(result.excluded, 0);
        assert_eq!(result.fpr.len(), result.tpr.len());
        assert_eq!(result.fpr.len(), result.roc_thresholds.len());
        assert_eq!(result.precision.len(), result.recall.len());
    }

    #[test]
    fn test_nan_scores_are_excluded_but_echoed() {
        let set = pair_set(&[true, false, true, false]);
        let result = MatchEvaluator::new()
            .evaluate(&set, &fixed(vec![f64::NAN, 0.1, 0.8, 0.2]))
            .unwrap();

        assert_eq!(result.excluded, 1);
        assert_eq!(result.scores.len(), 4);
        assert!(result.scores[0].is_nan());
        assert_eq!(result.labels, vec![true, false, true, false]);
        assert_eq!(result.pairs.len(), 4);
        // Remaining three pairs are perfectly separated.
        assert!((result.auc - 1.0).abs() < 1e-12);
        assert!((result.average_precision - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_all_non_finite_is_insufficient() {
        let set = pair_set(&[true, false, true]);
        let result = MatchEvaluator::new().evaluate(
            &set,
            &fixed(vec![f64::NAN, f64::INFINITY, f64::NEG_INFINITY]),
        );
        assert!(matches!(result, Err(PocketBenchError::InsufficientData(_))));
    }

    #[test]
    fn test_single_class_is_insufficient() {
        let set = pair_set(&[true, true, false]);
        // Only the positives survive the filter.
        let result = MatchEvaluator::new().evaluate(&set, &fixed(vec![0.2, 0.4, f64::NAN]));
        assert!(matches!(result, Err(PocketBenchError::InsufficientData(_))));
    }

    #[test]
    fn test_score_count_mismatch() {
        let set = pair_set(&[true, false]);
        let result = MatchEvaluator::new().evaluate(&set, &fixed(vec![0.5]));
        assert!(matches!(
            result,
            Err(PocketBenchError::ScoreCountMismatch { expected: 2, actual: 1 })
        ));
    }

    #[test]
    fn test_matcher_called_once_with_all_pairs() {
        let set = pair_set(&[true, false, true, false]);
        let calls = Cell::new(0);
        let matcher = |pairs: &[EntryPair]| -> Result<Vec<f64>> {
            calls.set(calls.get() + 1);
            Ok(pairs.iter().enumerate().map(|(i, _)| i as f64).collect())
        };

        let result = MatchEvaluator::new().evaluate(&set, &matcher).unwrap();
        assert_eq!(calls.get(), 1);
        assert_eq!(result.scores, vec![0.0, 1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_save_then_load_keeps_non_finite_values() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out").join("result.json");
        let set = pair_set(&[true, false, true, false, true, false]);
        let scores = vec![0.7, f64::NAN, 0.9, f64::NEG_INFINITY, 0.4, 0.2];
        let result = MatchEvaluator::new()
            .evaluate(&set, &fixed(scores))
            .unwrap();
        result.save(&path).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["roc_thresholds"][0], serde_json::json!("Infinity"));
        assert_eq!(value["scores"][1], serde_json::json!("NaN"));
        assert_eq!(value["scores"][3], serde_json::json!("-Infinity"));

        let loaded = EvaluationResult::load(&path).unwrap();
        assert_eq!(loaded.scores[0], 0.7);
        assert!(loaded.scores[1].is_nan());
        assert_eq!(loaded.scores[3], f64::NEG_INFINITY);
        assert_eq!(loaded.roc_thresholds[0], f64::INFINITY);
        assert_eq!(loaded.roc_thresholds[1..], result.roc_thresholds[1..]);
        assert_eq!(loaded.pr_thresholds, result.pr_thresholds);
        assert_eq!(loaded.labels, result.labels);
        assert_eq!(loaded.pairs, result.pairs);
        assert_eq!(loaded.excluded, 2);
        assert_eq!(loaded.auc, result.auc);
        assert_eq!(loaded.average_precision, result.average_precision);
    }

    #[test]
    fn test_null_reads_back_as_nan() {
        let set = pair_set(&[true, false]);
        let result = MatchEvaluator::new()
            .evaluate(&set, &fixed(vec![0.7, 0.3]))
            .unwrap();
        let mut value = serde_json::to_value(&result).unwrap();
        value["scores"][0] = serde_json::Value::Null;

        let loaded: EvaluationResult = serde_json::from_value(value).unwrap();
        assert!(loaded.scores[0].is_nan());
        assert_eq!(loaded.scores[1], 0.3);
    }

    #[test]
    fn test_load_missing_result() {
        assert!(matches!(
            EvaluationResult::load(Path::new("/nonexistent/result.json")),
            Err(PocketBenchError::ResourceNotFound(_))
        ));
    }
}
