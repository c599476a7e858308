//! Evaluation of pocket matchers.
//!
//! This module provides:
//! - ROC and precision-recall curves with VOC average precision
//! - The matcher interface and the evaluator driving it
//! - A matcher reading precomputed scores from a file

pub mod evaluator;
pub mod metrics;
pub mod score_file;

pub use evaluator::{EvaluationResult, MatchEvaluator, PocketMatcher};
pub use metrics::{
    PrCurve, RocCurve, average_precision, precision_recall_curve, roc_auc, roc_curve, voc_ap,
};
pub use score_file::ScoreFileMatcher;
