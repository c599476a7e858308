//! Ranking metrics for binary labels.
//!
//! Curve construction follows the conventions of scikit-learn's
//! `roc_curve` and `precision_recall_curve` so that numbers stay comparable
//! with published benchmark results. Average precision is the interpolated
//! VOC definition, not the step-wise estimator.

use crate::error::{PocketBenchError, Result};
use serde::{Deserialize, Serialize};

/// ROC points in order of decreasing threshold.
///
/// The first threshold is `+inf`, where nothing is predicted positive.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RocCurve {
    pub fpr: Vec<f64>,
    pub tpr: Vec<f64>,
    pub thresholds: Vec<f64>,
}

/// Precision-recall points in order of decreasing recall.
///
/// `precision` and `recall` have one element more than `thresholds`: the
/// final point (precision 1, recall 0) has no threshold.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PrCurve {
    pub precision: Vec<f64>,
    pub recall: Vec<f64>,
    pub thresholds: Vec<f64>,
}

/// Cumulative counts at each distinct score, highest score first.
struct ClassificationCounts {
    fps: Vec<f64>,
    tps: Vec<f64>,
    thresholds: Vec<f64>,
}

fn check_inputs(labels: &[bool], scores: &[f64]) -> Result<()> {
    if labels.len() != scores.len() {
        return Err(PocketBenchError::ScoreCountMismatch {
            expected: labels.len(),
            actual: scores.len(),
        });
    }
    if scores.is_empty() {
        return Err(PocketBenchError::InsufficientData(
            "no valid scores".to_string(),
        ));
    }
    if let Some(bad) = scores.iter().find(|s| !s.is_finite()) {
        return Err(PocketBenchError::InsufficientData(format!(
            "non-finite score {} passed to metric computation",
            bad
        )));
    }
    let positives = labels.iter().filter(|l| **l).count();
    if positives == 0 || positives == labels.len() {
        return Err(PocketBenchError::InsufficientData(
            "both positive and negative pairs are required".to_string(),
        ));
    }
    Ok(())
}

fn binary_clf_curve(labels: &[bool], scores: &[f64]) -> Result<ClassificationCounts> {
    check_inputs(labels, scores)?;

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));

    let mut counts = ClassificationCounts {
        fps: Vec::new(),
        tps: Vec::new(),
        thresholds: Vec::new(),
    };
    let mut tp = 0.0;
    for (rank, &idx) in order.iter().enumerate() {
        if labels[idx] {
            tp += 1.0;
        }
        let is_last_of_value = order
            .get(rank + 1)
            .is_none_or(|&next| scores[next] != scores[idx]);
        if is_last_of_value {
            counts.tps.push(tp);
            counts.fps.push((rank + 1) as f64 - tp);
            counts.thresholds.push(scores[idx]);
        }
    }
    Ok(counts)
}

/// Receiver operating characteristic.
///
/// Points that are collinear with both neighbours are dropped; the area
/// under the curve is unaffected.
pub fn roc_curve(labels: &[bool], scores: &[f64]) -> Result<RocCurve> {
    let counts = binary_clf_curve(labels, scores)?;
    let n = counts.fps.len();

    let keep: Vec<usize> = if n > 2 {
        (0..n)
            .filter(|&i| {
                i == 0
                    || i == n - 1
                    || second_difference(&counts.fps, i - 1) != 0.0
                    || second_difference(&counts.tps, i - 1) != 0.0
            })
            .collect()
    } else {
        (0..n).collect()
    };

    let total_fp = counts.fps[n - 1];
    let total_tp = counts.tps[n - 1];

    let mut curve = RocCurve {
        fpr: vec![0.0],
        tpr: vec![0.0],
        thresholds: vec![f64::INFINITY],
    };
    for i in keep {
        curve.fpr.push(counts.fps[i] / total_fp);
        curve.tpr.push(counts.tps[i] / total_tp);
        curve.thresholds.push(counts.thresholds[i]);
    }
    Ok(curve)
}

/// `v[i + 2] - 2 v[i + 1] + v[i]`
fn second_difference(v: &[f64], i: usize) -> f64 {
    v[i + 2] - 2.0 * v[i + 1] + v[i]
}

/// Area under the ROC curve.
pub fn roc_auc(labels: &[bool], scores: &[f64]) -> Result<f64> {
    let curve = roc_curve(labels, scores)?;
    Ok(trapezoid(&curve.fpr, &curve.tpr))
}

/// Trapezoidal area under `y(x)`; `x` must be monotonic.
pub fn trapezoid(x: &[f64], y: &[f64]) -> f64 {
    let area: f64 = x
        .windows(2)
        .zip(y.windows(2))
        .map(|(xs, ys)| (xs[1] - xs[0]) * (ys[0] + ys[1]) / 2.0)
        .sum();
    area.abs()
}

/// Precision and recall at every distinct threshold.
pub fn precision_recall_curve(labels: &[bool], scores: &[f64]) -> Result<PrCurve> {
    let counts = binary_clf_curve(labels, scores)?;
    let total_tp = counts.tps[counts.tps.len() - 1];

    let mut curve = PrCurve::default();
    for i in (0..counts.tps.len()).rev() {
        let predicted = counts.tps[i] + counts.fps[i];
        curve.precision.push(if predicted > 0.0 {
            counts.tps[i] / predicted
        } else {
            0.0
        });
        curve.recall.push(counts.tps[i] / total_tp);
        curve.thresholds.push(counts.thresholds[i]);
    }
    curve.precision.push(1.0);
    curve.recall.push(0.0);
    Ok(curve)
}

/// Interpolated average precision (PASCAL VOC).
///
/// `recall` must be ascending with `precision` aligned to it. Precision is
/// replaced by its running maximum from the high-recall end, then summed
/// over the recall steps.
pub fn voc_ap(recall: &[f64], precision: &[f64]) -> f64 {
    let mut mrec = Vec::with_capacity(recall.len() + 2);
    mrec.push(0.0);
    mrec.extend_from_slice(recall);
    mrec.push(1.0);

    let mut mpre = Vec::with_capacity(precision.len() + 2);
    mpre.push(0.0);
    mpre.extend_from_slice(precision);
    mpre.push(0.0);

    for i in (1..mpre.len()).rev() {
        mpre[i - 1] = mpre[i - 1].max(mpre[i]);
    }

    (0..mrec.len() - 1)
        .filter(|&i| mrec[i + 1] != mrec[i])
        .map(|i| (mrec[i + 1] - mrec[i]) * mpre[i + 1])
        .sum()
}

/// VOC average precision of a precision-recall curve.
pub fn average_precision(curve: &PrCurve) -> f64 {
    let recall: Vec<f64> = curve.recall.iter().rev().copied().collect();
    let precision: Vec<f64> = curve.precision.iter().rev().copied().collect();
    voc_ap(&recall, &precision)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: &[f64], b: &[f64]) {
        assert_eq!(a.len(), b.len(), "{:?} vs {:?}", a, b);
        for (x, y) in a.iter().zip(b) {
            assert!((x - y).abs() < 1e-9, "{:?} vs {:?}", a, b);
        }
    }

    #[test]
    fn test_voc_ap_envelope() {
        assert!((voc_ap(&[0.0, 0.5, 1.0], &[1.0, 0.5, 0.5]) - 0.5).abs() < 1e-12);
        // A dip in precision is lifted by the higher-recall point.
        assert!((voc_ap(&[0.25, 0.5, 1.0], &[1.0, 0.4, 0.8]) - 0.85).abs() < 1e-12);
    }

    #[test]
    fn test_perfect_separation() {
        let labels = [true, false, true, false];
        let scores = [0.9, 0.1, 0.8, 0.2];

        assert!((roc_auc(&labels, &scores).unwrap() - 1.0).abs() < 1e-12);
        let pr = precision_recall_curve(&labels, &scores).unwrap();
        assert!((average_precision(&pr) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_roc_curve_points() {
        let labels = [false, false, true, true];
        let scores = [0.1, 0.4, 0.35, 0.8];
        let curve = roc_curve(&labels, &scores).unwrap();

        assert_close(&curve.fpr, &[0.0, 0.0, 0.5, 0.5, 1.0]);
        assert_close(&curve.tpr, &[0.0, 0.5, 0.5, 1.0, 1.0]);
        assert!(curve.thresholds[0].is_infinite());
        assert_close(&curve.thresholds[1..], &[0.8, 0.4, 0.35, 0.1]);
        assert!((roc_auc(&labels, &scores).unwrap() - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_roc_drops_collinear_points() {
        let labels = [true, true, true, false];
        let scores = [0.9, 0.8, 0.7, 0.1];
        let curve = roc_curve(&labels, &scores).unwrap();
        assert_close(&curve.fpr, &[0.0, 0.0, 0.0, 1.0]);
        assert_close(&curve.tpr, &[0.0, 1.0 / 3.0, 1.0, 1.0]);
    }

    #[test]
    fn test_ties_share_a_threshold() {
        let labels = [true, false, true, false];
        let scores = [0.5, 0.5, 0.5, 0.5];
        let curve = roc_curve(&labels, &scores).unwrap();
        assert_close(&curve.fpr, &[0.0, 1.0]);
        assert_close(&curve.tpr, &[0.0, 1.0]);
        assert!((roc_auc(&labels, &scores).unwrap() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_precision_recall_points() {
        let labels = [false, false, true, true];
        let scores = [0.1, 0.4, 0.35, 0.8];
        let curve = precision_recall_curve(&labels, &scores).unwrap();

        assert_close(&curve.precision, &[0.5, 2.0 / 3.0, 0.5, 1.0, 1.0]);
        assert_close(&curve.recall, &[1.0, 1.0, 0.5, 0.5, 0.0]);
        assert_close(&curve.thresholds, &[0.1, 0.35, 0.4, 0.8]);
        // Envelope: 0.5 * 1.0 + 0.5 * (2/3).
        assert!((average_precision(&curve) - (0.5 + 1.0 / 3.0)).abs() < 1e-12);
    }

    #[test]
    fn test_degenerate_inputs() {
        assert!(matches!(
            roc_auc(&[], &[]),
            Err(PocketBenchError::InsufficientData(_))
        ));
        assert!(matches!(
            roc_auc(&[true, true], &[0.3, 0.4]),
            Err(PocketBenchError::InsufficientData(_))
        ));
        assert!(matches!(
            precision_recall_curve(&[true, false], &[f64::NAN, 0.4]),
            Err(PocketBenchError::InsufficientData(_))
        ));
        assert!(matches!(
            roc_curve(&[true, false], &[0.4]),
            Err(PocketBenchError::ScoreCountMismatch { .. })
        ));
    }
}
