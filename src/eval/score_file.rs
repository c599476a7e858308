//! Matcher backed by precomputed pair scores.

use super::evaluator::PocketMatcher;
use crate::entry::EntryPair;
use crate::error::{PocketBenchError, Result};
use log::{debug, info, warn};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Scores read from `code5_a code5_b score` lines.
///
/// Fields may be separated by commas or whitespace; blank lines and lines
/// starting with `#` are ignored. Pair lookup ignores order. Pairs without
/// a score get NaN, so they are excluded from metrics rather than failing
/// the evaluation.
#[derive(Debug, Clone, Default)]
pub struct ScoreFileMatcher {
    scores: HashMap<(String, String), f64>,
}

fn pair_key(a: &str, b: &str) -> (String, String) {
    if a <= b {
        (a.to_string(), b.to_string())
    } else {
        (b.to_string(), a.to_string())
    }
}

impl ScoreFileMatcher {
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(PocketBenchError::ResourceNotFound(path.to_path_buf()));
        }
        let content = fs::read_to_string(path).map_err(|e| PocketBenchError::io(path, e))?;

        let mut matcher = Self::default();
        for (idx, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let fields: Vec<&str> = line
                .split(|c: char| c == ',' || c.is_whitespace())
                .filter(|f| !f.is_empty())
                .collect();
            let [id1, id2, score, ..] = fields.as_slice() else {
                return Err(PocketBenchError::listing(
                    path,
                    idx,
                    "expected two ids and a score",
                ));
            };
            let score: f64 = score.parse().map_err(|_| {
                PocketBenchError::listing(path, idx, format!("invalid score '{}'", score))
            })?;
            matcher.insert(id1, id2, score);
        }

        info!("Loaded {} pair scores from {}", matcher.len(), path.display());
        Ok(matcher)
    }

    /// Set the score of a pair, replacing any previous one.
    pub fn insert(&mut self, a: &str, b: &str, score: f64) {
        self.scores.insert(pair_key(a, b), score);
    }

    pub fn score(&self, a: &str, b: &str) -> Option<f64> {
        self.scores.get(&pair_key(a, b)).copied()
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }
}

impl PocketMatcher for ScoreFileMatcher {
    fn pair_match(&self, pairs: &[EntryPair]) -> Result<Vec<f64>> {
        let mut missing = 0usize;
        let scores = pairs
            .iter()
            .map(|pair| {
                self.score(&pair.first.code5, &pair.second.code5)
                    .unwrap_or_else(|| {
                        debug!("No score for {} {}", pair.first.code5, pair.second.code5);
                        missing += 1;
                        f64::NAN
                    })
            })
            .collect();

        if missing > 0 {
            warn!("{} of {} pairs have no precomputed score", missing, pairs.len());
        }
        Ok(scores)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::test_entry;
    use tempfile::TempDir;

    #[test]
    fn test_mixed_separators_and_order_insensitive_lookup() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("scores.txt");
        fs::write(
            &path,
            "# id1 id2 score\n1a2bA,3c4dB,0.75\n\n5e6fC 1a2bA  -1.5\n3c4dB\t5e6fC\tnan\n",
        )
        .unwrap();

        let matcher = ScoreFileMatcher::from_file(&path).unwrap();
        assert_eq!(matcher.len(), 3);
        assert_eq!(matcher.score("3c4dB", "1a2bA"), Some(0.75));
        assert_eq!(matcher.score("1a2bA", "5e6fC"), Some(-1.5));
        assert!(matcher.score("5e6fC", "3c4dB").unwrap().is_nan());
    }

    #[test]
    fn test_missing_pair_scores_nan() {
        let mut matcher = ScoreFileMatcher::default();
        matcher.insert("1a2bA", "3c4dB", 0.5);

        let pairs = vec![
            EntryPair::new(test_entry("3c4dB"), test_entry("1a2bA")),
            EntryPair::new(test_entry("1a2bA"), test_entry("7g8hD")),
        ];
        let scores = matcher.pair_match(&pairs).unwrap();
        assert_eq!(scores[0], 0.5);
        assert!(scores[1].is_nan());
    }

    #[test]
    fn test_malformed_line() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("scores.csv");
        fs::write(&path, "1a2bA,3c4dB,0.1\n1a2bA,3c4dB,high\n").unwrap();
        assert!(matches!(
            ScoreFileMatcher::from_file(&path),
            Err(PocketBenchError::InvalidListing { line: 2, .. })
        ));

        fs::write(&path, "1a2bA,3c4dB\n").unwrap();
        assert!(matches!(
            ScoreFileMatcher::from_file(&path),
            Err(PocketBenchError::InvalidListing { line: 1, .. })
        ));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            ScoreFileMatcher::from_file(Path::new("/nonexistent/scores.txt")),
            Err(PocketBenchError::ResourceNotFound(_))
        ));
    }
}
