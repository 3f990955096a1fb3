use std::fmt;
use std::str::FromStr;

use rand::Rng;

/// Split-quality criterion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Criterion {
    /// Gini impurity: 1 - Σ(p_i²)
    Gini,
    /// Shannon entropy in nats: -Σ(p_i · ln(p_i))
    Entropy,
}

impl Criterion {
    /// Impurity of a node with the given class counts; 0.0 for an empty node.
    #[must_use]
    pub fn impurity(self, class_counts: &[usize], n_samples: usize) -> f64 {
        if n_samples == 0 {
            return 0.0;
        }
        let n = n_samples as f64;
        let proportions = class_counts
            .iter()
            .filter(|&&c| c > 0)
            .map(|&c| c as f64 / n);
        match self {
            Criterion::Gini => 1.0 - proportions.map(|p| p * p).sum::<f64>(),
            Criterion::Entropy => -proportions.map(|p| p * p.ln()).sum::<f64>(),
        }
    }

    /// Lowercase name, as accepted by [`FromStr`].
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Criterion::Gini => "gini",
            Criterion::Entropy => "entropy",
        }
    }
}

impl fmt::Display for Criterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Criterion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gini" => Ok(Criterion::Gini),
            "entropy" => Ok(Criterion::Entropy),
            other => Err(format!("unknown criterion: {other} (expected gini or entropy)")),
        }
    }
}

/// Best split found for one node.
#[derive(Debug, Clone)]
pub(crate) struct SplitCandidate {
    pub(crate) feature: usize,
    pub(crate) threshold: f64,
    pub(crate) left: Vec<usize>,
    pub(crate) right: Vec<usize>,
}

/// Inputs to a split search that stay fixed while a tree grows.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SplitRules {
    pub(crate) criterion: Criterion,
    pub(crate) max_features: usize,
    pub(crate) min_samples_leaf: usize,
}

/// Search `rules.max_features` randomly drawn columns for the split with the
/// largest impurity decrease.
///
/// `columns[feature][sample]`; `samples` may contain bootstrap repeats.
/// Returns `None` when every candidate column is constant over `samples` or
/// every boundary would leave a child below `min_samples_leaf`.
pub(crate) fn best_split(
    columns: &[Vec<f64>],
    labels: &[usize],
    samples: &[usize],
    class_counts: &[usize],
    rules: SplitRules,
    rng: &mut impl Rng,
) -> Option<SplitCandidate> {
    let n_features = columns.len();
    let n = samples.len();
    if n < 2 || n_features == 0 {
        return None;
    }
    let parent = rules.criterion.impurity(class_counts, n);

    // Partial Fisher-Yates over the column indices.
    let mut order: Vec<usize> = (0..n_features).collect();
    let take = rules.max_features.min(n_features);
    for i in 0..take {
        let j = rng.gen_range(i..n_features);
        order.swap(i, j);
    }

    let mut best: Option<(usize, f64, f64)> = None;
    let mut pairs: Vec<(f64, usize)> = Vec::with_capacity(n);

    for &feature in &order[..take] {
        let column = &columns[feature];
        pairs.clear();
        pairs.extend(samples.iter().map(|&s| (column[s], labels[s])));
        pairs.sort_unstable_by(|a, b| a.0.total_cmp(&b.0));

        let mut left_counts = vec![0usize; class_counts.len()];
        let mut right_counts = class_counts.to_vec();

        for i in 0..n - 1 {
            let (value, class) = pairs[i];
            left_counts[class] += 1;
            right_counts[class] -= 1;

            let next = pairs[i + 1].0;
            if value == next {
                continue;
            }
            let n_left = i + 1;
            let n_right = n - n_left;
            if n_left < rules.min_samples_leaf || n_right < rules.min_samples_leaf {
                continue;
            }

            // n·I(parent) - n_l·I(left) - n_r·I(right)
            let gain = n as f64 * parent
                - n_left as f64 * rules.criterion.impurity(&left_counts, n_left)
                - n_right as f64 * rules.criterion.impurity(&right_counts, n_right);
            if best.is_none_or(|(_, _, g)| gain > g) {
                // Adjacent floats round their midpoint up to `next`.
                let mid = (value + next) / 2.0;
                let threshold = if mid < next { mid } else { value };
                best = Some((feature, threshold, gain));
            }
        }
    }

    let (feature, threshold, _) = best?;
    let (left, right): (Vec<usize>, Vec<usize>) = samples
        .iter()
        .copied()
        .partition(|&s| columns[feature][s] <= threshold);
    if left.is_empty() || right.is_empty() {
        return None;
    }
    Some(SplitCandidate {
        feature,
        threshold,
        left,
        right,
    })
}
