use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::trace;

use crate::node::{Node, NodeId};
use crate::split::{SplitRules, best_split};
use crate::training::TrainingSet;

/// A fitted CART classification tree stored as a node arena.
#[derive(Debug, Clone)]
pub(crate) struct DecisionTree {
    nodes: Vec<Node>,
}

struct Builder<'a> {
    data: &'a TrainingSet,
    rules: SplitRules,
    rng: ChaCha8Rng,
    nodes: Vec<Node>,
}

impl Builder<'_> {
    fn grow(&mut self, samples: &[usize]) -> NodeId {
        let mut counts = vec![0usize; self.data.n_classes];
        for &s in samples {
            counts[self.data.labels[s]] += 1;
        }

        let pure = counts.iter().filter(|&&c| c > 0).count() <= 1;
        if pure || samples.len() < 2 * self.rules.min_samples_leaf {
            return self.leaf(&counts, samples.len());
        }

        let Some(split) = best_split(
            &self.data.columns,
            &self.data.labels,
            samples,
            &counts,
            self.rules,
            &mut self.rng,
        ) else {
            return self.leaf(&counts, samples.len());
        };

        // Reserve the branch slot so the root stays at index 0.
        let id = NodeId::new(self.nodes.len());
        self.nodes.push(Node::Leaf { proba: Vec::new() });
        let left = self.grow(&split.left);
        let right = self.grow(&split.right);
        self.nodes[id.index()] = Node::Branch {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
        };
        id
    }

    fn leaf(&mut self, counts: &[usize], n_samples: usize) -> NodeId {
        let total = n_samples.max(1) as f64;
        let proba = counts.iter().map(|&c| c as f64 / total).collect();
        let id = NodeId::new(self.nodes.len());
        self.nodes.push(Node::Leaf { proba });
        id
    }
}

impl DecisionTree {
    /// Grow a tree on `samples` (bootstrap indices into `data`).
    pub(crate) fn grow(
        data: &TrainingSet,
        samples: &[usize],
        rules: SplitRules,
        seed: u64,
    ) -> Self {
        let mut builder = Builder {
            data,
            rules,
            rng: ChaCha8Rng::seed_from_u64(seed),
            nodes: Vec::new(),
        };
        builder.grow(samples);
        trace!(n_nodes = builder.nodes.len(), "tree grown");
        Self {
            nodes: builder.nodes,
        }
    }

    /// Class frequencies of the leaf reached by `sample`.
    ///
    /// The caller checks that `sample` has the training width.
    pub(crate) fn leaf_proba(&self, sample: &[f64]) -> &[f64] {
        let mut node = &self.nodes[0];
        loop {
            match node {
                Node::Branch {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    let next = if sample[*feature] <= *threshold { left } else { right };
                    node = &self.nodes[next.index()];
                }
                Node::Leaf { proba } => return proba,
            }
        }
    }

    /// Number of leaves.
    pub(crate) fn n_leaves(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_leaf()).count()
    }
}
