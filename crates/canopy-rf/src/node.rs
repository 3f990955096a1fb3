/// Position of a node inside a tree's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) struct NodeId(u32);

impl NodeId {
    pub(crate) fn new(index: usize) -> Self {
        debug_assert!(u32::try_from(index).is_ok(), "arena index overflows u32");
        Self(index as u32)
    }

    /// Return the zero-based arena position.
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// A node in a decision tree arena.
///
/// Children are referenced by [`NodeId`]; the root always sits at index 0.
#[derive(Debug, Clone)]
pub(crate) enum Node {
    /// Interior node: samples with `row[feature] <= threshold` go left.
    Branch {
        feature: usize,
        /// Strictly below the smallest value sent right.
        threshold: f64,
        left: NodeId,
        right: NodeId,
    },
    /// Terminal node holding the class frequencies (bootstrap repeats
    /// included) of the samples that reached it.
    Leaf { proba: Vec<f64> },
}

impl Node {
    pub(crate) fn is_leaf(&self) -> bool {
        matches!(self, Node::Leaf { .. })
    }
}
