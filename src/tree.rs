//! Binary tree reconstruction and maximum path searches.
//!
//! Trees arrive as flat slot arrays using complete-tree indexing: slot `i` has
//! children at `2i + 1` and `2i + 2`. An absent slot prunes its whole subtree,
//! so values stored beneath an absent slot are ignored.

use log::debug;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::error::EngineError;

/// Result of a tree calculation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeResult {
    /// Node values along the best unrestricted path, in path order.
    pub max_path: Vec<i64>,
    pub max_path_sum: i64,
    /// Node values along the best leaf-to-leaf path, in path order.
    pub max_leaf_path: Vec<i64>,
    pub max_leaf_sum: i64,
    pub calculation_time: f64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub value: i64,
    pub left: Option<usize>,
    pub right: Option<usize>,
    /// Position of this node in the flat encoding.
    pub slot: usize,
}

impl Node {
    pub fn is_leaf(&self) -> bool {
        self.left.is_none() && self.right.is_none()
    }
}

/// Arena-backed binary tree. Node ids index into the arena, root is id 0.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tree {
    nodes: Vec<Node>,
}

impl Tree {
    /// Rebuild a tree from its flat encoding.
    pub fn from_slots(slots: &[Option<i64>]) -> Self {
        let mut tree = Tree { nodes: Vec::new() };
        tree.build(slots, 0);
        tree
    }

    fn build(&mut self, slots: &[Option<i64>], slot: usize) -> Option<usize> {
        let value = (*slots.get(slot)?)?;
        let id = self.nodes.len();
        self.nodes.push(Node {
            value,
            left: None,
            right: None,
            slot,
        });

        let left = self.build(slots, 2 * slot + 1);
        let right = self.build(slots, 2 * slot + 2);
        self.nodes[id].left = left;
        self.nodes[id].right = right;
        Some(id)
    }

    /// Flatten back to slots. Trailing absent slots are dropped.
    pub fn to_slots(&self) -> Vec<Option<i64>> {
        let len = self.nodes.iter().map(|n| n.slot + 1).max().unwrap_or(0);
        let mut slots = vec![None; len];
        for node in &self.nodes {
            slots[node.slot] = Some(node.value);
        }
        slots
    }

    pub fn root(&self) -> Option<&Node> {
        self.nodes.first()
    }

    pub fn node(&self, id: usize) -> &Node {
        &self.nodes[id]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn leaf_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_leaf()).count()
    }

    /// Node ids with children before parents, left subtree first.
    pub fn post_order(&self) -> Vec<usize> {
        let mut order = Vec::with_capacity(self.nodes.len());
        if !self.nodes.is_empty() {
            self.visit(0, &mut order);
        }
        order
    }

    fn visit(&self, id: usize, order: &mut Vec<usize>) {
        let node = &self.nodes[id];
        if let Some(left) = node.left {
            self.visit(left, order);
        }
        if let Some(right) = node.right {
            self.visit(right, order);
        }
        order.push(id);
    }

    /// Values from `start` downward, following `next` until it runs out.
    fn descend(&self, start: usize, next: &[Option<usize>]) -> Vec<i64> {
        let mut values = vec![self.nodes[start].value];
        let mut current = start;
        while let Some(child) = next[current] {
            values.push(self.nodes[child].value);
            current = child;
        }
        values
    }

    /// Join a left descent, the turning node and a right descent into one path.
    fn join(&self, left: Option<Vec<i64>>, id: usize, right: Option<Vec<i64>>) -> Vec<i64> {
        let mut path = left.unwrap_or_default();
        path.reverse();
        path.push(self.nodes[id].value);
        path.extend(right.unwrap_or_default());
        path
    }

    /// Maximum sum over any connected path, with the path itself.
    ///
    /// Branches whose best downward contribution is not positive are
    /// abandoned, so an all-negative tree yields its largest single value.
    pub fn max_path(&self) -> Option<(i64, Vec<i64>)> {
        let order = self.post_order();
        let mut down = vec![0i64; self.nodes.len()];
        let mut next: Vec<Option<usize>> = vec![None; self.nodes.len()];
        let mut best: Option<(i64, usize, i64, i64)> = None;

        for &id in &order {
            let node = &self.nodes[id];
            let gain_left = node.left.map_or(0, |l| down[l].max(0));
            let gain_right = node.right.map_or(0, |r| down[r].max(0));

            next[id] = if gain_left > 0 && gain_left >= gain_right {
                node.left
            } else if gain_right > 0 {
                node.right
            } else {
                None
            };
            down[id] = node.value + gain_left.max(gain_right);

            let through = node.value + gain_left + gain_right;
            if best.is_none_or(|(sum, ..)| through > sum) {
                best = Some((through, id, gain_left, gain_right));
            }
        }

        let (sum, id, gain_left, gain_right) = best?;
        let node = &self.nodes[id];
        let left = node
            .left
            .filter(|_| gain_left > 0)
            .map(|l| self.descend(l, &next));
        let right = node
            .right
            .filter(|_| gain_right > 0)
            .map(|r| self.descend(r, &next));
        Some((sum, self.join(left, id, right)))
    }

    /// Maximum sum over paths joining two leaves through a branching node.
    ///
    /// When no node has two children the tree has a single leaf; the result
    /// is then the best downward run, from any node, that ends at that leaf.
    pub fn max_leaf_path(&self) -> Option<(i64, Vec<i64>)> {
        let order = self.post_order();
        let mut to_leaf = vec![0i64; self.nodes.len()];
        let mut next: Vec<Option<usize>> = vec![None; self.nodes.len()];
        let mut best_turn: Option<(i64, usize)> = None;

        for &id in &order {
            let node = &self.nodes[id];
            match (node.left, node.right) {
                (None, None) => {
                    to_leaf[id] = node.value;
                }
                (Some(child), None) | (None, Some(child)) => {
                    to_leaf[id] = node.value + to_leaf[child];
                    next[id] = Some(child);
                }
                (Some(l), Some(r)) => {
                    let child = if to_leaf[l] >= to_leaf[r] { l } else { r };
                    to_leaf[id] = node.value + to_leaf[child];
                    next[id] = Some(child);

                    let turn = node.value + to_leaf[l] + to_leaf[r];
                    if best_turn.is_none_or(|(sum, _)| turn > sum) {
                        best_turn = Some((turn, id));
                    }
                }
            }
        }

        if let Some((sum, id)) = best_turn {
            let node = &self.nodes[id];
            let left = node.left.map(|l| self.descend(l, &next));
            let right = node.right.map(|r| self.descend(r, &next));
            return Some((sum, self.join(left, id, right)));
        }

        let mut best: Option<(i64, usize)> = None;
        for &id in &order {
            if best.is_none_or(|(sum, _)| to_leaf[id] > sum) {
                best = Some((to_leaf[id], id));
            }
        }
        let (sum, id) = best?;
        Some((sum, self.descend(id, &next)))
    }
}

/// Reconstruct the tree and run both path searches.
///
/// # Examples
/// ```
/// use calculator::tree::compute;
///
/// let result = compute(&[Some(-10), Some(9), Some(20), None, None, Some(15), Some(7)]).unwrap();
/// assert_eq!(result.max_path_sum, 42);
/// assert_eq!(result.max_path, vec![15, 20, 7]);
/// ```
pub fn compute(slots: &[Option<i64>]) -> Result<TreeResult, EngineError> {
    let started = Instant::now();
    let tree = Tree::from_slots(slots);

    let (max_path_sum, max_path) = tree.max_path().ok_or(EngineError::EmptyTree)?;
    let (max_leaf_sum, max_leaf_path) = tree.max_leaf_path().ok_or(EngineError::EmptyTree)?;
    let calculation_time = started.elapsed().as_secs_f64() * 1000.0;

    debug!(
        "tree of {} nodes ({} slots): path sum {}, leaf sum {} in {:.3}ms",
        tree.len(),
        slots.len(),
        max_path_sum,
        max_leaf_sum,
        calculation_time
    );

    Ok(TreeResult {
        max_path,
        max_path_sum,
        max_leaf_path,
        max_leaf_sum,
        calculation_time,
    })
}
