//! FILENAME: crosstab-engine/src/tree.rs
//! The grouping tree - the central data structure of the engine.
//!
//! A mutable trie keyed by successive group-by values. The node at the
//! bottom of the grouping dimension holds, per distinct pivot value, one
//! leaf bundling an aggregation function per request. One tree is built per
//! partition, trees are merged pairwise, and the survivor is flattened once
//! into output rows.
//!
//! Recursion depth is bounded by the number of group-by columns (fixed at
//! configuration time), never by row count.

use rustc_hash::FxHashMap;

use table::DataValue;

use crate::aggregate::{AggregationCollector, AggregationFunction};

// ============================================================================
// NODES
// ============================================================================

/// One node of the grouping tree.
///
/// A node starts `Empty` and commits to exactly one shape on first insertion:
/// `Branch` while group-by columns remain below it, `Leaves` at the bottom of
/// the grouping dimension. All rows share the same grouping arity, so a
/// caller that mixes shapes on one node has corrupted its walk; those paths
/// panic rather than recover.
#[derive(Debug, Default)]
pub enum GroupNode {
    #[default]
    Empty,
    Branch(BranchNode),
    Leaves(LeafNode),
}

/// Insertion-ordered children keyed by group-by value.
///
/// The map holds each key's slot in the `children` vec, so iteration order is
/// first-seen order while lookups stay O(1).
#[derive(Debug, Default)]
pub struct BranchNode {
    slots: FxHashMap<DataValue, usize>,
    children: Vec<(DataValue, GroupNode)>,
}

/// Bottom-of-dimension node: one leaf per distinct pivot value, plus the
/// source row that created the node.
#[derive(Debug)]
pub struct LeafNode {
    /// The source row on which this node was created. Set exactly once;
    /// later rows reaching this node never move it.
    first_row: usize,
    slots: FxHashMap<DataValue, usize>,
    leaves: Vec<(DataValue, Leaf)>,
}

/// One (group, pivot value) cell: one aggregation function per request, in
/// request order.
#[derive(Debug)]
pub struct Leaf {
    pub functions: Vec<AggregationFunction>,
}

impl Leaf {
    /// Pairwise merge by index. Both sides were manufactured from the same
    /// request list, so diverged lengths mean a corrupted driver.
    fn merge(&mut self, other: Leaf) {
        assert_eq!(
            self.functions.len(),
            other.functions.len(),
            "aggregation function lists diverged during merge"
        );
        for (mine, theirs) in self.functions.iter_mut().zip(other.functions) {
            mine.merge(theirs);
        }
    }
}

impl GroupNode {
    pub fn new() -> Self {
        GroupNode::Empty
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, GroupNode::Empty)
    }

    /// Descends one grouping level, creating the child on first sight.
    pub fn child_for(&mut self, key: &DataValue) -> &mut GroupNode {
        if matches!(self, GroupNode::Empty) {
            *self = GroupNode::Branch(BranchNode::default());
        }
        let branch = match self {
            GroupNode::Branch(branch) => branch,
            GroupNode::Leaves(_) => {
                panic!("group node already holds leaves; branch and leaf operations must not mix")
            }
            GroupNode::Empty => unreachable!(),
        };
        let slot = match branch.slots.get(key) {
            Some(&slot) => slot,
            None => {
                let slot = branch.children.len();
                branch.slots.insert(key.clone(), slot);
                branch.children.push((key.clone(), GroupNode::Empty));
                slot
            }
        };
        &mut branch.children[slot].1
    }

    /// Reaches the leaf for `pivot_key`, creating the leaf-holder and the
    /// leaf itself on first sight. `row_index` pins the group's
    /// representative source row when (and only when) the node is created.
    pub fn leaf_for(
        &mut self,
        pivot_key: &DataValue,
        row_index: usize,
        make_functions: impl FnOnce() -> Vec<AggregationFunction>,
    ) -> &mut Leaf {
        if matches!(self, GroupNode::Empty) {
            *self = GroupNode::Leaves(LeafNode {
                first_row: row_index,
                slots: FxHashMap::default(),
                leaves: Vec::new(),
            });
        }
        let node = match self {
            GroupNode::Leaves(node) => node,
            GroupNode::Branch(_) => {
                panic!("group node already holds branches; branch and leaf operations must not mix")
            }
            GroupNode::Empty => unreachable!(),
        };
        let slot = match node.slots.get(pivot_key) {
            Some(&slot) => slot,
            None => {
                let slot = node.leaves.len();
                node.slots.insert(pivot_key.clone(), slot);
                node.leaves.push((
                    pivot_key.clone(),
                    Leaf {
                        functions: make_functions(),
                    },
                ));
                slot
            }
        };
        &mut node.leaves[slot].1
    }

    /// Merges `other` into `self` with union semantics, consuming `other`.
    ///
    /// Keys absent on the left are adopted by ownership transfer; keys
    /// present on both sides recurse (branches) or merge function lists
    /// pairwise (leaves). `self`'s `first_row` values are authoritative, so
    /// the caller fixes representative rows by fixing the merge order.
    /// Merging a `Branch` with a `Leaves` node means the two trees were
    /// built over different grouping schemas, which must never happen.
    pub fn merge(&mut self, other: GroupNode) {
        if other.is_empty() {
            return;
        }
        if self.is_empty() {
            *self = other;
            return;
        }
        match (&mut *self, other) {
            (GroupNode::Branch(a), GroupNode::Branch(b)) => {
                for (key, child) in b.children {
                    match a.slots.get(&key) {
                        Some(&slot) => a.children[slot].1.merge(child),
                        None => {
                            let slot = a.children.len();
                            a.slots.insert(key.clone(), slot);
                            a.children.push((key, child));
                        }
                    }
                }
            }
            (GroupNode::Leaves(a), GroupNode::Leaves(b)) => {
                for (pivot_key, leaf) in b.leaves {
                    match a.slots.get(&pivot_key) {
                        Some(&slot) => a.leaves[slot].1.merge(leaf),
                        None => {
                            let slot = a.leaves.len();
                            a.slots.insert(pivot_key.clone(), slot);
                            a.leaves.push((pivot_key, leaf));
                        }
                    }
                }
            }
            _ => panic!("cannot merge grouping trees of mismatched shape"),
        }
    }

    /// Number of distinct group tuples in the tree — the output row count.
    /// Used to size collectors before `flatten` runs.
    pub fn group_count(&self) -> usize {
        match self {
            GroupNode::Empty => 0,
            GroupNode::Leaves(_) => 1,
            GroupNode::Branch(branch) => branch
                .children
                .iter()
                .map(|(_, child)| child.group_count())
                .sum(),
        }
    }
}

// ============================================================================
// FLATTEN
// ============================================================================

/// The products of the flatten pass.
pub struct FlattenResult {
    /// Number of output rows assigned (equals `row_mapping.len()`).
    pub row_count: usize,

    /// Output row → the first source row observed for that group.
    pub row_mapping: Vec<usize>,

    /// Per distinct pivot value, in first-encounter order during the DFS:
    /// one collector per requested aggregation, fully populated.
    pub groups: Vec<(DataValue, Vec<AggregationCollector>)>,
}

struct FlattenState<F> {
    make_collectors: F,
    row_mapping: Vec<usize>,
    slots: FxHashMap<DataValue, usize>,
    groups: Vec<(DataValue, Vec<AggregationCollector>)>,
}

impl GroupNode {
    /// Flattens the tree depth-first in insertion order, assigning contiguous
    /// output row indices from 0 and writing every leaf's final values into
    /// its pivot value's collectors. Consumes the tree.
    ///
    /// `make_collectors` manufactures one collector per requested
    /// aggregation, already sized to the total output row count (see
    /// [`GroupNode::group_count`]); it runs once per distinct pivot value.
    pub fn flatten(
        self,
        make_collectors: impl FnMut() -> Vec<AggregationCollector>,
    ) -> FlattenResult {
        let mut state = FlattenState {
            make_collectors,
            row_mapping: Vec::new(),
            slots: FxHashMap::default(),
            groups: Vec::new(),
        };
        let row_count = self.flatten_into(&mut state, 0);
        debug_assert_eq!(row_count, state.row_mapping.len());
        FlattenResult {
            row_count,
            row_mapping: state.row_mapping,
            groups: state.groups,
        }
    }

    /// Threads the running output row counter through the walk and returns
    /// its continuation.
    fn flatten_into<F>(self, state: &mut FlattenState<F>, mut next_row: usize) -> usize
    where
        F: FnMut() -> Vec<AggregationCollector>,
    {
        match self {
            GroupNode::Empty => next_row,
            GroupNode::Branch(branch) => {
                for (_, child) in branch.children {
                    next_row = child.flatten_into(state, next_row);
                }
                next_row
            }
            GroupNode::Leaves(node) => {
                state.row_mapping.push(node.first_row);
                for (pivot_key, leaf) in node.leaves {
                    let slot = match state.slots.get(&pivot_key) {
                        Some(&slot) => slot,
                        None => {
                            let slot = state.groups.len();
                            state.slots.insert(pivot_key.clone(), slot);
                            state.groups.push((pivot_key, (state.make_collectors)()));
                            slot
                        }
                    };
                    let collectors = &mut state.groups[slot].1;
                    debug_assert_eq!(collectors.len(), leaf.functions.len());
                    for (collector, function) in collectors.iter_mut().zip(&leaf.functions) {
                        collector.collect(next_row, function.value());
                    }
                }
                next_row + 1
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::NumericAggregator;
    use crate::definition::AggregationKind;

    fn sum_function() -> Vec<AggregationFunction> {
        vec![AggregationFunction::new(
            0,
            None,
            NumericAggregator::new(AggregationKind::Sum, 0.0),
        )]
    }

    fn accept(leaf: &mut Leaf, value: f64) {
        let value = DataValue::Number(value);
        let slots = [&value];
        let row = crate::aggregate::RowView::new(&slots);
        for function in &mut leaf.functions {
            function.accept_row(&row);
        }
    }

    /// region → pivot product, one Sum aggregation.
    fn build_tree(rows: &[(&str, &str, f64)], first_row_offset: usize) -> GroupNode {
        let mut root = GroupNode::new();
        for (i, (region, product, value)) in rows.iter().enumerate() {
            let node = root.child_for(&DataValue::Text(region.to_string()));
            let leaf = node.leaf_for(
                &DataValue::Text(product.to_string()),
                first_row_offset + i,
                sum_function,
            );
            accept(leaf, *value);
        }
        root
    }

    fn flatten_with_rows(tree: GroupNode, row_count: usize) -> FlattenResult {
        tree.flatten(|| {
            vec![AggregationCollector::new(
                "Sum(v)".to_string(),
                table::ColumnType::Number,
                row_count,
            )]
        })
    }

    #[test]
    fn test_insertion_order_is_preserved() {
        let tree = build_tree(
            &[("South", "Apples", 1.0), ("North", "Pears", 2.0), ("South", "Pears", 3.0)],
            0,
        );
        assert_eq!(tree.group_count(), 2);
        let result = flatten_with_rows(tree, 2);
        // South was seen first → output row 0 (source row 0); North → row 1.
        assert_eq!(result.row_mapping, vec![0, 1]);
        // Pivot values in first-encounter order during the DFS.
        assert_eq!(result.groups[0].0, DataValue::Text("Apples".to_string()));
        assert_eq!(result.groups[1].0, DataValue::Text("Pears".to_string()));
    }

    #[test]
    fn test_first_row_is_pinned_at_creation() {
        let tree = build_tree(&[("A", "x", 1.0), ("A", "x", 2.0), ("A", "y", 3.0)], 10);
        let result = flatten_with_rows(tree, 1);
        assert_eq!(result.row_mapping, vec![10], "later rows must not move first_row");
    }

    #[test]
    fn test_merge_unions_groups_and_pivot_values() {
        let mut left = build_tree(&[("A", "x", 1.0), ("B", "x", 2.0)], 0);
        let right = build_tree(&[("B", "y", 4.0), ("C", "x", 8.0)], 2);
        left.merge(right);

        assert_eq!(left.group_count(), 3);
        let result = flatten_with_rows(left, 3);
        assert_eq!(result.row_mapping, vec![0, 1, 3]);
        assert_eq!(result.groups.len(), 2, "pivot values x and y");

        let (ref x_value, ref x_collectors) = result.groups[0];
        assert_eq!(*x_value, DataValue::Text("x".to_string()));
        let (_, _, x) = x_collectors[0].clone().into_parts();
        assert_eq!(
            x,
            vec![
                DataValue::Number(1.0),
                DataValue::Number(2.0),
                DataValue::Number(8.0)
            ]
        );

        let (_, _, y) = result.groups[1].1[0].clone().into_parts();
        assert_eq!(
            y,
            vec![
                DataValue::Missing,
                DataValue::Number(4.0),
                DataValue::Missing
            ]
        );
    }

    #[test]
    fn test_merge_combines_shared_leaves_pairwise() {
        let mut left = build_tree(&[("A", "x", 1.0)], 0);
        let right = build_tree(&[("A", "x", 2.0)], 1);
        left.merge(right);
        let result = flatten_with_rows(left, 1);
        let (_, _, values) = result.groups[0].1[0].clone().into_parts();
        assert_eq!(values, vec![DataValue::Number(3.0)]);
    }

    #[test]
    fn test_merge_keeps_left_first_row() {
        let mut left = build_tree(&[("A", "x", 1.0)], 5);
        let right = build_tree(&[("A", "x", 2.0)], 0);
        left.merge(right);
        let result = flatten_with_rows(left, 1);
        assert_eq!(result.row_mapping, vec![5], "left side's first_row wins");
    }

    #[test]
    fn test_merge_with_empty_tree_is_identity() {
        let mut tree = build_tree(&[("A", "x", 1.0)], 0);
        tree.merge(GroupNode::new());
        assert_eq!(tree.group_count(), 1);

        let mut empty = GroupNode::new();
        empty.merge(build_tree(&[("A", "x", 1.0)], 0));
        assert_eq!(empty.group_count(), 1);
    }

    #[test]
    fn test_flatten_of_empty_tree() {
        let result = flatten_with_rows(GroupNode::new(), 0);
        assert_eq!(result.row_count, 0);
        assert!(result.row_mapping.is_empty());
        assert!(result.groups.is_empty());
    }

    #[test]
    fn test_depth_two_flatten_order() {
        // Two grouping levels: (A,a) (A,b) (B,a), inserted interleaved.
        let mut root = GroupNode::new();
        for (i, (outer, inner, pivot)) in [("A", "a", "p"), ("B", "a", "p"), ("A", "b", "p")]
            .iter()
            .enumerate()
        {
            let node = root
                .child_for(&DataValue::Text(outer.to_string()))
                .child_for(&DataValue::Text(inner.to_string()));
            let leaf = node.leaf_for(&DataValue::Text(pivot.to_string()), i, sum_function);
            accept(leaf, 1.0);
        }
        assert_eq!(root.group_count(), 3);
        let result = flatten_with_rows(root, 3);
        // Depth-first: all of A's subtree (a then b), then B's.
        assert_eq!(result.row_mapping, vec![0, 2, 1]);
    }

    #[test]
    fn test_missing_is_a_valid_group_key() {
        let mut root = GroupNode::new();
        let node = root.child_for(&DataValue::Missing);
        let leaf = node.leaf_for(&DataValue::Missing, 0, sum_function);
        accept(leaf, 7.0);
        assert_eq!(root.group_count(), 1);
        let result = flatten_with_rows(root, 1);
        assert_eq!(result.groups[0].0, DataValue::Missing);
    }

    #[test]
    #[should_panic(expected = "must not mix")]
    fn test_mixing_branch_into_leaf_holder_panics() {
        let mut root = GroupNode::new();
        root.leaf_for(&DataValue::Missing, 0, sum_function);
        root.child_for(&DataValue::Missing);
    }

    #[test]
    #[should_panic(expected = "must not mix")]
    fn test_mixing_leaf_into_branch_panics() {
        let mut root = GroupNode::new();
        root.child_for(&DataValue::Missing);
        root.leaf_for(&DataValue::Missing, 0, sum_function);
    }

    #[test]
    #[should_panic(expected = "mismatched shape")]
    fn test_merging_mismatched_shapes_panics() {
        let mut branch = GroupNode::new();
        branch.child_for(&DataValue::Missing);
        let mut leaves = GroupNode::new();
        leaves.leaf_for(&DataValue::Missing, 0, sum_function);
        branch.merge(leaves);
    }
}
