//! Page-load dependency graph
//!
//! An immutable directed acyclic graph whose nodes are CPU tasks and network
//! records. An edge `A → B` means "B cannot start before A finishes".
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │ GraphBuilder                                                    │
//! │   nodes: [document, app.js, style.css, parse, layout]           │
//! │   edges: [(document → app.js), (document → parse), ...]         │
//! └─────────────────────────────────────────────────────────────────┘
//!                          │
//!                          │ build() - validates ids, root, acyclicity
//!                          ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │ DependencyGraph                                                 │
//! │   nodes stored in topological order (ties: start time, then id) │
//! │   dependencies / dependents as index adjacency lists            │
//! └─────────────────────────────────────────────────────────────────┘
//!                          │
//!                          │ clone_with_relationships(predicate)
//!                          ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │ Derived variant (optimistic / pessimistic)                      │
//! │   root + matching nodes + every dependency back to the root     │
//! │   same NodeIds, original graph untouched                        │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use lantern::dependency_graph::GraphBuilder;
//! use lantern::node::{CpuNode, NetworkNode, NodeId, ResourceType};
//!
//! # fn main() -> anyhow::Result<()> {
//! let graph = GraphBuilder::new()
//!     .node(NetworkNode::new(NodeId(1), "https://example.com/", ResourceType::Document)
//!         .with_timing(0.0, 100.0))
//!     .node(CpuNode::new(NodeId(2), 100.0, 150.0))
//!     .edge(NodeId(1), NodeId(2))
//!     .build()?;
//!
//! assert_eq!(graph.node_count(), 2);
//! assert_eq!(graph.edge_count(), 1);
//! assert_eq!(graph.root().id(), NodeId(1));
//! # Ok(())
//! # }
//! ```

use crate::node::{Node, NodeId};
use std::cmp::Ordering;
use std::collections::{BTreeSet, BinaryHeap, HashMap};
use thiserror::Error;

/// Errors raised while assembling a dependency graph
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GraphError {
    #[error("Dependency graph has no nodes")]
    Empty,

    #[error("Duplicate node id {0}")]
    DuplicateNode(NodeId),

    #[error("Edge references unknown node {0}")]
    UnknownNode(NodeId),

    #[error("Dependency graph must have exactly one root, found {0:?}")]
    RootCount(Vec<NodeId>),

    #[error("Dependency graph contains a cycle through {0}")]
    Cycle(NodeId),
}

/// Incremental builder for [`DependencyGraph`]
#[derive(Debug, Default, Clone)]
pub struct GraphBuilder {
    nodes: Vec<Node>,
    edges: Vec<(NodeId, NodeId)>,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node
    pub fn node(mut self, node: impl Into<Node>) -> Self {
        self.nodes.push(node.into());
        self
    }

    /// Add a `dependency → dependent` edge
    pub fn edge(mut self, dependency: NodeId, dependent: NodeId) -> Self {
        self.edges.push((dependency, dependent));
        self
    }

    /// Add many nodes at once
    pub fn nodes(mut self, nodes: impl IntoIterator<Item = Node>) -> Self {
        self.nodes.extend(nodes);
        self
    }

    /// Add many edges at once
    pub fn edges(mut self, edges: impl IntoIterator<Item = (NodeId, NodeId)>) -> Self {
        self.edges.extend(edges);
        self
    }

    /// Validate and freeze the graph
    ///
    /// # Errors
    ///
    /// - [`GraphError::Empty`] when no nodes were added
    /// - [`GraphError::DuplicateNode`] when two nodes share an id
    /// - [`GraphError::UnknownNode`] when an edge names a missing node
    /// - [`GraphError::RootCount`] unless exactly one node has no dependencies
    /// - [`GraphError::Cycle`] when the edges do not form a DAG
    pub fn build(self) -> Result<DependencyGraph, GraphError> {
        if self.nodes.is_empty() {
            return Err(GraphError::Empty);
        }

        let mut position: HashMap<NodeId, usize> = HashMap::with_capacity(self.nodes.len());
        for (idx, node) in self.nodes.iter().enumerate() {
            if position.insert(node.id(), idx).is_some() {
                return Err(GraphError::DuplicateNode(node.id()));
            }
        }

        // Phase 1: adjacency over builder positions (duplicate edges collapse)
        let mut dependencies: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); self.nodes.len()];
        let mut dependents: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); self.nodes.len()];
        for (from, to) in &self.edges {
            let from_idx = *position.get(from).ok_or(GraphError::UnknownNode(*from))?;
            let to_idx = *position.get(to).ok_or(GraphError::UnknownNode(*to))?;
            if from_idx == to_idx {
                return Err(GraphError::Cycle(*from));
            }
            dependencies[to_idx].insert(from_idx);
            dependents[from_idx].insert(to_idx);
        }

        let roots: Vec<usize> = (0..self.nodes.len())
            .filter(|&idx| dependencies[idx].is_empty())
            .collect();
        if roots.len() != 1 {
            return Err(GraphError::RootCount(
                roots.iter().map(|&idx| self.nodes[idx].id()).collect(),
            ));
        }

        // Phase 2: Kahn's algorithm, earliest recorded start first
        let mut remaining: Vec<usize> = dependencies.iter().map(BTreeSet::len).collect();
        let mut ready: BinaryHeap<ReadyNode> = roots
            .iter()
            .map(|&idx| ReadyNode::new(&self.nodes[idx], idx))
            .collect();
        let mut order = Vec::with_capacity(self.nodes.len());

        while let Some(ReadyNode { idx, .. }) = ready.pop() {
            order.push(idx);
            for &dependent in &dependents[idx] {
                remaining[dependent] -= 1;
                if remaining[dependent] == 0 {
                    ready.push(ReadyNode::new(&self.nodes[dependent], dependent));
                }
            }
        }

        if order.len() != self.nodes.len() {
            let stuck = (0..self.nodes.len())
                .find(|&idx| remaining[idx] > 0)
                .map(|idx| self.nodes[idx].id())
                .unwrap_or_else(|| self.nodes[0].id());
            return Err(GraphError::Cycle(stuck));
        }

        // Phase 3: re-index storage in topological order
        let mut rank = vec![0usize; self.nodes.len()];
        for (new_idx, &old_idx) in order.iter().enumerate() {
            rank[old_idx] = new_idx;
        }
        let remap = |set: &BTreeSet<usize>| -> Vec<usize> {
            let mut out: Vec<usize> = set.iter().map(|&old| rank[old]).collect();
            out.sort_unstable();
            out
        };

        let sorted_dependencies = order.iter().map(|&old| remap(&dependencies[old])).collect();
        let sorted_dependents = order.iter().map(|&old| remap(&dependents[old])).collect();

        let mut slots: Vec<Option<Node>> = self.nodes.into_iter().map(Some).collect();
        let nodes: Vec<Node> = order
            .iter()
            .filter_map(|&old_idx| slots[old_idx].take())
            .collect();

        Ok(DependencyGraph::from_sorted(
            nodes,
            sorted_dependencies,
            sorted_dependents,
        ))
    }
}

/// Ready-queue entry; the heap pops the earliest start time, then the lowest id
#[derive(Debug)]
struct ReadyNode {
    start_time: f64,
    id: NodeId,
    idx: usize,
}

impl ReadyNode {
    fn new(node: &Node, idx: usize) -> Self {
        Self {
            start_time: node.start_time(),
            id: node.id(),
            idx,
        }
    }
}

impl PartialEq for ReadyNode {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for ReadyNode {}

impl PartialOrd for ReadyNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ReadyNode {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed: BinaryHeap is a max-heap
        other
            .start_time
            .total_cmp(&self.start_time)
            .then_with(|| other.id.cmp(&self.id))
    }
}

/// Immutable page-load dependency graph
///
/// # Node Representation
///
/// - Nodes are stored in topological order (the root is always index 0)
/// - `NodeId` → storage index lookups go through `index`
///
/// # Edge Representation
///
/// - `dependencies[i]`: nodes that must finish before node `i` starts
/// - `dependents[i]`: nodes waiting on node `i`
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    nodes: Vec<Node>,
    index: HashMap<NodeId, usize>,
    dependencies: Vec<Vec<usize>>,
    dependents: Vec<Vec<usize>>,
}

impl DependencyGraph {
    fn from_sorted(
        nodes: Vec<Node>,
        dependencies: Vec<Vec<usize>>,
        dependents: Vec<Vec<usize>>,
    ) -> Self {
        let index = nodes
            .iter()
            .enumerate()
            .map(|(idx, node)| (node.id(), idx))
            .collect();
        Self {
            nodes,
            index,
            dependencies,
            dependents,
        }
    }

    /// The node every other node transitively depends on
    pub fn root(&self) -> &Node {
        &self.nodes[0]
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.dependencies.iter().map(Vec::len).sum()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.index.contains_key(&id)
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.index.get(&id).map(|&idx| &self.nodes[idx])
    }

    /// Nodes in topological order
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter()
    }

    /// Visit every node exactly once, dependencies before dependents
    pub fn traverse<F>(&self, mut visit: F)
    where
        F: FnMut(&Node),
    {
        for node in &self.nodes {
            visit(node);
        }
    }

    /// Nodes that must finish before `id` can start
    pub fn dependencies(&self, id: NodeId) -> impl Iterator<Item = &Node> {
        self.neighbors(id, &self.dependencies)
    }

    /// Nodes waiting on `id`
    pub fn dependents(&self, id: NodeId) -> impl Iterator<Item = &Node> {
        self.neighbors(id, &self.dependents)
    }

    fn neighbors<'a>(
        &'a self,
        id: NodeId,
        adjacency: &'a [Vec<usize>],
    ) -> impl Iterator<Item = &'a Node> {
        self.index
            .get(&id)
            .map(|&idx| adjacency[idx].as_slice())
            .unwrap_or_default()
            .iter()
            .map(move |&idx| &self.nodes[idx])
    }

    /// Clone the graph keeping only nodes selected by `predicate`
    ///
    /// The root is always kept. When a node is kept, every node on a path
    /// between it and the root is kept too, so the result is a valid
    /// single-root DAG. `self` is not modified.
    pub fn clone_with_relationships<F>(&self, predicate: F) -> DependencyGraph
    where
        F: Fn(&Node) -> bool,
    {
        let mut keep = vec![false; self.nodes.len()];
        keep[0] = true;

        // Walk backwards so dependents mark their dependencies before those are visited
        for idx in (0..self.nodes.len()).rev() {
            if !keep[idx] && predicate(&self.nodes[idx]) {
                keep[idx] = true;
            }
            if keep[idx] {
                for &dependency in &self.dependencies[idx] {
                    keep[dependency] = true;
                }
            }
        }

        let mut rank = vec![usize::MAX; self.nodes.len()];
        let mut nodes = Vec::new();
        for (idx, node) in self.nodes.iter().enumerate() {
            if keep[idx] {
                rank[idx] = nodes.len();
                nodes.push(node.clone());
            }
        }

        let filter = |adjacency: &[usize]| -> Vec<usize> {
            adjacency
                .iter()
                .filter(|&&idx| keep[idx])
                .map(|&idx| rank[idx])
                .collect()
        };
        let dependencies = (0..self.nodes.len())
            .filter(|&idx| keep[idx])
            .map(|idx| filter(&self.dependencies[idx]))
            .collect();
        let dependents = (0..self.nodes.len())
            .filter(|&idx| keep[idx])
            .map(|idx| filter(&self.dependents[idx]))
            .collect();

        DependencyGraph::from_sorted(nodes, dependencies, dependents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{CpuNode, NetworkNode, ResourceType};

    fn network(id: u32, start: f64, end: f64) -> Node {
        NetworkNode::new(NodeId(id), format!("https://example.com/{id}"), ResourceType::Script)
            .with_timing(start, end)
            .into()
    }

    fn cpu(id: u32, start: f64, end: f64) -> Node {
        CpuNode::new(NodeId(id), start, end).into()
    }

    /// ```text
    /// 1 ─┬─ 2 ── 4
    ///    └─ 3 ─┘
    /// ```
    fn diamond() -> DependencyGraph {
        GraphBuilder::new()
            .node(network(1, 0.0, 10.0))
            .node(network(2, 10.0, 20.0))
            .node(network(3, 12.0, 30.0))
            .node(cpu(4, 30.0, 40.0))
            .edge(NodeId(1), NodeId(2))
            .edge(NodeId(1), NodeId(3))
            .edge(NodeId(2), NodeId(4))
            .edge(NodeId(3), NodeId(4))
            .build()
            .unwrap()
    }

    #[test]
    fn test_empty_graph_rejected() {
        assert_eq!(GraphBuilder::new().build().unwrap_err(), GraphError::Empty);
    }

    #[test]
    fn test_single_node() {
        let graph = GraphBuilder::new().node(network(1, 0.0, 1.0)).build().unwrap();
        assert_eq!(graph.node_count(), 1);
        assert_eq!(graph.edge_count(), 0);
        assert_eq!(graph.root().id(), NodeId(1));
    }

    #[test]
    fn test_duplicate_node_rejected() {
        let err = GraphBuilder::new()
            .node(network(1, 0.0, 1.0))
            .node(cpu(1, 1.0, 2.0))
            .build()
            .unwrap_err();
        assert_eq!(err, GraphError::DuplicateNode(NodeId(1)));
    }

    #[test]
    fn test_unknown_edge_rejected() {
        let err = GraphBuilder::new()
            .node(network(1, 0.0, 1.0))
            .edge(NodeId(1), NodeId(9))
            .build()
            .unwrap_err();
        assert_eq!(err, GraphError::UnknownNode(NodeId(9)));
    }

    #[test]
    fn test_multiple_roots_rejected() {
        let err = GraphBuilder::new()
            .node(network(1, 0.0, 1.0))
            .node(network(2, 0.0, 1.0))
            .build()
            .unwrap_err();
        assert_eq!(err, GraphError::RootCount(vec![NodeId(1), NodeId(2)]));
    }

    #[test]
    fn test_cycle_rejected() {
        let err = GraphBuilder::new()
            .node(network(1, 0.0, 1.0))
            .node(network(2, 1.0, 2.0))
            .node(network(3, 2.0, 3.0))
            .edge(NodeId(1), NodeId(2))
            .edge(NodeId(2), NodeId(3))
            .edge(NodeId(3), NodeId(2))
            .build()
            .unwrap_err();
        assert!(matches!(err, GraphError::Cycle(_)));
    }

    #[test]
    fn test_topological_order_prefers_earlier_start() {
        let graph = diamond();
        let order: Vec<NodeId> = graph.nodes().map(Node::id).collect();
        assert_eq!(order, vec![NodeId(1), NodeId(2), NodeId(3), NodeId(4)]);
    }

    #[test]
    fn test_traverse_visits_each_node_once() {
        let graph = diamond();
        let mut seen = Vec::new();
        graph.traverse(|node| seen.push(node.id()));

        seen.sort();
        seen.dedup();
        assert_eq!(seen.len(), graph.node_count());
    }

    #[test]
    fn test_duplicate_edges_collapse() {
        let graph = GraphBuilder::new()
            .node(network(1, 0.0, 1.0))
            .node(network(2, 1.0, 2.0))
            .edge(NodeId(1), NodeId(2))
            .edge(NodeId(1), NodeId(2))
            .build()
            .unwrap();
        assert_eq!(graph.edge_count(), 1);
    }

    #[test]
    fn test_dependencies_and_dependents() {
        let graph = diamond();

        let deps: Vec<NodeId> = graph.dependencies(NodeId(4)).map(Node::id).collect();
        assert_eq!(deps, vec![NodeId(2), NodeId(3)]);

        let dependents: Vec<NodeId> = graph.dependents(NodeId(1)).map(Node::id).collect();
        assert_eq!(dependents, vec![NodeId(2), NodeId(3)]);

        assert_eq!(graph.dependencies(NodeId(42)).count(), 0);
    }

    #[test]
    fn test_clone_keeps_paths_to_root() {
        let graph = diamond();
        let variant = graph.clone_with_relationships(|node| node.id() == NodeId(4));

        // Node 4 pulls in both branches back to the root
        assert_eq!(variant.node_count(), 4);
        assert_eq!(variant.edge_count(), 4);
    }

    #[test]
    fn test_clone_drops_unselected_branches() {
        let graph = diamond();
        let variant = graph.clone_with_relationships(|node| node.id() == NodeId(3));

        assert_eq!(variant.node_count(), 2);
        assert!(variant.contains(NodeId(1)));
        assert!(variant.contains(NodeId(3)));
        assert!(!variant.contains(NodeId(2)));
        assert!(!variant.contains(NodeId(4)));
        assert_eq!(variant.edge_count(), 1);

        // Original untouched
        assert_eq!(graph.node_count(), 4);
    }

    #[test]
    fn test_clone_always_keeps_root() {
        let graph = diamond();
        let variant = graph.clone_with_relationships(|_| false);
        assert_eq!(variant.node_count(), 1);
        assert_eq!(variant.root().id(), NodeId(1));
    }
}
