//! Solution graph implementation using petgraph
//!
//! Nodes are the root project and every selected project; an edge runs from
//! a depender to each project it requires, labelled with the constraint it
//! declared. Project-level cycles are legal and are reported, not rejected.

use std::collections::{BTreeSet, HashMap};

use petgraph::algo::{kosaraju_scc, toposort};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::Bfs;
use petgraph::Direction;

use tether_core::types::{Constraint, ProjectRoot, Version};

/// Node in the solution graph
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectNode {
    pub root: ProjectRoot,
    /// `None` for the project being solved
    pub version: Option<Version>,
}

/// Dependency graph of a solution
#[derive(Debug, Clone)]
pub struct SolutionGraph {
    /// Underlying directed graph
    graph: DiGraph<ProjectNode, Constraint>,
    /// Map from project root to NodeIndex for fast lookups
    node_map: HashMap<ProjectRoot, NodeIndex>,
    root: NodeIndex,
}

impl SolutionGraph {
    /// Create a graph holding only the project being solved
    pub fn new(root: ProjectRoot) -> Self {
        let mut graph = DiGraph::new();
        let index = graph.add_node(ProjectNode {
            root: root.clone(),
            version: None,
        });
        let mut node_map = HashMap::new();
        node_map.insert(root, index);
        Self {
            graph,
            node_map,
            root: index,
        }
    }

    /// Add a selected project; adding the same root again returns the
    /// existing node
    pub fn add_project(&mut self, root: ProjectRoot, version: Version) -> NodeIndex {
        if let Some(existing) = self.node_map.get(&root) {
            return *existing;
        }
        let index = self.graph.add_node(ProjectNode {
            root: root.clone(),
            version: Some(version),
        });
        self.node_map.insert(root, index);
        index
    }

    /// Add dependency edge between two projects
    pub fn add_dependency(
        &mut self,
        from: &ProjectRoot,
        to: &ProjectRoot,
        constraint: Constraint,
    ) -> Result<(), String> {
        let from_index = *self
            .node_map
            .get(from)
            .ok_or_else(|| format!("Project not found: {}", from))?;
        let to_index = *self
            .node_map
            .get(to)
            .ok_or_else(|| format!("Project not found: {}", to))?;

        let duplicate = self
            .graph
            .edges_connecting(from_index, to_index)
            .any(|e| *e.weight() == constraint);
        if !duplicate {
            self.graph.add_edge(from_index, to_index, constraint);
        }
        Ok(())
    }

    pub fn get_project(&self, root: &ProjectRoot) -> Option<&ProjectNode> {
        let index = self.node_map.get(root)?;
        self.graph.node_weight(*index)
    }

    /// Selected projects, excluding the project being solved
    pub fn projects(&self) -> impl Iterator<Item = &ProjectNode> {
        let root = self.root;
        self.graph
            .node_indices()
            .filter(move |i| *i != root)
            .filter_map(move |i| self.graph.node_weight(i))
    }

    /// Projects that declared a dependency on `root`, sorted
    pub fn dependers_of(&self, root: &ProjectRoot) -> Vec<ProjectRoot> {
        self.neighbors(root, Direction::Incoming)
    }

    /// Projects `root` depends on, sorted
    pub fn dependencies_of(&self, root: &ProjectRoot) -> Vec<ProjectRoot> {
        self.neighbors(root, Direction::Outgoing)
    }

    fn neighbors(&self, root: &ProjectRoot, direction: Direction) -> Vec<ProjectRoot> {
        let Some(index) = self.node_map.get(root) else {
            return Vec::new();
        };
        let set: BTreeSet<ProjectRoot> = self
            .graph
            .neighbors_directed(*index, direction)
            .filter_map(|i| self.graph.node_weight(i))
            .map(|n| n.root.clone())
            .collect();
        set.into_iter().collect()
    }

    /// Projects reachable from the project being solved
    pub fn reachable_from_root(&self) -> BTreeSet<ProjectRoot> {
        let mut reachable = BTreeSet::new();
        let mut bfs = Bfs::new(&self.graph, self.root);
        while let Some(index) = bfs.next(&self.graph) {
            if index != self.root {
                if let Some(node) = self.graph.node_weight(index) {
                    reachable.insert(node.root.clone());
                }
            }
        }
        reachable
    }

    /// Groups of projects that depend on each other in a cycle
    pub fn cycles(&self) -> Vec<Vec<ProjectRoot>> {
        let mut cycles: Vec<Vec<ProjectRoot>> = kosaraju_scc(&self.graph)
            .into_iter()
            .filter(|component| {
                component.len() > 1
                    || component
                        .first()
                        .map_or(false, |i| self.graph.contains_edge(*i, *i))
            })
            .map(|component| {
                let mut roots: Vec<ProjectRoot> = component
                    .into_iter()
                    .filter_map(|i| self.graph.node_weight(i))
                    .map(|n| n.root.clone())
                    .collect();
                roots.sort();
                roots
            })
            .collect();
        cycles.sort();
        cycles
    }

    /// Projects ordered so that dependencies come before their dependers,
    /// or `None` when the graph has a cycle
    pub fn dependency_order(&self) -> Option<Vec<ProjectRoot>> {
        let sorted = toposort(&self.graph, None).ok()?;
        Some(
            sorted
                .into_iter()
                .rev()
                .filter_map(|i| self.graph.node_weight(i))
                .map(|n| n.root.clone())
                .collect(),
        )
    }

    /// Get number of selected projects in the graph
    pub fn project_count(&self) -> usize {
        self.graph.node_count() - 1
    }

    /// Get number of dependencies in the graph
    pub fn dependency_count(&self) -> usize {
        self.graph.edge_count()
    }
}
