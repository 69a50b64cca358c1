// Copyright 2023 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.


//! Graph container shared by substrate networks and virtual network requests.

use itertools::structs::Unique;
use itertools::Itertools;
use petgraph::graph;
use petgraph::graph::{Edges, Neighbors};
use petgraph::prelude::*;
use petgraph::EdgeType;
use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicUsize, Ordering};

use super::*;

/// Each graph has a unique ID. This helps distinguish multiple requests and
/// substrates in logs and reports.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GraphId {
    value: usize,
}

impl Display for GraphId {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), std::fmt::Error> {
        write!(f, "{}", self.value)
    }
}

fn next_graph_id() -> GraphId {
    static COUNTER: AtomicUsize = AtomicUsize::new(0);
    let next_value = COUNTER.fetch_add(1, Ordering::Relaxed);
    GraphId { value: next_value }
}

#[derive(Clone, Debug)]
pub struct ResourceGraph<Node, Link, Ty = Directed>
where
    Node: NodeSpec,
    Link: LinkSpec,
    Ty: EdgeType,
{
    pub(crate) topo: Graph<Node, Link, Ty>,
    id: GraphId,
}

impl<NS, LS, Ty> ResourceGraph<NS, LS, Ty>
where
    NS: NodeSpec + std::fmt::Debug,
    LS: LinkSpec + std::fmt::Debug,
    Ty: EdgeType,
{
    pub fn new() -> Self {
        Self {
            topo: Graph::default(),
            id: next_graph_id(),
        }
    }

    pub fn id(&self) -> GraphId {
        self.id.clone()
    }

    pub fn is_directed(&self) -> bool {
        Ty::is_directed()
    }

    pub fn add_node(&mut self, node: NS) -> NodeIndex {
        self.topo.add_node(node)
    }

    /// Connects `src` and `dst`. Multiple links between the same pair of
    /// nodes are allowed; self loops are not.
    pub fn link(&mut self, src: NodeIndex, dst: NodeIndex, link: LS) -> EdgeIndex {
        assert_ne!(src, dst, "Self loops are not supported");
        assert!(src.index() < self.topo.node_count() && dst.index() < self.topo.node_count());
        self.topo.add_edge(src, dst, link)
    }

    pub fn is_empty(&self) -> bool {
        self.topo.node_count() == 0
    }

    pub fn node_count(&self) -> usize {
        self.topo.node_count()
    }

    pub fn link_count(&self) -> usize {
        self.topo.edge_count()
    }

    /// return a reference to the node.
    pub fn get_node(&self, node_id: NodeIndex) -> &NS {
        if let Some(node) = self.topo.node_weight(node_id) {
            node
        } else {
            panic!("missing node {}", node_id.index());
        }
    }

    pub(crate) fn get_node_mut(&mut self, node_id: NodeIndex) -> &mut NS {
        if let Some(node) = self.topo.node_weight_mut(node_id) {
            node
        } else {
            panic!("missing node {}", node_id.index());
        }
    }

    pub fn contains_node(&self, node_id: NodeIndex) -> bool {
        node_id.index() < self.topo.node_count()
    }

    pub fn contains_link(&self, link_id: EdgeIndex) -> bool {
        link_id.index() < self.topo.edge_count()
    }

    /// Returns the first node index matching name.
    pub fn get_node_index_by_name(&self, name: &str) -> Option<NodeIndex> {
        self.topo
            .node_indices()
            .find(|n| self.get_node(*n).name() == name)
    }

    /// returns an iterator over all nodes in the topology (their indices)
    pub fn iter_nodes(&self) -> graph::NodeIndices {
        self.topo.node_indices()
    }

    /// returns an iterator over all links in the topology (their indices)
    pub fn iter_links(&self) -> graph::EdgeIndices {
        self.topo.edge_indices()
    }

    /// return a reference to the link.
    pub fn get_link(&self, link_id: EdgeIndex) -> &LS {
        if let Some(link) = self.topo.edge_weight(link_id) {
            link
        } else {
            panic!("missing link {}", link_id.index());
        }
    }

    pub(crate) fn get_link_mut(&mut self, link_id: EdgeIndex) -> &mut LS {
        if let Some(link) = self.topo.edge_weight_mut(link_id) {
            link
        } else {
            panic!("missing link {}", link_id.index());
        }
    }

    pub fn get_link_endpoints(&self, link: EdgeIndex) -> (NodeIndex, NodeIndex) {
        if let Some((src, dst)) = self.topo.edge_endpoints(link) {
            (src, dst)
        } else {
            panic!("missing destination node for edge {}", link.index());
        }
    }

    /// Given one endpoint of `link`, returns the other one.
    pub fn opposite(&self, link: EdgeIndex, node: NodeIndex) -> NodeIndex {
        let (src, dst) = self.get_link_endpoints(link);
        if src == node {
            dst
        } else {
            src
        }
    }

    /// return an iterator over the node's input links
    pub fn get_input_links(&self, node_id: NodeIndex) -> Edges<LS, Ty> {
        self.topo.edges_directed(node_id, Direction::Incoming)
    }

    /// return an iterator over the node's output links
    ///
    /// For undirected graphs these are all the links incident to the node.
    pub fn get_output_links(&self, node_id: NodeIndex) -> Edges<LS, Ty> {
        self.topo.edges_directed(node_id, Direction::Outgoing)
    }

    /// All links touching the node, regardless of direction, each reported once.
    pub fn incident_links(&self, node_id: NodeIndex) -> Vec<EdgeIndex> {
        let mut links = self
            .topo
            .edges_directed(node_id, Direction::Outgoing)
            .map(|edge_ref| edge_ref.id())
            .collect::<Vec<_>>();
        if Ty::is_directed() {
            links.extend(
                self.topo
                    .edges_directed(node_id, Direction::Incoming)
                    .map(|edge_ref| edge_ref.id()),
            );
        }
        links.sort();
        links.dedup();
        links
    }

    /// Links connecting `a` and `b` in either direction.
    pub fn links_between(&self, a: NodeIndex, b: NodeIndex) -> Vec<EdgeIndex> {
        let mut links = self
            .topo
            .edges_connecting(a, b)
            .map(|edge_ref| edge_ref.id())
            .collect::<Vec<_>>();
        if Ty::is_directed() {
            links.extend(self.topo.edges_connecting(b, a).map(|edge_ref| edge_ref.id()));
        }
        links.sort();
        links.dedup();
        links
    }

    /// return an iterator over the set of neighbors
    ///
    /// note that petgraph returns the a node as a neighbor multiple times,
    /// once for every edge connecting the two nodes; therefore, we filter
    /// them using itertools::Itertools::unique().
    pub fn neighbors(&self, node_id: NodeIndex) -> Unique<Neighbors<'_, LS>> {
        self.topo.neighbors_undirected(node_id).unique()
    }

    pub fn degree(&self, node_id: NodeIndex) -> usize {
        self.incident_links(node_id).len()
    }

    pub fn to_graphviz(&self) -> String {
        use petgraph::dot::{Config, Dot};

        let generator = Dot::with_attr_getters(
            &self.topo,
            &[Config::NodeNoLabel, Config::EdgeNoLabel],
            &|_, edge| {
                format!(
                    "label=\"Link {}\nbw = {}\"",
                    edge.id().index(),
                    edge.weight().bandwidth(),
                )
            },
            &|_, node| {
                format!(
                    "label=\"{}\n(id: {})\n{:?}\"",
                    node.1.name(),
                    node.0.index(),
                    node.1.resource_amounts()
                )
            },
        );
        format!("{:?}", generator)
    }
}

impl<NS, LS, Ty> Default for ResourceGraph<NS, LS, Ty>
where
    NS: NodeSpec + std::fmt::Debug,
    LS: LinkSpec + std::fmt::Debug,
    Ty: EdgeType,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<NS, LS, Ty> std::fmt::Display for ResourceGraph<NS, LS, Ty>
where
    NS: NodeSpec + std::fmt::Debug,
    LS: LinkSpec + std::fmt::Debug,
    Ty: EdgeType,
{
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.to_graphviz())
    }
}
