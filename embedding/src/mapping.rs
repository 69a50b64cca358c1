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


//! The result of embedding one request: where each virtual node lives and how
//! each virtual link is routed.

use petgraph::prelude::*;
use std::collections::BTreeMap;

use crate::path::Path;
use crate::request::VirtualNetwork;
use crate::specs::{LinkSpec, NodeSpec};

/// Split fractions of a route must add up to 1 within this tolerance.
pub const FRACTION_TOLERANCE: f64 = 1e-6;

/// A share of a virtual link's bandwidth carried by one substrate path.
#[derive(Clone, Debug, PartialEq)]
pub struct PathFlow {
    pub path: Path,
    pub fraction: f64,
}

/// How one virtual link is carried: one path with the full bandwidth, or
/// several paths sharing it.
#[derive(Clone, Debug, PartialEq)]
pub struct LinkRoute {
    flows: Vec<PathFlow>,
}

impl LinkRoute {
    /// An unsplit route.
    pub fn single(path: Path) -> Self {
        Self {
            flows: vec![PathFlow {
                path,
                fraction: 1.0,
            }],
        }
    }

    pub fn split(flows: Vec<PathFlow>) -> Self {
        Self { flows }
    }

    pub fn flows(&self) -> &[PathFlow] {
        &self.flows
    }

    pub fn is_split(&self) -> bool {
        self.flows.len() > 1
    }

    pub fn fraction_sum(&self) -> f64 {
        self.flows.iter().map(|flow| flow.fraction).sum()
    }

    /// Bandwidth placed on each substrate link when carrying `bandwidth`.
    /// Paths of the same route sharing a link add up.
    pub fn link_loads(&self, bandwidth: f64) -> BTreeMap<EdgeIndex, f64> {
        let mut loads = BTreeMap::new();
        for flow in self.flows.iter() {
            for link in flow.path.links() {
                *loads.entry(*link).or_insert(0.0) += bandwidth * flow.fraction;
            }
        }
        loads
    }

    /// Expected hop count, weighting every path by its fraction.
    pub fn weighted_hops(&self) -> f64 {
        self.flows
            .iter()
            .map(|flow| flow.fraction * flow.path.hops() as f64)
            .sum()
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Mapping {
    nodes: BTreeMap<NodeIndex, NodeIndex>,
    links: BTreeMap<EdgeIndex, LinkRoute>,
}

impl Mapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hosts virtual node `virtual_node` on `substrate_node`.
    pub fn place(&mut self, virtual_node: NodeIndex, substrate_node: NodeIndex) {
        self.nodes.insert(virtual_node, substrate_node);
    }

    pub fn unplace(&mut self, virtual_node: NodeIndex) {
        self.nodes.remove(&virtual_node);
    }

    pub fn route(&mut self, virtual_link: EdgeIndex, route: LinkRoute) {
        self.links.insert(virtual_link, route);
    }

    pub fn unroute(&mut self, virtual_link: EdgeIndex) {
        self.links.remove(&virtual_link);
    }

    pub fn host(&self, virtual_node: NodeIndex) -> Option<NodeIndex> {
        self.nodes.get(&virtual_node).copied()
    }

    pub fn route_of(&self, virtual_link: EdgeIndex) -> Option<&LinkRoute> {
        self.links.get(&virtual_link)
    }

    pub fn nodes(&self) -> impl Iterator<Item = (&NodeIndex, &NodeIndex)> {
        self.nodes.iter()
    }

    pub fn links(&self) -> impl Iterator<Item = (&EdgeIndex, &LinkRoute)> {
        self.links.iter()
    }

    pub fn is_hosting(&self, substrate_node: NodeIndex) -> bool {
        self.nodes.values().any(|host| *host == substrate_node)
    }

    /// Bandwidth times hops, summed over all virtual links.
    pub fn link_cost(&self, request: &VirtualNetwork) -> f64 {
        self.links
            .iter()
            .map(|(link, route)| request.get_link(*link).bandwidth() * route.weighted_hops())
            .sum()
    }

    /// Node demand plus bandwidth times hops; the objective minimised by the
    /// optimising algorithms.
    pub fn cost(&self, request: &VirtualNetwork) -> f64 {
        let node_cost: f64 = self
            .nodes
            .keys()
            .map(|node| request.get_node(*node).total())
            .sum();
        node_cost + self.link_cost(request)
    }

    /// Aggregated demand this mapping places on the substrate. No feasibility
    /// checks are made here.
    pub fn usage(&self, request: &VirtualNetwork) -> ResourceUsage {
        let mut usage = ResourceUsage::default();
        for (virtual_node, host) in self.nodes.iter() {
            for (kind, amount) in request.get_node(*virtual_node).demand() {
                usage.add_node(*host, kind, *amount);
            }
        }
        for (virtual_link, route) in self.links.iter() {
            let bandwidth = request.get_link(*virtual_link).bandwidth();
            for (link, load) in route.link_loads(bandwidth) {
                usage.add_link(link, load);
            }
        }
        usage
    }
}

/// Amounts consumed on substrate nodes (per resource type) and links.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ResourceUsage {
    nodes: BTreeMap<NodeIndex, BTreeMap<String, f64>>,
    links: BTreeMap<EdgeIndex, f64>,
}

impl ResourceUsage {
    pub fn add_node(&mut self, node: NodeIndex, kind: &str, amount: f64) {
        *self
            .nodes
            .entry(node)
            .or_insert_with(BTreeMap::new)
            .entry(kind.to_string())
            .or_insert(0.0) += amount;
    }

    pub fn add_link(&mut self, link: EdgeIndex, amount: f64) {
        *self.links.entry(link).or_insert(0.0) += amount;
    }

    pub fn merge(&mut self, other: &ResourceUsage) {
        for (node, demands) in other.nodes.iter() {
            for (kind, amount) in demands {
                self.add_node(*node, kind, *amount);
            }
        }
        for (link, amount) in other.links.iter() {
            self.add_link(*link, *amount);
        }
    }

    pub fn nodes(&self) -> impl Iterator<Item = (&NodeIndex, &BTreeMap<String, f64>)> {
        self.nodes.iter()
    }

    pub fn links(&self) -> impl Iterator<Item = (&EdgeIndex, &f64)> {
        self.links.iter()
    }

    pub fn node_amount(&self, node: NodeIndex, kind: &str) -> f64 {
        self.nodes
            .get(&node)
            .and_then(|demands| demands.get(kind))
            .copied()
            .unwrap_or(0.0)
    }

    pub fn link_amount(&self, link: EdgeIndex) -> f64 {
        self.links.get(&link).copied().unwrap_or(0.0)
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.links.is_empty()
    }
}
