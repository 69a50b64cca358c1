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


use petgraph::prelude::*;
use std::collections::BTreeMap;

use super::SubstrateNetwork;
use crate::mapping::ResourceUsage;
use crate::path::Path;
use crate::specs::TOLERANCE;
use crate::validator::Violation;

/// A detached copy of the remaining amounts of a substrate.
///
/// Searches reserve and release against a `Residual` while exploring partial
/// embeddings; the substrate itself is only modified by a committed mapping.
#[derive(Clone, Debug, PartialEq)]
pub struct Residual {
    nodes: Vec<BTreeMap<String, f64>>,
    links: Vec<f64>,
}

impl Residual {
    pub fn of(substrate: &SubstrateNetwork) -> Self {
        Self {
            nodes: substrate
                .iter_nodes()
                .map(|node| {
                    substrate
                        .get_node(node)
                        .resources()
                        .map(|(kind, capacity)| (kind.clone(), capacity.remaining()))
                        .collect()
                })
                .collect(),
            links: substrate
                .iter_links()
                .map(|link| substrate.get_link(link).remaining())
                .collect(),
        }
    }

    pub fn node_remaining(&self, node: NodeIndex, kind: &str) -> f64 {
        self.nodes
            .get(node.index())
            .and_then(|resources| resources.get(kind))
            .copied()
            .unwrap_or(0.0)
    }

    pub fn link_remaining(&self, link: EdgeIndex) -> f64 {
        self.links.get(link.index()).copied().unwrap_or(0.0)
    }

    /// Every requested resource type is offered with at least the demanded amount.
    pub fn node_fits(&self, node: NodeIndex, demand: &BTreeMap<String, f64>) -> bool {
        self.first_node_shortage(node, demand).is_none()
    }

    fn first_node_shortage<'a>(
        &self,
        node: NodeIndex,
        demand: &'a BTreeMap<String, f64>,
    ) -> Option<(&'a String, f64, f64)> {
        demand
            .iter()
            .filter(|(_, amount)| **amount > 0.0)
            .map(|(kind, amount)| (kind, *amount, self.node_remaining(node, kind)))
            .find(|(_, amount, remaining)| *amount > remaining + TOLERANCE)
    }

    pub fn link_fits(&self, link: EdgeIndex, bandwidth: f64) -> bool {
        bandwidth <= self.link_remaining(link) + TOLERANCE
    }

    pub fn path_fits(&self, path: &Path, bandwidth: f64) -> bool {
        path.links().iter().all(|link| self.link_fits(*link, bandwidth))
    }

    /// The smallest remaining bandwidth along the path.
    pub fn bottleneck(&self, path: &Path) -> f64 {
        path.links()
            .iter()
            .map(|link| self.link_remaining(*link))
            .fold(f64::INFINITY, f64::min)
    }

    /// The remaining amount of `kind` over all nodes, used to rank hosts.
    pub fn total_remaining(&self, kind: &str) -> f64 {
        self.nodes
            .iter()
            .filter_map(|resources| resources.get(kind))
            .sum()
    }

    /// The remaining amount over all resource types of one node.
    pub fn node_total(&self, node: NodeIndex) -> f64 {
        self.nodes
            .get(node.index())
            .map_or(0.0, |resources| resources.values().sum())
    }

    pub fn reserve_node(&mut self, node: NodeIndex, demand: &BTreeMap<String, f64>) {
        if let Some(resources) = self.nodes.get_mut(node.index()) {
            for (kind, amount) in demand {
                if let Some(remaining) = resources.get_mut(kind) {
                    *remaining -= amount;
                }
            }
        }
    }

    pub fn release_node(&mut self, node: NodeIndex, demand: &BTreeMap<String, f64>) {
        if let Some(resources) = self.nodes.get_mut(node.index()) {
            for (kind, amount) in demand {
                if let Some(remaining) = resources.get_mut(kind) {
                    *remaining += amount;
                }
            }
        }
    }

    pub fn reserve_link(&mut self, link: EdgeIndex, bandwidth: f64) {
        if let Some(remaining) = self.links.get_mut(link.index()) {
            *remaining -= bandwidth;
        }
    }

    pub fn release_link(&mut self, link: EdgeIndex, bandwidth: f64) {
        if let Some(remaining) = self.links.get_mut(link.index()) {
            *remaining += bandwidth;
        }
    }

    pub fn reserve_path(&mut self, path: &Path, bandwidth: f64) {
        for link in path.links() {
            self.reserve_link(*link, bandwidth);
        }
    }

    pub fn release_path(&mut self, path: &Path, bandwidth: f64) {
        for link in path.links() {
            self.release_link(*link, bandwidth);
        }
    }

    /// Checks the aggregated usage against the remaining amounts and reports the
    /// first node (in index order), then the first link, that would be overdrawn.
    pub fn check_usage(&self, usage: &ResourceUsage) -> Result<(), Violation> {
        for (node, demands) in usage.nodes() {
            if let Some((kind, demand, remaining)) = self.first_node_shortage(*node, demands) {
                return Err(Violation::Node {
                    node: *node,
                    resource: kind.clone(),
                    demand,
                    remaining,
                });
            }
        }
        for (link, bandwidth) in usage.links() {
            if !self.link_fits(*link, *bandwidth) {
                return Err(Violation::Link {
                    link: *link,
                    demand: *bandwidth,
                    remaining: self.link_remaining(*link),
                });
            }
        }
        Ok(())
    }
}
