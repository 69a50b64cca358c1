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


//! The physical network: nodes and links with finite, consumable resources.

use petgraph::prelude::*;
use std::collections::BTreeMap;

use crate::error::Error;
use crate::mapping::ResourceUsage;
use crate::specs::{check_amount, LinkSpec, NodeSpec, ResourceGraph, DEFAULT_RESOURCE, TOLERANCE};

mod residual;
pub(crate) mod topologies;

pub use residual::Residual;
pub use topologies::{fully_connected, line, mesh, random, star};

/// A substrate network. Links are undirected and shared by both directions of
/// traffic.
pub type SubstrateNetwork = ResourceGraph<SubstrateNode, SubstrateLink, Undirected>;

/// Total and still unallocated amount of one resource.
///
/// Invariant: `0 <= remaining <= capacity`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Capacity {
    capacity: f64,
    remaining: f64,
}

impl Capacity {
    /// Panics on a negative or non finite amount; see `try_new`.
    pub fn new(capacity: f64) -> Self {
        match Self::try_new(capacity) {
            Ok(capacity) => capacity,
            Err(err) => panic!("{}", err),
        }
    }

    pub fn try_new(capacity: f64) -> Result<Self, Error> {
        let capacity = check_amount("capacity", capacity)?;
        Ok(Self {
            capacity,
            remaining: capacity,
        })
    }

    pub fn capacity(&self) -> f64 {
        self.capacity
    }

    pub fn remaining(&self) -> f64 {
        self.remaining
    }

    pub fn used(&self) -> f64 {
        self.capacity - self.remaining
    }

    /// Fraction of the capacity that is in use, 0 for empty resources.
    pub fn utilization(&self) -> f64 {
        if self.capacity <= TOLERANCE {
            0.0
        } else {
            self.used() / self.capacity
        }
    }

    pub fn fits(&self, amount: f64) -> bool {
        amount <= self.remaining + TOLERANCE
    }

    fn consume(&mut self, amount: f64) {
        self.remaining = (self.remaining - amount).max(0.0);
    }

    fn give_back(&mut self, amount: f64) {
        self.remaining = (self.remaining + amount).min(self.capacity);
    }

    pub(crate) fn set_remaining(&mut self, remaining: f64) {
        self.remaining = remaining.max(0.0).min(self.capacity);
    }
}

#[derive(Clone, Debug)]
pub struct SubstrateNode {
    name: String,
    resources: BTreeMap<String, Capacity>,
}

impl SubstrateNode {
    /// A node offering `cpu` units of the default resource.
    pub fn new(name: &str, cpu: f64) -> Self {
        Self::with_resources(name, &[(DEFAULT_RESOURCE, cpu)])
    }

    pub fn with_resources(name: &str, resources: &[(&str, f64)]) -> Self {
        Self {
            name: name.to_string(),
            resources: resources
                .iter()
                .map(|(kind, amount)| (kind.to_string(), Capacity::new(*amount)))
                .collect(),
        }
    }

    pub fn try_with_resources(name: &str, resources: &[(&str, f64)]) -> Result<Self, Error> {
        Ok(Self {
            name: name.to_string(),
            resources: resources
                .iter()
                .map(|(kind, amount)| Capacity::try_new(*amount).map(|capacity| (kind.to_string(), capacity)))
                .collect::<Result<_, Error>>()?,
        })
    }

    pub fn resource(&self, kind: &str) -> Option<&Capacity> {
        self.resources.get(kind)
    }

    pub fn resources(&self) -> impl Iterator<Item = (&String, &Capacity)> {
        self.resources.iter()
    }

    /// Remaining amount of `kind`; nodes without that resource offer none.
    pub fn remaining(&self, kind: &str) -> f64 {
        self.resources.get(kind).map_or(0.0, |c| c.remaining())
    }

    /// Mean utilization over all the node's resources.
    pub fn stress(&self) -> f64 {
        if self.resources.is_empty() {
            return 0.0;
        }
        self.resources.values().map(|c| c.utilization()).sum::<f64>() / self.resources.len() as f64
    }
}

impl NodeSpec for SubstrateNode {
    fn name(&self) -> &str {
        &self.name
    }

    fn resource_amounts(&self) -> BTreeMap<String, f64> {
        self.resources
            .iter()
            .map(|(kind, capacity)| (kind.clone(), capacity.remaining()))
            .collect()
    }
}

#[derive(Clone, Debug)]
pub struct SubstrateLink {
    bandwidth: Capacity,
}

impl SubstrateLink {
    pub fn new(bandwidth: f64) -> Self {
        Self {
            bandwidth: Capacity::new(bandwidth),
        }
    }

    pub fn try_new(bandwidth: f64) -> Result<Self, Error> {
        Ok(Self {
            bandwidth: Capacity::try_new(bandwidth)?,
        })
    }

    pub fn capacity(&self) -> &Capacity {
        &self.bandwidth
    }

    pub fn remaining(&self) -> f64 {
        self.bandwidth.remaining()
    }
}

impl LinkSpec for SubstrateLink {
    fn bandwidth(&self) -> f64 {
        self.bandwidth.remaining()
    }
}

impl ResourceGraph<SubstrateNode, SubstrateLink, Undirected> {
    /// Snapshot of all remaining amounts.
    pub fn residual(&self) -> Residual {
        Residual::of(self)
    }

    /// Bandwidth still available on a link.
    pub fn remaining_bandwidth(&self, link: EdgeIndex) -> f64 {
        self.get_link(link).remaining()
    }

    /// Sum of the remaining bandwidth of all links incident to `node`.
    pub fn incident_bandwidth(&self, node: NodeIndex) -> f64 {
        self.incident_links(node)
            .iter()
            .map(|link| self.remaining_bandwidth(*link))
            .sum()
    }

    /// Checks that `usage` fits entirely in the remaining capacities, reporting
    /// the first node or link that would be overdrawn.
    pub fn check_usage(&self, usage: &ResourceUsage) -> Result<(), Error> {
        self.residual().check_usage(usage).map_err(Error::CapacityExceeded)
    }

    /// Subtracts `usage` from the remaining capacities. Nothing is modified
    /// unless all of it fits.
    pub(crate) fn apply_usage(&mut self, usage: &ResourceUsage) -> Result<(), Error> {
        self.check_usage(usage)?;
        for (node, demands) in usage.nodes() {
            let spec = self.get_node_mut(*node);
            for (kind, amount) in demands {
                if let Some(capacity) = spec.resources.get_mut(kind) {
                    capacity.consume(*amount);
                }
            }
        }
        for (link, amount) in usage.links() {
            self.get_link_mut(*link).bandwidth.consume(*amount);
        }
        Ok(())
    }

    /// Returns previously applied `usage` to the substrate.
    pub(crate) fn return_usage(&mut self, usage: &ResourceUsage) {
        for (node, demands) in usage.nodes() {
            let spec = self.get_node_mut(*node);
            for (kind, amount) in demands {
                if let Some(capacity) = spec.resources.get_mut(kind) {
                    capacity.give_back(*amount);
                }
            }
        }
        for (link, amount) in usage.links() {
            self.get_link_mut(*link).bandwidth.give_back(*amount);
        }
    }

    /// Overwrites every remaining amount with the values held by `residual`.
    pub(crate) fn restore(&mut self, residual: &Residual) {
        for node in self.iter_nodes().collect::<Vec<_>>() {
            let spec = self.get_node_mut(node);
            for (kind, capacity) in spec.resources.iter_mut() {
                capacity.set_remaining(residual.node_remaining(node, kind));
            }
        }
        for link in self.iter_links().collect::<Vec<_>>() {
            let remaining = residual.link_remaining(link);
            self.get_link_mut(link).bandwidth.set_remaining(remaining);
        }
    }
}
