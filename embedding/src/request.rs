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


//! Virtual network requests: the graphs to be embedded.

use petgraph::prelude::*;
use std::collections::BTreeMap;

use crate::error::Error;
use crate::specs::{check_amount, LinkSpec, NodeSpec, ResourceGraph, DEFAULT_RESOURCE};

/// A virtual network request. Links are directed, from the sending to the
/// receiving virtual node.
pub type VirtualNetwork = ResourceGraph<VirtualNode, VirtualLink, Directed>;

#[derive(Clone, Debug)]
pub struct VirtualNode {
    name: String,
    demand: BTreeMap<String, f64>,
}

impl VirtualNode {
    /// A node demanding `cpu` units of the default resource.
    pub fn new(name: &str, cpu: f64) -> Self {
        Self::with_demand(name, &[(DEFAULT_RESOURCE, cpu)])
    }

    /// Panics on a negative or non finite demand; see `try_with_demand`.
    pub fn with_demand(name: &str, demand: &[(&str, f64)]) -> Self {
        match Self::try_with_demand(name, demand) {
            Ok(node) => node,
            Err(err) => panic!("{}", err),
        }
    }

    pub fn try_with_demand(name: &str, demand: &[(&str, f64)]) -> Result<Self, Error> {
        Ok(Self {
            name: name.to_string(),
            demand: demand
                .iter()
                .map(|(kind, amount)| check_amount("demand", *amount).map(|amount| (kind.to_string(), amount)))
                .collect::<Result<_, Error>>()?,
        })
    }

    pub fn demand(&self) -> &BTreeMap<String, f64> {
        &self.demand
    }

    /// Demand for one resource type, 0 when the node does not ask for it.
    pub fn demand_of(&self, kind: &str) -> f64 {
        self.demand.get(kind).copied().unwrap_or(0.0)
    }
}

impl NodeSpec for VirtualNode {
    fn name(&self) -> &str {
        &self.name
    }

    fn resource_amounts(&self) -> BTreeMap<String, f64> {
        self.demand.clone()
    }
}

#[derive(Clone, Copy, Debug)]
pub struct VirtualLink {
    bandwidth: f64,
}

impl VirtualLink {
    /// Panics on a negative or non finite demand; see `try_new`.
    pub fn new(bandwidth: f64) -> Self {
        match Self::try_new(bandwidth) {
            Ok(link) => link,
            Err(err) => panic!("{}", err),
        }
    }

    pub fn try_new(bandwidth: f64) -> Result<Self, Error> {
        Ok(Self {
            bandwidth: check_amount("bandwidth demand", bandwidth)?,
        })
    }
}

impl LinkSpec for VirtualLink {
    fn bandwidth(&self) -> f64 {
        self.bandwidth
    }
}

impl ResourceGraph<VirtualNode, VirtualLink, Directed> {
    /// Virtual nodes ordered by decreasing total demand; equal demands keep
    /// index order.
    pub fn nodes_by_demand(&self) -> Vec<NodeIndex> {
        let mut nodes = self.iter_nodes().collect::<Vec<_>>();
        nodes.sort_by(|a, b| {
            self.get_node(*b)
                .total()
                .partial_cmp(&self.get_node(*a).total())
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.cmp(b))
        });
        nodes
    }

    /// Total bandwidth demanded by all links.
    pub fn total_bandwidth(&self) -> f64 {
        self.iter_links()
            .map(|link| self.get_link(link).bandwidth())
            .sum()
    }
}
