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


//! Feasibility of a mapping against the substrate's remaining capacities.

use petgraph::prelude::*;
use std::collections::BTreeMap;
use std::fmt;

use crate::mapping::{Mapping, ResourceUsage, FRACTION_TOLERANCE};
use crate::path::Path;
use crate::request::VirtualNetwork;
use crate::substrate::{Residual, SubstrateNetwork};

/// The first reason a mapping cannot be committed.
#[derive(Clone, Debug, PartialEq)]
pub enum Violation {
    /// A substrate node lacks `demand - remaining` of `resource`.
    Node {
        node: NodeIndex,
        resource: String,
        demand: f64,
        remaining: f64,
    },
    /// A substrate link lacks `demand - remaining` bandwidth.
    Link {
        link: EdgeIndex,
        demand: f64,
        remaining: f64,
    },
    UnmappedNode(NodeIndex),
    UnmappedLink(EdgeIndex),
    /// A virtual node is hosted on a node the substrate does not have.
    UnknownHost { node: NodeIndex, host: NodeIndex },
    /// Two virtual nodes of the same request share a host.
    NotInjective {
        host: NodeIndex,
        first: NodeIndex,
        second: NodeIndex,
    },
    EmptyRoute(EdgeIndex),
    /// A path of the route is not a substrate path between the hosts of the
    /// virtual link's endpoints.
    BrokenPath(EdgeIndex),
    BadFraction { link: EdgeIndex, fraction: f64 },
    FractionSum { link: EdgeIndex, sum: f64 },
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Node {
                node,
                resource,
                demand,
                remaining,
            } => write!(
                f,
                "substrate node {} needs {} of {} but has {} left",
                node.index(),
                demand,
                resource,
                remaining
            ),
            Self::Link {
                link,
                demand,
                remaining,
            } => write!(
                f,
                "substrate link {} needs {} bandwidth but has {} left",
                link.index(),
                demand,
                remaining
            ),
            Self::UnmappedNode(node) => write!(f, "virtual node {} has no host", node.index()),
            Self::UnmappedLink(link) => write!(f, "virtual link {} has no route", link.index()),
            Self::UnknownHost { node, host } => write!(
                f,
                "virtual node {} is hosted on missing substrate node {}",
                node.index(),
                host.index()
            ),
            Self::NotInjective {
                host,
                first,
                second,
            } => write!(
                f,
                "virtual nodes {} and {} share substrate node {}",
                first.index(),
                second.index(),
                host.index()
            ),
            Self::EmptyRoute(link) => write!(f, "virtual link {} has an empty route", link.index()),
            Self::BrokenPath(link) => write!(
                f,
                "a path of virtual link {} does not connect its hosts",
                link.index()
            ),
            Self::BadFraction { link, fraction } => write!(
                f,
                "virtual link {} carries fraction {} on one path",
                link.index(),
                fraction
            ),
            Self::FractionSum { link, sum } => write!(
                f,
                "fractions of virtual link {} add up to {}",
                link.index(),
                sum
            ),
        }
    }
}

/// Checks that `mapping` is a complete, well formed embedding of `request`:
/// every virtual node is placed on a distinct existing host and every virtual
/// link is routed over substrate paths between its endpoints' hosts, with
/// fractions summing to 1.
pub fn validate_structure(
    substrate: &SubstrateNetwork,
    request: &VirtualNetwork,
    mapping: &Mapping,
) -> Result<(), Violation> {
    let mut hosted: BTreeMap<NodeIndex, NodeIndex> = BTreeMap::new();
    for node in request.iter_nodes() {
        let host = mapping.host(node).ok_or(Violation::UnmappedNode(node))?;
        if !substrate.contains_node(host) {
            return Err(Violation::UnknownHost { node, host });
        }
        if let Some(first) = hosted.insert(host, node) {
            return Err(Violation::NotInjective {
                host,
                first,
                second: node,
            });
        }
    }

    for link in request.iter_links() {
        let route = mapping.route_of(link).ok_or(Violation::UnmappedLink(link))?;
        if route.flows().is_empty() {
            return Err(Violation::EmptyRoute(link));
        }
        let (src, dst) = request.get_link_endpoints(link);
        let (src_host, dst_host) = (mapping.host(src), mapping.host(dst));
        for flow in route.flows() {
            if !is_substrate_path(substrate, &flow.path)
                || Some(flow.path.src()) != src_host
                || Some(flow.path.dst()) != dst_host
            {
                return Err(Violation::BrokenPath(link));
            }
            if !(flow.fraction > 0.0 && flow.fraction <= 1.0 + FRACTION_TOLERANCE) {
                return Err(Violation::BadFraction {
                    link,
                    fraction: flow.fraction,
                });
            }
        }
        let sum = route.fraction_sum();
        if (sum - 1.0).abs() > FRACTION_TOLERANCE {
            return Err(Violation::FractionSum { link, sum });
        }
    }
    Ok(())
}

fn is_substrate_path(substrate: &SubstrateNetwork, path: &Path) -> bool {
    Path::from_links(substrate, path.src(), path.links()).map_or(false, |p| p == *path)
}

/// Validates `mapping` against `residual` and returns the aggregated usage it
/// would commit.
pub fn validate_against(
    substrate: &SubstrateNetwork,
    residual: &Residual,
    request: &VirtualNetwork,
    mapping: &Mapping,
) -> Result<ResourceUsage, Violation> {
    validate_structure(substrate, request, mapping)?;
    let usage = mapping.usage(request);
    residual.check_usage(&usage)?;
    Ok(usage)
}

/// Validates `mapping` against the substrate's current remaining capacities.
pub fn validate(
    substrate: &SubstrateNetwork,
    request: &VirtualNetwork,
    mapping: &Mapping,
) -> Result<ResourceUsage, Violation> {
    validate_against(substrate, &substrate.residual(), request, mapping)
}
