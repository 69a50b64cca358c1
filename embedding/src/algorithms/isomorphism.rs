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


//! Subgraph isomorphism search by backtracking.

use petgraph::prelude::*;

use super::{ensure_hostable, feasible_hops};
use crate::callbacks::{OptionCallbacks, Progress};
use crate::error::Error;
use crate::mapping::{LinkRoute, Mapping};
use crate::path::{k_shortest_paths, Path};
use crate::request::VirtualNetwork;
use crate::specs::LinkSpec;
use crate::substrate::{Residual, SubstrateNetwork};

const PROGRESS_INTERVAL: usize = 1_000;

struct Search<'a, 'c> {
    substrate: &'a SubstrateNetwork,
    request: &'a VirtualNetwork,
    // virtual nodes by decreasing demand
    order: Vec<NodeIndex>,
    // `None`: direct substrate links only, `Some(k)`: up to k paths
    paths: Option<usize>,
    residual: Residual,
    mapping: Mapping,
    explored: usize,
    deepest: usize,
    callbacks: OptionCallbacks<'c>,
}

impl<'a, 'c> Search<'a, 'c> {
    fn assign(&mut self, depth: usize) -> Result<bool, Error> {
        if depth == self.order.len() {
            return Ok(true);
        }
        self.callbacks.check_cancelled()?;
        if depth > self.deepest || self.explored % PROGRESS_INTERVAL == 0 {
            self.deepest = self.deepest.max(depth);
            self.callbacks.progress(Progress::SearchDepth {
                depth,
                explored: self.explored,
            });
        }

        let node = self.order[depth];
        let demand = self.request.get_node(node).demand().clone();
        for host in self.substrate.iter_nodes() {
            if self.mapping.is_hosting(host) || !self.residual.node_fits(host, &demand) {
                continue;
            }
            self.explored += 1;
            self.residual.reserve_node(host, &demand);
            self.mapping.place(node, host);

            // links towards virtual nodes placed earlier
            let links = self
                .request
                .incident_links(node)
                .into_iter()
                .filter(|link| {
                    let other = self.request.opposite(*link, node);
                    other != node && self.mapping.host(other).is_some()
                })
                .collect::<Vec<_>>();
            if self.route(&links, 0, depth)? {
                return Ok(true);
            }

            self.mapping.unplace(node);
            self.residual.release_node(host, &demand);
        }
        log::trace!(
            "backtracking from depth {} after {} assignments",
            depth,
            self.explored
        );
        Ok(false)
    }

    fn candidate_paths(&self, src: NodeIndex, dst: NodeIndex, bandwidth: f64) -> Vec<Path> {
        match self.paths {
            None => self
                .substrate
                .links_between(src, dst)
                .into_iter()
                .filter(|link| self.residual.link_fits(*link, bandwidth))
                .filter_map(|link| Path::from_links(self.substrate, src, &[link]).ok())
                .collect(),
            Some(k) => {
                let residual = &self.residual;
                k_shortest_paths(self.substrate, src, dst, k, |link| {
                    feasible_hops(residual, link, bandwidth)
                })
            }
        }
    }

    fn route(&mut self, links: &[EdgeIndex], i: usize, depth: usize) -> Result<bool, Error> {
        if i == links.len() {
            return self.assign(depth + 1);
        }
        let link = links[i];
        let (src, dst) = self.request.get_link_endpoints(link);
        let (src, dst) = match (self.mapping.host(src), self.mapping.host(dst)) {
            (Some(src), Some(dst)) => (src, dst),
            _ => return Ok(false),
        };
        let bandwidth = self.request.get_link(link).bandwidth();
        for path in self.candidate_paths(src, dst, bandwidth) {
            self.residual.reserve_path(&path, bandwidth);
            self.mapping.route(link, LinkRoute::single(path.clone()));
            if self.route(links, i + 1, depth)? {
                return Ok(true);
            }
            self.mapping.unroute(link);
            self.residual.release_path(&path, bandwidth);
        }
        Ok(false)
    }
}

/// Finds the first consistent assignment in search order: virtual nodes by
/// decreasing demand, substrate hosts by index. With `paths == None` every
/// virtual link must map onto a single substrate link; with `Some(k)` any of
/// the `k` shortest feasible paths may carry it.
pub(super) fn embed(
    substrate: &SubstrateNetwork,
    request: &VirtualNetwork,
    paths: Option<usize>,
    callbacks: OptionCallbacks,
) -> Result<Mapping, Error> {
    let residual = substrate.residual();
    ensure_hostable(substrate, &residual, request)?;
    let mut search = Search {
        substrate,
        request,
        order: request.nodes_by_demand(),
        paths,
        residual,
        mapping: Mapping::new(),
        explored: 0,
        deepest: 0,
        callbacks,
    };
    if search.assign(0)? {
        log::debug!(
            "isomorphism found after {} assignments",
            search.explored
        );
        Ok(search.mapping)
    } else {
        Err(Error::NoEmbeddingFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithms::tests::{embed_with, pair, triangle};
    use crate::algorithms::AlgorithmKind;
    use crate::callbacks::{CancellationToken, ExecutionCallbacks};
    use crate::config::{LinkConfiguration, NodeConfiguration};
    use crate::substrate::line;
    use crate::validator::validate;
    use crate::{VirtualLink, VirtualNode};

    fn virtual_triangle(cpu: f64, bandwidth: f64) -> VirtualNetwork {
        let mut request = VirtualNetwork::new();
        let a = request.add_node(VirtualNode::new("a", cpu));
        let b = request.add_node(VirtualNode::new("b", cpu));
        let c = request.add_node(VirtualNode::new("c", cpu));
        request.link(a, b, VirtualLink::new(bandwidth));
        request.link(b, c, VirtualLink::new(bandwidth));
        request.link(c, a, VirtualLink::new(bandwidth));
        request
    }

    #[test]
    fn test_exact_respects_adjacency() {
        let substrate = triangle();
        let request = virtual_triangle(3.0, 2.0);
        let mapping = embed_with(&substrate, &request, AlgorithmKind::ExactSubgraphIsomorphism).unwrap();
        validate(&substrate, &request, &mapping).unwrap();
        for (link, route) in mapping.links() {
            let (src, dst) = request.get_link_endpoints(*link);
            let path = &route.flows()[0].path;
            assert_eq!(path.hops(), 1);
            assert!(path.connects(mapping.host(src).unwrap(), mapping.host(dst).unwrap()));
        }
    }

    #[test]
    fn test_exact_needs_direct_links() {
        // a triangle does not embed into a line, paths do not count
        let substrate = line(3, &NodeConfiguration::default(), &LinkConfiguration::default());
        let request = virtual_triangle(1.0, 1.0);
        assert_eq!(
            embed_with(&substrate, &request, AlgorithmKind::ExactSubgraphIsomorphism),
            Err(Error::NoEmbeddingFound)
        );
        // with paths it does: the c -> a link takes two hops
        let mapping = embed_with(&substrate, &request, AlgorithmKind::AdvancedSubgraphIsomorphism).unwrap();
        validate(&substrate, &request, &mapping).unwrap();
        let hops = mapping
            .links()
            .map(|(_, route)| route.flows()[0].path.hops())
            .sum::<usize>();
        assert_eq!(hops, 4);
    }

    #[test]
    fn test_backtracks_to_the_middle_of_a_line() {
        let substrate = line(3, &NodeConfiguration::with_cpu(10.0), &LinkConfiguration::new(10.0));
        let mut request = VirtualNetwork::new();
        let heavy = request.add_node(VirtualNode::new("heavy", 5.0));
        let x = request.add_node(VirtualNode::new("x", 1.0));
        let y = request.add_node(VirtualNode::new("y", 1.0));
        request.link(heavy, x, VirtualLink::new(4.0));
        request.link(heavy, y, VirtualLink::new(4.0));
        let mapping = embed_with(&substrate, &request, AlgorithmKind::ExactSubgraphIsomorphism).unwrap();
        // node_0 is tried first for the heavy node, but only node_1 has two neighbours
        assert_eq!(mapping.host(heavy), Some(NodeIndex::new(1)));
        validate(&substrate, &request, &mapping).unwrap();
    }

    #[test]
    fn test_two_links_between_the_same_nodes() {
        let substrate = triangle();
        let mut request = VirtualNetwork::new();
        let x = request.add_node(VirtualNode::new("x", 1.0));
        let y = request.add_node(VirtualNode::new("y", 1.0));
        request.link(x, y, VirtualLink::new(6.0));
        request.link(y, x, VirtualLink::new(6.0));
        // 12 exceeds every substrate link
        assert_eq!(
            embed_with(&substrate, &request, AlgorithmKind::ExactSubgraphIsomorphism),
            Err(Error::NoEmbeddingFound)
        );
        let mapping = embed_with(&substrate, &request, AlgorithmKind::AdvancedSubgraphIsomorphism).unwrap();
        validate(&substrate, &request, &mapping).unwrap();
    }

    #[test]
    fn test_cancelled() {
        let substrate = triangle();
        let mut callbacks = ExecutionCallbacks::default();
        let token = CancellationToken::new();
        callbacks.set_cancellation(token.clone());
        token.cancel();
        assert_eq!(
            embed(&substrate, &pair(1.0, 1.0), None, &mut callbacks),
            Err(Error::Cancelled)
        );
    }
}
