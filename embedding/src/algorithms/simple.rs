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


use super::{feasible_hops, route_unsplit};
use crate::callbacks::OptionCallbacks;
use crate::error::Error;
use crate::mapping::Mapping;
use crate::request::VirtualNetwork;
use crate::specs::NodeSpec;
use crate::substrate::SubstrateNetwork;

/// First fit node placement in substrate index order, then hop count
/// shortest paths with enough bandwidth.
pub(super) fn embed(
    substrate: &SubstrateNetwork,
    request: &VirtualNetwork,
    callbacks: OptionCallbacks,
) -> Result<Mapping, Error> {
    let mut residual = substrate.residual();
    let mut mapping = Mapping::new();
    for node in request.iter_nodes() {
        let demand = request.get_node(node).demand();
        let host = substrate
            .iter_nodes()
            .find(|host| !mapping.is_hosting(*host) && residual.node_fits(*host, demand))
            .ok_or_else(|| {
                log::debug!("no first fit host for {}", request.get_node(node).name());
                Error::NoEmbeddingFound
            })?;
        residual.reserve_node(host, demand);
        mapping.place(node, host);
    }
    route_unsplit(
        substrate,
        request,
        &mut residual,
        &mut mapping,
        feasible_hops,
        callbacks,
    )?;
    Ok(mapping)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithms::tests::{embed_with, pair, triangle};
    use crate::algorithms::AlgorithmKind;
    use crate::{SubstrateLink, SubstrateNode, VirtualLink, VirtualNode};
    use petgraph::prelude::*;

    #[test]
    fn test_first_fit() {
        let substrate = triangle();
        let mapping = embed_with(&substrate, &pair(5.0, 4.0), AlgorithmKind::SimpleShortestPath).unwrap();
        assert_eq!(mapping.host(NodeIndex::new(0)), Some(NodeIndex::new(0)));
        assert_eq!(mapping.host(NodeIndex::new(1)), Some(NodeIndex::new(1)));
        let route = mapping.route_of(EdgeIndex::new(0)).unwrap();
        assert_eq!(route.flows()[0].path.links(), &[EdgeIndex::new(0)]);
    }

    #[test]
    fn test_skips_full_hosts() {
        let mut substrate = SubstrateNetwork::new();
        let a = substrate.add_node(SubstrateNode::new("a", 1.0));
        let b = substrate.add_node(SubstrateNode::new("b", 10.0));
        let c = substrate.add_node(SubstrateNode::new("c", 10.0));
        substrate.link(a, b, SubstrateLink::new(10.0));
        substrate.link(b, c, SubstrateLink::new(10.0));
        let mapping = embed_with(&substrate, &pair(5.0, 1.0), AlgorithmKind::SimpleShortestPath).unwrap();
        assert_eq!(mapping.host(NodeIndex::new(0)), Some(b));
        assert_eq!(mapping.host(NodeIndex::new(1)), Some(c));
    }

    #[test]
    fn test_detours_around_thin_links() {
        let mut substrate = SubstrateNetwork::new();
        let a = substrate.add_node(SubstrateNode::new("a", 10.0));
        let b = substrate.add_node(SubstrateNode::new("b", 10.0));
        let c = substrate.add_node(SubstrateNode::new("c", 10.0));
        substrate.link(a, b, SubstrateLink::new(1.0));
        let bc = substrate.link(b, c, SubstrateLink::new(10.0));
        let ca = substrate.link(c, a, SubstrateLink::new(10.0));
        let mapping = embed_with(&substrate, &pair(1.0, 5.0), AlgorithmKind::SimpleShortestPath).unwrap();
        let route = mapping.route_of(EdgeIndex::new(0)).unwrap();
        assert_eq!(route.flows()[0].path.links(), &[ca, bc]);
    }

    #[test]
    fn test_no_path() {
        let mut substrate = SubstrateNetwork::new();
        let a = substrate.add_node(SubstrateNode::new("a", 10.0));
        let b = substrate.add_node(SubstrateNode::new("b", 10.0));
        substrate.link(a, b, SubstrateLink::new(1.0));
        let mut request = crate::VirtualNetwork::new();
        let x = request.add_node(VirtualNode::new("x", 1.0));
        let y = request.add_node(VirtualNode::new("y", 1.0));
        let xy = request.link(x, y, VirtualLink::new(2.0));
        assert_eq!(
            embed_with(&substrate, &request, AlgorithmKind::SimpleShortestPath),
            Err(Error::NoPathFound {
                link: xy,
                src: a,
                dst: b
            })
        );
    }
}
