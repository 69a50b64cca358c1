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


use crate::config::{LinkConfiguration, NodeConfiguration};
use crate::substrate::{SubstrateLink, SubstrateNetwork, SubstrateNode};

/// `nodes` nodes in a chain: node_0 -- node_1 -- ... -- node_{n-1}
pub fn line(
    nodes: usize,
    node_config: &NodeConfiguration,
    link_config: &LinkConfiguration,
) -> SubstrateNetwork {
    let mut substrate = SubstrateNetwork::new();
    let mut prev = None;
    for n in 0..nodes {
        let node = substrate.add_node(SubstrateNode::from_config(&format!("node_{}", n), node_config));
        if let Some(prev) = prev {
            substrate.link(prev, node, SubstrateLink::from_config(link_config));
        }
        prev = Some(node);
    }
    substrate
}

#[cfg(test)]
mod topology_tests {
    use super::*;
    use petgraph::graph::node_index;

    #[test]
    fn test_line() {
        let topo = line(4, &NodeConfiguration::default(), &LinkConfiguration::new(3.0));
        assert_eq!(topo.link_count(), 3);
        assert_eq!(topo.degree(node_index(0)), 1);
        assert_eq!(topo.degree(node_index(1)), 2);
        assert_eq!(topo.degree(node_index(3)), 1);
        assert!(topo.iter_links().all(|l| topo.remaining_bandwidth(l) == 3.0));
    }
}
