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


use itertools::Itertools;

use super::{delinearize_index, linearize_index};
use crate::config::{LinkConfiguration, NodeConfiguration};
use crate::substrate::{SubstrateLink, SubstrateNetwork, SubstrateNode};

/// A <dim>-D grid topology.
///
/// For example a 2D mesh looks like this:
/// <pre>
/// x --- x --- x --- x   ^
/// |     |     |     |   |
/// x --- x --- x --- x   y-dim
/// |     |     |     |   |
/// x --- x --- x --- x   v
/// < ----- x-dim ---->
/// </pre>
pub fn mesh(
    dims: &[usize],
    node_config: &NodeConfiguration,
    link_config: &LinkConfiguration,
) -> SubstrateNetwork {
    let mut substrate = SubstrateNetwork::new();
    let mut nodes = Vec::new();
    for n in 0..dims.iter().product() {
        let name = format!("node_{}", n);
        log::trace!("node {}, coords {:?}", name, delinearize_index(n, dims));
        nodes.push(substrate.add_node(SubstrateNode::from_config(&name, node_config)));
    }

    // for each node, connect to its "higher" neighbor in every dimension.
    for e in dims.iter().map(|&d| 0..d).multi_cartesian_product() {
        for (d, &m) in dims.iter().enumerate() {
            if e[d] + 1 < m {
                let mut n = e.clone();
                n[d] = e[d] + 1;
                substrate.link(
                    nodes[linearize_index(&e, dims)],
                    nodes[linearize_index(&n, dims)],
                    SubstrateLink::from_config(link_config),
                );
            }
        }
    }
    substrate
}
