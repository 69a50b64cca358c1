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

/// Every pair of the `nodes` nodes is connected by one link.
pub fn fully_connected(
    nodes: usize,
    node_config: &NodeConfiguration,
    link_config: &LinkConfiguration,
) -> SubstrateNetwork {
    let mut substrate = SubstrateNetwork::new();
    let ids = (0..nodes)
        .map(|n| substrate.add_node(SubstrateNode::from_config(&format!("node_{}", n), node_config)))
        .collect::<Vec<_>>();
    for (i, src) in ids.iter().enumerate() {
        for dst in ids.iter().skip(i + 1) {
            substrate.link(*src, *dst, SubstrateLink::from_config(link_config));
        }
    }
    substrate
}
