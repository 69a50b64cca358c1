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

/// `hosts` leaf nodes around one hub. The hub is provisioned like the hosts.
pub fn star(
    hosts: usize,
    node_config: &NodeConfiguration,
    link_config: &LinkConfiguration,
) -> SubstrateNetwork {
    let mut substrate = SubstrateNetwork::new();
    let hub = substrate.add_node(SubstrateNode::from_config("hub", node_config));
    for n in 0..hosts {
        let node = substrate.add_node(SubstrateNode::from_config(&format!("node_{}", n), node_config));
        substrate.link(hub, node, SubstrateLink::from_config(link_config));
    }
    substrate
}
