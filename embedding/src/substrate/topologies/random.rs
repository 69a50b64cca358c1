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


use rand::Rng;
use rand_core::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;

use crate::config::{LinkConfiguration, NodeConfiguration};
use crate::substrate::{SubstrateLink, SubstrateNetwork, SubstrateNode};

/// A Waxman random graph on the unit square.
///
/// Nodes `u` and `v` at distance `d` are linked with probability
/// `alpha * exp(-d / (beta * L))`, `L` being the largest possible distance.
/// A chain over all nodes in creation order is added first so the substrate
/// is always connected. The same `seed` always yields the same substrate.
pub fn random(
    nodes: usize,
    alpha: f64,
    beta: f64,
    seed: u64,
    node_config: &NodeConfiguration,
    link_config: &LinkConfiguration,
) -> SubstrateNetwork {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
    let mut substrate = SubstrateNetwork::new();
    let coords = (0..nodes)
        .map(|_| (rng.gen::<f64>(), rng.gen::<f64>()))
        .collect::<Vec<_>>();
    let ids = (0..nodes)
        .map(|n| substrate.add_node(SubstrateNode::from_config(&format!("node_{}", n), node_config)))
        .collect::<Vec<_>>();

    let max_distance = std::f64::consts::SQRT_2;
    for i in 0..nodes {
        for j in (i + 1)..nodes {
            let (dx, dy) = (coords[i].0 - coords[j].0, coords[i].1 - coords[j].1);
            let distance = (dx * dx + dy * dy).sqrt();
            let p = alpha * (-distance / (beta * max_distance)).exp();
            if j == i + 1 || rng.gen::<f64>() < p {
                substrate.link(ids[i], ids[j], SubstrateLink::from_config(link_config));
            }
        }
    }
    log::debug!(
        "random substrate: {} nodes, {} links (seed {})",
        nodes,
        substrate.link_count(),
        seed
    );
    substrate
}
