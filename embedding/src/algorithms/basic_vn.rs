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


use petgraph::prelude::*;

use super::{ensure_hostable, route_unsplit, StressConfig};
use crate::callbacks::OptionCallbacks;
use crate::error::Error;
use crate::mapping::Mapping;
use crate::request::VirtualNetwork;
use crate::specs::{NodeSpec, TOLERANCE};
use crate::substrate::{Residual, SubstrateNetwork};

/// Keeps link weights finite on saturated links.
const STRESS_DELTA: f64 = 1e-3;

fn utilization(capacity: f64, remaining: f64) -> f64 {
    if capacity > 0.0 {
        (capacity - remaining) / capacity
    } else {
        0.0
    }
}

/// Mean utilization over the node's resource types.
fn node_stress(substrate: &SubstrateNetwork, residual: &Residual, host: NodeIndex) -> f64 {
    let node = substrate.get_node(host);
    let (sum, count) = node.resources().fold((0.0, 0), |(sum, count), (kind, capacity)| {
        (
            sum + utilization(capacity.capacity(), residual.node_remaining(host, kind)),
            count + 1,
        )
    });
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

/// Mean utilization over the links attached to the node.
fn link_stress(substrate: &SubstrateNetwork, residual: &Residual, host: NodeIndex) -> f64 {
    let links = substrate.incident_links(host);
    if links.is_empty() {
        return 0.0;
    }
    links
        .iter()
        .map(|link| {
            utilization(
                substrate.get_link(*link).capacity().capacity(),
                residual.link_remaining(*link),
            )
        })
        .sum::<f64>()
        / links.len() as f64
}

fn stress_weight(config: &StressConfig, residual: &Residual, link: EdgeIndex, bandwidth: f64) -> Option<f64> {
    if residual.link_fits(link, bandwidth) {
        Some(config.link_weight / (residual.link_remaining(link).max(0.0) + STRESS_DELTA))
    } else {
        None
    }
}

/// Places every virtual node, largest first, on the least stressed unused
/// host, then routes links along the least stressed paths.
pub(super) fn embed(
    substrate: &SubstrateNetwork,
    request: &VirtualNetwork,
    config: &StressConfig,
    with_link_stress: bool,
    callbacks: OptionCallbacks,
) -> Result<Mapping, Error> {
    let mut residual = substrate.residual();
    ensure_hostable(substrate, &residual, request)?;
    let mut mapping = Mapping::new();

    for node in request.nodes_by_demand() {
        callbacks.check_cancelled()?;
        let demand = request.get_node(node).demand();
        let mut best: Option<(NodeIndex, f64)> = None;
        for host in substrate.iter_nodes() {
            if mapping.is_hosting(host) || !residual.node_fits(host, demand) {
                continue;
            }
            let mut score = config.node_weight * node_stress(substrate, &residual, host);
            if with_link_stress {
                score += config.link_weight * link_stress(substrate, &residual, host);
            }
            if best.map_or(true, |(_, lowest)| score < lowest - TOLERANCE) {
                best = Some((host, score));
            }
        }
        let (host, score) = best.ok_or(Error::NoEmbeddingFound)?;
        log::trace!(
            "{} on substrate node {} (stress {:.3})",
            request.get_node(node).name(),
            host.index(),
            score
        );
        residual.reserve_node(host, demand);
        mapping.place(node, host);
    }

    route_unsplit(
        substrate,
        request,
        &mut residual,
        &mut mapping,
        |residual, link, bandwidth| stress_weight(config, residual, link, bandwidth),
        callbacks,
    )?;
    Ok(mapping)
}
