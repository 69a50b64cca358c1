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

use super::{endpoint_hosts, ensure_hostable, splitting};
use crate::callbacks::OptionCallbacks;
use crate::error::Error;
use crate::mapping::{LinkRoute, Mapping};
use crate::path::shortest_path;
use crate::request::VirtualNetwork;
use crate::specs::{LinkSpec, NodeSpec, TOLERANCE};
use crate::substrate::{Residual, SubstrateNetwork};

/// Places virtual nodes, largest demand first, each on the unused substrate
/// node with the most remaining capacity of the demanded types. Ties go to
/// the lowest index.
pub(super) fn place_nodes(
    substrate: &SubstrateNetwork,
    request: &VirtualNetwork,
    residual: &mut Residual,
    mapping: &mut Mapping,
) -> Result<(), Error> {
    for node in request.nodes_by_demand() {
        let demand = request.get_node(node).demand();
        let mut best: Option<(NodeIndex, f64)> = None;
        for host in substrate.iter_nodes() {
            if mapping.is_hosting(host) || !residual.node_fits(host, demand) {
                continue;
            }
            let available = demand
                .keys()
                .map(|kind| residual.node_remaining(host, kind))
                .sum::<f64>();
            if best.map_or(true, |(_, score)| available > score + TOLERANCE) {
                best = Some((host, available));
            }
        }
        let (host, available) = best.ok_or(Error::NoEmbeddingFound)?;
        log::trace!(
            "{} on substrate node {} ({} available)",
            request.get_node(node).name(),
            host.index(),
            available
        );
        residual.reserve_node(host, demand);
        mapping.place(node, host);
    }
    Ok(())
}

/// Inverse remaining bandwidth over links that can carry `bandwidth`.
pub(super) fn inverse_remaining(residual: &Residual, link: EdgeIndex, bandwidth: f64) -> Option<f64> {
    if residual.link_fits(link, bandwidth) {
        Some(1.0 / residual.link_remaining(link).max(TOLERANCE))
    } else {
        None
    }
}

/// Greedy node placement, then each virtual link on the least loaded path.
/// With `split = Some(k)` a link that no single path can carry is spread
/// over up to `k` paths.
pub(super) fn embed(
    substrate: &SubstrateNetwork,
    request: &VirtualNetwork,
    split: Option<usize>,
    callbacks: OptionCallbacks,
) -> Result<Mapping, Error> {
    let mut residual = substrate.residual();
    ensure_hostable(substrate, &residual, request)?;
    let mut mapping = Mapping::new();
    place_nodes(substrate, request, &mut residual, &mut mapping)?;

    for link in request.iter_links() {
        callbacks.check_cancelled()?;
        let (src, dst) = endpoint_hosts(request, &mapping, link)?;
        let bandwidth = request.get_link(link).bandwidth();
        let path = {
            let view = &residual;
            shortest_path(substrate, src, dst, |e| inverse_remaining(view, e, bandwidth))
        };
        let route = match (path, split) {
            (Some(path), _) => {
                residual.reserve_path(&path, bandwidth);
                LinkRoute::single(path)
            }
            (None, Some(k)) => {
                splitting::split(substrate, &mut residual, link, src, dst, bandwidth, k)?
            }
            (None, None) => return Err(Error::NoPathFound { link, src, dst }),
        };
        mapping.route(link, route);
    }
    Ok(mapping)
}
