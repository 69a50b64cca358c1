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


//! Coordinated node and link mapping.
//!
//! Candidate hosts are ranked by how much they offer (remaining node
//! resources times remaining bandwidth around them). A bounded number of
//! injective placements over the best candidates is enumerated; the links of
//! every placement are mapped by the chosen variant and the cheapest feasible
//! result in bandwidth times hops wins.

use petgraph::prelude::*;
use std::collections::BTreeMap;

use super::{endpoint_hosts, ensure_hostable, fitting_hosts, residual_hops, CoordinatedConfig};
use crate::callbacks::{OptionCallbacks, Progress};
use crate::error::Error;
use crate::lp::{LinearProgram, LpOutcome, Relation};
use crate::mapping::{LinkRoute, Mapping, PathFlow};
use crate::path::{k_shortest_paths, Path};
use crate::request::VirtualNetwork;
use crate::specs::{LinkSpec, TOLERANCE};
use crate::substrate::{Residual, SubstrateNetwork};

// LP fractions at or below this are treated as zero.
const ZERO_FRACTION: f64 = 1e-12;

/// How a coordinated algorithm maps the links of a placement.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CoordinatedVariant {
    /// Each virtual link on the first of its `k` shortest paths that has
    /// enough bandwidth.
    KPaths,
    /// Links split over their `k` shortest paths as a min cost
    /// multi-commodity flow.
    PathSplitting,
    /// As `PathSplitting`, then small fractions are stripped and the flow is
    /// re-balanced over the remaining paths.
    RoundingStripping,
}

fn availability(substrate: &SubstrateNetwork, residual: &Residual, host: NodeIndex) -> f64 {
    let node = residual.node_total(host);
    let bandwidth = substrate
        .incident_links(host)
        .iter()
        .map(|link| residual.link_remaining(*link))
        .sum::<f64>();
    node * bandwidth
}

/// Best hosts per virtual node by availability; ties by index. Every node
/// keeps at least as many hosts as the request has nodes, so the shared
/// ranking never rules out an injective placement on its own.
fn candidates(
    substrate: &SubstrateNetwork,
    residual: &Residual,
    request: &VirtualNetwork,
    limit: usize,
) -> BTreeMap<NodeIndex, Vec<NodeIndex>> {
    let limit = limit.max(request.node_count());
    request
        .iter_nodes()
        .map(|node| {
            let mut hosts = fitting_hosts(substrate, residual, request, node)
                .into_iter()
                .map(|host| (host, availability(substrate, residual, host)))
                .collect::<Vec<_>>();
            hosts.sort_by(|(ha, a), (hb, b)| {
                b.partial_cmp(a)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then(ha.cmp(hb))
            });
            hosts.truncate(limit);
            (node, hosts.into_iter().map(|(host, _)| host).collect())
        })
        .collect()
}

/// Up to `limit` injective placements in candidate order.
fn placements(
    order: &[NodeIndex],
    candidates: &BTreeMap<NodeIndex, Vec<NodeIndex>>,
    limit: usize,
) -> Vec<Vec<(NodeIndex, NodeIndex)>> {
    fn enumerate(
        depth: usize,
        order: &[NodeIndex],
        candidates: &BTreeMap<NodeIndex, Vec<NodeIndex>>,
        limit: usize,
        current: &mut Vec<(NodeIndex, NodeIndex)>,
        result: &mut Vec<Vec<(NodeIndex, NodeIndex)>>,
    ) {
        if result.len() >= limit {
            return;
        }
        if depth == order.len() {
            result.push(current.clone());
            return;
        }
        let node = order[depth];
        for host in candidates[&node].iter() {
            if current.iter().any(|(_, used)| used == host) {
                continue;
            }
            current.push((node, *host));
            enumerate(depth + 1, order, candidates, limit, current, result);
            current.pop();
            if result.len() >= limit {
                return;
            }
        }
    }
    let mut result = Vec::new();
    enumerate(0, order, candidates, limit, &mut Vec::new(), &mut result);
    result
}

fn candidate_paths(
    substrate: &SubstrateNetwork,
    residual: &Residual,
    request: &VirtualNetwork,
    mapping: &Mapping,
    k: usize,
) -> Result<BTreeMap<EdgeIndex, Vec<Path>>, Error> {
    let mut paths = BTreeMap::new();
    for link in request.iter_links() {
        let (src, dst) = endpoint_hosts(request, mapping, link)?;
        paths.insert(
            link,
            k_shortest_paths(substrate, src, dst, k, |e| residual_hops(residual, e)),
        );
    }
    Ok(paths)
}

fn map_k_paths(
    substrate: &SubstrateNetwork,
    residual: &mut Residual,
    request: &VirtualNetwork,
    mapping: &mut Mapping,
    k: usize,
) -> Result<bool, Error> {
    for link in request.iter_links() {
        let (src, dst) = endpoint_hosts(request, mapping, link)?;
        let bandwidth = request.get_link(link).bandwidth();
        let path = {
            let view: &Residual = residual;
            k_shortest_paths(substrate, src, dst, k, |e| residual_hops(view, e))
                .into_iter()
                .find(|path| view.path_fits(path, bandwidth))
        };
        match path {
            Some(path) => {
                residual.reserve_path(&path, bandwidth);
                mapping.route(link, LinkRoute::single(path));
            }
            None => return Ok(false),
        }
    }
    Ok(true)
}

/// Min cost split of every virtual link over its candidate paths, subject to
/// the remaining link bandwidth. Returns the fraction of each path, `None`
/// when infeasible.
fn solve_path_lp(
    residual: &Residual,
    request: &VirtualNetwork,
    paths: &BTreeMap<EdgeIndex, Vec<Path>>,
    callbacks: OptionCallbacks,
) -> Result<Option<BTreeMap<EdgeIndex, Vec<(Path, f64)>>>, Error> {
    let mut lp = LinearProgram::new();
    let mut variables: Vec<(EdgeIndex, usize, usize)> = Vec::new();
    let mut loads: BTreeMap<EdgeIndex, Vec<(usize, f64)>> = BTreeMap::new();

    for (link, candidates) in paths.iter() {
        if candidates.is_empty() {
            return Ok(None);
        }
        let bandwidth = request.get_link(*link).bandwidth();
        let mut share = Vec::new();
        for (p, path) in candidates.iter().enumerate() {
            let variable = lp.add_variable(bandwidth * path.hops() as f64);
            variables.push((*link, p, variable));
            share.push((variable, 1.0));
            for substrate_link in path.links() {
                loads
                    .entry(*substrate_link)
                    .or_insert_with(Vec::new)
                    .push((variable, bandwidth));
            }
        }
        lp.add_constraint(share, Relation::Equal, 1.0);
    }
    for (substrate_link, terms) in loads.into_iter() {
        if terms.iter().all(|(_, bandwidth)| *bandwidth <= 0.0) {
            continue;
        }
        lp.add_constraint(terms, Relation::LessEq, residual.link_remaining(substrate_link).max(0.0));
    }

    let solution = match lp.solve(callbacks)? {
        LpOutcome::Optimal(solution) => solution,
        outcome => {
            log::trace!("path lp: {:?}", outcome);
            return Ok(None);
        }
    };
    let mut fractions: BTreeMap<EdgeIndex, Vec<(Path, f64)>> = BTreeMap::new();
    for (link, p, variable) in variables {
        let fraction = solution.value(variable);
        if fraction > ZERO_FRACTION {
            fractions
                .entry(link)
                .or_insert_with(Vec::new)
                .push((paths[&link][p].clone(), fraction));
        }
    }
    Ok(Some(fractions))
}

fn route_from_fractions(flows: Vec<(Path, f64)>) -> LinkRoute {
    let total: f64 = flows.iter().map(|(_, f)| f).sum();
    let mut flows = flows
        .into_iter()
        .map(|(path, fraction)| PathFlow {
            path,
            fraction: fraction / total,
        })
        .collect::<Vec<_>>();
    if let Some((last, others)) = flows.split_last_mut() {
        last.fraction = 1.0 - others.iter().map(|flow| flow.fraction).sum::<f64>();
    }
    LinkRoute::split(flows)
}

fn apply_fractions(
    residual: &mut Residual,
    request: &VirtualNetwork,
    mapping: &mut Mapping,
    fractions: BTreeMap<EdgeIndex, Vec<(Path, f64)>>,
) -> bool {
    for (link, flows) in fractions.into_iter() {
        let route = route_from_fractions(flows);
        let bandwidth = request.get_link(link).bandwidth();
        for (substrate_link, load) in route.link_loads(bandwidth) {
            if !residual.link_fits(substrate_link, load) {
                return false;
            }
            residual.reserve_link(substrate_link, load);
        }
        mapping.route(link, route);
    }
    request.iter_links().all(|link| mapping.route_of(link).is_some())
}

/// Keeps, per virtual link, the paths with a fraction of at least
/// `threshold`, at most `k` of them, largest first. A link whose fractions
/// are all below the threshold keeps its largest.
fn strip(
    fractions: &BTreeMap<EdgeIndex, Vec<(Path, f64)>>,
    threshold: f64,
    k: usize,
) -> BTreeMap<EdgeIndex, Vec<Path>> {
    fractions
        .iter()
        .map(|(link, flows)| {
            let mut flows = flows.clone();
            flows.sort_by(|(_, a), (_, b)| b.partial_cmp(a).unwrap_or(std::cmp::Ordering::Equal));
            let mut kept = flows
                .iter()
                .filter(|(_, fraction)| *fraction + TOLERANCE >= threshold)
                .take(k)
                .map(|(path, _)| path.clone())
                .collect::<Vec<_>>();
            if kept.is_empty() {
                kept.extend(flows.first().map(|(path, _)| path.clone()));
            }
            (*link, kept)
        })
        .collect()
}

fn map_links(
    substrate: &SubstrateNetwork,
    residual: &mut Residual,
    request: &VirtualNetwork,
    mapping: &mut Mapping,
    variant: CoordinatedVariant,
    config: &CoordinatedConfig,
    callbacks: OptionCallbacks,
) -> Result<bool, Error> {
    match variant {
        CoordinatedVariant::KPaths => map_k_paths(substrate, residual, request, mapping, config.k),
        CoordinatedVariant::PathSplitting => {
            let paths = candidate_paths(substrate, residual, request, mapping, config.k)?;
            match solve_path_lp(residual, request, &paths, callbacks)? {
                Some(fractions) => Ok(apply_fractions(residual, request, mapping, fractions)),
                None => Ok(false),
            }
        }
        CoordinatedVariant::RoundingStripping => {
            let paths = candidate_paths(substrate, residual, request, mapping, config.k)?;
            let fractions = match solve_path_lp(residual, request, &paths, callbacks)? {
                Some(fractions) => fractions,
                None => return Ok(false),
            };
            let kept = strip(&fractions, config.strip_threshold, config.k);
            match solve_path_lp(residual, request, &kept, callbacks)? {
                Some(fractions) => Ok(apply_fractions(residual, request, mapping, fractions)),
                None => {
                    log::debug!("stripped paths cannot carry the request");
                    Ok(false)
                }
            }
        }
    }
}

pub(super) fn embed(
    substrate: &SubstrateNetwork,
    request: &VirtualNetwork,
    variant: CoordinatedVariant,
    config: &CoordinatedConfig,
    callbacks: OptionCallbacks,
) -> Result<Mapping, Error> {
    let residual = substrate.residual();
    ensure_hostable(substrate, &residual, request)?;
    let order = request.nodes_by_demand();
    let mut found = placements(
        &order,
        &candidates(substrate, &residual, request, config.candidates),
        config.max_placements,
    );
    if found.is_empty() {
        log::debug!("no injective placement over the best candidates, widening to all hosts");
        found = placements(
            &order,
            &candidates(substrate, &residual, request, usize::MAX),
            config.max_placements,
        );
    }
    log::debug!(
        "{:?}: evaluating {} placements of request {}",
        variant,
        found.len(),
        request.id()
    );

    let mut best: Option<(f64, Mapping)> = None;
    for (evaluated, placement) in found.iter().enumerate() {
        callbacks.check_cancelled()?;
        callbacks.progress(Progress::PlacementCandidates {
            evaluated,
            total: found.len(),
        });
        let mut local = residual.clone();
        let mut mapping = Mapping::new();
        for (node, host) in placement {
            local.reserve_node(*host, request.get_node(*node).demand());
            mapping.place(*node, *host);
        }
        if !map_links(substrate, &mut local, request, &mut mapping, variant, config, callbacks)? {
            continue;
        }
        let cost = mapping.link_cost(request);
        log::trace!("placement {:?} costs {}", placement, cost);
        if best.as_ref().map_or(true, |(best_cost, _)| cost < best_cost - TOLERANCE) {
            best = Some((cost, mapping));
        }
    }
    best.map(|(_, mapping)| mapping).ok_or(Error::NoEmbeddingFound)
}
