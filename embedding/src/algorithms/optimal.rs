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


//! Optimal mapping by branch and bound over an arc flow LP.
//!
//! Placement variables `x[v, n]` exist for every virtual node `v` and every
//! substrate node `n` that could host it. Every virtual link owns one flow
//! variable per direction of every substrate link, measured as a fraction of
//! its bandwidth. The relaxation bounds the cost of any embedding from below;
//! branching fixes placement variables to 0 or 1 until the best integral
//! placement found is within `1 + epsilon` of the lowest open bound.

use petgraph::prelude::*;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, BinaryHeap, HashMap, VecDeque};

use super::{ensure_hostable, fitting_hosts, OptimalConfig};
use crate::callbacks::{OptionCallbacks, Progress};
use crate::error::Error;
use crate::lp::{LinearProgram, LpOutcome, Relation, Solution};
use crate::mapping::{LinkRoute, Mapping, PathFlow};
use crate::path::Path;
use crate::request::VirtualNetwork;
use crate::specs::{LinkSpec, NodeSpec, TOLERANCE};
use crate::substrate::{Residual, SubstrateNetwork};

const INTEGRALITY: f64 = 1e-6;
const FLOW_EPS: f64 = 1e-9;

#[derive(Clone, Copy, Debug)]
struct Placement {
    node: NodeIndex,
    host: NodeIndex,
    variable: usize,
}

#[derive(Clone, Copy, Debug)]
struct Arc {
    link: EdgeIndex,
    edge: EdgeIndex,
    from: NodeIndex,
    to: NodeIndex,
    variable: usize,
}

struct Formulation {
    lp: LinearProgram,
    placements: Vec<Placement>,
    arcs: Vec<Arc>,
}

impl Formulation {
    fn build(substrate: &SubstrateNetwork, residual: &Residual, request: &VirtualNetwork) -> Self {
        let mut lp = LinearProgram::new();

        let mut placements = Vec::new();
        for node in request.iter_nodes() {
            let cost = request.get_node(node).total();
            for host in fitting_hosts(substrate, residual, request, node) {
                placements.push(Placement {
                    node,
                    host,
                    variable: lp.add_variable(cost),
                });
            }
        }

        let mut arcs = Vec::new();
        for link in request.iter_links() {
            let bandwidth = request.get_link(link).bandwidth();
            for edge in substrate.iter_links() {
                let (a, b) = substrate.get_link_endpoints(edge);
                for (from, to) in [(a, b), (b, a)].iter() {
                    arcs.push(Arc {
                        link,
                        edge,
                        from: *from,
                        to: *to,
                        variable: lp.add_variable(bandwidth),
                    });
                }
            }
        }

        // every virtual node on exactly one host
        for node in request.iter_nodes() {
            let terms = placements
                .iter()
                .filter(|p| p.node == node)
                .map(|p| (p.variable, 1.0))
                .collect();
            lp.add_constraint(terms, Relation::Equal, 1.0);
        }

        // at most one virtual node per host, within the host's resources
        for host in substrate.iter_nodes() {
            let hosted = placements.iter().filter(|p| p.host == host).collect::<Vec<_>>();
            if hosted.len() > 1 {
                let terms = hosted.iter().map(|p| (p.variable, 1.0)).collect();
                lp.add_constraint(terms, Relation::LessEq, 1.0);
            }
            let mut per_kind: BTreeMap<&str, Vec<(usize, f64)>> = BTreeMap::new();
            for p in hosted.iter() {
                for (kind, amount) in request.get_node(p.node).demand() {
                    if *amount > 0.0 {
                        per_kind
                            .entry(kind.as_str())
                            .or_insert_with(Vec::new)
                            .push((p.variable, *amount));
                    }
                }
            }
            for (kind, terms) in per_kind {
                lp.add_constraint(terms, Relation::LessEq, residual.node_remaining(host, kind));
            }
        }

        // flow leaves the source host and reaches the destination host
        for link in request.iter_links() {
            let (src, dst) = request.get_link_endpoints(link);
            for node in substrate.iter_nodes() {
                let mut terms = Vec::new();
                for arc in arcs.iter().filter(|arc| arc.link == link) {
                    if arc.from == node {
                        terms.push((arc.variable, 1.0));
                    } else if arc.to == node {
                        terms.push((arc.variable, -1.0));
                    }
                }
                for p in placements.iter().filter(|p| p.host == node) {
                    if p.node == src {
                        terms.push((p.variable, -1.0));
                    } else if p.node == dst {
                        terms.push((p.variable, 1.0));
                    }
                }
                if !terms.is_empty() {
                    lp.add_constraint(terms, Relation::Equal, 0.0);
                }
            }
        }

        // bandwidth of both directions of a substrate link
        for edge in substrate.iter_links() {
            let terms = arcs
                .iter()
                .filter(|arc| arc.edge == edge)
                .map(|arc| (arc.variable, request.get_link(arc.link).bandwidth()))
                .filter(|(_, bandwidth)| *bandwidth > 0.0)
                .collect::<Vec<_>>();
            if !terms.is_empty() {
                lp.add_constraint(terms, Relation::LessEq, residual.link_remaining(edge).max(0.0));
            }
        }

        Self {
            lp,
            placements,
            arcs,
        }
    }

    /// Solves the relaxation with some placement variables fixed.
    fn solve(&self, fixings: &[(usize, f64)], callbacks: OptionCallbacks) -> Result<LpOutcome, Error> {
        let mut lp = self.lp.clone();
        for (variable, value) in fixings {
            lp.add_constraint(vec![(*variable, 1.0)], Relation::Equal, *value);
        }
        lp.solve(callbacks)
    }

    /// The fractional placement variable closest to 1/2.
    fn branching_variable(&self, values: &[f64]) -> Option<usize> {
        self.placements
            .iter()
            .map(|p| (p.variable, values[p.variable]))
            .filter(|(_, x)| *x > INTEGRALITY && *x < 1.0 - INTEGRALITY)
            .min_by(|(_, a), (_, b)| {
                (a - 0.5)
                    .abs()
                    .partial_cmp(&(b - 0.5).abs())
                    .unwrap_or(Ordering::Equal)
            })
            .map(|(variable, _)| variable)
    }

    /// Places every virtual node, heaviest first, on the unused host with the
    /// largest relaxed value and solves the flows for that placement.
    fn round(
        &self,
        request: &VirtualNetwork,
        values: &[f64],
        callbacks: OptionCallbacks,
    ) -> Result<Option<Solution>, Error> {
        let mut used = BTreeSet::new();
        let mut chosen = BTreeSet::new();
        for node in request.nodes_by_demand() {
            let best = self
                .placements
                .iter()
                .filter(|p| p.node == node && !used.contains(&p.host))
                .max_by(|a, b| {
                    values[a.variable]
                        .partial_cmp(&values[b.variable])
                        .unwrap_or(Ordering::Equal)
                        .then(b.host.cmp(&a.host))
                });
            match best {
                Some(p) => {
                    used.insert(p.host);
                    chosen.insert(p.variable);
                }
                None => return Ok(None),
            }
        }
        let fixings = self
            .placements
            .iter()
            .map(|p| {
                let value = if chosen.contains(&p.variable) { 1.0 } else { 0.0 };
                (p.variable, value)
            })
            .collect::<Vec<_>>();
        match self.solve(&fixings, callbacks)? {
            LpOutcome::Optimal(solution) => Ok(Some(solution)),
            _ => Ok(None),
        }
    }

    fn mapping(
        &self,
        substrate: &SubstrateNetwork,
        request: &VirtualNetwork,
        values: &[f64],
    ) -> Result<Mapping, Error> {
        let mut mapping = Mapping::new();
        for p in self.placements.iter().filter(|p| values[p.variable] > 0.5) {
            mapping.place(p.node, p.host);
        }
        for link in request.iter_links() {
            let (src, dst) = request.get_link_endpoints(link);
            let (src, dst) = match (mapping.host(src), mapping.host(dst)) {
                (Some(src), Some(dst)) => (src, dst),
                _ => return Err(Error::NoEmbeddingFound),
            };
            let arcs = self
                .arcs
                .iter()
                .filter(|arc| arc.link == link)
                .map(|arc| (*arc, values[arc.variable]))
                .filter(|(_, flow)| *flow > FLOW_EPS)
                .collect::<Vec<_>>();
            mapping.route(link, decompose(substrate, src, dst, arcs)?);
        }
        Ok(mapping)
    }
}

/// Splits a unit flow from `src` to `dst` into weighted paths.
fn decompose(
    substrate: &SubstrateNetwork,
    src: NodeIndex,
    dst: NodeIndex,
    mut arcs: Vec<(Arc, f64)>,
) -> Result<LinkRoute, Error> {
    let mut paths: BTreeMap<Path, f64> = BTreeMap::new();
    for _ in 0..=arcs.len() {
        // breadth first over arcs still carrying flow
        let mut predecessor: HashMap<NodeIndex, usize> = HashMap::new();
        let mut queue = VecDeque::new();
        queue.push_back(src);
        while let Some(node) = queue.pop_front() {
            if node == dst {
                break;
            }
            for (i, (arc, flow)) in arcs.iter().enumerate() {
                if arc.from == node
                    && *flow > FLOW_EPS
                    && arc.to != src
                    && !predecessor.contains_key(&arc.to)
                {
                    predecessor.insert(arc.to, i);
                    queue.push_back(arc.to);
                }
            }
        }
        if !predecessor.contains_key(&dst) {
            break;
        }
        let mut used = Vec::new();
        let mut node = dst;
        while node != src {
            let i = predecessor[&node];
            used.push(i);
            node = arcs[i].0.from;
        }
        used.reverse();
        let amount = used
            .iter()
            .map(|i| arcs[*i].1)
            .fold(f64::INFINITY, f64::min);
        for i in used.iter() {
            arcs[*i].1 -= amount;
        }
        let links = used.iter().map(|i| arcs[*i].0.edge).collect::<Vec<_>>();
        let path = Path::from_links(substrate, src, &links)?;
        *paths.entry(path).or_insert(0.0) += amount;
    }

    let total: f64 = paths.values().sum();
    if paths.is_empty() || total <= FLOW_EPS {
        return Err(Error::NoEmbeddingFound);
    }
    if paths.len() == 1 {
        let path = paths.into_iter().map(|(path, _)| path).next();
        return path.map(LinkRoute::single).ok_or(Error::NoEmbeddingFound);
    }
    let mut flows = paths
        .into_iter()
        .map(|(path, amount)| PathFlow {
            path,
            fraction: amount / total,
        })
        .collect::<Vec<_>>();
    if let Some((last, others)) = flows.split_last_mut() {
        last.fraction = 1.0 - others.iter().map(|flow| flow.fraction).sum::<f64>();
    }
    Ok(LinkRoute::split(flows))
}

/// An open subproblem, ordered so the max heap pops the lowest bound first
/// and, among equal bounds, the oldest.
struct OpenNode {
    bound: f64,
    order: usize,
    fixings: Vec<(usize, f64)>,
    solution: Solution,
}

impl PartialEq for OpenNode {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for OpenNode {}

impl PartialOrd for OpenNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OpenNode {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .bound
            .partial_cmp(&self.bound)
            .unwrap_or(Ordering::Equal)
            .then_with(|| other.order.cmp(&self.order))
    }
}

fn relative_gap(incumbent: Option<f64>, bound: f64) -> f64 {
    match incumbent {
        Some(cost) if cost - bound <= TOLERANCE => 0.0,
        Some(cost) if bound > TOLERANCE => (cost - bound) / bound,
        _ => f64::INFINITY,
    }
}

pub(super) fn embed(
    substrate: &SubstrateNetwork,
    request: &VirtualNetwork,
    config: &OptimalConfig,
    callbacks: OptionCallbacks,
) -> Result<Mapping, Error> {
    let residual = substrate.residual();
    ensure_hostable(substrate, &residual, request)?;
    let formulation = Formulation::build(substrate, &residual, request);
    log::debug!(
        "request {}: relaxation with {} variables, {} constraints",
        request.id(),
        formulation.lp.variable_count(),
        formulation.lp.constraint_count()
    );

    let root = match formulation.solve(&[], callbacks)? {
        LpOutcome::Optimal(solution) => solution,
        LpOutcome::Infeasible => return Err(Error::Infeasible),
        outcome => {
            log::warn!("root relaxation of request {}: {:?}", request.id(), outcome);
            return Err(Error::NoEmbeddingFound);
        }
    };

    let mut open = BinaryHeap::new();
    let mut order = 0;
    open.push(OpenNode {
        bound: root.objective,
        order,
        fixings: Vec::new(),
        solution: root,
    });
    let mut incumbent: Option<Solution> = None;
    let mut explored = 0;

    while let Some(node) = open.pop() {
        callbacks.check_cancelled()?;
        explored += 1;
        let best = incumbent.as_ref().map(|solution| solution.objective);
        callbacks.progress(Progress::BranchAndBound {
            explored,
            lower_bound: node.bound,
            incumbent: best,
        });
        if let Some(cost) = best {
            if cost <= (1.0 + config.epsilon) * node.bound + TOLERANCE {
                log::debug!(
                    "incumbent {} within {} of bound {} after {} nodes",
                    cost,
                    config.epsilon,
                    node.bound,
                    explored
                );
                break;
            }
        }
        if explored > config.max_iterations {
            return Err(Error::ApproximationExceeded {
                gap: relative_gap(best, node.bound),
                epsilon: config.epsilon,
            });
        }

        let variable = match formulation.branching_variable(&node.solution.values) {
            Some(variable) => variable,
            None => {
                if best.map_or(true, |cost| node.solution.objective < cost - TOLERANCE) {
                    log::trace!("integral relaxation costs {}", node.solution.objective);
                    incumbent = Some(node.solution);
                }
                continue;
            }
        };

        if let Some(rounded) = formulation.round(request, &node.solution.values, callbacks)? {
            if incumbent
                .as_ref()
                .map_or(true, |solution| rounded.objective < solution.objective - TOLERANCE)
            {
                log::trace!("rounded placement costs {}", rounded.objective);
                incumbent = Some(rounded);
            }
        }

        for value in [1.0, 0.0].iter() {
            let mut fixings = node.fixings.clone();
            fixings.push((variable, *value));
            match formulation.solve(&fixings, callbacks)? {
                LpOutcome::Optimal(solution) => {
                    let cutoff = incumbent.as_ref().map(|s| s.objective - TOLERANCE);
                    if cutoff.map_or(true, |cutoff| solution.objective < cutoff) {
                        order += 1;
                        open.push(OpenNode {
                            bound: solution.objective,
                            order,
                            fixings,
                            solution,
                        });
                    }
                }
                LpOutcome::PivotLimit => {
                    log::warn!("dropping subproblem {:?}: pivot limit", fixings);
                }
                _ => {}
            }
        }
    }

    match incumbent {
        Some(solution) => {
            log::debug!(
                "request {}: optimal mapping costs {} after {} nodes",
                request.id(),
                solution.objective,
                explored
            );
            formulation.mapping(substrate, request, &solution.values)
        }
        None => Err(Error::NoEmbeddingFound),
    }
}
