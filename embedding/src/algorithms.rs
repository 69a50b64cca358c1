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


//! Embedding strategies and their configuration.

use petgraph::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::callbacks::OptionCallbacks;
use crate::error::Error;
use crate::mapping::{LinkRoute, Mapping};
use crate::path::shortest_path;
use crate::request::VirtualNetwork;
use crate::specs::{LinkSpec, NodeSpec, TOLERANCE};
use crate::substrate::{Residual, SubstrateNetwork};

mod basic_vn;
mod coordinated;
mod greedy;
mod isomorphism;
mod optimal;
mod simple;
mod splitting;

pub use coordinated::CoordinatedVariant;

/// Number of candidate paths per virtual link when `k` is not given to an
/// algorithm that can do without it.
pub const DEFAULT_K: usize = 3;
pub const DEFAULT_CANDIDATES: usize = 4;
pub const DEFAULT_MAX_PLACEMENTS: usize = 256;
pub const DEFAULT_STRIP_THRESHOLD: f64 = 0.1;
pub const DEFAULT_MAX_ITERATIONS: usize = 10_000;

/// The algorithms a caller can choose from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum AlgorithmKind {
    ExactSubgraphIsomorphism,
    AdvancedSubgraphIsomorphism,
    GreedyAvailable,
    GreedyPathSplitting,
    CoordinatedPathSplitting,
    CoordinatedKPaths,
    CoordinatedRoundingStripping,
    OptimalMapping,
    SimpleShortestPath,
    BasicVn,
    BasicVnLinkStress,
}

impl AlgorithmKind {
    pub const ALL: [AlgorithmKind; 11] = [
        AlgorithmKind::ExactSubgraphIsomorphism,
        AlgorithmKind::AdvancedSubgraphIsomorphism,
        AlgorithmKind::GreedyAvailable,
        AlgorithmKind::GreedyPathSplitting,
        AlgorithmKind::CoordinatedPathSplitting,
        AlgorithmKind::CoordinatedKPaths,
        AlgorithmKind::CoordinatedRoundingStripping,
        AlgorithmKind::OptimalMapping,
        AlgorithmKind::SimpleShortestPath,
        AlgorithmKind::BasicVn,
        AlgorithmKind::BasicVnLinkStress,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::ExactSubgraphIsomorphism => "ExactSubgraphIsomorphism",
            Self::AdvancedSubgraphIsomorphism => "AdvancedSubgraphIsomorphism",
            Self::GreedyAvailable => "GreedyAvailable",
            Self::GreedyPathSplitting => "GreedyPathSplitting",
            Self::CoordinatedPathSplitting => "CoordinatedPathSplitting",
            Self::CoordinatedKPaths => "CoordinatedKPaths",
            Self::CoordinatedRoundingStripping => "CoordinatedRoundingStripping",
            Self::OptimalMapping => "OptimalMapping",
            Self::SimpleShortestPath => "SimpleShortestPath",
            Self::BasicVn => "BasicVn",
            Self::BasicVnLinkStress => "BasicVnLinkStress",
        }
    }

    pub fn requires_epsilon(&self) -> bool {
        *self == Self::OptimalMapping
    }

    pub fn requires_k(&self) -> bool {
        matches!(
            self,
            Self::GreedyPathSplitting
                | Self::CoordinatedPathSplitting
                | Self::CoordinatedKPaths
                | Self::CoordinatedRoundingStripping
        )
    }
}

impl fmt::Display for AlgorithmKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for AlgorithmKind {
    type Err = Error;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .find(|kind| kind.name().eq_ignore_ascii_case(name.trim()))
            .copied()
            .ok_or_else(|| Error::UnknownAlgorithm(name.to_string()))
    }
}

/// Tuning knobs shared by all algorithms. Each algorithm reads the ones it
/// needs; [`Algorithm::select`] checks them.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Parameters {
    /// Accepted relative gap between the best embedding found and the LP
    /// lower bound.
    pub epsilon: Option<f64>,
    /// Candidate paths per virtual link.
    pub k: Option<usize>,
    /// Candidate hosts kept per virtual node by the coordinated algorithms.
    pub candidates: usize,
    /// Node placements evaluated by the coordinated algorithms.
    pub max_placements: usize,
    /// Split fractions below this are dropped when rounding.
    pub strip_threshold: f64,
    /// Branch and bound nodes explored before giving up.
    pub max_iterations: usize,
    pub node_weight: f64,
    pub link_weight: f64,
}

impl Default for Parameters {
    fn default() -> Self {
        Self {
            epsilon: None,
            k: None,
            candidates: DEFAULT_CANDIDATES,
            max_placements: DEFAULT_MAX_PLACEMENTS,
            strip_threshold: DEFAULT_STRIP_THRESHOLD,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            node_weight: 1.0,
            link_weight: 1.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct CoordinatedConfig {
    pub k: usize,
    pub candidates: usize,
    pub max_placements: usize,
    pub strip_threshold: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct OptimalConfig {
    pub epsilon: f64,
    pub max_iterations: usize,
}

#[derive(Clone, Debug, PartialEq)]
pub struct StressConfig {
    pub node_weight: f64,
    pub link_weight: f64,
}

/// A configured embedding algorithm, created per run.
#[derive(Clone, Debug, PartialEq)]
pub enum Algorithm {
    /// First fit hosts and hop count shortest paths. A baseline.
    SimpleShortestPath,
    /// Backtracking; every virtual link needs a direct substrate link.
    ExactSubgraphIsomorphism,
    /// Backtracking; virtual links may use any of `k` substrate paths.
    AdvancedSubgraphIsomorphism { k: usize },
    /// Hosts with the most available resources, links on the least loaded
    /// paths.
    GreedyAvailable,
    /// As `GreedyAvailable`, splitting links over `k` paths when no single
    /// path has enough bandwidth.
    GreedyPathSplitting { k: usize },
    /// Enumerates node placements and maps links on each.
    Coordinated {
        variant: CoordinatedVariant,
        config: CoordinatedConfig,
    },
    /// LP based branch and bound within a `(1 + epsilon)` factor of optimal.
    OptimalMapping(OptimalConfig),
    /// Least stressed hosts.
    BasicVn(StressConfig),
    /// Least stressed hosts, counting the stress of their links.
    BasicVnLinkStress(StressConfig),
}

fn check(condition: bool, reason: &str) -> Result<(), Error> {
    if condition {
        Ok(())
    } else {
        Err(Error::InvalidParameter(reason.to_string()))
    }
}

impl Algorithm {
    /// Validates `parameters` for `kind`. Fails with `InvalidParameter`
    /// before any graph is looked at.
    pub fn select(kind: AlgorithmKind, parameters: &Parameters) -> Result<Self, Error> {
        if let Some(epsilon) = parameters.epsilon {
            check(epsilon.is_finite() && epsilon > 0.0, "epsilon must be positive")?;
        }
        if let Some(k) = parameters.k {
            check(k > 0, "k must be positive")?;
        }
        if kind.requires_epsilon() && parameters.epsilon.is_none() {
            return Err(Error::InvalidParameter(format!("{} requires epsilon", kind)));
        }
        if kind.requires_k() && parameters.k.is_none() {
            return Err(Error::InvalidParameter(format!("{} requires k", kind)));
        }
        let k = parameters.k.unwrap_or(DEFAULT_K);
        let coordinated = |variant| -> Result<Algorithm, Error> {
            check(parameters.candidates > 0, "candidates must be positive")?;
            check(parameters.max_placements > 0, "max_placements must be positive")?;
            check(
                (0.0..1.0).contains(&parameters.strip_threshold),
                "strip_threshold must be in [0, 1)",
            )?;
            Ok(Algorithm::Coordinated {
                variant,
                config: CoordinatedConfig {
                    k,
                    candidates: parameters.candidates,
                    max_placements: parameters.max_placements,
                    strip_threshold: parameters.strip_threshold,
                },
            })
        };
        let stress = || -> Result<StressConfig, Error> {
            check(
                parameters.node_weight.is_finite() && parameters.node_weight >= 0.0,
                "node_weight must be non negative",
            )?;
            check(
                parameters.link_weight.is_finite() && parameters.link_weight >= 0.0,
                "link_weight must be non negative",
            )?;
            Ok(StressConfig {
                node_weight: parameters.node_weight,
                link_weight: parameters.link_weight,
            })
        };

        let algorithm = match kind {
            AlgorithmKind::SimpleShortestPath => Self::SimpleShortestPath,
            AlgorithmKind::ExactSubgraphIsomorphism => Self::ExactSubgraphIsomorphism,
            AlgorithmKind::AdvancedSubgraphIsomorphism => Self::AdvancedSubgraphIsomorphism { k },
            AlgorithmKind::GreedyAvailable => Self::GreedyAvailable,
            AlgorithmKind::GreedyPathSplitting => Self::GreedyPathSplitting { k },
            AlgorithmKind::CoordinatedKPaths => coordinated(CoordinatedVariant::KPaths)?,
            AlgorithmKind::CoordinatedPathSplitting => {
                coordinated(CoordinatedVariant::PathSplitting)?
            }
            AlgorithmKind::CoordinatedRoundingStripping => {
                coordinated(CoordinatedVariant::RoundingStripping)?
            }
            AlgorithmKind::OptimalMapping => {
                check(parameters.max_iterations > 0, "max_iterations must be positive")?;
                Self::OptimalMapping(OptimalConfig {
                    epsilon: parameters.epsilon.unwrap_or_default(),
                    max_iterations: parameters.max_iterations,
                })
            }
            AlgorithmKind::BasicVn => Self::BasicVn(stress()?),
            AlgorithmKind::BasicVnLinkStress => Self::BasicVnLinkStress(stress()?),
        };
        Ok(algorithm)
    }

    pub fn kind(&self) -> AlgorithmKind {
        match self {
            Self::SimpleShortestPath => AlgorithmKind::SimpleShortestPath,
            Self::ExactSubgraphIsomorphism => AlgorithmKind::ExactSubgraphIsomorphism,
            Self::AdvancedSubgraphIsomorphism { .. } => AlgorithmKind::AdvancedSubgraphIsomorphism,
            Self::GreedyAvailable => AlgorithmKind::GreedyAvailable,
            Self::GreedyPathSplitting { .. } => AlgorithmKind::GreedyPathSplitting,
            Self::Coordinated { variant, .. } => match variant {
                CoordinatedVariant::KPaths => AlgorithmKind::CoordinatedKPaths,
                CoordinatedVariant::PathSplitting => AlgorithmKind::CoordinatedPathSplitting,
                CoordinatedVariant::RoundingStripping => {
                    AlgorithmKind::CoordinatedRoundingStripping
                }
            },
            Self::OptimalMapping(_) => AlgorithmKind::OptimalMapping,
            Self::BasicVn(_) => AlgorithmKind::BasicVn,
            Self::BasicVnLinkStress(_) => AlgorithmKind::BasicVnLinkStress,
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.kind())
    }
}

pub trait EmbedTrait {
    /// Computes a mapping of `request` against the current remaining
    /// capacities. Nothing is reserved; the caller commits the result.
    fn embed(
        &self,
        request: &VirtualNetwork,
        algorithm: &Algorithm,
        callbacks: OptionCallbacks,
    ) -> Result<Mapping, Error>;
}

impl EmbedTrait for SubstrateNetwork {
    fn embed(
        &self,
        request: &VirtualNetwork,
        algorithm: &Algorithm,
        callbacks: OptionCallbacks,
    ) -> Result<Mapping, Error> {
        if request.is_empty() {
            return Ok(Mapping::new());
        }
        if request.node_count() > self.node_count() {
            log::debug!(
                "request {} has more nodes than substrate {}",
                request.id(),
                self.id()
            );
            return Err(Error::NoEmbeddingFound);
        }
        match algorithm {
            Algorithm::SimpleShortestPath => simple::embed(self, request, callbacks),
            Algorithm::ExactSubgraphIsomorphism => {
                isomorphism::embed(self, request, None, callbacks)
            }
            Algorithm::AdvancedSubgraphIsomorphism { k } => {
                isomorphism::embed(self, request, Some(*k), callbacks)
            }
            Algorithm::GreedyAvailable => greedy::embed(self, request, None, callbacks),
            Algorithm::GreedyPathSplitting { k } => {
                greedy::embed(self, request, Some(*k), callbacks)
            }
            Algorithm::Coordinated { variant, config } => {
                coordinated::embed(self, request, *variant, config, callbacks)
            }
            Algorithm::OptimalMapping(config) => optimal::embed(self, request, config, callbacks),
            Algorithm::BasicVn(config) => basic_vn::embed(self, request, config, false, callbacks),
            Algorithm::BasicVnLinkStress(config) => {
                basic_vn::embed(self, request, config, true, callbacks)
            }
        }
    }
}

/// Routes every virtual link, in index order, on the cheapest path under
/// `weight(residual, link, bandwidth)`, reserving bandwidth as it goes.
/// `weight` returns `None` for links that cannot carry the bandwidth.
fn route_unsplit<W>(
    substrate: &SubstrateNetwork,
    request: &VirtualNetwork,
    residual: &mut Residual,
    mapping: &mut Mapping,
    weight: W,
    callbacks: OptionCallbacks,
) -> Result<(), Error>
where
    W: Fn(&Residual, EdgeIndex, f64) -> Option<f64>,
{
    for link in request.iter_links() {
        callbacks.check_cancelled()?;
        let (src, dst) = endpoint_hosts(request, mapping, link)?;
        let bandwidth = request.get_link(link).bandwidth();
        let path = {
            let view: &Residual = residual;
            shortest_path(substrate, src, dst, |e| weight(view, e, bandwidth))
        };
        match path {
            Some(path) => {
                log::trace!("virtual link {} on {:?}", link.index(), path.links());
                residual.reserve_path(&path, bandwidth);
                mapping.route(link, LinkRoute::single(path));
            }
            None => return Err(Error::NoPathFound { link, src, dst }),
        }
    }
    Ok(())
}

/// Hosts of the endpoints of a virtual link.
fn endpoint_hosts(
    request: &VirtualNetwork,
    mapping: &Mapping,
    link: EdgeIndex,
) -> Result<(NodeIndex, NodeIndex), Error> {
    let (src, dst) = request.get_link_endpoints(link);
    match (mapping.host(src), mapping.host(dst)) {
        (Some(src), Some(dst)) => Ok((src, dst)),
        _ => Err(Error::NoEmbeddingFound),
    }
}

/// Hop count over links with enough bandwidth.
fn feasible_hops(residual: &Residual, link: EdgeIndex, bandwidth: f64) -> Option<f64> {
    if residual.link_fits(link, bandwidth) {
        Some(1.0)
    } else {
        None
    }
}

/// Hop count over links with any bandwidth left.
fn residual_hops(residual: &Residual, link: EdgeIndex) -> Option<f64> {
    if residual.link_remaining(link) > TOLERANCE {
        Some(1.0)
    } else {
        None
    }
}

/// Substrate nodes that could host `node` on their own, in index order.
fn fitting_hosts(
    substrate: &SubstrateNetwork,
    residual: &Residual,
    request: &VirtualNetwork,
    node: NodeIndex,
) -> Vec<NodeIndex> {
    let demand = request.get_node(node).demand();
    substrate
        .iter_nodes()
        .filter(|host| residual.node_fits(*host, demand))
        .collect()
}

/// Fails fast when some virtual node cannot be hosted anywhere.
fn ensure_hostable(
    substrate: &SubstrateNetwork,
    residual: &Residual,
    request: &VirtualNetwork,
) -> Result<(), Error> {
    for node in request.iter_nodes() {
        if fitting_hosts(substrate, residual, request, node).is_empty() {
            log::debug!(
                "virtual node {} ({}) fits on no substrate node",
                node.index(),
                request.get_node(node).name()
            );
            return Err(Error::NoEmbeddingFound);
        }
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::callbacks::ExecutionCallbacks;
    use crate::validator::validate;
    use crate::{SubstrateLink, SubstrateNode, VirtualLink, VirtualNode};

    /// Triangle A, B, C with 10 cpu per node and 10 bandwidth per link.
    pub(crate) fn triangle() -> SubstrateNetwork {
        let mut substrate = SubstrateNetwork::new();
        let a = substrate.add_node(SubstrateNode::new("A", 10.0));
        let b = substrate.add_node(SubstrateNode::new("B", 10.0));
        let c = substrate.add_node(SubstrateNode::new("C", 10.0));
        substrate.link(a, b, SubstrateLink::new(10.0));
        substrate.link(b, c, SubstrateLink::new(10.0));
        substrate.link(a, c, SubstrateLink::new(10.0));
        substrate
    }

    /// Two virtual nodes of `cpu` joined by a link of `bandwidth`.
    pub(crate) fn pair(cpu: f64, bandwidth: f64) -> VirtualNetwork {
        let mut request = VirtualNetwork::new();
        let x = request.add_node(VirtualNode::new("x", cpu));
        let y = request.add_node(VirtualNode::new("y", cpu));
        request.link(x, y, VirtualLink::new(bandwidth));
        request
    }

    pub(crate) fn all_parameters() -> Parameters {
        Parameters {
            epsilon: Some(0.1),
            k: Some(3),
            ..Default::default()
        }
    }

    pub(crate) fn embed_with(
        substrate: &SubstrateNetwork,
        request: &VirtualNetwork,
        kind: AlgorithmKind,
    ) -> Result<Mapping, Error> {
        let algorithm = Algorithm::select(kind, &all_parameters()).unwrap();
        substrate.embed(request, &algorithm, &mut ExecutionCallbacks::default())
    }

    #[test]
    fn test_parse_kind() {
        for kind in AlgorithmKind::ALL.iter() {
            assert_eq!(kind.name().parse::<AlgorithmKind>(), Ok(*kind));
        }
        assert_eq!(
            "greedyavailable".parse::<AlgorithmKind>(),
            Ok(AlgorithmKind::GreedyAvailable)
        );
        assert_eq!(
            "Dijkstra".parse::<AlgorithmKind>(),
            Err(Error::UnknownAlgorithm("Dijkstra".to_string()))
        );
    }

    #[test]
    fn test_select_requires_parameters() {
        let defaults = Parameters::default();
        assert!(matches!(
            Algorithm::select(AlgorithmKind::OptimalMapping, &defaults),
            Err(Error::InvalidParameter(_))
        ));
        for kind in [
            AlgorithmKind::GreedyPathSplitting,
            AlgorithmKind::CoordinatedKPaths,
            AlgorithmKind::CoordinatedPathSplitting,
            AlgorithmKind::CoordinatedRoundingStripping,
        ]
        .iter()
        {
            assert!(matches!(
                Algorithm::select(*kind, &defaults),
                Err(Error::InvalidParameter(_))
            ));
        }
        assert_eq!(
            Algorithm::select(AlgorithmKind::GreedyAvailable, &defaults),
            Ok(Algorithm::GreedyAvailable)
        );
    }

    #[test]
    fn test_select_rejects_bad_values() {
        let bad = [
            Parameters {
                epsilon: Some(0.0),
                ..all_parameters()
            },
            Parameters {
                epsilon: Some(-1.0),
                ..all_parameters()
            },
            Parameters {
                epsilon: Some(f64::NAN),
                ..all_parameters()
            },
            Parameters {
                k: Some(0),
                ..all_parameters()
            },
        ];
        for parameters in bad.iter() {
            for kind in AlgorithmKind::ALL.iter() {
                assert!(
                    matches!(
                        Algorithm::select(*kind, parameters),
                        Err(Error::InvalidParameter(_))
                    ),
                    "{} accepted {:?}",
                    kind,
                    parameters
                );
            }
        }
        assert!(Algorithm::select(
            AlgorithmKind::CoordinatedRoundingStripping,
            &Parameters {
                strip_threshold: 1.0,
                ..all_parameters()
            }
        )
        .is_err());
        assert!(Algorithm::select(
            AlgorithmKind::BasicVn,
            &Parameters {
                node_weight: -1.0,
                ..all_parameters()
            }
        )
        .is_err());
    }

    #[test]
    fn test_kind_round_trip() {
        for kind in AlgorithmKind::ALL.iter() {
            let algorithm = Algorithm::select(*kind, &all_parameters()).unwrap();
            assert_eq!(algorithm.kind(), *kind);
            assert_eq!(format!("{}", algorithm), kind.name());
        }
    }

    #[test]
    fn test_every_algorithm_embeds_the_triangle_pair() {
        let _logger = env_logger::builder().is_test(true).try_init();
        let substrate = triangle();
        let request = pair(5.0, 4.0);
        for kind in AlgorithmKind::ALL.iter() {
            let mapping = embed_with(&substrate, &request, *kind)
                .unwrap_or_else(|e| panic!("{} failed: {}", kind, e));
            let usage = validate(&substrate, &request, &mapping)
                .unwrap_or_else(|v| panic!("{} produced an invalid mapping: {}", kind, v));
            assert_eq!(usage.nodes().count(), 2, "{}", kind);
        }
    }

    #[test]
    fn test_oversized_node_fails_everywhere() {
        let substrate = triangle();
        let mut request = VirtualNetwork::new();
        request.add_node(VirtualNode::new("big", 15.0));
        for kind in AlgorithmKind::ALL.iter() {
            assert_eq!(
                embed_with(&substrate, &request, *kind),
                Err(Error::NoEmbeddingFound),
                "{}",
                kind
            );
        }
    }

    #[test]
    fn test_more_virtual_than_substrate_nodes() {
        let substrate = triangle();
        let mut request = VirtualNetwork::new();
        for n in 0..4 {
            request.add_node(VirtualNode::new(&format!("v{}", n), 1.0));
        }
        assert_eq!(
            embed_with(&substrate, &request, AlgorithmKind::GreedyAvailable),
            Err(Error::NoEmbeddingFound)
        );
    }

    #[test]
    fn test_empty_request() {
        let substrate = triangle();
        let request = VirtualNetwork::new();
        assert_eq!(
            embed_with(&substrate, &request, AlgorithmKind::OptimalMapping),
            Ok(Mapping::new())
        );
    }

    #[test]
    fn test_embedding_is_deterministic() {
        let substrate = crate::substrate::random(
            8,
            0.6,
            0.5,
            3,
            &crate::NodeConfiguration::default(),
            &crate::LinkConfiguration::new(20.0),
        );
        let mut request = VirtualNetwork::new();
        let a = request.add_node(VirtualNode::new("a", 30.0));
        let b = request.add_node(VirtualNode::new("b", 20.0));
        let c = request.add_node(VirtualNode::new("c", 10.0));
        request.link(a, b, VirtualLink::new(5.0));
        request.link(b, c, VirtualLink::new(5.0));
        request.link(c, a, VirtualLink::new(5.0));
        for kind in AlgorithmKind::ALL.iter() {
            let first = embed_with(&substrate, &request, *kind);
            let second = embed_with(&substrate, &request, *kind);
            assert_eq!(first, second, "{}", kind);
        }
    }
}
