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
use std::fmt;

use crate::stack::RequestId;
use crate::validator::Violation;

#[derive(Clone, Debug, PartialEq)]
pub enum Error {
    /// Bad algorithm configuration, reported before any graph work.
    InvalidParameter(String),
    /// An algorithm was started while the stack still holds mappings.
    AlreadyMapped,
    /// A commit would drive a node or link below zero remaining capacity.
    CapacityExceeded(Violation),
    /// A mapping is structurally broken (unmapped elements, broken paths, ...).
    InvalidMapping(Violation),
    /// No substrate path with enough bandwidth between the hosts of a virtual link.
    NoPathFound {
        link: EdgeIndex,
        src: NodeIndex,
        dst: NodeIndex,
    },
    /// Splitting over all candidate paths still leaves part of the demand unserved.
    InsufficientBandwidth {
        link: EdgeIndex,
        demand: f64,
        routed: f64,
    },
    NoEmbeddingFound,
    /// The LP relaxation has no feasible point.
    Infeasible,
    /// Branching did not close the gap to `epsilon` within the iteration budget.
    ApproximationExceeded { gap: f64, epsilon: f64 },
    Cancelled,
    InvalidPath,
    UnknownRequest(RequestId),
    UnknownAlgorithm(String),
    Config(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::InvalidParameter(reason) => write!(f, "ERROR: Invalid parameter: {}", reason),
            Self::AlreadyMapped => write!(
                f,
                "ERROR: The network stack already has mappings, clear them first"
            ),
            Self::CapacityExceeded(violation) => {
                write!(f, "ERROR: Capacity exceeded: {}", violation)
            }
            Self::InvalidMapping(violation) => write!(f, "ERROR: Invalid mapping: {}", violation),
            Self::NoPathFound { link, src, dst } => write!(
                f,
                "ERROR: No path for virtual link {} between substrate nodes {} and {}",
                link.index(),
                src.index(),
                dst.index()
            ),
            Self::InsufficientBandwidth {
                link,
                demand,
                routed,
            } => write!(
                f,
                "ERROR: Virtual link {} demands {} but only {} could be routed",
                link.index(),
                demand,
                routed
            ),
            Self::NoEmbeddingFound => write!(f, "ERROR: No feasible embedding found"),
            Self::Infeasible => write!(f, "ERROR: The LP relaxation has no feasible solution"),
            Self::ApproximationExceeded { gap, epsilon } => write!(
                f,
                "ERROR: Approximation gap {:.6} exceeds epsilon {}",
                gap, epsilon
            ),
            Self::Cancelled => write!(f, "ERROR: Cancelled"),
            Self::InvalidPath => write!(
                f,
                "ERROR: Invalid path: links must be consecutive and visit each node once"
            ),
            Self::UnknownRequest(request) => write!(f, "ERROR: Unknown request {}", request),
            Self::UnknownAlgorithm(name) => write!(f, "ERROR: Unknown algorithm '{}'", name),
            Self::Config(reason) => write!(f, "ERROR: Bad configuration: {}", reason),
        }
    }
}

impl std::error::Error for Error {}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Config(err.to_string())
    }
}
