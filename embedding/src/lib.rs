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


//! Virtual network embedding: mapping virtual network requests onto a
//! substrate network with finite node and link capacities.

mod algorithms;
mod callbacks;
mod config;
mod error;
mod execute;
pub mod lp;
mod mapping;
mod path;
mod request;
pub mod specs;
mod stack;
mod substrate;
mod validator;

pub use crate::algorithms::{
    Algorithm, AlgorithmKind, CoordinatedConfig, CoordinatedVariant, EmbedTrait, OptimalConfig,
    Parameters, StressConfig,
};
pub use crate::algorithms::{
    DEFAULT_CANDIDATES, DEFAULT_K, DEFAULT_MAX_ITERATIONS, DEFAULT_MAX_PLACEMENTS,
    DEFAULT_STRIP_THRESHOLD,
};
pub use crate::callbacks::{CancellationToken, ExecutionCallbacks, OptionCallbacks, Progress};
pub use crate::config::{LinkConfiguration, NodeConfiguration, RunConfiguration};
pub use crate::error::Error;
pub use crate::execute::{execute, spawn_execute, EmbeddingFailure, EmbeddingReport, Stage};
pub use crate::mapping::{LinkRoute, Mapping, PathFlow, ResourceUsage, FRACTION_TOLERANCE};
pub use crate::path::{hop_count, k_shortest_paths, shortest_path, Path};
pub use crate::request::{VirtualLink, VirtualNetwork, VirtualNode};
pub use crate::specs::{GraphId, LinkSpec, NodeSpec, ResourceGraph, DEFAULT_RESOURCE, TOLERANCE};
pub use crate::stack::{NetworkStack, RequestId};
pub use crate::substrate::{fully_connected, line, mesh, random, star};
pub use crate::substrate::{Capacity, Residual, SubstrateLink, SubstrateNetwork, SubstrateNode};
pub use crate::validator::{validate, validate_against, validate_structure, Violation};
pub use petgraph::graph::{EdgeIndex, NodeIndex};
