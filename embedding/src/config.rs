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


use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::algorithms::{Algorithm, AlgorithmKind, Parameters};
use crate::error::Error;
use crate::specs::{check_amount, DEFAULT_RESOURCE};
use crate::substrate::{SubstrateLink, SubstrateNode};

/// Default amount of the default resource offered by generated substrate nodes.
pub const NODE_CAPACITY: f64 = 100.0;

/// Default bandwidth of generated substrate links.
pub const LINK_BANDWIDTH: f64 = 100.0;

/// Provisioning of a substrate node.
///
/// constructed programmatically or read from a config file.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct NodeConfiguration {
    pub resources: BTreeMap<String, f64>,
}

impl NodeConfiguration {
    pub fn with_cpu(cpu: f64) -> Self {
        let mut resources = BTreeMap::new();
        resources.insert(DEFAULT_RESOURCE.to_string(), cpu);
        Self { resources }
    }

    pub fn add_resource(&mut self, kind: &str, amount: f64) {
        self.resources.insert(kind.to_string(), amount);
    }
}

impl Default for NodeConfiguration {
    fn default() -> Self {
        Self::with_cpu(NODE_CAPACITY)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct LinkConfiguration {
    pub bandwidth: f64,
}

impl LinkConfiguration {
    pub fn new(bandwidth: f64) -> Self {
        Self { bandwidth }
    }
}

impl Default for LinkConfiguration {
    fn default() -> Self {
        Self {
            bandwidth: LINK_BANDWIDTH,
        }
    }
}

impl SubstrateNode {
    pub fn from_config(name: &str, config: &NodeConfiguration) -> Self {
        let resources = config
            .resources
            .iter()
            .map(|(kind, amount)| (kind.as_str(), *amount))
            .collect::<Vec<_>>();
        Self::with_resources(name, &resources)
    }
}

impl SubstrateLink {
    pub fn from_config(config: &LinkConfiguration) -> Self {
        Self::new(config.bandwidth)
    }
}

/// Everything needed to run one embedding: which algorithm with which
/// parameters, plus provisioning defaults for generated substrates.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct RunConfiguration {
    pub algorithm: AlgorithmKind,
    #[serde(default)]
    pub parameters: Parameters,
    #[serde(default)]
    pub node: NodeConfiguration,
    #[serde(default)]
    pub link: LinkConfiguration,
}

impl RunConfiguration {
    pub fn from_file(file_name: &str) -> Result<Self, Error> {
        let file = File::open(Path::new(file_name))
            .map_err(|e| Error::Config(format!("file {}: {}", file_name, e)))?;
        let reader = BufReader::new(file);
        let config: Self = serde_yaml::from_reader(reader)?;
        config.check_amounts()
    }

    pub fn from_str(config: &str) -> Result<Self, Error> {
        let config: Self = serde_yaml::from_str(config)?;
        config.check_amounts()
    }

    fn check_amounts(self) -> Result<Self, Error> {
        let amounts = self
            .node
            .resources
            .iter()
            .map(|(kind, amount)| (kind.as_str(), *amount))
            .chain(std::iter::once(("bandwidth", self.link.bandwidth)));
        for (what, amount) in amounts {
            if check_amount(what, amount).is_err() {
                return Err(Error::Config(format!("{} must be a finite, non negative amount", what)));
            }
        }
        Ok(self)
    }

    /// Validates the parameters against the chosen algorithm.
    pub fn algorithm(&self) -> Result<Algorithm, Error> {
        Algorithm::select(self.algorithm, &self.parameters)
    }
}
