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


//! A substrate with the requests submitted against it and their mappings.

use std::fmt;

use crate::error::Error;
use crate::mapping::{Mapping, ResourceUsage};
use crate::request::VirtualNetwork;
use crate::substrate::{Residual, SubstrateNetwork};
use crate::validator::{validate_structure, Violation};

/// Position of a request in its stack, in submission order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(usize);

impl RequestId {
    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "vnr_{}", self.0)
    }
}

#[derive(Clone, Debug)]
struct Entry {
    request: VirtualNetwork,
    mapping: Option<Mapping>,
    usage: ResourceUsage,
}

/// One substrate, the ordered virtual network requests and the mappings
/// committed for them.
///
/// The substrate's remaining capacities only change through [`commit`],
/// [`release`] and [`clear_mappings`].
///
/// [`commit`]: NetworkStack::commit
/// [`release`]: NetworkStack::release
/// [`clear_mappings`]: NetworkStack::clear_mappings
#[derive(Clone, Debug)]
pub struct NetworkStack {
    substrate: SubstrateNetwork,
    entries: Vec<Entry>,
    // remaining capacities before the first commit since the last clear
    baseline: Option<Residual>,
}

impl NetworkStack {
    pub fn new(substrate: SubstrateNetwork) -> Self {
        Self {
            substrate,
            entries: Vec::new(),
            baseline: None,
        }
    }

    pub fn substrate(&self) -> &SubstrateNetwork {
        &self.substrate
    }

    /// Submits a request. It cannot be modified afterwards.
    pub fn add_request(&mut self, request: VirtualNetwork) -> RequestId {
        self.entries.push(Entry {
            request,
            mapping: None,
            usage: ResourceUsage::default(),
        });
        RequestId(self.entries.len() - 1)
    }

    pub fn request_count(&self) -> usize {
        self.entries.len()
    }

    pub fn request_ids(&self) -> Vec<RequestId> {
        (0..self.entries.len()).map(RequestId).collect()
    }

    pub fn requests(&self) -> impl Iterator<Item = (RequestId, &VirtualNetwork)> {
        self.entries
            .iter()
            .enumerate()
            .map(|(i, entry)| (RequestId(i), &entry.request))
    }

    pub fn request(&self, id: RequestId) -> Result<&VirtualNetwork, Error> {
        self.entry(id).map(|entry| &entry.request)
    }

    pub fn mapping(&self, id: RequestId) -> Option<&Mapping> {
        self.entries.get(id.0).and_then(|entry| entry.mapping.as_ref())
    }

    fn entry(&self, id: RequestId) -> Result<&Entry, Error> {
        self.entries.get(id.0).ok_or(Error::UnknownRequest(id))
    }

    pub fn has_mappings(&self) -> bool {
        self.entries.iter().any(|entry| entry.mapping.is_some())
    }

    /// Total usage of all committed mappings.
    pub fn usage(&self) -> ResourceUsage {
        let mut usage = ResourceUsage::default();
        for entry in self.entries.iter() {
            usage.merge(&entry.usage);
        }
        usage
    }

    /// Validates `mapping` for request `id` and, if every node and link fits,
    /// reserves its resources on the substrate. On failure nothing changes.
    pub fn commit(&mut self, id: RequestId, mapping: Mapping) -> Result<ResourceUsage, Error> {
        let entry = self.entry(id)?;
        if entry.mapping.is_some() {
            return Err(Error::AlreadyMapped);
        }
        validate_structure(&self.substrate, &entry.request, &mapping)
            .map_err(Error::InvalidMapping)?;
        let usage = mapping.usage(&entry.request);
        self.substrate.check_usage(&usage)?;

        if self.baseline.is_none() {
            self.baseline = Some(self.substrate.residual());
        }
        self.substrate.apply_usage(&usage)?;
        log::debug!(
            "committed {} on substrate {}: {} nodes, {} links",
            id,
            self.substrate.id(),
            mapping.nodes().count(),
            mapping.links().count()
        );
        let entry = &mut self.entries[id.0];
        entry.mapping = Some(mapping);
        entry.usage = usage.clone();
        Ok(usage)
    }

    /// Removes the mapping of one request and returns its resources.
    pub fn release(&mut self, id: RequestId) -> Result<(), Error> {
        self.entry(id)?;
        let entry = &mut self.entries[id.0];
        if entry.mapping.take().is_none() {
            return Ok(());
        }
        let usage = std::mem::take(&mut entry.usage);
        self.substrate.return_usage(&usage);
        if !self.has_mappings() {
            // restore exact values, avoiding accumulated rounding
            self.restore_baseline();
        }
        log::debug!("released {}", id);
        Ok(())
    }

    /// Drops every mapping and restores the remaining capacities held before
    /// the first commit. Calling it again has no effect.
    pub fn clear_mappings(&mut self) {
        for entry in self.entries.iter_mut() {
            entry.mapping = None;
            entry.usage = ResourceUsage::default();
        }
        self.restore_baseline();
    }

    fn restore_baseline(&mut self) {
        if let Some(baseline) = self.baseline.take() {
            self.substrate.restore(&baseline);
        }
    }

    /// The violation `mapping` would cause if committed now, if any.
    pub fn check(&self, id: RequestId, mapping: &Mapping) -> Result<Option<Violation>, Error> {
        let entry = self.entry(id)?;
        Ok(
            crate::validator::validate(&self.substrate, &entry.request, mapping)
                .err(),
        )
    }
}
