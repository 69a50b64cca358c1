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


//! Running an algorithm over all requests of a stack.

use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use crate::algorithms::{Algorithm, AlgorithmKind, EmbedTrait};
use crate::callbacks::{ExecutionCallbacks, OptionCallbacks, Progress};
use crate::error::Error;
use crate::mapping::ResourceUsage;
use crate::stack::{NetworkStack, RequestId};

/// Where a run stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    /// Before any request was looked at.
    Start,
    /// While the algorithm searched for a mapping.
    Embed,
    /// While validating and reserving a found mapping.
    Commit,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            Self::Start => "start",
            Self::Embed => "embed",
            Self::Commit => "commit",
        };
        write!(f, "{}", name)
    }
}

/// A failed run. All mappings the run had committed are gone again.
#[derive(Clone, Debug, PartialEq)]
pub struct EmbeddingFailure {
    pub request: Option<RequestId>,
    pub algorithm: AlgorithmKind,
    pub stage: Stage,
    pub error: Error,
}

impl fmt::Display for EmbeddingFailure {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.request {
            Some(request) => write!(
                f,
                "{} failed on {} at {}: {}",
                self.algorithm, request, self.stage, self.error
            ),
            None => write!(f, "{} failed at {}: {}", self.algorithm, self.stage, self.error),
        }
    }
}

impl std::error::Error for EmbeddingFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

/// A successful run.
#[derive(Clone, Debug, PartialEq)]
pub struct EmbeddingReport {
    pub algorithm: AlgorithmKind,
    pub started: DateTime<Utc>,
    pub finished: DateTime<Utc>,
    /// Cost of each committed mapping, in request order.
    pub costs: Vec<(RequestId, f64)>,
    /// Resources held by all committed mappings.
    pub usage: ResourceUsage,
}

impl EmbeddingReport {
    pub fn total_cost(&self) -> f64 {
        self.costs.iter().map(|(_, cost)| cost).sum()
    }

    pub fn elapsed(&self) -> chrono::Duration {
        self.finished - self.started
    }
}

/// Embeds every request of `stack` in submission order with `algorithm`.
///
/// Args:
///   - algorithm: a configured algorithm, see [`Algorithm::select`].
///   - stack: must not hold mappings; on success it holds one per request.
///   - callbacks: progress observer and cancellation.
///
/// Either every request is committed or, on the first failure, every commit
/// made by this run is rolled back and the substrate is left as it was.
pub fn execute(
    algorithm: &Algorithm,
    stack: &mut NetworkStack,
    callbacks: OptionCallbacks,
) -> Result<EmbeddingReport, EmbeddingFailure> {
    let kind = algorithm.kind();
    let fail = |request, stage, error| EmbeddingFailure {
        request,
        algorithm: kind,
        stage,
        error,
    };
    if stack.has_mappings() {
        return Err(fail(None, Stage::Start, Error::AlreadyMapped));
    }
    let started = Utc::now();
    log::info!(
        "{}: embedding {} requests on substrate {}",
        algorithm,
        stack.request_count(),
        stack.substrate().id()
    );

    let mut costs = Vec::new();
    for id in stack.request_ids() {
        callbacks.progress(Progress::RequestStarted {
            request: id,
            algorithm: kind,
        });
        let found = stack
            .request(id)
            .and_then(|request| stack.substrate().embed(request, algorithm, callbacks));
        let mapping = match found {
            Ok(mapping) => mapping,
            Err(error) => return Err(rollback(stack, fail(Some(id), Stage::Embed, error))),
        };
        let cost = match stack.request(id) {
            Ok(request) => mapping.cost(request),
            Err(error) => return Err(rollback(stack, fail(Some(id), Stage::Commit, error))),
        };
        if let Err(error) = stack.commit(id, mapping) {
            log::error!("{} produced an unusable mapping for {}: {}", algorithm, id, error);
            return Err(rollback(stack, fail(Some(id), Stage::Commit, error)));
        }
        log::debug!("{} embedded at cost {}", id, cost);
        callbacks.progress(Progress::RequestEmbedded { request: id, cost });
        costs.push((id, cost));
    }

    let report = EmbeddingReport {
        algorithm: kind,
        started,
        finished: Utc::now(),
        costs,
        usage: stack.usage(),
    };
    log::info!(
        "{}: embedded {} requests, total cost {}",
        algorithm,
        report.costs.len(),
        report.total_cost()
    );
    Ok(report)
}

fn rollback(stack: &mut NetworkStack, failure: EmbeddingFailure) -> EmbeddingFailure {
    log::warn!("{}; rolling back", failure);
    stack.clear_mappings();
    failure
}

/// Runs [`execute`] on a worker thread. The stack stays locked for the whole
/// run; cancel it through the token of `callbacks`.
pub fn spawn_execute(
    algorithm: Algorithm,
    stack: Arc<Mutex<NetworkStack>>,
    mut callbacks: ExecutionCallbacks,
) -> JoinHandle<Result<EmbeddingReport, EmbeddingFailure>> {
    thread::spawn(move || {
        let mut stack = stack.lock().unwrap_or_else(PoisonError::into_inner);
        execute(&algorithm, &mut stack, &mut callbacks)
    })
}
