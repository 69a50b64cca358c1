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


//! Hooks a caller passes into a run: progress observation and cancellation.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::algorithms::AlgorithmKind;
use crate::error::Error;
use crate::stack::RequestId;

/// Shared flag to stop a running search. Clones observe the same flag.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Events reported while a run progresses.
#[derive(Clone, Debug, PartialEq)]
pub enum Progress {
    RequestStarted {
        request: RequestId,
        algorithm: AlgorithmKind,
    },
    RequestEmbedded {
        request: RequestId,
        cost: f64,
    },
    /// Backtracking reached `depth` assigned virtual nodes; `explored` counts
    /// the partial assignments tried so far.
    SearchDepth { depth: usize, explored: usize },
    /// Simplex pivots performed by the current LP solve.
    LpIterations { iterations: usize },
    /// Placements evaluated out of the enumerated candidates.
    PlacementCandidates { evaluated: usize, total: usize },
    /// Branch and bound status.
    BranchAndBound {
        explored: usize,
        lower_bound: f64,
        incumbent: Option<f64>,
    },
}

type Observer = Box<dyn FnMut(Progress) + Send>;

#[derive(Default)]
pub struct ExecutionCallbacks {
    observer: Option<Observer>,
    cancellation: CancellationToken,
}

impl ExecutionCallbacks {
    pub fn with_observer<F>(observer: F) -> Self
    where
        F: FnMut(Progress) + Send + 'static,
    {
        Self {
            observer: Some(Box::new(observer)),
            ..Default::default()
        }
    }

    pub fn set_cancellation(&mut self, token: CancellationToken) {
        self.cancellation = token;
    }

    pub fn cancellation(&self) -> CancellationToken {
        self.cancellation.clone()
    }

    /// Forwards `event` to the observer, if there is one.
    pub fn progress(&mut self, event: Progress) {
        if let Some(observer) = self.observer.as_mut() {
            observer(event);
        }
    }

    pub fn check_cancelled(&self) -> Result<(), Error> {
        if self.cancellation.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }
}

impl fmt::Debug for ExecutionCallbacks {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("ExecutionCallbacks")
            .field("observer", &self.observer.is_some())
            .field("cancelled", &self.cancellation.is_cancelled())
            .finish()
    }
}

pub type OptionCallbacks<'a> = &'a mut ExecutionCallbacks;
