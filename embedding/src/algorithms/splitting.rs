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

use super::residual_hops;
use crate::error::Error;
use crate::mapping::{LinkRoute, PathFlow};
use crate::path::k_shortest_paths;
use crate::specs::TOLERANCE;
use crate::substrate::{Residual, SubstrateNetwork};

/// Spreads `bandwidth` from `src` to `dst` over the `k` shortest paths with
/// bandwidth left.
///
/// Each path first gets a share proportional to its bottleneck; what shared
/// links prevented is then filled path by path. The reserved bandwidth is
/// taken from `residual` only on success.
pub(super) fn split(
    substrate: &SubstrateNetwork,
    residual: &mut Residual,
    link: EdgeIndex,
    src: NodeIndex,
    dst: NodeIndex,
    bandwidth: f64,
    k: usize,
) -> Result<LinkRoute, Error> {
    let paths = {
        let view: &Residual = residual;
        k_shortest_paths(substrate, src, dst, k, |e| residual_hops(view, e))
    };
    let insufficient = |routed: f64| Error::InsufficientBandwidth {
        link,
        demand: bandwidth,
        routed,
    };
    if paths.is_empty() {
        return Err(insufficient(0.0));
    }

    let mut local = residual.clone();
    let bottlenecks = paths.iter().map(|p| local.bottleneck(p)).collect::<Vec<_>>();
    let total: f64 = bottlenecks.iter().sum();
    let mut amounts = vec![0.0; paths.len()];

    for (i, path) in paths.iter().enumerate() {
        let share = bandwidth * bottlenecks[i] / total;
        let amount = share.min(local.bottleneck(path)).max(0.0);
        local.reserve_path(path, amount);
        amounts[i] = amount;
    }
    let mut missing = bandwidth - amounts.iter().sum::<f64>();
    for (i, path) in paths.iter().enumerate() {
        if missing <= TOLERANCE {
            break;
        }
        let extra = missing.min(local.bottleneck(path)).max(0.0);
        local.reserve_path(path, extra);
        amounts[i] += extra;
        missing -= extra;
    }
    if missing > TOLERANCE {
        log::debug!(
            "virtual link {}: {} of {} routed over {} paths",
            link.index(),
            bandwidth - missing,
            bandwidth,
            paths.len()
        );
        return Err(insufficient(bandwidth - missing));
    }

    let mut flows = paths
        .into_iter()
        .zip(amounts.into_iter())
        .filter(|(_, amount)| *amount > 0.0)
        .map(|(path, amount)| PathFlow {
            path,
            fraction: amount / bandwidth,
        })
        .collect::<Vec<_>>();
    if let Some((last, others)) = flows.split_last_mut() {
        last.fraction = 1.0 - others.iter().map(|flow| flow.fraction).sum::<f64>();
    }
    *residual = local;
    Ok(LinkRoute::split(flows))
}
