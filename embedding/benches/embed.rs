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


use bencher::Bencher;
use bencher::{benchmark_group, benchmark_main};
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;

use embedding::*;

const SEED: u64 = 0x5eed;

/// Rings of `size` virtual nodes with random demands.
fn requests(count: usize, size: usize) -> Vec<VirtualNetwork> {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(SEED);
    (0..count)
        .map(|_| {
            let mut request = VirtualNetwork::new();
            let nodes = (0..size)
                .map(|i| {
                    let name = format!("v{}", i);
                    request.add_node(VirtualNode::new(&name, rng.gen_range(1.0..10.0)))
                })
                .collect::<Vec<_>>();
            for i in 0..size {
                request.link(
                    nodes[i],
                    nodes[(i + 1) % size],
                    VirtualLink::new(rng.gen_range(1.0..10.0)),
                );
            }
            request
        })
        .collect()
}

fn run(bench: &mut Bencher, kind: AlgorithmKind, substrate_nodes: usize, request_count: usize) {
    let substrate = random(
        substrate_nodes,
        0.5,
        0.4,
        SEED,
        &NodeConfiguration::default(),
        &LinkConfiguration::default(),
    );
    let requests = requests(request_count, 4);
    let algorithm = Algorithm::select(
        kind,
        &Parameters {
            epsilon: Some(0.1),
            k: Some(DEFAULT_K),
            ..Default::default()
        },
    )
    .expect("Bad parameters");
    bench.iter(|| {
        let mut stack = NetworkStack::new(substrate.clone());
        for request in requests.iter() {
            stack.add_request(request.clone());
        }
        execute(&algorithm, &mut stack, &mut ExecutionCallbacks::default())
            .expect("Failed embedding");
    });
}

fn simple(bench: &mut Bencher) {
    run(bench, AlgorithmKind::SimpleShortestPath, 30, 10);
}

fn greedy(bench: &mut Bencher) {
    run(bench, AlgorithmKind::GreedyAvailable, 30, 10);
}

fn greedy_splitting(bench: &mut Bencher) {
    run(bench, AlgorithmKind::GreedyPathSplitting, 30, 10);
}

fn coordinated(bench: &mut Bencher) {
    run(bench, AlgorithmKind::CoordinatedKPaths, 20, 4);
}

fn optimal(bench: &mut Bencher) {
    run(bench, AlgorithmKind::OptimalMapping, 8, 1);
}

benchmark_group!(benches, simple, greedy, greedy_splitting, coordinated, optimal);
benchmark_main!(benches);
