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


//! End to end embedding scenarios: every algorithm on a shared triangle
//! substrate, plus randomised workloads checking capacity safety.
use embedding::*;
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;

const RUN_CONFIG: &str = "---
algorithm: GreedyPathSplitting
parameters:
  k: 3
  epsilon: 0.1
node:
  resources:
    cpu: 100
    memory: 16
link:
  bandwidth: 50
";

/// Triangle A, B, C with 10 cpu per node and 10 bandwidth per link.
fn triangle() -> SubstrateNetwork {
    let mut substrate = SubstrateNetwork::new();
    let a = substrate.add_node(SubstrateNode::new("A", 10.0));
    let b = substrate.add_node(SubstrateNode::new("B", 10.0));
    let c = substrate.add_node(SubstrateNode::new("C", 10.0));
    substrate.link(a, b, SubstrateLink::new(10.0));
    substrate.link(b, c, SubstrateLink::new(10.0));
    substrate.link(a, c, SubstrateLink::new(10.0));
    substrate
}

fn pair(cpu: f64, bandwidth: f64) -> VirtualNetwork {
    let mut request = VirtualNetwork::new();
    let x = request.add_node(VirtualNode::new("x", cpu));
    let y = request.add_node(VirtualNode::new("y", cpu));
    request.link(x, y, VirtualLink::new(bandwidth));
    request
}

fn parameters(epsilon: f64) -> Parameters {
    Parameters {
        epsilon: Some(epsilon),
        k: Some(DEFAULT_K),
        ..Default::default()
    }
}

/// Random requests of 2 to 5 nodes over cpu and memory, each a chain with
/// one extra chord when possible.
fn workload(count: usize, seed: u64) -> Vec<VirtualNetwork> {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
    (0..count)
        .map(|_| {
            let size = rng.gen_range(2..=5);
            let mut request = VirtualNetwork::new();
            let nodes = (0..size)
                .map(|i| {
                    let name = format!("v{}", i);
                    let demand = [
                        (DEFAULT_RESOURCE, rng.gen_range(1.0..20.0)),
                        ("memory", rng.gen_range(0.0..2.0)),
                    ];
                    request.add_node(VirtualNode::with_demand(&name, &demand))
                })
                .collect::<Vec<_>>();
            for pair in nodes.windows(2) {
                request.link(pair[0], pair[1], VirtualLink::new(rng.gen_range(1.0..15.0)));
            }
            if size > 2 {
                request.link(nodes[size - 1], nodes[0], VirtualLink::new(rng.gen_range(1.0..5.0)));
            }
            request
        })
        .collect()
}

/// A chain of `size` equal virtual nodes.
fn chain(size: usize, cpu: f64, bandwidth: f64) -> VirtualNetwork {
    let mut request = VirtualNetwork::new();
    let nodes = (0..size)
        .map(|i| request.add_node(VirtualNode::new(&format!("c{}", i), cpu)))
        .collect::<Vec<_>>();
    for pair in nodes.windows(2) {
        request.link(pair[0], pair[1], VirtualLink::new(bandwidth));
    }
    request
}

/// Runs `algorithm` on a fresh stack over `substrate` holding `requests`.
fn run(
    algorithm: &Algorithm,
    substrate: &SubstrateNetwork,
    requests: &[VirtualNetwork],
) -> (NetworkStack, Result<EmbeddingReport, EmbeddingFailure>) {
    let mut stack = NetworkStack::new(substrate.clone());
    for request in requests {
        stack.add_request(request.clone());
    }
    let result = execute(algorithm, &mut stack, &mut ExecutionCallbacks::default());
    (stack, result)
}

/// Every committed mapping is valid on its own and no capacity is
/// overdrawn by all of them together.
fn check_capacity_safety(stack: &NetworkStack, pristine: &SubstrateNetwork) -> anyhow::Result<()> {
    let residual = pristine.residual();
    let usage = stack.usage();
    residual
        .check_usage(&usage)
        .map_err(|violation| anyhow::anyhow!("capacity violated: {}", violation))?;
    let substrate = stack.substrate();
    for node in substrate.iter_nodes() {
        for (kind, capacity) in substrate.get_node(node).resources() {
            let expected = residual.node_remaining(node, kind) - usage.node_amount(node, kind);
            anyhow::ensure!(
                (capacity.remaining() - expected).abs() < 1e-6,
                "node {} {} remaining {} expected {}",
                node.index(),
                kind,
                capacity.remaining(),
                expected
            );
        }
    }
    for link in substrate.iter_links() {
        let expected = residual.link_remaining(link) - usage.link_amount(link);
        anyhow::ensure!(
            (substrate.remaining_bandwidth(link) - expected).abs() < 1e-6,
            "link {} remaining {} expected {}",
            link.index(),
            substrate.remaining_bandwidth(link),
            expected
        );
    }
    Ok(())
}

fn triangle_scenario() -> anyhow::Result<()> {
    for kind in [AlgorithmKind::SimpleShortestPath, AlgorithmKind::GreedyAvailable].iter() {
        let algorithm = Algorithm::select(*kind, &parameters(0.1))?;
        let (stack, result) = run(&algorithm, &triangle(), &[pair(5.0, 4.0)]);
        let report = result?;
        let substrate = stack.substrate();
        let node = |name| {
            substrate
                .get_node_index_by_name(name)
                .ok_or_else(|| anyhow::anyhow!("no node {}", name))
        };
        let (a, b) = (node("A")?, node("B")?);
        anyhow::ensure!(substrate.get_node(a).remaining(DEFAULT_RESOURCE) == 5.0);
        anyhow::ensure!(substrate.get_node(b).remaining(DEFAULT_RESOURCE) == 5.0);
        let ab = substrate
            .links_between(a, b)
            .first()
            .copied()
            .ok_or_else(|| anyhow::anyhow!("A and B are not adjacent"))?;
        anyhow::ensure!(
            substrate.remaining_bandwidth(ab) == 6.0,
            "{}: A-B has {} left",
            kind,
            substrate.remaining_bandwidth(ab)
        );
        log::info!("{}: cost {}", kind, report.total_cost());
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    triangle_scenario()?;

    let config = RunConfiguration::from_str(RUN_CONFIG)?;
    let substrate = random(40, 0.6, 0.3, 7, &config.node, &config.link);
    let requests = workload(25, 11);
    for kind in AlgorithmKind::ALL.iter() {
        if *kind == AlgorithmKind::OptimalMapping {
            continue;
        }
        let algorithm = Algorithm::select(*kind, &config.parameters)?;
        let (stack, result) = run(&algorithm, &substrate, &requests);
        match result {
            Ok(report) => {
                check_capacity_safety(&stack, &substrate)?;
                log::info!(
                    "{}: {} requests, total cost {:.2}, {} ms",
                    kind,
                    report.costs.len(),
                    report.total_cost(),
                    report.elapsed().num_milliseconds()
                );
            }
            Err(failure) => log::info!("{}", failure),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn init() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    #[test]
    fn test_triangle_scenario() {
        init();
        triangle_scenario().unwrap();
    }

    #[test]
    fn test_oversized_node_everywhere() {
        init();
        let mut request = VirtualNetwork::new();
        let big = request.add_node(VirtualNode::new("big", 15.0));
        let small = request.add_node(VirtualNode::new("small", 1.0));
        request.link(big, small, VirtualLink::new(1.0));
        for kind in AlgorithmKind::ALL.iter() {
            let algorithm = Algorithm::select(*kind, &parameters(0.1)).unwrap();
            let (stack, result) = run(&algorithm, &triangle(), &[request.clone()]);
            let failure = result.unwrap_err();
            assert_eq!(failure.error, Error::NoEmbeddingFound, "{}", kind);
            assert_eq!(failure.stage, Stage::Embed);
            assert_eq!(stack.substrate().residual(), triangle().residual());
        }
    }

    #[test]
    fn test_already_mapped() {
        init();
        let algorithm = Algorithm::select(AlgorithmKind::GreedyAvailable, &parameters(0.1)).unwrap();
        let (mut stack, result) = run(&algorithm, &triangle(), &[pair(5.0, 4.0)]);
        result.unwrap();
        let before = stack.substrate().residual();
        let failure = execute(&algorithm, &mut stack, &mut ExecutionCallbacks::default()).unwrap_err();
        assert_eq!(failure.error, Error::AlreadyMapped);
        assert_eq!(stack.substrate().residual(), before);

        stack.clear_mappings();
        assert!(!stack.has_mappings());
        execute(&algorithm, &mut stack, &mut ExecutionCallbacks::default()).unwrap();
    }

    #[test]
    fn test_optimal_epsilon() {
        init();
        let substrate = mesh(&[3, 3], &NodeConfiguration::with_cpu(20.0), &LinkConfiguration::new(20.0));
        let mut request = VirtualNetwork::new();
        let a = request.add_node(VirtualNode::new("a", 15.0));
        let b = request.add_node(VirtualNode::new("b", 10.0));
        let c = request.add_node(VirtualNode::new("c", 5.0));
        request.link(a, b, VirtualLink::new(12.0));
        request.link(b, c, VirtualLink::new(8.0));
        request.link(c, a, VirtualLink::new(4.0));
        let cost = |epsilon| {
            let algorithm = Algorithm::select(AlgorithmKind::OptimalMapping, &parameters(epsilon)).unwrap();
            let (_, result) = run(&algorithm, &substrate, &[request.clone()]);
            result.unwrap().total_cost()
        };
        assert!(cost(0.01) <= cost(0.5) + 1e-6);
    }

    #[test]
    fn test_capacity_safety_on_random_workloads() {
        init();
        let config = RunConfiguration::from_str(RUN_CONFIG).unwrap();
        let substrate = random(25, 0.6, 0.3, 3, &config.node, &config.link);
        let requests = workload(12, 5);
        for kind in AlgorithmKind::ALL.iter() {
            if *kind == AlgorithmKind::OptimalMapping {
                continue;
            }
            let algorithm = Algorithm::select(*kind, &config.parameters).unwrap();
            let (mut stack, result) = run(&algorithm, &substrate, &requests);
            match result {
                Ok(report) => {
                    assert_eq!(report.costs.len(), requests.len());
                    check_capacity_safety(&stack, &substrate).unwrap();
                    for (id, _) in report.costs.iter() {
                        let request = stack.request(*id).unwrap();
                        let mapping = stack.mapping(*id).unwrap();
                        for (_, route) in mapping.links() {
                            assert!((route.fraction_sum() - 1.0).abs() < FRACTION_TOLERANCE);
                        }
                        assert_eq!(mapping.nodes().count(), request.node_count());
                    }
                }
                Err(failure) => assert!(!stack.has_mappings(), "{}", failure),
            }
            stack.clear_mappings();
            assert_eq!(stack.substrate().residual(), substrate.residual());
        }
    }

    #[test]
    fn test_every_algorithm_succeeds_when_provisioned() {
        init();
        let config = RunConfiguration::from_str(RUN_CONFIG).unwrap();
        let mut node = NodeConfiguration::with_cpu(1000.0);
        node.add_resource("memory", 100.0);
        let substrate = fully_connected(12, &node, &LinkConfiguration::new(1000.0));
        let mut requests = workload(4, 21);
        requests.push(chain(7, 10.0, 5.0));
        assert!(requests
            .iter()
            .any(|request| request.node_count() > config.parameters.candidates));

        for kind in AlgorithmKind::ALL.iter() {
            // the relaxation is checked on a smaller instance below
            if *kind == AlgorithmKind::OptimalMapping {
                continue;
            }
            let algorithm = Algorithm::select(*kind, &config.parameters).unwrap();
            let (stack, result) = run(&algorithm, &substrate, &requests);
            let report = result.unwrap_or_else(|failure| panic!("{}: {}", kind, failure));
            assert_eq!(report.costs.len(), requests.len());
            check_capacity_safety(&stack, &substrate).unwrap();
            for (id, _) in report.costs.iter() {
                let request = stack.request(*id).unwrap();
                let mapping = stack.mapping(*id).unwrap();
                validate(&substrate, request, mapping).unwrap();
            }
        }

        let substrate = fully_connected(6, &node, &LinkConfiguration::new(1000.0));
        let request = chain(5, 10.0, 1.0);
        let algorithm = Algorithm::select(AlgorithmKind::OptimalMapping, &parameters(0.1)).unwrap();
        let (stack, result) = run(&algorithm, &substrate, &[request.clone()]);
        let report = result.unwrap();
        let mapping = stack.mapping(report.costs[0].0).unwrap();
        validate(&substrate, &request, mapping).unwrap();
        // 50 for the nodes, at least one hop per link
        assert!(report.total_cost() >= 54.0 - 1e-6);
        assert!(report.total_cost() <= 1.1 * 54.0 + 1e-6);
    }

    #[test]
    fn test_runs_are_deterministic() {
        init();
        let config = RunConfiguration::from_str(RUN_CONFIG).unwrap();
        let substrate = random(20, 0.6, 0.3, 9, &config.node, &config.link);
        let requests = workload(6, 13);
        for kind in [
            AlgorithmKind::GreedyPathSplitting,
            AlgorithmKind::CoordinatedPathSplitting,
            AlgorithmKind::BasicVnLinkStress,
        ]
        .iter()
        {
            let algorithm = Algorithm::select(*kind, &config.parameters).unwrap();
            let (first, _) = run(&algorithm, &substrate, &requests);
            let (second, _) = run(&algorithm, &substrate, &requests);
            for id in first.request_ids() {
                assert_eq!(first.mapping(id), second.mapping(id), "{}", kind);
            }
            assert_eq!(first.substrate().residual(), second.substrate().residual());
        }
    }

    #[test]
    fn test_release_one_request() {
        init();
        let algorithm = Algorithm::select(AlgorithmKind::GreedyAvailable, &parameters(0.1)).unwrap();
        let (mut stack, result) = run(&algorithm, &triangle(), &[pair(2.0, 3.0), pair(3.0, 2.0)]);
        let report = result.unwrap();
        let (first, _) = report.costs[0];
        let (second, _) = report.costs[1];
        stack.release(first).unwrap();
        assert!(stack.mapping(first).is_none());
        assert!(stack.mapping(second).is_some());
        let used: f64 = stack
            .substrate()
            .iter_nodes()
            .map(|n| 10.0 - stack.substrate().get_node(n).remaining(DEFAULT_RESOURCE))
            .sum();
        assert!((used - 6.0).abs() < 1e-9);
        stack.release(second).unwrap();
        assert_eq!(stack.substrate().residual(), triangle().residual());
    }
}
