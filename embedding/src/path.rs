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


//! Substrate paths, shortest paths and k shortest paths.

use petgraph::prelude::*;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};

use crate::error::Error;
use crate::substrate::SubstrateNetwork;

/// A loop-free walk over substrate links.
///
/// `nodes` holds every visited node, source first and destination last, so
/// `nodes.len() == links.len() + 1`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Path {
    nodes: Vec<NodeIndex>,
    links: Vec<EdgeIndex>,
}

impl Path {
    /// Builds the path that leaves `src` over `links`, in order. Fails with
    /// `InvalidPath` if the links are empty, not consecutive or revisit a node.
    pub fn from_links(
        substrate: &SubstrateNetwork,
        src: NodeIndex,
        links: &[EdgeIndex],
    ) -> Result<Self, Error> {
        if links.is_empty() || !substrate.contains_node(src) {
            return Err(Error::InvalidPath);
        }
        let mut nodes = vec![src];
        let mut current = src;
        for link in links {
            if !substrate.contains_link(*link) {
                return Err(Error::InvalidPath);
            }
            let (a, b) = substrate.get_link_endpoints(*link);
            current = if a == current {
                b
            } else if b == current {
                a
            } else {
                return Err(Error::InvalidPath);
            };
            nodes.push(current);
        }
        if nodes.iter().collect::<HashSet<_>>().len() != nodes.len() {
            return Err(Error::InvalidPath);
        }
        Ok(Self {
            nodes,
            links: links.to_vec(),
        })
    }

    pub fn src(&self) -> NodeIndex {
        self.nodes[0]
    }

    pub fn dst(&self) -> NodeIndex {
        self.nodes[self.nodes.len() - 1]
    }

    pub fn links(&self) -> &[EdgeIndex] {
        &self.links
    }

    pub fn nodes(&self) -> &[NodeIndex] {
        &self.nodes
    }

    pub fn hops(&self) -> usize {
        self.links.len()
    }

    pub fn connects(&self, src: NodeIndex, dst: NodeIndex) -> bool {
        (self.src() == src && self.dst() == dst) || (self.src() == dst && self.dst() == src)
    }

    /// Sum of the link weights; `None` if some link is excluded by `weight`.
    pub fn cost<W>(&self, weight: &W) -> Option<f64>
    where
        W: Fn(EdgeIndex) -> Option<f64>,
    {
        self.links.iter().map(|link| weight(*link)).sum()
    }

    fn concat(root: &Path, spur: &Path) -> Path {
        let mut nodes = root.nodes.clone();
        nodes.extend_from_slice(&spur.nodes[1..]);
        let mut links = root.links.clone();
        links.extend_from_slice(&spur.links);
        Path { nodes, links }
    }
}

/// Hop count: every link costs 1.
pub fn hop_count(_: EdgeIndex) -> Option<f64> {
    Some(1.0)
}

/// `BinaryHeap` entry ordered so that the smallest score pops first; equal
/// scores pop in node index order.
#[derive(Copy, Clone, Debug)]
struct MinScored(f64, NodeIndex);

impl PartialEq for MinScored {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for MinScored {}

impl PartialOrd for MinScored {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MinScored {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .0
            .partial_cmp(&self.0)
            .unwrap_or(Ordering::Equal)
            .then_with(|| other.1.cmp(&self.1))
    }
}

fn dijkstra<W>(
    substrate: &SubstrateNetwork,
    src: NodeIndex,
    dst: NodeIndex,
    weight: &W,
    banned_links: &HashSet<EdgeIndex>,
    banned_nodes: &HashSet<NodeIndex>,
) -> Option<(f64, Path)>
where
    W: Fn(EdgeIndex) -> Option<f64>,
{
    let mut distance: HashMap<NodeIndex, f64> = HashMap::new();
    let mut predecessor: HashMap<NodeIndex, EdgeIndex> = HashMap::new();
    let mut visited = HashSet::new();
    let mut heap = BinaryHeap::new();
    distance.insert(src, 0.0);
    heap.push(MinScored(0.0, src));

    while let Some(MinScored(score, node)) = heap.pop() {
        if !visited.insert(node) {
            continue;
        }
        if node == dst {
            break;
        }
        for link in substrate.incident_links(node) {
            if banned_links.contains(&link) {
                continue;
            }
            let next = substrate.opposite(link, node);
            if visited.contains(&next) || banned_nodes.contains(&next) {
                continue;
            }
            let link_weight = match weight(link) {
                Some(w) => w,
                None => continue,
            };
            let next_score = score + link_weight;
            let improves = distance.get(&next).map_or(true, |d| next_score < *d);
            if improves {
                distance.insert(next, next_score);
                predecessor.insert(next, link);
                heap.push(MinScored(next_score, next));
            }
        }
    }

    if !visited.contains(&dst) || src == dst {
        return None;
    }
    let mut links = Vec::new();
    let mut current = dst;
    while current != src {
        let link = predecessor[&current];
        links.push(link);
        current = substrate.opposite(link, current);
    }
    links.reverse();
    let path = Path::from_links(substrate, src, &links).ok()?;
    Some((distance[&dst], path))
}

/// Cheapest path from `src` to `dst`.
///
/// `weight` returns the cost of traversing a link, or `None` to exclude the
/// link (e.g. because it lacks bandwidth). Ties are resolved deterministically.
pub fn shortest_path<W>(
    substrate: &SubstrateNetwork,
    src: NodeIndex,
    dst: NodeIndex,
    weight: W,
) -> Option<Path>
where
    W: Fn(EdgeIndex) -> Option<f64>,
{
    dijkstra(
        substrate,
        src,
        dst,
        &weight,
        &HashSet::new(),
        &HashSet::new(),
    )
    .map(|(_, path)| path)
}

/// Up to `k` loop-free paths from `src` to `dst` in increasing cost (Yen's
/// algorithm). Paths of equal cost are ordered by hop count, then by link
/// indices.
pub fn k_shortest_paths<W>(
    substrate: &SubstrateNetwork,
    src: NodeIndex,
    dst: NodeIndex,
    k: usize,
    weight: W,
) -> Vec<Path>
where
    W: Fn(EdgeIndex) -> Option<f64>,
{
    let mut accepted: Vec<(f64, Path)> = Vec::new();
    if k == 0 {
        return vec![];
    }
    match dijkstra(substrate, src, dst, &weight, &HashSet::new(), &HashSet::new()) {
        Some(first) => accepted.push(first),
        None => return vec![],
    }
    let mut candidates: Vec<(f64, Path)> = Vec::new();

    while accepted.len() < k {
        let (_, previous) = &accepted[accepted.len() - 1];
        let previous = previous.clone();
        for j in 0..previous.hops() {
            let spur_node = previous.nodes[j];
            let root_links = &previous.links[..j];

            let banned_links = accepted
                .iter()
                .map(|(_, p)| p)
                .filter(|p| p.hops() > j && p.links[..j] == *root_links)
                .map(|p| p.links[j])
                .collect::<HashSet<_>>();
            let banned_nodes = previous.nodes[..j].iter().cloned().collect::<HashSet<_>>();

            let spur = match dijkstra(substrate, spur_node, dst, &weight, &banned_links, &banned_nodes) {
                Some((_, spur)) => spur,
                None => continue,
            };
            let candidate = if j == 0 {
                spur
            } else {
                let root = Path {
                    nodes: previous.nodes[..=j].to_vec(),
                    links: root_links.to_vec(),
                };
                Path::concat(&root, &spur)
            };
            let known = accepted.iter().any(|(_, p)| *p == candidate)
                || candidates.iter().any(|(_, p)| *p == candidate);
            if !known {
                if let Some(cost) = candidate.cost(&weight) {
                    candidates.push((cost, candidate));
                }
            }
        }
        if candidates.is_empty() {
            break;
        }
        let best = candidates
            .iter()
            .enumerate()
            .min_by(|(_, (ca, pa)), (_, (cb, pb))| {
                ca.partial_cmp(cb)
                    .unwrap_or(Ordering::Equal)
                    .then(pa.hops().cmp(&pb.hops()))
                    .then(pa.links.cmp(&pb.links))
            })
            .map(|(i, _)| i);
        if let Some(best) = best {
            accepted.push(candidates.swap_remove(best));
        }
    }
    log::trace!(
        "k_shortest_paths {:?} -> {:?}: {} of {} found",
        src,
        dst,
        accepted.len(),
        k
    );
    accepted.into_iter().map(|(_, path)| path).collect()
}

#[cfg(test)]
mod path_tests {
    use super::*;
    use crate::{SubstrateLink, SubstrateNode};

    #[allow(dead_code)]
    struct Square {
        substrate: SubstrateNetwork,
        a: NodeIndex,
        b: NodeIndex,
        c: NodeIndex,
        d: NodeIndex,
        ab: EdgeIndex,
        bc: EdgeIndex,
        cd: EdgeIndex,
        da: EdgeIndex,
        ac: EdgeIndex,
    }

    //  a --- b
    //  | \   |
    //  |  \  |
    //  d --- c
    fn square() -> Square {
        let mut substrate = SubstrateNetwork::new();
        let a = substrate.add_node(SubstrateNode::new("a", 1.0));
        let b = substrate.add_node(SubstrateNode::new("b", 1.0));
        let c = substrate.add_node(SubstrateNode::new("c", 1.0));
        let d = substrate.add_node(SubstrateNode::new("d", 1.0));
        let ab = substrate.link(a, b, SubstrateLink::new(10.0));
        let bc = substrate.link(b, c, SubstrateLink::new(10.0));
        let cd = substrate.link(c, d, SubstrateLink::new(10.0));
        let da = substrate.link(d, a, SubstrateLink::new(10.0));
        let ac = substrate.link(a, c, SubstrateLink::new(2.0));
        Square {
            substrate,
            a,
            b,
            c,
            d,
            ab,
            bc,
            cd,
            da,
            ac,
        }
    }

    #[test]
    fn test_empty_path() {
        let sq = square();
        assert_eq!(
            Path::from_links(&sq.substrate, sq.a, &[]),
            Err(Error::InvalidPath)
        );
    }

    #[test]
    fn test_broken_path() {
        let sq = square();
        assert_eq!(
            Path::from_links(&sq.substrate, sq.a, &[sq.bc]),
            Err(Error::InvalidPath)
        );
        // a -> b -> c -> a revisits a
        assert_eq!(
            Path::from_links(&sq.substrate, sq.a, &[sq.ab, sq.bc, sq.ac]),
            Err(Error::InvalidPath)
        );
    }

    #[test]
    fn test_path_walks_undirected_links() {
        let sq = square();
        let path = Path::from_links(&sq.substrate, sq.c, &[sq.bc, sq.ab, sq.da]).unwrap();
        assert_eq!(path.nodes(), &[sq.c, sq.b, sq.a, sq.d]);
        assert_eq!(path.src(), sq.c);
        assert_eq!(path.dst(), sq.d);
        assert_eq!(path.hops(), 3);
        assert!(path.connects(sq.d, sq.c));
    }

    #[test]
    fn test_shortest_path_hop_count() {
        let sq = square();
        let path = shortest_path(&sq.substrate, sq.a, sq.c, hop_count).unwrap();
        assert_eq!(path.links(), &[sq.ac]);
    }

    #[test]
    fn test_shortest_path_excludes_links() {
        let sq = square();
        let substrate = &sq.substrate;
        let path = shortest_path(substrate, sq.a, sq.c, |link| {
            if substrate.remaining_bandwidth(link) >= 5.0 {
                Some(1.0)
            } else {
                None
            }
        })
        .unwrap();
        assert_eq!(path.hops(), 2);
        assert_eq!(path.links(), &[sq.ab, sq.bc]);
        assert!(shortest_path(substrate, sq.a, sq.c, |_| None).is_none());
    }

    #[test]
    fn test_shortest_path_weighted() {
        let sq = square();
        let substrate = &sq.substrate;
        let path = shortest_path(substrate, sq.a, sq.c, |link| {
            Some(1.0 / substrate.remaining_bandwidth(link))
        })
        .unwrap();
        // 0.1 + 0.1 < 0.5
        assert_eq!(path.hops(), 2);
    }

    #[test]
    fn test_k_shortest_paths() {
        let sq = square();
        let paths = k_shortest_paths(&sq.substrate, sq.a, sq.c, 5, hop_count);
        assert_eq!(paths.len(), 3);
        assert_eq!(paths[0].links(), &[sq.ac]);
        assert_eq!(paths[1].links(), &[sq.ab, sq.bc]);
        assert_eq!(paths[2].links(), &[sq.da, sq.cd]);
        for path in paths.iter() {
            assert!(path.connects(sq.a, sq.c));
        }
        assert_eq!(k_shortest_paths(&sq.substrate, sq.a, sq.c, 2, hop_count).len(), 2);
        assert!(k_shortest_paths(&sq.substrate, sq.a, sq.c, 0, hop_count).is_empty());
    }

    #[test]
    fn test_k_shortest_paths_on_line() {
        let mut substrate = SubstrateNetwork::new();
        let a = substrate.add_node(SubstrateNode::new("a", 1.0));
        let b = substrate.add_node(SubstrateNode::new("b", 1.0));
        let c = substrate.add_node(SubstrateNode::new("c", 1.0));
        substrate.link(a, b, SubstrateLink::new(1.0));
        substrate.link(b, c, SubstrateLink::new(1.0));
        let paths = k_shortest_paths(&substrate, a, c, 3, hop_count);
        assert_eq!(paths.len(), 1);
        assert_eq!(paths[0].nodes(), &[a, b, c]);
    }
}
