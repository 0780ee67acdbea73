use crate::network::NetworkModel;
use petgraph::graph::{NodeIndex, UnGraph};
use std::collections::{HashMap, HashSet, VecDeque};

/// Bus-level graph of the energized topology.
///
/// Nodes are indices into `NetworkModel::buses`; edges are indices into
/// `NetworkModel::branches`. Out-of-service branches are left out, as is the
/// branch named in `outaged` (a contingency).
pub fn bus_graph(model: &NetworkModel, outaged: Option<&str>) -> UnGraph<usize, usize> {
    let mut graph = UnGraph::with_capacity(model.buses.len(), model.branches.len());
    let mut index: HashMap<&str, NodeIndex> = HashMap::with_capacity(model.buses.len());
    for (i, bus) in model.buses.iter().enumerate() {
        index.insert(bus.id.as_str(), graph.add_node(i));
    }
    for (i, branch) in model.branches.iter().enumerate() {
        if outaged == Some(branch.id.as_str()) {
            continue;
        }
        let (Some(b1), Some(b2)) = (
            branch.terminal1.energized_bus(),
            branch.terminal2.energized_bus(),
        ) else {
            continue;
        };
        if let (Some(&n1), Some(&n2)) = (index.get(b1), index.get(b2)) {
            graph.add_edge(n1, n2, i);
        }
    }
    graph
}

/// Connected components of the bus graph (breadth-first search).
///
/// Each island lists bus indices in ascending order; islands are ordered by
/// their smallest bus index.
pub fn find_islands(graph: &UnGraph<usize, usize>) -> Vec<Vec<usize>> {
    let mut visited = HashSet::new();
    let mut islands = Vec::new();
    for start in graph.node_indices() {
        if visited.contains(&start) {
            continue;
        }
        let mut queue = VecDeque::new();
        queue.push_back(start);
        let mut members = Vec::new();
        while let Some(node) = queue.pop_front() {
            if !visited.insert(node) {
                continue;
            }
            members.push(graph[node]);
            for neighbor in graph.neighbors(node) {
                if !visited.contains(&neighbor) {
                    queue.push_back(neighbor);
                }
            }
        }
        members.sort_unstable();
        islands.push(members);
    }
    islands
}
